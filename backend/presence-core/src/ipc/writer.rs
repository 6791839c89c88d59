//! The writer task: the only code that writes to the transport after the
//! handshake.

use crate::error::ipc::IpcError;
use crate::ipc::codec;
use crate::ipc::packet::{Handshake, Packet};
use crate::transport::BoxedWriter;

use common::ErrorLocation;

use std::panic::Location;

use log::{debug, trace, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;

pub(crate) async fn run(
    mut writer: BoxedWriter,
    mut outbound: UnboundedReceiver<Vec<u8>>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let bytes = tokio::select! {
            biased;
            _ = cancel.changed() => break,
            bytes = outbound.recv() => match bytes {
                Some(bytes) => bytes,
                None => break,
            },
        };

        // A failed write loses that frame only; a dead socket also ends
        // the read loop, which tears the connection down.
        if let Err(e) = write_bytes(&mut writer, &bytes).await {
            warn!("{e}");
        } else {
            trace!("Wrote {} bytes", bytes.len());
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("Writer shutdown: {e}");
    }
    debug!("Writer stopped");
}

/// Write the HANDSHAKE frame directly, before the writer task exists.
pub(crate) async fn write_handshake<W>(writer: &mut W, client_id: &str) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = codec::encode(&Packet::Handshake(Handshake::new(client_id)))?;
    write_bytes(writer, &bytes).await
}

async fn write_bytes<W>(writer: &mut W, bytes: &[u8]) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let result = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;

    result.map_err(|e| IpcError::Send {
        message: format!("Failed to write frame: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}
