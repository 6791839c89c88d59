//! Background tasks belonging to one live connection.

use log::{debug, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The read loop, writer and timeout sweeper of one connection.
///
/// All three observe the same cancellation flag. Dropping the handle signals
/// cancellation; [`ConnectionHandle::shutdown`] also waits for the tasks so
/// nothing outlives the call.
pub(crate) struct ConnectionHandle {
    cancel: watch::Sender<bool>,
    read_loop: JoinHandle<()>,
    writer: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        cancel: watch::Sender<bool>,
        read_loop: JoinHandle<()>,
        writer: JoinHandle<()>,
        sweeper: JoinHandle<()>,
    ) -> Self {
        Self {
            cancel,
            read_loop,
            writer,
            sweeper,
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub(crate) async fn shutdown(mut self) {
        self.cancel();

        let tasks = [
            ("read loop", &mut self.read_loop),
            ("writer", &mut self.writer),
            ("sweeper", &mut self.sweeper),
        ];
        for (name, task) in tasks {
            if let Err(e) = task.await {
                warn!("Connection {name} task ended abnormally: {e}");
            }
        }
        debug!("Connection tasks stopped");
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}
