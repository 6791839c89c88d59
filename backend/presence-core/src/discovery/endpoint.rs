use crate::ENDPOINT_PREFIX;
use crate::config::MAX_SOCKET_INDEX;
use crate::discovery::EndpointResolver;
use crate::error::discovery::DiscoveryError;

use common::ErrorLocation;

use std::ffi::OsString;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, info};

/// Environment variables consulted for the runtime directory, in priority order.
#[cfg(unix)]
const RUNTIME_DIR_VARIABLES: [&str; 4] = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"];

/// Sandboxed installs bind their socket one level down.
#[cfg(unix)]
const SANDBOX_SUBDIRECTORIES: [&str; 2] = ["app/com.discordapp.Discord", "snap.discord"];

#[cfg(unix)]
const FALLBACK_RUNTIME_DIR: &str = "/tmp";

#[cfg(windows)]
const PIPE_NAMESPACE: &str = r"\\?\pipe";

/// A resolver that always returns the same path.
#[derive(Debug, Clone)]
pub struct StaticEndpoint(PathBuf);

impl StaticEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl EndpointResolver for StaticEndpoint {
    fn resolve_endpoint_path(&self) -> Result<PathBuf, DiscoveryError> {
        Ok(self.0.clone())
    }
}

/// Probes the platform's well-known locations for a companion endpoint.
#[derive(Debug, Clone, Default)]
pub struct SocketDiscovery {
    socket_index: Option<u8>,
    runtime_dir: Option<PathBuf>,
}

impl SocketDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only consider `discord-ipc-{index}`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Validation`] if `index` is above 9.
    #[track_caller]
    pub fn with_socket_index(mut self, index: u8) -> Result<Self, DiscoveryError> {
        if index > MAX_SOCKET_INDEX {
            return Err(DiscoveryError::Validation {
                message: format!("Socket index {index} is out of range (0-{MAX_SOCKET_INDEX})"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.socket_index = Some(index);
        Ok(self)
    }

    /// Probe this directory before any environment-derived one.
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = Some(dir.into());
        self
    }

    fn indices(&self) -> Vec<u8> {
        match self.socket_index {
            Some(index) => vec![index],
            None => (0..=MAX_SOCKET_INDEX).collect(),
        }
    }

    /// Every path that will be probed, in probe order.
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        self.candidate_paths_with(|name| std::env::var_os(name))
    }

    #[cfg(unix)]
    pub(crate) fn candidate_paths_with(
        &self,
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Vec<PathBuf> {
        let configured = self.runtime_dir.iter().cloned();
        let from_environment = RUNTIME_DIR_VARIABLES
            .iter()
            .filter_map(|name| lookup(*name))
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let mut directories: Vec<PathBuf> = Vec::new();
        for directory in configured
            .chain(from_environment)
            .chain([PathBuf::from(FALLBACK_RUNTIME_DIR)])
        {
            if !directories.contains(&directory) {
                directories.push(directory);
            }
        }

        let mut candidates = Vec::new();
        for directory in &directories {
            let mut bases = vec![directory.clone()];
            bases.extend(SANDBOX_SUBDIRECTORIES.iter().map(|sub| directory.join(sub)));

            for base in bases {
                for index in self.indices() {
                    candidates.push(base.join(format!("{ENDPOINT_PREFIX}{index}")));
                }
            }
        }
        candidates
    }

    #[cfg(windows)]
    pub(crate) fn candidate_paths_with(
        &self,
        _lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Vec<PathBuf> {
        self.indices()
            .into_iter()
            .map(|index| PathBuf::from(format!(r"{PIPE_NAMESPACE}\{ENDPOINT_PREFIX}{index}")))
            .collect()
    }

    #[cfg(not(any(unix, windows)))]
    pub(crate) fn candidate_paths_with(
        &self,
        _lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Vec<PathBuf> {
        Vec::new()
    }
}

impl EndpointResolver for SocketDiscovery {
    fn resolve_endpoint_path(&self) -> Result<PathBuf, DiscoveryError> {
        let candidates = self.candidate_paths();

        for candidate in &candidates {
            debug!("Probing endpoint {}", candidate.display());
            if candidate.exists() {
                info!("Found companion endpoint at {}", candidate.display());
                return Ok(candidate.clone());
            }
        }

        Err(DiscoveryError::NotFound {
            message: format!(
                "No companion endpoint found after probing {} locations",
                candidates.len()
            ),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
