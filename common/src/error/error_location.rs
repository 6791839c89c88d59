//! Source location attached to every error raised in the workspace.

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location as PanicLocation;

use serde::Serialize;

/// File, line and column where an error was constructed.
///
/// Built from [`std::panic::Location`] so that `#[track_caller]` functions
/// report the site of the failing call rather than the error constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl ErrorLocation {
    pub const fn from(location: &'static PanicLocation<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    /// Capture the location of the (tracked) caller.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(PanicLocation::caller())
    }
}

impl Display for ErrorLocation {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "[{}:{}:{}]", self.file, self.line, self.column)
    }
}
