use std::fmt;

use pclipsync_sync::EngineError;
use pclipsync_transport::TransportError;
use pclipsync_x11::SelectionError;

/// Exit code mapping: 0 clean shutdown, 1 runtime error, 2 usage error
/// (usage errors are produced by clap before we run).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
#[allow(dead_code)]
pub const USAGE: i32 = 2;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    CliError::new(FAILURE, format!("{context}: {err}"))
}

pub fn selection_error(context: &str, err: SelectionError) -> CliError {
    CliError::new(FAILURE, format!("{context}: {err}"))
}

pub fn engine_error(context: &str, err: EngineError) -> CliError {
    CliError::new(FAILURE, format!("{context}: {err}"))
}
