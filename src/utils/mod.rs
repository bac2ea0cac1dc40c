//! Shared utilities

pub mod error;
pub mod filename;

pub use error::{ConfigError, ExitStatus, RunError, SessionError, SessionResult, SinkError};
pub use filename::default_filename;
