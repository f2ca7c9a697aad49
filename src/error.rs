use std::path::PathBuf;

use thiserror::Error;

/// Failure to obtain the log lines; per-line problems never surface here.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read log file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no log lines or log path supplied")]
    NoSource,
}
