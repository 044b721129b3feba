use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Could not determine the Documents folder")]
    DocumentsDirUnavailable,

    #[error("Failed to create BroadcastME folder {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Filename cannot be empty!")]
    EmptyFileName,

    #[error("Filename {0:?} must not contain a path separator")]
    InvalidFileName(String),

    #[error("Could not rename file: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not detect screen resolution: {0}")]
    Resolution(#[source] anyhow::Error),

    #[error("Screen capture failed: {0}")]
    Capture(#[source] anyhow::Error),

    #[error("Video encoding failed: {0}")]
    Encode(#[source] anyhow::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RecorderError {
    /// Validation problems the user can fix by retyping, as opposed to failures.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::EmptyFileName | Self::InvalidFileName(_))
    }
}
