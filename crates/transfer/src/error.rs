use common::file_utils::FilenameValidationError;
use common::HeaderError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("No master addresses configured")]
    NoMasters,

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Can't contact master {master}: {detail}")]
    MasterUnreachable { master: String, detail: String },

    #[error("Session init failed with status {status}: {detail}")]
    SessionInitFailed { status: u16, detail: String },

    #[error("Session init response carried no ID header")]
    MissingSessionId,

    #[error("Failed to access local file {path:?}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file name {path:?}: {source}")]
    InvalidFileName {
        path: PathBuf,
        #[source]
        source: FilenameValidationError,
    },

    #[error("Reached end of upload at offset {offset} of {total} bytes without completion from server")]
    IncompleteUpload { offset: u64, total: u64 },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Append rejected with status {status} and no correction")]
    UnexpectedStatus { status: u16 },

    #[error("Malformed server header: {0}")]
    Header(#[from] HeaderError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Upload failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<TransferError>,
    },
}

impl TransferError {
    pub(crate) fn local_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::LocalFile {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from reading local files rather than the network
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            TransferError::LocalFile { .. } | TransferError::InvalidFileName { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
