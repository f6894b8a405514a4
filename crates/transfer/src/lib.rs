//! Resumable chunked uploads to a storage cluster.
//!
//! A master coordinator hands out the address of a data node; the client
//! opens a session there and appends the files of a manifest chunk by chunk,
//! following offset and chunk size corrections sent back by the data node.
//! Whole trials are retried according to a [`RetryPolicy`], rotating through
//! the masters when one cannot be reached.

pub mod engine;
pub mod error;
pub mod http;
pub mod manifest;
pub mod master;
pub mod retry;
pub mod session;
pub mod transport;
pub mod uploader;

#[cfg(test)]
mod test_support;

pub use engine::{AppendOutcome, ChunkedTransfer, TransferReport, TransferState};
pub use error::{Result, TransferError};
pub use http::{HttpOptions, HttpTransport};
pub use manifest::{ManifestEntry, ManifestLayout, TransferManifest, MODEL_UPLOAD_ORDER};
pub use master::MasterPool;
pub use retry::{Backoff, RetryPolicy};
pub use session::{discover_upload_address, open_session, UploadSession};
pub use transport::{
    AppendRequest, AppendResponse, MasterReply, SessionReply, SessionRequest, Transport,
};
pub use uploader::{TrialPhase, UploadOutcome, Uploader};

/// Chunk size used until the data node asks for another one (4 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 4 << 20;

/// Trials after the first one
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Seconds between trials
pub const DEFAULT_RETRY_WAIT_SECS: u64 = 10;

/// Corrections accepted in a row before a transfer is abandoned
pub const MAX_CONSECUTIVE_CORRECTIONS: usize = 16;
