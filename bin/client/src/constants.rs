/// Environment override for the number of retries after the first trial
pub const ENV_MAX_RETRIES: &str = "UPLOAD_MAX_RETRIES";

/// Environment override for the wait between trials, in seconds
pub const ENV_RETRY_WAIT_SECS: &str = "UPLOAD_RETRY_WAIT_SECS";

/// Environment override for the initial chunk size, in bytes
pub const ENV_CHUNK_SIZE: &str = "UPLOAD_CHUNK_SIZE";

/// Default per-request transport retries
pub const DEFAULT_REQUEST_RETRIES: u32 = 3;

/// Default timeout of a single request, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Default cap on the exponential backoff wait, in seconds
pub const DEFAULT_MAX_RETRY_WAIT_SECS: u64 = 300;
