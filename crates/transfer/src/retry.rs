use crate::error::TransferError;
use std::time::Duration;

/// Delay between trials
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^(attempt - 1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

/// Retry policy of the upload orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Trials after the first one
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Retry local file errors instead of failing at once
    pub retry_local_file_errors: bool,
    /// Retry a session init refused by the data node instead of failing at once
    pub retry_session_init: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::DEFAULT_MAX_RETRIES,
            backoff: Backoff::Fixed(Duration::from_secs(crate::DEFAULT_RETRY_WAIT_SECS)),
            retry_local_file_errors: false,
            retry_session_init: false,
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between trials
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(Duration::ZERO),
            ..Default::default()
        }
    }

    /// Total number of trials, the first one included
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before trial `attempt` (1-based count of failures so far)
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                base.checked_mul(factor).unwrap_or(max).min(max)
            }
        }
    }

    /// Whether a failed trial may be followed by another one
    pub fn is_retryable(&self, error: &TransferError) -> bool {
        match error {
            TransferError::LocalFile { .. } | TransferError::InvalidFileName { .. } => {
                self.retry_local_file_errors
            }
            TransferError::SessionInitFailed { .. } => self.retry_session_init,
            TransferError::NoMasters
            | TransferError::InvalidManifest(_)
            | TransferError::RetriesExhausted { .. } => false,
            TransferError::MasterUnreachable { .. }
            | TransferError::MissingSessionId
            | TransferError::IncompleteUpload { .. }
            | TransferError::Transport(_)
            | TransferError::UnexpectedStatus { .. }
            | TransferError::Header(_)
            | TransferError::Protocol(_) => true,
        }
    }
}
