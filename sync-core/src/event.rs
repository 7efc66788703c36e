//! Inputs accepted by the session state machine.

use std::time::Duration;

use cloudsync_types::{Record, RecordId, ZoneId};

use crate::work::{SyncWork, WorkResult};

/// Account availability as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    /// Signed in and usable.
    Available,
    /// Signed out or restricted.
    Unavailable,
    /// Status could not be determined.
    Other,
}

/// How a failed work should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request exceeded the remote store's size limit. Modify work is
    /// split in half; this does not consume the retry budget.
    PayloadTooLarge,
    /// Network timeouts, rate limiting and similar. Retried with backoff.
    RetryableTransient,
    /// Authentication, permission or malformed-request failures. Halts the session.
    NonRetryable,
}

/// A classified failure of a remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkFailure {
    /// Classification driving the state machine.
    pub kind: FailureKind,
    /// Server hint for the minimum wait before retrying.
    pub retry_after: Option<Duration>,
    /// Human-readable reason, for logs.
    pub reason: String,
}

impl WorkFailure {
    /// Create a failure with no retry hint.
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            retry_after: None,
            reason: reason.into(),
        }
    }

    /// Attach a server retry-after hint.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Events that drive the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// User saved and/or deleted records.
    Modify {
        /// Records to save.
        records: Vec<Record>,
        /// Records to delete.
        record_ids_to_delete: Vec<RecordId>,
    },
    /// User asked for remote changes.
    FetchRequested,
    /// User asked for a zone to be created.
    CreateZoneRequested {
        /// The zone to create.
        zone_id: ZoneId,
    },
    /// Account availability changed.
    AccountStatusChanged(AccountStatus),
    /// The application asked the session to stop issuing work.
    HaltRequested {
        /// Why the application halted the session.
        reason: String,
    },
    /// The operation handler finished a work.
    WorkResponse {
        /// The work the handler was given.
        work: SyncWork,
        /// Its outcome.
        result: Result<WorkResult, WorkFailure>,
    },
    /// The backoff delay for a retried work elapsed.
    RetryTimerFired {
        /// The retried work.
        work: SyncWork,
    },
}

impl SyncEvent {
    /// Human-readable summary for logs.
    pub fn description(&self) -> String {
        match self {
            Self::Modify {
                records,
                record_ids_to_delete,
            } => format!(
                "modify with {} records to save and {} to delete",
                records.len(),
                record_ids_to_delete.len()
            ),
            Self::FetchRequested => "fetch requested".to_string(),
            Self::CreateZoneRequested { zone_id } => format!("create zone {} requested", zone_id),
            Self::AccountStatusChanged(status) => format!("account status changed to {:?}", status),
            Self::HaltRequested { reason } => format!("halt requested: {}", reason),
            Self::WorkResponse {
                work,
                result: Ok(_),
            } => format!("{} succeeded", work.description()),
            Self::WorkResponse {
                work,
                result: Err(failure),
            } => format!(
                "{} failed ({:?}): {}",
                work.description(),
                failure.kind,
                failure.reason
            ),
            Self::RetryTimerFired { work } => {
                format!("retry {} of {}", work.retry_count(), work.description())
            }
        }
    }
}
