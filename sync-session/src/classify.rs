//! Map remote-store error codes to state-machine failure classes.
//!
//! This is the only place that looks at [`RemoteError`]. Everything past it
//! sees a [`WorkFailure`], keeping the reducer transport-agnostic.

use cloudsync_core::{FailureKind, WorkFailure};
use cloudsync_types::RemoteError;

/// Classify a handler error.
///
/// - `LimitExceeded` / `BatchRequestFailed` → [`FailureKind::PayloadTooLarge`]
/// - network, availability, rate-limit and zone-busy errors →
///   [`FailureKind::RetryableTransient`]
/// - everything else → [`FailureKind::NonRetryable`]
pub fn classify(error: &RemoteError) -> WorkFailure {
    let kind = match error {
        RemoteError::LimitExceeded | RemoteError::BatchRequestFailed => {
            FailureKind::PayloadTooLarge
        }
        RemoteError::NetworkUnavailable
        | RemoteError::NetworkFailure(_)
        | RemoteError::ServiceUnavailable
        | RemoteError::RequestRateLimited { .. }
        | RemoteError::ZoneBusy => FailureKind::RetryableTransient,
        RemoteError::NotAuthenticated
        | RemoteError::PermissionFailure
        | RemoteError::QuotaExceeded
        | RemoteError::ZoneNotFound
        | RemoteError::InvalidArguments(_)
        | RemoteError::ServerRejectedRequest
        | RemoteError::Internal(_) => FailureKind::NonRetryable,
    };

    let failure = WorkFailure::new(kind, error.to_string());
    match error {
        RemoteError::RequestRateLimited {
            retry_after: Some(retry_after),
        } => failure.with_retry_after(*retry_after),
        _ => failure,
    }
}
