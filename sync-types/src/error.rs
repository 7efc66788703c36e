//! Failure codes reported by the remote record store.

use std::time::Duration;
use thiserror::Error;

/// Errors an operation handler can report for a remote call.
///
/// These mirror the remote store's own error codes. The session classifies
/// them before they reach the state machine, so nothing past the handler
/// boundary depends on a particular transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// No network connection.
    #[error("network unavailable")]
    NetworkUnavailable,

    /// The request failed in transit.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The remote service is temporarily unavailable.
    #[error("service unavailable")]
    ServiceUnavailable,

    /// The client is being rate limited.
    #[error("request rate limited")]
    RequestRateLimited {
        /// Server hint for how long to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// The zone is busy with another request.
    #[error("zone busy")]
    ZoneBusy,

    /// The request exceeded the per-request size limit.
    #[error("request limit exceeded")]
    LimitExceeded,

    /// The whole batch was rejected because part of it failed.
    #[error("batch request failed")]
    BatchRequestFailed,

    /// No signed-in account.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The account lacks permission for this request.
    #[error("permission failure")]
    PermissionFailure,

    /// The account's storage quota is exhausted.
    #[error("quota exceeded")]
    QuotaExceeded,

    /// The target zone does not exist.
    #[error("zone not found")]
    ZoneNotFound,

    /// The request was malformed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The server rejected the request.
    #[error("server rejected request")]
    ServerRejectedRequest,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RemoteError::NetworkFailure("connection reset".into());
        assert_eq!(err.to_string(), "network failure: connection reset");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RemoteError>();
    }
}
