//! Error types for sync-session.

use thiserror::Error;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The dispatch loop has stopped; no more events are accepted.
    #[error("session closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        assert_eq!(SessionError::Closed.to_string(), "session closed");
    }
}
