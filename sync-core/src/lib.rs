//! # sync-core
//!
//! Pure logic for cloudsync sessions (no I/O, instant tests).
//!
//! This crate implements the work model and the session state machine
//! without any network access, timers or logging, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! The reducer in [`state`] is **pure** - it takes the current state and an
//! event and produces the next state plus a list of actions. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (calling the remote store, sleeping before a retry) is
//! performed by `sync-session`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod event;
pub mod policy;
pub mod state;
pub mod work;

pub use event::{AccountStatus, FailureKind, SyncEvent, WorkFailure};
pub use policy::RetryPolicy;
pub use state::{Action, SyncState};
pub use work::{
    CreateZoneWork, FetchResponse, FetchWork, ModifyResponse, ModifyWork, SyncWork, WorkResult,
};
