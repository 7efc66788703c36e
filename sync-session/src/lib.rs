//! # sync-session
//!
//! The stateful shell around the cloudsync state machine.
//!
//! This is the library applications use to keep local records in sync with
//! a remote record store.
//!
//! ## Features
//!
//! - **Serialized dispatch**: every event flows through one consuming loop,
//!   so concurrent triggers can never put two operations in flight
//! - **Pluggable remote**: the application implements [`OperationHandler`]
//! - **Middleware pipeline**: observe or intercept events before the reducer
//! - **Pure State Machine**: uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use cloudsync_session::{MockOperationHandler, SyncSession};
//!
//! let session = SyncSession::builder(MockOperationHandler::new())
//!     .on_records_modified(|saved, _deleted| println!("saved {}", saved.len()))
//!     .build();
//!
//! session.set_account_status(AccountStatus::Available)?;
//! session.modify(records, vec![])?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod session;

pub use classify::classify;
pub use config::{ConfigError, SessionConfig};
pub use error::SessionError;
pub use handler::{perform, MockOperationHandler, OperationHandler};
pub use middleware::{from_fn, LoggingMiddleware, Middleware, Next, Pipeline};
pub use session::{SessionBuilder, SyncSession};

pub use cloudsync_core::{AccountStatus, SyncEvent, SyncState, SyncWork};
