//! # sync-types
//!
//! Payload types for cloudsync sessions.
//!
//! The session core treats everything in this crate as opaque data. Only the
//! role of each type matters to it:
//! - [`Record`] - a save target
//! - [`RecordId`] - a delete target
//! - [`ZoneId`] - the partition records live in
//! - [`ChangeToken`] - the pagination key for fetches
//! - [`RemoteError`] - failure codes reported by the remote record store

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod record;

pub use error::RemoteError;
pub use ids::{ChangeToken, RecordId, ZoneId};
pub use record::Record;
