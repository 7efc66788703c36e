//! Operation handler abstraction.
//!
//! The session never talks to the remote record store itself. The
//! application supplies an [`OperationHandler`] that performs the remote
//! calls (CloudKit, a REST API, a mock for testing).
//!
//! # Design
//!
//! The trait is async and has one method per kind of work:
//! - `modify()` saves and deletes a batch of records
//! - `fetch()` returns one page of changes since a token
//! - `create_zone()` creates a zone
//!
//! Failures are reported as [`RemoteError`] codes. The session classifies
//! them (see [`crate::classify`]) before the state machine sees them.

mod mock;

pub use mock::MockOperationHandler;

use async_trait::async_trait;
use cloudsync_core::{
    CreateZoneWork, FetchResponse, FetchWork, ModifyResponse, ModifyWork, SyncWork, WorkResult,
};
use cloudsync_types::RemoteError;

/// Performs remote calls on behalf of a session.
///
/// Implementations may run on any executor thread; the session marshals
/// their results back into its serialized dispatch path.
#[async_trait]
pub trait OperationHandler: Send + Sync + 'static {
    /// Save and delete the records in `work`.
    async fn modify(&self, work: &ModifyWork) -> Result<ModifyResponse, RemoteError>;

    /// Fetch one page of changes starting at `work.change_token`.
    async fn fetch(&self, work: &FetchWork) -> Result<FetchResponse, RemoteError>;

    /// Create the zone in `work`. Returns whether it was created.
    async fn create_zone(&self, work: &CreateZoneWork) -> Result<bool, RemoteError>;
}

/// Route a work to the matching handler method.
pub async fn perform<H>(handler: &H, work: &SyncWork) -> Result<WorkResult, RemoteError>
where
    H: OperationHandler + ?Sized,
{
    match work {
        SyncWork::Modify(work) => handler.modify(work).await.map(WorkResult::Modify),
        SyncWork::Fetch(work) => handler.fetch(work).await.map(WorkResult::Fetch),
        SyncWork::CreateZone(work) => handler.create_zone(work).await.map(WorkResult::CreateZone),
    }
}
