//! Mock operation handler for testing.
//!
//! Allows scripting responses and capturing received work for verification.

use super::OperationHandler;
use async_trait::async_trait;
use cloudsync_core::{
    CreateZoneWork, FetchResponse, FetchWork, ModifyResponse, ModifyWork, SyncWork,
};
use cloudsync_types::RemoteError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Mock operation handler for testing.
///
/// Scripted responses are returned in order per kind of work. When nothing
/// is scripted the handler succeeds: modify echoes its records back, fetch
/// returns an empty final page, and zone creation reports `true`.
#[derive(Debug, Default)]
pub struct MockOperationHandler {
    inner: Arc<Mutex<MockHandlerInner>>,
}

#[derive(Debug, Default)]
struct MockHandlerInner {
    received: Vec<SyncWork>,
    modify_responses: VecDeque<Result<ModifyResponse, RemoteError>>,
    fetch_responses: VecDeque<Result<FetchResponse, RemoteError>>,
    create_zone_responses: VecDeque<Result<bool, RemoteError>>,
    latency: Option<Duration>,
    in_flight: usize,
    max_in_flight: usize,
}

impl MockOperationHandler {
    /// Create a new mock handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    /// Queue the result of the next unscripted `modify()` call.
    pub fn queue_modify(&self, result: Result<ModifyResponse, RemoteError>) {
        self.lock().modify_responses.push_back(result);
    }

    /// Queue the result of the next unscripted `fetch()` call.
    pub fn queue_fetch(&self, result: Result<FetchResponse, RemoteError>) {
        self.lock().fetch_responses.push_back(result);
    }

    /// Queue the result of the next unscripted `create_zone()` call.
    pub fn queue_create_zone(&self, result: Result<bool, RemoteError>) {
        self.lock().create_zone_responses.push_back(result);
    }

    /// Cause the next `modify()` to fail with the given error.
    pub fn fail_next_modify(&self, error: RemoteError) {
        self.queue_modify(Err(error));
    }

    /// Get every work the handler was asked to perform, in order.
    pub fn received_work(&self) -> Vec<SyncWork> {
        self.lock().received.clone()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Clear all scripted responses and recorded work.
    pub fn reset(&self) {
        *self.lock() = MockHandlerInner::default();
    }

    fn lock(&self) -> MutexGuard<'_, MockHandlerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the call and wait out the configured latency.
    async fn begin(&self, work: SyncWork) {
        let latency = {
            let mut inner = self.lock();
            inner.received.push(work);
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
            inner.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn finish(&self) {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }
}

impl Clone for MockOperationHandler {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl OperationHandler for MockOperationHandler {
    async fn modify(&self, work: &ModifyWork) -> Result<ModifyResponse, RemoteError> {
        self.begin(SyncWork::Modify(work.clone())).await;
        let scripted = self.lock().modify_responses.pop_front();
        self.finish();

        scripted.unwrap_or_else(|| {
            Ok(ModifyResponse {
                saved_records: work.records_to_save.clone(),
                deleted_record_ids: work.record_ids_to_delete.clone(),
            })
        })
    }

    async fn fetch(&self, work: &FetchWork) -> Result<FetchResponse, RemoteError> {
        self.begin(SyncWork::Fetch(work.clone())).await;
        let scripted = self.lock().fetch_responses.pop_front();
        self.finish();

        scripted.unwrap_or_else(|| {
            Ok(FetchResponse {
                change_token: work.change_token.clone(),
                ..Default::default()
            })
        })
    }

    async fn create_zone(&self, work: &CreateZoneWork) -> Result<bool, RemoteError> {
        self.begin(SyncWork::CreateZone(work.clone())).await;
        let scripted = self.lock().create_zone_responses.pop_front();
        self.finish();

        scripted.unwrap_or(Ok(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::perform;
    use cloudsync_core::WorkResult;
    use cloudsync_types::{ChangeToken, Record, RecordId, ZoneId};

    fn record(name: &str) -> Record {
        Record::new(
            RecordId::with_name(ZoneId::new("Notes"), name),
            "Note",
            vec![],
        )
    }

    // ===========================================
    // Default Behavior Tests
    // ===========================================

    #[tokio::test]
    async fn modify_echoes_records_by_default() {
        let handler = MockOperationHandler::new();
        let work = ModifyWork::new(vec![record("a"), record("b")], vec![]);

        let response = handler.modify(&work).await.unwrap();

        assert_eq!(response.saved_records, work.records_to_save);
        assert!(response.deleted_record_ids.is_empty());
    }

    #[tokio::test]
    async fn fetch_returns_final_empty_page_by_default() {
        let handler = MockOperationHandler::new();
        let token = ChangeToken::from_bytes(b"t");

        let page = handler
            .fetch(&FetchWork::new(Some(token.clone())))
            .await
            .unwrap();

        assert!(!page.has_more);
        assert!(page.changed_records.is_empty());
        assert_eq!(page.change_token, Some(token));
    }

    #[tokio::test]
    async fn create_zone_succeeds_by_default() {
        let handler = MockOperationHandler::new();
        let created = handler
            .create_zone(&CreateZoneWork::new(ZoneId::new("Notes")))
            .await
            .unwrap();
        assert!(created);
    }

    // ===========================================
    // Scripted Response Tests
    // ===========================================

    #[tokio::test]
    async fn scripted_failure_is_returned_once() {
        let handler = MockOperationHandler::new();
        handler.fail_next_modify(RemoteError::NotAuthenticated);
        let work = ModifyWork::new(vec![record("a")], vec![]);

        let first = handler.modify(&work).await;
        assert!(matches!(first, Err(RemoteError::NotAuthenticated)));

        // Next call falls back to the default echo
        handler.modify(&work).await.unwrap();
    }

    #[tokio::test]
    async fn scripted_responses_are_returned_in_order() {
        let handler = MockOperationHandler::new();
        handler.queue_create_zone(Ok(false));
        handler.queue_create_zone(Err(RemoteError::ZoneBusy));
        let work = CreateZoneWork::new(ZoneId::new("Notes"));

        assert!(!handler.create_zone(&work).await.unwrap());
        assert!(handler.create_zone(&work).await.is_err());
        assert!(handler.create_zone(&work).await.unwrap());
    }

    #[tokio::test]
    async fn records_received_work() {
        let handler = MockOperationHandler::new();
        let fetch = SyncWork::Fetch(FetchWork::new(None));
        let zone = SyncWork::CreateZone(CreateZoneWork::new(ZoneId::new("Notes")));

        perform(&handler, &fetch).await.unwrap();
        perform(&handler, &zone).await.unwrap();

        assert_eq!(handler.received_work(), vec![fetch, zone]);
    }

    #[tokio::test]
    async fn perform_routes_by_kind() {
        let handler = MockOperationHandler::new();
        let work = SyncWork::CreateZone(CreateZoneWork::new(ZoneId::new("Notes")));
        let result = perform(&handler, &work).await.unwrap();
        assert_eq!(result, WorkResult::CreateZone(true));
    }

    // ===========================================
    // Clone and Shared State Tests
    // ===========================================

    #[tokio::test]
    async fn clone_shares_state() {
        let handler1 = MockOperationHandler::new();
        let handler2 = handler1.clone();

        handler1.fail_next_modify(RemoteError::ServiceUnavailable);
        let result = handler2
            .modify(&ModifyWork::new(vec![record("a")], vec![]))
            .await;

        assert!(result.is_err());
        assert_eq!(handler1.received_work().len(), 1);
    }

    #[tokio::test]
    async fn reset_clears_all() {
        let handler = MockOperationHandler::new();
        handler.fail_next_modify(RemoteError::ServiceUnavailable);
        handler
            .fetch(&FetchWork::new(None))
            .await
            .unwrap();

        handler.reset();

        assert!(handler.received_work().is_empty());
        handler
            .modify(&ModifyWork::new(vec![record("a")], vec![]))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn latency_tracks_concurrent_calls() {
        let handler = MockOperationHandler::new().with_latency(Duration::from_millis(50));
        let work = FetchWork::new(None);

        let (a, b) = tokio::join!(handler.fetch(&work), handler.fetch(&work));
        a.unwrap();
        b.unwrap();

        assert_eq!(handler.max_in_flight(), 2);
    }
}
