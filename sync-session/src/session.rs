//! SyncSession - the stateful shell around the sync state machine.
//!
//! # Architecture
//!
//! ```text
//! Application ──dispatch──► channel ──► dispatch loop ──► middleware ──► SyncState::on_event
//!                                           ▲                                   │
//!                                           │                                actions
//!                                           │                                   ▼
//!                       WorkResponse / RetryTimerFired ◄── handler task / retry timer
//! ```
//!
//! Every event, whether it comes from the application, a finished handler
//! call or an elapsed retry timer, goes through the same unbounded channel
//! and is applied by a single task. The state machine therefore never sees
//! two events at once, and at most one operation is ever in flight.
//!
//! The latest state is published on a [`watch`] channel after each step.

use std::sync::Arc;

use cloudsync_core::{
    AccountStatus, Action, FailureKind, RetryPolicy, SyncEvent, SyncState, WorkFailure,
};
use cloudsync_types::{ChangeToken, Record, RecordId, ZoneId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::classify::classify;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::handler::{perform, OperationHandler};
use crate::middleware::{LoggingMiddleware, Middleware, Pipeline};

type RecordsModifiedFn = Box<dyn Fn(&[Record], &[RecordId]) + Send + Sync>;
type RecordsFetchedFn = Box<dyn Fn(&[Record], &[RecordId], Option<&ChangeToken>) + Send + Sync>;
type ZoneCreatedFn = Box<dyn Fn(&ZoneId, bool) + Send + Sync>;

/// Messages consumed by the dispatch loop.
enum Input {
    Event(SyncEvent),
    Shutdown,
}

/// Application callbacks fired by notify actions.
#[derive(Default)]
struct Callbacks {
    records_modified: Option<RecordsModifiedFn>,
    records_fetched: Option<RecordsFetchedFn>,
    zone_created: Option<ZoneCreatedFn>,
}

/// A running sync session.
///
/// Created with [`SyncSession::builder`]. All methods are non-blocking:
/// events are queued and applied in order by the session's dispatch task.
///
/// Dropping the session stops the dispatch task. Handler calls already in
/// flight run to completion but their results are discarded.
pub struct SyncSession<H> {
    handler: Arc<H>,
    input: mpsc::UnboundedSender<Input>,
    state: watch::Receiver<SyncState>,
    task: Option<JoinHandle<()>>,
}

impl<H: OperationHandler> SyncSession<H> {
    /// Start configuring a session around `handler`.
    pub fn builder(handler: H) -> SessionBuilder<H> {
        SessionBuilder::new(handler)
    }

    /// Queue an event for the state machine.
    pub fn dispatch(&self, event: SyncEvent) -> Result<(), SessionError> {
        self.input
            .send(Input::Event(event))
            .map_err(|_| SessionError::Closed)
    }

    /// Queue records to save and delete.
    pub fn modify(
        &self,
        records: Vec<Record>,
        record_ids_to_delete: Vec<RecordId>,
    ) -> Result<(), SessionError> {
        self.dispatch(SyncEvent::Modify {
            records,
            record_ids_to_delete,
        })
    }

    /// Ask for remote changes since the stored change token.
    pub fn fetch(&self) -> Result<(), SessionError> {
        self.dispatch(SyncEvent::FetchRequested)
    }

    /// Ask for a zone to be created.
    pub fn create_zone(&self, zone_id: ZoneId) -> Result<(), SessionError> {
        self.dispatch(SyncEvent::CreateZoneRequested { zone_id })
    }

    /// Report a change in account availability.
    pub fn set_account_status(&self, status: AccountStatus) -> Result<(), SessionError> {
        self.dispatch(SyncEvent::AccountStatusChanged(status))
    }

    /// Stop issuing work until the account is reported available again.
    pub fn halt(&self, reason: impl Into<String>) -> Result<(), SessionError> {
        self.dispatch(SyncEvent::HaltRequested {
            reason: reason.into(),
        })
    }

    /// Snapshot of the latest state.
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Receive every state the session publishes from now on.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Wait until the published state satisfies `predicate`.
    ///
    /// The current state is checked first, so this returns immediately if it
    /// already matches.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SyncState) -> bool,
    ) -> Result<SyncState, SessionError> {
        let mut state = self.state.clone();
        let matched = state
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(matched.clone())
    }

    /// The operation handler this session calls.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Stop the dispatch loop and wait for it to exit.
    ///
    /// Events queued before the call are still applied. Afterwards every
    /// dispatch returns [`SessionError::Closed`].
    pub async fn shutdown(&mut self) {
        let _ = self.input.send(Input::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Sync session task failed: {}", e);
            }
        }
    }
}

impl<H> Drop for SyncSession<H> {
    fn drop(&mut self) {
        let _ = self.input.send(Input::Shutdown);
    }
}

impl<H> std::fmt::Debug for SyncSession<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Builder for [`SyncSession`].
pub struct SessionBuilder<H> {
    handler: H,
    config: SessionConfig,
    initial_state: SyncState,
    middleware: Vec<Box<dyn Middleware>>,
    callbacks: Callbacks,
}

impl<H: OperationHandler> SessionBuilder<H> {
    fn new(handler: H) -> Self {
        Self {
            handler,
            config: SessionConfig::default(),
            initial_state: SyncState::new(),
            middleware: Vec::new(),
            callbacks: Callbacks::default(),
        }
    }

    /// Use `config` for retry limits, split depth and event logging.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from a previously persisted state instead of a fresh halted one.
    ///
    /// Work the state records as in flight or waiting on a retry goes back to
    /// the front of the queue. If the state is not halted, its pending work
    /// starts as soon as the session is built.
    pub fn initial_state(mut self, state: SyncState) -> Self {
        self.initial_state = state;
        self
    }

    /// Append a middleware. Middleware run in the order they are added.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    /// Called with the records the remote store saved and deleted.
    pub fn on_records_modified<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Record], &[RecordId]) + Send + Sync + 'static,
    {
        self.callbacks.records_modified = Some(Box::new(f));
        self
    }

    /// Called with each page of remote changes and the token to persist.
    pub fn on_records_fetched<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Record], &[RecordId], Option<&ChangeToken>) + Send + Sync + 'static,
    {
        self.callbacks.records_fetched = Some(Box::new(f));
        self
    }

    /// Called when a zone creation finishes.
    pub fn on_zone_created<F>(mut self, f: F) -> Self
    where
        F: Fn(&ZoneId, bool) + Send + Sync + 'static,
    {
        self.callbacks.zone_created = Some(Box::new(f));
        self
    }

    /// Spawn the dispatch loop and return the session.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> SyncSession<H> {
        let mut pipeline = Pipeline::new();
        if self.config.logging.log_events {
            pipeline.push(Box::new(LoggingMiddleware));
        }
        for middleware in self.middleware {
            pipeline.push(middleware);
        }

        let initial_state = self.initial_state.recovered();
        let handler = Arc::new(self.handler);
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial_state.clone());

        tracing::info!(
            "Starting sync session (halted: {}, pending: {})",
            initial_state.is_halted(),
            initial_state.pending_work().len()
        );

        let dispatcher = Dispatcher {
            handler: Arc::clone(&handler),
            policy: self.config.retry_policy(),
            pipeline,
            callbacks: self.callbacks,
            state: initial_state,
            published: state_tx,
            feedback: input_tx.clone(),
            retry_timer: None,
        };
        let task = tokio::spawn(dispatcher.run(input_rx));

        SyncSession {
            handler,
            input: input_tx,
            state: state_rx,
            task: Some(task),
        }
    }
}

/// Owns the state and applies events one at a time.
struct Dispatcher<H> {
    handler: Arc<H>,
    policy: RetryPolicy,
    pipeline: Pipeline,
    callbacks: Callbacks,
    state: SyncState,
    published: watch::Sender<SyncState>,
    feedback: mpsc::UnboundedSender<Input>,
    retry_timer: Option<JoinHandle<()>>,
}

impl<H: OperationHandler> Dispatcher<H> {
    async fn run(mut self, mut input: mpsc::UnboundedReceiver<Input>) {
        if !self.state.is_halted() {
            // Restored running state: start its pending work
            self.apply(SyncEvent::AccountStatusChanged(AccountStatus::Available));
        }

        while let Some(message) = input.recv().await {
            match message {
                Input::Event(event) => {
                    if let Some(event) = self.pipeline.run(event) {
                        self.apply(event);
                    }
                }
                Input::Shutdown => break,
            }
        }

        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
        tracing::info!("Sync session stopped");
    }

    /// Run one reducer step, publish the new state, then perform its actions.
    fn apply(&mut self, event: SyncEvent) {
        let state = std::mem::take(&mut self.state);
        let was_halted = state.is_halted();
        let (state, actions) = state.on_event(event, &self.policy);

        match (was_halted, state.is_halted()) {
            (false, true) => tracing::warn!(
                "Sync session halted with {} pending work(s)",
                state.pending_work().len()
            ),
            (true, false) => tracing::info!("Sync session resumed"),
            _ => {}
        }

        self.state = state;
        self.published.send_replace(self.state.clone());

        for action in actions {
            self.execute(action);
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::Execute(work) => {
                tracing::debug!("Executing {}", work.description());
                let handler = Arc::clone(&self.handler);
                let feedback = self.feedback.clone();
                tokio::spawn(async move {
                    let call = {
                        let work = work.clone();
                        tokio::spawn(async move { perform(handler.as_ref(), &work).await })
                    };
                    let result = match call.await {
                        Ok(Ok(result)) => Ok(result),
                        Ok(Err(error)) => {
                            tracing::warn!("{} failed: {}", work.description(), error);
                            Err(classify(&error))
                        }
                        Err(e) => {
                            tracing::error!("Operation handler panicked: {}", e);
                            Err(WorkFailure::new(
                                FailureKind::NonRetryable,
                                format!("operation handler panicked: {}", e),
                            ))
                        }
                    };
                    // The session may have shut down meanwhile
                    let _ = feedback.send(Input::Event(SyncEvent::WorkResponse { work, result }));
                });
            }

            Action::ScheduleRetry { work, delay } => {
                tracing::info!("Retrying {} in {:?}", work.description(), delay);
                if let Some(timer) = self.retry_timer.take() {
                    timer.abort();
                }
                let feedback = self.feedback.clone();
                self.retry_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = feedback.send(Input::Event(SyncEvent::RetryTimerFired { work }));
                }));
            }

            Action::NotifyRecordsModified { saved, deleted } => {
                tracing::debug!(
                    "Records modified: {} saved, {} deleted",
                    saved.len(),
                    deleted.len()
                );
                if let Some(callback) = &self.callbacks.records_modified {
                    callback(&saved, &deleted);
                }
            }

            Action::NotifyRecordsFetched {
                changed,
                deleted,
                change_token,
            } => {
                tracing::debug!(
                    "Records fetched: {} changed, {} deleted",
                    changed.len(),
                    deleted.len()
                );
                if let Some(callback) = &self.callbacks.records_fetched {
                    callback(&changed, &deleted, change_token.as_ref());
                }
            }

            Action::NotifyZoneCreated { zone_id, created } => {
                tracing::debug!("Zone {} created: {}", zone_id, created);
                if let Some(callback) = &self.callbacks.zone_created {
                    callback(&zone_id, created);
                }
            }
        }
    }
}
