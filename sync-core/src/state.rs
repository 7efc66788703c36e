//! Session state machine for cloudsync.
//!
//! This module provides a pure, side-effect-free reducer for the sync
//! session. It takes events as input and produces a new state plus a list
//! of actions to execute.
//!
//! The actual I/O (calling the operation handler, arming retry timers) is
//! performed by sync-session, not by this module.
//!
//! # Invariants
//!
//! - At most one work is in flight: an [`Action::Execute`] is only emitted
//!   when `current_work` was empty, and never more than one per step.
//! - While halted, no work is started or retried. Only
//!   `AccountStatusChanged(Available)` and the response of the work that was
//!   already in flight have any effect.
//! - Work in flight when the session halts stays in `current_work` until its
//!   response arrives, so resuming never starts a second call next to it.
//! - Work is never dropped by a halt. Failed work goes back to the front of
//!   the queue, so resuming preserves the original FIFO order.

use std::collections::VecDeque;
use std::time::Duration;

use cloudsync_types::{ChangeToken, Record, RecordId, ZoneId};
use serde::{Deserialize, Serialize};

use crate::event::{AccountStatus, FailureKind, SyncEvent, WorkFailure};
use crate::policy::RetryPolicy;
use crate::work::{
    CreateZoneWork, FetchResponse, FetchWork, ModifyResponse, ModifyWork, SyncWork, WorkResult,
};

/// Session state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    is_halted: bool,
    current_work: Option<SyncWork>,
    pending_work: VecDeque<SyncWork>,
    change_token: Option<ChangeToken>,
    retry_scheduled: bool,
}

impl SyncState {
    /// Create a halted state that waits for the account to become available.
    pub fn new() -> Self {
        Self::with_halted(true)
    }

    /// Create an idle state, halted or not.
    pub fn with_halted(is_halted: bool) -> Self {
        Self {
            is_halted,
            current_work: None,
            pending_work: VecDeque::new(),
            change_token: None,
            retry_scheduled: false,
        }
    }

    /// Start from a previously persisted change token.
    pub fn with_change_token(mut self, token: ChangeToken) -> Self {
        self.change_token = Some(token);
        self
    }

    /// Start with previously persisted work already queued.
    pub fn with_pending_work(mut self, work: impl IntoIterator<Item = SyncWork>) -> Self {
        self.pending_work.extend(work);
        self
    }

    /// Prepare a persisted state for a new session.
    ///
    /// Work recorded as in flight, or waiting on a retry timer, belonged to a
    /// session that no longer exists. It goes back to the front of the queue.
    pub fn recovered(mut self) -> Self {
        if let Some(current) = self.current_work.take() {
            self.pending_work.push_front(current);
        }
        self.retry_scheduled = false;
        self
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-session)
    /// is responsible for executing the returned actions.
    pub fn on_event(mut self, event: SyncEvent, policy: &RetryPolicy) -> (Self, Vec<Action>) {
        let mut actions = Vec::new();

        if self.is_halted {
            match event {
                SyncEvent::AccountStatusChanged(AccountStatus::Available) => {
                    self.is_halted = false;
                    self.retry_scheduled = false;
                    actions.extend(self.promote());
                }
                // The call started before the halt still has to settle
                SyncEvent::WorkResponse { work, result } => {
                    if let Some(current) = self.take_in_flight(&work) {
                        match result {
                            Ok(result) => self.on_success(current, result, &mut actions),
                            Err(_) => self.pending_work.push_front(current),
                        }
                    }
                }
                _ => {}
            }
            return (self, actions);
        }

        match event {
            SyncEvent::Modify {
                records,
                record_ids_to_delete,
            } => {
                let work = ModifyWork::new(records, record_ids_to_delete);
                if !work.is_empty() {
                    self.pending_work.push_back(SyncWork::Modify(work));
                }
                actions.extend(self.promote());
            }

            SyncEvent::FetchRequested => {
                // A fetch already waiting will pick up every change anyway
                if !self.pending_work.iter().any(SyncWork::is_fetch) {
                    let work = FetchWork::new(self.change_token.clone());
                    self.pending_work.push_back(SyncWork::Fetch(work));
                }
                actions.extend(self.promote());
            }

            SyncEvent::CreateZoneRequested { zone_id } => {
                let work = CreateZoneWork::new(zone_id);
                self.pending_work.push_back(SyncWork::CreateZone(work));
                actions.extend(self.promote());
            }

            SyncEvent::AccountStatusChanged(AccountStatus::Available) => {
                actions.extend(self.promote());
            }

            SyncEvent::AccountStatusChanged(_) | SyncEvent::HaltRequested { .. } => {
                self.halt();
            }

            SyncEvent::WorkResponse { work, result } => {
                // Stale responses for work no longer in flight are ignored
                let Some(current) = self.take_in_flight(&work) else {
                    return (self, actions);
                };

                match result {
                    Ok(result) => self.on_success(current, result, &mut actions),
                    Err(failure) => self.on_failure(current, failure, policy, &mut actions),
                }
            }

            SyncEvent::RetryTimerFired { work } => {
                let due = self.retry_scheduled
                    && self
                        .pending_work
                        .front()
                        .is_some_and(|head| head.is_same_operation(&work));
                if due {
                    self.retry_scheduled = false;
                    actions.extend(self.promote());
                }
            }
        }

        (self, actions)
    }

    fn on_success(&mut self, current: SyncWork, result: WorkResult, actions: &mut Vec<Action>) {
        match (current, result) {
            (SyncWork::Modify(_), WorkResult::Modify(response)) => {
                let ModifyResponse {
                    saved_records,
                    deleted_record_ids,
                } = response;
                actions.push(Action::NotifyRecordsModified {
                    saved: saved_records,
                    deleted: deleted_record_ids,
                });
            }
            (SyncWork::Fetch(_), WorkResult::Fetch(response)) => {
                let FetchResponse {
                    change_token,
                    changed_records,
                    deleted_record_ids,
                    has_more,
                } = response;

                if let Some(token) = change_token {
                    self.store_change_token(token);
                }
                if has_more {
                    let continuation = FetchWork::new(self.change_token.clone());
                    self.pending_work.push_front(SyncWork::Fetch(continuation));
                }

                actions.push(Action::NotifyRecordsFetched {
                    changed: changed_records,
                    deleted: deleted_record_ids,
                    change_token: self.change_token.clone(),
                });
            }
            (SyncWork::CreateZone(work), WorkResult::CreateZone(created)) => {
                actions.push(Action::NotifyZoneCreated {
                    zone_id: work.zone_id,
                    created,
                });
            }
            (current, _) => {
                // Handler answered with the wrong result kind
                self.halt_with(current);
                return;
            }
        }

        actions.extend(self.promote());
    }

    fn on_failure(
        &mut self,
        current: SyncWork,
        failure: WorkFailure,
        policy: &RetryPolicy,
        actions: &mut Vec<Action>,
    ) {
        match (failure.kind, current) {
            (FailureKind::PayloadTooLarge, SyncWork::Modify(work))
                if work.len() > 1 && work.split_depth < policy.max_split_depth =>
            {
                let (first, second) = work.split();
                if first.is_empty() || second.is_empty() {
                    // Splitting would resend the same payload
                    self.halt_with(SyncWork::Modify(work));
                    return;
                }
                self.pending_work.push_front(SyncWork::Modify(second));
                self.pending_work.push_front(SyncWork::Modify(first));
                actions.extend(self.promote());
            }
            (FailureKind::RetryableTransient, current)
                if current.retry_count() < policy.max_retries =>
            {
                let delay = policy.retry_delay(current.retry_count(), failure.retry_after);
                let retried = current.retried();
                self.pending_work.push_front(retried.clone());
                self.retry_scheduled = true;
                actions.push(Action::ScheduleRetry {
                    work: retried,
                    delay,
                });
            }
            (_, current) => self.halt_with(current),
        }
    }

    /// Move the queue head into `current_work` if nothing is running.
    fn promote(&mut self) -> Option<Action> {
        if self.is_halted || self.current_work.is_some() || self.retry_scheduled {
            return None;
        }
        let work = self.pending_work.pop_front()?;
        self.current_work = Some(work.clone());
        Some(Action::Execute(work))
    }

    /// Take `current_work` if `work` is the same operation.
    fn take_in_flight(&mut self, work: &SyncWork) -> Option<SyncWork> {
        let matches = self
            .current_work
            .as_ref()
            .is_some_and(|current| current.is_same_operation(work));
        if matches {
            self.current_work.take()
        } else {
            None
        }
    }

    /// In-flight work stays in `current_work` until its response arrives.
    fn halt(&mut self) {
        self.retry_scheduled = false;
        self.is_halted = true;
    }

    fn halt_with(&mut self, unresolved: SyncWork) {
        self.pending_work.push_front(unresolved);
        self.halt();
    }

    fn store_change_token(&mut self, token: ChangeToken) {
        for work in self.pending_work.iter_mut() {
            if let SyncWork::Fetch(fetch) = work {
                fetch.change_token = Some(token.clone());
            }
        }
        self.change_token = Some(token);
    }

    /// Check if the session refuses to issue work.
    pub fn is_halted(&self) -> bool {
        self.is_halted
    }

    /// The work currently handed to the operation handler, if any.
    pub fn current_work(&self) -> Option<&SyncWork> {
        self.current_work.as_ref()
    }

    /// Work waiting to run, in execution order.
    pub fn pending_work(&self) -> &VecDeque<SyncWork> {
        &self.pending_work
    }

    /// Token the next fetch will start from.
    pub fn change_token(&self) -> Option<&ChangeToken> {
        self.change_token.as_ref()
    }

    /// Check if the queue head is waiting for its retry timer.
    pub fn is_retry_scheduled(&self) -> bool {
        self.retry_scheduled
    }

    /// Check if nothing is running, waiting or halted.
    pub fn is_idle(&self) -> bool {
        !self.is_halted && self.current_work.is_none() && !self.retry_scheduled
    }

    /// Check if a work is in flight.
    pub fn is_running(&self) -> bool {
        self.current_work.is_some()
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// Actions to be executed by the session.
///
/// These are instructions, not side effects. The session interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Hand a work to the operation handler.
    Execute(SyncWork),
    /// Dispatch `RetryTimerFired` for this work after a delay.
    ScheduleRetry {
        /// The retried work, already at the head of the queue.
        work: SyncWork,
        /// Backoff before the retry.
        delay: Duration,
    },
    /// Tell the application which records the remote store saved and deleted.
    NotifyRecordsModified {
        /// Records saved.
        saved: Vec<Record>,
        /// Records deleted.
        deleted: Vec<RecordId>,
    },
    /// Hand a page of remote changes to the application.
    NotifyRecordsFetched {
        /// Records created or changed remotely.
        changed: Vec<Record>,
        /// Records deleted remotely.
        deleted: Vec<RecordId>,
        /// Token to persist for the next fetch.
        change_token: Option<ChangeToken>,
    },
    /// Tell the application a zone creation finished.
    NotifyZoneCreated {
        /// The zone.
        zone_id: ZoneId,
        /// Whether the server created it.
        created: bool,
    },
}

impl Action {
    /// Check if this action invokes the operation handler.
    pub fn is_execute(&self) -> bool {
        matches!(self, Self::Execute(_))
    }
}
