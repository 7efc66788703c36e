//! In-memory remote record store used by `cloudsync simulate`.
//!
//! Behaves like a small hosted record store: zones must exist before records
//! are written to them, batches above a size limit are rejected, and changes
//! are served back as a paged log addressed by change tokens. A configurable
//! number of calls fail transiently before the store starts answering.

use async_trait::async_trait;
use cloudsync_core::{CreateZoneWork, FetchResponse, FetchWork, ModifyResponse, ModifyWork};
use cloudsync_session::OperationHandler;
use cloudsync_types::{ChangeToken, Record, RecordId, RemoteError, ZoneId};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// One entry of the change log.
#[derive(Debug, Clone)]
enum Change {
    Saved(Record),
    Deleted(RecordId),
}

/// Call counters, reported in the simulation summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteStats {
    /// Every call the store received.
    pub calls: usize,
    /// Calls failed with a transient error.
    pub transient_failures: usize,
    /// Modify calls rejected for exceeding the batch limit.
    pub rejected_batches: usize,
}

#[derive(Debug, Default)]
struct Inner {
    zones: HashSet<ZoneId>,
    records: HashMap<RecordId, Record>,
    log: Vec<Change>,
    transient_remaining: usize,
    stats: RemoteStats,
}

/// A simulated remote store.
#[derive(Debug)]
pub struct InMemoryRemote {
    batch_limit: usize,
    authenticated: bool,
    inner: Mutex<Inner>,
}

impl InMemoryRemote {
    /// Create a store that accepts batches of at most `batch_limit` records
    /// and fails the first `transient_failures` calls.
    pub fn new(batch_limit: usize, transient_failures: usize) -> Self {
        Self {
            batch_limit: batch_limit.max(1),
            authenticated: true,
            inner: Mutex::new(Inner {
                transient_remaining: transient_failures,
                ..Default::default()
            }),
        }
    }

    /// Reject every call as if no account were signed in.
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// Number of records currently stored.
    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    /// Call counters so far.
    pub fn stats(&self) -> RemoteStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Common checks every call goes through.
    fn admit(&self, inner: &mut Inner) -> Result<(), RemoteError> {
        inner.stats.calls += 1;
        if !self.authenticated {
            return Err(RemoteError::NotAuthenticated);
        }
        if inner.transient_remaining > 0 {
            inner.transient_remaining -= 1;
            inner.stats.transient_failures += 1;
            return Err(RemoteError::NetworkFailure("simulated timeout".to_string()));
        }
        Ok(())
    }
}

fn encode_position(position: usize) -> ChangeToken {
    ChangeToken::from_bytes(&(position as u64).to_be_bytes())
}

fn decode_position(token: &ChangeToken) -> Result<usize, RemoteError> {
    let bytes: [u8; 8] = token
        .as_bytes()
        .try_into()
        .map_err(|_| RemoteError::InvalidArguments("malformed change token".to_string()))?;
    usize::try_from(u64::from_be_bytes(bytes))
        .map_err(|_| RemoteError::InvalidArguments("change token out of range".to_string()))
}

#[async_trait]
impl OperationHandler for InMemoryRemote {
    async fn modify(&self, work: &ModifyWork) -> Result<ModifyResponse, RemoteError> {
        let mut inner = self.lock();
        self.admit(&mut inner)?;

        if work.len() > self.batch_limit {
            inner.stats.rejected_batches += 1;
            return Err(RemoteError::LimitExceeded);
        }

        let zones = work
            .records_to_save
            .iter()
            .map(Record::zone)
            .chain(work.record_ids_to_delete.iter().map(RecordId::zone));
        for zone in zones {
            if !inner.zones.contains(zone) {
                return Err(RemoteError::ZoneNotFound);
            }
        }

        for record in &work.records_to_save {
            inner.records.insert(record.id.clone(), record.clone());
            inner.log.push(Change::Saved(record.clone()));
        }
        for id in &work.record_ids_to_delete {
            inner.records.remove(id);
            inner.log.push(Change::Deleted(id.clone()));
        }

        Ok(ModifyResponse {
            saved_records: work.records_to_save.clone(),
            deleted_record_ids: work.record_ids_to_delete.clone(),
        })
    }

    async fn fetch(&self, work: &FetchWork) -> Result<FetchResponse, RemoteError> {
        let mut inner = self.lock();
        self.admit(&mut inner)?;

        let start = match &work.change_token {
            Some(token) => decode_position(token)?.min(inner.log.len()),
            None => 0,
        };
        let end = (start + self.batch_limit).min(inner.log.len());

        let mut response = FetchResponse {
            change_token: Some(encode_position(end)),
            has_more: end < inner.log.len(),
            ..Default::default()
        };
        for change in &inner.log[start..end] {
            match change {
                Change::Saved(record) => response.changed_records.push(record.clone()),
                Change::Deleted(id) => response.deleted_record_ids.push(id.clone()),
            }
        }
        Ok(response)
    }

    async fn create_zone(&self, work: &CreateZoneWork) -> Result<bool, RemoteError> {
        let mut inner = self.lock();
        self.admit(&mut inner)?;
        Ok(inner.zones.insert(work.zone_id.clone()))
    }
}
