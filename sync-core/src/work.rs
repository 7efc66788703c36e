//! Units of remote work.
//!
//! A [`SyncWork`] is one remote operation the session wants performed:
//! saving/deleting records, fetching changes, or creating a zone. Each
//! carries its own retry count. Modify work can additionally be split in
//! half when the remote store rejects it as too large.

use cloudsync_types::{ChangeToken, Record, RecordId, ZoneId};
use serde::{Deserialize, Serialize};

/// One remote operation tracked by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncWork {
    /// Save and/or delete a batch of records.
    Modify(ModifyWork),
    /// Fetch records changed since a change token.
    Fetch(FetchWork),
    /// Create a zone.
    CreateZone(CreateZoneWork),
}

impl SyncWork {
    /// Number of times this work has been retried after a transient failure.
    pub fn retry_count(&self) -> u32 {
        match self {
            Self::Modify(work) => work.retry_count,
            Self::Fetch(work) => work.retry_count,
            Self::CreateZone(work) => work.retry_count,
        }
    }

    /// Return a copy with the retry count incremented by one.
    pub fn retried(&self) -> Self {
        let mut work = self.clone();
        match &mut work {
            Self::Modify(w) => w.retry_count = w.retry_count.saturating_add(1),
            Self::Fetch(w) => w.retry_count = w.retry_count.saturating_add(1),
            Self::CreateZone(w) => w.retry_count = w.retry_count.saturating_add(1),
        }
        work
    }

    /// Check whether `other` is the same logical operation, ignoring retry history.
    ///
    /// Used to match a handler response or a retry timer back to the work
    /// that produced it.
    pub fn is_same_operation(&self, other: &SyncWork) -> bool {
        match (self, other) {
            (Self::Modify(a), Self::Modify(b)) => {
                a.split_depth == b.split_depth
                    && a.records_to_save == b.records_to_save
                    && a.record_ids_to_delete == b.record_ids_to_delete
            }
            (Self::Fetch(a), Self::Fetch(b)) => a.change_token == b.change_token,
            (Self::CreateZone(a), Self::CreateZone(b)) => a.zone_id == b.zone_id,
            _ => false,
        }
    }

    /// Check if this is fetch work.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// Human-readable summary for logs.
    pub fn description(&self) -> String {
        match self {
            Self::Modify(work) => format!(
                "modify with {} records to save and {} to delete",
                work.records_to_save.len(),
                work.record_ids_to_delete.len()
            ),
            Self::Fetch(_) => "fetch".to_string(),
            Self::CreateZone(work) => format!("create zone {}", work.zone_id),
        }
    }
}

/// Save and/or delete a batch of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyWork {
    /// Records to save, in order.
    pub records_to_save: Vec<Record>,
    /// Records to delete, in order.
    pub record_ids_to_delete: Vec<RecordId>,
    /// Retries consumed so far.
    pub retry_count: u32,
    /// How many times this batch's ancestors were halved (0 = created by the user).
    pub split_depth: u32,
}

impl ModifyWork {
    /// Create a fresh modify batch.
    pub fn new(records_to_save: Vec<Record>, record_ids_to_delete: Vec<RecordId>) -> Self {
        Self {
            records_to_save,
            record_ids_to_delete,
            retry_count: 0,
            split_depth: 0,
        }
    }

    /// Total number of saves plus deletions.
    pub fn len(&self) -> usize {
        self.records_to_save.len() + self.record_ids_to_delete.len()
    }

    /// Check if the batch saves and deletes nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into two halves by index.
    ///
    /// Saves and deletions are halved independently at `len / 2`, so the
    /// first half gets the smaller share when the length is odd. Order is
    /// preserved and either half may come out empty. Both halves start with
    /// a zero retry count.
    pub fn split(&self) -> (ModifyWork, ModifyWork) {
        let (first_records, second_records) = halve(&self.records_to_save);
        let (first_ids, second_ids) = halve(&self.record_ids_to_delete);
        let split_depth = self.split_depth.saturating_add(1);

        (
            ModifyWork {
                records_to_save: first_records,
                record_ids_to_delete: first_ids,
                retry_count: 0,
                split_depth,
            },
            ModifyWork {
                records_to_save: second_records,
                record_ids_to_delete: second_ids,
                retry_count: 0,
                split_depth,
            },
        )
    }
}

fn halve<T: Clone>(items: &[T]) -> (Vec<T>, Vec<T>) {
    let (first, second) = items.split_at(items.len() / 2);
    (first.to_vec(), second.to_vec())
}

/// Fetch records changed since a change token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWork {
    /// Token from the previous fetch, `None` to fetch everything.
    pub change_token: Option<ChangeToken>,
    /// Retries consumed so far.
    pub retry_count: u32,
}

impl FetchWork {
    /// Create a fetch starting at the given token.
    pub fn new(change_token: Option<ChangeToken>) -> Self {
        Self {
            change_token,
            retry_count: 0,
        }
    }
}

/// Create a zone in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateZoneWork {
    /// The zone to create.
    pub zone_id: ZoneId,
    /// Retries consumed so far.
    pub retry_count: u32,
}

impl CreateZoneWork {
    /// Create zone-creation work.
    pub fn new(zone_id: ZoneId) -> Self {
        Self {
            zone_id,
            retry_count: 0,
        }
    }
}

/// Successful outcome of a [`SyncWork`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkResult {
    /// Outcome of a modify.
    Modify(ModifyResponse),
    /// One page of fetched changes.
    Fetch(FetchResponse),
    /// Whether the zone was created.
    CreateZone(bool),
}

/// Records the remote store confirmed as saved and deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyResponse {
    /// Records saved, as returned by the server.
    pub saved_records: Vec<Record>,
    /// Record identifiers deleted.
    pub deleted_record_ids: Vec<RecordId>,
}

/// One page of changes from a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    /// Token to resume from after this page.
    pub change_token: Option<ChangeToken>,
    /// Records created or changed.
    pub changed_records: Vec<Record>,
    /// Records deleted.
    pub deleted_record_ids: Vec<RecordId>,
    /// True if another page is available.
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> ZoneId {
        ZoneId::new("Notes")
    }

    fn record(name: &str) -> Record {
        Record::new(RecordId::with_name(zone(), name), "Note", vec![])
    }

    fn records(count: usize) -> Vec<Record> {
        (1..=count).map(|i| record(&format!("r{}", i))).collect()
    }

    fn ids(count: usize) -> Vec<RecordId> {
        (1..=count)
            .map(|i| RecordId::with_name(zone(), &format!("d{}", i)))
            .collect()
    }

    // ===========================================
    // Retry Tests
    // ===========================================

    #[test]
    fn new_work_has_zero_retries() {
        assert_eq!(SyncWork::Modify(ModifyWork::new(records(1), vec![])).retry_count(), 0);
        assert_eq!(SyncWork::Fetch(FetchWork::new(None)).retry_count(), 0);
        assert_eq!(SyncWork::CreateZone(CreateZoneWork::new(zone())).retry_count(), 0);
    }

    #[test]
    fn retried_increments_every_kind() {
        let works = vec![
            SyncWork::Modify(ModifyWork::new(records(2), ids(1))),
            SyncWork::Fetch(FetchWork::new(Some(ChangeToken::from_bytes(b"t")))),
            SyncWork::CreateZone(CreateZoneWork::new(zone())),
        ];

        for work in works {
            let once = work.retried();
            let twice = once.retried();
            assert_eq!(once.retry_count(), 1);
            assert_eq!(twice.retry_count(), 2);
            // Original is untouched
            assert_eq!(work.retry_count(), 0);
        }
    }

    #[test]
    fn retried_saturates_instead_of_wrapping() {
        let mut fetch = FetchWork::new(None);
        fetch.retry_count = u32::MAX;
        let work = SyncWork::Fetch(fetch).retried();
        assert_eq!(work.retry_count(), u32::MAX);
    }

    // ===========================================
    // Identity Tests
    // ===========================================

    #[test]
    fn same_operation_ignores_retry_count() {
        let work = SyncWork::Modify(ModifyWork::new(records(3), ids(1)));
        let retried = work.retried().retried();

        assert_ne!(work, retried);
        assert!(work.is_same_operation(&retried));
        assert!(retried.is_same_operation(&work));
    }

    #[test]
    fn different_content_is_different_operation() {
        let a = SyncWork::Modify(ModifyWork::new(records(3), vec![]));
        let b = SyncWork::Modify(ModifyWork::new(records(2), vec![]));
        assert!(!a.is_same_operation(&b));

        let t1 = SyncWork::Fetch(FetchWork::new(None));
        let t2 = SyncWork::Fetch(FetchWork::new(Some(ChangeToken::from_bytes(b"x"))));
        assert!(!t1.is_same_operation(&t2));
    }

    #[test]
    fn different_kinds_never_match() {
        let fetch = SyncWork::Fetch(FetchWork::new(None));
        let zone_work = SyncWork::CreateZone(CreateZoneWork::new(zone()));
        assert!(!fetch.is_same_operation(&zone_work));
    }

    #[test]
    fn split_children_are_distinct_from_parent() {
        let parent = ModifyWork::new(records(2), vec![]);
        let (first, _) = parent.split();
        assert_eq!(first.split_depth, 1);

        // Same content at a different depth is a different operation
        let mut same_content = parent.clone();
        same_content.split_depth = 1;
        assert!(!SyncWork::Modify(parent).is_same_operation(&SyncWork::Modify(same_content)));
    }

    // ===========================================
    // Split Tests
    // ===========================================

    #[test]
    fn split_ten_records_evenly() {
        let original = records(10);
        let work = ModifyWork::new(original.clone(), vec![]);

        let (first, second) = work.split();

        assert_eq!(first.records_to_save.len(), 5);
        assert_eq!(second.records_to_save.len(), 5);
        assert_eq!(first.retry_count, 0);
        assert_eq!(second.retry_count, 0);

        let rejoined: Vec<Record> = first
            .records_to_save
            .into_iter()
            .chain(second.records_to_save)
            .collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn split_odd_length_gives_first_half_the_smaller_share() {
        let work = ModifyWork::new(records(5), ids(3));

        let (first, second) = work.split();

        assert_eq!(first.records_to_save.len(), 2);
        assert_eq!(second.records_to_save.len(), 3);
        assert_eq!(first.record_ids_to_delete.len(), 1);
        assert_eq!(second.record_ids_to_delete.len(), 2);
        assert_eq!(first.record_ids_to_delete, ids(3)[..1].to_vec());
        assert_eq!(second.record_ids_to_delete, ids(3)[1..].to_vec());
    }

    #[test]
    fn split_with_empty_side_produces_empty_halves() {
        let work = ModifyWork::new(vec![], ids(4));

        let (first, second) = work.split();

        assert!(first.records_to_save.is_empty());
        assert!(second.records_to_save.is_empty());
        assert_eq!(first.record_ids_to_delete.len(), 2);
        assert_eq!(second.record_ids_to_delete.len(), 2);
    }

    #[test]
    fn split_single_record_leaves_first_half_empty() {
        let work = ModifyWork::new(records(1), vec![]);

        let (first, second) = work.split();

        assert!(first.is_empty());
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn split_resets_retries_and_deepens() {
        let mut work = ModifyWork::new(records(4), vec![]);
        work.retry_count = 2;
        work.split_depth = 3;

        let (first, second) = work.split();

        assert_eq!(first.retry_count, 0);
        assert_eq!(second.retry_count, 0);
        assert_eq!(first.split_depth, 4);
        assert_eq!(second.split_depth, 4);
    }

    // ===========================================
    // Description Tests
    // ===========================================

    #[test]
    fn description_counts_modify_contents() {
        let work = SyncWork::Modify(ModifyWork::new(records(3), ids(1)));
        assert_eq!(
            work.description(),
            "modify with 3 records to save and 1 to delete"
        );
        assert_eq!(SyncWork::Fetch(FetchWork::new(None)).description(), "fetch");
    }

    #[test]
    fn work_serde_roundtrip() {
        let work = SyncWork::Modify(ModifyWork::new(records(2), ids(1))).retried();
        let json = serde_json::to_string(&work).unwrap();
        let restored: SyncWork = serde_json::from_str(&json).unwrap();
        assert_eq!(work, restored);
    }
}
