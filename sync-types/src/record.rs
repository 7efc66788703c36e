//! Remote record payload.

use serde::{Deserialize, Serialize};

use crate::{RecordId, ZoneId};

/// A record stored in the remote store.
///
/// The session never inspects the payload; it only moves records between
/// the application and the operation handler.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identity of the record.
    pub id: RecordId,
    /// Application-defined record type (e.g. "Note").
    pub record_type: String,
    /// Encoded field values, opaque to the session.
    pub payload: Vec<u8>,
}

impl Record {
    /// Create a record.
    pub fn new(id: RecordId, record_type: &str, payload: Vec<u8>) -> Self {
        Self {
            id,
            record_type: record_type.to_string(),
            payload,
        }
    }

    /// The zone the record belongs to.
    pub fn zone(&self) -> &ZoneId {
        self.id.zone()
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("record_type", &self.record_type)
            .field(
                "payload",
                &format!("[{} bytes REDACTED]", self.payload.len()),
            )
            .finish()
    }
}
