//! Identity and pagination types for remote records.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner name used for zones belonging to the signed-in account.
pub const DEFAULT_OWNER: &str = "__defaultOwner__";

/// Identifies a zone: a remote-store partition that scopes a set of records.
///
/// Zones must be created explicitly before records can be saved into them.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId {
    name: String,
    owner: String,
}

impl ZoneId {
    /// Create a zone identifier owned by the current account.
    pub fn new(name: &str) -> Self {
        Self::with_owner(name, DEFAULT_OWNER)
    }

    /// Create a zone identifier with an explicit owner.
    pub fn with_owner(name: &str, owner: &str) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
        }
    }

    /// The zone name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owner of the zone.
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.name)
    }
}

impl fmt::Debug for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZoneId({})", self)
    }
}

/// Identifies a record within a zone.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    zone: ZoneId,
    name: String,
}

impl RecordId {
    /// Create a record identifier with a random (UUID v4) name.
    pub fn new(zone: ZoneId) -> Self {
        Self {
            zone,
            name: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Create a record identifier with a known name.
    pub fn with_name(zone: ZoneId, name: &str) -> Self {
        Self {
            zone,
            name: name.to_string(),
        }
    }

    /// The zone this record lives in.
    pub fn zone(&self) -> &ZoneId {
        &self.zone
    }

    /// The record name, unique within its zone.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.name)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self)
    }
}

/// Opaque server cursor returned by a fetch.
///
/// Passing it back on the next fetch requests only records changed since.
/// Displayed as URL-safe base64.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeToken(Vec<u8>);

impl ChangeToken {
    /// Wrap raw token bytes received from the remote store.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Get the raw token bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl fmt::Debug for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_string();
        let shown = encoded.get(..8).unwrap_or(&encoded);
        write!(f, "ChangeToken({})", shown)
    }
}
