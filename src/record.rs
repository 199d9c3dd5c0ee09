// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record data model.
//!
//! A [`Record`] is an opaque JSON payload plus a `_meta` envelope:
//!
//! ```text
//! { "_id": "000000000000002a",          # store-assigned, never copied
//!   "payload": { ... },                 # opaque
//!   "_meta": { "stored_type": "geometry_msgs/Pose",
//!              "inserted_at": 1718000000000,   # epoch millis
//!              "name": "calibration",          # optional
//!              ... } }                         # extra fields kept verbatim
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Point in time as signed milliseconds since the Unix epoch.
///
/// Stored as a plain number so filters can compare it with `$lt`/`$gt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Earliest representable timestamp. As a cutoff it selects nothing.
    pub const MIN: Timestamp = Timestamp(i64::MIN);

    /// Unix epoch.
    pub const EPOCH: Timestamp = Timestamp(0);

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Current wall-clock time. Call this at the edge and pass it in.
    pub fn now() -> Self {
        Utc::now().into()
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// This timestamp moved back by `secs` seconds, saturating at [`Timestamp::MIN`].
    pub fn minus_secs(self, secs: u64) -> Self {
        let delta = i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000);
        Self(self.0.saturating_sub(delta))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Utc.timestamp_millis_opt(self.0).single() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// Store-assigned record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fixed-width hex id from an insertion sequence number.
    ///
    /// Fixed width keeps lexical and numeric order the same.
    pub fn from_seq(seq: u64) -> Self {
        Self(format!("{:016x}", seq))
    }

    /// Recover the insertion sequence from an id minted by [`RecordId::from_seq`].
    pub fn seq(&self) -> Option<u64> {
        if self.0.len() != 16 {
            return None;
        }
        u64::from_str_radix(&self.0, 16).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata envelope carried alongside every payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Logical type tag of the payload.
    pub stored_type: String,
    /// Time of original insertion. Drives the age cutoff.
    pub inserted_at: Timestamp,
    /// Optional human-assigned label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Any other metadata, preserved verbatim across stores.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Set by the store that holds this record; `None` before insertion.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub payload: Value,
    #[serde(rename = "_meta")]
    pub meta: RecordMeta,
}

impl Record {
    /// Create an unsaved record.
    pub fn new(stored_type: impl Into<String>, payload: Value, inserted_at: Timestamp) -> Self {
        Self {
            id: None,
            payload,
            meta: RecordMeta {
                stored_type: stored_type.into(),
                inserted_at,
                name: None,
                extra: Map::new(),
            },
        }
    }

    /// Builder: attach a name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.meta.name = Some(name.into());
        self
    }

    /// Builder: attach an extra metadata field.
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.extra.insert(key.into(), value);
        self
    }

    /// The logical content to write elsewhere: same payload and metadata,
    /// no identifier. The receiving store assigns its own.
    pub fn detached(&self) -> Self {
        Self {
            id: None,
            payload: self.payload.clone(),
            meta: self.meta.clone(),
        }
    }

    /// True when both records carry the same logical content.
    pub fn same_content(&self, other: &Record) -> bool {
        self.payload == other.payload && self.meta == other.meta
    }

    /// JSON document form, as seen by filters.
    pub fn to_document(&self) -> Value {
        // Serializing plain JSON values and strings cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
