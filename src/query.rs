// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Selection query builder.
//!
//! A selection is `_meta.inserted_at < cutoff` AND an optional caller filter.
//! The caller filter is passed through as-is; it has already been validated
//! by [`Filter::parse`].

use crate::filter::{Condition, Filter};
use crate::record::Timestamp;

/// Path of the insertion timestamp inside a record document.
pub const INSERTED_AT_PATH: &str = "_meta.inserted_at";

/// Path of the stored type tag inside a record document.
pub const STORED_TYPE_PATH: &str = "_meta.stored_type";

/// Path of the optional unique name inside a record document.
pub const NAME_PATH: &str = "_meta.name";

/// Build the selection filter for a replication run.
///
/// Only records inserted strictly before `cutoff` are selected.
pub fn build(cutoff: Timestamp, extra: Option<Filter>) -> Filter {
    let age = Filter::field(INSERTED_AT_PATH, Condition::Lt(cutoff.as_millis().into()));
    match extra {
        Some(extra) => age.and(extra),
        None => age,
    }
}

/// Filter selecting records of one stored type.
pub fn by_type(stored_type: impl Into<String>) -> Filter {
    Filter::equals(STORED_TYPE_PATH, stored_type.into())
}

/// Filter selecting records by their unique name.
pub fn by_name(name: impl Into<String>) -> Filter {
    Filter::equals(NAME_PATH, name.into())
}
