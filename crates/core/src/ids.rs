//! Identifier and timestamp generation.
//!
//! Ids are UUIDv7 strings. Their hyphenated lower-case form sorts
//! lexicographically in the same order as the underlying 128-bit value, so
//! stores can page through them with a plain `id < ?` comparison.

use std::sync::{Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Upper bound of every id; the cursor used when `before` is empty.
pub const MAX_ID: &str = "ffffffff-ffff-ffff-ffff-ffffffffffff";

/// Produces strictly increasing ids.
///
/// UUIDv7 only orders by millisecond, and the wall clock may step back. If
/// a fresh id does not sort after the previous one, the previous value is
/// incremented instead.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Mutex<u128>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = Uuid::now_v7().as_u128();
        let next = if fresh > *last {
            fresh
        } else {
            last.wrapping_add(1)
        };
        *last = next;
        Uuid::from_u128(next).hyphenated().to_string()
    }
}

/// Current UTC time as RFC 3339 with nanoseconds.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Maps an empty cursor to [`MAX_ID`].
pub fn cursor_or_max(before: &str) -> &str {
    if before.is_empty() {
        MAX_ID
    } else {
        before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let ids = IdGenerator::new();
        let generated: Vec<String> = (0..10_000).map(|_| ids.next_id()).collect();

        for pair in generated.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        assert!(generated.iter().all(|id| id.as_str() < MAX_ID));
    }

    #[test]
    fn test_ids_are_valid_uuids() {
        let id = IdGenerator::new().next_id();
        assert_eq!(id.len(), MAX_ID.len());
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_cursor_defaults_to_max() {
        assert_eq!(cursor_or_max(""), MAX_ID);
        assert_eq!(cursor_or_max("abc"), "abc");
    }

    #[test]
    fn test_timestamp_is_utc_rfc3339() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
