//! Preference gateway - typed access to the host's key/value store.
//!
//! Implementors provide raw `(kind, value)` access plus prefix removal; the
//! typed getters and setters are shared. Store failures surface as
//! `StudyError::StoreUnavailable` and are never swallowed here.

use crate::db::Database;
use crate::error::{StudyError, StudyResult};

/// Kind tag stored next to each preference value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefKind {
    String,
    Bool,
    Timestamp,
}

impl PrefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefKind::String => "string",
            PrefKind::Bool => "bool",
            PrefKind::Timestamp => "timestamp",
        }
    }
}

/// Narrow interface to the external preference store
pub trait PreferenceStore: Send + Sync {
    /// Raw `(kind, value)` lookup
    fn get_raw(&self, key: &str) -> StudyResult<Option<(String, String)>>;

    fn set_raw(&self, key: &str, kind: PrefKind, value: &str) -> StudyResult<()>;

    /// Remove every key under `prefix`, returning how many were removed
    fn clear_branch(&self, prefix: &str) -> StudyResult<usize>;

    fn get_string(&self, key: &str, default: &str) -> StudyResult<String> {
        Ok(typed(self.get_raw(key)?, key, PrefKind::String)
            .unwrap_or_else(|| default.to_string()))
    }

    fn set_string(&self, key: &str, value: &str) -> StudyResult<()> {
        self.set_raw(key, PrefKind::String, value)
    }

    fn get_bool(&self, key: &str, default: bool) -> StudyResult<bool> {
        Ok(typed(self.get_raw(key)?, key, PrefKind::Bool)
            .map(|v| v == "true")
            .unwrap_or(default))
    }

    fn set_bool(&self, key: &str, value: bool) -> StudyResult<()> {
        self.set_raw(key, PrefKind::Bool, if value { "true" } else { "false" })
    }

    /// Epoch-millisecond timestamp, None when unset
    fn get_timestamp(&self, key: &str) -> StudyResult<Option<i64>> {
        Ok(typed(self.get_raw(key)?, key, PrefKind::Timestamp).and_then(|v| v.parse().ok()))
    }

    fn set_timestamp(&self, key: &str, millis: i64) -> StudyResult<()> {
        self.set_raw(key, PrefKind::Timestamp, &millis.to_string())
    }
}

/// A value stored under a different kind reads as unset
fn typed(raw: Option<(String, String)>, key: &str, expected: PrefKind) -> Option<String> {
    match raw {
        Some((kind, value)) if kind == expected.as_str() => Some(value),
        Some((kind, _)) => {
            log::warn!(
                "[PREFS] {} holds a {} value, expected {}; treating as unset",
                key,
                kind,
                expected.as_str()
            );
            None
        }
        None => None,
    }
}

impl PreferenceStore for Database {
    fn get_raw(&self, key: &str) -> StudyResult<Option<(String, String)>> {
        self.get_preference(key).map_err(StudyError::store)
    }

    fn set_raw(&self, key: &str, kind: PrefKind, value: &str) -> StudyResult<()> {
        self.set_preference(key, kind.as_str(), value)
            .map_err(StudyError::store)
    }

    fn clear_branch(&self, prefix: &str) -> StudyResult<usize> {
        self.delete_preferences_with_prefix(prefix)
            .map_err(StudyError::store)
    }
}

/// Branch holding every preference owned by a study
pub fn study_branch(study_id: &str) -> String {
    format!("shield.{}.", study_id)
}

pub fn first_run_key(study_id: &str) -> String {
    format!("{}firstRunTimestamp", study_branch(study_id))
}
