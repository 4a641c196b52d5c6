//! Study setup parser - reads a study manifest (`study.toml`) into typed structs.
//!
//! The setup is immutable once handed to `Study::configure`. Eligibility and
//! expiry results are computed by the feature code before configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use study_types::{AddonIdentity, EndingReason, EndingSpec, StudyKind, WeightedVariation};

use crate::error::{StudyError, StudyResult};
use crate::variation::validate_variations;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySetup {
    pub study_id: String,
    #[serde(default)]
    pub study_kind: StudyKind,
    pub addon: AddonIdentity,
    /// Ordered; assignment walks this list in order
    pub weighted_variations: Vec<WeightedVariation>,
    #[serde(default = "default_true")]
    pub eligible: bool,
    #[serde(default)]
    pub expired: bool,
    /// Expire this many days after the first run
    #[serde(default)]
    pub expire_after_days: Option<u32>,
    #[serde(default)]
    pub endings: BTreeMap<String, EndingSpec>,
    /// Preference holding a manual variation name (QA / developer override)
    #[serde(default)]
    pub variation_override_preference: Option<String>,
}

fn default_true() -> bool {
    true
}

impl StudySetup {
    /// Load a setup from a `study.toml` file path.
    pub fn from_file(path: &Path) -> StudyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StudyError::invalid_config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse a setup from a TOML string.
    pub fn from_str(content: &str) -> StudyResult<Self> {
        toml::from_str(content)
            .map_err(|e| StudyError::invalid_config(format!("failed to parse study.toml: {}", e)))
    }

    pub fn validate(&self) -> StudyResult<()> {
        if self.study_id.trim().is_empty() {
            return Err(StudyError::invalid_config("study_id is empty"));
        }
        validate_variations(&self.weighted_variations)?;

        if self.expire_after_days == Some(0) {
            return Err(StudyError::invalid_config("expire_after_days must be positive"));
        }

        for (alias, ending) in &self.endings {
            for base in &ending.base_urls {
                url::Url::parse(base).map_err(|e| {
                    StudyError::invalid_config(format!(
                        "ending '{}' has invalid url '{}': {}",
                        alias, base, e
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Resolve an ending alias to its reason and configured ending, if any.
    ///
    /// A configured category wins, then the alias itself when it names a
    /// standard reason. Anything else is reported as `ended-neutral`.
    pub fn resolve_ending(&self, alias: &str) -> (EndingReason, Option<&EndingSpec>) {
        let spec = self.endings.get(alias);
        let reason = spec
            .and_then(|s| s.category)
            .or_else(|| EndingReason::parse(alias))
            .unwrap_or_else(|| {
                log::warn!(
                    "[STUDY] Ending '{}' has no category, reporting as {}",
                    alias,
                    EndingReason::EndedNeutral
                );
                EndingReason::EndedNeutral
            });
        (reason, spec)
    }

    /// Deadline in epoch milliseconds, when an expiry is configured.
    /// A stored first-run time too large to add to has no deadline.
    pub fn expires_at(&self, first_run_timestamp: i64) -> Option<i64> {
        self.expire_after_days
            .and_then(|days| i64::from(days).checked_mul(MILLIS_PER_DAY))
            .and_then(|span| first_run_timestamp.checked_add(span))
    }

    /// Whether the study has expired at `now`
    pub fn is_expired(&self, first_run_timestamp: Option<i64>, now: i64) -> bool {
        if self.expired {
            return true;
        }
        first_run_timestamp
            .and_then(|first| self.expires_at(first))
            .is_some_and(|deadline| now >= deadline)
    }
}
