//! Deterministic weighted variation assignment.
//!
//! A client's branch is derived from a SHA-256 of `salt + client_seed`, so the
//! same client always lands in the same branch of the same study without any
//! stored random state. A manual override preference takes precedence.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

use study_types::WeightedVariation;

use crate::error::{StudyError, StudyResult};
use crate::prefs::PreferenceStore;

/// Hex digits of the digest used for the fraction (48 bits)
const FRACTION_HEX_DIGITS: i32 = 12;

/// Map an arbitrary string to a stable value in [0, 1).
pub fn hash_fraction(input: &str) -> f64 {
    let digest = Sha256::digest(input.as_bytes());
    let value = digest[..6]
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    value as f64 / 16f64.powi(FRACTION_HEX_DIGITS)
}

/// Pick the first variation whose cumulative normalized weight exceeds
/// `fraction`. The last bound is treated as exactly 1.0.
pub fn choose_weighted(variations: &[WeightedVariation], fraction: f64) -> Option<&WeightedVariation> {
    let total: f64 = variations.iter().map(|v| v.weight).sum();
    if variations.is_empty() || total.is_nan() || total <= 0.0 {
        return None;
    }

    let last = variations.len() - 1;
    let mut cumulative = 0.0;
    for (i, variation) in variations.iter().enumerate() {
        if i == last {
            return Some(variation);
        }
        cumulative += variation.weight / total;
        if fraction < cumulative {
            return Some(variation);
        }
    }
    None
}

/// Check the invariants every weighted list must hold
pub fn validate_variations(variations: &[WeightedVariation]) -> StudyResult<()> {
    if variations.is_empty() {
        return Err(StudyError::invalid_config("weighted_variations is empty"));
    }
    let mut seen = HashSet::new();
    for v in variations {
        if !(v.weight.is_finite() && v.weight > 0.0) {
            return Err(StudyError::invalid_config(format!(
                "variation '{}' has non-positive weight {}",
                v.name, v.weight
            )));
        }
        if !seen.insert(v.name.as_str()) {
            return Err(StudyError::invalid_config(format!(
                "duplicate variation name '{}'",
                v.name
            )));
        }
    }
    Ok(())
}

pub struct VariationSelector {
    prefs: Arc<dyn PreferenceStore>,
}

impl VariationSelector {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { prefs }
    }

    /// Choose a variation for `client_seed`, honouring the override preference.
    pub fn select(
        &self,
        variations: &[WeightedVariation],
        override_key: Option<&str>,
        client_seed: &str,
        salt: &str,
    ) -> StudyResult<WeightedVariation> {
        validate_variations(variations)?;

        if let Some(variation) = self.from_override(variations, override_key)? {
            log::info!("[VARIATION] Using override variation '{}'", variation.name);
            return Ok(variation);
        }

        // No separator: buckets stay identical to existing `salt + clientId`
        // assignments, so ("ab", "c") and ("a", "bc") share a bucket.
        let fraction = hash_fraction(&format!("{}{}", salt, client_seed));
        let chosen = choose_weighted(variations, fraction)
            .cloned()
            .ok_or_else(|| StudyError::invalid_config("no selectable variation"))?;

        log::debug!(
            "[VARIATION] fraction {:.6} selected '{}' of {} variations",
            fraction,
            chosen.name,
            variations.len()
        );
        Ok(chosen)
    }

    fn from_override(
        &self,
        variations: &[WeightedVariation],
        override_key: Option<&str>,
    ) -> StudyResult<Option<WeightedVariation>> {
        let Some(key) = override_key else {
            return Ok(None);
        };
        let name = self.prefs.get_string(key, "")?;
        if name.is_empty() {
            return Ok(None);
        }
        variations
            .iter()
            .find(|v| v.name == name)
            .cloned()
            .map(Some)
            .ok_or(StudyError::UnknownOverrideVariation {
                key: key.to_string(),
                name,
            })
    }
}
