//! Ending reconciler - the single termination sequence for a study.
//!
//! Every trigger (explicit `end_study`, ineligibility, expiry, host
//! uninstall/disable) lands here. The sequence runs at most once per study
//! instance; later triggers get the recorded outcome back with no telemetry
//! and no signal. A step that fails does not stop the remaining steps: the
//! study still ends and the first failure is returned to the trigger.

use study_types::{EndingOutcome, StudyPhase};

use super::study::Study;
use crate::error::{StudyError, StudyResult};
use crate::prefs::study_branch;
use crate::signals::StudySignal;
use crate::urls::augment_url;

impl Study {
    /// End the study with an ending alias. Safe to call any number of times.
    pub fn end_study(&mut self, alias: &str) -> StudyResult<EndingOutcome> {
        self.configured()?;
        self.reconcile_ending(alias)
    }

    pub(super) fn reconcile_ending(&mut self, alias: &str) -> StudyResult<EndingOutcome> {
        if self.state.is_terminating() {
            if let Some(outcome) = &self.state.ending_outcome {
                log::info!(
                    "[STUDY] endStudy('{}') ignored, already ended as {}",
                    alias,
                    outcome.ending_reason
                );
                return Ok(outcome.clone());
            }
        }

        let setup = self.configured()?.clone();
        let (reason, spec) = setup.resolve_ending(alias);

        let urls = match spec {
            Some(spec) => self.ending_urls(alias, reason.as_str(), &spec.base_urls),
            None => Vec::new(),
        };
        let outcome = EndingOutcome {
            ending_reason: reason,
            ending_name: alias.to_string(),
            urls,
        };

        self.state.is_ending = true;
        self.state.ending_reason = Some(reason);
        self.state.ending_outcome = Some(outcome.clone());

        log::info!("[STUDY] Ending {} as {} ('{}')", setup.study_id, reason, alias);

        let mut first_error: Option<StudyError> = None;

        match self.prefs.clear_branch(&study_branch(&setup.study_id)) {
            Ok(count) => log::debug!("[PREFS] Cleared {} study preferences", count),
            Err(e) => keep_first(&mut first_error, e),
        }
        if let Err(e) = self.experiments.set_inactive(&setup.study_id) {
            keep_first(&mut first_error, e);
        }

        let stamp = self.stamp();
        if let Err(e) = self.gate.send_lifecycle(&stamp, "exit", &[]) {
            keep_first(&mut first_error, e);
        }
        if let Err(e) = self.gate.send_lifecycle(
            &stamp,
            reason.as_str(),
            &[("study_state_fullname", alias)],
        ) {
            keep_first(&mut first_error, e);
        }

        self.state.advance(StudyPhase::Ended);
        self.signals.emit(&StudySignal::End(outcome.clone()));

        match first_error {
            Some(e) => {
                log::error!("[STUDY] {} ended with a failed step: {}", setup.study_id, e);
                Err(e)
            }
            None => Ok(outcome),
        }
    }

    fn ending_urls(&self, alias: &str, reason: &str, base_urls: &[String]) -> Vec<String> {
        let mut params = vec![
            ("reason".to_string(), reason.to_string()),
            ("fullreason".to_string(), alias.to_string()),
        ];
        match self.covariates() {
            Ok(covariates) => params.extend(covariates.query_pairs()),
            Err(e) => log::warn!("[STUDY] No covariates for ending urls: {}", e),
        }

        base_urls
            .iter()
            .filter_map(|base| match augment_url(base, &params) {
                Ok(url) => Some(url),
                Err(e) => {
                    log::warn!("[STUDY] Skipping ending url {}: {}", base, e);
                    None
                }
            })
            .collect()
    }
}

fn keep_first(slot: &mut Option<StudyError>, err: StudyError) {
    log::error!("[STUDY] Ending step failed: {}", err);
    if slot.is_none() {
        *slot = Some(err);
    }
}
