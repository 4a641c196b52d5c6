use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use study_types::{
    PingQuery, RunReason, StartupOutcome, StudyInfo, StudyPhase, TelemetryPing, WeightedVariation,
};

use super::state::StudyState;
use crate::db::Database;
use crate::error::{StudyError, StudyResult};
use crate::experiments::ExperimentRegistry;
use crate::permissions::read_data_permissions;
use crate::prefs::{first_run_key, PreferenceStore};
use crate::setup::StudySetup;
use crate::signals::{SignalBus, StudySignal};
use crate::telemetry::{PingStamp, TelemetryGate, TelemetryTransport};
use crate::urls::{augment_url, Covariates};
use crate::variation::VariationSelector;

/// One study instance for one client and one host run.
pub struct Study {
    /// Stable client identifier used to seed variation assignment
    client_id: String,
    pub(super) prefs: Arc<dyn PreferenceStore>,
    pub(super) experiments: Arc<dyn ExperimentRegistry>,
    pub(super) gate: TelemetryGate,
    selector: VariationSelector,
    pub(super) signals: Arc<SignalBus>,
    pub(super) setup: Option<StudySetup>,
    pub(super) state: StudyState,
}

impl Study {
    pub fn new(
        client_id: impl Into<String>,
        prefs: Arc<dyn PreferenceStore>,
        transport: Arc<dyn TelemetryTransport>,
        experiments: Arc<dyn ExperimentRegistry>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            selector: VariationSelector::new(prefs.clone()),
            prefs,
            experiments,
            gate: TelemetryGate::new(transport),
            signals: Arc::new(SignalBus::new()),
            setup: None,
            state: StudyState::new(),
        }
    }

    /// Study whose preferences, pings and experiment annotations share one database
    pub fn with_database(client_id: impl Into<String>, db: Arc<Database>) -> Self {
        Self::new(client_id, db.clone(), db.clone(), db)
    }

    pub fn signals(&self) -> &Arc<SignalBus> {
        &self.signals
    }

    pub fn phase(&self) -> StudyPhase {
        self.state.phase
    }

    pub fn state(&self) -> &StudyState {
        &self.state
    }

    pub fn setup(&self) -> Option<&StudySetup> {
        self.setup.as_ref()
    }

    /// Validate and record the study setup. Only allowed once.
    pub fn configure(&mut self, setup: StudySetup) -> StudyResult<()> {
        if self.state.phase != StudyPhase::Unconfigured {
            return Err(StudyError::invalid_config(format!(
                "study '{}' is already configured",
                self.setup.as_ref().map(|s| s.study_id.as_str()).unwrap_or_default()
            )));
        }
        setup.validate()?;

        log::info!(
            "[STUDY] Configured {} ({} {} v{}) with {} variations",
            setup.study_id,
            setup.study_kind.as_str(),
            setup.addon.id,
            setup.addon.version,
            setup.weighted_variations.len()
        );

        self.setup = Some(setup);
        self.state.advance(StudyPhase::Configuring);
        Ok(())
    }

    /// Run the per-run enrollment decision. Exactly one of the `ready` and
    /// `end` signals fires, unless the study was already past this point.
    pub fn startup(&mut self, reason: RunReason) -> StudyResult<StartupOutcome> {
        let setup = self.configured()?.clone();

        if self.state.phase != StudyPhase::Configuring {
            log::debug!("[STUDY] Startup skipped in phase {:?}", self.state.phase);
            return Ok(StartupOutcome::Unchanged {
                phase: self.state.phase,
            });
        }

        log::info!("[STUDY] Startup {} ({:?})", setup.study_id, reason);
        self.state.advance(StudyPhase::AwaitingFirstRunDecision);

        // Chosen before the first ping so every ping of this run carries the branch
        self.ensure_variation(&setup)?;

        let first_run_key = first_run_key(&setup.study_id);
        let first_run = self.prefs.get_timestamp(&first_run_key)?;
        self.state.first_run_timestamp = first_run;

        if reason.is_first_run_candidate() {
            if first_run.is_none() {
                self.gate.send_lifecycle(&self.stamp(), "enter", &[])?;
            }

            if !setup.eligible {
                log::info!("[STUDY] Client is ineligible, ending {}", setup.study_id);
                let outcome = self.reconcile_ending("ineligible")?;
                return Ok(StartupOutcome::End { outcome });
            }

            if first_run.is_none() {
                let now = Utc::now().timestamp_millis();
                self.prefs.set_timestamp(&first_run_key, now)?;
                self.state.first_run_timestamp = Some(now);
                self.gate.send_lifecycle(&self.stamp(), "install", &[])?;
            }
        }

        if !read_data_permissions(self.prefs.as_ref())?.allows(setup.study_kind) {
            log::info!(
                "[STUDY] {} data permission is off, ending {}",
                setup.study_kind.as_str(),
                setup.study_id
            );
            let outcome = self.reconcile_ending("user-disable")?;
            return Ok(StartupOutcome::End { outcome });
        }

        if setup.is_expired(self.state.first_run_timestamp, Utc::now().timestamp_millis()) {
            log::info!("[STUDY] {} has expired", setup.study_id);
            let outcome = self.reconcile_ending("expired")?;
            return Ok(StartupOutcome::End { outcome });
        }

        let branch = self.state.variation_name().unwrap_or_default();
        self.experiments.set_active(&setup.study_id, &branch)?;
        self.state.advance(StudyPhase::Active);

        let info = self.info()?;
        self.signals.emit(&StudySignal::Ready(info.clone()));
        log::info!("[STUDY] {} is active on branch {}", setup.study_id, branch);
        Ok(StartupOutcome::Ready { info })
    }

    /// Read-only snapshot of the configured study
    pub fn info(&self) -> StudyResult<StudyInfo> {
        let setup = self.configured()?;
        let time_until_expire = self
            .state
            .first_run_timestamp
            .and_then(|first| setup.expires_at(first))
            .map(|deadline| deadline.saturating_sub(Utc::now().timestamp_millis()).max(0));

        Ok(StudyInfo {
            study_id: setup.study_id.clone(),
            variation: self.state.variation.clone(),
            first_run_timestamp: self.state.first_run_timestamp,
            active_experiment_name: setup.study_id.clone(),
            time_until_expire,
            phase: self.state.phase,
        })
    }

    /// Validate and send a payload from the feature code. Payloads arriving
    /// after the study started ending are validated, then dropped. Before
    /// `startup` picks a variation the ping carries no branch.
    pub fn send_telemetry(&self, payload: &Value) -> StudyResult<()> {
        self.configured()?;
        if self.state.is_terminating() {
            crate::telemetry::validate_payload(payload)?;
            log::warn!("[TELEMETRY] Study is ending, dropping addon payload");
            return Ok(());
        }
        self.gate.send(&self.stamp(), payload).map(|_| ())
    }

    /// Search stored pings, newest first. Works before configuration so
    /// eligibility checks can look at recent telemetry.
    pub fn search_telemetry(&self, query: &PingQuery) -> StudyResult<Vec<TelemetryPing>> {
        self.gate.search(query)
    }

    /// Run the variation selector on an arbitrary list, for tooling and tests.
    pub fn select_variation(
        &self,
        variations: &[WeightedVariation],
        seed: &str,
    ) -> StudyResult<String> {
        let (salt, override_key) = match &self.setup {
            Some(setup) => (
                setup.study_id.as_str(),
                setup.variation_override_preference.as_deref(),
            ),
            None => ("", None),
        };
        self.selector
            .select(variations, override_key, seed, salt)
            .map(|v| v.name)
    }

    /// Build a mid-study survey URL carrying the study covariates plus `fields`.
    pub fn survey_url(&self, base_url: &str, fields: &HashMap<String, String>) -> StudyResult<String> {
        let mut params = self.covariates()?.query_pairs();
        let mut extra: Vec<(String, String)> =
            fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        extra.sort();
        params.extend(extra);
        augment_url(base_url, &params)
    }

    pub(super) fn configured(&self) -> StudyResult<&StudySetup> {
        self.setup.as_ref().ok_or(StudyError::NotConfigured)
    }

    pub(super) fn stamp(&self) -> PingStamp {
        let (study_name, kind) = self
            .setup
            .as_ref()
            .map(|s| (s.study_id.clone(), s.study_kind))
            .unwrap_or_default();
        PingStamp {
            study_name,
            branch: self.state.variation_name(),
            kind,
        }
    }

    pub(super) fn covariates(&self) -> StudyResult<Covariates> {
        let setup = self.configured()?;
        Ok(Covariates {
            study: setup.study_id.clone(),
            variation: self.state.variation_name(),
            addon_id: setup.addon.id.clone(),
            addon_version: setup.addon.version.clone(),
        })
    }

    fn ensure_variation(&mut self, setup: &StudySetup) -> StudyResult<()> {
        if self.state.variation.is_some() {
            return Ok(());
        }
        let variation = self.selector.select(
            &setup.weighted_variations,
            setup.variation_override_preference.as_deref(),
            &self.client_id,
            &setup.study_id,
        )?;
        log::info!("[STUDY] {} assigned variation {}", setup.study_id, variation.name);
        self.state.variation = Some(variation);
        Ok(())
    }
}
