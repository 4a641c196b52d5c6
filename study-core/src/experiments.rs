//! Host reporting surface for active experiments.

use crate::db::Database;
use crate::error::{StudyError, StudyResult};

/// Annotates host telemetry with the study's active branch
pub trait ExperimentRegistry: Send + Sync {
    fn set_active(&self, study_name: &str, branch: &str) -> StudyResult<()>;

    fn set_inactive(&self, study_name: &str) -> StudyResult<()>;
}

impl ExperimentRegistry for Database {
    fn set_active(&self, study_name: &str, branch: &str) -> StudyResult<()> {
        self.set_active_experiment(study_name, branch)
            .map_err(StudyError::store)
    }

    fn set_inactive(&self, study_name: &str) -> StudyResult<()> {
        self.remove_active_experiment(study_name)
            .map(|_| ())
            .map_err(StudyError::store)
    }
}
