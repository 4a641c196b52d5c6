//! Host lifecycle notifications routed into the study.

use study_types::{
    DataPermissions, EndingOutcome, HostStartupReason, ShutdownReason, StartupOutcome, StudyPhase,
};

use super::study::Study;
use crate::error::StudyResult;
use crate::permissions::{read_data_permissions, write_data_permissions};

impl Study {
    pub fn on_install(&self) {
        log::debug!("[HOST] install");
    }

    pub fn on_upgrade(&self) {
        log::debug!("[HOST] upgrade");
    }

    pub fn on_startup(&mut self, reason: HostStartupReason) -> StudyResult<StartupOutcome> {
        log::debug!("[HOST] startup {:?}", reason);
        self.startup(reason.into())
    }

    /// Uninstall or disable while no ending is under way means the user
    /// removed the study. Any other shutdown, or a second uninstall request
    /// arriving because the study ended itself, only logs.
    pub fn on_shutdown(&mut self, reason: ShutdownReason) -> StudyResult<Option<EndingOutcome>> {
        log::debug!("[HOST] shutdown {:?}", reason);

        if !reason.is_uninstall() {
            return Ok(None);
        }
        if self.state.phase == StudyPhase::Unconfigured {
            log::debug!("[HOST] uninstall before configure, nothing to end");
            return Ok(None);
        }
        if self.state.is_terminating() {
            log::debug!("[HOST] uninstall after the study ended, nothing to do");
            return Ok(None);
        }

        log::info!("[HOST] probably a user requested shutdown, ending study");
        self.reconcile_ending("user-disable").map(Some)
    }

    pub fn on_uninstall(&mut self) -> StudyResult<Option<EndingOutcome>> {
        log::debug!("[HOST] uninstall");
        self.on_shutdown(ShutdownReason::AddonUninstall)
    }

    /// Current data permissions. Readable before configuration.
    pub fn data_permissions(&self) -> StudyResult<DataPermissions> {
        read_data_permissions(self.prefs.as_ref())
    }

    /// Record new data permissions. Revoking the permission the configured
    /// study kind depends on ends the study as `user-disable`.
    pub fn data_permissions_changed(
        &mut self,
        permissions: DataPermissions,
    ) -> StudyResult<Option<EndingOutcome>> {
        log::debug!("[HOST] data permissions changed: {:?}", permissions);
        write_data_permissions(self.prefs.as_ref(), &permissions)?;

        let Some(kind) = self.setup.as_ref().map(|s| s.study_kind) else {
            return Ok(None);
        };
        if self.state.is_terminating() || permissions.allows(kind) {
            return Ok(None);
        }

        log::info!("[HOST] {} data permission revoked, ending study", kind.as_str());
        self.reconcile_ending("user-disable").map(Some)
    }
}
