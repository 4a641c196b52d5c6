//! Data permission snapshot read from host preferences.
//!
//! These keys belong to the host, not to any study, so they live outside the
//! `shield.<id>.` branch and survive an ending.

use study_types::DataPermissions;

use crate::error::StudyResult;
use crate::prefs::PreferenceStore;

pub const SHIELD_PREF: &str = "app.shield.optoutstudies.enabled";
pub const PIONEER_PREF: &str = "extensions.pioneer.enrolled";
pub const TELEMETRY_PREF: &str = "datareporting.healthreport.uploadEnabled";
pub const ALWAYS_PRIVATE_PREF: &str = "browser.privatebrowsing.autostart";

/// Unset keys fall back to the host defaults
pub fn read_data_permissions<P: PreferenceStore + ?Sized>(prefs: &P) -> StudyResult<DataPermissions> {
    let defaults = DataPermissions::default();
    Ok(DataPermissions {
        shield: prefs.get_bool(SHIELD_PREF, defaults.shield)?,
        pioneer: prefs.get_bool(PIONEER_PREF, defaults.pioneer)?,
        telemetry: prefs.get_bool(TELEMETRY_PREF, defaults.telemetry)?,
        always_private_browsing: prefs
            .get_bool(ALWAYS_PRIVATE_PREF, defaults.always_private_browsing)?,
    })
}

pub fn write_data_permissions<P: PreferenceStore + ?Sized>(
    prefs: &P,
    permissions: &DataPermissions,
) -> StudyResult<()> {
    prefs.set_bool(SHIELD_PREF, permissions.shield)?;
    prefs.set_bool(PIONEER_PREF, permissions.pioneer)?;
    prefs.set_bool(TELEMETRY_PREF, permissions.telemetry)?;
    prefs.set_bool(ALWAYS_PRIVATE_PREF, permissions.always_private_browsing)
}
