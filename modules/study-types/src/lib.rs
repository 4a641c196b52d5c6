//! Shared types for the study runtime and its RPC clients.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// =====================================================
// Study Setup Types
// =====================================================

/// One treatment arm of a study with its relative weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedVariation {
    pub name: String,
    pub weight: f64,
}

impl WeightedVariation {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Which reporting pipeline a study belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StudyKind {
    #[default]
    Shield,
    Pioneer,
}

impl StudyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyKind::Shield => "shield",
            StudyKind::Pioneer => "pioneer",
        }
    }

    /// Ping type used for lifecycle transitions (enter, install, exit, endings)
    pub fn lifecycle_ping_type(&self) -> String {
        format!("{}-study", self.as_str())
    }

    /// Ping type used for payloads sent by the study's own feature code
    pub fn addon_ping_type(&self) -> String {
        format!("{}-study-addon", self.as_str())
    }
}

/// Identity of the extension that carries the study
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonIdentity {
    pub id: String,
    pub version: String,
}

/// Terminal classification of why a study stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndingReason {
    Ineligible,
    Expired,
    UserDisable,
    EndedPositive,
    EndedNeutral,
    EndedNegative,
}

impl EndingReason {
    pub const ALL: [EndingReason; 6] = [
        EndingReason::Ineligible,
        EndingReason::Expired,
        EndingReason::UserDisable,
        EndingReason::EndedPositive,
        EndingReason::EndedNeutral,
        EndingReason::EndedNegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndingReason::Ineligible => "ineligible",
            EndingReason::Expired => "expired",
            EndingReason::UserDisable => "user-disable",
            EndingReason::EndedPositive => "ended-positive",
            EndingReason::EndedNeutral => "ended-neutral",
            EndingReason::EndedNegative => "ended-negative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for EndingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration of one named ending
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndingSpec {
    /// Reason reported for this alias. Defaults to the alias itself when
    /// the alias names a standard reason.
    #[serde(default)]
    pub category: Option<EndingReason>,
    /// Exit survey URLs opened by the feature code after the study ends
    #[serde(default)]
    pub base_urls: Vec<String>,
}

// =====================================================
// Lifecycle Types
// =====================================================

/// Why the study's startup is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunReason {
    FreshInstall,
    Upgrade,
    NormalStart,
}

impl RunReason {
    pub fn is_first_run_candidate(&self) -> bool {
        matches!(self, RunReason::FreshInstall | RunReason::Upgrade)
    }
}

/// Startup reason codes as delivered by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostStartupReason {
    AppStartup,
    AddonEnable,
    AddonInstall,
    AddonUpgrade,
    AddonDowngrade,
}

impl From<HostStartupReason> for RunReason {
    fn from(reason: HostStartupReason) -> Self {
        match reason {
            HostStartupReason::AddonInstall => RunReason::FreshInstall,
            HostStartupReason::AddonUpgrade | HostStartupReason::AddonDowngrade => {
                RunReason::Upgrade
            }
            HostStartupReason::AppStartup | HostStartupReason::AddonEnable => {
                RunReason::NormalStart
            }
        }
    }
}

/// Shutdown reason codes as delivered by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShutdownReason {
    AppShutdown,
    AddonDisable,
    AddonUninstall,
    AddonUpgrade,
    AddonDowngrade,
}

impl ShutdownReason {
    /// Uninstall and disable are the only shutdowns that end a study
    pub fn is_uninstall(&self) -> bool {
        matches!(self, ShutdownReason::AddonUninstall | ShutdownReason::AddonDisable)
    }
}

/// Lifecycle phase of a study instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyPhase {
    Unconfigured,
    Configuring,
    AwaitingFirstRunDecision,
    Active,
    Ended,
}

impl StudyPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StudyPhase::Ended)
    }
}

/// Read-only snapshot of a configured study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyInfo {
    pub study_id: String,
    pub variation: Option<WeightedVariation>,
    /// Epoch milliseconds of the first successful enrollment
    pub first_run_timestamp: Option<i64>,
    pub active_experiment_name: String,
    /// Milliseconds until the study expires, when an expiry is configured
    pub time_until_expire: Option<i64>,
    pub phase: StudyPhase,
}

/// What the feature code receives when a study ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndingOutcome {
    pub ending_reason: EndingReason,
    /// The alias the ending was requested with
    pub ending_name: String,
    pub urls: Vec<String>,
}

/// Data collection permissions the user has granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPermissions {
    pub shield: bool,
    pub pioneer: bool,
    pub telemetry: bool,
    pub always_private_browsing: bool,
}

impl Default for DataPermissions {
    fn default() -> Self {
        Self {
            shield: true,
            pioneer: false,
            telemetry: true,
            always_private_browsing: false,
        }
    }
}

impl DataPermissions {
    /// Whether a study of `kind` may keep running. Both kinds report
    /// through telemetry.
    pub fn allows(&self, kind: StudyKind) -> bool {
        let kind_enabled = match kind {
            StudyKind::Shield => self.shield,
            StudyKind::Pioneer => self.pioneer,
        };
        kind_enabled && self.telemetry
    }
}

// =====================================================
// Telemetry Types
// =====================================================

/// One immutable telemetry event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPing {
    pub id: String,
    pub ping_type: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub study_name: String,
    pub branch: Option<String>,
    pub payload: BTreeMap<String, String>,
}

/// Filters for searching stored pings. All set filters apply together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PingQuery {
    #[serde(default)]
    pub max_count: Option<usize>,
    #[serde(default)]
    pub types: Option<Vec<String>>,
    /// Only pings strictly newer than this epoch-millisecond timestamp
    #[serde(default)]
    pub min_timestamp: Option<i64>,
    #[serde(default)]
    pub headers_only: bool,
}

// =====================================================
// RPC Request Types
// =====================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct StartupRequest {
    pub reason: RunReason,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EndStudyRequest {
    pub ending: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SendTelemetryRequest {
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SelectVariationRequest {
    pub variations: Vec<WeightedVariation>,
    pub seed: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SurveyUrlRequest {
    pub base_url: String,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HostStartupRequest {
    pub reason: HostStartupReason,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HostShutdownRequest {
    pub reason: ShutdownReason,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Result of a startup call: exactly one of the two signals fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum StartupOutcome {
    Ready { info: StudyInfo },
    End { outcome: EndingOutcome },
    /// The study was already active or ended; nothing fired
    Unchanged { phase: StudyPhase },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub study_id: String,
    pub phase: StudyPhase,
    pub total_pings: i64,
    pub listeners: usize,
    /// Signals delivered to the service's own recorder
    pub ready_signals: u64,
    pub end_signals: u64,
}
