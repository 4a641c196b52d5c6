use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use study_types::{PingQuery, StudyKind, TelemetryPing};

use super::transport::TelemetryTransport;
use crate::error::{StudyError, StudyResult};

/// Key reported when the payload itself is not an object
const ROOT_KEY: &str = "<payload>";

/// Study metadata injected into every ping. Callers never supply these.
#[derive(Debug, Clone, PartialEq)]
pub struct PingStamp {
    pub study_name: String,
    pub branch: Option<String>,
    pub kind: StudyKind,
}

/// Check that a payload is a flat object of string values.
///
/// Nothing is coerced: numbers, booleans, nulls, arrays and nested objects
/// are rejected with the offending key.
pub fn validate_payload(payload: &Value) -> StudyResult<BTreeMap<String, String>> {
    let Value::Object(map) = payload else {
        return Err(StudyError::InvalidPayloadShape {
            key: ROOT_KEY.to_string(),
            reason: format!("expected an object, got {}", json_kind(payload)),
        });
    };

    let mut flat = BTreeMap::new();
    for (key, value) in map {
        match value {
            Value::String(s) => {
                flat.insert(key.clone(), s.clone());
            }
            other => {
                return Err(StudyError::InvalidPayloadShape {
                    key: key.clone(),
                    reason: format!("value is {}, not a string", json_kind(other)),
                });
            }
        }
    }
    Ok(flat)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub struct TelemetryGate {
    transport: Arc<dyn TelemetryTransport>,
}

impl TelemetryGate {
    pub fn new(transport: Arc<dyn TelemetryTransport>) -> Self {
        Self { transport }
    }

    /// Validate and send a payload from the study's feature code.
    pub fn send(&self, stamp: &PingStamp, payload: &Value) -> StudyResult<TelemetryPing> {
        let flat = validate_payload(payload)?;
        self.submit(stamp, stamp.kind.addon_ping_type(), flat)
    }

    /// Send a lifecycle ping (`enter`, `install`, `exit`, or an ending).
    pub fn send_lifecycle(
        &self,
        stamp: &PingStamp,
        study_state: &str,
        extra: &[(&str, &str)],
    ) -> StudyResult<TelemetryPing> {
        let mut payload = BTreeMap::new();
        payload.insert("study_state".to_string(), study_state.to_string());
        for (k, v) in extra {
            payload.insert(k.to_string(), v.to_string());
        }
        self.submit(stamp, stamp.kind.lifecycle_ping_type(), payload)
    }

    pub fn search(&self, query: &PingQuery) -> StudyResult<Vec<TelemetryPing>> {
        self.transport.search(query)
    }

    fn submit(
        &self,
        stamp: &PingStamp,
        ping_type: String,
        payload: BTreeMap<String, String>,
    ) -> StudyResult<TelemetryPing> {
        let ping = TelemetryPing {
            id: uuid::Uuid::new_v4().to_string(),
            ping_type,
            timestamp: Utc::now().timestamp_millis(),
            study_name: stamp.study_name.clone(),
            branch: stamp.branch.clone(),
            payload,
        };

        log::debug!(
            "[TELEMETRY] Sending {} ping for {} ({} fields)",
            ping.ping_type,
            ping.study_name,
            ping.payload.len()
        );

        if let Err(e) = self.transport.submit(&ping) {
            log::error!("[TELEMETRY] Failed to submit ping {}: {}", ping.id, e);
            return Err(e);
        }
        Ok(ping)
    }
}
