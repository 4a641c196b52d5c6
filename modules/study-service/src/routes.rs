//! Axum route handlers for the study RPC API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use study_core::{
    Database, SignalRecorder, Study, StudyError, StudyListener, StudyResult, StudySignal,
};
use study_types::*;

pub struct AppState {
    /// One study per process; requests are serialised through the lock
    pub study: Mutex<Study>,
    pub db: Arc<Database>,
    pub recorder: Arc<SignalRecorder>,
    pub start_time: Instant,
}

type RpcReply<T> = (StatusCode, Json<RpcResponse<T>>);

fn status_for(err: &StudyError) -> StatusCode {
    match err {
        StudyError::InvalidConfiguration(_)
        | StudyError::UnknownOverrideVariation { .. }
        | StudyError::InvalidPayloadShape { .. } => StatusCode::BAD_REQUEST,
        StudyError::NotConfigured => StatusCode::CONFLICT,
        StudyError::StoreUnavailable(_) | StudyError::Transport(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn reply<T: serde::Serialize>(result: StudyResult<T>) -> RpcReply<T> {
    match result {
        Ok(data) => (StatusCode::OK, Json(RpcResponse::ok(data))),
        Err(e) => (status_for(&e), Json(RpcResponse::err(e.to_string()))),
    }
}

// POST /rpc/study/startup
pub async fn startup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartupRequest>,
) -> RpcReply<StartupOutcome> {
    reply(state.study.lock().startup(req.reason))
}

// POST /rpc/study/end
pub async fn end_study(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EndStudyRequest>,
) -> RpcReply<EndingOutcome> {
    reply(state.study.lock().end_study(&req.ending))
}

// GET /rpc/study/info
pub async fn info(State(state): State<Arc<AppState>>) -> RpcReply<StudyInfo> {
    reply(state.study.lock().info())
}

// GET /rpc/study/signals
pub async fn signals(State(state): State<Arc<AppState>>) -> RpcReply<Vec<StudySignal>> {
    reply(Ok(state.recorder.received()))
}

// POST /rpc/study/survey_url
pub async fn survey_url(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SurveyUrlRequest>,
) -> RpcReply<String> {
    reply(state.study.lock().survey_url(&req.base_url, &req.fields))
}

// POST /rpc/telemetry/send
pub async fn send_telemetry(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendTelemetryRequest>,
) -> RpcReply<bool> {
    reply(state.study.lock().send_telemetry(&req.payload).map(|_| true))
}

// POST /rpc/telemetry/search
pub async fn search_telemetry(
    State(state): State<Arc<AppState>>,
    Json(query): Json<PingQuery>,
) -> RpcReply<Vec<TelemetryPing>> {
    reply(state.study.lock().search_telemetry(&query))
}

// POST /rpc/variation/select
pub async fn select_variation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectVariationRequest>,
) -> RpcReply<String> {
    reply(state.study.lock().select_variation(&req.variations, &req.seed))
}

// GET /rpc/study/data_permissions
pub async fn data_permissions(State(state): State<Arc<AppState>>) -> RpcReply<DataPermissions> {
    reply(state.study.lock().data_permissions())
}

// POST /rpc/host/install
pub async fn host_install(State(state): State<Arc<AppState>>) -> RpcReply<bool> {
    state.study.lock().on_install();
    reply(Ok(true))
}

// POST /rpc/host/upgrade
pub async fn host_upgrade(State(state): State<Arc<AppState>>) -> RpcReply<bool> {
    state.study.lock().on_upgrade();
    reply(Ok(true))
}

// POST /rpc/host/startup
pub async fn host_startup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HostStartupRequest>,
) -> RpcReply<StartupOutcome> {
    reply(state.study.lock().on_startup(req.reason))
}

// POST /rpc/host/shutdown
pub async fn host_shutdown(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HostShutdownRequest>,
) -> RpcReply<Option<EndingOutcome>> {
    reply(state.study.lock().on_shutdown(req.reason))
}

// POST /rpc/host/uninstall
pub async fn host_uninstall(
    State(state): State<Arc<AppState>>,
) -> RpcReply<Option<EndingOutcome>> {
    reply(state.study.lock().on_uninstall())
}

// POST /rpc/host/data_permissions
pub async fn host_data_permissions(
    State(state): State<Arc<AppState>>,
    Json(permissions): Json<DataPermissions>,
) -> RpcReply<Option<EndingOutcome>> {
    reply(state.study.lock().data_permissions_changed(permissions))
}

// GET /rpc/status
pub async fn status(State(state): State<Arc<AppState>>) -> RpcReply<ServiceStatus> {
    let (study_id, phase, listeners, stats) = {
        let study = state.study.lock();
        let study_id = study
            .setup()
            .map(|s| s.study_id.clone())
            .unwrap_or_default();
        let bus = study.signals();
        (
            study_id,
            study.phase(),
            bus.listener_count(),
            bus.get_stats(state.recorder.id()).unwrap_or_default(),
        )
    };
    let total_pings = state.db.count_pings().unwrap_or_else(|e| {
        log::warn!("[STATUS] Failed to count pings: {}", e);
        0
    });

    reply(Ok(ServiceStatus {
        running: true,
        uptime_secs: state.start_time.elapsed().as_secs(),
        study_id,
        phase,
        total_pings,
        listeners,
        ready_signals: stats.ready,
        end_signals: stats.end,
    }))
}

pub fn router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/rpc/study/startup", post(startup))
        .route("/rpc/study/end", post(end_study))
        .route("/rpc/study/info", get(info))
        .route("/rpc/study/signals", get(signals))
        .route("/rpc/study/survey_url", post(survey_url))
        .route("/rpc/telemetry/send", post(send_telemetry))
        .route("/rpc/telemetry/search", post(search_telemetry))
        .route("/rpc/variation/select", post(select_variation))
        .route("/rpc/study/data_permissions", get(data_permissions))
        .route("/rpc/host/install", post(host_install))
        .route("/rpc/host/upgrade", post(host_upgrade))
        .route("/rpc/host/startup", post(host_startup))
        .route("/rpc/host/shutdown", post(host_shutdown))
        .route("/rpc/host/uninstall", post(host_uninstall))
        .route("/rpc/host/data_permissions", post(host_data_permissions))
        .route("/rpc/status", get(status))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use study_core::{SignalKind, StudySetup};

    const SETUP: &str = r#"
study_id = "service-study"
study_kind = "shield"
expire_after_days = 14

[addon]
id = "service@study.example"
version = "2.0.0"

[[weighted_variations]]
name = "control"
weight = 1.0

[[weighted_variations]]
name = "treatment"
weight = 1.0

[endings.user-disable]
base_urls = ["https://survey.example.com/exit"]
"#;

    fn test_state(configure: bool) -> Arc<AppState> {
        let db = Arc::new(Database::new(":memory:").expect("Failed to create test db"));
        let mut study = Study::with_database("client-service", db.clone());
        let recorder = Arc::new(SignalRecorder::new("service"));
        study.signals().subscribe(recorder.clone());
        if configure {
            study
                .configure(StudySetup::from_str(SETUP).expect("setup parses"))
                .expect("setup is valid");
        }
        Arc::new(AppState {
            study: Mutex::new(study),
            db,
            recorder,
            start_time: Instant::now(),
        })
    }

    #[tokio::test]
    async fn test_host_startup_then_uninstall() {
        let state = test_state(true);

        let (code, Json(resp)) = host_startup(
            State(state.clone()),
            Json(HostStartupRequest {
                reason: HostStartupReason::AddonInstall,
            }),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert!(matches!(resp.data, Some(StartupOutcome::Ready { .. })));

        let (code, Json(resp)) = host_uninstall(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);
        let outcome = resp.data.flatten().expect("user-disable ending");
        assert_eq!(outcome.ending_reason, EndingReason::UserDisable);
        assert_eq!(outcome.urls.len(), 1);

        let (_, Json(resp)) = host_uninstall(State(state.clone())).await;
        assert_eq!(resp.data, Some(None));

        assert_eq!(state.recorder.count(SignalKind::Ready), 1);
        assert_eq!(state.recorder.count(SignalKind::End), 1);
    }

    #[tokio::test]
    async fn test_telemetry_send_and_search() {
        let state = test_state(true);
        startup(
            State(state.clone()),
            Json(StartupRequest {
                reason: RunReason::FreshInstall,
            }),
        )
        .await;

        let (code, Json(resp)) = send_telemetry(
            State(state.clone()),
            Json(SendTelemetryRequest {
                payload: json!({"clicks": 3}),
            }),
        )
        .await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(!resp.success);

        let (code, _) = send_telemetry(
            State(state.clone()),
            Json(SendTelemetryRequest {
                payload: json!({"clicks": "3"}),
            }),
        )
        .await;
        assert_eq!(code, StatusCode::OK);

        let (_, Json(resp)) = search_telemetry(
            State(state.clone()),
            Json(PingQuery {
                types: Some(vec!["shield-study-addon".to_string()]),
                ..Default::default()
            }),
        )
        .await;
        let pings = resp.data.expect("pings");
        assert_eq!(pings.len(), 1);
        assert_eq!(pings[0].payload["clicks"], "3");

        let (_, Json(resp)) = status(State(state)).await;
        let status = resp.data.expect("status");
        assert_eq!(status.study_id, "service-study");
        assert_eq!(status.phase, StudyPhase::Active);
        // enter, install and the addon ping
        assert_eq!(status.total_pings, 3);
    }

    #[tokio::test]
    async fn test_unconfigured_study_conflicts() {
        let state = test_state(false);

        let (code, Json(resp)) = info(State(state.clone())).await;
        assert_eq!(code, StatusCode::CONFLICT);
        assert_eq!(resp.error.as_deref(), Some("study is not configured"));

        let (code, Json(resp)) = end_study(
            State(state),
            Json(EndStudyRequest {
                ending: "expired".to_string(),
            }),
        )
        .await;
        assert_eq!(code, StatusCode::CONFLICT);
        assert!(resp.data.is_none());
    }

    #[tokio::test]
    async fn test_select_variation_rejects_empty_list() {
        let state = test_state(true);
        let (code, Json(resp)) = select_variation(
            State(state),
            Json(SelectVariationRequest {
                variations: Vec::new(),
                seed: "anything".to_string(),
            }),
        )
        .await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(!resp.success);
    }

    #[tokio::test]
    async fn test_install_upgrade_and_permission_revocation() {
        let state = test_state(true);

        let (code, Json(resp)) = host_install(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(resp.data, Some(true));
        let (code, _) = host_upgrade(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);

        host_startup(
            State(state.clone()),
            Json(HostStartupRequest {
                reason: HostStartupReason::AddonInstall,
            }),
        )
        .await;

        let (_, Json(resp)) = data_permissions(State(state.clone())).await;
        assert_eq!(resp.data, Some(DataPermissions::default()));

        let (_, Json(resp)) = host_data_permissions(
            State(state.clone()),
            Json(DataPermissions {
                always_private_browsing: true,
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(resp.data, Some(None));

        let (code, Json(resp)) = host_data_permissions(
            State(state.clone()),
            Json(DataPermissions {
                shield: false,
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        let outcome = resp.data.flatten().expect("revocation ends the study");
        assert_eq!(outcome.ending_reason, EndingReason::UserDisable);

        let (_, Json(resp)) = status(State(state)).await;
        let status = resp.data.expect("status");
        assert_eq!(status.phase, StudyPhase::Ended);
        assert_eq!(status.listeners, 1);
        assert_eq!((status.ready_signals, status.end_signals), (1, 1));
    }
}
