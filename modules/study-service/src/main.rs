//! Study Service - standalone binary hosting one study behind an RPC API.
//!
//! The host application forwards its lifecycle notifications to `/rpc/host/*`;
//! feature code talks to `/rpc/study/*` and `/rpc/telemetry/*`.
//! Default: http://127.0.0.1:9110/

mod config;
mod routes;

use config::Config;
use parking_lot::Mutex;
use routes::AppState;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use study_core::{Database, PreferenceStore, SignalRecorder, Study, StudyResult, StudySetup};

/// Lives outside the `shield.` branch so an ending does not reset it
const CLIENT_ID_KEY: &str = "study-service.clientId";

/// Use the configured client id, else the persisted one, else mint and persist one.
fn resolve_client_id(db: &Database, configured: Option<String>) -> StudyResult<String> {
    if let Some(id) = configured {
        return Ok(id);
    }
    let stored = db.get_string(CLIENT_ID_KEY, "")?;
    if !stored.is_empty() {
        return Ok(stored);
    }
    let id = uuid::Uuid::new_v4().to_string();
    db.set_string(CLIENT_ID_KEY, &id)?;
    log::info!("Generated client id {}", id);
    Ok(id)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    log::info!("Opening database at: {}", config.db_path);
    let database = Arc::new(Database::new(&config.db_path)?);

    log::info!("Loading study setup from: {}", config.setup_path);
    let setup = StudySetup::from_file(Path::new(&config.setup_path))?;

    let client_id = resolve_client_id(&database, config.client_id.clone())?;
    let mut study = Study::with_database(client_id, database.clone());
    let recorder = Arc::new(SignalRecorder::new("study-service"));
    study.signals().subscribe(recorder.clone());
    study.configure(setup)?;

    let state = Arc::new(AppState {
        study: Mutex::new(study),
        db: database,
        recorder,
        start_time: Instant::now(),
    });

    let cors = tower_http::cors::CorsLayer::permissive();
    let app = routes::router(state).layer(cors);

    let addr = format!("127.0.0.1:{}", config.port);
    log::info!("Study Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
