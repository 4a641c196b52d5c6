use std::env;

const DEFAULT_PORT: u16 = 9110;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub db_path: String,
    pub setup_path: String,
    /// Seed for variation assignment. Generated and persisted when unset.
    pub client_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: parse_port(env::var("STUDY_SERVICE_PORT").ok()),
            db_path: env::var("STUDY_DB_PATH").unwrap_or_else(|_| "./study.db".to_string()),
            setup_path: env::var("STUDY_SETUP_PATH")
                .unwrap_or_else(|_| "./demos/study.toml".to_string()),
            client_id: env::var("STUDY_CLIENT_ID")
                .ok()
                .filter(|id| !id.trim().is_empty()),
        }
    }
}

fn parse_port(raw: Option<String>) -> u16 {
    match raw {
        None => DEFAULT_PORT,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!(
                "STUDY_SERVICE_PORT '{}' is not a valid port, using {}",
                raw,
                DEFAULT_PORT
            );
            DEFAULT_PORT
        }),
    }
}
