use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use oxgrc_ai::NarrativeService;
use oxgrc_storage::GrcStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<GrcStore>,
    pub analyzer: Arc<NarrativeService>,
    pub uploads_dir: Arc<PathBuf>,
    pub start_time: DateTime<Utc>,
    pub jwt_secret: Arc<String>,
    pub token_expire_secs: u64,
    pub config: Arc<ServerConfig>,
}
