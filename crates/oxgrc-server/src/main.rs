use anyhow::Result;
use chrono::Utc;
use oxgrc_ai::{GeminiProvider, NarrativeService, OpenAiProvider, TextGenerator};
use oxgrc_storage::GrcStore;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use oxgrc_server::config::{AiConfig, ServerConfig};
use oxgrc_server::state::AppState;
use oxgrc_server::{app, auth, seed};

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  oxgrc-server [config.toml]             Start the server");
    eprintln!("  oxgrc-server init-seed [config.toml]   Reset demo data (users are kept)");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("oxgrc=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-seed") => {
            let config_path = args.get(2).map(|s| s.as_str()).unwrap_or("config.toml");
            run_init_seed(config_path)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args.get(1).map(|s| s.as_str()).unwrap_or("config.toml");
            run_server(config_path).await
        }
    }
}

fn load_config(config_path: &str) -> ServerConfig {
    match ServerConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = config_path,
                "Failed to load config file, using defaults"
            );
            ServerConfig::default()
        }
    }
}

/// 按配置构造 AI Provider。两个 key 都存在时优先 OpenAI。
fn build_ai_provider(ai: &AiConfig) -> Option<Box<dyn TextGenerator>> {
    if let Some(api_key) = &ai.openai_api_key {
        match OpenAiProvider::new(
            api_key.clone(),
            ai.model.clone(),
            ai.base_url.clone(),
            ai.timeout_secs,
            ai.max_tokens,
            ai.temperature,
        ) {
            Ok(p) => return Some(Box::new(p)),
            Err(e) => tracing::error!(error = %e, "Failed to build OpenAI provider"),
        }
    }
    if let Some(api_key) = &ai.gemini_api_key {
        match GeminiProvider::new(
            api_key.clone(),
            ai.model.clone(),
            ai.base_url.clone(),
            ai.timeout_secs,
        ) {
            Ok(p) => return Some(Box::new(p)),
            Err(e) => tracing::error!(error = %e, "Failed to build Gemini provider"),
        }
    }
    None
}

/// 清空并重写演示数据（用户与审计日志保留）
fn run_init_seed(config_path: &str) -> Result<()> {
    let config = load_config(config_path);
    oxgrc_common::id::init(config.machine_id, config.node_id);
    let store = GrcStore::new(Path::new(&config.data_dir))?;
    let summary = seed::reseed_demo_data(&store)?;
    tracing::info!(
        frameworks = summary.frameworks,
        unified_controls = summary.unified_controls,
        policies = summary.policies,
        risks = summary.risks,
        "init-seed completed"
    );
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = load_config(config_path);
    oxgrc_common::id::init(config.machine_id, config.node_id);

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.data_dir,
        "oxgrc-server starting"
    );

    let store = Arc::new(GrcStore::new(Path::new(&config.data_dir))?);

    // Default admin account: create if users table is empty
    if let Err(e) = seed::ensure_default_admin(
        &store,
        &config.auth.default_username,
        &config.auth.default_password,
    ) {
        tracing::error!(error = %e, "Failed to create default admin account");
    }

    // Framework catalogs: load once when the table is empty
    if let Err(e) = seed::seed_framework_catalogs(&store) {
        tracing::error!(error = %e, "Failed to seed framework catalogs");
    }

    // JWT secret: use configured value or generate random
    let jwt_secret = match &config.auth.jwt_secret {
        Some(secret) => Arc::new(secret.clone()),
        None => {
            tracing::warn!("No jwt_secret configured. A random secret was generated and will change on restart. Set [auth].jwt_secret in config for production use.");
            Arc::new(auth::generate_secret())
        }
    };

    let provider = build_ai_provider(&config.ai);
    if provider.is_none() {
        tracing::info!("No AI provider configured, /v1/ai/analyze will return fallback payloads");
    }
    let analyzer = Arc::new(NarrativeService::new(provider));

    let state = AppState {
        store,
        analyzer,
        uploads_dir: Arc::new(PathBuf::from(&config.uploads_dir)),
        start_time: Utc::now(),
        jwt_secret,
        token_expire_secs: config.auth.token_expire_secs,
        config: Arc::new(config.clone()),
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(http_listener, app);

    tracing::info!(http = %http_addr, "Server started");

    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}
