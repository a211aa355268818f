use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use remfix_server::state::AppState;

/// `remfix health` — liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$REMFIX_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("REMFIX_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Health-check subcommand — must be handled before anything heavyweight
    // so the binary stays fast when used as a Docker HEALTHCHECK probe.
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }

    // Initialise structured JSON logging. Level controlled via RUST_LOG env var.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("remfix=info".parse()?),
        )
        .json()
        .init();

    let cfg = remfix_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Ensure data directory exists before opening DuckDB.
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/remfix.db", cfg.data_dir);
    let db = remfix_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    if cfg.admin_token.is_none() {
        tracing::warn!(
            "REMFIX_ADMIN_TOKEN not set — admin analytics endpoints are disabled (all 401)."
        );
    }
    if cfg.webhook_secret.is_none() {
        tracing::warn!(
            "REMFIX_WEBHOOK_SECRET not set — the RemOnline webhook endpoint is disabled."
        );
    }

    // Redis misconfiguration is logged once inside RedisClient::from_config.
    let (state, telemetry_rx) = AppState::new(db, cfg.clone());
    let state = Arc::new(state);

    // Spawn the telemetry worker: all DuckDB/Redis ping side effects run here.
    let worker = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            remfix_server::telemetry::run_worker(state, telemetry_rx).await;
        })
    };

    // Spawn background visitor-salt rotation (rotates at midnight UTC).
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_salt_rotation_loop().await;
        });
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = remfix_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, "remfix analytics listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    // Drain queued telemetry before exiting: close the queue and give the
    // worker a bounded window to finish the buffered jobs.
    state.close_telemetry();
    if tokio::time::timeout(std::time::Duration::from_secs(5), worker)
        .await
        .is_err()
    {
        tracing::warn!("Telemetry worker did not drain within 5s — dropping remaining jobs");
    }

    Ok(())
}
