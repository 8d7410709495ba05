//! lifeline-dash - crisis-line monitoring dashboard service
//!
//! Serves ranked caller lists, per-caller call history and live SSE updates
//! over HTTP, backed by a local SQLite database.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lifeline_common::config::{CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig};
use lifeline_common::db::init_database;
use lifeline_common::events::EventBus;
use lifeline_dash::backend::SqliteBackend;
use lifeline_dash::detail::QuestionSet;
use lifeline_dash::live::spawn_session_reaper;
use lifeline_dash::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lifeline-dash
#[derive(Parser, Debug)]
#[command(name = "lifeline-dash")]
#[command(about = "Crisis-line monitoring dashboard service")]
#[command(version)]
struct Args {
    /// Root folder holding lifeline.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Configuration file (default: <config dir>/lifeline/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "LIFELINE_DASH_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing so its log level can seed the filter
    let config_result = TomlConfig::load_or_default(args.config.as_deref());
    let default_level = config_result
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| CompiledDefaults::for_current_platform().log_level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=debug", default_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Lifeline Dashboard (lifeline-dash) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = config_result.context("Failed to load configuration")?;

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder)
        .with_toml(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    if !initializer.database_exists() {
        info!("Creating new database at {}", db_path.display());
    }
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let backend = SqliteBackend::new(pool, EventBus::new(config.event_capacity));
    let questions = QuestionSet::from_config(config.canonical_questions.clone());
    info!("Tracking {} canonical questions", questions.questions().len());

    let state = AppState::new(backend, questions, config.event_capacity);
    let idle = Duration::from_secs(config.session_idle_secs);
    let _reaper = spawn_session_reaper(state.sessions.clone(), idle, (idle / 4).max(Duration::from_secs(1)));
    info!("Idle sessions without listeners close after {:?}", idle);
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.bind_address);
    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("lifeline-dash listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
