//! # SecReport: Scheduled Report Pipeline
//!
//! Renders tenant dashboards to PDF on a schedule and mails them out.
//!
//! Usage:
//!   secreport                            # Start with ~/.secreport/config.toml
//!   secreport --config ./secreport.toml  # Explicit config file
//!   secreport --port 8080 --verbose      # Override port, debug logging

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use secreport_core::config::StoreBackend;
use secreport_core::{ConfigStore, SecReportConfig};
use secreport_db::{ConnectionRouter, PgConfigStore, PgConnector, SqliteConfigStore};
use secreport_gateway::{AppState, start_server};
use secreport_mail::{DeliveryService, SmtpMailer};
use secreport_render::{ChromeEngine, DocumentRenderer};
use secreport_reports::{ReportOrchestrator, ScheduleService};
use secreport_scheduler::JobScheduler;

#[derive(Parser)]
#[command(
    name = "secreport",
    version,
    about = "📊 SecReport: scheduled multi-tenant security reports"
)]
struct Cli {
    /// API port (overrides [server].port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file (default: $SECREPORT_CONFIG or ~/.secreport/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn load_config(cli: &Cli) -> Result<SecReportConfig> {
    let explicit = cli
        .config
        .clone()
        .or_else(|| std::env::var("SECREPORT_CONFIG").ok());
    let mut config = match explicit {
        Some(path) => SecReportConfig::load_from(&expand_path(&path))?,
        None => SecReportConfig::load()?,
    };
    config.apply_env_overrides();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

/// Default log directives. Verbose raises every workspace crate to debug
/// on top of the `info` baseline.
fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,secreport=debug,secreport_core=debug,secreport_db=debug,\
         secreport_render=debug,secreport_mail=debug,secreport_scheduler=debug,\
         secreport_reports=debug,secreport_gateway=debug,tower_http=debug"
    } else {
        "info"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose)));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = load_config(&cli)?;
    let tz = config.scheduler.offset()?;

    // Tenant pools, opened lazily on first use
    let pools = Arc::new(ConnectionRouter::new(PgConnector::new(config.database.clone())));

    // Configuration store
    let store: Arc<dyn ConfigStore> = match config.store.backend {
        StoreBackend::Sqlite => {
            let path = expand_path(&config.store.sqlite_path);
            tracing::info!("🗄️ Config store: SQLite at {}", path.display());
            Arc::new(SqliteConfigStore::open(&path)?)
        }
        StoreBackend::Postgres => {
            let pg = PgConfigStore::new(pools.clone());
            if let Err(e) = pg.ensure_schema().await {
                tracing::warn!("Config database not reachable yet: {e}");
            }
            tracing::info!("🗄️ Config store: Postgres database '{}'", config.database.config_database);
            Arc::new(pg)
        }
    };

    // Pipeline
    let chrome_path = config.render.chrome_path.as_deref().map(expand_path);
    let renderer = Arc::new(DocumentRenderer::new(
        config.render.clone(),
        Arc::new(ChromeEngine::new(chrome_path)),
    ));
    let delivery = Arc::new(DeliveryService::new(
        store.clone(),
        Arc::new(SmtpMailer),
        config.mail.clone(),
    ));
    let orchestrator = Arc::new(ReportOrchestrator::new(
        renderer.clone(),
        delivery.clone(),
        Path::new(&config.mail.template_path).to_path_buf(),
        tz,
    ));
    let scheduler = Arc::new(JobScheduler::new(tz));
    let schedules = Arc::new(ScheduleService::new(store, scheduler, orchestrator));

    match schedules.load().await {
        Ok(n) => tracing::info!("📅 {n} schedule(s) loaded, reporting offset {tz}"),
        Err(e) => tracing::error!("Failed to load schedules from store: {e}"),
    }

    let state = Arc::new(AppState {
        pools,
        schedules,
        delivery,
        renderer,
        start_time: std::time::Instant::now(),
    });
    start_server(&config.server, state).await?;
    Ok(())
}
