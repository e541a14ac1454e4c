// playxi entry point.
//
// Startup sequence for `serve`:
// 1. Initialize tracing (stderr)
// 2. Load config, copying defaults on first run
// 3. Open database
// 4. Create the request channel
// 5. Spawn WebSocket server task
// 6. Spawn app logic task (startup propagation, then the timer loop)
// 7. Wait for Ctrl+C, then shut down

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use playxi_core::config::{self, Config};
use playxi_core::db::Database;
use playxi_core::import::{self, ImportKind};
use playxi_core::propagation::AutoPropagationService;
use playxi_server::{app, ws_server};
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "playxi", version, about = "Playing-XI lifecycle and transfer ledger server")]
struct Cli {
    /// Directory containing `config/` and `defaults/`.
    #[arg(long, env = "PLAYXI_HOME", default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the WebSocket server and the propagation timer (default).
    Serve,
    /// Run one auto-propagation pass over every league and exit.
    Propagate,
    /// Import leagues: league_id,name,transfer_limit
    ImportLeagues { csv: PathBuf },
    /// Import teams: team_id,league_id,name
    ImportTeams { csv: PathBuf },
    /// Import fixtures: league_id,sequence,scheduled_start
    ImportFixtures { csv: PathBuf },
    /// Import squads: team_id,player_id,name,role,squad_tag
    ImportSquads { csv: PathBuf },
    /// Import player points: player_id,match_id,points
    ImportPoints { csv: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Initialize tracing
    init_tracing()?;

    // 2. Load config
    let config = config::load_config(&cli.base_dir).context("failed to load configuration")?;

    // 3. Open database
    let db_path = config.database.resolve_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Arc::new(
        Database::open(&db_path.to_string_lossy()).context("failed to open database")?,
    );
    info!("Database opened at {}", db_path.display());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::Propagate => {
            let report = AutoPropagationService::new(db).propagate_all(Utc::now())?;
            println!(
                "leagues scanned: {}, matches processed: {}, lineups copied: {}, teams skipped: {}",
                report.leagues_scanned,
                report.matches_processed,
                report.lineups_copied,
                report.teams_skipped
            );
            Ok(())
        }
        Command::ImportLeagues { csv } => run_import(&config, &db, ImportKind::Leagues, &csv),
        Command::ImportTeams { csv } => run_import(&config, &db, ImportKind::Teams, &csv),
        Command::ImportFixtures { csv } => run_import(&config, &db, ImportKind::Fixtures, &csv),
        Command::ImportSquads { csv } => run_import(&config, &db, ImportKind::Squads, &csv),
        Command::ImportPoints { csv } => run_import(&config, &db, ImportKind::Points, &csv),
    }
}

async fn serve(config: Config, db: Arc<Database>) -> anyhow::Result<()> {
    // 4. Create the request channel
    let (ws_tx, ws_rx) = mpsc::channel(256);

    // 5. Spawn WebSocket server task
    let port = config.server.port;
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(port, ws_tx).await {
            error!("WebSocket server error: {e:#}");
        }
    });

    // 6. Spawn app logic task
    let app_state = app::AppState::new(config, db);
    let mut app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(ws_rx, app_state).await {
            error!("Application loop error: {e:#}");
        }
    });

    info!("playxi ready on 127.0.0.1:{port}");

    // 7. Wait for Ctrl+C or for the app loop to stop on its own
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Ctrl+C received, shutting down");
        }
        _ = &mut app_handle => {
            info!("Application loop exited");
        }
    }

    ws_handle.abort();
    app_handle.abort();
    info!("playxi shut down cleanly");
    Ok(())
}

fn run_import(config: &Config, db: &Database, kind: ImportKind, path: &Path) -> anyhow::Result<()> {
    let summary = import::import_file(db, kind, path, config.rules.default_transfer_limit)
        .with_context(|| format!("{} import failed", kind.label()))?;
    println!(
        "{}: {} rows applied, {} skipped",
        kind.label(),
        summary.applied,
        summary.skipped
    );
    Ok(())
}

/// Log to stderr; stdout carries command output.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("playxi_server=info,playxi_core=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
