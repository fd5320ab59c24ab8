//! agri-assist — service entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI flags
//!   3. Load config
//!   4. Resolve effective log level (CLI `-v` flags > env > config)
//!   5. Init logger once
//!   6. Seed the knowledge store if it is new (or on `--seed-knowledge`)
//!   7. Assemble the pipeline from config
//!   8. Spawn Ctrl-C → shutdown signal watcher
//!   9. Serve HTTP until the shutdown token is cancelled

use std::fs;

use tokio_util::sync::CancellationToken;
use tracing::info;

use agri_assist::config::{self, StageMode};
use agri_assist::error::AppError;
use agri_assist::logger;
use agri_assist::subsystems::comms::{self, AppState};
use agri_assist::subsystems::knowledge::SqliteKnowledge;
use agri_assist::subsystems::orchestrator::Pipeline;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();

    logger::init(effective_log_level, force_cli_level)?;

    info!(
        service = %config.service_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        llm_provider = %config.llm.provider,
        "config loaded"
    );

    fs::create_dir_all(&config.work_dir)?;

    if config.knowledge.mode == StageMode::Local {
        let fresh = !config.knowledge.db_path.exists();
        if fresh || args.seed_knowledge {
            SqliteKnowledge::open(&config.knowledge.db_path)?.seed()?;
            info!(db = %config.knowledge.db_path.display(), "knowledge store seeded");
        }
    }
    if args.seed_knowledge {
        return Ok(());
    }

    if config.service_api_key.is_none() {
        tracing::warn!("SERVICE_API_KEY not set — /generate will reject every request");
    }

    let pipeline = Pipeline::from_config(&config)?;
    let state = AppState::new(&config.service_name, pipeline, config.service_api_key.clone());

    // Shared shutdown token — Ctrl-C cancels it, the server watches it.
    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    comms::serve(&config.bind, state, shutdown).await?;

    info!("shutdown complete");
    Ok(())
}

// ── CLI ───────────────────────────────────────────────────────────────────────

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
    seed_knowledge: bool,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut seed_knowledge = false;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: agri-assist [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                println!("      --seed-knowledge       Reset the local knowledge store to its reference rows and exit");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--seed-knowledge" => seed_knowledge = true,
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    CliArgs {
        log_level: logger::level_for_verbosity(verbosity),
        config_path,
        seed_knowledge,
    }
}
