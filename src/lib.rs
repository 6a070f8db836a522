pub mod api;
mod cli;
pub mod dashboard;
pub mod db;
pub mod host;
pub mod models;
pub mod settings;
pub mod tracker;
pub mod utils;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use api::ApiClient;
use cli::{AdminCommand, Cli, Commands, ConfigCommand, WhitelistCommand};
use dashboard::commands;
use db::Database;
use settings::{Settings, SettingsStore};
use tracker::TrackerController;

const APP_DIR: &str = "driftwatch";
const SETTINGS_FILE: &str = "settings.json";
const DATABASE_FILE: &str = "state.sqlite3";

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    utils::logging::init(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(execute(cli))
}

fn data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .context("no data directory on this platform; pass --data-dir"),
    }
}

/// Everything a backend-facing command needs.
struct Backend {
    api: ApiClient,
    db: Database,
    settings: Settings,
}

fn connect(store: SettingsStore, api_url: Option<String>, data_dir: &Path) -> Result<Backend> {
    let settings = store.with_overrides(api_url).get();
    let db = Database::new(data_dir.join(DATABASE_FILE))?;
    let api = ApiClient::new(&settings.api_url, settings.request_timeout(), db.clone())?;
    Ok(Backend { api, db, settings })
}

async fn execute(cli: Cli) -> Result<()> {
    let data_dir = data_dir(cli.data_dir)?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    let store = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
    let api_url = cli.api_url;

    match cli.command {
        Commands::Config(command) => configure(store, command, api_url),
        Commands::Host => serve(connect(store, api_url, &data_dir)?).await,
        Commands::Login { email, password } => {
            let Backend { api, db, .. } = connect(store, api_url, &data_dir)?;
            commands::login(&api, &db, &email, password).await
        }
        Commands::Signup { email, password } => {
            let Backend { api, db, .. } = connect(store, api_url, &data_dir)?;
            commands::signup(&api, &db, &email, password).await
        }
        Commands::Logout => {
            let Backend { db, .. } = connect(store, api_url, &data_dir)?;
            commands::logout(&db).await
        }
        Commands::Whoami => {
            let Backend { api, db, .. } = connect(store, api_url, &data_dir)?;
            commands::whoami(&api, &db).await
        }
        Commands::Report { days, json } => {
            let backend = connect(store, api_url, &data_dir)?;
            commands::report(&backend.api, days, json).await
        }
        Commands::Insights { json } => {
            let backend = connect(store, api_url, &data_dir)?;
            commands::insights(&backend.api, json).await
        }
        Commands::Whitelist(command) => {
            let backend = connect(store, api_url, &data_dir)?;
            match command {
                WhitelistCommand::List { json } => commands::list_whitelist(&backend.api, json).await,
                WhitelistCommand::Add { domain, reason } => {
                    commands::add_to_whitelist(&backend.api, &domain, &reason).await
                }
                WhitelistCommand::Remove { domain_id } => {
                    commands::remove_from_whitelist(&backend.api, domain_id).await
                }
            }
        }
        Commands::Admin(command) => {
            let backend = connect(store, api_url, &data_dir)?;
            match command {
                AdminCommand::Stats { json } => commands::admin_overview(&backend.api, json).await,
                AdminCommand::DeleteUser { user_id } => {
                    commands::admin_delete_user(&backend.api, user_id).await
                }
            }
        }
    }
}

/// Runs the tracking host on stdin/stdout until the browser goes away or
/// the process is interrupted.
async fn serve(backend: Backend) -> Result<()> {
    let Backend { api, db, settings } = backend;
    info!("driftwatch host starting, backend {}", api.base_url());

    let controller = TrackerController::new(Arc::new(api), db, settings);
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => interrupt.cancel(),
            Err(err) => warn!("failed to listen for Ctrl-C: {err}"),
        }
    });

    host::run_host(
        controller,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        cancel,
    )
    .await
}

fn configure(store: SettingsStore, command: ConfigCommand, api_url: Option<String>) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let path = store.path().clone();
            let effective = store.with_overrides(api_url).get();
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(&effective)?);
        }
        ConfigCommand::SetApiUrl { url } => {
            url::Url::parse(&url).with_context(|| format!("invalid URL: {url}"))?;
            let settings = Settings {
                api_url: url,
                ..store.get()
            };
            store.update(settings)?;
            println!("API URL set to {}", store.get().api_url);
        }
        ConfigCommand::SetBatching {
            batch_size,
            idle_flush_secs,
            throttle_ms,
        } => {
            let mut settings = store.get();
            if let Some(batch_size) = batch_size {
                settings.batch_size = batch_size;
            }
            if let Some(idle_flush_secs) = idle_flush_secs {
                settings.idle_flush_secs = idle_flush_secs;
            }
            if let Some(throttle_ms) = throttle_ms {
                settings.throttle_ms = throttle_ms;
            }
            store.update(settings)?;
            println!("{}", serde_json::to_string_pretty(&store.get())?);
        }
    }
    Ok(())
}
