use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roomwatch::config::Config;
use roomwatch::crawler::ScrapeCycle;
use roomwatch::error::{Error, Result, RoomwatchErrorTrait};
use roomwatch::models::VacancyKey;
use roomwatch::scheduler::{CycleTrigger, TriggerConfig};
use roomwatch::storage::{create_sqlite_store, SharedVacancyStore};

#[derive(Parser)]
#[command(
    name = "roomwatch",
    version,
    about = "Watches share-house listing pages and alerts once per new vacancy",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (environment variables are used otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scrape cycles on the configured interval until interrupted
    Run,

    /// Run a single scrape cycle and print its summary
    Once,

    /// List tracked vacancies
    List,

    /// Forget a tracked vacancy so it is announced again
    Forget {
        /// Vacancy element id
        id: String,

        /// Share-house name; every house is matched when omitted
        #[arg(long)]
        house: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("roomwatch starting");

    let result = match cli.command {
        Commands::Run => run(config).await,
        Commands::Once => once(config).await,
        Commands::List => list(&config),
        Commands::Forget { id, house } => forget(&config, &id, house.as_deref()),
    };

    if let Err(err) = &result {
        tracing::error!(
            category = %err.category(),
            recoverable = err.is_recoverable(),
            "{}",
            err.user_desc()
        );
    }

    Ok(result?)
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let loaded = match path {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    };
    loaded.map_err(|e| Error::config(format!("{e:#}")))
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> anyhow::Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("roomwatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!("roomwatch={level},warn"))
        })
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("Failed to initialize logging")?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("Failed to initialize logging")?;
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<SharedVacancyStore> {
    Ok(create_sqlite_store(&config.storage.sqlite_path)?)
}

fn build_cycle(config: &Config) -> Result<ScrapeCycle> {
    config
        .validate()
        .map_err(|e| Error::config(format!("{e:#}")))?;
    let store = open_store(config)?;
    ScrapeCycle::from_config(config, store)
}

async fn run(config: Config) -> Result<()> {
    let cycle = Arc::new(build_cycle(&config)?);
    let trigger = Arc::new(CycleTrigger::new(
        TriggerConfig::from(&config.schedule),
        cycle,
    )?);

    let stopper = Arc::clone(&trigger);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current cycle");
            stopper.stop().await;
        }
    });

    trigger.start().await?;
    Ok(())
}

async fn once(config: Config) -> Result<()> {
    let cycle = build_cycle(&config)?;
    let summary = cycle.run_cycle().await?;

    println!("{summary}");
    for target in &summary.targets {
        match &target.error {
            Some(error) => println!("  [FAILED] {}: {error}", target.url),
            None => println!(
                "  [{}] {}: {} found, {} new",
                target.state, target.url, target.records, target.notified
            ),
        }
    }

    Ok(())
}

fn list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let vacancies = store.list()?;

    if vacancies.is_empty() {
        println!("No tracked vacancies");
        return Ok(());
    }

    println!("Tracked vacancies ({})", vacancies.len());
    println!("{:-<60}", "");
    for v in &vacancies {
        println!("{} @ {}", v.vacancy_id, v.share_house_name);
        println!("  Room type:       {}", v.room_type);
        println!("  URL:             {}", v.url);
        println!("  First notified:  {}", v.first_notified_at.format("%Y-%m-%d %H:%M:%S"));
        println!("  Last seen:       {}", v.last_seen_at.format("%Y-%m-%d %H:%M:%S"));
        println!("  Notifications:   {}", v.notification_count);
    }

    Ok(())
}

fn forget(config: &Config, id: &str, house: Option<&str>) -> Result<()> {
    let store = open_store(config)?;

    let keys: Vec<VacancyKey> = match house {
        Some(house) => vec![VacancyKey::new(id, house)],
        None => store
            .all_ids()?
            .into_iter()
            .filter(|key| key.vacancy_id == id)
            .collect(),
    };

    let mut removed = 0usize;
    for key in &keys {
        if store.delete_by_id(key)? {
            removed += 1;
        }
    }

    tracing::info!(vacancy_id = id, removed, "Forget command finished");
    println!("Forgot {removed} vacancy record(s) for '{id}'");
    Ok(())
}
