mod actions;
mod cli;
mod config;
mod datasources;
mod error;
mod logic;
mod models;
mod store;

use actions::{ActionDispatcher, EmailNotifier};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use error::Result;
use logic::{reset_occurrences, run_alerts, RulesEngine, RunOptions, RunSummary};
use models::{load_rules, ActionKind};
use store::StateStore;
use tracing_subscriber::EnvFilter;

const EXIT_FATAL: i32 = 1;
const EXIT_RULE_FAILURES: i32 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logs go to stderr; stdout carries run output only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(EXIT_FATAL);
        }
    };

    let rules = match load_rules(&config.alert_rules, config.email.is_some()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid alert rule: {}", e);
            std::process::exit(EXIT_FATAL);
        }
    };
    let engine = RulesEngine::new(rules);

    let outcome = match cli.command {
        Some(Commands::Check) => check(&config, &engine).await.map(|()| 0),
        Some(Commands::ResetState { ref rule }) => {
            reset_state(&config, &cli, rule.as_deref()).map(|()| 0)
        }
        None => run(&config, &cli, &engine).await.map(|summary| {
            if summary.has_failures() {
                EXIT_RULE_FAILURES
            } else {
                0
            }
        }),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_FATAL);
        }
    }
}

async fn run(config: &Config, cli: &Cli, engine: &RulesEngine) -> Result<RunSummary> {
    let provider = datasources::build_provider(config)?;

    let mut dispatcher = ActionDispatcher::new();
    if !cli.dry_run {
        if let Some(ref email) = config.email {
            dispatcher =
                dispatcher.with_notifier(ActionKind::Email, Box::new(EmailNotifier::from_config(email)?));
        }
    }

    let store = StateStore::new(config.state_path(cli.state_file.as_deref())?);
    let options = RunOptions {
        dry_run: cli.dry_run,
        today: cli
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
    };

    if cli.dry_run {
        eprintln!("Weather Alerts - DRY RUN MODE");
    }

    let summary = run_alerts(
        engine,
        provider.as_ref(),
        config.fetch_days(),
        &dispatcher,
        &store,
        options,
    )
    .await?;

    print!("{}", summary.report(cli.dry_run));
    Ok(summary)
}

async fn check(config: &Config, engine: &RulesEngine) -> Result<()> {
    println!("Config OK");
    println!(
        "  Location: {:.4}, {:.4}",
        config.location.latitude, config.location.longitude
    );
    println!("  Provider: {}", config.weather.provider.as_str());
    println!("  State file: {}", config.state_path(None)?.display());

    println!("Rules:");
    for rule in engine.rules() {
        let status = if rule.enabled { "enabled" } else { "disabled" };
        println!(
            "  {} [{}] {}: {}",
            rule.name,
            rule.condition.kind(),
            status,
            rule.condition.describe()
        );
    }

    let provider = datasources::build_provider(config)?;
    match provider.test_connection().await {
        Ok(true) => println!("Weather provider ({}): OK", provider.name()),
        Ok(false) => {
            return Err(error::AlertError::DataSourceUnavailable(format!(
                "{} rejected the request",
                provider.name()
            )));
        }
        Err(e) => return Err(e),
    }

    if let Some(ref email) = config.email {
        EmailNotifier::from_config(email)?;
        println!("Email: {} recipient(s) via {}", email.to_addresses.len(), email.smtp_host);
    }

    Ok(())
}

fn reset_state(config: &Config, cli: &Cli, rule: Option<&str>) -> Result<()> {
    let store = StateStore::new(config.state_path(cli.state_file.as_deref())?);
    let cleared = reset_occurrences(&store, rule)?;

    match rule {
        Some(name) if cleared > 0 => println!("Cleared occurrence record for '{}'", name),
        Some(name) => println!("No occurrence record for '{}'", name),
        None => println!("Cleared {} occurrence record(s)", cleared),
    }
    Ok(())
}
