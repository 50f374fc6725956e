use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "weather-alerts",
    version,
    about = "Evaluate forecast alert rules and send notifications"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Evaluate rules and print triggered alerts without sending or saving state
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Path to config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the state file location
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    /// Evaluate as if today were this date (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub date: Option<NaiveDate>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate config and rules, and test the weather provider
    Check,
    /// Forget recorded first occurrences so they can alert again
    ResetState {
        /// Rule to reset; all rules when omitted
        rule: Option<String>,
    },
}

impl Cli {
    /// Log filter used when RUST_LOG is unset
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_flags() {
        let cli = Cli::parse_from([
            "weather-alerts",
            "--dry-run",
            "-c",
            "alerts.yaml",
            "--date",
            "2025-12-15",
            "-vv",
        ]);
        assert!(cli.dry_run);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("alerts.yaml")));
        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2025, 12, 15));
        assert_eq!(cli.log_level(), "debug");
    }

    #[test]
    fn parses_reset_state() {
        let cli = Cli::parse_from(["weather-alerts", "reset-state", "First freeze"]);
        match &cli.command {
            Some(Commands::ResetState { rule }) => assert_eq!(rule.as_deref(), Some("First freeze")),
            _ => panic!("expected reset-state"),
        }
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn rejects_bad_date() {
        assert!(Cli::try_parse_from(["weather-alerts", "--date", "12/15/2025"]).is_err());
    }
}
