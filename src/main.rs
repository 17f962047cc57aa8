use anyhow::{anyhow, Result};
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};

use trade_journal_lib::commands;
use trade_journal_lib::config::AppConfig;
use trade_journal_lib::db::JournalStore;
use trade_journal_lib::open_database;

/// Trade journal reports, printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "trade-journal", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Win rate, profit factor, equity curve and breakdowns for an account
    Report {
        #[arg(long)]
        email: String,
    },
    /// Calendar dashboard for one month (defaults to the current month)
    Month {
        #[arg(long)]
        email: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
    /// Full JSON backup of an account's trades and entry models
    Export {
        #[arg(long)]
        email: String,
    },
}

fn user_id_for(store: &impl JournalStore, email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    store
        .find_user_by_email(&email)?
        .map(|u| u.id)
        .ok_or_else(|| anyhow!("No account registered for {}", email))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let db = open_database(&config)?;

    let output = match cli.command {
        Command::Report { email } => {
            let user_id = user_id_for(&db, &email)?;
            serde_json::to_string_pretty(&commands::get_analytics(&db, &user_id)?)?
        }
        Command::Month { email, year, month } => {
            let user_id = user_id_for(&db, &email)?;
            let today = Local::now().date_naive();
            let summary = commands::get_month_summary(
                &db,
                &user_id,
                year.unwrap_or(today.year()),
                month.unwrap_or(today.month()),
                today,
            )?;
            serde_json::to_string_pretty(&summary)?
        }
        Command::Export { email } => {
            let user_id = user_id_for(&db, &email)?;
            commands::export_user_data(&db, &user_id)?
        }
    };

    println!("{}", output);
    Ok(())
}
