// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use fare_watch::logging::{self, LogOptions};
use fare_watch::MonitorError;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(
    name = "fare-watch",
    about = "Flight fare monitor: alerts when the cheapest itinerary drops below a threshold",
    version,
    after_help = "Settings can also come from FARE_WATCH_* environment variables or a .env file.\nRun 'fare-watch' with no command to start monitoring."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    config: cli::ConfigArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring (the default)
    Run {
        /// Skip the startup internet connectivity check
        #[arg(long)]
        skip_network_check: bool,
    },
    /// List the generated searches and their URLs
    Keys {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch one search once and print the price found
    Fetch {
        /// Index from `fare-watch keys`
        index: usize,
        /// Save the page source when no price is found
        #[arg(long)]
        save_page: bool,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "fare-watch", &mut std::io::stdout());
        return Ok(());
    }

    let log = LogOptions {
        verbose: cli.verbose,
        json: cli.log_json,
        file: cli.log_file.clone(),
    };
    if let Err(e) = logging::init(&log) {
        eprintln!("  Warning: {e:#}");
    }

    let result = async {
        let cfg = cli.config.resolve()?;
        match cli.command {
            None => cli::run_cmd::run(cfg, false).await,
            Some(Commands::Run { skip_network_check }) => {
                cli::run_cmd::run(cfg, skip_network_check).await
            }
            Some(Commands::Keys { json }) => cli::keys_cmd::run(&cfg, json),
            Some(Commands::Fetch { index, save_page }) => {
                cli::fetch_cmd::run(&cfg, index, save_page).await
            }
            Some(Commands::Doctor) => cli::doctor::run(&cfg).await,
            Some(Commands::Completions { .. }) => Ok(()),
        }
    }
    .await;

    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "fare-watch exited with an error");
        eprintln!("  Error: {e:#}");
        let code = exit_code(e);
        if code == EXIT_CONFIG {
            eprintln!("  Check the flags and FARE_WATCH_* variables ('fare-watch --help').");
        }
        std::process::exit(code);
    }

    result
}

// Exit codes: 0=success, 1=error, 2=invalid configuration
const EXIT_ERROR: i32 = 1;
const EXIT_CONFIG: i32 = 2;

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<MonitorError>() {
        Some(e) if e.is_fatal() => EXIT_CONFIG,
        _ => EXIT_ERROR,
    }
}
