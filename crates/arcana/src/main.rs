// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Arcana - an asynchronous tarot reading service.
//!
//! This is the binary entry point: CLI parsing, configuration loading,
//! and dispatch to the serve loop or the admin commands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;
mod telemetry;

use clap::{Parser, Subcommand};

/// Arcana - an asynchronous tarot reading service.
#[derive(Parser, Debug)]
#[command(name = "arcana", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the reading service: gateway, batch poller, and storage.
    Serve,
    /// Inspect and validate configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Credit a user's account.
    Grant {
        /// User to credit.
        user: String,
        /// Amount of credits to add (positive).
        amount: i64,
        /// Reason recorded in the ledger.
        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Check the configuration and report all errors.
    Validate,
    /// Print the resolved configuration as TOML.
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Every command needs a valid configuration; render all errors at once.
    let config = match arcana_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            arcana_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Validate => admin::run_config_validate(&config),
            ConfigCommands::Show => admin::run_config_show(&config),
        },
        Some(Commands::Grant { user, amount, note }) => {
            admin::run_grant(&config, &user, amount, note.as_deref()).await
        }
        None => {
            println!("arcana: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
