//! Storefront extension manager CLI
//!
//! Manages the install/activate lifecycle of storefront extensions and
//! inspects what a boot of the active set registers.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = context::load_config(&cli.config)?;
    init_tracing(cli.verbose, &config.logging.level);
    tracing::debug!(config = %cli.config.display(), "starting");

    execute_command(cli.command, config)
}

/// Logs go to stderr. `RUST_LOG` wins over `--verbose`, which wins over the
/// configured level.
fn init_tracing(verbose: bool, configured: &str) {
    let fallback = if verbose { "debug" } else { configured };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
    if let Err(e) = installed {
        eprintln!("{} could not install logger: {}", "warning:".yellow().bold(), e);
    }
}

fn execute_command(cmd: Commands, config: shop_core::HostConfig) -> Result<()> {
    match cmd {
        Commands::List {
            installed,
            active,
            json,
        } => commands::run_list(config, installed, active, json),
        Commands::Install { code } => commands::run_install(config, &code),
        Commands::Uninstall { code } => commands::run_uninstall(config, &code),
        Commands::Activate { code } => commands::run_activate(config, &code),
        Commands::Deactivate { code } => commands::run_deactivate(config, &code),
        Commands::Configure { code, settings } => commands::run_configure(config, &code, &settings),
        Commands::Purge { code } => commands::run_purge(config, &code),
        Commands::Boot { json } => commands::run_boot(config, json),
        Commands::MenuList { location } => commands::run_menu_list(config, location.map(Into::into)),
    }
}
