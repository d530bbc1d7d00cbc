//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use shop_core::MenuLocation;

/// Storefront extension manager
#[derive(Parser, Debug)]
#[command(name = "shop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to storefront.toml
    #[arg(short, long, global = true, env = "STOREFRONT_CONFIG", default_value = "storefront.toml")]
    pub config: PathBuf,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List discovered extensions and their lifecycle state
    #[command(name = "extensions:list")]
    List {
        /// Only installed extensions
        #[arg(long)]
        installed: bool,

        /// Only active extensions
        #[arg(long)]
        active: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Install a discovered extension
    #[command(name = "extensions:install")]
    Install { code: String },

    /// Uninstall an extension, keeping its stored config
    #[command(name = "extensions:uninstall")]
    Uninstall { code: String },

    /// Activate an installed extension
    #[command(name = "extensions:activate")]
    Activate { code: String },

    /// Deactivate an extension
    #[command(name = "extensions:deactivate")]
    Deactivate { code: String },

    /// Merge key=value pairs into an extension's config
    ///
    /// Values are parsed as JSON when possible, otherwise stored as strings.
    ///
    /// Examples:
    ///   shop extensions:configure flat-rate-shipping rate=4.95 free_over=50
    ///   shop extensions:configure theme-data name=midnight
    #[command(name = "extensions:configure")]
    Configure {
        code: String,

        /// Settings as key=value
        #[arg(required = true, value_parser = parse_setting)]
        settings: Vec<(String, String)>,
    },

    /// Delete an uninstalled extension's record and config
    #[command(name = "extensions:purge")]
    Purge { code: String },

    /// Boot every active extension and report the outcome
    #[command(name = "extensions:boot")]
    Boot {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Print the navigation menu after booting active extensions
    #[command(name = "menu:list")]
    MenuList {
        /// Only this menu
        #[arg(short, long, value_enum)]
        location: Option<LocationArg>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationArg {
    Admin,
    Storefront,
}

impl From<LocationArg> for MenuLocation {
    fn from(arg: LocationArg) -> Self {
        match arg {
            LocationArg::Admin => MenuLocation::Admin,
            LocationArg::Storefront => MenuLocation::Storefront,
        }
    }
}

fn parse_setting(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}
