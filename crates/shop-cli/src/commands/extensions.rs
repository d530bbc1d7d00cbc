//! `extensions:*` lifecycle commands

use colored::Colorize;
use serde_json::Value;
use shop_core::{ExtensionConfig, ExtensionStatus, HostConfig, Transition};

use crate::context::{open_host, open_provisioned};
use crate::error::{CliError, Result};

/// Run the extensions:list command
pub fn run_list(config: HostConfig, installed: bool, active: bool, json: bool) -> Result<()> {
    let mut host = open_host(config)?;
    let listed = match host.lifecycle().list() {
        Ok(listed) => listed,
        Err(shop_core::Error::StorageUnavailable) => {
            tracing::debug!("registry not provisioned, nothing to list");
            if json {
                println!("[]");
            } else {
                println!(
                    "{}",
                    "No extensions recorded yet; the registry is created by the first install.".dimmed()
                );
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let statuses: Vec<ExtensionStatus> = listed
        .into_iter()
        .filter(|s| !installed || s.installed)
        .filter(|s| !active || s.active)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    if statuses.is_empty() {
        let hint = if installed || active {
            "No extensions match the given filters."
        } else {
            "No extensions found."
        };
        println!("{}", hint.dimmed());
        return Ok(());
    }

    let width = statuses.iter().map(|s| s.code.len()).max().unwrap_or(4).max(4);
    let name_width = statuses.iter().map(|s| s.name.len()).max().unwrap_or(4).max(4);
    println!(
        "{}",
        format!(
            "{:<width$}  {:<name_width$}  {:<9}  {:<10}  {:<9}  {:<6}  PATH",
            "CODE", "NAME", "VERSION", "SOURCE", "INSTALLED", "ACTIVE"
        )
        .bold()
    );
    for status in &statuses {
        println!(
            "{:<width$}  {:<name_width$}  {:<9}  {:<10}  {:<9}  {:<6}  {}",
            status.code,
            status.name,
            status.version,
            status.source.to_string(),
            yes_no(status.installed),
            yes_no(status.active),
            status.path.display()
        );
        if let Some(recorded) = &status.recorded_version {
            println!(
                "  {} installed at version {}, files are at {}",
                "note:".yellow(),
                recorded,
                status.version
            );
        }
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Run the extensions:install command
pub fn run_install(config: HostConfig, code: &str) -> Result<()> {
    let mut host = open_provisioned(config)?;
    let transition = host.lifecycle().install(code)?;
    report(code, transition, "Installed", "already installed");
    Ok(())
}

/// Run the extensions:uninstall command
pub fn run_uninstall(config: HostConfig, code: &str) -> Result<()> {
    let mut host = open_provisioned(config)?;
    let transition = host.lifecycle().uninstall(code)?;
    report(code, transition, "Uninstalled", "already uninstalled");
    Ok(())
}

/// Run the extensions:activate command
pub fn run_activate(config: HostConfig, code: &str) -> Result<()> {
    let mut host = open_provisioned(config)?;
    let transition = host.lifecycle().activate(code)?;
    report(code, transition, "Activated", "already active");
    Ok(())
}

/// Run the extensions:deactivate command
pub fn run_deactivate(config: HostConfig, code: &str) -> Result<()> {
    let mut host = open_provisioned(config)?;
    let transition = host.lifecycle().deactivate(code)?;
    report(code, transition, "Deactivated", "already inactive");
    Ok(())
}

/// Run the extensions:configure command
pub fn run_configure(config: HostConfig, code: &str, settings: &[(String, String)]) -> Result<()> {
    let patch = settings_to_patch(settings);
    let mut host = open_provisioned(config)?;
    let merged = host.lifecycle().configure(code, &patch)?;

    println!("{} {}", "Configured".green().bold(), code.cyan());
    println!("{}", serde_json::to_string_pretty(&merged)?);
    Ok(())
}

/// Run the extensions:purge command
pub fn run_purge(config: HostConfig, code: &str) -> Result<()> {
    let mut host = open_provisioned(config)?;
    host.lifecycle().purge(code).map_err(|e| match e {
        shop_core::Error::StillInstalled { .. } => CliError::user(format!(
            "{e}; run `shop extensions:uninstall {code}` first"
        )),
        other => other.into(),
    })?;
    println!("{} {}", "Purged".green().bold(), code.cyan());
    Ok(())
}

fn report(code: &str, transition: Transition, done: &str, unchanged: &str) {
    match transition {
        Transition::Changed => println!("{} {}", done.green().bold(), code.cyan()),
        Transition::Unchanged => println!("{} {}", code.cyan(), unchanged.dimmed()),
    }
}

/// `key=value` pairs to a config patch. Values that parse as JSON keep their
/// type; everything else is a string.
fn settings_to_patch(settings: &[(String, String)]) -> ExtensionConfig {
    settings
        .iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_settings_keep_json_types() {
        let settings = vec![
            ("rate".to_string(), "4.95".to_string()),
            ("enabled".to_string(), "true".to_string()),
            ("zones".to_string(), r#"["eu","us"]"#.to_string()),
            ("label".to_string(), "Standard".to_string()),
            ("quoted".to_string(), r#""42""#.to_string()),
        ];
        let patch = settings_to_patch(&settings);
        assert_eq!(
            Value::Object(patch),
            json!({
                "rate": 4.95,
                "enabled": true,
                "zones": ["eu", "us"],
                "label": "Standard",
                "quoted": "42",
            })
        );
    }
}
