//! extensions:boot command implementation

use colored::Colorize;
use serde_json::json;
use shop_core::HostConfig;

use crate::context::open_host;
use crate::error::Result;

/// Run the extensions:boot command
pub fn run_boot(config: HostConfig, json: bool) -> Result<()> {
    let host = open_host(config)?;
    let booted = host.boot()?;
    let report = &booted.report;
    let hooks = booted.hooks();

    if json {
        let events: Vec<_> = hooks
            .summary()
            .into_iter()
            .map(|s| json!({ "kind": s.kind.to_string(), "event": s.event, "callbacks": s.callbacks }))
            .collect();
        let out = json!({ "report": serde_json::to_value(report)?, "hooks": events });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} {}", "Boot".bold(), report);
    println!();

    println!("{}:", "Booted".bold());
    if report.booted.is_empty() {
        println!("  {}", "None".dimmed());
    }
    for code in &report.booted {
        println!("  {} {}", "+".green(), code.cyan());
    }

    if !report.skipped.is_empty() {
        println!();
        println!("{}:", "Skipped".bold());
        for skip in &report.skipped {
            println!("  {} {} ({})", "-".yellow(), skip.code.cyan(), skip.reason);
        }
    }

    if !report.failed.is_empty() {
        println!();
        println!("{}:", "Failed".bold());
        for failure in &report.failed {
            println!("  {} {}: {}", "x".red(), failure.code.cyan(), failure.error);
        }
    }

    println!();
    println!("{}: {}", "Hooks".bold(), hooks.len());
    for summary in hooks.summary() {
        println!(
            "  {:<6}  {:<28} {}",
            summary.kind.to_string(),
            summary.event,
            summary.callbacks
        );
    }
    Ok(())
}
