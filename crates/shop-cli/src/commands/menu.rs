//! menu:list command implementation

use colored::Colorize;
use shop_core::{HostConfig, MenuLocation, MenuNode};

use crate::context::open_host;
use crate::error::Result;

/// Run the menu:list command
pub fn run_menu_list(config: HostConfig, location: Option<MenuLocation>) -> Result<()> {
    let host = open_host(config)?;
    let booted = host.boot()?;
    let menu = host.menu(booted.hooks());

    let locations = match location {
        Some(location) => vec![location],
        None => vec![MenuLocation::Admin, MenuLocation::Storefront],
    };

    for (i, location) in locations.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}:", location.as_str().bold());
        let tree = menu.tree(location)?;
        if tree.is_empty() {
            println!("  {}", "No entries".dimmed());
        }
        for node in &tree {
            print_node(node, 1);
        }
    }
    Ok(())
}

fn print_node(node: &MenuNode, depth: usize) {
    println!(
        "{}{:<16} {}",
        "  ".repeat(depth),
        node.entry.title,
        node.entry.url.dimmed()
    );
    for child in &node.children {
        print_node(child, depth + 1);
    }
}
