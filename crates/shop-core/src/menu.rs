//! Navigation menus assembled through the event dispatcher.
//!
//! Persisted entries (core navigation) seed a filter chain on
//! `menu.<location>.items`; every booted extension may append its own entries
//! to that chain. The resolved list is de-duplicated by key (the last
//! contribution wins), inactive entries are dropped, and the remainder is
//! arranged into a tree by `parent_key`.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use shop_hooks::{EventDispatcher, HookId, HookOptions, ScopedDispatcher};
use shop_registry::{ExtensionStore, MenuEntry, MenuLocation};

use crate::error::Result;

/// Filter event carrying the entries for `location`.
pub fn menu_event(location: MenuLocation) -> String {
    format!("menu.{location}.items")
}

/// Navigation every host starts with. Written at provisioning.
pub fn core_entries() -> Vec<MenuEntry> {
    vec![
        MenuEntry::new("dashboard", "Dashboard", "/admin", MenuLocation::Admin).with_order(0),
        MenuEntry::new("catalog", "Catalog", "/admin/catalog", MenuLocation::Admin).with_order(10),
        MenuEntry::new("orders", "Orders", "/admin/orders", MenuLocation::Admin).with_order(20),
        MenuEntry::new("settings", "Settings", "/admin/settings", MenuLocation::Admin).with_order(90),
        MenuEntry::new("extensions", "Extensions", "/admin/extensions", MenuLocation::Admin)
            .with_parent("settings")
            .with_order(10),
        MenuEntry::new("home", "Home", "/", MenuLocation::Storefront).with_order(0),
        MenuEntry::new("shop", "Shop", "/products", MenuLocation::Storefront).with_order(10),
    ]
}

/// Append `entry` to its location's menu filter.
pub fn register_entry(hooks: &mut ScopedDispatcher<'_>, entry: MenuEntry) -> HookId {
    let event = menu_event(entry.location);
    hooks.register_filter_with(&event, HookOptions::default(), move |items, _| {
        let mut items = match items {
            Value::Array(items) => items,
            other => return Err(format!("menu items must be an array, got {other}").into()),
        };
        items.push(serde_json::to_value(&entry)?);
        Ok(Value::Array(items))
    })
}

/// One resolved menu node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuNode {
    #[serde(flatten)]
    pub entry: MenuEntry,
    pub children: Vec<MenuNode>,
}

/// Read-only view combining persisted and hook-contributed entries.
#[derive(Debug, Clone, Copy)]
pub struct MenuRegistry<'a> {
    store: &'a ExtensionStore,
    hooks: &'a EventDispatcher,
}

impl<'a> MenuRegistry<'a> {
    pub fn new(store: &'a ExtensionStore, hooks: &'a EventDispatcher) -> Self {
        Self { store, hooks }
    }

    /// Active entries for `location`, flat, sorted by `(order, key)`.
    pub fn entries(&self, location: MenuLocation) -> Result<Vec<MenuEntry>> {
        let seeded = self.store.list_menu_entries(Some(location))?;
        let event = menu_event(location);
        let items: Vec<MenuEntry> = self.hooks.apply_filter_as(&event, seeded, &[])?;

        let mut by_key: BTreeMap<String, MenuEntry> = BTreeMap::new();
        for item in items.into_iter().filter(|item| item.location == location) {
            by_key.insert(item.key.clone(), item);
        }

        let mut entries: Vec<MenuEntry> = by_key.into_values().filter(|e| e.active).collect();
        entries.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.key.cmp(&b.key)));
        Ok(entries)
    }

    /// Entries for `location` arranged by parent.
    pub fn tree(&self, location: MenuLocation) -> Result<Vec<MenuNode>> {
        Ok(build_tree(self.entries(location)?))
    }
}

/// Arrange sorted entries into a forest.
///
/// Entries whose parent is missing (or inactive) become top-level, as do
/// entries caught in a parent cycle.
pub fn build_tree(entries: Vec<MenuEntry>) -> Vec<MenuNode> {
    let keys: HashSet<&str> = entries.iter().map(|e| e.key.as_str()).collect();
    let is_root = |entry: &MenuEntry| {
        entry
            .parent_key
            .as_deref()
            .is_none_or(|parent| parent == entry.key || !keys.contains(parent))
    };

    let mut placed: HashSet<String> = HashSet::new();
    let mut roots: Vec<MenuNode> = entries
        .iter()
        .filter(|e| is_root(*e))
        .map(|e| attach(e, &entries, &mut placed))
        .collect();

    for entry in &entries {
        if !placed.contains(&entry.key) {
            tracing::warn!(key = %entry.key, "menu entry is part of a parent cycle, showing it top-level");
            roots.push(attach(entry, &entries, &mut placed));
        }
    }
    roots
}

fn attach(entry: &MenuEntry, all: &[MenuEntry], placed: &mut HashSet<String>) -> MenuNode {
    placed.insert(entry.key.clone());
    let mut node = MenuNode {
        entry: entry.clone(),
        children: Vec::new(),
    };
    for child in all {
        if child.parent_key.as_deref() == Some(entry.key.as_str())
            && child.key != entry.key
            && !placed.contains(&child.key)
        {
            node.children.push(attach(child, all, placed));
        }
    }
    node
}
