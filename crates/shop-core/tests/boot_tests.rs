//! Tests for booting active extensions

use pretty_assertions::assert_eq;
use serde_json::json;
use shop_core::{BootRegistrationError, MenuLocation, ProviderCatalog};
use shop_test_utils::{CallLog, FailAt, FailingProvider, RecordingProvider, TestSite};

fn activate(site: &TestSite, catalog: &ProviderCatalog, codes: &[&str]) {
    let mut host = site.provisioned_host(catalog.clone());
    let mut lifecycle = host.lifecycle();
    for code in codes {
        lifecycle.install(code).unwrap();
        lifecycle.activate(code).unwrap();
    }
}

#[test]
fn failing_extension_does_not_block_others() {
    let site = TestSite::new();
    let log = CallLog::new();
    site.add_discovered(json!({ "code": "broken", "provider": "Broken\\Provider" }));
    site.add_discovered(json!({ "code": "healthy", "provider": "Healthy\\Provider" }));

    let mut catalog = ProviderCatalog::new();
    catalog
        .register("Broken\\Provider", FailingProvider::factory(FailAt::Boot))
        .register("Healthy\\Provider", RecordingProvider::factory(&log));
    activate(&site, &catalog, &["broken", "healthy"]);

    let booted = site.host(catalog).boot().unwrap();

    assert_eq!(booted.report.booted, vec!["healthy"]);
    assert_eq!(booted.report.failed.len(), 1);
    assert_eq!(booted.report.failed[0].code, "broken");
    assert!(matches!(booted.report.failed[0].error, BootRegistrationError::Boot { .. }));

    // the broken provider's partial registration was stripped
    assert!(!booted.hooks().has("cart.total.display"));
    booted.hooks().do_action("healthy.booted", &[]).unwrap();
    assert!(log.contains("healthy:action"));
}

#[test]
fn panicking_and_unregistrable_providers_are_isolated() {
    let site = TestSite::new();
    let log = CallLog::new();
    site.add_discovered(json!({ "code": "a-panics", "provider": "Panics" }));
    site.add_discovered(json!({ "code": "b-refuses", "provider": "Refuses" }));
    site.add_discovered(json!({ "code": "c-works", "provider": "Works" }));

    let catalog = ProviderCatalog::new()
        .with("Panics", FailingProvider::factory(FailAt::BootPanic))
        .with("Refuses", FailingProvider::factory(FailAt::Register))
        .with("Works", RecordingProvider::factory(&log));
    activate(&site, &catalog, &["a-panics", "b-refuses", "c-works"]);

    let booted = site.host(catalog).boot().unwrap();

    assert_eq!(booted.report.booted, vec!["c-works"]);
    let mut failed: Vec<&str> = booted.report.failed.iter().map(|f| f.code.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed, vec!["a-panics", "b-refuses"]);
    assert_eq!(log.entries(), vec!["c-works:install", "c-works:register", "c-works:boot"]);
}

#[test]
fn active_extension_missing_from_disk_is_skipped() {
    let site = TestSite::new();
    let log = CallLog::new();
    site.add_discovered(json!({ "code": "gone", "provider": "Rec" }));
    site.add_discovered(json!({ "code": "kept", "provider": "Rec" }));
    let catalog = ProviderCatalog::new().with("Rec", RecordingProvider::factory(&log));
    activate(&site, &catalog, &["gone", "kept"]);
    site.remove_discovered("gone");

    let booted = site.host(catalog).boot().unwrap();

    assert_eq!(booted.report.booted, vec!["kept"]);
    assert_eq!(booted.report.skipped.len(), 1);
    assert_eq!(booted.report.skipped[0].code, "gone");
    assert!(booted.report.failed.is_empty());
}

#[test]
fn unresolvable_provider_is_reported() {
    let site = TestSite::new();
    site.add_discovered(json!({ "code": "acme", "provider": "Acme\\Provider" }));
    activate(&site, &ProviderCatalog::new(), &["acme"]);

    let booted = site.host(ProviderCatalog::new()).boot().unwrap();

    assert!(booted.report.booted.is_empty());
    assert!(matches!(
        booted.report.failed[0].error,
        BootRegistrationError::Unresolved { .. }
    ));
}

#[test]
fn inactive_extensions_do_not_boot() {
    let site = TestSite::new();
    let log = CallLog::new();
    site.add_discovered(json!({ "code": "acme", "provider": "Rec" }));
    let catalog = ProviderCatalog::new().with("Rec", RecordingProvider::factory(&log));
    {
        let mut host = site.provisioned_host(catalog.clone());
        host.lifecycle().install("acme").unwrap();
    }

    let booted = site.host(catalog).boot().unwrap();
    assert!(booted.report.booted.is_empty());
    assert!(!log.contains("acme:boot"));
}

#[test]
fn boot_order_and_hook_order_are_deterministic() {
    let site = TestSite::new();
    let log = CallLog::new();
    for code in ["zeta", "alpha", "mid"] {
        site.add_discovered(json!({ "code": code, "provider": "Rec" }));
    }
    let catalog = ProviderCatalog::new().with("Rec", RecordingProvider::factory(&log));
    activate(&site, &catalog, &["zeta", "alpha", "mid"]);

    let tags = |catalog: ProviderCatalog| {
        let booted = site.host(catalog).boot().unwrap();
        booted
            .hooks()
            .apply_filter("product.card.tags", json!([]), &[])
            .unwrap()
    };

    let first = tags(catalog.clone());
    let second = tags(catalog);
    assert_eq!(first, json!(["alpha", "mid", "zeta"]));
    assert_eq!(first, second);
}

#[test]
fn declarative_provider_contributes_menu_entries() {
    let site = TestSite::new();
    let dir = site.add_discovered(json!({ "code": "reports", "provider_file": "provider.toml" }));
    site.write_extension_file(
        &dir,
        "provider.toml",
        r#"
[config]
window_days = 30

[[menu]]
key = "reports"
title = "Reports"
url = "/admin/reports"
location = "admin"
order = 40
"#,
    );
    activate(&site, &ProviderCatalog::new(), &["reports"]);

    let host = site.host(ProviderCatalog::new());
    let booted = host.boot().unwrap();
    assert_eq!(booted.report.booted, vec!["reports"]);

    let admin = host.menu(booted.hooks()).entries(MenuLocation::Admin).unwrap();
    assert!(admin.iter().any(|e| e.key == "reports" && e.title == "Reports"));

    let record = host.store().find_by_code("reports").unwrap().unwrap();
    assert_eq!(record.config.get("window_days"), Some(&json!(30)));
}

#[test]
fn newly_activated_extension_appears_on_next_boot() {
    let site = TestSite::new();
    let log = CallLog::new();
    site.add_discovered(json!({ "code": "acme", "provider": "Rec" }));
    let catalog = ProviderCatalog::new().with("Rec", RecordingProvider::factory(&log));
    let mut host = site.provisioned_host(catalog);

    let before = host.boot().unwrap();
    assert!(before.report.booted.is_empty());

    host.lifecycle().install("acme").unwrap();
    host.lifecycle().activate("acme").unwrap();

    // the earlier container is unaffected; a fresh boot picks the change up
    assert!(!before.hooks().has("acme.booted"));
    assert!(host.boot().unwrap().hooks().has("acme.booted"));
}
