//! Cross-crate checks of the lifecycle and dispatcher guarantees

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;
use shop_core::{Error, ProviderCatalog, Transition};
use shop_hooks::{EventDispatcher, HookOptions};
use shop_test_utils::{CallLog, FailAt, FailingProvider, RecordingProvider, TestSite};

#[test]
fn install_twice_matches_install_once() {
    let site = TestSite::new();
    site.add_discovered(json!({ "code": "acme", "version": "1.0.0" }));
    let mut host = site.provisioned_host(ProviderCatalog::new());

    assert_eq!(host.lifecycle().install("acme").unwrap(), Transition::Changed);
    let once = host.store().find_by_code("acme").unwrap();
    assert_eq!(host.lifecycle().install("acme").unwrap(), Transition::Unchanged);
    let twice = host.store().find_by_code("acme").unwrap();

    assert_eq!(once, twice);
    assert_eq!(host.store().list_all().unwrap().len(), 1);
}

#[test]
fn activation_requires_install() {
    let site = TestSite::new();
    site.add_discovered(json!({ "code": "acme" }));
    let mut host = site.provisioned_host(ProviderCatalog::new());

    assert!(matches!(
        host.lifecycle().activate("acme"),
        Err(Error::NotInstalled { .. })
    ));
    host.lifecycle().install("acme").unwrap();
    assert_eq!(host.lifecycle().activate("acme").unwrap(), Transition::Changed);
}

#[test]
fn deactivate_never_fails() {
    let site = TestSite::new();
    site.add_discovered(json!({ "code": "acme" }));

    // before provisioning, on unknown codes, on inactive and active records
    let mut host = site.host(ProviderCatalog::new());
    host.lifecycle().deactivate("acme").unwrap();
    host.provision().unwrap();
    host.lifecycle().deactivate("unknown").unwrap();
    host.lifecycle().deactivate("acme").unwrap();
    host.lifecycle().install("acme").unwrap();
    host.lifecycle().activate("acme").unwrap();
    host.lifecycle().deactivate("acme").unwrap();

    assert!(!host.store().is_active("acme").unwrap());
}

#[test]
fn one_malformed_manifest_out_of_many() {
    let site = TestSite::new();
    for code in ["a", "b", "c", "d"] {
        site.add_discovered(json!({ "code": code }));
    }
    site.add_raw_discovered("e", r#"{ "name": "no code here" }"#);

    let host = site.host(ProviderCatalog::new());
    let discovery = host.scanner().scan();
    assert_eq!(discovery.manifests.len(), 4);
    assert_eq!(discovery.warnings.len(), 1);
}

#[test]
fn boot_isolation() {
    let site = TestSite::new();
    let log = CallLog::new();
    site.add_discovered(json!({ "code": "crashes", "provider": "Crashes" }));
    site.add_discovered(json!({ "code": "survives", "provider": "Survives" }));
    let catalog = ProviderCatalog::new()
        .with("Crashes", FailingProvider::factory(FailAt::Boot))
        .with("Survives", RecordingProvider::factory(&log));

    let mut host = site.provisioned_host(catalog);
    for code in ["crashes", "survives"] {
        host.lifecycle().install(code).unwrap();
        host.lifecycle().activate(code).unwrap();
    }

    let booted = host.boot().unwrap();
    assert!(log.contains("survives:boot"));
    booted.hooks().do_action("survives.booted", &[]).unwrap();
    assert!(log.contains("survives:action"));
    assert_eq!(
        booted
            .hooks()
            .apply_filter("product.card.tags", json!([]), &[])
            .unwrap(),
        json!(["survives"])
    );
    assert!(!booted.hooks().has("cart.total.display"));
}

#[test]
fn filter_priorities_run_low_to_high() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut hooks = EventDispatcher::new();
    for priority in [20, 5, 10] {
        let calls = Arc::clone(&calls);
        hooks.register_filter_with(
            "cart.total",
            HookOptions::default().priority(priority),
            move |value, _| {
                calls.lock().unwrap().push(priority);
                Ok(value)
            },
        );
    }

    hooks.apply_filter("cart.total", json!(1), &[]).unwrap();
    assert_eq!(*calls.lock().unwrap(), vec![5, 10, 20]);
    assert_eq!(hooks.apply_filter("no.such.event", json!(42), &[]).unwrap(), json!(42));
}
