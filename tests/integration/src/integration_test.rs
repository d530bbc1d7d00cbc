//! End-to-end integration test for the extension lifecycle
//!
//! This test exercises the complete flow: manifest on disk -> install ->
//! activate -> a fresh process boots the provider -> its filter transforms a
//! value fired by core code.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use shop_core::{BootContext, ExtensionProvider, ProviderCatalog, ProviderResult};
use shop_test_utils::TestSite;

/// Formats cart totals as a currency string.
struct AcmeProvider;

impl ExtensionProvider for AcmeProvider {
    fn boot(&self, ctx: &mut BootContext<'_>) -> ProviderResult {
        let currency: String = ctx.config_value("currency").unwrap_or_else(|| "USD".to_string());
        ctx.hooks().register_filter("cart.total.display", move |total, _| {
            let amount = total.as_f64().ok_or("cart total must be a number")?;
            Ok(json!(format!("{amount:.2} {currency}")))
        });
        Ok(())
    }
}

fn catalog() -> ProviderCatalog {
    ProviderCatalog::new().with("Acme\\Provider", || {
        Box::new(AcmeProvider) as Box<dyn ExtensionProvider>
    })
}

#[test]
fn test_acme_end_to_end() {
    let site = TestSite::new();
    site.add_discovered(json!({ "code": "acme", "provider": "Acme\\Provider" }));

    // Process 1: install
    {
        let mut host = site.provisioned_host(catalog());
        host.lifecycle().install("acme").unwrap();
        let record = host.store().find_by_code("acme").unwrap().unwrap();
        assert!(record.installed);
        assert!(!record.active);
        assert!(record.installed_at.is_some());
    }

    // Process 2: activate
    {
        let mut host = site.provisioned_host(catalog());
        host.lifecycle().activate("acme").unwrap();
        assert!(host.store().is_active("acme").unwrap());
    }

    // Process 3: boot and fire the extension point
    let host = site.host(catalog());
    let booted = host.boot().unwrap();
    assert!(booted.report.is_clean());
    assert_eq!(booted.report.booted, vec!["acme"]);

    let shown = booted
        .hooks()
        .apply_filter("cart.total.display", json!(19.99), &[])
        .unwrap();
    assert_eq!(shown, Value::String("19.99 USD".to_string()));
}

#[test]
fn test_acme_alongside_bundled_extensions() {
    let site = TestSite::new();
    site.add_discovered(json!({ "code": "acme", "provider": "Acme\\Provider" }));
    site.add_bundled(json!({ "code": "theme-data", "provider": "ThemeData\\Provider" }));

    let mut combined = shop_bundled::catalog();
    combined.extend(catalog());
    let mut host = site.provisioned_host(combined);
    for code in ["acme", "theme-data"] {
        host.lifecycle().install(code).unwrap();
        host.lifecycle().activate(code).unwrap();
    }
    let patch = json!({ "currency": "EUR" }).as_object().unwrap().clone();
    host.lifecycle().configure("acme", &patch).unwrap();

    let booted = host.boot().unwrap();
    assert_eq!(booted.report.booted, vec!["acme", "theme-data"]);
    let hooks = booted.hooks();
    assert_eq!(
        hooks.apply_filter("cart.total.display", json!(5), &[]).unwrap(),
        json!("5.00 EUR")
    );
    assert_eq!(
        hooks.apply_filter("theme.data", Value::Null, &[]).unwrap()["theme"],
        json!("classic")
    );
}

#[test]
fn test_deactivated_extension_leaves_value_untouched() {
    let site = TestSite::new();
    site.add_discovered(json!({ "code": "acme", "provider": "Acme\\Provider" }));
    let mut host = site.provisioned_host(catalog());
    host.lifecycle().install("acme").unwrap();
    host.lifecycle().activate("acme").unwrap();
    host.lifecycle().deactivate("acme").unwrap();

    let booted = host.boot().unwrap();
    let shown = booted
        .hooks()
        .apply_filter("cart.total.display", json!(19.99), &[])
        .unwrap();
    assert_eq!(shown, json!(19.99));
}
