//! Flat rate shipping.
//!
//! Quotes one fixed rate per cart through the `cart.shipping` filter, free
//! above an optional subtotal threshold. Settings live in the extension's
//! stored config:
//!
//! ```json
//! { "rate": 4.95, "free_over": 50.0 }
//! ```

use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shop_core::{
    BootContext, ExtensionProvider, HookOptions, InstallContext, MenuEntry, MenuLocation,
    ProviderResult, RegisterContext,
};

pub const PROVIDER_NAME: &str = "FlatRateShipping\\Provider";

/// Filter fired with the current quote and the cart subtotal.
pub const SHIPPING_EVENT: &str = "cart.shipping";

const ZONES_TABLE: &str = "flat_rate_shipping_zones";
const DEFAULT_RATE: f64 = 5.0;

/// The rate in effect for this boot, bound as a service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatRate {
    pub rate: f64,
    pub free_over: Option<f64>,
}

impl Default for FlatRate {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE,
            free_over: None,
        }
    }
}

impl FlatRate {
    pub fn quote(&self, subtotal: f64) -> f64 {
        match self.free_over {
            Some(threshold) if subtotal >= threshold => 0.0,
            _ => self.rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlatRateShipping;

impl ExtensionProvider for FlatRateShipping {
    fn register(&self, ctx: &mut RegisterContext<'_>) -> ProviderResult {
        let rate = FlatRate {
            rate: ctx.config_value("rate").unwrap_or(DEFAULT_RATE),
            free_over: ctx.config_value("free_over"),
        };
        if rate.rate < 0.0 {
            return Err(format!("shipping rate must not be negative, got {}", rate.rate).into());
        }
        ctx.provide(rate);
        Ok(())
    }

    fn boot(&self, ctx: &mut BootContext<'_>) -> ProviderResult {
        let rate = *ctx
            .service::<FlatRate>()
            .ok_or("flat rate service was not registered")?;

        ctx.hooks().register_filter_with(
            SHIPPING_EVENT,
            HookOptions::default().accepted_args(2),
            move |quote, args| {
                let subtotal = args.first().and_then(Value::as_f64).unwrap_or_default();
                let quoted = rate.quote(subtotal);
                // keep a cheaper quote from an earlier filter
                Ok(match quote.as_f64() {
                    Some(existing) if existing < quoted => quote,
                    _ => json!(quoted),
                })
            },
        );

        ctx.add_menu_entry(
            MenuEntry::new("shipping", "Shipping", "/admin/settings/shipping", MenuLocation::Admin)
                .with_parent("settings")
                .with_order(20),
        );
        tracing::debug!(rate = rate.rate, free_over = ?rate.free_over, "flat rate shipping ready");
        Ok(())
    }

    fn install(&self, ctx: &InstallContext<'_>) -> ProviderResult {
        let code = &ctx.manifest().code;
        ctx.tx().connection().execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {ZONES_TABLE} (
                zone TEXT PRIMARY KEY,
                rate REAL NOT NULL
            );"
        ))?;
        ctx.tx().connection().execute(
            &format!("INSERT OR IGNORE INTO {ZONES_TABLE} (zone, rate) VALUES (?1, ?2)"),
            params!["default", DEFAULT_RATE],
        )?;

        let existing = ctx.tx().find_by_code(code)?.map(|r| r.config).unwrap_or_default();
        if !existing.contains_key("rate") {
            let defaults = json!({ "rate": DEFAULT_RATE });
            if let Value::Object(defaults) = defaults {
                ctx.tx().merge_config(code, &defaults)?;
            }
        }
        Ok(())
    }

    fn uninstall(&self, ctx: &InstallContext<'_>) -> ProviderResult {
        ctx.tx()
            .connection()
            .execute_batch(&format!("DROP TABLE IF EXISTS {ZONES_TABLE};"))?;
        Ok(())
    }
}
