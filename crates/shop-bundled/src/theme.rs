//! Theme data injection.
//!
//! Fills the `theme.data` payload handed to templates with the configured
//! theme name and palette. Keys already present in the payload win.

use serde_json::{Map, Value, json};
use shop_core::{BootContext, ExtensionProvider, ProviderResult};

pub const PROVIDER_NAME: &str = "ThemeData\\Provider";

pub const THEME_EVENT: &str = "theme.data";

fn default_palette() -> Map<String, Value> {
    let palette = json!({
        "primary": "#1f6feb",
        "accent": "#f78166",
        "background": "#ffffff",
    });
    match palette {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThemeData;

impl ExtensionProvider for ThemeData {
    fn boot(&self, ctx: &mut BootContext<'_>) -> ProviderResult {
        let name: String = ctx.config_value("name").unwrap_or_else(|| "classic".to_string());
        let mut palette = default_palette();
        if let Some(overrides) = ctx.config_value::<Map<String, Value>>("palette") {
            palette.extend(overrides);
        }

        ctx.hooks().register_filter(THEME_EVENT, move |data, _| {
            let mut data = match data {
                Value::Object(data) => data,
                Value::Null => Map::new(),
                other => return Err(format!("theme data must be an object, got {other}").into()),
            };
            data.entry("theme").or_insert_with(|| json!(name));
            let slot = data
                .entry("palette")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(existing) = slot {
                for (key, value) in &palette {
                    existing.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            Ok(Value::Object(data))
        });
        Ok(())
    }
}
