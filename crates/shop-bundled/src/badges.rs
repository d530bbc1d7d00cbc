//! Product card badges.
//!
//! Appends `sale`, `new`, `low-stock` or `sold-out` to the tags shown on a
//! product card, based on the product facts passed along with the filter.

use serde::Deserialize;
use serde_json::Value;
use shop_core::{BootContext, ExtensionProvider, HookOptions, ProviderResult};

pub const PROVIDER_NAME: &str = "ProductBadges\\Provider";

/// Filter fired with the current tag list and the product.
pub const TAGS_EVENT: &str = "product.card.tags";

/// The subset of a product the badges look at.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductFacts {
    pub on_sale: bool,
    pub age_days: Option<u32>,
    pub stock: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Thresholds {
    new_within_days: u32,
    low_stock: u32,
}

impl Thresholds {
    fn badges(&self, product: &ProductFacts) -> Vec<&'static str> {
        let mut badges = Vec::new();
        if product.on_sale {
            badges.push("sale");
        }
        if product.age_days.is_some_and(|age| age <= self.new_within_days) {
            badges.push("new");
        }
        match product.stock {
            Some(0) => badges.push("sold-out"),
            Some(stock) if stock <= self.low_stock => badges.push("low-stock"),
            _ => {}
        }
        badges
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductBadges;

impl ExtensionProvider for ProductBadges {
    fn boot(&self, ctx: &mut BootContext<'_>) -> ProviderResult {
        let thresholds = Thresholds {
            new_within_days: ctx.config_value("new_within_days").unwrap_or(30),
            low_stock: ctx.config_value("low_stock").unwrap_or(5),
        };

        // runs early so theme filters see the badges
        ctx.hooks().register_filter_with(
            TAGS_EVENT,
            HookOptions::default().priority(5).accepted_args(2),
            move |tags, args| {
                let product: ProductFacts = match args.first() {
                    Some(product) => serde_json::from_value(product.clone())?,
                    None => return Ok(tags),
                };
                let mut tags = match tags {
                    Value::Array(tags) => tags,
                    Value::Null => Vec::new(),
                    other => vec![other],
                };
                for badge in thresholds.badges(&product) {
                    if !tags.iter().any(|t| t == badge) {
                        tags.push(Value::from(badge));
                    }
                }
                Ok(Value::Array(tags))
            },
        );
        Ok(())
    }
}
