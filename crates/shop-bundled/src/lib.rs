//! First-party extensions shipped with the storefront host.
//!
//! Each module implements [`ExtensionProvider`](shop_core::ExtensionProvider)
//! for one extension under `extensions/bundled/`. [`catalog`] maps the
//! provider names their manifests declare to constructors.
//!
//! | Code | Provider name | Extension points |
//! |------|---------------|------------------|
//! | `flat-rate-shipping` | `FlatRateShipping\Provider` | `cart.shipping` filter, admin menu |
//! | `product-badges` | `ProductBadges\Provider` | `product.card.tags` filter |
//! | `theme-data` | `ThemeData\Provider` | `theme.data` filter |

pub mod badges;
pub mod shipping;
pub mod theme;

pub use badges::ProductBadges;
pub use shipping::{FlatRate, FlatRateShipping};
pub use theme::ThemeData;

use shop_core::{ExtensionProvider, ProviderCatalog};

/// Catalog with every bundled provider.
pub fn catalog() -> ProviderCatalog {
    ProviderCatalog::new()
        .with(shipping::PROVIDER_NAME, || {
            Box::new(FlatRateShipping) as Box<dyn ExtensionProvider>
        })
        .with(badges::PROVIDER_NAME, || {
            Box::new(ProductBadges) as Box<dyn ExtensionProvider>
        })
        .with(theme::PROVIDER_NAME, || {
            Box::new(ThemeData) as Box<dyn ExtensionProvider>
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lists_every_provider() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 3);
        for name in [
            shipping::PROVIDER_NAME,
            badges::PROVIDER_NAME,
            theme::PROVIDER_NAME,
        ] {
            assert!(catalog.contains(name), "{name} missing");
        }
    }
}
