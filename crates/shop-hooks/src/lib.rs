//! Action/filter event dispatcher for the storefront host.
//!
//! Core code fires named events at its extension points; extensions register
//! callbacks against those names while they boot. Two independent namespaces
//! exist:
//!
//! - **actions** run for their side effects, return values are discarded;
//! - **filters** pipe a value through every callback and return the result.
//!
//! Callbacks run in `(priority ascending, registration order ascending)`
//! order. The order is fixed at registration time so dispatch never sorts.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use shop_hooks::{EventDispatcher, HookOptions};
//!
//! let mut hooks = EventDispatcher::new();
//! hooks.register_filter("cart.total.display", |value, _args| {
//!     Ok(json!(format!("${:.2}", value.as_f64().unwrap_or_default())))
//! });
//! hooks.register_filter_with(
//!     "cart.total.display",
//!     HookOptions::default().priority(5),
//!     |value, _args| Ok(json!(value.as_f64().unwrap_or_default() * 2.0)),
//! );
//!
//! let shown = hooks.apply_filter("cart.total.display", json!(10.0), &[]).unwrap();
//! assert_eq!(shown, json!("$20.00"));
//! assert_eq!(hooks.apply_filter("no.such.event", json!(42), &[]).unwrap(), json!(42));
//! ```

pub mod dispatcher;
pub mod error;

pub use dispatcher::{
    CallbackError, CallbackErrorPolicy, CallbackResult, DEFAULT_ACCEPTED_ARGS, DEFAULT_PRIORITY,
    EventDispatcher, EventSummary, HookId, HookKind, HookOptions, ScopedDispatcher,
};
pub use error::{Error, Result};
