//! Shared test utilities for the storefront workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`site`]: [`TestSite`] builder, a temporary host root with extension
//!   directories and a config file
//! - [`providers`]: providers that record what the host asks of them, or fail
//!   on purpose

pub mod providers;
pub mod site;

pub use providers::{CallLog, FailAt, FailingProvider, RecordingProvider};
pub use site::TestSite;
