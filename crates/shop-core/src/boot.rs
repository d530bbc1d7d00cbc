//! Per-process bootstrap of active extensions.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use serde::Serialize;
use shop_extensions::ManifestScanner;
use shop_registry::ExtensionStore;

use crate::container::{ServiceContainer, panic_message};
use crate::error::{BootRegistrationError, Result};
use crate::provider::{ProviderCatalog, ProviderOrigin};

/// An active extension that was not booted, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootSkip {
    pub code: String,
    pub reason: String,
}

/// An active extension whose provider failed.
#[derive(Debug, Serialize)]
pub struct BootFailure {
    pub code: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: BootRegistrationError,
}

fn serialize_display<S: serde::Serializer>(
    error: &BootRegistrationError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of one boot pass.
#[derive(Debug, Default, Serialize)]
pub struct BootReport {
    /// Codes whose providers registered and booted, in boot order.
    pub booted: Vec<String>,
    pub skipped: Vec<BootSkip>,
    pub failed: Vec<BootFailure>,
}

impl BootReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

impl fmt::Display for BootReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} booted, {} skipped, {} failed",
            self.booted.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}

/// Boots every active extension into a [`ServiceContainer`].
///
/// Reads the active set from the registry and a fresh scan from disk, so
/// extensions added or removed since the last process show up immediately.
/// Each extension is isolated: a missing manifest is skipped, and a provider
/// that cannot be resolved, fails, or panics is reported without stopping
/// the others.
pub struct BootOrchestrator<'a> {
    store: &'a ExtensionStore,
    scanner: &'a ManifestScanner,
    catalog: &'a ProviderCatalog,
}

impl<'a> BootOrchestrator<'a> {
    pub fn new(store: &'a ExtensionStore, scanner: &'a ManifestScanner, catalog: &'a ProviderCatalog) -> Self {
        Self {
            store,
            scanner,
            catalog,
        }
    }

    /// Register and boot every active extension.
    ///
    /// Only storage errors are returned; per-extension problems end up in the
    /// report.
    pub fn boot_active_extensions(&self, container: &mut ServiceContainer) -> Result<BootReport> {
        let started_at = Instant::now();
        let active = self.store.list_active()?;
        let discovery = self.scanner.scan();
        let mut report = BootReport::default();

        for record in active {
            let code = record.code;
            let Some(manifest) = discovery.find(&code) else {
                tracing::warn!(code = %code, "active extension has no manifest on disk, skipping");
                report.skipped.push(BootSkip {
                    code,
                    reason: "manifest not found".to_string(),
                });
                continue;
            };

            let resolved = catch_unwind(AssertUnwindSafe(|| self.catalog.resolve(manifest)))
                .unwrap_or_else(|payload| {
                    Err(BootRegistrationError::Panicked {
                        code: code.clone(),
                        phase: "resolve",
                        message: panic_message(payload.as_ref()),
                    })
                });
            let resolved = match resolved {
                Ok(resolved) => resolved,
                Err(error) => {
                    fail(&mut report, error);
                    continue;
                }
            };

            log_origin(&code, &resolved.origin);
            if let Err(error) = container.register(manifest.clone(), record.config, resolved.provider) {
                fail(&mut report, error);
            }
        }

        for error in container.boot() {
            fail(&mut report, error);
        }
        report.booted = container
            .provider_codes()
            .into_iter()
            .map(str::to_string)
            .collect();

        tracing::info!(
            booted = report.booted.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            hooks = container.hooks().len(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "extension boot complete"
        );
        Ok(report)
    }
}

fn log_origin(code: &str, origin: &ProviderOrigin) {
    tracing::debug!(code, origin = %origin, "resolved extension provider");
}

fn fail(report: &mut BootReport, error: BootRegistrationError) {
    tracing::error!(code = error.code(), error = %error, "extension failed to boot");
    report.failed.push(BootFailure {
        code: error.code().to_string(),
        error,
    });
}
