//! Providers for exercising the lifecycle and boot layers.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use shop_core::{
    BootContext, ExtensionProvider, InstallContext, ProviderResult, RegisterContext,
};

/// Shared, cloneable record of provider calls such as `"acme:boot"`.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == entry)
    }
}

/// Logs every call and, at boot, registers an action on `<code>.booted` and a
/// filter on `<code>.tag` that appends the code to an array.
#[derive(Debug, Clone)]
pub struct RecordingProvider {
    log: CallLog,
}

impl RecordingProvider {
    pub fn new(log: &CallLog) -> Self {
        Self { log: log.clone() }
    }

    /// Catalog factory producing providers that share `log`.
    pub fn factory(log: &CallLog) -> impl Fn() -> Box<dyn ExtensionProvider> + Send + Sync + 'static {
        let log = log.clone();
        move || Box::new(RecordingProvider::new(&log)) as Box<dyn ExtensionProvider>
    }
}

impl ExtensionProvider for RecordingProvider {
    fn register(&self, ctx: &mut RegisterContext<'_>) -> ProviderResult {
        self.log.push(format!("{}:register", ctx.manifest().code));
        Ok(())
    }

    fn boot(&self, ctx: &mut BootContext<'_>) -> ProviderResult {
        let code = ctx.code().to_string();
        self.log.push(format!("{code}:boot"));

        let log = self.log.clone();
        let fired = code.clone();
        ctx.hooks()
            .register_action(&format!("{code}.booted"), move |_| {
                log.push(format!("{fired}:action"));
                Ok(())
            });

        let tag = code.clone();
        ctx.hooks().register_filter("product.card.tags", move |value, _| {
            let mut tags = match value {
                Value::Array(tags) => tags,
                Value::Null => Vec::new(),
                other => vec![other],
            };
            tags.push(json!(tag));
            Ok(Value::Array(tags))
        });
        Ok(())
    }

    fn install(&self, ctx: &InstallContext<'_>) -> ProviderResult {
        self.log.push(format!("{}:install", ctx.manifest().code));
        Ok(())
    }

    fn uninstall(&self, ctx: &InstallContext<'_>) -> ProviderResult {
        self.log.push(format!("{}:uninstall", ctx.manifest().code));
        Ok(())
    }
}

/// Where a [`FailingProvider`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Register,
    /// Registers a hook first, then fails.
    Boot,
    /// Panics during boot.
    BootPanic,
    Install,
}

/// Provider that fails at one chosen step.
#[derive(Debug, Clone, Copy)]
pub struct FailingProvider {
    at: FailAt,
}

impl FailingProvider {
    pub fn new(at: FailAt) -> Self {
        Self { at }
    }

    pub fn factory(at: FailAt) -> impl Fn() -> Box<dyn ExtensionProvider> + Send + Sync + 'static {
        move || Box::new(FailingProvider::new(at)) as Box<dyn ExtensionProvider>
    }
}

impl ExtensionProvider for FailingProvider {
    fn register(&self, _ctx: &mut RegisterContext<'_>) -> ProviderResult {
        if self.at == FailAt::Register {
            return Err("register failed on purpose".into());
        }
        Ok(())
    }

    fn boot(&self, ctx: &mut BootContext<'_>) -> ProviderResult {
        match self.at {
            FailAt::Boot => {
                ctx.hooks().register_filter("cart.total.display", |_, _| Ok(json!("broken")));
                Err("boot failed on purpose".into())
            }
            FailAt::BootPanic => panic!("boot panicked on purpose"),
            _ => Ok(()),
        }
    }

    fn install(&self, _ctx: &InstallContext<'_>) -> ProviderResult {
        if self.at == FailAt::Install {
            return Err("install failed on purpose".into());
        }
        Ok(())
    }
}
