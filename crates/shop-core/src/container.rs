//! Per-process service container: the event dispatcher, typed services, and
//! the providers of every extension that registered this boot.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use shop_extensions::ExtensionManifest;
use shop_hooks::{CallbackErrorPolicy, EventDispatcher};
use shop_registry::ExtensionConfig;

use crate::error::BootRegistrationError;
use crate::provider::{BootContext, ExtensionProvider, RegisterContext};

struct ServiceSlot {
    owner: Option<String>,
    value: Box<dyn Any + Send + Sync>,
    /// Binding from another owner that this one replaced.
    displaced: Option<Box<ServiceSlot>>,
}

impl ServiceSlot {
    /// This slot with every layer bound by `owner` peeled off.
    fn without_owner(self, owner: &str, removed: &mut usize) -> Option<ServiceSlot> {
        let displaced = self
            .displaced
            .and_then(|slot| slot.without_owner(owner, removed))
            .map(Box::new);
        if self.owner.as_deref() == Some(owner) {
            *removed += 1;
            return displaced.map(|slot| *slot);
        }
        Some(ServiceSlot {
            owner: self.owner,
            value: self.value,
            displaced,
        })
    }
}

/// Typed service bindings, one per type.
#[derive(Default)]
pub struct Services {
    slots: HashMap<TypeId, ServiceSlot>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("bindings", &self.slots.len())
            .finish()
    }
}

impl Services {
    /// Bind a host-owned service.
    pub fn insert<T: Send + Sync + 'static>(&mut self, service: T) {
        self.slots.insert(
            TypeId::of::<T>(),
            ServiceSlot {
                owner: None,
                value: Box::new(service),
                displaced: None,
            },
        );
    }

    /// Bind a service on behalf of an extension. A binding it replaces is
    /// kept and comes back if the extension is stripped.
    pub(crate) fn insert_owned<T: Send + Sync + 'static>(&mut self, owner: &str, service: T) {
        let key = TypeId::of::<T>();
        let displaced = match self.slots.remove(&key) {
            Some(previous) if previous.owner.as_deref() == Some(owner) => previous.displaced,
            Some(previous) => {
                tracing::debug!(
                    owner,
                    replaced = previous.owner.as_deref().unwrap_or("host"),
                    service = std::any::type_name::<T>(),
                    "service binding replaced"
                );
                Some(Box::new(previous))
            }
            None => None,
        };
        self.slots.insert(
            key,
            ServiceSlot {
                owner: Some(owner.to_string()),
                value: Box::new(service),
                displaced,
            },
        );
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.value.downcast_ref::<T>())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every binding made by `owner`, restoring what each one replaced.
    pub fn remove_owned_by(&mut self, owner: &str) -> usize {
        let mut removed = 0;
        self.slots = std::mem::take(&mut self.slots)
            .into_iter()
            .filter_map(|(key, slot)| slot.without_owner(owner, &mut removed).map(|slot| (key, slot)))
            .collect();
        removed
    }
}

struct Registered {
    manifest: ExtensionManifest,
    config: ExtensionConfig,
    provider: Box<dyn ExtensionProvider>,
    booted: bool,
}

/// Container built fresh for each process bootstrap.
///
/// Providers are registered one by one, then [`boot`](Self::boot) runs every
/// provider's boot routine in registration order. A provider that fails (or
/// panics) in either step has its hooks and services stripped again so it
/// leaves nothing half-registered behind.
pub struct ServiceContainer {
    hooks: EventDispatcher,
    services: Services,
    providers: Vec<Registered>,
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("hooks", &self.hooks)
            .field("services", &self.services)
            .field("providers", &self.provider_codes())
            .finish()
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new(CallbackErrorPolicy::default())
    }
}

impl ServiceContainer {
    pub fn new(policy: CallbackErrorPolicy) -> Self {
        Self {
            hooks: EventDispatcher::with_policy(policy),
            services: Services::default(),
            providers: Vec::new(),
        }
    }

    pub fn hooks(&self) -> &EventDispatcher {
        &self.hooks
    }

    /// Mutable dispatcher access for core code registering its own hooks.
    pub fn hooks_mut(&mut self) -> &mut EventDispatcher {
        &mut self.hooks
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    /// Codes of registered providers, in registration order.
    pub fn provider_codes(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.manifest.code.as_str()).collect()
    }

    pub fn is_registered(&self, code: &str) -> bool {
        self.providers.iter().any(|p| p.manifest.code == code)
    }

    /// Run the provider's `register` step and keep it for [`boot`](Self::boot).
    pub fn register(
        &mut self,
        manifest: ExtensionManifest,
        config: ExtensionConfig,
        provider: Box<dyn ExtensionProvider>,
    ) -> Result<(), BootRegistrationError> {
        let code = manifest.code.clone();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut ctx = RegisterContext {
                manifest: &manifest,
                config: &config,
                services: &mut self.services,
            };
            provider.register(&mut ctx)
        }));

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(source)) => Some(BootRegistrationError::Register {
                code: code.clone(),
                source,
            }),
            Err(payload) => Some(BootRegistrationError::Panicked {
                code: code.clone(),
                phase: "register",
                message: panic_message(payload.as_ref()),
            }),
        };
        if let Some(failure) = failure {
            self.strip(&code);
            return Err(failure);
        }

        tracing::debug!(code = %code, "provider registered");
        self.providers.push(Registered {
            manifest,
            config,
            provider,
            booted: false,
        });
        Ok(())
    }

    /// Boot every registered provider that has not booted yet.
    ///
    /// Returns one error per provider that failed; those providers are
    /// dropped from the container together with their hooks and services.
    pub fn boot(&mut self) -> Vec<BootRegistrationError> {
        let mut failures = Vec::new();
        let Self {
            hooks,
            services,
            providers,
        } = self;

        for registered in providers.iter_mut().filter(|p| !p.booted) {
            let code = registered.manifest.code.clone();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut ctx = BootContext {
                    manifest: &registered.manifest,
                    config: &registered.config,
                    hooks: hooks.scoped(&code),
                    services,
                };
                registered.provider.boot(&mut ctx)
            }));

            match outcome {
                Ok(Ok(())) => {
                    registered.booted = true;
                    tracing::debug!(code = %code, "provider booted");
                }
                Ok(Err(source)) => failures.push(BootRegistrationError::Boot { code, source }),
                Err(payload) => failures.push(BootRegistrationError::Panicked {
                    code,
                    phase: "boot",
                    message: panic_message(payload.as_ref()),
                }),
            }
        }

        for failure in &failures {
            self.strip(failure.code());
        }
        failures
    }

    fn strip(&mut self, code: &str) {
        let hooks = self.hooks.remove_owned_by(code);
        let services = self.services.remove_owned_by(code);
        self.providers.retain(|p| p.manifest.code != code);
        if hooks > 0 || services > 0 {
            tracing::debug!(code, hooks, services, "removed registrations of failed provider");
        }
    }

    /// Give up the container, keeping only the dispatcher.
    pub fn into_hooks(self) -> EventDispatcher {
        self.hooks
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
