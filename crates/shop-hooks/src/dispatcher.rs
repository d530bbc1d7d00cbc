//! Priority-ordered action and filter registries.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Priority used when a registration does not specify one.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Number of positional values handed to a callback when not specified.
///
/// For filters the value being filtered counts as the first argument.
pub const DEFAULT_ACCEPTED_ARGS: usize = 1;

/// Error type callbacks may return; any error converts into it with `?`.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by registered callbacks.
pub type CallbackResult<T> = std::result::Result<T, CallbackError>;

type ActionFn = dyn Fn(&[Value]) -> CallbackResult<()> + Send + Sync;
type FilterFn = dyn Fn(Value, &[Value]) -> CallbackResult<Value> + Send + Sync;

/// Handle identifying one registration. Ids grow monotonically and double as
/// the registration-order tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

/// The two independent callback namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    Action,
    Filter,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => write!(f, "action"),
            Self::Filter => write!(f, "filter"),
        }
    }
}

/// What the dispatcher does when a callback returns an error.
///
/// The default is [`Propagate`](Self::Propagate): the extension point is
/// aborted and the error is returned to the code that fired the event.
/// [`LogAndContinue`](Self::LogAndContinue) records the failure at `error`
/// level and moves on; a failing filter leaves the value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallbackErrorPolicy {
    #[default]
    Propagate,
    LogAndContinue,
}

/// Registration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOptions {
    priority: i32,
    accepted_args: usize,
    owner: Option<String>,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            accepted_args: DEFAULT_ACCEPTED_ARGS,
            owner: None,
        }
    }
}

impl HookOptions {
    /// Lower priorities run first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Maximum number of positional values passed to the callback.
    pub fn accepted_args(mut self, accepted_args: usize) -> Self {
        self.accepted_args = accepted_args;
        self
    }

    /// Extension code that owns the registration.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

struct Slot<F: ?Sized> {
    id: HookId,
    priority: i32,
    accepted_args: usize,
    owner: Option<String>,
    callback: Box<F>,
}

impl<F: ?Sized> Slot<F> {
    fn owner_label(&self) -> String {
        self.owner.clone().unwrap_or_else(|| "core".to_string())
    }
}

/// Callback count for one event, used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSummary {
    pub kind: HookKind,
    pub event: String,
    pub callbacks: usize,
}

/// Process-local action/filter registry.
///
/// Built fresh at every host bootstrap and dropped with it. Registration
/// takes `&mut self` and only happens while providers boot; dispatch takes
/// `&self`, so the two phases cannot interleave.
#[derive(Default)]
pub struct EventDispatcher {
    actions: BTreeMap<String, Vec<Slot<ActionFn>>>,
    filters: BTreeMap<String, Vec<Slot<FilterFn>>>,
    next_id: u64,
    policy: CallbackErrorPolicy,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}

impl EventDispatcher {
    /// Create an empty dispatcher using [`CallbackErrorPolicy::Propagate`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty dispatcher with an explicit callback error policy.
    pub fn with_policy(policy: CallbackErrorPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> CallbackErrorPolicy {
        self.policy
    }

    /// Register an action with default priority and argument count.
    pub fn register_action<F>(&mut self, event: &str, callback: F) -> HookId
    where
        F: Fn(&[Value]) -> CallbackResult<()> + Send + Sync + 'static,
    {
        self.register_action_with(event, HookOptions::default(), callback)
    }

    /// Register an action with explicit options.
    pub fn register_action_with<F>(&mut self, event: &str, options: HookOptions, callback: F) -> HookId
    where
        F: Fn(&[Value]) -> CallbackResult<()> + Send + Sync + 'static,
    {
        let slot = self.slot(options, Box::new(callback) as Box<ActionFn>);
        let id = slot.id;
        insert_sorted(self.actions.entry(event.to_string()).or_default(), slot);
        tracing::trace!(event, ?id, "registered action");
        id
    }

    /// Register a filter with default priority and argument count.
    pub fn register_filter<F>(&mut self, event: &str, callback: F) -> HookId
    where
        F: Fn(Value, &[Value]) -> CallbackResult<Value> + Send + Sync + 'static,
    {
        self.register_filter_with(event, HookOptions::default(), callback)
    }

    /// Register a filter with explicit options.
    pub fn register_filter_with<F>(&mut self, event: &str, options: HookOptions, callback: F) -> HookId
    where
        F: Fn(Value, &[Value]) -> CallbackResult<Value> + Send + Sync + 'static,
    {
        let slot = self.slot(options, Box::new(callback) as Box<FilterFn>);
        let id = slot.id;
        insert_sorted(self.filters.entry(event.to_string()).or_default(), slot);
        tracing::trace!(event, ?id, "registered filter");
        id
    }

    /// Run every action registered for `event`.
    ///
    /// Each callback receives at most its `accepted_args` leading values from
    /// `args`. Firing an event nobody listens to is a no-op.
    pub fn do_action(&self, event: &str, args: &[Value]) -> Result<()> {
        let Some(slots) = self.actions.get(event) else {
            return Ok(());
        };

        for slot in slots {
            let take = slot.accepted_args.min(args.len());
            if let Err(source) = (slot.callback)(&args[..take]) {
                self.on_failure(HookKind::Action, event, slot.owner_label(), source)?;
            }
        }
        Ok(())
    }

    /// Pipe `value` through every filter registered for `event` and return the
    /// final value.
    ///
    /// Each callback receives the current value plus at most
    /// `accepted_args - 1` leading values from `args`. With no callbacks the
    /// input comes back unchanged.
    pub fn apply_filter(&self, event: &str, value: Value, args: &[Value]) -> Result<Value> {
        let Some(slots) = self.filters.get(event) else {
            return Ok(value);
        };

        let mut current = value;
        for slot in slots {
            let take = slot.accepted_args.saturating_sub(1).min(args.len());
            let input = match self.policy {
                CallbackErrorPolicy::Propagate => std::mem::take(&mut current),
                CallbackErrorPolicy::LogAndContinue => current.clone(),
            };
            match (slot.callback)(input, &args[..take]) {
                Ok(next) => current = next,
                Err(source) => {
                    self.on_failure(HookKind::Filter, event, slot.owner_label(), source)?
                }
            }
        }
        Ok(current)
    }

    /// Typed wrapper around [`apply_filter`](Self::apply_filter).
    pub fn apply_filter_as<T>(&self, event: &str, value: T, args: &[Value]) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        if !self.has_filter(event) {
            return Ok(value);
        }
        let to_value = |source: serde_json::Error| Error::Value {
            event: event.to_string(),
            source,
        };
        let raw = serde_json::to_value(value).map_err(to_value)?;
        let filtered = self.apply_filter(event, raw, args)?;
        serde_json::from_value(filtered).map_err(to_value)
    }

    /// Whether at least one action or filter is registered for `event`.
    pub fn has(&self, event: &str) -> bool {
        self.has_action(event) || self.has_filter(event)
    }

    pub fn has_action(&self, event: &str) -> bool {
        self.actions.get(event).is_some_and(|slots| !slots.is_empty())
    }

    pub fn has_filter(&self, event: &str) -> bool {
        self.filters.get(event).is_some_and(|slots| !slots.is_empty())
    }

    /// Remove one registration. Returns `false` if the id is unknown.
    pub fn remove(&mut self, id: HookId) -> bool {
        remove_where(&mut self.actions, |slot| slot.id == id) > 0
            || remove_where(&mut self.filters, |slot| slot.id == id) > 0
    }

    /// Remove every registration owned by `owner`, returning how many went.
    pub fn remove_owned_by(&mut self, owner: &str) -> usize {
        remove_where(&mut self.actions, |slot| slot.owner.as_deref() == Some(owner))
            + remove_where(&mut self.filters, |slot| slot.owner.as_deref() == Some(owner))
    }

    /// Total number of registrations across both namespaces.
    pub fn len(&self) -> usize {
        self.actions.values().map(Vec::len).sum::<usize>()
            + self.filters.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-event callback counts, actions first, each sorted by event name.
    pub fn summary(&self) -> Vec<EventSummary> {
        let actions = self.actions.iter().map(|(event, slots)| EventSummary {
            kind: HookKind::Action,
            event: event.clone(),
            callbacks: slots.len(),
        });
        let filters = self.filters.iter().map(|(event, slots)| EventSummary {
            kind: HookKind::Filter,
            event: event.clone(),
            callbacks: slots.len(),
        });
        actions.chain(filters).filter(|s| s.callbacks > 0).collect()
    }

    /// Every event name with at least one registration, deduplicated and sorted.
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .actions
            .keys()
            .chain(self.filters.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Registration view that stamps every callback with `owner`.
    pub fn scoped(&mut self, owner: &str) -> ScopedDispatcher<'_> {
        ScopedDispatcher {
            inner: self,
            owner: owner.to_string(),
        }
    }

    fn slot<F: ?Sized>(&mut self, options: HookOptions, callback: Box<F>) -> Slot<F> {
        let id = HookId(self.next_id);
        self.next_id += 1;
        Slot {
            id,
            priority: options.priority,
            accepted_args: options.accepted_args,
            owner: options.owner,
            callback,
        }
    }

    fn on_failure(
        &self,
        kind: HookKind,
        event: &str,
        owner: String,
        source: CallbackError,
    ) -> Result<()> {
        match self.policy {
            CallbackErrorPolicy::Propagate => Err(Error::Callback {
                kind,
                event: event.to_string(),
                owner,
                source,
            }),
            CallbackErrorPolicy::LogAndContinue => {
                tracing::error!(%kind, event, owner = %owner, error = %source, "callback failed, continuing");
                Ok(())
            }
        }
    }
}

/// Registration handle bound to one owning extension.
///
/// Handed to providers during boot so every hook they add can be traced back
/// to them and removed if their boot fails.
pub struct ScopedDispatcher<'a> {
    inner: &'a mut EventDispatcher,
    owner: String,
}

impl ScopedDispatcher<'_> {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn register_action<F>(&mut self, event: &str, callback: F) -> HookId
    where
        F: Fn(&[Value]) -> CallbackResult<()> + Send + Sync + 'static,
    {
        self.register_action_with(event, HookOptions::default(), callback)
    }

    pub fn register_action_with<F>(&mut self, event: &str, options: HookOptions, callback: F) -> HookId
    where
        F: Fn(&[Value]) -> CallbackResult<()> + Send + Sync + 'static,
    {
        let options = options.owner(self.owner.clone());
        self.inner.register_action_with(event, options, callback)
    }

    pub fn register_filter<F>(&mut self, event: &str, callback: F) -> HookId
    where
        F: Fn(Value, &[Value]) -> CallbackResult<Value> + Send + Sync + 'static,
    {
        self.register_filter_with(event, HookOptions::default(), callback)
    }

    pub fn register_filter_with<F>(&mut self, event: &str, options: HookOptions, callback: F) -> HookId
    where
        F: Fn(Value, &[Value]) -> CallbackResult<Value> + Send + Sync + 'static,
    {
        let options = options.owner(self.owner.clone());
        self.inner.register_filter_with(event, options, callback)
    }

    /// Read access for providers that need to check what is already hooked.
    pub fn has(&self, event: &str) -> bool {
        self.inner.has(event)
    }
}

/// Ids increase monotonically, so inserting after every slot with a priority
/// `<=` the new one keeps `(priority, registration order)` ordering.
fn insert_sorted<F: ?Sized>(slots: &mut Vec<Slot<F>>, slot: Slot<F>) {
    let at = slots.partition_point(|existing| existing.priority <= slot.priority);
    slots.insert(at, slot);
}

fn remove_where<F: ?Sized>(
    map: &mut BTreeMap<String, Vec<Slot<F>>>,
    predicate: impl Fn(&Slot<F>) -> bool,
) -> usize {
    let mut removed = 0;
    for slots in map.values_mut() {
        let before = slots.len();
        slots.retain(|slot| !predicate(slot));
        removed += before - slots.len();
    }
    map.retain(|_, slots| !slots.is_empty());
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_filters_run_in_priority_order() {
        let mut hooks = EventDispatcher::new();
        let calls = recorder();
        for priority in [20, 5, 10] {
            let calls = Arc::clone(&calls);
            hooks.register_filter_with(
                "cart.total",
                HookOptions::default().priority(priority),
                move |value, _| {
                    calls.lock().unwrap().push(priority.to_string());
                    Ok(value)
                },
            );
        }

        hooks.apply_filter("cart.total", json!(1), &[]).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["5", "10", "20"]);
    }

    #[test]
    fn test_equal_priority_runs_in_registration_order() {
        let mut hooks = EventDispatcher::new();
        let calls = recorder();
        for label in ["first", "second", "third"] {
            let calls = Arc::clone(&calls);
            hooks.register_action("order.placed", move |_| {
                calls.lock().unwrap().push(label.to_string());
                Ok(())
            });
        }

        hooks.do_action("order.placed", &[]).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_filter_chain_threads_value() {
        let mut hooks = EventDispatcher::new();
        hooks.register_filter("price", |v, _| Ok(json!(v.as_i64().unwrap_or(0) + 1)));
        hooks.register_filter("price", |v, _| Ok(json!(v.as_i64().unwrap_or(0) * 10)));

        assert_eq!(hooks.apply_filter("price", json!(4), &[]).unwrap(), json!(50));
    }

    #[test]
    fn test_unknown_filter_is_identity() {
        let hooks = EventDispatcher::new();
        assert_eq!(hooks.apply_filter("no.such.event", json!(42), &[]).unwrap(), json!(42));
    }

    #[test]
    fn test_unknown_action_is_noop() {
        let hooks = EventDispatcher::new();
        hooks.do_action("no.such.event", &[json!(1)]).unwrap();
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(5, 3)]
    fn test_action_receives_accepted_args(#[case] accepted: usize, #[case] expected: usize) {
        let mut hooks = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        hooks.register_action_with(
            "product.saved",
            HookOptions::default().accepted_args(accepted),
            move |args| {
                *sink.lock().unwrap() = Some(args.len());
                Ok(())
            },
        );

        hooks
            .do_action("product.saved", &[json!(1), json!(2), json!(3)])
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(expected));
    }

    #[rstest]
    #[case(1, 0)]
    #[case(2, 1)]
    #[case(3, 2)]
    fn test_filter_value_counts_as_first_arg(#[case] accepted: usize, #[case] extras: usize) {
        let mut hooks = EventDispatcher::new();
        hooks.register_filter_with(
            "product.card.tags",
            HookOptions::default().accepted_args(accepted),
            |_, args| Ok(json!(args.len())),
        );

        let out = hooks
            .apply_filter("product.card.tags", json!([]), &[json!("a"), json!("b")])
            .unwrap();
        assert_eq!(out, json!(extras));
    }

    #[test]
    fn test_propagate_policy_aborts_chain() {
        let mut hooks = EventDispatcher::new();
        let calls = recorder();
        hooks.register_action_with("boom", HookOptions::default().owner("acme"), |_| {
            Err("kaput".into())
        });
        let sink = Arc::clone(&calls);
        hooks.register_action("boom", move |_| {
            sink.lock().unwrap().push("after".to_string());
            Ok(())
        });

        let err = hooks.do_action("boom", &[]).unwrap_err();
        match err {
            Error::Callback { kind, event, owner, .. } => {
                assert_eq!(kind, HookKind::Action);
                assert_eq!(event, "boom");
                assert_eq!(owner, "acme");
            }
            other => panic!("expected callback error, got {other:?}"),
        }
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_log_and_continue_skips_failing_filter() {
        let mut hooks = EventDispatcher::with_policy(CallbackErrorPolicy::LogAndContinue);
        hooks.register_filter("total", |v, _| Ok(json!(v.as_i64().unwrap_or(0) + 1)));
        hooks.register_filter("total", |_, _| Err("bad".into()));
        hooks.register_filter("total", |v, _| Ok(json!(v.as_i64().unwrap_or(0) * 3)));

        assert_eq!(hooks.apply_filter("total", json!(1), &[]).unwrap(), json!(6));
    }

    #[test]
    fn test_has_tracks_both_namespaces() {
        let mut hooks = EventDispatcher::new();
        assert!(!hooks.has("theme.data"));

        hooks.register_action("theme.boot", |_| Ok(()));
        hooks.register_filter("theme.data", |v, _| Ok(v));

        assert!(hooks.has("theme.boot"));
        assert!(hooks.has_action("theme.boot"));
        assert!(!hooks.has_filter("theme.boot"));
        assert!(hooks.has("theme.data"));
        assert!(!hooks.has_action("theme.data"));
    }

    #[test]
    fn test_remove_by_id() {
        let mut hooks = EventDispatcher::new();
        let id = hooks.register_filter("x", |v, _| Ok(v));
        assert!(hooks.remove(id));
        assert!(!hooks.remove(id));
        assert!(!hooks.has("x"));
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_scoped_registrations_are_removable_by_owner() {
        let mut hooks = EventDispatcher::new();
        hooks.register_action("core.ready", |_| Ok(()));
        {
            let mut scoped = hooks.scoped("acme");
            scoped.register_action("core.ready", |_| Ok(()));
            scoped.register_filter("cart.total.display", |v, _| Ok(v));
        }
        assert_eq!(hooks.len(), 3);

        assert_eq!(hooks.remove_owned_by("acme"), 2);
        assert_eq!(hooks.len(), 1);
        assert!(!hooks.has("cart.total.display"));
    }

    #[test]
    fn test_apply_filter_as_typed() {
        let mut hooks = EventDispatcher::new();
        hooks.register_filter("cart.tax.rate", |v, _| Ok(json!(v.as_f64().unwrap_or(0.0) + 0.05)));

        let rate: f64 = hooks.apply_filter_as("cart.tax.rate", 0.2, &[]).unwrap();
        assert!((rate - 0.25).abs() < f64::EPSILON);

        let untouched: Vec<String> = hooks
            .apply_filter_as("product.badges", vec!["new".to_string()], &[])
            .unwrap();
        assert_eq!(untouched, vec!["new"]);
    }

    #[test]
    fn test_apply_filter_as_reports_shape_mismatch() {
        let mut hooks = EventDispatcher::new();
        hooks.register_filter("count", |_, _| Ok(json!("not a number")));

        let err = hooks.apply_filter_as::<u32>("count", 1, &[]).unwrap_err();
        assert!(matches!(err, Error::Value { ref event, .. } if event == "count"));
    }

    #[test]
    fn test_summary_lists_actions_then_filters() {
        let mut hooks = EventDispatcher::new();
        hooks.register_filter("b.filter", |v, _| Ok(v));
        hooks.register_action("z.action", |_| Ok(()));
        hooks.register_action("a.action", |_| Ok(()));
        hooks.register_action("a.action", |_| Ok(()));

        let summary = hooks.summary();
        let flat: Vec<(HookKind, &str, usize)> = summary
            .iter()
            .map(|s| (s.kind, s.event.as_str(), s.callbacks))
            .collect();
        assert_eq!(
            flat,
            vec![
                (HookKind::Action, "a.action", 2),
                (HookKind::Action, "z.action", 1),
                (HookKind::Filter, "b.filter", 1),
            ]
        );
    }

    #[test]
    fn test_event_names_deduplicates_across_namespaces() {
        let mut hooks = EventDispatcher::new();
        hooks.register_filter("theme.data", |v, _| Ok(v));
        hooks.register_action("theme.data", |_| Ok(()));
        hooks.register_action("boot.done", |_| Ok(()));

        assert_eq!(hooks.event_names(), vec!["boot.done", "theme.data"]);
    }
}
