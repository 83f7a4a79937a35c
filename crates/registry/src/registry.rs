use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use {
    arc_swap::ArcSwap,
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use crate::{
    entry::{HandlerEntry, ModuleRegistration},
    error::{RegistryError, Result},
    key::DispatchKey,
};

// ── Types ────────────────────────────────────────────────────────────────────

/// What happens when a key is registered twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with [`RegistryError::DuplicateKey`].
    #[default]
    Reject,
    /// Replace the existing binding and log a warning.
    Overwrite,
}

/// Projection of an entry for LLM tool-calling interfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Introspection row for one key (canonical or alias).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub key: String,
    pub module: String,
    pub description: String,
    #[serde(rename = "requiresAuth")]
    pub requires_auth: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(rename = "aliasOf", default, skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
}

// ── Snapshot ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Slot {
    Entry(Arc<HandlerEntry>),
    /// Points at a canonical key, never at another alias.
    Alias(DispatchKey),
}

#[derive(Clone, Default)]
struct Snapshot {
    slots: HashMap<DispatchKey, Slot>,
    canonical_order: Vec<DispatchKey>,
    alias_order: Vec<DispatchKey>,
}

impl Snapshot {
    fn resolve(&self, key: &str) -> Option<&Arc<HandlerEntry>> {
        match self.slots.get(key)? {
            Slot::Entry(entry) => Some(entry),
            Slot::Alias(target) => match self.slots.get(target.as_str())? {
                Slot::Entry(entry) => Some(entry),
                Slot::Alias(_) => None,
            },
        }
    }

    fn insert_entry(&mut self, entry: HandlerEntry, policy: DuplicatePolicy) -> Result<()> {
        let key = entry.key.clone();
        match (self.slots.get(&key), policy) {
            (None, _) => {
                self.canonical_order.push(key.clone());
            },
            (Some(_), DuplicatePolicy::Reject) => {
                return Err(RegistryError::DuplicateKey(key.into_string()));
            },
            (Some(Slot::Entry(_)), DuplicatePolicy::Overwrite) => {
                warn!(key = %key, "overwriting registered handler");
            },
            (Some(Slot::Alias(target)), DuplicatePolicy::Overwrite) => {
                warn!(key = %key, alias_of = %target, "replacing alias with handler");
                self.alias_order.retain(|k| k != &key);
                self.canonical_order.push(key.clone());
            },
        }
        self.slots.insert(key, Slot::Entry(Arc::new(entry)));
        Ok(())
    }

    fn insert_alias(
        &mut self,
        alias: DispatchKey,
        target: &str,
        policy: DuplicatePolicy,
    ) -> Result<DispatchKey> {
        if alias.as_str() == target {
            return Err(RegistryError::invalid(
                alias.into_string(),
                "alias cannot point at itself",
            ));
        }
        let canonical = match self.slots.get(target) {
            Some(Slot::Entry(entry)) => entry.key.clone(),
            Some(Slot::Alias(canonical)) => canonical.clone(),
            None => return Err(RegistryError::UnknownKey(target.to_string())),
        };
        match (self.slots.get(&alias), policy) {
            (None, _) => self.alias_order.push(alias.clone()),
            // A canonical handler is never shadowed by an alias.
            (Some(Slot::Entry(_)), _) | (Some(Slot::Alias(_)), DuplicatePolicy::Reject) => {
                return Err(RegistryError::DuplicateKey(alias.into_string()));
            },
            (Some(Slot::Alias(previous)), DuplicatePolicy::Overwrite) => {
                warn!(alias = %alias, from = %previous, to = %canonical, "retargeting alias");
            },
        }
        self.slots.insert(alias, Slot::Alias(canonical.clone()));
        Ok(canonical)
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some(Slot::Entry(_)) => {
                self.canonical_order.retain(|k| k.as_str() != key);
                let dangling: Vec<_> = self
                    .slots
                    .iter()
                    .filter_map(|(k, slot)| match slot {
                        Slot::Alias(target) if target.as_str() == key => Some(k.clone()),
                        _ => None,
                    })
                    .collect();
                for alias in &dangling {
                    self.slots.remove(alias);
                }
                self.alias_order.retain(|k| !dangling.contains(k));
                true
            },
            Some(Slot::Alias(_)) => {
                self.alias_order.retain(|k| k.as_str() != key);
                true
            },
            None => false,
        }
    }

    fn register_module(
        &mut self,
        module: ModuleRegistration,
        policy: DuplicatePolicy,
    ) -> Result<Vec<DispatchKey>> {
        let mut keys = Vec::with_capacity(module.actions.len());
        for entry in module.into_entries() {
            let entry = entry?;
            let key = entry.key.clone();
            self.insert_entry(entry, policy)?;
            keys.push(key);
        }
        Ok(keys)
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Authoritative table of dispatch keys.
///
/// Reads load an immutable snapshot; every write builds a new snapshot and
/// swaps it in whole, so a concurrent dispatch never sees a half-applied
/// change. Writers are serialised.
pub struct Registry {
    snap: ArcSwap<Snapshot>,
    policy: DuplicatePolicy,
    write_lock: Mutex<()>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_policy(DuplicatePolicy::default())
    }

    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            snap: ArcSwap::from_pointee(Snapshot::default()),
            policy,
            write_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Snapshot) -> Result<R>) -> Result<R> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = Snapshot::clone(&self.snap.load());
        let out = f(&mut next)?;
        self.snap.store(Arc::new(next));
        Ok(out)
    }

    /// Insert a single entry under its key.
    pub fn register(&self, entry: HandlerEntry) -> Result<()> {
        let key = entry.key.clone();
        let policy = self.policy;
        self.mutate(|snap| snap.insert_entry(entry, policy))?;
        debug!(key = %key, "registered handler");
        Ok(())
    }

    /// Register every action of `module` as `module.action`, in declaration
    /// order.
    ///
    /// Not transactional: each action is published as soon as it is
    /// inserted, so on error the actions before the failing one remain
    /// registered. Use [`reload`](Self::reload) for all-or-nothing.
    pub fn register_module(&self, module: ModuleRegistration) -> Result<Vec<DispatchKey>> {
        let name = module.name.clone();
        let mut keys = Vec::with_capacity(module.actions.len());
        for entry in module.into_entries() {
            let entry = entry?;
            keys.push(entry.key.clone());
            self.register(entry)?;
        }
        debug!(module = %name, count = keys.len(), "registered module");
        Ok(keys)
    }

    /// Bind `alias` to the entry registered under `target`. If `target` is
    /// itself an alias, the new alias points at its canonical key.
    pub fn register_alias(&self, alias: &str, target: &str) -> Result<()> {
        let alias = DispatchKey::parse(alias)?;
        let policy = self.policy;
        let label = alias.clone();
        let canonical = self.mutate(|snap| snap.insert_alias(alias, target, policy))?;
        debug!(alias = %label, target = %canonical, "registered alias");
        Ok(())
    }

    /// Remove a key. Removing a canonical key also drops its aliases.
    pub fn unregister(&self, key: &str) -> bool {
        let removed = self.mutate(|snap| Ok(snap.remove(key))).unwrap_or(false);
        if removed {
            debug!(key, "unregistered");
        }
        removed
    }

    /// Replace the whole table in one swap. Nothing changes on error.
    pub fn reload<M, A, K, T>(&self, modules: M, aliases: A) -> Result<()>
    where
        M: IntoIterator<Item = ModuleRegistration>,
        A: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: AsRef<str>,
    {
        let policy = self.policy;
        let mut fresh = Snapshot::default();
        for module in modules {
            fresh.register_module(module, policy)?;
        }
        for (alias, target) in aliases {
            let alias = DispatchKey::parse(alias.as_ref())?;
            fresh.insert_alias(alias, target.as_ref(), policy)?;
        }

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let count = fresh.slots.len();
        self.snap.store(Arc::new(fresh));
        debug!(keys = count, "registry reloaded");
        Ok(())
    }

    /// Look up a key or alias.
    pub fn resolve(&self, key: &str) -> Option<Arc<HandlerEntry>> {
        self.snap.load().resolve(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.snap.load().slots.contains_key(key)
    }

    /// Canonical key an alias points at; `None` for canonical or unknown keys.
    pub fn alias_target(&self, key: &str) -> Option<DispatchKey> {
        match self.snap.load().slots.get(key)? {
            Slot::Alias(target) => Some(target.clone()),
            Slot::Entry(_) => None,
        }
    }

    /// Number of keys, aliases included.
    pub fn len(&self) -> usize {
        self.snap.load().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snap.load().slots.is_empty()
    }

    /// Canonical entries in insertion order.
    pub fn list_all(&self) -> Vec<Arc<HandlerEntry>> {
        let snap = self.snap.load();
        snap.canonical_order
            .iter()
            .filter_map(|k| snap.resolve(k.as_str()).cloned())
            .collect()
    }

    /// Every key, canonical keys first then aliases, each in insertion order.
    pub fn keys(&self) -> Vec<String> {
        let snap = self.snap.load();
        snap.canonical_order
            .iter()
            .chain(&snap.alias_order)
            .map(ToString::to_string)
            .collect()
    }

    pub fn describe_keys(&self) -> Vec<KeyInfo> {
        let snap = self.snap.load();
        snap.canonical_order
            .iter()
            .chain(&snap.alias_order)
            .filter_map(|key| {
                let entry = snap.resolve(key.as_str())?;
                let alias_of = (entry.key != *key).then(|| entry.key.to_string());
                Some(KeyInfo {
                    key: key.to_string(),
                    module: entry.module.clone(),
                    description: entry.description.clone(),
                    requires_auth: entry.requires_auth,
                    scopes: entry.scopes.clone(),
                    alias_of,
                })
            })
            .collect()
    }

    /// Tool manifest for canonical keys in insertion order. Aliases are left
    /// out so a model never sees the same tool twice.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.list_all()
            .iter()
            .map(|entry| entry.tool_definition())
            .collect()
    }
}
