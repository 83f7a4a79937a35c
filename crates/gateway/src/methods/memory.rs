use std::sync::Arc;

use {
    dashmap::DashMap,
    serde::Deserialize,
    serde_json::{Value, json},
};

use {
    switchboard_protocol::DispatchError,
    switchboard_registry::{
        Action, HandlerContext, HandlerFn, HandlerResult, ModuleRegistration, ParamSchema,
        ParamType, handler,
    },
};

pub const WRITE_SCOPE: &str = "memory.write";

/// Per-subject key/value notes. Each subject only sees its own entries.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<(String, String), Value>,
}

impl MemoryStore {
    pub fn save(&self, subject: &str, key: &str, value: Value) -> Option<Value> {
        self.entries
            .insert((subject.to_string(), key.to_string()), value)
    }

    pub fn get(&self, subject: &str, key: &str) -> Option<Value> {
        self.entries
            .get(&(subject.to_string(), key.to_string()))
            .map(|v| v.value().clone())
    }

    pub fn delete(&self, subject: &str, key: &str) -> bool {
        self.entries
            .remove(&(subject.to_string(), key.to_string()))
            .is_some()
    }

    /// Keys owned by `subject`, sorted.
    pub fn keys(&self, subject: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().0 == subject)
            .map(|e| e.key().1.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[derive(Deserialize)]
struct SaveParams {
    key: String,
    value: Value,
}

#[derive(Deserialize)]
struct KeyParams {
    key: String,
}

fn subject(ctx: &HandlerContext) -> Result<String, DispatchError> {
    ctx.subject()
        .map(str::to_string)
        .ok_or_else(|| DispatchError::unauthorized("no caller identity"))
}

fn key_param(ctx: &HandlerContext) -> Result<String, DispatchError> {
    let KeyParams { key } = ctx.parse_params()?;
    if key.trim().is_empty() {
        return Err(DispatchError::bad_request("`key` must not be empty"));
    }
    Ok(key)
}

fn with_store<F>(store: &Arc<MemoryStore>, f: F) -> HandlerFn
where
    F: Fn(&MemoryStore, &HandlerContext) -> HandlerResult + Send + Sync + Copy + 'static,
{
    let store = Arc::clone(store);
    handler(move |ctx| {
        let store = Arc::clone(&store);
        async move { f(&store, &ctx) }
    })
}

fn save(store: &MemoryStore, ctx: &HandlerContext) -> HandlerResult {
    let subject = subject(ctx)?;
    let SaveParams { key, value } = ctx.parse_params()?;
    if key.trim().is_empty() {
        return Err(DispatchError::bad_request("`key` must not be empty"));
    }
    let replaced = store.save(&subject, &key, value).is_some();
    Ok(json!({ "key": key, "replaced": replaced }))
}

fn get(store: &MemoryStore, ctx: &HandlerContext) -> HandlerResult {
    let subject = subject(ctx)?;
    let key = key_param(ctx)?;
    match store.get(&subject, &key) {
        Some(value) => Ok(json!({ "key": key, "value": value })),
        None => Err(DispatchError::not_found(format!("no memory stored under `{key}`"))),
    }
}

fn list(store: &MemoryStore, ctx: &HandlerContext) -> HandlerResult {
    let subject = subject(ctx)?;
    Ok(json!({ "keys": store.keys(&subject) }))
}

fn delete(store: &MemoryStore, ctx: &HandlerContext) -> HandlerResult {
    let subject = subject(ctx)?;
    let key = key_param(ctx)?;
    Ok(json!({ "key": key, "deleted": store.delete(&subject, &key) }))
}

pub fn describe(store: &Arc<MemoryStore>) -> ModuleRegistration {
    let key_only = || ParamSchema::object().required("key", ParamType::String, "Memory key");
    ModuleRegistration::new("memory")
        .requires_auth(true)
        .description("Per-caller scratch memory")
        .action(
            Action::new("save", with_store(store, save))
                .describe("Store a value under a key, replacing any previous value")
                .params(
                    key_only().required("value", ParamType::Any, "Value to remember"),
                ),
        )
        .action(
            Action::new("get", with_store(store, get))
                .describe("Fetch the value stored under a key")
                .params(key_only()),
        )
        .action(
            Action::new("list", with_store(store, list))
                .describe("List the caller's memory keys")
                .params(ParamSchema::object()),
        )
        .action(
            Action::new("delete", with_store(store, delete))
                .describe("Remove a stored key")
                .scope(WRITE_SCOPE)
                .params(key_only()),
        )
}
