use std::{fmt, future::Future, pin::Pin};

use {
    serde::de::DeserializeOwned,
    serde_json::Value,
    switchboard_protocol::{AuthContext, DispatchError},
    tokio_util::sync::CancellationToken,
};

use crate::{
    error::Result,
    key::DispatchKey,
    registry::ToolDefinition,
    schema::ParamSchema,
};

// ── Types ────────────────────────────────────────────────────────────────────

/// Context passed to every handler invocation.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Canonical key of the entry being run (never the alias the caller used).
    pub key: DispatchKey,
    pub request_id: String,
    pub params: Value,
    pub auth: Option<AuthContext>,
    /// Cancelled on timeout or when the caller goes away.
    pub cancel: CancellationToken,
}

impl HandlerContext {
    pub fn new(key: DispatchKey, params: Value) -> Self {
        Self {
            key,
            request_id: String::new(),
            params,
            auth: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.subject.as_str())
    }

    /// Deserialize the param bag into a typed struct.
    pub fn parse_params<T: DeserializeOwned>(&self) -> std::result::Result<T, DispatchError> {
        let params = if self.params.is_null() {
            Value::Object(Default::default())
        } else {
            self.params.clone()
        };
        serde_json::from_value(params)
            .map_err(|e| DispatchError::bad_request(format!("invalid params: {e}")))
    }
}

/// The result a handler produces.
pub type HandlerResult = std::result::Result<Value, DispatchError>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A boxed async handler.
pub type HandlerFn = Box<dyn Fn(HandlerContext) -> HandlerFuture + Send + Sync>;

/// Box an async closure into a [`HandlerFn`].
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Box::new(move |ctx| Box::pin(f(ctx)))
}

// ── Entry ────────────────────────────────────────────────────────────────────

/// A handler bound to its key plus metadata. Immutable once registered.
pub struct HandlerEntry {
    pub key: DispatchKey,
    pub module: String,
    pub requires_auth: bool,
    pub scopes: Vec<String>,
    pub description: String,
    pub params: ParamSchema,
    handler: HandlerFn,
}

impl HandlerEntry {
    pub fn new(key: DispatchKey, handler: HandlerFn) -> Self {
        Self {
            module: key.module().to_string(),
            key,
            requires_auth: false,
            scopes: Vec::new(),
            description: String::new(),
            params: ParamSchema::any(),
            handler,
        }
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    pub fn with_params(mut self, params: ParamSchema) -> Self {
        self.params = params;
        self
    }

    pub fn call(&self, ctx: HandlerContext) -> HandlerFuture {
        (self.handler)(ctx)
    }

    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.key.to_string(),
            description: self.description.clone(),
            parameters: self.params.to_json_schema(),
        }
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("key", &self.key)
            .field("module", &self.module)
            .field("requires_auth", &self.requires_auth)
            .field("scopes", &self.scopes)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

// ── Module registration ──────────────────────────────────────────────────────

/// Metadata shared by every action of a module.
#[derive(Debug, Clone, Default)]
pub struct ModuleMeta {
    pub requires_auth: bool,
    pub scopes: Vec<String>,
    pub description: String,
}

/// One named action inside a [`ModuleRegistration`].
pub struct Action {
    name: String,
    handler: HandlerFn,
    description: Option<String>,
    params: ParamSchema,
    scopes: Vec<String>,
    requires_auth: Option<bool>,
}

impl Action {
    pub fn new(name: impl Into<String>, handler: HandlerFn) -> Self {
        Self {
            name: name.into(),
            handler,
            description: None,
            params: ParamSchema::any(),
            scopes: Vec::new(),
            requires_auth: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Override the module description for this action.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn params(mut self, params: ParamSchema) -> Self {
        self.params = params;
        self
    }

    /// Require a scope on top of the module's shared scopes.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Override the module's auth requirement for this action.
    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = Some(requires_auth);
        self
    }
}

/// Transient descriptor a feature module hands to the registry at boot.
pub struct ModuleRegistration {
    pub name: String,
    pub meta: ModuleMeta,
    pub actions: Vec<Action>,
}

impl ModuleRegistration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meta: ModuleMeta::default(),
            actions: Vec::new(),
        }
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.meta.requires_auth = requires_auth;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = description.into();
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.meta.scopes.push(scope.into());
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Build one entry per action, in declaration order. Key errors are
    /// reported per action so the caller can decide how far to get.
    pub(crate) fn into_entries(self) -> Vec<Result<HandlerEntry>> {
        let Self {
            name: module,
            meta,
            actions,
        } = self;
        actions
            .into_iter()
            .map(|action| {
                let key = DispatchKey::join(&module, &action.name)?;
                let mut entry = HandlerEntry::new(key, action.handler)
                    .in_module(module.clone())
                    .with_description(action.description.unwrap_or_else(|| meta.description.clone()))
                    .requires_auth(action.requires_auth.unwrap_or(meta.requires_auth))
                    .with_params(action.params);
                for scope in meta.scopes.iter().cloned().chain(action.scopes) {
                    entry = entry.with_scope(scope);
                }
                Ok(entry)
            })
            .collect()
    }
}

impl fmt::Debug for ModuleRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistration")
            .field("name", &self.name)
            .field("meta", &self.meta)
            .field(
                "actions",
                &self.actions.iter().map(Action::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, serde_json::json};

    fn noop() -> HandlerFn {
        handler(|_| async { Ok(json!(null)) })
    }

    #[test]
    fn module_metadata_flows_into_entries() {
        let module = ModuleRegistration::new("memory")
            .requires_auth(true)
            .description("Per-user memory")
            .scope("memory.read")
            .action(Action::new("get", noop()))
            .action(
                Action::new("delete", noop())
                    .describe("Delete a key")
                    .scope("memory.write"),
            );

        let entries: Vec<_> = module
            .into_entries()
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(entries.len(), 2);

        let get = &entries[0];
        assert_eq!(get.key.as_str(), "memory.get");
        assert_eq!(get.module, "memory");
        assert!(get.requires_auth);
        assert_eq!(get.description, "Per-user memory");
        assert_eq!(get.scopes, vec!["memory.read"]);

        let delete = &entries[1];
        assert_eq!(delete.description, "Delete a key");
        assert_eq!(delete.scopes, vec!["memory.read", "memory.write"]);
    }

    #[test]
    fn action_can_opt_out_of_module_auth() {
        let module = ModuleRegistration::new("system")
            .requires_auth(true)
            .action(Action::new("ping", noop()).requires_auth(false));
        let entries = module.into_entries();
        let ping = entries[0].as_ref().unwrap();
        assert!(!ping.requires_auth);
    }

    #[test]
    fn bad_action_name_is_reported_per_action() {
        let module = ModuleRegistration::new("maps")
            .action(Action::new("directions", noop()))
            .action(Action::new("bad name", noop()));
        let entries = module.into_entries();
        assert!(entries[0].is_ok());
        assert!(entries[1].is_err());
    }

    #[tokio::test]
    async fn handler_receives_context() {
        let entry = HandlerEntry::new(
            DispatchKey::parse("system.echo").unwrap(),
            handler(|ctx| async move { Ok(json!({ "key": ctx.key.as_str(), "params": ctx.params })) }),
        );
        let out = entry
            .call(HandlerContext::new(entry.key.clone(), json!({"x": 1})))
            .await
            .unwrap();
        assert_eq!(out, json!({"key": "system.echo", "params": {"x": 1}}));
    }

    #[test]
    fn parse_params_treats_null_as_empty() {
        #[derive(serde::Deserialize)]
        struct P {
            #[serde(default)]
            name: Option<String>,
        }
        let ctx = HandlerContext::new(DispatchKey::parse("a.b").unwrap(), Value::Null);
        let p: P = ctx.parse_params().unwrap();
        assert!(p.name.is_none());
    }

    #[test]
    fn parse_params_error_is_bad_request() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct P {
            name: String,
        }
        let ctx = HandlerContext::new(DispatchKey::parse("a.b").unwrap(), json!({"name": 3}));
        let err = ctx.parse_params::<P>().unwrap_err();
        assert_eq!(err.kind, switchboard_protocol::ErrorKind::BadRequest);
    }
}
