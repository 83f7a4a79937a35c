use std::{
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    futures::FutureExt,
    serde_json::Value,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, warn},
};

use {
    switchboard_config::DispatchConfig,
    switchboard_protocol::{
        AuthContext, DispatchError, RequestEnvelope, ResponseEnvelope, ToolCall, ToolCallResult,
    },
    switchboard_registry::{HandlerContext, HandlerEntry, Registry},
};

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Applied when the request carries no `timeoutMs`. `None` = unbounded.
    pub default_timeout: Option<Duration>,
    /// Upper bound for per-request overrides.
    pub max_timeout: Option<Duration>,
}

impl DispatchOptions {
    pub fn from_config(cfg: &DispatchConfig) -> Self {
        Self {
            default_timeout: cfg.timeout_ms.map(Duration::from_millis),
            max_timeout: cfg.max_timeout_ms.map(Duration::from_millis),
        }
    }

    fn effective_timeout(&self, requested_ms: Option<u64>) -> Option<Duration> {
        let timeout = requested_ms
            .map(Duration::from_millis)
            .or(self.default_timeout)?;
        Some(match self.max_timeout {
            Some(max) => timeout.min(max),
            None => timeout,
        })
    }
}

// ── Authorization ────────────────────────────────────────────────────────────

/// Check the caller against an entry's auth metadata. Declared scopes imply
/// that authentication is required.
pub fn authorize(entry: &HandlerEntry, auth: Option<&AuthContext>) -> Result<(), DispatchError> {
    if !entry.requires_auth && entry.scopes.is_empty() {
        return Ok(());
    }
    let Some(auth) = auth.filter(|a| a.is_valid()) else {
        return Err(DispatchError::unauthorized(format!(
            "authentication required for {}",
            entry.key
        )));
    };
    if let Some(missing) = entry.scopes.iter().find(|s| !auth.has_scope(s)) {
        return Err(DispatchError::forbidden(format!("missing scope: {missing}")));
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────────────

/// Resolves, authorizes, validates and invokes handlers, turning every
/// outcome into exactly one [`ResponseEnvelope`]. Single attempt, no retry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_options(registry, DispatchOptions::default())
    }

    pub fn with_options(registry: Arc<Registry>, options: DispatchOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    pub async fn dispatch(&self, request: RequestEnvelope) -> ResponseEnvelope {
        self.dispatch_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Dispatch, aborting the handler when `cancel` fires. Dropping the
    /// returned future also cancels the handler's token.
    pub async fn dispatch_with_cancel(
        &self,
        request: RequestEnvelope,
        cancel: CancellationToken,
    ) -> ResponseEnvelope {
        self.execute(request, None, cancel).await
    }

    /// Dispatch a request whose param bag could not be decoded. The decode
    /// error is reported only once the key resolves and the caller passes
    /// the auth gate, so it surfaces as the validation failure.
    pub async fn dispatch_undecodable(
        &self,
        request: RequestEnvelope,
        error: DispatchError,
    ) -> ResponseEnvelope {
        self.execute(request, Some(error), CancellationToken::new())
            .await
    }

    async fn execute(
        &self,
        request: RequestEnvelope,
        params_error: Option<DispatchError>,
        cancel: CancellationToken,
    ) -> ResponseEnvelope {
        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let key = request.key.clone();
        let started = Instant::now();

        let envelope = match self.run(&request_id, request, params_error, &cancel).await {
            Ok(data) => {
                debug!(
                    key = %key,
                    request_id = %request_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "dispatch ok"
                );
                ResponseEnvelope::ok(data)
            },
            Err(err) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                if err.kind.exposes_message() {
                    warn!(
                        key = %key,
                        request_id = %request_id,
                        code = %err.kind,
                        msg = %err.message,
                        elapsed_ms,
                        "dispatch failed"
                    );
                } else {
                    error!(
                        key = %key,
                        request_id = %request_id,
                        code = %err.kind,
                        detail = %err.message,
                        elapsed_ms,
                        "dispatch failed"
                    );
                }
                ResponseEnvelope::err(&err)
            },
        };
        envelope.with_request_id(request_id)
    }

    async fn run(
        &self,
        request_id: &str,
        request: RequestEnvelope,
        params_error: Option<DispatchError>,
        cancel: &CancellationToken,
    ) -> Result<Value, DispatchError> {
        let RequestEnvelope {
            key,
            params,
            auth,
            timeout_ms,
            ..
        } = request;

        let Some(entry) = self.registry.resolve(&key) else {
            return Err(DispatchError::not_found(format!("unknown key: {key}")));
        };

        authorize(&entry, auth.as_ref())?;

        if let Some(err) = params_error {
            return Err(err);
        }
        entry
            .params
            .validate(&params)
            .map_err(DispatchError::bad_request)?;

        let timeout = self.options.effective_timeout(timeout_ms);
        let handler_cancel = cancel.child_token();
        let drop_guard = handler_cancel.clone().drop_guard();

        debug!(
            key = %key,
            canonical = %entry.key,
            request_id,
            subject = auth.as_ref().map(|a| a.subject.as_str()),
            "dispatching"
        );
        let ctx = HandlerContext {
            key: entry.key.clone(),
            request_id: request_id.to_string(),
            params,
            auth,
            cancel: handler_cancel.clone(),
        };

        let invocation = async {
            // The handler closure itself may panic before yielding a future.
            match AssertUnwindSafe(async { entry.call(ctx).await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(payload) => Err(DispatchError::internal(format!(
                    "handler panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            }
        };
        let bounded = async {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, invocation).await {
                    Ok(result) => result,
                    Err(_) => {
                        handler_cancel.cancel();
                        Err(DispatchError::timeout(format!(
                            "{} exceeded {}ms",
                            entry.key,
                            limit.as_millis()
                        )))
                    },
                },
                None => invocation.await,
            }
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DispatchError::internal("request cancelled")),
            result = bounded => result,
        };
        drop_guard.disarm();
        result
    }

    /// Entry point for LLM tool calls: `name` is the dispatch key and
    /// `arguments` the param bag.
    pub async fn dispatch_tool_call(
        &self,
        call: ToolCall,
        auth: Option<AuthContext>,
    ) -> ToolCallResult {
        let mut request = RequestEnvelope::new(call.name.clone(), Value::Null);
        request.auth = auth;
        if !call.id.is_empty() {
            request.request_id = Some(call.id.clone());
        }
        let envelope = match call.params() {
            Ok(params) => {
                request.params = params;
                self.dispatch(request).await
            },
            Err(err) => self.dispatch_undecodable(request, err).await,
        };
        ToolCallResult {
            tool_call_id: call.id,
            envelope,
        }
    }
}
