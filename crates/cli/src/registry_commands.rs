use anyhow::{Context, Result};

use {
    serde_json::Value,
    switchboard_gateway::Dispatcher,
    switchboard_protocol::{AuthContext, RequestEnvelope},
};

/// Print the introspection table, one key per line.
pub fn keys(dispatcher: &Dispatcher) {
    let rows = dispatcher.registry().describe_keys();
    let width = rows.iter().map(|r| r.key.len()).max().unwrap_or(0);
    for row in rows {
        let auth = if row.requires_auth { "auth" } else { "-" };
        let extra = match (&row.alias_of, row.scopes.is_empty()) {
            (Some(target), _) => format!("-> {target}"),
            (None, false) => format!("[{}]", row.scopes.join(", ")),
            (None, true) => String::new(),
        };
        println!("{:<width$}  {auth:<4}  {}  {extra}", row.key, row.description);
    }
}

pub fn tools(dispatcher: &Dispatcher) -> Result<()> {
    let tools = dispatcher.registry().tool_definitions();
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}

pub struct CallArgs {
    pub key: String,
    pub params: Option<String>,
    pub subject: Option<String>,
    pub scopes: Vec<String>,
    pub timeout_ms: Option<u64>,
}

/// Dispatch once in-process and print the envelope. Returns whether the
/// envelope reports success.
pub async fn call(dispatcher: &Dispatcher, args: CallArgs) -> Result<bool> {
    let params: Value = match args.params.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("--params must be valid JSON")?,
        None => Value::Null,
    };
    let mut request = RequestEnvelope::new(args.key, params);
    if let Some(subject) = args.subject {
        request = request.with_auth(AuthContext::new(subject).with_scopes(args.scopes));
    }
    if let Some(ms) = args.timeout_ms {
        request = request.with_timeout_ms(ms);
    }

    let envelope = dispatcher.dispatch(request).await;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(envelope.ok)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, switchboard_config::SwitchboardConfig};

    fn dispatcher() -> Dispatcher {
        switchboard_gateway::dispatcher_from_config(&SwitchboardConfig::default()).unwrap()
    }

    fn args(key: &str, params: Option<&str>, subject: Option<&str>) -> CallArgs {
        CallArgs {
            key: key.into(),
            params: params.map(str::to_string),
            subject: subject.map(str::to_string),
            scopes: vec![],
            timeout_ms: None,
        }
    }

    #[tokio::test]
    async fn call_reports_success() {
        let ok = call(&dispatcher(), args("system.ping", Some(r#"{"echo":1}"#), None))
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn call_reports_failure() {
        let ok = call(&dispatcher(), args("identity.whoami", None, None))
            .await
            .unwrap();
        assert!(!ok);
        let ok = call(&dispatcher(), args("identity.whoami", None, Some("alice")))
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn bad_params_json_is_an_error() {
        assert!(
            call(&dispatcher(), args("system.ping", Some("{"), None))
                .await
                .is_err()
        );
    }
}
