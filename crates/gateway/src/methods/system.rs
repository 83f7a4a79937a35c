use serde_json::json;

use switchboard_registry::{Action, ModuleRegistration, ParamSchema, ParamType, handler};

pub fn describe() -> ModuleRegistration {
    ModuleRegistration::new("system")
        .description("Liveness checks")
        .action(
            Action::new(
                "ping",
                handler(|ctx| async move {
                    Ok(json!({
                        "pong": true,
                        "echo": ctx.params.get("echo").cloned(),
                    }))
                }),
            )
            .describe("Round-trip check; echoes `echo` back")
            .params(ParamSchema::object().optional("echo", ParamType::Any, "Value to echo back")),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        switchboard_registry::{HandlerContext, Registry},
    };

    #[tokio::test]
    async fn ping_echoes() {
        let registry = Registry::new();
        registry.register_module(describe()).unwrap();
        let entry = registry.resolve("system.ping").unwrap();
        assert!(!entry.requires_auth);
        let out = entry
            .call(HandlerContext::new(entry.key.clone(), json!({"echo": [1, 2]})))
            .await
            .unwrap();
        assert_eq!(out, json!({"pong": true, "echo": [1, 2]}));
    }
}
