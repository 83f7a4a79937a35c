use serde_json::json;

use {
    switchboard_protocol::DispatchError,
    switchboard_registry::{Action, ModuleRegistration, ParamSchema, handler},
};

pub fn describe() -> ModuleRegistration {
    ModuleRegistration::new("identity")
        .requires_auth(true)
        .description("Caller identity")
        .action(
            Action::new(
                "whoami",
                handler(|ctx| async move {
                    let auth = ctx
                        .auth
                        .as_ref()
                        .ok_or_else(|| DispatchError::unauthorized("no caller identity"))?;
                    Ok(json!({
                        "subject": auth.subject,
                        "scopes": auth.scopes,
                    }))
                }),
            )
            .describe("Return the authenticated subject and its scopes")
            .params(ParamSchema::object()),
        )
}
