use {serde::Deserialize, serde_json::json};

use switchboard_registry::{Action, ModuleRegistration, ParamSchema, ParamType, handler};

const STEPS: &[&str] = &["profile", "connect-accounts", "first-request"];

#[derive(Deserialize)]
struct StartParams {
    #[serde(default)]
    name: Option<String>,
}

pub fn describe() -> ModuleRegistration {
    ModuleRegistration::new("onboarding")
        .description("First-run flow")
        .action(
            Action::new(
                "start",
                handler(|ctx| async move {
                    let params: StartParams = ctx.parse_params()?;
                    let name = params
                        .name
                        .as_deref()
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .unwrap_or("there");
                    Ok(json!({
                        "greeting": format!("Welcome, {name}!"),
                        "steps": STEPS,
                    }))
                }),
            )
            .describe("Begin onboarding and list the remaining steps")
            .params(ParamSchema::object().optional(
                "name",
                ParamType::String,
                "Display name used in the greeting",
            )),
        )
}
