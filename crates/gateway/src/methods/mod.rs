//! Built-in feature modules and the bootstrap that wires them into a
//! [`Registry`] at startup.

use std::sync::Arc;

use tracing::{debug, info};

use {
    switchboard_config::{ModulesConfig, SwitchboardConfig},
    switchboard_registry::{ModuleRegistration, Registry, Result},
};

pub mod identity;
pub mod memory;
pub mod onboarding;
pub mod system;

pub use memory::MemoryStore;

/// `(alias, target)` pairs registered after the built-in modules.
pub const BUILTIN_ALIASES: &[(&str, &str)] = &[("onboarding.ambaradam.start", "onboarding.start")];

#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// Which built-in modules to skip.
    pub modules: ModulesConfig,
    /// Extra aliases applied after [`BUILTIN_ALIASES`].
    pub aliases: Vec<(String, String)>,
}

impl BootstrapOptions {
    pub fn from_config(config: &SwitchboardConfig) -> Self {
        Self {
            modules: config.modules.clone(),
            aliases: config
                .aliases
                .iter()
                .map(|(alias, target)| (alias.clone(), target.clone()))
                .collect(),
        }
    }
}

/// Every built-in module, in registration order.
pub fn builtin_modules(memory: &Arc<MemoryStore>) -> Vec<ModuleRegistration> {
    vec![
        system::describe(),
        identity::describe(),
        onboarding::describe(),
        memory::describe(memory),
    ]
}

/// Register the enabled built-in modules, then the built-in and configured
/// aliases. Any error should abort startup.
pub fn bootstrap(registry: &Registry, options: &BootstrapOptions) -> Result<()> {
    let memory = Arc::new(MemoryStore::default());
    for module in builtin_modules(&memory) {
        if !options.modules.is_enabled(&module.name) {
            debug!(module = %module.name, "module disabled");
            continue;
        }
        let name = module.name.clone();
        let keys = registry.register_module(module)?;
        debug!(module = %name, count = keys.len(), "module registered");
    }

    let builtin = BUILTIN_ALIASES
        .iter()
        .filter(|(_, target)| registry.contains(target));
    for (alias, target) in builtin {
        registry.register_alias(alias, target)?;
    }
    for (alias, target) in &options.aliases {
        registry.register_alias(alias, target)?;
    }

    info!(handlers = registry.len(), "registry ready");
    Ok(())
}
