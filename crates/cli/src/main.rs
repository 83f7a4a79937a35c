mod config_commands;
mod registry_commands;

use std::{path::PathBuf, process::ExitCode};

use {
    anyhow::{Context, bail},
    clap::{Parser, Subcommand},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    switchboard_config::{SwitchboardConfig, validate},
    switchboard_gateway::{AppState, TokenAuth},
};

#[derive(Parser)]
#[command(name = "switchboard", about = "Switchboard: dotted-key handler registry and dispatcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./switchboard.toml, then ~/.config/switchboard/).
    #[arg(long, global = true, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Address to bind to (overrides config value).
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides config value).
        #[arg(long)]
        port: Option<u16>,
    },
    /// List every registered key with its auth metadata.
    Keys,
    /// Print the tool manifest as JSON.
    Tools,
    /// Dispatch a single request in-process and print the envelope.
    Call {
        key: String,
        /// Params as a JSON object.
        #[arg(long)]
        params: Option<String>,
        /// Act as this subject (omit for an anonymous call).
        #[arg(long)]
        subject: Option<String>,
        /// Scope granted to the subject; repeatable.
        #[arg(long = "scope")]
        scopes: Vec<String>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Validate the configuration and bootstrap the registry without serving.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SwitchboardConfig> {
    Ok(switchboard_config::load_or_discover(cli.config.as_deref())?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn serve(cli: &Cli, bind: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let report = validate::validate(cli.config.as_deref());
    for d in &report.diagnostics {
        warn!(diagnostic = %d, "config");
    }
    report.into_result()?;

    let config = load_config(cli)?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let port = port.unwrap_or(config.server.port);

    let dispatcher =
        switchboard_gateway::dispatcher_from_config(&config).context("registry bootstrap failed")?;
    let auth = TokenAuth::from_config(&config.auth);
    if auth.is_empty() {
        warn!("no auth tokens configured; protected keys will always return 401");
    }
    switchboard_gateway::serve(AppState::new(dispatcher, auth), &bind, port, shutdown_signal())
        .await
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "switchboard starting");

    match cli.command {
        Commands::Serve { ref bind, port } => {
            serve(&cli, bind.clone(), port).await?;
        },
        Commands::Keys => {
            let dispatcher = switchboard_gateway::dispatcher_from_config(&load_config(&cli)?)?;
            registry_commands::keys(&dispatcher);
        },
        Commands::Tools => {
            let dispatcher = switchboard_gateway::dispatcher_from_config(&load_config(&cli)?)?;
            registry_commands::tools(&dispatcher)?;
        },
        Commands::Call {
            ref key,
            ref params,
            ref subject,
            ref scopes,
            timeout_ms,
        } => {
            if subject.is_none() && !scopes.is_empty() {
                bail!("--scope requires --subject");
            }
            let dispatcher = switchboard_gateway::dispatcher_from_config(&load_config(&cli)?)?;
            let ok = registry_commands::call(&dispatcher, registry_commands::CallArgs {
                key: key.clone(),
                params: params.clone(),
                subject: subject.clone(),
                scopes: scopes.clone(),
                timeout_ms,
            })
            .await?;
            if !ok {
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Check => {
            if !config_commands::check(cli.config.as_deref())? {
                return Ok(ExitCode::FAILURE);
            }
        },
    }
    Ok(ExitCode::SUCCESS)
}
