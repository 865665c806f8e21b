mod cli;
mod input;

use astrolabe_core::config::{ensure_env_loaded, load_servers, load_settings_with};
use astrolabe_core::constants::DEFAULT_DOMAIN_PROMPT;
use astrolabe_core::model::GenerationBackend;
use astrolabe_core::{ChatOrchestrator, ServerConnection};
use clap::Parser;
use cli::Cli;
use input::TerminalInput;
use std::env;
use std::error::Error;
use std::sync::{Arc, Once};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt};

static TRACING: Once = Once::new();

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    ensure_env_loaded(cli.env_file.as_deref());
    init_tracing();
    info!("Starting astrolabe");
    debug!(?cli, "CLI arguments parsed");

    let provider_override = cli.provider.map(|kind| kind.to_string());
    let settings = load_settings_with(cli.config.as_deref(), |key| match key {
        "LLM_PROVIDER" if provider_override.is_some() => provider_override.clone(),
        _ => env::var(key).ok(),
    })
    .inspect_err(|err| {
        error!(%err, "Failed to load client settings");
        eprintln!("{}", err.user_message());
    })?;
    info!(
        provider = %settings.provider.kind,
        model = %settings.provider.model,
        "Generation provider selected"
    );

    let servers = load_servers(&cli.servers).inspect_err(|err| {
        error!(%err, path = %cli.servers.display(), "Failed to load server configuration");
        eprintln!("{}", err.user_message());
    })?;
    let connections: Vec<Arc<ServerConnection>> = servers
        .into_iter()
        .map(|config| Arc::new(ServerConnection::new(config)))
        .collect();

    let backend = GenerationBackend::new(&settings.provider, settings.retry);
    let domain_prompt = cli
        .system
        .or(settings.system_prompt)
        .unwrap_or_else(|| DEFAULT_DOMAIN_PROMPT.to_string());

    let mut chat = ChatOrchestrator::new(connections, backend, settings.params)
        .with_domain_prompt(Some(domain_prompt))
        .with_collision_policy(cli.collision_policy);

    let mut input = TerminalInput::spawn();
    let mut stdout = tokio::io::stdout();
    if let Err(err) = chat.run(&mut input, &mut stdout).await {
        eprintln!("{}", err.user_message());
        return Err(err.into());
    }
    info!("Chat session finished");
    Ok(())
}

/// Logs go to stderr; stdout carries the conversation. The filter comes
/// from `LOG_LEVEL`, then `RUST_LOG`, then `info`.
fn init_tracing() {
    TRACING.call_once(|| {
        let filter = env::var("LOG_LEVEL")
            .ok()
            .and_then(|level| EnvFilter::try_new(level.to_lowercase()).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("info"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
