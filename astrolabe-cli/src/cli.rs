use std::path::PathBuf;

use astrolabe_core::CollisionPolicy;
use astrolabe_core::config::ProviderKind;
use astrolabe_core::constants::SERVERS_CONFIG_PATH;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "astrolabe",
    version,
    about = "Cliente de chat MCP com provedores de modelo configuráveis"
)]
pub struct Cli {
    /// MCP server definitions (`{"mcpServers": {...}}`)
    #[arg(long, default_value = SERVERS_CONFIG_PATH)]
    pub servers: PathBuf,
    /// Client settings file; defaults to config/client.toml when present
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub env_file: Option<PathBuf>,
    /// Domain instructions placed before the tool section of the system prompt
    #[arg(long)]
    pub system: Option<String>,
    /// Overrides LLM_PROVIDER
    #[arg(long, value_parser = parse_provider)]
    pub provider: Option<ProviderKind>,
    #[arg(long, default_value_t = CollisionPolicy::LastWins)]
    pub collision_policy: CollisionPolicy,
}

fn parse_provider(value: &str) -> Result<ProviderKind, String> {
    value.parse().map_err(|err: astrolabe_core::config::ConfigError| err.to_string())
}
