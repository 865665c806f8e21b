//! Application constants
//!
//! Single source of truth for paths, protocol values and defaults.

/// Default MCP server configuration file
pub const SERVERS_CONFIG_PATH: &str = "servers_config.json";

/// Default client settings file
pub const CONFIG_PATH: &str = "config/client.toml";

/// Default environment file path
pub const ENV_PATH: &str = ".env";

/// MCP protocol revision announced during the handshake
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Default read timeout for network-stream transports
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// Default tool execution budget
pub const DEFAULT_TOOL_RETRIES: u32 = 2;
pub const DEFAULT_TOOL_RETRY_DELAY_MS: u64 = 1000;

/// Default generation retry budget
pub const DEFAULT_LLM_MAX_RETRIES: u32 = 3;
pub const DEFAULT_LLM_RETRY_DELAY_SECS: f64 = 2.0;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_API_PATH: &str = "v1beta/models";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama2";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-opus-20240229";
pub const DEFAULT_ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com";
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";

/// Words that end the interactive session
pub const EXIT_KEYWORDS: &[&str] = &["sair", "exit", "quit"];

pub const DEFAULT_DOMAIN_PROMPT: &str = r#"Você é um assistente SRE especializado. Concentre-se em confiabilidade, desempenho, e resposta a incidentes. Priorize a estabilidade do sistema e a automação de tarefas repetitivas.

Ao exibir informações sobre ferramentas:
1. Evite duplicação de conteúdo
2. Mantenha a formatação consistente
3. Apresente cada ferramenta apenas uma vez
4. Seja conciso nas descrições"#;
