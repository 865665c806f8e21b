pub mod error;
pub mod loader;
pub mod server;
pub mod settings;

pub use error::ConfigError;
pub use loader::{ensure_env_loaded, load_servers, load_settings, load_settings_with, parse_servers};
pub use server::{HttpConfig, ServerConfig, StdioConfig, TransportConfig};
pub use settings::{ProviderKind, ProviderSettings, RetrySettings, Settings};
