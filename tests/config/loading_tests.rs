// Config loading tests - server definitions and client settings from disk
//
// Tests focused on file handling, precedence and validation errors.

use astrolabe_core::config::{
    ConfigError, ProviderKind, TransportConfig, load_servers, load_settings_with,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write file");
    path
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn loads_servers_in_declaration_order() {
    let dir = tempdir().expect("tempdir");
    let path = write_file(
        dir.path(),
        "servers_config.json",
        r#"{
  "mcpServers": {
    "sqlite": { "command": "/usr/bin/uvx", "args": ["mcp-server-sqlite", "--db-path", "test.db"] },
    "remote": { "url": "http://localhost:8000/mcp", "headers": { "Authorization": "Bearer t" } },
    "files": { "command": "/usr/bin/npx", "env": { "ROOT": "/srv" } }
  }
}"#,
    );

    let servers = load_servers(&path).expect("servers");

    let names: Vec<&str> = servers.iter().map(|server| server.name.as_str()).collect();
    assert_eq!(names, vec!["sqlite", "remote", "files"]);
    assert_eq!(servers[0].args, vec!["mcp-server-sqlite", "--db-path", "test.db"]);
    assert_eq!(servers[2].env.get("ROOT").map(String::as_str), Some("/srv"));

    match servers[1].transport().expect("http transport") {
        TransportConfig::Http(http) => {
            assert_eq!(http.url, "http://localhost:8000/mcp");
            assert_eq!(http.headers["authorization"], "Bearer t");
        }
        other => panic!("expected http transport, got {other:?}"),
    }
}

#[test]
fn missing_server_file_is_not_found() {
    let result = load_servers(Path::new("/nonexistent/servers_config.json"));
    assert!(matches!(result, Err(ConfigError::NotFound { .. })));
}

#[test]
fn malformed_server_file_is_json_error() {
    let dir = tempdir().expect("tempdir");
    let path = write_file(dir.path(), "servers_config.json", "{ \"mcpServers\": ");

    let result = load_servers(&path);
    assert!(matches!(result, Err(ConfigError::Json { .. })));
}

#[test]
fn document_without_servers_object_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = write_file(dir.path(), "servers_config.json", r#"{ "servers": {} }"#);

    let result = load_servers(&path);
    assert!(matches!(result, Err(ConfigError::MissingServers)));
}

#[test]
fn bad_entry_fails_only_at_transport_selection() {
    let dir = tempdir().expect("tempdir");
    let path = write_file(
        dir.path(),
        "servers_config.json",
        r#"{ "mcpServers": { "good": { "command": "/bin/true" }, "broken": { "args": ["x"] } } }"#,
    );

    let servers = load_servers(&path).expect("servers load");

    assert!(servers[0].transport().is_ok());
    assert!(matches!(
        servers[1].transport(),
        Err(ConfigError::MissingField { field: "command", .. })
    ));
}

#[test]
fn settings_file_supplies_defaults_and_environment_wins() {
    let dir = tempdir().expect("tempdir");
    let path = write_file(
        dir.path(),
        "client.toml",
        r#"
system_prompt = "Responda em português."

[generation]
provider = "ollama"
model = "llama3"
endpoint = "http://ollama.local:11434"
max_retries = 5
retry_delay_seconds = 0.5
temperature = 0.2
"#,
    );

    let settings =
        load_settings_with(Some(&path), env(&[("LLM_TEMPERATURE", "0.9")])).expect("settings");

    assert_eq!(settings.provider.kind, ProviderKind::Ollama);
    assert_eq!(settings.provider.model, "llama3");
    assert_eq!(settings.provider.endpoint, "http://ollama.local:11434");
    assert_eq!(settings.provider.api_key, None);
    assert_eq!(settings.retry.max_retries, 5);
    assert_eq!(settings.retry.base_delay, Duration::from_millis(500));
    assert_eq!(settings.params.temperature, 0.9);
    assert_eq!(settings.params.max_tokens, 4096);
    assert_eq!(settings.system_prompt.as_deref(), Some("Responda em português."));
}

#[test]
fn explicit_settings_path_must_exist() {
    let result = load_settings_with(Some(Path::new("/nonexistent/client.toml")), env(&[]));
    assert!(matches!(result, Err(ConfigError::NotFound { .. })));
}

#[test]
fn malformed_settings_file_is_parse_error() {
    let dir = tempdir().expect("tempdir");
    let path = write_file(dir.path(), "client.toml", "[generation\nprovider = ");

    let result = load_settings_with(Some(&path), env(&[]));
    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn hosted_provider_without_key_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = write_file(dir.path(), "client.toml", "[generation]\nprovider = \"anthropic\"\n");

    let result = load_settings_with(Some(&path), env(&[]));
    assert!(matches!(
        result,
        Err(ConfigError::MissingApiKey {
            env_var: "ANTHROPIC_API_KEY",
            ..
        })
    ));
}

#[test]
fn out_of_range_sampling_values_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = write_file(dir.path(), "client.toml", "[generation]\nprovider = \"ollama\"\n");

    let result = load_settings_with(Some(&path), env(&[("LLM_TOP_P", "1.5")]));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { key: "top_p", .. })
    ));

    let result = load_settings_with(Some(&path), env(&[("LLM_MAX_RETRIES", "zero")]));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue {
            key: "LLM_MAX_RETRIES",
            ..
        })
    ));
}
