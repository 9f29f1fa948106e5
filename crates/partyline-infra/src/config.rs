//! Client configuration loader for partyline.
//!
//! Reads `config.toml` from the data directory (`~/.partyline/` by default)
//! and deserializes it into [`ClientConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use partyline_types::config::ClientConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PARTYLINE_DATA_DIR";

/// Environment variable overriding `server_url`.
pub const SERVER_URL_ENV: &str = "PARTYLINE_SERVER_URL";

/// Load client configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ClientConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - `PARTYLINE_SERVER_URL`, when set, replaces the configured server URL.
pub async fn load_client_config(data_dir: &Path) -> ClientConfig {
    let config = read_config_file(data_dir).await;
    apply_server_url_override(config, std::env::var(SERVER_URL_ENV).ok())
}

async fn read_config_file(data_dir: &Path) -> ClientConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ClientConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ClientConfig::default();
        }
    };

    match toml::from_str::<ClientConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            ClientConfig::default()
        }
    }
}

fn apply_server_url_override(mut config: ClientConfig, server_url: Option<String>) -> ClientConfig {
    if let Some(url) = server_url.filter(|url| !url.trim().is_empty()) {
        tracing::debug!(%url, "server URL overridden from environment");
        config.server_url = url;
    }
    config
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `PARTYLINE_DATA_DIR` environment variable
/// 2. `~/.partyline`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".partyline");
    }

    PathBuf::from(".partyline")
}

/// SQLite URL of the client state database inside `data_dir`.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("partyline.db").display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(tmp.path()).await;
        assert_eq!(config, ClientConfig::default());
    }

    #[tokio::test]
    async fn valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
server_url = "wss://chat.example.net/socket"
event_channel_capacity = 32

[reconnect]
max_attempts = 4
backoff_factor = 1.5
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.server_url, "wss://chat.example.net/socket");
        assert_eq!(config.event_channel_capacity, 32);
        assert_eq!(config.reconnect.max_attempts, 4);
        assert_eq!(config.reconnect.base_delay_ms, 1_000);
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "server_url = [unterminated")
            .await
            .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn server_url_override_replaces_configured_url() {
        let config = apply_server_url_override(ClientConfig::default(), Some("ws://10.0.0.2/ws".to_string()));
        assert_eq!(config.server_url, "ws://10.0.0.2/ws");

        let config = apply_server_url_override(ClientConfig::default(), Some("  ".to_string()));
        assert_eq!(config.server_url, ClientConfig::default().server_url);
    }

    #[test]
    fn test_database_url_points_into_data_dir() {
        let url = database_url(Path::new("/home/user/.partyline"));
        assert_eq!(url, "sqlite:///home/user/.partyline/partyline.db?mode=rwc");
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-partyline");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-partyline"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
