use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

pub const DEFAULT_PORT: u16 = 55555;

/// Persisted P2P chat settings (default port, default username, socket knobs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: u16,
    pub port_attempts: u16,
    pub bind_address: IpAddr,
    pub backlog: u32,
    pub io_timeout_secs: u64,
    pub max_frame_len: usize,
    pub username: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            port_attempts: 10,
            bind_address: IpAddr::from([0, 0, 0, 0]),
            backlog: 5,
            io_timeout_secs: 5,
            max_frame_len: crate::protocol::MAX_FRAME_LEN,
            username: None,
        }
    }
}

impl Settings {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

/// Missing file means defaults; anything unreadable or unparsable is an error.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        tracing::debug!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = serde_json::from_str(&content)?;
    tracing::info!("Loaded settings from {}", path.display());
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Saved settings to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_chat_settings() {
        let s = Settings::default();
        assert_eq!(s.port, 55555);
        assert_eq!(s.port_attempts, 10);
        assert_eq!(s.backlog, 5);
        assert_eq!(s.io_timeout(), Duration::from_secs(5));
        assert_eq!(s.max_frame_len, 1024);
        assert!(s.username.is_none());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_settings(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("p2p.json");
        let settings = Settings {
            port: 40000,
            username: Some("Alice".into()),
            ..Settings::default()
        };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p2p.json");
        fs::write(&path, r#"{ "username": "Bob" }"#).unwrap();
        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded.port, DEFAULT_PORT);
        assert_eq!(loaded.username.as_deref(), Some("Bob"));
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p2p.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(load_settings(&path), Err(SettingsError::Parse(_))));
    }
}
