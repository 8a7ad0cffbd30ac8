//! Loader for the simulator's `broadcasting.json`.
//!
//! The file lives in the simulator's own config directory and is written
//! by the game, sometimes with stray NUL bytes that must be stripped
//! before parsing. A zero listener port means broadcasting is disabled in
//! the file; it is auto-corrected to 9000 and the file rewritten so the
//! simulator picks the port up on its next start.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TelemetryError};

/// File name inside the simulator's config directory.
pub const CONFIG_FILE_NAME: &str = "broadcasting.json";

/// Default UDP listener port substituted for a zero port.
pub const DEFAULT_PORT: u16 = 9000;

/// The three keys of `broadcasting.json`. The `upd` typo is the
/// simulator's, and part of the format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastConfig {
    #[serde(rename = "updListenerPort")]
    pub udp_listener_port: u16,
    #[serde(rename = "connectionPassword")]
    pub connection_password: String,
    #[serde(rename = "commandPassword")]
    pub command_password: String,
}

/// Loads and sanitizes the config from `dir/broadcasting.json`.
pub fn load_from_dir(dir: &Path) -> Result<BroadcastConfig> {
    load_file(&dir.join(CONFIG_FILE_NAME))
}

/// Loads and sanitizes a specific config file.
pub fn load_file(path: &Path) -> Result<BroadcastConfig> {
    let raw = std::fs::read(path)
        .map_err(|e| TelemetryError::config(path, format!("cannot read: {e}")))?;

    let mut config = parse(&raw).map_err(|e| TelemetryError::config(path, e))?;

    if config.udp_listener_port == 0 {
        config.udp_listener_port = DEFAULT_PORT;
        match rewrite(path, &config) {
            Ok(()) => info!(path = %path.display(), port = DEFAULT_PORT, "auto-corrected zero listener port"),
            Err(e) => warn!(error = %e, "could not rewrite config with corrected port"),
        }
    }

    Ok(config)
}

fn parse(raw: &[u8]) -> std::result::Result<BroadcastConfig, String> {
    // The game occasionally pads the file with NUL bytes.
    let cleaned: Vec<u8> = raw.iter().copied().filter(|&b| b != 0).collect();
    serde_json::from_slice(&cleaned).map_err(|e| format!("parse failure: {e}"))
}

fn rewrite(path: &Path, config: &BroadcastConfig) -> Result<()> {
    let pretty = serde_json::to_string_pretty(config)
        .map_err(|e| TelemetryError::config(path, format!("serialize failure: {e}")))?;
    std::fs::write(path, pretty)
        .map_err(|e| TelemetryError::config(path, format!("cannot write: {e}")))
}

/// Default location of the simulator's config directory for the current
/// user, when it can be derived from the environment.
pub fn default_config_dir() -> Option<PathBuf> {
    let profile = std::env::var_os("USERPROFILE").or_else(|| std::env::var_os("HOME"))?;
    Some(
        PathBuf::from(profile)
            .join("Documents")
            .join("Assetto Corsa Competizione")
            .join("Config"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(content: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn parses_plain_file() {
        let (_dir, path) = write_temp(
            br#"{"updListenerPort": 9000, "connectionPassword": "asd", "commandPassword": ""}"#,
        );
        let config = load_file(&path).unwrap();
        assert_eq!(config.udp_listener_port, 9000);
        assert_eq!(config.connection_password, "asd");
    }

    #[test]
    fn strips_nul_bytes_before_parsing() {
        let mut content =
            br#"{"updListenerPort": 9000, "connectionPassword": "asd", "commandPassword": ""}"#
                .to_vec();
        content.insert(0, 0);
        content.push(0);
        content.push(0);
        let (_dir, path) = write_temp(&content);
        assert_eq!(load_file(&path).unwrap().udp_listener_port, 9000);
    }

    #[test]
    fn zero_port_is_corrected_and_rewritten() {
        let (_dir, path) = write_temp(
            br#"{"updListenerPort": 0, "connectionPassword": "", "commandPassword": ""}"#,
        );

        let config = load_file(&path).unwrap();
        assert_eq!(config.udp_listener_port, DEFAULT_PORT);

        // The rewritten file parses to the corrected port.
        let reloaded = load_file(&path).unwrap();
        assert_eq!(reloaded.udp_listener_port, DEFAULT_PORT);
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("9000"));
        assert!(on_disk.contains("updListenerPort"));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_from_dir(dir.path()),
            Err(TelemetryError::Config { .. })
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let (_dir, path) = write_temp(b"not json at all");
        assert!(matches!(load_file(&path), Err(TelemetryError::Config { .. })));
    }
}
