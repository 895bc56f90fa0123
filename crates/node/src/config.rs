use std::fs;
use std::path::{Path, PathBuf};

use coop::net::{DEFAULT_MAX_PEERS, DEFAULT_PORT, MAX_NICKNAME_LEN};
use coop::{Appearance, SyncConfig};
use serde::Deserialize;

const PORT_RANGE: std::ops::RangeInclusive<u16> = 1024..=65535;
const TEXTURE_RANGE: std::ops::RangeInclusive<i32> = 0..=255;
// Keepalive pings go out every second.
const MIN_PEER_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub server: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    /// Silence after which a peer is dropped.
    pub peer_timeout_ms: u64,
    pub max_peers: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server: "localhost".into(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 5000,
            peer_timeout_ms: 10_000,
            max_peers: DEFAULT_MAX_PEERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub nickname: String,
    pub body_tex: i32,
    pub head_tex: i32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            nickname: "Nameless".into(),
            body_tex: 9,
            head_tex: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub connection: ConnectionConfig,
    pub player: PlayerConfig,
    pub logging: LoggingConfig,
    pub sync: SyncConfig,
}

impl NodeConfig {
    /// Reads the file when it exists. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Replaces out-of-range values with their defaults. Returns one
    /// message per replaced value.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut issues = Vec::new();
        let connection = ConnectionConfig::default();
        let player = PlayerConfig::default();

        if !PORT_RANGE.contains(&self.connection.port) {
            issues.push(format!(
                "connection.port {} is outside {PORT_RANGE:?}, using {}",
                self.connection.port, connection.port
            ));
            self.connection.port = connection.port;
        }
        if self.connection.server.trim().is_empty() {
            issues.push(format!("connection.server is empty, using {}", connection.server));
            self.connection.server = connection.server;
        }
        if self.connection.peer_timeout_ms < MIN_PEER_TIMEOUT_MS {
            issues.push(format!(
                "connection.peer_timeout_ms must be at least {MIN_PEER_TIMEOUT_MS}, using {}",
                connection.peer_timeout_ms
            ));
            self.connection.peer_timeout_ms = connection.peer_timeout_ms;
        }
        if self.connection.max_peers == 0 {
            issues.push(format!("connection.max_peers is 0, using {}", connection.max_peers));
            self.connection.max_peers = connection.max_peers;
        }

        let nickname_len = self.player.nickname.chars().count();
        if nickname_len == 0 || nickname_len > MAX_NICKNAME_LEN {
            issues.push(format!(
                "player.nickname must be 1 to {MAX_NICKNAME_LEN} characters, using {}",
                player.nickname
            ));
            self.player.nickname = player.nickname;
        }
        if !TEXTURE_RANGE.contains(&self.player.body_tex) {
            issues.push(format!(
                "player.body_tex {} is outside {TEXTURE_RANGE:?}, using {}",
                self.player.body_tex, player.body_tex
            ));
            self.player.body_tex = player.body_tex;
        }
        if !TEXTURE_RANGE.contains(&self.player.head_tex) {
            issues.push(format!(
                "player.head_tex {} is outside {TEXTURE_RANGE:?}, using {}",
                self.player.head_tex, player.head_tex
            ));
            self.player.head_tex = player.head_tex;
        }
        issues
    }

    pub fn appearance(&self) -> Appearance {
        Appearance {
            nickname: self.player.nickname.clone(),
            body_tex: self.player.body_tex,
            head_tex: self.player.head_tex,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = NodeConfig::load(Path::new("/nonexistent/coop.toml")).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.connection.port, 1234);
        assert_eq!(config.connection.connect_timeout_ms, 5000);
        assert_eq!(config.connection.peer_timeout_ms, 10_000);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = NodeConfig::parse(
            r#"
            [connection]
            server = "10.0.0.7"

            [player]
            nickname = "Lester"

            [sync]
            broadcast_radius = 3000.0

            [sync.safe_zone]
            center = [1000.0, 0.0, -500.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.server, "10.0.0.7");
        assert_eq!(config.connection.port, 1234);
        assert_eq!(config.player.nickname, "Lester");
        assert_eq!(config.player.body_tex, 9);
        assert_eq!(config.sync.broadcast_radius, 3000.0);
        assert_eq!(config.sync.destroy_radius_factor, 1.5);
        assert_eq!(config.sync.safe_zone.map(|z| z.radius), Some(500.0));
    }

    #[test]
    fn test_sanitize_replaces_out_of_range() {
        let mut config = NodeConfig::parse(
            r#"
            [connection]
            port = 80
            peer_timeout_ms = 500

            [player]
            nickname = ""
            body_tex = 300
            head_tex = 12
            "#,
        )
        .unwrap();

        let issues = config.sanitize();
        assert_eq!(issues.len(), 4);
        assert_eq!(config.connection.port, 1234);
        assert_eq!(config.connection.peer_timeout_ms, 10_000);
        assert_eq!(config.player.nickname, "Nameless");
        assert_eq!(config.player.body_tex, 9);
        assert_eq!(config.player.head_tex, 12);
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(NodeConfig::parse("[connection\nport = 1").is_err());
        assert!(NodeConfig::parse("[connection]\nport = \"high\"").is_err());
    }
}
