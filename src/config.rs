//! Configuration management
//!
//! Settings come from an optional TOML file, then `FAIRROUND_*` environment
//! overrides, then validation. Every section has working defaults so the
//! server starts with no file at all.

use crate::{
    errors::{ConfigurationError, FairroundResult},
    games::{Game, GameCatalog, GameKnobs},
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::{env, path::Path};

/// Minimum secret length, in bytes after decoding
pub const MIN_SECRET_LEN: usize = 16;
const HEX_PREFIX: &str = "hex:";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FairroundConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub games: Vec<Game>,
}

impl Default for FairroundConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            engine: EngineConfig::default(),
            storage: StorageConfig::default(),
            games: default_games(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Server secret, plain text or `hex:`-prefixed
    pub secret: String,
    /// Background settlement period, 0 disables the sweeper
    pub sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            sweep_interval_secs: 5,
        }
    }
}

impl EngineConfig {
    /// Decoded secret bytes
    pub fn secret_bytes(&self) -> Result<Vec<u8>, ConfigurationError> {
        match self.secret.strip_prefix(HEX_PREFIX) {
            Some(encoded) => hex::decode(encoded.trim()).map_err(|e| ConfigurationError::InvalidValue {
                field: "engine.secret".to_string(),
                value: "<redacted>".to_string(),
                reason: format!("Invalid hex secret: {}", e),
            }),
            None => Ok(self.secret.as_bytes().to_vec()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Rocksdb,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "rocksdb" | "rocks" => Ok(StorageBackend::Rocksdb),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: "./fairround_data".to_string(),
        }
    }
}

/// Catalog offered when the configuration names no games
pub fn default_games() -> Vec<Game> {
    vec![
        Game {
            id: "dice".to_string(),
            name: "Dice High/Low".to_string(),
            round_duration_secs: 60,
            min_bet: 10,
            max_bet: 1000,
            knobs: GameKnobs::HighLow,
        },
        Game {
            id: "coinflip".to_string(),
            name: "Coin Flip".to_string(),
            round_duration_secs: 30,
            min_bet: 1,
            max_bet: 500,
            knobs: GameKnobs::CoinFlip,
        },
        Game {
            id: "wheel".to_string(),
            name: "Color Wheel".to_string(),
            round_duration_secs: 90,
            min_bet: 5,
            max_bet: 2000,
            knobs: GameKnobs::Wheel {
                segments: ["red", "black", "green", "gold"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
        },
        Game {
            id: "lottery".to_string(),
            name: "Pick 6".to_string(),
            round_duration_secs: 300,
            min_bet: 1,
            max_bet: 100,
            knobs: GameKnobs::Lottery { pool: 49, picks: 6 },
        },
    ]
}

impl FairroundConfig {
    pub fn catalog(&self) -> FairroundResult<GameCatalog> {
        GameCatalog::new(self.games.clone())
    }
}

/// What the loader does when no engine secret is configured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecretPolicy {
    /// Generate a per-process secret, memory storage only
    #[default]
    EphemeralIfMissing,
    /// Fail; commitments must be reproducible by the server
    Required,
    /// Leave it empty; for tooling that never derives a seed
    NotNeeded,
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
    secret_policy: SecretPolicy,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret_policy(mut self, policy: SecretPolicy) -> Self {
        self.secret_policy = policy;
        self
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> FairroundResult<FairroundConfig> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an injectable variable lookup
    pub fn load_with<F>(&self, lookup: F) -> FairroundResult<FairroundConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => FairroundConfig::default(),
        };

        Self::apply_overrides(&mut config, lookup)?;

        if config.engine.secret.is_empty() {
            match self.secret_policy {
                SecretPolicy::NotNeeded => {
                    Self::validate_settings(&config)?;
                    return Ok(config);
                }
                SecretPolicy::Required => {
                    return Err(ConfigurationError::ValidationFailed(
                        "engine.secret must be configured explicitly".to_string(),
                    )
                    .into());
                }
                SecretPolicy::EphemeralIfMissing if config.storage.backend == StorageBackend::Rocksdb => {
                    return Err(ConfigurationError::ValidationFailed(
                        "engine.secret is required with persistent storage".to_string(),
                    )
                    .into());
                }
                SecretPolicy::EphemeralIfMissing => {
                    let mut bytes = [0u8; 32];
                    rand::thread_rng().fill_bytes(&mut bytes);
                    config.engine.secret = format!("{}{}", HEX_PREFIX, hex::encode(bytes));
                    tracing::warn!("No engine secret configured, generated an ephemeral one for this process");
                }
            }
        }

        Self::validate(&config)?;
        Ok(config)
    }

    fn load_from_file(path: &str) -> FairroundResult<FairroundConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;
        Ok(toml::from_str(&content)?)
    }

    fn apply_overrides<F>(config: &mut FairroundConfig, lookup: F) -> FairroundResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("FAIRROUND_SECRET") {
            config.engine.secret = secret;
        }
        if let Some(host) = lookup("FAIRROUND_API_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("FAIRROUND_API_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigurationError::InvalidValue {
                field: "FAIRROUND_API_PORT".to_string(),
                value: port,
                reason: "Invalid port number".to_string(),
            })?;
        }
        if let Some(data_dir) = lookup("FAIRROUND_DATA_DIR") {
            config.storage.data_dir = data_dir;
        }
        if let Some(backend) = lookup("FAIRROUND_STORAGE") {
            config.storage.backend =
                backend
                    .parse()
                    .map_err(|reason| ConfigurationError::InvalidValue {
                        field: "FAIRROUND_STORAGE".to_string(),
                        value: backend,
                        reason,
                    })?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(config: &FairroundConfig) -> FairroundResult<()> {
        let secret = config.engine.secret_bytes()?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigurationError::InvalidValue {
                field: "engine.secret".to_string(),
                value: "<redacted>".to_string(),
                reason: format!("Secret must be at least {} bytes", MIN_SECRET_LEN),
            }
            .into());
        }
        Self::validate_settings(config)
    }

    /// Everything except the secret
    fn validate_settings(config: &FairroundConfig) -> FairroundResult<()> {
        if config.server.port == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "server.port".to_string(),
                value: "0".to_string(),
                reason: "Port cannot be zero".to_string(),
            }
            .into());
        }
        if config.server.request_timeout_secs == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "server.request_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "Request timeout cannot be zero".to_string(),
            }
            .into());
        }

        if config.storage.backend == StorageBackend::Rocksdb && config.storage.data_dir.is_empty() {
            return Err(ConfigurationError::ValidationFailed(
                "storage.data_dir is required for rocksdb".to_string(),
            )
            .into());
        }

        if config.games.is_empty() {
            return Err(ConfigurationError::ValidationFailed("No games configured".to_string()).into());
        }
        // Catalog construction checks every game and id uniqueness.
        config.catalog()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, io::Write};
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_ephemeral_secret() {
        let config = ConfigLoader::new().load_with(vars(&[])).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.games.len(), 4);
        assert!(config.engine.secret.starts_with(HEX_PREFIX));
        assert_eq!(config.engine.secret_bytes().unwrap().len(), 32);
    }

    #[test]
    fn test_env_overrides() {
        let config = ConfigLoader::new()
            .load_with(vars(&[
                ("FAIRROUND_SECRET", "a-long-enough-server-secret"),
                ("FAIRROUND_API_PORT", "9100"),
                ("FAIRROUND_STORAGE", "rocksdb"),
                ("FAIRROUND_DATA_DIR", "/tmp/fairround"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.storage.backend, StorageBackend::Rocksdb);
        assert_eq!(config.storage.data_dir, "/tmp/fairround");
        assert_eq!(config.engine.secret_bytes().unwrap(), b"a-long-enough-server-secret");
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        assert!(ConfigLoader::new()
            .load_with(vars(&[("FAIRROUND_API_PORT", "http")]))
            .is_err());
        assert!(ConfigLoader::new()
            .load_with(vars(&[("FAIRROUND_SECRET", "short")]))
            .is_err());
        assert!(ConfigLoader::new()
            .load_with(vars(&[("FAIRROUND_STORAGE", "rocksdb")]))
            .is_err());
    }

    #[test]
    fn test_required_secret_is_never_generated() {
        let loader = ConfigLoader::new().with_secret_policy(SecretPolicy::Required);
        assert!(loader.load_with(vars(&[])).is_err());

        let config = loader
            .load_with(vars(&[("FAIRROUND_SECRET", "a-long-enough-server-secret")]))
            .unwrap();
        assert_eq!(config.engine.secret, "a-long-enough-server-secret");
    }

    #[test]
    fn test_secret_not_needed_allows_rocksdb_without_secret() {
        let config = ConfigLoader::new()
            .with_secret_policy(SecretPolicy::NotNeeded)
            .load_with(vars(&[
                ("FAIRROUND_STORAGE", "rocksdb"),
                ("FAIRROUND_DATA_DIR", "/tmp/fairround"),
            ]))
            .unwrap();
        assert!(config.engine.secret.is_empty());

        // A configured secret is still validated.
        assert!(ConfigLoader::new()
            .with_secret_policy(SecretPolicy::NotNeeded)
            .load_with(vars(&[("FAIRROUND_SECRET", "short")]))
            .is_err());
    }

    #[test]
    fn test_hex_secret() {
        let engine = EngineConfig {
            secret: format!("hex:{}", "ab".repeat(16)),
            sweep_interval_secs: 0,
        };
        assert_eq!(engine.secret_bytes().unwrap(), vec![0xab; 16]);

        let bad = EngineConfig {
            secret: "hex:zz".to_string(),
            sweep_interval_secs: 0,
        };
        assert!(bad.secret_bytes().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 7000

[engine]
secret = "toml-file-secret-value"
sweep_interval_secs = 0

[[games]]
id = "spin"
name = "Spin"
round_duration_secs = 20
min_bet = 1
max_bet = 10

[games.knobs]
kind = "wheel"
segments = ["a", "b", "c"]
"#
        )
        .unwrap();

        let config = ConfigLoader::new().with_path(file.path()).load_with(vars(&[])).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.engine.sweep_interval_secs, 0);
        assert_eq!(config.games.len(), 1);
        assert_eq!(config.games[0].id, "spin");
        assert!(matches!(config.games[0].knobs, GameKnobs::Wheel { ref segments } if segments.len() == 3));
    }

    #[test]
    fn test_duplicate_games_rejected() {
        let mut config = FairroundConfig {
            engine: EngineConfig {
                secret: "a-long-enough-server-secret".to_string(),
                sweep_interval_secs: 0,
            },
            ..FairroundConfig::default()
        };
        config.games.push(config.games[0].clone());
        assert!(ConfigLoader::validate(&config).is_err());
    }
}
