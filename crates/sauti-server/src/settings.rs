//! Layered server settings: built-in defaults, an optional TOML file, then environment

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use sauti_core::{EngineConfig, ServerConfig};

const DEFAULT_CONFIG_FILE: &str = "sauti.toml";
const CONFIG_PATH_VAR: &str = "SAUTI_CONFIG";
const ENV_PREFIX: &str = "SAUTI";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Settings {
    /// Load from `SAUTI_CONFIG` (or `./sauti.toml`) and `SAUTI_<SECTION>__<KEY>` variables.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_sources(Some(path), environment())
    }

    fn from_sources(file: Option<PathBuf>, env: Environment) -> anyhow::Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings = builder.add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn defaults_without_sources() {
        let settings = Settings::from_sources(None, env_from(&[])).unwrap();
        assert_eq!(settings.server.bind_addr(), "0.0.0.0:8000");
        assert_eq!(settings.engine.model_id, "suno/bark-small");
        assert!(settings.engine.preload);
    }

    #[test]
    fn file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sauti.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\ncors_enabled = false\n\n[engine]\ndevice = \"cpu\"\nmax_text_tokens = 128\n",
        )
        .unwrap();

        let settings = Settings::from_sources(
            Some(path),
            env_from(&[("SAUTI_SERVER__PORT", "9100"), ("SAUTI_ENGINE__OFFLINE", "true")]),
        )
        .unwrap();

        assert_eq!(settings.server.port, 9100);
        assert!(!settings.server.cors_enabled);
        assert_eq!(settings.engine.device.to_string(), "cpu");
        assert_eq!(settings.engine.max_text_tokens, 128);
        assert!(settings.engine.offline);
    }

    #[test]
    fn missing_file_is_ignored() {
        let settings = Settings::from_sources(
            Some(PathBuf::from("/nonexistent/sauti.toml")),
            env_from(&[]),
        )
        .unwrap();
        assert_eq!(settings.server.port, 8000);
    }
}
