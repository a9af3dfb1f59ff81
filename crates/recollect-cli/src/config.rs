use recollect_core::Namespace;
use recollect_memory::MemoryConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Contents of `recollect.toml`.
///
/// ```toml
/// data_dir = "./data"
///
/// [memory]
/// max_entries = 1000
/// language_mode = "auto"
///
/// [presets.agent-1]
/// max_entries = 3
/// custom_stop_words = { en = "agent, memory" }
/// ```
#[derive(Debug, Deserialize)]
pub struct RecollectConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Defaults for every namespace.
    #[serde(default)]
    memory: toml::Table,
    /// Per-namespace overrides, layered over `[memory]`.
    #[serde(default)]
    presets: HashMap<String, toml::Table>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for RecollectConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            memory: toml::Table::new(),
            presets: HashMap::new(),
        }
    }
}

impl RecollectConfig {
    /// Read and parse `path`. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read config file '{}': {e}",
                    path.display()
                ))
            }
        };
        Self::parse(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {e}", path.display()))
    }

    /// Parse TOML text.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Effective memory settings for `namespace`: `[memory]` with the matching
    /// preset's keys on top, then validated.
    pub fn memory_for(&self, namespace: &Namespace) -> anyhow::Result<MemoryConfig> {
        let mut merged = self.memory.clone();
        if let Some(preset) = self.presets.get(namespace.as_str()) {
            for (key, value) in preset {
                merged.insert(key.clone(), value.clone());
            }
        }
        let config: MemoryConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e| anyhow::anyhow!("Invalid memory settings for '{namespace}': {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Directory holding the namespace files.
    pub fn memory_dir(&self) -> PathBuf {
        self.data_dir.join("memory")
    }
}
