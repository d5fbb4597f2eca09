use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    /// JSON catalog snapshot used by `add-set`.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AllocationConfig {
    #[serde(default = "default_quantity")]
    pub default_quantity: i64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            default_quantity: default_quantity(),
        }
    }
}

fn default_quantity() -> i64 {
    1
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.allocation.default_quantity <= 0 {
        anyhow::bail!("allocation.default_quantity must be > 0");
    }

    if let Some(ref snapshot) = config.catalog.snapshot {
        if !snapshot.exists() {
            anyhow::bail!(
                "catalog.snapshot does not exist: {}",
                snapshot.display()
            );
        }
    }

    Ok(config)
}
