use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub observation_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QualityConfig {
    #[serde(default = "default_low_text_threshold")]
    pub low_text_threshold: i64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            low_text_threshold: default_low_text_threshold(),
        }
    }
}

fn default_low_text_threshold() -> i64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ResolutionConfig {
    /// Rank TransUnion's authoritative sections ahead of confidence.
    #[serde(default)]
    pub bureau_precedence: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl Config {
    /// Defaults rooted at `./data`, for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            storage: StorageConfig {
                upload_dir: PathBuf::from("./data/uploads"),
                observation_dir: PathBuf::from("./data/observations"),
            },
            quality: QualityConfig::default(),
            extraction: ExtractionConfig::default(),
            resolution: ResolutionConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.storage.upload_dir.as_os_str().is_empty() {
        anyhow::bail!("storage.upload_dir must not be empty");
    }
    if config.storage.observation_dir.as_os_str().is_empty() {
        anyhow::bail!("storage.observation_dir must not be empty");
    }

    if config.quality.low_text_threshold < 1 {
        anyhow::bail!("quality.low_text_threshold must be >= 1");
    }

    if config.extraction.max_upload_bytes == 0 {
        anyhow::bail!("extraction.max_upload_bytes must be > 0");
    }

    Ok(())
}
