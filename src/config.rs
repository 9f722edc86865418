use std::fs;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{CompositeFile, CompositeRegistry, CompositeType};
use crate::error::IsaError;
use crate::investigation::{FilePattern, INVESTIGATION_PATTERN};

pub const DEFAULT_CONFIG_FILE: &str = "isa-datatype.json";
pub const DEFAULT_FILE_EXT: &str = "isa";
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub file_ext: Option<String>,
    #[serde(default)]
    pub investigation_pattern: Option<String>,
    #[serde(default)]
    pub composite_type: Option<CompositeType>,
    #[serde(default)]
    pub composite_files: Vec<CompositeFileEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CompositeFileEntry {
    Shorthand(String),
    Detailed(CompositeFile),
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub file_ext: String,
    pub investigation_pattern: FilePattern,
    pub composite_type: CompositeType,
    pub allow_datatype_change: bool,
    pub is_binary: bool,
    pub composite_files: CompositeRegistry,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, IsaError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Self::defaults();
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| IsaError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| IsaError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn defaults() -> Result<ResolvedConfig, IsaError> {
        Self::resolve_config(Config::default())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, IsaError> {
        let schema_version = config.schema_version.unwrap_or(CONFIG_SCHEMA_VERSION);
        if schema_version != CONFIG_SCHEMA_VERSION {
            return Err(IsaError::ConfigParse(format!(
                "unsupported schema_version {schema_version}, expected {CONFIG_SCHEMA_VERSION}"
            )));
        }
        let file_ext = config
            .file_ext
            .map(|ext| ext.trim().trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_EXT.to_string());
        let investigation_pattern = FilePattern::new(
            config
                .investigation_pattern
                .as_deref()
                .unwrap_or(INVESTIGATION_PATTERN),
        )?;

        let composite_files = config
            .composite_files
            .into_iter()
            .map(|entry| match entry {
                CompositeFileEntry::Shorthand(name) => CompositeFile::new(name),
                CompositeFileEntry::Detailed(file) => file,
            })
            .collect::<CompositeRegistry>();

        Ok(ResolvedConfig {
            file_ext,
            investigation_pattern,
            composite_type: config.composite_type.unwrap_or(CompositeType::Basic),
            allow_datatype_change: false,
            is_binary: true,
            composite_files,
        })
    }
}
