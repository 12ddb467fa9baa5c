//! RON configuration for `tablectl`.
//!
//! Every section has defaults, so a missing file or a partial one is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use table_core::{
    decode_field_value, FieldKind, FieldSpec, FilterSchema, PageSizeLimits, SchemaError, Sort,
    SortParseError,
};
use table_engine::{LoaderSettings, SourceSettings};
use table_logging::table_info;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "tablectl.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid default `{raw}` for field `{field}`: {reason}")]
    FieldDefault {
        field: String,
        raw: String,
        reason: String,
    },
    #[error("invalid default sort `{raw}`: {source}")]
    DefaultSort {
        raw: String,
        source: SortParseError,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: Option<String>,
    pub scope: String,
    pub schema: SchemaConfig,
    pub source: SourceConfig,
    pub loader: LoaderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            scope: "rows".to_string(),
            schema: SchemaConfig::default(),
            source: SourceConfig::default(),
            loader: LoaderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub fields: Vec<FieldConfig>,
    pub sortable: Vec<String>,
    /// `field.asc` or `field.desc`.
    pub default_sort: String,
    pub page_size: u32,
    pub min_page_size: u32,
    pub max_page_size: u32,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let limits = PageSizeLimits::default();
        Self {
            fields: Vec::new(),
            sortable: vec!["timestamp".to_string()],
            default_sort: "timestamp.desc".to_string(),
            page_size: limits.default,
            min_page_size: limits.min,
            max_page_size: limits.max,
        }
    }
}

/// A filter field. `default` uses the same spelling as the query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_bytes: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let settings = SourceSettings::default();
        Self {
            connect_timeout_ms: millis(settings.connect_timeout),
            request_timeout_ms: millis(settings.request_timeout),
            max_bytes: settings.max_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub page_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub auto_merge: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let settings = LoaderSettings::default();
        Self {
            page_timeout_ms: millis(settings.page_timeout),
            poll_interval_ms: millis(settings.poll_interval),
            auto_merge: settings.auto_merge,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Reads `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            table_info!("No config at {:?}; using defaults", path);
            return Ok(AppConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    table_info!("Loaded config from {:?}", path);
    Ok(config)
}

impl SchemaConfig {
    pub fn build(&self) -> Result<Arc<FilterSchema>, ConfigError> {
        let default_sort: Sort =
            self.default_sort
                .parse()
                .map_err(|source| ConfigError::DefaultSort {
                    raw: self.default_sort.clone(),
                    source,
                })?;

        let mut builder = FilterSchema::builder()
            .sortable(self.sortable.iter().cloned())
            .default_sort(default_sort)
            .page_size(PageSizeLimits {
                default: self.page_size,
                min: self.min_page_size,
                max: self.max_page_size,
            });
        for field in &self.fields {
            let mut spec = FieldSpec::new(field.name.clone(), field.kind.clone());
            if let Some(raw) = &field.default {
                let value = decode_field_value(&field.kind, raw).map_err(|reason| {
                    ConfigError::FieldDefault {
                        field: field.name.clone(),
                        raw: raw.clone(),
                        reason,
                    }
                })?;
                if let Some(value) = value {
                    spec = spec.with_default(value);
                }
            }
            builder = builder.field(spec);
        }
        Ok(Arc::new(builder.build()?))
    }
}

impl SourceConfig {
    pub fn settings(&self) -> SourceSettings {
        SourceSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_bytes: self.max_bytes,
        }
    }
}

impl LoaderConfig {
    pub fn settings(&self) -> LoaderSettings {
        LoaderSettings {
            page_timeout: Duration::from_millis(self.page_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            auto_merge: self.auto_merge,
        }
    }
}
