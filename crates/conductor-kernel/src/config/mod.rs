//! Configuration loading
//!
//! Loads orchestrator settings and workflow submissions from any of the
//! formats supported by the `config` crate: YAML, TOML, JSON, INI, RON and
//! JSON5.
//!
//! ## Features
//!
//! - Format detection from the file extension
//! - Environment variable substitution (`${VAR}` and `$VAR` syntax)
//! - Layering of several sources, later sources winning
//! - Environment overrides with a prefix (`PREFIX_SECTION__KEY`)

use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static BRACED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("braced env var pattern is valid")
});

static BARE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("bare env var pattern is valid")
});

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Supported configuration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
    Ini,
    Ron,
    Json5,
}

impl ConfigFormat {
    /// Map a file extension (without the dot) to a format
    pub fn from_extension(ext: &str) -> ConfigResult<Self> {
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "ini" => Ok(Self::Ini),
            "ron" => Ok(Self::Ron),
            "json5" => Ok(Self::Json5),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    fn file_format(self) -> FileFormat {
        match self {
            Self::Yaml => FileFormat::Yaml,
            Self::Toml => FileFormat::Toml,
            Self::Json => FileFormat::Json,
            Self::Ini => FileFormat::Ini,
            Self::Ron => FileFormat::Ron,
            Self::Json5 => FileFormat::Json5,
        }
    }
}

/// Detect configuration format from file extension
///
/// ```rust,ignore
/// use conductor_kernel::config::{detect_format, ConfigFormat};
///
/// assert_eq!(detect_format("orchestrator.toml")?, ConfigFormat::Toml);
/// ```
pub fn detect_format(path: impl AsRef<Path>) -> ConfigResult<ConfigFormat> {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    ConfigFormat::from_extension(ext)
}

/// Substitute environment variables in a string
///
/// `${VAR_NAME}` is replaced first, then `$VAR_NAME`. References to unset
/// variables are left untouched.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = BRACED_VAR.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    BARE_VAR
        .replace_all(&braced, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

fn deserialize<T: DeserializeOwned>(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> ConfigResult<T> {
    builder
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

fn source(content: &str, format: ConfigFormat) -> File<config::FileSourceString, FileFormat> {
    File::from_str(&substitute_env_vars(content), format.file_format())
}

/// Load configuration from a string with explicit format
pub fn from_str<T>(content: &str, format: ConfigFormat) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    deserialize(Cfg::builder().add_source(source(content, format)))
}

/// Load configuration from a file, detecting the format from its extension
///
/// ```rust,ignore
/// use conductor_kernel::config::load_config;
///
/// let settings: MySettings = load_config("orchestrator.yaml")?;
/// ```
pub fn load_config<T>(path: impl AsRef<Path>) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    from_str(&content, format)
}

/// Load configuration from several files; later files override earlier ones
pub fn load_merged<T, P>(paths: &[P]) -> ConfigResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let mut builder = Cfg::builder();
    for path in paths {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        builder = builder.add_source(source(&content, format));
    }
    deserialize(builder)
}

/// Load configuration from a file, then apply environment overrides
///
/// With prefix `CONDUCTOR`, the field `default_breaker.failure_threshold`
/// is overridden by `CONDUCTOR_DEFAULT_BREAKER__FAILURE_THRESHOLD`.
pub fn load_with_env<T>(path: impl AsRef<Path>, env_prefix: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    deserialize(
        Cfg::builder()
            .add_source(source(&content, format))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__"),
            ),
    )
}
