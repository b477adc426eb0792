use crate::domain::{SemVer, VersionCalculationOptions, VersionOrdering, VersionPart};
use crate::error::{Result, TagverError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "tagver.toml";
pub const USER_CONFIG_FILE_NAME: &str = ".tagver.toml";

/// Represents the complete configuration for git-tagver.
///
/// Top-level keys mirror [`VersionCalculationOptions`]; the `[repository]`
/// table controls how the repository may be accessed.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    #[serde(default = "default_prerelease_phase")]
    pub default_prerelease_phase: String,

    #[serde(default = "default_minimum_version")]
    pub minimum_version: SemVer,

    #[serde(default = "default_prerelease_base_height")]
    pub prerelease_base_height: u32,

    #[serde(default)]
    pub version_override: Option<SemVer>,

    #[serde(default)]
    pub build_metadata: Option<String>,

    #[serde(default)]
    pub query_remote_tags: bool,

    #[serde(default)]
    pub auto_increment: VersionPart,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default)]
    pub version_ordering: VersionOrdering,

    #[serde(default)]
    pub repository: RepositoryConfig,
}

fn default_tag_prefix() -> String {
    "v".to_string()
}

fn default_prerelease_phase() -> String {
    "alpha".to_string()
}

fn default_minimum_version() -> SemVer {
    SemVer::new(0, 1, 0)
}

fn default_prerelease_base_height() -> u32 {
    1
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Repository access settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct RepositoryConfig {
    /// Deepen shallow clones and query remote tags
    #[serde(default)]
    pub auto_fetch: bool,

    #[serde(default)]
    pub enable_shadow_repo: bool,

    #[serde(default)]
    pub enable_lightweight_tags: bool,

    /// Command deciding whether a tag may be used; `{}` is the tag name
    #[serde(default)]
    pub filter_tags: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tag_prefix: default_tag_prefix(),
            default_prerelease_phase: default_prerelease_phase(),
            minimum_version: default_minimum_version(),
            prerelease_base_height: default_prerelease_base_height(),
            version_override: None,
            build_metadata: None,
            query_remote_tags: false,
            auto_increment: VersionPart::default(),
            remote: default_remote(),
            version_ordering: VersionOrdering::default(),
            repository: RepositoryConfig::default(),
        }
    }
}

impl Config {
    /// Calculation options described by this configuration
    ///
    /// `repository.auto_fetch` also turns on remote tag queries.
    pub fn to_options(&self) -> VersionCalculationOptions {
        VersionCalculationOptions {
            tag_prefix: self.tag_prefix.clone(),
            default_prerelease_phase: self.default_prerelease_phase.clone(),
            minimum_version: self.minimum_version.clone(),
            prerelease_base_height: self.prerelease_base_height,
            version_override: self.version_override.clone(),
            build_metadata: self.build_metadata.clone(),
            query_remote_tags: self.query_remote_tags || self.repository.auto_fetch,
            auto_increment: self.auto_increment,
            remote: self.remote.clone(),
            version_ordering: self.version_ordering,
        }
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(text: &str) -> Result<Config> {
    toml::from_str(text).map_err(|e| TagverError::config(e.to_string()))
}

/// Finds the configuration file to use, if any.
///
/// Search order:
/// 1. Custom path provided as parameter
/// 2. `tagver.toml` in the source directory
/// 3. `.tagver.toml` in the user config directory
pub fn find_config_file(config_path: Option<&Path>, source_dir: &Path) -> Option<PathBuf> {
    if let Some(path) = config_path {
        return Some(path.to_path_buf());
    }

    let local = source_dir.join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(USER_CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// Loads configuration from file or returns defaults.
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If a file was found (or named explicitly) but cannot be read or parsed
pub fn load_config(config_path: Option<&Path>, source_dir: &Path) -> Result<Config> {
    let Some(path) = find_config_file(config_path, source_dir) else {
        debug!("No configuration file found, using defaults");
        return Ok(Config::default());
    };

    debug!("Loading configuration from {}", path.display());
    let text = fs::read_to_string(&path)
        .map_err(|e| TagverError::config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&text)
        .map_err(|e| TagverError::config(format!("{}: {}", path.display(), e)))
}
