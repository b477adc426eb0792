use super::compare::VersionOrdering;
use super::version::SemVer;
use crate::error::TagverError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which version part is bumped after a release tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPart {
    None,
    #[default]
    Patch,
    Minor,
    Major,
}

impl FromStr for VersionPart {
    type Err = TagverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(VersionPart::None),
            "patch" => Ok(VersionPart::Patch),
            "minor" => Ok(VersionPart::Minor),
            "major" => Ok(VersionPart::Major),
            other => Err(TagverError::invalid_argument(format!(
                "invalid version part '{}', expected none, patch, minor or major",
                other
            ))),
        }
    }
}

impl fmt::Display for VersionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VersionPart::None => "none",
            VersionPart::Patch => "patch",
            VersionPart::Minor => "minor",
            VersionPart::Major => "major",
        };
        f.write_str(name)
    }
}

/// Inputs to a version calculation. Built once per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionCalculationOptions {
    /// All version tags start with this
    pub tag_prefix: String,
    /// Prerelease label used when bumping a release
    pub default_prerelease_phase: String,
    /// The lowest core version that may be produced
    pub minimum_version: SemVer,
    /// Height suffix for the first commit after a tag
    pub prerelease_base_height: u32,
    /// Skips all repository access when set
    pub version_override: Option<SemVer>,
    pub build_metadata: Option<String>,
    /// Also consider tags only present on the remote, fetching the winner
    pub query_remote_tags: bool,
    pub auto_increment: VersionPart,
    pub remote: String,
    pub version_ordering: VersionOrdering,
}

impl Default for VersionCalculationOptions {
    fn default() -> Self {
        VersionCalculationOptions {
            tag_prefix: "v".to_string(),
            default_prerelease_phase: "alpha".to_string(),
            minimum_version: SemVer::new(0, 1, 0),
            prerelease_base_height: 1,
            version_override: None,
            build_metadata: None,
            query_remote_tags: false,
            auto_increment: VersionPart::Patch,
            remote: "origin".to_string(),
            version_ordering: VersionOrdering::Strict,
        }
    }
}
