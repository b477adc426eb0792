use crate::domain::TaggedVersion;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Prefix of every variable handed to a filter command
pub const ENV_PREFIX: &str = "TAGVER_";

/// Information passed to a filter command through its environment
#[derive(Debug, Clone)]
pub struct FilterContext {
    /// Repository the tag belongs to
    pub repo_path: PathBuf,
    pub candidate: TaggedVersion,
}

impl FilterContext {
    pub fn new(repo_path: impl Into<PathBuf>, candidate: TaggedVersion) -> Self {
        FilterContext {
            repo_path: repo_path.into(),
            candidate,
        }
    }

    /// Convert context to environment variables for the filter command
    ///
    /// Missing prerelease and build metadata are passed as empty strings.
    pub fn to_env_vars(&self) -> BTreeMap<String, String> {
        let version = &self.candidate.version;
        let vars = [
            ("PATH", self.repo_path.display().to_string()),
            ("COMMIT", self.candidate.tag.points_to.to_string()),
            ("TAG", self.candidate.tag.name.clone()),
            ("VERSION", version.to_string()),
            ("VERSION_MAJOR", version.major().to_string()),
            ("VERSION_MINOR", version.minor().to_string()),
            ("VERSION_PATCH", version.patch().to_string()),
            (
                "VERSION_PRERELEASE",
                version.prerelease().unwrap_or_default().to_string(),
            ),
            (
                "VERSION_BUILDMETA",
                version.build_metadata().unwrap_or_default().to_string(),
            ),
        ];

        vars.into_iter()
            .map(|(name, value)| (format!("{}{}", ENV_PREFIX, name), value))
            .collect()
    }
}
