use super::height::HeightWalker;
use crate::domain::{Commit, SemVer, TaggedVersion, VersionCalculationOptions, VersionPart};
use crate::error::{Result, TagverError};
use crate::filter::TagFilter;
use crate::git::RepoInspector;
use std::cmp::Ordering;
use tracing::{debug, info};

/// Outcome of resolving the version of one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionResolution {
    pub version: SemVer,
    /// Tag the version was derived from, if any
    pub last_tag: Option<TaggedVersion>,
    /// Commits since `last_tag`; `None` when the version was overridden
    pub height: Option<u32>,
    pub commit: Option<Commit>,
}

/// Turn `version` into a prerelease `height` commits past it
///
/// The height is appended to the prerelease (or the default phase) and the
/// build metadata is replaced by the configured one.
pub fn bump(version: &SemVer, options: &VersionCalculationOptions, height: u32) -> Result<SemVer> {
    if height < 1 {
        return Err(TagverError::invalid_argument(format!(
            "height must be at least 1, got {}",
            height
        )));
    }

    if options.auto_increment == VersionPart::None {
        return Ok(version.clone());
    }

    let phase = version
        .prerelease()
        .unwrap_or(options.default_prerelease_phase.as_str());
    let number = u64::from(options.prerelease_base_height) + u64::from(height) - 1;
    let prerelease = format!("{}.{}", phase, number);

    SemVer::with_parts(
        version.major(),
        version.minor(),
        version.patch(),
        Some(&prerelease),
        options.build_metadata.as_deref(),
    )
}

/// The release that follows `last_tag`
pub fn next_version(last_tag: &SemVer, options: &VersionCalculationOptions) -> Result<SemVer> {
    if options.minimum_version.cmp_precedence(&last_tag.core_version()) == Ordering::Greater {
        debug!(
            "Minimum version {} is above {}",
            options.minimum_version, last_tag
        );
        return Ok(options.minimum_version.clone());
    }

    if options.auto_increment == VersionPart::None {
        return Ok(last_tag.clone());
    }

    if last_tag.prerelease().is_some() {
        return last_tag.with_build_metadata(None);
    }

    let overflow = || TagverError::calculation(format!("cannot increment {}", last_tag));
    let (major, minor, patch) = (last_tag.major(), last_tag.minor(), last_tag.patch());
    let next = match options.auto_increment {
        VersionPart::Major => SemVer::new(major.checked_add(1).ok_or_else(overflow)?, 0, 0),
        VersionPart::Minor => SemVer::new(major, minor.checked_add(1).ok_or_else(overflow)?, 0),
        VersionPart::Patch | VersionPart::None => {
            SemVer::new(major, minor, patch.checked_add(1).ok_or_else(overflow)?)
        }
    };
    Ok(next)
}

/// The version of a commit `height` commits past `last_tag`
pub fn from_tag_information(
    last_tag: Option<&SemVer>,
    options: &VersionCalculationOptions,
    height: u32,
) -> Result<SemVer> {
    let Some(tag) = last_tag else {
        return bump(&options.minimum_version, options, height);
    };

    if height > 0 {
        return bump(&next_version(tag, options)?, options, height);
    }

    if options.minimum_version.cmp_precedence(&tag.core_version()) == Ordering::Greater {
        return Err(TagverError::calculation(format!(
            "tagged version {} is below the minimum version {}",
            tag, options.minimum_version
        )));
    }

    let metadata = match (tag.build_metadata(), options.build_metadata.as_deref()) {
        (Some(own), Some(extra)) => Some(format!("{}-{}", own, extra)),
        (Some(own), None) => Some(own.to_string()),
        (None, extra) => extra.map(str::to_string),
    };
    tag.with_build_metadata(metadata.as_deref())
}

/// The fixed resolution for a configured version override, if any
pub fn overridden(options: &VersionCalculationOptions, commit: Option<&Commit>) -> Option<VersionResolution> {
    let version = options.version_override.as_ref()?;
    info!("Using version override {}", version);
    Some(VersionResolution {
        version: version.clone(),
        last_tag: None,
        height: None,
        commit: commit.cloned(),
    })
}

/// Resolve the version of `commit`
///
/// A version override short-circuits everything and never touches the
/// repository.
pub async fn resolve_version(
    repo: &dyn RepoInspector,
    commit: Option<&Commit>,
    options: &VersionCalculationOptions,
    filter: Option<&dyn TagFilter>,
) -> Result<VersionResolution> {
    if let Some(resolution) = overridden(options, commit) {
        return Ok(resolution);
    }

    let found = HeightWalker::new(repo, options)
        .with_filter(filter)
        .walk(commit, options.query_remote_tags)
        .await?;

    let version = from_tag_information(
        found.tag.as_ref().map(|tag| &tag.version),
        options,
        found.height,
    )?;
    info!("Calculated version {}", version);

    Ok(VersionResolution {
        version,
        last_tag: found.tag,
        height: Some(found.height),
        commit: commit.cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemVer {
        SemVer::parse(s).unwrap()
    }

    #[test]
    fn test_bump_appends_height() {
        let opts = VersionCalculationOptions::default();
        assert_eq!(bump(&v("1.0.1"), &opts, 1).unwrap(), v("1.0.1-alpha.1"));
        assert_eq!(bump(&v("1.0.0-rc.2"), &opts, 2).unwrap(), v("1.0.0-rc.2.2"));
    }

    #[test]
    fn test_bump_uses_base_height() {
        let opts = VersionCalculationOptions {
            prerelease_base_height: 0,
            ..Default::default()
        };
        assert_eq!(bump(&v("1.0.0"), &opts, 1).unwrap(), v("1.0.0-alpha.0"));
    }

    #[test]
    fn test_bump_rejects_zero_height() {
        let opts = VersionCalculationOptions::default();
        assert!(matches!(
            bump(&v("1.0.0"), &opts, 0),
            Err(TagverError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_bump_replaces_metadata() {
        let opts = VersionCalculationOptions {
            build_metadata: Some("ci.7".to_string()),
            ..Default::default()
        };
        assert_eq!(bump(&v("1.0.0+old"), &opts, 3).unwrap(), v("1.0.0-alpha.3+ci.7"));
    }

    #[test]
    fn test_bump_none_keeps_version() {
        let opts = VersionCalculationOptions {
            auto_increment: VersionPart::None,
            ..Default::default()
        };
        assert_eq!(bump(&v("1.0.0+x"), &opts, 4).unwrap(), v("1.0.0+x"));
    }

    #[test]
    fn test_next_version_parts() {
        let mut opts = VersionCalculationOptions::default();
        assert_eq!(next_version(&v("1.2.3"), &opts).unwrap(), v("1.2.4"));
        opts.auto_increment = VersionPart::Minor;
        assert_eq!(next_version(&v("1.2.3"), &opts).unwrap(), v("1.3.0"));
        opts.auto_increment = VersionPart::Major;
        assert_eq!(next_version(&v("1.2.3"), &opts).unwrap(), v("2.0.0"));
        opts.auto_increment = VersionPart::None;
        assert_eq!(next_version(&v("1.2.3+m"), &opts).unwrap(), v("1.2.3+m"));
    }

    #[test]
    fn test_next_version_prerelease_stays() {
        let opts = VersionCalculationOptions::default();
        assert_eq!(next_version(&v("1.0.0-rc.1+m"), &opts).unwrap(), v("1.0.0-rc.1"));
    }

    #[test]
    fn test_next_version_minimum_floor() {
        let opts = VersionCalculationOptions {
            minimum_version: v("2.0.0"),
            ..Default::default()
        };
        assert_eq!(next_version(&v("1.0.0"), &opts).unwrap(), v("2.0.0"));
    }

    #[test]
    fn test_direct_tag_metadata_concatenation() {
        let opts = VersionCalculationOptions {
            build_metadata: Some("git.abc".to_string()),
            ..Default::default()
        };
        assert_eq!(
            from_tag_information(Some(&v("1.2.3+4")), &opts, 0).unwrap(),
            v("1.2.3+4-git.abc")
        );
        assert_eq!(
            from_tag_information(Some(&v("1.2.3")), &opts, 0).unwrap(),
            v("1.2.3+git.abc")
        );
        assert_eq!(
            from_tag_information(Some(&v("1.2.3+4")), &opts, 1).unwrap(),
            v("1.2.4-alpha.1+git.abc")
        );
    }

    #[test]
    fn test_direct_tag_below_minimum_fails() {
        let opts = VersionCalculationOptions {
            minimum_version: v("2.0.0"),
            ..Default::default()
        };
        let err = from_tag_information(Some(&v("1.0.0")), &opts, 0).unwrap_err();
        assert!(matches!(err, TagverError::VersionCalculation(_)));
    }

    #[test]
    fn test_no_tag_bumps_minimum() {
        let opts = VersionCalculationOptions::default();
        assert_eq!(from_tag_information(None, &opts, 1).unwrap(), v("0.1.0-alpha.1"));
    }
}
