//! Output rendering and terminal messages

use crate::analyzer::VersionResolution;
use crate::domain::SemVer;
use crate::error::{Result, TagverError};
use clap::ValueEnum;
use console::style;
use serde::Serialize;

/// Which part of the resolved version to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Show {
    #[default]
    All,
    Major,
    Minor,
    Patch,
    Prerelease,
    Metadata,
    Height,
    Json,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionJson<'a> {
    commit: Option<&'a str>,
    full: String,
    major: u64,
    minor: u64,
    patch: u64,
    prerelease: Option<&'a str>,
    meta: Option<&'a str>,
    height: Option<u32>,
    last_tag: Option<TagJson<'a>>,
}

#[derive(Serialize)]
struct TagJson<'a> {
    tag: &'a str,
    commit: &'a str,
    full: String,
    major: u64,
    minor: u64,
    patch: u64,
    prerelease: Option<&'a str>,
    meta: Option<&'a str>,
}

impl<'a> TagJson<'a> {
    fn new(tag: &'a str, commit: &'a str, version: &'a SemVer) -> Self {
        TagJson {
            tag,
            commit,
            full: version.to_string(),
            major: version.major(),
            minor: version.minor(),
            patch: version.patch(),
            prerelease: version.prerelease(),
            meta: version.build_metadata(),
        }
    }
}

/// Render the single line printed on stdout
pub fn render(resolution: &VersionResolution, show: Show) -> Result<String> {
    let version = &resolution.version;
    let text = match show {
        Show::All => version.to_string(),
        Show::Major => version.major().to_string(),
        Show::Minor => version.minor().to_string(),
        Show::Patch => version.patch().to_string(),
        Show::Prerelease => version.prerelease().unwrap_or_default().to_string(),
        Show::Metadata => version.build_metadata().unwrap_or_default().to_string(),
        Show::Height => resolution
            .height
            .map(|h| h.to_string())
            .unwrap_or_default(),
        Show::Json => {
            let json = VersionJson {
                commit: resolution.commit.as_ref().map(|c| c.id()),
                full: version.to_string(),
                major: version.major(),
                minor: version.minor(),
                patch: version.patch(),
                prerelease: version.prerelease(),
                meta: version.build_metadata(),
                height: resolution.height,
                last_tag: resolution.last_tag.as_ref().map(|last| {
                    TagJson::new(&last.tag.name, last.tag.points_to.id(), &last.version)
                }),
            };
            serde_json::to_string(&json)
                .map_err(|e| TagverError::invalid_argument(format!("cannot render JSON: {}", e)))?
        }
    };
    Ok(text)
}

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a suggestion for fixing an error.
pub fn display_hint(message: &str) {
    eprintln!("{} {}", style("hint:").yellow(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Commit, Tag, TaggedVersion};

    fn resolution() -> VersionResolution {
        let tag = Tag::new("v1.2.3", Commit::new("aaa"));
        VersionResolution {
            version: SemVer::parse("1.2.4-alpha.2+ci").unwrap(),
            last_tag: Some(TaggedVersion::new(SemVer::new(1, 2, 3), tag)),
            height: Some(2),
            commit: Some(Commit::new("bbb")),
        }
    }

    #[test]
    fn test_render_parts() {
        let r = resolution();
        assert_eq!(render(&r, Show::All).unwrap(), "1.2.4-alpha.2+ci");
        assert_eq!(render(&r, Show::Major).unwrap(), "1");
        assert_eq!(render(&r, Show::Minor).unwrap(), "2");
        assert_eq!(render(&r, Show::Patch).unwrap(), "4");
        assert_eq!(render(&r, Show::Prerelease).unwrap(), "alpha.2");
        assert_eq!(render(&r, Show::Metadata).unwrap(), "ci");
        assert_eq!(render(&r, Show::Height).unwrap(), "2");
    }

    #[test]
    fn test_render_json() {
        let text = render(&resolution(), Show::Json).unwrap();
        assert!(!text.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["commit"], "bbb");
        assert_eq!(value["full"], "1.2.4-alpha.2+ci");
        assert_eq!(value["height"], 2);
        assert_eq!(value["lastTag"]["tag"], "v1.2.3");
        assert_eq!(value["lastTag"]["commit"], "aaa");
        assert_eq!(value["lastTag"]["prerelease"], serde_json::Value::Null);
    }

    #[test]
    fn test_render_override_has_no_height() {
        let r = VersionResolution {
            version: SemVer::new(9, 0, 0),
            last_tag: None,
            height: None,
            commit: None,
        };
        assert_eq!(render(&r, Show::Height).unwrap(), "");
        let value: serde_json::Value =
            serde_json::from_str(&render(&r, Show::Json).unwrap()).unwrap();
        assert!(value["lastTag"].is_null());
    }
}
