//! Semantic version representation
//!
//! Implements the SemVer 2.0 grammar and precedence, plus the "postrelease"
//! extension where build metadata becomes a lower-priority ordering axis.
//! See https://semver.org/#spec-item-11

use crate::error::{Result, TagverError};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// An immutable semantic version.
///
/// Value equality (`==`) includes build metadata, while precedence
/// ([`SemVer::cmp_precedence`]) ignores it. For that reason `SemVer` does not
/// implement `Ord`; ordering goes through a [`VersionComparer`](super::VersionComparer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SemVer {
    major: u64,
    minor: u64,
    patch: u64,
    prerelease: Option<String>,
    build_metadata: Option<String>,
}

const PRERELEASE_IDENTIFIER: &str = r"(?:0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*)";
const BUILD_IDENTIFIER: &str = r"[0-9a-zA-Z-]+";

fn version_regex() -> &'static Regex {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    VERSION_RE.get_or_init(|| {
        let pattern = format!(
            r"^(?P<major>0|[1-9][0-9]*)\.(?P<minor>0|[1-9][0-9]*)\.(?P<patch>0|[1-9][0-9]*)(?:-(?P<prerelease>{pre}(?:\.{pre})*))?(?:\+(?P<build>{build}(?:\.{build})*))?$",
            pre = PRERELEASE_IDENTIFIER,
            build = BUILD_IDENTIFIER,
        );
        Regex::new(&pattern).expect("version pattern is a valid regex")
    })
}

fn prerelease_regex() -> &'static Regex {
    static PRERELEASE_RE: OnceLock<Regex> = OnceLock::new();
    PRERELEASE_RE.get_or_init(|| {
        Regex::new(&format!(r"^{0}(?:\.{0})*$", PRERELEASE_IDENTIFIER))
            .expect("prerelease pattern is a valid regex")
    })
}

fn build_regex() -> &'static Regex {
    static BUILD_RE: OnceLock<Regex> = OnceLock::new();
    BUILD_RE.get_or_init(|| {
        Regex::new(&format!(r"^{0}(?:\.{0})*$", BUILD_IDENTIFIER)).expect("build pattern is a valid regex")
    })
}

/// Whether `s` is a well-formed prerelease: dot-separated, non-empty
/// identifiers with no leading zeros on numeric ones
pub fn is_valid_prerelease(s: &str) -> bool {
    prerelease_regex().is_match(s)
}

/// Whether `s` is well-formed build metadata: dot-separated, non-empty identifiers
pub fn is_valid_build_metadata(s: &str) -> bool {
    build_regex().is_match(s)
}

fn validate_prerelease(value: Option<&str>) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) if is_valid_prerelease(v) => Ok(Some(v.to_string())),
        Some(v) => Err(TagverError::invalid_argument(format!(
            "prerelease '{}' must be dot-separated [0-9A-Za-z-] identifiers without empty parts or leading zeros",
            v
        ))),
    }
}

fn validate_build_metadata(value: Option<&str>) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) if is_valid_build_metadata(v) => Ok(Some(v.to_string())),
        Some(v) => Err(TagverError::invalid_argument(format!(
            "build metadata '{}' must be dot-separated [0-9A-Za-z-] identifiers without empty parts",
            v
        ))),
    }
}

impl SemVer {
    /// Create a release version with no prerelease or build metadata
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemVer {
            major,
            minor,
            patch,
            prerelease: None,
            build_metadata: None,
        }
    }

    /// Create a version from all of its parts, validating the identifier strings
    pub fn with_parts(
        major: u64,
        minor: u64,
        patch: u64,
        prerelease: Option<&str>,
        build_metadata: Option<&str>,
    ) -> Result<Self> {
        Ok(SemVer {
            major,
            minor,
            patch,
            prerelease: validate_prerelease(prerelease)?,
            build_metadata: validate_build_metadata(build_metadata)?,
        })
    }

    /// Return a copy with the prerelease replaced
    pub fn with_prerelease(&self, prerelease: Option<&str>) -> Result<Self> {
        Ok(SemVer {
            prerelease: validate_prerelease(prerelease)?,
            ..self.clone()
        })
    }

    /// Return a copy with the build metadata replaced
    pub fn with_build_metadata(&self, build_metadata: Option<&str>) -> Result<Self> {
        Ok(SemVer {
            build_metadata: validate_build_metadata(build_metadata)?,
            ..self.clone()
        })
    }

    /// Parse `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]`
    pub fn parse(input: &str) -> Result<Self> {
        let caps = version_regex()
            .captures(input)
            .ok_or_else(|| TagverError::format(input, "expected MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]"))?;

        let number = |name: &str| -> Result<u64> {
            caps[name]
                .parse::<u64>()
                .map_err(|_| TagverError::format(input, format!("{} component is out of range", name)))
        };

        Ok(SemVer {
            major: number("major")?,
            minor: number("minor")?,
            patch: number("patch")?,
            prerelease: caps.name("prerelease").map(|m| m.as_str().to_string()),
            build_metadata: caps.name("build").map(|m| m.as_str().to_string()),
        })
    }

    /// Parse, discarding the reason on failure
    pub fn try_parse(input: &str) -> Option<Self> {
        Self::parse(input).ok()
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }

    pub fn build_metadata(&self) -> Option<&str> {
        self.build_metadata.as_deref()
    }

    /// The `MAJOR.MINOR.PATCH` triple this version is destined for
    pub fn core_version(&self) -> SemVer {
        SemVer::new(self.major, self.minor, self.patch)
    }

    /// Strict SemVer 2.0 precedence; build metadata is ignored
    pub fn cmp_precedence(&self, other: &SemVer) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(left), Some(right)) => compare_prerelease(left, right),
            })
    }
}

/// Compare two prerelease strings.
///
/// Characters are compared by code point, except that a run of digits present
/// at the same position in both strings is compared as a number. Splitting on
/// `.` is unnecessary: the separator sorts the same either way. Runs of equal
/// value but different length fall back to comparing the rest of both strings
/// character by character.
pub fn compare_prerelease(left: &str, right: &str) -> Ordering {
    compare_identifiers(left, right, |l, r| l.cmp(&r))
}

/// Compare two postrelease (build metadata) strings.
///
/// Like [`compare_prerelease`], except that at the first differing character
/// an alphabetic character precedes a digit.
pub fn compare_postrelease(left: &str, right: &str) -> Ordering {
    compare_identifiers(left, right, |l, r| {
        match (l.is_ascii_digit(), r.is_ascii_digit()) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            _ => l.cmp(&r),
        }
    })
}

fn compare_identifiers(left: &str, right: &str, cmp_char: impl Fn(char, char) -> Ordering) -> Ordering {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    let (mut i, mut j) = (0, 0);

    while i < left.len() && j < right.len() {
        if left[i].is_ascii_digit() && right[j].is_ascii_digit() {
            let left_end = digit_run_end(&left, i);
            let right_end = digit_run_end(&right, j);

            match compare_numeric(&left[i..left_end], &right[j..right_end]) {
                // Same value spelled with different leading zeros, e.g. `0a` and `00a`
                Ordering::Equal if left_end - i != right_end - j => {
                    return compare_lexical(&left[i..], &right[j..], &cmp_char);
                }
                Ordering::Equal => {
                    i = left_end;
                    j = right_end;
                    continue;
                }
                ord => return ord,
            }
        }

        match cmp_char(left[i], right[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            ord => return ord,
        }
    }

    (left.len() - i).cmp(&(right.len() - j))
}

fn compare_lexical(left: &[char], right: &[char], cmp_char: impl Fn(char, char) -> Ordering) -> Ordering {
    left.iter()
        .zip(right)
        .map(|(l, r)| cmp_char(*l, *r))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or_else(|| left.len().cmp(&right.len()))
}

fn digit_run_end(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(chars.len(), |offset| start + offset)
}

// Arbitrary-length decimal comparison, so long runs never overflow
fn compare_numeric(left: &[char], right: &[char]) -> Ordering {
    let strip = |digits: &[char]| -> Vec<char> {
        let first = digits.iter().position(|c| *c != '0').unwrap_or(digits.len());
        digits[first..].to_vec()
    };
    let (left, right) = (strip(left), strip(right));
    left.len().cmp(&right.len()).then_with(|| left.cmp(&right))
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(meta) = &self.build_metadata {
            write!(f, "+{}", meta)?;
        }
        Ok(())
    }
}

impl FromStr for SemVer {
    type Err = TagverError;

    fn from_str(s: &str) -> Result<Self> {
        SemVer::parse(s)
    }
}

impl Serialize for SemVer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        SemVer::parse(&text).map_err(serde::de::Error::custom)
    }
}
