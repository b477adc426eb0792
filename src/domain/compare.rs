//! Interchangeable version ordering strategies

use super::version::{compare_postrelease, SemVer};
use crate::error::TagverError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Orders two versions
pub trait VersionComparer: Send + Sync + fmt::Debug {
    fn compare(&self, left: &SemVer, right: &SemVer) -> Ordering;
}

/// Strict SemVer 2.0 precedence; build metadata never participates
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictComparer;

impl VersionComparer for StrictComparer {
    fn compare(&self, left: &SemVer, right: &SemVer) -> Ordering {
        left.cmp_precedence(right)
    }
}

/// SemVer 2.0, except build metadata is treated as a postrelease.
///
/// `1.0.0 < 1.0.0+deb.1 < 1.0.0+1 < 1.0.1-alpha.1`
#[derive(Debug, Clone, Copy, Default)]
pub struct PostreleaseComparer;

impl VersionComparer for PostreleaseComparer {
    fn compare(&self, left: &SemVer, right: &SemVer) -> Ordering {
        StrictComparer
            .compare(left, right)
            .then_with(|| match (left.build_metadata(), right.build_metadata()) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (Some(l), Some(r)) => compare_postrelease(l, r),
            })
    }
}

/// Configuration-level selection of a [`VersionComparer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionOrdering {
    #[default]
    Strict,
    Postrelease,
}

impl VersionOrdering {
    pub fn comparer(self) -> &'static dyn VersionComparer {
        match self {
            VersionOrdering::Strict => &StrictComparer,
            VersionOrdering::Postrelease => &PostreleaseComparer,
        }
    }
}

impl FromStr for VersionOrdering {
    type Err = TagverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(VersionOrdering::Strict),
            "postrelease" => Ok(VersionOrdering::Postrelease),
            other => Err(TagverError::invalid_argument(format!(
                "unknown version ordering '{}', expected strict or postrelease",
                other
            ))),
        }
    }
}
