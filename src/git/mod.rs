//! Repository access
//!
//! The walker and the resolver only see the [`RepoInspector`] trait. The real
//! implementation, [`GitRepoInspector`], drives the `git` binary and hides
//! shallow-clone deepening behind [`RepoInspector::parents`]. [`MockRepoInspector`]
//! serves an in-memory commit graph for tests.

pub mod cat_file;
pub mod mock;
pub mod repository;
pub mod shadow;

pub use cat_file::CatFileReader;
pub use mock::MockRepoInspector;
pub use repository::{GitRepoInspector, InspectorSettings};
pub use shadow::ShadowRepo;

use crate::domain::{Commit, QueryTarget, Tag, TagSet};
use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

/// Read-only view of a repository's commit graph and tags
///
/// `fetch_tag` is the single mutating operation. It makes a tag known
/// locally and is safe to repeat.
#[async_trait]
pub trait RepoInspector: Send + Sync {
    /// The checked-out commit, or `None` for a repository without commits
    async fn head(&self) -> Result<Option<Commit>>;

    /// Resolve a revision expression to exactly one commit
    ///
    /// Fails with [`crate::error::TagverError::AmbiguousRevision`] when it
    /// resolves to zero or several commits. `HEAD` of an empty repository
    /// yields `None`.
    async fn parse_revision(&self, revision: &str) -> Result<Option<Commit>>;

    /// Parents of `commit`, primary parent first
    async fn parents(&self, commit: &Commit) -> Result<Vec<Commit>>;

    /// Primary parent of `commit`
    async fn parent(&self, commit: &Commit) -> Result<Option<Commit>> {
        Ok(self.parents(commit).await?.into_iter().next())
    }

    async fn tags(&self, target: QueryTarget) -> Result<TagSet>;

    async fn fetch_tag(&self, tag: &Tag) -> Result<()>;
}

fn tag_ref_regex() -> &'static Regex {
    static TAG_REF: OnceLock<Regex> = OnceLock::new();
    TAG_REF.get_or_init(|| {
        Regex::new(r"(?m)^(?P<pointer>[a-zA-Z0-9]+)\s*refs/tags/(?P<tag>.+?)(\^\{\})?\r?$")
            .expect("tag ref pattern is valid")
    })
}

/// Parse `show-ref`/`ls-remote` output into tags
///
/// Dereferenced lines (`refs/tags/v1^{}`) yield the same tag name pointing
/// at the peeled commit.
pub fn parse_tag_refs(output: &str) -> TagSet {
    tag_ref_regex()
        .captures_iter(output)
        .map(|caps| Tag::new(&caps["tag"], Commit::new(&caps["pointer"])))
        .collect()
}

/// Parent ids from a raw commit object
///
/// Only the header is consulted; it ends at the first blank line.
pub fn parse_parents(body: &[u8]) -> Vec<Commit> {
    String::from_utf8_lossy(body)
        .lines()
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.strip_prefix("parent "))
        .map(|id| Commit::new(id.trim()))
        .collect()
}
