use crate::domain::{Commit, QueryTarget, Tag, TagSet};
use crate::error::{Result, TagverError};
use crate::git::RepoInspector;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory repository for testing without git
///
/// Fetching a remote tag copies it into the local tag set, the way a real
/// fetch would.
#[derive(Debug, Default)]
pub struct MockRepoInspector {
    parents: HashMap<Commit, Vec<Commit>>,
    head: Option<Commit>,
    local_tags: Mutex<TagSet>,
    remote_tags: TagSet,
    fetched: Mutex<Vec<Tag>>,
}

impl MockRepoInspector {
    pub fn new() -> Self {
        MockRepoInspector::default()
    }

    /// Add a commit with its parents, primary parent first
    pub fn add_commit(&mut self, id: &str, parents: &[&str]) {
        self.parents.insert(
            Commit::new(id),
            parents.iter().map(|p| Commit::new(*p)).collect(),
        );
    }

    pub fn set_head(&mut self, id: &str) {
        self.head = Some(Commit::new(id));
    }

    pub fn add_tag(&mut self, name: &str, id: &str) {
        if let Ok(mut tags) = self.local_tags.lock() {
            tags.insert(Tag::new(name, Commit::new(id)));
        }
    }

    pub fn add_remote_tag(&mut self, name: &str, id: &str) {
        self.remote_tags.insert(Tag::new(name, Commit::new(id)));
    }

    /// Tags passed to `fetch_tag`, in call order
    pub fn fetched_tags(&self) -> Vec<Tag> {
        self.fetched
            .lock()
            .map(|fetched| fetched.clone())
            .unwrap_or_default()
    }

    /// A linear history `ids[0] <- ids[1] <- ...` with HEAD at the last id
    pub fn linear(ids: &[&str]) -> Self {
        let mut repo = MockRepoInspector::new();
        let mut previous: Option<&str> = None;
        for &id in ids {
            match previous {
                Some(parent) => repo.add_commit(id, &[parent]),
                None => repo.add_commit(id, &[]),
            }
            previous = Some(id);
        }
        if let Some(last) = ids.last() {
            repo.set_head(last);
        }
        repo
    }
}

#[async_trait]
impl RepoInspector for MockRepoInspector {
    async fn head(&self) -> Result<Option<Commit>> {
        Ok(self.head.clone())
    }

    async fn parse_revision(&self, revision: &str) -> Result<Option<Commit>> {
        if revision.is_empty() || revision == "HEAD" {
            return Ok(self.head.clone());
        }
        let commit = Commit::new(revision);
        if self.parents.contains_key(&commit) {
            Ok(Some(commit))
        } else {
            Err(TagverError::AmbiguousRevision(revision.to_string()))
        }
    }

    async fn parents(&self, commit: &Commit) -> Result<Vec<Commit>> {
        self.parents
            .get(commit)
            .cloned()
            .ok_or_else(|| TagverError::too_shallow(format!("commit {} is not available locally", commit)))
    }

    async fn tags(&self, target: QueryTarget) -> Result<TagSet> {
        let mut tags = TagSet::new();
        if target.local {
            if let Ok(local) = self.local_tags.lock() {
                tags.extend(local.iter().cloned());
            }
        }
        if target.remote {
            tags.extend(self.remote_tags.iter().cloned());
        }
        Ok(tags)
    }

    async fn fetch_tag(&self, tag: &Tag) -> Result<()> {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(tag.clone());
        }
        if let Ok(mut local) = self.local_tags.lock() {
            local.insert(tag.clone());
        }
        Ok(())
    }
}
