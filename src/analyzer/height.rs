use crate::domain::{Commit, QueryTarget, SemVer, TagSet, TaggedVersion, VersionCalculationOptions, VersionComparer};
use crate::error::{Result, TagverError};
use crate::filter::TagFilter;
use crate::git::RepoInspector;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info, trace};

/// Distance from the start commit to the chosen version tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightResult {
    pub height: u32,
    /// `None` when no acceptable tag is reachable; height then counts past the root
    pub tag: Option<TaggedVersion>,
}

#[derive(Debug, Clone)]
struct Candidate {
    height: u32,
    tag: Option<TaggedVersion>,
}

/// A pending commit on the walk stack
struct Frame {
    commit: Commit,
    height: u32,
    /// Path from the start commit to the last branch point, e.g. `abc1234~3^2`
    descriptor: String,
    height_since_branch: u32,
}

impl Frame {
    fn location(&self) -> String {
        format!("{}~{}", self.descriptor, self.height_since_branch)
    }
}

/// Finds the nearest acceptable version tag reachable from a commit
///
/// The walk is depth first along primary parents. Other merge parents are
/// explored afterwards, each commit at most once. Every path ends at the first
/// commit carrying an acceptable tag or at a root commit.
pub struct HeightWalker<'a> {
    repo: &'a dyn RepoInspector,
    options: &'a VersionCalculationOptions,
    filter: Option<&'a dyn TagFilter>,
}

impl<'a> HeightWalker<'a> {
    pub fn new(repo: &'a dyn RepoInspector, options: &'a VersionCalculationOptions) -> Self {
        HeightWalker {
            repo,
            options,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<&'a dyn TagFilter>) -> Self {
        self.filter = filter;
        self
    }

    fn comparer(&self) -> &'static dyn VersionComparer {
        self.options.version_ordering.comparer()
    }

    /// Walk from `start`; with `fetch_tags`, remote tags are considered and
    /// winning candidates missing locally are fetched
    pub async fn walk(&self, start: Option<&Commit>, fetch_tags: bool) -> Result<HeightResult> {
        let Some(start) = start else {
            debug!("No commit to walk from");
            return Ok(HeightResult { height: 1, tag: None });
        };

        let target = if fetch_tags { QueryTarget::ALL } else { QueryTarget::LOCAL };
        let tags = self.repo.tags(target).await?;
        debug!("Walking from {} with {} {} tags", start, tags.len(), target);

        let candidates = self.collect_candidates(start, &tags).await?;

        if fetch_tags {
            self.fetch_missing_tags(&candidates).await?;
        }

        let best = candidates
            .into_iter()
            .reduce(|best, candidate| {
                if self.is_better(&candidate, &best) {
                    candidate
                } else {
                    best
                }
            })
            .ok_or_else(|| TagverError::calculation(format!("no candidates reachable from {}", start)))?;

        match &best.tag {
            Some(tag) => info!("Using tag {} at height {}", tag.tag.name, best.height),
            None => info!("No version tag found, height {}", best.height),
        }

        Ok(HeightResult {
            height: best.height,
            tag: best.tag,
        })
    }

    async fn collect_candidates(&self, start: &Commit, tags: &TagSet) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![Frame {
            commit: start.clone(),
            height: 0,
            descriptor: short_id(start),
            height_since_branch: 0,
        }];

        while let Some(frame) = stack.pop() {
            if !visited.insert(frame.commit.clone()) {
                trace!("{} already visited", frame.location());
                continue;
            }

            if let Some(found) = self.best_tag_at(&frame.commit, tags).await? {
                debug!(
                    "Candidate {} at {} (height {})",
                    found.tag.name,
                    frame.location(),
                    frame.height
                );
                candidates.push(Candidate {
                    height: frame.height,
                    tag: Some(found),
                });
                continue;
            }

            let parents = self.repo.parents(&frame.commit).await?;
            if parents.is_empty() {
                debug!("Reached root {} (height {})", frame.location(), frame.height);
                candidates.push(Candidate {
                    height: frame.height + 1,
                    tag: None,
                });
                continue;
            }

            // Primary parent is pushed last so it is walked first
            for (index, parent) in parents.into_iter().enumerate().rev() {
                let next = if index == 0 {
                    Frame {
                        commit: parent,
                        height: frame.height + 1,
                        descriptor: frame.descriptor.clone(),
                        height_since_branch: frame.height_since_branch + 1,
                    }
                } else {
                    Frame {
                        commit: parent,
                        height: frame.height + 1,
                        descriptor: format!("{}^{}", frame.location(), index + 1),
                        height_since_branch: 0,
                    }
                };
                stack.push(next);
            }
        }

        Ok(candidates)
    }

    /// Highest version tag at `commit` that passes the filter
    async fn best_tag_at(&self, commit: &Commit, tags: &TagSet) -> Result<Option<TaggedVersion>> {
        let prefix = &self.options.tag_prefix;

        let mut versions: Vec<TaggedVersion> = tags
            .find_commit_tags(commit)
            .into_iter()
            .filter_map(|tag| {
                let text = tag.name.strip_prefix(prefix.as_str())?;
                match SemVer::parse(text) {
                    Ok(version) => Some(TaggedVersion::new(version, tag.clone())),
                    Err(e) => {
                        info!("Ignoring tag {}: {}", tag.name, e);
                        None
                    }
                }
            })
            .collect();

        let comparer = self.comparer();
        versions.sort_by(|a, b| {
            comparer
                .compare(&b.version, &a.version)
                .then_with(|| a.tag.name.cmp(&b.tag.name))
        });

        for candidate in versions {
            let accepted = match self.filter {
                Some(filter) => filter.passes(&candidate).await?,
                None => true,
            };
            if accepted {
                return Ok(Some(candidate));
            }
            debug!("Tag {} rejected by filter", candidate.tag.name);
        }

        Ok(None)
    }

    /// Tagged beats untagged, then higher version, then smaller height.
    /// Untagged candidates never replace an earlier one.
    fn is_better(&self, candidate: &Candidate, best: &Candidate) -> bool {
        match (&candidate.tag, &best.tag) {
            (Some(challenger), Some(current)) => {
                match self.comparer().compare(&challenger.version, &current.version) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => candidate.height < best.height,
                }
            }
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    async fn fetch_missing_tags(&self, candidates: &[Candidate]) -> Result<()> {
        let local = self.repo.tags(QueryTarget::LOCAL).await?;
        let mut seen = HashSet::new();

        for tag in candidates.iter().filter_map(|c| c.tag.as_ref()).map(|t| &t.tag) {
            if local.contains(tag) || !seen.insert(tag.clone()) {
                continue;
            }
            info!("Fetching tag {}", tag.name);
            self.repo.fetch_tag(tag).await?;
        }
        Ok(())
    }
}

fn short_id(commit: &Commit) -> String {
    commit.id().chars().take(7).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepoInspector;

    fn options() -> VersionCalculationOptions {
        VersionCalculationOptions::default()
    }

    #[tokio::test]
    async fn test_no_commit() {
        let repo = MockRepoInspector::new();
        let opts = options();
        let result = HeightWalker::new(&repo, &opts).walk(None, false).await.unwrap();
        assert_eq!(result, HeightResult { height: 1, tag: None });
    }

    #[tokio::test]
    async fn test_tag_on_start_commit() {
        let mut repo = MockRepoInspector::linear(&["a", "b"]);
        repo.add_tag("v1.0.0", "b");
        let opts = options();

        let result = HeightWalker::new(&repo, &opts)
            .walk(Some(&Commit::new("b")), false)
            .await
            .unwrap();
        assert_eq!(result.height, 0);
        assert_eq!(result.tag.unwrap().version, SemVer::new(1, 0, 0));
    }

    #[tokio::test]
    async fn test_untagged_history_counts_past_root() {
        let repo = MockRepoInspector::linear(&["a", "b", "c"]);
        let opts = options();

        let result = HeightWalker::new(&repo, &opts)
            .walk(Some(&Commit::new("c")), false)
            .await
            .unwrap();
        assert_eq!(result, HeightResult { height: 3, tag: None });
    }

    #[tokio::test]
    async fn test_highest_tag_at_commit_wins() {
        let mut repo = MockRepoInspector::linear(&["a"]);
        repo.add_tag("v1.0.0", "a");
        repo.add_tag("v1.10.0", "a");
        repo.add_tag("v1.9.0", "a");
        let opts = options();

        let result = HeightWalker::new(&repo, &opts)
            .walk(Some(&Commit::new("a")), false)
            .await
            .unwrap();
        assert_eq!(result.tag.unwrap().tag.name, "v1.10.0");
    }

    #[test]
    fn test_untagged_candidate_never_replaces_earlier() {
        let repo = MockRepoInspector::new();
        let opts = options();
        let walker = HeightWalker::new(&repo, &opts);

        let first = Candidate { height: 5, tag: None };
        let second = Candidate { height: 2, tag: None };
        assert!(!walker.is_better(&second, &first));
    }
}
