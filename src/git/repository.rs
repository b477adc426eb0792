use super::cat_file::CatFileReader;
use super::shadow::ShadowRepo;
use super::{parse_parents, parse_tag_refs, RepoInspector};
use crate::domain::{Commit, QueryTarget, Tag, TagSet};
use crate::error::{Result, TagverError};
use crate::process::CommandRunner;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info, trace};

/// Upper bound on deepen rounds while waiting for one commit to appear
const MAX_DEEPEN_ATTEMPTS: usize = 1000;
const MIN_DEEPEN_DEPTH: u32 = 32;
const UNADVERTISED_OBJECT: &str = "Server does not allow request for unadvertised object";

/// What a [`GitRepoInspector`] may do to the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InspectorSettings {
    /// Fetch more history when a commit is missing
    pub can_deepen: bool,
    /// Read missing history from a tree-filtered mirror instead of deepening
    pub enable_shadow_repo: bool,
    /// Create tags locally instead of fetching them
    pub enable_lightweight_tags: bool,
}

/// [`RepoInspector`] backed by the `git` binary
///
/// Parents are cached per instance. Missing commits are either fetched by
/// deepening the clone or, in shadow mode, read from a [`ShadowRepo`].
pub struct GitRepoInspector {
    root: PathBuf,
    remote: String,
    runner: Arc<dyn CommandRunner>,
    settings: InspectorSettings,
    reader: CatFileReader,
    parents_cache: Mutex<HashMap<Commit, Vec<Commit>>>,
    deepen_from_commit: AtomicBool,
    shadow: OnceCell<ShadowRepo>,
}

impl GitRepoInspector {
    /// Open the repository containing `path`
    pub async fn from_path(
        path: impl AsRef<Path>,
        remote: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
        settings: InspectorSettings,
    ) -> Result<Self> {
        let path = path.as_ref();
        let root = runner
            .run(path, "git", &["rev-parse", "--show-toplevel"], &BTreeMap::new())
            .await
            .map_err(|e| {
                debug!("rev-parse --show-toplevel failed: {}", e);
                TagverError::NotARepository(path.display().to_string())
            })?
            .stdout;
        let root = PathBuf::from(root);

        debug!("Opened repository at {}", root.display());

        Ok(GitRepoInspector {
            reader: CatFileReader::new("primary", &root),
            root,
            remote: remote.into(),
            runner,
            settings,
            parents_cache: Mutex::new(HashMap::new()),
            deepen_from_commit: AtomicBool::new(true),
            shadow: OnceCell::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn settings(&self) -> InspectorSettings {
        self.settings
    }

    /// Stop the object reader subprocesses
    pub async fn close(&self) {
        self.reader.close().await;
        if let Some(shadow) = self.shadow.get() {
            shadow.close().await;
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        Ok(self
            .runner
            .run(&self.root, "git", args, &BTreeMap::new())
            .await?
            .stdout)
    }

    async fn shadow(&self) -> Result<&ShadowRepo> {
        self.shadow
            .get_or_try_init(|| ShadowRepo::open(&self.root, &self.remote, self.runner.clone()))
            .await
    }

    /// Read a commit from the primary store, then the shadow if enabled
    async fn read_commit(&self, commit: &Commit) -> Result<Option<Vec<u8>>> {
        if let Some(body) = self.reader.read_object_with_restart("commit", commit.id()).await? {
            return Ok(Some(body));
        }
        if self.settings.enable_shadow_repo {
            return self
                .shadow()
                .await?
                .read_commit(commit.id(), self.settings.can_deepen)
                .await;
        }
        Ok(None)
    }

    /// Parents of `commit` if its object is available, without deepening
    async fn known_parents(&self, commit: &Commit) -> Result<Option<Vec<Commit>>> {
        if let Some(parents) = self.cached_parents(commit) {
            return Ok(Some(parents));
        }

        let Some(body) = self.read_commit(commit).await? else {
            return Ok(None);
        };

        let parents = parse_parents(&body);
        trace!("parents of {}: {:?}", commit, parents);
        if let Ok(mut cache) = self.parents_cache.lock() {
            cache.insert(commit.clone(), parents.clone());
        }
        Ok(Some(parents))
    }

    fn cached_parents(&self, commit: &Commit) -> Option<Vec<Commit>> {
        self.parents_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(commit).cloned())
    }

    /// Parents of `commit`, deepening the clone until it is present
    async fn require_parents(&self, commit: &Commit) -> Result<Vec<Commit>> {
        if let Some(parents) = self.known_parents(commit).await? {
            return Ok(parents);
        }

        if self.settings.enable_shadow_repo || !self.settings.can_deepen {
            return Err(TagverError::too_shallow(format!(
                "commit {} is not available locally",
                commit
            )));
        }

        for _ in 0..MAX_DEEPEN_ATTEMPTS {
            self.deepen().await?;
            if let Some(parents) = self.known_parents(commit).await? {
                return Ok(parents);
            }
        }

        Err(TagverError::deepen_failed(format!(
            "commit {} still missing after {} attempts",
            commit, MAX_DEEPEN_ATTEMPTS
        )))
    }

    /// Commits reachable from HEAD whose objects are absent, with their depth
    ///
    /// HEAD has depth 1.
    pub async fn probe(&self) -> Result<Vec<(Commit, u32)>> {
        let mut shallow = Vec::new();
        let Some(head) = self.head().await? else {
            return Ok(shallow);
        };

        let mut visited = HashSet::new();
        let mut stack = vec![(head, 1u32)];

        while let Some((commit, depth)) = stack.pop() {
            if !visited.insert(commit.clone()) {
                continue;
            }
            match self.known_parents(&commit).await? {
                Some(parents) => {
                    for parent in parents.into_iter().rev() {
                        stack.push((parent, depth + 1));
                    }
                }
                None => shallow.push((commit, depth)),
            }
        }

        trace!("shallow frontier: {:?}", shallow);
        Ok(shallow)
    }

    async fn deepen(&self) -> Result<()> {
        let before = self.probe().await?;
        if before.is_empty() {
            return Err(TagverError::deepen_failed(
                "commit is missing but the repository has no shallow commits",
            ));
        }

        loop {
            let from_commit = self.deepen_from_commit.load(Ordering::SeqCst);
            match self.fetch_deeper(&before, from_commit).await {
                Ok(()) => break,
                Err(e)
                    if from_commit
                        && e.command_stderr()
                            .is_some_and(|stderr| stderr.contains(UNADVERTISED_OBJECT)) =>
                {
                    info!(
                        "Remote '{}' does not serve unadvertised commits, deepening the whole remote instead",
                        self.remote
                    );
                    self.deepen_from_commit.store(false, Ordering::SeqCst);
                }
                Err(e) => return Err(TagverError::deepen_failed(e.to_string())),
            }
        }

        let after = self.probe().await?;
        if after == before {
            return Err(TagverError::deepen_failed(format!(
                "fetching from '{}' did not change the shallow boundary",
                self.remote
            )));
        }
        Ok(())
    }

    async fn fetch_deeper(&self, shallow: &[(Commit, u32)], from_commit: bool) -> Result<()> {
        if from_commit {
            for (commit, depth) in shallow {
                let depth_arg = format!("--depth={}", (*depth).max(MIN_DEEPEN_DEPTH));
                info!("Deepening {} from '{}' ({})", commit, self.remote, depth_arg);
                self.git(&["fetch", &self.remote, commit.id(), &depth_arg])
                    .await?;
            }
        } else {
            let max_depth = shallow.iter().map(|(_, depth)| *depth).max().unwrap_or(0);
            let depth_arg = format!("--depth={}", (2 * max_depth).max(MIN_DEEPEN_DEPTH));
            info!("Deepening '{}' ({})", self.remote, depth_arg);
            self.git(&["fetch", &self.remote, &depth_arg]).await?;
        }
        Ok(())
    }

    async fn is_shallow(&self) -> Result<bool> {
        Ok(self.git(&["rev-parse", "--is-shallow-repository"]).await? == "true")
    }

    async fn local_tags(&self) -> TagSet {
        let mut tags = match self.git(&["show-ref", "--tags", "--dereference"]).await {
            Ok(output) => parse_tag_refs(&output),
            Err(e) => {
                // show-ref exits 1 when there are no tags
                debug!("no local tags: {}", e);
                TagSet::new()
            }
        };

        if self.settings.enable_shadow_repo {
            match self.shadow().await {
                Ok(shadow) => match shadow.tags().await {
                    Ok(shadow_tags) => tags.extend(shadow_tags.iter().cloned()),
                    Err(e) => debug!("no shadow tags: {}", e),
                },
                Err(e) => debug!("shadow repository unavailable: {}", e),
            }
        }
        tags
    }

    async fn remote_tags(&self) -> TagSet {
        match self.git(&["ls-remote", "--tags", &self.remote, "*"]).await {
            Ok(output) => parse_tag_refs(&output),
            Err(e) => {
                debug!("no remote tags from '{}': {}", self.remote, e);
                TagSet::new()
            }
        }
    }
}

#[async_trait]
impl RepoInspector for GitRepoInspector {
    async fn head(&self) -> Result<Option<Commit>> {
        match self.git(&["rev-parse", "HEAD"]).await {
            Ok(id) => Ok(Some(Commit::new(id))),
            Err(TagverError::Command { stderr, .. }) => {
                debug!("HEAD does not resolve: {}", stderr);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn parse_revision(&self, revision: &str) -> Result<Option<Commit>> {
        let revision = revision.trim();
        if revision.is_empty() || revision == "HEAD" {
            return self.head().await;
        }

        let peeled = format!("{}^{{commit}}", revision);
        let output = self
            .git(&["rev-parse", &peeled])
            .await
            .map_err(|e| match e {
                TagverError::Command { .. } => TagverError::AmbiguousRevision(revision.to_string()),
                other => other,
            })?;

        let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
        match (lines.next(), lines.next()) {
            (Some(id), None) => Ok(Some(Commit::new(id))),
            _ => Err(TagverError::AmbiguousRevision(revision.to_string())),
        }
    }

    async fn parents(&self, commit: &Commit) -> Result<Vec<Commit>> {
        self.require_parents(commit).await
    }

    async fn tags(&self, target: QueryTarget) -> Result<TagSet> {
        let mut tags = TagSet::new();
        if target.local {
            tags.extend(self.local_tags().await.iter().cloned());
        }
        if target.remote {
            tags.extend(self.remote_tags().await.iter().cloned());
        }
        debug!("{} {} tags", tags.len(), target);
        Ok(tags)
    }

    async fn fetch_tag(&self, tag: &Tag) -> Result<()> {
        if self.settings.enable_shadow_repo {
            return self.shadow().await?.fetch_tag(&tag.name).await;
        }

        if self.settings.enable_lightweight_tags {
            self.require_parents(&tag.points_to).await?;
            info!("Creating lightweight tag {}", tag);
            self.git(&["tag", "--no-sign", &tag.name, tag.points_to.id()])
                .await?;
            return Ok(());
        }

        let refspec = format!("refs/tags/{0}:refs/tags/{0}", tag.name);
        info!("Fetching tag {} from '{}'", tag.name, self.remote);
        if self.is_shallow().await? {
            self.git(&["fetch", "--depth", "1", &self.remote, &refspec])
                .await?;
        } else {
            self.git(&["fetch", &self.remote, &refspec]).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::MockCommandRunner;

    async fn inspector(runner: Arc<MockCommandRunner>, settings: InspectorSettings) -> GitRepoInspector {
        runner.on_success("git rev-parse --show-toplevel", "/work/repo");
        GitRepoInspector::from_path("/work/repo/src", "origin", runner, settings)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_from_path_resolves_root() {
        let runner = Arc::new(MockCommandRunner::new());
        let repo = inspector(runner.clone(), InspectorSettings::default()).await;
        assert_eq!(repo.root(), Path::new("/work/repo"));
        assert_eq!(repo.remote(), "origin");
    }

    #[tokio::test]
    async fn test_from_path_outside_repository() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.on_failure("git rev-parse --show-toplevel", 128, "fatal: not a git repository");
        let result =
            GitRepoInspector::from_path("/tmp", "origin", runner, InspectorSettings::default()).await;
        assert!(matches!(result, Err(TagverError::NotARepository(_))));
    }

    #[tokio::test]
    async fn test_head_of_empty_repository_is_none() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.on_failure("git rev-parse HEAD", 128, "fatal: ambiguous argument 'HEAD'");
        let repo = inspector(runner, InspectorSettings::default()).await;
        assert_eq!(repo.head().await.unwrap(), None);
        assert_eq!(repo.parse_revision("HEAD").await.unwrap(), None);
        assert_eq!(repo.parse_revision("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_parse_revision_requires_single_commit() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.on_success("git rev-parse main^{commit}", "aaaa");
        runner.on_success("git rev-parse a..b^{commit}", "bbbb\n^aaaa");
        runner.on_failure("git rev-parse nope^{commit}", 128, "unknown revision");
        let repo = inspector(runner, InspectorSettings::default()).await;

        assert_eq!(repo.parse_revision("main").await.unwrap(), Some(Commit::new("aaaa")));
        assert!(matches!(
            repo.parse_revision("a..b").await,
            Err(TagverError::AmbiguousRevision(_))
        ));
        assert!(matches!(
            repo.parse_revision("nope").await,
            Err(TagverError::AmbiguousRevision(_))
        ));
    }

    #[tokio::test]
    async fn test_tag_queries_swallow_failures() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.on_failure("git show-ref --tags --dereference", 1, "");
        runner.on_success("git ls-remote --tags origin *", "abc\trefs/tags/v1.0.0");
        let repo = inspector(runner, InspectorSettings::default()).await;

        assert!(repo.tags(QueryTarget::LOCAL).await.unwrap().is_empty());
        let all = repo.tags(QueryTarget::ALL).await.unwrap();
        assert!(all.contains(&Tag::new("v1.0.0", Commit::new("abc"))));
    }

    #[tokio::test]
    async fn test_local_and_remote_tags_are_unioned() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.on_success("git show-ref --tags --dereference", "abc refs/tags/v1.0.0");
        runner.on_success(
            "git ls-remote --tags origin *",
            "abc\trefs/tags/v1.0.0\ndef\trefs/tags/v2.0.0",
        );
        let repo = inspector(runner, InspectorSettings::default()).await;

        assert_eq!(repo.tags(QueryTarget::ALL).await.unwrap().len(), 2);
        assert_eq!(repo.tags(QueryTarget::REMOTE).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_tag_keeps_shallow_clone_shallow() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.on_success("git rev-parse --is-shallow-repository", "true");
        let repo = inspector(runner.clone(), InspectorSettings::default()).await;

        repo.fetch_tag(&Tag::new("v1.0.0", Commit::new("abc")))
            .await
            .unwrap();

        assert_eq!(
            runner.command_lines().last().map(String::as_str),
            Some("git fetch --depth 1 origin refs/tags/v1.0.0:refs/tags/v1.0.0")
        );
    }

    #[tokio::test]
    async fn test_fetch_tag_full_clone() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.on_success("git rev-parse --is-shallow-repository", "false");
        let repo = inspector(runner.clone(), InspectorSettings::default()).await;

        repo.fetch_tag(&Tag::new("v1.0.0", Commit::new("abc")))
            .await
            .unwrap();

        assert_eq!(
            runner.command_lines().last().map(String::as_str),
            Some("git fetch origin refs/tags/v1.0.0:refs/tags/v1.0.0")
        );
    }
}
