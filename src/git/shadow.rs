use super::cat_file::CatFileReader;
use super::parse_tag_refs;
use crate::domain::TagSet;
use crate::error::Result;
use crate::process::CommandRunner;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const SHADOW_DIR_NAME: &str = "tagver-shadow";
const COPIED_CONFIG_PREFIX: &str = "http.";

/// History-only bare mirror of the remote, kept inside the primary git dir
///
/// Used as an alternate object and tag source so the primary clone's shallow
/// boundary is never touched.
pub struct ShadowRepo {
    dir: PathBuf,
    url: String,
    runner: Arc<dyn CommandRunner>,
    reader: CatFileReader,
}

impl ShadowRepo {
    /// Open the shadow of the repository at `root`, creating it on first use
    pub async fn open(root: &Path, remote: &str, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let url = git(runner.as_ref(), root, &["remote", "get-url", remote]).await?;
        let git_dir = git(runner.as_ref(), root, &["rev-parse", "--git-dir"]).await?;
        let dir = root.join(git_dir).join(SHADOW_DIR_NAME);

        if !dir.exists() {
            if let Err(e) = Self::create(runner.as_ref(), root, &dir, &url).await {
                // A partial mirror would be reused as if complete on the next open
                if let Err(cleanup) = tokio::fs::remove_dir_all(&dir).await {
                    debug!("shadow: failed to remove {}: {}", dir.display(), cleanup);
                }
                return Err(e);
            }
        }

        Ok(ShadowRepo {
            reader: CatFileReader::new("shadow", &dir),
            dir,
            url,
            runner,
        })
    }

    async fn create(runner: &dyn CommandRunner, root: &Path, dir: &Path, url: &str) -> Result<()> {
        info!("Creating shadow repository at {}", dir.display());

        let local_config = git(runner, root, &["config", "--local", "--list"]).await?;
        let copied: Vec<(&str, &str)> = local_config
            .lines()
            .filter_map(|line| line.split_once('='))
            .filter(|(key, _)| key.starts_with(COPIED_CONFIG_PREFIX))
            .collect();

        tokio::fs::create_dir_all(dir).await?;
        git(runner, dir, &["init", "--bare"]).await?;
        git(runner, dir, &["config", "fetch.recurseSubmodules", "false"]).await?;
        for (key, value) in copied {
            debug!("shadow: copying config {}", key);
            git(runner, dir, &["config", "--local", "--", key, value]).await?;
        }
        git(runner, dir, &["fetch", url, "--filter=tree:0", "--no-tags"]).await?;

        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read a commit object, refreshing the mirror once on a miss when `can_fetch`
    pub async fn read_commit(&self, id: &str, can_fetch: bool) -> Result<Option<Vec<u8>>> {
        if let Some(body) = self.reader.read_object_with_restart("commit", id).await? {
            return Ok(Some(body));
        }
        if !can_fetch {
            return Ok(None);
        }

        info!("Commit {} missing from shadow repository, fetching {}", id, self.url);
        self.fetch_with_refetch(&["fetch", &self.url, "--filter=tree:0", "--prune", "--force"])
            .await?;
        self.reader.read_object_with_restart("commit", id).await
    }

    pub async fn tags(&self) -> Result<TagSet> {
        let output = git(
            self.runner.as_ref(),
            &self.dir,
            &["show-ref", "--tags", "--dereference"],
        )
        .await?;
        Ok(parse_tag_refs(&output))
    }

    pub async fn fetch_tag(&self, name: &str) -> Result<()> {
        let refspec = format!("+refs/tags/{0}:refs/tags/{0}", name);
        info!("Fetching tag {} into shadow repository", name);
        self.fetch_with_refetch(&["fetch", &self.url, &refspec, "--filter=tree:0"])
            .await
    }

    pub async fn close(&self) {
        self.reader.close().await;
    }

    /// Run a fetch, retrying once with `--refetch` if it fails
    async fn fetch_with_refetch(&self, args: &[&str]) -> Result<()> {
        if let Err(e) = git(self.runner.as_ref(), &self.dir, args).await {
            debug!("shadow fetch failed, retrying with --refetch: {}", e);
            let mut retry = args.to_vec();
            retry.push("--refetch");
            git(self.runner.as_ref(), &self.dir, &retry).await?;
        }
        Ok(())
    }
}

async fn git(runner: &dyn CommandRunner, dir: &Path, args: &[&str]) -> Result<String> {
    Ok(runner.run(dir, "git", args, &BTreeMap::new()).await?.stdout)
}
