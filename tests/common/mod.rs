// Shared fixtures for integration tests
#![allow(dead_code)]

use git2::{Oid, Repository, Signature, Time};
use git_tagver::git::{GitRepoInspector, InspectorSettings};
use git_tagver::process::SystemCommandRunner;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

/// A throwaway repository built with git2 so commit ids are reproducible
pub struct Fixture {
    pub dir: TempDir,
    pub repo: Repository,
    clock: Cell<i64>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Fixture {
            dir,
            repo,
            clock: Cell::new(1_600_000_000),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn signature(&self) -> Signature<'static> {
        let time = self.clock.get();
        self.clock.set(time + 60);
        Signature::new("Test", "test@example.com", &Time::new(time, 0)).unwrap()
    }

    /// Commit on HEAD, returning the new id
    pub fn commit(&self, message: &str) -> String {
        let parents: Vec<String> = match self.repo.head() {
            Ok(head) => vec![head.target().unwrap().to_string()],
            Err(_) => Vec::new(),
        };
        let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
        self.commit_with_parents(Some("HEAD"), message, &parents)
    }

    /// Commit with explicit parents, primary first; `update_ref` None leaves refs alone
    pub fn commit_with_parents(&self, update_ref: Option<&str>, message: &str, parents: &[&str]) -> String {
        let sig = self.signature();
        let tree_id = self.repo.index().unwrap().write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let parents: Vec<git2::Commit> = parents
            .iter()
            .map(|id| self.repo.find_commit(Oid::from_str(id).unwrap()).unwrap())
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        self.repo
            .commit(update_ref, &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
            .to_string()
    }

    pub fn tag(&self, name: &str, commit: &str) {
        let object = self.repo.revparse_single(commit).unwrap();
        self.repo.tag_lightweight(name, &object, false).unwrap();
    }

    pub fn annotated_tag(&self, name: &str, commit: &str) {
        let object = self.repo.revparse_single(commit).unwrap();
        let sig = self.signature();
        self.repo.tag(name, &object, &sig, name, false).unwrap();
    }

    pub fn file_url(&self) -> String {
        format!("file://{}", self.path().display())
    }
}

/// Run the git binary, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Clone `origin` with `--depth 1` into a new temporary directory
pub fn shallow_clone(origin: &Fixture) -> (TempDir, PathBuf) {
    let parent = tempfile::tempdir().unwrap();
    let target = parent.path().join("clone");
    git(
        parent.path(),
        &["clone", "--depth", "1", &origin.file_url(), target.to_str().unwrap()],
    );
    (parent, target)
}

pub async fn inspector(path: &Path, settings: InspectorSettings) -> GitRepoInspector {
    GitRepoInspector::from_path(path, "origin", Arc::new(SystemCommandRunner), settings)
        .await
        .unwrap()
}
