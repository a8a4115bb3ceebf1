//! Repository materialization
//!
//! Turns a `scan` argument into a directory on disk plus the identity that is
//! stamped on the contract. GitHub locators are shallow-cloned into a
//! temporary directory that lives as long as the returned `Materialized`.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;

use crate::contracts::RepoIdentity;
use crate::error::{RepostyleError, Result};

/// Sha recorded when a local directory is not a git work tree
pub const UNKNOWN_SHA: &str = "unknown";

/// Where a repository comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocator {
    Local(PathBuf),
    GitHub { owner: String, repo: String },
}

impl RepoLocator {
    /// Parse `https://github.com/o/r`, `github:o/r`, `github://o/r` or a local path
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let rest = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .or_else(|| trimmed.strip_prefix("github://"))
            .or_else(|| trimmed.strip_prefix("github:"));

        if let Some(rest) = rest {
            let mut parts = rest.trim_end_matches('/').splitn(3, '/');
            if let (Some(owner), Some(repo)) = (parts.next(), parts.next()) {
                let repo = repo.trim_end_matches(".git");
                if !owner.is_empty() && !repo.is_empty() {
                    return RepoLocator::GitHub {
                        owner: owner.to_string(),
                        repo: repo.to_string(),
                    };
                }
            }
        }
        RepoLocator::Local(PathBuf::from(trimmed))
    }

    /// Canonical remote URL for GitHub locators
    pub fn remote(&self) -> Option<String> {
        match self {
            RepoLocator::GitHub { owner, repo } => Some(format!("https://github.com/{}/{}", owner, repo)),
            RepoLocator::Local(_) => None,
        }
    }
}

/// A repository available on disk
#[derive(Debug)]
pub struct Materialized {
    pub root: PathBuf,
    pub identity: RepoIdentity,
    /// Deletes the clone directory on drop
    guard: Option<TempDir>,
}

impl Materialized {
    pub fn is_temporary(&self) -> bool {
        self.guard.is_some()
    }
}

/// Materialize `input` at `rev` (default `HEAD`)
pub async fn materialize(input: &str, rev: Option<&str>) -> Result<Materialized> {
    match RepoLocator::parse(input) {
        RepoLocator::Local(path) => materialize_local(&path, rev).await,
        locator @ RepoLocator::GitHub { .. } => {
            let remote = locator
                .remote()
                .ok_or_else(|| RepostyleError::InternalError("GitHub locator without remote".into()))?;
            materialize_remote(&remote, rev).await
        }
    }
}

async fn materialize_local(path: &Path, rev: Option<&str>) -> Result<Materialized> {
    if !path.is_dir() {
        return Err(RepostyleError::invalid_input(format!(
            "'{}' is not a directory or GitHub locator",
            path.display()
        )));
    }

    let sha = match git(&["rev-parse", rev.unwrap_or("HEAD")], Some(path)).await {
        Ok(sha) => sha,
        Err(e) if rev.is_some() => return Err(e),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Not a git work tree; recording sha as unknown");
            UNKNOWN_SHA.to_string()
        }
    };

    Ok(Materialized {
        root: path.to_path_buf(),
        identity: RepoIdentity::local(sha),
        guard: None,
    })
}

async fn materialize_remote(remote: &str, rev: Option<&str>) -> Result<Materialized> {
    let tmp = tempfile::Builder::new().prefix("repostyle-").tempdir()?;
    let dir = tmp.path();
    let clone_url = format!("{}.git", remote);

    tracing::info!(remote = %remote, rev = rev.unwrap_or("HEAD"), "Cloning repository");
    match rev {
        None => {
            let target = dir.to_string_lossy();
            git(&["clone", "--quiet", "--depth", "1", &clone_url, &target], None).await?;
        }
        Some(rev) => {
            git(&["init", "--quiet"], Some(dir)).await?;
            git(&["fetch", "--quiet", "--depth", "1", &clone_url, rev], Some(dir)).await?;
            git(&["checkout", "--quiet", "--detach", "FETCH_HEAD"], Some(dir)).await?;
        }
    }
    let sha = git(&["rev-parse", "HEAD"], Some(dir)).await?;

    Ok(Materialized {
        root: dir.to_path_buf(),
        identity: RepoIdentity::remote(remote, sha),
        guard: Some(tmp),
    })
}

/// Run git and return trimmed stdout
async fn git(args: &[&str], cwd: Option<&Path>) -> Result<String> {
    let mut command = Command::new("git");
    if let Some(cwd) = cwd {
        command.arg("-C").arg(cwd);
    }
    command.args(args).kill_on_drop(true);

    let output = command
        .output()
        .await
        .map_err(|e| RepostyleError::repository(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RepostyleError::repository(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
