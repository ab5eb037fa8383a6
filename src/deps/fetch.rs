//! Materializing vendored working copies at exact revisions.
//!
//! - Fresh fetch: clone into `.vendor/.staging`, check out, then rename into place
//! - Update: fetch refs only if the revision is missing locally, then check out
//! - Checkout is always a detached HEAD at a commit id, never a branch

use super::remote::{fetch_options, with_timeout};
use crate::error::{BunchError, Result, short_rev};
use crate::ui::Progress;
use crate::vendor::VendorStore;
use colored::*;
use git2::{Oid, Repository, StatusOptions};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// What the fetcher had to do to reach the requested revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAction {
    Cloned,
    Updated,
    Unchanged,
}

impl fmt::Display for FetchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cloned => "cloned",
            Self::Updated => "updated",
            Self::Unchanged => "up to date",
        };
        f.write_str(s)
    }
}

pub struct Fetcher {
    timeout: Duration,
    progress: Progress,
}

impl Fetcher {
    pub fn new(timeout: Duration, progress: Progress) -> Self {
        Self { timeout, progress }
    }

    /// Make the store's copy of `name` sit at `revision`, cloning if needed.
    pub fn materialize(
        &self,
        store: &VendorStore,
        name: &str,
        url: &str,
        revision: &str,
    ) -> Result<FetchAction> {
        if store.exists(name) {
            self.update_in_place(store, name, url, revision)
        } else {
            self.clone_fresh(store, name, url, revision)?;
            Ok(FetchAction::Cloned)
        }
    }

    /// Clone from scratch and swap the result in; the previous copy is only
    /// replaced once the new one is checked out.
    pub fn refetch(
        &self,
        store: &VendorStore,
        name: &str,
        url: &str,
        revision: &str,
    ) -> Result<FetchAction> {
        self.clone_fresh(store, name, url, revision)?;
        Ok(FetchAction::Cloned)
    }

    fn clone_fresh(&self, store: &VendorStore, name: &str, url: &str, revision: &str) -> Result<()> {
        let oid = parse_oid(name, revision)?;
        let staging = tempfile::Builder::new()
            .prefix("fetch-")
            .tempdir_in(store.staging_dir()?)?;
        let checkout_dir = staging.path().join("checkout");

        let pb = self.progress.spinner(format!("Fetching {}...", name));
        let deadline = Instant::now() + self.timeout;
        let job_url = url.to_string();
        let job_dir = checkout_dir.clone();
        let cloned = with_timeout(self.timeout, move || {
            git2::build::RepoBuilder::new()
                .fetch_options(fetch_options(deadline))
                .clone(&job_url, &job_dir)
                .map(|_| ())
                .map_err(|e| e.message().to_string())
        });

        let fetch_err = |reason: String| BunchError::Fetch {
            name: name.to_string(),
            reason,
        };
        match cloned {
            Some(Ok(())) => {}
            Some(Err(reason)) => {
                pb.finish_with_message(format!("{} Failed {}", "x".red(), name));
                return Err(fetch_err(reason));
            }
            None => {
                pb.finish_with_message(format!("{} Timed out {}", "x".red(), name));
                return Err(fetch_err(format!(
                    "timed out after {}s cloning {}",
                    self.timeout.as_secs(),
                    url
                )));
            }
        }

        let installed = Repository::open(&checkout_dir)
            .map_err(|e| fetch_err(e.message().to_string()))
            .and_then(|repo| checkout_detached(&repo, name, oid))
            .and_then(|()| store.install_staged(name, revision, &checkout_dir));
        if let Err(e) = installed {
            pb.finish_with_message(format!("{} Failed {}", "x".red(), name));
            return Err(e);
        }
        pb.finish_with_message(format!("{} Fetched {} @ {}", "✓".green(), name, short_rev(revision)));
        Ok(())
    }

    fn update_in_place(
        &self,
        store: &VendorStore,
        name: &str,
        url: &str,
        revision: &str,
    ) -> Result<FetchAction> {
        let oid = parse_oid(name, revision)?;
        let path = store.path(name)?;
        let checkout_err = |reason: String| BunchError::Checkout {
            name: name.to_string(),
            revision: revision.to_string(),
            reason,
        };
        let repo = Repository::open(&path).map_err(|e| checkout_err(e.message().to_string()))?;

        let head = repo.head().ok().and_then(|h| h.peel_to_commit().ok()).map(|c| c.id());
        if has_local_changes(&repo).map_err(|e| checkout_err(e.message().to_string()))? {
            return Err(checkout_err("working copy has local modifications".to_string()));
        }
        if head == Some(oid) {
            tracing::debug!(package = %name, rev = %revision, "already checked out");
            return Ok(FetchAction::Unchanged);
        }

        if repo.find_commit(oid).is_err() {
            let pb = self.progress.spinner(format!("Updating {}...", name));
            let fetched = self.fetch_refs(&path, url);
            match fetched {
                Ok(()) => pb.finish_and_clear(),
                Err(reason) => {
                    pb.finish_with_message(format!("{} Failed {}", "x".red(), name));
                    return Err(BunchError::Fetch {
                        name: name.to_string(),
                        reason,
                    });
                }
            }
        }

        checkout_detached(&repo, name, oid)?;
        println!("   {} Locked {} to {}", "📌".blue(), name, short_rev(revision));
        Ok(FetchAction::Updated)
    }

    fn fetch_refs(&self, path: &Path, url: &str) -> std::result::Result<(), String> {
        let deadline = Instant::now() + self.timeout;
        let path: PathBuf = path.to_path_buf();
        let url = url.to_string();
        let timeout = self.timeout;
        let result = with_timeout(timeout, move || -> std::result::Result<(), git2::Error> {
            let repo = Repository::open(&path)?;
            let mut remote = match repo.find_remote("origin") {
                Ok(remote) => remote,
                Err(_) => repo.remote("origin", &url)?,
            };
            remote.fetch(
                &[
                    "+refs/heads/*:refs/remotes/origin/*",
                    "+refs/tags/*:refs/tags/*",
                ],
                Some(&mut fetch_options(deadline)),
                None,
            )
        });
        match result {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(e.message().to_string()),
            None => Err(format!("timed out after {}s", timeout.as_secs())),
        }
    }
}

fn parse_oid(name: &str, revision: &str) -> Result<Oid> {
    Oid::from_str(revision).map_err(|e| BunchError::Checkout {
        name: name.to_string(),
        revision: revision.to_string(),
        reason: e.message().to_string(),
    })
}

/// Tracked-file modifications; untracked files (e.g. build output) are allowed.
fn has_local_changes(repo: &Repository) -> std::result::Result<bool, git2::Error> {
    let mut options = StatusOptions::new();
    options.include_untracked(false).include_ignored(false);
    let statuses = repo.statuses(Some(&mut options))?;
    Ok(!statuses.is_empty())
}

fn checkout_detached(repo: &Repository, name: &str, oid: Oid) -> Result<()> {
    let checkout_err = |reason: String| BunchError::Checkout {
        name: name.to_string(),
        revision: oid.to_string(),
        reason,
    };
    let commit = repo
        .find_commit(oid)
        .map_err(|_| checkout_err("revision is not present upstream".to_string()))?;
    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(commit.as_object(), Some(&mut checkout))
        .map_err(|e| checkout_err(e.message().to_string()))?;
    repo.set_head_detached(oid)
        .map_err(|e| checkout_err(e.message().to_string()))?;
    Ok(())
}
