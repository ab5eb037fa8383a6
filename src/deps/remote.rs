//! git2 plumbing shared by the resolver and the fetcher.

use git2::{Direction, FetchOptions, Remote, RemoteCallbacks};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// One advertised ref of a remote, e.g. `refs/tags/v1.0` or `refs/tags/v1.0^{}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub name: String,
    pub oid: String,
}

/// What a remote advertises: its refs and, if known, its default branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    /// Short name of the branch HEAD points at.
    pub default_branch: Option<String>,
    pub refs: Vec<RemoteRef>,
}

impl RemoteListing {
    pub fn find(&self, refname: &str) -> Option<&str> {
        self.refs
            .iter()
            .find(|r| r.name == refname)
            .map(|r| r.oid.as_str())
    }

    /// Commit a tag points at, preferring the peeled entry of annotated tags.
    pub fn tag(&self, tag: &str) -> Option<&str> {
        let refname = format!("refs/tags/{}", tag);
        self.find(&format!("{}^{{}}", refname))
            .or_else(|| self.find(&refname))
    }

    pub fn branch(&self, branch: &str) -> Option<&str> {
        self.find(&format!("refs/heads/{}", branch))
    }

    pub fn head(&self) -> Option<&str> {
        self.find("HEAD")
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.refs
            .iter()
            .filter_map(|r| r.name.strip_prefix("refs/tags/"))
            .filter(|name| !name.ends_with("^{}"))
    }

    pub fn branch_names(&self) -> impl Iterator<Item = &str> {
        self.refs
            .iter()
            .filter_map(|r| r.name.strip_prefix("refs/heads/"))
    }
}

/// Run `job` on a helper thread and give up after `timeout`.
///
/// libgit2 has no deadline for the connect phase, so a stalled remote would
/// otherwise block the command forever. On expiry the helper thread is left to
/// finish on its own and its result is discarded.
pub(crate) fn with_timeout<T, F>(timeout: Duration, job: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(job());
    });
    rx.recv_timeout(timeout).ok()
}

/// Callbacks that abort an in-flight transfer once `deadline` has passed.
pub(crate) fn deadline_callbacks<'a>(deadline: Instant) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(move |_| Instant::now() < deadline);
    callbacks.sideband_progress(move |_| Instant::now() < deadline);
    callbacks
}

pub(crate) fn fetch_options<'a>(deadline: Instant) -> FetchOptions<'a> {
    let mut options = FetchOptions::new();
    options.remote_callbacks(deadline_callbacks(deadline));
    options.download_tags(git2::AutotagOption::All);
    options
}

/// `git ls-remote` equivalent.
pub fn list_remote(url: &str, timeout: Duration) -> Result<RemoteListing, String> {
    let owned = url.to_string();
    match with_timeout(timeout, move || list_remote_blocking(&owned)) {
        Some(result) => result.map_err(|e| e.message().to_string()),
        None => Err(format!("timed out after {}s listing {}", timeout.as_secs(), url)),
    }
}

fn list_remote_blocking(url: &str) -> Result<RemoteListing, git2::Error> {
    let mut remote = Remote::create_detached(url)?;
    remote.connect(Direction::Fetch)?;

    let refs = remote
        .list()?
        .iter()
        .map(|head| RemoteRef {
            name: head.name().to_string(),
            oid: head.oid().to_string(),
        })
        .collect();
    let default_branch = remote
        .default_branch()
        .ok()
        .and_then(|buf| buf.as_str().map(str::to_string))
        .map(|full| full.trim_start_matches("refs/heads/").to_string());

    let _ = remote.disconnect();
    Ok(RemoteListing {
        default_branch,
        refs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> RemoteListing {
        let r = |name: &str, oid: &str| RemoteRef {
            name: name.to_string(),
            oid: oid.to_string(),
        };
        RemoteListing {
            default_branch: Some("master".into()),
            refs: vec![
                r("HEAD", "aaaa"),
                r("refs/heads/master", "aaaa"),
                r("refs/tags/v1.0", "tagobj"),
                r("refs/tags/v1.0^{}", "cccc"),
                r("refs/tags/light", "dddd"),
            ],
        }
    }

    #[test]
    fn test_annotated_tag_resolves_to_peeled_commit() {
        let listing = listing();
        assert_eq!(listing.tag("v1.0"), Some("cccc"));
        assert_eq!(listing.tag("light"), Some("dddd"));
        assert_eq!(listing.tag("missing"), None);
    }

    #[test]
    fn test_name_iterators_skip_peeled_entries() {
        let listing = listing();
        assert_eq!(listing.tag_names().collect::<Vec<_>>(), ["v1.0", "light"]);
        assert_eq!(listing.branch_names().collect::<Vec<_>>(), ["master"]);
        assert_eq!(listing.head(), Some("aaaa"));
    }

    #[test]
    fn test_with_timeout_expires() {
        let result = with_timeout(Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            1
        });
        assert_eq!(result, None);
        assert_eq!(with_timeout(Duration::from_secs(5), || 2), Some(2));
    }

    #[test]
    fn test_list_unreachable_remote_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = list_remote(missing.to_str().unwrap(), Duration::from_secs(10));
        assert!(result.is_err());
    }
}
