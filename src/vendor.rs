//! The vendor store: a project-local GOPATH.
//!
//! Layout (default root `.vendor`):
//!
//! ```text
//! .vendor/
//! ├── bin/                      # GOBIN inside the sandbox
//! ├── src/github.com/pkg/errors # one git working copy per package
//! └── .staging/                 # in-progress clones, never listed
//! ```
//!
//! Package names are validated import paths, so each segment becomes exactly
//! one directory and two distinct names never share a path.

use crate::error::{BunchError, Result};
use crate::manifest::validate_name;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const STAGING_DIR: &str = ".staging";

#[derive(Debug, Clone)]
pub struct VendorStore {
    root: PathBuf,
}

impl VendorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store for the global search path: first entry of `GOPATH`, else `~/go`.
    pub fn global(gopath: Option<&std::ffi::OsStr>) -> Option<Self> {
        let first = gopath
            .and_then(|value| std::env::split_paths(value).find(|p| !p.as_os_str().is_empty()));
        first
            .or_else(|| dirs::home_dir().map(|home| home.join("go")))
            .map(Self::new)
    }

    /// GOPATH value for this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub(crate) fn staging_dir(&self) -> Result<PathBuf> {
        let dir = self.root.join(STAGING_DIR);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Location of the working copy for `name`.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        let mut path = self.src_dir();
        path.extend(name.split('/'));
        Ok(path)
    }

    /// Whether a working copy for `name` is present.
    pub fn exists(&self, name: &str) -> bool {
        self.path(name)
            .map(|p| p.join(".git").exists())
            .unwrap_or(false)
    }

    /// Names of every vendored package, sorted.
    ///
    /// A package is any directory under `src/` holding a `.git` entry; the walk
    /// does not descend into working copies.
    pub fn list(&self) -> Result<Vec<String>> {
        let src = self.src_dir();
        if !src.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut walker = WalkDir::new(&src).min_depth(1).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::other("vendor tree walk failed"))
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if entry.file_name() == ".git" {
                walker.skip_current_dir();
                continue;
            }
            if entry.path().join(".git").exists() {
                if let Some(name) = relative_name(&src, entry.path()) {
                    names.push(name);
                }
                walker.skip_current_dir();
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete the working copy of `name` and any parent directories it leaves empty.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name)?;
        let remove_err = |source: io::Error| BunchError::VendorRemove {
            name: name.to_string(),
            source,
        };

        match fs::remove_dir_all(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(remove_err(e)),
        }
        self.prune_empty_parents(&path);
        Ok(())
    }

    /// Move a fully checked-out working copy into place. An existing copy is
    /// set aside first and put back if the move fails.
    pub(crate) fn install_staged(&self, name: &str, revision: &str, staged: &Path) -> Result<()> {
        let dest = self.path(name)?;
        let checkout_err = |step: &str, e: io::Error| BunchError::Checkout {
            name: name.to_string(),
            revision: revision.to_string(),
            reason: format!("{step}: {e}"),
        };

        let backup = if dest.exists() {
            let holder = tempfile::Builder::new()
                .prefix("old-")
                .tempdir_in(self.staging_dir()?)?;
            let aside = holder.path().join("copy");
            fs::rename(&dest, &aside).map_err(|e| checkout_err("cannot set previous copy aside", e))?;
            Some((holder, aside))
        } else {
            None
        };

        let moved = match dest.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|()| fs::rename(staged, &dest));

        if let Err(e) = moved {
            if let Some((_, aside)) = &backup
                && let Err(restore) = fs::rename(aside, &dest)
            {
                tracing::warn!(package = %name, error = %restore, "previous copy could not be restored");
            }
            return Err(checkout_err("cannot move new copy into place", e));
        }
        Ok(())
    }

    /// Drop the staging directory once nothing is left in it.
    pub(crate) fn remove_staging_if_empty(&self) {
        // Fails while other staged content remains.
        let _ = fs::remove_dir(self.root.join(STAGING_DIR));
    }

    /// Commit currently checked out for `name`, or `None` if not vendored.
    pub fn revision(&self, name: &str) -> Result<Option<String>> {
        if !self.exists(name) {
            return Ok(None);
        }
        let path = self.path(name)?;
        let repo = match git2::Repository::open(&path) {
            Ok(repo) => repo,
            Err(e) => {
                tracing::warn!(package = %name, error = %e, "vendored copy is not a readable repository");
                return Ok(None);
            }
        };
        let rev = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
            .map(|commit| commit.id().to_string());
        Ok(rev)
    }

    fn prune_empty_parents(&self, removed: &Path) {
        let src = self.src_dir();
        let mut current = removed.parent();
        while let Some(dir) = current {
            if dir == src.as_path() || !dir.starts_with(&src) {
                break;
            }
            // Fails on non-empty directories, which ends the walk.
            if fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

/// Whether one package path lies strictly inside the other.
pub(crate) fn nests(a: &str, b: &str) -> bool {
    let within = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.starts_with('/'))
    };
    within(a, b) || within(b, a)
}

fn relative_name(src: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(src).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REV: &str = "0123456789abcdef0123456789abcdef01234567";

    fn fake_repo(store: &VendorStore, name: &str) {
        let path = store.path(name).unwrap();
        fs::create_dir_all(path.join(".git")).unwrap();
        fs::write(path.join("lib.go"), "package lib\n").unwrap();
    }

    #[test]
    fn test_path_layout() {
        let store = VendorStore::new("/proj/.vendor");
        assert_eq!(
            store.path("github.com/pkg/errors").unwrap(),
            PathBuf::from("/proj/.vendor/src/github.com/pkg/errors")
        );
        assert!(store.path("../escape").is_err());
    }

    #[test]
    fn test_list_finds_repo_roots_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = VendorStore::new(dir.path().join(".vendor"));
        assert!(store.list().unwrap().is_empty());

        fake_repo(&store, "github.com/b/two");
        fake_repo(&store, "github.com/a/one");
        fake_repo(&store, "example.com/x");
        // Nested plain directories inside a working copy are not packages.
        fs::create_dir_all(store.path("github.com/a/one/sub/pkg").unwrap()).unwrap();
        // Leftover staging content is ignored.
        fs::create_dir_all(store.staging_dir().unwrap().join("junk/.git")).unwrap();

        assert_eq!(
            store.list().unwrap(),
            ["example.com/x", "github.com/a/one", "github.com/b/two"]
        );
        assert!(store.exists("github.com/a/one"));
        assert!(!store.exists("github.com/a"));
    }

    #[test]
    fn test_remove_cleans_empty_parents() {
        let dir = tempfile::tempdir().unwrap();
        let store = VendorStore::new(dir.path());
        fake_repo(&store, "github.com/a/one");
        fake_repo(&store, "github.com/b/two");

        store.remove("github.com/a/one").unwrap();
        assert!(!store.exists("github.com/a/one"));
        assert!(!store.src_dir().join("github.com/a").exists());
        assert!(store.exists("github.com/b/two"));

        // Removing something absent is not an error.
        store.remove("github.com/a/one").unwrap();
    }

    #[test]
    fn test_install_staged_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = VendorStore::new(dir.path());
        fake_repo(&store, "a.com/x");

        let staged = store.staging_dir().unwrap().join("new");
        fs::create_dir_all(staged.join(".git")).unwrap();
        fs::write(staged.join("fresh.go"), "package x\n").unwrap();

        store.install_staged("a.com/x", REV, &staged).unwrap();
        let path = store.path("a.com/x").unwrap();
        assert!(path.join("fresh.go").exists());
        assert!(!path.join("lib.go").exists());
        assert_eq!(fs::read_dir(store.staging_dir().unwrap()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_install_keeps_previous_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = VendorStore::new(dir.path());
        fake_repo(&store, "a.com/x");

        let never_staged = store.staging_dir().unwrap().join("missing");
        let err = store.install_staged("a.com/x", REV, &never_staged).unwrap_err();
        assert_eq!(err.kind(), "CheckoutError");
        assert!(store.exists("a.com/x"));
        assert!(store.path("a.com/x").unwrap().join("lib.go").exists());
        assert_eq!(fs::read_dir(store.staging_dir().unwrap()).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_staging_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = VendorStore::new(dir.path());
        let staging = store.staging_dir().unwrap();
        fs::write(staging.join("busy"), "").unwrap();
        store.remove_staging_if_empty();
        assert!(staging.exists());

        fs::remove_file(staging.join("busy")).unwrap();
        store.remove_staging_if_empty();
        assert!(!staging.exists());
    }

    #[test]
    fn test_nesting() {
        assert!(nests("a.com/x", "a.com/x/sub"));
        assert!(nests("a.com/x/sub", "a.com/x"));
        assert!(!nests("a.com/x", "a.com/x"));
        assert!(!nests("a.com/x", "a.com/xy"));
    }

    #[test]
    fn test_global_uses_first_gopath_entry() {
        let joined = std::env::join_paths(["/first/gopath", "/second"]).unwrap();
        let store = VendorStore::global(Some(joined.as_os_str())).unwrap();
        assert_eq!(store.root(), Path::new("/first/gopath"));
    }

    #[test]
    fn test_revision_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = VendorStore::new(dir.path());
        assert_eq!(store.revision("a.com/x").unwrap(), None);
    }
}
