//! Lockfile (`Bunchfile.lock`) management.
//!
//! The lockfile records the exact commit each vendored package is checked out
//! at. It is only ever produced from the vendor store ([`Lockfile::generate`]),
//! never from manifest constraints.

use crate::deps::resolve::is_full_revision;
use crate::error::{BunchError, Result};
use crate::vendor::VendorStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "Bunchfile.lock";
pub const LOCK_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMetadata {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

impl Default for LockMetadata {
    fn default() -> Self {
        Self {
            version: LOCK_VERSION,
            generator: Some(format!("bunch {}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub name: String,
    pub rev: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub metadata: LockMetadata,
    #[serde(rename = "package", default)]
    pub packages: Vec<LockEntry>,
}

impl Lockfile {
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(LOCK_FILE)
    }

    /// Read the lockfile, `Ok(None)` if the project has none.
    pub fn load(project_root: &Path) -> Result<Option<Self>> {
        let path = Self::path(project_root);
        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content, &path).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let parse_err = |message: String| BunchError::LockfileParse {
            path: path.to_path_buf(),
            message,
        };

        let lock: Self = toml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
        if lock.metadata.version != LOCK_VERSION {
            return Err(parse_err(format!(
                "unsupported lockfile version {} (expected {})",
                lock.metadata.version, LOCK_VERSION
            )));
        }

        let mut seen = HashSet::new();
        for entry in &lock.packages {
            if !seen.insert(entry.name.as_str()) {
                return Err(parse_err(format!("duplicate package '{}'", entry.name)));
            }
            if !is_full_revision(&entry.rev) {
                return Err(parse_err(format!(
                    "'{}' is locked to '{}', which is not a full commit hash",
                    entry.name, entry.rev
                )));
            }
        }
        Ok(lock)
    }

    /// Record the checked-out revision of every package in the vendor store.
    pub fn generate(store: &VendorStore) -> Result<Self> {
        let mut lock = Self::default();
        for name in store.list()? {
            if let Some(rev) = store.revision(&name)? {
                lock.insert(name, rev);
            } else {
                tracing::warn!(package = %name, "vendored copy has no checked-out commit, not locked");
            }
        }
        Ok(lock)
    }

    pub fn save(&self, project_root: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(Self::path(project_root), content)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LockEntry> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Insert or replace the pin for `name`, keeping its position.
    pub fn insert(&mut self, name: String, rev: String) {
        match self.packages.iter_mut().find(|p| p.name == name) {
            Some(entry) => entry.rev = rev,
            None => self.packages.push(LockEntry { name, rev }),
        }
    }

    /// Reorder entries to follow `order`; names not in `order` keep their
    /// relative order at the end.
    pub fn sort_by_declared<'a>(&mut self, order: impl IntoIterator<Item = &'a str>) {
        let order: Vec<&str> = order.into_iter().collect();
        self.packages.sort_by_key(|p| {
            order
                .iter()
                .position(|n| *n == p.name)
                .unwrap_or(order.len())
        });
    }
}
