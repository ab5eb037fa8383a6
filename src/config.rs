//! Project settings (`bunch.toml`).
//!
//! Every key is optional; a project without a settings file gets the defaults.
//! `BUNCH_JOBS` and `BUNCH_TIMEOUT` override the file.

use crate::error::{BunchError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "bunch.toml";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchPathMode {
    /// The sandbox sees only the vendor store.
    #[default]
    Replace,
    /// The vendor store comes first, the caller's GOPATH after it.
    Prepend,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub vendor_dir: String,
    pub jobs: usize,
    pub timeout_secs: u64,
    pub toolchain: String,
    pub search_path: SearchPathMode,
    /// Exact package name -> clone URL.
    pub sources: BTreeMap<String, String>,
    /// Package name prefix -> URL prefix. Longest prefix wins.
    pub rewrite: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vendor_dir: ".vendor".to_string(),
            jobs: 4,
            timeout_secs: 60,
            toolchain: "go".to_string(),
            search_path: SearchPathMode::default(),
            sources: BTreeMap::new(),
            rewrite: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(CONFIG_FILE)
    }

    /// Load `bunch.toml` (if any) and apply environment overrides.
    pub fn load(project_root: &Path) -> Result<Self> {
        let mut settings = Self::load_file(project_root)?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn load_file(project_root: &Path) -> Result<Self> {
        let path = Self::path(project_root);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Self::parse(&content, &path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let settings: Self = toml::from_str(content).map_err(|e| BunchError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if settings.vendor_dir.trim().is_empty() {
            return Err(BunchError::Config {
                path: path.to_path_buf(),
                message: "vendor_dir must not be empty".to_string(),
            });
        }
        Ok(settings)
    }

    /// Apply `BUNCH_JOBS` / `BUNCH_TIMEOUT`. Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("BUNCH_JOBS") {
            match raw.trim().parse::<usize>() {
                Ok(jobs) => self.jobs = jobs,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid BUNCH_JOBS"),
            }
        }
        if let Some(raw) = lookup("BUNCH_TIMEOUT") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid BUNCH_TIMEOUT"),
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn jobs(&self) -> usize {
        self.jobs.max(1)
    }

    /// Where to clone `name` from.
    pub fn source_url(&self, name: &str) -> String {
        if let Some(url) = self.sources.get(name) {
            return url.clone();
        }
        let rewrite = self
            .rewrite
            .iter()
            .filter(|(prefix, _)| name.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        match rewrite {
            Some((prefix, target)) => format!("{}{}", target, &name[prefix.len()..]),
            None => format!("https://{}", name),
        }
    }
}
