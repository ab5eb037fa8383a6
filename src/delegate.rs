//! Preferring a project-pinned `bunch` over the one on `PATH`.
//!
//! A project may vendor its own build of the tool at `.vendor/bin/bunch`.
//! When present, the global binary re-runs itself through that copy and falls
//! back to handling the command itself if the pinned copy fails.

use crate::vendor::VendorStore;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Marks a delegated child so it never delegates again.
pub const DELEGATED_ENV: &str = "BUNCH_DELEGATED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Vendored(PathBuf),
    Current,
}

/// Decide which executable should handle this invocation.
///
/// `current` is the running executable, if it could be determined. Both paths
/// should already be canonical so the same file compares equal.
pub fn choose(
    vendored: &Path,
    current: Option<&Path>,
    already_delegated: bool,
    exists: impl Fn(&Path) -> bool,
) -> Invocation {
    if already_delegated || !exists(vendored) {
        return Invocation::Current;
    }
    if current == Some(vendored) {
        return Invocation::Current;
    }
    Invocation::Vendored(vendored.to_path_buf())
}

pub fn vendored_binary(store: &VendorStore) -> PathBuf {
    store
        .bin_dir()
        .join(format!("bunch{}", std::env::consts::EXE_SUFFIX))
}

/// Run the pinned copy with `args`; `true` if it ran and succeeded.
pub fn run_vendored(binary: &Path, args: &[String]) -> bool {
    match Command::new(binary).args(args).env(DELEGATED_ENV, "1").status() {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::debug!(binary = %binary.display(), error = %e, "delegation failed");
            false
        }
    }
}
