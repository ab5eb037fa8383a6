//! Dependency resolution and vendoring.
//!
//! This module handles every operation that touches the vendor store:
//!
//! - **Resolution**: Turn a package name plus constraint into a commit id
//! - **Fetching**: Clone or update working copies at exact revisions
//! - **Management**: install, update, uninstall, prune, rebuild, lock
//! - **Drift**: Compare vendored revisions against upstream
//!
//! ## Commands
//!
//! - `bunch install [pkg[@constraint]]` - Fetch declared or named packages
//! - `bunch update [pkg]` - Move packages to their newest matching revision
//! - `bunch uninstall <pkg>` - Remove vendored packages
//! - `bunch prune` - Remove packages the `Bunchfile` does not declare
//! - `bunch outdated` - List packages behind upstream

pub mod batch;
pub mod fetch;
pub mod manage;
pub mod outdated;
pub mod remote;
pub mod resolve;

pub use fetch::{FetchAction, Fetcher};
pub use manage::{
    InstallOptions, LockReport, Project, UninstallOptions, generate, install, lock, prune,
    rebuild, uninstall, update,
};
pub use outdated::{Drift, OutdatedReport};
pub use resolve::{Resolution, ResolvedFrom, Resolver};
