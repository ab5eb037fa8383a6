//! # bunch - Vendored Dependencies for Go
//!
//! bunch pins every dependency of a GOPATH-mode Go project to an exact commit
//! and keeps a private copy of each one inside the project.
//!
//! ## Features
//!
//! - **Declarative**: A plain-text `Bunchfile` lists packages and constraints
//! - **Reproducible**: `Bunchfile.lock` records the commit of every vendored package
//! - **Isolated**: Packages live in `.vendor/`, never in the global GOPATH
//! - **Parallel**: Remote queries and clones run on a bounded worker pool
//! - **Sandboxed**: `bunch go`, `bunch exec` and `bunch shell` see only the vendor store
//!
//! ## Quick Start
//!
//! ```bash
//! # Seed a Bunchfile from the imports in the current directory
//! bunch generate
//!
//! # Fetch everything and pin it
//! bunch install
//! bunch lock
//!
//! # Build against the vendored copies
//! bunch go build ./...
//! ```
//!
//! ## Module Organization
//!
//! - [`manifest`] - `Bunchfile` parsing and rendering
//! - [`lock`] - `Bunchfile.lock` management
//! - [`vendor`] - On-disk vendor store
//! - [`deps`] - Resolution, fetching and dependency commands
//! - [`sandbox`] - Child environments for the toolchain and shells

/// Project settings (`bunch.toml`).
pub mod config;

/// Self re-execution through a project-pinned binary.
pub mod delegate;

/// Dependency resolution, fetching and management.
pub mod deps;

/// Error types shared by every module.
pub mod error;

/// Go import scanning for `bunch generate`.
pub mod import;

/// Lockfile (`Bunchfile.lock`) management.
pub mod lock;

/// Manifest (`Bunchfile`) parsing.
pub mod manifest;

/// Per-package outcomes and command summaries.
pub mod report;

/// Environment sandbox for toolchain commands.
pub mod sandbox;

/// Terminal UI utilities (tables, spinners).
pub mod ui;

/// Vendor store layout.
pub mod vendor;

pub use error::{BunchError, Result};
