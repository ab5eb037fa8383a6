//! Dependency commands.
//!
//! - `install` - resolve (lockfile pin first), fetch, optionally save to the manifest
//! - `update` - re-resolve the newest revision and fetch, ignoring the lockfile
//! - `uninstall` - remove vendored copies, optionally from the manifest
//! - `prune` - remove vendored packages the manifest does not declare
//! - `rebuild` - re-clone every vendored package from scratch
//! - `lock` - record vendored revisions into the lockfile
//! - `generate` - write a fresh manifest from scanned imports
//!
//! Fatal errors (unreadable manifest or lockfile) are returned before anything
//! on disk changes. Per-package failures land in the returned [`Summary`].

use super::batch;
use super::fetch::Fetcher;
use super::outdated::{self, OutdatedReport};
use super::resolve::{Resolution, Resolver};
use crate::config::Settings;
use crate::error::{BunchError, Result};
use crate::import::ImportSource;
use crate::lock::Lockfile;
use crate::manifest::{Manifest, PackageSpec};
use crate::report::{Outcome, Summary};
use crate::ui::Progress;
use crate::vendor::{self, VendorStore};
use colored::*;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;

/// A project root plus its settings.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub settings: Settings,
    progress_visible: bool,
    gopath: Option<OsString>,
}

impl Project {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let settings = Settings::load(&root)?;
        Ok(Self::with_settings(root, settings))
    }

    pub fn with_settings(root: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            root: root.into(),
            settings,
            progress_visible: true,
            gopath: std::env::var_os("GOPATH"),
        }
    }

    /// Use `gopath` instead of the environment's `GOPATH` for global commands.
    pub fn with_gopath(mut self, gopath: impl Into<OsString>) -> Self {
        self.gopath = Some(gopath.into());
        self
    }

    /// Disable spinners, for tests and non-interactive callers.
    pub fn quiet(mut self) -> Self {
        self.progress_visible = false;
        self
    }

    pub fn store(&self) -> VendorStore {
        VendorStore::new(self.root.join(&self.settings.vendor_dir))
    }

    fn global_store(&self) -> Result<VendorStore> {
        VendorStore::global(self.gopath.as_deref()).ok_or_else(|| {
            BunchError::Io(std::io::Error::other(
                "GOPATH is not set and no home directory was found",
            ))
        })
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(&self.settings)
    }

    fn fetcher(&self) -> Fetcher {
        let progress = if self.progress_visible {
            Progress::new()
        } else {
            Progress::hidden()
        };
        Fetcher::new(self.settings.timeout(), progress)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// `name` or `name@constraint`; empty means every manifest entry.
    pub packages: Vec<String>,
    pub save: bool,
    /// Install into the global GOPATH instead of the vendor store.
    pub global: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UninstallOptions {
    pub packages: Vec<String>,
    pub save: bool,
    pub global: bool,
}

/// A package to fetch and, if given, the revision it is pinned to.
struct Target {
    spec: PackageSpec,
    pin: Option<String>,
    /// The command line gave an explicit constraint.
    overridden: bool,
}

/// One entry of a fetch batch.
enum Planned {
    Fetch(Target),
    Rejected { name: String, error: BunchError },
}

pub fn install(project: &Project, options: &InstallOptions) -> Result<Summary> {
    let mut manifest = if options.packages.is_empty() {
        Manifest::load(&project.root)?
    } else {
        Manifest::load_or_default(&project.root)?
    };
    let lockfile = if options.global {
        None
    } else {
        Lockfile::load(&project.root)?
    };
    let store = if options.global {
        project.global_store()?
    } else {
        project.store()
    };

    let mut plan = requested_specs(&manifest, &options.packages);
    let requested: Vec<PackageSpec> = plan
        .iter()
        .filter_map(|planned| match planned {
            Planned::Fetch(target) => Some(target.spec.clone()),
            Planned::Rejected { .. } => None,
        })
        .collect();
    if let Some(lock) = &lockfile {
        for planned in &mut plan {
            if let Planned::Fetch(target) = planned
                && !target.overridden
            {
                target.pin = lock.get(&target.spec.name).map(|e| e.rev.clone());
            }
        }
    }

    if !plan.is_empty() {
        println!("{} Installing {} package(s)...", "📦".blue(), plan.len());
    }
    let summary = fetch_all(project, &store, "install", plan, false)?;

    if options.save && !options.packages.is_empty() {
        let mut changed = false;
        for spec in requested {
            let succeeded = summary
                .outcome(&spec.name)
                .is_some_and(|outcome| !outcome.is_failure());
            if succeeded {
                manifest.add_or_update(spec);
                changed = true;
            }
        }
        if changed {
            manifest.save(&project.root)?;
            println!("{} Saved to {}", "✓".green(), crate::manifest::MANIFEST_FILE);
        }
    }
    Ok(summary)
}

pub fn update(project: &Project, packages: &[String]) -> Result<Summary> {
    let manifest = if packages.is_empty() {
        Manifest::load(&project.root)?
    } else {
        Manifest::load_or_default(&project.root)?
    };
    // Parsed only so a corrupt lockfile still aborts before any fetch.
    let lockfile = Lockfile::load(&project.root)?;
    let store = project.store();

    let plan = requested_specs(&manifest, packages);

    if !plan.is_empty() {
        println!("{} Updating {} package(s)...", "📦".blue(), plan.len());
    }
    let mut summary = fetch_all(project, &store, "update", plan, false)?;

    if let Some(lock) = lockfile {
        let stale = summary.packages.iter().any(|report| match &report.outcome {
            Outcome::Fetched { revision, .. } => lock
                .get(&report.name)
                .is_none_or(|entry| &entry.rev != revision),
            _ => false,
        });
        if stale {
            summary.notes.push(format!(
                "{} no longer matches the vendor store; run 'bunch lock' to record the update.",
                crate::lock::LOCK_FILE
            ));
        }
    }
    Ok(summary)
}

pub fn uninstall(project: &Project, options: &UninstallOptions) -> Result<Summary> {
    if options.packages.is_empty() {
        return Err(BunchError::Io(std::io::Error::other(
            "uninstall needs at least one package name",
        )));
    }
    let mut manifest = if options.save {
        Some(Manifest::load(&project.root)?)
    } else {
        None
    };
    let store = if options.global {
        project.global_store()?
    } else {
        project.store()
    };

    let mut summary = Summary::new("uninstall");
    let mut seen = HashSet::new();
    for arg in &options.packages {
        let name = match PackageSpec::parse_arg(arg) {
            Ok(spec) => spec.name,
            Err(err) => {
                summary.push(arg.clone(), Outcome::Failed(err));
                continue;
            }
        };
        if !seen.insert(name.clone()) {
            continue;
        }

        let outcome = if !store.exists(&name) {
            Outcome::Skipped("not installed".to_string())
        } else {
            match store.remove(&name) {
                Ok(()) => Outcome::Removed,
                Err(err) => {
                    tracing::warn!(package = %name, error = %err, "removal failed");
                    Outcome::Failed(err)
                }
            }
        };
        if let Some(manifest) = manifest.as_mut()
            && !outcome.is_failure()
        {
            manifest.remove(&name);
        }
        summary.push(name, outcome);
    }

    if let Some(manifest) = manifest {
        manifest.save(&project.root)?;
    }
    Ok(summary)
}

pub fn prune(project: &Project) -> Result<Summary> {
    let manifest = Manifest::load(&project.root)?;
    let store = project.store();
    let declared: HashSet<&str> = manifest.names().collect();

    let mut summary = Summary::new("prune");
    for name in store.list()? {
        if declared.contains(name.as_str()) {
            continue;
        }
        println!("   {} Removing unused: {}", "🗑️".red(), name);
        let outcome = match store.remove(&name) {
            Ok(()) => Outcome::Removed,
            Err(err) => {
                tracing::warn!(package = %name, error = %err, "removal failed");
                Outcome::Failed(err)
            }
        };
        summary.push(name, outcome);
    }
    Ok(summary)
}

pub fn rebuild(project: &Project) -> Result<Summary> {
    let manifest = Manifest::load_or_default(&project.root)?;
    let lockfile = Lockfile::load(&project.root)?;
    let store = project.store();

    let plan: Vec<Planned> = store
        .list()?
        .into_iter()
        .map(|name| {
            let spec = manifest.get(&name).cloned().unwrap_or(PackageSpec {
                name: name.clone(),
                constraint: None,
            });
            let pin = lockfile
                .as_ref()
                .and_then(|lock| lock.get(&name))
                .map(|e| e.rev.clone());
            Planned::Fetch(Target {
                spec,
                pin,
                overridden: false,
            })
        })
        .collect();

    if !plan.is_empty() {
        println!("{} Rebuilding {} package(s)...", "🔨".yellow(), plan.len());
    }
    fetch_all(project, &store, "rebuild", plan, true)
}

/// What `lock` wrote, plus the inconsistencies it noticed.
#[derive(Debug)]
pub struct LockReport {
    pub lockfile: Lockfile,
    /// Vendored but not declared in the manifest.
    pub undeclared: Vec<String>,
    /// Declared but not vendored, hence not locked.
    pub missing: Vec<String>,
}

pub fn lock(project: &Project) -> Result<LockReport> {
    let manifest = Manifest::load_or_default(&project.root)?;
    let store = project.store();

    let mut lockfile = Lockfile::generate(&store)?;
    lockfile.sort_by_declared(manifest.names());
    lockfile.save(&project.root)?;

    let undeclared = lockfile
        .packages
        .iter()
        .filter(|entry| !manifest.contains(&entry.name))
        .map(|entry| entry.name.clone())
        .collect();
    let missing = manifest
        .names()
        .filter(|name| lockfile.get(name).is_none())
        .map(str::to_string)
        .collect();

    Ok(LockReport {
        lockfile,
        undeclared,
        missing,
    })
}

pub fn outdated(project: &Project) -> Result<OutdatedReport> {
    let manifest = Manifest::load(&project.root)?;
    let store = project.store();
    Ok(outdated::check(
        &manifest,
        &store,
        &project.resolver(),
        project.settings.jobs(),
    ))
}

/// Overwrite the manifest with every package `source` finds, unconstrained.
pub fn generate(project: &Project, source: &dyn ImportSource) -> Result<Manifest> {
    let mut manifest = Manifest::default();
    for name in source.candidates(&project.root)? {
        match PackageSpec::new(name.as_str(), None) {
            Ok(spec) => {
                manifest.add_or_update(spec);
            }
            Err(err) => tracing::warn!(package = %name, error = %err, "skipping import"),
        }
    }
    manifest.save(&project.root)?;
    Ok(manifest)
}

/// Packages to act on. A malformed argument becomes a rejected entry so the
/// rest of the batch still runs.
fn requested_specs(manifest: &Manifest, args: &[String]) -> Vec<Planned> {
    if args.is_empty() {
        return manifest
            .specs()
            .cloned()
            .map(|spec| {
                Planned::Fetch(Target {
                    spec,
                    pin: None,
                    overridden: false,
                })
            })
            .collect();
    }
    let mut seen = HashSet::new();
    let mut plan = Vec::new();
    for arg in args {
        let spec = match PackageSpec::parse_arg(arg) {
            Ok(spec) => spec,
            Err(error) => {
                plan.push(Planned::Rejected {
                    name: arg.clone(),
                    error,
                });
                continue;
            }
        };
        if !seen.insert(spec.name.clone()) {
            continue;
        }
        let overridden = spec.constraint.is_some();
        plan.push(Planned::Fetch(Target {
            spec: merge_constraint(manifest, spec),
            pin: None,
            overridden,
        }));
    }
    plan
}

/// An argument without `@constraint` inherits the manifest's constraint.
fn merge_constraint(manifest: &Manifest, spec: PackageSpec) -> PackageSpec {
    if spec.constraint.is_some() {
        return spec;
    }
    match manifest.get(&spec.name) {
        Some(declared) => declared.clone(),
        None => spec,
    }
}

/// Reject targets whose path lies inside, or contains, a vendored package or
/// an earlier target. Every package is its own repository root.
fn reject_nested(plan: Vec<Planned>, vendored: Vec<String>) -> Vec<Planned> {
    let mut taken = vendored;
    plan.into_iter()
        .map(|planned| match planned {
            Planned::Fetch(target) => {
                let name = &target.spec.name;
                let conflict = taken.iter().find(|other| vendor::nests(other, name)).cloned();
                match conflict {
                    Some(other) => Planned::Rejected {
                        name: name.clone(),
                        error: BunchError::InvalidPackageName {
                            name: name.clone(),
                            reason: format!("overlaps package '{}'", other),
                        },
                    },
                    None => {
                        taken.push(name.clone());
                        Planned::Fetch(target)
                    }
                }
            }
            rejected => rejected,
        })
        .collect()
}

fn fetch_all(
    project: &Project,
    store: &VendorStore,
    command: &'static str,
    plan: Vec<Planned>,
    force: bool,
) -> Result<Summary> {
    let plan = reject_nested(plan, store.list()?);
    let resolver = project.resolver();
    let fetcher = project.fetcher();

    let results = batch::run(&plan, project.settings.jobs(), |planned| match planned {
        Planned::Fetch(target) => Some(fetch_one(target, store, &resolver, &fetcher, force)),
        Planned::Rejected { .. } => None,
    });
    store.remove_staging_if_empty();

    let mut summary = Summary::new(command);
    for (planned, result) in plan.into_iter().zip(results) {
        let (name, outcome) = match (planned, result) {
            (Planned::Rejected { name, error }, _) => (name, Outcome::Failed(error)),
            (Planned::Fetch(target), Some(Ok((resolution, action)))) => (
                target.spec.name,
                Outcome::Fetched {
                    revision: resolution.revision,
                    action,
                },
            ),
            (Planned::Fetch(target), Some(Err(err))) => (target.spec.name, Outcome::Failed(err)),
            (Planned::Fetch(target), None) => {
                (target.spec.name, Outcome::Skipped("not attempted".to_string()))
            }
        };
        summary.push(name, outcome);
    }
    Ok(summary)
}

fn fetch_one(
    target: &Target,
    store: &VendorStore,
    resolver: &Resolver,
    fetcher: &Fetcher,
    force: bool,
) -> Result<(Resolution, super::fetch::FetchAction)> {
    let name = &target.spec.name;
    let resolution = match &target.pin {
        Some(rev) => Resolution::locked(rev.clone()),
        None => resolver.resolve(&target.spec)?,
    };
    tracing::debug!(package = %name, rev = %resolution.revision, from = %resolution.from, "resolved");

    let url = resolver.source_url(name);
    let action = if force {
        fetcher.refetch(store, name, &url, &resolution.revision)?
    } else {
        fetcher.materialize(store, name, &url, &resolution.revision)?
    };
    Ok((resolution, action))
}
