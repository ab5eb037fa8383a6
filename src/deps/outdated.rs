//! Drift detection between vendored revisions and upstream.

use super::batch;
use super::resolve::Resolver;
use crate::error::{BunchError, Result};
use crate::manifest::{Manifest, PackageSpec};
use crate::vendor::VendorStore;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub name: String,
    /// `None` when the package is declared but not vendored.
    pub current: Option<String>,
    pub latest: String,
}

#[derive(Debug, Default)]
pub struct OutdatedReport {
    pub drifted: Vec<Drift>,
    /// Packages whose latest revision could not be determined.
    pub errors: Vec<(String, BunchError)>,
}

/// Compare every manifest entry's vendored revision against the latest one.
///
/// The vendored revision is read from the working copy, not the lockfile,
/// which may be stale. Remote queries run on up to `jobs` threads.
pub fn check(
    manifest: &Manifest,
    store: &VendorStore,
    resolver: &Resolver,
    jobs: usize,
) -> OutdatedReport {
    let specs: Vec<&PackageSpec> = manifest.specs().collect();
    let results = batch::run(&specs, jobs, |spec| compare(spec, store, resolver));

    let mut report = OutdatedReport::default();
    for (spec, result) in specs.iter().zip(results) {
        match result {
            Ok(Some(drift)) => report.drifted.push(drift),
            Ok(None) => {}
            Err(err) => report.errors.push((spec.name.clone(), err)),
        }
    }
    report
}

fn compare(spec: &PackageSpec, store: &VendorStore, resolver: &Resolver) -> Result<Option<Drift>> {
    let current = store.revision(&spec.name)?;
    let latest = resolver.resolve(spec)?.revision;
    tracing::debug!(package = %spec.name, ?current, %latest, "compared revisions");
    if current.as_deref() == Some(latest.as_str()) {
        return Ok(None);
    }
    Ok(Some(Drift {
        name: spec.name.clone(),
        current,
        latest,
    }))
}
