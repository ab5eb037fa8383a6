//! Revision resolution: package spec in, commit hash out.
//!
//! Precedence for a constraint string: full revision (no network), tag, branch,
//! then a semver requirement matched against the remote's version tags.

use super::remote::{RemoteListing, list_remote};
use crate::config::Settings;
use crate::error::{BunchError, Result};
use crate::manifest::PackageSpec;
use semver::{Version, VersionReq};
use std::fmt;
use std::time::Duration;

/// Where a resolved revision came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrom {
    Revision,
    Tag(String),
    Branch(String),
    DefaultBranch(String),
    Requirement { req: String, tag: String },
    Locked,
}

impl fmt::Display for ResolvedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Revision => write!(f, "revision"),
            Self::Tag(tag) => write!(f, "tag {}", tag),
            Self::Branch(branch) => write!(f, "branch {}", branch),
            Self::DefaultBranch(branch) => write!(f, "default branch {}", branch),
            Self::Requirement { req, tag } => write!(f, "{} -> tag {}", req, tag),
            Self::Locked => write!(f, "{}", crate::lock::LOCK_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub revision: String,
    pub from: ResolvedFrom,
}

impl Resolution {
    pub fn locked(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            from: ResolvedFrom::Locked,
        }
    }
}

/// A complete SHA-1 (40) or SHA-256 (64) commit id.
pub fn is_full_revision(s: &str) -> bool {
    matches!(s.len(), 40 | 64) && s.bytes().all(|b| b.is_ascii_hexdigit())
}

pub struct Resolver {
    timeout: Duration,
    settings: Settings,
}

impl Resolver {
    pub fn new(settings: &Settings) -> Self {
        Self {
            timeout: settings.timeout(),
            settings: settings.clone(),
        }
    }

    pub fn source_url(&self, name: &str) -> String {
        self.settings.source_url(name)
    }

    /// Resolve `spec` against its remote.
    pub fn resolve(&self, spec: &PackageSpec) -> Result<Resolution> {
        if let Some(constraint) = spec.constraint.as_deref()
            && is_full_revision(constraint)
        {
            return Ok(Resolution {
                revision: constraint.to_ascii_lowercase(),
                from: ResolvedFrom::Revision,
            });
        }

        let url = self.source_url(&spec.name);
        tracing::debug!(package = %spec.name, %url, "listing remote refs");
        let listing =
            list_remote(&url, self.timeout).map_err(|reason| BunchError::PackageNotFound {
                name: spec.name.clone(),
                reason,
            })?;
        select(spec, &listing)
    }
}

/// Pick a revision from an already fetched listing.
pub fn select(spec: &PackageSpec, listing: &RemoteListing) -> Result<Resolution> {
    let Some(constraint) = spec.constraint.as_deref() else {
        return default_branch(spec, listing);
    };

    if is_full_revision(constraint) {
        return Ok(Resolution {
            revision: constraint.to_ascii_lowercase(),
            from: ResolvedFrom::Revision,
        });
    }
    // Tags win over branches of the same name: they mark intentional releases.
    if let Some(oid) = listing.tag(constraint) {
        return Ok(Resolution {
            revision: oid.to_string(),
            from: ResolvedFrom::Tag(constraint.to_string()),
        });
    }
    if let Some(oid) = listing.branch(constraint) {
        return Ok(Resolution {
            revision: oid.to_string(),
            from: ResolvedFrom::Branch(constraint.to_string()),
        });
    }
    if let Some((tag, oid)) = highest_matching_tag(constraint, listing) {
        return Ok(Resolution {
            revision: oid,
            from: ResolvedFrom::Requirement {
                req: constraint.to_string(),
                tag,
            },
        });
    }

    Err(BunchError::ConstraintNotFound {
        name: spec.name.clone(),
        constraint: constraint.to_string(),
    })
}

fn default_branch(spec: &PackageSpec, listing: &RemoteListing) -> Result<Resolution> {
    if let Some(branch) = listing.default_branch.as_deref()
        && let Some(oid) = listing.branch(branch)
    {
        return Ok(Resolution {
            revision: oid.to_string(),
            from: ResolvedFrom::DefaultBranch(branch.to_string()),
        });
    }

    let Some(head) = listing.head() else {
        return Err(BunchError::PackageNotFound {
            name: spec.name.clone(),
            reason: "remote advertises no default branch".to_string(),
        });
    };

    // No symref advertised: name the branch whose tip matches HEAD.
    let mut candidates: Vec<&str> = listing
        .branch_names()
        .filter(|b| listing.branch(b) == Some(head))
        .collect();
    candidates.sort_by_key(|b| match *b {
        "master" => 0,
        "main" => 1,
        _ => 2,
    });
    let branch = candidates.first().copied().unwrap_or("HEAD");
    Ok(Resolution {
        revision: head.to_string(),
        from: ResolvedFrom::DefaultBranch(branch.to_string()),
    })
}

/// Only constraints with an explicit operator are requirements; a bare
/// `v1.3.0` that is not a tag stays an error instead of meaning `^1.3.0`.
fn highest_matching_tag(constraint: &str, listing: &RemoteListing) -> Option<(String, String)> {
    if !constraint.starts_with(['^', '~', '=', '>', '<', '*']) {
        return None;
    }
    let req = VersionReq::parse(constraint).ok()?;
    let (tag, _) = listing
        .tag_names()
        .filter_map(|tag| {
            let version = Version::parse(tag.trim_start_matches('v')).ok()?;
            req.matches(&version).then_some((tag, version))
        })
        .max_by(|a, b| a.1.cmp(&b.1))?;
    let oid = listing.tag(tag)?.to_string();
    Some((tag.to_string(), oid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::remote::RemoteRef;

    const TIP: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const DEV: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const REL: &str = "cccccccccccccccccccccccccccccccccccccccc";
    const OLD: &str = "dddddddddddddddddddddddddddddddddddddddd";

    fn listing(default_branch: Option<&str>) -> RemoteListing {
        let r = |name: &str, oid: &str| RemoteRef {
            name: name.to_string(),
            oid: oid.to_string(),
        };
        RemoteListing {
            default_branch: default_branch.map(str::to_string),
            refs: vec![
                r("HEAD", TIP),
                r("refs/heads/dev", DEV),
                r("refs/heads/master", TIP),
                r("refs/heads/release", DEV),
                r("refs/tags/release", REL),
                r("refs/tags/v1.2.0", REL),
                r("refs/tags/v1.10.0", OLD),
                r("refs/tags/v2.0.0", TIP),
            ],
        }
    }

    fn spec(constraint: Option<&str>) -> PackageSpec {
        PackageSpec::new("example.com/pkg", constraint.map(str::to_string)).unwrap()
    }

    #[test]
    fn test_full_revision_passes_through() {
        let rev = "0123456789ABCDEF0123456789abcdef01234567";
        let resolution = select(&spec(Some(rev)), &RemoteListing::default()).unwrap();
        assert_eq!(resolution.revision, rev.to_ascii_lowercase());
        assert_eq!(resolution.from, ResolvedFrom::Revision);
        assert!(!is_full_revision("0123abc"));
    }

    #[test]
    fn test_resolver_skips_network_for_full_revision() {
        let resolver = Resolver::new(&Settings::default());
        let rev = "0123456789abcdef0123456789abcdef01234567";
        let resolution = resolver.resolve(&spec(Some(rev))).unwrap();
        assert_eq!(resolution.revision, rev);
    }

    #[test]
    fn test_default_branch_from_symref() {
        let resolution = select(&spec(None), &listing(Some("dev"))).unwrap();
        assert_eq!(resolution.revision, DEV);
        assert_eq!(resolution.from, ResolvedFrom::DefaultBranch("dev".into()));
    }

    #[test]
    fn test_default_branch_falls_back_to_head() {
        let resolution = select(&spec(None), &listing(None)).unwrap();
        assert_eq!(resolution.revision, TIP);
        assert_eq!(resolution.from, ResolvedFrom::DefaultBranch("master".into()));
    }

    #[test]
    fn test_tag_beats_branch() {
        let resolution = select(&spec(Some("release")), &listing(None)).unwrap();
        assert_eq!(resolution.revision, REL);
        assert_eq!(resolution.from, ResolvedFrom::Tag("release".into()));
    }

    #[test]
    fn test_branch_constraint() {
        let resolution = select(&spec(Some("dev")), &listing(None)).unwrap();
        assert_eq!(resolution.from, ResolvedFrom::Branch("dev".into()));
    }

    #[test]
    fn test_semver_requirement_picks_highest_match() {
        let resolution = select(&spec(Some("^1.2")), &listing(None)).unwrap();
        assert_eq!(resolution.revision, OLD);
        assert_eq!(
            resolution.from,
            ResolvedFrom::Requirement {
                req: "^1.2".into(),
                tag: "v1.10.0".into()
            }
        );
    }

    #[test]
    fn test_unknown_constraint() {
        let err = select(&spec(Some("nope")), &listing(None)).unwrap_err();
        assert_eq!(err.kind(), "ConstraintNotFound");
        let err = select(&spec(Some("v1.3.0")), &listing(None)).unwrap_err();
        assert_eq!(err.kind(), "ConstraintNotFound");
        let err = select(&spec(Some("^9")), &listing(None)).unwrap_err();
        assert_eq!(err.kind(), "ConstraintNotFound");
    }

    #[test]
    fn test_empty_remote_has_no_default_branch() {
        let err = select(&spec(None), &RemoteListing::default()).unwrap_err();
        assert_eq!(err.kind(), "PackageNotFound");
    }
}
