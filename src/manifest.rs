//! Manifest (`Bunchfile`) parsing and serialization.
//!
//! The manifest is the human-authored list of packages a project depends on.
//! One declaration per line:
//!
//! ```text
//! # networking
//! golang.org/x/net
//! github.com/pkg/errors v0.9.1   # pinned release
//! ```
//!
//! Entries keep their declared order and the comment/blank lines above them,
//! so `save(load(text)) == text` for any normalized file.

use crate::error::{BunchError, Result};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "Bunchfile";

/// A single declared dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    /// Branch, tag, semver requirement or full revision. `None` tracks the default branch.
    pub constraint: Option<String>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, constraint: Option<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        let constraint = constraint.filter(|c| !c.trim().is_empty());
        Ok(Self { name, constraint })
    }

    /// Parse a command line argument of the form `name` or `name@constraint`.
    pub fn parse_arg(arg: &str) -> Result<Self> {
        match arg.split_once('@') {
            Some((name, constraint)) => Self::new(name, Some(constraint.to_string())),
            None => Self::new(arg, None),
        }
    }
}

/// Check that a package name is a well-formed import path.
///
/// Every segment maps to exactly one directory under the vendor store, so the
/// rules here are what makes the on-disk layout collision free.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| BunchError::InvalidPackageName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if name.starts_with('/') {
        return Err(invalid("must not start with '/'"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '\\' | '@' | '#' | ':'))
    {
        return Err(invalid(&format!("contains forbidden character {:?}", c)));
    }
    for segment in name.split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative path segment")),
            ".git" => return Err(invalid("reserved segment '.git'")),
            _ => {}
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    spec: PackageSpec,
    /// Comment and blank lines written directly above the declaration.
    leading: Vec<String>,
    comment: Option<String>,
}

/// Insertion-ordered mapping from package name to [`PackageSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<Entry>,
    trailing: Vec<String>,
}

impl Manifest {
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(MANIFEST_FILE)
    }

    pub fn exists(project_root: &Path) -> bool {
        Self::path(project_root).is_file()
    }

    /// Read the manifest from `project_root`.
    ///
    /// Fails with [`BunchError::ManifestMissing`] when there is no file; callers
    /// decide whether that is fatal.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = Self::path(project_root);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BunchError::ManifestMissing(project_root.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&content, &path)
    }

    /// Like [`Manifest::load`], but a missing file yields an empty manifest.
    pub fn load_or_default(project_root: &Path) -> Result<Self> {
        match Self::load(project_root) {
            Err(BunchError::ManifestMissing(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut manifest = Self::default();
        let mut pending = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end();
            let parse_err = |message: String| BunchError::ManifestParse {
                path: path.to_path_buf(),
                line: line_no,
                message,
            };

            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                pending.push(line.to_string());
                continue;
            }

            let (decl, comment) = match trimmed.split_once('#') {
                Some((decl, comment)) => (decl, Some(comment.trim().to_string())),
                None => (trimmed, None),
            };
            let tokens: Vec<&str> = decl.split_whitespace().collect();
            let (name, constraint) = match tokens.as_slice() {
                [name] => (*name, None),
                [name, constraint] => (*name, Some(constraint.to_string())),
                _ => {
                    return Err(parse_err(format!(
                        "expected '<package> [constraint]', found {} fields",
                        tokens.len()
                    )));
                }
            };

            let spec = PackageSpec::new(name, constraint).map_err(|e| parse_err(e.to_string()))?;
            if manifest.contains(&spec.name) {
                return Err(parse_err(format!("duplicate package '{}'", spec.name)));
            }
            manifest.entries.push(Entry {
                spec,
                leading: std::mem::take(&mut pending),
                comment: comment.filter(|c| !c.is_empty()),
            });
        }

        manifest.trailing = pending;
        Ok(manifest)
    }

    /// Render the normalized file content.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            for line in &entry.leading {
                out.push_str(line);
                out.push('\n');
            }
            out.push_str(&entry.spec.name);
            if let Some(constraint) = &entry.spec.constraint {
                let _ = write!(out, " {}", constraint);
            }
            if let Some(comment) = &entry.comment {
                let _ = write!(out, "  # {}", comment);
            }
            out.push('\n');
        }
        for line in &self.trailing {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Rewrite the whole file.
    pub fn save(&self, project_root: &Path) -> Result<()> {
        fs::write(Self::path(project_root), self.render())?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PackageSpec> {
        self.entries
            .iter()
            .find(|e| e.spec.name == name)
            .map(|e| &e.spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert a new spec at the end, or replace the constraint of an existing
    /// one in place. Returns the previous spec if there was one.
    pub fn add_or_update(&mut self, spec: PackageSpec) -> Option<PackageSpec> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.spec.name == spec.name) {
            return Some(std::mem::replace(&mut entry.spec, spec));
        }
        self.entries.push(Entry {
            spec,
            leading: Vec::new(),
            comment: None,
        });
        None
    }

    /// Remove a spec together with the comment lines attached to it.
    pub fn remove(&mut self, name: &str) -> Option<PackageSpec> {
        let idx = self.entries.iter().position(|e| e.spec.name == name)?;
        Some(self.entries.remove(idx).spec)
    }

    pub fn specs(&self) -> impl Iterator<Item = &PackageSpec> {
        self.entries.iter().map(|e| &e.spec)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.spec.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Manifest> {
        Manifest::parse(text, Path::new("Bunchfile"))
    }

    #[test]
    fn test_round_trip_normalized() {
        let text = "# deps\n\ngithub.com/pkg/errors v0.9.1\ngolang.org/x/net  # tip\n\n# end\n";
        let manifest = parse(text).unwrap();
        assert_eq!(manifest.render(), text);
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn test_parse_fields() {
        let manifest = parse("a.com/x master\nb.com/y\n").unwrap();
        let specs: Vec<_> = manifest.specs().cloned().collect();
        assert_eq!(specs[0].constraint.as_deref(), Some("master"));
        assert_eq!(specs[1].constraint, None);
        assert_eq!(manifest.names().collect::<Vec<_>>(), ["a.com/x", "b.com/y"]);
    }

    #[test]
    fn test_normalizes_spacing() {
        let manifest = parse("a.com/x\t  v1   \n").unwrap();
        assert_eq!(manifest.render(), "a.com/x v1\n");
    }

    #[test]
    fn test_duplicate_reports_line() {
        let err = parse("a.com/x\n# c\na.com/x v2\n").unwrap_err();
        match err {
            BunchError::ManifestParse { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("duplicate"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_too_many_fields() {
        let err = parse("a.com/x v1 extra\n").unwrap_err();
        assert!(matches!(err, BunchError::ManifestParse { line: 1, .. }));
    }

    #[test]
    fn test_invalid_names() {
        for bad in ["../evil", "/abs", "a//b", "a/./b", "a\\b", "a/.git"] {
            assert!(validate_name(bad).is_err(), "{bad} should be rejected");
        }
        assert!(validate_name("github.com/user/repo").is_ok());
        assert!(matches!(
            parse("ok.com/a\na/../b\n"),
            Err(BunchError::ManifestParse { line: 2, .. })
        ));
    }

    #[test]
    fn test_add_or_update_keeps_position() {
        let mut manifest = parse("a.com/x\nb.com/y\n").unwrap();
        let previous = manifest.add_or_update(PackageSpec::new("a.com/x", Some("v2".into())).unwrap());
        assert_eq!(previous.unwrap().constraint, None);
        manifest.add_or_update(PackageSpec::new("c.com/z", None).unwrap());
        assert_eq!(manifest.render(), "a.com/x v2\nb.com/y\nc.com/z\n");
    }

    #[test]
    fn test_remove_drops_attached_comments() {
        let mut manifest = parse("# about x\na.com/x\nb.com/y\n").unwrap();
        assert!(manifest.remove("a.com/x").is_some());
        assert!(manifest.remove("a.com/x").is_none());
        assert_eq!(manifest.render(), "b.com/y\n");
    }

    #[test]
    fn test_parse_arg() {
        let spec = PackageSpec::parse_arg("github.com/a/b@v1.2.0").unwrap();
        assert_eq!(spec.name, "github.com/a/b");
        assert_eq!(spec.constraint.as_deref(), Some("v1.2.0"));
        assert_eq!(PackageSpec::parse_arg("github.com/a/b@").unwrap().constraint, None);
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(BunchError::ManifestMissing(_))
        ));
        assert!(Manifest::load_or_default(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_save_is_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let text = "a.com/x v1\n\n# later\nb.com/y\n";
        fs::write(Manifest::path(dir.path()), text).unwrap();
        let manifest = Manifest::load(dir.path()).unwrap();
        manifest.save(dir.path()).unwrap();
        manifest.save(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(Manifest::path(dir.path())).unwrap(), text);
    }
}
