//! Import scanning for `bunch generate`.
//!
//! Reads the `import` clauses of every `.go` file under the project and keeps
//! the paths that look remote (first segment contains a dot, e.g.
//! `github.com/...`). Standard library packages never do.

use crate::error::Result;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Producer of candidate package names for a fresh manifest.
pub trait ImportSource {
    fn candidates(&self, project_root: &Path) -> Result<Vec<String>>;
}

/// Hosts whose repositories are always `host/owner/repo`.
const REPO_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

const SKIPPED_DIRS: &[&str] = &[".git", ".vendor", "vendor", "testdata"];

#[derive(Debug, Clone)]
pub struct GoImportScanner {
    /// Directory names never descended into; the vendor store is always one.
    skip: Vec<String>,
}

impl Default for GoImportScanner {
    fn default() -> Self {
        Self {
            skip: SKIPPED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GoImportScanner {
    pub fn new(vendor_dir: &str) -> Self {
        let mut scanner = Self::default();
        if !scanner.skip.iter().any(|s| s == vendor_dir) {
            scanner.skip.push(vendor_dir.to_string());
        }
        scanner
    }

    fn skipped(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.skip.iter().any(|s| s == name))
    }
}

impl ImportSource for GoImportScanner {
    fn candidates(&self, project_root: &Path) -> Result<Vec<String>> {
        let parser = ImportParser::new()?;
        let mut found = BTreeSet::new();

        for entry in WalkDir::new(project_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.skipped(e))
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "go") {
                continue;
            }
            let source = match fs::read_to_string(path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable source");
                    continue;
                }
            };
            found.extend(parser.imports(&source).filter_map(repository_of));
        }
        Ok(found.into_iter().collect())
    }
}

struct ImportParser {
    single: Regex,
    block_start: Regex,
    spec: Regex,
}

impl ImportParser {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(io::Error::other);
        Ok(Self {
            single: compile(r#"^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#)?,
            block_start: compile(r"^\s*import\s*\(")?,
            spec: compile(r#"^\s*(?:[\w.]+\s+)?"([^"]+)""#)?,
        })
    }

    /// Import paths in `source`, stopping at the first top-level declaration.
    fn imports<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let mut in_block = false;
        source
            .lines()
            .take_while(|line| {
                !["func ", "type ", "var ", "const "]
                    .iter()
                    .any(|kw| line.starts_with(kw))
            })
            .filter_map(move |line| {
                if in_block {
                    if line.trim_start().starts_with(')') {
                        in_block = false;
                        return None;
                    }
                    return self.spec.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str());
                }
                if self.block_start.is_match(line) {
                    in_block = true;
                    return None;
                }
                self.single
                    .captures(line)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str())
            })
    }
}

/// The repository root an import path belongs to, if it is a remote package.
fn repository_of(import: &str) -> Option<String> {
    let mut segments = import.split('/');
    let host = segments.next()?;
    if !host.contains('.') {
        return None;
    }
    if REPO_HOSTS.contains(&host) {
        let parts: Vec<&str> = import.split('/').take(3).collect();
        return (parts.len() == 3).then(|| parts.join("/"));
    }
    Some(import.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MAIN_GO: &str = r#"package main

import "fmt"
import errs "github.com/pkg/errors"

import (
	"os"
	_ "github.com/lib/pq"
	cli "github.com/urfave/cli/v2/altsrc"
	"golang.org/x/net/context"
)

func main() {
	fmt.Println("import \"example.com/not/an/import\"")
}
"#;

    #[test]
    fn test_parses_single_and_block_imports() {
        let parser = ImportParser::new().unwrap();
        let imports: Vec<&str> = parser.imports(MAIN_GO).collect();
        assert_eq!(
            imports,
            vec![
                "fmt",
                "github.com/pkg/errors",
                "os",
                "github.com/lib/pq",
                "github.com/urfave/cli/v2/altsrc",
                "golang.org/x/net/context",
            ]
        );
    }

    #[test]
    fn test_repository_roots() {
        assert_eq!(repository_of("fmt"), None);
        assert_eq!(repository_of("net/http"), None);
        assert_eq!(
            repository_of("github.com/urfave/cli/v2/altsrc").as_deref(),
            Some("github.com/urfave/cli")
        );
        assert_eq!(repository_of("github.com/short"), None);
        assert_eq!(
            repository_of("golang.org/x/net/context").as_deref(),
            Some("golang.org/x/net/context")
        );
    }

    #[test]
    fn test_scan_skips_vendor_and_dedupes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.go"), MAIN_GO).unwrap();
        fs::create_dir_all(dir.path().join("cmd/tool")).unwrap();
        fs::write(
            dir.path().join("cmd/tool/tool.go"),
            "package main\n\nimport \"github.com/pkg/errors/sub\"\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join(".vendor/src/x")).unwrap();
        fs::write(
            dir.path().join(".vendor/src/x/x.go"),
            "package x\n\nimport \"github.com/should/not-appear\"\n",
        )
        .unwrap();

        let found = GoImportScanner::default().candidates(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![
                "github.com/lib/pq",
                "github.com/pkg/errors",
                "github.com/urfave/cli",
                "golang.org/x/net/context",
            ]
        );
    }
}
