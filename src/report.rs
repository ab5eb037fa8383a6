//! Per-package outcomes and the end-of-command summary.

use crate::deps::fetch::FetchAction;
use crate::error::{BunchError, short_rev};
use crate::ui::Table;
use colored::*;

#[derive(Debug)]
pub enum Outcome {
    Fetched { revision: String, action: FetchAction },
    Removed,
    Skipped(String),
    Failed(BunchError),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug)]
pub struct PackageReport {
    pub name: String,
    pub outcome: Outcome,
}

/// Everything a dependency command did, in the order packages were given.
#[derive(Debug)]
pub struct Summary {
    pub command: &'static str,
    pub packages: Vec<PackageReport>,
    /// Notes printed after the table, e.g. a stale lockfile hint.
    pub notes: Vec<String>,
}

impl Summary {
    pub fn new(command: &'static str) -> Self {
        Self {
            command,
            packages: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, outcome: Outcome) {
        self.packages.push(PackageReport {
            name: name.into(),
            outcome,
        });
    }

    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.packages
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &BunchError)> {
        self.packages.iter().filter_map(|p| match &p.outcome {
            Outcome::Failed(err) => Some((p.name.as_str(), err)),
            _ => None,
        })
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.packages.len() - self.failed_count()
    }

    /// `false` if any package failed; the binary turns this into a non-zero exit.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn print(&self) {
        match self.packages.as_slice() {
            [] => println!("{} Nothing to {}.", "✓".green(), self.command),
            [single] => print_single(single),
            many => {
                let mut table = Table::new(&["Package", "Result", "Detail"]);
                for report in many {
                    table.add_row(row(report));
                }
                table.print();
                let failed = self.failed_count();
                if failed == 0 {
                    println!(
                        "{} {}: {} package(s) ok.",
                        "✓".green(),
                        self.command,
                        self.succeeded_count()
                    );
                } else {
                    println!(
                        "{} {}: {} succeeded, {} failed.",
                        "x".red(),
                        self.command,
                        self.succeeded_count(),
                        failed
                    );
                }
            }
        }
        for note in &self.notes {
            println!("{} {}", "!".yellow(), note);
        }
    }
}

fn print_single(report: &PackageReport) {
    match &report.outcome {
        Outcome::Fetched { revision, action } => println!(
            "{} {} {} ({})",
            "✓".green(),
            report.name.bold(),
            action,
            short_rev(revision)
        ),
        Outcome::Removed => println!("{} Removed {}", "🗑️".red(), report.name.bold()),
        Outcome::Skipped(reason) => {
            println!("{} {}: {}", "!".yellow(), report.name.bold(), reason)
        }
        Outcome::Failed(err) => println!(
            "{} {} [{}]: {}",
            "x".red(),
            report.name.bold(),
            err.kind(),
            err
        ),
    }
}

fn row(report: &PackageReport) -> Vec<String> {
    let (status, detail) = match &report.outcome {
        Outcome::Fetched { revision, action } => (
            "✓ ok".green().to_string(),
            format!("{} {}", action, short_rev(revision)),
        ),
        Outcome::Removed => ("✓ removed".green().to_string(), String::new()),
        Outcome::Skipped(reason) => ("- skipped".yellow().to_string(), reason.clone()),
        Outcome::Failed(err) => (
            format!("x {}", err.kind()).red().to_string(),
            err.to_string(),
        ),
    };
    vec![report.name.clone(), status, detail]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut summary = Summary::new("install");
        summary.push(
            "a.com/x",
            Outcome::Fetched {
                revision: "a".repeat(40),
                action: FetchAction::Cloned,
            },
        );
        summary.push("b.com/y", Outcome::Skipped("not vendored".into()));
        summary.push(
            "c.com/z",
            Outcome::Failed(BunchError::Fetch {
                name: "c.com/z".into(),
                reason: "offline".into(),
            }),
        );
        assert_eq!(summary.succeeded_count(), 2);
        assert_eq!(summary.failed_count(), 1);
        assert!(!summary.is_success());
        assert_eq!(summary.failures().next().unwrap().0, "c.com/z");
        assert!(summary.outcome("b.com/y").is_some());
    }

    #[test]
    fn test_row_names_error_kind() {
        colored::control::set_override(false);
        let report = PackageReport {
            name: "c.com/z".into(),
            outcome: Outcome::Failed(BunchError::ConstraintNotFound {
                name: "c.com/z".into(),
                constraint: "v9".into(),
            }),
        };
        let cells = row(&report);
        assert_eq!(cells[1], "x ConstraintNotFound");
    }
}
