//! Terminal output helpers.
//!
//! - `Table` - column-aligned table with box-drawing borders, clipped to the terminal width
//! - `Progress` - one spinner per package, shared across worker threads

use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    fn widths(&self, max_total: usize) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(visible_len(cell));
            }
        }

        // Shrink the widest column until the table fits, never below 8.
        let overhead = 3 + 3 * widths.len();
        while overhead + widths.iter().sum::<usize>() > max_total {
            let Some((idx, &widest)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
                break;
            };
            if widest <= 8 {
                break;
            }
            widths[idx] -= 1;
        }
        widths
    }

    pub fn render(&self, max_total: usize) -> String {
        if self.headers.is_empty() {
            return String::new();
        }
        let widths = self.widths(max_total);
        let rule = |left: &str, mid: &str, right: &str| {
            let parts: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("  {}{}{}\n", left, parts.join(mid), right)
        };
        let line = |cells: &[String]| {
            let parts: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, w)| {
                    let clipped = clip(cell, *w);
                    let pad = w.saturating_sub(visible_len(&clipped));
                    format!(" {}{} ", clipped, " ".repeat(pad))
                })
                .collect();
            format!("  │{}│\n", parts.join("│"))
        };

        let mut out = rule("┌", "┬", "┐");
        let headers: Vec<String> = self.headers.iter().map(|h| h.bold().to_string()).collect();
        out.push_str(&line(&headers));
        out.push_str(&rule("├", "┼", "┤"));
        for row in &self.rows {
            out.push_str(&line(row));
        }
        out.push_str(&rule("└", "┴", "┘"));
        out
    }

    pub fn print(&self) {
        let (_, cols) = console::Term::stdout().size();
        print!("{}", self.render(cols as usize));
    }
}

/// Length as displayed, ignoring ANSI color sequences.
fn visible_len(s: &str) -> usize {
    console::measure_text_width(s)
}

fn clip(s: &str, width: usize) -> String {
    if visible_len(s) <= width {
        return s.to_string();
    }
    let plain = console::strip_ansi_codes(s);
    let kept: String = plain.chars().take(width.saturating_sub(1)).collect();
    format!("{}…", kept)
}

/// Spinners for concurrent per-package work.
///
/// Hidden automatically when stderr is not a terminal.
#[derive(Clone, Default)]
pub struct Progress {
    bars: MultiProgress,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hidden() -> Self {
        Self {
            bars: MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden()),
        }
    }

    pub fn spinner(&self, message: String) -> ProgressBar {
        let pb = self.bars.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷ "),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_aligns_columns() {
        colored::control::set_override(false);
        let mut table = Table::new(&["Package", "Rev"]);
        table.add_row(vec!["a.com/x".into(), "abc".into()]);
        table.add_row(vec!["too".into()]);
        let out = table.render(200);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "  │ Package │ Rev │");
        assert_eq!(lines[3], "  │ a.com/x │ abc │");
    }

    #[test]
    fn test_table_clips_to_width() {
        colored::control::set_override(false);
        let mut table = Table::new(&["Name"]);
        table.add_row(vec!["x".repeat(40)]);
        let out = table.render(20);
        assert!(out.lines().all(|l| l.chars().count() <= 20));
        assert!(out.contains('…'));
    }
}
