//! Output formatting for docparse (text, json, table)

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Extracted content as-is (default)
    #[default]
    Text,
    /// One JSON object per input
    Json,
    /// Summary table, one row per input
    Table,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message to stderr (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.green());
        }
    }

    /// Print a heading to stderr (unless in quiet mode)
    pub fn heading(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.bold());
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print rows as an ASCII table
    pub fn print_table<T: Tabled>(&self, data: &[T]) {
        if data.is_empty() {
            if !self.quiet {
                println!("No results");
            }
        } else {
            println!("{}", Table::new(data));
        }
    }

    /// Print a value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, data: &T) {
        println!(
            "{}",
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "null".to_string())
        );
    }
}

/// Outcome of one input, for table output
#[derive(Debug, Tabled)]
pub struct ResultRow {
    #[tabled(rename = "Input")]
    pub input: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Chars")]
    pub chars: usize,
    #[tabled(rename = "Details")]
    pub details: String,
}

/// Shorten a long value for a table cell
pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let head: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
