//! Terminal output. Errors go to stderr, everything else to stdout.

use colored::{ColoredString, Colorize};
use std::fmt::Display;

/// Column the values of [`kv`] line up on
const KEY_WIDTH: usize = 12;

fn status(mark: ColoredString, msg: &str) {
    println!("{mark} {msg}");
}

pub fn info(msg: &str) {
    status("ℹ".blue(), msg);
}

pub fn success(msg: &str) {
    status("✓".green(), msg);
}

pub fn warn(msg: &str) {
    status("⚠".yellow(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Indented, muted note
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Bold title underlined to its display width
pub fn header(title: &str) {
    let rule = "─".repeat(title.chars().count());
    println!("\n{}\n{}", title.bold(), rule.dimmed());
}

pub fn section(title: &str) {
    println!("\n{}", title.cyan().bold());
}

/// `key: value` with values aligned
pub fn kv(key: &str, value: &str) {
    println!("  {} {}", pad_key(key).dimmed(), value);
}

fn pad_key(key: &str) -> String {
    format!("{:<KEY_WIDTH$}", format!("{key}:"))
}

/// Join ids for display, eliding the tail of long lists
pub fn format_ids<I, T>(ids: I, max: usize) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    let ids: Vec<String> = ids.into_iter().map(|id| id.to_string()).collect();
    match ids.len() {
        0 => "-".to_string(),
        n if n <= max => ids.join(", "),
        n => format!("{}, … (+{} more)", ids[..max].join(", "), n - max),
    }
}
