//! Supporting helpers for CLI messages.

use owo_colors::OwoColorize;

/// Colors are used for non-JSON output unless `NO_COLOR` is set.
pub fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

fn prefix(label: &str, paint: fn(&str) -> String) -> String {
    if std::env::var_os("NO_COLOR").is_some() {
        label.to_string()
    } else {
        paint(label)
    }
}

pub fn error_prefix() -> String {
    prefix("error:", |s| s.red().bold().to_string())
}

pub fn note_prefix() -> String {
    prefix("note:", |s| s.cyan().bold().to_string())
}

pub fn info_prefix() -> String {
    prefix("info:", |s| s.blue().bold().to_string())
}

pub fn warn_prefix() -> String {
    prefix("warn:", |s| s.yellow().bold().to_string())
}
