//! User-facing output utilities for clean, colored terminal messages
//!
//! These bypass the logger so users see plain messages without timestamps,
//! levels or module paths.

use owo_colors::OwoColorize;

/// Display a warning message to the user in yellow with padding
///
/// # Example
/// ```ignore
/// output::warn("ripgrep not found, falling back to the builtin search backend.");
/// ```
pub fn warn(message: &str) {
    eprintln!("\n{}\n", message.yellow());
}

/// Display an error message to the user in red with padding
///
/// # Example
/// ```ignore
/// output::error("Error: Failed to parse ~/.symjump/config.toml");
/// ```
pub fn error(message: &str) {
    eprintln!("\n{}\n", message.red());
}

/// Display an informational message to the user with padding
///
/// # Example
/// ```ignore
/// output::info("No workspace folder open at ./missing.");
/// ```
pub fn info(message: &str) {
    eprintln!("\n{}\n", message);
}
