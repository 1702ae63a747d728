use colored::*;
use std::fmt::Display;

/// Status lines go to stderr so they never mix with echoed message text.
pub fn print_error(message: impl Display) {
    eprintln!("{} {message}", "Error:".red().bold());
}

pub fn print_success(message: impl Display) {
    eprintln!("{} {message}", "✓".green().bold());
}

pub fn print_info(message: impl Display) {
    eprintln!("{} {message}", "ℹ".blue().bold());
}
