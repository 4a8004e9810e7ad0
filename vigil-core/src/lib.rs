pub mod config;
pub mod report;

use colored::Colorize;

pub fn print_banner() {
    println!("{}", "═".repeat(60).bright_blue().bold());
    println!(
        "{}  {}",
        "  VIGIL".bright_white().bold(),
        format!("v{} - unwanted-term site auditor", env!("CARGO_PKG_VERSION")).bright_cyan()
    );
    println!("{}", "═".repeat(60).bright_blue().bold());
}
