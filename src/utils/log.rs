// src/utils/log.rs

//! Log formatting helpers layered over the `log` facade.
//!
//! Sections and summaries keep the server-style framing of run output while
//! leaving level filtering and timestamps to the installed logger.

/// Log a framed header line.
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a step in a process.
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a success message.
pub fn success(message: &str) {
    log::info!("[OK] {}", message);
}

/// Log a summary section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for line in summary_lines(items) {
        log::info!("{}", line);
    }
}

/// Format summary items as aligned `key: value` lines.
fn summary_lines(items: &[(&str, String)]) -> Vec<String> {
    let width = items.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    items
        .iter()
        .map(|(key, value)| format!("    {:<width$} : {}", key, value, width = width))
        .collect()
}
