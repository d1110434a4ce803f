// src/utils/log.rs

//! Step banners and summaries for the running log.
//!
//! Everything goes through the `log` facade, so the installed logger decides
//! formatting and filtering.

/// Log a step in a process.
pub fn step(step_num: usize, total: usize, message: &str) {
    ::log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a separator line.
pub fn separator() {
    ::log::info!("{}", "─".repeat(60));
}

/// Log a header.
pub fn header(title: &str) {
    let border = "═".repeat(60);
    ::log::info!("{}", border);
    ::log::info!("  {}", title);
    ::log::info!("{}", border);
}

/// Log a sub-item (indented).
pub fn sub_item(message: &str) {
    ::log::info!("    {}", message);
}

/// Log a summary section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    ::log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        ::log::info!("    {}: {}", key, value);
    }
}
