//! Terminal output helpers

use fms_sync::model::{SyncChange, SyncLog, SyncSummary};

fn use_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a success message (green checkmark)
pub fn print_success(message: &str) {
    if use_color() {
        println!("\x1b[32m✓\x1b[0m {message}");
    } else {
        println!("OK: {message}");
    }
}

/// Print a warning message (yellow)
pub fn print_warning(message: &str) {
    if use_color() {
        eprintln!("\x1b[33mWarning:\x1b[0m {message}");
    } else {
        eprintln!("Warning: {message}");
    }
}

/// Print a key-value pair with consistent formatting
pub fn print_key_value(key: &str, value: &str) {
    if use_color() {
        println!("  \x1b[1m{key}:\x1b[0m {value}");
    } else {
        println!("  {key}: {value}");
    }
}

/// Truncate a string for table display, handling Unicode safely.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

pub fn print_summary(summary: &SyncSummary) {
    print_key_value(
        "Tenants",
        &format!(
            "+{} -{} ~{}",
            summary.tenants_added, summary.tenants_removed, summary.tenants_updated
        ),
    );
    print_key_value(
        "Units",
        &format!(
            "+{} -{} ~{}",
            summary.units_added, summary.units_removed, summary.units_updated
        ),
    );
    for warning in &summary.warnings {
        print_warning(warning);
    }
    for error in &summary.errors {
        print_warning(error);
    }
}

pub fn print_changes(changes: &[SyncChange]) {
    if changes.is_empty() {
        println!("  No changes.");
        return;
    }
    println!(
        "  {:<4} {:<16} {:<20} {:<10} {:<12} {}",
        "#", "TYPE", "KEY", "REVIEW", "APPLY", "IMPACT"
    );
    for change in changes {
        let review = match (change.requires_review, change.decision) {
            (_, Some(decision)) => decision.as_str().to_string(),
            (true, None) => "pending".to_string(),
            (false, None) => "auto".to_string(),
        };
        println!(
            "  {:<4} {:<16} {:<20} {:<10} {:<12} {}",
            change.position,
            change.change_type.as_str(),
            truncate(&change.entity_key, 20),
            review,
            change.apply_status.as_str(),
            truncate(&change.impact_summary, 60)
        );
    }
}

pub fn print_logs(logs: &[SyncLog], total: i64) {
    println!(
        "  {:<36} {:<14} {:<20} {:>5} {:>5} {:>5} {:>5}",
        "SYNC LOG", "STATUS", "STARTED", "DET", "APP", "PEND", "REJ"
    );
    for log in logs {
        println!(
            "  {:<36} {:<14} {:<20} {:>5} {:>5} {:>5} {:>5}",
            log.id,
            log.status.as_str(),
            log.started_at.format("%Y-%m-%d %H:%M:%S"),
            log.changes_detected,
            log.changes_applied,
            log.changes_pending,
            log.changes_rejected
        );
    }
    println!("\n  Showing {} of {total} syncs", logs.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer key", 10), "a much ...");
        assert_eq!(truncate("ünïcödé-ünïcödé", 8), "ünïcö...");
    }
}
