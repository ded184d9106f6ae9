//! End-of-run report.

use comfy_table::{Table, presets};
use ctgen::RunSummary;

/// One row per image: name, result, wall time.
pub fn render_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_header(vec!["IMAGE", "RESULT", "DURATION"]);

    for result in &summary.results {
        let icon = if result.outcome.is_success() {
            "✅"
        } else {
            "❌"
        };
        table.add_row(vec![
            result.image.clone(),
            format!("{} {}", icon, result.outcome),
            format!("{:.1}s", result.duration_ms as f64 / 1000.0),
        ]);
    }

    table
}

pub fn final_message(summary: &RunSummary) -> String {
    let failed = summary.failed_images();
    if failed.is_empty() {
        return "\nAll steps completed successfully!\n".to_string();
    }

    let mut message = String::from("\nThe following images failed:\n");
    for name in failed {
        message.push_str(&format!("- {}\n", name));
    }
    message
}
