//! Short text forms used for conversation previews.

use crate::constants::PREVIEW_MAX_CHARS;

/// Human-readable file size, e.g. `0 Bytes`, `512 Bytes`, `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Collapse whitespace and cut `text` to the preview length, appending an
/// ellipsis when something was dropped.
pub fn truncate_preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= PREVIEW_MAX_CHARS {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(PREVIEW_MAX_CHARS - 1).collect();
    cut.push('…');
    cut
}
