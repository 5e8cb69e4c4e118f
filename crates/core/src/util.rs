use std::path::{Path, PathBuf};

/// Join two paths, only including the normal components.
pub fn join_normalized(base: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let mut out = base.as_ref().to_path_buf();
    out.extend(path.as_ref().components().filter(|v| matches!(v, std::path::Component::Normal(_))));
    out
}

/// Format a second count as `MM:SS`.
/// Hours are dropped: 3661 formats as `01:01`.
pub fn format_seconds(seconds: u64) -> String {
    let minutes = (seconds % 3600) / 60;
    let remaining = seconds % 60;
    format!("{:02}:{:02}", minutes, remaining)
}

/// Round fractional seconds to a whole count, clamping negatives to zero.
pub fn whole_seconds(value: f64) -> u64 { value.round().max(0.0) as u64 }

/// Truncate `text` to `threshold` characters followed by `...`.
pub fn trim_text(text: &str, threshold: usize) -> String {
    match text.char_indices().nth(threshold) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
