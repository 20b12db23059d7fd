//! Shared utility functions.

/// Truncate a string to approximately `max_bytes` without splitting a UTF-8
/// character boundary.
///
/// Returns a sub-slice of the original string. If the string is shorter than
/// `max_bytes`, the entire string is returned unchanged. Used to keep raw
/// server error bodies and frame dumps readable in logs.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Scale a 0–100 progress report into a 0–1 ratio.
///
/// Out-of-range or non-finite inputs are clamped so the result is always a
/// valid confidence value.
pub fn progress_to_ratio(progress: f64) -> f64 {
    if !progress.is_finite() {
        return 0.0;
    }
    (progress / 100.0).clamp(0.0, 1.0)
}
