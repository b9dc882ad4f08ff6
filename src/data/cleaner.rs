//! Cell-level coercion of the source's free-text numbers.
//!
//! Count columns in the published tables use `.` as a thousands separator
//! and `-` or `...` for "no data", so counts are read by keeping only the
//! decimal digits. Years are parsed strictly.

/// Parse a count cell by discarding every non-digit character.
///
/// A cell with no digits at all (`""`, `"-"`, `"..."`) is zero. Counts are
/// non-negative, so a leading `-` is dropped like any other punctuation.
/// Values beyond `u64::MAX` saturate.
pub fn clean_count(cell: &str) -> u64 {
    cell.chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0u64, |acc, d| {
            acc.saturating_mul(10).saturating_add(u64::from(d))
        })
}

/// Parse a year cell. Returns `None` for blank or non-integer input.
///
/// Integral float renderings such as `"2022.0"` are accepted, since
/// spreadsheet and float-typed columns produce them.
pub fn parse_year(cell: &str) -> Option<i32> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    if let Ok(y) = cell.parse::<i32>() {
        return Some(y);
    }
    let f = cell.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX) {
        Some(f as i32)
    } else {
        None
    }
}

/// Trim a region cell; blank means missing.
pub fn clean_region(cell: &str) -> Option<String> {
    let cell = cell.trim();
    (!cell.is_empty()).then(|| cell.to_string())
}
