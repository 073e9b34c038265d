//! Comma-decimal number formatting for the annotation table
//!
//! The table stores fractional numbers with `,` as the decimal separator
//! (`106,5` rather than `106.5`). Values are rounded to two decimal places on
//! write, which is the only precision the table is expected to carry.

/// Parse a number written with either `,` or `.` as the decimal separator.
///
/// Surrounding whitespace is ignored. Returns `None` for empty or
/// non-numeric input and for non-finite results.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: f64 = trimmed.replace(',', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

/// Round to two decimal places and format with `,` as the separator.
///
/// Integral values keep a single trailing zero (`10,0`), matching what the
/// export path has always produced.
pub fn format_decimal(value: f64) -> String {
    let mut rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        // collapses -0.0
        rounded = 0.0;
    }

    format!("{rounded:?}").replace('.', ",")
}
