//! Turns recognized text into a price.

use crate::error::ReadingError;

/// Parses the first recognized fragment as a non-negative integer.
///
/// Surrounding whitespace is trimmed and thousands separators (`,`) are
/// removed. Anything else that is not an ASCII digit (signs, decimal points,
/// currency symbols, inner spaces) makes the fragment `NotNumeric`. Later
/// fragments are never consulted.
pub fn parse_reading<S: AsRef<str>>(fragments: &[S]) -> Result<u64, ReadingError> {
    let raw = fragments
        .first()
        .map(AsRef::as_ref)
        .ok_or(ReadingError::NoTextDetected)?;

    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(ReadingError::NotNumeric(raw.to_string()));
    }

    // All digits, so the only possible failure is overflow.
    cleaned
        .parse::<u64>()
        .map_err(|_| ReadingError::NotNumeric(raw.to_string()))
}
