//! Converts the table's abbreviated dates ("11-Apr-23") to ISO-8601.

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Normalize a `DD-Mon-YY` token to `YYYY-MM-DD`, resolving the two-digit
/// year against the year of the term being parsed: terms up to 1999 map to
/// 19xx, everything later to 20xx. The source system only goes back to
/// 1999, so this narrow rule holds for the whole archive (and will need
/// revisiting in 2100).
///
/// Tokens that do not match the expected shape are passed through
/// unchanged; some terms contain already-formatted or malformed cells.
pub fn format_date(raw: &str, term_year: i32) -> String {
    let parts: Vec<&str> = raw.split('-').collect();
    if raw.len() != 9 || parts.len() != 3 || parts[1].chars().all(|c| c.is_ascii_digit()) {
        return raw.to_string();
    }

    let month = match MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(parts[1]))
    {
        Some(idx) => idx + 1,
        None => return raw.to_string(),
    };

    let century = if term_year <= 1999 { "19" } else { "20" };
    format!("{}{}-{:02}-{}", century, parts[2], month, parts[0])
}
