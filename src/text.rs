// 🔤 Text Normalizer - one canonical form for every string we compare
// Spreadsheet exports carry RTL marks, non-breaking spaces and ragged spacing

// ============================================================================
// BIDI CONTROL MARKS
// ============================================================================

/// Returns true for invisible directional formatting characters.
///
/// Covers LRM/RLM, the Arabic letter mark, the embedding/override block
/// (U+202A..U+202E), the isolate block (U+2066..U+2069) and the BOM.
fn is_bidi_mark(c: char) -> bool {
    matches!(
        c,
        '\u{200E}' | '\u{200F}' | '\u{061C}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{FEFF}'
    )
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Normalize a cell or free-text value.
///
/// - Removes bidirectional control marks
/// - Collapses every run of whitespace (including NBSP) into one space
/// - Trims both ends
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
///
/// # Examples:
/// ```
/// use portfolio_import::text::normalize;
/// assert_eq!(normalize("\u{200F}  הראל \u{00A0} פנסיה "), "הראל פנסיה");
/// ```
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    for c in s.chars().filter(|c| !is_bidi_mark(*c)) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    out
}

/// Normalize an optional value; `None` yields the empty string.
pub fn normalize_opt(s: Option<&str>) -> String {
    s.map(normalize).unwrap_or_default()
}

/// Comparison key: normalized and lowercased.
///
/// Hebrew has no case, but company names in exports are often Latin
/// ("IBI", "Altshuler Shaham") and arrive in mixed case.
pub fn fold(s: &str) -> String {
    normalize(s).to_lowercase()
}

/// True when the value normalizes to nothing.
pub fn is_blank(s: &str) -> bool {
    normalize(s).is_empty()
}

// ============================================================================
// TESTS
// ============================================================================
