// 🔢 Identifier Extractor - fund/product numbers buried in free text
//
// Fund numbers are conventionally written in parentheses ("כללי (2142)"),
// so those come first. Bare digit runs follow, longest first.

use crate::text::normalize;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*(\d+)\s*\)").expect("valid parenthesized-number regex"));
static RE_DIGIT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\b").expect("valid digit-run regex"));

fn push_unique(out: &mut Vec<String>, value: &str) {
    if !out.iter().any(|v| v == value) {
        out.push(value.to_string());
    }
}

/// Candidate numbers in one text field, highest confidence first.
///
/// # Examples:
/// ```
/// use portfolio_import::identifiers::extract_numbers;
/// assert_eq!(extract_numbers("מסלול מניות (555) עם 2024 שנים"), vec!["555", "2024"]);
/// assert_eq!(extract_numbers("קרן 12 מסלול 98765"), vec!["98765", "12"]);
/// ```
pub fn extract_numbers(text: &str) -> Vec<String> {
    let text = normalize(text);
    let mut out = Vec::new();

    for cap in RE_PARENTHESIZED.captures_iter(&text) {
        if let Some(m) = cap.get(1) {
            push_unique(&mut out, m.as_str());
        }
    }

    let mut bare: Vec<&str> = RE_DIGIT_RUN.find_iter(&text).map(|m| m.as_str()).collect();
    // Stable sort keeps text order among equal lengths
    bare.sort_by(|a, b| b.len().cmp(&a.len()));
    for number in bare {
        push_unique(&mut out, number);
    }

    out
}

/// Text fields of one holding, in the order they are searched for numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierSources<'a> {
    pub sub_category: &'a str,
    pub product_type: &'a str,
    pub product_number: Option<&'a str>,
    pub company: &'a str,
}

/// Ordered, de-duplicated candidate list across a holding's fields.
///
/// Field order: sub-category/track, product type, explicit product number,
/// company. Within a field the order of [`extract_numbers`] applies.
pub fn collect_candidates(sources: &IdentifierSources<'_>) -> Vec<String> {
    let fields = [
        Some(sources.sub_category),
        Some(sources.product_type),
        sources.product_number,
        Some(sources.company),
    ];

    let mut out = Vec::new();
    for field in fields.into_iter().flatten() {
        for number in extract_numbers(field) {
            push_unique(&mut out, &number);
        }
    }

    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parenthesized_before_bare() {
        assert_eq!(extract_numbers("מסלול מניות (555) עם 2024 שנים"), vec!["555", "2024"]);
    }

    #[test]
    fn test_parenthesized_only() {
        assert_eq!(extract_numbers("כללי (123456)"), vec!["123456"]);
        assert_eq!(extract_numbers("(90210)"), vec!["90210"]);
        assert_eq!(extract_numbers("מסלול ( 777 )"), vec!["777"]);
    }

    #[test]
    fn test_multiple_parenthesized_keep_text_order() {
        assert_eq!(extract_numbers("(12) ו-(345678)"), vec!["12", "345678"]);
    }

    #[test]
    fn test_bare_runs_longest_first() {
        assert_eq!(extract_numbers("קרן 12 מסלול 98765 שנת 2024"), vec!["98765", "2024", "12"]);
    }

    #[test]
    fn test_no_numbers() {
        assert!(extract_numbers("מסלול כללי").is_empty());
        assert!(extract_numbers("").is_empty());
    }

    #[test]
    fn test_digits_glued_to_letters_are_not_standalone() {
        assert!(extract_numbers("IBI2024").is_empty());
        assert_eq!(extract_numbers("מסלול-2142"), vec!["2142"]);
    }

    #[test]
    fn test_collect_candidates_field_order_and_dedup() {
        let sources = IdentifierSources {
            sub_category: "מסלול מניות (555)",
            product_type: "פנסיה 2024",
            product_number: Some("555"),
            company: "הראל 1",
        };

        assert_eq!(collect_candidates(&sources), vec!["555", "2024", "1"]);
    }

    #[test]
    fn test_collect_candidates_without_product_number() {
        let sources = IdentifierSources {
            sub_category: "",
            product_type: "גמל",
            product_number: None,
            company: "מגדל (12)",
        };

        assert_eq!(collect_candidates(&sources), vec!["12"]);
    }
}
