// 🎯 Dimension Matching - resolve free text to a known category/company/sub-category
// Exact → containment → scored token overlap → None
//
// Tuned for short taxonomy labels ("פנסיה", "הראל", "מסלול כללי"),
// not general record linkage.

use crate::text::fold;
use serde::{Deserialize, Serialize};

/// Default minimum overlap score for the scored step.
///
/// Heuristic: half of the combined tokens must agree. The original scoring
/// weights were never pinned down, so this stays configurable.
pub const DEFAULT_MIN_OVERLAP: f64 = 0.5;

/// Similarity credited to a token pair that is related but not equal
/// (one contains the other, or a single-edit typo).
const PARTIAL_TOKEN_CREDIT: f64 = 0.75;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchConfig {
    /// Minimum Dice overlap (0.0 - 1.0) a candidate needs in the scored step
    pub min_overlap: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            min_overlap: DEFAULT_MIN_OVERLAP,
        }
    }
}

// ============================================================================
// MATCHERS
// ============================================================================

/// Match raw text against a candidate list.
///
/// 1. Exact match after folding
/// 2. First candidate that contains the raw text or is contained by it
/// 3. Highest token-overlap score at or above `min_overlap` (first wins ties)
/// 4. `None`
///
/// Total and pure: never panics, same inputs give the same output.
pub fn match_dimension(raw: &str, candidates: &[String], config: &MatchConfig) -> Option<String> {
    let needle = fold(raw);
    if needle.is_empty() {
        return None;
    }

    let folded: Vec<(usize, String)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, fold(c)))
        .filter(|(_, c)| !c.is_empty())
        .collect();

    if let Some((i, _)) = folded.iter().find(|(_, c)| *c == needle) {
        return Some(candidates[*i].clone());
    }

    if let Some((i, _)) = folded
        .iter()
        .find(|(_, c)| c.contains(&needle) || needle.contains(c.as_str()))
    {
        return Some(candidates[*i].clone());
    }

    best_scored(&needle, &folded)
        .filter(|(_, score)| *score >= config.min_overlap)
        .map(|(i, _)| candidates[i].clone())
}

/// Like [`match_dimension`], but never gives up while candidates exist.
///
/// Falls back to the highest-scoring candidate regardless of threshold, and to
/// the first non-blank candidate when every score is zero. Returns `None` only
/// when there is nothing to choose from.
pub fn closest_candidate(raw: &str, candidates: &[String], config: &MatchConfig) -> Option<String> {
    if let Some(found) = match_dimension(raw, candidates, config) {
        return Some(found);
    }

    let needle = fold(raw);
    let folded: Vec<(usize, String)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, fold(c)))
        .filter(|(_, c)| !c.is_empty())
        .collect();

    best_scored(&needle, &folded)
        .map(|(i, _)| i)
        .or_else(|| folded.first().map(|(i, _)| *i))
        .map(|i| candidates[i].clone())
}

/// Index and score of the best candidate; ties keep the earliest.
fn best_scored(needle: &str, folded: &[(usize, String)]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;

    for (i, candidate) in folded {
        let score = overlap_score(needle, candidate);
        if score <= 0.0 {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((*i, score)),
        }
    }

    best
}

// ============================================================================
// SCORING
// ============================================================================

/// Split on anything that is not a letter or digit.
fn tokens(s: &str) -> Vec<&str> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

fn token_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();

    if len_a >= 2 && len_b >= 2 && (a.contains(b) || b.contains(a)) {
        return PARTIAL_TOKEN_CREDIT;
    }

    if len_a >= 4 && len_b >= 4 && strsim::levenshtein(a, b) <= 1 {
        return PARTIAL_TOKEN_CREDIT;
    }

    0.0
}

/// Dice-style overlap of two folded strings in 0.0 - 1.0.
///
/// Each raw token is credited with its best similarity against the
/// candidate's tokens; the sum is scaled by the combined token count.
pub fn overlap_score(a: &str, b: &str) -> f64 {
    let tokens_a = tokens(a);
    let tokens_b = tokens(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let matched: f64 = tokens_a
        .iter()
        .map(|ta| {
            tokens_b
                .iter()
                .map(|tb| token_similarity(ta, tb))
                .fold(0.0, f64::max)
        })
        .sum();

    (2.0 * matched / (tokens_a.len() + tokens_b.len()) as f64).min(1.0)
}

// ============================================================================
// TESTS
// ============================================================================
