// 🧭 Taxonomy Resolver - raw (category, sub-category, company, number) → taxonomy entry
//
// Four tiers, first success wins:
//   1. Direct number     - any extracted number that is a known product number
//   2. Scoped number     - category + company resolved, number found in a scoped track name
//   3. Scoped fuzzy      - category + company resolved, closest scoped track name
//   4. Global fallback   - category or company unresolved, track matched over the whole taxonomy
//
// Taxonomy failures never abort an import: the failing tier is logged and skipped.

use crate::error::TaxonomyError;
use crate::identifiers::{collect_candidates, extract_numbers, IdentifierSources};
use crate::matching::{closest_candidate, match_dimension, MatchConfig};
use crate::reconcile::ProductHolding;
use crate::taxonomy::{Exposure, ExposureQuery, TaxonomyEntry, TaxonomySource};
use crate::text::is_blank;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ============================================================================
// REQUEST / RESULT TYPES
// ============================================================================

/// Raw text for one holding, as it came out of the sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolveRequest<'a> {
    pub category: &'a str,
    pub sub_category: &'a str,
    pub company: &'a str,
    pub product_number: Option<&'a str>,
}

impl<'a> ResolveRequest<'a> {
    /// Category is the product type, company the manufacturer. The track is
    /// the sub-category text; holdings without one fall back to the product name.
    pub fn from_holding(holding: &'a ProductHolding) -> Self {
        let sub_category = if is_blank(&holding.investment_track) {
            holding.product_name.as_str()
        } else {
            holding.investment_track.as_str()
        };

        ResolveRequest {
            category: &holding.product_type,
            sub_category,
            company: &holding.manufacturer,
            product_number: Some(holding.product_number.as_str()).filter(|n| !is_blank(n)),
        }
    }

    fn identifier_sources(&self) -> IdentifierSources<'a> {
        IdentifierSources {
            sub_category: self.sub_category,
            product_type: self.category,
            product_number: self.product_number,
            company: self.company,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionTier {
    DirectNumber,
    ScopedNumber,
    ScopedFuzzy,
    GlobalFallback,
    NoMatch,
}

/// Outcome of [`TaxonomyResolver::resolve`], one variant per tier.
///
/// `entry` is the exposure lookup for the resolved key, when it found one.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    DirectNumber {
        number: String,
        entry: TaxonomyEntry,
    },
    ScopedNumber {
        category: String,
        company: String,
        sub_category: String,
        number: String,
        entry: Option<TaxonomyEntry>,
    },
    ScopedFuzzy {
        category: String,
        company: String,
        sub_category: Option<String>,
        entry: Option<TaxonomyEntry>,
    },
    GlobalFallback {
        category: Option<String>,
        company: Option<String>,
        sub_category: Option<String>,
        entry: Option<TaxonomyEntry>,
    },
    NoMatch,
}

impl Resolution {
    pub fn tier(&self) -> ResolutionTier {
        match self {
            Resolution::DirectNumber { .. } => ResolutionTier::DirectNumber,
            Resolution::ScopedNumber { .. } => ResolutionTier::ScopedNumber,
            Resolution::ScopedFuzzy { .. } => ResolutionTier::ScopedFuzzy,
            Resolution::GlobalFallback { .. } => ResolutionTier::GlobalFallback,
            Resolution::NoMatch => ResolutionTier::NoMatch,
        }
    }

    /// Flatten into the nullable record the assembler consumes.
    pub fn into_match(self) -> ResolvedMatch {
        let tier = self.tier();
        match self {
            Resolution::DirectNumber { number, entry } => ResolvedMatch {
                category: Some(entry.category),
                sub_category: Some(entry.track_name),
                company: Some(entry.company),
                product_number: Some(number),
                exposure: Some(entry.exposure),
                asset_composition: entry.asset_composition,
                tier,
            },
            Resolution::ScopedNumber {
                category,
                company,
                sub_category,
                number,
                entry,
            } => ResolvedMatch::from_parts(Some(category), Some(company), Some(sub_category), Some(number), entry, tier),
            Resolution::ScopedFuzzy {
                category,
                company,
                sub_category,
                entry,
            } => ResolvedMatch::from_parts(Some(category), Some(company), sub_category, None, entry, tier),
            Resolution::GlobalFallback {
                category,
                company,
                sub_category,
                entry,
            } => ResolvedMatch::from_parts(category, company, sub_category, None, entry, tier),
            Resolution::NoMatch => ResolvedMatch::default(),
        }
    }
}

/// Resolver output; any field may be null and callers fall back to raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMatch {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub company: Option<String>,
    pub product_number: Option<String>,
    pub exposure: Option<Exposure>,
    pub asset_composition: Option<String>,
    pub tier: ResolutionTier,
}

impl Default for ResolvedMatch {
    fn default() -> Self {
        ResolvedMatch {
            category: None,
            sub_category: None,
            company: None,
            product_number: None,
            exposure: None,
            asset_composition: None,
            tier: ResolutionTier::NoMatch,
        }
    }
}

impl ResolvedMatch {
    fn from_parts(
        category: Option<String>,
        company: Option<String>,
        sub_category: Option<String>,
        number: Option<String>,
        entry: Option<TaxonomyEntry>,
        tier: ResolutionTier,
    ) -> Self {
        let (entry_number, exposure, asset_composition) = match entry {
            Some(e) => (Some(e.product_number), Some(e.exposure), e.asset_composition),
            None => (None, None, None),
        };

        ResolvedMatch {
            category,
            sub_category,
            company,
            product_number: number.or(entry_number),
            exposure,
            asset_composition,
            tier,
        }
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Log a failed taxonomy call and turn it into "nothing found".
fn tier_failed<T>(tier: &str, result: Result<T, TaxonomyError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("⚠️  Taxonomy lookup failed during {} tier: {}", tier, e);
            None
        }
    }
}

/// Runs the tiers against a read-only taxonomy source.
pub struct TaxonomyResolver<'a> {
    source: &'a dyn TaxonomySource,
    matching: &'a MatchConfig,
}

impl<'a> TaxonomyResolver<'a> {
    pub fn new(source: &'a dyn TaxonomySource, matching: &'a MatchConfig) -> Self {
        TaxonomyResolver { source, matching }
    }

    pub fn resolve(&self, request: &ResolveRequest<'_>) -> Resolution {
        let candidates = collect_candidates(&request.identifier_sources());

        if let Some(resolution) = self.direct_number(&candidates) {
            return resolution;
        }

        let category = self.resolve_dimension("scope", request.category, |s| s.get_all_categories());
        let company = self.resolve_dimension("scope", request.company, |s| s.get_all_companies());

        if let (Some(category), Some(company)) = (&category, &company) {
            let scoped = tier_failed(
                "scoped",
                self.source
                    .get_sub_categories_for_category_and_company(category, company),
            );

            if let Some(scoped) = scoped {
                if let Some(resolution) = self.scoped_number(&candidates, category, company, &scoped) {
                    return resolution;
                }
                return self.scoped_fuzzy(request, category, company, &scoped);
            }
        }

        self.global_fallback(request, category, company)
    }

    /// Tier 1: product number alone, regardless of any text.
    fn direct_number(&self, candidates: &[String]) -> Option<Resolution> {
        for number in candidates {
            let found = tier_failed(
                "direct-number",
                self.source.get_exposure_data(&ExposureQuery::by_number(number)),
            )?;

            if let Some(entry) = found {
                debug!("Tier 1 hit on product number {}", number);
                return Some(Resolution::DirectNumber {
                    number: number.clone(),
                    entry,
                });
            }
        }
        None
    }

    /// Tier 2: a candidate number appears inside a scoped track name.
    ///
    /// A track carrying the number on its own beats one where it is only part
    /// of a longer digit run.
    fn scoped_number(
        &self,
        candidates: &[String],
        category: &str,
        company: &str,
        scoped: &[String],
    ) -> Option<Resolution> {
        for number in candidates {
            let hit = scoped
                .iter()
                .find(|track| extract_numbers(track).iter().any(|n| n == number))
                .or_else(|| scoped.iter().find(|track| track.contains(number.as_str())));

            if let Some(track) = hit {
                debug!("Tier 2 hit: {} found in '{}'", number, track);
                let entry = self.exposure(ExposureQuery {
                    company: Some(company),
                    category: Some(category),
                    sub_category: Some(track.as_str()),
                    product_number: Some(number.as_str()),
                });
                return Some(Resolution::ScopedNumber {
                    category: category.to_string(),
                    company: company.to_string(),
                    sub_category: track.clone(),
                    number: number.clone(),
                    entry,
                });
            }
        }
        None
    }

    /// Tier 3: closest scoped track name; never null while the scope has tracks.
    fn scoped_fuzzy(
        &self,
        request: &ResolveRequest<'_>,
        category: &str,
        company: &str,
        scoped: &[String],
    ) -> Resolution {
        let sub_category = closest_candidate(request.sub_category, scoped, self.matching);

        let entry = sub_category.as_deref().and_then(|track| {
            self.exposure(ExposureQuery {
                company: Some(company),
                category: Some(category),
                sub_category: Some(track),
                product_number: request.product_number,
            })
        });

        Resolution::ScopedFuzzy {
            category: category.to_string(),
            company: company.to_string(),
            sub_category,
            entry,
        }
    }

    /// Tier 4: track name against the whole taxonomy.
    ///
    /// When the track maps to an entry, that entry supplies category and
    /// company too, so the result never mixes dimensions of two entries.
    /// Text-resolved dimensions survive only when no entry was found.
    fn global_fallback(
        &self,
        request: &ResolveRequest<'_>,
        category: Option<String>,
        company: Option<String>,
    ) -> Resolution {
        let sub_category = self.resolve_dimension("global-fallback", request.sub_category, |s| {
            s.get_all_sub_categories()
        });

        let entry = sub_category.as_deref().and_then(|track| {
            self.exposure(ExposureQuery {
                company: company.as_deref(),
                category: category.as_deref(),
                sub_category: Some(track),
                product_number: request.product_number,
            })
        });

        let (category, company) = match &entry {
            Some(e) => {
                if category.as_deref().is_some_and(|c| c != e.category)
                    || company.as_deref().is_some_and(|c| c != e.company)
                {
                    debug!("Tier 4 track '{}' belongs to {}/{}", e.track_name, e.category, e.company);
                }
                (Some(e.category.clone()), Some(e.company.clone()))
            }
            None => (category, company),
        };

        if category.is_none() && company.is_none() && sub_category.is_none() {
            return Resolution::NoMatch;
        }

        Resolution::GlobalFallback {
            category,
            company,
            sub_category,
            entry,
        }
    }

    fn resolve_dimension<F>(&self, tier: &str, raw: &str, list: F) -> Option<String>
    where
        F: FnOnce(&dyn TaxonomySource) -> Result<Vec<String>, TaxonomyError>,
    {
        if is_blank(raw) {
            return None;
        }
        let candidates = tier_failed(tier, list(self.source))?;
        match_dimension(raw, &candidates, self.matching)
    }

    fn exposure(&self, query: ExposureQuery<'_>) -> Option<TaxonomyEntry> {
        tier_failed("exposure", self.source.get_exposure_data(&query)).flatten()
    }
}

// ============================================================================
// TESTS
// ============================================================================
