// 🗂️ Taxonomy - controlled vocabulary: category → company → sub-category/track
// plus asset-exposure percentages per entry
//
// The importer only reads the taxonomy. `TaxonomySource` is the seam; the
// in-memory registry and the SQLite snapshot both implement it.

pub mod sqlite;

use crate::error::{ImportError, TaxonomyError};
use crate::text::{fold, normalize};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// ENTRY
// ============================================================================

/// Asset-class exposure in percent. Any field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Exposure {
    pub stocks: Option<f64>,
    pub bonds: Option<f64>,
    pub foreign_currency: Option<f64>,
    pub foreign_investments: Option<f64>,
    pub israel: Option<f64>,
    pub illiquid_assets: Option<f64>,
}

impl Exposure {
    /// All six fields in a fixed order (stocks … illiquid assets).
    pub fn fields(&self) -> [Option<f64>; 6] {
        [
            self.stocks,
            self.bonds,
            self.foreign_currency,
            self.foreign_investments,
            self.israel,
            self.illiquid_assets,
        ]
    }

    pub fn from_fields(fields: [Option<f64>; 6]) -> Self {
        let [stocks, bonds, foreign_currency, foreign_investments, israel, illiquid_assets] = fields;
        Exposure {
            stocks,
            bonds,
            foreign_currency,
            foreign_investments,
            israel,
            illiquid_assets,
        }
    }

    pub fn has_any(&self) -> bool {
        self.fields().iter().any(Option::is_some)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyEntry {
    pub product_number: String,
    pub category: String,
    pub company: String,
    pub track_name: String,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub asset_composition: Option<String>,
}

/// Best-effort lookup key; any part may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExposureQuery<'a> {
    pub company: Option<&'a str>,
    pub category: Option<&'a str>,
    pub sub_category: Option<&'a str>,
    pub product_number: Option<&'a str>,
}

impl<'a> ExposureQuery<'a> {
    pub fn by_number(product_number: &'a str) -> Self {
        ExposureQuery {
            product_number: Some(product_number),
            ..Default::default()
        }
    }

    /// Parts that are present and non-blank.
    fn present(value: Option<&'a str>) -> Option<&'a str> {
        value.filter(|v| !crate::text::is_blank(v))
    }

    pub fn company(&self) -> Option<&'a str> {
        Self::present(self.company)
    }

    pub fn category(&self) -> Option<&'a str> {
        Self::present(self.category)
    }

    pub fn sub_category(&self) -> Option<&'a str> {
        Self::present(self.sub_category)
    }

    pub fn product_number(&self) -> Option<&'a str> {
        Self::present(self.product_number)
    }

    pub fn is_empty(&self) -> bool {
        self.company().is_none()
            && self.category().is_none()
            && self.sub_category().is_none()
            && self.product_number().is_none()
    }
}

// ============================================================================
// SOURCE TRAIT
// ============================================================================

/// Read-only taxonomy collaborator.
///
/// Lists are returned in a stable order; the fuzzy matchers break ties by
/// position, so a source that reorders between calls makes resolution
/// non-deterministic.
pub trait TaxonomySource: Send + Sync {
    fn get_all_categories(&self) -> Result<Vec<String>, TaxonomyError>;

    fn get_all_companies(&self) -> Result<Vec<String>, TaxonomyError>;

    fn get_sub_categories_for_category_and_company(
        &self,
        category: &str,
        company: &str,
    ) -> Result<Vec<String>, TaxonomyError>;

    fn get_all_sub_categories(&self) -> Result<Vec<String>, TaxonomyError>;

    /// Best-effort entry lookup from whatever part of the key is known.
    fn get_exposure_data(&self, query: &ExposureQuery<'_>) -> Result<Option<TaxonomyEntry>, TaxonomyError>;
}

// ============================================================================
// IN-MEMORY REGISTRY
// ============================================================================

/// Distinct values in first-seen order (folded comparison).
fn distinct<'a, I>(values: I) -> Vec<String>
where
    I: Iterator<Item = &'a String>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let key = fold(value);
        if key.is_empty() {
            continue;
        }
        if seen.insert(key) {
            out.push(value.clone());
        }
    }
    out
}

/// In-memory taxonomy snapshot.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyRegistry {
    entries: Vec<TaxonomyEntry>,
}

impl TaxonomyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<TaxonomyEntry>) -> Self {
        TaxonomyRegistry { entries }
    }

    /// Load a JSON array of entries.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ImportError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ImportError> {
        let entries: Vec<TaxonomyEntry> = serde_json::from_str(content)?;
        Ok(Self::from_entries(entries))
    }

    pub fn register(&mut self, entry: TaxonomyEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find_by_number(&self, product_number: &str) -> Option<&TaxonomyEntry> {
        let wanted = normalize(product_number);
        self.entries
            .iter()
            .find(|e| normalize(&e.product_number) == wanted)
    }

    fn find_by_keys(&self, query: &ExposureQuery<'_>) -> Option<&TaxonomyEntry> {
        let company = query.company().map(fold);
        let category = query.category().map(fold);
        let sub_category = query.sub_category().map(fold);

        if company.is_none() && category.is_none() && sub_category.is_none() {
            return None;
        }

        let matches = |wanted: &Option<String>, actual: &str| {
            wanted.as_ref().map_or(true, |w| *w == fold(actual))
        };

        self.entries.iter().find(|e| {
            matches(&company, &e.company)
                && matches(&category, &e.category)
                && matches(&sub_category, &e.track_name)
        })
    }
}

impl TaxonomySource for TaxonomyRegistry {
    fn get_all_categories(&self) -> Result<Vec<String>, TaxonomyError> {
        Ok(distinct(self.entries.iter().map(|e| &e.category)))
    }

    fn get_all_companies(&self) -> Result<Vec<String>, TaxonomyError> {
        Ok(distinct(self.entries.iter().map(|e| &e.company)))
    }

    fn get_sub_categories_for_category_and_company(
        &self,
        category: &str,
        company: &str,
    ) -> Result<Vec<String>, TaxonomyError> {
        let category = fold(category);
        let company = fold(company);
        Ok(distinct(
            self.entries
                .iter()
                .filter(|e| fold(&e.category) == category && fold(&e.company) == company)
                .map(|e| &e.track_name),
        ))
    }

    fn get_all_sub_categories(&self) -> Result<Vec<String>, TaxonomyError> {
        Ok(distinct(self.entries.iter().map(|e| &e.track_name)))
    }

    fn get_exposure_data(&self, query: &ExposureQuery<'_>) -> Result<Option<TaxonomyEntry>, TaxonomyError> {
        if let Some(number) = query.product_number() {
            if let Some(entry) = self.find_by_number(number) {
                return Ok(Some(entry.clone()));
            }
        }

        if let Some(entry) = self.find_by_keys(query) {
            return Ok(Some(entry.clone()));
        }

        // Partial keys: the track name alone is usually specific enough
        if let Some(sub_category) = query.sub_category() {
            let relaxed = ExposureQuery {
                sub_category: Some(sub_category),
                ..Default::default()
            };
            return Ok(self.find_by_keys(&relaxed).cloned());
        }

        Ok(None)
    }
}

// ============================================================================
// OPENING A SNAPSHOT
// ============================================================================

/// Open a taxonomy snapshot by extension: `.json` registry or SQLite database.
pub fn open_taxonomy(path: &Path) -> Result<Arc<dyn TaxonomySource>, ImportError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "json" => Ok(Arc::new(TaxonomyRegistry::from_file(path)?)),
        "db" | "sqlite" | "sqlite3" => {
            if !path.exists() {
                return Err(TaxonomyError::Unavailable(format!("{} does not exist", path.display())).into());
            }
            Ok(Arc::new(sqlite::SqliteTaxonomy::open(path)?))
        }
        _ => Err(ImportError::UnsupportedFormat(format!(
            "taxonomy snapshot must be .json or .db, got {}",
            path.display()
        ))),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn entry(number: &str, category: &str, company: &str, track: &str, stocks: Option<f64>) -> TaxonomyEntry {
        TaxonomyEntry {
            product_number: number.to_string(),
            category: category.to_string(),
            company: company.to_string(),
            track_name: track.to_string(),
            exposure: Exposure {
                stocks,
                bonds: stocks.map(|s| 100.0 - s),
                ..Exposure::default()
            },
            asset_composition: None,
        }
    }

    pub(crate) fn sample_registry() -> TaxonomyRegistry {
        TaxonomyRegistry::from_entries(vec![
            entry("2142", "קרן פנסיה", "הראל", "הראל פנסיה - מסלול כללי", Some(45.0)),
            entry("2143", "קרן פנסיה", "הראל", "הראל פנסיה - מסלול מניות", Some(95.0)),
            entry("7708", "קרן פנסיה", "מגדל", "מגדל מקפת - מסלול כללי", Some(42.0)),
            entry("90210", "קופת גמל", "מגדל", "מגדל גמל - מסלול אגח (90210)", Some(10.0)),
            entry("5150", "קרן השתלמות", "אלטשולר שחם", "אלטשולר השתלמות - מסלול מניות", None),
        ])
    }

    #[test]
    fn test_distinct_lists_in_first_seen_order() {
        let registry = sample_registry();

        assert_eq!(
            registry.get_all_categories().unwrap(),
            vec!["קרן פנסיה", "קופת גמל", "קרן השתלמות"]
        );
        assert_eq!(registry.get_all_companies().unwrap(), vec!["הראל", "מגדל", "אלטשולר שחם"]);
        assert_eq!(registry.get_all_sub_categories().unwrap().len(), 5);
    }

    #[test]
    fn test_scoped_sub_categories() {
        let registry = sample_registry();
        let subs = registry
            .get_sub_categories_for_category_and_company("קרן פנסיה", "הראל")
            .unwrap();

        assert_eq!(subs, vec!["הראל פנסיה - מסלול כללי", "הראל פנסיה - מסלול מניות"]);
        assert!(registry
            .get_sub_categories_for_category_and_company("קרן פנסיה", "כלל")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_exposure_by_number_ignores_other_keys() {
        let registry = sample_registry();
        let query = ExposureQuery {
            company: Some("הראל"),
            product_number: Some(" 90210 "),
            ..Default::default()
        };

        let found = registry.get_exposure_data(&query).unwrap().unwrap();
        assert_eq!(found.company, "מגדל");
        assert_eq!(found.exposure.stocks, Some(10.0));
    }

    #[test]
    fn test_exposure_by_full_key() {
        let registry = sample_registry();
        let query = ExposureQuery {
            company: Some("הראל"),
            category: Some("קרן פנסיה"),
            sub_category: Some("הראל פנסיה - מסלול מניות"),
            product_number: None,
        };

        let found = registry.get_exposure_data(&query).unwrap().unwrap();
        assert_eq!(found.product_number, "2143");
    }

    #[test]
    fn test_exposure_relaxes_to_sub_category() {
        let registry = sample_registry();
        let query = ExposureQuery {
            company: Some("חברה אחרת"),
            sub_category: Some("מגדל מקפת - מסלול כללי"),
            ..Default::default()
        };

        let found = registry.get_exposure_data(&query).unwrap().unwrap();
        assert_eq!(found.product_number, "7708");
    }

    #[test]
    fn test_exposure_unknown_number_and_empty_query() {
        let registry = sample_registry();
        assert!(registry.get_exposure_data(&ExposureQuery::by_number("1")).unwrap().is_none());
        assert!(registry.get_exposure_data(&ExposureQuery::default()).unwrap().is_none());
    }

    #[test]
    fn test_exposure_has_any() {
        assert!(!Exposure::default().has_any());
        assert!(Exposure { israel: Some(0.0), ..Default::default() }.has_any());
    }

    #[test]
    fn test_registry_from_json() {
        let json = r#"[
            {"productNumber": "2142", "category": "קרן פנסיה", "company": "הראל",
             "trackName": "מסלול כללי", "exposure": {"stocks": 45.5, "israel": 60}},
            {"productNumber": "1", "category": "גמל", "company": "מגדל", "trackName": "כללי"}
        ]"#;

        let registry = TaxonomyRegistry::from_json(json).unwrap();
        assert_eq!(registry.len(), 2);
        let first = registry.find_by_number("2142").unwrap();
        assert_eq!(first.exposure.stocks, Some(45.5));
        assert_eq!(first.exposure.israel, Some(60.0));
        assert_eq!(first.exposure.bonds, None);
        assert!(!registry.find_by_number("1").unwrap().exposure.has_any());
    }

    #[test]
    fn test_open_taxonomy_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("taxonomy.json");
        let json = serde_json::to_string(sample_registry().entries()).unwrap();
        fs::write(&json_path, json).unwrap();
        let source = open_taxonomy(&json_path).unwrap();
        assert_eq!(source.get_all_companies().unwrap().len(), 3);

        let missing_db = dir.path().join("missing.db");
        assert!(matches!(
            open_taxonomy(&missing_db),
            Err(ImportError::Taxonomy(TaxonomyError::Unavailable(_)))
        ));

        assert!(matches!(
            open_taxonomy(Path::new("taxonomy.txt")),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }
}
