// ⚙️ Import Configuration - keyword tables and matching thresholds as data
// Defaults cover the Hebrew clearing-house export plus English headers

use crate::error::{ImportError, Result};
use crate::matching::MatchConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Rows scanned per sheet while looking for the header row.
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 20;

fn keywords(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// COLUMN KEYWORDS
// ============================================================================

/// Keyword synonyms per semantic field.
///
/// A header belongs to a field when it *contains* one of the field's keywords
/// (folded comparison).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnKeywords {
    pub product_type: Vec<String>,
    pub manufacturer: Vec<String>,
    pub product_name: Vec<String>,
    pub accumulation: Vec<String>,
    pub premium: Vec<String>,
    pub deposit_fee: Vec<String>,
    pub accumulation_fee: Vec<String>,
    pub investment_track: Vec<String>,
    pub policy_number: Vec<String>,
    pub product_number: Vec<String>,
}

impl Default for ColumnKeywords {
    fn default() -> Self {
        ColumnKeywords {
            product_type: keywords(&["סוג מוצר", "סוג המוצר", "product type"]),
            manufacturer: keywords(&[
                "שם יצרן",
                "יצרן",
                "חברה מנהלת",
                "גוף מנהל",
                "manufacturer",
                "managing company",
            ]),
            product_name: keywords(&[
                "שם מוצר",
                "שם המוצר",
                "שם תכנית",
                "שם התכנית",
                "product name",
                "plan name",
            ]),
            accumulation: keywords(&[
                "סך חיסכון",
                "יתרה צבורה",
                "צבירה",
                "accumulation",
                "balance",
            ]),
            premium: keywords(&["פרמיה", "premium"]),
            deposit_fee: keywords(&[
                "דמי ניהול מהפקדה",
                "דמי ניהול מהפקדות",
                "deposit management fee",
                "management fee from deposit",
                "deposit fee",
            ]),
            accumulation_fee: keywords(&[
                "דמי ניהול מצבירה",
                "דמי ניהול מחיסכון",
                "accumulation management fee",
                "management fee from accumulation",
                "accumulation fee",
            ]),
            investment_track: keywords(&["מסלול השקעה", "מסלול", "investment track", "track"]),
            policy_number: keywords(&[
                "מספר פוליסה",
                "מס' פוליסה",
                "מספר חשבון",
                "policy number",
                "account number",
            ]),
            product_number: keywords(&[
                "מספר קופה",
                "קוד קופה",
                "קוד מסלול",
                "מספר מסלול",
                "fund number",
                "product number",
            ]),
        }
    }
}

// ============================================================================
// IMPORT CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportConfig {
    /// Header labels that identify the header row (the "product type" column)
    pub marker_keywords: Vec<String>,

    /// How many leading rows of each sheet are searched for the header row
    pub header_scan_rows: usize,

    pub columns: ColumnKeywords,

    pub matching: MatchConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        let columns = ColumnKeywords::default();
        ImportConfig {
            marker_keywords: columns.product_type.clone(),
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            columns,
            matching: MatchConfig::default(),
        }
    }
}

impl ImportConfig {
    /// Load configuration from a JSON file.
    ///
    /// Fields missing from the file keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: ImportConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.marker_keywords.iter().all(|k| crate::text::is_blank(k)) {
            return Err(ImportError::Config(
                "markerKeywords must contain at least one non-empty label".to_string(),
            ));
        }

        if self.header_scan_rows == 0 {
            return Err(ImportError::Config(
                "headerScanRows must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.matching.min_overlap) {
            return Err(ImportError::Config(format!(
                "matching.minOverlap must be within 0..=1, got {}",
                self.matching.min_overlap
            )));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
