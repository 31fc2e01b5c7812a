// 📥 Sheet Ingestor - find the header row, map columns, stream raw holdings
//
// Clearing-house exports put cover pages, legends and several summary blocks
// in one workbook. We only read sheets whose first rows carry the
// "product type" header; everything else is skipped silently.

use crate::config::{ColumnKeywords, ImportConfig};
use crate::text::{fold, normalize};
use crate::workbook::{Cell, Sheet, Workbook};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// RAW ROW
// ============================================================================

/// One data row as read from a sheet, before any deduplication.
///
/// Text fields are normalized; numeric fields are already cleaned and default
/// to 0 when the cell is missing or unparseable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRow {
    pub product_type: String,
    pub manufacturer: String,
    pub product_name: String,
    pub accumulation: f64,
    pub premium: f64,
    pub deposit_fee: f64,
    pub accumulation_fee: f64,
    pub investment_track: String,
    pub policy_number: String,
    pub product_number: String,

    // Provenance
    pub sheet: String,
    pub line_number: usize,
}

impl RawRow {
    /// Rows without a manufacturer are never reconciled.
    ///
    /// This also covers rows missing type, manufacturer and name together
    /// (section subtotals, legends, signature lines).
    pub fn is_droppable(&self) -> bool {
        self.manufacturer.is_empty()
    }
}

// ============================================================================
// COLUMN MAP
// ============================================================================

/// Semantic fields a header can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ProductType,
    Manufacturer,
    ProductName,
    Accumulation,
    Premium,
    DepositFee,
    AccumulationFee,
    InvestmentTrack,
    PolicyNumber,
    ProductNumber,
}

impl Field {
    /// Order in which fields claim headers.
    ///
    /// Specific labels go first: "דמי ניהול מצבירה" also contains "צבירה", and
    /// "קוד מסלול" also contains "מסלול". A header claimed by an earlier field
    /// is not offered to later ones.
    pub const CLAIM_ORDER: [Field; 10] = [
        Field::ProductType,
        Field::DepositFee,
        Field::AccumulationFee,
        Field::ProductNumber,
        Field::PolicyNumber,
        Field::ProductName,
        Field::Manufacturer,
        Field::Accumulation,
        Field::Premium,
        Field::InvestmentTrack,
    ];

    fn keywords<'a>(&self, columns: &'a ColumnKeywords) -> &'a [String] {
        match self {
            Field::ProductType => &columns.product_type,
            Field::Manufacturer => &columns.manufacturer,
            Field::ProductName => &columns.product_name,
            Field::Accumulation => &columns.accumulation,
            Field::Premium => &columns.premium,
            Field::DepositFee => &columns.deposit_fee,
            Field::AccumulationFee => &columns.accumulation_fee,
            Field::InvestmentTrack => &columns.investment_track,
            Field::PolicyNumber => &columns.policy_number,
            Field::ProductNumber => &columns.product_number,
        }
    }
}

/// Column index per field; `None` when the sheet has no such header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub product_type: Option<usize>,
    pub manufacturer: Option<usize>,
    pub product_name: Option<usize>,
    pub accumulation: Option<usize>,
    pub premium: Option<usize>,
    pub deposit_fee: Option<usize>,
    pub accumulation_fee: Option<usize>,
    pub investment_track: Option<usize>,
    pub policy_number: Option<usize>,
    pub product_number: Option<usize>,
}

impl ColumnMap {
    /// Build the map from a header row by keyword containment.
    ///
    /// For each field (in [`Field::CLAIM_ORDER`]) the first unclaimed header
    /// containing one of its keywords wins.
    pub fn from_headers(headers: &[String], columns: &ColumnKeywords) -> Self {
        let folded: Vec<String> = headers.iter().map(|h| fold(h)).collect();
        let mut claimed = vec![false; folded.len()];
        let mut map = ColumnMap::default();

        for field in Field::CLAIM_ORDER {
            let needles: Vec<String> = field
                .keywords(columns)
                .iter()
                .map(|k| fold(k))
                .filter(|k| !k.is_empty())
                .collect();

            let found = folded.iter().enumerate().find(|(i, header)| {
                !claimed[*i] && needles.iter().any(|n| header.contains(n.as_str()))
            });

            if let Some((i, _)) = found {
                claimed[i] = true;
                map.set(field, i);
            }
        }

        map
    }

    fn set(&mut self, field: Field, index: usize) {
        let slot = match field {
            Field::ProductType => &mut self.product_type,
            Field::Manufacturer => &mut self.manufacturer,
            Field::ProductName => &mut self.product_name,
            Field::Accumulation => &mut self.accumulation,
            Field::Premium => &mut self.premium,
            Field::DepositFee => &mut self.deposit_fee,
            Field::AccumulationFee => &mut self.accumulation_fee,
            Field::InvestmentTrack => &mut self.investment_track,
            Field::PolicyNumber => &mut self.policy_number,
            Field::ProductNumber => &mut self.product_number,
        };
        *slot = Some(index);
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        match field {
            Field::ProductType => self.product_type,
            Field::Manufacturer => self.manufacturer,
            Field::ProductName => self.product_name,
            Field::Accumulation => self.accumulation,
            Field::Premium => self.premium,
            Field::DepositFee => self.deposit_fee,
            Field::AccumulationFee => self.accumulation_fee,
            Field::InvestmentTrack => self.investment_track,
            Field::PolicyNumber => self.policy_number,
            Field::ProductNumber => self.product_number,
        }
    }
}

// ============================================================================
// CELL PARSING
// ============================================================================

/// Characters removed before parsing a numeric cell.
const NUMERIC_NOISE: &[char] = &['₪', '$', '€', '£', '%', ',', '\''];

/// Parse a numeric cell; anything unparseable is 0.
///
/// Strips currency symbols, thousands separators, percent signs and
/// whitespace first: "₪ 1,250,000" → 1250000, "0.22%" → 0.22.
pub fn parse_amount(cell: &Cell) -> f64 {
    let value = match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => {
            let cleaned: String = normalize(s)
                .replace("ש\"ח", "")
                .chars()
                .filter(|c| !c.is_whitespace() && !NUMERIC_NOISE.contains(c))
                .collect();
            cleaned.parse::<f64>().unwrap_or(0.0)
        }
        Cell::Bool(_) | Cell::Empty => 0.0,
    };

    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn text_at(sheet: &Sheet, row: usize, col: Option<usize>) -> String {
    col.map(|c| normalize(&sheet.cell(row, c).as_text()))
        .unwrap_or_default()
}

fn amount_at(sheet: &Sheet, row: usize, col: Option<usize>) -> f64 {
    col.map(|c| parse_amount(sheet.cell(row, c))).unwrap_or(0.0)
}

// ============================================================================
// INGEST STATS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    /// Sheets that carried the marker header and were read
    pub sheets_scanned: usize,
    /// Sheets without the marker header (cover pages, legends)
    pub sheets_skipped: usize,
    /// Non-blank data rows seen below a header row
    pub rows_read: usize,
    /// Rows discarded for a missing manufacturer
    pub rows_dropped: usize,
    /// Rows handed to the reconciler
    pub rows_accepted: usize,
}

impl IngestStats {
    pub fn absorb(&mut self, other: &IngestStats) {
        self.sheets_scanned += other.sheets_scanned;
        self.sheets_skipped += other.sheets_skipped;
        self.rows_read += other.rows_read;
        self.rows_dropped += other.rows_dropped;
        self.rows_accepted += other.rows_accepted;
    }
}

/// Output of ingesting a single sheet.
#[derive(Debug, Clone, Default)]
pub struct SheetIngest {
    pub header_row: Option<usize>,
    pub rows: Vec<RawRow>,
    pub stats: IngestStats,
}

// ============================================================================
// SHEET INGESTOR
// ============================================================================

pub struct SheetIngestor<'a> {
    config: &'a ImportConfig,
    markers: Vec<String>,
}

impl<'a> SheetIngestor<'a> {
    pub fn new(config: &'a ImportConfig) -> Self {
        let markers = config
            .marker_keywords
            .iter()
            .map(|k| fold(k))
            .filter(|k| !k.is_empty())
            .collect();

        SheetIngestor { config, markers }
    }

    fn is_marker(&self, cell: &Cell) -> bool {
        let text = fold(&cell.as_text());
        !text.is_empty() && self.markers.iter().any(|m| text.contains(m.as_str()))
    }

    /// Index of the header row within the first `header_scan_rows` rows.
    pub fn find_header_row(&self, sheet: &Sheet) -> Option<usize> {
        sheet
            .rows
            .iter()
            .take(self.config.header_scan_rows)
            .position(|row| row.iter().any(|cell| self.is_marker(cell)))
    }

    /// Read every data row of a sheet.
    ///
    /// Sheets without the marker header yield an empty result with
    /// `sheets_skipped = 1`; this is not an error.
    pub fn ingest_sheet(&self, sheet: &Sheet) -> SheetIngest {
        let mut result = SheetIngest::default();

        let Some(header_row) = self.find_header_row(sheet) else {
            debug!(sheet = %sheet.name, "no header row found, skipping sheet");
            result.stats.sheets_skipped = 1;
            return result;
        };

        let headers: Vec<String> = sheet.rows[header_row].iter().map(Cell::as_text).collect();
        let columns = ColumnMap::from_headers(&headers, &self.config.columns);
        debug!(sheet = %sheet.name, header_row, ?columns, "header row located");

        result.header_row = Some(header_row);
        result.stats.sheets_scanned = 1;

        for row_idx in (header_row + 1)..sheet.row_count() {
            let cells = &sheet.rows[row_idx];
            if cells.iter().all(Cell::is_empty) {
                continue;
            }

            // Summary blocks repeat the header row further down
            if let Some(col) = columns.product_type {
                if self.is_marker(sheet.cell(row_idx, col)) {
                    continue;
                }
            }

            result.stats.rows_read += 1;

            let raw = self.extract_row(sheet, row_idx, &columns);
            if raw.is_droppable() {
                debug!(sheet = %sheet.name, line = raw.line_number, "dropping row without manufacturer");
                result.stats.rows_dropped += 1;
                continue;
            }

            result.stats.rows_accepted += 1;
            result.rows.push(raw);
        }

        result
    }

    fn extract_row(&self, sheet: &Sheet, row: usize, columns: &ColumnMap) -> RawRow {
        RawRow {
            product_type: text_at(sheet, row, columns.product_type),
            manufacturer: text_at(sheet, row, columns.manufacturer),
            product_name: text_at(sheet, row, columns.product_name),
            accumulation: amount_at(sheet, row, columns.accumulation),
            premium: amount_at(sheet, row, columns.premium),
            deposit_fee: amount_at(sheet, row, columns.deposit_fee),
            accumulation_fee: amount_at(sheet, row, columns.accumulation_fee),
            investment_track: text_at(sheet, row, columns.investment_track),
            policy_number: text_at(sheet, row, columns.policy_number),
            product_number: text_at(sheet, row, columns.product_number),
            sheet: sheet.name.clone(),
            line_number: row + 1,
        }
    }

    /// Ingest all sheets in order, concatenating rows and summing stats.
    pub fn ingest_workbook(&self, workbook: &Workbook) -> (Vec<RawRow>, IngestStats) {
        let mut rows = Vec::new();
        let mut stats = IngestStats::default();

        for sheet in &workbook.sheets {
            let ingest = self.ingest_sheet(sheet);
            stats.absorb(&ingest.stats);
            rows.extend(ingest.rows);
        }

        (rows, stats)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(cells: &[&str]) -> Vec<Cell> {
        cells
            .iter()
            .map(|c| if c.is_empty() { Cell::Empty } else { Cell::from(*c) })
            .collect()
    }

    fn header() -> Vec<Cell> {
        text_row(&[
            "סוג מוצר",
            "שם יצרן",
            "שם מוצר",
            "מספר פוליסה",
            "מסלול השקעה",
            "סך חיסכון",
            "פרמיה חודשית",
            "דמי ניהול מהפקדה",
            "דמי ניהול מצבירה",
        ])
    }

    #[test]
    fn test_parse_amount_cleans_noise() {
        assert_eq!(parse_amount(&Cell::from("₪ 1,250,000")), 1_250_000.0);
        assert_eq!(parse_amount(&Cell::from("0.22%")), 0.22);
        assert_eq!(parse_amount(&Cell::from("$ 3,400.50")), 3400.5);
        assert_eq!(parse_amount(&Cell::from("1,200 ש\"ח")), 1200.0);
        assert_eq!(parse_amount(&Cell::Number(42.5)), 42.5);
    }

    #[test]
    fn test_parse_amount_defaults_to_zero() {
        assert_eq!(parse_amount(&Cell::from("לא ידוע")), 0.0);
        assert_eq!(parse_amount(&Cell::from("")), 0.0);
        assert_eq!(parse_amount(&Cell::Empty), 0.0);
        assert_eq!(parse_amount(&Cell::Bool(true)), 0.0);
        assert_eq!(parse_amount(&Cell::Number(f64::NAN)), 0.0);
    }

    #[test]
    fn test_column_map_by_containment() {
        let headers: Vec<String> = header().iter().map(Cell::as_text).collect();
        let map = ColumnMap::from_headers(&headers, &ColumnKeywords::default());

        assert_eq!(map.product_type, Some(0));
        assert_eq!(map.manufacturer, Some(1));
        assert_eq!(map.product_name, Some(2));
        assert_eq!(map.policy_number, Some(3));
        assert_eq!(map.investment_track, Some(4));
        assert_eq!(map.accumulation, Some(5));
        assert_eq!(map.premium, Some(6));
        assert_eq!(map.deposit_fee, Some(7));
        assert_eq!(map.accumulation_fee, Some(8));
        assert_eq!(map.product_number, None);
    }

    #[test]
    fn test_column_map_specific_headers_claimed_first() {
        // Fee column before the balance column: "צבירה" must not grab the fee
        let headers: Vec<String> = ["דמי ניהול מצבירה", "קוד מסלול", "צבירה", "מסלול"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let map = ColumnMap::from_headers(&headers, &ColumnKeywords::default());

        assert_eq!(map.accumulation_fee, Some(0));
        assert_eq!(map.product_number, Some(1));
        assert_eq!(map.accumulation, Some(2));
        assert_eq!(map.investment_track, Some(3));
        assert_eq!(map.get(Field::Accumulation), Some(2));
        assert_eq!(map.get(Field::Premium), None);
    }

    #[test]
    fn test_column_map_first_header_wins() {
        let headers: Vec<String> = ["Premium (monthly)", "Premium (annual)"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let map = ColumnMap::from_headers(&headers, &ColumnKeywords::default());
        assert_eq!(map.premium, Some(0));
    }

    #[test]
    fn test_sheet_without_marker_is_skipped() {
        let config = ImportConfig::default();
        let ingestor = SheetIngestor::new(&config);
        let cover = Sheet::new("שער", vec![text_row(&["דוח מסלקה פנסיונית"]), text_row(&["לקוח: ישראל ישראלי"])]);

        let result = ingestor.ingest_sheet(&cover);
        assert_eq!(result.header_row, None);
        assert!(result.rows.is_empty());
        assert_eq!(result.stats.sheets_skipped, 1);
        assert_eq!(result.stats.sheets_scanned, 0);
    }

    #[test]
    fn test_header_beyond_scan_limit_is_ignored() {
        let config = ImportConfig::default();
        let ingestor = SheetIngestor::new(&config);

        let mut rows: Vec<Vec<Cell>> = (0..20).map(|i| vec![Cell::from(format!("שורה {}", i))]).collect();
        rows.push(header());
        let sheet = Sheet::new("late", rows.clone());
        assert_eq!(ingestor.find_header_row(&sheet), None);

        rows.remove(0);
        let sheet = Sheet::new("just-in-time", rows);
        assert_eq!(ingestor.find_header_row(&sheet), Some(19));
    }

    #[test]
    fn test_ingest_rows_and_drop_rule() {
        let config = ImportConfig::default();
        let ingestor = SheetIngestor::new(&config);

        let sheet = Sheet::new(
            "פירוט",
            vec![
                text_row(&["מסלקה פנסיונית - פירוט מוצרים"]),
                header(),
                vec![
                    Cell::from("פנסיה"),
                    Cell::from(" הראל\u{200F} "),
                    Cell::from("הראל פנסיה מקיפה"),
                    Cell::Number(123456.0),
                    Cell::from("מסלול כללי (2142)"),
                    Cell::from("₪150,000"),
                    Cell::Empty,
                    Cell::from("1.5%"),
                    Cell::from("0.22%"),
                ],
                // No manufacturer: dropped
                text_row(&["פנסיה", "", "מוצר יתום", "", "", "5000"]),
                // Subtotal line: dropped
                text_row(&["", "", "", "", "", "150000"]),
                // Blank line: ignored entirely
                text_row(&["", "", ""]),
                // Repeated header of a second block: ignored
                header(),
                text_row(&["ביטוח חיים", "מגדל", "ריסק", "P-77", "", "", "120"]),
            ],
        );

        let result = ingestor.ingest_sheet(&sheet);

        assert_eq!(result.header_row, Some(1));
        assert_eq!(result.stats.rows_read, 4);
        assert_eq!(result.stats.rows_dropped, 2);
        assert_eq!(result.stats.rows_accepted, 2);
        assert_eq!(result.rows.len(), 2);

        let pension = &result.rows[0];
        assert_eq!(pension.product_type, "פנסיה");
        assert_eq!(pension.manufacturer, "הראל");
        assert_eq!(pension.policy_number, "123456");
        assert_eq!(pension.investment_track, "מסלול כללי (2142)");
        assert_eq!(pension.accumulation, 150_000.0);
        assert_eq!(pension.premium, 0.0);
        assert_eq!(pension.deposit_fee, 1.5);
        assert_eq!(pension.accumulation_fee, 0.22);
        assert_eq!(pension.line_number, 3);
        assert_eq!(pension.sheet, "פירוט");

        let risk = &result.rows[1];
        assert_eq!(risk.manufacturer, "מגדל");
        assert_eq!(risk.premium, 120.0);
        // Missing columns read as zero
        assert_eq!(risk.deposit_fee, 0.0);
    }

    #[test]
    fn test_missing_manufacturer_column_drops_everything() {
        let config = ImportConfig::default();
        let ingestor = SheetIngestor::new(&config);
        let sheet = Sheet::new(
            "partial",
            vec![
                text_row(&["סוג מוצר", "שם מוצר", "צבירה"]),
                text_row(&["פנסיה", "מקיפה", "1000"]),
            ],
        );

        let result = ingestor.ingest_sheet(&sheet);
        assert_eq!(result.stats.rows_dropped, 1);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_ingest_workbook_sums_stats() {
        let config = ImportConfig::default();
        let ingestor = SheetIngestor::new(&config);
        let workbook = Workbook::new(vec![
            Sheet::new("cover", vec![text_row(&["שלום"])]),
            Sheet::new("data", vec![header(), text_row(&["גמל", "אלטשולר שחם", "גמל להשקעה", "9", "", "20000"])]),
        ]);

        let (rows, stats) = ingestor.ingest_workbook(&workbook);
        assert_eq!(rows.len(), 1);
        assert_eq!(stats.sheets_scanned, 1);
        assert_eq!(stats.sheets_skipped, 1);
        assert_eq!(stats.rows_accepted, 1);
    }
}
