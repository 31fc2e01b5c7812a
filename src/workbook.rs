// 📒 Workbook - already-decoded sheet grids handed to the importer
// The importer never touches file formats; loaders (or the caller) build these values

use serde::{Deserialize, Serialize};

// ============================================================================
// CELL
// ============================================================================

/// A single cell value as read from a sheet.
///
/// Serialized untagged so the JSON wire format is a plain 2-D array:
/// `[["סוג מוצר", "שם יצרן"], ["פנסיה", "הראל"], [null, 150000]]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Bool(bool),
    Text(String),
    Empty,
}

impl Cell {
    /// Text rendering used for header and string fields.
    ///
    /// Integral numbers render without a decimal part so policy and fund
    /// numbers stored as numeric cells keep their digits ("90210", not "90210.0").
    pub fn as_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Cell::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Cell::Empty => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => crate::text::is_blank(s),
            _ => false,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Empty
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

// ============================================================================
// SHEET & WORKBOOK
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Sheet {
            name: name.into(),
            rows,
        }
    }

    /// Cell at (row, col); out-of-range positions read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Workbook { sheets }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn total_cells(&self) -> usize {
        self.sheets
            .iter()
            .flat_map(|s| s.rows.iter())
            .map(|r| r.len())
            .sum()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_as_text_integral_number() {
        assert_eq!(Cell::Number(90210.0).as_text(), "90210");
        assert_eq!(Cell::Number(0.52).as_text(), "0.52");
        assert_eq!(Cell::Empty.as_text(), "");
        assert_eq!(Cell::Bool(true).as_text(), "TRUE");
    }

    #[test]
    fn test_cell_is_empty() {
        assert!(Cell::Empty.is_empty());
        assert!(Cell::Text(" \u{200F} ".to_string()).is_empty());
        assert!(!Cell::Number(0.0).is_empty());
        assert!(!Cell::from("הראל").is_empty());
    }

    #[test]
    fn test_sheet_cell_out_of_range() {
        let sheet = Sheet::new("גיליון1", vec![vec![Cell::from("a")]]);
        assert_eq!(sheet.cell(0, 0), &Cell::from("a"));
        assert_eq!(sheet.cell(0, 5), &Cell::Empty);
        assert_eq!(sheet.cell(9, 0), &Cell::Empty);
    }

    #[test]
    fn test_workbook_json_wire_format() {
        let json = r#"{"sheets":[{"name":"s1","rows":[["סוג מוצר",null],[1500.5,true]]}]}"#;
        let workbook: Workbook = serde_json::from_str(json).unwrap();

        assert_eq!(workbook.sheet_names(), vec!["s1"]);
        let sheet = workbook.sheet("s1").unwrap();
        assert_eq!(sheet.cell(0, 0), &Cell::from("סוג מוצר"));
        assert_eq!(sheet.cell(0, 1), &Cell::Empty);
        assert_eq!(sheet.cell(1, 0), &Cell::Number(1500.5));
        assert_eq!(sheet.cell(1, 1), &Cell::Bool(true));
        assert_eq!(workbook.total_cells(), 4);
    }
}
