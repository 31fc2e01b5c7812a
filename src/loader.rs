// 📂 Workbook Loaders - decode files into in-memory sheet grids
// CSV (one sheet), Excel/ODS via calamine (every worksheet), JSON (wire format)

use crate::error::{ImportError, Result};
use crate::workbook::{Cell, Sheet, Workbook};
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

// ============================================================================
// FORMAT DETECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkbookFormat {
    Csv,
    Excel,
    Json,
}

impl WorkbookFormat {
    pub fn name(&self) -> &str {
        match self {
            WorkbookFormat::Csv => "CSV",
            WorkbookFormat::Excel => "Excel",
            WorkbookFormat::Json => "JSON",
        }
    }
}

/// Detect the workbook format from the file extension.
///
/// # Examples:
/// ```
/// use portfolio_import::loader::{detect_format, WorkbookFormat};
/// use std::path::Path;
///
/// assert_eq!(detect_format(Path::new("clearing_export.xlsx")).unwrap(), WorkbookFormat::Excel);
/// assert_eq!(detect_format(Path::new("portfolio.CSV")).unwrap(), WorkbookFormat::Csv);
/// assert!(detect_format(Path::new("notes.pdf")).is_err());
/// ```
pub fn detect_format(file_path: &Path) -> Result<WorkbookFormat> {
    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => Ok(WorkbookFormat::Csv),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(WorkbookFormat::Excel),
        "json" => Ok(WorkbookFormat::Json),
        _ => Err(ImportError::UnsupportedFormat(format!(
            "cannot detect workbook format of {}",
            file_path.display()
        ))),
    }
}

// ============================================================================
// READERS
// ============================================================================

pub trait WorkbookReader: Send + Sync {
    /// Decode a file into a workbook.
    fn read(&self, file_path: &Path) -> Result<Workbook>;

    fn format(&self) -> WorkbookFormat;
}

/// Get the reader for a format.
pub fn get_reader(format: WorkbookFormat) -> Box<dyn WorkbookReader> {
    match format {
        WorkbookFormat::Csv => Box::new(CsvWorkbookReader::new()),
        WorkbookFormat::Excel => Box::new(ExcelWorkbookReader::new()),
        WorkbookFormat::Json => Box::new(JsonWorkbookReader::new()),
    }
}

/// Detect the format and decode in one step.
pub fn load_workbook(file_path: &Path) -> Result<Workbook> {
    let format = detect_format(file_path)?;
    let workbook = get_reader(format).read(file_path)?;
    debug!(
        path = %file_path.display(),
        format = format.name(),
        sheets = workbook.sheets.len(),
        cells = workbook.total_cells(),
        "workbook loaded"
    );
    Ok(workbook)
}

fn text_cell(value: &str) -> Cell {
    if value.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(value.to_string())
    }
}

// ----------------------------------------------------------------------------
// CSV
// ----------------------------------------------------------------------------

/// Single-sheet reader; the sheet is named after the file stem.
///
/// Every value stays text; the ingestor cleans numbers itself.
pub struct CsvWorkbookReader {
    delimiter: u8,
}

impl CsvWorkbookReader {
    pub fn new() -> Self {
        CsvWorkbookReader { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        CsvWorkbookReader { delimiter }
    }
}

impl Default for CsvWorkbookReader {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkbookReader for CsvWorkbookReader {
    fn read(&self, file_path: &Path) -> Result<Workbook> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_path(file_path)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut cells: Vec<Cell> = record.iter().map(text_cell).collect();

            if rows.is_empty() {
                if let Some(Cell::Text(first)) = cells.first_mut() {
                    *first = first.trim_start_matches('\u{feff}').to_string();
                }
            }
            rows.push(cells);
        }

        let name = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Sheet1");

        Ok(Workbook::new(vec![Sheet::new(name, rows)]))
    }

    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Csv
    }
}

// ----------------------------------------------------------------------------
// EXCEL / ODS
// ----------------------------------------------------------------------------

/// Every worksheet in workbook order, positioned as in the file.
pub struct ExcelWorkbookReader;

impl ExcelWorkbookReader {
    pub fn new() -> Self {
        ExcelWorkbookReader
    }
}

impl Default for ExcelWorkbookReader {
    fn default() -> Self {
        Self::new()
    }
}

fn excel_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => text_cell(s),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => text_cell(s),
    }
}

impl WorkbookReader for ExcelWorkbookReader {
    fn read(&self, file_path: &Path) -> Result<Workbook> {
        let mut workbook: Sheets<_> = open_workbook_auto(file_path).map_err(|e| {
            ImportError::InvalidWorkbook(format!("failed to open {}: {}", file_path.display(), e))
        })?;

        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        if sheet_names.is_empty() {
            return Err(ImportError::InvalidWorkbook(format!(
                "{} contains no sheets",
                file_path.display()
            )));
        }

        let mut sheets = Vec::with_capacity(sheet_names.len());
        for name in &sheet_names {
            let range = workbook.worksheet_range(name)?;

            // Ranges start at the first used cell; pad back to A1
            let (row_offset, col_offset) = range
                .start()
                .map(|(r, c)| (r as usize, c as usize))
                .unwrap_or((0, 0));

            let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
            for row in range.rows() {
                let mut cells = vec![Cell::Empty; col_offset];
                cells.extend(row.iter().map(excel_cell));
                rows.push(cells);
            }

            sheets.push(Sheet::new(name.clone(), rows));
        }

        Ok(Workbook::new(sheets))
    }

    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Excel
    }
}

// ----------------------------------------------------------------------------
// JSON
// ----------------------------------------------------------------------------

/// `{"sheets": [{"name": ..., "rows": [[...]]}]}`, the server's wire format.
pub struct JsonWorkbookReader;

impl JsonWorkbookReader {
    pub fn new() -> Self {
        JsonWorkbookReader
    }
}

impl Default for JsonWorkbookReader {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkbookReader for JsonWorkbookReader {
    fn read(&self, file_path: &Path) -> Result<Workbook> {
        let content = fs::read_to_string(file_path)?;
        serde_json::from_str(&content).map_err(|e| {
            ImportError::InvalidWorkbook(format!("{} is not a workbook: {}", file_path.display(), e))
        })
    }

    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Json
    }
}

// ============================================================================
// TESTS
// ============================================================================
