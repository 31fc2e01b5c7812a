// Portfolio Import - Core Library
// Clearing-house spreadsheet → canonical holdings → taxonomy-resolved products
// Exposes all modules for use in the CLI, the API server, and tests

pub mod text;
pub mod workbook;
pub mod loader;
pub mod config;
pub mod error;
pub mod ingest;       // Sheet Ingestor
pub mod reconcile;    // Row Reconciler
pub mod identifiers;  // Identifier Extractor
pub mod matching;     // Fuzzy dimension matchers
pub mod taxonomy;     // Taxonomy source + registry + SQLite snapshot
pub mod resolver;     // 4-tier Taxonomy Resolver
pub mod assemble;     // Product Assembler
pub mod kpis;
pub mod pipeline;

// Re-export commonly used types
pub use text::{fold, normalize};
pub use workbook::{Cell, Sheet, Workbook};
pub use loader::{
    detect_format, get_reader, load_workbook,
    WorkbookFormat, WorkbookReader,
    CsvWorkbookReader, ExcelWorkbookReader, JsonWorkbookReader,
};
pub use config::{ColumnKeywords, ImportConfig};
pub use error::{ImportError, TaxonomyError};
pub use ingest::{IngestStats, RawRow, SheetIngestor};
pub use reconcile::{
    reconcile, CanonicalRow, HoldingKind, ProductHolding,
    InsuranceProduct, ReconciliationState, SavingsProduct,
};
pub use identifiers::{collect_candidates, extract_numbers};
pub use matching::{closest_candidate, match_dimension, MatchConfig};
pub use taxonomy::{
    Exposure, ExposureQuery, TaxonomyEntry, TaxonomyRegistry, TaxonomySource,
    sqlite::SqliteTaxonomy,
};
pub use resolver::{Resolution, ResolutionTier, ResolveRequest, ResolvedMatch, TaxonomyResolver};
pub use assemble::{assemble, NormalizedProduct, ProductType};
pub use kpis::{InsuranceKpis, PortfolioKpis, SavingsKpis};
pub use pipeline::{ImportResult, PortfolioImporter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
