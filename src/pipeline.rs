// 🚚 Import Pipeline - workbook → canonical rows → resolved products → KPIs
//
// Every import starts from empty state and gets a fresh id. Importing the
// same workbook twice yields two independent results with the same fingerprint.

use crate::assemble::{assemble, NormalizedProduct, ProductType};
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::ingest::{IngestStats, SheetIngestor};
use crate::kpis::{compute_kpis, PortfolioKpis};
use crate::reconcile::{reconcile, CanonicalRow, InsuranceProduct, ReconciliationState, SavingsProduct};
use crate::resolver::{ResolveRequest, TaxonomyResolver};
use crate::taxonomy::TaxonomySource;
use crate::workbook::Workbook;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub import_id: String,
    pub imported_at: DateTime<Utc>,
    /// SHA-256 of the workbook contents
    pub fingerprint: String,
    pub savings: Vec<SavingsProduct>,
    pub insurance: Vec<InsuranceProduct>,
    pub resolved: Vec<NormalizedProduct>,
    pub kpis: PortfolioKpis,
    pub stats: IngestStats,
}

/// SHA-256 over sheet names and cell text, in order.
pub fn workbook_fingerprint(workbook: &Workbook) -> String {
    let mut hasher = Sha256::new();
    for sheet in &workbook.sheets {
        hasher.update(format!("sheet:{}\n", sheet.name));
        for row in &sheet.rows {
            let line: Vec<String> = row.iter().map(|c| c.as_text()).collect();
            hasher.update(line.join("\t"));
            hasher.update("\n");
        }
    }
    format!("{:x}", hasher.finalize())
}

pub struct PortfolioImporter {
    taxonomy: Arc<dyn TaxonomySource>,
    config: ImportConfig,
}

impl PortfolioImporter {
    pub fn new(taxonomy: Arc<dyn TaxonomySource>) -> Self {
        Self::with_config(taxonomy, ImportConfig::default())
    }

    pub fn with_config(taxonomy: Arc<dyn TaxonomySource>, config: ImportConfig) -> Self {
        PortfolioImporter { taxonomy, config }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn taxonomy(&self) -> &dyn TaxonomySource {
        self.taxonomy.as_ref()
    }

    /// Run one import.
    ///
    /// Fails only when the workbook has no sheets at all. Sheets without a
    /// header row, dropped rows and taxonomy misses are not errors.
    pub fn import(&self, workbook: &Workbook, product_type: ProductType) -> Result<ImportResult> {
        if workbook.sheets.is_empty() {
            return Err(ImportError::InvalidWorkbook("workbook has no sheets".to_string()));
        }

        let (state, stats) = self.reconcile_workbook(workbook);
        let (savings, insurance) = state.into_collections();
        let resolved = self.resolve_products(&savings, &insurance, product_type);
        let kpis = compute_kpis(&savings, &insurance, &resolved);

        info!(
            "✅ Imported {} savings + {} insurance products ({} resolved, {} unresolved, {} rows dropped)",
            savings.len(),
            insurance.len(),
            kpis.resolved,
            kpis.unresolved,
            stats.rows_dropped
        );

        Ok(ImportResult {
            import_id: Uuid::new_v4().to_string(),
            imported_at: Utc::now(),
            fingerprint: workbook_fingerprint(workbook),
            savings,
            insurance,
            resolved,
            kpis,
            stats,
        })
    }

    /// Ingest and reconcile each sheet on its own, then merge the states.
    pub fn reconcile_workbook(&self, workbook: &Workbook) -> (ReconciliationState, IngestStats) {
        let ingestor = SheetIngestor::new(&self.config);
        let mut stats = IngestStats::default();
        let mut state = ReconciliationState::new();

        for sheet in &workbook.sheets {
            let ingest = ingestor.ingest_sheet(sheet);
            stats.absorb(&ingest.stats);

            let sheet_state = reconcile(&ingest.rows);
            debug!(
                sheet = %sheet.name,
                rows = ingest.rows.len(),
                savings = sheet_state.savings().len(),
                insurance = sheet_state.insurance().len(),
                "sheet reconciled"
            );
            state = state.merge(sheet_state);
        }

        (state, stats)
    }

    /// Resolve and assemble every canonical row, savings first.
    pub fn resolve_products(
        &self,
        savings: &[SavingsProduct],
        insurance: &[InsuranceProduct],
        product_type: ProductType,
    ) -> Vec<NormalizedProduct> {
        let resolver = TaxonomyResolver::new(self.taxonomy.as_ref(), &self.config.matching);

        let rows = savings
            .iter()
            .map(|p| p as &dyn CanonicalRow)
            .chain(insurance.iter().map(|p| p as &dyn CanonicalRow));

        rows.map(|row| {
            let request = ResolveRequest::from_holding(row.holding());
            let resolution = resolver.resolve(&request);
            debug!(
                manufacturer = %row.holding().manufacturer,
                tier = ?resolution.tier(),
                "holding resolved"
            );
            assemble(row, &resolution.into_match(), product_type)
        })
        .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
