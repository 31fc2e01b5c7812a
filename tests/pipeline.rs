// End-to-end: workbook → ImportResult against in-memory and SQLite taxonomies

use portfolio_import::taxonomy::open_taxonomy;
use portfolio_import::{
    load_workbook, Cell, Exposure, HoldingKind, ImportError, NormalizedProduct, PortfolioImporter,
    ProductType, ResolutionTier, Sheet, SqliteTaxonomy, TaxonomyEntry, TaxonomyRegistry,
    TaxonomySource, Workbook,
};
use std::sync::Arc;

const HEADER: &[&str] = &[
    "סוג מוצר",
    "שם יצרן",
    "שם מוצר",
    "מספר פוליסה",
    "מסלול השקעה",
    "סך חיסכון",
    "פרמיה חודשית",
    "דמי ניהול מהפקדה",
    "דמי ניהול מצבירה",
    "מספר קופה",
];

fn create_test_entry(number: &str, category: &str, company: &str, track: &str, stocks: f64) -> TaxonomyEntry {
    TaxonomyEntry {
        product_number: number.to_string(),
        category: category.to_string(),
        company: company.to_string(),
        track_name: track.to_string(),
        exposure: Exposure {
            stocks: Some(stocks),
            bonds: Some(100.0 - stocks),
            israel: Some(60.0),
            ..Default::default()
        },
        asset_composition: Some(format!("מניות {}%", stocks)),
    }
}

fn create_test_entries() -> Vec<TaxonomyEntry> {
    vec![
        create_test_entry("2142", "קרן פנסיה", "הראל", "הראל פנסיה - מסלול כללי", 45.0),
        create_test_entry("2143", "קרן פנסיה", "הראל", "הראל פנסיה - מסלול מניות", 95.0),
        create_test_entry("90210", "קופת גמל", "מגדל", "מגדל גמל - מסלול אגח", 10.0),
        create_test_entry("5150", "קרן השתלמות", "אלטשולר שחם", "אלטשולר השתלמות - כללי", 50.0),
    ]
}

fn row(cells: &[&str]) -> Vec<Cell> {
    cells
        .iter()
        .map(|c| if c.is_empty() { Cell::Empty } else { Cell::from(*c) })
        .collect()
}

/// Cover page, a savings block with a duplicate holding, and a summary block.
fn create_test_workbook() -> Workbook {
    let cover = Sheet::new(
        "שער",
        vec![row(&["דוח מסלקה פנסיונית"]), row(&["לקוח: ישראל ישראלי"])],
    );

    let holdings = Sheet::new(
        "מוצרים",
        vec![
            row(&["תאריך הפקה: 01/10/2026"]),
            row(&[]),
            row(HEADER),
            row(&["פנסיה", "הראל", "מסלול כללי", "", "מניות", "100,000 ₪", "", "1.5%", "0.22%", ""]),
            row(&["ביטוח", "כלל", "חיסכון", "", "(90210)", "5000", "", "", "", ""]),
            row(&["קרן פנסיה", "", "ללא יצרן", "", "", "1000", "", "", "", ""]),
            row(&["קרן השתלמות", "חברה חדשה", "חדש", "", "", "1000", "", "", "", ""]),
            row(&["ביטוח חיים", "מגדל", "ריסק", "P-77", "", "", "150", "", "", ""]),
        ],
    );

    let summary = Sheet::new(
        "סיכום",
        vec![
            row(HEADER),
            row(&["פנסיה", "הראל", "מסלול כללי", "", "", "150000", "", "", "", ""]),
            row(HEADER),
            row(&["ביטוח חיים", "מגדל", "ריסק", "P-77", "", "", "120", "", "", ""]),
        ],
    );

    Workbook::new(vec![cover, holdings, summary])
}

fn find<'a>(resolved: &'a [NormalizedProduct], manufacturer: &str, kind: HoldingKind) -> &'a NormalizedProduct {
    resolved
        .iter()
        .find(|p| p.manufacturer == manufacturer && p.kind == kind)
        .unwrap_or_else(|| panic!("no {:?} product for {}", kind, manufacturer))
}

fn run_import(taxonomy: Arc<dyn TaxonomySource>) -> portfolio_import::ImportResult {
    PortfolioImporter::new(taxonomy)
        .import(&create_test_workbook(), ProductType::Current)
        .unwrap()
}

#[test]
fn test_merge_scenario_across_sheets() {
    let result = run_import(Arc::new(TaxonomyRegistry::from_entries(create_test_entries())));

    let harel = result
        .savings
        .iter()
        .find(|p| p.holding.manufacturer == "הראל")
        .unwrap();
    assert_eq!(harel.accumulation, 150000.0);
    assert_eq!(harel.holding.investment_track, "מניות");
    assert_eq!(harel.holding.deposit_fee, 1.5);
    assert_eq!(harel.holding.accumulation_fee, 0.22);

    // Insurance premium takes the max across blocks
    assert_eq!(result.insurance.len(), 1);
    assert_eq!(result.insurance[0].premium, 150.0);
}

#[test]
fn test_drop_rule_and_stats() {
    let result = run_import(Arc::new(TaxonomyRegistry::from_entries(create_test_entries())));

    assert!(result.savings.iter().all(|p| !p.holding.manufacturer.is_empty()));
    assert!(result.savings.iter().all(|p| p.holding.product_name != "ללא יצרן"));
    assert_eq!(result.stats.sheets_skipped, 1);
    assert_eq!(result.stats.sheets_scanned, 2);
    assert_eq!(result.stats.rows_dropped, 1);
    assert_eq!(result.stats.rows_accepted, 6);
    assert_eq!(result.savings.len(), 3);
}

#[test]
fn test_number_in_text_overrides_row_text() {
    let result = run_import(Arc::new(TaxonomyRegistry::from_entries(create_test_entries())));

    let product = find(&result.resolved, "כלל", HoldingKind::Savings);
    assert_eq!(product.tier, ResolutionTier::DirectNumber);
    assert_eq!(product.category, "קופת גמל");
    assert_eq!(product.company, "מגדל");
    assert_eq!(product.product_number.as_deref(), Some("90210"));
    assert_eq!(product.stocks, Some(10.0));
    assert!(product.include_exposure_data);
}

#[test]
fn test_scoped_fuzzy_track() {
    let result = run_import(Arc::new(TaxonomyRegistry::from_entries(create_test_entries())));

    let product = find(&result.resolved, "הראל", HoldingKind::Savings);
    assert_eq!(product.tier, ResolutionTier::ScopedFuzzy);
    assert_eq!(product.category, "קרן פנסיה");
    assert_eq!(product.sub_category.as_deref(), Some("הראל פנסיה - מסלול מניות"));
    assert_eq!(product.stocks, Some(95.0));
    assert_eq!(product.asset_composition.as_deref(), Some("מניות 95%"));
}

#[test]
fn test_unresolved_company_keeps_raw_manufacturer() {
    let result = run_import(Arc::new(TaxonomyRegistry::from_entries(create_test_entries())));

    let product = find(&result.resolved, "חברה חדשה", HoldingKind::Savings);
    assert_eq!(product.company, "חברה חדשה");
    assert_eq!(product.category, "קרן השתלמות");
    assert_eq!(product.sub_category, None);
    assert!(!product.include_exposure_data);
}

#[test]
fn test_sqlite_taxonomy_matches_registry() {
    let snapshot = SqliteTaxonomy::open_in_memory().unwrap();
    snapshot.insert_entries(&create_test_entries()).unwrap();

    let from_sqlite = run_import(Arc::new(snapshot));
    let from_registry = run_import(Arc::new(TaxonomyRegistry::from_entries(create_test_entries())));

    assert_eq!(from_sqlite.resolved, from_registry.resolved);
    assert_eq!(from_sqlite.kpis, from_registry.kpis);
    assert_ne!(from_sqlite.import_id, from_registry.import_id);
}

#[test]
fn test_kpis() {
    let result = run_import(Arc::new(TaxonomyRegistry::from_entries(create_test_entries())));

    assert_eq!(result.kpis.savings.count, 3);
    assert_eq!(result.kpis.savings.total_accumulation, 156000.0);
    assert_eq!(result.kpis.insurance.count, 1);
    assert_eq!(result.kpis.insurance.total_premium, 150.0);
    assert_eq!(result.kpis.resolved + result.kpis.unresolved, result.resolved.len());
    assert!(result.kpis.savings.weighted_avg_deposit_fee > 0.0);
    assert!(result.kpis.savings.weighted_exposure.is_some());
}

#[test]
fn test_row_order_does_not_change_result() {
    let taxonomy: Arc<dyn TaxonomySource> = Arc::new(TaxonomyRegistry::from_entries(create_test_entries()));
    let importer = PortfolioImporter::new(taxonomy);

    let workbook = create_test_workbook();
    let mut reversed = workbook.clone();
    reversed.sheets.reverse();

    let forward = importer.import(&workbook, ProductType::Current).unwrap();
    let backward = importer.import(&reversed, ProductType::Current).unwrap();

    let mut a = forward.savings.clone();
    let mut b = backward.savings.clone();
    a.sort_by(|x, y| x.holding.key().cmp(&y.holding.key()));
    b.sort_by(|x, y| x.holding.key().cmp(&y.holding.key()));
    assert_eq!(a, b);
    assert_ne!(forward.fingerprint, backward.fingerprint);
}

#[test]
fn test_csv_file_with_json_taxonomy() {
    let dir = tempfile::tempdir().unwrap();

    let taxonomy_path = dir.path().join("taxonomy.json");
    std::fs::write(&taxonomy_path, serde_json::to_string(&create_test_entries()).unwrap()).unwrap();

    let csv_path = dir.path().join("export.csv");
    std::fs::write(
        &csv_path,
        "סוג מוצר,שם יצרן,שם מוצר,סך חיסכון\nקרן פנסיה,הראל,הראל פנסיה כללי (2142),\"80,000\"\n",
    )
    .unwrap();

    let workbook = load_workbook(&csv_path).unwrap();
    let importer = PortfolioImporter::new(open_taxonomy(&taxonomy_path).unwrap());
    let result = importer.import(&workbook, ProductType::Recommended).unwrap();

    assert_eq!(result.savings.len(), 1);
    assert_eq!(result.savings[0].accumulation, 80000.0);
    let product = &result.resolved[0];
    assert_eq!(product.tier, ResolutionTier::DirectNumber);
    assert_eq!(product.sub_category.as_deref(), Some("הראל פנסיה - מסלול כללי"));
    assert_eq!(product.product_kind, ProductType::Recommended);
}

#[test]
fn test_invalid_workbook_is_the_only_error() {
    let importer = PortfolioImporter::new(Arc::new(TaxonomyRegistry::new()));

    let empty = importer.import(&Workbook::default(), ProductType::Current);
    assert!(matches!(empty, Err(ImportError::InvalidWorkbook(_))));

    // Nothing resolvable is still a successful import
    let result = importer.import(&create_test_workbook(), ProductType::Current).unwrap();
    assert!(result.resolved.iter().all(|p| p.tier == ResolutionTier::NoMatch));
    assert_eq!(result.kpis.resolved, 0);
}
