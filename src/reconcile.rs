// 🔁 Row Reconciler - collapse repeated holdings into canonical rows
//
// Clearing-house exports repeat the same policy across several summary
// blocks, each with partial data. Rows sharing an identity key are merged:
//   - amounts: max(existing, new)
//   - track / fees / product number: filled when missing, never cleared
//
// The merge is commutative so row order never changes the result.

use crate::ingest::RawRow;
use crate::text::{fold, normalize};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

// ============================================================================
// IDENTITY
// ============================================================================

/// Composite identity key: type | manufacturer | name | policy (all normalized).
pub fn identity_key(
    product_type: &str,
    manufacturer: &str,
    product_name: &str,
    policy_number: &str,
) -> String {
    format!(
        "{}|{}|{}|{}",
        normalize(product_type),
        normalize(manufacturer),
        normalize(product_name),
        normalize(policy_number)
    )
}

// ============================================================================
// CANONICAL ROWS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HoldingKind {
    Savings,
    Insurance,
}

/// Fields shared by savings and insurance holdings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductHolding {
    // Identity (part of the key)
    pub product_type: String,
    pub manufacturer: String,
    pub product_name: String,
    pub policy_number: String,

    // Fill-if-missing values
    pub investment_track: String,
    pub deposit_fee: f64,
    pub accumulation_fee: f64,
    pub product_number: String,
}

impl ProductHolding {
    pub fn from_raw(row: &RawRow) -> Self {
        ProductHolding {
            product_type: normalize(&row.product_type),
            manufacturer: normalize(&row.manufacturer),
            product_name: normalize(&row.product_name),
            policy_number: normalize(&row.policy_number),
            investment_track: normalize(&row.investment_track),
            deposit_fee: row.deposit_fee,
            accumulation_fee: row.accumulation_fee,
            product_number: normalize(&row.product_number),
        }
    }

    pub fn key(&self) -> String {
        identity_key(
            &self.product_type,
            &self.manufacturer,
            &self.product_name,
            &self.policy_number,
        )
    }

    /// Fill empty/zero values from another occurrence of the same holding.
    ///
    /// A value that is already set is never cleared. When both sides carry
    /// different values this is not first-non-empty-wins: the smaller value
    /// (folded text, non-zero fee) replaces the set one, so the pick does not
    /// depend on row or sheet order.
    pub fn fill_missing(&mut self, other: &ProductHolding) {
        fill_text(&mut self.investment_track, &other.investment_track);
        fill_text(&mut self.product_number, &other.product_number);
        fill_fee(&mut self.deposit_fee, other.deposit_fee);
        fill_fee(&mut self.accumulation_fee, other.accumulation_fee);
    }
}

fn fill_text(existing: &mut String, incoming: &str) {
    if incoming.is_empty() {
        return;
    }
    if existing.is_empty() {
        *existing = incoming.to_string();
        return;
    }

    let order = fold(incoming)
        .cmp(&fold(existing))
        .then_with(|| incoming.cmp(existing.as_str()));
    if order == Ordering::Less {
        *existing = incoming.to_string();
    }
}

fn fill_fee(existing: &mut f64, incoming: f64) {
    if incoming == 0.0 {
        return;
    }
    if *existing == 0.0 || incoming < *existing {
        *existing = incoming;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsProduct {
    #[serde(flatten)]
    pub holding: ProductHolding,
    pub accumulation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceProduct {
    #[serde(flatten)]
    pub holding: ProductHolding,
    pub premium: f64,
}

/// Common view over canonical rows, used by the resolver and assembler.
pub trait CanonicalRow {
    fn holding(&self) -> &ProductHolding;
    fn kind(&self) -> HoldingKind;
    /// Accumulation for savings, premium for insurance
    fn amount(&self) -> f64;
}

impl CanonicalRow for SavingsProduct {
    fn holding(&self) -> &ProductHolding {
        &self.holding
    }

    fn kind(&self) -> HoldingKind {
        HoldingKind::Savings
    }

    fn amount(&self) -> f64 {
        self.accumulation
    }
}

impl CanonicalRow for InsuranceProduct {
    fn holding(&self) -> &ProductHolding {
        &self.holding
    }

    fn kind(&self) -> HoldingKind {
        HoldingKind::Insurance
    }

    fn amount(&self) -> f64 {
        self.premium
    }
}

// ============================================================================
// RECONCILIATION STATE
// ============================================================================

/// Which collections a raw row contributed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contribution {
    pub savings: bool,
    pub insurance: bool,
}

/// Canonical collections for one import.
///
/// A plain value: built fresh per import, passed and returned by value,
/// never shared between imports. Insertion order follows first sight of a key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationState {
    savings: Vec<SavingsProduct>,
    savings_index: HashMap<String, usize>,
    insurance: Vec<InsuranceProduct>,
    insurance_index: HashMap<String, usize>,
}

impl ReconciliationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one raw row into the state.
    ///
    /// Rows without a manufacturer are expected to be filtered by the
    /// ingestor; they are ignored here as well.
    pub fn apply(mut self, row: &RawRow) -> Self {
        self.add_row(row);
        self
    }

    /// In-place variant of [`apply`](Self::apply).
    pub fn add_row(&mut self, row: &RawRow) -> Contribution {
        let mut contribution = Contribution::default();
        if normalize(&row.manufacturer).is_empty() {
            return contribution;
        }

        let holding = ProductHolding::from_raw(row);

        if row.accumulation > 0.0 {
            self.upsert_savings(SavingsProduct {
                holding: holding.clone(),
                accumulation: row.accumulation,
            });
            contribution.savings = true;
        }

        if row.premium > 0.0 {
            self.upsert_insurance(InsuranceProduct {
                holding,
                premium: row.premium,
            });
            contribution.insurance = true;
        }

        contribution
    }

    fn upsert_savings(&mut self, product: SavingsProduct) {
        let key = product.holding.key();
        match self.savings_index.get(&key) {
            Some(&i) => {
                let existing = &mut self.savings[i];
                existing.accumulation = existing.accumulation.max(product.accumulation);
                existing.holding.fill_missing(&product.holding);
            }
            None => {
                self.savings_index.insert(key, self.savings.len());
                self.savings.push(product);
            }
        }
    }

    fn upsert_insurance(&mut self, product: InsuranceProduct) {
        let key = product.holding.key();
        match self.insurance_index.get(&key) {
            Some(&i) => {
                let existing = &mut self.insurance[i];
                existing.premium = existing.premium.max(product.premium);
                existing.holding.fill_missing(&product.holding);
            }
            None => {
                self.insurance_index.insert(key, self.insurance.len());
                self.insurance.push(product);
            }
        }
    }

    /// Merge another state (e.g. from a different sheet) into this one.
    pub fn merge(mut self, other: ReconciliationState) -> Self {
        for product in other.savings {
            self.upsert_savings(product);
        }
        for product in other.insurance {
            self.upsert_insurance(product);
        }
        self
    }

    pub fn savings(&self) -> &[SavingsProduct] {
        &self.savings
    }

    pub fn insurance(&self) -> &[InsuranceProduct] {
        &self.insurance
    }

    pub fn savings_by_key(&self, key: &str) -> Option<&SavingsProduct> {
        self.savings_index.get(key).map(|&i| &self.savings[i])
    }

    pub fn insurance_by_key(&self, key: &str) -> Option<&InsuranceProduct> {
        self.insurance_index.get(key).map(|&i| &self.insurance[i])
    }

    pub fn is_empty(&self) -> bool {
        self.savings.is_empty() && self.insurance.is_empty()
    }

    /// Freeze the state into its two canonical collections.
    pub fn into_collections(self) -> (Vec<SavingsProduct>, Vec<InsuranceProduct>) {
        (self.savings, self.insurance)
    }
}

/// Reconcile a batch of raw rows into a fresh state.
pub fn reconcile(rows: &[RawRow]) -> ReconciliationState {
    rows.iter()
        .fold(ReconciliationState::new(), |state, row| state.apply(row))
}

// ============================================================================
// TESTS
// ============================================================================
