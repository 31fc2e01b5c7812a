// 🧩 Product Assembler - canonical row + resolved match → normalized product
//
// Pure: no taxonomy access, no logging. Category and company fall back to the
// raw text when the resolver left them null; sub-category never does.

use crate::reconcile::{CanonicalRow, HoldingKind};
use crate::resolver::{ResolutionTier, ResolvedMatch};
use crate::taxonomy::Exposure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether the portfolio is the client's current one or a proposed one.
///
/// Supplied by the caller, never inferred from the workbook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    #[default]
    Current,
    Recommended,
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductType::Current => write!(f, "current"),
            ProductType::Recommended => write!(f, "recommended"),
        }
    }
}

impl FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "current" => Ok(ProductType::Current),
            "recommended" => Ok(ProductType::Recommended),
            other => Err(format!("unknown product type '{}' (expected current or recommended)", other)),
        }
    }
}

/// Final record handed to reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedProduct {
    // Canonical row
    pub kind: HoldingKind,
    pub product_type: String,
    pub manufacturer: String,
    pub product_name: String,
    pub policy_number: String,
    pub investment_track: String,
    pub amount: f64,
    pub deposit_fee: f64,
    pub accumulation_fee: f64,

    // Resolved dimensions
    pub category: String,
    pub company: String,
    pub sub_category: Option<String>,
    pub product_number: Option<String>,

    // Exposure
    pub stocks: Option<f64>,
    pub bonds: Option<f64>,
    pub foreign_currency: Option<f64>,
    pub foreign_investments: Option<f64>,
    pub israel: Option<f64>,
    pub illiquid_assets: Option<f64>,
    pub asset_composition: Option<String>,
    pub include_exposure_data: bool,

    #[serde(rename = "type")]
    pub product_kind: ProductType,
    pub tier: ResolutionTier,
}

impl NormalizedProduct {
    pub fn exposure(&self) -> Exposure {
        Exposure {
            stocks: self.stocks,
            bonds: self.bonds,
            foreign_currency: self.foreign_currency,
            foreign_investments: self.foreign_investments,
            israel: self.israel,
            illiquid_assets: self.illiquid_assets,
        }
    }
}

/// Combine a canonical row with its resolver output.
pub fn assemble<R: CanonicalRow + ?Sized>(row: &R, resolved: &ResolvedMatch, product_type: ProductType) -> NormalizedProduct {
    let holding = row.holding();
    let exposure = resolved.exposure.clone().unwrap_or_default();

    // An explicit number from the sheet is kept when the resolver found none
    let product_number = resolved
        .product_number
        .clone()
        .or_else(|| Some(holding.product_number.clone()).filter(|n| !n.is_empty()));

    NormalizedProduct {
        kind: row.kind(),
        product_type: holding.product_type.clone(),
        manufacturer: holding.manufacturer.clone(),
        product_name: holding.product_name.clone(),
        policy_number: holding.policy_number.clone(),
        investment_track: holding.investment_track.clone(),
        amount: row.amount(),
        deposit_fee: holding.deposit_fee,
        accumulation_fee: holding.accumulation_fee,

        category: resolved
            .category
            .clone()
            .unwrap_or_else(|| holding.product_type.clone()),
        company: resolved
            .company
            .clone()
            .unwrap_or_else(|| holding.manufacturer.clone()),
        sub_category: resolved.sub_category.clone(),
        product_number,

        stocks: exposure.stocks,
        bonds: exposure.bonds,
        foreign_currency: exposure.foreign_currency,
        foreign_investments: exposure.foreign_investments,
        israel: exposure.israel,
        illiquid_assets: exposure.illiquid_assets,
        asset_composition: resolved.asset_composition.clone(),
        include_exposure_data: exposure.has_any(),

        product_kind: product_type,
        tier: resolved.tier,
    }
}

// ============================================================================
// TESTS
// ============================================================================
