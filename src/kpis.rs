// 📊 Portfolio KPIs - totals and accumulation-weighted averages for the report layer

use crate::assemble::NormalizedProduct;
use crate::reconcile::{HoldingKind, InsuranceProduct, SavingsProduct};
use crate::resolver::ResolutionTier;
use crate::taxonomy::Exposure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsKpis {
    pub count: usize,
    pub total_accumulation: f64,
    pub weighted_avg_deposit_fee: f64,
    pub weighted_avg_accumulation_fee: f64,
    /// Per field, averaged over the products that carry it
    pub weighted_exposure: Option<Exposure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceKpis {
    pub count: usize,
    pub total_premium: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioKpis {
    pub savings: SavingsKpis,
    pub insurance: InsuranceKpis,
    pub resolved: usize,
    pub unresolved: usize,
}

/// Running weighted mean; zero weight yields `None`.
#[derive(Debug, Clone, Copy, Default)]
struct WeightedMean {
    sum: f64,
    weight: f64,
}

impl WeightedMean {
    fn add(&mut self, value: f64, weight: f64) {
        if value.is_finite() && weight.is_finite() && weight > 0.0 {
            self.sum += value * weight;
            self.weight += weight;
        }
    }

    fn value(&self) -> Option<f64> {
        if self.weight > 0.0 {
            Some(self.sum / self.weight)
        } else {
            None
        }
    }
}

pub fn savings_kpis(savings: &[SavingsProduct], resolved: &[NormalizedProduct]) -> SavingsKpis {
    let mut deposit_fee = WeightedMean::default();
    let mut accumulation_fee = WeightedMean::default();

    // A zero fee means the sheet had none; it carries no weight
    for product in savings {
        if product.holding.deposit_fee != 0.0 {
            deposit_fee.add(product.holding.deposit_fee, product.accumulation);
        }
        if product.holding.accumulation_fee != 0.0 {
            accumulation_fee.add(product.holding.accumulation_fee, product.accumulation);
        }
    }

    let mut exposure = [WeightedMean::default(); 6];
    for product in resolved.iter().filter(|p| p.kind == HoldingKind::Savings) {
        for (mean, value) in exposure.iter_mut().zip(product.exposure().fields()) {
            if let Some(value) = value {
                mean.add(value, product.amount);
            }
        }
    }

    let weighted_exposure = Exposure::from_fields(exposure.map(|m| m.value()));

    SavingsKpis {
        count: savings.len(),
        total_accumulation: savings.iter().map(|p| p.accumulation).sum(),
        weighted_avg_deposit_fee: deposit_fee.value().unwrap_or(0.0),
        weighted_avg_accumulation_fee: accumulation_fee.value().unwrap_or(0.0),
        weighted_exposure: Some(weighted_exposure).filter(Exposure::has_any),
    }
}

pub fn insurance_kpis(insurance: &[InsuranceProduct]) -> InsuranceKpis {
    InsuranceKpis {
        count: insurance.len(),
        total_premium: insurance.iter().map(|p| p.premium).sum(),
    }
}

pub fn compute_kpis(
    savings: &[SavingsProduct],
    insurance: &[InsuranceProduct],
    resolved: &[NormalizedProduct],
) -> PortfolioKpis {
    let matched = resolved
        .iter()
        .filter(|p| p.tier != ResolutionTier::NoMatch)
        .count();

    PortfolioKpis {
        savings: savings_kpis(savings, resolved),
        insurance: insurance_kpis(insurance),
        resolved: matched,
        unresolved: resolved.len() - matched,
    }
}

// ============================================================================
// TESTS
// ============================================================================
