//! Conservation-preserving partition of zakatable value.
//!
//! Deductible liabilities are consumed greedily against categories in their
//! declared order ([`CategoryKey::ALL`]). What remains of each category is
//! its net value, split into the obligation (net times the effective rate)
//! and the retained rest. No geometry here; see `layout` for pixels.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zakat_core::CategoryKey;
use zakat_engine::CalculationResult;

use crate::FlowError;

/// Relative tolerance for conservation checks.
pub const CONSERVATION_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Where one category's zakatable value goes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowPartition {
    pub category: CategoryKey,
    pub label: String,
    pub zakatable_amount: Decimal,
    pub liability_portion: Decimal,
    pub retained_portion: Decimal,
    pub obligation_portion: Decimal,
}

impl FlowPartition {
    /// Value left after liabilities, before the obligation is taken.
    pub fn net_portion(&self) -> Decimal {
        self.retained_portion + self.obligation_portion
    }
}

/// Partitions for every category plus liability that found no asset to offset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowAllocation {
    /// Categories in declared order, zero-valued ones included.
    pub partitions: Vec<FlowPartition>,
    pub deductible_liabilities: Decimal,
    /// Deductible liability exceeding total zakatable assets.
    pub excess_liability: Decimal,
    pub zakat_due: Decimal,
}

fn within_tolerance(expected: Decimal, actual: Decimal) -> bool {
    let scale = expected.abs().max(Decimal::ONE);
    (expected - actual).abs() <= CONSERVATION_TOLERANCE * scale
}

impl FlowAllocation {
    pub fn total_obligation(&self) -> Decimal {
        self.partitions.iter().map(|p| p.obligation_portion).sum()
    }

    pub fn total_liability_offset(&self) -> Decimal {
        self.partitions.iter().map(|p| p.liability_portion).sum()
    }

    pub fn total_retained(&self) -> Decimal {
        self.partitions.iter().map(|p| p.retained_portion).sum()
    }

    /// Verify that every partition accounts for its whole value, that the
    /// obligations add up to the amount due, and that liabilities are either
    /// offset or reported as excess.
    pub fn check_conservation(&self) -> Result<(), FlowError> {
        for p in &self.partitions {
            let parts = [p.liability_portion, p.retained_portion, p.obligation_portion];
            let sum: Decimal = parts.iter().sum();
            if parts.iter().any(|v| *v < Decimal::ZERO)
                || !within_tolerance(p.zakatable_amount, sum)
            {
                return Err(FlowError::ConservationViolation {
                    category: Some(p.category),
                    expected: p.zakatable_amount,
                    actual: sum,
                });
            }
        }
        let obligation = self.total_obligation();
        if !within_tolerance(self.zakat_due, obligation) {
            return Err(FlowError::ConservationViolation {
                category: None,
                expected: self.zakat_due,
                actual: obligation,
            });
        }
        let offset = self.total_liability_offset() + self.excess_liability;
        if !within_tolerance(self.deductible_liabilities, offset) {
            return Err(FlowError::ConservationViolation {
                category: None,
                expected: self.deductible_liabilities,
                actual: offset,
            });
        }
        Ok(())
    }

    /// Rescale obligation portions so they add up to `zakat_due`, moving the
    /// difference to or from retained value. Any rounding remainder lands on
    /// the last category that carries net value.
    fn reconcile(&mut self) {
        let net_total: Decimal = self.partitions.iter().map(|p| p.net_portion()).sum();
        let due = self.zakat_due.clamp(Decimal::ZERO, net_total);
        if net_total > Decimal::ZERO {
            let share = due / net_total;
            for p in &mut self.partitions {
                let net = p.net_portion();
                p.obligation_portion = net * share;
                p.retained_portion = net - p.obligation_portion;
            }
        }
        let diff = due - self.total_obligation();
        if let Some(p) = self
            .partitions
            .iter_mut()
            .rev()
            .find(|p| p.net_portion() > Decimal::ZERO)
        {
            let net = p.net_portion();
            p.obligation_portion = (p.obligation_portion + diff).clamp(Decimal::ZERO, net);
            p.retained_portion = net - p.obligation_portion;
        }
        self.zakat_due = due;
    }
}

fn partition(result: &CalculationResult) -> FlowAllocation {
    let rate = result.effective_rate();
    let mut remaining = result.deductible_liabilities.max(Decimal::ZERO);
    let partitions = result
        .per_category_breakdown
        .iter()
        .map(|cat| {
            let zakatable = cat.zakatable_amount.max(Decimal::ZERO);
            let liability_portion = remaining.min(zakatable);
            remaining -= liability_portion;
            let net = zakatable - liability_portion;
            let obligation_portion = net * rate;
            FlowPartition {
                category: cat.key,
                label: cat.label.clone(),
                zakatable_amount: zakatable,
                liability_portion,
                retained_portion: net - obligation_portion,
                obligation_portion,
            }
        })
        .collect();
    FlowAllocation {
        partitions,
        deductible_liabilities: result.deductible_liabilities.max(Decimal::ZERO),
        excess_liability: remaining,
        zakat_due: result.zakat_due,
    }
}

/// Partition a calculation result, failing on any conservation breach.
pub fn try_allocate(result: &CalculationResult) -> Result<FlowAllocation, FlowError> {
    let allocation = partition(result);
    allocation.check_conservation()?;
    Ok(allocation)
}

/// Partition a calculation result.
///
/// A conservation breach can only come from a result that was altered after
/// calculation; it is logged and the obligations are rescaled to the amount
/// due so the diagram never shows a figure different from the report.
pub fn allocate(result: &CalculationResult) -> FlowAllocation {
    let mut allocation = partition(result);
    if let Err(err) = allocation.check_conservation() {
        warn!(%err, "flow allocation out of balance, reconciling to amount due");
        allocation.reconcile();
    }
    if allocation.excess_liability > Decimal::ZERO {
        debug!(excess = %allocation.excess_liability, "liabilities exceed zakatable assets");
    }
    allocation
}

#[cfg(test)]
mod tests {
    use super::*;
    use zakat_core::{FinancialInput, Methodology};
    use zakat_engine::calculate_for;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn credit_card_larger_than_single_category() {
        let mut input = FinancialInput::default();
        input.checking = d(10_000);
        input.credit_card = d(30_000);
        let alloc = allocate(&calculate_for(&input));
        let liquid = &alloc.partitions[0];
        assert_eq!(liquid.category, CategoryKey::Liquid);
        assert_eq!(liquid.liability_portion, d(10_000));
        assert_eq!(liquid.net_portion(), Decimal::ZERO);
        assert_eq!(alloc.excess_liability, d(20_000));
        alloc.check_conservation().unwrap();
    }

    #[test]
    fn liabilities_consumed_in_declared_order() {
        let mut input = FinancialInput::default();
        input.savings = d(5_000);
        input.gold = d(8_000);
        input.crypto_currency = d(4_000);
        input.unpaid_bills = d(9_000);
        input.methodology = Methodology::Hanafi;
        let alloc = allocate(&calculate_for(&input));
        let by = |k| {
            alloc
                .partitions
                .iter()
                .find(|p| p.category == k)
                .unwrap()
                .clone()
        };
        assert_eq!(by(CategoryKey::Liquid).liability_portion, d(5_000));
        assert_eq!(by(CategoryKey::Metals).liability_portion, d(4_000));
        assert_eq!(by(CategoryKey::Crypto).liability_portion, Decimal::ZERO);
        assert_eq!(alloc.excess_liability, Decimal::ZERO);
    }

    #[test]
    fn obligations_sum_to_zakat_due() {
        let mut input = FinancialInput::default();
        input.checking = d(10_000);
        input.passive_investments = d(50_000);
        let result = calculate_for(&input);
        let alloc = try_allocate(&result).unwrap();
        assert_eq!(alloc.total_obligation(), result.zakat_due);
        assert_eq!(alloc.total_obligation(), d(625));
        assert_eq!(alloc.total_retained(), d(25_000) - d(625));
    }

    #[test]
    fn below_nisab_keeps_everything() {
        let mut input = FinancialInput::default();
        input.cash_on_hand = d(100);
        input.nisab_override = Some(d(1_000));
        let alloc = allocate(&calculate_for(&input));
        assert_eq!(alloc.total_obligation(), Decimal::ZERO);
        assert_eq!(alloc.total_retained(), d(100));
    }

    #[test]
    fn tampered_result_is_detected_and_reconciled() {
        let mut input = FinancialInput::default();
        input.checking = d(40_000);
        input.gold = d(20_000);
        let mut result = calculate_for(&input);
        result.zakat_due = d(900);

        assert!(matches!(
            try_allocate(&result),
            Err(FlowError::ConservationViolation { category: None, .. })
        ));

        let alloc = allocate(&result);
        alloc.check_conservation().unwrap();
        assert_eq!(alloc.total_obligation(), d(900));
    }

    #[test]
    fn reconciling_large_tampered_values_does_not_overflow() {
        let mut input = FinancialInput::default();
        input.checking = d(40_000);
        input.gold = d(20_000);
        let mut result = calculate_for(&input);
        let huge = d(1_000_000_000_000_000_000) * d(100);
        result.per_category_breakdown[0].zakatable_amount = huge;
        result.zakat_due = huge / d(10);

        let alloc = allocate(&result);
        alloc.check_conservation().unwrap();
        assert_eq!(alloc.zakat_due, huge / d(10));
        assert_eq!(alloc.partitions[0].zakatable_amount, huge);
    }
}
