#![deny(warnings)]

//! Calculation engine for Zakat Flow.
//!
//! Applies a resolved methodology rule set to a financial input and produces
//! a [`CalculationResult`]:
//! - per-category gross and zakatable amounts
//! - deductible liabilities under the methodology's debt policy
//! - net zakatable wealth, nisab comparison, and the amount due
//! - purification amounts (reported, never added to the amount due)
//!
//! User data never makes a calculation fail: bad values are clamped and
//! reported in [`CalculationResult::input_issues`].

mod deductions;
mod purification;

pub use deductions::{deduction, liability_lines, LiabilityLine};
pub use purification::{purification, Purification};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use zakat_core::{
    aggregate_items, nisab_threshold, CalendarYear, CategoryKey, FinancialInput, InputField,
    InputIssue, Methodology, Sanitized,
};
use zakat_rules::{resolve_rules, rules_for, MethodologyRules, RuleContext, RulesError};

/// Errors produced by the engine. Only rule resolution can fail.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// One input field's contribution to its category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryItem {
    pub field: InputField,
    pub gross: Decimal,
    pub zakatable_fraction: Decimal,
    pub zakatable_amount: Decimal,
}

/// Totals for one asset category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCategory {
    pub key: CategoryKey,
    pub label: String,
    pub gross_total: Decimal,
    /// Effective share of `gross_total` that is zakatable.
    pub zakatable_fraction: Decimal,
    /// Always within `[0, gross_total]`.
    pub zakatable_amount: Decimal,
    pub items: Vec<CategoryItem>,
}

impl AssetCategory {
    fn from_items(key: CategoryKey, items: Vec<CategoryItem>) -> Self {
        let gross_total: Decimal = items.iter().map(|i| i.gross).sum();
        let zakatable: Decimal = items.iter().map(|i| i.zakatable_amount).sum();
        let zakatable_amount = zakatable.clamp(Decimal::ZERO, gross_total);
        let zakatable_fraction = if gross_total > Decimal::ZERO {
            zakatable_amount / gross_total
        } else {
            Decimal::ZERO
        };
        Self {
            key,
            label: key.label().to_string(),
            gross_total,
            zakatable_fraction,
            zakatable_amount,
            items,
        }
    }
}

/// Outcome of one calculation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub methodology: Methodology,
    pub rules_version: u32,
    pub calendar: CalendarYear,
    pub currency: String,
    /// Sum of gross category totals.
    pub total_assets: Decimal,
    /// Sum of zakatable category amounts, before liabilities.
    pub total_zakatable_gross: Decimal,
    /// Sum of declared liabilities.
    pub total_liabilities: Decimal,
    pub deductible_liabilities: Decimal,
    /// `max(0, total_zakatable_gross - deductible_liabilities)`.
    pub net_zakatable_wealth: Decimal,
    pub nisab_threshold: Decimal,
    pub is_above_nisab: bool,
    pub zakat_rate: Decimal,
    pub zakat_due: Decimal,
    /// Categories in declared order.
    pub per_category_breakdown: Vec<AssetCategory>,
    pub liability_breakdown: Vec<LiabilityLine>,
    pub purification: Purification,
    pub input_issues: Vec<InputIssue>,
}

impl CalculationResult {
    pub fn category(&self, key: CategoryKey) -> Option<&AssetCategory> {
        self.per_category_breakdown.iter().find(|c| c.key == key)
    }

    /// Rate actually applied to net wealth: the zakat rate above nisab, else 0.
    pub fn effective_rate(&self) -> Decimal {
        if self.is_above_nisab {
            self.zakat_rate
        } else {
            Decimal::ZERO
        }
    }
}

/// Apply `rules` to `input`.
///
/// The methodology recorded in the result is the one of `rules`; the
/// selector inside `input` is ignored here.
pub fn calculate(input: &FinancialInput, rules: &MethodologyRules) -> CalculationResult {
    let Sanitized { input, issues } = input.sanitized();
    for issue in &issues {
        warn!(
            field = issue.field.name(),
            kind = ?issue.kind,
            original = %issue.original,
            "clamped input value"
        );
    }

    let ctx = RuleContext {
        age: input.age,
        tax_rate: input.tax_rate,
    };
    let per_category_breakdown: Vec<AssetCategory> = aggregate_items(&input)
        .into_iter()
        .map(|(key, fields)| {
            let rule = rules.category(key);
            let items = fields
                .into_iter()
                .map(|(field, gross)| {
                    let zakatable_fraction = rule.treatment_for(field).fraction(&ctx);
                    CategoryItem {
                        field,
                        gross,
                        zakatable_fraction,
                        zakatable_amount: gross * zakatable_fraction,
                    }
                })
                .collect();
            AssetCategory::from_items(key, items)
        })
        .collect();

    let total_assets: Decimal = per_category_breakdown.iter().map(|c| c.gross_total).sum();
    let total_zakatable_gross: Decimal = per_category_breakdown
        .iter()
        .map(|c| c.zakatable_amount)
        .sum();

    let liability_breakdown = liability_lines(&input, &rules.debts);
    let total_liabilities: Decimal = liability_breakdown.iter().map(|l| l.declared).sum();
    let deductible_liabilities: Decimal =
        liability_breakdown.iter().map(|l| l.deductible).sum();

    let net_zakatable_wealth = (total_zakatable_gross - deductible_liabilities).max(Decimal::ZERO);

    let nisab = match input.nisab_override {
        Some(n) if n > Decimal::ZERO => n,
        _ => nisab_threshold(input.nisab_standard, &input.metal_prices),
    };
    let is_above_nisab = net_zakatable_wealth > Decimal::ZERO && net_zakatable_wealth >= nisab;
    let zakat_rate = input.calendar.zakat_rate();
    let zakat_due = if is_above_nisab {
        net_zakatable_wealth * zakat_rate
    } else {
        Decimal::ZERO
    };

    debug!(
        methodology = %rules.methodology,
        %total_zakatable_gross,
        %deductible_liabilities,
        %net_zakatable_wealth,
        %nisab,
        %zakat_due,
        "zakat calculated"
    );

    CalculationResult {
        methodology: rules.methodology,
        rules_version: rules.version,
        calendar: input.calendar,
        currency: input.currency.clone(),
        total_assets,
        total_zakatable_gross,
        total_liabilities,
        deductible_liabilities,
        net_zakatable_wealth,
        nisab_threshold: nisab,
        is_above_nisab,
        zakat_rate,
        zakat_due,
        purification: purification(&input),
        per_category_breakdown,
        liability_breakdown,
        input_issues: issues,
    }
}

/// Calculate with the methodology selected in the input record.
pub fn calculate_for(input: &FinancialInput) -> CalculationResult {
    calculate(input, rules_for(input.methodology))
}

/// Calculate with a methodology given by identifier; unknown ids fail fast.
pub fn calculate_with_id(
    input: &FinancialInput,
    methodology_id: &str,
) -> Result<CalculationResult, EngineError> {
    let rules = resolve_rules(methodology_id)?;
    Ok(calculate(input, rules))
}
