//! Asset categories, liability kinds, and the Category Aggregator.

use crate::input::{FieldKind, FinancialInput, InputField};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Semantic asset category.
///
/// Declaration order is significant: the flow allocator consumes
/// liabilities against categories in this order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKey {
    Liquid,
    Investments,
    Retirement,
    Metals,
    Crypto,
    RealEstate,
    Business,
    Receivables,
    Trusts,
    Illiquid,
}

impl CategoryKey {
    /// All categories in declared order.
    pub const ALL: &'static [CategoryKey] = &[
        CategoryKey::Liquid,
        CategoryKey::Investments,
        CategoryKey::Retirement,
        CategoryKey::Metals,
        CategoryKey::Crypto,
        CategoryKey::RealEstate,
        CategoryKey::Business,
        CategoryKey::Receivables,
        CategoryKey::Trusts,
        CategoryKey::Illiquid,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CategoryKey::Liquid => "Cash & Savings",
            CategoryKey::Investments => "Investments",
            CategoryKey::Retirement => "Retirement",
            CategoryKey::Metals => "Precious Metals",
            CategoryKey::Crypto => "Crypto",
            CategoryKey::RealEstate => "Real Estate",
            CategoryKey::Business => "Business",
            CategoryKey::Receivables => "Receivables",
            CategoryKey::Trusts => "Trusts",
            CategoryKey::Illiquid => "Illiquid Assets",
        }
    }

    /// Input fields that feed this category, in declaration order.
    pub fn fields(self) -> impl Iterator<Item = InputField> {
        InputField::ALL
            .iter()
            .copied()
            .filter(move |f| f.kind() == FieldKind::Asset(self))
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a liability is treated by a deduction policy.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LiabilityClass {
    /// Debt repaid in monthly installments with an outstanding balance.
    Recurring,
    /// Monthly spending with no balance behind it.
    LivingExpenses,
    /// Amount due now in full.
    NonRecurring,
}

/// Kind of liability declared by the user.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Liability {
    Housing,
    StudentLoan,
    Vehicle,
    LivingExpenses,
    CreditCard,
    UnpaidBills,
    TaxesOwed,
}

impl Liability {
    pub const ALL: &'static [Liability] = &[
        Liability::Housing,
        Liability::StudentLoan,
        Liability::Vehicle,
        Liability::LivingExpenses,
        Liability::CreditCard,
        Liability::UnpaidBills,
        Liability::TaxesOwed,
    ];

    pub fn class(self) -> LiabilityClass {
        match self {
            Liability::Housing | Liability::StudentLoan | Liability::Vehicle => {
                LiabilityClass::Recurring
            }
            Liability::LivingExpenses => LiabilityClass::LivingExpenses,
            Liability::CreditCard | Liability::UnpaidBills | Liability::TaxesOwed => {
                LiabilityClass::NonRecurring
            }
        }
    }

    /// Field holding the monthly payment (recurring) or amount due (non-recurring).
    pub fn amount_field(self) -> InputField {
        match self {
            Liability::Housing => InputField::HousingMonthly,
            Liability::StudentLoan => InputField::StudentLoanMonthly,
            Liability::Vehicle => InputField::VehicleMonthly,
            Liability::LivingExpenses => InputField::LivingExpensesMonthly,
            Liability::CreditCard => InputField::CreditCard,
            Liability::UnpaidBills => InputField::UnpaidBills,
            Liability::TaxesOwed => InputField::TaxesOwed,
        }
    }

    /// Field holding the outstanding balance, for debts that have one.
    pub fn balance_field(self) -> Option<InputField> {
        match self {
            Liability::Housing => Some(InputField::HousingBalance),
            Liability::StudentLoan => Some(InputField::StudentLoanBalance),
            Liability::Vehicle => Some(InputField::VehicleBalance),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Liability::Housing => "Housing",
            Liability::StudentLoan => "Student loans",
            Liability::Vehicle => "Vehicle loans",
            Liability::LivingExpenses => "Living expenses",
            Liability::CreditCard => "Credit cards",
            Liability::UnpaidBills => "Unpaid bills",
            Liability::TaxesOwed => "Taxes owed",
        }
    }
}

/// Sum raw asset fields into a gross total per category.
///
/// Every category is present in the result, zero when nothing was declared.
/// Negative entries count as zero.
pub fn aggregate(input: &FinancialInput) -> BTreeMap<CategoryKey, Decimal> {
    aggregate_items(input)
        .into_iter()
        .map(|(key, items)| (key, items.iter().map(|(_, v)| *v).sum()))
        .collect()
}

/// Like [`aggregate`] but keeps the contributing fields of each category.
pub fn aggregate_items(input: &FinancialInput) -> BTreeMap<CategoryKey, Vec<(InputField, Decimal)>> {
    CategoryKey::ALL
        .iter()
        .map(|&key| {
            let items = key
                .fields()
                .map(|f| (f, input.get(f).max(Decimal::ZERO)))
                .collect();
            (key, items)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn every_asset_field_belongs_to_exactly_one_category() {
        let mut seen = 0;
        for key in CategoryKey::ALL {
            seen += key.fields().count();
        }
        let assets = InputField::ALL
            .iter()
            .filter(|f| matches!(f.kind(), FieldKind::Asset(_)))
            .count();
        assert_eq!(seen, assets);
        for key in CategoryKey::ALL {
            assert!(key.fields().count() > 0, "{key:?} has no fields");
        }
    }

    #[test]
    fn liability_fields_point_back_to_their_liability() {
        for l in Liability::ALL {
            assert_eq!(l.amount_field().kind(), FieldKind::Liability(*l));
            if let Some(b) = l.balance_field() {
                assert_eq!(b.kind(), FieldKind::LiabilityBalance(*l));
                assert_eq!(l.class(), LiabilityClass::Recurring);
            }
        }
    }

    #[test]
    fn aggregate_sums_per_category() {
        let mut input = FinancialInput::default();
        input.checking = Decimal::new(10_000, 0);
        input.savings = Decimal::new(2_500, 0);
        input.passive_investments = Decimal::new(50_000, 0);
        input.credit_card = Decimal::new(999, 0);
        let totals = aggregate(&input);
        assert_eq!(totals.len(), CategoryKey::ALL.len());
        assert_eq!(totals[&CategoryKey::Liquid], Decimal::new(12_500, 0));
        assert_eq!(totals[&CategoryKey::Investments], Decimal::new(50_000, 0));
        assert_eq!(totals[&CategoryKey::Crypto], Decimal::ZERO);
    }

    #[test]
    fn aggregate_ignores_negative_entries() {
        let mut input = FinancialInput::default();
        input.gold = Decimal::new(-300, 0);
        input.silver = Decimal::new(200, 0);
        assert_eq!(aggregate(&input)[&CategoryKey::Metals], Decimal::new(200, 0));
    }

    proptest! {
        #[test]
        fn aggregate_total_matches_field_sum(vals in proptest::collection::vec(0i64..1_000_000, 28)) {
            let mut input = FinancialInput::default();
            let assets: Vec<InputField> = InputField::ALL
                .iter()
                .copied()
                .filter(|f| matches!(f.kind(), FieldKind::Asset(_)))
                .collect();
            let mut expected = Decimal::ZERO;
            for (f, v) in assets.iter().zip(vals.iter()) {
                *input.get_mut(*f) = Decimal::new(*v, 2);
                expected += Decimal::new(*v, 2);
            }
            let total: Decimal = aggregate(&input).values().copied().sum();
            prop_assert_eq!(total, expected);
        }
    }
}
