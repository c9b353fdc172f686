//! Liability deduction under a methodology's debt rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use zakat_core::{FinancialInput, Liability, LiabilityClass};
use zakat_rules::{DebtDeductionPolicy, DebtRules};

const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// One liability as declared and as deducted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiabilityLine {
    pub liability: Liability,
    /// Total owed: the balance when known, otherwise a year of payments.
    pub declared: Decimal,
    pub policy: DebtDeductionPolicy,
    pub deductible: Decimal,
}

/// Amount of one liability that may be deducted.
///
/// `amount` is the monthly payment for recurring classes and the amount due
/// for non-recurring ones. A known positive `balance` caps any deduction.
pub fn deduction(
    class: LiabilityClass,
    policy: DebtDeductionPolicy,
    amount: Decimal,
    balance: Option<Decimal>,
) -> Decimal {
    let balance = balance.filter(|b| *b > Decimal::ZERO);
    let raw = match (class, policy) {
        (_, DebtDeductionPolicy::NoDeduction) => Decimal::ZERO,
        (LiabilityClass::NonRecurring, _) => amount,
        (_, DebtDeductionPolicy::Annualized) => amount * MONTHS_PER_YEAR,
        (_, DebtDeductionPolicy::CurrentMonthOnly) => amount,
        (_, DebtDeductionPolicy::FullBalance) => balance.unwrap_or(amount * MONTHS_PER_YEAR),
    };
    match balance {
        Some(b) => raw.min(b),
        None => raw,
    }
}

fn declared(class: LiabilityClass, amount: Decimal, balance: Option<Decimal>) -> Decimal {
    match (class, balance.filter(|b| *b > Decimal::ZERO)) {
        (LiabilityClass::NonRecurring, _) => amount,
        (_, Some(b)) => b,
        (_, None) => amount * MONTHS_PER_YEAR,
    }
}

/// Evaluate every liability of a sanitized input.
pub fn liability_lines(input: &FinancialInput, debts: &DebtRules) -> Vec<LiabilityLine> {
    Liability::ALL
        .iter()
        .map(|&liability| {
            let class = liability.class();
            let policy = debts.policy_for(class);
            let amount = input.get(liability.amount_field());
            let balance = liability.balance_field().map(|f| input.get(f));
            LiabilityLine {
                liability,
                declared: declared(class, amount, balance),
                policy,
                deductible: deduction(class, policy, amount, balance),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use DebtDeductionPolicy::*;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn recurring_policies() {
        let r = LiabilityClass::Recurring;
        assert_eq!(deduction(r, Annualized, d(1_000), None), d(12_000));
        assert_eq!(deduction(r, CurrentMonthOnly, d(1_000), None), d(1_000));
        assert_eq!(deduction(r, NoDeduction, d(1_000), Some(d(50_000))), d(0));
        assert_eq!(deduction(r, FullBalance, d(1_000), Some(d(50_000))), d(50_000));
    }

    #[test]
    fn full_balance_without_balance_falls_back_to_a_year() {
        assert_eq!(
            deduction(LiabilityClass::Recurring, FullBalance, d(800), None),
            d(9_600)
        );
    }

    #[test]
    fn balance_caps_annualized_deduction() {
        assert_eq!(
            deduction(LiabilityClass::Recurring, Annualized, d(2_000), Some(d(5_000))),
            d(5_000)
        );
    }

    #[test]
    fn non_recurring_is_full_unless_not_deductible() {
        let n = LiabilityClass::NonRecurring;
        for p in [Annualized, CurrentMonthOnly, FullBalance] {
            assert_eq!(deduction(n, p, d(3_000), None), d(3_000));
        }
        assert_eq!(deduction(n, NoDeduction, d(3_000), None), d(0));
    }

    #[test]
    fn lines_cover_every_liability() {
        let mut input = FinancialInput::default();
        input.housing_monthly = d(2_000);
        input.housing_balance = d(300_000);
        input.credit_card = d(4_000);
        let debts = DebtRules {
            recurring: Annualized,
            living_expenses: CurrentMonthOnly,
            non_recurring: FullBalance,
        };
        let lines = liability_lines(&input, &debts);
        assert_eq!(lines.len(), Liability::ALL.len());
        let housing = &lines[0];
        assert_eq!(housing.liability, Liability::Housing);
        assert_eq!(housing.declared, d(300_000));
        assert_eq!(housing.deductible, d(24_000));
        let cc = lines
            .iter()
            .find(|l| l.liability == Liability::CreditCard)
            .unwrap();
        assert_eq!(cc.deductible, d(4_000));
    }
}
