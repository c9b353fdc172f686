//! Flat financial input record and the field table that describes it.

use crate::category::{CategoryKey, Liability};
use crate::nisab::MetalPrices;
use crate::{CalendarYear, Methodology, NisabStandard};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// What a numeric input field represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Asset value belonging to a category.
    Asset(CategoryKey),
    /// Amount owed: a monthly payment for recurring debts, a balance otherwise.
    Liability(Liability),
    /// Total outstanding balance of a recurring debt.
    LiabilityBalance(Liability),
    /// Income that must be given away rather than kept.
    Purification,
    /// Fraction in [0, 1].
    Rate,
    /// Age in years.
    Age,
}

// Generates `InputField`, the numeric part of `FinancialInput`, and the
// accessors tying the two together. Variant and field names must stay in
// sync under snake_case so that serde names and `InputField::name` agree.
macro_rules! input_fields {
    ($( $(#[$meta:meta])* $variant:ident => $field:ident, $label:literal, $kind:expr; )+) => {
        /// Named numeric field of [`FinancialInput`].
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum InputField {
            $( $variant, )+
        }

        impl InputField {
            /// Every field in declaration order.
            pub const ALL: &'static [InputField] = &[ $( InputField::$variant, )+ ];

            /// Field name as used in serialized input.
            pub fn name(self) -> &'static str {
                match self {
                    $( InputField::$variant => stringify!($field), )+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $( InputField::$variant => $label, )+
                }
            }

            pub fn kind(self) -> FieldKind {
                match self {
                    $( InputField::$variant => $kind, )+
                }
            }
        }

        /// Declared financial position of one user.
        ///
        /// Created by the form layer and updated one field at a time. Unknown
        /// fields are ignored on deserialization so older engines accept
        /// newer input records.
        #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct FinancialInput {
            pub methodology: Methodology,
            pub calendar: CalendarYear,
            pub nisab_standard: NisabStandard,
            pub metal_prices: MetalPrices,
            /// Threshold supplied directly by the caller; wins over metal prices when positive.
            pub nisab_override: Option<Decimal>,
            /// ISO 4217 code, carried through for reports only.
            pub currency: String,
            $( $(#[$meta])* pub $field: Decimal, )+
        }

        impl FinancialInput {
            /// Value of a numeric field.
            pub fn get(&self, field: InputField) -> Decimal {
                match field {
                    $( InputField::$variant => self.$field, )+
                }
            }

            pub fn get_mut(&mut self, field: InputField) -> &mut Decimal {
                match field {
                    $( InputField::$variant => &mut self.$field, )+
                }
            }
        }
    };
}

input_fields! {
    CashOnHand => cash_on_hand, "Cash on hand", FieldKind::Asset(CategoryKey::Liquid);
    Checking => checking, "Checking accounts", FieldKind::Asset(CategoryKey::Liquid);
    Savings => savings, "Savings accounts", FieldKind::Asset(CategoryKey::Liquid);
    DigitalWallets => digital_wallets, "Digital wallets", FieldKind::Asset(CategoryKey::Liquid);
    ForeignCurrency => foreign_currency, "Foreign currency", FieldKind::Asset(CategoryKey::Liquid);

    /// Shares traded for short-term gain.
    ActiveInvestments => active_investments, "Active investments", FieldKind::Asset(CategoryKey::Investments);
    /// Long-term holdings such as index funds.
    PassiveInvestments => passive_investments, "Passive investments", FieldKind::Asset(CategoryKey::Investments);
    ReitHoldings => reit_holdings, "REIT holdings", FieldKind::Asset(CategoryKey::Investments);

    EmployerPlan => employer_plan, "401(k) / 403(b)", FieldKind::Asset(CategoryKey::Retirement);
    TraditionalIra => traditional_ira, "Traditional IRA", FieldKind::Asset(CategoryKey::Retirement);
    RothIra => roth_ira, "Roth IRA", FieldKind::Asset(CategoryKey::Retirement);

    Gold => gold, "Gold", FieldKind::Asset(CategoryKey::Metals);
    Silver => silver, "Silver", FieldKind::Asset(CategoryKey::Metals);
    /// Jewelry worn regularly, valued at melt price.
    PersonalJewelry => personal_jewelry, "Personal jewelry", FieldKind::Asset(CategoryKey::Metals);

    CryptoCurrency => crypto_currency, "Cryptocurrency", FieldKind::Asset(CategoryKey::Crypto);
    CryptoTrading => crypto_trading, "Crypto trading", FieldKind::Asset(CategoryKey::Crypto);
    StakedAssets => staked_assets, "Staked assets", FieldKind::Asset(CategoryKey::Crypto);

    PropertyForSale => property_for_sale, "Property for sale", FieldKind::Asset(CategoryKey::RealEstate);
    LandInvestment => land_investment, "Land held for investment", FieldKind::Asset(CategoryKey::RealEstate);

    BusinessCash => business_cash, "Business cash", FieldKind::Asset(CategoryKey::Business);
    BusinessReceivables => business_receivables, "Business receivables", FieldKind::Asset(CategoryKey::Business);
    BusinessInventory => business_inventory, "Business inventory", FieldKind::Asset(CategoryKey::Business);

    /// Loans the user expects to be repaid.
    GoodDebts => good_debts, "Money owed to you", FieldKind::Asset(CategoryKey::Receivables);
    /// Loans unlikely to be repaid.
    DoubtfulDebts => doubtful_debts, "Doubtful debts", FieldKind::Asset(CategoryKey::Receivables);

    RevocableTrust => revocable_trust, "Revocable trust", FieldKind::Asset(CategoryKey::Trusts);
    IrrevocableTrust => irrevocable_trust, "Irrevocable trust", FieldKind::Asset(CategoryKey::Trusts);

    IlliquidAssets => illiquid_assets, "Illiquid assets for sale", FieldKind::Asset(CategoryKey::Illiquid);

    HousingMonthly => housing_monthly, "Mortgage or rent (monthly)", FieldKind::Liability(Liability::Housing);
    HousingBalance => housing_balance, "Mortgage balance", FieldKind::LiabilityBalance(Liability::Housing);
    StudentLoanMonthly => student_loan_monthly, "Student loan (monthly)", FieldKind::Liability(Liability::StudentLoan);
    StudentLoanBalance => student_loan_balance, "Student loan balance", FieldKind::LiabilityBalance(Liability::StudentLoan);
    VehicleMonthly => vehicle_monthly, "Vehicle loan (monthly)", FieldKind::Liability(Liability::Vehicle);
    VehicleBalance => vehicle_balance, "Vehicle loan balance", FieldKind::LiabilityBalance(Liability::Vehicle);
    LivingExpensesMonthly => living_expenses_monthly, "Living expenses (monthly)", FieldKind::Liability(Liability::LivingExpenses);
    CreditCard => credit_card, "Credit card balance", FieldKind::Liability(Liability::CreditCard);
    UnpaidBills => unpaid_bills, "Unpaid bills", FieldKind::Liability(Liability::UnpaidBills);
    TaxesOwed => taxes_owed, "Taxes owed", FieldKind::Liability(Liability::TaxesOwed);

    InterestIncome => interest_income, "Interest income", FieldKind::Purification;
    DividendIncome => dividend_income, "Dividend income", FieldKind::Purification;
    /// Share of dividends earned from impermissible business lines.
    ImpermissibleDividendFraction => impermissible_dividend_fraction, "Impermissible dividend share", FieldKind::Rate;

    /// Combined marginal tax rate applied on retirement withdrawals.
    TaxRate => tax_rate, "Estimated tax rate", FieldKind::Rate;
    Age => age, "Age", FieldKind::Age;
}

impl FromStr for InputField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputField::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or(())
    }
}

/// Outcome of a single-field update from the form layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldUpdate {
    Applied,
    /// Stored as a substitute because the raw value could not be used: zero
    /// for NaN and infinities, [`MAX_AMOUNT`] for finite values out of range.
    Clamped(IssueKind),
    /// Unknown field name; nothing changed.
    Ignored,
}

/// Why a value was clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Negative,
    NotFinite,
    /// Rate above 1.
    AboveOne,
    /// Amount above [`MAX_AMOUNT`].
    TooLarge,
}

/// Largest amount accepted for any field (one quadrillion).
///
/// Keeps every sum and product the engine forms far inside `Decimal` range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Input value an issue refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSource {
    Field(InputField),
    GoldPrice,
    SilverPrice,
}

impl IssueSource {
    pub fn name(self) -> &'static str {
        match self {
            IssueSource::Field(f) => f.name(),
            IssueSource::GoldPrice => "gold_per_gram",
            IssueSource::SilverPrice => "silver_per_gram",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IssueSource::Field(f) => f.label(),
            IssueSource::GoldPrice => "Gold price per gram",
            IssueSource::SilverPrice => "Silver price per gram",
        }
    }
}

impl From<InputField> for IssueSource {
    fn from(field: InputField) -> Self {
        IssueSource::Field(field)
    }
}

/// Non-fatal input problem repaired during sanitizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputIssue {
    pub field: IssueSource,
    pub kind: IssueKind,
    /// Value as entered.
    pub original: Decimal,
    /// Value used for the calculation.
    pub replaced_with: Decimal,
}

/// Sanitized copy of an input with the repairs that were applied.
#[derive(Clone, Debug, PartialEq)]
pub struct Sanitized {
    pub input: FinancialInput,
    pub issues: Vec<InputIssue>,
}

impl FinancialInput {
    /// Set a field by its serialized name. Unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: Decimal) -> FieldUpdate {
        match name.parse::<InputField>() {
            Ok(field) => {
                *self.get_mut(field) = value;
                FieldUpdate::Applied
            }
            Err(()) => {
                debug!(field = name, "ignoring unknown input field");
                FieldUpdate::Ignored
            }
        }
    }

    /// Set a field from raw floating-point entry.
    ///
    /// NaN and infinities become 0. Finite values beyond `Decimal` range
    /// become [`MAX_AMOUNT`] with the sign of the entry.
    pub fn set_field_f64(&mut self, name: &str, value: f64) -> FieldUpdate {
        let (stored, kind) = match Decimal::from_f64(value) {
            Some(d) if value.is_finite() => return self.set_field(name, d),
            None if value.is_finite() && value.is_sign_negative() => {
                (-MAX_AMOUNT, IssueKind::TooLarge)
            }
            None if value.is_finite() => (MAX_AMOUNT, IssueKind::TooLarge),
            _ => (Decimal::ZERO, IssueKind::NotFinite),
        };
        match self.set_field(name, stored) {
            FieldUpdate::Applied => FieldUpdate::Clamped(kind),
            other => other,
        }
    }

    /// Return a copy where every numeric field is usable.
    ///
    /// Negative values clamp to 0, rates clamp to [0, 1]. Nothing is
    /// rejected: a half-filled form still yields a report.
    pub fn sanitized(&self) -> Sanitized {
        let mut input = self.clone();
        let mut issues = Vec::new();
        for &field in InputField::ALL {
            let original = input.get(field);
            let repaired = if original < Decimal::ZERO {
                Some((IssueKind::Negative, Decimal::ZERO))
            } else if field.kind() == FieldKind::Rate && original > Decimal::ONE {
                Some((IssueKind::AboveOne, Decimal::ONE))
            } else if original > MAX_AMOUNT {
                Some((IssueKind::TooLarge, MAX_AMOUNT))
            } else {
                None
            };
            if let Some((kind, replaced_with)) = repaired {
                *input.get_mut(field) = replaced_with;
                issues.push(InputIssue {
                    field: field.into(),
                    kind,
                    original,
                    replaced_with,
                });
            }
        }
        if let Some(n) = input.nisab_override {
            if n < Decimal::ZERO || n > MAX_AMOUNT {
                input.nisab_override = None;
            }
        }
        let prices = input.metal_prices.sanitized();
        let quoted = [
            (
                IssueSource::GoldPrice,
                input.metal_prices.gold_per_gram,
                prices.gold_per_gram,
            ),
            (
                IssueSource::SilverPrice,
                input.metal_prices.silver_per_gram,
                prices.silver_per_gram,
            ),
        ];
        for (field, original, replaced_with) in quoted {
            // A zero price means no quote was given; the fallback is silent.
            let kind = if original < Decimal::ZERO {
                IssueKind::Negative
            } else if original > MAX_AMOUNT {
                IssueKind::TooLarge
            } else {
                continue;
            };
            issues.push(InputIssue {
                field,
                kind,
                original,
                replaced_with,
            });
        }
        input.metal_prices = prices;
        Sanitized { input, issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn field_names_match_serde_names() {
        for f in InputField::ALL {
            let json = serde_json::to_string(f).unwrap();
            assert_eq!(json, format!("\"{}\"", f.name()));
        }
    }

    #[test]
    fn record_serializes_fields_under_their_names() {
        let mut input = FinancialInput::default();
        input.set_field("checking", Decimal::new(10_000, 0));
        let v = serde_json::to_value(&input).unwrap();
        for f in InputField::ALL {
            assert!(v.get(f.name()).is_some(), "missing {}", f.name());
        }
    }

    #[test]
    fn unknown_fields_are_ignored_on_deserialize() {
        let json = r#"{"checking": 10000, "passive_investments": "50000",
                       "methodology": "bradford", "hoverboard_value": 12}"#;
        let input: FinancialInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.checking, Decimal::new(10_000, 0));
        assert_eq!(input.passive_investments, Decimal::new(50_000, 0));
        assert_eq!(input.savings, Decimal::ZERO);
    }

    #[test]
    fn set_field_by_name() {
        let mut input = FinancialInput::default();
        assert_eq!(
            input.set_field("gold", Decimal::new(500, 0)),
            FieldUpdate::Applied
        );
        assert_eq!(input.gold, Decimal::new(500, 0));
        assert_eq!(
            input.set_field("spaceship", Decimal::ONE),
            FieldUpdate::Ignored
        );
    }

    #[test]
    fn set_field_f64_clamps_non_finite() {
        let mut input = FinancialInput::default();
        input.savings = Decimal::new(7, 0);
        assert_eq!(
            input.set_field_f64("savings", f64::NAN),
            FieldUpdate::Clamped(IssueKind::NotFinite)
        );
        assert_eq!(input.savings, Decimal::ZERO);
        assert_eq!(
            input.set_field_f64("savings", 12.5),
            FieldUpdate::Applied
        );
        assert_eq!(input.savings, Decimal::new(125, 1));
        assert_eq!(
            input.set_field_f64("nope", f64::INFINITY),
            FieldUpdate::Ignored
        );
    }

    #[test]
    fn sanitize_clamps_negative_and_rates() {
        let mut input = FinancialInput::default();
        input.checking = Decimal::new(-50, 0);
        input.tax_rate = Decimal::new(15, 1);
        input.savings = Decimal::new(100, 0);
        let s = input.sanitized();
        assert_eq!(s.input.checking, Decimal::ZERO);
        assert_eq!(s.input.tax_rate, Decimal::ONE);
        assert_eq!(s.input.savings, Decimal::new(100, 0));
        assert_eq!(s.issues.len(), 2);
        assert_eq!(s.issues[0].field, IssueSource::Field(InputField::Checking));
        assert_eq!(s.issues[0].kind, IssueKind::Negative);
        assert_eq!(s.issues[1].kind, IssueKind::AboveOne);
    }

    #[test]
    fn sanitize_caps_huge_amounts() {
        assert_eq!(MAX_AMOUNT, Decimal::new(1_000_000_000_000_000, 0));
        let mut input = FinancialInput::default();
        input.gold = Decimal::MAX;
        let s = input.sanitized();
        assert_eq!(s.input.gold, MAX_AMOUNT);
        assert_eq!(s.issues[0].kind, IssueKind::TooLarge);
    }

    #[test]
    fn sanitize_caps_and_reports_metal_prices() {
        let mut input = FinancialInput::default();
        input.metal_prices.gold_per_gram = Decimal::MAX;
        input.metal_prices.silver_per_gram = Decimal::new(-3, 0);
        let s = input.sanitized();
        assert_eq!(s.input.metal_prices.gold_per_gram, MAX_AMOUNT);
        assert_eq!(
            s.input.metal_prices.silver_per_gram,
            MetalPrices::default().silver_per_gram
        );
        assert_eq!(s.issues.len(), 2);
        assert_eq!(s.issues[0].field, IssueSource::GoldPrice);
        assert_eq!(s.issues[0].kind, IssueKind::TooLarge);
        assert_eq!(s.issues[0].replaced_with, MAX_AMOUNT);
        assert_eq!(s.issues[1].field, IssueSource::SilverPrice);
        assert_eq!(s.issues[1].kind, IssueKind::Negative);
    }

    #[test]
    fn zero_metal_price_falls_back_silently() {
        let mut input = FinancialInput::default();
        input.metal_prices.gold_per_gram = Decimal::ZERO;
        let s = input.sanitized();
        assert_eq!(s.input.metal_prices, MetalPrices::default());
        assert!(s.issues.is_empty());
    }

    #[test]
    fn set_field_f64_caps_values_beyond_decimal_range() {
        let mut input = FinancialInput::default();
        assert_eq!(
            input.set_field_f64("savings", 1e30),
            FieldUpdate::Clamped(IssueKind::TooLarge)
        );
        assert_eq!(input.savings, MAX_AMOUNT);
        assert_eq!(
            input.set_field_f64("credit_card", -1e30),
            FieldUpdate::Clamped(IssueKind::TooLarge)
        );
        assert_eq!(input.credit_card, -MAX_AMOUNT);
        assert_eq!(input.set_field_f64("nope", 1e30), FieldUpdate::Ignored);
    }

    proptest! {
        #[test]
        fn sanitized_fields_are_never_negative(cents in -10_000_000i64..10_000_000, idx in 0usize..InputField::ALL.len()) {
            let field = InputField::ALL[idx];
            let mut input = FinancialInput::default();
            *input.get_mut(field) = Decimal::new(cents, 2);
            let s = input.sanitized();
            prop_assert!(s.input.get(field) >= Decimal::ZERO);
            prop_assert_eq!(s.issues.is_empty(), s.input == input);
        }
    }
}
