#![deny(warnings)]

//! Methodology rule table for Zakat Flow.
//!
//! Maps each methodology to a declarative description of how every asset
//! category is treated and how debts are deducted. The calculation engine
//! evaluates these descriptors in one generic loop; adding or changing a
//! methodology only touches this crate.
//!
//! Encoded differences between the methodologies:
//! - Passive investments: 30% (bradford) vs 100% (others)
//! - Retirement: exempt until accessible (bradford) vs net of tax and
//!   early-withdrawal penalty (others)
//! - Personal jewelry: zakatable (bradford, hanafi) vs exempt (maliki-shafii, hanbali)
//! - Recurring debts: twelve months (bradford, maliki-shafii) vs full balance
//!   (hanafi, hanbali)

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use zakat_core::{CategoryKey, FieldKind, InputField, LiabilityClass, Methodology};

pub use zakat_core::UnknownMethodology;

/// Version of the encoded rule set; bumped whenever a rule changes.
pub const RULES_VERSION: u32 = 3;

/// Age (years) at which retirement accounts can be drawn without penalty.
pub const RETIREMENT_ACCESS_AGE: Decimal = Decimal::from_parts(595, 0, 0, false, 1);

/// Early-withdrawal penalty on retirement accounts.
pub const EARLY_WITHDRAWAL_PENALTY: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Share of passive holdings treated as zakatable under the 30% rule.
pub const PASSIVE_INVESTMENT_FRACTION: Decimal = Decimal::from_parts(30, 0, 0, false, 2);

/// Errors produced while resolving or checking rules.
#[derive(Debug, Error, PartialEq)]
pub enum RulesError {
    #[error(transparent)]
    UnknownMethodology(#[from] UnknownMethodology),
    #[error("invalid rule for {category:?}: {reason}")]
    InvalidRule {
        category: CategoryKey,
        reason: String,
    },
}

/// Personal facts some treatments depend on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuleContext {
    /// Age in years.
    pub age: Decimal,
    /// Combined tax rate in [0, 1].
    pub tax_rate: Decimal,
}

/// How much of an asset's value is zakatable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Treatment {
    Full,
    Exempt,
    /// Flat share in [0, 1].
    Fraction { fraction: Decimal },
    /// Nothing before `access_age`; afterwards the after-tax value.
    AccessibleAfterAge { access_age: Decimal },
    /// Value left after tax, and after the penalty before `access_age`.
    NetOfTaxAndPenalty {
        access_age: Decimal,
        penalty_rate: Decimal,
    },
}

impl Treatment {
    /// Zakatable share of the gross value, always within [0, 1].
    pub fn fraction(&self, ctx: &RuleContext) -> Decimal {
        let raw = match self {
            Treatment::Full => Decimal::ONE,
            Treatment::Exempt => Decimal::ZERO,
            Treatment::Fraction { fraction } => *fraction,
            Treatment::AccessibleAfterAge { access_age } => {
                if ctx.age < *access_age {
                    Decimal::ZERO
                } else {
                    Decimal::ONE - ctx.tax_rate
                }
            }
            Treatment::NetOfTaxAndPenalty {
                access_age,
                penalty_rate,
            } => {
                let penalty = if ctx.age < *access_age {
                    *penalty_rate
                } else {
                    Decimal::ZERO
                };
                Decimal::ONE - ctx.tax_rate - penalty
            }
        };
        raw.clamp(Decimal::ZERO, Decimal::ONE)
    }

    fn check(&self) -> Result<(), String> {
        let unit = |d: &Decimal| *d >= Decimal::ZERO && *d <= Decimal::ONE;
        match self {
            Treatment::Fraction { fraction } if !unit(fraction) => {
                Err(format!("fraction {fraction} outside [0, 1]"))
            }
            Treatment::AccessibleAfterAge { access_age }
            | Treatment::NetOfTaxAndPenalty { access_age, .. }
                if *access_age < Decimal::ZERO =>
            {
                Err(format!("negative access age {access_age}"))
            }
            Treatment::NetOfTaxAndPenalty { penalty_rate, .. } if !unit(penalty_rate) => {
                Err(format!("penalty {penalty_rate} outside [0, 1]"))
            }
            _ => Ok(()),
        }
    }
}

/// Treatment override for one input field inside a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialCase {
    pub field: InputField,
    pub treatment: Treatment,
}

/// Rule for one asset category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Applies to every field without a special case.
    pub treatment: Treatment,
    pub special_cases: Vec<SpecialCase>,
}

impl CategoryRule {
    pub fn new(treatment: Treatment) -> Self {
        Self {
            treatment,
            special_cases: Vec::new(),
        }
    }

    /// Add a special case for `field`.
    pub fn with(mut self, field: InputField, treatment: Treatment) -> Self {
        self.special_cases.push(SpecialCase { field, treatment });
        self
    }

    /// Treatment governing `field`.
    pub fn treatment_for(&self, field: InputField) -> &Treatment {
        self.special_cases
            .iter()
            .find(|s| s.field == field)
            .map(|s| &s.treatment)
            .unwrap_or(&self.treatment)
    }
}

/// One rule per category. Having a field per category makes a missing
/// rule a compile error rather than a silent 0% or 100%.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRules {
    pub liquid: CategoryRule,
    pub investments: CategoryRule,
    pub retirement: CategoryRule,
    pub metals: CategoryRule,
    pub crypto: CategoryRule,
    pub real_estate: CategoryRule,
    pub business: CategoryRule,
    pub receivables: CategoryRule,
    pub trusts: CategoryRule,
    pub illiquid: CategoryRule,
}

impl CategoryRules {
    pub fn get(&self, key: CategoryKey) -> &CategoryRule {
        match key {
            CategoryKey::Liquid => &self.liquid,
            CategoryKey::Investments => &self.investments,
            CategoryKey::Retirement => &self.retirement,
            CategoryKey::Metals => &self.metals,
            CategoryKey::Crypto => &self.crypto,
            CategoryKey::RealEstate => &self.real_estate,
            CategoryKey::Business => &self.business,
            CategoryKey::Receivables => &self.receivables,
            CategoryKey::Trusts => &self.trusts,
            CategoryKey::Illiquid => &self.illiquid,
        }
    }
}

/// How much of a liability reduces zakatable wealth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtDeductionPolicy {
    /// Twelve monthly payments.
    Annualized,
    /// The payment currently due.
    CurrentMonthOnly,
    /// The whole outstanding balance.
    FullBalance,
    NoDeduction,
}

/// Deduction policy per liability class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtRules {
    pub recurring: DebtDeductionPolicy,
    pub living_expenses: DebtDeductionPolicy,
    pub non_recurring: DebtDeductionPolicy,
}

impl DebtRules {
    pub fn policy_for(&self, class: LiabilityClass) -> DebtDeductionPolicy {
        match class {
            LiabilityClass::Recurring => self.recurring,
            LiabilityClass::LivingExpenses => self.living_expenses,
            LiabilityClass::NonRecurring => self.non_recurring,
        }
    }
}

/// Complete rule set of one methodology.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodologyRules {
    pub version: u32,
    pub methodology: Methodology,
    pub categories: CategoryRules,
    pub debts: DebtRules,
}

impl MethodologyRules {
    pub fn category(&self, key: CategoryKey) -> &CategoryRule {
        self.categories.get(key)
    }

    /// Check every treatment is well-formed and every special case names a
    /// field of its own category.
    pub fn validate(&self) -> Result<(), RulesError> {
        for &key in CategoryKey::ALL {
            let rule = self.category(key);
            let invalid = |reason: String| RulesError::InvalidRule {
                category: key,
                reason,
            };
            rule.treatment.check().map_err(invalid)?;
            for sc in &rule.special_cases {
                if sc.field.kind() != FieldKind::Asset(key) {
                    return Err(invalid(format!(
                        "special case for {} which is not in this category",
                        sc.field.name()
                    )));
                }
                sc.treatment.check().map_err(invalid)?;
            }
        }
        Ok(())
    }
}

fn build(methodology: Methodology) -> MethodologyRules {
    use DebtDeductionPolicy::*;
    use Methodology::*;

    let passive = match methodology {
        Bradford => Treatment::Fraction {
            fraction: PASSIVE_INVESTMENT_FRACTION,
        },
        Hanafi | MalikiShafii | Hanbali => Treatment::Full,
    };
    let retirement = match methodology {
        Bradford => Treatment::AccessibleAfterAge {
            access_age: RETIREMENT_ACCESS_AGE,
        },
        Hanafi | MalikiShafii | Hanbali => Treatment::NetOfTaxAndPenalty {
            access_age: RETIREMENT_ACCESS_AGE,
            penalty_rate: EARLY_WITHDRAWAL_PENALTY,
        },
    };
    let jewelry = match methodology {
        Bradford | Hanafi => Treatment::Full,
        MalikiShafii | Hanbali => Treatment::Exempt,
    };
    let recurring = match methodology {
        Bradford | MalikiShafii => Annualized,
        Hanafi | Hanbali => FullBalance,
    };

    MethodologyRules {
        version: RULES_VERSION,
        methodology,
        categories: CategoryRules {
            liquid: CategoryRule::new(Treatment::Full),
            investments: CategoryRule::new(Treatment::Full)
                .with(InputField::PassiveInvestments, passive.clone())
                .with(InputField::ReitHoldings, passive),
            retirement: CategoryRule::new(retirement),
            metals: CategoryRule::new(Treatment::Full)
                .with(InputField::PersonalJewelry, jewelry),
            crypto: CategoryRule::new(Treatment::Full),
            real_estate: CategoryRule::new(Treatment::Full),
            business: CategoryRule::new(Treatment::Full),
            receivables: CategoryRule::new(Treatment::Full)
                .with(InputField::DoubtfulDebts, Treatment::Exempt),
            trusts: CategoryRule::new(Treatment::Full)
                .with(InputField::IrrevocableTrust, Treatment::Exempt),
            illiquid: CategoryRule::new(Treatment::Full),
        },
        debts: DebtRules {
            recurring,
            living_expenses: CurrentMonthOnly,
            non_recurring: FullBalance,
        },
    }
}

static BRADFORD: Lazy<MethodologyRules> = Lazy::new(|| build(Methodology::Bradford));
static HANAFI: Lazy<MethodologyRules> = Lazy::new(|| build(Methodology::Hanafi));
static MALIKI_SHAFII: Lazy<MethodologyRules> = Lazy::new(|| build(Methodology::MalikiShafii));
static HANBALI: Lazy<MethodologyRules> = Lazy::new(|| build(Methodology::Hanbali));

/// Rules for a methodology. The table is built once per process.
pub fn rules_for(methodology: Methodology) -> &'static MethodologyRules {
    match methodology {
        Methodology::Bradford => &BRADFORD,
        Methodology::Hanafi => &HANAFI,
        Methodology::MalikiShafii => &MALIKI_SHAFII,
        Methodology::Hanbali => &HANBALI,
    }
}

/// Resolve rules from an identifier such as `"maliki-shafii"`.
pub fn resolve_rules(id: &str) -> Result<&'static MethodologyRules, RulesError> {
    let methodology: Methodology = id.parse()?;
    debug!(%methodology, version = RULES_VERSION, "resolved methodology rules");
    Ok(rules_for(methodology))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ctx(age: i64, tax_pct: i64) -> RuleContext {
        RuleContext {
            age: Decimal::new(age, 0),
            tax_rate: Decimal::new(tax_pct, 2),
        }
    }

    #[test]
    fn table_is_valid_for_every_methodology() {
        for m in Methodology::ALL {
            let rules = rules_for(*m);
            assert_eq!(rules.methodology, *m);
            assert_eq!(rules.version, RULES_VERSION);
            rules.validate().unwrap();
        }
    }

    #[test]
    fn resolve_unknown_fails_fast() {
        assert_eq!(
            resolve_rules("zaydi"),
            Err(RulesError::UnknownMethodology(UnknownMethodology(
                "zaydi".to_string()
            )))
        );
        assert!(resolve_rules("").is_err());
    }

    #[test]
    fn resolve_returns_the_same_static_table() {
        let a = resolve_rules("hanafi").unwrap();
        let b = resolve_rules("Hanafi").unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn passive_investments_thirty_percent_only_for_bradford() {
        let c = ctx(30, 20);
        for m in Methodology::ALL {
            let f = rules_for(*m)
                .category(CategoryKey::Investments)
                .treatment_for(InputField::PassiveInvestments)
                .fraction(&c);
            let expected = if *m == Methodology::Bradford {
                Decimal::new(30, 2)
            } else {
                Decimal::ONE
            };
            assert_eq!(f, expected, "{m}");
        }
        let active = rules_for(Methodology::Bradford)
            .category(CategoryKey::Investments)
            .treatment_for(InputField::ActiveInvestments)
            .fraction(&c);
        assert_eq!(active, Decimal::ONE);
    }

    #[test]
    fn retirement_bradford_exempt_until_access_age() {
        let rule = rules_for(Methodology::Bradford).category(CategoryKey::Retirement);
        let t = rule.treatment_for(InputField::TraditionalIra);
        assert_eq!(t.fraction(&ctx(40, 25)), Decimal::ZERO);
        assert_eq!(t.fraction(&ctx(60, 25)), Decimal::new(75, 2));
    }

    #[test]
    fn retirement_others_net_of_tax_and_penalty() {
        for m in [Methodology::Hanafi, Methodology::MalikiShafii, Methodology::Hanbali] {
            let t = &rules_for(m).category(CategoryKey::Retirement).treatment;
            assert_eq!(t.fraction(&ctx(40, 25)), Decimal::new(65, 2), "{m}");
            assert_eq!(t.fraction(&ctx(65, 25)), Decimal::new(75, 2), "{m}");
        }
    }

    #[test]
    fn personal_jewelry_by_methodology() {
        let c = RuleContext::default();
        let frac = |m| {
            rules_for(m)
                .category(CategoryKey::Metals)
                .treatment_for(InputField::PersonalJewelry)
                .fraction(&c)
        };
        assert_eq!(frac(Methodology::Bradford), Decimal::ONE);
        assert_eq!(frac(Methodology::Hanafi), Decimal::ONE);
        assert_eq!(frac(Methodology::MalikiShafii), Decimal::ZERO);
        assert_eq!(frac(Methodology::Hanbali), Decimal::ZERO);
    }

    #[test]
    fn recurring_debt_policy_by_methodology() {
        use DebtDeductionPolicy::*;
        let policy = |m| rules_for(m).debts.policy_for(LiabilityClass::Recurring);
        assert_eq!(policy(Methodology::Bradford), Annualized);
        assert_eq!(policy(Methodology::MalikiShafii), Annualized);
        assert_eq!(policy(Methodology::Hanafi), FullBalance);
        assert_eq!(policy(Methodology::Hanbali), FullBalance);
    }

    #[test]
    fn validate_rejects_bad_fraction_and_misplaced_special_case() {
        let mut rules = rules_for(Methodology::Hanafi).clone();
        rules.categories.crypto = CategoryRule::new(Treatment::Fraction {
            fraction: Decimal::new(15, 1),
        });
        assert!(matches!(
            rules.validate(),
            Err(RulesError::InvalidRule {
                category: CategoryKey::Crypto,
                ..
            })
        ));

        let mut rules = rules_for(Methodology::Hanafi).clone();
        rules.categories.liquid =
            CategoryRule::new(Treatment::Full).with(InputField::Gold, Treatment::Exempt);
        assert!(rules.validate().is_err());
    }

    #[test]
    fn rules_serialize() {
        let json = serde_json::to_value(rules_for(Methodology::Bradford)).unwrap();
        assert_eq!(json["methodology"], "bradford");
        assert_eq!(json["debts"]["recurring"], "annualized");
        assert_eq!(json["categories"]["retirement"]["treatment"]["type"], "accessible_after_age");
    }

    proptest! {
        #[test]
        fn fractions_stay_in_unit_interval(age in 0i64..120, tax in 0i64..=100) {
            let c = ctx(age, tax);
            for m in Methodology::ALL {
                let rules = rules_for(*m);
                for &key in CategoryKey::ALL {
                    for field in key.fields() {
                        let f = rules.category(key).treatment_for(field).fraction(&c);
                        prop_assert!(f >= Decimal::ZERO && f <= Decimal::ONE);
                    }
                }
            }
        }
    }
}
