#![deny(warnings)]

//! Core domain models for Zakat Flow.
//!
//! This crate defines the serializable input record filled in by the form
//! layer, the selectors that steer a calculation (methodology, calendar,
//! nisab standard), and the Category Aggregator that folds raw fields into
//! the ten asset categories used everywhere downstream.

mod category;
mod input;
mod nisab;

pub use category::{aggregate, aggregate_items, CategoryKey, Liability, LiabilityClass};
pub use input::{
    FieldKind, FieldUpdate, FinancialInput, InputField, InputIssue, IssueKind, IssueSource,
    Sanitized, MAX_AMOUNT,
};
pub use nisab::{nisab_threshold, MetalPrices, GOLD_NISAB_GRAMS, SILVER_NISAB_GRAMS};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Jurisprudential methodology used to resolve treatment rules.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Methodology {
    /// Contemporary methodology following Sheikh Joe Bradford.
    #[default]
    #[serde(rename = "bradford")]
    Bradford,
    #[serde(rename = "hanafi")]
    Hanafi,
    /// Maliki and Shafi'i schools share one rule set.
    #[serde(rename = "maliki-shafii")]
    MalikiShafii,
    #[serde(rename = "hanbali")]
    Hanbali,
}

impl Methodology {
    /// All methodologies in stable order.
    pub const ALL: &'static [Methodology] = &[
        Methodology::Bradford,
        Methodology::Hanafi,
        Methodology::MalikiShafii,
        Methodology::Hanbali,
    ];

    /// Canonical identifier, as accepted by `FromStr`.
    pub fn id(self) -> &'static str {
        match self {
            Methodology::Bradford => "bradford",
            Methodology::Hanafi => "hanafi",
            Methodology::MalikiShafii => "maliki-shafii",
            Methodology::Hanbali => "hanbali",
        }
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Methodology::Bradford => "Sheikh Joe Bradford",
            Methodology::Hanafi => "Hanafi",
            Methodology::MalikiShafii => "Maliki / Shafi'i",
            Methodology::Hanbali => "Hanbali",
        }
    }

    /// One-line summary of what sets the methodology apart.
    pub fn description(self) -> &'static str {
        match self {
            Methodology::Bradford => {
                "30% rule on passive investments, retirement exempt until accessible"
            }
            Methodology::Hanafi => "jewelry zakatable, debts deducted in full",
            Methodology::MalikiShafii => "personal jewelry exempt, twelve months of debt deducted",
            Methodology::Hanbali => "personal jewelry exempt, debts deducted in full",
        }
    }
}

impl fmt::Display for Methodology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Identifier outside the closed methodology set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown methodology: {0:?}")]
pub struct UnknownMethodology(pub String);

impl FromStr for Methodology {
    type Err = UnknownMethodology;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bradford" => Ok(Methodology::Bradford),
            "hanafi" => Ok(Methodology::Hanafi),
            "maliki-shafii" | "maliki_shafii" | "maliki" | "shafii" => {
                Ok(Methodology::MalikiShafii)
            }
            "hanbali" => Ok(Methodology::Hanbali),
            _ => Err(UnknownMethodology(s.to_string())),
        }
    }
}

/// Metal basis for the nisab threshold.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum NisabStandard {
    Gold,
    /// Lower threshold; the common default since it favours the recipients.
    #[default]
    Silver,
}

/// Accounting year used for the zakat rate.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CalendarYear {
    /// Hijri year (354 or 355 days).
    #[default]
    Lunar,
    /// Gregorian year.
    Solar,
}

impl CalendarYear {
    /// Rate applied to net zakatable wealth.
    ///
    /// 2.5% for a lunar year; 2.577% for a solar year, which is 11 days
    /// longer, so that lifetime totals match.
    pub fn zakat_rate(self) -> Decimal {
        match self {
            CalendarYear::Lunar => Decimal::new(25, 3),
            CalendarYear::Solar => Decimal::new(2577, 5),
        }
    }
}
