#![deny(warnings)]

//! Headless CLI: run a scenario through the calculation and flow pipeline.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use zakat_core::{CategoryKey, FinancialInput, Methodology};
use zakat_engine::{calculate, calculate_with_id, CalculationResult};
use zakat_flow::{flow_diagram, FlowAllocation, LayoutConfig};
use zakat_rules::rules_for;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<PathBuf>,
    methodology: Option<String>,
    layout_out: Option<PathBuf>,
    width: Option<f64>,
    height: Option<f64>,
    json: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next().map(PathBuf::from),
            "--methodology" => args.methodology = it.next(),
            "--layout-out" => args.layout_out = it.next().map(PathBuf::from),
            "--width" => args.width = it.next().and_then(|s| s.parse().ok()),
            "--height" => args.height = it.next().and_then(|s| s.parse().ok()),
            "--json" => args.json = true,
            other => bail!("unrecognized argument: {other}"),
        }
    }
    Ok(args)
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
struct Canvas {
    width: f64,
    height: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 540.0,
        }
    }
}

/// Scenario file: input record plus presentation settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Scenario {
    name: Option<String>,
    /// End of the zakat year being reported.
    as_of: Option<NaiveDate>,
    canvas: Canvas,
    layout: LayoutConfig,
    input: FinancialInput,
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let scenario = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("parsing JSON scenario {}", path.display()))?,
        _ => serde_yaml::from_str(&text)
            .with_context(|| format!("parsing YAML scenario {}", path.display()))?,
    };
    Ok(scenario)
}

fn demo_scenario() -> Scenario {
    let mut input = FinancialInput::default();
    input.methodology = Methodology::Bradford;
    input.currency = "USD".to_string();
    input.checking = Decimal::new(10_000, 0);
    input.passive_investments = Decimal::new(50_000, 0);
    Scenario {
        name: Some("demo".to_string()),
        input,
        ..Scenario::default()
    }
}

fn money(d: Decimal) -> Decimal {
    d.round_dp(2)
}

fn print_report(name: &str, as_of: Option<NaiveDate>, r: &CalculationResult, alloc: &FlowAllocation) {
    println!(
        "Scenario: {} | methodology: {} (rules v{}) | {:?} year | {}",
        name,
        r.methodology.label(),
        r.rules_version,
        r.calendar,
        if r.currency.is_empty() { "USD" } else { r.currency.as_str() }
    );
    if let Some(date) = as_of {
        println!("Zakat year ending {date}");
    }
    for key in CategoryKey::ALL {
        if let Some(c) = r.category(*key) {
            if c.gross_total.is_zero() {
                continue;
            }
            println!(
                "  {:<16} gross {:>14} | zakatable {:>14} ({}%)",
                c.label,
                money(c.gross_total),
                money(c.zakatable_amount),
                (c.zakatable_fraction * Decimal::ONE_HUNDRED).round_dp(1)
            );
        }
    }
    println!(
        "Assets {} | zakatable {} | deductible debts {} of {} | net {}",
        money(r.total_assets),
        money(r.total_zakatable_gross),
        money(r.deductible_liabilities),
        money(r.total_liabilities),
        money(r.net_zakatable_wealth)
    );
    println!(
        "Nisab {} ({}) | rate {}% | ZAKAT DUE {}",
        money(r.nisab_threshold),
        if r.is_above_nisab { "met" } else { "not met" },
        r.zakat_rate * Decimal::ONE_HUNDRED,
        money(r.zakat_due)
    );
    if !r.purification.total.is_zero() {
        println!(
            "Purification {} (interest {}, dividends {})",
            money(r.purification.total),
            money(r.purification.interest),
            money(r.purification.dividends)
        );
    }
    if !alloc.excess_liability.is_zero() {
        println!(
            "Liabilities exceed zakatable assets by {}",
            money(alloc.excess_liability)
        );
    }
    for issue in &r.input_issues {
        println!(
            "  note: {} was {}, used {}",
            issue.field.label(),
            issue.original,
            issue.replaced_with
        );
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    info!(scenario = ?args.scenario, methodology = ?args.methodology, "starting CLI");

    let scenario = match &args.scenario {
        Some(path) => load_scenario(path)?,
        None => demo_scenario(),
    };
    let result = match &args.methodology {
        Some(id) => calculate_with_id(&scenario.input, id)?,
        None => calculate(&scenario.input, rules_for(scenario.input.methodology)),
    };

    let width = args.width.unwrap_or(scenario.canvas.width);
    let height = args.height.unwrap_or(scenario.canvas.height);
    let (alloc, geometry) = flow_diagram(&result, &scenario.layout, width, height);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let name = scenario.name.as_deref().unwrap_or("unnamed");
        print_report(name, scenario.as_of, &result, &alloc);
    }

    if let Some(path) = &args.layout_out {
        let text = serde_json::to_string_pretty(&geometry)?;
        fs::write(path, text).with_context(|| format!("writing layout {}", path.display()))?;
        info!(
            path = %path.display(),
            nodes = geometry.nodes.len(),
            links = geometry.links.len(),
            "layout written"
        );
    }

    Ok(())
}
