#![deny(warnings)]

//! Flow allocation and diagram layout for Zakat Flow.
//!
//! Two independent passes over a calculation result:
//! 1. [`allocate`] partitions each category's zakatable value into
//!    liability-offset, retained and obligation portions (money, exact).
//! 2. [`layout`] maps those partitions to node rectangles and ribbon links
//!    (pixels, no value semantics).

mod allocate;
mod layout;

pub use allocate::{
    allocate, try_allocate, FlowAllocation, FlowPartition, CONSERVATION_TOLERANCE,
};
pub use layout::{
    layout, layout_with, CubicBezier, FlowLayout, LayoutConfig, LayoutLink, LayoutNode, NodeKind,
    Point, RibbonPath, Sink,
};

use rust_decimal::Decimal;
use thiserror::Error;
use zakat_core::CategoryKey;
use zakat_engine::CalculationResult;

/// Errors produced by the flow stages.
#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    /// Value was created or lost while partitioning. `category` is `None`
    /// for totals across all categories.
    #[error("conservation violated for {category:?}: expected {expected}, got {actual}")]
    ConservationViolation {
        category: Option<CategoryKey>,
        expected: Decimal,
        actual: Decimal,
    },
}

/// Allocate a result and lay it out in one call.
pub fn flow_diagram(
    result: &CalculationResult,
    config: &LayoutConfig,
    width: f64,
    height: f64,
) -> (FlowAllocation, FlowLayout) {
    let allocation = allocate(result);
    let geometry = layout_with(config, &allocation.partitions, width, height);
    (allocation, geometry)
}
