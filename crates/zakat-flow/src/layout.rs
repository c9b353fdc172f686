//! Proportional node/link geometry for the flow diagram.
//!
//! Bar heights across categories follow `value^exponent` so small categories
//! stay visible next to large ones. Segments inside a bar, and link ends
//! inside a sink, are split by the linear value ratio so boundaries stay
//! value-accurate within each bar.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zakat_core::CategoryKey;

use crate::allocate::FlowPartition;

/// Tunable geometry parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_width: f64,
    /// Vertical gap between stacked nodes; shrinks on small canvases.
    pub node_gap: f64,
    /// Power applied to values before sizing bars (1.0 is linear).
    pub exponent: f64,
    /// Margin on every side of the canvas.
    pub padding: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 24.0,
            node_gap: 12.0,
            exponent: 0.6,
            padding: 16.0,
        }
    }
}

/// Destination of a flow, stacked top to bottom in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sink {
    Liabilities,
    Retained,
    Obligation,
}

impl Sink {
    pub const ALL: &'static [Sink] = &[Sink::Liabilities, Sink::Retained, Sink::Obligation];

    pub fn label(self) -> &'static str {
        match self {
            Sink::Liabilities => "Liabilities",
            Sink::Retained => "Retained Wealth",
            Sink::Obligation => "Zakat Due",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Sink::Liabilities => "#ef4444",
            Sink::Retained => "#64748b",
            Sink::Obligation => "#10b981",
        }
    }

    fn portion(self, p: &FlowPartition) -> Decimal {
        match self {
            Sink::Liabilities => p.liability_portion,
            Sink::Retained => p.retained_portion,
            Sink::Obligation => p.obligation_portion,
        }
    }
}

fn category_color(key: CategoryKey) -> &'static str {
    match key {
        CategoryKey::Liquid => "#3b82f6",
        CategoryKey::Investments => "#8b5cf6",
        CategoryKey::Retirement => "#6366f1",
        CategoryKey::Metals => "#eab308",
        CategoryKey::Crypto => "#f97316",
        CategoryKey::RealEstate => "#14b8a6",
        CategoryKey::Business => "#0ea5e9",
        CategoryKey::Receivables => "#a855f7",
        CategoryKey::Trusts => "#ec4899",
        CategoryKey::Illiquid => "#78716c",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum NodeKind {
    Category(CategoryKey),
    Sink(Sink),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub kind: NodeKind,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub value: f64,
    pub color: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub from: Point,
    pub c1: Point,
    pub c2: Point,
    pub to: Point,
}

/// Closed ribbon: the top edge runs source to target, the bottom edge back.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RibbonPath {
    pub top: CubicBezier,
    pub bottom: CubicBezier,
}

impl RibbonPath {
    fn between(x0: f64, y0: f64, h0: f64, x1: f64, y1: f64, h1: f64) -> Self {
        let xm = (x0 + x1) / 2.0;
        let p = |x, y| Point { x, y };
        Self {
            top: CubicBezier {
                from: p(x0, y0),
                c1: p(xm, y0),
                c2: p(xm, y1),
                to: p(x1, y1),
            },
            bottom: CubicBezier {
                from: p(x1, y1 + h1),
                c1: p(xm, y1 + h1),
                c2: p(xm, y0 + h0),
                to: p(x0, y0 + h0),
            },
        }
    }

    /// SVG path data for a filled ribbon.
    pub fn to_svg(&self) -> String {
        let (t, b) = (&self.top, &self.bottom);
        format!(
            "M{:.2},{:.2} C{:.2},{:.2} {:.2},{:.2} {:.2},{:.2} L{:.2},{:.2} C{:.2},{:.2} {:.2},{:.2} {:.2},{:.2} Z",
            t.from.x, t.from.y, t.c1.x, t.c1.y, t.c2.x, t.c2.y, t.to.x, t.to.y,
            b.from.x, b.from.y, b.c1.x, b.c1.y, b.c2.x, b.c2.y, b.to.x, b.to.y,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutLink {
    /// Index into [`FlowLayout::nodes`].
    pub source: usize,
    pub target: usize,
    pub category: CategoryKey,
    pub sink: Sink,
    pub value: f64,
    /// Top of the segment on the category bar.
    pub source_y: f64,
    pub source_thickness: f64,
    /// Top of the slot on the sink node.
    pub target_y: f64,
    pub target_thickness: f64,
    pub path: RibbonPath,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowLayout {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<LayoutNode>,
    pub links: Vec<LayoutLink>,
}

impl FlowLayout {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Vertical stack of nodes filling `available` exactly.
///
/// Returns `(y offsets relative to the stack top, heights)`. The gap shrinks
/// to at most half of the available height when there are many nodes.
fn stack(values: &[f64], available: f64, gap: f64, exponent: f64) -> (Vec<f64>, Vec<f64>) {
    let n = values.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }
    let gaps = (n - 1) as f64;
    let gap = if gaps > 0.0 {
        gap.max(0.0).min(available / 2.0 / gaps)
    } else {
        0.0
    };
    let weights: Vec<f64> = values.iter().map(|v| v.max(0.0).powf(exponent)).collect();
    let total: f64 = weights.iter().sum();
    let scale = if total > 0.0 {
        (available - gap * gaps) / total
    } else {
        0.0
    };
    let mut ys = Vec::with_capacity(n);
    let mut heights = Vec::with_capacity(n);
    let mut y = 0.0;
    for w in weights {
        let h = w * scale;
        ys.push(y);
        heights.push(h);
        y += h + gap;
    }
    (ys, heights)
}

/// Lay out partitions on a `width` x `height` canvas with default settings.
pub fn layout(partitions: &[FlowPartition], width: f64, height: f64) -> FlowLayout {
    layout_with(&LayoutConfig::default(), partitions, width, height)
}

pub fn layout_with(
    config: &LayoutConfig,
    partitions: &[FlowPartition],
    width: f64,
    height: f64,
) -> FlowLayout {
    let empty = FlowLayout {
        width,
        height,
        ..FlowLayout::default()
    };
    let usable_w = width - 2.0 * config.padding - 2.0 * config.node_width;
    let usable_h = height - 2.0 * config.padding;
    if !(usable_w.is_finite() && usable_h.is_finite()) || usable_w <= 0.0 || usable_h <= 0.0 {
        return empty;
    }

    let categories: Vec<&FlowPartition> = partitions
        .iter()
        .filter(|p| p.zakatable_amount > Decimal::ZERO)
        .collect();
    if categories.is_empty() {
        return empty;
    }

    let mut nodes = Vec::new();
    let left_x = config.padding;
    let right_x = width - config.padding - config.node_width;

    let values: Vec<f64> = categories.iter().map(|p| to_f64(p.zakatable_amount)).collect();
    let (ys, heights) = stack(&values, usable_h, config.node_gap, config.exponent);
    for (i, p) in categories.iter().enumerate() {
        nodes.push(LayoutNode {
            kind: NodeKind::Category(p.category),
            label: p.label.clone(),
            x: left_x,
            y: config.padding + ys[i],
            width: config.node_width,
            height: heights[i],
            value: values[i],
            color: category_color(p.category).to_string(),
        });
    }

    let sinks: Vec<(Sink, Decimal)> = Sink::ALL
        .iter()
        .map(|&s| (s, categories.iter().map(|p| s.portion(p)).sum::<Decimal>()))
        .filter(|(_, total)| *total > Decimal::ZERO)
        .collect();
    let sink_values: Vec<f64> = sinks.iter().map(|(_, v)| to_f64(*v)).collect();
    let (sink_ys, sink_heights) = stack(&sink_values, usable_h, config.node_gap, config.exponent);
    let sink_base = nodes.len();
    for (i, (sink, _)) in sinks.iter().enumerate() {
        nodes.push(LayoutNode {
            kind: NodeKind::Sink(*sink),
            label: sink.label().to_string(),
            x: right_x,
            y: config.padding + sink_ys[i],
            width: config.node_width,
            height: sink_heights[i],
            value: sink_values[i],
            color: sink.color().to_string(),
        });
    }

    // Running offset of the next link end inside each sink.
    let mut target_offset = vec![0.0_f64; sinks.len()];
    let mut links = Vec::new();
    for (t, (sink, sink_total)) in sinks.iter().enumerate() {
        let target = &nodes[sink_base + t];
        let (target_top, target_h) = (target.y, target.height);
        for (s, p) in categories.iter().enumerate() {
            let portion = sink.portion(p);
            if portion <= Decimal::ZERO {
                continue;
            }
            let source = &nodes[s];
            // Segments within the bar follow the fixed sink order, so the
            // offset of this segment is the sum of the earlier sinks' portions.
            let before: Decimal = Sink::ALL
                .iter()
                .take_while(|other| *other != sink)
                .map(|other| other.portion(p))
                .sum();
            let bar_total = to_f64(p.zakatable_amount);
            let source_y = source.y + source.height * to_f64(before) / bar_total;
            let source_thickness = source.height * to_f64(portion) / bar_total;
            let target_thickness = target_h * to_f64(portion) / to_f64(*sink_total);
            let target_y = target_top + target_offset[t];
            target_offset[t] += target_thickness;
            links.push(LayoutLink {
                source: s,
                target: sink_base + t,
                category: p.category,
                sink: *sink,
                value: to_f64(portion),
                source_y,
                source_thickness,
                target_y,
                target_thickness,
                path: RibbonPath::between(
                    source.x + source.width,
                    source_y,
                    source_thickness,
                    target.x,
                    target_y,
                    target_thickness,
                ),
            });
        }
    }

    debug!(
        nodes = nodes.len(),
        links = links.len(),
        "flow layout computed"
    );
    FlowLayout {
        width,
        height,
        nodes,
        links,
    }
}
