//! Chart selection for query results
//!
//! A bar chart is drawn only when the result has an `item` column and either
//! `total_revenue` or `quantity`. Revenue wins when both are present.

use crate::error::Result;
use crate::store::{Cell, QueryResult};
use polars::prelude::*;
use serde::Serialize;
use std::fmt::Write as _;

pub const MAX_BARS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartMetric {
    TotalRevenue,
    Quantity,
}

impl ChartMetric {
    pub fn column(&self) -> &'static str {
        match self {
            ChartMetric::TotalRevenue => "total_revenue",
            ChartMetric::Quantity => "quantity",
        }
    }

    pub fn y_label(&self) -> &'static str {
        match self {
            ChartMetric::TotalRevenue => "Total Revenue ($)",
            ChartMetric::Quantity => "Total Quantity Sold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub metric: ChartMetric,
    pub y_label: String,
    pub bars: Vec<Bar>,
}

/// Which metric a result would be charted by, if any.
pub fn chart_metric(result: &QueryResult) -> Option<ChartMetric> {
    if !result.has_column("item") {
        return None;
    }
    if result.has_column("total_revenue") {
        Some(ChartMetric::TotalRevenue)
    } else if result.has_column("quantity") {
        Some(ChartMetric::Quantity)
    } else {
        None
    }
}

/// Build the top-10 bar chart for a result, or `None` when it has no chartable shape.
pub fn select_chart(result: &QueryResult) -> Result<Option<BarChart>> {
    let metric = match chart_metric(result) {
        Some(metric) => metric,
        None => return Ok(None),
    };

    let frame = chart_frame(result, metric)?;
    let value_col = metric.column();
    let descending = SortMultipleOptions::default()
        .with_order_descending(true)
        .with_nulls_last(true)
        .with_maintain_order(true);

    let ranked = match metric {
        ChartMetric::TotalRevenue => frame
            .lazy()
            .sort_by_exprs([col(value_col)], descending)
            .limit(MAX_BARS)
            .collect()?,
        ChartMetric::Quantity => frame
            .lazy()
            .filter(col("item").is_not_null())
            .group_by_stable([col("item")])
            .agg([col(value_col).sum()])
            .sort_by_exprs([col(value_col)], descending)
            .limit(MAX_BARS)
            .collect()?,
    };

    let labels = ranked.column("item")?.str()?;
    let values = ranked.column(value_col)?.f64()?;
    let bars = labels
        .into_iter()
        .zip(values.into_iter())
        .map(|(label, value)| Bar {
            label: label.unwrap_or("None").to_string(),
            value: value.unwrap_or(0.0),
        })
        .collect();

    Ok(Some(BarChart {
        metric,
        y_label: metric.y_label().to_string(),
        bars,
    }))
}

/// Two-column frame of `item` (string) and the metric (f64, null when not numeric).
fn chart_frame(result: &QueryResult, metric: ChartMetric) -> Result<DataFrame> {
    let item_idx = result.column_index("item").unwrap_or(0);
    let value_idx = result.column_index(metric.column()).unwrap_or(0);

    let items: Vec<Option<String>> = result
        .rows
        .iter()
        .map(|row| match &row[item_idx] {
            Cell::Null => None,
            other => Some(other.to_string()),
        })
        .collect();
    let values: Vec<Option<f64>> = result.rows.iter().map(|row| row[value_idx].as_f64()).collect();

    Ok(DataFrame::new(vec![
        Series::new("item", items),
        Series::new(metric.column(), values),
    ])?)
}

impl BarChart {
    /// Render as a standalone SVG with x labels rotated 45 degrees.
    pub fn to_svg(&self) -> String {
        const WIDTH: f64 = 640.0;
        const HEIGHT: f64 = 400.0;
        const LEFT: f64 = 70.0;
        const RIGHT: f64 = 20.0;
        const TOP: f64 = 20.0;
        const BOTTOM: f64 = 120.0;

        let plot_w = WIDTH - LEFT - RIGHT;
        let plot_h = HEIGHT - TOP - BOTTOM;
        let max = self
            .bars
            .iter()
            .map(|b| b.value)
            .fold(0.0_f64, f64::max)
            .max(f64::EPSILON);
        let slot = plot_w / self.bars.len().max(1) as f64;
        let bar_w = slot * 0.7;

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="12">"#,
            w = WIDTH,
            h = HEIGHT
        );
        let _ = write!(
            svg,
            r##"<line x1="{x}" y1="{t}" x2="{x}" y2="{b}" stroke="#333"/><line x1="{x}" y1="{b}" x2="{r}" y2="{b}" stroke="#333"/>"##,
            x = LEFT,
            t = TOP,
            b = TOP + plot_h,
            r = LEFT + plot_w
        );
        let _ = write!(
            svg,
            r#"<text x="16" y="{y}" transform="rotate(-90 16 {y})" text-anchor="middle">{label}</text>"#,
            y = TOP + plot_h / 2.0,
            label = escape_xml(&self.y_label)
        );
        let _ = write!(
            svg,
            r#"<text x="{x}" y="{y}" text-anchor="end">{max}</text>"#,
            x = LEFT - 6.0,
            y = TOP + 4.0,
            max = format_value(max)
        );

        for (idx, bar) in self.bars.iter().enumerate() {
            let height = (bar.value.max(0.0) / max) * plot_h;
            let x = LEFT + slot * idx as f64 + (slot - bar_w) / 2.0;
            let y = TOP + plot_h - height;
            let cx = x + bar_w / 2.0;
            let ly = TOP + plot_h + 14.0;
            let _ = write!(
                svg,
                r##"<rect x="{x:.1}" y="{y:.1}" width="{bw:.1}" height="{bh:.1}" fill="#1f77b4"><title>{label}: {value}</title></rect>"##,
                x = x,
                y = y,
                bw = bar_w,
                bh = height,
                label = escape_xml(&bar.label),
                value = format_value(bar.value)
            );
            let _ = write!(
                svg,
                r#"<text x="{cx:.1}" y="{ly:.1}" transform="rotate(-45 {cx:.1} {ly:.1})" text-anchor="end">{label}</text>"#,
                cx = cx,
                ly = ly,
                label = escape_xml(&bar.label)
            );
        }

        svg.push_str("</svg>");
        svg
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
