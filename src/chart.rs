//! Chart construction from tabular results.
//!
//! A chart needs at least two columns: one for the X axis (labels) and one
//! for the Y axis (numeric values). The Y axis options always exclude the
//! chosen X column. Output is plain text suitable for any terminal surface.

use anyhow::{bail, Result};
use std::str::FromStr;

use crate::models::{format_cell, Table};

const BAR_WIDTH: usize = 40;
const SPARK_LEVELS: &[char] = &['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Supported chart kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
}

impl FromStr for ChartKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "line" => Ok(ChartKind::Line),
            "bar" => Ok(ChartKind::Bar),
            other => bail!("Unknown chart kind: {}. Use line or bar.", other),
        }
    }
}

/// A chart ready to draw: axis names plus label/value points in row order.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x_column: String,
    pub y_column: String,
    pub points: Vec<(String, f64)>,
}

/// Whether a result has enough columns for axis selection at all.
pub fn chart_available(table: &Table) -> bool {
    table.columns.len() >= 2
}

/// Y axis candidates for a chosen X column: every other column.
pub fn y_axis_options(columns: &[String], x_column: &str) -> Vec<String> {
    columns
        .iter()
        .filter(|c| c.as_str() != x_column)
        .cloned()
        .collect()
}

/// Build a chart spec from a result and a pair of axis columns.
///
/// Rows whose Y cell is not numeric are skipped; a Y column with no numeric
/// cells at all is an error.
pub fn build_chart(table: &Table, kind: ChartKind, x_column: &str, y_column: &str) -> Result<ChartSpec> {
    if !chart_available(table) {
        bail!("At least 2 columns are required to draw a chart");
    }
    if x_column == y_column {
        bail!("X and Y axes must be different columns");
    }

    let x = table
        .column_index(x_column)
        .ok_or_else(|| anyhow::anyhow!("No such column: {}", x_column))?;
    let y = table
        .column_index(y_column)
        .ok_or_else(|| anyhow::anyhow!("No such column: {}", y_column))?;

    let points: Vec<(String, f64)> = table
        .rows
        .iter()
        .filter_map(|row| {
            let value = row.get(y).and_then(|v| v.as_f64())?;
            Some((format_cell(row.get(x)?), value))
        })
        .collect();

    if points.is_empty() {
        bail!("Column {} has no numeric values to plot", y_column);
    }

    Ok(ChartSpec {
        kind,
        x_column: x_column.to_string(),
        y_column: y_column.to_string(),
        points,
    })
}

/// Draw the chart as text.
pub fn render_text(spec: &ChartSpec) -> String {
    match spec.kind {
        ChartKind::Bar => render_bars(spec),
        ChartKind::Line => render_sparkline(spec),
    }
}

fn render_bars(spec: &ChartSpec) -> String {
    let max = spec
        .points
        .iter()
        .map(|(_, v)| v.abs())
        .fold(0.0_f64, f64::max);
    let label_width = spec
        .points
        .iter()
        .map(|(l, _)| l.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = format!("{} by {}\n", spec.y_column, spec.x_column);
    for (label, value) in &spec.points {
        let filled = if max > 0.0 {
            ((value.abs() / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        out.push_str(&format!(
            "{:<label_width$}  {}  {}\n",
            label,
            "█".repeat(filled),
            value,
        ));
    }
    out
}

fn render_sparkline(spec: &ChartSpec) -> String {
    let min = spec.points.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
    let max = spec
        .points
        .iter()
        .map(|(_, v)| *v)
        .fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    let line: String = spec
        .points
        .iter()
        .map(|(_, v)| {
            let level = if span > 0.0 {
                (((v - min) / span) * (SPARK_LEVELS.len() - 1) as f64).round() as usize
            } else {
                0
            };
            SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
        })
        .collect();

    format!(
        "{} by {}\n{}\nmin {}  max {}  ({} points)\n",
        spec.y_column,
        spec.x_column,
        line,
        min,
        max,
        spec.points.len()
    )
}
