//! Inline SVG charts for the dashboard views.
//!
//! Several series share one x axis built from the union of their bucket keys.
//! A series with no value at a key draws nothing there.

use std::collections::BTreeSet;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::metrics::Series;

const WIDTH: f64 = 760.0;
const HEIGHT: f64 = 260.0;
const MARGIN_LEFT: f64 = 56.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 16.0;
const MARGIN_BOTTOM: f64 = 44.0;
const MAX_X_LABELS: usize = 8;
const PALETTE: [&str; 3] = ["#4a90d9", "#5cb85c", "#f0ad4e"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
}

pub struct ChartSeries<'a> {
    pub label: &'a str,
    pub values: &'a Series,
}

impl<'a> ChartSeries<'a> {
    pub fn new(label: &'a str, values: &'a Series) -> Self {
        Self { label, values }
    }
}

struct Frame {
    keys: Vec<NaiveDate>,
    max: u64,
}

impl Frame {
    fn new(series: &[ChartSeries<'_>]) -> Self {
        let keys: BTreeSet<NaiveDate> = series
            .iter()
            .flat_map(|s| s.values.keys().copied())
            .collect();
        let max = series
            .iter()
            .flat_map(|s| s.values.values().copied())
            .max()
            .unwrap_or(0)
            .max(1);
        Self {
            keys: keys.into_iter().collect(),
            max,
        }
    }

    fn plot_width(&self) -> f64 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height(&self) -> f64 {
        HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn slot_width(&self) -> f64 {
        self.plot_width() / self.keys.len().max(1) as f64
    }

    fn slot_center(&self, index: usize) -> f64 {
        MARGIN_LEFT + self.slot_width() * (index as f64 + 0.5)
    }

    fn y(&self, value: u64) -> f64 {
        MARGIN_TOP + self.plot_height() * (1.0 - value as f64 / self.max as f64)
    }
}

/// Renders `series` as one SVG element, or a short notice when every series
/// is empty.
pub fn render(kind: ChartKind, series: &[ChartSeries<'_>]) -> String {
    let frame = Frame::new(series);
    if frame.keys.is_empty() {
        return r#"<p class="empty">No data for this period.</p>"#.to_string();
    }

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg class="chart" viewBox="0 0 {WIDTH} {HEIGHT}" xmlns="http://www.w3.org/2000/svg" role="img">"#
    );
    write_axes(&mut svg, &frame);

    match kind {
        ChartKind::Bar => write_bars(&mut svg, &frame, series),
        ChartKind::Line => write_lines(&mut svg, &frame, series),
    }

    if series.len() > 1 {
        write_legend(&mut svg, series);
    }
    svg.push_str("</svg>");
    svg
}

fn write_axes(svg: &mut String, frame: &Frame) {
    let baseline = frame.y(0);
    let right = WIDTH - MARGIN_RIGHT;
    let _ = write!(
        svg,
        "<line x1=\"{MARGIN_LEFT}\" y1=\"{baseline:.1}\" x2=\"{right}\" y2=\"{baseline:.1}\" stroke=\"#999\"/>"
    );

    let mut ticks = vec![0, frame.max / 2, frame.max];
    ticks.dedup();
    for tick in ticks {
        let y = frame.y(tick);
        let _ = write!(
            svg,
            "<line x1=\"{MARGIN_LEFT}\" y1=\"{y:.1}\" x2=\"{right}\" y2=\"{y:.1}\" stroke=\"#eee\"/>\
             <text x=\"{x:.1}\" y=\"{ty:.1}\" text-anchor=\"end\" font-size=\"11\" fill=\"#555\">{tick}</text>",
            x = MARGIN_LEFT - 6.0,
            ty = y + 4.0,
        );
    }

    let step = frame.keys.len().div_ceil(MAX_X_LABELS).max(1);
    for (index, key) in frame.keys.iter().enumerate().step_by(step) {
        let _ = write!(
            svg,
            "<text x=\"{x:.1}\" y=\"{y:.1}\" text-anchor=\"middle\" font-size=\"11\" fill=\"#555\">{key}</text>",
            x = frame.slot_center(index),
            y = HEIGHT - MARGIN_BOTTOM + 18.0,
        );
    }
}

fn write_bars(svg: &mut String, frame: &Frame, series: &[ChartSeries<'_>]) {
    let group_width = frame.slot_width() * 0.8;
    let bar_width = group_width / series.len().max(1) as f64;
    let baseline = frame.y(0);

    for (index, key) in frame.keys.iter().enumerate() {
        let group_left = frame.slot_center(index) - group_width / 2.0;
        for (position, s) in series.iter().enumerate() {
            let Some(&value) = s.values.get(key) else {
                continue;
            };
            let top = frame.y(value);
            let _ = write!(
                svg,
                "<rect x=\"{x:.1}\" y=\"{top:.1}\" width=\"{w:.1}\" height=\"{h:.1}\" fill=\"{color}\">\
                 <title>{label} {key}: {value}</title></rect>",
                x = group_left + bar_width * position as f64,
                w = bar_width.max(1.0),
                h = baseline - top,
                color = PALETTE[position % PALETTE.len()],
                label = s.label,
            );
        }
    }
}

fn write_lines(svg: &mut String, frame: &Frame, series: &[ChartSeries<'_>]) {
    for (position, s) in series.iter().enumerate() {
        let color = PALETTE[position % PALETTE.len()];
        let points: Vec<(f64, f64, NaiveDate, u64)> = frame
            .keys
            .iter()
            .enumerate()
            .filter_map(|(index, key)| {
                s.values
                    .get(key)
                    .map(|&value| (frame.slot_center(index), frame.y(value), *key, value))
            })
            .collect();

        let path = points
            .iter()
            .map(|(x, y, _, _)| format!("{x:.1},{y:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = write!(
            svg,
            "<polyline points=\"{path}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"2\"/>"
        );
        for (x, y, key, value) in points {
            let _ = write!(
                svg,
                "<circle cx=\"{x:.1}\" cy=\"{y:.1}\" r=\"3\" fill=\"{color}\"><title>{label} {key}: {value}</title></circle>",
                label = s.label,
            );
        }
    }
}

fn write_legend(svg: &mut String, series: &[ChartSeries<'_>]) {
    for (position, s) in series.iter().enumerate() {
        let x = MARGIN_LEFT + 8.0 + position as f64 * 110.0;
        let y = HEIGHT - 10.0;
        let _ = write!(
            svg,
            "<rect x=\"{x:.1}\" y=\"{ry:.1}\" width=\"10\" height=\"10\" fill=\"{color}\"/>\
             <text x=\"{tx:.1}\" y=\"{y:.1}\" font-size=\"11\" fill=\"#333\">{label}</text>",
            ry = y - 9.0,
            tx = x + 14.0,
            color = PALETTE[position % PALETTE.len()],
            label = s.label,
        );
    }
}
