//! Plotters-powered chart widgets for Ratatui.
//!
//! Plotters gives us proper line/rectangle rasterization into the terminal
//! buffer via `plotters-ratatui-backend`. Tick labels are drawn by the caller
//! with plain Ratatui paragraphs (see `draw_axis_ticks` in the parent module),
//! since text rendering through the canvas backend is unreliable at terminal
//! resolution.

use plotters::prelude::*;
use plotters::style::Color as _;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::chart::{Axis, BarChart, LineChart, Series};

/// Series palette, high-contrast for terminals. Index `i % len`.
pub const SERIES_COLORS: [(u8, u8, u8); 6] = [
    (0, 255, 255),
    (255, 215, 0),
    (0, 255, 0),
    (255, 0, 255),
    (255, 80, 80),
    (255, 255, 255),
];

pub fn series_rgb(idx: usize) -> RGBColor {
    let (r, g, b) = SERIES_COLORS[idx % SERIES_COLORS.len()];
    RGBColor(r, g, b)
}

/// Same palette as Ratatui colors (for legends).
pub fn series_color(idx: usize) -> Color {
    let (r, g, b) = SERIES_COLORS[idx % SERIES_COLORS.len()];
    Color::Rgb(r, g, b)
}

/// Dual-axis line chart over categorical x positions `0..n`.
pub struct LineChartWidget<'a> {
    pub chart: &'a LineChart,
    pub x_bounds: [f64; 2],
    pub left_bounds: [f64; 2],
    /// Present when at least one series sits on the right axis.
    pub right_bounds: Option<[f64; 2]>,
}

/// Grouped bars; category `i` is centered on x = `i`.
pub struct BarChartWidget<'a> {
    pub chart: &'a BarChart,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

fn too_small(area: Rect, buf: &mut Buffer) -> bool {
    // Plotters may fail to lay out a chart in a tiny area; show a hint instead.
    if area.width < 20 || area.height < 8 {
        buf.set_string(
            area.x,
            area.y,
            "Chart area too small (resize terminal).",
            Style::default().fg(Color::Yellow),
        );
        return true;
    }
    false
}

fn valid(bounds: [f64; 2]) -> bool {
    bounds[0].is_finite() && bounds[1].is_finite() && bounds[1] > bounds[0]
}

fn points(series: &Series) -> impl Iterator<Item = (f64, f64)> + '_ {
    series
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| (i as f64, v))
}

impl<'a> Widget for LineChartWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if too_small(area, buf) {
            return;
        }
        if !valid(self.x_bounds) || !valid(self.left_bounds) || !self.right_bounds.is_none_or(valid) {
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.left_bounds;
        let [r0, r1] = self.right_bounds.unwrap_or(self.left_bounds);

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_labels(0)
                .y_labels(0)
                .axis_style(&WHITE)
                .draw()?;

            let mut chart = chart.set_secondary_coord(x0..x1, r0..r1);

            for (idx, series) in self.chart.series.iter().enumerate() {
                let color = series_rgb(idx);
                match series.axis {
                    Axis::Left => {
                        chart.draw_series(LineSeries::new(points(series), &color))?;
                        chart.draw_series(points(series).map(|p| Pixel::new(p, color)))?;
                    }
                    Axis::Right => {
                        chart.draw_secondary_series(LineSeries::new(points(series), &color))?;
                        chart.draw_secondary_series(points(series).map(|p| Pixel::new(p, color)))?;
                    }
                }
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}

impl<'a> Widget for BarChartWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if too_small(area, buf) {
            return;
        }
        if !valid(self.x_bounds) || !valid(self.y_bounds) {
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        let groups = self.chart.series.len().max(1) as f64;
        let slot = 0.8 / groups;

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_labels(0)
                .y_labels(0)
                .axis_style(&WHITE)
                .draw()?;

            for (idx, series) in self.chart.series.iter().enumerate() {
                let color = series_rgb(idx);
                chart.draw_series(points(series).map(|(x, v)| {
                    let left = x - 0.4 + slot * idx as f64;
                    Rectangle::new([(left, 0.0_f64.clamp(y0, y1)), (left + slot * 0.9, v)], color.filled())
                }))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
