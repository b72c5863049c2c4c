//! ASCII/Unicode charts for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Each series gets its own glyph (`*`, `o`, `+`, ...), listed in a legend
//! below the chart.

use crate::chart::{Axis, BarChart, LineChart, Series, padded_bounds, value_bounds};
use crate::domain::Value;

const GLYPHS: [char; 6] = ['*', 'o', '+', 'x', '@', '%'];

/// Render a dual-axis line chart. Left and right series are scaled
/// independently; the x-axis spaces categories evenly.
pub fn render_line_chart(chart: &LineChart, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let left = axis_bounds(&chart.series, Axis::Left);
    let right = axis_bounds(&chart.series, Axis::Right);
    let x_max = (chart.categories.len().max(2) - 1) as f64;

    let mut grid = vec![vec![' '; width]; height];

    for (i, series) in chart.series.iter().enumerate() {
        let glyph = GLYPHS[i % GLYPHS.len()];
        let bounds = match series.axis {
            Axis::Left => left,
            Axis::Right => right,
        };
        let Some((y_min, y_max)) = bounds else {
            continue;
        };

        let mut prev = None;
        for (j, &v) in series.values.iter().enumerate() {
            if !v.is_finite() {
                prev = None;
                continue;
            }
            let x = map_x(j as f64, 0.0, x_max, width);
            let y = map_y(v, y_min, y_max, height);
            match prev {
                Some((x0, y0)) => draw_line(&mut grid, x0, y0, x, y, glyph),
                None => draw_line(&mut grid, x, y, x, y, glyph),
            }
            prev = Some((x, y));
        }
    }

    let mut out = String::new();
    out.push_str(&chart.title);
    out.push('\n');

    let span = match (chart.categories.first(), chart.categories.last()) {
        (Some(first), Some(last)) => format!("{first} .. {last} ({} labels)", chart.categories.len()),
        _ => "(no data)".to_string(),
    };
    out.push_str(&format!("{}: {span}", chart.x_title));
    if let Some((lo, hi)) = left {
        out.push_str(&format!(" | left {}=[{lo:.2}, {hi:.2}]", chart.left_title));
    }
    if let Some((lo, hi)) = right {
        out.push_str(&format!(" | right {}=[{lo:.2}, {hi:.2}]", chart.right_title));
    }
    out.push('\n');

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    for (i, series) in chart.series.iter().enumerate() {
        let (axis_title, side) = match series.axis {
            Axis::Left => (&chart.left_title, "left"),
            Axis::Right => (&chart.right_title, "right"),
        };
        out.push_str(&format!(
            "{} {} ({axis_title}, {side})\n",
            GLYPHS[i % GLYPHS.len()],
            series.name
        ));
    }

    out
}

/// Render a grouped bar chart as horizontal bars, one block per category.
pub fn render_bar_chart(chart: &BarChart, width: usize) -> String {
    let label_width = chart
        .categories
        .iter()
        .map(|c| c.chars().count())
        .max()
        .unwrap_or(0);
    let bar_width = width.saturating_sub(label_width + 5).max(10);

    let max_abs = chart
        .series
        .iter()
        .flat_map(|s| s.values.iter())
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));

    let mut out = String::new();
    out.push_str(&chart.title);
    out.push('\n');
    out.push_str(&format!("x: {} | y: {}\n", chart.x_title, chart.y_title));

    for (c, category) in chart.categories.iter().enumerate() {
        for (i, series) in chart.series.iter().enumerate() {
            let v = series.values.get(c).copied().unwrap_or(0.0);
            let len = if max_abs > 0.0 && v.is_finite() {
                ((v.abs() / max_abs) * bar_width as f64).round() as usize
            } else {
                0
            };
            let label = if i == 0 { category.as_str() } else { "" };
            out.push_str(&format!(
                "{label:<label_width$} {} |{} {}\n",
                GLYPHS[i % GLYPHS.len()],
                "#".repeat(len),
                Value::Number(v)
            ));
        }
    }

    for (i, series) in chart.series.iter().enumerate() {
        out.push_str(&format!("{} {}\n", GLYPHS[i % GLYPHS.len()], series.name));
    }

    out
}

fn axis_bounds(series: &[Series], axis: Axis) -> Option<(f64, f64)> {
    value_bounds(series.iter().filter(|s| s.axis == axis)).map(padded_bounds)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish). Earlier series keep their cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_chart_golden_snapshot_small() {
        let chart = LineChart {
            title: "Values by RegionCd and Date".to_string(),
            x_title: "Date".to_string(),
            left_title: "Amt".to_string(),
            right_title: "Qty".to_string(),
            categories: vec!["2023-01".to_string(), "2023-02".to_string()],
            series: vec![Series {
                name: "SalesAmt".to_string(),
                axis: Axis::Left,
                values: vec![0.0, 10.0],
            }],
        };

        let txt = render_line_chart(&chart, 10, 5);
        let expected = concat!(
            "Values by RegionCd and Date\n",
            "Date: 2023-01 .. 2023-02 (2 labels) | left Amt=[-0.50, 10.50]\n",
            "        **\n",
            "      **  \n",
            "    **    \n",
            "  **      \n",
            "**        \n",
            "* SalesAmt (Amt, left)\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn right_axis_is_scaled_independently() {
        let chart = LineChart {
            title: "t".to_string(),
            x_title: "Date".to_string(),
            left_title: "Amt".to_string(),
            right_title: "Qty".to_string(),
            categories: vec!["2023".to_string(), "2024".to_string()],
            series: vec![
                Series {
                    name: "SalesAmt".to_string(),
                    axis: Axis::Left,
                    values: vec![1000.0, 1000.0],
                },
                Series {
                    name: "SalesQty".to_string(),
                    axis: Axis::Right,
                    values: vec![1.0, 2.0],
                },
            ],
        };

        let txt = render_line_chart(&chart, 10, 5);
        let lines: Vec<&str> = txt.lines().collect();
        assert!(lines[1].contains("right Qty=[0.95, 2.05]"));
        // Qty rises from bottom-left to top-right despite the much larger Amt.
        assert_eq!(lines[2].chars().last(), Some('o'));
        assert_eq!(lines[6].chars().next(), Some('o'));
        assert!(lines[8].starts_with("o SalesQty (Qty, right)"));
    }

    #[test]
    fn bar_chart_golden_snapshot_small() {
        let chart = BarChart {
            title: "Comparison by StoreCd".to_string(),
            x_title: "StoreCd".to_string(),
            y_title: "Values".to_string(),
            categories: vec!["S1".to_string(), "S2".to_string()],
            series: vec![
                Series {
                    name: "SalesAmt".to_string(),
                    axis: Axis::Left,
                    values: vec![10.0, 5.0],
                },
                Series {
                    name: "SalesQty".to_string(),
                    axis: Axis::Left,
                    values: vec![2.0, 0.0],
                },
            ],
        };

        let txt = render_bar_chart(&chart, 20);
        let expected = concat!(
            "Comparison by StoreCd\n",
            "x: StoreCd | y: Values\n",
            "S1 * |############# 10\n",
            "   o |### 2\n",
            "S2 * |####### 5\n",
            "   o | 0\n",
            "* SalesAmt\n",
            "o SalesQty\n",
        );
        assert_eq!(txt, expected);
    }
}
