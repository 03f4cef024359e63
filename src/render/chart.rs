// src/render/chart.rs
//
// Line-and-marker SVG charts with plotters.

use super::ChartSpec;
use crate::sheet::Column;
use anyhow::{anyhow, bail, Result};
use chrono::{Datelike, NaiveDate};
use plotters::prelude::*;

fn draw_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("drawing chart: {}", e)
}

/// Plottable points and whether x holds day numbers. Date x values are days
/// since 0001-01-01; any other x column is plotted by row position.
fn points(spec: &ChartSpec) -> Result<(Vec<(i32, f64)>, bool)> {
    let y = spec
        .data
        .column(&spec.y)
        .ok_or_else(|| anyhow!("column '{}' not found", spec.y))?
        .as_numbers()
        .ok_or_else(|| anyhow!("column '{}' is not numeric", spec.y))?;

    let dates = spec.data.column(&spec.x).and_then(Column::as_dates);
    let mut pts: Vec<(i32, f64)> = y
        .iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let v = (*v)?;
            let x = match dates {
                Some(d) => d[i]?.num_days_from_ce(),
                None => i32::try_from(i).ok()?,
            };
            Some((x, v))
        })
        .collect();

    if pts.is_empty() {
        bail!("no values to plot in '{}'", spec.y);
    }
    pts.sort_by_key(|(x, _)| *x);
    Ok((pts, dates.is_some()))
}

fn x_bounds(points: &[(i32, f64)]) -> (i32, i32) {
    let lo = points.iter().map(|p| p.0).min().unwrap_or(0);
    let hi = points.iter().map(|p| p.0).max().unwrap_or(0);
    if lo == hi {
        (lo - 1, hi + 1)
    } else {
        (lo, hi)
    }
}

fn y_bounds(points: &[(i32, f64)]) -> (f64, f64) {
    let lo = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let hi = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let pad = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    (lo - pad, hi + pad)
}

/// Render `spec` as an SVG document.
pub fn render_svg(spec: &ChartSpec, width: u32, height: u32) -> Result<String> {
    let (pts, dated) = points(spec)?;
    let (x_lo, x_hi) = x_bounds(&pts);
    let (y_lo, y_hi) = y_bounds(&pts);

    let x_label = |x: &i32| {
        if dated {
            NaiveDate::from_num_days_from_ce_opt(*x)
                .map(|d| d.format("%d/%m/%y").to_string())
                .unwrap_or_default()
        } else {
            x.to_string()
        }
    };
    let y_label = |y: &f64| format!("{:.2}", y);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&spec.title, ("sans-serif", 20))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_labels(8)
            .x_label_formatter(&x_label)
            .y_label_formatter(&y_label)
            .x_desc(spec.x.as_str())
            .y_desc(spec.y.as_str())
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(LineSeries::new(pts.iter().copied(), &BLUE))
            .map_err(draw_err)?;
        chart
            .draw_series(pts.iter().map(|&p| Circle::new(p, 3, BLUE.filled())))
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
    }
    Ok(svg)
}
