// src/adjust.rs
//
// Per-series tweaks applied between reading and rendering.

use crate::config::ScaleRule;
use crate::sheet::{Column, NormalizedTable};
use chrono::NaiveDate;
use tracing::debug;

/// Divide `rule.column` by `rule.divisor` when `identifier` carries the
/// rule's marker. Tables of other series, and tables without that numeric
/// column, come back unchanged.
pub fn apply_scale_correction(
    table: &NormalizedTable,
    identifier: &str,
    rule: &ScaleRule,
) -> NormalizedTable {
    if !identifier
        .to_lowercase()
        .contains(&rule.marker.to_lowercase())
    {
        return table.clone();
    }

    let mut out = table.clone();
    match out.column_mut(&rule.column) {
        Some(Column::Number(values)) => {
            for v in values.iter_mut().flatten() {
                *v /= rule.divisor;
            }
            debug!(identifier, column = %rule.column, divisor = rule.divisor, "scale correction applied");
        }
        Some(_) => debug!(identifier, column = %rule.column, "scale column is not numeric"),
        None => {}
    }
    out
}

/// Rows whose date falls in `[from, to]` (either bound optional). Rows with
/// an unparsed date are dropped; tables without a typed date column are
/// returned as they are.
pub fn filter_date_range(
    table: &NormalizedTable,
    date_column: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> NormalizedTable {
    let Some(dates) = table.column(date_column).and_then(Column::as_dates) else {
        return table.clone();
    };
    if from.is_none() && to.is_none() {
        return table.clone();
    }
    table.filter_rows(|i| match dates[i] {
        Some(d) => from.map_or(true, |f| d >= f) && to.map_or(true, |t| d <= t),
        None => false,
    })
}

/// Earliest and latest parsed date.
pub fn date_bounds(table: &NormalizedTable, date_column: &str) -> Option<(NaiveDate, NaiveDate)> {
    let dates = table.column(date_column)?.as_dates()?;
    let min = dates.iter().flatten().min()?;
    let max = dates.iter().flatten().max()?;
    Some((*min, *max))
}

/// Names of numeric columns, in table order.
pub fn numeric_columns(table: &NormalizedTable) -> Vec<&str> {
    table
        .names()
        .iter()
        .zip(table.columns())
        .filter(|(_, c)| c.is_numeric())
        .map(|(n, _)| n.as_str())
        .collect()
}

/// The `latest` most recent rows, newest first, when the table has a typed
/// date column; the last `tail` rows otherwise.
pub fn latest_rows(
    table: &NormalizedTable,
    date_column: &str,
    latest: usize,
    tail: usize,
) -> NormalizedTable {
    match table.sort_by_date(date_column, true) {
        Some(sorted) => sorted.head(latest),
        None => table.tail(tail),
    }
}

/// Round a numeric column to `places` decimals for display.
pub fn round_column(table: &NormalizedTable, column: &str, places: i32) -> NormalizedTable {
    let mut out = table.clone();
    if let Some(Column::Number(values)) = out.column_mut(column) {
        let scale = 10f64.powi(places);
        for v in values.iter_mut().flatten() {
            *v = (*v * scale).round() / scale;
        }
    }
    out
}
