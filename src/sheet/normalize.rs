// src/sheet/normalize.rs
use super::cell::{Cell, RawSheet};
use super::locale::{excel_serial_to_date, parse_date, parse_number, NumberFormat};
use super::table::{Column, NormalizedTable};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Knobs of the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Cell text (trimmed, case-insensitive) that marks the header row.
    pub header_token: String,
    /// Column parsed as calendar dates.
    pub date_column: String,
    pub number_format: NumberFormat,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            header_token: "data".into(),
            date_column: "Data".into(),
            number_format: NumberFormat::default(),
        }
    }
}

/// Index of the first row containing the header token.
pub fn locate_header(sheet: &RawSheet, token: &str) -> Option<usize> {
    let token = token.trim().to_lowercase();
    sheet.rows.iter().position(|row| {
        row.iter()
            .filter_map(Cell::as_text)
            .any(|t| t.trim().to_lowercase() == token)
    })
}

/// Make names unique: the first `X` stays `X`, later ones become `X.1`,
/// `X.2`, ... in order of appearance, skipping suffixes already taken by
/// other names in the header.
pub fn dedup_columns(names: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .map(|name| {
            let out = if taken.contains(&name) {
                let count = counts.entry(name.clone()).or_insert(0);
                loop {
                    *count += 1;
                    let candidate = format!("{}.{}", name, count);
                    if !taken.contains(&candidate) {
                        break candidate;
                    }
                }
            } else {
                name
            };
            taken.insert(out.clone());
            out
        })
        .collect()
}

/// Turn a headerless grid into a named, typed table. Never fails: a sheet
/// without a header row keeps positional column names.
pub fn normalize(sheet: &RawSheet, opts: &NormalizeOptions) -> NormalizedTable {
    let width = sheet.width();

    let (names, body): (Vec<String>, &[Vec<Cell>]) =
        match locate_header(sheet, &opts.header_token) {
            Some(h) => {
                trace!(row = h, "header row located");
                let names = (0..width)
                    .map(|c| match sheet.get(h, c).as_text() {
                        Some(t) if !t.trim().is_empty() => t,
                        _ => c.to_string(),
                    })
                    .collect();
                (names, &sheet.rows[h + 1..])
            }
            None => {
                debug!(rows = sheet.height(), "no header row; keeping positional columns");
                ((0..width).map(|c| c.to_string()).collect(), &sheet.rows[..])
            }
        };

    let columns: Vec<Vec<Cell>> = (0..width)
        .map(|c| {
            body.iter()
                .map(|row| row.get(c).cloned().unwrap_or(Cell::Empty))
                .collect()
        })
        .collect();

    finish(names, columns, body.len(), opts)
}

/// Run deduplication and coercion again over a table. On a table produced
/// by `normalize` this changes nothing.
pub fn renormalize(table: &NormalizedTable, opts: &NormalizeOptions) -> NormalizedTable {
    let columns = table.columns().iter().map(Column::to_cells).collect();
    finish(table.names().to_vec(), columns, table.n_rows(), opts)
}

fn finish(
    names: Vec<String>,
    columns: Vec<Vec<Cell>>,
    rows: usize,
    opts: &NormalizeOptions,
) -> NormalizedTable {
    let names = dedup_columns(names.into_iter().map(|n| n.trim().to_string()).collect());
    let columns = names
        .iter()
        .zip(columns)
        .map(|(name, cells)| {
            if *name == opts.date_column {
                coerce_dates(&cells, opts.number_format.day_first)
            } else {
                coerce_numbers(cells, &opts.number_format)
            }
        })
        .collect();
    NormalizedTable::from_parts_unchecked(names, columns, rows)
}

fn coerce_dates(cells: &[Cell], day_first: bool) -> Column {
    Column::Date(
        cells
            .iter()
            .map(|c| match c {
                Cell::Date(dt) => Some(dt.date()),
                Cell::Text(s) => parse_date(s, day_first),
                Cell::Number(n) => excel_serial_to_date(*n),
                Cell::Empty | Cell::Bool(_) => None,
            })
            .collect(),
    )
}

/// Numeric columns pass through; textual ones are parsed with the locale.
/// The result replaces the column only when at least one value survives.
fn coerce_numbers(cells: Vec<Cell>, fmt: &NumberFormat) -> Column {
    let textual = cells
        .iter()
        .any(|c| !matches!(c, Cell::Number(_) | Cell::Empty));

    let values: Vec<Option<f64>> = cells
        .iter()
        .map(|c| match c {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) if textual => parse_number(s, fmt),
            _ => None,
        })
        .collect();

    if values.iter().any(Option::is_some) {
        Column::Number(values)
    } else {
        Column::Mixed(cells)
    }
}
