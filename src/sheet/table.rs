// src/sheet/table.rs
use super::cell::Cell;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;

/// A typed column of a normalized table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum Column {
    Date(Vec<Option<NaiveDate>>),
    Number(Vec<Option<f64>>),
    /// Cells kept as read, for columns that could not be typed.
    Mixed(Vec<Cell>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Date(v) => v.len(),
            Column::Number(v) => v.len(),
            Column::Mixed(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Number(_))
    }

    pub fn as_numbers(&self) -> Option<&[Option<f64>]> {
        match self {
            Column::Number(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dates(&self) -> Option<&[Option<NaiveDate>]> {
        match self {
            Column::Date(v) => Some(v),
            _ => None,
        }
    }

    /// Back to untyped cells; typed nulls become `Cell::Empty`.
    pub fn to_cells(&self) -> Vec<Cell> {
        match self {
            Column::Date(v) => v
                .iter()
                .map(|d| match d.and_then(|d| d.and_hms_opt(0, 0, 0)) {
                    Some(dt) => Cell::Date(dt),
                    None => Cell::Empty,
                })
                .collect(),
            Column::Number(v) => v
                .iter()
                .map(|n| n.map_or(Cell::Empty, Cell::Number))
                .collect(),
            Column::Mixed(v) => v.clone(),
        }
    }

    /// Display text of one value, empty for nulls.
    pub fn display(&self, row: usize) -> String {
        match self {
            Column::Date(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_default(),
            Column::Number(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|n| n.to_string())
                .unwrap_or_default(),
            Column::Mixed(v) => v.get(row).and_then(Cell::as_text).unwrap_or_default(),
        }
    }

    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Date(v) => Column::Date(rows.iter().map(|&i| v[i]).collect()),
            Column::Number(v) => Column::Number(rows.iter().map(|&i| v[i]).collect()),
            Column::Mixed(v) => Column::Mixed(rows.iter().map(|&i| v[i].clone()).collect()),
        }
    }
}

/// Named, typed columns of equal length. Names are unique once produced by
/// the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedTable {
    names: Vec<String>,
    columns: Vec<Column>,
    rows: usize,
}

impl NormalizedTable {
    /// Build a table from parallel names/columns. Columns must share a length.
    pub fn new(names: Vec<String>, columns: Vec<Column>) -> anyhow::Result<Self> {
        if names.len() != columns.len() {
            anyhow::bail!(
                "{} column names for {} columns",
                names.len(),
                columns.len()
            );
        }
        let rows = columns.first().map_or(0, Column::len);
        if let Some((name, col)) = names
            .iter()
            .zip(&columns)
            .find(|(_, c)| c.len() != rows)
        {
            anyhow::bail!("column `{}` has {} rows, expected {}", name, col.len(), rows);
        }
        Ok(Self {
            names,
            columns,
            rows,
        })
    }

    pub(crate) fn from_parts_unchecked(names: Vec<String>, columns: Vec<Column>, rows: usize) -> Self {
        Self {
            names,
            columns,
            rows,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.position(name).map(move |i| &mut self.columns[i])
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// A new table with the given row indices, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> NormalizedTable {
        Self {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            rows: rows.len(),
        }
    }

    /// Keep rows for which `keep(row)` is true.
    pub fn filter_rows(&self, mut keep: impl FnMut(usize) -> bool) -> NormalizedTable {
        let idx: Vec<usize> = (0..self.rows).filter(|&i| keep(i)).collect();
        self.take_rows(&idx)
    }

    /// A new table with only the named columns, in that order. Unknown names
    /// are skipped.
    pub fn select(&self, names: &[&str]) -> NormalizedTable {
        let (names, columns) = names
            .iter()
            .filter_map(|n| self.column(n).map(|c| (n.to_string(), c.clone())))
            .unzip();
        Self {
            names,
            columns,
            rows: self.rows,
        }
    }

    /// Rows ordered by a date column, nulls last. Stable for equal dates.
    pub fn sort_by_date(&self, name: &str, descending: bool) -> Option<NormalizedTable> {
        let dates = self.column(name)?.as_dates()?;
        let mut idx: Vec<usize> = (0..self.rows).collect();
        idx.sort_by(|&a, &b| match (dates[a], dates[b]) {
            (Some(x), Some(y)) if descending => y.cmp(&x),
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        Some(self.take_rows(&idx))
    }

    pub fn head(&self, n: usize) -> NormalizedTable {
        let idx: Vec<usize> = (0..self.rows.min(n)).collect();
        self.take_rows(&idx)
    }

    pub fn tail(&self, n: usize) -> NormalizedTable {
        let start = self.rows.saturating_sub(n);
        let idx: Vec<usize> = (start..self.rows).collect();
        self.take_rows(&idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    fn sample() -> NormalizedTable {
        NormalizedTable::new(
            vec!["Data".into(), "v".into()],
            vec![
                Column::Date(vec![d(2024, 1, 2), None, d(2024, 1, 1), d(2024, 1, 3)]),
                Column::Number(vec![Some(2.0), Some(9.0), Some(1.0), Some(3.0)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = NormalizedTable::new(
            vec!["a".into(), "b".into()],
            vec![
                Column::Number(vec![Some(1.0)]),
                Column::Number(vec![]),
            ],
        );
        assert!(err.is_err());
        assert!(NormalizedTable::new(vec!["a".into()], vec![]).is_err());
    }

    #[test]
    fn sorts_by_date_with_nulls_last() {
        let t = sample().sort_by_date("Data", true).unwrap();
        assert_eq!(
            t.column("v").unwrap().as_numbers().unwrap(),
            &[Some(3.0), Some(2.0), Some(1.0), Some(9.0)]
        );
        assert!(sample().sort_by_date("v", true).is_none());
    }

    #[test]
    fn head_tail_select() {
        let t = sample();
        assert_eq!(t.head(2).n_rows(), 2);
        assert_eq!(t.head(10).n_rows(), 4);
        assert_eq!(
            t.tail(1).column("v").unwrap().as_numbers().unwrap(),
            &[Some(3.0)]
        );
        let s = t.select(&["v", "missing"]);
        assert_eq!(s.names(), &["v".to_string()]);
        assert_eq!(s.n_rows(), 4);
    }

    #[test]
    fn cells_round_trip_through_typed_columns() {
        let col = Column::Number(vec![Some(1.5), None]);
        assert_eq!(col.to_cells(), vec![Cell::Number(1.5), Cell::Empty]);
        assert_eq!(col.display(0), "1.5");
        assert_eq!(col.display(1), "");
    }
}
