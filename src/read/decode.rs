// src/read/decode.rs
use super::Strategy;
use crate::sheet::{Cell, RawSheet};
use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook, open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Xls};
use std::{
    fs,
    io::{Cursor, Read, Seek},
    path::Path,
};
use tracing::debug;

/// Map one calamine value to a `Cell`. Cell errors (`#N/A`, ...) read as empty.
pub fn cell_from_data(d: &Data) -> Cell {
    match d {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or(Cell::Number(dt.as_f64()), Cell::Date),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

/// Copy a calamine range into a grid anchored at A1, so positional column
/// names match the sheet's own columns.
pub fn range_to_raw(range: &Range<Data>) -> RawSheet {
    let (row0, col0) = range
        .start()
        .map_or((0, 0), |(r, c)| (r as usize, c as usize));
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row0];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col0];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }
    RawSheet::new(rows)
}

fn collect_sheets<RS, R>(workbook: &mut R) -> Result<Vec<(String, RawSheet)>>
where
    RS: Read + Seek,
    R: Reader<RS>,
{
    let names = workbook.sheet_names();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| anyhow!("reading sheet `{}`: {:?}", name, e))?;
        debug!(sheet = %name, rows = range.height(), cols = range.width(), "decoded sheet");
        out.push((name, range_to_raw(&range)));
    }
    Ok(out)
}

/// BIFF decoder for genuine legacy `.xls` files.
pub struct LegacyXls;

impl Strategy for LegacyXls {
    fn name(&self) -> &str {
        "legacy-xls"
    }

    fn load(&self, path: &Path) -> Result<Vec<(String, RawSheet)>> {
        let mut workbook: Xls<_> = open_workbook(path)
            .with_context(|| format!("opening {} as BIFF workbook", path.display()))?;
        collect_sheets(&mut workbook)
    }
}

/// Detects the container from the file bytes rather than the extension.
/// Catches exports that carry an `.xls` name over xlsx/ods content. A genuine
/// BIFF file lands on the same calamine `Xls` reader as `LegacyXls`, so this
/// adds nothing for corrupt legacy workbooks; those fall through to repair.
pub struct ContentSniff;

impl Strategy for ContentSniff {
    fn name(&self) -> &str {
        "content-sniff"
    }

    fn load(&self, path: &Path) -> Result<Vec<(String, RawSheet)>> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .with_context(|| format!("detecting workbook format of {}", path.display()))?;
        collect_sheets(&mut workbook)
    }
}

/// Generic decoder chosen by file extension; used on repaired files.
pub fn read_by_extension(path: &Path) -> Result<Vec<(String, RawSheet)>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("opening {}", path.display()))?;
    collect_sheets(&mut workbook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    #[test]
    fn sniffs_xlsx_behind_xls_name() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("milho.xls");
        let mut book = Workbook::new();
        let ws = book.add_worksheet();
        ws.set_name("Plan1")?;
        ws.write_string(2, 1, "Data")?;
        ws.write_number(3, 2, 61.5)?;
        ws.write_boolean(4, 1, true)?;
        book.save(&path)?;

        assert!(LegacyXls.load(&path).is_err());

        let sheets = ContentSniff.load(&path)?;
        assert_eq!(sheets.len(), 1);
        let (name, raw) = &sheets[0];
        assert_eq!(name, "Plan1");
        assert_eq!(raw.get(2, 1), &Cell::Text("Data".into()));
        assert_eq!(raw.get(3, 2), &Cell::Number(61.5));
        assert_eq!(raw.get(4, 1), &Cell::Bool(true));
        assert_eq!(raw.get(0, 0), &Cell::Empty);
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = Path::new("/definitely/not/here.xls");
        assert!(LegacyXls.load(path).is_err());
        assert!(ContentSniff.load(path).is_err());
        assert!(read_by_extension(path).is_err());
    }
}
