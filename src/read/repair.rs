// src/read/repair.rs
//
// Last-resort conversion of files no decoder can open: a desktop office
// application is started headless, re-saves the workbook as .xlsx and exits.

use super::{decode, Strategy};
use crate::sheet::RawSheet;
use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use glob::glob;
use rust_xlsxwriter::{Format, Workbook};
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Converts an unreadable workbook into a modern one on disk.
pub trait Repairer: Send + Sync {
    /// Write a repaired copy of `path` into `dest_dir`, returning its path.
    fn repair(&self, path: &Path, dest_dir: &Path) -> Result<PathBuf>;
}

/// `<dest_dir>/<stem>.repaired.xlsx`
pub fn repaired_path(path: &Path, dest_dir: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".into());
    dest_dir.join(format!("{}.repaired.xlsx", stem))
}

/// LibreOffice (or any `soffice`-compatible binary) in headless mode.
/// Each call starts a private instance with its own throwaway profile and
/// waits for it to exit.
#[derive(Debug, Clone)]
pub struct OfficeRepairer {
    program: PathBuf,
}

impl OfficeRepairer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for OfficeRepairer {
    fn default() -> Self {
        Self::new("soffice")
    }
}

impl Repairer for OfficeRepairer {
    #[instrument(level = "info", skip(self), fields(src = %path.display()))]
    fn repair(&self, path: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let work = tempfile::tempdir().context("creating conversion workspace")?;
        let profile = Url::from_directory_path(work.path().join("profile"))
            .map_err(|_| anyhow!("cannot express {} as a file URL", work.path().display()))?;
        let source = fs::canonicalize(path)
            .with_context(|| format!("resolving {}", path.display()))?;

        let output = Command::new(&self.program)
            .arg(format!("-env:UserInstallation={}", profile))
            .args(["--headless", "--norestore", "--convert-to", "xlsx", "--outdir"])
            .arg(work.path())
            .arg(&source)
            .output()
            .with_context(|| format!("starting {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let produced = work.path().join(format!("{}.xlsx", stem));
        if !produced.is_file() {
            bail!(
                "{} produced no output for {}: {}",
                self.program.display(),
                path.display(),
                String::from_utf8_lossy(&output.stdout).trim()
            );
        }

        fs::create_dir_all(dest_dir)
            .with_context(|| format!("creating {}", dest_dir.display()))?;
        let target = repaired_path(path, dest_dir);
        fs::copy(&produced, &target)
            .with_context(|| format!("copying converted file to {}", target.display()))?;
        info!(dest = %target.display(), "repaired workbook");
        Ok(target)
    }
}

/// Stand-in for machines without an office application.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRepair;

impl Repairer for NoRepair {
    fn repair(&self, path: &Path, _dest_dir: &Path) -> Result<PathBuf> {
        bail!(
            "no office application available to repair {}",
            path.display()
        )
    }
}

/// Fallback strategy: repair, then decode the result by extension.
pub struct OfficeRepair {
    repairer: Box<dyn Repairer>,
    dest_dir: Option<PathBuf>,
}

impl OfficeRepair {
    /// `dest_dir = None` writes the repaired copy next to the source.
    pub fn new(repairer: Box<dyn Repairer>, dest_dir: Option<PathBuf>) -> Self {
        Self { repairer, dest_dir }
    }
}

impl Strategy for OfficeRepair {
    fn name(&self) -> &str {
        "office-repair"
    }

    fn load(&self, path: &Path) -> Result<Vec<(String, RawSheet)>> {
        let dest = self
            .dest_dir
            .clone()
            .or_else(|| {
                path.parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
            })
            .unwrap_or_else(|| PathBuf::from("."));
        let repaired = self.repairer.repair(path, &dest)?;
        decode::read_by_extension(&repaired)
    }
}

/// Rewrite `path` in place without its first `n` rows on every sheet.
/// Rows are counted from the top of the sheet (row 1), not from the first
/// used cell.
pub fn drop_leading_rows(path: &Path, n: u32) -> Result<()> {
    if n == 0 {
        return Ok(());
    }

    let sheets: Vec<(String, calamine::Range<Data>)> = {
        let mut workbook =
            open_workbook_auto(path).with_context(|| format!("opening {}", path.display()))?;
        workbook
            .sheet_names()
            .into_iter()
            .map(|name| {
                let range = workbook
                    .worksheet_range(&name)
                    .with_context(|| format!("reading sheet `{}`", name))?;
                Ok((name, range))
            })
            .collect::<Result<_>>()?
    };

    let date_format = Format::new().set_num_format("dd/mm/yyyy");
    let mut book = Workbook::new();
    for (name, range) in &sheets {
        let ws = book.add_worksheet();
        ws.set_name(name)?;
        let (row0, col0) = range.start().unwrap_or((0, 0));
        for (i, row) in range.rows().enumerate() {
            let abs = row0 + i as u32;
            if abs < n {
                continue;
            }
            let r = abs - n;
            for (j, value) in row.iter().enumerate() {
                let c = (col0 as usize + j) as u16;
                match value {
                    Data::Int(v) => {
                        ws.write_number(r, c, *v as f64)?;
                    }
                    Data::Float(v) => {
                        ws.write_number(r, c, *v)?;
                    }
                    Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                        ws.write_string(r, c, s)?;
                    }
                    Data::Bool(b) => {
                        ws.write_boolean(r, c, *b)?;
                    }
                    Data::DateTime(dt) => {
                        ws.write_number_with_format(r, c, dt.as_f64(), &date_format)?;
                    }
                    Data::Error(_) | Data::Empty => {}
                }
            }
        }
    }
    book.save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), rows = n, "dropped leading rows");
    Ok(())
}

/// Outcome of repairing one file in a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub source: PathBuf,
    pub result: Result<PathBuf, String>,
}

/// Repair every `*.xls` directly inside `source_dir` into `dest_dir`.
/// A failing file is recorded and the batch moves on.
pub fn repair_directory(
    repairer: &dyn Repairer,
    source_dir: &Path,
    dest_dir: &Path,
    drop_rows: u32,
) -> Result<Vec<BatchItem>> {
    fs::create_dir_all(dest_dir).with_context(|| format!("creating {}", dest_dir.display()))?;

    let pattern = format!(
        "{}/*.xls",
        glob::Pattern::escape(&source_dir.to_string_lossy())
    );
    let mut files: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("invalid glob pattern '{}'", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    info!(count = files.len(), dir = %source_dir.display(), "repairing workbooks");

    let mut report = Vec::with_capacity(files.len());
    for file in files {
        let result = repairer.repair(&file, dest_dir).and_then(|out| {
            drop_leading_rows(&out, drop_rows)?;
            Ok(out)
        });
        let result = result.map_err(|e| format!("{:#}", e));
        match &result {
            Ok(out) => info!(src = %file.display(), dest = %out.display(), "repaired"),
            Err(e) => error!(src = %file.display(), error = %e, "repair failed"),
        }
        report.push(BatchItem {
            source: file,
            result,
        });
    }

    if report.iter().any(|i| i.result.is_err()) {
        warn!(
            failed = report.iter().filter(|i| i.result.is_err()).count(),
            "some workbooks could not be repaired"
        );
    }
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tempfile::tempdir;

    /// Writes a fixed xlsx instead of calling an office application.
    pub(crate) struct FakeRepairer {
        pub calls: Arc<AtomicUsize>,
        pub fail: bool,
    }

    impl FakeRepairer {
        pub fn new(fail: bool) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: calls.clone(),
                    fail,
                },
                calls,
            )
        }
    }

    impl Repairer for FakeRepairer {
        fn repair(&self, path: &Path, dest_dir: &Path) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("office application missing");
            }
            let target = repaired_path(path, dest_dir);
            write_fixture(&target)?;
            Ok(target)
        }
    }

    /// Three banner rows, a header row and two data rows.
    pub(crate) fn write_fixture(path: &Path) -> Result<()> {
        let mut book = Workbook::new();
        let ws = book.add_worksheet();
        ws.set_name("Plan 1")?;
        ws.write_string(0, 0, "CEPEA/ESALQ")?;
        ws.write_string(1, 0, "Indicador")?;
        ws.write_string(3, 0, "Data")?;
        ws.write_string(3, 1, "À vista R$")?;
        ws.write_string(4, 0, "05/03/2024")?;
        ws.write_string(4, 1, "2.345,67")?;
        ws.write_string(5, 0, "06/03/2024")?;
        ws.write_number(5, 1, 2350.5)?;
        book.save(path)?;
        Ok(())
    }

    #[test]
    fn repaired_name_keeps_stem() {
        assert_eq!(
            repaired_path(Path::new("/data/milho.xls"), Path::new("/out")),
            PathBuf::from("/out/milho.repaired.xlsx")
        );
    }

    #[test]
    fn no_repair_always_fails() {
        let err = NoRepair
            .repair(Path::new("x.xls"), Path::new("."))
            .unwrap_err();
        assert!(err.to_string().contains("x.xls"));
    }

    #[test]
    fn missing_program_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("a.xls");
        fs::write(&src, b"junk")?;
        let repairer = OfficeRepairer::new(dir.path().join("no-such-office"));
        assert!(repairer.repair(&src, dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn drops_rows_from_the_top_of_the_sheet() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("f.xlsx");
        write_fixture(&path)?;
        drop_leading_rows(&path, 3)?;

        let sheets = decode::read_by_extension(&path)?;
        assert_eq!(sheets.len(), 1);
        let (name, raw) = &sheets[0];
        assert_eq!(name, "Plan 1");
        assert_eq!(raw.get(0, 0), &crate::sheet::Cell::Text("Data".into()));
        assert_eq!(raw.get(2, 1), &crate::sheet::Cell::Number(2350.5));
        Ok(())
    }

    #[test]
    fn batch_records_each_file() -> Result<()> {
        let src = tempdir()?;
        let dest = tempdir()?;
        fs::write(src.path().join("b.xls"), b"x")?;
        fs::write(src.path().join("a.xls"), b"x")?;
        fs::write(src.path().join("notes.txt"), b"x")?;

        let (repairer, calls) = FakeRepairer::new(false);
        let report = repair_directory(&repairer, src.path(), dest.path(), 3)?;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.len(), 2);
        assert!(report[0].source.ends_with("a.xls"));
        assert!(report.iter().all(|i| i.result.is_ok()));
        assert!(dest.path().join("a.repaired.xlsx").is_file());

        let (failing, _) = FakeRepairer::new(true);
        let report = repair_directory(&failing, src.path(), dest.path(), 0)?;
        assert!(report.iter().all(|i| i.result.is_err()));
        Ok(())
    }
}
