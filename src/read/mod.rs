// src/read/mod.rs
pub mod decode;
pub mod repair;

use crate::sheet::{normalize, Cell, Column, NormalizeOptions, NormalizedTable, RawSheet};
use anyhow::{anyhow, Result};
use std::{
    fmt::Display,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

pub use decode::{ContentSniff, LegacyXls};
pub use repair::{NoRepair, OfficeRepair, OfficeRepairer, Repairer};

/// Sheet name of the sentinel entry of a failed read.
pub const ERROR_SHEET: &str = "__error__";
/// Only column of the sentinel table.
pub const ERROR_COLUMN: &str = "error";

/// One way of turning a file into raw sheets.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self, path: &Path) -> Result<Vec<(String, RawSheet)>>;
}

/// All sheets of one file, in workbook order, or the single sentinel entry
/// describing why the file could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSet {
    entries: Vec<(String, NormalizedTable)>,
    failed: bool,
}

impl SheetSet {
    pub fn from_sheets(entries: Vec<(String, NormalizedTable)>) -> Self {
        Self {
            entries,
            failed: false,
        }
    }

    pub fn failure(err: impl Display) -> Self {
        let table = NormalizedTable::from_parts_unchecked(
            vec![ERROR_COLUMN.to_string()],
            vec![Column::Mixed(vec![Cell::Text(err.to_string())])],
            1,
        );
        Self {
            entries: vec![(ERROR_SHEET.to_string(), table)],
            failed: true,
        }
    }

    pub fn is_error(&self) -> bool {
        self.failed
    }

    /// Error text of a failed read.
    pub fn error(&self) -> Option<String> {
        if !self.failed {
            return None;
        }
        self.get(ERROR_SHEET)
            .and_then(|t| t.column(ERROR_COLUMN))
            .map(|c| c.display(0))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&NormalizedTable> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// First data sheet; `None` for failures and workbooks without sheets.
    pub fn first(&self) -> Option<(&str, &NormalizedTable)> {
        if self.failed {
            return None;
        }
        self.entries.first().map(|(n, t)| (n.as_str(), t))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NormalizedTable)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }
}

/// Ordered decoding strategies; the first one that succeeds wins.
pub struct ReaderChain {
    strategies: Vec<Box<dyn Strategy>>,
    options: NormalizeOptions,
}

impl ReaderChain {
    pub fn new(strategies: Vec<Box<dyn Strategy>>, options: NormalizeOptions) -> Self {
        Self {
            strategies,
            options,
        }
    }

    /// BIFF decoder, then content sniffing, then office repair.
    pub fn standard(
        options: NormalizeOptions,
        repairer: Box<dyn Repairer>,
        repair_dir: Option<PathBuf>,
    ) -> Self {
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(LegacyXls),
            Box::new(ContentSniff),
            Box::new(OfficeRepair::new(repairer, repair_dir)),
        ];
        Self::new(strategies, options)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    /// Read and normalize every sheet of `path`. Failures come back as the
    /// sentinel `SheetSet` carrying the last strategy's error.
    #[tracing::instrument(level = "info", skip(self), fields(path = %path.display()))]
    pub fn read_all_sheets(&self, path: &Path) -> SheetSet {
        let mut last_err = anyhow!("no read strategies configured");

        for strategy in &self.strategies {
            // decoders have been known to panic on truncated files
            let attempt = panic::catch_unwind(AssertUnwindSafe(|| strategy.load(path)))
                .unwrap_or_else(|_| Err(anyhow!("{} panicked while decoding", strategy.name())));

            match attempt {
                Ok(sheets) => {
                    info!(strategy = strategy.name(), sheets = sheets.len(), "workbook read");
                    return SheetSet::from_sheets(
                        sheets
                            .into_iter()
                            .map(|(name, raw)| {
                                let table = normalize(&raw, &self.options);
                                (name, table)
                            })
                            .collect(),
                    );
                }
                Err(e) => {
                    let msg = format!("{:#}", e);
                    warn!(strategy = strategy.name(), error = %msg, "read strategy failed");
                    last_err = e;
                }
            }
        }

        SheetSet::failure(format!("{:#}", last_err))
    }
}
