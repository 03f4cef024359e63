// src/discover.rs
use anyhow::{Context, Result};
use glob::{glob, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Spreadsheet files directly in `dir` (or below it when `recursive`) whose
/// extension matches case-insensitively, sorted by path. A missing directory
/// yields an empty list.
pub fn list_spreadsheets(dir: &Path, recursive: bool, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "data directory does not exist");
        return Ok(Vec::new());
    }

    let base = Pattern::escape(&dir.to_string_lossy());
    let pattern = if recursive {
        format!("{}/**/*", base)
    } else {
        format!("{}/*", base)
    };
    let wanted = extension.trim_start_matches('.').to_lowercase();

    let mut files: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
        .filter_map(|entry| match entry {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "cannot read directory entry");
                None
            }
        })
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.to_lowercase() == wanted)
        })
        .collect();
    files.sort();
    debug!(count = files.len(), dir = %dir.display(), "discovered spreadsheets");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn lists_matching_files_sorted() -> Result<()> {
        let dir = tempdir()?;
        for name in ["milho.xls", "dolar.XLS", "cafe.xlsx", "notes.txt"] {
            fs::write(dir.path().join(name), b"x")?;
        }
        fs::create_dir(dir.path().join("old"))?;
        fs::write(dir.path().join("old").join("soja.xls"), b"x")?;
        fs::create_dir(dir.path().join("trap.xls"))?;

        let flat = list_spreadsheets(dir.path(), false, "xls")?;
        let names: Vec<_> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["dolar.XLS", "milho.xls"]);

        let deep = list_spreadsheets(dir.path(), true, ".xls")?;
        assert_eq!(deep.len(), 3);
        assert!(deep.windows(2).all(|w| w[0] <= w[1]));
        Ok(())
    }

    #[test]
    fn missing_directory_is_empty() -> Result<()> {
        assert!(list_spreadsheets(Path::new("/no/such/dir"), false, "xls")?.is_empty());
        Ok(())
    }
}
