// src/render/terminal.rs
use super::{Level, TabView};
use crate::sheet::NormalizedTable;
use std::fmt::Write;

/// Plain-text rendering of a table with right-aligned columns.
pub fn format_table(table: &NormalizedTable) -> String {
    let mut cells: Vec<Vec<String>> = vec![table.names().to_vec()];
    for row in 0..table.n_rows() {
        cells.push(table.columns().iter().map(|c| c.display(row)).collect());
    }
    let widths: Vec<usize> = (0..table.n_cols())
        .map(|c| cells.iter().map(|r| r[c].chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:>w$}", v, w = *w))
            .collect();
        let _ = writeln!(out, "  {}", line.join("  ").trim_end());
    }
    out
}

/// One tab as terminal text: title, notices, date span and latest values.
pub fn format_tab(tab: &TabView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", tab.title);
    for n in &tab.notices {
        let tag = match n.level {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        let _ = writeln!(out, "[{}] {}", tag, n.message);
    }
    if let Some((from, to)) = tab.date_span {
        let _ = writeln!(
            out,
            "period: {} to {}",
            from.format("%d/%m/%Y"),
            to.format("%d/%m/%Y")
        );
    }
    if let Some(table) = &tab.table {
        out.push_str(&format_table(table));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Column;
    use chrono::NaiveDate;

    #[test]
    fn aligns_columns() {
        let t = NormalizedTable::new(
            vec!["Data".into(), "À vista R$".into()],
            vec![
                Column::Date(vec![NaiveDate::from_ymd_opt(2024, 3, 5), None]),
                Column::Number(vec![Some(2345.67), Some(12.0)]),
            ],
        )
        .unwrap();
        assert_eq!(
            format_table(&t),
            "        Data  À vista R$\n  05/03/2024     2345.67\n                      12\n"
        );
    }

    #[test]
    fn tab_lists_notices_first() {
        let mut tab = TabView::new("Milho");
        tab.notice(Level::Error, "Failed to read milho.xls");
        let text = format_tab(&tab);
        assert_eq!(text, "== Milho ==\n[error] Failed to read milho.xls\n");
    }
}
