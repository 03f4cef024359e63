// src/render/mod.rs
pub mod chart;
pub mod html;
pub mod terminal;

use crate::adjust::{
    apply_scale_correction, date_bounds, filter_date_range, latest_rows, numeric_columns,
    round_column,
};
use crate::config::Config;
use crate::fetch::ExternalSeries;
use crate::read::SheetSet;
use crate::sheet::NormalizedTable;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// Inline message shown on a tab instead of (or next to) its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

/// What to plot: `y` over `x` from `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub x: String,
    pub y: String,
    pub data: NormalizedTable,
}

/// Inclusive date window applied to every tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Everything needed to draw one dashboard tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabView {
    pub title: String,
    pub notices: Vec<Notice>,
    pub chart: Option<ChartSpec>,
    pub table: Option<NormalizedTable>,
    /// Full date span of the source before windowing.
    pub date_span: Option<(NaiveDate, NaiveDate)>,
}

impl TabView {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            notices: Vec::new(),
            chart: None,
            table: None,
            date_span: None,
        }
    }

    pub fn notice(&mut self, level: Level, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.notices.iter().any(|n| n.level == Level::Error)
    }
}

fn price_title(label: &str, unit: &str) -> String {
    if unit.is_empty() {
        format!("{} - Preço À Vista", label)
    } else {
        format!("{} - Preço À Vista ({})", label, unit)
    }
}

/// Chart and latest-values table for a normalized series.
fn fill_series(tab: &mut TabView, table: &NormalizedTable, title: String, cfg: &Config, window: DateWindow) {
    let date_col = cfg.normalize.date_column.as_str();
    let value_col = cfg.dashboard.value_column.as_str();

    tab.date_span = date_bounds(table, date_col);
    let table = filter_date_range(table, date_col, window.from, window.to);

    let x = if table.has_column(date_col) {
        date_col.to_string()
    } else {
        table.names()[0].clone()
    };

    if table.has_column(value_col) {
        tab.chart = Some(ChartSpec {
            title,
            x,
            y: value_col.to_string(),
            data: table.clone(),
        });
    } else {
        tab.notice(
            Level::Warning,
            format!("Column '{}' not found; using the available data.", value_col),
        );
        match numeric_columns(&table).first() {
            Some(y) => {
                tab.chart = Some(ChartSpec {
                    title: tab.title.clone(),
                    x,
                    y: y.to_string(),
                    data: table.clone(),
                })
            }
            None => tab.notice(Level::Warning, "No numeric columns to plot."),
        }
    }

    let shown = if table.has_column(value_col) {
        table.select(&[date_col, value_col])
    } else {
        let first: Vec<&str> = table.names().iter().take(3).map(String::as_str).collect();
        table.select(&first)
    };
    let shown = latest_rows(
        &shown,
        date_col,
        cfg.dashboard.latest_rows,
        cfg.dashboard.tail_rows,
    );
    tab.table = Some(round_column(&shown, value_col, 2));
}

/// Tab for one spreadsheet file: the first sheet, scale-corrected and
/// windowed, or an inline error/warning.
pub fn build_file_tab(path: &Path, sheets: &SheetSet, cfg: &Config, window: DateWindow) -> TabView {
    let identifier = path.to_string_lossy();
    let info = cfg.registry.lookup(&identifier);
    let mut tab = TabView::new(info.label.clone());

    if let Some(err) = sheets.error() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| identifier.to_string());
        tab.notice(Level::Error, format!("Failed to read {}", name));
        tab.notice(Level::Error, err);
        return tab;
    }

    let Some((_, table)) = sheets.first() else {
        tab.notice(Level::Warning, "Workbook has no readable sheets.");
        return tab;
    };
    if table.is_empty() {
        tab.notice(Level::Warning, "The selected sheet is empty.");
        return tab;
    }

    let table = apply_scale_correction(table, &identifier, &cfg.scale_rule);
    fill_series(&mut tab, &table, price_title(&info.label, &info.unit), cfg, window);
    tab
}

/// Tab for the fetched series; placeholder data is marked in the title.
pub fn build_external_tab(series: &ExternalSeries, cfg: &Config, window: DateWindow) -> TabView {
    let ext = &cfg.external;
    let mut title = ext.label.clone();
    if series.is_placeholder {
        title.push_str(" (placeholder)");
    }
    let mut tab = TabView::new(title);

    if series.is_placeholder {
        let reason = series.error.as_deref().unwrap_or("unknown error");
        tab.notice(
            Level::Warning,
            format!("Could not fetch {} data: {}", ext.label, reason),
        );
        tab.notice(Level::Info, "Showing example data for demonstration.");
    }
    if series.table.is_empty() {
        tab.notice(Level::Warning, format!("No {} data available.", ext.label));
        return tab;
    }

    fill_series(&mut tab, &series.table, price_title(&ext.label, &ext.unit), cfg, window);
    tab
}

/// Draw every tab's chart. A chart that cannot be drawn turns into an error
/// notice on its own tab.
pub fn render_charts(tabs: &mut [TabView], width: u32, height: u32) -> Vec<Option<String>> {
    tabs.iter_mut()
        .map(|tab| {
            let spec = tab.chart.as_ref()?;
            match chart::render_svg(spec, width, height) {
                Ok(svg) => Some(svg),
                Err(e) => {
                    warn!(tab = %tab.title, error = %e, "chart failed");
                    tab.notice(Level::Error, format!("Chart error: {}", e));
                    None
                }
            }
        })
        .collect()
}

/// File-system friendly name for a tab.
pub fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{normalize, NormalizeOptions, RawSheet};

    fn sheets(rows: Vec<Vec<&str>>) -> SheetSet {
        SheetSet::from_sheets(vec![(
            "Plan1".into(),
            normalize(&RawSheet::from(rows), &NormalizeOptions::default()),
        )])
    }

    fn ethanol_sheets() -> SheetSet {
        let dates: Vec<String> = (1..=9).map(|d| format!("0{}/03/2024", d)).collect();
        let mut rows = vec![vec!["Indicador"], vec!["Data", "À vista R$", "À vista US$"]];
        for d in &dates {
            rows.push(vec![d.as_str(), "2.000,00", "400,00"]);
        }
        sheets(rows)
    }

    #[test]
    fn file_tab_applies_rules() {
        let cfg = Config::default();
        let set = ethanol_sheets();
        let tab = build_file_tab(
            Path::new("/data/etanol-diario-bovespa.xls"),
            &set,
            &cfg,
            DateWindow::default(),
        );
        assert_eq!(tab.title, "Etanol (Diário Bovespa)");
        assert!(tab.notices.is_empty());
        let chart = tab.chart.as_ref().unwrap();
        assert_eq!(chart.title, "Etanol (Diário Bovespa) - Preço À Vista (litro)");
        assert_eq!(chart.x, "Data");
        assert_eq!(chart.y, "À vista R$");

        let table = tab.table.as_ref().unwrap();
        assert_eq!(table.names(), &["Data".to_string(), "À vista R$".to_string()]);
        assert_eq!(table.n_rows(), 7);
        assert_eq!(
            table.column("Data").unwrap().as_dates().unwrap()[0],
            NaiveDate::from_ymd_opt(2024, 3, 9)
        );
        assert_eq!(
            table.column("À vista R$").unwrap().as_numbers().unwrap()[0],
            Some(2.0)
        );
        assert_eq!(
            tab.date_span,
            Some((
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
            ))
        );
    }

    #[test]
    fn window_limits_rows() {
        let cfg = Config::default();
        let window = DateWindow {
            from: NaiveDate::from_ymd_opt(2024, 3, 8),
            to: None,
        };
        let tab = build_file_tab(Path::new("milho.xls"), &ethanol_sheets(), &cfg, window);
        assert_eq!(tab.table.unwrap().n_rows(), 2);
        assert_eq!(tab.chart.unwrap().data.n_rows(), 2);
    }

    #[test]
    fn failures_are_inline() {
        let cfg = Config::default();
        let tab = build_file_tab(
            Path::new("/data/milho.xls"),
            &SheetSet::failure("bad header"),
            &cfg,
            DateWindow::default(),
        );
        assert_eq!(tab.title, "Milho");
        assert!(tab.has_errors());
        assert_eq!(tab.notices[1].message, "bad header");
        assert!(tab.chart.is_none());

        let tab = build_file_tab(
            Path::new("x.xls"),
            &SheetSet::from_sheets(vec![]),
            &cfg,
            DateWindow::default(),
        );
        assert_eq!(tab.notices[0].level, Level::Warning);

        let tab = build_file_tab(Path::new("x.xls"), &sheets(vec![]), &cfg, DateWindow::default());
        assert_eq!(tab.notices[0].message, "The selected sheet is empty.");
    }

    #[test]
    fn falls_back_to_first_numeric_column() {
        let cfg = Config::default();
        let set = sheets(vec![
            vec!["Data", "Obs", "Preço", "Extra"],
            vec!["01/03/2024", "a", "10,5", "1"],
            vec!["02/03/2024", "b", "11,5", "2"],
        ]);
        let tab = build_file_tab(Path::new("dolar.xls"), &set, &cfg, DateWindow::default());
        assert_eq!(tab.notices.len(), 1);
        assert_eq!(tab.chart.as_ref().unwrap().y, "Preço");
        assert_eq!(
            tab.table.as_ref().unwrap().names(),
            &["Data".to_string(), "Obs".to_string(), "Preço".to_string()]
        );

        let set = sheets(vec![vec!["Data", "Obs"], vec!["01/03/2024", "a"]]);
        let tab = build_file_tab(Path::new("dolar.xls"), &set, &cfg, DateWindow::default());
        assert_eq!(tab.notices.len(), 2);
        assert!(tab.chart.is_none());
        assert!(tab.table.is_some());
    }

    #[test]
    fn placeholder_series_is_flagged() {
        let cfg = Config::default();
        let series = ExternalSeries {
            table: crate::fetch::placeholder_table(
                NaiveDate::from_ymd_opt(2024, 3, 30).unwrap(),
                30,
                "Data",
                "À vista R$",
            ),
            is_placeholder: true,
            error: Some("timeout".into()),
        };
        let tab = build_external_tab(&series, &cfg, DateWindow::default());
        assert_eq!(tab.title, "Soja (Chicago) (placeholder)");
        assert!(tab.notices[0].message.contains("timeout"));
        assert_eq!(
            tab.chart.as_ref().unwrap().title,
            "Soja (Chicago) - Preço À Vista (tonelada)"
        );
        assert_eq!(tab.table.as_ref().unwrap().n_rows(), 7);
    }

    #[test]
    fn slugs() {
        assert_eq!(slug("Açúcar (Santos)"), "açúcar-santos");
        assert_eq!(slug("  Soja -- Chicago "), "soja-chicago");
    }
}
