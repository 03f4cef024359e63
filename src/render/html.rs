// src/render/html.rs
//
// Static dashboard page: one section per tab with its notices, chart and
// latest values.

use super::{slug, Level, TabView};
use crate::sheet::NormalizedTable;
use anyhow::{Context, Result};
use std::{
    fmt::Write,
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
nav a{margin-right:1em}section{margin-top:2.5em}\
table{border-collapse:collapse}td,th{border:1px solid #ccc;padding:.25em .6em;text-align:right}\
.notice{padding:.4em .8em;margin:.4em 0;border-radius:4px}\
.info{background:#e7f1fb}.warning{background:#fff4d6}.error{background:#fde2e1}";

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn table_html(table: &NormalizedTable) -> String {
    let mut out = String::from("<table>\n<tr>");
    for name in table.names() {
        let _ = write!(out, "<th>{}</th>", escape(name));
    }
    out.push_str("</tr>\n");
    for row in 0..table.n_rows() {
        out.push_str("<tr>");
        for col in table.columns() {
            let _ = write!(out, "<td>{}</td>", escape(&col.display(row)));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
    out
}

/// Anchor and file stem of the `i`-th tab; unique even when titles repeat.
fn tab_id(i: usize, tab: &TabView) -> String {
    format!("{:02}-{}", i + 1, slug(&tab.title))
}

/// The whole page. `charts[i]` is the SVG of `tabs[i]`, if it has one.
pub fn render_page(tabs: &[TabView], charts: &[Option<String>], generated: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Commodity prices</title>\n<style>{}</style>\n</head>\n<body>",
        STYLE
    );
    let _ = writeln!(out, "<h1>Commodity prices</h1>\n<p>Updated {}</p>", escape(generated));

    out.push_str("<nav>");
    for (i, tab) in tabs.iter().enumerate() {
        let _ = write!(out, "<a href=\"#{}\">{}</a>", tab_id(i, tab), escape(&tab.title));
    }
    out.push_str("</nav>\n");

    for (i, tab) in tabs.iter().enumerate() {
        let _ = writeln!(
            out,
            "<section id=\"{}\">\n<h2>{}</h2>",
            tab_id(i, tab),
            escape(&tab.title)
        );
        for n in &tab.notices {
            let class = match n.level {
                Level::Info => "info",
                Level::Warning => "warning",
                Level::Error => "error",
            };
            let _ = writeln!(out, "<div class=\"notice {}\">{}</div>", class, escape(&n.message));
        }
        if let Some((from, to)) = tab.date_span {
            let _ = writeln!(
                out,
                "<p>Data from {} to {}</p>",
                from.format("%d/%m/%Y"),
                to.format("%d/%m/%Y")
            );
        }
        if let Some(Some(svg)) = charts.get(i) {
            out.push_str(svg);
            out.push('\n');
        }
        if let Some(table) = &tab.table {
            out.push_str("<h3>Latest values</h3>\n");
            out.push_str(&table_html(table));
        }
        out.push_str("</section>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}

/// Write `index.html`, one SVG per charted tab and `tabs.json` into
/// `out_dir`. Returns the page path.
pub fn write_dashboard(
    out_dir: &Path,
    tabs: &[TabView],
    charts: &[Option<String>],
    generated: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output dir {}", out_dir.display()))?;

    for (i, (tab, chart)) in tabs.iter().zip(charts).enumerate() {
        if let Some(svg) = chart {
            let path = out_dir.join(format!("{}.svg", tab_id(i, tab)));
            fs::write(&path, svg).with_context(|| format!("writing {}", path.display()))?;
        }
    }

    let json = serde_json::to_string_pretty(tabs).context("serializing tabs")?;
    let json_path = out_dir.join("tabs.json");
    fs::write(&json_path, json).with_context(|| format!("writing {}", json_path.display()))?;

    let page = out_dir.join("index.html");
    fs::write(&page, render_page(tabs, charts, generated))
        .with_context(|| format!("writing {}", page.display()))?;

    info!(path = %page.display(), tabs = tabs.len(), "dashboard written");
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<b>\"R&D\"</b>"), "&lt;b&gt;&quot;R&amp;D&quot;&lt;/b&gt;");
    }

    #[test]
    fn writes_page_svgs_and_json() -> Result<()> {
        let dir = tempdir()?;
        let mut ok = TabView::new("Café Arábica");
        ok.notice(Level::Warning, "Column <x> not found");
        let failed = TabView::new("Milho");
        let charts = vec![Some("<svg id=\"c\"></svg>".to_string()), None];

        let page = write_dashboard(dir.path(), &[ok, failed], &charts, "05/03/2024 10:00")?;
        let html = fs::read_to_string(&page)?;
        assert!(html.contains("<section id=\"01-café-arábica\">"));
        assert!(html.contains("<a href=\"#02-milho\">Milho</a>"));
        assert!(html.contains("Column &lt;x&gt; not found"));
        assert!(html.contains("<svg id=\"c\"></svg>"));
        assert!(dir.path().join("01-café-arábica.svg").is_file());
        assert!(!dir.path().join("02-milho.svg").exists());

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("tabs.json"))?)?;
        assert_eq!(json[0]["notices"][0]["level"], "warning");
        assert_eq!(json[1]["title"], "Milho");
        Ok(())
    }

    #[test]
    fn repeated_titles_get_distinct_anchors() {
        let tabs = vec![TabView::new("Milho"), TabView::new("Milho")];
        let html = render_page(&tabs, &[None, None], "now");
        assert!(html.contains("<section id=\"01-milho\">"));
        assert!(html.contains("<section id=\"02-milho\">"));
        assert!(html.contains("href=\"#01-milho\""));
        assert!(html.contains("href=\"#02-milho\""));
    }
}
