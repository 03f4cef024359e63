// src/fetch/mod.rs
pub mod chart;

use crate::config::ExternalConfig;
use crate::sheet::{Column, NormalizedTable};
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate};
use reqwest::Client;
use tracing::{info, warn};

/// The external series and whether it is synthetic stand-in data.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalSeries {
    pub table: NormalizedTable,
    pub is_placeholder: bool,
    /// Why the placeholder was used.
    pub error: Option<String>,
}

/// HTTP client for the chart API.
pub fn http_client(cfg: &ExternalConfig) -> Result<Client> {
    Client::builder()
        .timeout(cfg.timeout())
        .user_agent(concat!("Mozilla/5.0 (compatible; pricedash/", env!("CARGO_PKG_VERSION"), ")"))
        .build()
        .context("building HTTP client")
}

/// Cents of USD per bushel → BRL per tonne.
pub fn cents_per_bushel_to_brl_per_tonne(close: f64, cfg: &ExternalConfig) -> f64 {
    close * cfg.bushels_per_tonne * cfg.fx_rate / 100.0
}

/// Converted closes as a two-column table sorted by date.
pub fn series_table(
    mut points: Vec<(NaiveDate, f64)>,
    cfg: &ExternalConfig,
    date_column: &str,
    value_column: &str,
) -> NormalizedTable {
    points.sort_by_key(|(d, _)| *d);
    let dates = points.iter().map(|(d, _)| Some(*d)).collect();
    let values = points
        .iter()
        .map(|(_, c)| Some(cents_per_bushel_to_brl_per_tonne(*c, cfg)))
        .collect();
    NormalizedTable::from_parts_unchecked(
        vec![date_column.to_string(), value_column.to_string()],
        vec![Column::Date(dates), Column::Number(values)],
        points.len(),
    )
}

/// `days` daily points ending at `end`: a gentle upward ramp from 1800 with
/// a bounded deterministic wiggle.
pub fn placeholder_table(
    end: NaiveDate,
    days: u32,
    date_column: &str,
    value_column: &str,
) -> NormalizedTable {
    let n = days as i64;
    let dates: Vec<Option<NaiveDate>> = (0..n)
        .map(|i| end.checked_sub_signed(Duration::days(n - 1 - i)))
        .collect();
    let values = (0..n)
        .map(|i| Some(1800.0 + 5.0 * i as f64 + 50.0 * (i as f64 * 1.7).sin()))
        .collect();
    NormalizedTable::from_parts_unchecked(
        vec![date_column.to_string(), value_column.to_string()],
        vec![Column::Date(dates), Column::Number(values)],
        days as usize,
    )
}

/// Try each configured range in order.
async fn fetch_points(client: &Client, cfg: &ExternalConfig) -> Result<Vec<(NaiveDate, f64)>> {
    let mut last_err = anyhow!("no chart ranges configured");
    for range in &cfg.ranges {
        let url = chart::chart_url(&cfg.base_url, &cfg.ticker, range)?;
        match chart::fetch_closes(client, &url).await {
            Ok(points) => {
                info!(ticker = %cfg.ticker, range = %range, points = points.len(), "fetched external series");
                return Ok(points);
            }
            Err(e) => {
                let msg = format!("{:#}", e);
                warn!(ticker = %cfg.ticker, range = %range, error = %msg, "chart request failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Fetch and convert the configured ticker. Never fails: on any error the
/// placeholder series is returned, flagged.
pub async fn fetch_external_series(
    client: &Client,
    cfg: &ExternalConfig,
    date_column: &str,
    value_column: &str,
    today: NaiveDate,
) -> ExternalSeries {
    match fetch_points(client, cfg).await {
        Ok(points) => ExternalSeries {
            table: series_table(points, cfg, date_column, value_column),
            is_placeholder: false,
            error: None,
        },
        Err(e) => {
            let msg = format!("{:#}", e);
            warn!(ticker = %cfg.ticker, error = %msg, "using placeholder data for external series");
            ExternalSeries {
                table: placeholder_table(today, cfg.placeholder_days, date_column, value_column),
                is_placeholder: true,
                error: Some(msg),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn converts_and_sorts() {
        let cfg = ExternalConfig::default();
        let t = series_table(
            vec![(day(2024, 3, 6), 1200.0), (day(2024, 3, 5), 1000.0)],
            &cfg,
            "Data",
            "À vista R$",
        );
        assert_eq!(
            t.column("Data").unwrap().as_dates().unwrap(),
            &[Some(day(2024, 3, 5)), Some(day(2024, 3, 6))]
        );
        let v = t.column("À vista R$").unwrap().as_numbers().unwrap();
        assert!((v[0].unwrap() - 1837.0).abs() < 1e-9);
        assert!((v[1].unwrap() - 2204.4).abs() < 1e-9);
    }

    #[test]
    fn placeholder_covers_the_last_days() {
        let t = placeholder_table(day(2024, 3, 30), 30, "Data", "v");
        assert_eq!(t.n_rows(), 30);
        let dates = t.column("Data").unwrap().as_dates().unwrap();
        assert_eq!(dates[0], Some(day(2024, 3, 1)));
        assert_eq!(dates[29], Some(day(2024, 3, 30)));
        for (i, v) in t.column("v").unwrap().as_numbers().unwrap().iter().enumerate() {
            let base = 1800.0 + 5.0 * i as f64;
            assert!((v.unwrap() - base).abs() <= 50.0);
        }
    }

    #[tokio::test]
    async fn unreachable_api_falls_back_to_placeholder() -> Result<()> {
        let cfg = ExternalConfig {
            base_url: "http://127.0.0.1:9/chart/".into(),
            timeout_secs: 2,
            placeholder_days: 5,
            ..ExternalConfig::default()
        };
        let client = http_client(&cfg)?;
        let series = fetch_external_series(&client, &cfg, "Data", "v", day(2024, 1, 10)).await;
        assert!(series.is_placeholder);
        assert!(series.error.is_some());
        assert_eq!(series.table.n_rows(), 5);
        Ok(())
    }
}
