// src/fetch/chart.rs
//
// Daily closes from a Yahoo-style `v8/finance/chart` endpoint.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<Meta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Meta {
    /// Exchange offset from UTC, seconds.
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Chart URL for `ticker` over `range` with daily bars.
pub fn chart_url(base_url: &str, ticker: &str, range: &str) -> Result<Url> {
    let base = Url::parse(base_url).with_context(|| format!("parsing base URL {}", base_url))?;
    let mut url = base
        .join(ticker)
        .with_context(|| format!("joining ticker {} onto {}", ticker, base))?;
    url.query_pairs_mut()
        .append_pair("range", range)
        .append_pair("interval", "1d");
    Ok(url)
}

/// Extract `(exchange-local date, close)` pairs, skipping null closes.
/// An error payload or an empty series is an error.
pub fn parse_chart(body: &str) -> Result<Vec<(NaiveDate, f64)>> {
    let resp: ChartResponse = serde_json::from_str(body).context("decoding chart JSON")?;
    if let Some(err) = resp.chart.error {
        bail!("chart API error {}: {}", err.code, err.description);
    }
    let result = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| anyhow!("chart API returned no result"))?;

    let offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let points: Vec<(NaiveDate, f64)> = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let close = close.filter(|c| c.is_finite())?;
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some((date, close))
        })
        .collect();

    if points.is_empty() {
        bail!("chart API returned an empty series");
    }
    Ok(points)
}

/// One GET of the chart endpoint.
pub async fn fetch_closes(client: &Client, url: &Url) -> Result<Vec<(NaiveDate, f64)>> {
    debug!(%url, "requesting chart");
    let body = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .text()
        .await
        .with_context(|| format!("Reading text from {}", url))?;
    parse_chart(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"chart":{"result":[{"meta":{"currency":"USX","symbol":"ZS=F","gmtoffset":-18000},
        "timestamp":[1709622000,1709708400,1709794800],
        "indicators":{"quote":[{"open":[1150.0,1152.0,1149.0],"close":[1151.25,null,1160.5]}]}}],"error":null}}"#;

    #[test]
    fn parses_closes_and_skips_nulls() -> Result<()> {
        let points = parse_chart(SAMPLE)?;
        assert_eq!(
            points,
            vec![
                (NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), 1151.25),
                (NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(), 1160.5),
            ]
        );
        Ok(())
    }

    #[test]
    fn api_errors_surface() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart(body).unwrap_err();
        assert!(err.to_string().contains("delisted"));

        let empty = r#"{"chart":{"result":[{"timestamp":[],"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse_chart(empty).is_err());
        assert!(parse_chart("<html>rate limited</html>").is_err());
    }

    #[test]
    fn builds_query() -> Result<()> {
        let url = chart_url("https://query1.finance.yahoo.com/v8/finance/chart/", "ZS=F", "6mo")?;
        assert_eq!(
            url.as_str(),
            "https://query1.finance.yahoo.com/v8/finance/chart/ZS=F?range=6mo&interval=1d"
        );
        Ok(())
    }
}
