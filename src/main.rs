use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use pricedash::{
    cache::{external_cache, SheetCache, SHEET_CACHE_CAPACITY},
    config::Config,
    discover::list_spreadsheets,
    fetch::{self, ExternalSeries},
    read::{NoRepair, OfficeRepairer, ReaderChain, Repairer, SheetSet},
    render::{self, html, terminal, DateWindow},
};
use moka::sync::Cache;
use reqwest::Client;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Commodity price dashboard built from spreadsheet exports.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// YAML configuration file (default: ./pricedash.yaml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory with the spreadsheet exports.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Output directory for index.html and the charts.
    #[arg(long)]
    out: Option<PathBuf>,
    /// First day shown (dd/mm/yyyy or yyyy-mm-dd).
    #[arg(long, value_parser = parse_day)]
    from: Option<NaiveDate>,
    /// Last day shown (dd/mm/yyyy or yyyy-mm-dd).
    #[arg(long, value_parser = parse_day)]
    to: Option<NaiveDate>,
    /// Skip the external futures series.
    #[arg(long)]
    no_external: bool,
    /// Rebuild every SECS seconds until Ctrl-C.
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| format!("`{}` is not a dd/mm/yyyy or yyyy-mm-dd date", s))
}

/// State kept between refreshes.
struct Dashboard {
    cfg: Config,
    chain: Arc<ReaderChain>,
    client: Client,
    sheets: SheetCache,
    external: Cache<(), Arc<ExternalSeries>>,
}

impl Dashboard {
    fn new(cfg: Config) -> Result<Self> {
        let repairer: Box<dyn Repairer> = if cfg.repair.enabled {
            Box::new(OfficeRepairer::new(cfg.repair.program.clone()))
        } else {
            Box::new(NoRepair)
        };
        let chain = ReaderChain::standard(
            cfg.normalize.clone(),
            repairer,
            cfg.repair.output_dir.clone(),
        );
        info!(strategies = ?chain.strategy_names(), "reader chain ready");

        Ok(Self {
            client: fetch::http_client(&cfg.external)?,
            sheets: SheetCache::new(SHEET_CACHE_CAPACITY),
            external: external_cache(cfg.external.cache_ttl()),
            chain: Arc::new(chain),
            cfg,
        })
    }

    async fn sheet_set(&self, path: PathBuf) -> Result<Arc<SheetSet>> {
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        if let Some(set) = self.sheets.get(&path, modified) {
            return Ok(set);
        }

        let chain = Arc::clone(&self.chain);
        let target = path.clone();
        let set = tokio::task::spawn_blocking(move || chain.read_all_sheets(&target))
            .await
            .context("read task failed")?;
        let set = Arc::new(set);
        self.sheets.insert(path, modified, Arc::clone(&set));
        Ok(set)
    }

    async fn external_series(&self) -> Arc<ExternalSeries> {
        if let Some(series) = self.external.get(&()) {
            return series;
        }
        let series = fetch::fetch_external_series(
            &self.client,
            &self.cfg.external,
            &self.cfg.normalize.date_column,
            &self.cfg.dashboard.value_column,
            Local::now().date_naive(),
        )
        .await;
        let series = Arc::new(series);
        self.external.insert((), Arc::clone(&series));
        series
    }

    /// One full rebuild of the page.
    async fn refresh(&self, window: DateWindow, external: bool) -> Result<PathBuf> {
        let start = Instant::now();
        let files = list_spreadsheets(&self.cfg.data_dir, self.cfg.recursive, &self.cfg.extension)?;
        if files.is_empty() {
            warn!(dir = %self.cfg.data_dir.display(), ext = %self.cfg.extension, "no spreadsheets found");
        }

        self.sheets.retain_paths(&files);

        let mut tabs = Vec::with_capacity(files.len() + 1);
        for path in files {
            let set = self.sheet_set(path.clone()).await?;
            tabs.push(render::build_file_tab(&path, &set, &self.cfg, window));
        }
        if external {
            let series = self.external_series().await;
            tabs.push(render::build_external_tab(&series, &self.cfg, window));
        }

        let charts = render::render_charts(
            &mut tabs,
            self.cfg.dashboard.chart_width,
            self.cfg.dashboard.chart_height,
        );
        for tab in &tabs {
            println!("{}", terminal::format_tab(tab));
        }

        let generated = Local::now().format("%d/%m/%Y %H:%M").to_string();
        let page = html::write_dashboard(&self.cfg.output_dir, &tabs, &charts, &generated)?;
        info!(
            tabs = tabs.len(),
            failed = tabs.iter().filter(|t| t.has_errors()).count(),
            elapsed = ?start.elapsed(),
            "refresh done"
        );
        Ok(page)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) configuration ────────────────────────────────────────────
    let args = Args::parse();
    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        cfg.data_dir = dir;
    }
    if let Some(out) = args.out {
        cfg.output_dir = out;
    }
    let external = cfg.external.enabled && !args.no_external;
    let window = DateWindow {
        from: args.from,
        to: args.to,
    };
    info!(data_dir = %cfg.data_dir.display(), out = %cfg.output_dir.display(), external, "startup");

    let dashboard = Dashboard::new(cfg)?;

    // ─── 3) build once, or keep rebuilding ───────────────────────────
    let Some(secs) = args.watch else {
        let page = dashboard.refresh(window, external).await?;
        info!(page = %page.display(), "all done");
        return Ok(());
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = dashboard.refresh(window, external).await {
                    error!("refresh failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; exit");
                break;
            }
        }
    }
    Ok(())
}
