// src/config.rs
use crate::sheet::NormalizeOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::info;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pricedash.yaml";
/// Overrides `data_dir` when set.
pub const DATA_DIR_ENV: &str = "XLS_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for spreadsheet exports.
    pub data_dir: PathBuf,
    pub recursive: bool,
    /// Extension of the exports, without the dot.
    pub extension: String,
    /// Where the HTML page and SVG charts are written.
    pub output_dir: PathBuf,
    pub normalize: NormalizeOptions,
    pub registry: Registry,
    pub scale_rule: ScaleRule,
    pub dashboard: DashboardConfig,
    pub repair: RepairConfig,
    pub external: ExternalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            recursive: false,
            extension: "xls".into(),
            output_dir: PathBuf::from("./dashboard"),
            normalize: NormalizeOptions::default(),
            registry: Registry::default(),
            scale_rule: ScaleRule::default(),
            dashboard: DashboardConfig::default(),
            repair: RepairConfig::default(),
            external: ExternalConfig::default(),
        }
    }
}

impl Config {
    /// Parse a YAML document; missing keys take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing configuration YAML")
    }

    /// Load `path`, or `pricedash.yaml` when present, or the defaults. The
    /// `XLS_DIR` environment variable then overrides `data_dir`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let source = match path {
            Some(p) => Some(p),
            None if default_path.is_file() => Some(default_path),
            None => None,
        };

        let mut cfg = match source {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                info!(path = %p.display(), "loaded configuration");
                Self::from_yaml(&text).with_context(|| format!("in {}", p.display()))?
            }
            None => Self::default(),
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                cfg.data_dir = PathBuf::from(dir);
            }
        }
        Ok(cfg)
    }
}

/// Label and unit shown for one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesInfo {
    pub label: String,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Substring looked for in the lower-cased file name.
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub unit: String,
}

impl RegistryEntry {
    fn new(key: &str, label: &str, unit: &str) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            unit: unit.into(),
        }
    }
}

/// Ordered key → label/unit table. Order matters: `soja-paranagua` has to
/// be tried before `soja-parana`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Match by file name of `identifier`; unknown names map to themselves
    /// with an empty unit.
    pub fn lookup(&self, identifier: &str) -> SeriesInfo {
        let name = file_name(identifier);
        let folded = name.to_lowercase();
        self.entries
            .iter()
            .find(|e| folded.contains(&e.key.to_lowercase()))
            .map(|e| SeriesInfo {
                label: e.label.clone(),
                unit: e.unit.clone(),
            })
            .unwrap_or_else(|| SeriesInfo {
                label: name.to_string(),
                unit: String::new(),
            })
    }
}

fn file_name(identifier: &str) -> &str {
    Path::new(identifier)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(identifier)
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(vec![
            RegistryEntry::new("açucar-cristal", "Açúcar Branco (Mercado Externo)", "saca de 50kg"),
            RegistryEntry::new("açucar-santos", "Açúcar (Santos)", "saca de 50kg"),
            RegistryEntry::new("açucar-vhp", "Açúcar VHP (Mercado Externo)", "tonelada"),
            RegistryEntry::new("café-arabica", "Café Arábica", "saca de 60kg"),
            RegistryEntry::new("dolar", "Dólar", ""),
            RegistryEntry::new("milho", "Milho", "saca de 60kg"),
            RegistryEntry::new("robusta", "Café Robusta", "saca de 60kg"),
            RegistryEntry::new("soja-paranagua", "Soja (Paranaguá)", "saca de 60kg"),
            RegistryEntry::new("etanol-diario-bovespa", "Etanol (Diário Bovespa)", "litro"),
            RegistryEntry::new("soja-parana", "Soja (Paraná)", "saca de 60kg"),
            RegistryEntry::new("soja-chicago", "Soja (Chicago)", "tonelada"),
        ])
    }
}

/// Export-scale correction applied to one family of series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleRule {
    /// Case-insensitive substring of the series identifier.
    pub marker: String,
    pub column: String,
    pub divisor: f64,
}

impl Default for ScaleRule {
    fn default() -> Self {
        Self {
            marker: "etanol".into(),
            column: "À vista R$".into(),
            divisor: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Price column charted and tabulated.
    pub value_column: String,
    /// Rows shown when the table can be ordered by date (newest first).
    pub latest_rows: usize,
    /// Rows shown from the end of an undated table.
    pub tail_rows: usize,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            value_column: "À vista R$".into(),
            latest_rows: 7,
            tail_rows: 6,
            chart_width: 900,
            chart_height: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub enabled: bool,
    /// Office binary run headless for conversions.
    pub program: PathBuf,
    /// Where repaired copies go; next to the source when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: PathBuf::from("soffice"),
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub enabled: bool,
    pub label: String,
    pub unit: String,
    pub ticker: String,
    pub base_url: String,
    /// Chart ranges tried in order.
    pub ranges: Vec<String>,
    /// BRL per USD.
    pub fx_rate: f64,
    pub bushels_per_tonne: f64,
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
    pub placeholder_days: u32,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            label: "Soja (Chicago)".into(),
            unit: "tonelada".into(),
            ticker: "ZS=F".into(),
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart/".into(),
            ranges: vec!["6mo".into(), "3mo".into()],
            fx_rate: 5.0,
            bushels_per_tonne: 36.74,
            cache_ttl_secs: 7200,
            timeout_secs: 20,
            placeholder_days: 30,
        }
    }
}

impl ExternalConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
