//! Load and validate runtime configuration.

use anyhow::Context;
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkbookCfg {
    pub dir: PathBuf,
    pub transactions: String, // sheet name, Date,Type,Symbol,Amount,Shares
    pub indexes: String,      // sheet name, Name,Symbol
    pub evolution: String,    // output sheet name
    pub prices_dir: String,   // per-symbol price sheets, relative to `dir`
}

impl Default for WorkbookCfg {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("portfolio"),
            transactions: "Transactions".to_string(),
            indexes: "Indexes".to_string(),
            evolution: "Evolutions".to_string(),
            prices_dir: "prices".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatesCfg {
    /// chrono formats tried in order for every date cell.
    pub formats: Vec<String>,
}

impl Default for DatesCfg {
    fn default() -> Self {
        Self {
            formats: vec!["%Y-%m-%d".to_string(), "%d/%m/%Y".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EvolutionCfg {
    /// Fixed last day of the projection. Local today when absent.
    pub until: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub workbook: WorkbookCfg,
    pub dates: DatesCfg,
    pub evolution: EvolutionCfg,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_yaml(&s).with_context(|| format!("parse {}", path.display()))
    }

    pub fn from_yaml(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `PORTFOLIO_CONFIG`, then `./config.yaml`, then the platform config dir.
    /// Defaults apply when none exists.
    pub fn discover() -> anyhow::Result<Self> {
        if let Ok(p) = std::env::var("PORTFOLIO_CONFIG") {
            return Self::load(p);
        }
        let candidates = std::iter::once(PathBuf::from("config.yaml")).chain(
            ProjectDirs::from("", "", "portfolio-evolution")
                .map(|dirs| dirs.config_dir().join("config.yaml")),
        );
        for p in candidates {
            if p.exists() {
                return Self::load(p);
            }
        }
        Ok(Self::default())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.dates.formats.is_empty() {
            anyhow::bail!("dates.formats must list at least one format");
        }
        for name in [
            &self.workbook.transactions,
            &self.workbook.indexes,
            &self.workbook.evolution,
        ] {
            if name.trim().is_empty() {
                anyhow::bail!("workbook sheet names must not be empty");
            }
        }
        Ok(())
    }
}
