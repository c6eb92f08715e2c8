use crate::chart_of_accounts::{default_gl_categories, GlCategoryRule};
use crate::error::{CogsError, Result};
use crate::fiscal::BUSINESS_WEEK_START;
use crate::stores::StoreConfig;
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const MAX_LOOKBACK_DAYS: u32 = 7;

/// Run configuration, built once and passed by reference to every stage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReportConfig {
    pub organization_name: String,

    /// Fiscal year to the date its first period starts (always a Wednesday).
    pub fiscal_year_starts: BTreeMap<i32, NaiveDate>,

    pub stores: Vec<StoreConfig>,

    #[serde(default = "default_cogs_prefix")]
    pub cogs_account_prefix: String,

    #[serde(default = "default_gl_categories")]
    pub gl_categories: Vec<GlCategoryRule>,

    #[serde(default)]
    pub coverage: CoverageConfig,

    /// Fold Journal Entry COGS postings into net purchases.
    #[serde(default)]
    pub include_journal_entries: bool,

    /// Fold Item Transfer COGS postings into net purchases.
    #[serde(default)]
    pub include_item_transfers: bool,

    /// Days before a window start searched for the prior closing count.
    #[serde(default = "default_lookback_days")]
    pub stock_count_lookback_days: u32,

    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_max_concurrent_stores")]
    pub max_concurrent_stores: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageConfig {
    /// Multiplier from invoiced net purchases to estimated true COGS.
    pub factor: f64,

    /// Closed period the factor was derived from, e.g. "P1 2026".
    #[serde(default)]
    pub calibrated_from: Option<String>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            factor: 1.0,
            calibrated_from: None,
        }
    }
}

fn default_cogs_prefix() -> String {
    "5".to_string()
}

fn default_lookback_days() -> u32 {
    3
}

fn default_top_n() -> usize {
    10
}

fn default_max_concurrent_stores() -> usize {
    1
}

impl ReportConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        validate_coverage_factor(self.coverage.factor)?;

        if self.fiscal_year_starts.is_empty() {
            return Err(CogsError::InvalidConfig(
                "at least one fiscal year start is required".to_string(),
            ));
        }

        for (year, start) in &self.fiscal_year_starts {
            if start.weekday() != BUSINESS_WEEK_START {
                return Err(CogsError::InvalidConfig(format!(
                    "fiscal year {} starts on {} ({:?}); business weeks start on {:?}",
                    year,
                    start,
                    start.weekday(),
                    BUSINESS_WEEK_START
                )));
            }
        }

        if self.stores.is_empty() {
            return Err(CogsError::InvalidConfig(
                "store registry is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for store in &self.stores {
            let code = store.code.trim();
            if code.is_empty() {
                return Err(CogsError::InvalidConfig(format!(
                    "store '{}' has an empty code",
                    store.name
                )));
            }
            if !seen.insert(code) {
                return Err(CogsError::InvalidConfig(format!(
                    "duplicate store code '{}'",
                    code
                )));
            }
        }

        if self.cogs_account_prefix.trim().is_empty() {
            return Err(CogsError::InvalidConfig(
                "cogs_account_prefix must not be empty".to_string(),
            ));
        }

        if self.gl_categories.iter().any(|r| r.prefix.trim().is_empty()) {
            return Err(CogsError::InvalidConfig(
                "GL category prefixes must not be empty".to_string(),
            ));
        }

        if self.stock_count_lookback_days > MAX_LOOKBACK_DAYS {
            return Err(CogsError::InvalidConfig(format!(
                "stock_count_lookback_days {} exceeds {}",
                self.stock_count_lookback_days, MAX_LOOKBACK_DAYS
            )));
        }

        if self.max_concurrent_stores == 0 {
            return Err(CogsError::InvalidConfig(
                "max_concurrent_stores must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn coverage_factor(&self) -> f64 {
        self.coverage.factor
    }
}

pub fn validate_coverage_factor(factor: f64) -> Result<()> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(CogsError::InvalidCoverageFactor(factor));
    }
    Ok(())
}
