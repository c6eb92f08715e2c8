//! Local inputs: the budget file and the per-store daily POS cache.

use crate::error::Result;
use crate::stores::StoreCode;
use chrono::{Duration, NaiveDate};
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Budget key holding the consolidated figures.
pub const ALL_STORES_KEY: &str = "ALL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetFigures {
    #[serde(default)]
    pub sales: f64,
    #[serde(default)]
    pub cogs: f64,
    /// Percent of sales, e.g. `28.5`.
    #[serde(default)]
    pub cogs_pct: f64,
    #[serde(default)]
    pub payroll_pct: f64,
}

/// Period budgets keyed by store code (or [`ALL_STORES_KEY`]) then period number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Budget {
    entries: BTreeMap<String, BTreeMap<u32, BudgetFigures>>,
}

impl Budget {
    /// Parses `{"8001": {"name": "State", "1": {...}, ...}, "ALL": {...}}`.
    ///
    /// Keys that are not period numbers 1-12 (such as `name`) are ignored.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, BTreeMap<String, Value>> = serde_json::from_str(json)?;
        let mut entries = BTreeMap::new();

        for (store, fields) in raw {
            let mut periods = BTreeMap::new();
            for (key, value) in fields {
                let Ok(period) = key.parse::<u32>() else {
                    continue;
                };
                if !(1..=12).contains(&period) {
                    continue;
                }
                let figures: BudgetFigures = serde_json::from_value(value)?;
                periods.insert(period, figures);
            }
            entries.insert(store.trim().to_string(), periods);
        }

        Ok(Self { entries })
    }

    /// Loads the budget file. A missing file is not an error; the report
    /// simply carries no budget comparison.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Budget file {} not found; continuing without budget comparison",
                path.display()
            );
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)?;
        let budget = Self::from_json_str(&raw)?;
        info!("Loaded budget for {} entries", budget.entries.len());
        Ok(Some(budget))
    }

    pub fn for_store(&self, store: &StoreCode, period: u32) -> Option<&BudgetFigures> {
        self.entries.get(store.as_str()).and_then(|p| p.get(&period))
    }

    pub fn all_stores(&self, period: u32) -> Option<&BudgetFigures> {
        self.entries.get(ALL_STORES_KEY).and_then(|p| p.get(&period))
    }
}

/// One store's POS figures for one business day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DailyFigures {
    pub net_sales: f64,
    #[serde(default)]
    pub labor_hours: f64,
    #[serde(default)]
    pub labor_cost: f64,
}

impl DailyFigures {
    pub fn add(&mut self, other: &DailyFigures) {
        self.net_sales += other.net_sales;
        self.labor_hours += other.labor_hours;
        self.labor_cost += other.labor_cost;
    }
}

/// Daily figures for one store, by business date.
pub type DailySeries = BTreeMap<NaiveDate, DailyFigures>;

/// Sums the days of `series` within `[start, end]`.
pub fn window_totals(series: &DailySeries, start: NaiveDate, end: NaiveDate) -> DailyFigures {
    let mut totals = DailyFigures::default();
    for figures in series.range(start..=end).map(|(_, f)| f) {
        totals.add(figures);
    }
    totals
}

/// JSON file per (cache key, store) memoizing completed days.
///
/// Never authoritative: a cold or corrupt cache only costs refetches.
#[derive(Debug, Clone)]
pub struct SalesCache {
    dir: PathBuf,
}

impl SalesCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, cache_key: &str, store: &StoreCode) -> PathBuf {
        self.dir.join(format!("{}_pos_{}.json", cache_key, store))
    }

    /// A cached day is final only once it is older than yesterday.
    pub fn is_reusable(date: NaiveDate, as_of: NaiveDate) -> bool {
        date < as_of - Duration::days(1)
    }

    pub fn load(&self, cache_key: &str, store: &StoreCode) -> Result<DailySeries> {
        let path = self.path(cache_key, store);
        if !path.exists() {
            return Ok(DailySeries::new());
        }

        let raw = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&raw) {
            Ok(series) => Ok(series),
            Err(e) => {
                warn!("Ignoring unreadable cache {}: {}", path.display(), e);
                Ok(DailySeries::new())
            }
        }
    }

    pub fn save(&self, cache_key: &str, store: &StoreCode, series: &DailySeries) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(cache_key, store);
        std::fs::write(&path, serde_json::to_string_pretty(series)?)?;
        debug!("Wrote {} cached days to {}", series.len(), path.display());
        Ok(())
    }

    /// Days in `[start, end]` that must be fetched, oldest first, and the
    /// cached days that can be reused as-is.
    pub fn plan(
        cached: &DailySeries,
        start: NaiveDate,
        end: NaiveDate,
        as_of: NaiveDate,
    ) -> (Vec<NaiveDate>, DailySeries) {
        let mut to_fetch = Vec::new();
        let mut reused = DailySeries::new();

        let mut day = start;
        while day <= end {
            match cached.get(&day) {
                Some(figures) if Self::is_reusable(day, as_of) => {
                    reused.insert(day, *figures);
                }
                _ => to_fetch.push(day),
            }
            day += Duration::days(1);
        }

        (to_fetch, reused)
    }
}
