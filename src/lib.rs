//! # COGS Dashboard Builder
//!
//! Reconciles purchase invoices, credit memos, waste logs and stock counts
//! from a restaurant accounting system into weekly and per-period cost of
//! goods sold for every store in a group, on a 4-4-5 fiscal calendar.
//!
//! ## Core Concepts
//!
//! - **Fiscal calendar**: 12 periods of 4, 4 or 5 Wednesday-to-Tuesday business weeks
//! - **Classification**: each transaction detail line becomes a purchase, credit, waste,
//!   count or adjustment fact for one store and week, or is skipped with a reason
//! - **Three COGS estimates**: invoice-based (net purchases), inventory-method
//!   (beginning + purchases - ending) and coverage-adjusted (net purchases x factor)
//! - **Report**: per-store and all-store rows joined with POS sales, labor and budget
//!
//! ## Example
//!
//! ```rust,ignore
//! use cogs_dashboard_builder::*;
//! use chrono::NaiveDate;
//!
//! let config = ReportConfig::from_json_file("cogs_config.json")?;
//! let inputs = PeriodInputs {
//!     transactions,
//!     details,
//!     locations,
//!     gl_accounts,
//!     items,
//!     sales,
//!     budget: Budget::load("budget_2026.json")?,
//! };
//!
//! let as_of = NaiveDate::from_ymd_opt(2026, 1, 28).unwrap();
//! let report = process_cogs_report(&config, &inputs, as_of)?;
//! println!("{}", report.to_json()?);
//! ```

pub mod calibration;
pub mod chart_of_accounts;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod fiscal;
pub mod ingestion;
pub mod render;
pub mod report;
pub mod schema;
pub mod stores;

#[cfg(feature = "upstream")]
pub mod gateway;

pub use calibration::{calibrate_coverage_factor, CoverageCalibration};
pub use chart_of_accounts::{CogsCategory, GlCategoryRule, GlChart};
pub use classifier::{
    classify, classify_all, ClassificationContext, ClassificationOutcome, ClassifiedLine,
    FlowType, LineFact, Placement, Rejection, SkipCounts, SkipReason,
};
pub use config::{CoverageConfig, ReportConfig};
pub use engine::{
    CogsEstimates, PeriodReconciliation, ReconciliationEngine, StoreWindowAggregate,
};
pub use error::{CogsError, Result};
pub use fiscal::*;
pub use ingestion::{Budget, BudgetFigures, DailyFigures, DailySeries, SalesCache};
pub use render::{render_dashboard_html, DEFAULT_TEMPLATE};
pub use report::{CogsReport, ReportBuilder};
pub use schema::*;
pub use stores::{StoreCode, StoreConfig, StoreRegistry};

use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Everything pulled from upstream for one reporting run.
#[derive(Debug, Clone, Default)]
pub struct PeriodInputs {
    /// Headers for the period plus the stock-count lookback days.
    pub transactions: Vec<Transaction>,
    pub details: Vec<TransactionDetailLine>,
    pub locations: Vec<Location>,
    pub gl_accounts: Vec<GlAccountRecord>,
    pub items: Vec<ItemRecord>,
    /// Daily POS figures keyed by raw store code.
    pub sales: BTreeMap<String, DailySeries>,
    pub budget: Option<Budget>,
}

pub struct CogsReportProcessor;

impl CogsReportProcessor {
    /// Reports the period [`reporting_period`] selects for `as_of`.
    pub fn process(
        config: &ReportConfig,
        inputs: &PeriodInputs,
        as_of: NaiveDate,
    ) -> Result<CogsReport> {
        config.validate()?;
        let period = reporting_period(as_of, &config.fiscal_year_starts)?;
        Self::process_period(config, inputs, &period, as_of)
    }

    pub fn process_period(
        config: &ReportConfig,
        inputs: &PeriodInputs,
        period: &FiscalPeriod,
        as_of: NaiveDate,
    ) -> Result<CogsReport> {
        config.validate()?;

        info!(
            "Processing COGS for {} {} ({} to {}), {} stores",
            config.organization_name,
            period.key(),
            period.start,
            period.end,
            config.stores.len()
        );
        debug!(
            "Inputs: {} transactions, {} detail lines, {} GL accounts, {} items",
            inputs.transactions.len(),
            inputs.details.len(),
            inputs.gl_accounts.len(),
            inputs.items.len()
        );

        let stores = StoreRegistry::new(&config.stores, &inputs.locations);
        let chart = GlChart::new(
            &inputs.gl_accounts,
            &config.gl_categories,
            config.cogs_account_prefix.as_str(),
        );

        let transactions = dedup_transactions(inputs.transactions.clone());
        let ctx = ClassificationContext::new(config, &chart, &stores, &inputs.items, *period);
        let classification = classify_all(&transactions, &inputs.details, &ctx);

        let reconciliation =
            ReconciliationEngine::new(config).reconcile(period, &stores, &classification.lines);

        let sales = validated_sales(&stores, &inputs.sales);
        let builder = ReportBuilder::new(config, &stores, &sales, inputs.budget.as_ref(), as_of);

        Ok(builder.build(&reconciliation, &classification))
    }
}

pub fn process_cogs_report(
    config: &ReportConfig,
    inputs: &PeriodInputs,
    as_of: NaiveDate,
) -> Result<CogsReport> {
    CogsReportProcessor::process(config, inputs, as_of)
}

fn validated_sales(
    stores: &StoreRegistry,
    sales: &BTreeMap<String, DailySeries>,
) -> BTreeMap<StoreCode, DailySeries> {
    sales
        .iter()
        .filter_map(|(raw, series)| match stores.code(raw) {
            Some(code) => Some((code, series.clone())),
            None => {
                warn!("Ignoring POS figures for unregistered store {}", raw);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReportConfig {
        ReportConfig::from_json_str(
            r#"{
                "organization_name": "Test Kitchen",
                "fiscal_year_starts": { "2026": "2025-12-31" },
                "stores": [{ "code": "8001", "name": "State" }],
                "coverage": { "factor": 2.0 }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_inputs_produce_unavailable_markers() {
        let as_of = NaiveDate::from_ymd_opt(2026, 1, 14).unwrap();
        let report = process_cogs_report(&config(), &PeriodInputs::default(), as_of).unwrap();

        assert_eq!(report.period, 1);
        assert_eq!(report.weeks.len(), 4);
        assert!(report.weeks[1].is_current);
        assert!(report.weeks[0].is_past);
        assert!(!report.budget_loaded);

        let row = &report.period_summary.stores[0];
        assert_eq!(row.net_purchases, 0.0);
        assert!(row.inventory_cogs.is_none());
        assert!(row.invoice_cogs_pct.is_none());
        assert_eq!(report.data_quality.stores_without_sales, vec!["8001"]);
    }

    #[test]
    fn test_unknown_period_is_an_error() {
        let as_of = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
        assert!(matches!(
            process_cogs_report(&config(), &PeriodInputs::default(), as_of),
            Err(CogsError::PeriodNotFound(_))
        ));
    }

    #[test]
    fn test_sales_for_unregistered_store_are_dropped() {
        let mut sales = BTreeMap::new();
        sales.insert("9999".to_string(), DailySeries::new());
        sales.insert("8001".to_string(), DailySeries::new());
        let stores = StoreRegistry::new(&config().stores, &[]);
        let validated = validated_sales(&stores, &sales);
        assert_eq!(validated.len(), 1);
        assert!(validated.keys().all(|c| c.as_str() == "8001"));
    }
}
