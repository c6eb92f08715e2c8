//! Joins reconciled COGS with POS sales, labor and budget into the
//! serializable dashboard report.
//!
//! Money is rounded to cents and percentages to two decimals here and only
//! here. Percentages over zero sales are `None`, never 0 or infinity.

use crate::classifier::{ClassificationOutcome, SkipCounts, WasteItem};
use crate::config::ReportConfig;
use crate::engine::{InvoiceCounts, PeriodReconciliation, PurchaseBreakdown, StoreWindowAggregate};
use crate::error::Result;
use crate::fiscal::{BusinessWeek, FiscalPeriod};
use crate::ingestion::{window_totals, Budget, BudgetFigures, DailyFigures, DailySeries};
use crate::stores::{StoreCode, StoreRegistry};
use chrono::{Duration, NaiveDate};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CogsReport {
    pub organization_name: String,
    pub fiscal_year: i32,
    pub period: u32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub as_of: NaiveDate,
    pub coverage_factor: f64,
    pub coverage_calibrated_from: Option<String>,
    pub include_journal_entries: bool,
    pub include_item_transfers: bool,
    pub weeks: Vec<WeekReport>,
    pub period_summary: WindowSummary,
    /// Week-to-date sign-off state for the current week, one entry per store.
    pub gm_status: Vec<GmStatus>,
    pub budget_loaded: bool,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WeekReport {
    /// 1-based.
    pub week_number: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub is_current: bool,
    pub is_past: bool,
    #[serde(flatten)]
    pub summary: WindowSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WindowSummary {
    pub stores: Vec<StoreCogsRow>,
    pub totals: TotalsRow,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VendorSpend {
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreCogsRow {
    pub store_code: String,
    pub store_name: String,
    pub net_sales: f64,
    pub labor_hours: f64,
    pub labor_cost: f64,
    pub labor_pct: Option<f64>,
    pub purchases: PurchaseBreakdown,
    pub gross_purchases: f64,
    pub credits: f64,
    pub adjustments: f64,
    pub net_purchases: f64,
    pub waste: f64,
    pub beginning_inventory: f64,
    pub ending_inventory: f64,
    pub inventory_adjustment: f64,
    pub has_stock_count: bool,
    pub stock_count_date: Option<NaiveDate>,
    pub late_count: bool,
    pub invoice_cogs: f64,
    pub inventory_cogs: Option<f64>,
    pub coverage_cogs: f64,
    pub invoice_cogs_pct: Option<f64>,
    pub inventory_cogs_pct: Option<f64>,
    pub coverage_cogs_pct: Option<f64>,
    pub invoices: InvoiceCounts,
    pub top_vendors: Vec<VendorSpend>,
    pub waste_items: Vec<WasteItem>,
    /// Period rows only.
    pub budget: Option<BudgetComparison>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TotalsRow {
    pub net_sales: f64,
    pub labor_hours: f64,
    pub labor_cost: f64,
    pub labor_pct: Option<f64>,
    pub purchases: PurchaseBreakdown,
    pub gross_purchases: f64,
    pub credits: f64,
    pub adjustments: f64,
    pub net_purchases: f64,
    pub waste: f64,
    pub invoice_cogs: f64,
    /// Sum over stores with an inventory figure; `None` when no store has one.
    pub inventory_cogs: Option<f64>,
    /// Stores contributing to `inventory_cogs`.
    pub inventory_stores: usize,
    pub coverage_cogs: f64,
    pub invoice_cogs_pct: Option<f64>,
    /// Over the sales of the contributing stores only.
    pub inventory_cogs_pct: Option<f64>,
    pub coverage_cogs_pct: Option<f64>,
    pub invoices: InvoiceCounts,
    pub budget: Option<BudgetComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetComparison {
    pub sales: f64,
    /// Budget sales scaled to the days of the period completed as of the run.
    pub sales_prorated: f64,
    pub sales_variance_pct: Option<f64>,
    pub cogs: f64,
    pub cogs_pct: f64,
    /// Coverage-adjusted COGS % minus budget COGS %, in points.
    pub coverage_cogs_pct_variance: Option<f64>,
    pub payroll_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GmStatus {
    pub store_code: String,
    pub store_name: String,
    pub inventory_done: bool,
    pub stock_count_date: Option<NaiveDate>,
    pub invoices: InvoiceCounts,
    pub all_approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MissingStockCounts {
    /// "Week 1" through "Week 5", or "Period".
    pub window: String,
    pub stores: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UnapprovedInvoices {
    pub store_code: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DataQuality {
    pub missing_stock_counts: Vec<MissingStockCounts>,
    pub late_stock_counts: Vec<String>,
    pub unapproved_invoices: Vec<UnapprovedInvoices>,
    pub skipped_lines: SkipCounts,
    pub skipped_total: usize,
    pub unmapped_locations: Vec<String>,
    /// Stores with no POS figures for the period.
    pub stores_without_sales: Vec<String>,
}

impl CogsReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn json_schema() -> Result<String> {
        let schema = schemars::schema_for!(CogsReport);
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    /// The week in progress at `as_of`. On a week's grace day the closing
    /// week comes first.
    pub fn current_week(&self) -> Option<&WeekReport> {
        self.weeks.iter().find(|w| w.is_current)
    }
}

pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `numerator / sales` as a percentage, unavailable when sales are not positive.
pub fn pct_of_sales(numerator: f64, sales: f64) -> Option<f64> {
    if sales > 0.0 && numerator.is_finite() {
        Some(round_money(numerator / sales * 100.0))
    } else {
        None
    }
}

pub struct ReportBuilder<'a> {
    config: &'a ReportConfig,
    stores: &'a StoreRegistry,
    sales: &'a BTreeMap<StoreCode, DailySeries>,
    budget: Option<&'a Budget>,
    as_of: NaiveDate,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(
        config: &'a ReportConfig,
        stores: &'a StoreRegistry,
        sales: &'a BTreeMap<StoreCode, DailySeries>,
        budget: Option<&'a Budget>,
        as_of: NaiveDate,
    ) -> Self {
        Self {
            config,
            stores,
            sales,
            budget,
            as_of,
        }
    }

    pub fn build(
        &self,
        reconciliation: &PeriodReconciliation,
        classification: &ClassificationOutcome,
    ) -> CogsReport {
        let period = &reconciliation.period;

        let weeks: Vec<WeekReport> = reconciliation
            .weeks
            .iter()
            .map(|w| WeekReport {
                week_number: w.week.index + 1,
                start: w.week.start,
                end: w.week.end,
                is_current: self.is_current(&w.week),
                is_past: w.week.end < self.as_of,
                summary: self.summarize(&w.stores, None),
            })
            .collect();

        let period_summary = self.summarize(&reconciliation.period_totals, Some(period));
        let gm_status = self.gm_status(reconciliation);
        let data_quality = self.data_quality(reconciliation, classification);

        info!(
            "Built {} report: {} weeks, {} stores, net purchases {:.2}",
            period.key(),
            weeks.len(),
            period_summary.stores.len(),
            period_summary.totals.net_purchases
        );

        CogsReport {
            organization_name: self.config.organization_name.clone(),
            fiscal_year: period.fiscal_year,
            period: period.number,
            period_start: period.start,
            period_end: period.end,
            as_of: self.as_of,
            coverage_factor: self.config.coverage_factor(),
            coverage_calibrated_from: self.config.coverage.calibrated_from.clone(),
            include_journal_entries: self.config.include_journal_entries,
            include_item_transfers: self.config.include_item_transfers,
            weeks,
            period_summary,
            gm_status,
            budget_loaded: self.budget.is_some(),
            data_quality,
        }
    }

    /// The week containing `as_of`, or whose grace day is `as_of`.
    fn is_current(&self, week: &BusinessWeek) -> bool {
        week.start <= self.as_of && self.as_of <= week.end + Duration::days(1)
    }

    fn pos_totals(&self, store: &StoreCode, start: NaiveDate, end: NaiveDate) -> DailyFigures {
        self.sales
            .get(store)
            .map(|series| window_totals(series, start, end))
            .unwrap_or_default()
    }

    fn summarize(
        &self,
        aggregates: &BTreeMap<StoreCode, StoreWindowAggregate>,
        period: Option<&FiscalPeriod>,
    ) -> WindowSummary {
        let prorate = period.map(|p| self.prorate(p)).unwrap_or(1.0);

        let rows: Vec<(DailyFigures, &StoreWindowAggregate)> = aggregates
            .values()
            .map(|agg| (self.pos_totals(&agg.store, agg.start, agg.end), agg))
            .collect();

        let stores = rows
            .iter()
            .map(|(pos, agg)| {
                let budget = period
                    .and_then(|p| self.budget.and_then(|b| b.for_store(&agg.store, p.number)))
                    .map(|figures| {
                        budget_comparison(
                            figures,
                            prorate,
                            pos.net_sales,
                            pct_of_sales(agg.estimates.coverage_adjusted, pos.net_sales),
                        )
                    });
                self.store_row(agg, pos, budget)
            })
            .collect();

        let totals_budget = period
            .and_then(|p| self.budget.and_then(|b| b.all_stores(p.number)))
            .map(|figures| {
                let sales: f64 = rows.iter().map(|(pos, _)| pos.net_sales).sum();
                let coverage: f64 = rows.iter().map(|(_, a)| a.estimates.coverage_adjusted).sum();
                budget_comparison(figures, prorate, sales, pct_of_sales(coverage, sales))
            });

        WindowSummary {
            stores,
            totals: totals_row(&rows, totals_budget),
        }
    }

    fn store_row(
        &self,
        agg: &StoreWindowAggregate,
        pos: &DailyFigures,
        budget: Option<BudgetComparison>,
    ) -> StoreCogsRow {
        let sales = pos.net_sales;
        let estimates = agg.estimates;

        StoreCogsRow {
            store_code: agg.store.to_string(),
            store_name: self.stores.name(&agg.store).to_string(),
            net_sales: round_money(sales),
            labor_hours: round_money(pos.labor_hours),
            labor_cost: round_money(pos.labor_cost),
            labor_pct: pct_of_sales(pos.labor_cost, sales),
            purchases: round_breakdown(&agg.purchases),
            gross_purchases: round_money(agg.gross_purchases()),
            credits: round_money(agg.credits),
            adjustments: round_money(agg.adjustments),
            net_purchases: round_money(agg.net_purchases()),
            waste: round_money(agg.waste),
            beginning_inventory: round_money(agg.beginning_inventory),
            ending_inventory: round_money(agg.ending_inventory),
            inventory_adjustment: round_money(agg.inventory_adjustment),
            has_stock_count: agg.has_stock_count,
            stock_count_date: agg.stock_count_date,
            late_count: agg.late_count,
            invoice_cogs: round_money(estimates.invoice),
            inventory_cogs: estimates.inventory.map(round_money),
            coverage_cogs: round_money(estimates.coverage_adjusted),
            invoice_cogs_pct: pct_of_sales(estimates.invoice, sales),
            inventory_cogs_pct: estimates.inventory.and_then(|c| pct_of_sales(c, sales)),
            coverage_cogs_pct: pct_of_sales(estimates.coverage_adjusted, sales),
            invoices: agg.invoices,
            top_vendors: agg
                .top_vendors
                .iter()
                .map(|(name, amount)| VendorSpend {
                    name: name.clone(),
                    amount: round_money(*amount),
                })
                .collect(),
            waste_items: agg
                .waste_items
                .iter()
                .map(|item| WasteItem {
                    amount: round_money(item.amount),
                    ..item.clone()
                })
                .collect(),
            budget,
        }
    }

    /// Share of the period's days completed before `as_of`.
    fn prorate(&self, period: &FiscalPeriod) -> f64 {
        let last_complete = (self.as_of - Duration::days(1)).min(period.end);
        let completed = ((last_complete - period.start).num_days() + 1).clamp(0, period.num_days());
        completed as f64 / period.num_days() as f64
    }

    fn gm_status(&self, reconciliation: &PeriodReconciliation) -> Vec<GmStatus> {
        let current = reconciliation
            .weeks
            .iter()
            .find(|w| self.is_current(&w.week));

        self.stores
            .stores()
            .map(|store| {
                let agg = current.and_then(|w| w.stores.get(&store.code));
                let invoices = agg.map(|a| a.invoices).unwrap_or_default();
                GmStatus {
                    store_code: store.code.to_string(),
                    store_name: store.name.clone(),
                    inventory_done: agg.is_some_and(|a| a.has_stock_count),
                    stock_count_date: agg.and_then(|a| a.stock_count_date),
                    invoices,
                    all_approved: invoices.total > 0 && invoices.unapproved == 0,
                }
            })
            .collect()
    }

    fn data_quality(
        &self,
        reconciliation: &PeriodReconciliation,
        classification: &ClassificationOutcome,
    ) -> DataQuality {
        let missing = |aggregates: &BTreeMap<StoreCode, StoreWindowAggregate>| -> Vec<String> {
            aggregates
                .values()
                .filter(|a| !a.has_stock_count)
                .map(|a| a.store.to_string())
                .collect()
        };

        let mut missing_stock_counts: Vec<MissingStockCounts> = reconciliation
            .weeks
            .iter()
            .map(|w| MissingStockCounts {
                window: format!("Week {}", w.week.index + 1),
                stores: missing(&w.stores),
            })
            .collect();
        missing_stock_counts.push(MissingStockCounts {
            window: "Period".to_string(),
            stores: missing(&reconciliation.period_totals),
        });
        missing_stock_counts.retain(|m| !m.stores.is_empty());

        let period_totals = &reconciliation.period_totals;
        let late_stock_counts = period_totals
            .values()
            .filter(|a| a.late_count)
            .map(|a| a.store.to_string())
            .collect();

        let unapproved_invoices = period_totals
            .values()
            .filter(|a| a.invoices.unapproved > 0)
            .map(|a| UnapprovedInvoices {
                store_code: a.store.to_string(),
                count: a.invoices.unapproved,
            })
            .collect();

        let period = &reconciliation.period;
        let stores_without_sales: Vec<String> = self
            .stores
            .codes()
            .filter(|code| {
                self.sales
                    .get(*code)
                    .map_or(true, |series| series.range(period.start..=period.end).next().is_none())
            })
            .map(|code| code.to_string())
            .collect();

        debug!(
            "Data quality: {} windows missing counts, {} stores without sales",
            missing_stock_counts.len(),
            stores_without_sales.len()
        );

        DataQuality {
            missing_stock_counts,
            late_stock_counts,
            unapproved_invoices,
            skipped_total: classification.skipped.total(),
            skipped_lines: classification.skipped.clone(),
            unmapped_locations: classification.unmapped_locations.iter().cloned().collect(),
            stores_without_sales,
        }
    }
}

fn round_breakdown(purchases: &PurchaseBreakdown) -> PurchaseBreakdown {
    PurchaseBreakdown {
        food: round_money(purchases.food),
        packaging: round_money(purchases.packaging),
        beverage: round_money(purchases.beverage),
        other: round_money(purchases.other),
    }
}

fn budget_comparison(
    figures: &BudgetFigures,
    prorate: f64,
    net_sales: f64,
    coverage_cogs_pct: Option<f64>,
) -> BudgetComparison {
    let sales_prorated = figures.sales * prorate;
    let sales_variance_pct = if sales_prorated > 0.0 {
        Some(round_money((net_sales - sales_prorated) / sales_prorated * 100.0))
    } else {
        None
    };

    BudgetComparison {
        sales: round_money(figures.sales),
        sales_prorated: round_money(sales_prorated),
        sales_variance_pct,
        cogs: round_money(figures.cogs),
        cogs_pct: figures.cogs_pct,
        coverage_cogs_pct_variance: coverage_cogs_pct.map(|pct| round_money(pct - figures.cogs_pct)),
        payroll_pct: figures.payroll_pct,
    }
}

fn totals_row(
    rows: &[(DailyFigures, &StoreWindowAggregate)],
    budget: Option<BudgetComparison>,
) -> TotalsRow {
    let mut pos = DailyFigures::default();
    let mut purchases = PurchaseBreakdown::default();
    let mut invoices = InvoiceCounts::default();
    let (mut credits, mut adjustments, mut waste) = (0.0, 0.0, 0.0);
    let (mut invoice_cogs, mut coverage_cogs) = (0.0, 0.0);
    let mut inventory: Option<(f64, f64)> = None;
    let mut inventory_stores = 0;

    for (sales, agg) in rows {
        pos.add(sales);
        purchases.food += agg.purchases.food;
        purchases.packaging += agg.purchases.packaging;
        purchases.beverage += agg.purchases.beverage;
        purchases.other += agg.purchases.other;
        credits += agg.credits;
        adjustments += agg.adjustments;
        waste += agg.waste;
        invoice_cogs += agg.estimates.invoice;
        coverage_cogs += agg.estimates.coverage_adjusted;
        invoices.total += agg.invoices.total;
        invoices.approved += agg.invoices.approved;
        invoices.unapproved += agg.invoices.unapproved;

        if let Some(cogs) = agg.estimates.inventory {
            let (sum, sales_base) = inventory.get_or_insert((0.0, 0.0));
            *sum += cogs;
            *sales_base += sales.net_sales;
            inventory_stores += 1;
        }
    }

    let net_purchases = purchases.total() - credits + adjustments;

    TotalsRow {
        net_sales: round_money(pos.net_sales),
        labor_hours: round_money(pos.labor_hours),
        labor_cost: round_money(pos.labor_cost),
        labor_pct: pct_of_sales(pos.labor_cost, pos.net_sales),
        purchases: round_breakdown(&purchases),
        gross_purchases: round_money(purchases.total()),
        credits: round_money(credits),
        adjustments: round_money(adjustments),
        net_purchases: round_money(net_purchases),
        waste: round_money(waste),
        invoice_cogs: round_money(invoice_cogs),
        inventory_cogs: inventory.map(|(sum, _)| round_money(sum)),
        inventory_stores,
        coverage_cogs: round_money(coverage_cogs),
        invoice_cogs_pct: pct_of_sales(invoice_cogs, pos.net_sales),
        inventory_cogs_pct: inventory.and_then(|(sum, sales)| pct_of_sales(sum, sales)),
        coverage_cogs_pct: pct_of_sales(coverage_cogs, pos.net_sales),
        invoices,
        budget,
    }
}
