use crate::chart_of_accounts::CogsCategory;
use crate::classifier::{ClassifiedLine, LineFact, WasteItem};
use crate::config::ReportConfig;
use crate::fiscal::{BusinessWeek, FiscalPeriod};
use crate::stores::{StoreCode, StoreRegistry};
use chrono::{Duration, NaiveDate};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PurchaseBreakdown {
    pub food: f64,
    pub packaging: f64,
    pub beverage: f64,
    pub other: f64,
}

impl PurchaseBreakdown {
    pub fn add(&mut self, category: CogsCategory, amount: f64) {
        match category {
            CogsCategory::Food => self.food += amount,
            CogsCategory::Packaging => self.packaging += amount,
            CogsCategory::Beverage => self.beverage += amount,
            CogsCategory::Other => self.other += amount,
        }
    }

    pub fn total(&self) -> f64 {
        self.food + self.packaging + self.beverage + self.other
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InvoiceCounts {
    pub total: usize,
    pub approved: usize,
    pub unapproved: usize,
}

/// The three COGS views of one window. They answer different questions and
/// are always reported side by side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CogsEstimates {
    /// Net purchases as invoiced.
    pub invoice: f64,
    /// Beginning + net purchases - ending. `None` unless both counts exist.
    pub inventory: Option<f64>,
    /// Net purchases scaled by the configured coverage factor.
    pub coverage_adjusted: f64,
}

impl CogsEstimates {
    pub fn compute(
        net_purchases: f64,
        beginning_inventory: f64,
        ending_inventory: f64,
        coverage_factor: f64,
    ) -> Self {
        let inventory = if beginning_inventory > 0.0 && ending_inventory > 0.0 {
            Some(beginning_inventory + net_purchases - ending_inventory)
        } else {
            None
        };

        Self {
            invoice: net_purchases,
            inventory,
            coverage_adjusted: net_purchases * coverage_factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OpeningSource {
    /// Closing count dated on the window start or within the lookback days before it.
    PriorClosingCount,
    /// Prior-count value carried on the window's first count.
    CarriedPriorValue,
    None,
}

/// Store x window aggregate. Recomputed every run from classified lines.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreWindowAggregate {
    pub store: StoreCode,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub purchases: PurchaseBreakdown,
    pub credits: f64,
    pub waste: f64,
    /// Journal Entry / Item Transfer postings, when enabled.
    pub adjustments: f64,
    pub beginning_inventory: f64,
    pub ending_inventory: f64,
    pub inventory_adjustment: f64,
    pub opening_source: OpeningSource,
    pub has_stock_count: bool,
    pub stock_count_date: Option<NaiveDate>,
    pub late_count: bool,
    pub invoices: InvoiceCounts,
    /// Spend by vendor, highest first.
    pub top_vendors: Vec<(String, f64)>,
    /// Largest waste entries first.
    pub waste_items: Vec<WasteItem>,
    pub estimates: CogsEstimates,
}

impl StoreWindowAggregate {
    pub fn gross_purchases(&self) -> f64 {
        self.purchases.total()
    }

    pub fn net_purchases(&self) -> f64 {
        self.purchases.total() - self.credits + self.adjustments
    }
}

#[derive(Debug, Clone)]
pub struct WeekReconciliation {
    pub week: BusinessWeek,
    pub stores: BTreeMap<StoreCode, StoreWindowAggregate>,
}

#[derive(Debug, Clone)]
pub struct PeriodReconciliation {
    pub period: FiscalPeriod,
    pub weeks: Vec<WeekReconciliation>,
    pub period_totals: BTreeMap<StoreCode, StoreWindowAggregate>,
}

impl PeriodReconciliation {
    /// Stores that never submitted a count in any week of the period.
    pub fn stores_without_counts(&self) -> Vec<StoreCode> {
        self.period_totals
            .values()
            .filter(|agg| !agg.has_stock_count)
            .map(|agg| agg.store.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct CountFact {
    date: NaiveDate,
    ending: f64,
    beginning: f64,
    adjustment: f64,
}

// Running state for one store in one window
#[derive(Default)]
struct WindowSlot {
    purchases: PurchaseBreakdown,
    credits: f64,
    waste: f64,
    adjustments: f64,
    counts: Vec<CountFact>,
    invoice_ids: BTreeSet<String>,
    approved_ids: BTreeSet<String>,
    vendors: BTreeMap<String, f64>,
    waste_items: Vec<WasteItem>,
}

impl WindowSlot {
    fn absorb(&mut self, line: &ClassifiedLine) {
        match &line.fact {
            LineFact::Purchase {
                category,
                amount,
                vendor,
                approved,
            } => {
                self.purchases.add(*category, *amount);
                *self.vendors.entry(vendor.clone()).or_insert(0.0) += amount;
                self.invoice_ids.insert(line.transaction_id.clone());
                if *approved {
                    self.approved_ids.insert(line.transaction_id.clone());
                }
            }
            LineFact::Credit { amount } => self.credits += amount,
            LineFact::Waste { amount, item } => {
                self.waste += amount;
                self.waste_items.push(item.clone());
            }
            LineFact::StockCount {
                ending,
                beginning,
                adjustment,
            } => self.counts.push(CountFact {
                date: line.date,
                ending: *ending,
                beginning: *beginning,
                adjustment: *adjustment,
            }),
            LineFact::Adjustment { amount, .. } => self.adjustments += amount,
        }
    }
}

pub struct ReconciliationEngine<'a> {
    config: &'a ReportConfig,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(config: &'a ReportConfig) -> Self {
        Self { config }
    }

    pub fn reconcile(
        &self,
        period: &FiscalPeriod,
        stores: &StoreRegistry,
        lines: &[ClassifiedLine],
    ) -> PeriodReconciliation {
        let weeks = period.business_weeks();

        // 1. Seed a slot for every registered store in every window
        let mut week_slots: Vec<BTreeMap<StoreCode, WindowSlot>> = weeks
            .iter()
            .map(|_| stores.codes().map(|c| (c.clone(), WindowSlot::default())).collect())
            .collect();
        let mut period_slots: BTreeMap<StoreCode, WindowSlot> = stores
            .codes()
            .map(|c| (c.clone(), WindowSlot::default()))
            .collect();

        // Every count a store submitted, lookback included, for opening values
        let mut all_counts: BTreeMap<StoreCode, Vec<CountFact>> = BTreeMap::new();

        // 2. Route each line to its week and to the period
        for line in lines {
            if stores.get(&line.store).is_none() {
                warn!(
                    "Dropping line of {} for unregistered store {}",
                    line.transaction_id, line.store
                );
                continue;
            }

            if let LineFact::StockCount {
                ending,
                beginning,
                adjustment,
            } = line.fact
            {
                all_counts.entry(line.store.clone()).or_default().push(CountFact {
                    date: line.date,
                    ending,
                    beginning,
                    adjustment,
                });
            }

            let Some(week_index) = line.placement.week_index() else {
                continue;
            };

            if let Some(slot) = week_slots
                .get_mut(week_index)
                .and_then(|w| w.get_mut(&line.store))
            {
                slot.absorb(line);
            }
            if let Some(slot) = period_slots.get_mut(&line.store) {
                slot.absorb(line);
            }
        }

        // 3. Resolve inventory and estimates per window
        let no_counts = Vec::new();
        let week_results = weeks
            .iter()
            .zip(week_slots)
            .map(|(week, slots)| WeekReconciliation {
                week: *week,
                stores: slots
                    .into_iter()
                    .map(|(code, slot)| {
                        let history = all_counts.get(&code).unwrap_or(&no_counts);
                        let agg = self.finalize(code.clone(), week.start, week.end, slot, history);
                        (code, agg)
                    })
                    .collect(),
            })
            .collect();

        let period_totals: BTreeMap<StoreCode, StoreWindowAggregate> = period_slots
            .into_iter()
            .map(|(code, slot)| {
                let history = all_counts.get(&code).unwrap_or(&no_counts);
                let agg = self.finalize(code.clone(), period.start, period.end, slot, history);
                (code, agg)
            })
            .collect();

        for agg in period_totals.values().filter(|a| !a.has_stock_count) {
            warn!(
                "Store {} has no stock count in {}; inventory-method COGS unavailable",
                agg.store,
                period.key()
            );
        }

        PeriodReconciliation {
            period: *period,
            weeks: week_results,
            period_totals,
        }
    }

    fn finalize(
        &self,
        store: StoreCode,
        start: NaiveDate,
        end: NaiveDate,
        slot: WindowSlot,
        history: &[CountFact],
    ) -> StoreWindowAggregate {
        let (ending_inventory, stock_count_date, late_count) = closing_inventory(&slot.counts, end);
        let (beginning_inventory, opening_source) = self.opening_inventory(start, &slot.counts, history);
        let inventory_adjustment = slot.counts.iter().map(|c| c.adjustment).sum();

        let invoices = InvoiceCounts {
            total: slot.invoice_ids.len(),
            approved: slot.approved_ids.len(),
            unapproved: slot.invoice_ids.len() - slot.approved_ids.len(),
        };

        let mut top_vendors: Vec<(String, f64)> = slot.vendors.into_iter().collect();
        top_vendors.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_vendors.truncate(self.config.top_n);

        let mut waste_items = slot.waste_items;
        waste_items.sort_by(|a, b| b.amount.total_cmp(&a.amount));
        waste_items.truncate(self.config.top_n);

        let net_purchases = slot.purchases.total() - slot.credits + slot.adjustments;
        let estimates = CogsEstimates::compute(
            net_purchases,
            beginning_inventory,
            ending_inventory,
            self.config.coverage_factor(),
        );

        debug!(
            "{} {}..{}: net {:.2}, begin {:.2}, end {:.2}, counts {}",
            store,
            start,
            end,
            net_purchases,
            beginning_inventory,
            ending_inventory,
            slot.counts.len()
        );

        StoreWindowAggregate {
            store,
            start,
            end,
            purchases: slot.purchases,
            credits: slot.credits,
            waste: slot.waste,
            adjustments: slot.adjustments,
            beginning_inventory,
            ending_inventory,
            inventory_adjustment,
            opening_source,
            has_stock_count: !slot.counts.is_empty(),
            stock_count_date,
            late_count,
            invoices,
            top_vendors,
            waste_items,
            estimates,
        }
    }

    /// Prefers the latest closing count dated within the lookback days before
    /// `start` or on `start` itself; otherwise the prior values carried on the
    /// window's first count.
    fn opening_inventory(
        &self,
        start: NaiveDate,
        window_counts: &[CountFact],
        history: &[CountFact],
    ) -> (f64, OpeningSource) {
        let from = start - Duration::days(i64::from(self.config.stock_count_lookback_days));
        let prior: Vec<&CountFact> = history
            .iter()
            .filter(|c| c.date >= from && c.date <= start)
            .collect();
        if let Some(latest) = prior.iter().map(|c| c.date).max() {
            let value = prior
                .iter()
                .filter(|c| c.date == latest)
                .map(|c| c.ending)
                .sum();
            return (value, OpeningSource::PriorClosingCount);
        }

        match window_counts.iter().map(|c| c.date).min() {
            Some(earliest) => (
                window_counts
                    .iter()
                    .filter(|c| c.date == earliest)
                    .map(|c| c.beginning)
                    .sum(),
                OpeningSource::CarriedPriorValue,
            ),
            None => (0.0, OpeningSource::None),
        }
    }
}

/// Sum of counted values on the window's latest count date, and whether that
/// date falls after `end`.
fn closing_inventory(counts: &[CountFact], end: NaiveDate) -> (f64, Option<NaiveDate>, bool) {
    let Some(latest) = counts.iter().map(|c| c.date).max() else {
        return (0.0, None, false);
    };

    let value = counts
        .iter()
        .filter(|c| c.date == latest)
        .map(|c| c.ending)
        .sum();
    (value, Some(latest), latest > end)
}
