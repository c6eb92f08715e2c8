//! Turns one transaction detail line into a COGS fact for one store and week.
//!
//! Classification is a pure function of its inputs: the same header, line and
//! context always produce the same result.

use crate::chart_of_accounts::{CogsCategory, GlChart};
use crate::config::ReportConfig;
use crate::fiscal::{BusinessWeek, FiscalPeriod};
use crate::schema::{ItemRecord, Transaction, TransactionDetailLine, TransactionType};
use crate::stores::{StoreCode, StoreRegistry};
use chrono::{Duration, NaiveDate};
use log::{debug, info, trace, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Days after a week's end during which a stock count still closes that week.
pub const STOCK_COUNT_GRACE_DAYS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    Purchase,
    Credit,
    Waste,
    Count,
    Adjustment,
}

/// Where a classified line lands relative to the period being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Week(usize),
    /// Stock count dated the day after a week ends, admitted to that week.
    GraceWeek(usize),
    /// Stock count dated in the lookback days before the period or on its
    /// first day. Supplies opening inventory only.
    Lookback,
}

impl Placement {
    pub fn week_index(&self) -> Option<usize> {
        match self {
            Placement::Week(i) | Placement::GraceWeek(i) => Some(*i),
            Placement::Lookback => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WasteItem {
    pub item: String,
    pub quantity: f64,
    pub unit: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineFact {
    Purchase {
        category: CogsCategory,
        amount: f64,
        vendor: String,
        approved: bool,
    },
    Credit {
        amount: f64,
    },
    Waste {
        amount: f64,
        item: WasteItem,
    },
    StockCount {
        ending: f64,
        beginning: f64,
        adjustment: f64,
    },
    Adjustment {
        source: TransactionType,
        amount: f64,
    },
}

impl LineFact {
    pub fn flow_type(&self) -> FlowType {
        match self {
            LineFact::Purchase { .. } => FlowType::Purchase,
            LineFact::Credit { .. } => FlowType::Credit,
            LineFact::Waste { .. } => FlowType::Waste,
            LineFact::StockCount { .. } => FlowType::Count,
            LineFact::Adjustment { .. } => FlowType::Adjustment,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedLine {
    pub transaction_id: String,
    pub store: StoreCode,
    pub date: NaiveDate,
    pub placement: Placement,
    pub fact: LineFact,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NotDetail,
    UnmappedStore { location_id: Option<String> },
    MissingGlAccount,
    UnknownGlAccount { gl_account_id: String },
    NonCogsAccount,
    ExcludedType(TransactionType),
    UnsupportedType,
    MalformedDate { raw: String },
    OutsidePeriod,
}

/// Serializable key for tallying rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotDetail,
    UnmappedStore,
    MissingGlAccount,
    UnknownGlAccount,
    NonCogsAccount,
    ExcludedType,
    UnsupportedType,
    MalformedDate,
    OutsidePeriod,
    OrphanLine,
}

impl Rejection {
    pub fn reason(&self) -> SkipReason {
        match self {
            Rejection::NotDetail => SkipReason::NotDetail,
            Rejection::UnmappedStore { .. } => SkipReason::UnmappedStore,
            Rejection::MissingGlAccount => SkipReason::MissingGlAccount,
            Rejection::UnknownGlAccount { .. } => SkipReason::UnknownGlAccount,
            Rejection::NonCogsAccount => SkipReason::NonCogsAccount,
            Rejection::ExcludedType(_) => SkipReason::ExcludedType,
            Rejection::UnsupportedType => SkipReason::UnsupportedType,
            Rejection::MalformedDate { .. } => SkipReason::MalformedDate,
            Rejection::OutsidePeriod => SkipReason::OutsidePeriod,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotDetail => write!(f, "not a detail row"),
            Rejection::UnmappedStore { location_id } => write!(
                f,
                "location {} is not a registered store",
                location_id.as_deref().unwrap_or("<none>")
            ),
            Rejection::MissingGlAccount => write!(f, "no GL account on line"),
            Rejection::UnknownGlAccount { gl_account_id } => {
                write!(f, "GL account {} not in chart", gl_account_id)
            }
            Rejection::NonCogsAccount => write!(f, "GL account outside COGS range"),
            Rejection::ExcludedType(t) => {
                write!(f, "{} lines are excluded by configuration", t.upstream_name())
            }
            Rejection::UnsupportedType => write!(f, "transaction type not used for COGS"),
            Rejection::MalformedDate { raw } => write!(f, "unparseable date '{}'", raw),
            Rejection::OutsidePeriod => write!(f, "dated outside the reporting period"),
        }
    }
}

/// Everything classification needs besides the line itself.
pub struct ClassificationContext<'a> {
    config: &'a ReportConfig,
    gl_chart: &'a GlChart,
    stores: &'a StoreRegistry,
    item_names: HashMap<&'a str, &'a str>,
    period: FiscalPeriod,
    weeks: Vec<BusinessWeek>,
}

impl<'a> ClassificationContext<'a> {
    pub fn new(
        config: &'a ReportConfig,
        gl_chart: &'a GlChart,
        stores: &'a StoreRegistry,
        items: &'a [ItemRecord],
        period: FiscalPeriod,
    ) -> Self {
        let item_names = items
            .iter()
            .filter_map(|item| {
                item.name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .map(|name| (item.item_id.as_str(), name))
            })
            .collect();

        Self {
            config,
            gl_chart,
            stores,
            item_names,
            period,
            weeks: period.business_weeks(),
        }
    }

    pub fn period(&self) -> &FiscalPeriod {
        &self.period
    }

    pub fn weeks(&self) -> &[BusinessWeek] {
        &self.weeks
    }

    /// First day searched for a prior closing count.
    pub fn lookback_start(&self) -> NaiveDate {
        self.period.start - Duration::days(i64::from(self.config.stock_count_lookback_days))
    }

    fn place(&self, transaction_type: TransactionType, date: NaiveDate) -> Option<Placement> {
        if transaction_type == TransactionType::StockCount {
            return self.place_count(date);
        }

        self.weeks
            .iter()
            .find(|w| w.contains(date))
            .map(|w| Placement::Week(w.index))
    }

    /// A count dated the day after a week ends closes that week. A count on
    /// the period's first day is the previous period's late close, so here
    /// it only opens the period.
    fn place_count(&self, date: NaiveDate) -> Option<Placement> {
        if date >= self.lookback_start() && date <= self.period.start {
            return Some(Placement::Lookback);
        }

        let grace = Duration::days(STOCK_COUNT_GRACE_DAYS);
        if let Some(week) = self.weeks.iter().find(|w| w.end + grace == date) {
            return Some(Placement::GraceWeek(week.index));
        }

        self.weeks
            .iter()
            .find(|w| w.contains(date))
            .map(|w| Placement::Week(w.index))
    }

    fn waste_item(&self, line: &TransactionDetailLine, amount: f64) -> WasteItem {
        let item = line
            .item_id
            .as_deref()
            .and_then(|id| self.item_names.get(id).copied())
            .or_else(|| line.comment.as_deref().filter(|c| !c.trim().is_empty()))
            .unwrap_or("Unknown")
            .to_string();

        WasteItem {
            item,
            quantity: line.quantity().abs(),
            unit: line.unit_of_measure_name.clone().unwrap_or_default(),
            amount,
        }
    }
}

/// Classifies a detail line of `transaction` for the context's period.
pub fn classify(
    transaction: &Transaction,
    line: &TransactionDetailLine,
    ctx: &ClassificationContext<'_>,
) -> Result<ClassifiedLine, Rejection> {
    if !line.is_detail() {
        return Err(Rejection::NotDetail);
    }

    let location = line.effective_location(transaction);
    let store = location
        .and_then(|id| ctx.stores.resolve_location(id))
        .ok_or_else(|| Rejection::UnmappedStore {
            location_id: location.map(str::to_string),
        })?;

    let gl_account_id = line
        .gl_account_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(Rejection::MissingGlAccount)?;
    let account = ctx
        .gl_chart
        .get(gl_account_id)
        .ok_or_else(|| Rejection::UnknownGlAccount {
            gl_account_id: gl_account_id.to_string(),
        })?;
    if !ctx.gl_chart.is_cogs_account(account) {
        return Err(Rejection::NonCogsAccount);
    }

    let fact = match transaction.transaction_type {
        TransactionType::PurchaseInvoice => LineFact::Purchase {
            category: account.category,
            amount: line.debit(),
            vendor: transaction.vendor_name(),
            approved: transaction.approved(),
        },
        TransactionType::CreditMemo => LineFact::Credit {
            amount: line.credit(),
        },
        TransactionType::WasteLog => {
            let amount = if line.amount() < 0.0 {
                line.amount().abs()
            } else {
                line.debit()
            };
            LineFact::Waste {
                amount,
                item: ctx.waste_item(line, amount),
            }
        }
        TransactionType::StockCount => LineFact::StockCount {
            ending: line.ending_value(),
            beginning: line.prior_value(),
            adjustment: line.adjustment(),
        },
        TransactionType::JournalEntry if ctx.config.include_journal_entries => {
            LineFact::Adjustment {
                source: TransactionType::JournalEntry,
                amount: line.debit() - line.credit(),
            }
        }
        TransactionType::ItemTransfer if ctx.config.include_item_transfers => {
            LineFact::Adjustment {
                source: TransactionType::ItemTransfer,
                amount: line.debit() - line.credit(),
            }
        }
        t @ (TransactionType::JournalEntry | TransactionType::ItemTransfer) => {
            return Err(Rejection::ExcludedType(t))
        }
        TransactionType::Other => return Err(Rejection::UnsupportedType),
    };

    let date = transaction
        .business_date()
        .map_err(|_| Rejection::MalformedDate {
            raw: transaction.date.clone(),
        })?;

    let placement = ctx
        .place(transaction.transaction_type, date)
        .ok_or(Rejection::OutsidePeriod)?;

    Ok(ClassifiedLine {
        transaction_id: transaction.transaction_id.clone(),
        store,
        date,
        placement,
        fact,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SkipCounts(pub BTreeMap<SkipReason, usize>);

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        *self.0.entry(reason).or_insert(0) += 1;
    }

    pub fn get(&self, reason: SkipReason) -> usize {
        self.0.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassificationOutcome {
    pub lines: Vec<ClassifiedLine>,
    pub skipped: SkipCounts,
    /// Upstream location ids seen on COGS lines that map to no store.
    pub unmapped_locations: BTreeSet<String>,
}

/// Classifies every detail line, joining each to its header by transaction id.
///
/// Lines whose header is missing are counted as orphans. Each unmapped
/// location is logged once.
pub fn classify_all(
    transactions: &[Transaction],
    details: &[TransactionDetailLine],
    ctx: &ClassificationContext<'_>,
) -> ClassificationOutcome {
    // a blank id cannot tie a line to its header
    let headers: HashMap<&str, &Transaction> = transactions
        .iter()
        .filter(|t| !t.transaction_id.is_empty())
        .map(|t| (t.transaction_id.as_str(), t))
        .collect();

    let mut outcome = ClassificationOutcome::default();

    for line in details {
        let Some(transaction) = headers.get(line.transaction_id.as_str()) else {
            outcome.skipped.record(SkipReason::OrphanLine);
            continue;
        };

        match classify(transaction, line, ctx) {
            Ok(classified) => outcome.lines.push(classified),
            Err(rejection) => {
                if let Rejection::UnmappedStore {
                    location_id: Some(id),
                } = &rejection
                {
                    if outcome.unmapped_locations.insert(id.clone()) {
                        warn!("Skipping lines for unmapped location {}", id);
                    }
                }
                trace!(
                    "Skipped line of {}: {}",
                    transaction.transaction_id,
                    rejection
                );
                outcome.skipped.record(rejection.reason());
            }
        }
    }

    info!(
        "Classified {} of {} detail lines for {} ({} skipped)",
        outcome.lines.len(),
        details.len(),
        ctx.period.key(),
        outcome.skipped.total()
    );
    for (reason, count) in &outcome.skipped.0 {
        debug!("  skipped {:?}: {}", reason, count);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_of_accounts::default_gl_categories;
    use crate::config::CoverageConfig;
    use crate::fiscal::periods_for_fiscal_year;
    use crate::schema::{GlAccountRecord, Location, RowType};
    use crate::stores::StoreConfig;
    use std::collections::BTreeMap;

    struct Fixture {
        config: ReportConfig,
        chart: GlChart,
        stores: StoreRegistry,
        items: Vec<ItemRecord>,
        period: FiscalPeriod,
    }

    impl Fixture {
        fn new() -> Self {
            let mut starts = BTreeMap::new();
            starts.insert(2026, date(2025, 12, 31));
            let config = ReportConfig {
                organization_name: "Test Kitchen".to_string(),
                fiscal_year_starts: starts,
                stores: vec![StoreConfig {
                    code: "8001".to_string(),
                    name: "State".to_string(),
                    pos_guid: None,
                }],
                cogs_account_prefix: "5".to_string(),
                gl_categories: default_gl_categories(),
                coverage: CoverageConfig::default(),
                include_journal_entries: false,
                include_item_transfers: false,
                stock_count_lookback_days: 3,
                top_n: 10,
                max_concurrent_stores: 1,
            };
            let chart = GlChart::new(
                &[
                    gl("gl-food", "5110"),
                    gl("gl-bev", "5310"),
                    gl("gl-rent", "6100"),
                ],
                &config.gl_categories,
                "5",
            );
            let stores = StoreRegistry::new(
                &config.stores,
                &[
                    Location {
                        location_id: "loc-1".to_string(),
                        location_number: Some("8001".to_string()),
                        name: None,
                    },
                    Location {
                        location_id: "loc-x".to_string(),
                        location_number: Some("9000".to_string()),
                        name: None,
                    },
                ],
            );
            let items = vec![ItemRecord {
                item_id: "item-1".to_string(),
                name: Some("Romaine".to_string()),
                category1: None,
                category2: None,
            }];
            let period = periods_for_fiscal_year(2026, date(2025, 12, 31))[0];
            Self {
                config,
                chart,
                stores,
                items,
                period,
            }
        }

        fn ctx(&self) -> ClassificationContext<'_> {
            ClassificationContext::new(
                &self.config,
                &self.chart,
                &self.stores,
                &self.items,
                self.period,
            )
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn gl(id: &str, number: &str) -> GlAccountRecord {
        GlAccountRecord {
            gl_account_id: id.to_string(),
            gl_account_number: Some(number.to_string()),
            name: None,
        }
    }

    fn txn(kind: TransactionType, day: &str) -> Transaction {
        Transaction {
            transaction_id: "t-1".to_string(),
            transaction_type: kind,
            date: format!("{}T00:00:00Z", day),
            location_id: Some("loc-1".to_string()),
            name: Some("AP Invoice - SYSCO - 1001".to_string()),
            is_approved: Some(true),
        }
    }

    fn line(gl_account: &str) -> TransactionDetailLine {
        TransactionDetailLine {
            transaction_detail_id: None,
            transaction_id: "t-1".to_string(),
            row_type: RowType::Detail,
            gl_account_id: Some(gl_account.to_string()),
            debit: Some(100.0),
            credit: Some(0.0),
            amount: Some(100.0),
            quantity: Some(-3.0),
            unit_of_measure_name: Some("case".to_string()),
            item_id: None,
            comment: None,
            location_id: None,
            prior_value: None,
            adjustment: None,
        }
    }

    #[test]
    fn test_purchase_classification() {
        let fx = Fixture::new();
        let result = classify(
            &txn(TransactionType::PurchaseInvoice, "2026-01-08"),
            &line("gl-bev"),
            &fx.ctx(),
        )
        .unwrap();

        assert_eq!(result.store.as_str(), "8001");
        assert_eq!(result.placement, Placement::Week(1));
        assert_eq!(result.fact.flow_type(), FlowType::Purchase);
        assert_eq!(
            result.fact,
            LineFact::Purchase {
                category: CogsCategory::Beverage,
                amount: 100.0,
                vendor: "SYSCO".to_string(),
                approved: true,
            }
        );
    }

    #[test]
    fn test_classification_is_idempotent() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let t = txn(TransactionType::WasteLog, "2026-01-02");
        let l = line("gl-food");
        assert_eq!(classify(&t, &l, &ctx), classify(&t, &l, &ctx));
    }

    #[test]
    fn test_rejections_in_rule_order() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let t = txn(TransactionType::PurchaseInvoice, "2026-01-08");

        let mut header_row = line("gl-rent");
        header_row.row_type = RowType::Header;
        assert_eq!(classify(&t, &header_row, &ctx), Err(Rejection::NotDetail));

        let mut foreign = line("gl-rent");
        foreign.location_id = Some("loc-x".to_string());
        assert_eq!(
            classify(&t, &foreign, &ctx),
            Err(Rejection::UnmappedStore {
                location_id: Some("loc-x".to_string())
            })
        );

        assert_eq!(
            classify(&t, &line("gl-rent"), &ctx),
            Err(Rejection::NonCogsAccount)
        );
        assert_eq!(
            classify(&t, &line("gl-nope"), &ctx).unwrap_err().reason(),
            SkipReason::UnknownGlAccount
        );

        let mut no_gl = line("gl-food");
        no_gl.gl_account_id = None;
        assert_eq!(classify(&t, &no_gl, &ctx), Err(Rejection::MissingGlAccount));

        let mut bad_date = t.clone();
        bad_date.date = "not-a-date".to_string();
        assert_eq!(
            classify(&bad_date, &line("gl-food"), &ctx).unwrap_err().reason(),
            SkipReason::MalformedDate
        );
    }

    #[test]
    fn test_credit_and_waste_amounts() {
        let fx = Fixture::new();
        let ctx = fx.ctx();

        let mut credit_line = line("gl-food");
        credit_line.credit = Some(42.0);
        let credit = classify(
            &txn(TransactionType::CreditMemo, "2026-01-02"),
            &credit_line,
            &ctx,
        )
        .unwrap();
        assert_eq!(credit.fact, LineFact::Credit { amount: 42.0 });

        let mut negative = line("gl-food");
        negative.amount = Some(-18.5);
        negative.debit = Some(0.0);
        negative.item_id = Some("item-1".to_string());
        let waste = classify(&txn(TransactionType::WasteLog, "2026-01-02"), &negative, &ctx)
            .unwrap();
        match waste.fact {
            LineFact::Waste { amount, item } => {
                assert_eq!(amount, 18.5);
                assert_eq!(item.item, "Romaine");
                assert_eq!(item.quantity, 3.0);
                assert_eq!(item.unit, "case");
            }
            other => panic!("expected waste, got {:?}", other),
        }

        let mut positive = line("gl-food");
        positive.amount = Some(7.0);
        positive.debit = Some(9.0);
        positive.comment = Some("dropped tray".to_string());
        let waste = classify(&txn(TransactionType::WasteLog, "2026-01-02"), &positive, &ctx)
            .unwrap();
        match waste.fact {
            LineFact::Waste { amount, item } => {
                assert_eq!(amount, 9.0);
                assert_eq!(item.item, "dropped tray");
            }
            other => panic!("expected waste, got {:?}", other),
        }
    }

    #[test]
    fn test_stock_count_grace_and_lookback() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let mut count_line = line("gl-food");
        count_line.amount = Some(11_200.0);
        count_line.prior_value = Some(12_000.0);

        // P1 ends 2026-01-27
        let grace = classify(
            &txn(TransactionType::StockCount, "2026-01-28"),
            &count_line,
            &ctx,
        )
        .unwrap();
        assert_eq!(grace.placement, Placement::GraceWeek(3));
        assert_eq!(
            grace.fact,
            LineFact::StockCount {
                ending: 11_200.0,
                beginning: 12_000.0,
                adjustment: 0.0
            }
        );

        assert_eq!(
            classify(
                &txn(TransactionType::StockCount, "2026-01-29"),
                &count_line,
                &ctx
            ),
            Err(Rejection::OutsidePeriod)
        );

        let lookback = classify(
            &txn(TransactionType::StockCount, "2025-12-30"),
            &count_line,
            &ctx,
        )
        .unwrap();
        assert_eq!(lookback.placement, Placement::Lookback);

        assert_eq!(
            classify(
                &txn(TransactionType::StockCount, "2025-12-27"),
                &count_line,
                &ctx
            ),
            Err(Rejection::OutsidePeriod)
        );
    }

    #[test]
    fn test_morning_after_count_closes_each_week() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let mut count_line = line("gl-food");
        count_line.amount = Some(9_400.0);

        // week 1 runs 2025-12-31..2026-01-06
        let place = |day: &str| {
            classify(&txn(TransactionType::StockCount, day), &count_line, &ctx)
                .unwrap()
                .placement
        };
        assert_eq!(place("2026-01-06"), Placement::Week(0));
        assert_eq!(place("2026-01-07"), Placement::GraceWeek(0));
        assert_eq!(place("2026-01-08"), Placement::Week(1));
        assert_eq!(place("2026-01-14"), Placement::GraceWeek(1));

        // first day of the period closes the previous period
        assert_eq!(place("2025-12-31"), Placement::Lookback);

        let invoice = classify(
            &txn(TransactionType::PurchaseInvoice, "2026-01-07"),
            &line("gl-food"),
            &ctx,
        )
        .unwrap();
        assert_eq!(invoice.placement, Placement::Week(1));
    }

    #[test]
    fn test_grace_never_applies_to_flows() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        for kind in [
            TransactionType::PurchaseInvoice,
            TransactionType::CreditMemo,
            TransactionType::WasteLog,
        ] {
            assert_eq!(
                classify(&txn(kind, "2026-01-28"), &line("gl-food"), &ctx),
                Err(Rejection::OutsidePeriod)
            );
            assert_eq!(
                classify(&txn(kind, "2025-12-30"), &line("gl-food"), &ctx),
                Err(Rejection::OutsidePeriod)
            );
        }
    }

    #[test]
    fn test_classify_all_tallies_skips() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let transactions = vec![txn(TransactionType::PurchaseInvoice, "2026-01-08")];

        let mut foreign_a = line("gl-food");
        foreign_a.location_id = Some("loc-x".to_string());
        let foreign_b = foreign_a.clone();
        let mut orphan = line("gl-food");
        orphan.transaction_id = "t-missing".to_string();

        let details = vec![
            line("gl-food"),
            line("gl-rent"),
            foreign_a,
            foreign_b,
            orphan,
        ];
        let outcome = classify_all(&transactions, &details, &ctx);

        assert_eq!(outcome.lines.len(), 1);
        assert_eq!(outcome.skipped.total(), 4);
        assert_eq!(outcome.skipped.get(SkipReason::UnmappedStore), 2);
        assert_eq!(outcome.skipped.get(SkipReason::NonCogsAccount), 1);
        assert_eq!(outcome.skipped.get(SkipReason::OrphanLine), 1);
        assert_eq!(outcome.skipped.get(SkipReason::OutsidePeriod), 0);
        assert_eq!(
            outcome.unmapped_locations.iter().collect::<Vec<_>>(),
            vec!["loc-x"]
        );
    }

    #[test]
    fn test_blank_ids_and_dates_are_skipped() {
        let fx = Fixture::new();
        let ctx = fx.ctx();

        let mut anonymous = txn(TransactionType::PurchaseInvoice, "2026-01-08");
        anonymous.transaction_id = String::new();
        let mut undated = txn(TransactionType::PurchaseInvoice, "2026-01-08");
        undated.transaction_id = "t-2".to_string();
        undated.date = String::new();

        let mut blank_line = line("gl-food");
        blank_line.transaction_id = String::new();
        let mut undated_line = line("gl-food");
        undated_line.transaction_id = "t-2".to_string();

        let outcome = classify_all(&[anonymous, undated], &[blank_line, undated_line], &ctx);
        assert!(outcome.lines.is_empty());
        assert_eq!(outcome.skipped.get(SkipReason::OrphanLine), 1);
        assert_eq!(outcome.skipped.get(SkipReason::MalformedDate), 1);
    }

    #[test]
    fn test_adjustment_types_follow_flags() {
        let mut fx = Fixture::new();
        let mut je_line = line("gl-food");
        je_line.debit = Some(250.0);
        je_line.credit = Some(50.0);
        let je = txn(TransactionType::JournalEntry, "2026-01-05");
        let transfer = txn(TransactionType::ItemTransfer, "2026-01-05");

        assert_eq!(
            classify(&je, &je_line, &fx.ctx()),
            Err(Rejection::ExcludedType(TransactionType::JournalEntry))
        );
        assert_eq!(
            classify(&transfer, &je_line, &fx.ctx()).unwrap_err().reason(),
            SkipReason::ExcludedType
        );

        fx.config.include_journal_entries = true;
        let included = classify(&je, &je_line, &fx.ctx()).unwrap();
        assert_eq!(
            included.fact,
            LineFact::Adjustment {
                source: TransactionType::JournalEntry,
                amount: 200.0
            }
        );
        assert!(classify(&transfer, &je_line, &fx.ctx()).is_err());

        fx.config.include_item_transfers = true;
        assert_eq!(
            classify(&transfer, &je_line, &fx.ctx()).unwrap().fact.flow_type(),
            FlowType::Adjustment
        );
    }
}
