use crate::classifier::STOCK_COUNT_GRACE_DAYS;
use crate::config::ReportConfig;
use crate::error::Result;
use crate::fiscal::FiscalPeriod;
use crate::gateway::accounting::AccountingClient;
use crate::gateway::pos::PosClient;
use crate::ingestion::{Budget, DailySeries, SalesCache};
use crate::schema::TransactionType;
use crate::stores::{Store, StoreRegistry};
use crate::PeriodInputs;
use chrono::{Duration, NaiveDate};
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};

/// Collects everything a reporting run needs from upstream.
pub struct UpstreamPipeline<'a> {
    config: &'a ReportConfig,
    accounting: AccountingClient,
    pos: Option<PosClient>,
    cache: Option<SalesCache>,
}

impl<'a> UpstreamPipeline<'a> {
    pub fn new(config: &'a ReportConfig, accounting: AccountingClient) -> Self {
        Self {
            config,
            accounting,
            pos: None,
            cache: None,
        }
    }

    pub fn with_pos(mut self, pos: PosClient) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn with_cache(mut self, cache: SalesCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Transaction types worth pulling under the current inclusion flags.
    pub fn transaction_types(&self) -> Vec<TransactionType> {
        TransactionType::COGS_TYPES
            .into_iter()
            .filter(|t| match t {
                TransactionType::JournalEntry => self.config.include_journal_entries,
                TransactionType::ItemTransfer => self.config.include_item_transfers,
                _ => true,
            })
            .collect()
    }

    pub async fn collect(
        &self,
        period: &FiscalPeriod,
        as_of: NaiveDate,
        budget: Option<Budget>,
    ) -> Result<PeriodInputs> {
        info!(
            "Collecting upstream data for {} as of {}",
            period.key(),
            as_of
        );

        let (locations, gl_accounts, items) = futures::try_join!(
            self.accounting.fetch_locations(),
            self.accounting.fetch_gl_accounts(),
            self.accounting.fetch_items(),
        )?;

        // lookback days before the period, grace day after it
        let fetch_start =
            period.start - Duration::days(i64::from(self.config.stock_count_lookback_days));
        let fetch_end = period.end + Duration::days(STOCK_COUNT_GRACE_DAYS);
        let transactions = self
            .accounting
            .fetch_transactions_for_range(&self.transaction_types(), fetch_start, fetch_end)
            .await?;

        let ids: HashSet<&str> = transactions
            .iter()
            .map(|t| t.transaction_id.as_str())
            .collect();
        let details = self.accounting.fetch_transaction_details(&ids).await?;

        let sales = self.collect_sales(period, as_of).await?;

        Ok(PeriodInputs {
            transactions,
            details,
            locations,
            gl_accounts,
            items,
            sales,
            budget,
        })
    }

    /// Daily POS figures for every store with a POS id, from the period start
    /// through yesterday, at most `max_concurrent_stores` stores at a time.
    pub async fn collect_sales(
        &self,
        period: &FiscalPeriod,
        as_of: NaiveDate,
    ) -> Result<BTreeMap<String, DailySeries>> {
        let Some(pos) = &self.pos else {
            warn!("No POS client configured; sales and labor will be empty");
            return Ok(BTreeMap::new());
        };

        let data_end = (as_of - Duration::days(1)).min(period.end);
        if data_end < period.start {
            return Ok(BTreeMap::new());
        }

        let registry = StoreRegistry::new(&self.config.stores, &[]);
        let stores: Vec<&Store> = registry
            .stores()
            .filter(|store| {
                if store.pos_guid.is_none() {
                    warn!("Store {} has no POS id; sales unavailable", store.code);
                }
                store.pos_guid.is_some()
            })
            .collect();

        let cache_key = period.key();
        let results: Vec<(String, DailySeries)> = stream::iter(stores)
            .map(|store| self.store_series(pos, store, &cache_key, period.start, data_end, as_of))
            .buffer_unordered(self.config.max_concurrent_stores.max(1))
            .try_collect()
            .await?;

        Ok(results.into_iter().collect())
    }

    async fn store_series(
        &self,
        pos: &PosClient,
        store: &Store,
        cache_key: &str,
        start: NaiveDate,
        end: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<(String, DailySeries)> {
        let guid = store.pos_guid.as_deref().unwrap_or_default();

        let cached = match &self.cache {
            Some(cache) => cache.load(cache_key, &store.code)?,
            None => DailySeries::new(),
        };
        let (to_fetch, mut series) = SalesCache::plan(&cached, start, end, as_of);
        let from_cache = series.len();

        let fetched = pos.daily_figures(guid, &to_fetch).await?;
        series.extend(fetched);

        info!(
            "{} {}: {} days ({} cached, {} pulled)",
            store.code,
            store.name,
            series.len(),
            from_cache,
            to_fetch.len()
        );

        if let Some(cache) = &self.cache {
            let mut merged = cached;
            merged.extend(series.iter().map(|(d, f)| (*d, *f)));
            cache.save(cache_key, &store.code, &merged)?;
        }

        Ok((store.code.to_string(), series))
    }
}
