use crate::error::{CogsError, Result};
use crate::fiscal::{chunk_date_range, MAX_UPSTREAM_RANGE_DAYS};
use crate::gateway::retry::{check_status, with_retry, FetchError, RetryPolicy};
use crate::gateway::types::ODataPage;
use crate::gateway::env_var;
use crate::schema::{
    dedup_transactions, GlAccountRecord, ItemRecord, Location, Transaction,
    TransactionDetailLine, TransactionType,
};
use chrono::NaiveDate;
use log::{debug, info};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashSet;

/// OData page size the accounting API serves.
pub const PAGE_SIZE: usize = 5000;

/// Offset of the page after one that started at `skip` and returned
/// `returned` records, or `None` once a short page ends the pull.
fn next_page_offset(skip: usize, returned: usize) -> Option<usize> {
    (returned >= PAGE_SIZE).then_some(skip + PAGE_SIZE)
}

/// Client for the accounting system's OData views. Authenticates with HTTP
/// Basic on every request.
#[derive(Clone)]
pub struct AccountingClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    retry: RetryPolicy,
}

impl AccountingClient {
    pub fn new(base_url: String, username: String, password: String) -> Result<Self> {
        let retry = RetryPolicy::default();
        let client = Client::builder().timeout(retry.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            retry,
        })
    }

    /// Reads `ACCOUNTING_API_BASE`, `ACCOUNTING_API_USER` and
    /// `ACCOUNTING_API_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        Self::new(
            env_var("ACCOUNTING_API_BASE")?,
            env_var("ACCOUNTING_API_USER")?,
            env_var("ACCOUNTING_API_PASSWORD")?,
        )
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &str, operation: &str) -> Result<Vec<T>> {
        // the API rejects '+' for spaces in $filter
        let encoded = url.replace(' ', "%20");
        let url = encoded.as_str();
        let this = self;

        with_retry(&self.retry, operation, move || async move {
            let response = this
                .client
                .get(url)
                .basic_auth(&this.username, Some(&this.password))
                .header("Accept", "application/json")
                .send()
                .await?;
            let response = check_status(response, operation).await?;
            let page: ODataPage<T> = response.json().await?;
            Ok::<_, FetchError>(page.value)
        })
        .await
    }

    /// Follows `$skip` until a short page, however many records that takes.
    async fn get_all<T: DeserializeOwned>(&self, path: &str, operation: &str) -> Result<Vec<T>> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut records = Vec::new();
        let mut skip = 0;

        loop {
            let url = format!(
                "{}/{}{}$top={}&$skip={}",
                self.base_url, path, separator, PAGE_SIZE, skip
            );
            let page: Vec<T> = self.get_page(&url, operation).await?;
            let count = page.len();
            records.extend(page);
            debug!("{}: page at {} returned {} records", operation, skip, count);

            match next_page_offset(skip, count) {
                Some(next) => skip = next,
                None => break,
            }
        }

        debug!("{}: {} records in total", operation, records.len());
        Ok(records)
    }

    pub async fn fetch_locations(&self) -> Result<Vec<Location>> {
        let url = format!("{}/Location", self.base_url);
        let locations: Vec<Location> = self.get_page(&url, "fetch locations").await?;
        info!("Loaded {} locations", locations.len());
        Ok(locations)
    }

    pub async fn fetch_gl_accounts(&self) -> Result<Vec<GlAccountRecord>> {
        let url = format!("{}/GlAccount?$top=1000", self.base_url);
        let accounts: Vec<GlAccountRecord> = self.get_page(&url, "fetch GL accounts").await?;
        info!("Loaded {} GL accounts", accounts.len());
        Ok(accounts)
    }

    pub async fn fetch_items(&self) -> Result<Vec<ItemRecord>> {
        let items: Vec<ItemRecord> = self.get_all("Item", "fetch items").await?;
        info!("Loaded {} items", items.len());
        Ok(items)
    }

    /// Headers of one type dated within `[start, end]`, a range of at most
    /// [`MAX_UPSTREAM_RANGE_DAYS`] days.
    pub async fn fetch_transactions(
        &self,
        transaction_type: TransactionType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let days = (end - start).num_days() + 1;
        if days > MAX_UPSTREAM_RANGE_DAYS {
            return Err(CogsError::DateRangeTooLong {
                start: start.to_string(),
                end: end.to_string(),
                days,
                max: MAX_UPSTREAM_RANGE_DAYS,
            });
        }

        let path = format!(
            "Transaction?$filter=type eq '{}' and date ge {}T00:00:00Z and date le {}T23:59:59Z",
            transaction_type.upstream_name(),
            start,
            end
        );
        let operation = format!("fetch {} {}..{}", transaction_type.upstream_name(), start, end);
        self.get_all(&path, &operation).await
    }

    /// Headers of every listed type over an arbitrary range, pulled in
    /// 31-day chunks and de-duplicated by transaction id.
    pub async fn fetch_transactions_for_range(
        &self,
        types: &[TransactionType],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let mut all = Vec::new();

        for (chunk_start, chunk_end) in chunk_date_range(start, end, MAX_UPSTREAM_RANGE_DAYS) {
            for transaction_type in types {
                let batch = self
                    .fetch_transactions(*transaction_type, chunk_start, chunk_end)
                    .await?;
                info!(
                    "{} {}..{}: {} transactions",
                    transaction_type.upstream_name(),
                    chunk_start,
                    chunk_end,
                    batch.len()
                );
                all.extend(batch);
            }
        }

        let fetched = all.len();
        let deduped = dedup_transactions(all);
        if deduped.len() < fetched {
            debug!("Dropped {} duplicate transactions", fetched - deduped.len());
        }
        Ok(deduped)
    }

    /// Detail lines belonging to `transaction_ids`.
    ///
    /// The detail view cannot be filtered by transaction upstream, so the
    /// whole table is paged through and filtered here.
    pub async fn fetch_transaction_details(
        &self,
        transaction_ids: &HashSet<&str>,
    ) -> Result<Vec<TransactionDetailLine>> {
        let all: Vec<TransactionDetailLine> = self
            .get_all("TransactionDetail", "fetch transaction details")
            .await?;
        let total = all.len();

        let details: Vec<TransactionDetailLine> = all
            .into_iter()
            .filter(|line| transaction_ids.contains(line.transaction_id.as_str()))
            .collect();

        info!(
            "Kept {} of {} detail lines for {} transactions",
            details.len(),
            total,
            transaction_ids.len()
        );
        Ok(details)
    }
}
