use crate::error::{CogsError, Result};
use crate::gateway::env_var;
use crate::gateway::retry::{check_status, with_retry, FetchError, RetryPolicy};
use crate::gateway::types::{
    labor_by_day, orders_net_sales, PosAuthRequest, PosAuthResponse, PosOrder, TimeEntry,
};
use crate::ingestion::DailyFigures;
use chrono::NaiveDate;
use log::{debug, info};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

pub const ORDERS_PAGE_SIZE: usize = 100;

const RESTAURANT_HEADER: &str = "Toast-Restaurant-External-ID";

/// Rejected token requests are credential problems; 429 and 5xx stay
/// transient and are retried.
fn token_request_error(error: FetchError) -> FetchError {
    match error {
        FetchError::Fatal(CogsError::Upstream { message, .. }) => FetchError::Fatal(
            CogsError::Authentication(format!("POS token request failed ({})", message)),
        ),
        other => other,
    }
}

/// Point-of-sale API client holding a bearer token for the run.
#[derive(Clone)]
pub struct PosClient {
    client: Client,
    api_base: String,
    token: String,
    retry: RetryPolicy,
}

impl PosClient {
    pub async fn authenticate(
        auth_url: &str,
        api_base: &str,
        client_id: String,
        client_secret: String,
    ) -> Result<Self> {
        let retry = RetryPolicy::default();
        let client = Client::builder().timeout(retry.request_timeout).build()?;

        let request = PosAuthRequest {
            client_id,
            client_secret,
            user_access_type: "TOAST_MACHINE_CLIENT".to_string(),
        };

        let operation = "POS token request";
        let (http, request) = (&client, &request);
        let auth: PosAuthResponse = with_retry(&retry, operation, move || async move {
            let response = http.post(auth_url).json(request).send().await?;
            let response = check_status(response, operation)
                .await
                .map_err(token_request_error)?;
            let auth: PosAuthResponse = response.json().await?;
            Ok::<_, FetchError>(auth)
        })
        .await?;
        info!("Authenticated with POS API");

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: auth.token.access_token,
            retry,
        })
    }

    /// Reads `POS_AUTH_URL`, `POS_API_BASE`, `POS_CLIENT_ID` and
    /// `POS_CLIENT_SECRET`.
    pub async fn from_env() -> Result<Self> {
        Self::authenticate(
            &env_var("POS_AUTH_URL")?,
            &env_var("POS_API_BASE")?,
            env_var("POS_CLIENT_ID")?,
            env_var("POS_CLIENT_SECRET")?,
        )
        .await
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        restaurant_guid: &str,
        operation: &str,
    ) -> Result<T> {
        let this = self;
        with_retry(&self.retry, operation, move || async move {
            let response = this
                .client
                .get(url)
                .bearer_auth(&this.token)
                .header(RESTAURANT_HEADER, restaurant_guid)
                .send()
                .await?;
            let response = check_status(response, operation).await?;
            let body: T = response.json().await?;
            Ok::<_, FetchError>(body)
        })
        .await
    }

    /// Net sales for one business day across every page of orders.
    pub async fn net_sales_for_day(&self, restaurant_guid: &str, date: NaiveDate) -> Result<f64> {
        let business_date = date.format("%Y%m%d").to_string();
        let operation = format!("fetch orders {}", date);
        let mut total = 0.0;
        let mut page = 1;

        loop {
            let url = format!(
                "{}/orders/v2/ordersBulk?businessDate={}&pageSize={}&page={}",
                self.api_base, business_date, ORDERS_PAGE_SIZE, page
            );
            let orders: Vec<PosOrder> = self.get(&url, restaurant_guid, &operation).await?;
            total += orders_net_sales(&orders);

            if orders.len() < ORDERS_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!("{} net sales on {}: {:.2}", restaurant_guid, date, total);
        Ok(total)
    }

    /// Labor hours and cost per business date within `[start, end]`.
    pub async fn labor_for_range(
        &self,
        restaurant_guid: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DailyFigures>> {
        let url = format!(
            "{}/labor/v1/timeEntries?startDate={}T00%3A00%3A00.000%2B0000&endDate={}T23%3A59%3A59.000%2B0000",
            self.api_base, start, end
        );
        let operation = format!("fetch time entries {}..{}", start, end);
        let entries: Vec<TimeEntry> = self.get(&url, restaurant_guid, &operation).await?;

        // shifts crossing midnight can report an earlier business date
        let mut days = labor_by_day(&entries);
        days.retain(|date, _| *date >= start && *date <= end);
        Ok(days)
    }

    /// Sales and labor for each of `days`, fetched oldest first.
    pub async fn daily_figures(
        &self,
        restaurant_guid: &str,
        days: &[NaiveDate],
    ) -> Result<BTreeMap<NaiveDate, DailyFigures>> {
        let mut figures = BTreeMap::new();
        let (Some(first), Some(last)) = (days.iter().min(), days.iter().max()) else {
            return Ok(figures);
        };

        let labor = self.labor_for_range(restaurant_guid, *first, *last).await?;

        let mut ordered = days.to_vec();
        ordered.sort();
        for day in ordered {
            let net_sales = self.net_sales_for_day(restaurant_guid, day).await?;
            let day_labor = labor.get(&day).copied().unwrap_or_default();
            figures.insert(
                day,
                DailyFigures {
                    net_sales,
                    labor_hours: day_labor.labor_hours,
                    labor_cost: day_labor.labor_cost,
                },
            );
        }

        Ok(figures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn test_rejected_token_request_is_an_authentication_error() {
        let rejected = token_request_error(FetchError::Fatal(CogsError::Upstream {
            operation: "POS token request".to_string(),
            attempts: 1,
            message: "status 400 Bad Request: invalid client".to_string(),
        }));
        assert!(matches!(
            rejected,
            FetchError::Fatal(CogsError::Authentication(ref m)) if m.contains("invalid client")
        ));

        let throttled = token_request_error(FetchError::Transient("status 429".to_string()));
        assert!(matches!(throttled, FetchError::Transient(_)));
    }

    #[tokio::test]
    async fn test_throttled_token_request_is_retried() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::ZERO,
            ..Default::default()
        };
        let calls = AtomicU32::new(0);

        let token = with_retry(&policy, "POS token request", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(token_request_error(FetchError::Transient(
                    "status 429 Too Many Requests".to_string(),
                )));
            }
            Ok::<_, FetchError>("token".to_string())
        })
        .await
        .unwrap();

        assert_eq!(token, "token");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
