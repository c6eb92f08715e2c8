//! Wire shapes of the accounting OData envelope and the POS API.

use crate::ingestion::DailyFigures;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct ODataPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosAuthRequest {
    pub client_id: String,
    pub client_secret: String,
    pub user_access_type: String,
}

#[derive(Debug, Deserialize)]
pub struct PosAuthResponse {
    pub token: PosToken,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosToken {
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PosOrder {
    #[serde(default)]
    pub voided: bool,
    #[serde(default)]
    pub checks: Vec<PosCheck>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PosCheck {
    #[serde(default)]
    pub voided: bool,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// Business dates arrive either as `20260105` or `"20260105"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BusinessDate {
    Number(u64),
    Text(String),
}

impl BusinessDate {
    pub fn to_date(&self) -> Option<NaiveDate> {
        let raw = match self {
            BusinessDate::Number(n) => n.to_string(),
            BusinessDate::Text(s) => s.trim().to_string(),
        };
        NaiveDate::parse_from_str(&raw, "%Y%m%d")
            .or_else(|_| NaiveDate::parse_from_str(&raw, "%Y-%m-%d"))
            .ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    #[serde(default)]
    pub business_date: Option<BusinessDate>,
    #[serde(default)]
    pub regular_hours: Option<f64>,
    #[serde(default)]
    pub overtime_hours: Option<f64>,
    #[serde(default)]
    pub hourly_wage: Option<f64>,
}

/// Net sales of one page of orders: check amounts of non-voided checks on
/// non-voided orders.
pub fn orders_net_sales(orders: &[PosOrder]) -> f64 {
    orders
        .iter()
        .filter(|order| !order.voided)
        .flat_map(|order| order.checks.iter())
        .filter(|check| !check.voided)
        .map(|check| check.amount.unwrap_or(0.0))
        .sum()
}

/// Labor hours and cost per business date. Entries without a readable date
/// are dropped.
pub fn labor_by_day(entries: &[TimeEntry]) -> BTreeMap<NaiveDate, DailyFigures> {
    let mut days: BTreeMap<NaiveDate, DailyFigures> = BTreeMap::new();

    for entry in entries {
        let Some(date) = entry.business_date.as_ref().and_then(BusinessDate::to_date) else {
            continue;
        };
        let hours = entry.regular_hours.unwrap_or(0.0) + entry.overtime_hours.unwrap_or(0.0);
        let day = days.entry(date).or_default();
        day.labor_hours += hours;
        day.labor_cost += hours * entry.hourly_wage.unwrap_or(0.0);
    }

    days
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voided_orders_and_checks_excluded() {
        let orders: Vec<PosOrder> = serde_json::from_str(
            r#"[
                {"checks": [{"amount": 12.5}, {"amount": 7.5, "voided": true}]},
                {"voided": true, "checks": [{"amount": 100.0}]},
                {"checks": [{"amount": null}, {"amount": 30.0}]}
            ]"#,
        )
        .unwrap();
        assert_eq!(orders_net_sales(&orders), 42.5);
    }

    #[test]
    fn test_labor_by_day() {
        let entries: Vec<TimeEntry> = serde_json::from_str(
            r#"[
                {"businessDate": 20260105, "regularHours": 8.0, "overtimeHours": 1.0, "hourlyWage": 16.0},
                {"businessDate": "20260105", "regularHours": 4.0, "hourlyWage": 15.0},
                {"businessDate": "2026-01-06", "regularHours": 2.0},
                {"regularHours": 9.0, "hourlyWage": 20.0}
            ]"#,
        )
        .unwrap();

        let days = labor_by_day(&entries);
        assert_eq!(days.len(), 2);
        let jan5 = days[&NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()];
        assert_eq!(jan5.labor_hours, 13.0);
        assert_eq!(jan5.labor_cost, 9.0 * 16.0 + 4.0 * 15.0);
        let jan6 = days[&NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()];
        assert_eq!(jan6.labor_cost, 0.0);
    }
}
