//! Records as served by the accounting API.
//!
//! Field names follow the upstream OData views (camelCase). Numeric fields
//! arrive as `null` often enough that they are kept optional here and read
//! through accessors that treat a missing value as zero.

use crate::error::Result;
use crate::fiscal::parse_upstream_date;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum TransactionType {
    #[serde(rename = "AP Invoice", alias = "Purchase Invoice")]
    PurchaseInvoice,

    #[serde(rename = "AP Credit Memo", alias = "Credit Memo")]
    CreditMemo,

    #[serde(rename = "Stock Count")]
    StockCount,

    #[serde(rename = "Waste Log")]
    WasteLog,

    #[serde(rename = "Item Transfer")]
    ItemTransfer,

    #[serde(rename = "Journal Entry")]
    JournalEntry,

    #[serde(other)]
    Other,
}

impl Default for TransactionType {
    fn default() -> Self {
        TransactionType::Other
    }
}

impl TransactionType {
    /// Types pulled for COGS reconciliation, in fetch order.
    pub const COGS_TYPES: [TransactionType; 6] = [
        TransactionType::PurchaseInvoice,
        TransactionType::CreditMemo,
        TransactionType::StockCount,
        TransactionType::WasteLog,
        TransactionType::ItemTransfer,
        TransactionType::JournalEntry,
    ];

    /// The literal used in upstream `$filter` expressions.
    pub fn upstream_name(&self) -> &'static str {
        match self {
            TransactionType::PurchaseInvoice => "AP Invoice",
            TransactionType::CreditMemo => "AP Credit Memo",
            TransactionType::StockCount => "Stock Count",
            TransactionType::WasteLog => "Waste Log",
            TransactionType::ItemTransfer => "Item Transfer",
            TransactionType::JournalEntry => "Journal Entry",
            TransactionType::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction_id: String,

    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub transaction_type: TransactionType,

    /// Raw upstream timestamp; see [`Transaction::business_date`].
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,

    #[serde(default)]
    pub location_id: Option<String>,

    /// Display name. Purchases read "AP Invoice - VENDOR - INVOICE#".
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub is_approved: Option<bool>,
}

impl Transaction {
    pub fn business_date(&self) -> Result<NaiveDate> {
        parse_upstream_date(&self.date)
    }

    pub fn approved(&self) -> bool {
        self.is_approved.unwrap_or(false)
    }

    /// Vendor segment of the display name, `"Unknown"` when the name does not
    /// follow the `TYPE - VENDOR - NUMBER` convention.
    pub fn vendor_name(&self) -> String {
        extract_vendor_name(self.name.as_deref().unwrap_or(""))
    }
}

/// Second `" - "` separated segment of a transaction display name.
pub fn extract_vendor_name(display_name: &str) -> String {
    match display_name.split(" - ").nth(1).map(str::trim) {
        Some(vendor) if !vendor.is_empty() => vendor.to_string(),
        _ => "Unknown".to_string(),
    }
}

/// Keeps the first occurrence of each transaction id, preserving order.
///
/// Overlapping range pulls return the same header more than once.
pub fn dedup_transactions(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let mut seen = HashSet::with_capacity(transactions.len());
    transactions
        .into_iter()
        .filter(|t| seen.insert(t.transaction_id.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RowType {
    Header,
    Detail,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetailLine {
    #[serde(default)]
    pub transaction_detail_id: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction_id: String,

    #[serde(default = "default_row_type")]
    pub row_type: RowType,

    #[serde(default)]
    pub gl_account_id: Option<String>,

    #[serde(default)]
    pub debit: Option<f64>,

    #[serde(default)]
    pub credit: Option<f64>,

    /// Signed amount. For stock counts this is the counted (ending) value.
    #[serde(default)]
    pub amount: Option<f64>,

    #[serde(default)]
    pub quantity: Option<f64>,

    #[serde(default)]
    pub unit_of_measure_name: Option<String>,

    #[serde(default)]
    pub item_id: Option<String>,

    #[serde(default)]
    pub comment: Option<String>,

    /// Overrides the header location when present.
    #[serde(default)]
    pub location_id: Option<String>,

    /// Stock counts only: value of the previous count.
    #[serde(default, rename = "previousCountTotal")]
    pub prior_value: Option<f64>,

    /// Stock counts only: counted minus expected.
    #[serde(default)]
    pub adjustment: Option<f64>,
}

/// Reads an explicit `null` as the field's default. One bad record then
/// surfaces as a skipped line instead of failing the whole page.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_row_type() -> RowType {
    RowType::Other
}

impl TransactionDetailLine {
    pub fn is_detail(&self) -> bool {
        self.row_type == RowType::Detail
    }

    pub fn debit(&self) -> f64 {
        self.debit.unwrap_or(0.0)
    }

    pub fn credit(&self) -> f64 {
        self.credit.unwrap_or(0.0)
    }

    pub fn amount(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }

    pub fn quantity(&self) -> f64 {
        self.quantity.unwrap_or(0.0)
    }

    pub fn ending_value(&self) -> f64 {
        self.amount()
    }

    pub fn prior_value(&self) -> f64 {
        self.prior_value.unwrap_or(0.0)
    }

    pub fn adjustment(&self) -> f64 {
        self.adjustment.unwrap_or(0.0)
    }

    /// Detail location first, then the header's.
    pub fn effective_location<'a>(&'a self, header: &'a Transaction) -> Option<&'a str> {
        self.location_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| header.location_id.as_deref().filter(|id| !id.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, deserialize_with = "null_as_default")]
    pub location_id: String,
    #[serde(default)]
    pub location_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlAccountRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub gl_account_id: String,
    #[serde(default)]
    pub gl_account_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub item_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category1: Option<String>,
    #[serde(default)]
    pub category2: Option<String>,
}
