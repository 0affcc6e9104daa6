//! # Domain Model: Sales, Purchases and Debts
//!
//! This module defines the records hardi keeps for the shop: [`Sale`], [`Purchase`],
//! [`Debt`] with its owned [`Payment`]s, and the root aggregate [`AppData`].
//!
//! ## Wire Shape
//!
//! Everything is stored and exported as one JSON document that mirrors [`AppData`]:
//!
//! ```text
//! { "sales": [Sale], "purchases": [Purchase], "debts": [Debt] }
//! ```
//!
//! Field names are camelCase (`productName`, `totalCost`, `personName`, ...) because
//! the same document is produced by older versions of the app and handed around as
//! backup files. Optional fields are omitted when absent.
//!
//! ## Ordering
//!
//! Sequences are newest-first: the repository inserts new records at the front, and
//! the stored order is the display order.
//!
//! ## Lenient Reading
//!
//! Data written by older versions may lack fields that are required today, or
//! carry values the current types reject. [`AppData::decode`] reads each record
//! on its own:
//! - A missing, `null` or empty `store` becomes [`Shop::Clothes`].
//! - A missing or `null` sequence becomes empty.
//! - An amount that is `null` (how a `NaN` was written) or not a number reads
//!   as `0`; a numeric string is parsed.
//! - A quantity that is not a whole number of at least 1 is rounded into range.
//! - A missing `payments` list becomes empty and `status` is recomputed by
//!   [`AppData::normalize`].
//! - A record that still cannot be read is left out and counted in
//!   [`Decoded::dropped`]. The rest of the document is kept.
//!
//! ## Debt Status
//!
//! [`DebtStatus`] is never set by callers. It is derived from the payments:
//!
//! | paid                 | status    |
//! |----------------------|-----------|
//! | `paid >= total`      | `paid`    |
//! | `0 < paid < total`   | `partial` |
//! | otherwise            | `unpaid`  |
//!
//! A debt without payments is `unpaid`, whatever its total.
//!
//! Overpayment is allowed; [`Debt::remaining`] goes negative in that case.
//!
//! ## Human Codes
//!
//! Sales and debts get a short code such as `SL-20260110-001`: prefix, the record's
//! own day, and the next free sequence number for that prefix and day.

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use crate::error::{HardiError, Result};

pub const SALE_CODE_PREFIX: &str = "SL";
pub const DEBT_CODE_PREFIX: &str = "DB";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "IQD")]
    Iqd,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Usd, Currency::Iqd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Iqd => "IQD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = HardiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "IQD" => Ok(Currency::Iqd),
            other => Err(HardiError::InvalidInput(format!("unknown currency: {other}"))),
        }
    }
}

/// Which of the two physical shops a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shop {
    #[default]
    Clothes,
    Shoes,
}

impl Shop {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shop::Clothes => "clothes",
            Shop::Shoes => "shoes",
        }
    }
}

impl fmt::Display for Shop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shop {
    type Err = HardiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "clothes" => Ok(Shop::Clothes),
            "shoes" => Ok(Shop::Shoes),
            other => Err(HardiError::InvalidInput(format!("unknown store: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtKind {
    /// Receivable: someone owes the shop.
    OwedToUs,
    /// Payable: the shop owes someone.
    WeOwe,
}

impl FromStr for DebtKind {
    type Err = HardiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "owed_to_us" | "owed-to-us" => Ok(DebtKind::OwedToUs),
            "we_owe" | "we-owe" => Ok(DebtKind::WeOwe),
            other => Err(HardiError::InvalidInput(format!("unknown debt type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

impl DebtStatus {
    pub fn derive(paid: f64, total: f64) -> Self {
        if paid >= total {
            DebtStatus::Paid
        } else if paid > 0.0 {
            DebtStatus::Partial
        } else {
            DebtStatus::Unpaid
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    #[serde(default)]
    pub code: String,
    pub date: NaiveDate,
    #[serde(deserialize_with = "amount_or_zero")]
    pub amount: f64,
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "shop_or_default")]
    pub store: Shop,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub date: NaiveDate,
    pub product_name: String,
    #[serde(deserialize_with = "whole_quantity")]
    pub quantity: u32,
    #[serde(deserialize_with = "amount_or_zero")]
    pub total_cost: f64,
    pub currency: Currency,
    #[serde(default, deserialize_with = "shop_or_default")]
    pub store: Shop,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub date: NaiveDate,
    #[serde(deserialize_with = "amount_or_zero")]
    pub amount: f64,
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(rename = "type")]
    pub kind: DebtKind,
    pub person_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "amount_or_zero")]
    pub total_amount: f64,
    pub currency: Currency,
    pub created_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: DebtStatus,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub payments: Vec<Payment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "shop_or_default")]
    pub store: Shop,
    #[serde(default)]
    pub timestamp: i64,
}

impl Debt {
    pub fn total_paid(&self) -> f64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Negative when the debt has been overpaid.
    pub fn remaining(&self) -> f64 {
        self.total_amount - self.total_paid()
    }

    pub fn refresh_status(&mut self) {
        self.status = if self.payments.is_empty() {
            DebtStatus::Unpaid
        } else {
            DebtStatus::derive(self.total_paid(), self.total_amount)
        };
    }
}

/// The whole dataset of one installation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sales: Vec<Sale>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub purchases: Vec<Purchase>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub debts: Vec<Debt>,
}

/// A document read record by record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub data: AppData,
    /// Records that could not be read and were left out.
    pub dropped: usize,
}

impl AppData {
    /// Parse a stored or exported document, repairing legacy gaps. Unreadable
    /// records are skipped; see [`AppData::decode`].
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self::decode_str(text)?.data)
    }

    pub fn decode_str(text: &str) -> Result<Decoded> {
        Self::decode(serde_json::from_str(text)?)
    }

    /// Read a document one record at a time and normalize the result.
    ///
    /// Fails only when the document is not an object or one of its sequences
    /// is neither an array nor `null`.
    pub fn decode(value: Value) -> Result<Decoded> {
        let Value::Object(mut doc) = value else {
            return Err(HardiError::InvalidSnapshot(
                "expected a JSON object".to_string(),
            ));
        };
        let mut dropped = 0;
        let mut data = AppData {
            sales: records(&mut doc, "sales", &mut dropped)?,
            purchases: records(&mut doc, "purchases", &mut dropped)?,
            debts: records(&mut doc, "debts", &mut dropped)?,
        };
        data.normalize();
        Ok(Decoded { data, dropped })
    }

    /// Re-derive every debt status. Missing stores and sequences are already
    /// repaired while deserializing.
    pub fn normalize(&mut self) {
        for debt in &mut self.debts {
            debt.refresh_status();
        }
    }

    pub fn record_count(&self) -> usize {
        self.sales.len() + self.purchases.len() + self.debts.len()
    }

    pub fn sales_for(&self, shop: Shop) -> impl Iterator<Item = &Sale> {
        self.sales.iter().filter(move |s| s.store == shop)
    }

    pub fn purchases_for(&self, shop: Shop) -> impl Iterator<Item = &Purchase> {
        self.purchases.iter().filter(move |p| p.store == shop)
    }

    pub fn debts_for(&self, shop: Shop) -> impl Iterator<Item = &Debt> {
        self.debts.iter().filter(move |d| d.store == shop)
    }

    pub fn find_debt(&self, id: &str) -> Option<&Debt> {
        self.debts.iter().find(|d| d.id == id)
    }

    /// Debts of one shop and direction whose person name or code contains `query`,
    /// case-insensitively. An empty query matches everything.
    pub fn search_debts(&self, shop: Shop, kind: DebtKind, query: &str) -> Vec<&Debt> {
        let needle = query.trim().to_lowercase();
        self.debts_for(shop)
            .filter(|d| d.kind == kind)
            .filter(|d| {
                needle.is_empty()
                    || d.person_name.to_lowercase().contains(&needle)
                    || d.code.to_lowercase().contains(&needle)
            })
            .collect()
    }
}

// --- Inputs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    pub date: NaiveDate,
    pub amount: f64,
    pub currency: Currency,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub store: Shop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchase {
    pub date: NaiveDate,
    pub product_name: String,
    pub quantity: u32,
    pub total_cost: f64,
    pub currency: Currency,
    #[serde(default)]
    pub store: Shop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDebt {
    #[serde(rename = "type")]
    pub kind: DebtKind,
    pub person_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub total_amount: f64,
    pub currency: Currency,
    pub created_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub store: Shop,
}

/// A payment against an existing debt. The currency always follows the debt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub note: Option<String>,
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(HardiError::InvalidInput(format!(
            "{field} must be a finite number"
        )))
    }
}

impl NewSale {
    pub fn validate(&self) -> Result<()> {
        check_amount("amount", self.amount)
    }
}

impl NewPurchase {
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(HardiError::InvalidInput(
                "quantity must be at least 1".to_string(),
            ));
        }
        check_amount("totalCost", self.total_cost)
    }
}

impl NewDebt {
    pub fn validate(&self) -> Result<()> {
        check_amount("totalAmount", self.total_amount)
    }
}

impl NewPayment {
    pub fn validate(&self) -> Result<()> {
        check_amount("amount", self.amount)
    }
}

// --- Identity helpers ---

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Next code for `prefix` on `date`, one past the highest sequence already used.
/// Codes that do not end in a number (older random suffixes) are ignored.
pub fn next_code<'a>(
    prefix: &str,
    date: NaiveDate,
    existing: impl Iterator<Item = &'a str>,
) -> String {
    let stem = format!("{}-{}-", prefix, date.format("%Y%m%d"));
    let last = existing
        .filter_map(|code| code.strip_prefix(stem.as_str()))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:03}", stem, last + 1)
}

// --- Lenient deserializers ---

fn records<T: DeserializeOwned>(
    doc: &mut Map<String, Value>,
    key: &str,
    dropped: &mut usize,
) -> Result<Vec<T>> {
    let items = match doc.remove(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(HardiError::InvalidSnapshot(format!(
                "\"{key}\" is not an array"
            )))
        }
    };

    let mut kept = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value(item) {
            Ok(record) => kept.push(record),
            Err(err) => {
                warn!(sequence = key, index, error = %err, "skipping unreadable record");
                *dropped += 1;
            }
        }
    }
    Ok(kept)
}

fn loose_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn amount_or_zero<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    match raw.as_ref().and_then(loose_number) {
        Some(amount) => Ok(amount),
        None => {
            warn!(value = ?raw, "unreadable amount read as 0");
            Ok(0.0)
        }
    }
}

fn whole_quantity<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let number = raw.as_ref().and_then(loose_number);
    let quantity = number.map_or(1.0, |n| n.round().clamp(1.0, f64::from(u32::MAX)));
    if number != Some(quantity) {
        warn!(value = ?raw, quantity, "quantity adjusted to a whole number");
    }
    Ok(quantity as u32)
}

fn shop_or_default<'de, D>(deserializer: D) -> std::result::Result<Shop, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Shop::Clothes),
        Some(value) => value.parse().map_err(serde::de::Error::custom),
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
