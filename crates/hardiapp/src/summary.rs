//! Dashboard figures for one shop, computed from a dataset snapshot.

use crate::model::{AppData, Currency, DebtKind, Shop};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

/// How many entries the activity feed shows.
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CurrencyTotals {
    pub usd: f64,
    pub iqd: f64,
}

impl CurrencyTotals {
    pub fn get(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Usd => self.usd,
            Currency::Iqd => self.iqd,
        }
    }

    fn add(&mut self, currency: Currency, amount: f64) {
        match currency {
            Currency::Usd => self.usd += amount,
            Currency::Iqd => self.iqd += amount,
        }
    }

    fn minus(self, other: CurrencyTotals) -> CurrencyTotals {
        CurrencyTotals {
            usd: self.usd - other.usd,
            iqd: self.iqd - other.iqd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Sale,
    Purchase,
    Debt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub kind: ActivityKind,
    pub id: String,
    /// Sale or debt code, product name for purchases.
    pub label: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub currency: Currency,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub store: Shop,
    pub month_sales: CurrencyTotals,
    pub month_purchases: CurrencyTotals,
    /// Month sales minus month purchases.
    pub net: CurrencyTotals,
    /// Outstanding balance of payables (can go negative when overpaid).
    pub we_owe: CurrencyTotals,
    /// Outstanding balance of receivables.
    pub owed_to_us: CurrencyTotals,
    pub recent: Vec<Activity>,
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

pub fn dashboard(data: &AppData, store: Shop, today: NaiveDate) -> DashboardSummary {
    let mut month_sales = CurrencyTotals::default();
    for sale in data.sales_for(store).filter(|s| same_month(s.date, today)) {
        month_sales.add(sale.currency, sale.amount);
    }

    let mut month_purchases = CurrencyTotals::default();
    for purchase in data
        .purchases_for(store)
        .filter(|p| same_month(p.date, today))
    {
        month_purchases.add(purchase.currency, purchase.total_cost);
    }

    let mut we_owe = CurrencyTotals::default();
    let mut owed_to_us = CurrencyTotals::default();
    for debt in data.debts_for(store) {
        let bucket = match debt.kind {
            DebtKind::WeOwe => &mut we_owe,
            DebtKind::OwedToUs => &mut owed_to_us,
        };
        bucket.add(debt.currency, debt.remaining());
    }

    DashboardSummary {
        store,
        month_sales,
        month_purchases,
        net: month_sales.minus(month_purchases),
        we_owe,
        owed_to_us,
        recent: recent_activity(data, store, RECENT_ACTIVITY_LIMIT),
    }
}

/// Newest records of every kind, by creation timestamp.
pub fn recent_activity(data: &AppData, store: Shop, limit: usize) -> Vec<Activity> {
    let sales = data.sales_for(store).map(|s| Activity {
        kind: ActivityKind::Sale,
        id: s.id.clone(),
        label: s.code.clone(),
        date: s.date,
        amount: s.amount,
        currency: s.currency,
        timestamp: s.timestamp,
    });
    let purchases = data.purchases_for(store).map(|p| Activity {
        kind: ActivityKind::Purchase,
        id: p.id.clone(),
        label: p.product_name.clone(),
        date: p.date,
        amount: p.total_cost,
        currency: p.currency,
        timestamp: p.timestamp,
    });
    let debts = data.debts_for(store).map(|d| Activity {
        kind: ActivityKind::Debt,
        id: d.id.clone(),
        label: d.code.clone(),
        date: d.created_date,
        amount: d.total_amount,
        currency: d.currency,
        timestamp: d.timestamp,
    });

    let mut all: Vec<Activity> = sales.chain(purchases).chain(debts).collect();
    all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    all.truncate(limit);
    all
}

/// Sales per day for the `days` days ending at `end`, oldest first.
pub fn daily_sales(
    data: &AppData,
    store: Shop,
    currency: Currency,
    end: NaiveDate,
    days: u32,
) -> Vec<(NaiveDate, f64)> {
    (0..days)
        .rev()
        .map(|back| {
            let day = end - Duration::days(i64::from(back));
            let total = data
                .sales_for(store)
                .filter(|s| s.date == day && s.currency == currency)
                .map(|s| s.amount)
                .sum();
            (day, total)
        })
        .collect()
}
