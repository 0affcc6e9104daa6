use super::styles;
use chrono::NaiveDate;
use hardiapp::summary::{ActivityKind, CurrencyTotals, DashboardSummary};
use hardiapp::{Currency, Debt, DebtKind, DebtStatus, Purchase, Sale};
use std::fmt::Write;

/// `12,500 IQD` or `12.50 USD`. Dinars have no minor unit in practice.
pub fn money(amount: f64, currency: Currency) -> String {
    let decimals = match currency {
        Currency::Usd => 2,
        Currency::Iqd => 0,
    };
    let text = format!("{:.*}", decimals, amount.abs());
    let (whole, frac) = match text.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 && text.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match frac {
        Some(frac) => format!("{sign}{grouped}.{frac} {currency}"),
        None => format!("{sign}{grouped} {currency}"),
    }
}

fn totals(values: &CurrencyTotals) -> String {
    Currency::ALL
        .iter()
        .map(|c| money(values.get(*c), *c))
        .collect::<Vec<_>>()
        .join("  ")
}

fn status_label(status: DebtStatus) -> String {
    match status {
        DebtStatus::Paid => styles::positive().apply_to("paid").to_string(),
        DebtStatus::Partial => styles::warning().apply_to("partial").to_string(),
        DebtStatus::Unpaid => styles::negative().apply_to("unpaid").to_string(),
    }
}

fn kind_label(kind: DebtKind) -> &'static str {
    match kind {
        DebtKind::OwedToUs => "owed to us",
        DebtKind::WeOwe => "we owe",
    }
}

pub fn sale_line(sale: &Sale) -> String {
    let mut line = format!(
        "{}  {}  {}",
        styles::code().apply_to(&sale.code),
        sale.date,
        styles::amount().apply_to(money(sale.amount, sale.currency)),
    );
    if let Some(note) = &sale.note {
        let _ = write!(line, "  {}", styles::muted().apply_to(note));
    }
    let _ = write!(line, "  {}", styles::muted().apply_to(&sale.id));
    line
}

pub fn purchase_line(purchase: &Purchase) -> String {
    format!(
        "{}  {} x{}  {}  {}",
        purchase.date,
        purchase.product_name,
        purchase.quantity,
        styles::amount().apply_to(money(purchase.total_cost, purchase.currency)),
        styles::muted().apply_to(&purchase.id),
    )
}

pub fn debt_line(debt: &Debt) -> String {
    format!(
        "{}  {}  {}  {} of {} left  {}  {}",
        styles::code().apply_to(&debt.code),
        debt.person_name,
        kind_label(debt.kind),
        styles::amount().apply_to(money(debt.remaining(), debt.currency)),
        money(debt.total_amount, debt.currency),
        status_label(debt.status),
        styles::muted().apply_to(&debt.id),
    )
}

pub fn debt_detail(debt: &Debt) -> String {
    let mut out = debt_line(debt);
    if let Some(phone) = &debt.phone {
        let _ = write!(out, "\n  phone: {phone}");
    }
    if let Some(due) = debt.due_date {
        let _ = write!(out, "\n  due: {due}");
    }
    for payment in &debt.payments {
        let _ = write!(
            out,
            "\n  {}  paid {}",
            payment.date,
            money(payment.amount, payment.currency)
        );
    }
    out
}

pub fn list<T>(items: &[T], empty: &str, line: impl Fn(&T) -> String) -> String {
    if items.is_empty() {
        return format!("{}\n", styles::muted().apply_to(empty));
    }
    let mut out = String::new();
    for item in items {
        out.push_str(&line(item));
        out.push('\n');
    }
    out
}

pub fn summary(
    dashboard: &DashboardSummary,
    daily: Option<(Currency, &[(NaiveDate, f64)])>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        styles::title().apply_to(format!("{} shop, this month", dashboard.store))
    );
    let _ = writeln!(out, "  sales      {}", totals(&dashboard.month_sales));
    let _ = writeln!(out, "  purchases  {}", totals(&dashboard.month_purchases));
    let _ = writeln!(out, "  net        {}", totals(&dashboard.net));
    let _ = writeln!(out, "{}", styles::title().apply_to("Open debts"));
    let _ = writeln!(out, "  owed to us {}", totals(&dashboard.owed_to_us));
    let _ = writeln!(out, "  we owe     {}", totals(&dashboard.we_owe));

    let _ = writeln!(out, "{}", styles::title().apply_to("Recent activity"));
    if dashboard.recent.is_empty() {
        let _ = writeln!(out, "  {}", styles::muted().apply_to("nothing yet"));
    }
    for activity in &dashboard.recent {
        let kind = match activity.kind {
            ActivityKind::Sale => "sale",
            ActivityKind::Purchase => "purchase",
            ActivityKind::Debt => "debt",
        };
        let _ = writeln!(
            out,
            "  {:<8} {}  {}  {}",
            kind,
            activity.date,
            activity.label,
            money(activity.amount, activity.currency)
        );
    }

    if let Some((currency, days)) = daily {
        let title = format!("Daily sales ({currency})");
        let _ = writeln!(out, "{}", styles::title().apply_to(title));
        for (day, total) in days {
            let _ = writeln!(out, "  {}  {}", day, money(*total, currency));
        }
    }
    out
}
