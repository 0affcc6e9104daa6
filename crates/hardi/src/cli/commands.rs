//! # CLI Layer
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Installs a tracing subscriber
//! - Handles argument parsing
//! - Formats output for human consumption
//!
//! ## Flow
//!
//! 1. Parse arguments and set up logging.
//! 2. Initialize the context (data directory, config, repository).
//! 3. Dispatch to a handler, which returns the text to print.
//! 4. Close the repository, writing any pending change, whatever the outcome.

use super::render;
use super::setup::{Cli, Commands, DebtCommands, OutputFormat, PurchaseCommands, SalesCommands};
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use hardiapp::init::initialize;
use hardiapp::summary;
use hardiapp::{
    Currency, DebtKind, NewDebt, NewPayment, NewPurchase, NewSale, Outcome, Repository, Shop,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "HARDI_LOG";

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = initialize(cli.data_dir.clone()).context("could not set up the data directory")?;
    tracing::debug!(data_dir = %ctx.data_dir.display(), "context ready");

    let state = State {
        repo: ctx.repo.clone(),
        store: cli.store,
        output: cli.output,
    };
    let result = dispatch(&state, cli.command).await;
    drop(state);

    let closed = ctx.repo.close().await.context("could not save changes");
    let output = result?;
    closed?;
    print!("{output}");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("hardi=debug,hardiapp=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // Ignore a second initialization.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

struct State {
    repo: Repository,
    store: Shop,
    output: OutputFormat,
}

impl State {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> Result<String> {
        match self.output {
            OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(value)?)),
            OutputFormat::Text => Ok(text(value)),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn dispatch(state: &State, command: Option<Commands>) -> Result<String> {
    let summary = Commands::Summary {
        daily: None,
        currency: Currency::Iqd,
    };
    match command.unwrap_or(summary) {
        Commands::Summary { daily, currency } => handle_summary(state, daily, currency).await,
        Commands::Sales(cmd) => handle_sales(state, cmd).await,
        Commands::Purchases(cmd) => handle_purchases(state, cmd).await,
        Commands::Debts(cmd) => handle_debts(state, cmd).await,
        Commands::Export { dir } => {
            let path = state.repo.export_to(&dir).await?;
            Ok(format!("Exported to {}\n", path.display()))
        }
        Commands::Import { file } => {
            state
                .repo
                .import_file(&file)
                .await
                .with_context(|| format!("could not import {}", file.display()))?;
            let data = state.repo.get_app_data().await;
            Ok(format!(
                "Imported {} sales, {} purchases and {} debts\n",
                data.sales.len(),
                data.purchases.len(),
                data.debts.len()
            ))
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("this deletes all data for both shops; pass --yes to confirm");
            }
            state.repo.clear_all_data().await?;
            Ok("All data cleared\n".to_string())
        }
    }
}

async fn handle_summary(state: &State, daily: Option<u32>, currency: Currency) -> Result<String> {
    let data = state.repo.get_app_data().await;
    let day = today();
    let dashboard = summary::dashboard(&data, state.store, day);
    let days = daily.map(|n| summary::daily_sales(&data, state.store, currency, day, n));

    match state.output {
        OutputFormat::Json => {
            let value = serde_json::json!({ "dashboard": dashboard, "daily": days });
            Ok(format!("{}\n", serde_json::to_string_pretty(&value)?))
        }
        OutputFormat::Text => Ok(render::summary(
            &dashboard,
            days.as_deref().map(|days| (currency, days)),
        )),
    }
}

fn deleted(outcome: Outcome, what: &str, id: &str) -> Result<String> {
    match outcome {
        Outcome::Removed => Ok(format!("Deleted {what} {id}\n")),
        Outcome::NotFound => bail!("no {what} with id {id}"),
    }
}

fn limited<T>(items: impl Iterator<Item = T>, limit: Option<usize>) -> Vec<T> {
    items.take(limit.unwrap_or(usize::MAX)).collect()
}

async fn handle_sales(state: &State, cmd: SalesCommands) -> Result<String> {
    match cmd {
        SalesCommands::Add {
            amount,
            currency,
            date,
            note,
        } => {
            let sale = state
                .repo
                .add_sale(NewSale {
                    date: date.unwrap_or_else(today),
                    amount,
                    currency,
                    note,
                    store: state.store,
                })
                .await?;
            state.emit(&sale, |s| format!("Added sale {}\n", render::sale_line(s)))
        }
        SalesCommands::List(args) => {
            let data = state.repo.get_app_data().await;
            let sales = limited(data.sales_for(state.store).cloned(), args.limit);
            state.emit(&sales, |s| render::list(s, "No sales.", render::sale_line))
        }
        SalesCommands::Delete { id } => deleted(state.repo.delete_sale(&id).await?, "sale", &id),
    }
}

async fn handle_purchases(state: &State, cmd: PurchaseCommands) -> Result<String> {
    match cmd {
        PurchaseCommands::Add {
            product,
            quantity,
            cost,
            currency,
            date,
        } => {
            let purchase = state
                .repo
                .add_purchase(NewPurchase {
                    date: date.unwrap_or_else(today),
                    product_name: product,
                    quantity,
                    total_cost: cost,
                    currency,
                    store: state.store,
                })
                .await?;
            state.emit(&purchase, |p| {
                format!("Added purchase {}\n", render::purchase_line(p))
            })
        }
        PurchaseCommands::List(args) => {
            let data = state.repo.get_app_data().await;
            let purchases = limited(data.purchases_for(state.store).cloned(), args.limit);
            state.emit(&purchases, |p| {
                render::list(p, "No purchases.", render::purchase_line)
            })
        }
        PurchaseCommands::Delete { id } => {
            deleted(state.repo.delete_purchase(&id).await?, "purchase", &id)
        }
    }
}

async fn handle_debts(state: &State, cmd: DebtCommands) -> Result<String> {
    match cmd {
        DebtCommands::Add {
            kind,
            person,
            amount,
            currency,
            phone,
            date,
            due,
            note,
        } => {
            let debt = state
                .repo
                .add_debt(NewDebt {
                    kind,
                    person_name: person,
                    phone,
                    total_amount: amount,
                    currency,
                    created_date: date.unwrap_or_else(today),
                    due_date: due,
                    note,
                    store: state.store,
                })
                .await?;
            state.emit(&debt, |d| format!("Added debt {}\n", render::debt_line(d)))
        }
        DebtCommands::List { kind, list } => {
            let data = state.repo.get_app_data().await;
            let debts = limited(
                data.debts_for(state.store)
                    .filter(|d| kind.map_or(true, |k| d.kind == k))
                    .cloned(),
                list.limit,
            );
            state.emit(&debts, |d| render::list(d, "No debts.", render::debt_line))
        }
        DebtCommands::Pay {
            id,
            amount,
            date,
            note,
        } => {
            let payment = NewPayment {
                date: date.unwrap_or_else(today),
                amount,
                note,
            };
            match state.repo.add_debt_payment(&id, payment).await? {
                Some(debt) => state.emit(&debt, |d| format!("{}\n", render::debt_detail(d))),
                None => bail!("no debt with id {id}"),
            }
        }
        DebtCommands::Search { query, kind } => {
            let data = state.repo.get_app_data().await;
            let kinds = match kind {
                Some(kind) => vec![kind],
                None => vec![DebtKind::OwedToUs, DebtKind::WeOwe],
            };
            let found: Vec<_> = kinds
                .into_iter()
                .flat_map(|k| data.search_debts(state.store, k, &query))
                .cloned()
                .collect();
            state.emit(&found, |d| {
                render::list(d, "No matching debts.", render::debt_line)
            })
        }
        DebtCommands::Delete { id } => deleted(state.repo.delete_debt(&id).await?, "debt", &id),
    }
}
