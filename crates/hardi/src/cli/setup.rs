use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use hardiapp::{Currency, DebtKind, Shop};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "hardi", bin_name = "hardi", version, disable_help_subcommand = true)]
#[command(about = "Offline bookkeeping for a clothes and shoes shop", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Which shop to work on (clothes or shoes)
    #[arg(short, long, global = true, default_value = "clothes", help_heading = "Options")]
    pub store: Shop,

    /// Data directory (defaults to HARDI_DATA, then the OS data directory)
    #[arg(long, global = true, value_name = "DIR", help_heading = "Options")]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text, help_heading = "Options")]
    pub output: OutputFormat,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dashboard: this month's totals, open debts and recent activity
    #[command(display_order = 1)]
    Summary {
        /// Also show daily sales for this many days
        #[arg(long, value_name = "DAYS")]
        daily: Option<u32>,
        /// Currency of the daily sales lines
        #[arg(long, short, default_value = "IQD")]
        currency: Currency,
    },

    /// Record and review sales
    #[command(subcommand, display_order = 2)]
    Sales(SalesCommands),

    /// Record and review inventory purchases
    #[command(subcommand, display_order = 3)]
    Purchases(PurchaseCommands),

    /// Track what customers owe and what the shop owes
    #[command(subcommand, display_order = 4)]
    Debts(DebtCommands),

    /// Write a backup file of all data
    #[command(display_order = 10)]
    Export {
        /// Directory to write into
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Replace all data with a backup file
    #[command(display_order = 11)]
    Import { file: PathBuf },

    /// Delete all data, for both shops
    #[command(display_order = 12)]
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show at most this many entries
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum SalesCommands {
    /// Record a sale
    Add {
        #[arg(long)]
        amount: f64,
        #[arg(long, short)]
        currency: Currency,
        /// Day of the sale, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        note: Option<String>,
    },
    #[command(alias = "ls")]
    List(ListArgs),
    #[command(alias = "rm")]
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum PurchaseCommands {
    /// Record an inventory purchase
    Add {
        #[arg(long)]
        product: String,
        #[arg(long, short, default_value_t = 1)]
        quantity: u32,
        /// Total cost of the whole purchase
        #[arg(long)]
        cost: f64,
        #[arg(long, short)]
        currency: Currency,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    #[command(alias = "ls")]
    List(ListArgs),
    #[command(alias = "rm")]
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum DebtCommands {
    /// Open a new debt
    Add {
        /// owed_to_us (a customer owes the shop) or we_owe (the shop owes someone)
        #[arg(long = "type", short = 't')]
        kind: DebtKind,
        #[arg(long)]
        person: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, short)]
        currency: Currency,
        #[arg(long)]
        phone: Option<String>,
        /// Day the debt was created (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long)]
        note: Option<String>,
    },
    #[command(alias = "ls")]
    List {
        #[arg(long = "type", short = 't')]
        kind: Option<DebtKind>,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Record a payment against a debt (in the debt's currency)
    Pay {
        id: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Find debts by person name or code
    Search {
        query: String,
        #[arg(long = "type", short = 't')]
        kind: Option<DebtKind>,
    },
    #[command(alias = "rm")]
    Delete { id: String },
}
