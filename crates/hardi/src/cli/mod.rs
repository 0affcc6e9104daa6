//! # CLI Behavior
//!
//! This is **one possible UI client** for hardi, not the application itself.
//! It is the only place that knows about terminal I/O, exit codes and output
//! formatting.
//!
//! ## Naked Execution (`hardi`)
//!
//! Running `hardi` with no arguments shows the dashboard summary for the selected
//! shop (`--store`, default `clothes`).
//!
//! ## Output
//!
//! Text output is meant for people. `--output json` prints the same records as
//! JSON, with the field names used by export files.
//!
//! ## Module Structure
//!
//! - `commands`: context setup, dispatch and per-command handlers
//! - `render`: text formatting of records and summaries
//! - `setup`: argument parsing via clap
//! - `styles`: terminal styling

mod commands;
mod render;
pub mod setup;
mod styles;

pub use commands::run;
