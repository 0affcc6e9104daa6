//! # Hardi CLI
//!
//! A thin terminal client over `hardiapp`. The binary only starts the runtime,
//! invokes `cli::run()` and maps failures to an exit code.
//!
//! ## Workspace Structure
//!
//! - `crates/hardiapp/`: the bookkeeping library (model, repository, storage).
//! - `crates/hardi/`: this CLI, one of several possible UI clients.
//!
//! ## Layering
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/hardi/src/cli/)                    │
//! │  - clap argument parsing (setup.rs)                   │
//! │  - context wiring and dispatch (commands.rs)          │
//! │  - terminal output (render.rs, styles.rs)             │
//! └───────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌───────────────────────────────────────────────────────┐
//! │  Repository (crates/hardiapp/src/repository.rs)       │
//! │  - in-memory dataset, debounced saves                 │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Every invocation is short-lived, so the CLI always closes the repository
//! before exiting: pending changes are written instead of waiting out the
//! debounce window.

mod cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
