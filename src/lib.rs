pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod io;
pub mod logging;
pub mod storage;

pub use application::{PurchaseOrchestrator, WalletError, WalletService};
pub use domain::*;
pub use storage::{LedgerStore, MemoryLedgerStore, SqliteLedgerStore};
