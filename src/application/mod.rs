// Application layer - use cases and orchestration over the ledger store

pub mod error;
pub mod purchase;
pub mod wallet;

pub use error::*;
pub use purchase::*;
pub use wallet::*;
