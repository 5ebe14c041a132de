mod account;
mod ledger;
mod money;
mod purchase;
mod transaction;

pub use account::*;
pub use ledger::*;
pub use money::*;
pub use purchase::*;
pub use transaction::*;
