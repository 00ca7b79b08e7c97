//! The core of the ledger: how bill items are split between users, how
//! expenses and payments fold into balances, and which transfers settle them.
//!
//! Everything here is a pure function over data already loaded by the caller.

mod balance;
mod resolver;
mod settlement;

pub use balance::{aggregate_balances, Balances};
pub use resolver::{resolve_bill, resolve_item};
pub use settlement::{apply_transfers, suggest_settlements};
