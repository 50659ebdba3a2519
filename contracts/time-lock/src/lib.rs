pub mod contract;
pub mod derive;
mod error;
pub mod escrow;
pub mod ledger;
mod mock;
pub mod msg;
pub mod state;

pub use crate::error::ContractError;
