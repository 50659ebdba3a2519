use cosmwasm_std::{OverflowError, StdError, Uint128};
use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("{0}")]
    Overflow(#[from] OverflowError),

    #[error("Unlock timestamp must be in the future")]
    UnlockTimeInPast {},

    #[error("Lock amount must be at least one unit")]
    ZeroAmount {},

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Uint128, available: Uint128 },

    #[error("Denom {denom} cannot be locked")]
    UnsupportedDenom { denom: String },

    #[error("Holding address already in use")]
    AddressAlreadyInUse {},

    #[error("No free holding address left for this lock")]
    AddressSpaceExhausted {},

    #[error("Time lock not found")]
    RecordNotFound {},

    #[error("Time lock already withdrawn")]
    AlreadyWithdrawn {},

    #[error("You are not authorized to withdraw from this time lock")]
    Unauthorized {},

    #[error("Funds are still locked")]
    StillLocked {},

    #[error("Ledger unavailable: {reason}")]
    LedgerUnavailable { reason: String },

    #[error("Balance shortfall: {reason}")]
    BalanceShortfall { reason: String },
}

impl From<LedgerError> for ContractError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Std(error) => ContractError::Std(error),
            LedgerError::Overflow(error) => ContractError::Overflow(error),
            LedgerError::AccountInUse {} => ContractError::AddressAlreadyInUse {},
            LedgerError::AccountNotFound {} => ContractError::RecordNotFound {},
            LedgerError::InsufficientFunds { needed, available } => {
                ContractError::InsufficientFunds { needed, available }
            }
            LedgerError::Unavailable { reason } => ContractError::LedgerUnavailable { reason },
            LedgerError::Shortfall { reason } => ContractError::BalanceShortfall { reason },
        }
    }
}

impl ContractError {
    /// Only transient infrastructure failures are worth resubmitting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ContractError::LedgerUnavailable { .. })
    }
}
