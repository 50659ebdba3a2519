use cosmwasm_std::{
    Addr, BankMsg, Coin, DepsMut, Env, MessageInfo, OverflowError, QuerierWrapper, StdError,
    Storage, Timestamp, Uint128,
};
use thiserror::Error;

use crate::derive::HoldingAddress;
use crate::error::ContractError;
use crate::state::{self, LockRecord, BALANCES};

#[derive(Error, Debug, PartialEq)]
pub enum LedgerError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("{0}")]
    Overflow(#[from] OverflowError),

    #[error("Account already exists")]
    AccountInUse {},

    #[error("Account does not exist")]
    AccountNotFound {},

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Uint128, available: Uint128 },

    #[error("Ledger unavailable: {reason}")]
    Unavailable { reason: String },

    /// Funds the books say exist are not there.
    #[error("Balance shortfall: {reason}")]
    Shortfall { reason: String },
}

/// A live account at a holding address.
#[derive(Clone, Debug, PartialEq)]
pub struct HoldingAccount {
    pub balance: Uint128,
    /// `None` for accounts that carry no lock data.
    pub record: Option<LockRecord>,
}

pub type LockEntries<'a> =
    Box<dyn Iterator<Item = Result<(HoldingAddress, LockRecord), LedgerError>> + 'a>;

/// Read side of the ledger.
pub trait LedgerView {
    fn now(&self) -> Timestamp;

    fn account(&self, address: &HoldingAddress) -> Result<Option<HoldingAccount>, LedgerError>;

    /// Lock records owned by `owner`, ascending by address, after `start_after`.
    fn locks_of<'a>(&'a self, owner: &Addr, start_after: Option<HoldingAddress>)
        -> LockEntries<'a>;

    /// Every lock record, ascending by address, after `start_after`.
    fn all_locks(&self, start_after: Option<HoldingAddress>) -> LockEntries<'_>;
}

/// Mutating side of the ledger.
pub trait Ledger: LedgerView {
    /// Funds `payer` can put into new accounts right now.
    fn available(&self, payer: &Addr) -> Uint128;

    /// Creates `address` funded with `initial_balance` from `payer`.
    /// Fails if the address is live or the payer cannot cover it.
    fn create_account(
        &mut self,
        address: &HoldingAddress,
        payer: &Addr,
        initial_balance: Uint128,
    ) -> Result<(), LedgerError>;

    /// Stores `record` as the data of an existing account.
    fn write_record(
        &mut self,
        address: &HoldingAddress,
        record: &LockRecord,
    ) -> Result<(), LedgerError>;

    fn transfer(
        &mut self,
        from: &HoldingAddress,
        to: &Addr,
        amount: Uint128,
    ) -> Result<(), LedgerError>;

    /// Sweeps the whole balance to `refund_to` and deletes the account with
    /// its data. Returns the swept amount.
    fn close_account(
        &mut self,
        address: &HoldingAddress,
        refund_to: &Addr,
    ) -> Result<Uint128, LedgerError>;
}

fn load_account(
    store: &dyn Storage,
    address: &HoldingAddress,
) -> Result<Option<HoldingAccount>, LedgerError> {
    let balance = match BALANCES.may_load(store, address.as_slice())? {
        Some(balance) => balance,
        None => return Ok(None),
    };
    let record = state::load_lock(store, address)?;
    Ok(Some(HoldingAccount { balance, record }))
}

fn scan_locks<'a>(
    store: &'a dyn Storage,
    owner: &Addr,
    start_after: Option<HoldingAddress>,
) -> LockEntries<'a> {
    Box::new(state::locks_by_owner(store, owner, start_after).map(|item| item.map_err(Into::into)))
}

fn scan_all_locks(store: &dyn Storage, start_after: Option<HoldingAddress>) -> LockEntries<'_> {
    Box::new(state::all_locks(store, start_after).map(|item| item.map_err(Into::into)))
}

/// Read-only ledger over contract storage, for queries.
pub struct StoreView<'a> {
    storage: &'a dyn Storage,
    now: Timestamp,
}

impl<'a> StoreView<'a> {
    pub fn new(storage: &'a dyn Storage, env: &Env) -> Self {
        StoreView {
            storage,
            now: env.block.time,
        }
    }
}

impl<'a> LedgerView for StoreView<'a> {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn account(&self, address: &HoldingAddress) -> Result<Option<HoldingAccount>, LedgerError> {
        load_account(self.storage, address)
    }

    fn locks_of<'b>(&'b self, owner: &Addr, start_after: Option<HoldingAddress>) -> LockEntries<'b> {
        scan_locks(self.storage, owner, start_after)
    }

    fn all_locks(&self, start_after: Option<HoldingAddress>) -> LockEntries<'_> {
        scan_all_locks(self.storage, start_after)
    }
}

/// Ledger backed by contract storage and the bank module.
///
/// Funds of the configured denom attached to the message are the sender's
/// spendable balance. Whatever is left of them when the ledger is turned
/// into messages goes back to the sender. Coins of any other denom are
/// only reported by [`ContractLedger::check_funds`], so the caller picks
/// where that rejection sits among its own checks.
pub struct ContractLedger<'a> {
    storage: &'a mut dyn Storage,
    querier: QuerierWrapper<'a>,
    contract: Addr,
    denom: String,
    now: Timestamp,
    payer: Addr,
    deposit: Uint128,
    foreign_denom: Option<String>,
    paid_out: Uint128,
    messages: Vec<BankMsg>,
}

impl<'a> ContractLedger<'a> {
    pub fn new(
        deps: DepsMut<'a>,
        env: &Env,
        info: &MessageInfo,
        denom: &str,
    ) -> Result<Self, ContractError> {
        let mut deposit = Uint128::zero();
        let mut foreign_denom = None;
        for coin in info.funds.iter() {
            if coin.denom == denom {
                deposit = deposit.checked_add(coin.amount)?;
            } else if foreign_denom.is_none() {
                foreign_denom = Some(coin.denom.clone());
            }
        }

        Ok(ContractLedger {
            storage: deps.storage,
            querier: deps.querier,
            contract: env.contract.address.clone(),
            denom: denom.to_string(),
            now: env.block.time,
            payer: info.sender.clone(),
            deposit,
            foreign_denom,
            paid_out: Uint128::zero(),
            messages: vec![],
        })
    }

    /// Fails if the message carried coins other than the configured denom.
    pub fn check_funds(&self) -> Result<(), ContractError> {
        match &self.foreign_denom {
            Some(denom) => Err(ContractError::UnsupportedDenom {
                denom: denom.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Bank sends for every payout, plus the refund of unspent deposit.
    pub fn into_messages(mut self) -> Vec<BankMsg> {
        if !self.deposit.is_zero() {
            let refund = BankMsg::Send {
                to_address: self.payer.to_string(),
                amount: vec![Coin {
                    denom: self.denom.clone(),
                    amount: self.deposit,
                }],
            };
            self.messages.push(refund);
        }
        self.messages
    }

    fn pay(&mut self, to: &Addr, amount: Uint128) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }

        let pool = self
            .querier
            .query_balance(&self.contract, &self.denom)
            .map_err(|err| LedgerError::Unavailable {
                reason: err.to_string(),
            })?;
        let needed = self.paid_out.checked_add(amount)?;
        if pool.amount < needed {
            return Err(LedgerError::Shortfall {
                reason: format!("bank holds {} {}, payouts need {}", pool.amount, self.denom, needed),
            });
        }

        self.paid_out = needed;
        self.messages.push(BankMsg::Send {
            to_address: to.to_string(),
            amount: vec![Coin {
                denom: self.denom.clone(),
                amount,
            }],
        });
        Ok(())
    }

    fn live_balance(&self, address: &HoldingAddress) -> Result<Uint128, LedgerError> {
        BALANCES
            .may_load(&*self.storage, address.as_slice())?
            .ok_or(LedgerError::AccountNotFound {})
    }
}

impl<'a> LedgerView for ContractLedger<'a> {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn account(&self, address: &HoldingAddress) -> Result<Option<HoldingAccount>, LedgerError> {
        load_account(&*self.storage, address)
    }

    fn locks_of<'b>(&'b self, owner: &Addr, start_after: Option<HoldingAddress>) -> LockEntries<'b> {
        scan_locks(&*self.storage, owner, start_after)
    }

    fn all_locks(&self, start_after: Option<HoldingAddress>) -> LockEntries<'_> {
        scan_all_locks(&*self.storage, start_after)
    }
}

impl<'a> Ledger for ContractLedger<'a> {
    fn available(&self, payer: &Addr) -> Uint128 {
        if payer == &self.payer {
            self.deposit
        } else {
            Uint128::zero()
        }
    }

    fn create_account(
        &mut self,
        address: &HoldingAddress,
        payer: &Addr,
        initial_balance: Uint128,
    ) -> Result<(), LedgerError> {
        if BALANCES.has(&*self.storage, address.as_slice()) {
            return Err(LedgerError::AccountInUse {});
        }
        let available = self.available(payer);
        if available < initial_balance {
            return Err(LedgerError::InsufficientFunds {
                needed: initial_balance,
                available,
            });
        }

        self.deposit = available.checked_sub(initial_balance)?;
        BALANCES.save(self.storage, address.as_slice(), &initial_balance)?;
        Ok(())
    }

    fn write_record(
        &mut self,
        address: &HoldingAddress,
        record: &LockRecord,
    ) -> Result<(), LedgerError> {
        self.live_balance(address)?;
        state::save_lock(self.storage, address, record)?;
        Ok(())
    }

    fn transfer(
        &mut self,
        from: &HoldingAddress,
        to: &Addr,
        amount: Uint128,
    ) -> Result<(), LedgerError> {
        let balance = self.live_balance(from)?;
        if balance < amount {
            return Err(LedgerError::InsufficientFunds {
                needed: amount,
                available: balance,
            });
        }

        self.pay(to, amount)?;
        BALANCES.save(self.storage, from.as_slice(), &balance.checked_sub(amount)?)?;
        Ok(())
    }

    fn close_account(
        &mut self,
        address: &HoldingAddress,
        refund_to: &Addr,
    ) -> Result<Uint128, LedgerError> {
        let balance = self.live_balance(address)?;

        self.pay(refund_to, balance)?;
        BALANCES.remove(self.storage, address.as_slice());
        state::remove_lock(self.storage, address)?;
        Ok(balance)
    }
}
