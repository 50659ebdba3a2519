#![cfg(test)]

use std::collections::BTreeMap;

use cosmwasm_std::{Addr, Timestamp, Uint128};

use crate::derive::HoldingAddress;
use crate::ledger::{HoldingAccount, Ledger, LedgerError, LedgerView, LockEntries};
use crate::state::LockRecord;

/// In-memory ledger with wallet balances for plain identities.
pub struct MockLedger {
    pub now: Timestamp,
    pub wallets: BTreeMap<Addr, Uint128>,
    pub accounts: BTreeMap<HoldingAddress, HoldingAccount>,
    /// Every mutating call fails with `Unavailable`.
    pub unavailable: bool,
    /// The next `create_account` loses a race against another writer.
    pub conflict_on_create: bool,
}

impl MockLedger {
    pub fn new(now: u64) -> Self {
        MockLedger {
            now: Timestamp::from_seconds(now),
            wallets: BTreeMap::new(),
            accounts: BTreeMap::new(),
            unavailable: false,
            conflict_on_create: false,
        }
    }

    pub fn fund(&mut self, who: &str, amount: u128) -> Addr {
        let addr = Addr::unchecked(who);
        self.wallets.insert(addr.clone(), Uint128::new(amount));
        addr
    }

    pub fn wallet(&self, who: &Addr) -> Uint128 {
        self.wallets.get(who).copied().unwrap_or_default()
    }

    pub fn balance_of(&self, address: &HoldingAddress) -> Option<Uint128> {
        self.accounts.get(address).map(|account| account.balance)
    }

    /// Plants an account with no lock data at `address`.
    pub fn squat(&mut self, address: HoldingAddress, balance: u128) {
        self.accounts.insert(
            address,
            HoldingAccount {
                balance: Uint128::new(balance),
                record: None,
            },
        );
    }

    pub fn advance(&mut self, seconds: u64) {
        self.now = self.now.plus_seconds(seconds);
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable {
            return Err(LedgerError::Unavailable {
                reason: "mock ledger offline".to_string(),
            });
        }
        Ok(())
    }

    fn credit(&mut self, to: &Addr, amount: Uint128) -> Result<(), LedgerError> {
        let wallet = self.wallets.entry(to.clone()).or_default();
        *wallet = wallet.checked_add(amount)?;
        Ok(())
    }
}

impl LedgerView for MockLedger {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn account(&self, address: &HoldingAddress) -> Result<Option<HoldingAccount>, LedgerError> {
        Ok(self.accounts.get(address).cloned())
    }

    fn locks_of<'a>(&'a self, owner: &Addr, start_after: Option<HoldingAddress>) -> LockEntries<'a> {
        let owner = owner.clone();
        Box::new(
            self.accounts
                .iter()
                .filter(move |(address, _)| start_after.map_or(true, |after| **address > after))
                .filter_map(move |(address, account)| match &account.record {
                    Some(record) if record.owner == owner => Some(Ok((*address, record.clone()))),
                    _ => None,
                }),
        )
    }

    fn all_locks(&self, start_after: Option<HoldingAddress>) -> LockEntries<'_> {
        Box::new(
            self.accounts
                .iter()
                .filter(move |(address, _)| start_after.map_or(true, |after| **address > after))
                .filter_map(|(address, account)| {
                    account
                        .record
                        .as_ref()
                        .map(|record| Ok((*address, record.clone())))
                }),
        )
    }
}

impl Ledger for MockLedger {
    fn available(&self, payer: &Addr) -> Uint128 {
        self.wallet(payer)
    }

    fn create_account(
        &mut self,
        address: &HoldingAddress,
        payer: &Addr,
        initial_balance: Uint128,
    ) -> Result<(), LedgerError> {
        self.check_available()?;
        if self.conflict_on_create || self.accounts.contains_key(address) {
            self.conflict_on_create = false;
            return Err(LedgerError::AccountInUse {});
        }
        let available = self.wallet(payer);
        if available < initial_balance {
            return Err(LedgerError::InsufficientFunds {
                needed: initial_balance,
                available,
            });
        }

        self.wallets
            .insert(payer.clone(), available.checked_sub(initial_balance)?);
        self.accounts.insert(
            *address,
            HoldingAccount {
                balance: initial_balance,
                record: None,
            },
        );
        Ok(())
    }

    fn write_record(
        &mut self,
        address: &HoldingAddress,
        record: &LockRecord,
    ) -> Result<(), LedgerError> {
        self.check_available()?;
        let account = self
            .accounts
            .get_mut(address)
            .ok_or(LedgerError::AccountNotFound {})?;
        account.record = Some(record.clone());
        Ok(())
    }

    fn transfer(
        &mut self,
        from: &HoldingAddress,
        to: &Addr,
        amount: Uint128,
    ) -> Result<(), LedgerError> {
        self.check_available()?;
        let account = self
            .accounts
            .get_mut(from)
            .ok_or(LedgerError::AccountNotFound {})?;
        if account.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                needed: amount,
                available: account.balance,
            });
        }
        account.balance = account.balance.checked_sub(amount)?;
        self.credit(to, amount)
    }

    fn close_account(
        &mut self,
        address: &HoldingAddress,
        refund_to: &Addr,
    ) -> Result<Uint128, LedgerError> {
        self.check_available()?;
        let account = self
            .accounts
            .remove(address)
            .ok_or(LedgerError::AccountNotFound {})?;
        self.credit(refund_to, account.balance)?;
        Ok(account.balance)
    }
}
