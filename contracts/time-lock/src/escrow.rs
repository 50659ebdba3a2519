use cosmwasm_std::{Addr, Timestamp, Uint128};

use crate::derive::{AddressDeriver, HoldingAddress};
use crate::error::ContractError;
use crate::ledger::{Ledger, LedgerView};
use crate::state::{Config, LockRecord, LockStatus, Retention};

/// How a caller names the lock to withdraw.
#[derive(Clone, Debug, PartialEq)]
pub enum LockRef {
    Address(HoldingAddress),
    /// Re-derive the address from the public lock key.
    Key { owner: Addr, amount: Uint128 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreatedLock {
    pub address: HoldingAddress,
    pub record: LockRecord,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Withdrawal {
    pub address: HoldingAddress,
    pub owner: Addr,
    pub amount_returned: Uint128,
    pub reserve_returned: Uint128,
}

/// Where the next lock for a key would go, or where its active lock is.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressPreview {
    pub address: HoldingAddress,
    pub bump: u8,
    pub in_use: bool,
}

struct Located {
    address: HoldingAddress,
    balance: Uint128,
    record: LockRecord,
}

enum Walk {
    Vacant {
        address: HoldingAddress,
        bump: u8,
        passed_tombstone: bool,
    },
    Active(Located),
    Exhausted {
        passed_tombstone: bool,
    },
}

pub struct EscrowService {
    deriver: AddressDeriver,
    upkeep_reserve: Uint128,
    retention: Retention,
}

impl EscrowService {
    pub fn new(deriver: AddressDeriver, upkeep_reserve: Uint128, retention: Retention) -> Self {
        EscrowService {
            deriver,
            upkeep_reserve,
            retention,
        }
    }

    pub fn from_config(contract: &Addr, config: &Config) -> Self {
        EscrowService::new(
            AddressDeriver::for_contract(contract),
            config.upkeep_reserve,
            config.retention.clone(),
        )
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    pub fn create_lock<L: Ledger>(
        &self,
        ledger: &mut L,
        owner: &Addr,
        amount: Uint128,
        unlock_timestamp: Timestamp,
    ) -> Result<CreatedLock, ContractError> {
        let now = ledger.now();
        if unlock_timestamp <= now {
            return Err(ContractError::UnlockTimeInPast {});
        }
        if amount.is_zero() {
            return Err(ContractError::ZeroAmount {});
        }

        let needed = amount.checked_add(self.upkeep_reserve)?;
        let available = ledger.available(owner);
        if available < needed {
            return Err(ContractError::InsufficientFunds { needed, available });
        }

        let (address, bump) = match self.walk(&*ledger, owner, amount)? {
            Walk::Vacant { address, bump, .. } => (address, bump),
            Walk::Active(_) => return Err(ContractError::AddressAlreadyInUse {}),
            Walk::Exhausted { .. } => return Err(ContractError::AddressSpaceExhausted {}),
        };

        // a concurrent creator may have claimed the address since the walk;
        // the ledger's create-if-absent settles it
        ledger.create_account(&address, owner, needed)?;

        let record = LockRecord {
            owner: owner.clone(),
            amount,
            unlock_timestamp,
            status: LockStatus::Active,
            bump,
            created: now,
        };
        ledger.write_record(&address, &record)?;

        Ok(CreatedLock { address, record })
    }

    pub fn withdraw<L: Ledger>(
        &self,
        ledger: &mut L,
        caller: &Addr,
        target: &LockRef,
    ) -> Result<Withdrawal, ContractError> {
        let located = self.locate(&*ledger, target)?;
        let record = &located.record;

        if record.status == LockStatus::Withdrawn {
            return Err(ContractError::AlreadyWithdrawn {});
        }
        if caller != &record.owner {
            return Err(ContractError::Unauthorized {});
        }
        if ledger.now() < record.unlock_timestamp {
            return Err(ContractError::StillLocked {});
        }
        if located.balance < record.amount {
            return Err(ContractError::BalanceShortfall {
                reason: format!(
                    "holding balance {} below locked amount {}",
                    located.balance, record.amount
                ),
            });
        }

        let reserve_returned = match self.retention {
            Retention::Reclaim => {
                let swept = ledger.close_account(&located.address, &record.owner)?;
                swept.checked_sub(record.amount)?
            }
            Retention::Retain => {
                ledger.transfer(&located.address, &record.owner, record.amount)?;
                let closed = LockRecord {
                    status: LockStatus::Withdrawn,
                    ..record.clone()
                };
                ledger.write_record(&located.address, &closed)?;
                Uint128::zero()
            }
        };

        Ok(Withdrawal {
            address: located.address,
            owner: record.owner.clone(),
            amount_returned: record.amount,
            reserve_returned,
        })
    }

    pub fn get_lock<V: LedgerView>(
        &self,
        view: &V,
        address: &HoldingAddress,
    ) -> Result<Option<LockRecord>, ContractError> {
        Ok(view.account(address)?.and_then(|account| account.record))
    }

    /// Locks of `owner`, lazily, ascending by holding address. Resume a scan
    /// by passing the last address seen as `start_after`.
    pub fn list_locks<'a, V: LedgerView>(
        &self,
        view: &'a V,
        owner: &Addr,
        start_after: Option<HoldingAddress>,
    ) -> impl Iterator<Item = Result<(HoldingAddress, LockRecord), ContractError>> + 'a {
        view.locks_of(owner, start_after)
            .map(|entry| entry.map_err(ContractError::from))
    }

    /// Every lock on the ledger, lazily, ascending by holding address.
    pub fn list_all_locks<'a, V: LedgerView>(
        &self,
        view: &'a V,
        start_after: Option<HoldingAddress>,
    ) -> impl Iterator<Item = Result<(HoldingAddress, LockRecord), ContractError>> + 'a {
        view.all_locks(start_after)
            .map(|entry| entry.map_err(ContractError::from))
    }

    pub fn preview_address<V: LedgerView>(
        &self,
        view: &V,
        owner: &Addr,
        amount: Uint128,
    ) -> Result<AddressPreview, ContractError> {
        match self.walk(view, owner, amount)? {
            Walk::Vacant { address, bump, .. } => Ok(AddressPreview {
                address,
                bump,
                in_use: false,
            }),
            Walk::Active(located) => Ok(AddressPreview {
                address: located.address,
                bump: located.record.bump,
                in_use: true,
            }),
            Walk::Exhausted { .. } => Err(ContractError::AddressSpaceExhausted {}),
        }
    }

    fn locate<V: LedgerView>(&self, view: &V, target: &LockRef) -> Result<Located, ContractError> {
        match target {
            LockRef::Address(address) => {
                let account = view
                    .account(address)?
                    .ok_or(ContractError::RecordNotFound {})?;
                let record = account.record.ok_or(ContractError::RecordNotFound {})?;
                Ok(Located {
                    address: *address,
                    balance: account.balance,
                    record,
                })
            }
            LockRef::Key { owner, amount } => match self.walk(view, owner, *amount)? {
                Walk::Active(located) => Ok(located),
                Walk::Vacant {
                    passed_tombstone, ..
                }
                | Walk::Exhausted { passed_tombstone } => {
                    if passed_tombstone {
                        Err(ContractError::AlreadyWithdrawn {})
                    } else {
                        Err(ContractError::RecordNotFound {})
                    }
                }
            },
        }
    }

    /// Walks the candidates of `(owner, amount)` in bump order. Accounts that
    /// are not this key's lock and withdrawn records of this key are stepped
    /// over; the walk stops at the first vacant slot or active lock.
    fn walk<V: LedgerView>(
        &self,
        view: &V,
        owner: &Addr,
        amount: Uint128,
    ) -> Result<Walk, ContractError> {
        let mut passed_tombstone = false;
        for (address, bump) in self.deriver.candidates(owner, amount) {
            let account = match view.account(&address)? {
                None => {
                    return Ok(Walk::Vacant {
                        address,
                        bump,
                        passed_tombstone,
                    })
                }
                Some(account) => account,
            };
            match account.record {
                Some(record) if record.matches(owner, amount) => {
                    if record.is_active() {
                        return Ok(Walk::Active(Located {
                            address,
                            balance: account.balance,
                            record,
                        }));
                    }
                    passed_tombstone = true;
                }
                _ => {}
            }
        }
        Ok(Walk::Exhausted { passed_tombstone })
    }
}
