use std::convert::TryFrom;

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Empty, Order, StdResult, Storage, Timestamp, Uint128};
use cw_storage_plus::{Bound, Item, Map};

use crate::derive::HoldingAddress;

/// What happens to a lock's storage once it is withdrawn.
#[cw_serde]
pub enum Retention {
    /// Close the holding account, delete the record, refund the reserve.
    Reclaim,
    /// Keep the record flagged `Withdrawn`; the reserve stays with it.
    Retain,
}

impl Default for Retention {
    fn default() -> Self {
        Retention::Reclaim
    }
}

#[cw_serde]
pub struct Config {
    /// The single denom locks are held in.
    pub denom: String,
    /// Kept in every holding account on top of the locked amount.
    pub upkeep_reserve: Uint128,
    pub retention: Retention,
}

#[cw_serde]
pub enum LockStatus {
    Active,
    Withdrawn,
}

#[cw_serde]
pub struct LockRecord {
    pub owner: Addr,
    pub amount: Uint128,
    pub unlock_timestamp: Timestamp,
    pub status: LockStatus,
    /// Disambiguator the holding address was derived with.
    pub bump: u8,
    pub created: Timestamp,
}

impl LockRecord {
    pub fn is_active(&self) -> bool {
        self.status == LockStatus::Active
    }

    /// True when this record is the lock of `(owner, amount)`.
    pub fn matches(&self, owner: &Addr, amount: Uint128) -> bool {
        &self.owner == owner && self.amount == amount
    }
}

pub const CONFIG: Item<Config> = Item::new("config");

/// Holding account balances, keyed by holding address.
pub const BALANCES: Map<&[u8], Uint128> = Map::new("balances");
/// Lock records, stored at their holding address.
pub const LOCKS: Map<&[u8], LockRecord> = Map::new("locks");
/// Owner index over `LOCKS`.
pub const OWNER_LOCKS: Map<(&Addr, &[u8]), Empty> = Map::new("owner_locks");

pub fn load_lock(store: &dyn Storage, address: &HoldingAddress) -> StdResult<Option<LockRecord>> {
    LOCKS.may_load(store, address.as_slice())
}

pub fn save_lock(
    store: &mut dyn Storage,
    address: &HoldingAddress,
    record: &LockRecord,
) -> StdResult<()> {
    LOCKS.save(store, address.as_slice(), record)?;
    OWNER_LOCKS.save(store, (&record.owner, address.as_slice()), &Empty {})
}

pub fn remove_lock(store: &mut dyn Storage, address: &HoldingAddress) -> StdResult<()> {
    if let Some(record) = LOCKS.may_load(store, address.as_slice())? {
        OWNER_LOCKS.remove(store, (&record.owner, address.as_slice()));
        LOCKS.remove(store, address.as_slice());
    }
    Ok(())
}

/// Locks of `owner` in ascending address order, starting after `start_after`.
///
/// Lazy: records are loaded as the iterator is pulled.
pub fn locks_by_owner<'a>(
    store: &'a dyn Storage,
    owner: &Addr,
    start_after: Option<HoldingAddress>,
) -> Box<dyn Iterator<Item = StdResult<(HoldingAddress, LockRecord)>> + 'a> {
    let min = start_after.map(|address| Bound::ExclusiveRaw(address.as_slice().to_vec()));
    let keys = OWNER_LOCKS
        .prefix(owner)
        .keys(store, min, None, Order::Ascending);

    Box::new(keys.map(move |key| {
        let key = key?;
        let record = LOCKS.load(store, &key)?;
        Ok((HoldingAddress::try_from(key.as_slice())?, record))
    }))
}

/// Every lock in ascending address order, starting after `start_after`.
pub fn all_locks<'a>(
    store: &'a dyn Storage,
    start_after: Option<HoldingAddress>,
) -> Box<dyn Iterator<Item = StdResult<(HoldingAddress, LockRecord)>> + 'a> {
    let min = start_after.map(|address| Bound::ExclusiveRaw(address.as_slice().to_vec()));
    Box::new(
        LOCKS
            .range(store, min, None, Order::Ascending)
            .map(|item| {
                let (key, record) = item?;
                Ok((HoldingAddress::try_from(key.as_slice())?, record))
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::MockStorage;

    use crate::derive::AddressDeriver;

    fn record(owner: &str, amount: u128) -> LockRecord {
        LockRecord {
            owner: Addr::unchecked(owner),
            amount: Uint128::new(amount),
            unlock_timestamp: Timestamp::from_seconds(100),
            status: LockStatus::Active,
            bump: 0,
            created: Timestamp::from_seconds(0),
        }
    }

    #[test]
    fn save_and_remove_keep_index_in_sync() {
        let mut store = MockStorage::new();
        let deriver = AddressDeriver::new("ns");
        let owner = Addr::unchecked("alice");
        let address = deriver.derive(&owner, Uint128::new(5), 0);

        save_lock(&mut store, &address, &record("alice", 5)).unwrap();
        assert_eq!(Some(record("alice", 5)), load_lock(&store, &address).unwrap());
        assert_eq!(1, locks_by_owner(&store, &owner, None).count());

        remove_lock(&mut store, &address).unwrap();
        assert_eq!(None, load_lock(&store, &address).unwrap());
        assert_eq!(0, locks_by_owner(&store, &owner, None).count());

        // removing twice is harmless
        remove_lock(&mut store, &address).unwrap();
    }

    #[test]
    fn owner_scan_is_scoped_and_restartable() {
        let mut store = MockStorage::new();
        let deriver = AddressDeriver::new("ns");
        let alice = Addr::unchecked("alice");
        let bob = Addr::unchecked("bob");

        for amount in 1..=3u128 {
            let address = deriver.derive(&alice, Uint128::new(amount), 0);
            save_lock(&mut store, &address, &record("alice", amount)).unwrap();
        }
        let address = deriver.derive(&bob, Uint128::new(1), 0);
        save_lock(&mut store, &address, &record("bob", 1)).unwrap();

        let all: Vec<_> = locks_by_owner(&store, &alice, None)
            .collect::<StdResult<_>>()
            .unwrap();
        assert_eq!(3, all.len());
        assert!(all.iter().all(|(_, r)| r.owner == alice));
        assert!(all.windows(2).all(|w| w[0].0 < w[1].0));

        // resume after the first entry
        let rest: Vec<_> = locks_by_owner(&store, &alice, Some(all[0].0))
            .collect::<StdResult<_>>()
            .unwrap();
        assert_eq!(&all[1..], &rest[..]);
    }

    #[test]
    fn full_scan_spans_owners() {
        let mut store = MockStorage::new();
        let deriver = AddressDeriver::new("ns");

        for owner in ["alice", "bob", "carol"] {
            let address = deriver.derive(&Addr::unchecked(owner), Uint128::new(7), 0);
            save_lock(&mut store, &address, &record(owner, 7)).unwrap();
        }

        let all: Vec<_> = all_locks(&store, None).collect::<StdResult<_>>().unwrap();
        assert_eq!(3, all.len());
        assert!(all.windows(2).all(|w| w[0].0 < w[1].0));

        let rest: Vec<_> = all_locks(&store, Some(all[1].0))
            .collect::<StdResult<_>>()
            .unwrap();
        assert_eq!(&all[2..], &rest[..]);
    }
}
