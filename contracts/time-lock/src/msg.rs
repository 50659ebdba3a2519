use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Binary, Timestamp, Uint128};

use crate::state::{LockStatus, Retention};

#[cw_serde]
pub struct InstantiateMsg {
    /// The only denom that can be locked
    pub denom: String,
    /// Kept in each holding account on top of the locked amount
    pub upkeep_reserve: Uint128,
    /// Defaults to `reclaim`
    pub retention: Option<Retention>,
}

#[cw_serde]
pub enum ExecuteMsg {
    /// Lock `amount` until `unlock_timestamp`. Send `amount + upkeep_reserve`
    /// of the configured denom; any surplus is refunded.
    CreateLock {
        amount: Uint128,
        unlock_timestamp: Timestamp,
    },
    /// Pay a lock back to its owner once it has unlocked
    Withdraw { lock: LockTarget },
}

#[cw_serde]
pub enum LockTarget {
    /// Holding address returned by `create_lock`
    Address(Binary),
    /// Re-derive the holding address from its public key
    Key { owner: String, amount: Uint128 },
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(ConfigResponse)]
    Config {},
    /// Returns the lock stored at a holding address, if any
    #[returns(LockResponse)]
    Lock { address: Binary },
    /// Returns the locks of an owner, paginated by holding address
    #[returns(LocksResponse)]
    Locks {
        owner: String,
        start_after: Option<Binary>,
        limit: Option<u32>,
    },
    /// Returns every lock, paginated by holding address
    #[returns(LocksResponse)]
    AllLocks {
        start_after: Option<Binary>,
        limit: Option<u32>,
    },
    /// Returns where a lock for `(owner, amount)` lives or would be created
    #[returns(HoldingAddressResponse)]
    HoldingAddress { owner: String, amount: Uint128 },
}

#[cw_serde]
pub struct ConfigResponse {
    pub denom: String,
    pub upkeep_reserve: Uint128,
    pub retention: Retention,
}

#[cw_serde]
pub struct LockInfo {
    pub holding_address: Binary,
    pub owner: Addr,
    pub amount: Uint128,
    pub unlock_timestamp: Timestamp,
    pub status: LockStatus,
    pub bump: u8,
    pub created: Timestamp,
}

#[cw_serde]
pub struct LockResponse {
    pub lock: Option<LockInfo>,
}

#[cw_serde]
pub struct LocksResponse {
    pub locks: Vec<LockInfo>,
}

#[cw_serde]
pub struct HoldingAddressResponse {
    pub holding_address: Binary,
    pub bump: u8,
    /// An active lock already sits at this address
    pub in_use: bool,
}

/// Set as response data of `create_lock`
#[cw_serde]
pub struct CreateLockResponse {
    pub lock: LockInfo,
}

/// Set as response data of `withdraw`
#[cw_serde]
pub struct WithdrawResponse {
    pub holding_address: Binary,
    pub amount_returned: Uint128,
    pub reserve_returned: Uint128,
}
