#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;
use cosmwasm_std::{
    to_binary, Api, Binary, Deps, DepsMut, Env, MessageInfo, Response, StdError, StdResult,
    Timestamp, Uint128,
};
use std::convert::TryFrom;

use crate::derive::HoldingAddress;
use crate::error::ContractError;
use crate::escrow::{EscrowService, LockRef};
use crate::ledger::{ContractLedger, StoreView};
use crate::msg::{
    ConfigResponse, CreateLockResponse, ExecuteMsg, HoldingAddressResponse, InstantiateMsg,
    LockInfo, LockResponse, LockTarget, LocksResponse, QueryMsg, WithdrawResponse,
};
use crate::state::{Config, LockRecord, CONFIG};

use cw2::set_contract_version;

// version info for migration info
const CONTRACT_NAME: &str = "crates.io:cw-disper-timelock";
const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 30;

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    if msg.denom.is_empty() {
        return Err(StdError::generic_err("denom must not be empty").into());
    }
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    let config = Config {
        denom: msg.denom,
        upkeep_reserve: msg.upkeep_reserve,
        retention: msg.retention.unwrap_or_default(),
    };
    CONFIG.save(deps.storage, &config)?;

    Ok(Response::new()
        .add_attribute("action", "instantiate")
        .add_attribute("denom", config.denom)
        .add_attribute("upkeep_reserve", config.upkeep_reserve))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let escrow = EscrowService::from_config(&env.contract.address, &config);

    match msg {
        ExecuteMsg::CreateLock {
            amount,
            unlock_timestamp,
        } => try_create_lock(deps, env, info, &config, &escrow, amount, unlock_timestamp),
        ExecuteMsg::Withdraw { lock } => try_withdraw(deps, env, info, &config, &escrow, lock),
    }
}

pub fn try_create_lock(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    config: &Config,
    escrow: &EscrowService,
    amount: Uint128,
    unlock_timestamp: Timestamp,
) -> Result<Response, ContractError> {
    let mut ledger = ContractLedger::new(deps, &env, &info, &config.denom)?;
    ledger.check_funds()?;
    let created = escrow.create_lock(&mut ledger, &info.sender, amount, unlock_timestamp)?;
    let refunds = ledger.into_messages();

    let lock = to_lock_info(created.address, created.record);
    let res = Response::new()
        .add_attribute("action", "create_lock")
        .add_attribute("owner", lock.owner.as_str())
        .add_attribute("holding_address", created.address.to_string())
        .add_attribute("amount", lock.amount)
        .add_attribute("unlock_timestamp", lock.unlock_timestamp.seconds().to_string())
        .add_messages(refunds)
        .set_data(to_binary(&CreateLockResponse { lock })?);
    Ok(res)
}

pub fn try_withdraw(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    config: &Config,
    escrow: &EscrowService,
    lock: LockTarget,
) -> Result<Response, ContractError> {
    let target = to_lock_ref(deps.api, lock)?;

    let mut ledger = ContractLedger::new(deps, &env, &info, &config.denom)?;
    let withdrawal = escrow.withdraw(&mut ledger, &info.sender, &target)?;
    // lock checks take precedence over stray coins
    ledger.check_funds()?;
    let payouts = ledger.into_messages();

    let data = WithdrawResponse {
        holding_address: withdrawal.address.to_binary(),
        amount_returned: withdrawal.amount_returned,
        reserve_returned: withdrawal.reserve_returned,
    };
    let res = Response::new()
        .add_attribute("action", "withdraw")
        .add_attribute("owner", withdrawal.owner)
        .add_attribute("holding_address", withdrawal.address.to_string())
        .add_attribute("amount_returned", withdrawal.amount_returned)
        .add_attribute("reserve_returned", withdrawal.reserve_returned)
        .add_messages(payouts)
        .set_data(to_binary(&data)?);
    Ok(res)
}

fn to_lock_ref(api: &dyn Api, lock: LockTarget) -> StdResult<LockRef> {
    match lock {
        LockTarget::Address(address) => Ok(LockRef::Address(HoldingAddress::try_from(&address)?)),
        LockTarget::Key { owner, amount } => Ok(LockRef::Key {
            owner: api.addr_validate(&owner)?,
            amount,
        }),
    }
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Config {} => to_binary(&query_config(deps)?),
        QueryMsg::Lock { address } => to_binary(&query_lock(deps, env, address)?),
        QueryMsg::Locks {
            owner,
            start_after,
            limit,
        } => to_binary(&query_locks(deps, env, owner, start_after, limit)?),
        QueryMsg::AllLocks { start_after, limit } => {
            to_binary(&query_all_locks(deps, env, start_after, limit)?)
        }
        QueryMsg::HoldingAddress { owner, amount } => {
            to_binary(&query_holding_address(deps, env, owner, amount)?)
        }
    }
}

fn query_config(deps: Deps) -> StdResult<ConfigResponse> {
    let config = CONFIG.load(deps.storage)?;
    Ok(ConfigResponse {
        denom: config.denom,
        upkeep_reserve: config.upkeep_reserve,
        retention: config.retention,
    })
}

fn query_lock(deps: Deps, env: Env, address: Binary) -> StdResult<LockResponse> {
    let address = HoldingAddress::try_from(&address)?;
    let escrow = load_escrow(deps, &env)?;
    let view = StoreView::new(deps.storage, &env);

    let lock = escrow
        .get_lock(&view, &address)
        .map_err(into_std)?
        .map(|record| to_lock_info(address, record));
    Ok(LockResponse { lock })
}

fn query_locks(
    deps: Deps,
    env: Env,
    owner: String,
    start_after: Option<Binary>,
    limit: Option<u32>,
) -> StdResult<LocksResponse> {
    let owner_addr = deps.api.addr_validate(&owner)?;
    let start = start_after
        .map(|address| HoldingAddress::try_from(&address))
        .transpose()?;
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;

    let escrow = load_escrow(deps, &env)?;
    let view = StoreView::new(deps.storage, &env);
    let locks: StdResult<Vec<_>> = escrow
        .list_locks(&view, &owner_addr, start)
        .take(limit)
        .map(|entry| {
            entry
                .map(|(address, record)| to_lock_info(address, record))
                .map_err(into_std)
        })
        .collect();

    Ok(LocksResponse { locks: locks? })
}

fn query_all_locks(
    deps: Deps,
    env: Env,
    start_after: Option<Binary>,
    limit: Option<u32>,
) -> StdResult<LocksResponse> {
    let start = start_after
        .map(|address| HoldingAddress::try_from(&address))
        .transpose()?;
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;

    let escrow = load_escrow(deps, &env)?;
    let view = StoreView::new(deps.storage, &env);
    let locks: StdResult<Vec<_>> = escrow
        .list_all_locks(&view, start)
        .take(limit)
        .map(|entry| {
            entry
                .map(|(address, record)| to_lock_info(address, record))
                .map_err(into_std)
        })
        .collect();

    Ok(LocksResponse { locks: locks? })
}

fn query_holding_address(
    deps: Deps,
    env: Env,
    owner: String,
    amount: Uint128,
) -> StdResult<HoldingAddressResponse> {
    let owner_addr = deps.api.addr_validate(&owner)?;
    let escrow = load_escrow(deps, &env)?;
    let view = StoreView::new(deps.storage, &env);

    let preview = escrow
        .preview_address(&view, &owner_addr, amount)
        .map_err(into_std)?;
    Ok(HoldingAddressResponse {
        holding_address: preview.address.to_binary(),
        bump: preview.bump,
        in_use: preview.in_use,
    })
}

fn load_escrow(deps: Deps, env: &Env) -> StdResult<EscrowService> {
    let config = CONFIG.load(deps.storage)?;
    Ok(EscrowService::from_config(&env.contract.address, &config))
}

fn into_std(err: ContractError) -> StdError {
    match err {
        ContractError::Std(error) => error,
        other => StdError::generic_err(other.to_string()),
    }
}

fn to_lock_info(address: HoldingAddress, record: LockRecord) -> LockInfo {
    LockInfo {
        holding_address: address.to_binary(),
        owner: record.owner,
        amount: record.amount,
        unlock_timestamp: record.unlock_timestamp,
        status: record.status,
        bump: record.bump,
        created: record.created,
    }
}
