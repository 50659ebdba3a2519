use std::convert::TryFrom;
use std::fmt;

use cosmwasm_std::{Addr, Binary, StdError, Uint128};
use sha2::{Digest, Sha256};

/// Seed tag every holding address is derived under.
pub const LOCK_SEED: &[u8] = b"time_lock";

const DOMAIN_MARKER: &[u8] = b"HoldingAddress";

/// Length in bytes of a holding address.
pub const ADDRESS_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HoldingAddress([u8; ADDRESS_LEN]);

impl HoldingAddress {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_binary(self) -> Binary {
        Binary::from(self.0.to_vec())
    }
}

impl TryFrom<&[u8]> for HoldingAddress {
    type Error = StdError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != ADDRESS_LEN {
            return Err(StdError::generic_err(format!(
                "holding address must be {} bytes, got {}",
                ADDRESS_LEN,
                value.len()
            )));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(value);
        Ok(HoldingAddress(bytes))
    }
}

impl TryFrom<&Binary> for HoldingAddress {
    type Error = StdError;

    fn try_from(value: &Binary) -> Result<Self, Self::Error> {
        HoldingAddress::try_from(value.as_slice())
    }
}

impl From<HoldingAddress> for Binary {
    fn from(address: HoldingAddress) -> Binary {
        address.to_binary()
    }
}

impl fmt::Display for HoldingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binary().to_base64())
    }
}

/// Derives holding addresses inside one namespace.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressDeriver {
    namespace: Vec<u8>,
}

impl AddressDeriver {
    pub fn new(namespace: impl Into<Vec<u8>>) -> Self {
        AddressDeriver {
            namespace: namespace.into(),
        }
    }

    /// Namespace bound to the contract instance.
    pub fn for_contract(contract: &Addr) -> Self {
        AddressDeriver::new(contract.as_bytes())
    }

    /// Pure derivation for a fixed bump.
    pub fn derive(&self, owner: &Addr, amount: Uint128, bump: u8) -> HoldingAddress {
        let mut hasher = Sha256::new();
        hasher.update(LOCK_SEED);
        hasher.update((self.namespace.len() as u32).to_be_bytes());
        hasher.update(&self.namespace);
        hasher.update((owner.as_bytes().len() as u32).to_be_bytes());
        hasher.update(owner.as_bytes());
        hasher.update(amount.u128().to_le_bytes());
        hasher.update([bump]);
        hasher.update(DOMAIN_MARKER);
        HoldingAddress(hasher.finalize().into())
    }

    /// Every candidate for `(owner, amount)`, bump ascending from 0.
    ///
    /// Callers walk this until a slot fits; running off the end means the
    /// address space for the key is exhausted.
    pub fn candidates<'a>(
        &'a self,
        owner: &'a Addr,
        amount: Uint128,
    ) -> impl Iterator<Item = (HoldingAddress, u8)> + 'a {
        (0..=u8::MAX).map(move |bump| (self.derive(owner, amount, bump), bump))
    }
}
