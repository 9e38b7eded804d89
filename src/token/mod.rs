//! Fixed-supply fungible token ledger.
//!
//! The entire accounting state machine lives here: balances, delegated
//! spending allowances, the immutable token metadata, and the append-only
//! event log observers consume. Every mutating operation is all-or-nothing:
//! it either commits fully and records its event, or returns an error and
//! leaves the ledger untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type AccountId = String;
pub type Amount = u128;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance in account {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        requested: Amount,
        available: Amount,
    },
    #[error("insufficient allowance for spender {spender} from owner {owner}: requested {requested}, remaining {remaining}")]
    InsufficientAllowance {
        owner: AccountId,
        spender: AccountId,
        requested: Amount,
        remaining: Amount,
    },
}

// Adjacently tagged: internally tagged enums buffer fields through an
// intermediate representation that cannot carry u128 amounts back out of
// JSON.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TokenEvent {
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    Approval {
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    },
}

/// The authoritative record of token ownership and spending permissions.
///
/// Absent map entries read as zero. The total supply is fixed at creation;
/// no operation mints or burns afterwards, so the sum of all balances always
/// equals `total_supply`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenLedger {
    name: String,
    symbol: String,
    decimals: u32,
    total_supply: Amount,
    balances: BTreeMap<AccountId, Amount>,
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
    events: Vec<TokenEvent>,
}

impl TokenLedger {
    /// Create a ledger crediting the full initial supply to `creator`.
    pub fn new(
        name: String,
        symbol: String,
        decimals: u32,
        initial_supply: Amount,
        creator: AccountId,
    ) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(creator, initial_supply);
        Self {
            name,
            symbol,
            decimals,
            total_supply: initial_supply,
            balances,
            allowances: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &str) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Remaining amount `spender` may move out of `owner`'s balance.
    pub fn allowance(&self, owner: &str, spender: &str) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Ordered log of every event emitted since creation.
    pub fn events(&self) -> &[TokenEvent] {
        &self.events
    }

    /// Move `amount` from `caller` to `to`.
    ///
    /// Self-transfers and zero amounts succeed and still emit the
    /// `Transfer` event.
    pub fn transfer(
        &mut self,
        caller: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.debit(caller, amount)?;
        self.credit(to, amount);
        self.events.push(TokenEvent::Transfer {
            from: caller.clone(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    /// Authorize `spender` to move up to `amount` out of `caller`'s balance.
    ///
    /// Absolute overwrite: repeated calls replace the prior allowance rather
    /// than adding to it. The allowance may exceed the actual balance.
    pub fn approve(&mut self, caller: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances
            .entry(caller.clone())
            .or_default()
            .insert(spender.clone(), amount);
        self.events.push(TokenEvent::Approval {
            owner: caller.clone(),
            spender: spender.clone(),
            amount,
        });
    }

    /// Move `amount` from `from` to `to` on behalf of `caller`, consuming
    /// that much of the allowance `from` granted to `caller`.
    ///
    /// The allowance is validated before the balance: a short allowance
    /// reports `InsufficientAllowance` even when the balance is also short.
    pub fn transfer_from(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let remaining = self.allowance(from, caller);
        if remaining < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: from.clone(),
                spender: caller.clone(),
                requested: amount,
                remaining,
            });
        }
        self.debit(from, amount)?;
        self.credit(to, amount);
        *self
            .allowances
            .entry(from.clone())
            .or_default()
            .entry(caller.clone())
            .or_insert(0) -= amount;
        self.events.push(TokenEvent::Transfer {
            from: from.clone(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    fn credit(&mut self, account: &AccountId, amount: Amount) {
        *self.balances.entry(account.clone()).or_insert(0) += amount;
    }

    fn debit(&mut self, account: &AccountId, amount: Amount) -> Result<(), TokenError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                account: account.clone(),
                requested: amount,
                available,
            });
        }
        *self.balances.entry(account.clone()).or_insert(0) -= amount;
        Ok(())
    }

    /// Deterministic Sha256 merkle root over the balance and allowance maps.
    pub fn state_root(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> = Vec::new();
        for (account, amount) in &self.balances {
            let mut hasher = Sha256::new();
            hasher.update(b"bal");
            hasher.update(account.as_bytes());
            hasher.update(amount.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
        for (owner, spenders) in &self.allowances {
            for (spender, amount) in spenders {
                let mut hasher = Sha256::new();
                hasher.update(b"allow");
                hasher.update(owner.as_bytes());
                hasher.update(spender.as_bytes());
                hasher.update(amount.to_le_bytes());
                leaves.push(hasher.finalize().into());
            }
        }
        build_merkle(leaves)
    }
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"tokledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
