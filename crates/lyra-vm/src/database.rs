//! Host state facade

use lyra_crypto::hash256;
use lyra_primitives::{Address, TokenId, H256, U256};
use std::collections::HashMap;

/// State operations the VM consumes from its host.
///
/// Snapshot ids are opaque handles; the VM never restores to an id taken
/// before its own outer snapshot, and never to a superseded one. The host is
/// responsible for its own locking if it services multiple VMs.
pub trait Database {
    /// Current balance of `addr` in `token`; never negative
    fn balance(&self, addr: &Address, token: &TokenId) -> U256;

    /// Debit `amount` from `addr`. The VM checks the precondition before
    /// calling.
    fn sub_balance(&mut self, addr: &Address, token: &TokenId, amount: U256);

    /// Credit `amount` to `addr`
    fn add_balance(&mut self, addr: &Address, token: &TokenId, amount: U256);

    /// Take a snapshot of the current state and return its handle
    fn snapshot(&mut self) -> usize;

    /// Restore state exactly to the snapshot `id`
    fn revert_to_snapshot(&mut self, id: usize);

    /// Whether an account exists at `addr`
    fn exists(&self, addr: &Address) -> bool;

    /// Create an empty account at `addr`
    fn create_account(&mut self, addr: &Address);

    /// Remove the account at `addr`
    fn delete_account(&mut self, addr: &Address);

    /// Store contract code for `addr`
    fn set_contract_code(&mut self, addr: &Address, code: &[u8]);

    /// Fetch the contract code of `addr` (empty if none)
    fn get_contract_code(&self, addr: &Address) -> Vec<u8>;

    /// Content hash of the contract code of `addr` (zero if none)
    fn get_contract_code_hash(&self, addr: &Address) -> H256;

    /// Read the 32-byte storage slot `key` of `addr` (zero if unset)
    fn get_state(&self, addr: &Address, key: &H256) -> H256;

    /// Write the 32-byte storage slot `key` of `addr`
    fn set_state(&mut self, addr: &Address, key: &H256, value: H256);

    /// Hash of the block at `height`. Only heights within 256 blocks of the
    /// current snapshot height are queried.
    fn get_block_hash(&self, height: u64) -> H256;

    /// Derive a fresh contract address, or `None` on derivation failure
    fn new_contract_address(&mut self) -> Option<Address>;
}

#[derive(Clone, Debug, Default)]
struct Account {
    balances: HashMap<TokenId, U256>,
    code: Vec<u8>,
    code_hash: H256,
    storage: HashMap<H256, H256>,
}

/// In-memory [`Database`] with whole-state snapshots, for tests and tools.
///
/// Snapshots clone the full account map; `revert_to_snapshot` discards every
/// snapshot taken after the restored one, so superseded ids cannot be
/// restored to.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    accounts: HashMap<Address, Account>,
    snapshots: Vec<HashMap<Address, Account>>,
    block_hashes: HashMap<u64, H256>,
    address_seed: u64,
}

impl MemoryDatabase {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance directly, bypassing transfer checks
    pub fn set_balance(&mut self, addr: &Address, token: &TokenId, amount: U256) {
        self.accounts
            .entry(*addr)
            .or_default()
            .balances
            .insert(*token, amount);
    }

    /// Record a block hash for `get_block_hash`
    pub fn set_block_hash(&mut self, height: u64, hash: H256) {
        self.block_hashes.insert(height, hash);
    }

    /// The address the next `new_contract_address` call will derive.
    /// Derivation depends only on an internal counter, so tests can predict
    /// collisions.
    pub fn peek_contract_address(&self) -> Address {
        Self::derive_address(self.address_seed)
    }

    fn derive_address(seed: u64) -> Address {
        let digest = hash256(&seed.to_be_bytes());
        Address::from_word(digest.to_word())
    }
}

impl Database for MemoryDatabase {
    fn balance(&self, addr: &Address, token: &TokenId) -> U256 {
        self.accounts
            .get(addr)
            .and_then(|acc| acc.balances.get(token))
            .copied()
            .unwrap_or_default()
    }

    fn sub_balance(&mut self, addr: &Address, token: &TokenId, amount: U256) {
        let balance = self
            .accounts
            .entry(*addr)
            .or_default()
            .balances
            .entry(*token)
            .or_default();
        *balance = balance.saturating_sub(amount);
    }

    fn add_balance(&mut self, addr: &Address, token: &TokenId, amount: U256) {
        let balance = self
            .accounts
            .entry(*addr)
            .or_default()
            .balances
            .entry(*token)
            .or_default();
        *balance = balance.saturating_add(amount);
    }

    fn snapshot(&mut self) -> usize {
        self.snapshots.push(self.accounts.clone());
        self.snapshots.len() - 1
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        if id < self.snapshots.len() {
            self.accounts = self.snapshots[id].clone();
            self.snapshots.truncate(id);
        }
    }

    fn exists(&self, addr: &Address) -> bool {
        self.accounts.contains_key(addr)
    }

    fn create_account(&mut self, addr: &Address) {
        self.accounts.entry(*addr).or_default();
    }

    fn delete_account(&mut self, addr: &Address) {
        self.accounts.remove(addr);
    }

    fn set_contract_code(&mut self, addr: &Address, code: &[u8]) {
        let account = self.accounts.entry(*addr).or_default();
        account.code = code.to_vec();
        account.code_hash = hash256(code);
    }

    fn get_contract_code(&self, addr: &Address) -> Vec<u8> {
        self.accounts
            .get(addr)
            .map(|acc| acc.code.clone())
            .unwrap_or_default()
    }

    fn get_contract_code_hash(&self, addr: &Address) -> H256 {
        self.accounts
            .get(addr)
            .map(|acc| acc.code_hash)
            .unwrap_or(H256::ZERO)
    }

    fn get_state(&self, addr: &Address, key: &H256) -> H256 {
        self.accounts
            .get(addr)
            .and_then(|acc| acc.storage.get(key))
            .copied()
            .unwrap_or(H256::ZERO)
    }

    fn set_state(&mut self, addr: &Address, key: &H256, value: H256) {
        self.accounts
            .entry(*addr)
            .or_default()
            .storage
            .insert(*key, value);
    }

    fn get_block_hash(&self, height: u64) -> H256 {
        self.block_hashes.get(&height).copied().unwrap_or(H256::ZERO)
    }

    fn new_contract_address(&mut self) -> Option<Address> {
        let addr = Self::derive_address(self.address_seed);
        self.address_seed += 1;
        Some(addr)
    }
}
