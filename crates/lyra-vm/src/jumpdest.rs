//! Jump destination analysis

use crate::opcode;
use lyra_primitives::{H256, U256};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

/// The set of valid jump destinations for one code blob
#[derive(Debug, Default)]
pub struct JumpTable {
    dests: HashSet<u64>,
}

impl JumpTable {
    /// Scan code for JUMPDEST markers, treating PUSH immediates as data
    pub fn analyze(code: &[u8]) -> Self {
        let mut dests = HashSet::new();
        let mut pc = 0usize;
        while pc < code.len() {
            let op = code[pc];
            if op == opcode::JUMPDEST {
                dests.insert(pc as u64);
            }
            pc += 1 + opcode::push_bytes(op);
        }
        JumpTable { dests }
    }

    /// Whether `dest` is a valid jump target
    pub fn has(&self, dest: U256) -> bool {
        if dest > U256::from(u64::MAX) {
            return false;
        }
        self.dests.contains(&dest.low_u64())
    }

    /// Number of valid destinations
    pub fn len(&self) -> usize {
        self.dests.len()
    }

    /// Whether the code has no valid destinations
    pub fn is_empty(&self) -> bool {
        self.dests.is_empty()
    }
}

// Analyses are shared process-wide, keyed by code hash. Entries are
// immutable once published; the lock guards insertion only.
static CACHE: LazyLock<Mutex<HashMap<H256, Arc<JumpTable>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Fetch the memoized jump table for `code`, analyzing and publishing it on
/// first use
pub fn jump_table(code_hash: &H256, code: &[u8]) -> Arc<JumpTable> {
    let mut cache = CACHE.lock();
    if let Some(table) = cache.get(code_hash) {
        return Arc::clone(table);
    }
    let table = Arc::new(JumpTable::analyze(code));
    cache.insert(*code_hash, Arc::clone(&table));
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_crypto::hash256;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_analyze_simple() {
        // JUMPDEST, STOP, JUMPDEST
        let table = JumpTable::analyze(&[0x5B, 0x00, 0x5B]);
        assert!(table.has(u(0)));
        assert!(!table.has(u(1)));
        assert!(table.has(u(2)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_analyze_skips_push_immediates() {
        // PUSH1 0x5B, JUMPDEST: the immediate byte at offset 1 is data
        let table = JumpTable::analyze(&[0x60, 0x5B, 0x5B]);
        assert!(!table.has(u(1)));
        assert!(table.has(u(2)));
    }

    #[test]
    fn test_analyze_skips_push32_immediates() {
        // PUSH32 of 32 JUMPDEST bytes, then a real JUMPDEST
        let mut code = vec![0x7F];
        code.extend([0x5B; 32]);
        code.push(0x5B);
        let table = JumpTable::analyze(&code);
        assert_eq!(table.len(), 1);
        assert!(table.has(u(33)));
    }

    #[test]
    fn test_analyze_truncated_push() {
        // PUSH2 with one byte of immediate left at code end
        let table = JumpTable::analyze(&[0x61, 0x5B]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_has_out_of_range() {
        let table = JumpTable::analyze(&[0x5B]);
        assert!(table.has(u(0)));
        assert!(!table.has(u(1)));
        assert!(!table.has(U256::max_value()));
    }

    #[test]
    fn test_cache_shares_analysis() {
        let code = [0x5B, 0x00];
        let hash = hash256(&code);
        let a = jump_table(&hash, &code);
        let b = jump_table(&hash, &code);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.has(u(0)));
    }
}
