//! Execution context, logs and pending transfers

use lyra_primitives::{Address, TokenId, H256, U256};

/// The two halves of a two-phase transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxType {
    /// The sender debits and emits an intent
    Send = 1,
    /// The receiver materializes the effect
    Receive = 2,
}

/// Host-supplied context for one `create` or `call`
#[derive(Clone, Debug)]
pub struct Context {
    /// Nesting depth of this invocation
    pub depth: u64,
    /// Which half of the transfer protocol is executing
    pub tx_type: TxType,
    /// Timestamp of the snapshot block this execution observes
    pub snapshot_timestamp: u64,
    /// Height of the snapshot block this execution observes
    pub snapshot_height: u64,
    /// Height of the executing account's chain
    pub account_height: u64,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            depth: 0,
            tx_type: TxType::Send,
            snapshot_timestamp: 0,
            snapshot_height: 0,
            account_height: 0,
        }
    }
}

/// Event emitted by a LOG opcode
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    /// Contract that emitted the log
    pub address: Address,
    /// Log topics (0 to 4)
    pub topics: Vec<H256>,
    /// Log payload
    pub data: Vec<u8>,
    /// Account height at emission
    pub height: u64,
}

/// Outbound transfer queued during execution and surfaced to the host on
/// successful return
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransfer {
    /// Debited account
    pub from: Address,
    /// Credited account
    pub to: Address,
    /// Token family being transferred
    pub token_id: TokenId,
    /// Transfer amount
    pub amount: U256,
    /// Which half of the transfer protocol the queued item starts
    pub tx_type: TxType,
    /// Nesting depth of the queued transfer
    pub depth: u64,
    /// Snapshot height propagated from the emitting context
    pub snapshot_height: u64,
    /// Snapshot timestamp propagated from the emitting context
    pub snapshot_timestamp: u64,
    /// Attached call data
    pub data: Vec<u8>,
}
