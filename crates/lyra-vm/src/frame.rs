//! Call frame

use crate::jumpdest::{self, JumpTable};
use lyra_primitives::{Address, TokenId, H256, U256};
use std::sync::Arc;

/// The activation record of one call or creation
#[derive(Debug)]
pub struct Frame {
    pub(crate) caller: Address,
    pub(crate) address: Address,
    pub(crate) token_id: TokenId,
    pub(crate) amount: U256,
    pub(crate) data: Vec<u8>,
    pub(crate) code: Vec<u8>,
    pub(crate) code_hash: H256,
    pub(crate) code_address: Address,
    pub(crate) jump_table: Arc<JumpTable>,
}

impl Frame {
    /// Create a frame with no code attached yet
    pub fn new(
        caller: Address,
        address: Address,
        token_id: TokenId,
        amount: U256,
        data: Vec<u8>,
    ) -> Self {
        Self {
            caller,
            address,
            token_id,
            amount,
            data,
            code: Vec::new(),
            code_hash: H256::ZERO,
            code_address: Address::ZERO,
            jump_table: Arc::new(JumpTable::default()),
        }
    }

    /// Attach the code this frame executes. The jump table is resolved from
    /// the process-wide cache keyed by `code_hash`.
    pub fn set_code(&mut self, code_address: Address, code_hash: H256, code: Vec<u8>) {
        self.jump_table = jumpdest::jump_table(&code_hash, &code);
        self.code = code;
        self.code_hash = code_hash;
        self.code_address = code_address;
    }

    /// Fetch the opcode byte at `pc`; positions past the end of code read as
    /// STOP
    pub fn get_op(&self, pc: u64) -> u8 {
        self.code.get(pc as usize).copied().unwrap_or(0)
    }

    /// Account the frame executes as
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Account that invoked this frame
    pub fn caller(&self) -> &Address {
        &self.caller
    }

    /// Token family attached to this invocation
    pub fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    /// Account the executing code belongs to
    pub fn code_address(&self) -> &Address {
        &self.code_address
    }

    /// Content hash of the executing code
    pub fn code_hash(&self) -> &H256 {
        &self.code_hash
    }
}
