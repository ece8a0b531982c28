//! The virtual machine: quota accounting, the interpreter loop and the
//! outer `create`/`call` transaction frames

use crate::context::{Context, Log, PendingTransfer, TxType};
use crate::database::Database;
use crate::error::{VmError, VmResult};
use crate::frame::Frame;
use crate::gas::{self, cost};
use crate::memory::Memory;
use crate::opcode;
use crate::stack::Stack;
use crate::table::INSTRUCTION_SET;
use crate::word;
use lyra_crypto::hash256;
use lyra_primitives::{Address, TokenId, U256};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Cloneable handle that aborts a running execution from any thread.
///
/// The interpreter polls the flag at every dispatch boundary; once set, the
/// run terminates with the out-of-quota sentinel and the outer frame
/// reverts.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of a `create` transaction
#[derive(Debug)]
pub struct CreateOutcome {
    /// Address of the deployed contract (receive phase, on success)
    pub contract_address: Option<Address>,
    /// Quota consumed, refund-adjusted
    pub quota_used: u64,
    /// Logs emitted during execution
    pub logs: Vec<Log>,
    /// Outbound transfers queued during execution
    pub transfers: Vec<PendingTransfer>,
    /// The failure, if any
    pub error: Option<VmError>,
}

/// Result of a `call` transaction
#[derive(Debug)]
pub struct CallOutcome {
    /// Bytes returned by the contract (receive phase, on success)
    pub output: Vec<u8>,
    /// Quota consumed, refund-adjusted
    pub quota_used: u64,
    /// Logs emitted during execution
    pub logs: Vec<Log>,
    /// Outbound transfers queued during execution
    pub transfers: Vec<PendingTransfer>,
    /// The failure, if any
    pub error: Option<VmError>,
}

/// A single-execution virtual machine bound to a host state facade
pub struct Vm<'a> {
    pub(crate) ctx: Context,
    pub(crate) db: &'a mut dyn Database,
    abort: Arc<AtomicBool>,
    quota_left: u64,
    quota_refund: u64,
    logs: Vec<Log>,
    transfers: Vec<PendingTransfer>,
    return_data: Vec<u8>,
}

// Fee schedule not finalized; creation currently charges no service fee
// beyond the intrinsic cost.
fn create_contract_fee() -> U256 {
    U256::zero()
}

impl<'a> Vm<'a> {
    /// Create a VM for one transaction against `db`
    pub fn new(ctx: Context, db: &'a mut dyn Database) -> Self {
        Self {
            ctx,
            db,
            abort: Arc::new(AtomicBool::new(false)),
            quota_left: 0,
            quota_refund: 0,
            logs: Vec::new(),
            transfers: Vec::new(),
            return_data: Vec::new(),
        }
    }

    /// Handle for cancelling this VM from another thread
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            flag: Arc::clone(&self.abort),
        }
    }

    /// Bytes recorded by the most recent RETURN or REVERT
    pub fn return_data(&self) -> &[u8] {
        &self.return_data
    }

    /// Execute a contract-creation transaction.
    ///
    /// In the send phase (tx_type 1) the sender is debited `amount` plus the
    /// creation fee. In the receive phase (tx_type 2) a fresh contract
    /// account is created, credited, and the init code in `data` runs; its
    /// return value is stored as the contract's code.
    pub fn create(
        &mut self,
        from: Address,
        data: Vec<u8>,
        token_id: TokenId,
        amount: U256,
    ) -> CreateOutcome {
        let quota_init = cost::TX_QUOTA_LIMIT;
        self.quota_left = quota_init;
        debug!(tx_type = ?self.ctx.tx_type, depth = self.ctx.depth, "create");

        let intrinsic = match gas::intrinsic_gas_cost(&data, true) {
            Ok(cost) => cost,
            Err(e) => return self.finish_create(None, 0, Some(e)),
        };
        if self.use_quota(intrinsic).is_err() {
            return self.finish_create(None, 0, Some(VmError::OutOfQuota));
        }

        match self.ctx.tx_type {
            TxType::Send => {
                let create_fee = create_contract_fee();
                if !self.can_transfer(&from, &token_id, amount, create_fee) {
                    let used = self.quota_used(quota_init);
                    return self.finish_create(None, used, Some(VmError::InsufficientBalance));
                }
                self.db.sub_balance(&from, &token_id, amount);
                self.db.sub_balance(&from, &TokenId::NATIVE, create_fee);
                let used = self.quota_used(quota_init);
                self.finish_create(None, used, None)
            }
            TxType::Receive => {
                // fails before any state change
                if self.ctx.depth > cost::MAX_CALL_DEPTH {
                    let used = self.quota_used(quota_init);
                    return self.finish_create(None, used, Some(VmError::Depth));
                }

                let contract_address = match self.db.new_contract_address() {
                    Some(addr) if !self.db.exists(&addr) => addr,
                    _ => {
                        let used = self.quota_used(quota_init);
                        return self.finish_create(
                            None,
                            used,
                            Some(VmError::ContractAddressCreationFail),
                        );
                    }
                };

                let outer = self.db.snapshot();
                self.db.create_account(&contract_address);
                self.db.add_balance(&contract_address, &token_id, amount);
                let inner = self.db.snapshot();

                let mut frame =
                    Frame::new(from, contract_address, token_id, amount, Vec::new());
                let code_hash = hash256(&data);
                frame.set_code(contract_address, code_hash, data);

                let result = self.run(&mut frame).and_then(|code| {
                    let code_cost = code.len() as u64 * cost::CONTRACT_CODE_BYTE;
                    self.use_quota(code_cost)?;
                    Ok(code)
                });

                match result {
                    Ok(code) => {
                        self.db.set_contract_code(&contract_address, &code);
                        let used = self.quota_used(quota_init);
                        self.finish_create(Some(contract_address), used, None)
                    }
                    Err(e @ VmError::ExecutionReverted(_)) => {
                        // the inner snapshot keeps the account and its credit
                        self.db.revert_to_snapshot(inner);
                        let used = self.quota_used(quota_init);
                        self.finish_create(None, used, Some(e))
                    }
                    Err(VmError::OutOfQuota) => {
                        self.db.revert_to_snapshot(outer);
                        self.clear_run_effects();
                        self.finish_create(None, quota_init, Some(VmError::OutOfQuota))
                    }
                    Err(e) => {
                        self.db.revert_to_snapshot(outer);
                        self.clear_run_effects();
                        if !amount.is_zero() {
                            self.queue_refund(contract_address, from, token_id, amount);
                        }
                        let used = self.quota_used(quota_init);
                        self.finish_create(None, used, Some(e))
                    }
                }
            }
        }
    }

    /// Execute a call transaction.
    ///
    /// In the send phase (tx_type 1) the sender is debited. In the receive
    /// phase (tx_type 2) the recipient is credited and its code runs with
    /// `data` as call data.
    pub fn call(
        &mut self,
        from: Address,
        to: Address,
        data: Vec<u8>,
        token_id: TokenId,
        amount: U256,
    ) -> CallOutcome {
        let quota_init = cost::TX_QUOTA_LIMIT;
        self.quota_left = quota_init;
        debug!(tx_type = ?self.ctx.tx_type, depth = self.ctx.depth, %to, "call");

        let intrinsic = match gas::intrinsic_gas_cost(&data, false) {
            Ok(cost) => cost,
            Err(e) => return self.finish_call(Vec::new(), 0, Some(e)),
        };
        if self.use_quota(intrinsic).is_err() {
            return self.finish_call(Vec::new(), 0, Some(VmError::OutOfQuota));
        }

        match self.ctx.tx_type {
            TxType::Send => {
                if !self.can_transfer(&from, &token_id, amount, U256::zero()) {
                    let used = self.quota_used(quota_init);
                    return self.finish_call(Vec::new(), used, Some(VmError::InsufficientBalance));
                }
                self.db.sub_balance(&from, &token_id, amount);
                let used = self.quota_used(quota_init);
                self.finish_call(Vec::new(), used, None)
            }
            TxType::Receive => {
                // fails before any state change
                if self.ctx.depth > cost::MAX_CALL_DEPTH {
                    let used = self.quota_used(quota_init);
                    return self.finish_call(Vec::new(), used, Some(VmError::Depth));
                }

                if !self.db.exists(&to) {
                    self.db.create_account(&to);
                }
                let outer = self.db.snapshot();
                self.db.add_balance(&to, &token_id, amount);
                let inner = self.db.snapshot();

                let mut frame = Frame::new(from, to, token_id, amount, data);
                let code_hash = self.db.get_contract_code_hash(&to);
                let code = self.db.get_contract_code(&to);
                frame.set_code(to, code_hash, code);

                match self.run(&mut frame) {
                    Ok(output) => {
                        let used = self.quota_used(quota_init);
                        self.finish_call(output, used, None)
                    }
                    Err(e @ VmError::ExecutionReverted(_)) => {
                        // the inner snapshot keeps the credit
                        self.db.revert_to_snapshot(inner);
                        let used = self.quota_used(quota_init);
                        self.finish_call(Vec::new(), used, Some(e))
                    }
                    Err(VmError::OutOfQuota) => {
                        self.db.revert_to_snapshot(outer);
                        self.clear_run_effects();
                        self.finish_call(Vec::new(), quota_init, Some(VmError::OutOfQuota))
                    }
                    Err(e) => {
                        self.db.revert_to_snapshot(outer);
                        self.clear_run_effects();
                        if !amount.is_zero() {
                            // recredit so the queued refund's send phase can
                            // debit the recipient
                            self.db.add_balance(&to, &token_id, amount);
                            self.queue_refund(to, from, token_id, amount);
                        }
                        let used = self.quota_used(quota_init);
                        self.finish_call(Vec::new(), used, Some(e))
                    }
                }
            }
        }
    }

    pub(crate) fn add_log(&mut self, log: Log) {
        self.logs.push(log);
    }

    pub(crate) fn add_refund(&mut self, amount: u64) {
        self.quota_refund += amount;
    }

    fn use_quota(&mut self, cost: u64) -> VmResult<()> {
        if self.quota_left < cost {
            return Err(VmError::OutOfQuota);
        }
        self.quota_left -= cost;
        Ok(())
    }

    // Consumed quota plus the refund pot, capped at half the consumption.
    fn quota_used(&self, quota_init: u64) -> u64 {
        let consumed = quota_init - self.quota_left;
        consumed + self.quota_refund.min(consumed / 2)
    }

    fn can_transfer(
        &self,
        from: &Address,
        token_id: &TokenId,
        amount: U256,
        fee: U256,
    ) -> bool {
        amount <= self.db.balance(from, token_id)
            && fee <= self.db.balance(from, &TokenId::NATIVE)
    }

    fn queue_refund(&mut self, from: Address, to: Address, token_id: TokenId, amount: U256) {
        self.transfers.push(PendingTransfer {
            from,
            to,
            token_id,
            amount,
            tx_type: TxType::Send,
            depth: self.ctx.depth + 1,
            snapshot_height: self.ctx.snapshot_height,
            snapshot_timestamp: self.ctx.snapshot_timestamp,
            data: Vec::new(),
        });
    }

    fn clear_run_effects(&mut self) {
        self.quota_refund = 0;
        self.logs.clear();
        self.transfers.clear();
    }

    fn finish_create(
        &mut self,
        contract_address: Option<Address>,
        quota_used: u64,
        error: Option<VmError>,
    ) -> CreateOutcome {
        self.quota_refund = 0;
        CreateOutcome {
            contract_address,
            quota_used,
            logs: mem::take(&mut self.logs),
            transfers: mem::take(&mut self.transfers),
            error,
        }
    }

    fn finish_call(
        &mut self,
        output: Vec<u8>,
        quota_used: u64,
        error: Option<VmError>,
    ) -> CallOutcome {
        self.quota_refund = 0;
        CallOutcome {
            output,
            quota_used,
            logs: mem::take(&mut self.logs),
            transfers: mem::take(&mut self.transfers),
            error,
        }
    }

    // Run a frame to completion. Any error or revert discards the logs,
    // pending transfers and refund pot accumulated so far.
    fn run(&mut self, frame: &mut Frame) -> VmResult<Vec<u8>> {
        if frame.code.is_empty() {
            return Ok(Vec::new());
        }
        self.return_data.clear();

        let result = self.exec_loop(frame);
        if result.is_err() {
            self.clear_run_effects();
        }
        result
    }

    // The fetch-validate-price-execute cycle.
    fn exec_loop(&mut self, frame: &mut Frame) -> VmResult<Vec<u8>> {
        let mut mem = Memory::new();
        let mut stack = Stack::new();
        let mut pc: u64 = 0;

        loop {
            // a concurrent cancel terminates at the next dispatch boundary
            if self.abort.load(Ordering::SeqCst) {
                return Err(VmError::OutOfQuota);
            }

            let op = frame.get_op(pc);
            let operation = &INSTRUCTION_SET[op as usize];
            if !operation.valid {
                return Err(VmError::InvalidOpcode(op));
            }

            if stack.len() < operation.min_stack {
                return Err(VmError::StackUnderflow);
            }
            if stack.len() > operation.max_stack {
                return Err(VmError::StackOverflow);
            }

            let mut memory_size = 0u64;
            if let Some(memory_size_fn) = operation.memory_size {
                let requested = word::u256_to_u64(memory_size_fn(&stack)?)?;
                memory_size = word::to_word_size(requested)
                    .checked_mul(32)
                    .ok_or(VmError::GasUintOverflow)?;
            }

            let step_cost = (operation.gas_cost)(self, frame, &stack, &mut mem, memory_size)?;
            self.use_quota(step_cost)?;

            if memory_size > 0 {
                mem.resize(memory_size);
            }

            trace!(pc, op = opcode::name(op), quota_left = self.quota_left, "step");

            let res = (operation.execute)(&mut pc, self, frame, &mut mem, &mut stack)?;

            if operation.returns {
                self.return_data = res.clone();
            }

            if operation.halts {
                return Ok(res);
            }
            if operation.reverts {
                return Err(VmError::ExecutionReverted(res));
            }
            if !operation.jumps {
                pc += 1;
            }
        }
    }
}
