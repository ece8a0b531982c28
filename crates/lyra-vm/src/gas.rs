//! Quota cost schedule and pricing functions

use crate::error::{VmError, VmResult};
use crate::frame::Frame;
use crate::memory::Memory;
use crate::stack::Stack;
use crate::vm::Vm;
use crate::word::{to_word_size, u256_to_u64};
use lyra_primitives::H256;

/// Quota costs for VM operations
pub mod cost {
    /// Quick-step opcodes
    pub const QUICK: u64 = 2;
    /// Fastest-step opcodes
    pub const FASTEST: u64 = 3;
    /// Fast-step opcodes
    pub const FAST: u64 = 5;
    /// Mid-step opcodes
    pub const MID: u64 = 8;
    /// Slow-step opcodes
    pub const SLOW: u64 = 10;
    /// Ext-step opcodes (BLOCKHASH)
    pub const EXT: u64 = 20;
    /// BALANCE opcode
    pub const BALANCE: u64 = 20;
    /// SLOAD opcode
    pub const SLOAD: u64 = 50;
    /// JUMPDEST opcode
    pub const JUMPDEST: u64 = 1;
    /// Per byte of EXP exponent
    pub const EXP_BYTE: u64 = 10;

    /// Once per BLAKE2B operation
    pub const BLAKE2B: u64 = 30;
    /// Per word of BLAKE2B input
    pub const BLAKE2B_WORD: u64 = 6;

    /// Per LOG* operation
    pub const LOG: u64 = 375;
    /// Per LOG* topic
    pub const LOG_TOPIC: u64 = 375;
    /// Per byte of LOG* data
    pub const LOG_DATA: u64 = 8;

    /// SSTORE writing a non-zero value to a zero slot
    pub const SSTORE_SET: u64 = 20000;
    /// SSTORE leaving the slot's zeroness unchanged
    pub const SSTORE_RESET: u64 = 5000;
    /// SSTORE clearing a non-zero slot
    pub const SSTORE_CLEAR: u64 = 5000;
    /// Refund for clearing a non-zero slot
    pub const SSTORE_REFUND: u64 = 15000;

    /// Per word copied by CALLDATACOPY/CODECOPY
    pub const COPY: u64 = 3;
    /// Linear coefficient of the memory cost equation
    pub const MEMORY: u64 = 3;
    /// Divisor of the quadratic particle of the memory cost equation
    pub const QUAD_COEFF_DIV: u64 = 512;

    /// Per byte of stored contract code
    pub const CONTRACT_CODE_BYTE: u64 = 200;

    /// Per transaction not creating a contract
    pub const TX: u64 = 21000;
    /// Per transaction that creates a contract
    pub const TX_CREATE: u64 = 53000;
    /// Per zero byte of transaction data
    pub const TX_DATA_ZERO: u64 = 4;
    /// Per non-zero byte of transaction data
    pub const TX_DATA_NONZERO: u64 = 68;

    /// Maximum depth of the call/create stack
    pub const MAX_CALL_DEPTH: u64 = 1024;
    /// Maximum size of the VM stack
    pub const STACK_LIMIT: usize = 1024;
    /// Quota bound per execution (placeholder for a future policy)
    pub const TX_QUOTA_LIMIT: u64 = 1_000_000;
}

/// Largest memory size the cost equation accepts; anything above overflows
/// the 64-bit fee computation.
const MAX_MEMORY_SIZE: u64 = 0xffffffffe0;

/// Quadratic cost of expanding memory to `new_mem_size` bytes, charged
/// differentially against the cost already paid for the current size.
///
/// The fee for a size of `w` words is `3*w + w*w/512`; the square is 64-bit
/// wrapping arithmetic, which the boundary value depends on.
pub fn memory_gas_cost(mem: &mut Memory, new_mem_size: u64) -> VmResult<u64> {
    if new_mem_size == 0 {
        return Ok(0);
    }
    if new_mem_size > MAX_MEMORY_SIZE {
        return Err(VmError::GasUintOverflow);
    }

    let words = to_word_size(new_mem_size);
    let new_mem_size = words * 32;

    if new_mem_size as usize > mem.len() {
        let square = words.wrapping_mul(words);
        let lin_coef = words * cost::MEMORY;
        let quad_coef = square / cost::QUAD_COEFF_DIV;
        let new_total_fee = lin_coef + quad_coef;

        let fee = new_total_fee - mem.last_gas_cost();
        mem.set_last_gas_cost(new_total_fee);

        return Ok(fee);
    }
    Ok(0)
}

/// Intrinsic quota charge of a transaction: the base (or create) cost plus
/// per-byte charges on the attached data
pub fn intrinsic_gas_cost(data: &[u8], is_create: bool) -> VmResult<u64> {
    let mut gas = if is_create { cost::TX_CREATE } else { cost::TX };
    if !data.is_empty() {
        let non_zero_count = data.iter().filter(|&&b| b != 0).count() as u64;
        if (u64::MAX - gas) / cost::TX_DATA_NONZERO < non_zero_count {
            return Err(VmError::GasUintOverflow);
        }
        gas += non_zero_count * cost::TX_DATA_NONZERO;

        let zero_count = data.len() as u64 - non_zero_count;
        if (u64::MAX - gas) / cost::TX_DATA_ZERO < zero_count {
            return Err(VmError::GasUintOverflow);
        }
        gas += zero_count * cost::TX_DATA_ZERO;
    }
    Ok(gas)
}

// Constant-tier gas functions, one per cost class.

pub(crate) fn gas_zero(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    Ok(0)
}

pub(crate) fn gas_quick(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    Ok(cost::QUICK)
}

pub(crate) fn gas_fastest(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    Ok(cost::FASTEST)
}

pub(crate) fn gas_fast(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    Ok(cost::FAST)
}

pub(crate) fn gas_mid(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    Ok(cost::MID)
}

pub(crate) fn gas_slow(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    Ok(cost::SLOW)
}

pub(crate) fn gas_ext(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    Ok(cost::EXT)
}

pub(crate) fn gas_balance(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    Ok(cost::BALANCE)
}

pub(crate) fn gas_sload(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    Ok(cost::SLOAD)
}

pub(crate) fn gas_jumpdest(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    Ok(cost::JUMPDEST)
}

// Dynamic gas functions.

pub(crate) fn gas_exp(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    let exp_byte_len = (stack.back(1)?.bits() as u64 + 7) / 8;

    // no overflow check required, the maximum is 32 * EXP_BYTE
    let gas = exp_byte_len * cost::EXP_BYTE;
    gas.checked_add(cost::SLOW).ok_or(VmError::GasUintOverflow)
}

pub(crate) fn gas_blake2b(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    stack: &Stack,
    mem: &mut Memory,
    memory_size: u64,
) -> VmResult<u64> {
    let gas = memory_gas_cost(mem, memory_size)?;
    let gas = gas
        .checked_add(cost::BLAKE2B)
        .ok_or(VmError::GasUintOverflow)?;

    let byte_count = u256_to_u64(stack.back(1)?)?;
    let word_gas = to_word_size(byte_count)
        .checked_mul(cost::BLAKE2B_WORD)
        .ok_or(VmError::GasUintOverflow)?;
    gas.checked_add(word_gas).ok_or(VmError::GasUintOverflow)
}

// CALLDATACOPY and CODECOPY price identically: memory expansion plus the
// fastest step plus a per-word copy charge on the length at back(2).
pub(crate) fn gas_copy(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    stack: &Stack,
    mem: &mut Memory,
    memory_size: u64,
) -> VmResult<u64> {
    let gas = memory_gas_cost(mem, memory_size)?;
    let gas = gas
        .checked_add(cost::FASTEST)
        .ok_or(VmError::GasUintOverflow)?;

    let byte_count = u256_to_u64(stack.back(2)?)?;
    let word_gas = to_word_size(byte_count)
        .checked_mul(cost::COPY)
        .ok_or(VmError::GasUintOverflow)?;
    gas.checked_add(word_gas).ok_or(VmError::GasUintOverflow)
}

// MLOAD, MSTORE and MSTORE8: memory expansion plus the fastest step.
pub(crate) fn gas_fastest_mem(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    mem: &mut Memory,
    memory_size: u64,
) -> VmResult<u64> {
    let gas = memory_gas_cost(mem, memory_size)?;
    gas.checked_add(cost::FASTEST)
        .ok_or(VmError::GasUintOverflow)
}

pub(crate) fn gas_sstore(
    vm: &mut Vm<'_>,
    frame: &Frame,
    stack: &Stack,
    _mem: &mut Memory,
    _memory_size: u64,
) -> VmResult<u64> {
    let key = H256::from_word(stack.back(0)?);
    let new_value = stack.back(1)?;
    let current = vm.db.get_state(&frame.address, &key);

    if current.is_zero() && !new_value.is_zero() {
        Ok(cost::SSTORE_SET)
    } else if !current.is_zero() && new_value.is_zero() {
        vm.add_refund(cost::SSTORE_REFUND);
        Ok(cost::SSTORE_CLEAR)
    } else {
        Ok(cost::SSTORE_RESET)
    }
}

fn gas_log(stack: &Stack, mem: &mut Memory, memory_size: u64, topics: u64) -> VmResult<u64> {
    let requested_size = u256_to_u64(stack.back(1)?)?;

    let gas = memory_gas_cost(mem, memory_size)?;
    let gas = gas.checked_add(cost::LOG).ok_or(VmError::GasUintOverflow)?;
    let gas = gas
        .checked_add(topics * cost::LOG_TOPIC)
        .ok_or(VmError::GasUintOverflow)?;

    let data_gas = requested_size
        .checked_mul(cost::LOG_DATA)
        .ok_or(VmError::GasUintOverflow)?;
    gas.checked_add(data_gas).ok_or(VmError::GasUintOverflow)
}

pub(crate) fn gas_log0(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    stack: &Stack,
    mem: &mut Memory,
    memory_size: u64,
) -> VmResult<u64> {
    gas_log(stack, mem, memory_size, 0)
}

pub(crate) fn gas_log1(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    stack: &Stack,
    mem: &mut Memory,
    memory_size: u64,
) -> VmResult<u64> {
    gas_log(stack, mem, memory_size, 1)
}

pub(crate) fn gas_log2(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    stack: &Stack,
    mem: &mut Memory,
    memory_size: u64,
) -> VmResult<u64> {
    gas_log(stack, mem, memory_size, 2)
}

pub(crate) fn gas_log3(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    stack: &Stack,
    mem: &mut Memory,
    memory_size: u64,
) -> VmResult<u64> {
    gas_log(stack, mem, memory_size, 3)
}

pub(crate) fn gas_log4(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    stack: &Stack,
    mem: &mut Memory,
    memory_size: u64,
) -> VmResult<u64> {
    gas_log(stack, mem, memory_size, 4)
}

pub(crate) fn gas_return(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    mem: &mut Memory,
    memory_size: u64,
) -> VmResult<u64> {
    memory_gas_cost(mem, memory_size)
}

pub(crate) fn gas_revert(
    _vm: &mut Vm<'_>,
    _frame: &Frame,
    _stack: &Stack,
    mem: &mut Memory,
    memory_size: u64,
) -> VmResult<u64> {
    memory_gas_cost(mem, memory_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_gas_cost_zero() {
        let mut mem = Memory::new();
        assert_eq!(memory_gas_cost(&mut mem, 0), Ok(0));
        assert_eq!(mem.last_gas_cost(), 0);
    }

    #[test]
    fn test_memory_gas_cost_quadratic() {
        // 1 word: 3*1 + 1/512 = 3
        let mut mem = Memory::new();
        assert_eq!(memory_gas_cost(&mut mem, 32), Ok(3));

        // 2 words from scratch: 3*2 + 4/512 = 6
        let mut mem = Memory::new();
        assert_eq!(memory_gas_cost(&mut mem, 64), Ok(6));

        // 32 words: 3*32 + 1024/512 = 98
        let mut mem = Memory::new();
        assert_eq!(memory_gas_cost(&mut mem, 1024), Ok(98));

        // 512 words: 3*512 + 512*512/512 = 2048
        let mut mem = Memory::new();
        assert_eq!(memory_gas_cost(&mut mem, 16384), Ok(2048));
    }

    #[test]
    fn test_memory_gas_cost_differential() {
        let mut mem = Memory::new();
        let first = memory_gas_cost(&mut mem, 32).unwrap();
        mem.resize(32);
        let second = memory_gas_cost(&mut mem, 64).unwrap();
        mem.resize(64);

        // the two increments add up to the from-scratch cost of 64 bytes
        assert_eq!(first + second, 6);
        assert_eq!(mem.last_gas_cost(), 6);

        // no charge when memory already covers the request
        assert_eq!(memory_gas_cost(&mut mem, 32), Ok(0));
    }

    #[test]
    fn test_memory_gas_cost_at_limit() {
        let mut mem = Memory::new();
        assert_eq!(
            memory_gas_cost(&mut mem, MAX_MEMORY_SIZE),
            Ok(36028899963961341)
        );
    }

    #[test]
    fn test_memory_gas_cost_over_limit() {
        let mut mem = Memory::new();
        assert_eq!(
            memory_gas_cost(&mut mem, MAX_MEMORY_SIZE + 1),
            Err(VmError::GasUintOverflow)
        );
    }

    #[test]
    fn test_intrinsic_gas_cost_empty() {
        assert_eq!(intrinsic_gas_cost(&[], false), Ok(cost::TX));
        assert_eq!(intrinsic_gas_cost(&[], true), Ok(cost::TX_CREATE));
    }

    #[test]
    fn test_intrinsic_gas_cost_data() {
        // one zero byte and one non-zero byte
        assert_eq!(
            intrinsic_gas_cost(&[0x00, 0x01], false),
            Ok(cost::TX + cost::TX_DATA_ZERO + cost::TX_DATA_NONZERO)
        );
    }

    #[test]
    fn test_intrinsic_gas_cost_create_payload() {
        let data = hex::decode(
            "608060405260008055348015601357600080fd5b5060358060216000396000f300\
             6080604052600080fd00a165627a7a723058207c31c74808fe0f95820eb3c48eac\
             8e3e10ef27058dc6ca159b547fccde9290790029",
        )
        .unwrap();
        assert_eq!(intrinsic_gas_cost(&data, true), Ok(58336));
    }
}
