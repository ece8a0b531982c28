//! The instruction descriptor table
//!
//! A flat 256-entry array indexed by opcode byte. Each entry carries the
//! executor, the gas function, an optional memory-size function, stack
//! bounds and control-flow flags. Undefined opcodes are marked invalid.

use crate::error::{VmError, VmResult};
use crate::frame::Frame;
use crate::gas;
use crate::gas::cost::STACK_LIMIT;
use crate::instructions::*;
use crate::memory::Memory;
use crate::opcode;
use crate::stack::Stack;
use crate::vm::Vm;
use crate::word::calc_mem_size;
use lyra_primitives::U256;
use std::sync::LazyLock;

pub(crate) type ExecFn =
    fn(&mut u64, &mut Vm<'_>, &mut Frame, &mut Memory, &mut Stack) -> VmResult<Vec<u8>>;
pub(crate) type GasFn = fn(&mut Vm<'_>, &Frame, &Stack, &mut Memory, u64) -> VmResult<u64>;
pub(crate) type MemSizeFn = fn(&Stack) -> VmResult<U256>;

/// One instruction descriptor
#[derive(Clone, Copy)]
pub(crate) struct Operation {
    pub execute: ExecFn,
    pub gas_cost: GasFn,
    pub memory_size: Option<MemSizeFn>,
    pub min_stack: usize,
    pub max_stack: usize,
    pub halts: bool,
    pub jumps: bool,
    pub reverts: bool,
    pub returns: bool,
    pub valid: bool,
}

// Highest stack depth allowed before an opcode that pops `pops` words and
// pushes `pushes` runs without overflowing the limit.
const fn max_stack(pops: usize, pushes: usize) -> usize {
    STACK_LIMIT + pops - pushes
}

fn op_invalid(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    _stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    // unreachable: the dispatcher rejects invalid opcodes before execution
    Err(VmError::InvalidOpcode(frame.get_op(0)))
}

const INVALID: Operation = Operation {
    execute: op_invalid,
    gas_cost: gas::gas_zero,
    memory_size: None,
    min_stack: 0,
    max_stack: STACK_LIMIT,
    halts: false,
    jumps: false,
    reverts: false,
    returns: false,
    valid: false,
};

// A defined opcode with the common flag defaults.
const fn simple(
    execute: ExecFn,
    gas_cost: GasFn,
    pops: usize,
    pushes: usize,
) -> Operation {
    Operation {
        execute,
        gas_cost,
        memory_size: None,
        min_stack: pops,
        max_stack: max_stack(pops, pushes),
        halts: false,
        jumps: false,
        reverts: false,
        returns: false,
        valid: true,
    }
}

// Memory-size functions: the peak byte range an opcode will touch, read
// from its stack operands before execution.

fn memory_blake2b(stack: &Stack) -> VmResult<U256> {
    calc_mem_size(stack.back(0)?, stack.back(1)?)
}

fn memory_calldatacopy(stack: &Stack) -> VmResult<U256> {
    calc_mem_size(stack.back(0)?, stack.back(2)?)
}

fn memory_codecopy(stack: &Stack) -> VmResult<U256> {
    calc_mem_size(stack.back(0)?, stack.back(2)?)
}

fn memory_mload(stack: &Stack) -> VmResult<U256> {
    calc_mem_size(stack.back(0)?, U256::from(32u64))
}

fn memory_mstore(stack: &Stack) -> VmResult<U256> {
    calc_mem_size(stack.back(0)?, U256::from(32u64))
}

fn memory_mstore8(stack: &Stack) -> VmResult<U256> {
    calc_mem_size(stack.back(0)?, U256::one())
}

fn memory_log(stack: &Stack) -> VmResult<U256> {
    calc_mem_size(stack.back(0)?, stack.back(1)?)
}

fn memory_return(stack: &Stack) -> VmResult<U256> {
    calc_mem_size(stack.back(0)?, stack.back(1)?)
}

fn memory_revert(stack: &Stack) -> VmResult<U256> {
    calc_mem_size(stack.back(0)?, stack.back(1)?)
}

pub(crate) static INSTRUCTION_SET: LazyLock<[Operation; 256]> = LazyLock::new(|| {
    let mut table = [INVALID; 256];

    table[opcode::STOP as usize] = Operation {
        halts: true,
        ..simple(op_stop, gas::gas_zero, 0, 0)
    };
    table[opcode::ADD as usize] = simple(op_add, gas::gas_fastest, 2, 1);
    table[opcode::MUL as usize] = simple(op_mul, gas::gas_fast, 2, 1);
    table[opcode::SUB as usize] = simple(op_sub, gas::gas_fastest, 2, 1);
    table[opcode::DIV as usize] = simple(op_div, gas::gas_fast, 2, 1);
    table[opcode::SDIV as usize] = simple(op_sdiv, gas::gas_fast, 2, 1);
    table[opcode::MOD as usize] = simple(op_mod, gas::gas_fast, 2, 1);
    table[opcode::SMOD as usize] = simple(op_smod, gas::gas_fast, 2, 1);
    table[opcode::ADDMOD as usize] = simple(op_addmod, gas::gas_mid, 3, 1);
    table[opcode::MULMOD as usize] = simple(op_mulmod, gas::gas_mid, 3, 1);
    table[opcode::EXP as usize] = simple(op_exp, gas::gas_exp, 2, 1);
    table[opcode::SIGNEXTEND as usize] = simple(op_signextend, gas::gas_fast, 2, 1);

    table[opcode::LT as usize] = simple(op_lt, gas::gas_fastest, 2, 1);
    table[opcode::GT as usize] = simple(op_gt, gas::gas_fastest, 2, 1);
    table[opcode::SLT as usize] = simple(op_slt, gas::gas_fastest, 2, 1);
    table[opcode::SGT as usize] = simple(op_sgt, gas::gas_fastest, 2, 1);
    table[opcode::EQ as usize] = simple(op_eq, gas::gas_fastest, 2, 1);
    table[opcode::ISZERO as usize] = simple(op_iszero, gas::gas_fastest, 1, 1);
    table[opcode::AND as usize] = simple(op_and, gas::gas_fastest, 2, 1);
    table[opcode::OR as usize] = simple(op_or, gas::gas_fastest, 2, 1);
    table[opcode::XOR as usize] = simple(op_xor, gas::gas_fastest, 2, 1);
    table[opcode::NOT as usize] = simple(op_not, gas::gas_fastest, 1, 1);
    table[opcode::BYTE as usize] = simple(op_byte, gas::gas_fastest, 2, 1);
    table[opcode::SHL as usize] = simple(op_shl, gas::gas_fastest, 2, 1);
    table[opcode::SHR as usize] = simple(op_shr, gas::gas_fastest, 2, 1);
    table[opcode::SAR as usize] = simple(op_sar, gas::gas_fastest, 2, 1);

    table[opcode::BLAKE2B as usize] = Operation {
        memory_size: Some(memory_blake2b),
        ..simple(op_blake2b, gas::gas_blake2b, 2, 1)
    };

    table[opcode::ADDRESS as usize] = simple(op_address, gas::gas_quick, 0, 1);
    table[opcode::BALANCE as usize] = simple(op_balance, gas::gas_balance, 2, 1);
    table[opcode::CALLER as usize] = simple(op_caller, gas::gas_quick, 0, 1);
    table[opcode::CALLVALUE as usize] = simple(op_callvalue, gas::gas_quick, 0, 1);
    table[opcode::CALLDATALOAD as usize] = simple(op_calldataload, gas::gas_fastest, 1, 1);
    table[opcode::CALLDATASIZE as usize] = simple(op_calldatasize, gas::gas_quick, 0, 1);
    table[opcode::CALLDATACOPY as usize] = Operation {
        memory_size: Some(memory_calldatacopy),
        ..simple(op_calldatacopy, gas::gas_copy, 3, 0)
    };
    table[opcode::CODESIZE as usize] = simple(op_codesize, gas::gas_quick, 0, 1);
    table[opcode::CODECOPY as usize] = Operation {
        memory_size: Some(memory_codecopy),
        ..simple(op_codecopy, gas::gas_copy, 3, 0)
    };

    table[opcode::BLOCKHASH as usize] = simple(op_blockhash, gas::gas_ext, 1, 1);
    table[opcode::TIMESTAMP as usize] = simple(op_timestamp, gas::gas_quick, 0, 1);
    table[opcode::NUMBER as usize] = simple(op_number, gas::gas_quick, 0, 1);

    table[opcode::POP as usize] = simple(op_pop, gas::gas_quick, 1, 0);
    table[opcode::MLOAD as usize] = Operation {
        memory_size: Some(memory_mload),
        ..simple(op_mload, gas::gas_fastest_mem, 1, 1)
    };
    table[opcode::MSTORE as usize] = Operation {
        memory_size: Some(memory_mstore),
        ..simple(op_mstore, gas::gas_fastest_mem, 2, 0)
    };
    table[opcode::MSTORE8 as usize] = Operation {
        memory_size: Some(memory_mstore8),
        ..simple(op_mstore8, gas::gas_fastest_mem, 2, 0)
    };
    table[opcode::SLOAD as usize] = simple(op_sload, gas::gas_sload, 1, 1);
    table[opcode::SSTORE as usize] = simple(op_sstore, gas::gas_sstore, 2, 0);
    table[opcode::JUMP as usize] = Operation {
        jumps: true,
        ..simple(op_jump, gas::gas_mid, 1, 0)
    };
    table[opcode::JUMPI as usize] = Operation {
        jumps: true,
        ..simple(op_jumpi, gas::gas_slow, 2, 0)
    };
    table[opcode::PC as usize] = simple(op_pc, gas::gas_quick, 0, 1);
    table[opcode::MSIZE as usize] = simple(op_msize, gas::gas_quick, 0, 1);
    table[opcode::JUMPDEST as usize] = simple(op_jumpdest, gas::gas_jumpdest, 0, 0);

    for op in opcode::PUSH1..=opcode::PUSH32 {
        table[op as usize] = simple(op_push, gas::gas_fastest, 0, 1);
    }
    for (i, op) in (opcode::DUP1..=opcode::DUP16).enumerate() {
        let n = i + 1;
        table[op as usize] = simple(op_dup, gas::gas_fastest, n, n + 1);
    }
    for (i, op) in (opcode::SWAP1..=opcode::SWAP16).enumerate() {
        let n = i + 2;
        table[op as usize] = simple(op_swap, gas::gas_fastest, n, n);
    }

    let log_gas: [GasFn; 5] = [
        gas::gas_log0,
        gas::gas_log1,
        gas::gas_log2,
        gas::gas_log3,
        gas::gas_log4,
    ];
    for (i, op) in (opcode::LOG0..=opcode::LOG4).enumerate() {
        table[op as usize] = Operation {
            memory_size: Some(memory_log),
            ..simple(op_log, log_gas[i], i + 2, 0)
        };
    }

    table[opcode::RETURN as usize] = Operation {
        memory_size: Some(memory_return),
        halts: true,
        returns: true,
        ..simple(op_return, gas::gas_return, 2, 0)
    };
    table[opcode::REVERT as usize] = Operation {
        memory_size: Some(memory_revert),
        reverts: true,
        returns: true,
        ..simple(op_revert, gas::gas_revert, 2, 0)
    };

    table
});
