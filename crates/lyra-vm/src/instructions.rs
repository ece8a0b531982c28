//! Opcode executors
//!
//! Each executor runs after the dispatcher has validated stack bounds,
//! charged quota and expanded memory, so memory accesses within the declared
//! range are in bounds and stack traffic within the declared arity cannot
//! fail.

use crate::context::Log;
use crate::error::{VmError, VmResult};
use crate::frame::Frame;
use crate::memory::Memory;
use crate::opcode;
use crate::stack::Stack;
use crate::vm::Vm;
use crate::word;
use lyra_crypto::hash256;
use lyra_primitives::{Address, TokenId, H256, U256};

pub(crate) fn op_stop(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    _stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    Ok(Vec::new())
}

pub(crate) fn op_add(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x.overflowing_add(y).0);
    Ok(Vec::new())
}

pub(crate) fn op_mul(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x.overflowing_mul(y).0);
    Ok(Vec::new())
}

pub(crate) fn op_sub(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x.overflowing_sub(y).0);
    Ok(Vec::new())
}

pub(crate) fn op_div(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    if y.is_zero() {
        stack.push(U256::zero());
    } else {
        stack.push(x / y);
    }
    Ok(Vec::new())
}

pub(crate) fn op_sdiv(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(word::sdiv(x, y));
    Ok(Vec::new())
}

pub(crate) fn op_mod(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    if y.is_zero() {
        stack.push(U256::zero());
    } else {
        stack.push(x % y);
    }
    Ok(Vec::new())
}

pub(crate) fn op_smod(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(word::smod(x, y));
    Ok(Vec::new())
}

pub(crate) fn op_addmod(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    let z = stack.pop()?;
    stack.push(word::addmod(x, y, z));
    Ok(Vec::new())
}

pub(crate) fn op_mulmod(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    let z = stack.pop()?;
    stack.push(word::mulmod(x, y, z));
    Ok(Vec::new())
}

pub(crate) fn op_exp(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let base = stack.pop()?;
    let exponent = stack.pop()?;
    stack.push(base.overflowing_pow(exponent).0);
    Ok(Vec::new())
}

pub(crate) fn op_signextend(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let back = stack.pop()?;
    if back < U256::from(31u64) {
        let num = stack.pop()?;
        stack.push(word::sign_extend(back, num));
    }
    Ok(Vec::new())
}

pub(crate) fn op_lt(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(bool_word(x < y));
    Ok(Vec::new())
}

pub(crate) fn op_gt(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(bool_word(x > y));
    Ok(Vec::new())
}

pub(crate) fn op_slt(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(bool_word(word::slt(x, y)));
    Ok(Vec::new())
}

pub(crate) fn op_sgt(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(bool_word(word::sgt(x, y)));
    Ok(Vec::new())
}

pub(crate) fn op_eq(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(bool_word(x == y));
    Ok(Vec::new())
}

pub(crate) fn op_iszero(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    stack.push(bool_word(x.is_zero()));
    Ok(Vec::new())
}

pub(crate) fn op_and(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x & y);
    Ok(Vec::new())
}

pub(crate) fn op_or(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x | y);
    Ok(Vec::new())
}

pub(crate) fn op_xor(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    let y = stack.pop()?;
    stack.push(x ^ y);
    Ok(Vec::new())
}

pub(crate) fn op_not(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let x = stack.pop()?;
    stack.push(!x);
    Ok(Vec::new())
}

pub(crate) fn op_byte(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let th = stack.pop()?;
    let val = stack.pop()?;
    if th < U256::from(32u64) {
        // byte(i) indexes from the least significant end
        stack.push(U256::from(val.byte(31 - th.low_u64() as usize)));
    } else {
        stack.push(U256::zero());
    }
    Ok(Vec::new())
}

pub(crate) fn op_shl(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let shift = stack.pop()?;
    let value = stack.pop()?;
    if shift >= U256::from(256u64) {
        stack.push(U256::zero());
    } else {
        stack.push(value << shift.low_u64() as usize);
    }
    Ok(Vec::new())
}

pub(crate) fn op_shr(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let shift = stack.pop()?;
    let value = stack.pop()?;
    if shift >= U256::from(256u64) {
        stack.push(U256::zero());
    } else {
        stack.push(value >> shift.low_u64() as usize);
    }
    Ok(Vec::new())
}

pub(crate) fn op_sar(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let shift = stack.pop()?;
    let value = stack.pop()?;
    stack.push(word::sar(shift, value));
    Ok(Vec::new())
}

pub(crate) fn op_blake2b(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let offset = stack.pop()?;
    let size = stack.pop()?;
    let data = mem.get_ptr(offset.low_u64(), size.low_u64());
    stack.push(hash256(data).to_word());
    Ok(Vec::new())
}

pub(crate) fn op_address(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    stack.push(frame.address.to_word());
    Ok(Vec::new())
}

pub(crate) fn op_balance(
    _pc: &mut u64,
    vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let addr_word = stack.pop()?;
    let token_word = stack.pop()?;
    let address = Address::from_word(addr_word);
    let token_id = TokenId::from_word(token_word);
    stack.push(vm.db.balance(&address, &token_id));
    Ok(Vec::new())
}

pub(crate) fn op_caller(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    stack.push(frame.caller.to_word());
    Ok(Vec::new())
}

pub(crate) fn op_callvalue(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    stack.push(frame.amount);
    Ok(Vec::new())
}

pub(crate) fn op_calldataload(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let offset = stack.pop()?;
    let data = word::get_data(&frame.data, offset, 32);
    stack.push(U256::from_big_endian(&data));
    Ok(Vec::new())
}

pub(crate) fn op_calldatasize(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    stack.push(U256::from(frame.data.len()));
    Ok(Vec::new())
}

pub(crate) fn op_calldatacopy(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let mem_offset = stack.pop()?;
    let data_offset = stack.pop()?;
    let length = stack.pop()?;
    let data = word::get_data(&frame.data, data_offset, length.low_u64());
    mem.set(mem_offset.low_u64(), length.low_u64(), &data);
    Ok(Vec::new())
}

pub(crate) fn op_codesize(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    stack.push(U256::from(frame.code.len()));
    Ok(Vec::new())
}

pub(crate) fn op_codecopy(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let mem_offset = stack.pop()?;
    let code_offset = stack.pop()?;
    let length = stack.pop()?;
    let data = word::get_data(&frame.code, code_offset, length.low_u64());
    mem.set(mem_offset.low_u64(), length.low_u64(), &data);
    Ok(Vec::new())
}

pub(crate) fn op_blockhash(
    _pc: &mut u64,
    vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let num = stack.pop()?;
    let height = vm.ctx.snapshot_height;
    // valid range is (height - 256, height]; the lower bound only bites
    // once 256 blocks exist
    let in_range = num <= U256::from(height)
        && (height < 256 || num > U256::from(height - 256));
    if in_range {
        stack.push(vm.db.get_block_hash(num.low_u64()).to_word());
    } else {
        stack.push(U256::zero());
    }
    Ok(Vec::new())
}

pub(crate) fn op_timestamp(
    _pc: &mut u64,
    vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    stack.push(U256::from(vm.ctx.snapshot_timestamp));
    Ok(Vec::new())
}

pub(crate) fn op_number(
    _pc: &mut u64,
    vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    stack.push(U256::from(vm.ctx.snapshot_height));
    Ok(Vec::new())
}

pub(crate) fn op_pop(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    stack.pop()?;
    Ok(Vec::new())
}

pub(crate) fn op_mload(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let offset = stack.pop()?;
    let value = U256::from_big_endian(mem.get_ptr(offset.low_u64(), 32));
    stack.push(value);
    Ok(Vec::new())
}

pub(crate) fn op_mstore(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let offset = stack.pop()?;
    let value = stack.pop()?;
    mem.set32(offset.low_u64(), value);
    Ok(Vec::new())
}

pub(crate) fn op_mstore8(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let offset = stack.pop()?;
    let value = stack.pop()?;
    mem.set_byte(offset.low_u64(), value.byte(0));
    Ok(Vec::new())
}

pub(crate) fn op_sload(
    _pc: &mut u64,
    vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let loc = stack.pop()?;
    let value = vm.db.get_state(&frame.address, &H256::from_word(loc));
    stack.push(value.to_word());
    Ok(Vec::new())
}

pub(crate) fn op_sstore(
    _pc: &mut u64,
    vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let loc = stack.pop()?;
    let value = stack.pop()?;
    vm.db
        .set_state(&frame.address, &H256::from_word(loc), H256::from_word(value));
    Ok(Vec::new())
}

pub(crate) fn op_jump(
    pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let pos = stack.pop()?;
    if !frame.jump_table.has(pos) {
        return Err(VmError::InvalidJump(pos.low_u64()));
    }
    *pc = pos.low_u64();
    Ok(Vec::new())
}

pub(crate) fn op_jumpi(
    pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let pos = stack.pop()?;
    let cond = stack.pop()?;
    if !cond.is_zero() {
        if !frame.jump_table.has(pos) {
            return Err(VmError::InvalidJump(pos.low_u64()));
        }
        *pc = pos.low_u64();
    } else {
        *pc += 1;
    }
    Ok(Vec::new())
}

pub(crate) fn op_pc(
    pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    stack.push(U256::from(*pc));
    Ok(Vec::new())
}

pub(crate) fn op_msize(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    stack.push(U256::from(mem.len()));
    Ok(Vec::new())
}

pub(crate) fn op_jumpdest(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    _mem: &mut Memory,
    _stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    Ok(Vec::new())
}

// PUSH1..PUSH32 share one executor; the immediate width comes from the
// opcode byte itself. Truncated immediates at code end read as zero.
pub(crate) fn op_push(
    pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let width = opcode::push_bytes(frame.get_op(*pc));
    let code_len = frame.code.len();

    let start = code_len.min(*pc as usize + 1);
    let end = code_len.min(start + width);

    let padded = word::right_pad(&frame.code[start..end], width);
    stack.push(U256::from_big_endian(&padded));

    *pc += width as u64;
    Ok(Vec::new())
}

pub(crate) fn op_dup(
    pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let n = (frame.get_op(*pc) - opcode::DUP1 + 1) as usize;
    stack.dup(n)?;
    Ok(Vec::new())
}

pub(crate) fn op_swap(
    pc: &mut u64,
    _vm: &mut Vm<'_>,
    frame: &mut Frame,
    _mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let n = (frame.get_op(*pc) - opcode::SWAP1 + 1) as usize;
    stack.swap(n)?;
    Ok(Vec::new())
}

pub(crate) fn op_log(
    pc: &mut u64,
    vm: &mut Vm<'_>,
    frame: &mut Frame,
    mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let topic_count = (frame.get_op(*pc) - opcode::LOG0) as usize;
    let m_start = stack.pop()?;
    let m_size = stack.pop()?;

    let mut topics = Vec::with_capacity(topic_count);
    for _ in 0..topic_count {
        topics.push(H256::from_word(stack.pop()?));
    }

    let data = mem.get(m_start.low_u64(), m_size.low_u64());
    let height = vm.ctx.account_height;
    vm.add_log(Log {
        address: frame.address,
        topics,
        data,
        height,
    });
    Ok(Vec::new())
}

pub(crate) fn op_return(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let offset = stack.pop()?;
    let size = stack.pop()?;
    Ok(mem.get(offset.low_u64(), size.low_u64()))
}

pub(crate) fn op_revert(
    _pc: &mut u64,
    _vm: &mut Vm<'_>,
    _frame: &mut Frame,
    mem: &mut Memory,
    stack: &mut Stack,
) -> VmResult<Vec<u8>> {
    let offset = stack.pop()?;
    let size = stack.pop()?;
    Ok(mem.get(offset.low_u64(), size.low_u64()))
}

fn bool_word(b: bool) -> U256 {
    if b {
        U256::one()
    } else {
        U256::zero()
    }
}
