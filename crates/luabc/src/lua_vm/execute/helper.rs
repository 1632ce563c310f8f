// Register and constant access for the dispatch loop

use crate::lua_value::LuaValue;
use crate::lua_vm::lua_limits::MAXASIZE;
use crate::lua_vm::{Instruction, LuaError, LuaResult};

#[inline(always)]
pub(crate) fn reg(stack: &[LuaValue], index: usize) -> LuaValue {
    stack.get(index).cloned().unwrap_or_default()
}

#[inline(always)]
pub(crate) fn set_reg(stack: &mut Vec<LuaValue>, index: usize, value: LuaValue) {
    if index >= stack.len() {
        stack.resize(index + 1, LuaValue::Nil);
    }
    stack[index] = value;
}

#[inline(always)]
pub(crate) fn constant(k: &[LuaValue], index: usize) -> LuaResult<LuaValue> {
    k.get(index)
        .cloned()
        .ok_or_else(|| LuaError::load(format!("constant index {} out of range", index)))
}

/// Resolve an RK operand: constant when the RK bit is set, register otherwise.
#[inline(always)]
pub(crate) fn rk(stack: &[LuaValue], k: &[LuaValue], base: usize, x: u32) -> LuaResult<LuaValue> {
    if Instruction::is_k(x) {
        constant(k, Instruction::rk_index(x) as usize)
    } else {
        Ok(reg(stack, base + x as usize))
    }
}

/// Decode NEWTABLE's "floating point byte" size hint (eeeeexxx).
pub(crate) fn fb2int(x: u32) -> usize {
    if x < 8 {
        x as usize
    } else {
        let e = ((x >> 3) - 1) as usize;
        let m = ((x & 7) + 8) as usize;
        if e >= MAXASIZE.trailing_zeros() as usize {
            MAXASIZE
        } else {
            (m << e).min(MAXASIZE)
        }
    }
}
