// Numeric for-loop instructions, following Lua 5.3 (lvm.c OP_FORPREP/OP_FORLOOP)

use super::helper::{reg, set_reg};
use crate::lua_value::{LuaValue, float_to_integer};
use crate::lua_vm::{LuaError, LuaResult};

/// FORPREP: normalize init/limit/step and pre-decrement the counter so the
/// first FORLOOP lands on `init`.
pub(crate) fn exec_forprep(stack: &mut Vec<LuaValue>, ra: usize) -> LuaResult<()> {
    let init = reg(stack, ra);
    let limit = reg(stack, ra + 1);
    let step = reg(stack, ra + 2);

    if let (LuaValue::Integer(i), LuaValue::Integer(s)) = (&init, &step) {
        if let Some((ilimit, skip)) = for_limit(&limit, *s) {
            let start = if skip { 0 } else { *i };
            set_reg(stack, ra, LuaValue::Integer(start.wrapping_sub(*s)));
            set_reg(stack, ra + 1, LuaValue::Integer(ilimit));
            return Ok(());
        }
    }

    let flimit = for_number(&limit, "limit")?;
    let fstep = for_number(&step, "step")?;
    let finit = for_number(&init, "initial value")?;
    set_reg(stack, ra, LuaValue::Float(finit - fstep));
    set_reg(stack, ra + 1, LuaValue::Float(flimit));
    set_reg(stack, ra + 2, LuaValue::Float(fstep));
    Ok(())
}

/// FORLOOP: advance the counter; true when the body runs again.
pub(crate) fn exec_forloop(stack: &mut Vec<LuaValue>, ra: usize) -> bool {
    match (reg(stack, ra), reg(stack, ra + 1), reg(stack, ra + 2)) {
        (LuaValue::Integer(idx), LuaValue::Integer(limit), LuaValue::Integer(step)) => {
            let idx = idx.wrapping_add(step);
            let more = if step > 0 { idx <= limit } else { limit <= idx };
            if more {
                set_reg(stack, ra, LuaValue::Integer(idx));
                set_reg(stack, ra + 3, LuaValue::Integer(idx));
            }
            more
        }
        (idx, limit, step) => {
            let (Some(idx), Some(limit), Some(step)) = (idx.as_float(), limit.as_float(), step.as_float())
            else {
                return false;
            };
            let idx = idx + step;
            let more = if step > 0.0 { idx <= limit } else { limit <= idx };
            if more {
                set_reg(stack, ra, LuaValue::Float(idx));
                set_reg(stack, ra + 3, LuaValue::Float(idx));
            }
            more
        }
    }
}

/// Integer limit for an integer loop. `None` when the limit is not a
/// number; the flag asks to skip the loop entirely.
fn for_limit(limit: &LuaValue, step: i64) -> Option<(i64, bool)> {
    match limit.to_number()? {
        LuaValue::Integer(i) => Some((i, false)),
        LuaValue::Float(f) => {
            let rounded = if step < 0 { f.ceil() } else { f.floor() };
            if let Some(i) = float_to_integer(rounded) {
                return Some((i, false));
            }
            // out of integer range
            if f.is_nan() {
                None
            } else if f > 0.0 {
                Some((i64::MAX, step < 0))
            } else {
                Some((i64::MIN, step > 0))
            }
        }
        _ => None,
    }
}

fn for_number(value: &LuaValue, what: &str) -> LuaResult<f64> {
    value
        .to_float()
        .ok_or_else(|| LuaError::runtime(format!("'for' {} must be a number", what)))
}
