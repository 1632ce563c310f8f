// Arithmetic, comparison, length and concatenation rules for raw values.
// There is no metamethod fallback: an operand without the needed capability
// is a TypeError.

use super::{LuaString, LuaValue};
use crate::lua_vm::{LuaError, LuaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Unm,
    BNot,
}

impl ArithOp {
    fn is_bitwise(self) -> bool {
        matches!(
            self,
            ArithOp::BAnd | ArithOp::BOr | ArithOp::BXor | ArithOp::Shl | ArithOp::Shr | ArithOp::BNot
        )
    }
}

/// Apply a binary (or, with `b == a`, unary) arithmetic operator.
pub fn arith(op: ArithOp, a: &LuaValue, b: &LuaValue) -> LuaResult<LuaValue> {
    if op.is_bitwise() {
        let x = to_bit_operand(a)?;
        let y = to_bit_operand(b)?;
        return Ok(LuaValue::Integer(match op {
            ArithOp::BAnd => x & y,
            ArithOp::BOr => x | y,
            ArithOp::BXor => x ^ y,
            ArithOp::Shl => shift_left(x, y),
            ArithOp::Shr => shift_left(x, y.wrapping_neg()),
            _ => !x,
        }));
    }

    if let (LuaValue::Integer(x), LuaValue::Integer(y)) = (a, b) {
        let (x, y) = (*x, *y);
        match op {
            ArithOp::Add => return Ok(LuaValue::Integer(x.wrapping_add(y))),
            ArithOp::Sub => return Ok(LuaValue::Integer(x.wrapping_sub(y))),
            ArithOp::Mul => return Ok(LuaValue::Integer(x.wrapping_mul(y))),
            ArithOp::Mod => return int_mod(x, y).map(LuaValue::Integer),
            ArithOp::IDiv => return int_idiv(x, y).map(LuaValue::Integer),
            ArithOp::Unm => return Ok(LuaValue::Integer(x.wrapping_neg())),
            _ => {}
        }
    }

    let x = to_arith_operand(a)?;
    let y = to_arith_operand(b)?;
    Ok(LuaValue::Float(match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => x / y,
        ArithOp::Pow => {
            if y == 2.0 {
                x * x
            } else {
                x.powf(y)
            }
        }
        ArithOp::IDiv => (x / y).floor(),
        ArithOp::Mod => float_mod(x, y),
        _ => -x,
    }))
}

fn to_arith_operand(v: &LuaValue) -> LuaResult<f64> {
    v.to_float().ok_or_else(|| {
        LuaError::type_error(format!(
            "attempt to perform arithmetic on a {} value",
            v.type_name()
        ))
    })
}

fn to_bit_operand(v: &LuaValue) -> LuaResult<i64> {
    match v.to_number() {
        Some(n) => n
            .as_integer()
            .ok_or_else(|| LuaError::type_error("number has no integer representation")),
        None => Err(LuaError::type_error(format!(
            "attempt to perform bitwise operation on a {} value",
            v.type_name()
        ))),
    }
}

/// Logical shift; negative counts shift right, |y| >= 64 yields 0.
pub fn shift_left(x: i64, y: i64) -> i64 {
    if y <= -64 || y >= 64 {
        0
    } else if y >= 0 {
        ((x as u64) << y) as i64
    } else {
        ((x as u64) >> (-y)) as i64
    }
}

/// Floor modulo; the result takes the sign of the divisor.
pub fn int_mod(x: i64, y: i64) -> LuaResult<i64> {
    if y == 0 {
        return Err(LuaError::runtime("attempt to perform 'n%0'"));
    }
    if y == -1 {
        return Ok(0);
    }
    let r = x % y;
    Ok(if r != 0 && (r ^ y) < 0 { r + y } else { r })
}

/// Floor division; `i64::MIN // -1` wraps.
pub fn int_idiv(x: i64, y: i64) -> LuaResult<i64> {
    if y == 0 {
        return Err(LuaError::runtime("attempt to perform 'n//0'"));
    }
    if y == -1 {
        return Ok(x.wrapping_neg());
    }
    let q = x / y;
    Ok(if (x % y != 0) && ((x ^ y) < 0) { q - 1 } else { q })
}

pub fn float_mod(x: f64, y: f64) -> f64 {
    let m = x % y;
    if m != 0.0 && (m > 0.0) != (y > 0.0) {
        m + y
    } else {
        m
    }
}

/// `i < f` with exact semantics for large integers.
fn lt_int_float(i: i64, f: f64) -> bool {
    if f.is_nan() {
        return false;
    }
    if f >= 9_223_372_036_854_775_808.0 {
        return true;
    }
    if f < -9_223_372_036_854_775_808.0 {
        return false;
    }
    // f in i64 range: compare against ceil(f)
    i < f.ceil() as i64
}

fn le_int_float(i: i64, f: f64) -> bool {
    if f.is_nan() {
        return false;
    }
    if f >= 9_223_372_036_854_775_808.0 {
        return true;
    }
    if f < -9_223_372_036_854_775_808.0 {
        return false;
    }
    i <= f.floor() as i64
}

fn lt_float_int(f: f64, i: i64) -> bool {
    if f.is_nan() {
        return false;
    }
    if f >= 9_223_372_036_854_775_808.0 {
        return false;
    }
    if f < -9_223_372_036_854_775_808.0 {
        return true;
    }
    (f.floor() as i64) < i
}

fn le_float_int(f: f64, i: i64) -> bool {
    if f.is_nan() {
        return false;
    }
    if f >= 9_223_372_036_854_775_808.0 {
        return false;
    }
    if f < -9_223_372_036_854_775_808.0 {
        return true;
    }
    (f.ceil() as i64) <= i
}

fn compare_error(a: &LuaValue, b: &LuaValue) -> LuaError {
    let (ta, tb) = (a.type_name(), b.type_name());
    if ta == tb {
        LuaError::type_error(format!("attempt to compare two {} values", ta))
    } else {
        LuaError::type_error(format!("attempt to compare {} with {}", ta, tb))
    }
}

/// `a < b`: numbers with numbers, strings with strings.
pub fn less_than(a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    match (a, b) {
        (LuaValue::Integer(x), LuaValue::Integer(y)) => Ok(x < y),
        (LuaValue::Float(x), LuaValue::Float(y)) => Ok(x < y),
        (LuaValue::Integer(x), LuaValue::Float(y)) => Ok(lt_int_float(*x, *y)),
        (LuaValue::Float(x), LuaValue::Integer(y)) => Ok(lt_float_int(*x, *y)),
        (LuaValue::String(x), LuaValue::String(y)) => Ok(x < y),
        _ => Err(compare_error(a, b)),
    }
}

/// `a <= b`: numbers with numbers, strings with strings.
pub fn less_equal(a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    match (a, b) {
        (LuaValue::Integer(x), LuaValue::Integer(y)) => Ok(x <= y),
        (LuaValue::Float(x), LuaValue::Float(y)) => Ok(x <= y),
        (LuaValue::Integer(x), LuaValue::Float(y)) => Ok(le_int_float(*x, *y)),
        (LuaValue::Float(x), LuaValue::Integer(y)) => Ok(le_float_int(*x, *y)),
        (LuaValue::String(x), LuaValue::String(y)) => Ok(x <= y),
        _ => Err(compare_error(a, b)),
    }
}

/// The `#` operator.
pub fn length(v: &LuaValue) -> LuaResult<LuaValue> {
    match v {
        LuaValue::String(s) => Ok(LuaValue::Integer(s.len() as i64)),
        LuaValue::Table(t) => Ok(LuaValue::Integer(t.borrow().length())),
        _ => Err(LuaError::type_error(format!(
            "attempt to get length of a {} value",
            v.type_name()
        ))),
    }
}

/// Concatenate strings and numbers into one byte string.
pub fn concat(values: &[LuaValue]) -> LuaResult<LuaString> {
    let mut buf = Vec::new();
    for v in values {
        match v.to_lua_string() {
            Some(s) => buf.extend_from_slice(s.as_bytes()),
            None => {
                return Err(LuaError::type_error(format!(
                    "attempt to concatenate a {} value",
                    v.type_name()
                )));
            }
        }
    }
    Ok(LuaString::from(buf))
}
