// Math library
// Implements: abs, acos, asin, atan, ceil, cos, deg, exp, floor, fmod,
// log, max, min, modf, rad, random, randomseed, sin, sqrt, tan, tointeger,
// type, ult, pi, huge, maxinteger, mininteger

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::lib_registry::{
    LibraryModule, arg_error, check_float, check_integer, check_number, get_arg, require_arg,
};
use crate::lua_value::{LuaValue, float_to_integer, less_than};
use crate::lua_vm::{LuaError, LuaResult, LuaVM};

pub fn create_math_lib() -> LibraryModule {
    let mut module = crate::lib_module!("math", {
        "abs" => math_abs,
        "acos" => math_acos,
        "asin" => math_asin,
        "atan" => math_atan,
        "ceil" => math_ceil,
        "cos" => math_cos,
        "deg" => math_deg,
        "exp" => math_exp,
        "floor" => math_floor,
        "fmod" => math_fmod,
        "log" => math_log,
        "max" => math_max,
        "min" => math_min,
        "modf" => math_modf,
        "rad" => math_rad,
        "sin" => math_sin,
        "sqrt" => math_sqrt,
        "tan" => math_tan,
        "tointeger" => math_tointeger,
        "type" => math_type,
        "ult" => math_ult,
    });

    // random and randomseed share one generator owned by this library instance
    let rng = Rc::new(RefCell::new(StdRng::from_entropy()));
    let random_rng = rng.clone();
    module = module.with_shared(
        "random",
        LuaValue::external_function(move |_vm, args| math_random(&random_rng, args)),
    );
    module = module.with_shared(
        "randomseed",
        LuaValue::external_action(move |_vm, args| {
            let seed = match check_number(args, 1, "randomseed")? {
                LuaValue::Integer(i) => i as u64,
                n => n.as_float().unwrap_or_default().to_bits(),
            };
            *rng.borrow_mut() = StdRng::seed_from_u64(seed);
            Ok(())
        }),
    );

    module = module.with_value("pi", |_vm| LuaValue::Float(std::f64::consts::PI));
    module = module.with_value("huge", |_vm| LuaValue::Float(f64::INFINITY));
    module = module.with_value("maxinteger", |_vm| LuaValue::Integer(i64::MAX));
    module = module.with_value("mininteger", |_vm| LuaValue::Integer(i64::MIN));

    module
}

fn float_result(x: f64) -> LuaResult<Vec<LuaValue>> {
    Ok(vec![LuaValue::Float(x)])
}

/// Float that fits an integer becomes one (floor/ceil results).
fn float_to_value(f: f64) -> LuaValue {
    match float_to_integer(f) {
        Some(i) => LuaValue::Integer(i),
        None => LuaValue::Float(f),
    }
}

fn math_abs(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    match check_number(args, 1, "abs")? {
        LuaValue::Integer(i) => Ok(vec![LuaValue::Integer(i.wrapping_abs())]),
        n => float_result(n.as_float().unwrap_or_default().abs()),
    }
}

fn math_acos(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    float_result(check_float(args, 1, "acos")?.acos())
}

fn math_asin(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    float_result(check_float(args, 1, "asin")?.asin())
}

fn math_atan(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let y = check_float(args, 1, "atan")?;
    let x = if get_arg(args, 2).is_nil() {
        1.0
    } else {
        check_float(args, 2, "atan")?
    };
    float_result(y.atan2(x))
}

fn math_ceil(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    match check_number(args, 1, "ceil")? {
        LuaValue::Integer(i) => Ok(vec![LuaValue::Integer(i)]),
        n => Ok(vec![float_to_value(n.as_float().unwrap_or_default().ceil())]),
    }
}

fn math_cos(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    float_result(check_float(args, 1, "cos")?.cos())
}

fn math_deg(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    float_result(check_float(args, 1, "deg")?.to_degrees())
}

fn math_exp(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    float_result(check_float(args, 1, "exp")?.exp())
}

fn math_floor(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    match check_number(args, 1, "floor")? {
        LuaValue::Integer(i) => Ok(vec![LuaValue::Integer(i)]),
        n => Ok(vec![float_to_value(n.as_float().unwrap_or_default().floor())]),
    }
}

/// fmod(x, y) - Truncated remainder (sign follows the dividend)
fn math_fmod(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let a = check_number(args, 1, "fmod")?;
    let b = check_number(args, 2, "fmod")?;
    if let (LuaValue::Integer(x), LuaValue::Integer(y)) = (&a, &b) {
        return match *y {
            0 => Err(arg_error(2, "fmod", "zero")),
            // avoids the i64::MIN % -1 overflow
            -1 => Ok(vec![LuaValue::Integer(0)]),
            y => Ok(vec![LuaValue::Integer(x % y)]),
        };
    }
    let x = a.as_float().unwrap_or_default();
    let y = b.as_float().unwrap_or_default();
    float_result(x % y)
}

fn math_log(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let x = check_float(args, 1, "log")?;
    if get_arg(args, 2).is_nil() {
        return float_result(x.ln());
    }
    let base = check_float(args, 2, "log")?;
    let r = if base == 2.0 {
        x.log2()
    } else if base == 10.0 {
        x.log10()
    } else {
        x.ln() / base.ln()
    };
    float_result(r)
}

fn math_max(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut best = check_number(args, 1, "max")?;
    for i in 2..=args.len() {
        let n = check_number(args, i, "max")?;
        if less_than(&best, &n)? {
            best = n;
        }
    }
    Ok(vec![best])
}

fn math_min(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut best = check_number(args, 1, "min")?;
    for i in 2..=args.len() {
        let n = check_number(args, i, "min")?;
        if less_than(&n, &best)? {
            best = n;
        }
    }
    Ok(vec![best])
}

/// modf(x) - Integral part and fractional part; integers are their own integral part
fn math_modf(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    match check_number(args, 1, "modf")? {
        LuaValue::Integer(i) => Ok(vec![LuaValue::Integer(i), LuaValue::Float(0.0)]),
        n => {
            let x = n.as_float().unwrap_or_default();
            let ip = x.trunc();
            let frac = if x.is_infinite() { 0.0 } else { x - ip };
            Ok(vec![LuaValue::Float(ip), LuaValue::Float(frac)])
        }
    }
}

fn math_rad(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    float_result(check_float(args, 1, "rad")?.to_radians())
}

/// random([m [, n]])
fn math_random(rng: &RefCell<StdRng>, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut rng = rng.borrow_mut();
    let (low, up) = match args.len() {
        0 => return float_result(rng.gen_range(0.0..1.0)),
        1 => (1, check_integer(args, 1, "random")?),
        2 => (
            check_integer(args, 1, "random")?,
            check_integer(args, 2, "random")?,
        ),
        _ => return Err(LuaError::runtime("wrong number of arguments")),
    };
    if low > up {
        return Err(arg_error(args.len(), "random", "interval is empty"));
    }
    Ok(vec![LuaValue::Integer(rng.gen_range(low..=up))])
}

fn math_sin(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    float_result(check_float(args, 1, "sin")?.sin())
}

fn math_sqrt(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    float_result(check_float(args, 1, "sqrt")?.sqrt())
}

fn math_tan(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    float_result(check_float(args, 1, "tan")?.tan())
}

fn math_tointeger(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = require_arg(args, 1, "tointeger")?;
    Ok(vec![value.to_integer().map(LuaValue::Integer).unwrap_or_default()])
}

fn math_type(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = require_arg(args, 1, "type")?;
    let name = match value {
        LuaValue::Integer(_) => LuaValue::string("integer"),
        LuaValue::Float(_) => LuaValue::string("float"),
        _ => LuaValue::Nil,
    };
    Ok(vec![name])
}

/// ult(m, n) - Unsigned comparison
fn math_ult(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let m = check_integer(args, 1, "ult")?;
    let n = check_integer(args, 2, "ult")?;
    Ok(vec![LuaValue::Boolean((m as u64) < (n as u64))])
}
