// Basic library (_G global functions)
// Implements: print, type, assert, error, tonumber, tostring, select,
// ipairs, pairs, next, rawget, rawset, rawlen, rawequal, _VERSION

use crate::lib_registry::{
    LibraryModule, arg_error, check_integer, check_table, get_arg, opt_integer, require_arg,
};
use crate::lua_value::{LuaString, LuaValue, lua_number::str_to_integer_base};
use crate::lua_vm::{LuaError, LuaResult, LuaVM};

pub fn create_basic_lib() -> LibraryModule {
    crate::lib_module!("_G", {
        "assert" => lua_assert,
        "error" => lua_error,
        "ipairs" => lua_ipairs,
        "next" => lua_next,
        "pairs" => lua_pairs,
        "rawequal" => lua_rawequal,
        "rawget" => lua_rawget,
        "rawlen" => lua_rawlen,
        "rawset" => lua_rawset,
        "select" => lua_select,
        "tonumber" => lua_tonumber,
        "tostring" => lua_tostring,
        "type" => lua_type,
    })
    .with_action("print", lua_print)
    .with_value("_VERSION", |_vm| LuaValue::string("Lua 5.3"))
}

/// print(...) - Write values separated by tabs to the VM output
fn lua_print(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<()> {
    let mut line = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push(b'\t');
        }
        line.extend_from_slice(vm.tostring(arg).as_bytes());
    }
    line.push(b'\n');

    let out = vm.output();
    out.write_all(&line).map_err(print_error)?;
    out.flush().map_err(print_error)
}

fn print_error(e: std::io::Error) -> LuaError {
    LuaError::runtime(format!("print: {}", e))
}

/// type(v) - Return the type of a value as a string
fn lua_type(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = require_arg(args, 1, "type")?;
    Ok(vec![LuaValue::string(value.type_name())])
}

/// assert(v [, message]) - Raise error if v is false or nil
fn lua_assert(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let condition = require_arg(args, 1, "assert")?;
    if condition.is_truthy() {
        return Ok(args.to_vec());
    }
    match args.get(1) {
        Some(message) if !message.is_nil() => Err(LuaError::Runtime(message.clone())),
        _ => Err(LuaError::runtime("assertion failed!")),
    }
}

/// error(message [, level]) - Raise an error with any value as payload.
/// String messages get a position prefix unless level is 0.
fn lua_error(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let message = get_arg(args, 1);
    let level = opt_integer(args, 2, "error", 1)?;
    if let LuaValue::String(s) = &message {
        if level > 0 {
            let prefix = LuaString::from(vm.where_(level as usize));
            return Err(LuaError::Runtime(LuaValue::String(prefix.concat(s))));
        }
    }
    Err(LuaError::Runtime(message))
}

/// tonumber(v [, base])
fn lua_tonumber(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    if get_arg(args, 2).is_nil() {
        let value = require_arg(args, 1, "tonumber")?;
        let n = match &value {
            LuaValue::Integer(_) | LuaValue::Float(_) => value.clone(),
            LuaValue::String(s) => s.to_number().unwrap_or_default(),
            _ => LuaValue::Nil,
        };
        return Ok(vec![n]);
    }

    let base = check_integer(args, 2, "tonumber")?;
    let LuaValue::String(s) = get_arg(args, 1) else {
        return Err(arg_error(
            1,
            "tonumber",
            format!("string expected, got {}", get_arg(args, 1).type_name()),
        ));
    };
    if !(2..=36).contains(&base) {
        return Err(arg_error(2, "tonumber", "base out of range"));
    }
    let n = s
        .as_str()
        .and_then(|text| str_to_integer_base(text, base as u32))
        .map(LuaValue::Integer)
        .unwrap_or_default();
    Ok(vec![n])
}

/// tostring(v)
fn lua_tostring(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = require_arg(args, 1, "tostring")?;
    Ok(vec![LuaValue::String(vm.tostring(&value))])
}

/// select(n, ...) - Arguments after position n, or their count for '#'
fn lua_select(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let rest = args.get(1..).unwrap_or(&[]);
    if let LuaValue::String(s) = get_arg(args, 1) {
        if s.as_bytes() == b"#" {
            return Ok(vec![LuaValue::Integer(rest.len() as i64)]);
        }
    }

    let n = check_integer(args, 1, "select")?;
    let count = rest.len() as i64;
    let start = if n < 0 {
        count + n
    } else if n == 0 {
        return Err(arg_error(1, "select", "index out of range"));
    } else {
        n - 1
    };
    if start < 0 {
        return Err(arg_error(1, "select", "index out of range"));
    }
    Ok(rest.get(start as usize..).unwrap_or(&[]).to_vec())
}

/// ipairs(t) - Iterator over t[1], t[2], ... up to the first nil
fn lua_ipairs(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let t = require_arg(args, 1, "ipairs")?;
    Ok(vec![
        LuaValue::external_function(ipairs_next),
        t,
        LuaValue::Integer(0),
    ])
}

fn ipairs_next(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let t = get_arg(args, 1);
    let i = check_integer(args, 2, "ipairs")?.wrapping_add(1);
    let value = vm.index_value(&t, &LuaValue::Integer(i))?;
    if value.is_nil() {
        Ok(vec![LuaValue::Nil])
    } else {
        Ok(vec![LuaValue::Integer(i), value])
    }
}

/// pairs(t) - Returns next, t, nil
fn lua_pairs(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(args, 1, "pairs")?;
    Ok(vec![
        LuaValue::external_function(lua_next),
        LuaValue::Table(t),
        LuaValue::Nil,
    ])
}

/// next(t [, key]) - Entry after key in traversal order
fn lua_next(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(args, 1, "next")?;
    let key = get_arg(args, 2);
    let entry = t.borrow().next(&key)?;
    match entry {
        Some((k, v)) => Ok(vec![k, v]),
        None => Ok(vec![LuaValue::Nil]),
    }
}

fn lua_rawget(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(args, 1, "rawget")?;
    let key = require_arg(args, 2, "rawget")?;
    let value = t.borrow().get(&key);
    Ok(vec![value])
}

fn lua_rawset(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(args, 1, "rawset")?;
    let key = require_arg(args, 2, "rawset")?;
    let value = require_arg(args, 3, "rawset")?;
    t.borrow_mut().set(key, value)?;
    Ok(vec![LuaValue::Table(t)])
}

fn lua_rawlen(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    match get_arg(args, 1) {
        LuaValue::Table(t) => Ok(vec![LuaValue::Integer(t.borrow().length())]),
        LuaValue::String(s) => Ok(vec![LuaValue::Integer(s.len() as i64)]),
        _ => Err(arg_error(1, "rawlen", "table or string expected")),
    }
}

fn lua_rawequal(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let a = require_arg(args, 1, "rawequal")?;
    let b = require_arg(args, 2, "rawequal")?;
    Ok(vec![LuaValue::Boolean(a == b)])
}
