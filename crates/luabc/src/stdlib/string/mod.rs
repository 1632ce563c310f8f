// String library
// Implements: byte, char, find, format, len, lower, rep, reverse, sub, upper
// gmatch, gsub, match, pack, packsize and unpack need the pattern / packing
// engines and raise an unsupported error.
mod string_format;

use crate::lib_registry::{
    LibraryModule, arg_error, check_integer, check_string, get_arg, opt_integer, opt_string,
};
use crate::lua_value::{LuaString, LuaValue};
use crate::lua_vm::lua_limits::MAX_STRING_SIZE;
use crate::lua_vm::{LuaError, LuaResult, LuaVM};

pub fn create_string_lib() -> LibraryModule {
    crate::lib_module!("string", {
        "byte" => string_byte,
        "char" => string_char,
        "find" => string_find,
        "format" => string_format::string_format,
        "gmatch" => string_gmatch,
        "gsub" => string_gsub,
        "len" => string_len,
        "lower" => string_lower,
        "match" => string_match,
        "pack" => string_pack,
        "packsize" => string_packsize,
        "rep" => string_rep,
        "reverse" => string_reverse,
        "sub" => string_sub,
        "unpack" => string_unpack,
        "upper" => string_upper,
    })
}

/// Relative string position: negative counts from the end, clamped to 0.
fn posrelat(pos: i64, len: usize) -> i64 {
    if pos >= 0 {
        pos
    } else if pos.unsigned_abs() > len as u64 {
        0
    } else {
        len as i64 + pos + 1
    }
}

fn string_result(bytes: Vec<u8>) -> LuaResult<Vec<LuaValue>> {
    Ok(vec![LuaValue::String(LuaString::from(bytes))])
}

/// string.byte(s [, i [, j]]) - Return byte values
fn string_byte(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "byte")?;
    let bytes = s.as_bytes();
    let i = opt_integer(args, 2, "byte", 1)?;
    let first = posrelat(i, bytes.len());
    let end = posrelat(opt_integer(args, 3, "byte", first)?, bytes.len()).min(bytes.len() as i64);
    let start = first.max(1);
    if start > end {
        return Ok(Vec::new());
    }
    Ok(bytes[(start - 1) as usize..end as usize]
        .iter()
        .map(|b| LuaValue::Integer(*b as i64))
        .collect())
}

/// string.char(...) - Convert bytes to string
fn string_char(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut buf = Vec::with_capacity(args.len());
    for i in 1..=args.len() {
        let c = check_integer(args, i, "char")?;
        let byte = u8::try_from(c).map_err(|_| arg_error(i, "char", "value out of range"))?;
        buf.push(byte);
    }
    string_result(buf)
}

const SPECIALS: &[u8] = b"^$*+?.([%-";

/// string.find(s, pattern [, init [, plain]]) - Plain substring search only
fn string_find(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "find")?;
    let pattern = check_string(args, 2, "find")?;
    let haystack = s.as_bytes();
    let needle = pattern.as_bytes();

    let init = posrelat(opt_integer(args, 3, "find", 1)?, haystack.len()).max(1);
    if init > haystack.len() as i64 + 1 {
        return Ok(vec![LuaValue::Nil]);
    }

    let plain = get_arg(args, 4).is_truthy();
    if !plain && needle.iter().any(|b| SPECIALS.contains(b)) {
        return Err(LuaError::unsupported("string pattern matching"));
    }

    let from = (init - 1) as usize;
    let found = if needle.is_empty() {
        Some(from)
    } else {
        haystack[from..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|p| p + from)
    };
    match found {
        Some(start) => Ok(vec![
            LuaValue::Integer(start as i64 + 1),
            LuaValue::Integer((start + needle.len()) as i64),
        ]),
        None => Ok(vec![LuaValue::Nil]),
    }
}

fn string_len(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "len")?;
    Ok(vec![LuaValue::Integer(s.len() as i64)])
}

fn string_lower(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "lower")?;
    string_result(s.as_bytes().to_ascii_lowercase())
}

fn string_upper(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "upper")?;
    string_result(s.as_bytes().to_ascii_uppercase())
}

/// string.rep(s, n [, sep])
fn string_rep(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "rep")?;
    let n = check_integer(args, 2, "rep")?;
    let sep = opt_string(args, 3, "rep", "")?;
    if n <= 0 {
        return string_result(Vec::new());
    }

    let n = n as u64;
    let total = (s.len() as u64)
        .checked_add(sep.len() as u64)
        .and_then(|unit| unit.checked_mul(n))
        .filter(|total| *total <= MAX_STRING_SIZE as u64)
        .ok_or_else(|| LuaError::runtime("resulting string too large"))?;

    let mut buf = Vec::with_capacity(total as usize);
    for i in 0..n {
        if i > 0 {
            buf.extend_from_slice(sep.as_bytes());
        }
        buf.extend_from_slice(s.as_bytes());
    }
    string_result(buf)
}

fn string_reverse(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "reverse")?;
    let mut bytes = s.as_bytes().to_vec();
    bytes.reverse();
    string_result(bytes)
}

/// string.sub(s [, i [, j]])
fn string_sub(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "sub")?;
    let len = s.len();
    let start = posrelat(opt_integer(args, 2, "sub", 1)?, len).max(1);
    let end = posrelat(opt_integer(args, 3, "sub", -1)?, len).min(len as i64);
    if start > end {
        return string_result(Vec::new());
    }
    string_result(s.as_bytes()[(start - 1) as usize..end as usize].to_vec())
}

fn string_gmatch(_vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    Err(LuaError::unsupported("string.gmatch (pattern matching)"))
}

fn string_gsub(_vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    Err(LuaError::unsupported("string.gsub (pattern matching)"))
}

fn string_match(_vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    Err(LuaError::unsupported("string.match (pattern matching)"))
}

fn string_pack(_vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    Err(LuaError::unsupported("string.pack"))
}

fn string_packsize(_vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    Err(LuaError::unsupported("string.packsize"))
}

fn string_unpack(_vm: &mut LuaVM, _args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    Err(LuaError::unsupported("string.unpack"))
}
