// UTF-8 library
// Implements: char, charpattern, codes, codepoint, len, offset
// Works on raw bytes with Lua 5.3 decoding rules (surrogates accepted,
// overlong forms and code points above 0x10FFFF rejected).

use crate::lib_registry::{
    LibraryModule, arg_error, check_integer, check_string, opt_integer,
};
use crate::lua_value::{LuaString, LuaValue};
use crate::lua_vm::{LuaError, LuaResult, LuaVM};

const MAXUNICODE: u32 = 0x10FFFF;

pub fn create_utf8_lib() -> LibraryModule {
    crate::lib_module!("utf8", {
        "char" => utf8_char,
        "codepoint" => utf8_codepoint,
        "codes" => utf8_codes,
        "len" => utf8_len,
        "offset" => utf8_offset,
    })
    .with_value("charpattern", |_vm| {
        LuaValue::String(LuaString::from(&b"[\0-\x7F\xC2-\xF4][\x80-\xBF]*"[..]))
    })
}

fn u_posrelat(pos: i64, len: usize) -> i64 {
    if pos >= 0 {
        pos
    } else if pos.unsigned_abs() > len as u64 {
        0
    } else {
        len as i64 + pos + 1
    }
}

#[inline]
fn is_cont(bytes: &[u8], i: usize) -> bool {
    bytes.get(i).is_some_and(|b| b & 0xC0 == 0x80)
}

/// Decode one sequence at `pos`; returns the code point and its byte length.
fn decode(bytes: &[u8], pos: usize) -> Option<(u32, usize)> {
    const LIMITS: [u32; 4] = [0xFF, 0x7F, 0x7FF, 0xFFFF];
    let mut c = *bytes.get(pos)? as u32;
    if c < 0x80 {
        return Some((c, 1));
    }
    let mut res: u32 = 0;
    let mut count = 0;
    while c & 0x40 != 0 {
        count += 1;
        let cc = *bytes.get(pos + count)? as u32;
        if cc & 0xC0 != 0x80 {
            return None;
        }
        res = (res << 6) | (cc & 0x3F);
        c <<= 1;
    }
    if count > 3 {
        return None;
    }
    res |= (c & 0x7F) << (count * 5);
    if res > MAXUNICODE || res < LIMITS[count] {
        return None;
    }
    Some((res, count + 1))
}

fn encode(code: u32, out: &mut Vec<u8>) {
    match code {
        0..=0x7F => out.push(code as u8),
        0x80..=0x7FF => {
            out.push(0xC0 | (code >> 6) as u8);
            out.push(0x80 | (code & 0x3F) as u8);
        }
        0x800..=0xFFFF => {
            out.push(0xE0 | (code >> 12) as u8);
            out.push(0x80 | ((code >> 6) & 0x3F) as u8);
            out.push(0x80 | (code & 0x3F) as u8);
        }
        _ => {
            out.push(0xF0 | (code >> 18) as u8);
            out.push(0x80 | ((code >> 12) & 0x3F) as u8);
            out.push(0x80 | ((code >> 6) & 0x3F) as u8);
            out.push(0x80 | (code & 0x3F) as u8);
        }
    }
}

/// utf8.char(...) - Encode code points into a string
fn utf8_char(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut buf = Vec::new();
    for i in 1..=args.len() {
        let code = check_integer(args, i, "char")?;
        if code < 0 || code > MAXUNICODE as i64 {
            return Err(arg_error(i, "char", "value out of range"));
        }
        encode(code as u32, &mut buf);
    }
    Ok(vec![LuaValue::String(LuaString::from(buf))])
}

/// utf8.len(s [, i [, j]]) - Number of characters, or nil plus the
/// position of the first invalid byte
fn utf8_len(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "len")?;
    let bytes = s.as_bytes();
    let len = bytes.len();
    let posi = u_posrelat(opt_integer(args, 2, "len", 1)?, len);
    let posj = u_posrelat(opt_integer(args, 3, "len", -1)?, len);
    if posi < 1 || posi - 1 > len as i64 {
        return Err(arg_error(2, "len", "initial position out of string"));
    }
    if posj - 1 >= len as i64 {
        return Err(arg_error(3, "len", "final position out of string"));
    }

    let mut pos = (posi - 1) as usize;
    let mut n = 0;
    while (pos as i64) < posj {
        match decode(bytes, pos) {
            Some((_, size)) => pos += size,
            None => return Ok(vec![LuaValue::Nil, LuaValue::Integer(pos as i64 + 1)]),
        }
        n += 1;
    }
    Ok(vec![LuaValue::Integer(n)])
}

/// utf8.codepoint(s [, i [, j]]) - Code points of all characters in s[i..j]
fn utf8_codepoint(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "codepoint")?;
    let bytes = s.as_bytes();
    let posi = u_posrelat(opt_integer(args, 2, "codepoint", 1)?, bytes.len());
    let pose = u_posrelat(opt_integer(args, 3, "codepoint", posi)?, bytes.len());
    if posi < 1 {
        return Err(arg_error(2, "codepoint", "out of range"));
    }
    if pose > bytes.len() as i64 {
        return Err(arg_error(3, "codepoint", "out of range"));
    }
    if posi > pose {
        return Ok(Vec::new());
    }

    let mut codes = Vec::new();
    let mut pos = (posi - 1) as usize;
    while (pos as i64) < pose {
        let (code, size) =
            decode(bytes, pos).ok_or_else(|| LuaError::runtime("invalid UTF-8 code"))?;
        codes.push(LuaValue::Integer(code as i64));
        pos += size;
    }
    Ok(codes)
}

/// utf8.offset(s, n [, i]) - Byte position where the n-th character
/// (counting from position i) starts
fn utf8_offset(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "offset")?;
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut n = check_integer(args, 2, "offset")?;
    let default_i = if n >= 0 { 1 } else { len as i64 + 1 };
    let posi = u_posrelat(opt_integer(args, 3, "offset", default_i)?, len);
    if posi < 1 || posi - 1 > len as i64 {
        return Err(arg_error(3, "offset", "position out of range"));
    }
    let mut pos = (posi - 1) as usize;

    if n == 0 {
        // start of the character containing byte i
        while pos > 0 && is_cont(bytes, pos) {
            pos -= 1;
        }
    } else {
        if is_cont(bytes, pos) {
            return Err(LuaError::runtime("initial position is a continuation byte"));
        }
        if n < 0 {
            while n < 0 && pos > 0 {
                pos -= 1;
                while pos > 0 && is_cont(bytes, pos) {
                    pos -= 1;
                }
                n += 1;
            }
        } else {
            n -= 1;
            while n > 0 && pos < len {
                pos += 1;
                while is_cont(bytes, pos) {
                    pos += 1;
                }
                n -= 1;
            }
        }
    }

    if n == 0 {
        Ok(vec![LuaValue::Integer(pos as i64 + 1)])
    } else {
        Ok(vec![LuaValue::Nil])
    }
}

/// utf8.codes(s) - Iterator yielding (position, code point)
fn utf8_codes(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "codes")?;
    Ok(vec![
        LuaValue::external_function(utf8_codes_next),
        LuaValue::String(s),
        LuaValue::Integer(0),
    ])
}

fn utf8_codes_next(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(args, 1, "codes")?;
    let bytes = s.as_bytes();
    let len = bytes.len() as i64;
    let mut n = check_integer(args, 2, "codes")?.saturating_sub(1);
    if n < 0 {
        n = 0;
    } else if n < len {
        n += 1;
        while is_cont(bytes, n as usize) {
            n += 1;
        }
    }
    if n >= len {
        return Ok(vec![LuaValue::Nil]);
    }

    match decode(bytes, n as usize) {
        Some((code, size)) if !is_cont(bytes, n as usize + size) => Ok(vec![
            LuaValue::Integer(n + 1),
            LuaValue::Integer(code as i64),
        ]),
        _ => Err(LuaError::runtime("invalid UTF-8 code")),
    }
}
