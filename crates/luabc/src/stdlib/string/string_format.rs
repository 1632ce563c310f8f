// string.format, following C printf conversions as Lua 5.3 exposes them

use crate::lib_registry::{arg_error, check_float, check_integer, check_string, require_arg};
use crate::lua_value::LuaString;
use crate::lua_value::LuaValue;
use crate::lua_value::lua_number::{format_e, format_f, format_g, format_hex_float};
use crate::lua_vm::lua_limits::MAX_STRING_SIZE;
use crate::lua_vm::{LuaError, LuaResult, LuaVM};

/// Parsed `%[flags][width][.precision]` prefix of one conversion.
#[derive(Debug, Default)]
struct FormatSpec {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
}

impl FormatSpec {
    /// Parse the conversion starting right after '%'; returns it with the index of
    /// the conversion character.
    fn parse(fmt: &[u8], mut i: usize) -> LuaResult<(FormatSpec, usize)> {
        let mut spec = FormatSpec::default();
        let flags_start = i;
        while let Some(&c) = fmt.get(i) {
            match c {
                b'-' => spec.left = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'#' => spec.alt = true,
                b'0' => spec.zero = true,
                _ => break,
            }
            i += 1;
        }
        if i - flags_start > 5 {
            return Err(LuaError::runtime("invalid format (repeated flags)"));
        }

        let (width, next) = read_digits(fmt, i)?;
        spec.width = width.unwrap_or(0);
        i = next;
        if fmt.get(i) == Some(&b'.') {
            let (precision, next) = read_digits(fmt, i + 1)?;
            spec.precision = Some(precision.unwrap_or(0));
            i = next;
        }
        Ok((spec, i))
    }
}

/// At most two digits, as C Lua accepts.
fn read_digits(fmt: &[u8], start: usize) -> LuaResult<(Option<usize>, usize)> {
    let mut i = start;
    let mut value = None;
    while let Some(&c) = fmt.get(i) {
        if !c.is_ascii_digit() {
            break;
        }
        if i - start == 2 {
            return Err(LuaError::runtime(
                "invalid format (width or precision too long)",
            ));
        }
        value = Some(value.unwrap_or(0) * 10 + (c - b'0') as usize);
        i += 1;
    }
    Ok((value, i))
}

/// string.format(formatstring, ...)
pub fn string_format(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let format = check_string(args, 1, "format")?;
    let fmt = format.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(fmt.len() + fmt.len() / 2);
    let mut arg = 1;
    let mut i = 0;

    while i < fmt.len() {
        let c = fmt[i];
        i += 1;
        if c != b'%' {
            out.push(c);
            continue;
        }
        if fmt.get(i) == Some(&b'%') {
            out.push(b'%');
            i += 1;
            continue;
        }

        let (spec, conv_at) = FormatSpec::parse(fmt, i)?;
        let Some(&conv) = fmt.get(conv_at) else {
            return Err(LuaError::runtime(
                "invalid conversion '%' to 'format'",
            ));
        };
        i = conv_at + 1;
        arg += 1;

        match conv {
            b'c' => {
                let code = check_integer(args, arg, "format")?;
                pad(&mut out, &spec, "", "", &[code as u8], false);
            }
            b'd' | b'i' => {
                let n = check_integer(args, arg, "format")?;
                let sign = if n < 0 { "-" } else { sign_flag(&spec) };
                let digits = with_precision(n.unsigned_abs().to_string(), &spec);
                pad(&mut out, &spec, sign, "", digits.as_bytes(), spec.precision.is_none());
            }
            b'u' => {
                let n = check_integer(args, arg, "format")? as u64;
                let digits = with_precision(n.to_string(), &spec);
                pad(&mut out, &spec, "", "", digits.as_bytes(), spec.precision.is_none());
            }
            b'o' | b'x' | b'X' => {
                let n = check_integer(args, arg, "format")? as u64;
                let mut digits = match conv {
                    b'o' => format!("{:o}", n),
                    b'x' => format!("{:x}", n),
                    _ => format!("{:X}", n),
                };
                digits = with_precision(digits, &spec);
                let prefix = match conv {
                    b'o' if spec.alt && !digits.starts_with('0') => "0",
                    b'x' if spec.alt && n != 0 => "0x",
                    b'X' if spec.alt && n != 0 => "0X",
                    _ => "",
                };
                pad(&mut out, &spec, "", prefix, digits.as_bytes(), spec.precision.is_none());
            }
            b'e' | b'E' | b'f' | b'F' | b'g' | b'G' => {
                let f = check_float(args, arg, "format")?;
                let upper = conv.is_ascii_uppercase();
                let precision = spec.precision.unwrap_or(6);
                let mut text = match conv.to_ascii_lowercase() {
                    b'e' => format_e(f, precision, upper),
                    b'f' => format_f(f, precision, upper),
                    _ => format_g(f, precision, upper, spec.alt),
                };
                if spec.alt && f.is_finite() && !text.contains('.') && conv.to_ascii_lowercase() != b'g' {
                    let at = text.find(['e', 'E']).unwrap_or(text.len());
                    text.insert(at, '.');
                }
                pad_float(&mut out, &spec, &text, "", f.is_finite());
            }
            b'a' | b'A' => {
                let f = check_float(args, arg, "format")?;
                let text = format_hex_float(f, conv == b'A');
                let prefix = if conv == b'A' { "0X" } else { "0x" };
                pad_float(&mut out, &spec, &text, prefix, f.is_finite());
            }
            b's' => {
                let value = require_arg(args, arg, "format")?;
                let s = vm.tostring(&value);
                let bytes = match spec.precision {
                    Some(p) if p < s.len() => &s.as_bytes()[..p],
                    _ => s.as_bytes(),
                };
                pad(&mut out, &spec, "", "", bytes, false);
            }
            b'q' => {
                let value = require_arg(args, arg, "format")?;
                add_quoted(&mut out, &value, arg)?;
            }
            other => {
                return Err(LuaError::runtime(format!(
                    "invalid option '%{}' to 'format'",
                    other as char
                )));
            }
        }

        if out.len() > MAX_STRING_SIZE {
            return Err(LuaError::runtime("resulting string too large"));
        }
    }

    Ok(vec![LuaValue::String(LuaString::from(out))])
}

fn sign_flag(spec: &FormatSpec) -> &'static str {
    if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

/// Minimum digit count for integer conversions; `%.0d` of 0 prints nothing.
fn with_precision(digits: String, spec: &FormatSpec) -> String {
    match spec.precision {
        Some(0) if digits == "0" => String::new(),
        Some(p) if digits.len() < p => format!("{}{}", "0".repeat(p - digits.len()), digits),
        _ => digits,
    }
}

/// Width padding: spaces on the left (or right with '-'), zeros between
/// sign/prefix and digits with '0'.
fn pad(out: &mut Vec<u8>, spec: &FormatSpec, sign: &str, prefix: &str, body: &[u8], zero_ok: bool) {
    let len = sign.len() + prefix.len() + body.len();
    let fill = spec.width.saturating_sub(len);
    if spec.left {
        out.extend_from_slice(sign.as_bytes());
        out.extend_from_slice(prefix.as_bytes());
        out.extend_from_slice(body);
        out.resize(out.len() + fill, b' ');
    } else if spec.zero && zero_ok {
        out.extend_from_slice(sign.as_bytes());
        out.extend_from_slice(prefix.as_bytes());
        out.resize(out.len() + fill, b'0');
        out.extend_from_slice(body);
    } else {
        out.resize(out.len() + fill, b' ');
        out.extend_from_slice(sign.as_bytes());
        out.extend_from_slice(prefix.as_bytes());
        out.extend_from_slice(body);
    }
}

/// Split a rendered float into sign, optional hex prefix and digits, then pad.
fn pad_float(out: &mut Vec<u8>, spec: &FormatSpec, text: &str, prefix: &str, finite: bool) {
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => (sign_flag(spec), text),
    };
    let (prefix, digits) = match rest.strip_prefix(prefix) {
        Some(digits) if !prefix.is_empty() => (prefix, digits),
        _ => ("", rest),
    };
    pad(out, spec, sign, prefix, digits.as_bytes(), finite);
}

/// `%q`: a value written back as a Lua literal.
fn add_quoted(out: &mut Vec<u8>, value: &LuaValue, arg: usize) -> LuaResult<()> {
    match value {
        LuaValue::String(s) => {
            let bytes = s.as_bytes();
            out.push(b'"');
            for (i, &c) in bytes.iter().enumerate() {
                match c {
                    b'"' | b'\\' | b'\n' => {
                        out.push(b'\\');
                        out.push(c);
                    }
                    c if c.is_ascii_control() => {
                        let next_is_digit = bytes.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                        let escaped = if next_is_digit {
                            format!("\\{:03}", c)
                        } else {
                            format!("\\{}", c)
                        };
                        out.extend_from_slice(escaped.as_bytes());
                    }
                    c => out.push(c),
                }
            }
            out.push(b'"');
        }
        LuaValue::Integer(i) => {
            let text = if *i == i64::MIN {
                "0x8000000000000000".to_string()
            } else {
                i.to_string()
            };
            out.extend_from_slice(text.as_bytes());
        }
        LuaValue::Float(f) => {
            let text = if *f == f64::INFINITY {
                "1e9999".to_string()
            } else if *f == f64::NEG_INFINITY {
                "-1e9999".to_string()
            } else if f.is_nan() {
                "(0/0)".to_string()
            } else {
                format_hex_float(*f, false)
            };
            out.extend_from_slice(text.as_bytes());
        }
        LuaValue::Nil | LuaValue::Boolean(_) => {
            out.extend_from_slice(value.to_string().as_bytes());
        }
        _ => return Err(arg_error(arg, "format", "value has no literal form")),
    }
    Ok(())
}
