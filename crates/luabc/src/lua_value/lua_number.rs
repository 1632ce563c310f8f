// Number <-> text conversions shared by string coercion, tostring and string.format.

/// Parse an integer numeral: optional sign, decimal or `0x` hex digits,
/// surrounding whitespace allowed. Decimal overflow fails (the caller falls
/// back to float); hex numerals wrap around like `lua_Unsigned`.
pub fn str_to_integer(s: &str) -> Option<i64> {
    let s = s.trim_matches(is_lua_space);
    let (neg, rest) = split_sign(s);
    if rest.is_empty() {
        return None;
    }

    if let Some(hex) = strip_hex_prefix(rest) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let mut acc: u64 = 0;
        for b in hex.bytes() {
            acc = acc.wrapping_mul(16).wrapping_add(hex_digit(b) as u64);
        }
        let v = acc as i64;
        return Some(if neg { v.wrapping_neg() } else { v });
    }

    if !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut acc: i64 = 0;
    for b in rest.bytes() {
        let d = (b - b'0') as i64;
        acc = acc.checked_mul(10)?;
        // accumulate negatively so i64::MIN parses
        acc = if neg { acc.checked_sub(d)? } else { acc.checked_add(d)? };
    }
    Some(acc)
}

/// Parse a float numeral: decimal (`1.5`, `.5`, `3e-2`) or hex float
/// (`0x1.8p3`). `inf`/`nan` spellings are rejected.
pub fn str_to_float(s: &str) -> Option<f64> {
    let s = s.trim_matches(is_lua_space);
    let (neg, rest) = split_sign(s);
    if rest.is_empty() || rest.starts_with(['+', '-']) {
        return None;
    }

    let value = if let Some(hex) = strip_hex_prefix(rest) {
        parse_hex_float(hex)?
    } else {
        if !rest
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        {
            return None;
        }
        rest.parse::<f64>().ok()?
    };
    Some(if neg { -value } else { value })
}

/// Parse hexadecimal float digits after the `0x` prefix (e.g. "1.8p+1" = 3.0).
pub fn parse_hex_float(s: &str) -> Option<f64> {
    let (mantissa, exponent) = match s.find(['p', 'P']) {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    };

    let (int_part, frac_part) = match mantissa.find('.') {
        Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut value = 0.0f64;
    for b in int_part.bytes() {
        if !b.is_ascii_hexdigit() {
            return None;
        }
        value = value * 16.0 + hex_digit(b) as f64;
    }
    let mut scale = 1.0 / 16.0;
    for b in frac_part.bytes() {
        if !b.is_ascii_hexdigit() {
            return None;
        }
        value += hex_digit(b) as f64 * scale;
        scale /= 16.0;
    }

    if let Some(exp) = exponent {
        let (exp_neg, digits) = split_sign(exp);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let e: i32 = digits.parse().unwrap_or(i32::MAX);
        value *= 2f64.powi(if exp_neg { -e } else { e });
    }
    Some(value)
}

/// `tonumber(s, base)`: digits of `base` (2..=36, letters either case),
/// optional leading '-', surrounding whitespace allowed. Wraps on overflow.
pub fn str_to_integer_base(s: &str, base: u32) -> Option<i64> {
    let s = s.trim_matches(is_lua_space);
    let (neg, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if rest.is_empty() {
        return None;
    }
    let mut acc: i64 = 0;
    for c in rest.chars() {
        let d = c.to_digit(base)?;
        acc = acc.wrapping_mul(base as i64).wrapping_add(d as i64);
    }
    Some(if neg { acc.wrapping_neg() } else { acc })
}

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    }
}

fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

fn hex_digit(b: u8) -> u32 {
    (b as char).to_digit(16).unwrap_or(0)
}

fn is_lua_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// `tostring` rendering of a float: `%.14g`, plus ".0" when the result
/// would otherwise read as an integer.
pub fn float_to_string(f: f64) -> String {
    let mut s = format_g(f, 14, false, false);
    if s.bytes().all(|b| b == b'-' || b.is_ascii_digit()) {
        s.push_str(".0");
    }
    s
}

/// C `printf("%.*e")`.
pub fn format_e(f: f64, precision: usize, upper: bool) -> String {
    if !f.is_finite() {
        return non_finite(f, upper);
    }
    let raw = format!("{:.*e}", precision, f);
    let (mantissa, exp) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", mantissa, e, sign, exp.abs())
}

/// C `printf("%.*g")`; `alt` keeps trailing zeros (the `#` flag).
pub fn format_g(f: f64, precision: usize, upper: bool, alt: bool) -> String {
    if !f.is_finite() {
        return non_finite(f, upper);
    }
    let p = precision.max(1);
    if f == 0.0 {
        let zero = if alt {
            format!("{:.*}", p - 1, 0.0)
        } else {
            "0".to_string()
        };
        return if f.is_sign_negative() {
            format!("-{}", zero)
        } else {
            zero
        };
    }

    // exponent after rounding to p significant digits
    let sci = format!("{:.*e}", p - 1, f);
    let x: i32 = sci
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    if x < -4 || x >= p as i32 {
        let s = format_e(f, p - 1, upper);
        if alt {
            return s;
        }
        let (mantissa, exp) = s.split_at(s.find(['e', 'E']).unwrap_or(s.len()));
        format!("{}{}", strip_trailing_zeros(mantissa), exp)
    } else {
        let s = format!("{:.*}", (p as i32 - 1 - x).max(0) as usize, f);
        if alt {
            s
        } else {
            strip_trailing_zeros(&s).to_string()
        }
    }
}

/// C `printf("%.*f")`.
pub fn format_f(f: f64, precision: usize, upper: bool) -> String {
    if !f.is_finite() {
        return non_finite(f, upper);
    }
    format!("{:.*}", precision, f)
}

/// C `printf("%a")`: shortest exact hexadecimal form, e.g. `0x1.8p+1`.
pub fn format_hex_float(f: f64, upper: bool) -> String {
    if !f.is_finite() {
        return non_finite(f, upper);
    }
    let bits = f.to_bits();
    let sign = if f.is_sign_negative() { "-" } else { "" };
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let mut mantissa = bits & ((1u64 << 52) - 1);

    let (lead, exp) = match (biased, mantissa) {
        (0, 0) => (0, 0),
        (0, _) => (0, -1022),
        _ => (1, biased - 1023),
    };

    let mut digits = String::new();
    if mantissa != 0 {
        let mut width = 13;
        while mantissa & 0xf == 0 {
            mantissa >>= 4;
            width -= 1;
        }
        digits = format!(".{:0width$x}", mantissa, width = width);
    }
    let exp_sign = if exp < 0 { '-' } else { '+' };
    let s = format!("{}0x{}{}p{}{}", sign, lead, digits, exp_sign, exp.abs());
    if upper { s.to_uppercase() } else { s }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn non_finite(f: f64, upper: bool) -> String {
    let s = if f.is_nan() {
        if f.is_sign_negative() { "-nan" } else { "nan" }
    } else if f > 0.0 {
        "inf"
    } else {
        "-inf"
    };
    if upper {
        s.to_uppercase()
    } else {
        s.to_string()
    }
}
