use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::LuaValue;
use super::lua_number::{str_to_float, str_to_integer};
use crate::lua_vm::lua_limits::LUAI_MAXSHORTLEN;

/// Immutable Lua byte string.
///
/// The shared buffer keeps the trailing NUL that binary chunks count in
/// their size prefix; `len()` and `as_bytes()` exclude it. Equality,
/// ordering and hashing are by content.
#[derive(Clone)]
pub struct LuaString {
    buf: Rc<[u8]>,
}

impl LuaString {
    pub fn new(bytes: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(bytes.len() + 1);
        buf.extend_from_slice(bytes);
        buf.push(0);
        Self { buf: buf.into() }
    }

    pub fn empty() -> Self {
        Self::new(b"")
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.buf.len() - 1]
    }

    /// Internal buffer including the trailing NUL.
    #[inline]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short strings (<= 40 bytes) are serialized with the short-string tag.
    #[inline]
    pub fn is_short(&self) -> bool {
        self.len() <= LUAI_MAXSHORTLEN
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    pub fn try_parse_integer(&self) -> Option<i64> {
        str_to_integer(self.as_str()?)
    }

    pub fn try_parse_float(&self) -> Option<f64> {
        str_to_float(self.as_str()?)
    }

    /// String-to-number coercion: integer numerals stay integers.
    pub fn to_number(&self) -> Option<LuaValue> {
        if let Some(i) = self.try_parse_integer() {
            return Some(LuaValue::Integer(i));
        }
        self.try_parse_float().map(LuaValue::Float)
    }

    /// Byte concatenation.
    pub fn concat(&self, other: &LuaString) -> LuaString {
        let mut buf = Vec::with_capacity(self.len() + other.len() + 1);
        buf.extend_from_slice(self.as_bytes());
        buf.extend_from_slice(other.as_bytes());
        LuaString::from(buf)
    }

    pub fn ptr_eq(&self, other: &LuaString) -> bool {
        Rc::ptr_eq(&self.buf, &other.buf)
    }
}

impl PartialEq for LuaString {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.buf == other.buf
    }
}

impl Eq for LuaString {}

impl PartialOrd for LuaString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LuaString {
    /// Byte-lexicographic, then shorter first.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for LuaString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Display for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

impl fmt::Debug for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_str_lossy())
    }
}

impl From<&str> for LuaString {
    fn from(s: &str) -> Self {
        LuaString::new(s.as_bytes())
    }
}

impl From<String> for LuaString {
    fn from(s: String) -> Self {
        LuaString::from(s.into_bytes())
    }
}

impl From<&[u8]> for LuaString {
    fn from(bytes: &[u8]) -> Self {
        LuaString::new(bytes)
    }
}

impl From<Vec<u8>> for LuaString {
    fn from(mut bytes: Vec<u8>) -> Self {
        bytes.push(0);
        LuaString { buf: bytes.into() }
    }
}
