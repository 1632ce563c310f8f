use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::lua_number::float_to_string;
use super::{LuaClosure, LuaString, LuaTable, NativeAction, NativeFunction};
use crate::lua_vm::{LuaResult, LuaVM};

pub type LuaTableRef = Rc<RefCell<LuaTable>>;

/// Lua dynamic value.
///
/// Strings, tables and functions are shared by reference; cloning a value
/// never copies the referenced object.
#[derive(Clone, Default)]
pub enum LuaValue {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(LuaString),
    Table(LuaTableRef),
    Function(Rc<LuaClosure>),
    ExternalFunction(NativeFunction),
    ExternalAction(NativeAction),
}

impl LuaValue {
    // ============ Constructors ============

    #[inline(always)]
    pub const fn nil() -> Self {
        LuaValue::Nil
    }

    #[inline(always)]
    pub const fn boolean(b: bool) -> Self {
        LuaValue::Boolean(b)
    }

    #[inline(always)]
    pub const fn integer(i: i64) -> Self {
        LuaValue::Integer(i)
    }

    #[inline(always)]
    pub const fn float(n: f64) -> Self {
        LuaValue::Float(n)
    }

    pub fn string(s: impl Into<LuaString>) -> Self {
        LuaValue::String(s.into())
    }

    pub fn table(table: LuaTable) -> Self {
        LuaValue::Table(Rc::new(RefCell::new(table)))
    }

    pub fn new_table() -> Self {
        Self::table(LuaTable::new(0, 0))
    }

    pub fn closure(closure: LuaClosure) -> Self {
        LuaValue::Function(Rc::new(closure))
    }

    pub fn external_function(
        f: impl Fn(&mut LuaVM, &[LuaValue]) -> LuaResult<Vec<LuaValue>> + 'static,
    ) -> Self {
        LuaValue::ExternalFunction(Rc::new(f))
    }

    pub fn external_action(f: impl Fn(&mut LuaVM, &[LuaValue]) -> LuaResult<()> + 'static) -> Self {
        LuaValue::ExternalAction(Rc::new(f))
    }

    // ============ Type checks ============

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    #[inline(always)]
    pub fn is_boolean(&self) -> bool {
        matches!(self, LuaValue::Boolean(_))
    }

    #[inline(always)]
    pub fn is_integer(&self) -> bool {
        matches!(self, LuaValue::Integer(_))
    }

    #[inline(always)]
    pub fn is_float(&self) -> bool {
        matches!(self, LuaValue::Float(_))
    }

    #[inline(always)]
    pub fn is_number(&self) -> bool {
        matches!(self, LuaValue::Integer(_) | LuaValue::Float(_))
    }

    #[inline(always)]
    pub fn is_nan(&self) -> bool {
        matches!(self, LuaValue::Float(f) if f.is_nan())
    }

    #[inline(always)]
    pub fn is_string(&self) -> bool {
        matches!(self, LuaValue::String(_))
    }

    #[inline(always)]
    pub fn is_table(&self) -> bool {
        matches!(self, LuaValue::Table(_))
    }

    #[inline(always)]
    pub fn is_function(&self) -> bool {
        matches!(
            self,
            LuaValue::Function(_) | LuaValue::ExternalFunction(_) | LuaValue::ExternalAction(_)
        )
    }

    // ============ Accessors (no coercion) ============

    #[inline(always)]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            LuaValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integers, and floats with an exact integer representation.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            LuaValue::Integer(i) => Some(*i),
            LuaValue::Float(f) => float_to_integer(*f),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_integer_strict(&self) -> Option<i64> {
        match self {
            LuaValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            LuaValue::Float(f) => Some(*f),
            LuaValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_lua_string(&self) -> Option<&LuaString> {
        match self {
            LuaValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_lua_string().and_then(|s| s.as_str())
    }

    #[inline(always)]
    pub fn as_table(&self) -> Option<&LuaTableRef> {
        match self {
            LuaValue::Table(t) => Some(t),
            _ => None,
        }
    }

    // ============ Coercions ============

    /// Numbers pass through, numeric strings parse; everything else fails.
    pub fn to_number(&self) -> Option<LuaValue> {
        match self {
            LuaValue::Integer(_) | LuaValue::Float(_) => Some(self.clone()),
            LuaValue::String(s) => s.to_number(),
            _ => None,
        }
    }

    pub fn to_float(&self) -> Option<f64> {
        self.to_number().and_then(|n| n.as_float())
    }

    /// `lua_tointeger`: exact conversion only, strings coerced.
    pub fn to_integer(&self) -> Option<i64> {
        self.to_number().and_then(|n| n.as_integer())
    }

    /// Strings as-is, numbers rendered the way `tostring` does.
    pub fn to_lua_string(&self) -> Option<LuaString> {
        match self {
            LuaValue::String(s) => Some(s.clone()),
            LuaValue::Integer(i) => Some(LuaString::from(itoa::Buffer::new().format(*i))),
            LuaValue::Float(f) => Some(LuaString::from(float_to_string(*f))),
            _ => None,
        }
    }

    // ============ Truthiness (Lua semantics) ============

    /// Only nil and false are falsy; NaN is truthy.
    #[inline(always)]
    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    #[inline(always)]
    pub fn is_falsy(&self) -> bool {
        matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    // ============ Type name ============

    pub fn type_name(&self) -> &'static str {
        match self {
            LuaValue::Nil => "nil",
            LuaValue::Boolean(_) => "boolean",
            LuaValue::Integer(_) | LuaValue::Float(_) => "number",
            LuaValue::String(_) => "string",
            LuaValue::Table(_) => "table",
            LuaValue::Function(_) | LuaValue::ExternalFunction(_) | LuaValue::ExternalAction(_) => {
                "function"
            }
        }
    }


    /// Address used for identity-based hashing and `tostring`.
    fn raw_ptr(&self) -> *const u8 {
        match self {
            LuaValue::Table(t) => Rc::as_ptr(t) as *const u8,
            LuaValue::Function(f) => Rc::as_ptr(f) as *const u8,
            LuaValue::ExternalFunction(f) => Rc::as_ptr(f) as *const u8,
            LuaValue::ExternalAction(f) => Rc::as_ptr(f) as *const u8,
            _ => std::ptr::null(),
        }
    }

    /// Table keys: floats with an integral value become integers.
    pub fn normalize_key(self) -> LuaValue {
        match self {
            LuaValue::Float(f) => match float_to_integer(f) {
                Some(i) => LuaValue::Integer(i),
                None => LuaValue::Float(f),
            },
            other => other,
        }
    }
}

/// `lua_numbertointeger`: Some only when `f` has an exact i64 value.
#[inline]
pub fn float_to_integer(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if f >= i64::MIN as f64 && f < -(i64::MIN as f64) && f == f.floor() {
        Some(f as i64)
    } else {
        None
    }
}

/// Integer/float equality by mathematical value.
#[inline]
fn int_eq_float(i: i64, f: f64) -> bool {
    float_to_integer(f) == Some(i)
}

impl PartialEq for LuaValue {
    /// Raw equality: no metamethods, NaN unequal to everything.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Integer(b)) => a == b,
            (LuaValue::Float(a), LuaValue::Float(b)) => a == b,
            (LuaValue::Integer(i), LuaValue::Float(f)) | (LuaValue::Float(f), LuaValue::Integer(i)) => {
                int_eq_float(*i, *f)
            }
            (LuaValue::String(a), LuaValue::String(b)) => a == b,
            (LuaValue::Table(a), LuaValue::Table(b)) => Rc::ptr_eq(a, b),
            (LuaValue::Function(a), LuaValue::Function(b)) => Rc::ptr_eq(a, b),
            (LuaValue::ExternalFunction(_), LuaValue::ExternalFunction(_))
            | (LuaValue::ExternalAction(_), LuaValue::ExternalAction(_)) => {
                std::ptr::eq(self.raw_ptr(), other.raw_ptr())
            }
            _ => false,
        }
    }
}

// Table keys never hold NaN, so equality is reflexive wherever Eq is relied on.
impl Eq for LuaValue {}

impl Hash for LuaValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            LuaValue::Nil => 0u8.hash(state),
            LuaValue::Boolean(b) => b.hash(state),
            LuaValue::Integer(i) => i.hash(state),
            // must agree with Integer for integral floats
            LuaValue::Float(f) => match float_to_integer(*f) {
                Some(i) => i.hash(state),
                None => f.to_bits().hash(state),
            },
            LuaValue::String(s) => s.hash(state),
            _ => self.raw_ptr().hash(state),
        }
    }
}

impl fmt::Display for LuaValue {
    /// `tostring` rendering.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::Nil => f.write_str("nil"),
            LuaValue::Boolean(b) => write!(f, "{}", b),
            LuaValue::Integer(i) => f.write_str(itoa::Buffer::new().format(*i)),
            LuaValue::Float(n) => f.write_str(&float_to_string(*n)),
            LuaValue::String(s) => write!(f, "{}", s),
            LuaValue::Table(_) => write!(f, "table: {:p}", self.raw_ptr()),
            LuaValue::Function(_) => write!(f, "function: {:p}", self.raw_ptr()),
            LuaValue::ExternalFunction(_) | LuaValue::ExternalAction(_) => {
                write!(f, "function: builtin: {:p}", self.raw_ptr())
            }
        }
    }
}

impl fmt::Debug for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::Nil => f.write_str("Nil"),
            LuaValue::Boolean(b) => write!(f, "Boolean({})", b),
            LuaValue::Integer(i) => write!(f, "Integer({})", i),
            LuaValue::Float(n) => write!(f, "Float({:?})", n),
            LuaValue::String(s) => write!(f, "String({:?})", s),
            other => write!(f, "{}", other),
        }
    }
}

impl From<bool> for LuaValue {
    fn from(b: bool) -> Self {
        LuaValue::Boolean(b)
    }
}

impl From<i64> for LuaValue {
    fn from(i: i64) -> Self {
        LuaValue::Integer(i)
    }
}

impl From<f64> for LuaValue {
    fn from(n: f64) -> Self {
        LuaValue::Float(n)
    }
}

impl From<&str> for LuaValue {
    fn from(s: &str) -> Self {
        LuaValue::string(s)
    }
}

impl From<String> for LuaValue {
    fn from(s: String) -> Self {
        LuaValue::string(s)
    }
}

impl From<LuaString> for LuaValue {
    fn from(s: LuaString) -> Self {
        LuaValue::String(s)
    }
}
