//! Centralized VM limits and binary-format constants.
//!
//! Mirrors Lua 5.3's `luaconf.h` / `llimits.h` / `lundump.h` values.

// ===== Stack =====

/// Default maximum stack size (number of register slots).
/// Matches Lua 5.3's LUAI_MAXSTACK.
pub const LUAI_MAXSTACK: usize = 1_000_000;

/// Default maximum number of nested Lua frames.
/// Calls never recurse on the host stack, so this only bounds memory.
pub const LUAI_MAXCALLS: usize = 200_000;

/// Maximum nesting of function prototypes in a loaded chunk.
/// Matches Lua 5.3's LUAI_MAXCCALLS, which bounds nesting in the compiler.
pub const LUAI_MAXCCALLS: usize = 200;

/// Initial register stack capacity.
pub const BASIC_STACK_SIZE: usize = 2 * LUA_MINSTACK;

/// Matches Lua 5.3's LUA_MINSTACK.
pub const LUA_MINSTACK: usize = 20;

// ===== Strings =====

/// Maximum length for "short" strings.
/// Matches Lua 5.3's LUAI_MAXSHORTLEN.
pub const LUAI_MAXSHORTLEN: usize = 40;

/// Largest string the string library will build (string.rep, string.format).
pub const MAX_STRING_SIZE: usize = i32::MAX as usize;

// ===== Tables =====

/// Number of list items to accumulate before a SETLIST instruction.
pub const LFIELDS_PER_FLUSH: usize = 50;

/// Largest capacity a table reserves up front from a size hint.
pub const MAX_PREALLOC: usize = 1 << 16;

/// Largest power of two usable as an array-part size.
pub const MAXASIZE: usize = 1 << 30;

// ===== Binary chunks =====

pub const LUA_SIGNATURE: &[u8; 4] = b"\x1bLua";
pub const LUAC_VERSION: u8 = 0x53;
pub const LUAC_FORMAT: u8 = 0;
pub const LUAC_DATA: &[u8; 6] = b"\x19\x93\r\n\x1a\n";
pub const LUAC_INT: i64 = 0x5678;
pub const LUAC_NUM: f64 = 370.5;

/// sizeof(int), sizeof(size_t), sizeof(Instruction), sizeof(lua_Integer), sizeof(lua_Number)
pub const LUAC_SIZES: [u8; 5] = [4, 8, 4, 8, 8];
