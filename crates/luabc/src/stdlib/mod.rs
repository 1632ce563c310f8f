// Lua 5.3 standard libraries (the subset without metatables or coroutines)

pub mod basic;
pub mod math;
mod sort_table;
pub mod string;
pub mod table;
pub mod utf8;

use crate::lib_registry::LibraryRegistry;
use crate::lua_vm::{LuaResult, LuaVM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stdlib {
    Basic,
    Math,
    String,
    Table,
    Utf8,

    All,
}

pub fn open_lib(vm: &mut LuaVM, lib: Stdlib) -> LuaResult<()> {
    let mut registry = LibraryRegistry::new();
    match lib {
        Stdlib::Basic => registry.register(basic::create_basic_lib()),
        Stdlib::Math => registry.register(math::create_math_lib()),
        Stdlib::String => registry.register(string::create_string_lib()),
        Stdlib::Table => registry.register(table::create_table_lib()),
        Stdlib::Utf8 => registry.register(utf8::create_utf8_lib()),
        Stdlib::All => return create_standard_registry().load_all(vm),
    }
    registry.load_all(vm)
}

/// Registry holding every standard library, in load order.
pub fn create_standard_registry() -> LibraryRegistry {
    let mut registry = LibraryRegistry::new();
    registry.register(basic::create_basic_lib());
    registry.register(string::create_string_lib());
    registry.register(table::create_table_lib());
    registry.register(math::create_math_lib());
    registry.register(utf8::create_utf8_lib());
    registry
}
