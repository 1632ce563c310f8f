// Lua 5.3 bytecode interpreter
// Loads precompiled binary chunks and runs them on a register VM

#[cfg(test)]
mod test;

pub mod lib_registry;
pub mod lua_value;
pub mod lua_vm;
pub mod stdlib;

pub use lib_registry::LibraryRegistry;
pub use lua_value::{
    Chunk, LuaClosure, LuaString, LuaTable, LuaTableRef, LuaValue, Prototype, dump_chunk,
    load_chunk,
};
pub use lua_vm::{Instruction, LuaError, LuaResult, LuaVM, OpCode, SafeOption};
pub use stdlib::Stdlib;
