// Lua value model: dynamic values, strings, tables, closures and prototypes
pub(crate) mod chunk_loader;
mod chunk_serializer;
mod lua_arith;
mod lua_function;
pub mod lua_number;
mod lua_string;
mod lua_table;
#[allow(clippy::module_inception)]
mod lua_value;

pub use chunk_loader::load_chunk;
pub use chunk_serializer::dump_chunk;
pub use lua_arith::{
    ArithOp, arith, concat, float_mod, int_idiv, int_mod, length, less_equal, less_than,
    shift_left,
};
pub use lua_function::{
    Chunk, LocalVar, LuaClosure, LuaUpvalue, NativeAction, NativeFunction, Prototype, UpvalueDesc,
};
pub use lua_string::LuaString;
pub use lua_table::LuaTable;
pub use lua_value::{LuaTableRef, LuaValue, float_to_integer};
