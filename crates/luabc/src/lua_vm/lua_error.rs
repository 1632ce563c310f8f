use thiserror::Error;

use crate::lua_value::LuaValue;

/// Every way a load or an execution can fail.
///
/// None of these are recoverable inside the VM: they unwind straight to
/// whoever called [`LuaVM::execute_chunk`](crate::LuaVM::execute_chunk).
#[derive(Debug, Clone, Error)]
pub enum LuaError {
    /// Malformed or truncated binary chunk, or a header mismatch.
    #[error("load error: {0}")]
    Load(String),

    /// A native function or opcode received fewer values than it needs.
    #[error("wrong number of arguments to '{function}' (expected at least {expected}, got {got})")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    /// An operand lacks the capability an operation requires.
    #[error("{0}")]
    Type(String),

    /// Metatables, coroutines, patterns and everything else out of scope.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// `error(...)`, a failed `assert`, or a library-raised runtime error.
    /// Carries the error object itself.
    #[error("{0}")]
    Runtime(LuaValue),

    #[error("stack overflow")]
    StackOverflow,
}

impl LuaError {
    /// Runtime error whose payload is a string message.
    pub fn runtime(msg: impl AsRef<str>) -> Self {
        LuaError::Runtime(LuaValue::string(msg.as_ref()))
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        LuaError::Type(msg.into())
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        LuaError::Unsupported(what.into())
    }

    pub fn load(msg: impl Into<String>) -> Self {
        LuaError::Load(msg.into())
    }

    pub fn argument_count(function: &str, expected: usize, got: usize) -> Self {
        LuaError::ArgumentCount {
            function: function.to_string(),
            expected,
            got,
        }
    }

    /// The error object as seen by Lua code.
    pub fn value(&self) -> LuaValue {
        match self {
            LuaError::Runtime(v) => v.clone(),
            other => LuaValue::string(other.to_string()),
        }
    }
}

pub type LuaResult<T> = Result<T, LuaError>;
