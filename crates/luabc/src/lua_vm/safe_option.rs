use crate::lua_vm::lua_limits::{LUAI_MAXCALLS, LUAI_MAXSTACK};

/// Resource limits applied by a [`LuaVM`](crate::LuaVM).
#[derive(Debug, Clone)]
pub struct SafeOption {
    /// Maximum number of register slots across all live frames.
    pub max_stack_size: usize,
    /// Maximum number of live call frames.
    pub max_call_depth: usize,
}

impl Default for SafeOption {
    fn default() -> Self {
        Self {
            max_stack_size: LUAI_MAXSTACK,
            max_call_depth: LUAI_MAXCALLS,
        }
    }
}

impl SafeOption {
    pub fn with_max_stack_size(mut self, max_stack_size: usize) -> Self {
        self.max_stack_size = max_stack_size;
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }
}
