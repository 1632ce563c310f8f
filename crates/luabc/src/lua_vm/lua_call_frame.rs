use std::rc::Rc;

use crate::lua_value::{LuaClosure, LuaValue};

/// One active Lua function call, modelled after Lua's CallInfo.
///
/// Register `R(i)` of this frame is `stack[base + i]`; the called function
/// value sits at `stack[func_index]` (`base - 1`), which is also where the
/// results are copied when the frame returns.
pub struct LuaCallFrame {
    pub closure: Rc<LuaClosure>,
    /// Absolute stack index of the function slot
    pub func_index: usize,
    /// Absolute stack index of R(0)
    pub base: usize,
    /// Saved program counter (index of the next instruction)
    pub pc: usize,
    /// High-water mark set by multi-result CALL/VARARG, read by B==0 operands
    pub top: usize,
    /// Arguments beyond the declared parameters of a vararg function
    pub varargs: Vec<LuaValue>,
    /// Number of results the caller expects; None means "all" (LUA_MULTRET)
    pub nresults: Option<usize>,
    /// Entered from Rust: RETURN hands results back instead of resuming a caller
    pub is_fresh: bool,
}

impl LuaCallFrame {
    pub fn new(
        closure: Rc<LuaClosure>,
        func_index: usize,
        varargs: Vec<LuaValue>,
        nresults: Option<usize>,
        is_fresh: bool,
    ) -> Self {
        let base = func_index + 1;
        let top = base + closure.proto.max_stack_size as usize;
        LuaCallFrame {
            closure,
            func_index,
            base,
            pc: 0,
            top,
            varargs,
            nresults,
            is_fresh,
        }
    }

    /// Source line of the instruction currently executing, for error messages.
    pub fn current_line(&self) -> Option<u32> {
        self.closure.proto.line_at(self.pc.saturating_sub(1))
    }
}
