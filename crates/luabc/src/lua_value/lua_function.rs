use std::cell::RefCell;
use std::rc::Rc;

use super::{LuaString, LuaValue};
use crate::lua_vm::{Instruction, LuaResult, LuaVM};

/// Native callable returning zero or more values.
pub type NativeFunction = Rc<dyn Fn(&mut LuaVM, &[LuaValue]) -> LuaResult<Vec<LuaValue>>>;

/// Native callable returning nothing.
pub type NativeAction = Rc<dyn Fn(&mut LuaVM, &[LuaValue]) -> LuaResult<()>>;

/// Upvalue descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct UpvalueDesc {
    /// true: capture a register of the enclosing frame; false: reuse an enclosing upvalue
    pub in_stack: bool,
    pub index: u8,
    pub name: Option<LuaString>,
}

/// Local variable debug record.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub name: Option<LuaString>,
    pub start_pc: u32,
    pub end_pc: u32,
}

/// Compiled function prototype, immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct Prototype {
    pub source: Option<LuaString>,
    pub line_defined: u32,
    pub last_line_defined: u32,
    pub num_params: u8,
    pub is_vararg: bool,
    pub max_stack_size: u8,
    pub code: Vec<Instruction>,
    pub constants: Vec<LuaValue>,
    pub upvalues: Vec<UpvalueDesc>,
    pub protos: Vec<Rc<Prototype>>,
    pub line_info: Vec<u32>,
    pub local_vars: Vec<LocalVar>,
}

impl Prototype {
    /// Source line of instruction `pc`, when debug info is present.
    pub fn line_at(&self, pc: usize) -> Option<u32> {
        self.line_info.get(pc).copied()
    }

    pub fn source_name(&self) -> String {
        match &self.source {
            Some(s) => {
                let name = s.to_str_lossy();
                match name.strip_prefix(['@', '=']) {
                    Some(stripped) => stripped.to_string(),
                    None => name.into_owned(),
                }
            }
            None => "?".to_string(),
        }
    }
}

/// A loaded binary chunk: the main prototype plus its upvalue count.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub upvalue_count: u8,
    pub main: Rc<Prototype>,
}

#[derive(Debug, Clone)]
enum UpvalueState {
    /// Aliases an absolute slot of the VM register stack.
    Open(usize),
    Closed(LuaValue),
}

/// Upvalue cell shared between closures.
///
/// Open upvalues read and write through to a register slot; once closed the
/// cell owns the value. Closing is permanent.
#[derive(Debug)]
pub struct LuaUpvalue {
    state: RefCell<UpvalueState>,
}

impl LuaUpvalue {
    pub fn new_open(stack_index: usize) -> Self {
        LuaUpvalue {
            state: RefCell::new(UpvalueState::Open(stack_index)),
        }
    }

    pub fn new_closed(value: LuaValue) -> Self {
        LuaUpvalue {
            state: RefCell::new(UpvalueState::Closed(value)),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.borrow(), UpvalueState::Open(_))
    }

    /// Register slot aliased by an open upvalue.
    pub fn stack_index(&self) -> Option<usize> {
        match *self.state.borrow() {
            UpvalueState::Open(idx) => Some(idx),
            UpvalueState::Closed(_) => None,
        }
    }

    pub fn get(&self, stack: &[LuaValue]) -> LuaValue {
        match &*self.state.borrow() {
            UpvalueState::Open(idx) => stack.get(*idx).cloned().unwrap_or_default(),
            UpvalueState::Closed(v) => v.clone(),
        }
    }

    pub fn set(&self, stack: &mut [LuaValue], value: LuaValue) {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            UpvalueState::Open(idx) => {
                if let Some(slot) = stack.get_mut(*idx) {
                    *slot = value;
                }
            }
            UpvalueState::Closed(v) => *v = value,
        }
    }

    /// Snapshot the aliased register if it sits at or above `level`.
    /// Returns whether a close happened.
    pub fn close(&self, stack: &[LuaValue], level: usize) -> bool {
        let mut state = self.state.borrow_mut();
        match *state {
            UpvalueState::Open(idx) if idx >= level => {
                let value = stack.get(idx).cloned().unwrap_or_default();
                *state = UpvalueState::Closed(value);
                true
            }
            _ => false,
        }
    }
}

/// A prototype paired with its captured upvalues.
#[derive(Debug)]
pub struct LuaClosure {
    pub proto: Rc<Prototype>,
    pub upvalues: Vec<Rc<LuaUpvalue>>,
}

impl LuaClosure {
    pub fn new(proto: Rc<Prototype>, upvalues: Vec<Rc<LuaUpvalue>>) -> Self {
        LuaClosure { proto, upvalues }
    }
}
