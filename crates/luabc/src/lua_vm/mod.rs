// Lua Virtual Machine
// Executes Lua 5.3 bytecode on a register stack with an explicit frame stack
mod execute;
mod lua_call_frame;
mod lua_error;
pub mod lua_limits;
mod opcode;
mod safe_option;

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use log::debug;

use crate::lua_value::{
    Chunk, LuaClosure, LuaString, LuaTable, LuaTableRef, LuaUpvalue, LuaValue, load_chunk,
};
use crate::stdlib::{self, Stdlib};
pub use lua_call_frame::LuaCallFrame;
pub use lua_error::{LuaError, LuaResult};
use lua_limits::BASIC_STACK_SIZE;
pub use opcode::{Instruction, OpCode, OpMode};
pub use safe_option::SafeOption;

pub struct LuaVM {
    /// Register stack shared by all frames; frames own windows into it
    pub(crate) stack: Vec<LuaValue>,

    /// Active Lua calls, innermost last
    pub(crate) frames: Vec<LuaCallFrame>,

    /// Upvalues still aliasing a stack slot
    pub(crate) open_upvalues: Vec<Rc<LuaUpvalue>>,

    /// Global environment, upvalue 0 of every main chunk
    globals: LuaTableRef,

    /// `string` library table, consulted when a string value is indexed
    pub(crate) string_lib: Option<LuaTableRef>,

    pub(crate) safe_option: SafeOption,

    /// Sink for `print`
    output: Box<dyn Write>,
}

impl LuaVM {
    pub fn new(safe_option: SafeOption) -> Self {
        let globals = Rc::new(RefCell::new(LuaTable::new(0, 32)));
        let vm = LuaVM {
            stack: Vec::with_capacity(BASIC_STACK_SIZE),
            frames: Vec::new(),
            open_upvalues: Vec::new(),
            globals,
            string_lib: None,
            safe_option,
            output: Box::new(std::io::stdout()),
        };
        vm.globals
            .borrow_mut()
            .set_str("_G", LuaValue::Table(vm.globals.clone()));
        vm
    }

    /// Install standard libraries into the global environment.
    pub fn open_stdlib(&mut self, lib: Stdlib) -> LuaResult<()> {
        stdlib::open_lib(self, lib)
    }

    /// Redirect `print` output.
    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    pub fn safe_option(&self) -> &SafeOption {
        &self.safe_option
    }

    // ============ Globals ============

    pub fn globals(&self) -> LuaTableRef {
        self.globals.clone()
    }

    pub fn get_global(&self, name: &str) -> LuaValue {
        self.globals.borrow().get_str(name)
    }

    pub fn set_global(&mut self, name: &str, value: LuaValue) {
        self.globals.borrow_mut().set_str(name, value);
    }

    pub fn create_table(&mut self, array_size: usize, hash_size: usize) -> LuaValue {
        LuaValue::table(LuaTable::new(array_size, hash_size))
    }

    // ============ Loading and running ============

    /// Parse a binary chunk.
    pub fn load(&self, data: &[u8]) -> LuaResult<Chunk> {
        load_chunk(data)
    }

    /// Load and run a binary chunk, returning the main function's results.
    pub fn execute(&mut self, data: &[u8]) -> LuaResult<Vec<LuaValue>> {
        let chunk = self.load(data)?;
        self.execute_chunk(&chunk)
    }

    /// Run a loaded chunk against the global environment.
    pub fn execute_chunk(&mut self, chunk: &Chunk) -> LuaResult<Vec<LuaValue>> {
        let upvalues = (0..chunk.upvalue_count.max(1))
            .map(|i| {
                let value = if i == 0 {
                    LuaValue::Table(self.globals.clone())
                } else {
                    LuaValue::Nil
                };
                Rc::new(LuaUpvalue::new_closed(value))
            })
            .collect();
        let main = LuaValue::closure(LuaClosure::new(chunk.main.clone(), upvalues));

        let result = self.call_function(&main, &[]);
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// Call any callable value with `args`, returning all of its results.
    ///
    /// Natives use this to call back into Lua; a Lua callee runs on the same
    /// dispatch loop above a boundary frame.
    pub fn call_function(&mut self, func: &LuaValue, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
        match func {
            LuaValue::Function(closure) => {
                let func_index = self.stack.len();
                self.stack.push(func.clone());
                self.stack.extend_from_slice(args);
                let depth = self.frames.len();
                let results = execute::call::push_lua_frame(
                    self,
                    closure.clone(),
                    func_index,
                    args.len(),
                    None,
                    true,
                )
                .and_then(|()| execute::lua_execute(self));
                if results.is_err() {
                    // unwind frames left behind by the failed call
                    self.frames.truncate(depth);
                    execute::closure_handler::close_upvalues(self, func_index);
                    self.stack.truncate(func_index);
                }
                results
            }
            LuaValue::ExternalFunction(f) => {
                let f = f.clone();
                f(self, args)
            }
            LuaValue::ExternalAction(f) => {
                let f = f.clone();
                f(self, args)?;
                Ok(Vec::new())
            }
            other => Err(LuaError::type_error(format!(
                "attempt to call a {} value",
                other.type_name()
            ))),
        }
    }

    /// Drop every frame and register after an aborted execution.
    fn reset(&mut self) {
        debug!("resetting VM after error at call depth {}", self.frames.len());
        self.frames.clear();
        self.open_upvalues.clear();
        self.stack.clear();
    }

    // ============ Indexing ============

    /// `obj[key]` without metamethods; strings index the string library.
    pub fn index_value(&self, obj: &LuaValue, key: &LuaValue) -> LuaResult<LuaValue> {
        match obj {
            LuaValue::Table(t) => Ok(t.borrow().get(key)),
            LuaValue::String(_) => match &self.string_lib {
                Some(lib) => Ok(lib.borrow().get(key)),
                None => Err(index_error(obj)),
            },
            _ => Err(index_error(obj)),
        }
    }

    /// `obj[key] = value` without metamethods.
    pub fn set_index_value(&self, obj: &LuaValue, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        match obj {
            LuaValue::Table(t) => t.borrow_mut().set(key, value),
            _ => Err(index_error(obj)),
        }
    }

    // ============ Error helpers ============

    /// `chunkname:line:` of the innermost Lua frame `level - 1` levels down.
    pub fn where_(&self, level: usize) -> String {
        if level == 0 || level > self.frames.len() {
            return String::new();
        }
        let frame = &self.frames[self.frames.len() - level];
        match frame.current_line() {
            Some(line) => format!("{}:{}: ", frame.closure.proto.source_name(), line),
            None => String::new(),
        }
    }

    /// Prefix a VM-raised error message with the current position.
    pub(crate) fn with_position(&self, err: LuaError) -> LuaError {
        match err {
            LuaError::Type(msg) => LuaError::Type(format!("{}{}", self.where_(1), msg)),
            LuaError::Runtime(LuaValue::String(s)) => {
                let prefix = LuaString::from(self.where_(1));
                LuaError::Runtime(LuaValue::String(prefix.concat(&s)))
            }
            other => other,
        }
    }

    /// `tostring` rendering as a Lua string.
    pub fn tostring(&self, value: &LuaValue) -> LuaString {
        match value {
            LuaValue::String(s) => s.clone(),
            other => LuaString::from(other.to_string()),
        }
    }
}

fn index_error(obj: &LuaValue) -> LuaError {
    LuaError::type_error(format!("attempt to index a {} value", obj.type_name()))
}

impl Default for LuaVM {
    fn default() -> Self {
        Self::new(SafeOption::default())
    }
}
