pub mod test_closures;
pub mod test_stdlib;
pub mod test_table;

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use crate::lua_value::{Chunk, LuaString, LuaValue, Prototype, UpvalueDesc};
use crate::lua_vm::{Instruction, LuaResult, LuaVM, OpCode, SafeOption};
use crate::stdlib::Stdlib;

pub fn abc(op: OpCode, a: u32, b: u32, c: u32) -> Instruction {
    Instruction::create_abc(op, a, b, c)
}

pub fn abx(op: OpCode, a: u32, bx: u32) -> Instruction {
    Instruction::create_abx(op, a, bx)
}

pub fn asbx(op: OpCode, a: u32, sbx: i32) -> Instruction {
    Instruction::create_asbx(op, a, sbx)
}

/// RK operand naming constant `k`.
pub fn k(index: u32) -> u32 {
    Instruction::rk_constant(index)
}

/// Builds a prototype; instruction `pc` is reported as line `pc + 1`.
pub struct ProtoBuilder {
    proto: Prototype,
}

impl ProtoBuilder {
    pub fn new(max_stack_size: u8) -> Self {
        ProtoBuilder {
            proto: Prototype {
                source: Some(LuaString::from("@test.lua")),
                max_stack_size,
                ..Default::default()
            },
        }
    }

    /// Main chunk: vararg, with `_ENV` as upvalue 0.
    pub fn main(max_stack_size: u8) -> Self {
        ProtoBuilder::new(max_stack_size)
            .params(0, true)
            .upvalue(true, 0, "_ENV")
    }

    pub fn params(mut self, num_params: u8, is_vararg: bool) -> Self {
        self.proto.num_params = num_params;
        self.proto.is_vararg = is_vararg;
        self
    }

    pub fn constants(mut self, constants: Vec<LuaValue>) -> Self {
        self.proto.constants = constants;
        self
    }

    pub fn code(mut self, code: Vec<Instruction>) -> Self {
        self.proto.line_info = (1..=code.len() as u32).collect();
        self.proto.code = code;
        self
    }

    pub fn upvalue(mut self, in_stack: bool, index: u8, name: &str) -> Self {
        self.proto.upvalues.push(UpvalueDesc {
            in_stack,
            index,
            name: Some(LuaString::from(name)),
        });
        self
    }

    pub fn child(mut self, child: Prototype) -> Self {
        self.proto.protos.push(Rc::new(child));
        self
    }

    pub fn build(self) -> Prototype {
        self.proto
    }

    pub fn chunk(self) -> Chunk {
        Chunk {
            upvalue_count: self.proto.upvalues.len() as u8,
            main: Rc::new(self.proto),
        }
    }
}

pub fn new_vm() -> LuaVM {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All).unwrap();
    vm
}

/// Run a main chunk on a fresh VM with every library loaded.
pub fn run(chunk: &Chunk) -> LuaResult<Vec<LuaValue>> {
    new_vm().execute_chunk(chunk)
}

/// `print` sink readable after the VM is done with it.
#[derive(Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Call global library function `lib.name` (or a global when `lib` is
/// empty) directly from Rust.
pub fn call_lib(vm: &mut LuaVM, lib: &str, name: &str, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let func = if lib.is_empty() {
        vm.get_global(name)
    } else {
        let table = vm.get_global(lib);
        vm.index_value(&table, &LuaValue::string(name))?
    };
    vm.call_function(&func, args)
}

pub fn s(text: &str) -> LuaValue {
    LuaValue::string(text)
}

pub fn int(i: i64) -> LuaValue {
    LuaValue::Integer(i)
}
