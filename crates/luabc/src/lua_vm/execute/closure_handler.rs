use std::rc::Rc;

use crate::lua_value::{LuaClosure, LuaUpvalue, LuaValue, Prototype};
use crate::lua_vm::{LuaError, LuaResult, LuaVM};

/// Instantiate `proto` inside the frame whose registers start at `base`.
///
/// In-stack descriptors capture a register of the running frame (sharing an
/// existing open upvalue for the same slot); the others reuse the enclosing
/// closure's upvalue.
pub(crate) fn handle_closure(
    vm: &mut LuaVM,
    proto: &Rc<Prototype>,
    base: usize,
    parent: &LuaClosure,
) -> LuaResult<LuaValue> {
    let mut upvalues = Vec::with_capacity(proto.upvalues.len());
    for desc in &proto.upvalues {
        let upvalue = if desc.in_stack {
            find_upvalue(vm, base + desc.index as usize)
        } else {
            parent
                .upvalues
                .get(desc.index as usize)
                .cloned()
                .ok_or_else(|| LuaError::load(format!("bad upvalue index {}", desc.index)))?
        };
        upvalues.push(upvalue);
    }
    Ok(LuaValue::closure(LuaClosure::new(proto.clone(), upvalues)))
}

/// Position of the first open upvalue at or above `level`.
/// `open_upvalues` is kept sorted by stack slot.
fn first_at_or_above(vm: &LuaVM, level: usize) -> usize {
    vm.open_upvalues
        .partition_point(|uv| uv.stack_index().is_some_and(|i| i < level))
}

/// Open upvalue for an absolute stack slot, created on first capture.
pub(crate) fn find_upvalue(vm: &mut LuaVM, stack_index: usize) -> Rc<LuaUpvalue> {
    let pos = first_at_or_above(vm, stack_index);
    if let Some(existing) = vm.open_upvalues.get(pos) {
        if existing.stack_index() == Some(stack_index) {
            return existing.clone();
        }
    }
    let upvalue = Rc::new(LuaUpvalue::new_open(stack_index));
    vm.open_upvalues.insert(pos, upvalue.clone());
    upvalue
}

/// Close every open upvalue aliasing a slot at or above `level`.
pub(crate) fn close_upvalues(vm: &mut LuaVM, level: usize) {
    let first = first_at_or_above(vm, level);
    for uv in vm.open_upvalues.drain(first..) {
        uv.close(&vm.stack, level);
    }
}
