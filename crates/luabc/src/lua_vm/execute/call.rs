use std::rc::Rc;

use log::trace;

use super::closure_handler::close_upvalues;
use crate::lua_value::{LuaClosure, LuaValue};
use crate::lua_vm::{LuaCallFrame, LuaError, LuaResult, LuaVM};

/// What the dispatch loop does after a call instruction.
pub(crate) enum FrameAction {
    /// A native ran to completion; keep executing the current frame.
    Continue,
    /// A Lua frame was pushed; switch to it.
    Call,
}

/// Push a frame for `closure`, whose function value sits at `func_index`
/// with `nargs` arguments right above it.
pub(crate) fn push_lua_frame(
    vm: &mut LuaVM,
    closure: Rc<LuaClosure>,
    func_index: usize,
    nargs: usize,
    nresults: Option<usize>,
    is_fresh: bool,
) -> LuaResult<()> {
    if vm.frames.len() >= vm.safe_option.max_call_depth {
        return Err(LuaError::StackOverflow);
    }

    let proto = &closure.proto;
    let base = func_index + 1;
    let num_params = proto.num_params as usize;
    let frame_size = proto.max_stack_size as usize;

    let needed = base + frame_size.max(nargs);
    if needed > vm.safe_option.max_stack_size {
        return Err(LuaError::StackOverflow);
    }
    if vm.stack.len() < needed {
        vm.stack.resize(needed, LuaValue::Nil);
    }

    let varargs = if proto.is_vararg && nargs > num_params {
        vm.stack[base + num_params..base + nargs].to_vec()
    } else {
        Vec::new()
    };

    // missing parameters and all other registers start as nil
    for slot in &mut vm.stack[base + nargs.min(num_params)..needed] {
        *slot = LuaValue::Nil;
    }

    trace!(
        "push frame #{} base={} nargs={} varargs={}",
        vm.frames.len(),
        base,
        nargs,
        varargs.len()
    );
    vm.frames.push(LuaCallFrame::new(
        closure, func_index, varargs, nresults, is_fresh,
    ));
    Ok(())
}

/// Start a call of the value at `func_index`. Natives run immediately and
/// leave their results in place; Lua closures get a new frame.
pub(crate) fn precall(
    vm: &mut LuaVM,
    func_index: usize,
    nargs: usize,
    nresults: Option<usize>,
) -> LuaResult<FrameAction> {
    let func = vm.stack.get(func_index).cloned().unwrap_or_default();
    match func {
        LuaValue::Function(closure) => {
            push_lua_frame(vm, closure, func_index, nargs, nresults, false)?;
            Ok(FrameAction::Call)
        }
        LuaValue::ExternalFunction(_) | LuaValue::ExternalAction(_) => {
            let results = call_native(vm, &func, func_index, nargs)?;
            place_results(vm, func_index, results, nresults);
            Ok(FrameAction::Continue)
        }
        other => Err(vm.with_position(LuaError::type_error(format!(
            "attempt to call a {} value",
            other.type_name()
        )))),
    }
}

/// Run a native with the arguments sitting above `func_index`.
pub(crate) fn call_native(
    vm: &mut LuaVM,
    func: &LuaValue,
    func_index: usize,
    nargs: usize,
) -> LuaResult<Vec<LuaValue>> {
    let start = (func_index + 1).min(vm.stack.len());
    let end = (func_index + 1 + nargs).min(vm.stack.len());
    let args = vm.stack[start..end].to_vec();
    match func {
        LuaValue::ExternalFunction(f) => {
            let f = f.clone();
            f(vm, &args)
        }
        LuaValue::ExternalAction(f) => {
            let f = f.clone();
            f(vm, &args)?;
            Ok(Vec::new())
        }
        other => Err(LuaError::type_error(format!(
            "attempt to call a {} value",
            other.type_name()
        ))),
    }
}

/// Copy call results to `dest`, truncated or nil-padded to `nresults`.
/// With `nresults == None` every result is kept and the current frame's top
/// is moved past them.
pub(crate) fn place_results(
    vm: &mut LuaVM,
    dest: usize,
    results: Vec<LuaValue>,
    nresults: Option<usize>,
) -> usize {
    let count = nresults.unwrap_or(results.len());
    let end = dest + count;
    if vm.stack.len() < end {
        vm.stack.resize(end, LuaValue::Nil);
    }
    let mut values = results.into_iter();
    for slot in &mut vm.stack[dest..end] {
        *slot = values.next().unwrap_or_default();
    }
    if nresults.is_none() {
        if let Some(frame) = vm.frames.last_mut() {
            frame.top = end;
        }
    }
    end
}

/// Pop the current frame. Returns the results when the frame was entered
/// from Rust; otherwise they are delivered to the caller's registers.
pub(crate) fn return_from_frame(vm: &mut LuaVM, results: Vec<LuaValue>) -> Option<Vec<LuaValue>> {
    let frame = vm.frames.pop()?;
    close_upvalues(vm, frame.base);
    trace!("pop frame #{} ({} results)", vm.frames.len(), results.len());

    if frame.is_fresh {
        vm.stack.truncate(frame.func_index);
        return Some(results);
    }

    let end = place_results(vm, frame.func_index, results, frame.nresults);
    if let Some(caller) = vm.frames.last() {
        let keep = (caller.base + caller.closure.proto.max_stack_size as usize).max(end);
        vm.stack.truncate(keep);
    }
    None
}

/// Replace the current frame with a call to the closure at `func_index`.
pub(crate) fn tail_call(
    vm: &mut LuaVM,
    closure: Rc<LuaClosure>,
    func_index: usize,
    nargs: usize,
) -> LuaResult<()> {
    let Some(frame) = vm.frames.pop() else {
        return Err(LuaError::runtime("tail call without a frame"));
    };
    close_upvalues(vm, frame.base);

    let dest = frame.func_index;
    if vm.stack.len() <= func_index + nargs {
        vm.stack.resize(func_index + nargs + 1, LuaValue::Nil);
    }
    for i in 0..=nargs {
        let v = std::mem::take(&mut vm.stack[func_index + i]);
        vm.stack[dest + i] = v;
    }
    push_lua_frame(vm, closure, dest, nargs, frame.nresults, frame.is_fresh)
}
