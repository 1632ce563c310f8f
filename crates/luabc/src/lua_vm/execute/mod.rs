/*----------------------------------------------------------------------
  Lua 5.3 dispatch loop

  One loop runs every Lua frame: CALL pushes a frame and jumps back to
  'startfunc, RETURN pops one and resumes the caller the same way. Host
  recursion only happens when a native calls back into Lua through
  `LuaVM::call_function`, which starts a nested loop above a boundary
  ("fresh") frame.

  Registers are plain indices into `vm.stack`; every access goes through
  the bounds-checked helpers so malformed bytecode surfaces as an error
  or a nil read, never a panic.
----------------------------------------------------------------------*/

pub(crate) mod call;
pub(crate) mod closure_handler;
mod helper;
mod loop_instructions;

use std::rc::Rc;

use call::{FrameAction, precall, return_from_frame, tail_call};
use closure_handler::{close_upvalues, handle_closure};
use helper::{constant, fb2int, reg, rk, set_reg};
use loop_instructions::{exec_forloop, exec_forprep};

use crate::lua_value::{
    ArithOp, LuaTable, LuaValue, arith, concat, length, less_equal, less_than,
};
use crate::lua_vm::lua_limits::LFIELDS_PER_FLUSH;
use crate::lua_vm::{Instruction, LuaError, LuaResult, LuaVM, OpCode};

/// Run frames until the innermost fresh frame returns, yielding its results.
pub(crate) fn lua_execute(vm: &mut LuaVM) -> LuaResult<Vec<LuaValue>> {
    'startfunc: loop {
        let Some(frame) = vm.frames.last() else {
            return Err(LuaError::runtime("no active frame"));
        };
        let frame_idx = vm.frames.len() - 1;
        let closure = frame.closure.clone();
        let base = frame.base;
        let mut pc = frame.pc;

        let proto = &closure.proto;
        let code = &proto.code;
        let k = &proto.constants;

        // position-prefixed error from an instruction of this frame
        macro_rules! vm_try {
            ($e:expr) => {
                match $e {
                    Ok(v) => v,
                    Err(err) => return Err(vm.with_position(err)),
                }
            };
        }

        loop {
            let Some(&instr) = code.get(pc) else {
                return Err(vm.with_position(LuaError::runtime("function did not return")));
            };
            pc += 1;
            vm.frames[frame_idx].pc = pc;

            let Some(op) = instr.get_opcode() else {
                return Err(LuaError::unsupported(format!(
                    "opcode {}",
                    instr.opcode_number()
                )));
            };
            let a = instr.get_a() as usize;
            let ra = base + a;

            match op {
                OpCode::Move => {
                    let v = reg(&vm.stack, base + instr.get_b() as usize);
                    set_reg(&mut vm.stack, ra, v);
                }
                OpCode::LoadK => {
                    let v = constant(k, instr.get_bx() as usize)?;
                    set_reg(&mut vm.stack, ra, v);
                }
                OpCode::LoadKX => {
                    let extra = extra_arg(code, pc)?;
                    pc += 1;
                    vm.frames[frame_idx].pc = pc;
                    let v = constant(k, extra as usize)?;
                    set_reg(&mut vm.stack, ra, v);
                }
                OpCode::LoadBool => {
                    set_reg(&mut vm.stack, ra, LuaValue::Boolean(instr.get_b() != 0));
                    if instr.get_c() != 0 {
                        pc += 1;
                    }
                }
                OpCode::LoadNil => {
                    for i in 0..=instr.get_b() as usize {
                        set_reg(&mut vm.stack, ra + i, LuaValue::Nil);
                    }
                }
                OpCode::GetUpval => {
                    let v = upvalue(&closure, instr.get_b())?.get(&vm.stack);
                    set_reg(&mut vm.stack, ra, v);
                }
                OpCode::GetTabUp => {
                    let table = upvalue(&closure, instr.get_b())?.get(&vm.stack);
                    let key = rk(&vm.stack, k, base, instr.get_c())?;
                    let v = vm_try!(vm.index_value(&table, &key));
                    set_reg(&mut vm.stack, ra, v);
                }
                OpCode::GetTable => {
                    let table = reg(&vm.stack, base + instr.get_b() as usize);
                    let key = rk(&vm.stack, k, base, instr.get_c())?;
                    let v = vm_try!(vm.index_value(&table, &key));
                    set_reg(&mut vm.stack, ra, v);
                }
                OpCode::SetTabUp => {
                    let table = upvalue(&closure, a as u32)?.get(&vm.stack);
                    let key = rk(&vm.stack, k, base, instr.get_b())?;
                    let value = rk(&vm.stack, k, base, instr.get_c())?;
                    vm_try!(vm.set_index_value(&table, key, value));
                }
                OpCode::SetUpval => {
                    let v = reg(&vm.stack, ra);
                    upvalue(&closure, instr.get_b())?.set(&mut vm.stack, v);
                }
                OpCode::SetTable => {
                    let table = reg(&vm.stack, ra);
                    let key = rk(&vm.stack, k, base, instr.get_b())?;
                    let value = rk(&vm.stack, k, base, instr.get_c())?;
                    vm_try!(vm.set_index_value(&table, key, value));
                }
                OpCode::NewTable => {
                    let table = LuaTable::new(fb2int(instr.get_b()), fb2int(instr.get_c()));
                    set_reg(&mut vm.stack, ra, LuaValue::table(table));
                }
                OpCode::Self_ => {
                    let obj = reg(&vm.stack, base + instr.get_b() as usize);
                    let key = rk(&vm.stack, k, base, instr.get_c())?;
                    let method = vm_try!(vm.index_value(&obj, &key));
                    set_reg(&mut vm.stack, ra + 1, obj);
                    set_reg(&mut vm.stack, ra, method);
                }
                OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Mod
                | OpCode::Pow
                | OpCode::Div
                | OpCode::IDiv
                | OpCode::BAnd
                | OpCode::BOr
                | OpCode::BXor
                | OpCode::Shl
                | OpCode::Shr => {
                    let lhs = rk(&vm.stack, k, base, instr.get_b())?;
                    let rhs = rk(&vm.stack, k, base, instr.get_c())?;
                    let v = vm_try!(arith(binary_op(op), &lhs, &rhs));
                    set_reg(&mut vm.stack, ra, v);
                }
                OpCode::Unm | OpCode::BNot => {
                    let operand = reg(&vm.stack, base + instr.get_b() as usize);
                    let op = if op == OpCode::Unm {
                        ArithOp::Unm
                    } else {
                        ArithOp::BNot
                    };
                    let v = vm_try!(arith(op, &operand, &operand));
                    set_reg(&mut vm.stack, ra, v);
                }
                OpCode::Not => {
                    let v = reg(&vm.stack, base + instr.get_b() as usize);
                    set_reg(&mut vm.stack, ra, LuaValue::Boolean(v.is_falsy()));
                }
                OpCode::Len => {
                    let v = reg(&vm.stack, base + instr.get_b() as usize);
                    let len = vm_try!(length(&v));
                    set_reg(&mut vm.stack, ra, len);
                }
                OpCode::Concat => {
                    let first = base + instr.get_b() as usize;
                    let last = base + instr.get_c() as usize;
                    let parts: Vec<LuaValue> = (first..=last).map(|i| reg(&vm.stack, i)).collect();
                    let s = vm_try!(concat(&parts));
                    set_reg(&mut vm.stack, ra, LuaValue::String(s));
                }
                OpCode::Jmp => {
                    pc = jump(pc, instr.get_sbx())?;
                    if a != 0 {
                        close_upvalues(vm, base + a - 1);
                    }
                }
                OpCode::Eq => {
                    let lhs = rk(&vm.stack, k, base, instr.get_b())?;
                    let rhs = rk(&vm.stack, k, base, instr.get_c())?;
                    if (lhs == rhs) != (a != 0) {
                        pc += 1;
                    }
                }
                OpCode::Lt => {
                    let lhs = rk(&vm.stack, k, base, instr.get_b())?;
                    let rhs = rk(&vm.stack, k, base, instr.get_c())?;
                    if vm_try!(less_than(&lhs, &rhs)) != (a != 0) {
                        pc += 1;
                    }
                }
                OpCode::Le => {
                    let lhs = rk(&vm.stack, k, base, instr.get_b())?;
                    let rhs = rk(&vm.stack, k, base, instr.get_c())?;
                    if vm_try!(less_equal(&lhs, &rhs)) != (a != 0) {
                        pc += 1;
                    }
                }
                OpCode::Test => {
                    if reg(&vm.stack, ra).is_truthy() != (instr.get_c() != 0) {
                        pc += 1;
                    }
                }
                OpCode::TestSet => {
                    let v = reg(&vm.stack, base + instr.get_b() as usize);
                    if v.is_truthy() == (instr.get_c() != 0) {
                        set_reg(&mut vm.stack, ra, v);
                    } else {
                        pc += 1;
                    }
                }
                OpCode::Call => {
                    let nargs = arg_count(vm, frame_idx, ra, instr.get_b());
                    let c = instr.get_c() as usize;
                    let nresults = if c == 0 { None } else { Some(c - 1) };
                    vm.frames[frame_idx].pc = pc;
                    match precall(vm, ra, nargs, nresults)? {
                        FrameAction::Call => continue 'startfunc,
                        FrameAction::Continue => {}
                    }
                }
                OpCode::TailCall => {
                    let nargs = arg_count(vm, frame_idx, ra, instr.get_b());
                    match reg(&vm.stack, ra) {
                        LuaValue::Function(callee) => {
                            tail_call(vm, callee, ra, nargs)?;
                            continue 'startfunc;
                        }
                        func @ (LuaValue::ExternalFunction(_) | LuaValue::ExternalAction(_)) => {
                            let results = call::call_native(vm, &func, ra, nargs)?;
                            match return_from_frame(vm, results) {
                                Some(results) => return Ok(results),
                                None => continue 'startfunc,
                            }
                        }
                        other => {
                            return Err(vm.with_position(LuaError::type_error(format!(
                                "attempt to call a {} value",
                                other.type_name()
                            ))));
                        }
                    }
                }
                OpCode::Return => {
                    let b = instr.get_b() as usize;
                    let end = if b == 0 {
                        vm.frames[frame_idx].top.max(ra)
                    } else {
                        ra + b - 1
                    };
                    let results: Vec<LuaValue> = (ra..end).map(|i| reg(&vm.stack, i)).collect();
                    match return_from_frame(vm, results) {
                        Some(results) => return Ok(results),
                        None => continue 'startfunc,
                    }
                }
                OpCode::ForLoop => {
                    if exec_forloop(&mut vm.stack, ra) {
                        pc = jump(pc, instr.get_sbx())?;
                    }
                }
                OpCode::ForPrep => {
                    vm_try!(exec_forprep(&mut vm.stack, ra));
                    pc = jump(pc, instr.get_sbx())?;
                }
                OpCode::TForCall => {
                    let cb = ra + 3;
                    for i in 0..3 {
                        let v = reg(&vm.stack, ra + i);
                        set_reg(&mut vm.stack, cb + i, v);
                    }
                    vm.frames[frame_idx].pc = pc;
                    let nresults = Some(instr.get_c() as usize);
                    match precall(vm, cb, 2, nresults)? {
                        FrameAction::Call => continue 'startfunc,
                        FrameAction::Continue => {}
                    }
                }
                OpCode::TForLoop => {
                    let control = reg(&vm.stack, ra + 1);
                    if !control.is_nil() {
                        set_reg(&mut vm.stack, ra, control);
                        pc = jump(pc, instr.get_sbx())?;
                    }
                }
                OpCode::SetList => {
                    let b = instr.get_b() as usize;
                    let n = if b == 0 {
                        vm.frames[frame_idx].top.saturating_sub(ra + 1)
                    } else {
                        b
                    };
                    let mut c = instr.get_c() as usize;
                    if c == 0 {
                        c = extra_arg(code, pc)? as usize;
                        pc += 1;
                    }
                    let LuaValue::Table(table) = reg(&vm.stack, ra) else {
                        return Err(LuaError::runtime("SETLIST target is not a table"));
                    };
                    let offset = c.saturating_sub(1) * LFIELDS_PER_FLUSH;
                    let mut table = table.borrow_mut();
                    // sparse blocks go through set_int and land in the hash part
                    if offset <= table.array_len() {
                        table.ensure_array_size(offset + n);
                    }
                    for i in 1..=n {
                        table.set_int((offset + i) as i64, reg(&vm.stack, ra + i));
                    }
                }
                OpCode::Closure => {
                    let index = instr.get_bx() as usize;
                    let Some(child) = proto.protos.get(index) else {
                        return Err(LuaError::load(format!("bad prototype index {}", index)));
                    };
                    let v = handle_closure(vm, child, base, &closure)?;
                    set_reg(&mut vm.stack, ra, v);
                }
                OpCode::Vararg => {
                    let b = instr.get_b() as usize;
                    let varargs = std::mem::take(&mut vm.frames[frame_idx].varargs);
                    let wanted = if b == 0 { varargs.len() } else { b - 1 };
                    for i in 0..wanted {
                        let v = varargs.get(i).cloned().unwrap_or_default();
                        set_reg(&mut vm.stack, ra + i, v);
                    }
                    if b == 0 {
                        vm.frames[frame_idx].top = ra + wanted;
                    }
                    vm.frames[frame_idx].varargs = varargs;
                }
                OpCode::ExtraArg => {
                    return Err(LuaError::unsupported("EXTRAARG outside LOADKX/SETLIST"));
                }
            }
        }
    }
}

fn binary_op(op: OpCode) -> ArithOp {
    match op {
        OpCode::Add => ArithOp::Add,
        OpCode::Sub => ArithOp::Sub,
        OpCode::Mul => ArithOp::Mul,
        OpCode::Mod => ArithOp::Mod,
        OpCode::Pow => ArithOp::Pow,
        OpCode::Div => ArithOp::Div,
        OpCode::IDiv => ArithOp::IDiv,
        OpCode::BAnd => ArithOp::BAnd,
        OpCode::BOr => ArithOp::BOr,
        OpCode::BXor => ArithOp::BXor,
        OpCode::Shl => ArithOp::Shl,
        _ => ArithOp::Shr,
    }
}

/// Argument count of CALL/TAILCALL; B == 0 means "up to the frame top".
fn arg_count(vm: &LuaVM, frame_idx: usize, ra: usize, b: u32) -> usize {
    if b == 0 {
        vm.frames[frame_idx].top.saturating_sub(ra + 1)
    } else {
        b as usize - 1
    }
}

fn upvalue(
    closure: &crate::lua_value::LuaClosure,
    index: u32,
) -> LuaResult<Rc<crate::lua_value::LuaUpvalue>> {
    closure
        .upvalues
        .get(index as usize)
        .cloned()
        .ok_or_else(|| LuaError::load(format!("bad upvalue index {}", index)))
}

fn extra_arg(code: &[Instruction], pc: usize) -> LuaResult<u32> {
    match code.get(pc) {
        Some(next) if next.get_opcode() == Some(OpCode::ExtraArg) => Ok(next.get_ax()),
        _ => Err(LuaError::load("missing EXTRAARG")),
    }
}

fn jump(pc: usize, offset: i32) -> LuaResult<usize> {
    pc.checked_add_signed(offset as isize)
        .ok_or_else(|| LuaError::runtime("jump out of range"))
}
