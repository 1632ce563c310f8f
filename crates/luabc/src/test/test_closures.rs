// Closure and upvalue tests: open upvalues alias registers, closing
// snapshots them, chained capture reuses the enclosing closure's cells
use super::{ProtoBuilder, abc, abx, asbx, int, k, run};
use crate::lua_value::LuaValue;
use crate::lua_vm::OpCode;

#[test]
fn test_loop_closures_capture_fresh_values() {
    // local t = {}
    // for i = 1, 2 do t[i] = function() return i end end
    // return t[1](), t[2]()
    let get_i = ProtoBuilder::new(2)
        .upvalue(true, 4, "i")
        .code(vec![
            abc(OpCode::GetUpval, 0, 0, 0),
            abc(OpCode::Return, 0, 2, 0),
        ])
        .build();
    let chunk = ProtoBuilder::main(6)
        .constants(vec![int(1), int(2)])
        .child(get_i)
        .code(vec![
            abc(OpCode::NewTable, 0, 0, 0),
            abx(OpCode::LoadK, 1, 0),
            abx(OpCode::LoadK, 2, 1),
            abx(OpCode::LoadK, 3, 0),
            asbx(OpCode::ForPrep, 1, 3),
            abx(OpCode::Closure, 5, 0),
            abc(OpCode::SetTable, 0, 4, 5),
            asbx(OpCode::Jmp, 5, 0), // close upvalues >= R4
            asbx(OpCode::ForLoop, 1, -4),
            abc(OpCode::GetTable, 1, 0, k(0)),
            abc(OpCode::Call, 1, 1, 2),
            abc(OpCode::GetTable, 2, 0, k(1)),
            abc(OpCode::Call, 2, 1, 2),
            abc(OpCode::Return, 1, 3, 0),
        ])
        .chunk();
    assert_eq!(run(&chunk).unwrap(), vec![int(1), int(2)]);
}

#[test]
fn test_counter_survives_frame_exit() {
    // local function make() local n = 0 return function() n = n + 1 return n end end
    // local c = make(); c(); c(); return c()
    let counter = ProtoBuilder::new(2)
        .upvalue(true, 0, "n")
        .constants(vec![int(1)])
        .code(vec![
            abc(OpCode::GetUpval, 0, 0, 0),
            abc(OpCode::Add, 0, 0, k(0)),
            abc(OpCode::SetUpval, 0, 0, 0),
            abc(OpCode::GetUpval, 0, 0, 0),
            abc(OpCode::Return, 0, 2, 0),
        ])
        .build();
    let make = ProtoBuilder::new(2)
        .constants(vec![int(0)])
        .child(counter)
        .code(vec![
            abx(OpCode::LoadK, 0, 0),
            abx(OpCode::Closure, 1, 0),
            abc(OpCode::Return, 1, 2, 0),
        ])
        .build();
    let chunk = ProtoBuilder::main(3)
        .child(make)
        .code(vec![
            abx(OpCode::Closure, 0, 0),
            abc(OpCode::Move, 1, 0, 0),
            abc(OpCode::Call, 1, 1, 2),
            abc(OpCode::Move, 2, 1, 0),
            abc(OpCode::Call, 2, 1, 1),
            abc(OpCode::Move, 2, 1, 0),
            abc(OpCode::Call, 2, 1, 1),
            abc(OpCode::Move, 2, 1, 0),
            abc(OpCode::Call, 2, 1, 2),
            abc(OpCode::Return, 2, 2, 0),
        ])
        .chunk();
    assert_eq!(run(&chunk).unwrap(), vec![int(3)]);
}

#[test]
fn test_sibling_closures_share_upvalue() {
    // local function make() local v = 10
    //   return function() return v end, function(x) v = x end end
    // local get, set = make(); set(42); return get()
    let get = ProtoBuilder::new(1)
        .upvalue(true, 0, "v")
        .code(vec![
            abc(OpCode::GetUpval, 0, 0, 0),
            abc(OpCode::Return, 0, 2, 0),
        ])
        .build();
    let set = ProtoBuilder::new(1)
        .params(1, false)
        .upvalue(true, 0, "v")
        .code(vec![
            abc(OpCode::SetUpval, 0, 0, 0),
            abc(OpCode::Return, 0, 1, 0),
        ])
        .build();
    let make = ProtoBuilder::new(3)
        .constants(vec![int(10)])
        .child(get)
        .child(set)
        .code(vec![
            abx(OpCode::LoadK, 0, 0),
            abx(OpCode::Closure, 1, 0),
            abx(OpCode::Closure, 2, 1),
            abc(OpCode::Return, 1, 3, 0),
        ])
        .build();
    let chunk = ProtoBuilder::main(4)
        .constants(vec![int(42)])
        .child(make)
        .code(vec![
            abx(OpCode::Closure, 0, 0),
            abc(OpCode::Call, 0, 1, 3),
            abc(OpCode::Move, 2, 1, 0),
            abx(OpCode::LoadK, 3, 0),
            abc(OpCode::Call, 2, 2, 1),
            abc(OpCode::Move, 2, 0, 0),
            abc(OpCode::Call, 2, 1, 2),
            abc(OpCode::Return, 2, 2, 0),
        ])
        .chunk();
    assert_eq!(run(&chunk).unwrap(), vec![int(42)]);
}

#[test]
fn test_open_upvalue_writes_through_to_register() {
    // local x = 1; local function f() x = x + 1 end; f(); f(); return x
    let f = ProtoBuilder::new(1)
        .upvalue(true, 0, "x")
        .constants(vec![int(1)])
        .code(vec![
            abc(OpCode::GetUpval, 0, 0, 0),
            abc(OpCode::Add, 0, 0, k(0)),
            abc(OpCode::SetUpval, 0, 0, 0),
            abc(OpCode::Return, 0, 1, 0),
        ])
        .build();
    let chunk = ProtoBuilder::main(3)
        .constants(vec![int(1)])
        .child(f)
        .code(vec![
            abx(OpCode::LoadK, 0, 0),
            abx(OpCode::Closure, 1, 0),
            abc(OpCode::Move, 2, 1, 0),
            abc(OpCode::Call, 2, 1, 1),
            abc(OpCode::Move, 2, 1, 0),
            abc(OpCode::Call, 2, 1, 1),
            abc(OpCode::Return, 0, 2, 0),
        ])
        .chunk();
    assert_eq!(run(&chunk).unwrap(), vec![int(3)]);
}

#[test]
fn test_chained_capture_through_enclosing_closure() {
    // local function outer(x) return function(y) return function(z)
    //   return x + y + z end end end
    // return outer(1)(2)(3)
    let inner = ProtoBuilder::new(3)
        .params(1, false)
        .upvalue(false, 0, "x")
        .upvalue(true, 0, "y")
        .code(vec![
            abc(OpCode::GetUpval, 1, 0, 0),
            abc(OpCode::GetUpval, 2, 1, 0),
            abc(OpCode::Add, 1, 1, 2),
            abc(OpCode::Add, 1, 1, 0),
            abc(OpCode::Return, 1, 2, 0),
        ])
        .build();
    let middle = ProtoBuilder::new(2)
        .params(1, false)
        .upvalue(true, 0, "x")
        .child(inner)
        .code(vec![
            abx(OpCode::Closure, 1, 0),
            abc(OpCode::Return, 1, 2, 0),
        ])
        .build();
    let outer = ProtoBuilder::new(2)
        .params(1, false)
        .child(middle)
        .code(vec![
            abx(OpCode::Closure, 1, 0),
            abc(OpCode::Return, 1, 2, 0),
        ])
        .build();
    let chunk = ProtoBuilder::main(2)
        .constants(vec![int(1), int(2), int(3)])
        .child(outer)
        .code(vec![
            abx(OpCode::Closure, 0, 0),
            abx(OpCode::LoadK, 1, 0),
            abc(OpCode::Call, 0, 2, 2),
            abx(OpCode::LoadK, 1, 1),
            abc(OpCode::Call, 0, 2, 2),
            abx(OpCode::LoadK, 1, 2),
            abc(OpCode::Call, 0, 2, 2),
            abc(OpCode::Return, 0, 2, 0),
        ])
        .chunk();
    assert_eq!(run(&chunk).unwrap(), vec![int(6)]);
}

#[test]
fn test_main_chunk_sees_globals_through_env_upvalue() {
    // x = 5; return x
    let chunk = ProtoBuilder::main(1)
        .constants(vec![LuaValue::string("x"), int(5)])
        .code(vec![
            abc(OpCode::SetTabUp, 0, k(0), k(1)),
            abc(OpCode::GetTabUp, 0, 0, k(0)),
            abc(OpCode::Return, 0, 2, 0),
        ])
        .chunk();
    let mut vm = super::new_vm();
    assert_eq!(vm.execute_chunk(&chunk).unwrap(), vec![int(5)]);
    assert_eq!(vm.get_global("x"), int(5));
}

#[test]
fn test_partial_close_with_out_of_order_captures() {
    // local a, b, c = 10, 20, 30
    // local f = function() return c + a end
    // local g = function() return b end
    // (b and c leave scope, a stays open)
    // a, b, c = 99, 77, 55
    // return f(), g()
    let f = ProtoBuilder::new(2)
        .upvalue(true, 2, "c")
        .upvalue(true, 0, "a")
        .code(vec![
            abc(OpCode::GetUpval, 0, 0, 0),
            abc(OpCode::GetUpval, 1, 1, 0),
            abc(OpCode::Add, 0, 0, 1),
            abc(OpCode::Return, 0, 2, 0),
        ])
        .build();
    let g = ProtoBuilder::new(1)
        .upvalue(true, 1, "b")
        .code(vec![
            abc(OpCode::GetUpval, 0, 0, 0),
            abc(OpCode::Return, 0, 2, 0),
        ])
        .build();
    let chunk = ProtoBuilder::main(8)
        .constants(vec![int(10), int(20), int(30), int(99), int(77), int(55)])
        .child(f)
        .child(g)
        .code(vec![
            abx(OpCode::LoadK, 0, 0),
            abx(OpCode::LoadK, 1, 1),
            abx(OpCode::LoadK, 2, 2),
            abx(OpCode::Closure, 3, 0),
            abx(OpCode::Closure, 4, 1),
            asbx(OpCode::Jmp, 2, 0),
            abx(OpCode::LoadK, 0, 3),
            abx(OpCode::LoadK, 1, 4),
            abx(OpCode::LoadK, 2, 5),
            abc(OpCode::Move, 5, 3, 0),
            abc(OpCode::Call, 5, 1, 2),
            abc(OpCode::Move, 6, 4, 0),
            abc(OpCode::Call, 6, 1, 2),
            abc(OpCode::Return, 5, 3, 0),
        ])
        .chunk();
    assert_eq!(run(&chunk).unwrap(), vec![int(129), int(20)]);
}
