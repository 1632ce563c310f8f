// Standard library tests: basic, math, table and utf8
use super::{ProtoBuilder, SharedOutput, abc, abx, asbx, call_lib, int, new_vm, s};
use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaError, LuaVM, OpCode, SafeOption};
use crate::stdlib::Stdlib;

fn list(vm: &mut LuaVM, values: &[i64]) -> LuaValue {
    let t = vm.create_table(values.len(), 0);
    for (i, v) in values.iter().enumerate() {
        set_item(&t, i as i64 + 1, int(*v));
    }
    t
}

fn set_item(t: &LuaValue, key: i64, value: LuaValue) {
    let LuaValue::Table(t) = t else {
        panic!("not a table: {:?}", t);
    };
    t.borrow_mut().set_int(key, value);
}

fn contents(t: &LuaValue) -> Vec<LuaValue> {
    let LuaValue::Table(t) = t else {
        panic!("not a table: {:?}", t);
    };
    let t = t.borrow();
    (1..=t.length()).map(|i| t.get_int(i)).collect()
}

// ============ basic ============

#[test]
fn test_print_writes_tab_separated_line() {
    let mut vm = new_vm();
    let out = SharedOutput::default();
    vm.set_output(Box::new(out.clone()));
    call_lib(&mut vm, "", "print", &[s("a"), int(1), LuaValue::Float(2.0), LuaValue::Nil]).unwrap();
    call_lib(&mut vm, "", "print", &[]).unwrap();
    assert_eq!(out.text(), "a\t1\t2.0\tnil\n\n");
}

#[test]
fn test_type_names() {
    let mut vm = new_vm();
    let print = vm.get_global("print");
    let table = LuaValue::new_table();
    let cases = [
        (LuaValue::Nil, "nil"),
        (LuaValue::Boolean(false), "boolean"),
        (int(1), "number"),
        (LuaValue::Float(1.0), "number"),
        (s("x"), "string"),
        (table, "table"),
        (print, "function"),
    ];
    for (value, name) in cases {
        assert_eq!(call_lib(&mut vm, "", "type", &[value]).unwrap(), vec![s(name)]);
    }
    let err = call_lib(&mut vm, "", "type", &[]).unwrap_err();
    assert!(matches!(err, LuaError::ArgumentCount { .. }));
}

#[test]
fn test_tonumber() {
    let mut vm = new_vm();
    let mut tonumber = |args: &[LuaValue]| call_lib(&mut vm, "", "tonumber", args).unwrap().remove(0);
    assert_eq!(tonumber(&[s(" 10 ")]), int(10));
    assert_eq!(tonumber(&[s("0x1F")]), int(31));
    assert_eq!(tonumber(&[s("1e2")]), LuaValue::Float(100.0));
    assert!(tonumber(&[s("abc")]).is_nil());
    assert!(tonumber(&[LuaValue::Boolean(true)]).is_nil());
    assert_eq!(tonumber(&[s("ff"), int(16)]), int(255));
    assert_eq!(tonumber(&[s("zz"), int(36)]), int(1295));
    assert_eq!(tonumber(&[s("-101"), int(2)]), int(-5));
    assert!(tonumber(&[s("8"), int(8)]).is_nil());

    let err = call_lib(&mut vm, "", "tonumber", &[s("1"), int(99)]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #2 to 'tonumber' (base out of range)");
}

#[test]
fn test_tostring() {
    let mut vm = new_vm();
    let mut tostring = |v: LuaValue| call_lib(&mut vm, "", "tostring", &[v]).unwrap().remove(0);
    assert_eq!(tostring(int(-5)), s("-5"));
    assert_eq!(tostring(LuaValue::Float(1e100)), s("1e+100"));
    assert_eq!(tostring(LuaValue::Float(0.1)), s("0.1"));
    assert_eq!(tostring(LuaValue::Boolean(false)), s("false"));
    assert!(tostring(LuaValue::new_table()).to_string().starts_with("table: 0x"));
}

#[test]
fn test_select() {
    let mut vm = new_vm();
    let args = [s("#"), s("a"), LuaValue::Nil, s("c")];
    assert_eq!(call_lib(&mut vm, "", "select", &args).unwrap(), vec![int(3)]);
    let args = [int(2), s("a"), s("b"), s("c")];
    assert_eq!(call_lib(&mut vm, "", "select", &args).unwrap(), vec![s("b"), s("c")]);
    let args = [int(-1), s("a"), s("b"), s("c")];
    assert_eq!(call_lib(&mut vm, "", "select", &args).unwrap(), vec![s("c")]);
    let args = [int(5), s("a")];
    assert!(call_lib(&mut vm, "", "select", &args).unwrap().is_empty());
    let err = call_lib(&mut vm, "", "select", &[int(0)]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #1 to 'select' (index out of range)");
    assert!(call_lib(&mut vm, "", "select", &[int(-2), s("a")]).is_err());
}

#[test]
fn test_assert_and_error_payloads() {
    let mut vm = new_vm();
    let ok = call_lib(&mut vm, "", "assert", &[int(1), s("unused")]).unwrap();
    assert_eq!(ok, vec![int(1), s("unused")]);

    let err = call_lib(&mut vm, "", "assert", &[LuaValue::Boolean(false)]).unwrap_err();
    assert_eq!(err.to_string(), "assertion failed!");
    let err = call_lib(&mut vm, "", "assert", &[LuaValue::Nil, int(42)]).unwrap_err();
    assert_eq!(err.value(), int(42));

    // called from Rust there is no Lua frame to blame
    let err = call_lib(&mut vm, "", "error", &[s("plain")]).unwrap_err();
    assert_eq!(err.to_string(), "plain");
    let table = LuaValue::new_table();
    let err = call_lib(&mut vm, "", "error", &[table.clone()]).unwrap_err();
    assert_eq!(err.value(), table);
}

#[test]
fn test_error_inside_chunk_gets_position() {
    // error("bad") raised at line 4; error("bad", 0) gets no position
    let chunk = |level: Option<i64>| {
        let mut constants = vec![s("error"), s("bad")];
        let mut code = vec![
            abc(OpCode::GetTabUp, 0, 0, super::k(0)),
            abx(OpCode::LoadK, 1, 1),
        ];
        let nargs = match level {
            Some(level) => {
                constants.push(int(level));
                code.push(abx(OpCode::LoadK, 2, 2));
                2
            }
            None => {
                code.push(abc(OpCode::Move, 0, 0, 0));
                1
            }
        };
        code.push(abc(OpCode::Call, 0, nargs + 1, 1));
        code.push(abc(OpCode::Return, 0, 1, 0));
        ProtoBuilder::main(3).constants(constants).code(code).chunk()
    };
    let mut vm = new_vm();
    let err = vm.execute_chunk(&chunk(None)).unwrap_err();
    assert_eq!(err.to_string(), "test.lua:4: bad");
    let err = vm.execute_chunk(&chunk(Some(0))).unwrap_err();
    assert_eq!(err.to_string(), "bad");
}

#[test]
fn test_pairs_and_next_directly() {
    let mut vm = new_vm();
    let t = list(&mut vm, &[5, 6]);
    let next = call_lib(&mut vm, "", "pairs", &[t.clone()]).unwrap();
    assert_eq!(next.len(), 3);
    assert!(next[0].is_function());
    assert!(next[2].is_nil());

    let first = call_lib(&mut vm, "", "next", &[t.clone()]).unwrap();
    assert_eq!(first, vec![int(1), int(5)]);
    let second = call_lib(&mut vm, "", "next", &[t.clone(), int(1)]).unwrap();
    assert_eq!(second, vec![int(2), int(6)]);
    let end = call_lib(&mut vm, "", "next", &[t.clone(), int(2)]).unwrap();
    assert_eq!(end, vec![LuaValue::Nil]);

    let err = call_lib(&mut vm, "", "pairs", &[int(1)]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #1 to 'pairs' (table expected, got number)");
}

#[test]
fn test_ipairs_iterator() {
    let mut vm = new_vm();
    let t = list(&mut vm, &[7, 8]);
    let triple = call_lib(&mut vm, "", "ipairs", &[t.clone()]).unwrap();
    let iter = triple[0].clone();
    assert_eq!(triple[2], int(0));
    assert_eq!(vm.call_function(&iter, &[t.clone(), int(0)]).unwrap(), vec![int(1), int(7)]);
    assert_eq!(vm.call_function(&iter, &[t.clone(), int(2)]).unwrap(), vec![LuaValue::Nil]);
}

#[test]
fn test_raw_functions() {
    let mut vm = new_vm();
    let t = list(&mut vm, &[1, 2, 3]);
    call_lib(&mut vm, "", "rawset", &[t.clone(), s("k"), s("v")]).unwrap();
    assert_eq!(call_lib(&mut vm, "", "rawget", &[t.clone(), s("k")]).unwrap(), vec![s("v")]);
    assert_eq!(call_lib(&mut vm, "", "rawlen", &[t.clone()]).unwrap(), vec![int(3)]);
    assert_eq!(call_lib(&mut vm, "", "rawlen", &[s("abcd")]).unwrap(), vec![int(4)]);
    assert_eq!(
        call_lib(&mut vm, "", "rawequal", &[int(1), LuaValue::Float(1.0)]).unwrap(),
        vec![LuaValue::Boolean(true)]
    );
    let err = call_lib(&mut vm, "", "rawset", &[t, LuaValue::Nil, int(1)]).unwrap_err();
    assert_eq!(err.to_string(), "table index is nil");
}

#[test]
fn test_version_and_selective_open() {
    let vm = new_vm();
    assert_eq!(vm.get_global("_VERSION"), s("Lua 5.3"));

    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::Math).unwrap();
    assert!(vm.get_global("math").is_table());
    assert!(vm.get_global("print").is_nil());
    assert!(vm.get_global("string").is_nil());
}

// ============ math ============

fn math(name: &str, args: &[LuaValue]) -> Vec<LuaValue> {
    let mut vm = new_vm();
    call_lib(&mut vm, "math", name, args).unwrap()
}

#[test]
fn test_math_floor_ceil_return_integers() {
    assert!(matches!(math("floor", &[LuaValue::Float(3.7)])[0], LuaValue::Integer(3)));
    assert!(matches!(math("floor", &[LuaValue::Float(-3.2)])[0], LuaValue::Integer(-4)));
    assert!(matches!(math("ceil", &[LuaValue::Float(3.2)])[0], LuaValue::Integer(4)));
    assert!(matches!(math("floor", &[int(5)])[0], LuaValue::Integer(5)));
    // out of integer range stays a float
    assert!(matches!(math("floor", &[LuaValue::Float(1e300)])[0], LuaValue::Float(_)));
}

#[test]
fn test_math_fmod_truncates() {
    assert_eq!(math("fmod", &[int(7), int(3)]), vec![int(1)]);
    assert_eq!(math("fmod", &[int(-7), int(3)]), vec![int(-1)]);
    assert_eq!(math("fmod", &[int(i64::MIN), int(-1)]), vec![int(0)]);
    assert_eq!(math("fmod", &[LuaValue::Float(-5.5), int(2)]), vec![LuaValue::Float(-1.5)]);

    let mut vm = new_vm();
    let err = call_lib(&mut vm, "math", "fmod", &[int(1), int(0)]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #2 to 'fmod' (zero)");
}

#[test]
fn test_math_integer_helpers() {
    assert_eq!(math("tointeger", &[LuaValue::Float(3.0)]), vec![int(3)]);
    assert_eq!(math("tointeger", &[LuaValue::Float(3.5)]), vec![LuaValue::Nil]);
    assert_eq!(math("type", &[int(1)]), vec![s("integer")]);
    assert_eq!(math("type", &[LuaValue::Float(1.0)]), vec![s("float")]);
    assert_eq!(math("type", &[s("1")]), vec![LuaValue::Nil]);
    assert_eq!(math("ult", &[int(1), int(-1)]), vec![LuaValue::Boolean(true)]);
    assert_eq!(math("abs", &[int(-4)]), vec![int(4)]);
    assert_eq!(math("max", &[int(1), LuaValue::Float(2.5), int(2)]), vec![LuaValue::Float(2.5)]);
    assert_eq!(math("min", &[int(3), int(-1), int(2)]), vec![int(-1)]);
    assert_eq!(math("modf", &[LuaValue::Float(3.25)]), vec![LuaValue::Float(3.0), LuaValue::Float(0.25)]);
}

#[test]
fn test_math_constants() {
    let vm = new_vm();
    let LuaValue::Table(m) = vm.get_global("math") else {
        panic!("math is not a table");
    };
    let m = m.borrow();
    assert_eq!(m.get_str("maxinteger"), int(i64::MAX));
    assert_eq!(m.get_str("mininteger"), int(i64::MIN));
    assert_eq!(m.get_str("huge"), LuaValue::Float(f64::INFINITY));
    assert_eq!(m.get_str("pi"), LuaValue::Float(std::f64::consts::PI));
}

#[test]
fn test_math_random_ranges() {
    let mut vm = new_vm();
    call_lib(&mut vm, "math", "randomseed", &[int(42)]).unwrap();
    for _ in 0..100 {
        let LuaValue::Float(f) = call_lib(&mut vm, "math", "random", &[]).unwrap()[0] else {
            panic!("random() must return a float");
        };
        assert!((0.0..1.0).contains(&f));
        let LuaValue::Integer(i) = call_lib(&mut vm, "math", "random", &[int(6)]).unwrap()[0] else {
            panic!("random(m) must return an integer");
        };
        assert!((1..=6).contains(&i));
        let LuaValue::Integer(i) = call_lib(&mut vm, "math", "random", &[int(-3), int(3)]).unwrap()[0]
        else {
            panic!("random(m, n) must return an integer");
        };
        assert!((-3..=3).contains(&i));
    }
    let err = call_lib(&mut vm, "math", "random", &[int(5), int(1)]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #2 to 'random' (interval is empty)");
}

#[test]
fn test_math_randomseed_is_reproducible() {
    let mut vm = new_vm();
    let draw = |vm: &mut LuaVM| {
        call_lib(vm, "math", "randomseed", &[int(7)]).unwrap();
        (0..5)
            .map(|_| call_lib(vm, "math", "random", &[int(1000)]).unwrap().remove(0))
            .collect::<Vec<_>>()
    };
    let first = draw(&mut vm);
    assert_eq!(first, draw(&mut vm));
}

// ============ table ============

#[test]
fn test_table_insert_and_remove() {
    let mut vm = new_vm();
    let t = list(&mut vm, &[1, 2, 3]);
    call_lib(&mut vm, "table", "insert", &[t.clone(), int(4)]).unwrap();
    call_lib(&mut vm, "table", "insert", &[t.clone(), int(1), int(0)]).unwrap();
    assert_eq!(contents(&t), [0, 1, 2, 3, 4].map(int).to_vec());

    assert_eq!(call_lib(&mut vm, "table", "remove", &[t.clone()]).unwrap(), vec![int(4)]);
    assert_eq!(call_lib(&mut vm, "table", "remove", &[t.clone(), int(1)]).unwrap(), vec![int(0)]);
    assert_eq!(contents(&t), [1, 2, 3].map(int).to_vec());

    let err = call_lib(&mut vm, "table", "insert", &[t.clone(), int(9), int(1)]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #2 to 'insert' (position out of bounds)");
    let err = call_lib(&mut vm, "table", "insert", &[t, int(1), int(2), int(3)]).unwrap_err();
    assert_eq!(err.to_string(), "wrong number of arguments to 'insert'");
}

#[test]
fn test_table_concat() {
    let mut vm = new_vm();
    let t = list(&mut vm, &[1, 2, 3]);
    assert_eq!(call_lib(&mut vm, "table", "concat", &[t.clone()]).unwrap(), vec![s("123")]);
    assert_eq!(
        call_lib(&mut vm, "table", "concat", &[t.clone(), s(", "), int(2), int(3)]).unwrap(),
        vec![s("2, 3")]
    );
    assert_eq!(
        call_lib(&mut vm, "table", "concat", &[t.clone(), s(","), int(3), int(2)]).unwrap(),
        vec![s("")]
    );
    set_item(&t, 2, LuaValue::Boolean(true));
    let err = call_lib(&mut vm, "table", "concat", &[t]).unwrap_err();
    assert_eq!(err.to_string(), "invalid value (at index 2) in table for 'concat'");
}

#[test]
fn test_table_pack_unpack() {
    let mut vm = new_vm();
    let packed = call_lib(&mut vm, "table", "pack", &[int(1), s("two"), int(3)]).unwrap().remove(0);
    assert_eq!(contents(&packed), vec![int(1), s("two"), int(3)]);
    let n = vm.index_value(&packed, &s("n")).unwrap();
    assert_eq!(n, int(3));

    let t = list(&mut vm, &[10, 20, 30]);
    assert_eq!(
        call_lib(&mut vm, "table", "unpack", &[t.clone()]).unwrap(),
        vec![int(10), int(20), int(30)]
    );
    assert_eq!(
        call_lib(&mut vm, "table", "unpack", &[t.clone(), int(2), int(4)]).unwrap(),
        vec![int(20), int(30), LuaValue::Nil]
    );
    assert!(call_lib(&mut vm, "table", "unpack", &[t.clone(), int(3), int(1)]).unwrap().is_empty());
    let err = call_lib(&mut vm, "table", "unpack", &[t, int(1), int(i64::MAX)]).unwrap_err();
    assert_eq!(err.to_string(), "too many results to unpack");
}

#[test]
fn test_table_move() {
    let mut vm = new_vm();
    let t = list(&mut vm, &[1, 2, 3, 4, 5]);
    // overlapping shift to the right copies backwards
    call_lib(&mut vm, "table", "move", &[t.clone(), int(1), int(3), int(3)]).unwrap();
    assert_eq!(contents(&t), [1, 2, 1, 2, 3].map(int).to_vec());

    let dst = list(&mut vm, &[]);
    let moved = call_lib(&mut vm, "table", "move", &[t, int(2), int(4), int(1), dst.clone()]).unwrap();
    assert_eq!(moved, vec![dst.clone()]);
    assert_eq!(contents(&dst), [2, 1, 2].map(int).to_vec());
}

#[test]
fn test_table_sort_default_order() {
    let mut vm = new_vm();
    let t = list(&mut vm, &[5, 2, 8, 1, 9, 3, 3, 7]);
    call_lib(&mut vm, "table", "sort", &[t.clone()]).unwrap();
    assert_eq!(contents(&t), [1, 2, 3, 3, 5, 7, 8, 9].map(int).to_vec());

    let words = vm.create_table(3, 0);
    for (i, w) in ["pear", "apple", "fig"].into_iter().enumerate() {
        set_item(&words, i as i64 + 1, s(w));
    }
    call_lib(&mut vm, "table", "sort", &[words.clone()]).unwrap();
    assert_eq!(contents(&words), vec![s("apple"), s("fig"), s("pear")]);

    let mixed = list(&mut vm, &[1, 2]);
    set_item(&mixed, 3, s("x"));
    let err = call_lib(&mut vm, "table", "sort", &[mixed]).unwrap_err();
    assert!(err.to_string().starts_with("attempt to compare"));
}

#[test]
fn test_table_sort_with_lua_comparator() {
    // return function(a, b) return a > b end
    let greater = ProtoBuilder::new(3)
        .params(2, false)
        .code(vec![
            abc(OpCode::Lt, 1, 1, 0),
            asbx(OpCode::Jmp, 0, 1),
            abc(OpCode::LoadBool, 2, 0, 1),
            abc(OpCode::LoadBool, 2, 1, 0),
            abc(OpCode::Return, 2, 2, 0),
        ])
        .build();
    let chunk = ProtoBuilder::main(1)
        .child(greater)
        .code(vec![
            abx(OpCode::Closure, 0, 0),
            abc(OpCode::Return, 0, 2, 0),
        ])
        .chunk();
    let mut vm = new_vm();
    let comparator = vm.execute_chunk(&chunk).unwrap().remove(0);
    assert!(comparator.is_function());

    let t = list(&mut vm, &[2, 5, 1, 4]);
    call_lib(&mut vm, "table", "sort", &[t.clone(), comparator]).unwrap();
    assert_eq!(contents(&t), [5, 4, 2, 1].map(int).to_vec());

    let err = call_lib(&mut vm, "table", "sort", &[t, int(1)]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #2 to 'sort' (function expected, got number)");
}

// ============ utf8 ============

fn utf8(name: &str, args: &[LuaValue]) -> Vec<LuaValue> {
    let mut vm = new_vm();
    call_lib(&mut vm, "utf8", name, args).unwrap()
}

#[test]
fn test_utf8_char_and_len() {
    let euro = utf8("char", &[int(72), int(0x20AC)]).remove(0);
    let LuaValue::String(bytes) = &euro else {
        panic!("utf8.char must return a string");
    };
    assert_eq!(bytes.as_bytes(), "H\u{20AC}".as_bytes());
    assert_eq!(utf8("len", &[euro.clone()]), vec![int(2)]);
    assert_eq!(utf8("len", &[euro.clone(), int(2)]), vec![int(1)]);
    assert_eq!(
        utf8("len", &[LuaValue::String(crate::lua_value::LuaString::from(&b"a\xffb"[..]))]),
        vec![LuaValue::Nil, int(2)]
    );

    let mut vm = new_vm();
    let err = call_lib(&mut vm, "utf8", "len", &[s("abc"), int(5)]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #2 to 'len' (initial position out of string)");
}

#[test]
fn test_utf8_codepoint_and_offset() {
    let text = s("H\u{20AC}!");
    assert_eq!(utf8("codepoint", &[text.clone()]), vec![int(72)]);
    assert_eq!(
        utf8("codepoint", &[text.clone(), int(1), int(-1)]),
        vec![int(72), int(0x20AC), int(33)]
    );
    assert_eq!(utf8("offset", &[text.clone(), int(2)]), vec![int(2)]);
    assert_eq!(utf8("offset", &[text.clone(), int(3)]), vec![int(5)]);
    assert_eq!(utf8("offset", &[text.clone(), int(-1)]), vec![int(5)]);
    assert_eq!(utf8("offset", &[text.clone(), int(0), int(3)]), vec![int(2)]);

    let mut vm = new_vm();
    let err = call_lib(&mut vm, "utf8", "offset", &[text.clone(), int(1), int(3)]).unwrap_err();
    assert_eq!(err.to_string(), "initial position is a continuation byte");
    let err = call_lib(&mut vm, "utf8", "codepoint", &[text, int(1), int(10)]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #3 to 'codepoint' (out of range)");
}

#[test]
fn test_utf8_codes_iteration() {
    let mut vm = new_vm();
    let text = s("H\u{20AC}");
    let triple = call_lib(&mut vm, "utf8", "codes", &[text.clone()]).unwrap();
    let iter = triple[0].clone();
    assert_eq!(triple[2], int(0));

    let mut control = int(0);
    let mut seen = Vec::new();
    loop {
        let results = vm.call_function(&iter, &[text.clone(), control.clone()]).unwrap();
        if results[0].is_nil() {
            break;
        }
        seen.push((results[0].clone(), results[1].clone()));
        control = results[0].clone();
    }
    assert_eq!(seen, vec![(int(1), int(72)), (int(2), int(0x20AC))]);
}

#[test]
fn test_utf8_charpattern() {
    let vm = new_vm();
    let LuaValue::Table(lib) = vm.get_global("utf8") else {
        panic!("utf8 is not a table");
    };
    let pattern = lib.borrow().get_str("charpattern");
    let LuaValue::String(pattern) = pattern else {
        panic!("charpattern is not a string");
    };
    assert_eq!(pattern.as_bytes(), b"[\0-\x7F\xC2-\xF4][\x80-\xBF]*");
}
