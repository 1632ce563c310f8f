// Table library
// Implements: concat, insert, move, pack, remove, sort, unpack

use std::rc::Rc;

use crate::lib_registry::{
    LibraryModule, arg_error, check_integer, check_table, get_arg, opt_integer, opt_string,
};
use crate::lua_value::{LuaString, LuaTable, LuaValue};
use crate::lua_vm::{LuaError, LuaResult, LuaVM};
use crate::stdlib::sort_table::table_sort;

/// Most values `table.unpack` will spread onto the stack
const MAX_UNPACK: i64 = 1_000_000;

pub fn create_table_lib() -> LibraryModule {
    crate::lib_module!("table", {
        "concat" => table_concat,
        "move" => table_move,
        "pack" => table_pack,
        "remove" => table_remove,
        "unpack" => table_unpack,
    })
    .with_action("insert", table_insert)
    .with_action("sort", table_sort)
}

/// table.concat(list [, sep [, i [, j]]]) - Concatenate table elements
fn table_concat(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(args, 1, "concat")?;
    let sep = opt_string(args, 2, "concat", "")?;
    let t = table.borrow();
    let i = opt_integer(args, 3, "concat", 1)?;
    let j = opt_integer(args, 4, "concat", t.length())?;

    let mut buf = Vec::new();
    let mut idx = i;
    while idx <= j {
        let value = t.get_int(idx);
        let Some(s) = value.to_lua_string() else {
            return Err(LuaError::runtime(format!(
                "invalid value (at index {}) in table for 'concat'",
                idx
            )));
        };
        buf.extend_from_slice(s.as_bytes());
        if idx == j {
            break;
        }
        buf.extend_from_slice(sep.as_bytes());
        idx += 1;
    }
    Ok(vec![LuaValue::String(LuaString::from(buf))])
}

/// table.insert(list, [pos,] value) - Insert element
fn table_insert(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<()> {
    let table = check_table(args, 1, "insert")?;
    match args.len() {
        2 => {
            let mut t = table.borrow_mut();
            let end = t.length().wrapping_add(1);
            t.set_int(end, get_arg(args, 2));
            Ok(())
        }
        3 => {
            let pos = check_integer(args, 2, "insert")?;
            table.borrow_mut().insert(pos, get_arg(args, 3))
        }
        _ => Err(LuaError::runtime("wrong number of arguments to 'insert'")),
    }
}

/// table.remove(list [, pos]) - Remove element
fn table_remove(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(args, 1, "remove")?;
    let mut t = table.borrow_mut();
    let size = t.length();
    let pos = opt_integer(args, 2, "remove", size)?;
    Ok(vec![t.remove(pos)?])
}

/// table.move(a1, f, e, t [, a2]) - Move a1[f..e] to a2[t..]
fn table_move(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let src = check_table(args, 1, "move")?;
    let f = check_integer(args, 2, "move")?;
    let e = check_integer(args, 3, "move")?;
    let t = check_integer(args, 4, "move")?;
    let dst = if get_arg(args, 5).is_nil() {
        src.clone()
    } else {
        check_table(args, 5, "move")?
    };

    if e >= f {
        if !(f > 0 || e < i64::MAX + f) {
            return Err(arg_error(3, "move", "too many elements to move"));
        }
        let n = e - f;
        if t > i64::MAX - n {
            return Err(arg_error(4, "move", "destination wrap around"));
        }
        // copy backwards when the ranges overlap with t after f
        let overlapping = Rc::ptr_eq(&src, &dst) && t > f && t <= e;
        let offsets: Box<dyn Iterator<Item = i64>> = if overlapping {
            Box::new((0..=n).rev())
        } else {
            Box::new(0..=n)
        };
        for i in offsets {
            let value = src.borrow().get_int(f + i);
            dst.borrow_mut().set_int(t + i, value);
        }
    }
    Ok(vec![LuaValue::Table(dst)])
}

/// table.pack(...) - Pack values into a table with field `n`
fn table_pack(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let mut t = LuaTable::new(args.len(), 1);
    for (i, arg) in args.iter().enumerate() {
        t.set_int(i as i64 + 1, arg.clone());
    }
    t.set_str("n", LuaValue::Integer(args.len() as i64));
    Ok(vec![LuaValue::table(t)])
}

/// table.unpack(list [, i [, j]]) - Unpack table into values
fn table_unpack(_vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(args, 1, "unpack")?;
    let t = table.borrow();
    let i = opt_integer(args, 2, "unpack", 1)?;
    let j = opt_integer(args, 3, "unpack", t.length())?;
    if i > j {
        return Ok(Vec::new());
    }
    let n = (j as i128 - i as i128) + 1;
    if n >= MAX_UNPACK as i128 {
        return Err(LuaError::runtime("too many results to unpack"));
    }
    Ok((i..=j).map(|k| t.get_int(k)).collect())
}
