// table.sort: quicksort over a snapshot of t[1..n], in the manner of ltablib.c.
// The comparator may be a Lua function, so the table is never borrowed
// while it runs.

use crate::lib_registry::{arg_error, check_table, get_arg};
use crate::lua_value::{LuaValue, less_than};
use crate::lua_vm::{LuaError, LuaResult, LuaVM};

/// table.sort(list [, comp]) - Sort table in place
pub fn table_sort(vm: &mut LuaVM, args: &[LuaValue]) -> LuaResult<()> {
    let table = check_table(args, 1, "sort")?;
    let comp = get_arg(args, 2);
    if !comp.is_nil() && !comp.is_function() {
        return Err(arg_error(
            2,
            "sort",
            format!("function expected, got {}", comp.type_name()),
        ));
    }

    let mut values: Vec<LuaValue> = {
        let t = table.borrow();
        let n = t.length();
        if n > i32::MAX as i64 {
            return Err(arg_error(1, "sort", "array too big"));
        }
        (1..=n).map(|i| t.get_int(i)).collect()
    };
    if values.len() < 2 {
        return Ok(());
    }

    let mut sorter = Sorter { vm, comp };
    let hi = values.len() - 1;
    sorter.sort(&mut values, 0, hi)?;

    let mut t = table.borrow_mut();
    for (i, v) in values.into_iter().enumerate() {
        t.set_int(i as i64 + 1, v);
    }
    Ok(())
}

struct Sorter<'a> {
    vm: &'a mut LuaVM,
    comp: LuaValue,
}

impl Sorter<'_> {
    fn less(&mut self, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
        if self.comp.is_nil() {
            return less_than(a, b);
        }
        let results = self.vm.call_function(&self.comp, &[a.clone(), b.clone()])?;
        Ok(results.first().is_some_and(|v| v.is_truthy()))
    }

    /// Sort `a[lo..=hi]`. Recurses into the smaller half only, so depth
    /// stays logarithmic.
    fn sort(&mut self, a: &mut [LuaValue], mut lo: usize, mut hi: usize) -> LuaResult<()> {
        while lo < hi {
            // order lo, mid, hi and use the median as pivot
            if self.less(&a[hi], &a[lo])? {
                a.swap(lo, hi);
            }
            if hi - lo == 1 {
                break;
            }
            let mid = lo + (hi - lo) / 2;
            if self.less(&a[mid], &a[lo])? {
                a.swap(mid, lo);
            } else if self.less(&a[hi], &a[mid])? {
                a.swap(mid, hi);
            }
            if hi - lo == 2 {
                break;
            }

            let pivot = a[mid].clone();
            a.swap(mid, hi - 1);
            let p = self.partition(a, lo, hi, &pivot)?;

            if p - lo < hi - p {
                if p > lo {
                    self.sort(a, lo, p - 1)?;
                }
                lo = p + 1;
            } else {
                self.sort(a, p + 1, hi)?;
                if p == 0 {
                    break;
                }
                hi = p - 1;
            }
        }
        Ok(())
    }

    /// Hoare partition of `a[lo+1..hi-1]` around `pivot` (parked at hi-1).
    fn partition(
        &mut self,
        a: &mut [LuaValue],
        lo: usize,
        hi: usize,
        pivot: &LuaValue,
    ) -> LuaResult<usize> {
        let mut i = lo;
        let mut j = hi - 1;
        loop {
            i += 1;
            while self.less(&a[i], pivot)? {
                if i == hi - 1 {
                    return Err(invalid_order());
                }
                i += 1;
            }
            j -= 1;
            while self.less(pivot, &a[j])? {
                if j == lo {
                    return Err(invalid_order());
                }
                j -= 1;
            }
            if j < i {
                a.swap(hi - 1, i);
                return Ok(i);
            }
            a.swap(i, j);
        }
    }
}

fn invalid_order() -> LuaError {
    LuaError::runtime("invalid order function for sorting")
}
