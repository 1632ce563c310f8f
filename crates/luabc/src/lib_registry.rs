// Library registration system for the standard libraries
// Native functions are installed into a table's native overlay, so library
// tables stay plain tables that scripts can extend or shadow.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::lua_value::{LuaString, LuaTable, LuaTableRef, LuaValue};
use crate::lua_vm::{LuaError, LuaResult, LuaVM};

/// Native library function returning zero or more values
pub type LibFunction = fn(&mut LuaVM, &[LuaValue]) -> LuaResult<Vec<LuaValue>>;

/// Native library function returning nothing
pub type LibAction = fn(&mut LuaVM, &[LuaValue]) -> LuaResult<()>;

/// Type for value initializers - functions that create values when the module loads
pub type ValueInitializer = fn(&mut LuaVM) -> LuaValue;

/// Entry in a library module
pub enum LibraryEntry {
    Function(LibFunction),
    Action(LibAction),
    Value(ValueInitializer),
    /// Prebuilt value, e.g. natives sharing captured state
    Shared(LuaValue),
}

/// A library module containing multiple functions and values
pub struct LibraryModule {
    pub name: &'static str,
    pub entries: Vec<(&'static str, LibraryEntry)>,
}

impl LibraryModule {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    pub fn with_function(mut self, name: &'static str, func: LibFunction) -> Self {
        self.entries.push((name, LibraryEntry::Function(func)));
        self
    }

    pub fn with_action(mut self, name: &'static str, action: LibAction) -> Self {
        self.entries.push((name, LibraryEntry::Action(action)));
        self
    }

    pub fn with_value(mut self, name: &'static str, value_init: ValueInitializer) -> Self {
        self.entries.push((name, LibraryEntry::Value(value_init)));
        self
    }

    pub fn with_shared(mut self, name: &'static str, value: LuaValue) -> Self {
        self.entries.push((name, LibraryEntry::Shared(value)));
        self
    }
}

/// Builder for creating library modules out of native functions
#[macro_export]
macro_rules! lib_module {
    ($name:expr, {
        $($item_name:expr => $item:expr),* $(,)?
    }) => {{
        let mut module = $crate::lib_registry::LibraryModule::new($name);
        $(
            module.entries.push(($item_name, $crate::lib_registry::LibraryEntry::Function($item)));
        )*
        module
    }};
}

/// Ordered set of library modules
pub struct LibraryRegistry {
    modules: Vec<LibraryModule>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn register(&mut self, module: LibraryModule) {
        self.modules.push(module);
    }

    /// Load all registered libraries into a VM
    pub fn load_all(&self, vm: &mut LuaVM) -> LuaResult<()> {
        for module in &self.modules {
            self.load_module(vm, module)?;
        }
        Ok(())
    }

    /// Install one module. `_G` entries go straight into the global
    /// environment; any other module becomes a global table of that name.
    pub fn load_module(&self, vm: &mut LuaVM, module: &LibraryModule) -> LuaResult<()> {
        let target: LuaTableRef = if module.name == "_G" {
            vm.globals()
        } else {
            Rc::new(RefCell::new(LuaTable::new(0, module.entries.len())))
        };

        for (name, entry) in &module.entries {
            match entry {
                LibraryEntry::Function(func) => {
                    target.borrow_mut().set_external_function(name, *func);
                }
                LibraryEntry::Action(action) => {
                    target.borrow_mut().set_external_action(name, *action);
                }
                LibraryEntry::Value(value_init) => {
                    let value = value_init(vm);
                    target.borrow_mut().set_external_value(name, value);
                }
                LibraryEntry::Shared(value) => {
                    target.borrow_mut().set_external_value(name, value.clone());
                }
            }
        }

        if module.name != "_G" {
            vm.set_global(module.name, LuaValue::Table(target.clone()));
            // string values index the string library directly
            if module.name == "string" {
                vm.string_lib = Some(target);
            }
        }

        debug!(
            "registered library '{}' ({} entries)",
            module.name,
            module.entries.len()
        );
        Ok(())
    }
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Argument helpers ============
// Argument indexes are 1-based, as in Lua error messages.

fn type_name_of(args: &[LuaValue], index: usize) -> &'static str {
    match args.get(index - 1) {
        Some(v) => v.type_name(),
        None => "no value",
    }
}

/// `bad argument #N to 'name' (msg)`
pub fn arg_error(index: usize, func_name: &str, msg: impl AsRef<str>) -> LuaError {
    LuaError::runtime(format!(
        "bad argument #{} to '{}' ({})",
        index,
        func_name,
        msg.as_ref()
    ))
}

fn type_mismatch(args: &[LuaValue], index: usize, func_name: &str, expected: &str) -> LuaError {
    arg_error(
        index,
        func_name,
        format!("{} expected, got {}", expected, type_name_of(args, index)),
    )
}

/// Argument `index`, nil when absent.
#[inline]
pub fn get_arg(args: &[LuaValue], index: usize) -> LuaValue {
    args.get(index - 1).cloned().unwrap_or_default()
}

/// Argument `index`, which must be present (nil counts as present).
pub fn require_arg(args: &[LuaValue], index: usize, func_name: &str) -> LuaResult<LuaValue> {
    match args.get(index - 1) {
        Some(v) => Ok(v.clone()),
        None => Err(LuaError::argument_count(func_name, index, args.len())),
    }
}

pub fn check_integer(args: &[LuaValue], index: usize, func_name: &str) -> LuaResult<i64> {
    let value = get_arg(args, index);
    match value.to_number() {
        Some(n) => n
            .as_integer()
            .ok_or_else(|| arg_error(index, func_name, "number has no integer representation")),
        None => Err(type_mismatch(args, index, func_name, "number")),
    }
}

pub fn opt_integer(args: &[LuaValue], index: usize, func_name: &str, default: i64) -> LuaResult<i64> {
    if get_arg(args, index).is_nil() {
        Ok(default)
    } else {
        check_integer(args, index, func_name)
    }
}

/// Number argument, strings coerced; keeps the integer/float subtype.
pub fn check_number(args: &[LuaValue], index: usize, func_name: &str) -> LuaResult<LuaValue> {
    get_arg(args, index)
        .to_number()
        .ok_or_else(|| type_mismatch(args, index, func_name, "number"))
}

pub fn check_float(args: &[LuaValue], index: usize, func_name: &str) -> LuaResult<f64> {
    get_arg(args, index)
        .to_float()
        .ok_or_else(|| type_mismatch(args, index, func_name, "number"))
}

/// String argument; numbers are converted like `tostring`.
pub fn check_string(args: &[LuaValue], index: usize, func_name: &str) -> LuaResult<LuaString> {
    get_arg(args, index)
        .to_lua_string()
        .ok_or_else(|| type_mismatch(args, index, func_name, "string"))
}

pub fn opt_string(
    args: &[LuaValue],
    index: usize,
    func_name: &str,
    default: &str,
) -> LuaResult<LuaString> {
    if get_arg(args, index).is_nil() {
        Ok(LuaString::from(default))
    } else {
        check_string(args, index, func_name)
    }
}

pub fn check_table(args: &[LuaValue], index: usize, func_name: &str) -> LuaResult<LuaTableRef> {
    match args.get(index - 1) {
        Some(LuaValue::Table(t)) => Ok(t.clone()),
        _ => Err(type_mismatch(args, index, func_name, "table")),
    }
}
