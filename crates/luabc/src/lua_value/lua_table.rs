// Lua table following the Lua 5.3 design
// - Array part for integer keys [1..n]
// - Hash part in an insertion-ordered map, which doubles as the `next` chain
// - Optional native overlay consulted when a lookup misses
use ahash::RandomState;
use indexmap::IndexMap;

use super::LuaValue;
use crate::lua_vm::lua_limits::MAX_PREALLOC;
use crate::lua_vm::{LuaError, LuaResult};

type OrderedMap = IndexMap<LuaValue, LuaValue, RandomState>;

#[derive(Default)]
pub struct LuaTable {
    /// Values for integer keys [1..array.len()]; slots may hold Nil.
    pub(crate) array: Vec<LuaValue>,

    /// Every other key, in first-insertion order. Entries set to nil stay
    /// as tombstones so traversal can continue past them.
    pub(crate) hash: OrderedMap,

    /// Number of tombstones in `hash`.
    dead_keys: usize,

    /// Native entries installed by libraries, visible on lookup miss.
    external: Option<OrderedMap>,
}

impl LuaTable {
    /// Create a table with capacity hints for both parts. Hints above
    /// `MAX_PREALLOC` are clamped; the parts still grow on demand.
    pub fn new(array_size: usize, hash_size: usize) -> Self {
        LuaTable {
            array: Vec::with_capacity(array_size.min(MAX_PREALLOC)),
            hash: IndexMap::with_capacity_and_hasher(
                hash_size.min(MAX_PREALLOC),
                RandomState::new(),
            ),
            dead_keys: 0,
            external: None,
        }
    }

    #[inline]
    pub fn get_int(&self, key: i64) -> LuaValue {
        if key >= 1 && ((key - 1) as u64) < self.array.len() as u64 {
            return self.array[(key - 1) as usize].clone();
        }
        match self.hash.get(&LuaValue::Integer(key)) {
            Some(v) if !v.is_nil() => v.clone(),
            _ => self.get_external(&LuaValue::Integer(key)),
        }
    }

    /// Lookup; nil and NaN keys simply miss.
    pub fn get(&self, key: &LuaValue) -> LuaValue {
        match key {
            LuaValue::Nil => LuaValue::Nil,
            LuaValue::Integer(i) => self.get_int(*i),
            LuaValue::Float(f) => {
                if f.is_nan() {
                    LuaValue::Nil
                } else {
                    let key = key.clone().normalize_key();
                    match key {
                        LuaValue::Integer(i) => self.get_int(i),
                        _ => self.get_from_hash(&key),
                    }
                }
            }
            _ => self.get_from_hash(key),
        }
    }

    pub fn get_str(&self, key: &str) -> LuaValue {
        self.get(&LuaValue::string(key))
    }

    #[inline]
    fn get_from_hash(&self, key: &LuaValue) -> LuaValue {
        match self.hash.get(key) {
            Some(v) if !v.is_nil() => v.clone(),
            _ => self.get_external(key),
        }
    }

    fn get_external(&self, key: &LuaValue) -> LuaValue {
        self.external
            .as_ref()
            .and_then(|ext| ext.get(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Assignment; nil and NaN keys are errors.
    pub fn set(&mut self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        match key {
            LuaValue::Nil => Err(LuaError::runtime("table index is nil")),
            LuaValue::Float(f) if f.is_nan() => Err(LuaError::runtime("table index is NaN")),
            _ => {
                match key.normalize_key() {
                    LuaValue::Integer(i) => self.set_int(i, value),
                    key => self.set_in_hash(key, value),
                }
                Ok(())
            }
        }
    }

    pub fn set_str(&mut self, key: &str, value: LuaValue) {
        self.set_in_hash(LuaValue::string(key), value);
    }

    pub fn set_int(&mut self, key: i64, value: LuaValue) {
        let len = self.array.len();
        if key >= 1 && ((key - 1) as u64) < len as u64 {
            self.array[(key - 1) as usize] = value;
            return;
        }

        if key >= 1 && (key - 1) as u64 == len as u64 && !value.is_nil() {
            self.array.push(value);
            self.migrate_from_hash();
            return;
        }

        self.set_in_hash(LuaValue::Integer(key), value);
    }

    fn set_in_hash(&mut self, key: LuaValue, value: LuaValue) {
        match self.hash.get_mut(&key) {
            Some(slot) => {
                match (slot.is_nil(), value.is_nil()) {
                    (false, true) => self.dead_keys += 1,
                    (true, false) => self.dead_keys -= 1,
                    _ => {}
                }
                *slot = value;
            }
            None => {
                if value.is_nil() {
                    return;
                }
                self.compact_if_sparse();
                self.hash.insert(key, value);
            }
        }
    }

    /// Pull keys array_len+1, array_len+2, ... out of the hash part.
    fn migrate_from_hash(&mut self) {
        loop {
            let next = LuaValue::Integer(self.array.len() as i64 + 1);
            match self.hash.get_mut(&next) {
                Some(v) if !v.is_nil() => {
                    let value = std::mem::take(v);
                    self.dead_keys += 1;
                    self.array.push(value);
                }
                _ => break,
            }
        }
    }

    /// Drop tombstones once they dominate the hash part. Only runs when a
    /// new key is linked, which already invalidates running traversals.
    fn compact_if_sparse(&mut self) {
        if self.dead_keys > 8 && self.dead_keys * 2 > self.hash.len() {
            self.hash.retain(|_, v| !v.is_nil());
            self.dead_keys = 0;
        }
    }

    /// Grow the array part to at least `size` slots, moving matching
    /// integer keys out of the hash part.
    pub fn ensure_array_size(&mut self, size: usize) {
        if size <= self.array.len() {
            return;
        }
        let old_len = self.array.len();
        self.array.resize(size, LuaValue::Nil);
        for i in old_len..size {
            let key = LuaValue::Integer(i as i64 + 1);
            if let Some(v) = self.hash.get_mut(&key) {
                if !v.is_nil() {
                    self.array[i] = std::mem::take(v);
                    self.dead_keys += 1;
                }
            }
        }
        self.migrate_from_hash();
    }

    /// Size of the array part, nil slots included.
    #[inline]
    pub fn array_len(&self) -> usize {
        self.array.len()
    }

    /// The `#` border, following luaH_getn.
    pub fn length(&self) -> i64 {
        let j = self.array.len();
        if j > 0 && self.array[j - 1].is_nil() {
            // binary search for a border inside the array part
            let (mut i, mut j) = (0usize, j);
            while j - i > 1 {
                let m = (i + j) / 2;
                if self.array[m - 1].is_nil() {
                    j = m;
                } else {
                    i = m;
                }
            }
            return i as i64;
        }
        if self.hash.len() == self.dead_keys {
            return j as i64;
        }
        self.unbound_search(j as u64)
    }

    fn unbound_search(&self, j: u64) -> i64 {
        let mut i = j;
        let mut j = j + 1;
        // find `i` and `j` such that i is present and j is not
        while !self.raw_get_int(j as i64).is_nil() {
            i = j;
            if j > (i64::MAX as u64) / 2 {
                // table was built with bad purposes: resort to linear search
                let mut i = 1i64;
                while !self.raw_get_int(i).is_nil() {
                    i += 1;
                }
                return i - 1;
            }
            j *= 2;
        }
        while j - i > 1 {
            let m = (i + j) / 2;
            if self.raw_get_int(m as i64).is_nil() {
                j = m;
            } else {
                i = m;
            }
        }
        i as i64
    }

    /// Integer lookup ignoring the native overlay.
    fn raw_get_int(&self, key: i64) -> LuaValue {
        if key >= 1 && ((key - 1) as u64) < self.array.len() as u64 {
            return self.array[(key - 1) as usize].clone();
        }
        self.hash
            .get(&LuaValue::Integer(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Stateless traversal step: array part in index order, then hash keys
    /// in insertion order, then overlay entries not shadowed by the table.
    /// `Ok(None)` marks the end; an unknown key is an error.
    pub fn next(&self, key: &LuaValue) -> LuaResult<Option<(LuaValue, LuaValue)>> {
        let key = key.clone().normalize_key();
        let start = match &key {
            LuaValue::Nil => Cursor::Array(0),
            LuaValue::Integer(i) if *i >= 1 && ((*i - 1) as u64) < self.array.len() as u64 => {
                Cursor::Array(*i as usize)
            }
            _ => match self.hash.get_index_of(&key) {
                Some(idx) => Cursor::Hash(idx + 1),
                None => match self.external.as_ref().and_then(|e| e.get_index_of(&key)) {
                    Some(idx) => Cursor::External(idx + 1),
                    None => return Err(LuaError::runtime("invalid key to 'next'")),
                },
            },
        };

        let mut cursor = start;
        loop {
            match cursor {
                Cursor::Array(idx) => {
                    if let Some(pos) = self.array[idx..].iter().position(|v| !v.is_nil()) {
                        let at = idx + pos;
                        return Ok(Some((
                            LuaValue::Integer(at as i64 + 1),
                            self.array[at].clone(),
                        )));
                    }
                    cursor = Cursor::Hash(0);
                }
                Cursor::Hash(idx) => {
                    for i in idx..self.hash.len() {
                        if let Some((k, v)) = self.hash.get_index(i) {
                            if !v.is_nil() {
                                return Ok(Some((k.clone(), v.clone())));
                            }
                        }
                    }
                    cursor = Cursor::External(0);
                }
                Cursor::External(idx) => {
                    let Some(ext) = &self.external else {
                        return Ok(None);
                    };
                    for i in idx..ext.len() {
                        if let Some((k, v)) = ext.get_index(i) {
                            if self.raw_get_own(k).is_nil() {
                                return Ok(Some((k.clone(), v.clone())));
                            }
                        }
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Lookup ignoring the native overlay.
    fn raw_get_own(&self, key: &LuaValue) -> LuaValue {
        match key {
            LuaValue::Integer(i) => self.raw_get_int(*i),
            _ => self.hash.get(key).cloned().unwrap_or_default(),
        }
    }

    /// `table.insert(t, pos, value)`: shift [pos, #t] up by one.
    pub fn insert(&mut self, pos: i64, value: LuaValue) -> LuaResult<()> {
        let e = self.length().wrapping_add(1);
        if pos < 1 || pos > e {
            return Err(LuaError::runtime(
                "bad argument #2 to 'insert' (position out of bounds)",
            ));
        }
        let mut i = e;
        while i > pos {
            let v = self.raw_get_int(i - 1);
            self.set_int(i, v);
            i -= 1;
        }
        self.set_int(pos, value);
        Ok(())
    }

    /// `table.remove(t, pos)`: shift (pos, #t] down by one, return t[pos].
    pub fn remove(&mut self, pos: i64) -> LuaResult<LuaValue> {
        let size = self.length();
        if pos != size && (pos.wrapping_sub(1) as u64) > size as u64 {
            return Err(LuaError::runtime(
                "bad argument #2 to 'remove' (position out of bounds)",
            ));
        }
        let removed = self.raw_get_int(pos);
        let mut pos = pos;
        while pos < size {
            let v = self.raw_get_int(pos + 1);
            self.set_int(pos, v);
            pos += 1;
        }
        self.set_int(pos, LuaValue::Nil);
        Ok(removed)
    }

    /// Install a native entry; own entries with the same key take precedence.
    pub fn set_external_value(&mut self, name: &str, value: LuaValue) {
        self.external
            .get_or_insert_with(|| IndexMap::with_hasher(RandomState::new()))
            .insert(LuaValue::string(name), value);
    }

    pub fn set_external_function(
        &mut self,
        name: &str,
        f: impl Fn(&mut crate::LuaVM, &[LuaValue]) -> LuaResult<Vec<LuaValue>> + 'static,
    ) {
        self.set_external_value(name, LuaValue::external_function(f));
    }

    pub fn set_external_action(
        &mut self,
        name: &str,
        f: impl Fn(&mut crate::LuaVM, &[LuaValue]) -> LuaResult<()> + 'static,
    ) {
        self.set_external_value(name, LuaValue::external_action(f));
    }
}

#[derive(Clone, Copy)]
enum Cursor {
    Array(usize),
    Hash(usize),
    External(usize),
}
