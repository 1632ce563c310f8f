// Lua 5.3 binary chunk reader (lundump.c format)

use std::rc::Rc;

use log::debug;

use super::{Chunk, LocalVar, LuaString, LuaValue, Prototype, UpvalueDesc};
use crate::lua_vm::lua_limits::{
    LUA_SIGNATURE, LUAC_DATA, LUAC_FORMAT, LUAC_INT, LUAC_NUM, LUAC_SIZES, LUAC_VERSION,
    LUAI_MAXCCALLS,
};
use crate::lua_vm::{Instruction, LuaError, LuaResult};

// Constant type tags (lobject.h variant tags)
pub(crate) const LUA_TNIL: u8 = 0;
pub(crate) const LUA_TBOOLEAN: u8 = 1;
pub(crate) const LUA_TNUMFLT: u8 = 3;
pub(crate) const LUA_TNUMINT: u8 = 3 | (1 << 4);
pub(crate) const LUA_TSHRSTR: u8 = 4;
pub(crate) const LUA_TLNGSTR: u8 = 4 | (1 << 4);

/// The fixed header every accepted chunk starts with.
pub(crate) fn expected_header() -> Vec<u8> {
    let mut header = Vec::with_capacity(33);
    header.extend_from_slice(LUA_SIGNATURE);
    header.push(LUAC_VERSION);
    header.push(LUAC_FORMAT);
    header.extend_from_slice(LUAC_DATA);
    header.extend_from_slice(&LUAC_SIZES);
    header.extend_from_slice(&LUAC_INT.to_le_bytes());
    header.extend_from_slice(&LUAC_NUM.to_le_bytes());
    header
}

/// Parse a binary chunk produced by `luac` 5.3 (little-endian, 64-bit).
pub fn load_chunk(data: &[u8]) -> LuaResult<Chunk> {
    let mut reader = ChunkReader { data, pos: 0 };

    let header = expected_header();
    let actual = reader.take(header.len(), "header")?;
    if actual != header.as_slice() {
        return Err(LuaError::load(header_mismatch(actual, &header)));
    }

    let upvalue_count = reader.read_u8("upvalue count")?;
    let main = reader.read_function(None, 0)?;
    if reader.pos != data.len() {
        debug!("{} trailing bytes after chunk ignored", data.len() - reader.pos);
    }
    debug!(
        "loaded chunk '{}': {} instructions, {} nested prototypes",
        main.source_name(),
        main.code.len(),
        main.protos.len()
    );

    Ok(Chunk {
        upvalue_count,
        main: Rc::new(main),
    })
}

fn header_mismatch(actual: &[u8], expected: &[u8]) -> String {
    if actual[..4] != expected[..4] {
        "not a binary chunk".to_string()
    } else if actual[4] != expected[4] {
        format!("version mismatch (chunk is {:#x}, expected 0x53)", actual[4])
    } else if actual[5] != expected[5] {
        "format mismatch".to_string()
    } else if actual[6..12] != expected[6..12] {
        "corrupted chunk".to_string()
    } else if actual[12..17] != expected[12..17] {
        "type size mismatch".to_string()
    } else {
        "endianness or float format mismatch".to_string()
    }
}

struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkReader<'a> {
    fn take(&mut self, n: usize, what: &str) -> LuaResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| LuaError::load(format!("truncated chunk while reading {}", what)))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self, what: &str) -> LuaResult<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn read_u32(&mut self, what: &str) -> LuaResult<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self, what: &str) -> LuaResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(buf))
    }

    /// Element count prefix; bounded by the bytes left so a corrupt count
    /// cannot trigger a huge allocation.
    fn read_count(&mut self, what: &str) -> LuaResult<usize> {
        let n = self.read_u32(what)? as usize;
        if n > self.data.len() - self.pos {
            return Err(LuaError::load(format!("truncated chunk while reading {}", what)));
        }
        Ok(n)
    }

    /// Size byte (0xFF escapes to a size_t); size 0 is "no string",
    /// otherwise size - 1 bytes follow.
    fn read_string(&mut self, what: &str) -> LuaResult<Option<LuaString>> {
        let mut size = self.read_u8(what)? as u64;
        if size == 0xFF {
            size = self.read_u64(what)?;
        }
        if size == 0 {
            return Ok(None);
        }
        let len = usize::try_from(size - 1)
            .ok()
            .filter(|len| *len <= isize::MAX as usize)
            .ok_or_else(|| LuaError::load(format!("{} exceeds platform string limits", what)))?;
        Ok(Some(LuaString::from(self.take(len, what)?)))
    }

    fn read_function(
        &mut self,
        parent_source: Option<&LuaString>,
        depth: usize,
    ) -> LuaResult<Prototype> {
        if depth > LUAI_MAXCCALLS {
            return Err(LuaError::load("functions nested too deeply"));
        }
        let mut proto = Prototype {
            source: self.read_string("source name")?,
            ..Default::default()
        };
        if proto.source.is_none() {
            proto.source = parent_source.cloned();
        }
        proto.line_defined = self.read_u32("line defined")?;
        proto.last_line_defined = self.read_u32("last line defined")?;
        proto.num_params = self.read_u8("parameter count")?;
        proto.is_vararg = self.read_u8("vararg flag")? != 0;
        proto.max_stack_size = self.read_u8("max stack size")?;

        let n = self.read_count("code")?;
        proto.code.reserve(n);
        for _ in 0..n {
            proto.code.push(Instruction::from_u32(self.read_u32("code")?));
        }

        let n = self.read_count("constants")?;
        proto.constants.reserve(n);
        for _ in 0..n {
            proto.constants.push(self.read_constant()?);
        }

        let n = self.read_count("upvalues")?;
        for _ in 0..n {
            let in_stack = self.read_u8("upvalues")? != 0;
            let index = self.read_u8("upvalues")?;
            proto.upvalues.push(UpvalueDesc {
                in_stack,
                index,
                name: None,
            });
        }

        let n = self.read_count("prototypes")?;
        for _ in 0..n {
            let child = self.read_function(proto.source.as_ref(), depth + 1)?;
            proto.protos.push(Rc::new(child));
        }

        self.read_debug(&mut proto)?;
        Ok(proto)
    }

    fn read_constant(&mut self) -> LuaResult<LuaValue> {
        let tag = self.read_u8("constants")?;
        Ok(match tag {
            LUA_TNIL => LuaValue::Nil,
            LUA_TBOOLEAN => LuaValue::Boolean(self.read_u8("constants")? != 0),
            LUA_TNUMFLT => LuaValue::Float(f64::from_bits(self.read_u64("constants")?)),
            LUA_TNUMINT => LuaValue::Integer(self.read_u64("constants")? as i64),
            LUA_TSHRSTR | LUA_TLNGSTR => {
                LuaValue::String(self.read_string("constants")?.unwrap_or_else(LuaString::empty))
            }
            other => {
                return Err(LuaError::load(format!("bad constant type tag {:#x}", other)));
            }
        })
    }

    fn read_debug(&mut self, proto: &mut Prototype) -> LuaResult<()> {
        let n = self.read_count("line info")?;
        proto.line_info.reserve(n);
        for _ in 0..n {
            proto.line_info.push(self.read_u32("line info")?);
        }

        let n = self.read_count("local variables")?;
        for _ in 0..n {
            let name = self.read_string("local variables")?;
            let start_pc = self.read_u32("local variables")?;
            let end_pc = self.read_u32("local variables")?;
            proto.local_vars.push(LocalVar {
                name,
                start_pc,
                end_pc,
            });
        }

        let n = self.read_count("upvalue names")?;
        for i in 0..n {
            let name = self.read_string("upvalue names")?;
            if let Some(desc) = proto.upvalues.get_mut(i) {
                desc.name = name;
            }
        }
        Ok(())
    }
}
