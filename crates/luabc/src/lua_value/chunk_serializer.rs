// Chunk serializer: writes the Lua 5.3 binary chunk format read by `load_chunk`

use super::chunk_loader::{
    LUA_TBOOLEAN, LUA_TLNGSTR, LUA_TNIL, LUA_TNUMFLT, LUA_TNUMINT, LUA_TSHRSTR, expected_header,
};
use super::{Chunk, LuaString, LuaValue, Prototype};
use crate::lua_vm::{LuaError, LuaResult};

/// Serialize a chunk; `strip` drops line info, locals and upvalue names.
pub fn dump_chunk(chunk: &Chunk, strip: bool) -> LuaResult<Vec<u8>> {
    let mut buf = expected_header();
    buf.push(chunk.upvalue_count);
    write_function(&mut buf, &chunk.main, None, strip)?;
    Ok(buf)
}

fn write_function(
    buf: &mut Vec<u8>,
    proto: &Prototype,
    parent_source: Option<&LuaString>,
    strip: bool,
) -> LuaResult<()> {
    // children sharing the parent's source store no name
    let source = if strip || proto.source.as_ref() == parent_source {
        None
    } else {
        proto.source.as_ref()
    };
    write_string(buf, source);
    write_u32(buf, proto.line_defined);
    write_u32(buf, proto.last_line_defined);
    buf.push(proto.num_params);
    buf.push(proto.is_vararg as u8);
    buf.push(proto.max_stack_size);

    write_u32(buf, proto.code.len() as u32);
    for instr in &proto.code {
        write_u32(buf, instr.as_u32());
    }

    write_u32(buf, proto.constants.len() as u32);
    for constant in &proto.constants {
        write_constant(buf, constant)?;
    }

    write_u32(buf, proto.upvalues.len() as u32);
    for desc in &proto.upvalues {
        buf.push(desc.in_stack as u8);
        buf.push(desc.index);
    }

    write_u32(buf, proto.protos.len() as u32);
    for child in &proto.protos {
        write_function(buf, child, proto.source.as_ref(), strip)?;
    }

    if strip {
        write_u32(buf, 0);
        write_u32(buf, 0);
        write_u32(buf, 0);
        return Ok(());
    }

    write_u32(buf, proto.line_info.len() as u32);
    for line in &proto.line_info {
        write_u32(buf, *line);
    }
    write_u32(buf, proto.local_vars.len() as u32);
    for var in &proto.local_vars {
        write_string(buf, var.name.as_ref());
        write_u32(buf, var.start_pc);
        write_u32(buf, var.end_pc);
    }
    write_u32(buf, proto.upvalues.len() as u32);
    for desc in &proto.upvalues {
        write_string(buf, desc.name.as_ref());
    }
    Ok(())
}

fn write_constant(buf: &mut Vec<u8>, value: &LuaValue) -> LuaResult<()> {
    match value {
        LuaValue::Nil => buf.push(LUA_TNIL),
        LuaValue::Boolean(b) => {
            buf.push(LUA_TBOOLEAN);
            buf.push(*b as u8);
        }
        LuaValue::Float(f) => {
            buf.push(LUA_TNUMFLT);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        LuaValue::Integer(i) => {
            buf.push(LUA_TNUMINT);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        LuaValue::String(s) => {
            buf.push(if s.is_short() { LUA_TSHRSTR } else { LUA_TLNGSTR });
            write_string(buf, Some(s));
        }
        other => {
            return Err(LuaError::load(format!(
                "cannot dump a {} constant",
                other.type_name()
            )));
        }
    }
    Ok(())
}

fn write_string(buf: &mut Vec<u8>, s: Option<&LuaString>) {
    let Some(s) = s else {
        buf.push(0);
        return;
    };
    let size = s.len() + 1;
    if size < 0xFF {
        buf.push(size as u8);
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&(size as u64).to_le_bytes());
    }
    buf.extend_from_slice(s.as_bytes());
}

#[inline]
fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}
