use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use luabc::{LuaValue, Prototype, load_chunk};

/// Prints the prototypes, instructions and debug info of a Lua 5.3 binary chunk.
#[derive(Parser, Debug)]
#[command(name = "luabc_dump", version)]
struct Cli {
    /// Binary chunk to disassemble
    file: PathBuf,

    /// Also list constants, locals and upvalues
    #[arg(short = 'l', long)]
    long: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let bytes = match fs::read(&cli.file) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("luabc_dump: cannot read {}: {}", cli.file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let chunk = match load_chunk(&bytes) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("luabc_dump: {}: {}", cli.file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    println!("upvalues: {}", chunk.upvalue_count);
    dump_proto(&chunk.main, "main", cli.long);
    ExitCode::SUCCESS
}

fn dump_proto(proto: &Prototype, name: &str, long: bool) {
    println!();
    println!(
        "=== {} <{}:{},{}> ===",
        name,
        proto.source_name(),
        proto.line_defined,
        proto.last_line_defined
    );
    println!(
        "params: {}{}, max_stack: {}, upvalues: {}, constants: {}, functions: {}",
        proto.num_params,
        if proto.is_vararg { "+" } else { "" },
        proto.max_stack_size,
        proto.upvalues.len(),
        proto.constants.len(),
        proto.protos.len()
    );

    for (pc, instr) in proto.code.iter().enumerate() {
        match proto.line_at(pc) {
            Some(line) => println!("  [{:>4}] {:>5}  {}", pc + 1, line, instr),
            None => println!("  [{:>4}]     -  {}", pc + 1, instr),
        }
    }

    if long {
        println!("constants ({}):", proto.constants.len());
        for (i, k) in proto.constants.iter().enumerate() {
            println!("  {:>4}  {}", i, constant_text(k));
        }
        println!("locals ({}):", proto.local_vars.len());
        for (i, local) in proto.local_vars.iter().enumerate() {
            let name = local
                .name
                .as_ref()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("  {:>4}  {}  {}  {}", i, name, local.start_pc + 1, local.end_pc + 1);
        }
        println!("upvalues ({}):", proto.upvalues.len());
        for (i, up) in proto.upvalues.iter().enumerate() {
            let name = up
                .name
                .as_ref()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("  {:>4}  {}  {}  {}", i, name, up.in_stack as u8, up.index);
        }
    }

    for (i, child) in proto.protos.iter().enumerate() {
        dump_proto(child, &format!("{}.{}", name, i), long);
    }
}

fn constant_text(k: &LuaValue) -> String {
    match k {
        LuaValue::String(s) => format!("{:?}", s.to_string()),
        other => other.to_string(),
    }
}
