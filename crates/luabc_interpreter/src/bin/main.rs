use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, CommandFactory, Parser};
use log::{LevelFilter, debug};
use thiserror::Error;

use luabc::lua_vm::lua_limits::{LUAI_MAXCALLS, LUAI_MAXSTACK};
use luabc::{LuaError, LuaVM, SafeOption, Stdlib};

/// Runs precompiled Lua 5.3 binary chunks (luac output).
#[derive(Parser, Debug)]
#[command(name = "luabc", version, disable_help_flag = true)]
struct Cli {
    /// Binary chunks to run, in order, against one shared global environment
    files: Vec<PathBuf>,

    /// Read a single chunk from stdin instead of files
    #[arg(short = 's', long)]
    stdin: bool,

    /// Allow the custom include(string) function (not supported)
    #[arg(short = 'i', long)]
    include: bool,

    /// Log loader and library activity
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Register stack limit, in value slots
    #[arg(long, default_value_t = LUAI_MAXSTACK)]
    max_stack: usize,

    /// Call depth limit, in frames
    #[arg(long, default_value_t = LUAI_MAXCALLS)]
    max_depth: usize,

    /// Print help
    #[arg(short = 'h', long, short_alias = '?', action = ArgAction::Help)]
    help: Option<bool>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    if cli.files.is_empty() && !cli.stdin {
        if let Err(e) = Cli::command().print_help() {
            eprintln!("luabc: {}", e);
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    let options = SafeOption::default()
        .with_max_stack_size(cli.max_stack)
        .with_max_call_depth(cli.max_depth);
    let mut vm = LuaVM::new(options);
    if let Err(e) = vm.open_stdlib(Stdlib::All) {
        eprintln!("luabc: {}", e);
        return ExitCode::FAILURE;
    }

    let mut failed = false;
    if cli.stdin {
        if let Err(e) = run_stdin(&mut vm, cli.include) {
            eprintln!("luabc: stdin: {}", e);
            failed = true;
        }
    } else {
        for path in &cli.files {
            if let Err(e) = run_file(&mut vm, path, cli.include) {
                eprintln!("luabc: {}: {}", path.display(), e);
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Failure of one input: either it could not be read or the chunk failed.
#[derive(Debug, Error)]
enum RunError {
    #[error("cannot read: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Lua(#[from] LuaError),
}

fn run_file(vm: &mut LuaVM, path: &PathBuf, include: bool) -> Result<(), RunError> {
    let bytes = fs::read(path)?;
    debug!("running {} ({} bytes)", path.display(), bytes.len());
    run_bytes(vm, &bytes, include)
}

fn run_stdin(vm: &mut LuaVM, include: bool) -> Result<(), RunError> {
    let mut bytes = Vec::new();
    io::stdin().read_to_end(&mut bytes)?;
    debug!("running stdin ({} bytes)", bytes.len());
    run_bytes(vm, &bytes, include)
}

fn run_bytes(vm: &mut LuaVM, bytes: &[u8], include: bool) -> Result<(), RunError> {
    let chunk = vm.load(bytes)?;
    if include {
        return Err(LuaError::unsupported("include(string)").into());
    }
    let results = vm.execute_chunk(&chunk)?;
    debug!("chunk returned {} values", results.len());
    Ok(())
}
