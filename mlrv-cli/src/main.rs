use anyhow::{Context, Result};
use clap::Parser;
use mlrv_compiler::backend::{self, DEFAULT_MEM_SIZE};
use mlrv_compiler::{eval_source, parse, typecheck};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mlrv")]
#[command(about = "A compiler from a small ML-flavoured language to an abstract register machine")]
struct Args {
    /// Path to the source file to compile (a built-in sample runs otherwise)
    file: Option<PathBuf>,

    /// Evaluate with the tree-walking interpreter instead of compiling
    #[arg(long)]
    eval: bool,

    /// Print the generated program before register allocation
    #[arg(long)]
    asm: bool,

    /// Print the program after register allocation
    #[arg(long)]
    allocated: bool,

    /// Machine memory size, in words
    #[arg(long, default_value_t = DEFAULT_MEM_SIZE)]
    mem: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let src = match &args.file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading '{}'", path.display()))?,
        None => DEFAULT_SAMPLE.trim().to_string(),
    };

    if args.eval {
        let value = eval_source(&src)?;
        println!("{value}");
        return Ok(());
    }

    let exp = parse(&src)?;
    typecheck::check(&exp, &typecheck::TypeEnv::new())?;

    if args.asm {
        let (prog, result) = backend::lower(&exp);
        println!("; before allocation, result in {result}");
        print!("{prog}");
    }

    let compiled = backend::compile(&exp)?;

    if args.allocated {
        println!("; after allocation, result in {:?}", compiled.result);
        print!("{}", compiled.program);
    }

    let value = compiled.execute(args.mem)?;
    println!("{value}");
    Ok(())
}

const DEFAULT_SAMPLE: &str = r#"
let n <- 21 in
    if n < 10 then n * 2 else n + n
end
"#;
