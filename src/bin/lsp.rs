//! The `lsp` REPL and script runner, grounded on
//! `wudi-php-rs/src/bin/php.rs`'s `Cli`/`run_repl`/`run_file` split: a
//! `clap`-derived argument struct chooses between interactive and
//! file-driven execution, and the REPL itself is a `rustyline::DefaultEditor`
//! read/eval/print loop over `anyhow::Result`.

use clap::Parser;
use lsp::eval::Context;
use lsp::{eval, printer, reader};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

/// Non-zero per `original_source/src/repl.c`'s `(quit)` handling (spec §6,
/// §10 SUPPLEMENTED FEATURES).
const QUIT_EXIT_CODE: i32 = 1;

#[derive(Parser)]
#[command(name = "lsp")]
#[command(about = "A small Lisp interpreter", long_about = None)]
struct Cli {
    /// Script file to run instead of starting the REPL
    #[arg(name = "FILE")]
    file: Option<PathBuf>,

    /// Prelude file to load before the REPL or script runs
    #[arg(short, long, default_value = "bs.lsp")]
    prelude: PathBuf,

    /// Skip loading the prelude file
    #[arg(long)]
    no_prelude: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut ctx = Context::new();

    if !cli.no_prelude {
        load_prelude(&mut ctx, &cli.prelude);
    }

    let code = match cli.file {
        Some(path) => run_file(&mut ctx, &path)?,
        None => run_repl(&mut ctx),
    };
    std::process::exit(code);
}

/// Loads the optional startup prelude. Unlike the `load` primitive itself
/// (fatal on a missing file, spec §6), a missing prelude at this CLI
/// layer is a non-fatal convenience: most sessions won't ship a `bs.lsp`
/// next to the binary, and that shouldn't block starting the REPL.
fn load_prelude(ctx: &mut Context, path: &PathBuf) {
    if !path.exists() {
        return;
    }
    let path_str = path.to_string_lossy().into_owned();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let form = reader::read_file(&path_str, ctx);
        eval::eval(form, ctx);
    }));
    if result.is_err() {
        eprintln!("warning: failed to load prelude {:?}", path);
    }
}

/// Evaluates every top-level form in `path` in sequence (spec §10.5). The
/// runner itself prints nothing — only what the program prints through its
/// own side effects would appear.
fn run_file(ctx: &mut Context, path: &PathBuf) -> anyhow::Result<i32> {
    let path_str = path.to_string_lossy().into_owned();
    for form in reader::read_file_all(&path_str, ctx) {
        let result = eval::eval(form, ctx);
        ctx.discard(form);
        ctx.discard(result);
    }
    Ok(0)
}

/// The read/eval/print loop. Exits with status 1 on the literal line
/// `(quit)`, matching `original_source/src/repl.c`'s string-compared quit
/// command (spec §6, §10 SUPPLEMENTED FEATURES).
fn run_repl(ctx: &mut Context) -> i32 {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("lsp: failed to start the line editor: {}", e);
            return 1;
        }
    };

    loop {
        match rl.readline("LSP> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "(quit)" {
                    return QUIT_EXIT_CODE;
                }
                let _ = rl.add_history_entry(trimmed);
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    let form = reader::read(trimmed, ctx);
                    let value = eval::eval(form, ctx);
                    (form, value)
                }));
                match result {
                    Ok((form, value)) => {
                        println!(": {}", printer::print_to_string(ctx, value));
                        // original_source/src/repl.c demotes both the read
                        // and eval results after printing each line.
                        ctx.discard(form);
                        ctx.discard(value);
                    }
                    Err(_) => eprintln!("lsp: evaluation aborted"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return 0,
            Err(e) => {
                eprintln!("lsp: readline error: {}", e);
                return 1;
            }
        }
    }
}
