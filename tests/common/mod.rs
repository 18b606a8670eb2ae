//! Common test helpers for `lsp` integration tests.
//!
//! Mirrors `wudi-php-rs/tests/common/mod.rs`'s `run_code` shape: a single
//! helper that reads one form, evaluates it, and hands back the printed
//! result so test bodies stay one line each.

use lsp::eval::Context;
use lsp::{eval, printer, reader};

/// Reads and evaluates `src` against a fresh [`Context`], returning the
/// printed result. Panics (fatally, as the interpreter itself does) on
/// malformed input or a runtime contract violation.
pub fn run(src: &str) -> String {
    let mut ctx = Context::new();
    let form = reader::read(src, &mut ctx);
    let result = eval::eval(form, &mut ctx);
    printer::print_to_string(&ctx, result)
}

/// Like [`run`], but hands back the live [`Context`] too, for tests that
/// need to inspect heap state after evaluation (e.g. the GC-stress test).
pub fn run_with_ctx(src: &str) -> (Context, String) {
    let mut ctx = Context::new();
    let form = reader::read(src, &mut ctx);
    let result = eval::eval(form, &mut ctx);
    let printed = printer::print_to_string(&ctx, result);
    (ctx, printed)
}
