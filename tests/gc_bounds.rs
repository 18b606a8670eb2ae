//! P1/P6 from spec §8, exercised through the public evaluator entry
//! points rather than reaching into `core` directly — the same black-box
//! angle `wudi-php-rs/tests/fib.rs` takes on its VM.

mod common;

use lsp::core::CAPACITY;
use lsp::eval::Context;
use lsp::{eval, reader};

#[test]
fn p1_live_and_free_always_sum_to_capacity() {
    let mut ctx = Context::new();
    for i in 0..500 {
        let src = format!("(+ {} 1)", i);
        let form = reader::read(&src, &mut ctx);
        let result = eval::eval(form, &mut ctx);
        ctx.discard(result);
    }
    assert_eq!(ctx.heap.live_count() + ctx.heap.free_count(), CAPACITY);
}

#[test]
fn p6_repeated_evaluation_does_not_grow_live_set_unboundedly() {
    let mut ctx = Context::new();
    let warmup = reader::read("(let ((x 1)) x)", &mut ctx);
    let warmup_result = eval::eval(warmup, &mut ctx);
    ctx.discard(warmup_result);
    let baseline = ctx.live_from_root();

    for _ in 0..5_000 {
        let form = reader::read("(let ((a 1) (b 2)) (+ (* a b) (- a b)))", &mut ctx);
        let result = eval::eval(form, &mut ctx);
        ctx.discard(form);
        ctx.discard(result);
    }

    let after = ctx.live_from_root();
    assert!(
        after <= baseline + 64,
        "expected bounded live-slot count, baseline={baseline} after={after}"
    );
}

#[test]
fn defun_bindings_survive_across_many_unrelated_calls() {
    let mut ctx = Context::new();
    let def = reader::read("(defun inc (n) (+ n 1))", &mut ctx);
    let def_result = eval::eval(def, &mut ctx);
    ctx.discard(def_result);

    for i in 0..2_000 {
        let call = reader::read(&format!("(inc {})", i), &mut ctx);
        let result = eval::eval(call, &mut ctx);
        assert_eq!(
            lsp::printer::print_to_string(&ctx, result),
            (i + 1).to_string()
        );
        ctx.discard(result);
    }
}
