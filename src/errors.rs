//! Fatal-abort machinery (spec §7 "Error handling design").
//!
//! `wudi-php-rs`'s own core (`src/core/gc.rs`'s `.expect("use-after-free:
//! ...")`, `src/vm/engine.rs`'s `unreachable!(...)`/`panic!(...)`) reports
//! contract violations with `eprintln!`/`panic!`/`.expect(...)` rather
//! than a logging-framework dependency, which in turn mirrors the
//! original C sources' `ERROR(...)`/`CHECK(...)` macros
//! (`original_source/include/{trace.h,check.h}`): print a trace line
//! naming the file and line, then abort. `fatal!` and `check!` here are
//! that same pair translated to Rust, with `panic!` standing in for
//! `abort()` — both terminate the process with a non-zero exit status
//! after the trace line is written.

/// Prints a `file:line - message` trace line to stderr, then panics.
/// Every contract violation named in spec §7.1 (wrong tag accessed,
/// unbound-symbol lookup in a context with no binding to fall back on,
/// malformed AST shape, OOM after a sweep) goes through this macro.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        eprintln!("{}:{} - {}", file!(), line!(), format!($($arg)*));
        panic!($($arg)*)
    }};
}

/// `CHECK(cond)` from the source: trace and abort if `cond` is false.
#[macro_export]
macro_rules! check {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::fatal!($($arg)*);
        }
    };
}
