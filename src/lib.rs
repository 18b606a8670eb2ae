//! A small Lisp/Scheme-flavored interpreter built on a fixed-capacity,
//! mark-and-sweep heap.
//!
//! The module layout follows `wudi-php-rs`'s split between `core` (the
//! object model and memory management) and the language-facing layers
//! built on top of it (there, `parser`/`vm`; here, [`reader`], [`printer`],
//! [`eval`]): `core` never depends on anything above it, and everything
//! above it talks to the heap only through [`core::Heap`]'s public API.

pub mod core;
pub mod errors;
pub mod eval;
pub mod printer;
pub mod reader;

pub use eval::{eval, Context};
pub use printer::print_to_string;
pub use reader::read;
