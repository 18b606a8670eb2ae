//! The canonical printer (spec §4.4).
//!
//! The source prints into a caller-supplied fixed `char buf[256]` with no
//! bounds checking — overflow is a documented limitation, not a guarded
//! error path. The idiomatic Rust analogue kept here is a `String` capped
//! at [`PRINT_BUF_CAP`] bytes that panics on overflow rather than growing
//! past it, so the limitation stays a hard fault instead of silently
//! becoming unbounded.

use crate::core::{Mark, ObjRef, Payload};
use crate::eval::Context;

pub const PRINT_BUF_CAP: usize = 256;

struct Buf {
    s: String,
}

impl Buf {
    fn new() -> Self {
        Self { s: String::with_capacity(PRINT_BUF_CAP) }
    }

    fn push_str(&mut self, text: &str) {
        if self.s.len() + text.len() > PRINT_BUF_CAP {
            panic!(
                "printer: buffer overflow writing {:?} (capacity {})",
                text, PRINT_BUF_CAP
            );
        }
        self.s.push_str(text);
    }
}

/// `print(value) -> text`: render `value` into a fresh, capped buffer.
pub fn print_to_string(ctx: &Context, value: ObjRef) -> String {
    let mut buf = Buf::new();
    print_obj(ctx, value, &mut buf);
    buf.s
}

fn print_obj(ctx: &Context, value: ObjRef, buf: &mut Buf) {
    let ObjRef::Slot(h) = value else {
        buf.push_str("nil");
        return;
    };
    let payload = ctx.heap.get(h).payload;
    match payload {
        Payload::Num(n) => buf.push_str(&n.to_string()),
        Payload::Symbol(s) => buf.push_str(std::str::from_utf8(s.as_bytes()).unwrap_or("?")),
        Payload::Str(s) => {
            buf.push_str("\"");
            buf.push_str(std::str::from_utf8(s.as_bytes()).unwrap_or("?"));
            buf.push_str("\"");
        }
        Payload::Quote(expr) => {
            buf.push_str("'");
            print_obj(ctx, expr, buf);
        }
        Payload::Cons { .. } => print_list(ctx, value, buf),
        Payload::Lambda { .. } => buf.push_str("lambda"),
        Payload::Env { .. } => buf.push_str("#<env>"),
        Payload::Free { .. } => {
            buf.push_str(&format!("#<freed:{}>", h.0));
        }
    }
}

/// Prints a CONS chain as `(a b c)`, falling back to dotted-pair notation
/// `(a . b)` the moment the chain's tail isn't NIL or another CONS (spec
/// §4.4 "Dotted pairs").
fn print_list(ctx: &Context, value: ObjRef, buf: &mut Buf) {
    buf.push_str("(");
    let mut cur = value;
    let mut first = true;
    loop {
        let ObjRef::Slot(h) = cur else { break };
        let payload = ctx.heap.get(h).payload;
        let Payload::Cons { car, cdr } = payload else {
            buf.push_str(" . ");
            print_obj(ctx, cur, buf);
            break;
        };
        if !first {
            buf.push_str(" ");
        }
        first = false;
        print_obj(ctx, car, buf);
        match cdr {
            ObjRef::Nil => break,
            next @ ObjRef::Slot(nh) => {
                if matches!(ctx.heap.get(nh).payload, Payload::Cons { .. }) {
                    cur = next;
                } else {
                    buf.push_str(" . ");
                    print_obj(ctx, next, buf);
                    break;
                }
            }
        }
    }
    buf.push_str(")");
}

/// Debug helper used by tests and the REPL's `:mark` inspection — not part
/// of the canonical printed form, never called from [`print_to_string`].
pub fn mark_of(ctx: &Context, value: ObjRef) -> Option<Mark> {
    match value {
        ObjRef::Nil => None,
        ObjRef::Slot(h) => Some(ctx.heap.get(h).mark),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read;

    fn show(src: &str) -> String {
        let mut ctx = Context::new();
        let v = read(src, &mut ctx);
        print_to_string(&ctx, v)
    }

    #[test]
    fn prints_nil() {
        assert_eq!(show("()"), "nil");
    }

    #[test]
    fn prints_number() {
        assert_eq!(show("7"), "7");
    }

    #[test]
    fn prints_proper_list() {
        assert_eq!(show("(1 2 3)"), "(1 2 3)");
    }

    #[test]
    fn prints_dotted_pair() {
        let mut ctx = Context::new();
        let one = ctx.alloc(Payload::Num(1));
        let two = ctx.alloc(Payload::Num(2));
        let pair = ctx.alloc(Payload::Cons { car: one, cdr: two });
        assert_eq!(print_to_string(&ctx, pair), "(1 . 2)");
    }

    #[test]
    #[should_panic(expected = "overflow")]
    fn overflow_panics_rather_than_growing() {
        // INLINE_CAP bounds a single symbol/string, so drive the overflow
        // with a long CONS chain of small numbers instead.
        let src = format!("({})", (0..200).map(|i| i.to_string()).collect::<Vec<_>>().join(" "));
        let mut ctx = Context::new();
        let v = read(&src, &mut ctx);
        print_to_string(&ctx, v);
    }
}
