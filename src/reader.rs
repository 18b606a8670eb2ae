//! The S-expression reader (spec §4.3).
//!
//! Recursive-descent over a raw byte cursor, in the tokenizer-helper
//! style of `wudi-php-rs/src/parser/lexer/mod.rs` (byte-indexed cursor,
//! `peek`/`advance` primitives, a keyword/classifier dispatch on the next
//! byte) — scaled down to this grammar's much smaller token set and with
//! no lexer-mode state machine, since §4.3's grammar has none.

use crate::core::{ObjRef, Payload};
use crate::eval::Context;
use crate::fatal;

/// Cap on bytes `load` will read from a file before parsing it (spec §6).
pub const MAX_FILE_SIZE: usize = 10_000;

struct Cursor<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a [u8]) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ')) {
            self.pos += 1;
        }
    }
}

fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

fn is_symbol_byte(b: u8) -> bool {
    b != b' ' && b != b')' && b != b'(' && b != b'"' && b != b'\''
}

/// `read(text, ctx) -> value`: parse exactly one top-level expression.
/// Fatal on malformed or unterminated input (spec §4.3, §7: "the parser
/// will read past the buffer ... is hereby required of a re-
/// implementation to diagnose and abort instead").
pub fn read(text: &str, ctx: &mut Context) -> ObjRef {
    let mut cur = Cursor::new(text.as_bytes());
    read_obj(&mut cur, ctx)
}

fn read_obj(cur: &mut Cursor, ctx: &mut Context) -> ObjRef {
    cur.skip_spaces();
    match cur.peek() {
        None => fatal!("reader: unexpected end of input"),
        Some(b'(') => read_list(cur, ctx),
        Some(b'"') => read_string(cur, ctx),
        Some(b'\'') => read_quote(cur, ctx),
        Some(b) if is_digit(b) => read_number(cur, ctx),
        Some(_) => read_symbol(cur, ctx),
    }
}

fn read_quote(cur: &mut Cursor, ctx: &mut Context) -> ObjRef {
    cur.advance(); // consume '\''
    let expr = read_obj(cur, ctx);
    ctx.alloc(Payload::Quote(expr))
}

fn read_list(cur: &mut Cursor, ctx: &mut Context) -> ObjRef {
    cur.advance(); // consume '('
    cur.skip_spaces();
    if cur.peek() == Some(b')') {
        cur.advance();
        return ObjRef::Nil;
    }
    read_list_inner(cur, ctx)
}

/// Reads one element, then either terminates at `)` (cdr = NIL) or
/// recurses for the remaining elements (spec §4.3 "List parsing is
/// two-level").
fn read_list_inner(cur: &mut Cursor, ctx: &mut Context) -> ObjRef {
    let elem = read_obj(cur, ctx);
    cur.skip_spaces();
    match cur.peek() {
        None => fatal!("reader: unterminated list"),
        Some(b')') => {
            cur.advance();
            ctx.alloc(Payload::Cons {
                car: elem,
                cdr: ObjRef::Nil,
            })
        }
        Some(_) => {
            let rest = read_list_inner(cur, ctx);
            ctx.alloc(Payload::Cons {
                car: elem,
                cdr: rest,
            })
        }
    }
}

fn read_string(cur: &mut Cursor, ctx: &mut Context) -> ObjRef {
    cur.advance(); // consume opening '"'
    let start = cur.pos;
    loop {
        match cur.advance() {
            None => fatal!("reader: unterminated string literal"),
            Some(b'"') => break,
            Some(_) => {}
        }
    }
    let body = &cur.text[start..cur.pos - 1];
    ctx.alloc(Payload::Str(crate::core::InlineStr::new(body)))
}

fn read_symbol(cur: &mut Cursor, ctx: &mut Context) -> ObjRef {
    let start = cur.pos;
    while matches!(cur.peek(), Some(b) if is_symbol_byte(b)) {
        cur.pos += 1;
    }
    if cur.pos == start {
        fatal!("reader: expected a symbol at byte offset {}", cur.pos);
    }
    let text = &cur.text[start..cur.pos];
    ctx.alloc(Payload::Symbol(crate::core::InlineStr::new(text)))
}

fn read_number(cur: &mut Cursor, ctx: &mut Context) -> ObjRef {
    let start = cur.pos;
    while matches!(cur.peek(), Some(b) if is_digit(b)) {
        cur.pos += 1;
    }
    let digits = std::str::from_utf8(&cur.text[start..cur.pos])
        .unwrap_or_else(|_| fatal!("reader: non-UTF8 digits"));
    let n: i64 = digits
        .parse()
        .unwrap_or_else(|_| fatal!("reader: malformed number literal {:?}", digits));
    ctx.alloc(Payload::Num(n))
}

/// `load`'s file-reading step (spec §6): read up to [`MAX_FILE_SIZE`]
/// bytes, stripping newlines and tabs from the stream entirely (they are
/// discarded, not treated as whitespace), then parse one top-level form.
pub fn read_file(path: &str, ctx: &mut Context) -> ObjRef {
    let raw = std::fs::read(path).unwrap_or_else(|e| fatal!("load: cannot read {:?}: {}", path, e));
    let truncated = &raw[..raw.len().min(MAX_FILE_SIZE)];
    let cleaned: Vec<u8> = truncated
        .iter()
        .copied()
        .filter(|&b| b != b'\n' && b != b'\t')
        .collect();
    let text = String::from_utf8_lossy(&cleaned).into_owned();
    read(&text, ctx)
}

/// Like [`read_file`], but parses every top-level form in the file instead
/// of just the first (spec §10.5: the script runner "evaluates each
/// top-level form in sequence").
pub fn read_file_all(path: &str, ctx: &mut Context) -> Vec<ObjRef> {
    let raw = std::fs::read(path).unwrap_or_else(|e| fatal!("load: cannot read {:?}: {}", path, e));
    let truncated = &raw[..raw.len().min(MAX_FILE_SIZE)];
    let cleaned: Vec<u8> = truncated
        .iter()
        .copied()
        .filter(|&b| b != b'\n' && b != b'\t')
        .collect();
    let text = String::from_utf8_lossy(&cleaned).into_owned();
    let mut cur = Cursor::new(text.as_bytes());
    let mut forms = Vec::new();
    loop {
        cur.skip_spaces();
        if cur.peek().is_none() {
            break;
        }
        forms.push(read_obj(&mut cur, ctx));
    }
    forms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval;
    use crate::printer::print_to_string;

    fn roundtrip(src: &str) -> String {
        let mut ctx = Context::new();
        let v = read(src, &mut ctx);
        print_to_string(&ctx, v)
    }

    #[test]
    fn reads_number() {
        assert_eq!(roundtrip("42"), "42");
    }

    #[test]
    fn reads_symbol() {
        assert_eq!(roundtrip("foo"), "foo");
    }

    #[test]
    fn reads_string() {
        assert_eq!(roundtrip("\"hi\""), "\"hi\"");
    }

    #[test]
    fn reads_proper_list() {
        assert_eq!(roundtrip("(1 2 3)"), "(1 2 3)");
    }

    #[test]
    fn reads_empty_list_as_nil() {
        assert_eq!(roundtrip("()"), "nil");
    }

    #[test]
    fn reads_nested_list() {
        assert_eq!(roundtrip("(1 (2 3) 4)"), "(1 (2 3) 4)");
    }

    #[test]
    fn reads_quote() {
        assert_eq!(roundtrip("'(1 2)"), "'(1 2)");
    }

    #[test]
    #[should_panic(expected = "unterminated")]
    fn unterminated_list_is_fatal() {
        let mut ctx = Context::new();
        read("(1 2", &mut ctx);
    }

    #[test]
    #[should_panic(expected = "unterminated")]
    fn unterminated_string_is_fatal() {
        let mut ctx = Context::new();
        read("\"abc", &mut ctx);
    }

    #[test]
    fn property_p5_quote_matches_unevaluated_read() {
        // eval(read("'e")) structurally equals read("e") for e without unquote.
        let mut ctx = Context::new();
        let quoted = read("'(1 2 3)", &mut ctx);
        let evaluated = eval::eval(quoted, &mut ctx);
        let mut ctx2 = Context::new();
        let plain = read("(1 2 3)", &mut ctx2);
        assert_eq!(print_to_string(&ctx, evaluated), print_to_string(&ctx2, plain));
    }
}
