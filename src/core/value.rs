//! The object model: tagged values, heap handles, and GC mark colors.
//!
//! Mirrors `wudi-php-rs`'s `core::value` (`Handle`, `Val`, `Zval`), scaled
//! down to the fixed tag set this interpreter needs and with inline,
//! bounded-length payloads for symbols and strings instead of `Rc<Vec<u8>>`.

/// Index of a live slot in the heap. Never constructed for the NIL
/// sentinel — see [`ObjRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u32);

/// A value as it appears in a CONS car/cdr, a QUOTE's expr, a LAMBDA's
/// args/body, or an ENV's names/values: either the unique NIL sentinel or
/// a handle to a heap slot. NIL is never stored in the heap (spec §3:
/// "a single process-wide sentinel object not stored in the heap");
/// modeling it as a variant here rather than a reserved handle value keeps
/// identity comparison with NIL exact without a magic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjRef {
    Nil,
    Slot(Handle),
}

impl ObjRef {
    pub fn is_nil(self) -> bool {
        matches!(self, ObjRef::Nil)
    }
}

/// Upper bound, in bytes, of an inline symbol or string payload. The spec
/// recommends "32 bytes including terminator"; this crate tracks an
/// explicit length instead of a NUL terminator, so the usable capacity is
/// one byte less than the total envelope.
pub const INLINE_CAP: usize = 31;

/// A short, bounded-length byte string stored by value inside a heap
/// slot. Source tokens longer than `INLINE_CAP` are silently truncated
/// (spec §9 Open Question, resolved in DESIGN.md: truncate, don't
/// diagnose — this matches the original C implementation's fixed-size
/// `char[]` fields, which simply stop copying at the buffer bound).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineStr {
    bytes: [u8; INLINE_CAP],
    len: u8,
}

impl InlineStr {
    pub fn new(src: &[u8]) -> Self {
        let n = src.len().min(INLINE_CAP);
        let mut bytes = [0u8; INLINE_CAP];
        bytes[..n].copy_from_slice(&src[..n]);
        Self {
            bytes,
            len: n as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// The GC mark color of a heap slot (spec §3 "Heap slots", §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// Reclaimable; on the free-list once swept.
    Unused,
    /// Proven reachable from `env_top` during the current mark phase.
    External,
    /// Freshly allocated, not yet attached to or detached from a root;
    /// survives an unmark phase so that collection mid-construction can't
    /// reclaim it.
    Internal,
}

/// The tagged payload of a heap slot. `Free` is the intrusive free-list
/// link (spec §3 FREELIST tag, §4.1): a slot on the free-list carries its
/// own successor instead of being tracked in a side table, so invariant
/// I2 ("every FREELIST slot is reachable from `free_list` head by
/// following `next`") is structural rather than incidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Free { next: Option<Handle> },
    Num(i64),
    Symbol(InlineStr),
    Str(InlineStr),
    Cons { car: ObjRef, cdr: ObjRef },
    Quote(ObjRef),
    Lambda { params: ObjRef, body: ObjRef },
    Env { names: ObjRef, values: ObjRef },
}

impl Payload {
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Free { .. } => "freelist",
            Payload::Num(_) => "num",
            Payload::Symbol(_) => "symbol",
            Payload::Str(_) => "string",
            Payload::Cons { .. } => "cons",
            Payload::Quote(_) => "quote",
            Payload::Lambda { .. } => "lambda",
            Payload::Env { .. } => "env",
        }
    }
}

/// The container stored at each heap index — the `Zval` equivalent from
/// `wudi-php-rs/src/core/value.rs`, minus the reference-cell flag this
/// language has no use for.
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub mark: Mark,
    pub payload: Payload,
}

impl Slot {
    pub fn free(next: Option<Handle>) -> Self {
        Self {
            mark: Mark::Unused,
            payload: Payload::Free { next },
        }
    }
}
