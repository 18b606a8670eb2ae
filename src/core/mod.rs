//! The object model, the bounded heap, and the mark/sweep collector
//! (spec §2 items 1-3, §3, §4.1, §4.2).

pub mod gc;
pub mod heap;
pub mod value;

pub use heap::{CAPACITY, Heap};
pub use value::{Handle, InlineStr, Mark, ObjRef, Payload, Slot, INLINE_CAP};
