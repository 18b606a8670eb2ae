//! The fixed-capacity, pre-allocated object heap (spec §3 "Heap slots",
//! §4.1).
//!
//! Grounded on `wudi-php-rs/src/core/heap.rs`'s `Arena` (slot storage plus
//! a free list, `alloc`/`get`/`get_mut`/`free`) and
//! `wudi-php-rs/src/core/gc.rs`'s `GcHeap` (the same shape, with marks and
//! a `collect` entry point). Unlike both of those — which grow their
//! backing `Vec` on demand — this heap is a fixed-size array allocated
//! once in [`Heap::new`] and never resized: `alloc` exhausting the
//! free-list after a collection is an out-of-memory condition, not a
//! resize trigger (spec §4.1, §4.2 "Failure").

use crate::core::gc;
use crate::core::value::{Handle, Mark, ObjRef, Payload, Slot};
use crate::fatal;

/// Total number of value slots in the heap (spec §3 recommendation).
pub const CAPACITY: usize = 100_000;

pub struct Heap {
    slots: Box<[Slot]>,
    free_head: Option<Handle>,
}

impl Heap {
    /// `heap_init`: link every slot into the free-list, every mark UNUSED.
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(CAPACITY);
        for i in 0..CAPACITY {
            let next = if i + 1 < CAPACITY {
                Some(Handle((i + 1) as u32))
            } else {
                None
            };
            slots.push(Slot::free(next));
        }
        Self {
            slots: slots.into_boxed_slice(),
            free_head: Some(Handle(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots not on the free-list (P1 in spec §8: `live + free
    /// == CAPACITY`, so this is just `CAPACITY - free_count`... computed
    /// directly here by walking the storage once, which is fine off the
    /// hot allocation path and is exactly the check P1 asks us to be able
    /// to make).
    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !matches!(s.payload, Payload::Free { .. }))
            .count()
    }

    pub fn free_count(&self) -> usize {
        self.slots.len() - self.live_count()
    }

    fn pop_free(&mut self) -> Option<Handle> {
        let head = self.free_head?;
        let next = match self.slots[head.0 as usize].payload {
            Payload::Free { next } => next,
            _ => fatal!("free-list head at slot {} is not a FREELIST slot", head.0),
        };
        self.free_head = next;
        Some(head)
    }

    fn push_free(&mut self, h: Handle) {
        let next = self.free_head;
        self.slots[h.0 as usize] = Slot::free(next);
        self.free_head = Some(h);
    }

    /// `alloc()`: if the free-list is empty, run a collection rooted at
    /// `root` (the interpreter's `env_top`); then pop the free-list head,
    /// zero it, mark it INTERNAL, and install `payload`. Fatal OOM if
    /// collection still yields nothing (spec §4.1, §4.2).
    pub fn alloc(&mut self, payload: Payload, root: ObjRef) -> Handle {
        if self.free_head.is_none() {
            gc::collect(self, root);
            if self.free_head.is_none() {
                fatal!(
                    "out of memory: heap exhausted after collection (capacity {})",
                    CAPACITY
                );
            }
        }
        let h = self
            .pop_free()
            .unwrap_or_else(|| fatal!("alloc: free-list unexpectedly empty after check"));
        self.slots[h.0 as usize] = Slot {
            mark: Mark::Internal,
            payload,
        };
        h
    }

    pub fn get(&self, h: Handle) -> &Slot {
        let slot = &self.slots[h.0 as usize];
        if matches!(slot.payload, Payload::Free { .. }) {
            fatal!("use-after-free: handle {} refers to a freed slot", h.0);
        }
        slot
    }

    pub fn get_mut(&mut self, h: Handle) -> &mut Slot {
        if matches!(self.slots[h.0 as usize].payload, Payload::Free { .. }) {
            fatal!("use-after-free: handle {} refers to a freed slot", h.0);
        }
        &mut self.slots[h.0 as usize]
    }

    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.slots
    }

    /// `mark(root, color)`: walk from `root`, setting every reachable
    /// slot's mark to `color`. Used by the evaluator to demote results it
    /// no longer needs to UNUSED (spec §4.2) without waiting for a full
    /// collection cycle to notice them as unreachable.
    pub fn mark(&mut self, root: ObjRef, color: Mark) {
        gc::mark_reachable(self, root, color);
    }

    /// `free(slot)`: zero the slot, mark UNUSED, push onto the free-list.
    pub fn free(&mut self, h: Handle) {
        self.push_free(h);
    }

    /// `sweep()`: free every slot whose mark is UNUSED.
    pub fn sweep(&mut self) {
        let unused: Vec<Handle> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.mark == Mark::Unused && !matches!(s.payload, Payload::Free { .. }))
            .map(|(i, _)| Handle(i as u32))
            .collect();
        for h in unused {
            self.free(h);
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_get_roundtrip() {
        let mut heap = Heap::new();
        let h = heap.alloc(Payload::Num(42), ObjRef::Nil);
        assert_eq!(heap.get(h).payload, Payload::Num(42));
    }

    #[test]
    fn heap_init_links_every_slot_into_free_list() {
        let heap = Heap::new();
        assert_eq!(heap.free_count(), CAPACITY);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn alloc_consumes_free_list_and_reuses_after_free() {
        let mut heap = Heap::new();
        let a = heap.alloc(Payload::Num(1), ObjRef::Nil);
        assert_eq!(heap.free_count(), CAPACITY - 1);
        heap.free(a);
        assert_eq!(heap.free_count(), CAPACITY);
        let b = heap.alloc(Payload::Num(2), ObjRef::Nil);
        assert_eq!(b, a);
    }

    #[test]
    #[should_panic(expected = "use-after-free")]
    fn get_after_free_is_fatal() {
        let mut heap = Heap::new();
        let a = heap.alloc(Payload::Num(1), ObjRef::Nil);
        heap.free(a);
        heap.get(a);
    }

    #[test]
    fn p1_live_plus_free_equals_capacity() {
        let mut heap = Heap::new();
        for i in 0..10 {
            heap.alloc(Payload::Num(i), ObjRef::Nil);
        }
        assert_eq!(heap.live_count() + heap.free_count(), CAPACITY);
    }
}
