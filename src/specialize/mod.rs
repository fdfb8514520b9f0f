//! Per-pixel operation specialization.
//!
//! Three independent caches hold callables specialized against the exact
//! state subset they depend on:
//!
//! - fragment write (blend, color mask, depth write)
//! - depth test (enable, compare func, depth range)
//! - texture fetch (dimensions, format, target, wrap modes)
//!
//! Resolution hashes the key with 32-bit FNV-1a, walks the hash bucket
//! comparing full key equality, and on a miss builds a new callable: the
//! injected codegen backend is asked first, the state-branching interpreter
//! closure is the fallback. Entries sit in an arena, linked from one bucket
//! and one slot in a cache-wide FIFO; inserting past capacity evicts the
//! oldest entry from both structures.

pub mod fragment_write;
pub mod texture_fetch;

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use log::trace;

use crate::state::{DirtyState, GlContext};
use crate::texture::TextureDirty;

pub use depth_test::{DepthTestKey, DepthTestOp};
pub use fragment_write::{FragmentWriteKey, FragmentWriteOp};
pub use texture_fetch::{TextureFetchKey, TextureFetchOp};

/// Entry limit per cache.
pub const SPEC_CACHE_CAPACITY: usize = 1024;

// ── Hashing ──────────────────────────────────────────────────────────────────

/// Incremental 32-bit FNV-1a over raw key bytes.
pub struct Fnv32(u32);

impl Fnv32 {
    pub fn new() -> Self {
        Fnv32(0x811c_9dc5)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u32;
            self.0 = self.0.wrapping_mul(0x0100_0193);
        }
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write(&[v as u8]);
    }

    pub fn finish(&self) -> u32 {
        self.0
    }
}

impl Default for Fnv32 {
    fn default() -> Self {
        Self::new()
    }
}

// ── Cache ────────────────────────────────────────────────────────────────────

/// A state subset that keys one specialization cache.
///
/// Hash equality is necessary but never sufficient: `resolve` compares the
/// full key before reusing an entry.
pub trait SpecKey: Clone + PartialEq {
    type Op: ?Sized;

    fn hash32(&self) -> u32;
}

struct Entry<K: SpecKey> {
    key: K,
    hash: u32,
    op: Rc<K::Op>,
}

/// Hash-bucketed, FIFO-bounded cache of specialized callables.
pub struct SpecCache<K: SpecKey> {
    slots: Vec<Option<Entry<K>>>,
    free: Vec<usize>,
    buckets: HashMap<u32, Vec<usize>>,
    fifo: VecDeque<usize>,
    capacity: usize,
}

impl<K: SpecKey> SpecCache<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            buckets: HashMap::new(),
            fifo: VecDeque::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// Return the callable for `key`, building and inserting it on a miss.
    ///
    /// Hits return a clone of the stored `Rc`, so repeated resolutions of
    /// the same key are pointer-identical until the entry is evicted.
    pub fn resolve(&mut self, key: &K, build: impl FnOnce(&K) -> Rc<K::Op>) -> Rc<K::Op> {
        let hash = key.hash32();
        if let Some(chain) = self.buckets.get(&hash) {
            for &idx in chain {
                if let Some(entry) = &self.slots[idx] {
                    if entry.hash == hash && entry.key == *key {
                        return Rc::clone(&entry.op);
                    }
                }
            }
        }

        let op = build(key);
        let idx = match self.free.pop() {
            Some(i) => i,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[idx] = Some(Entry {
            key: key.clone(),
            hash,
            op: Rc::clone(&op),
        });
        self.buckets.entry(hash).or_default().push(idx);
        self.fifo.push_back(idx);
        trace!("op cache insert hash={hash:#010x} len={}", self.fifo.len());

        if self.fifo.len() > self.capacity {
            self.evict_oldest();
        }
        op
    }

    /// Unlink the FIFO head from the bucket chain and free its slot.
    fn evict_oldest(&mut self) {
        let Some(idx) = self.fifo.pop_front() else {
            return;
        };
        if let Some(entry) = self.slots[idx].take() {
            if let Some(chain) = self.buckets.get_mut(&entry.hash) {
                chain.retain(|&i| i != idx);
                if chain.is_empty() {
                    self.buckets.remove(&entry.hash);
                }
            }
            trace!("op cache evict hash={:#010x} len={}", entry.hash, self.fifo.len());
        }
        self.free.push(idx);
    }
}

// ── Codegen backend seam ─────────────────────────────────────────────────────

/// Optional machine-code producer for specialized callables.
///
/// Every hook may decline by returning `None`; the interpreter closure is
/// then used and no error is recorded, so a backend is never load-bearing.
pub trait CodegenBackend {
    fn build_fragment_write(&mut self, _key: &FragmentWriteKey) -> Option<Rc<FragmentWriteOp>> {
        None
    }

    fn build_depth_test(&mut self, _key: &DepthTestKey) -> Option<Rc<DepthTestOp>> {
        None
    }

    fn build_texture_fetch(&mut self, _key: &TextureFetchKey) -> Option<Rc<TextureFetchOp>> {
        None
    }
}

// ── Per-draw resolution ──────────────────────────────────────────────────────

impl GlContext {
    /// Re-resolve the specialized callables whose state group is dirty.
    ///
    /// Runs at most once per draw call, from `begin` and the array draws.
    /// A clean mask makes this free.
    pub(crate) fn prepare_draw(&mut self) {
        if self.dirty.intersects(DirtyState::FRAGMENT_WRITE_GROUP) {
            let key = FragmentWriteKey::from_context(self);
            let codegen = &mut self.codegen;
            self.fragment_write_op = self.fragment_write_cache.resolve(&key, |k| {
                codegen
                    .as_mut()
                    .and_then(|b| b.build_fragment_write(k))
                    .unwrap_or_else(|| fragment_write::build_interpreter(k))
            });
            self.dirty.remove(DirtyState::FRAGMENT_WRITE_GROUP);
        }

        if self.dirty.intersects(DirtyState::DEPTH_TEST_GROUP) {
            let key = DepthTestKey::from_context(self);
            let codegen = &mut self.codegen;
            self.depth_test_op = self.depth_test_cache.resolve(&key, |k| {
                codegen
                    .as_mut()
                    .and_then(|b| b.build_depth_test(k))
                    .unwrap_or_else(|| depth_test::build_interpreter(k))
            });
            self.dirty.remove(DirtyState::DEPTH_TEST_GROUP);
        }

        if self.texture_2d {
            let binding = self.binding_2d;
            let cache = &mut self.texture_fetch_cache;
            let codegen = &mut self.codegen;
            if let Some(tex) = self.textures.get_mut(binding) {
                if tex.fetch_op.is_none() || tex.dirty.intersects(TextureDirty::FETCH_KEY) {
                    let key = TextureFetchKey::from_texture(tex);
                    let op = cache.resolve(&key, |k| {
                        codegen
                            .as_mut()
                            .and_then(|b| b.build_texture_fetch(k))
                            .unwrap_or_else(|| texture_fetch::build_interpreter(k))
                    });
                    tex.fetch_op = Some(op);
                    tex.dirty.remove(TextureDirty::FETCH_KEY);
                }
            }
        }
    }

    /// Install (or clear) the codegen backend and force re-resolution.
    pub fn set_codegen_backend(&mut self, backend: Option<Box<dyn CodegenBackend>>) {
        self.codegen = backend;
        self.dirty
            .insert(DirtyState::FRAGMENT_WRITE_GROUP | DirtyState::DEPTH_TEST_GROUP);
        for tex in self.textures.iter_mut() {
            tex.fetch_op = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Clone, PartialEq)]
    struct TestKey(u32);

    impl SpecKey for TestKey {
        type Op = dyn Fn() -> u32;

        fn hash32(&self) -> u32 {
            let mut h = Fnv32::new();
            h.write_u32(self.0);
            h.finish()
        }
    }

    fn op_for(k: &TestKey) -> Rc<dyn Fn() -> u32> {
        let v = k.0;
        Rc::new(move || v)
    }

    #[test]
    fn same_key_is_pointer_stable() {
        let mut cache: SpecCache<TestKey> = SpecCache::new(8);
        let a = cache.resolve(&TestKey(7), op_for);
        let b = cache.resolve(&TestKey(7), op_for);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_keys_get_distinct_ops() {
        let mut cache: SpecCache<TestKey> = SpecCache::new(8);
        let a = cache.resolve(&TestKey(1), op_for);
        let b = cache.resolve(&TestKey(2), op_for);
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(a(), 1);
        assert_eq!(b(), 2);
        // the first entry survives the second insertion
        let a2 = cache.resolve(&TestKey(1), op_for);
        assert!(Rc::ptr_eq(&a, &a2));
    }

    #[test]
    fn capacity_overflow_evicts_oldest_first() {
        let mut cache: SpecCache<TestKey> = SpecCache::new(2);
        let first = cache.resolve(&TestKey(1), op_for);
        cache.resolve(&TestKey(2), op_for);
        cache.resolve(&TestKey(3), op_for);
        assert_eq!(cache.len(), 2);
        // key 1 was evicted: re-resolving builds a fresh callable
        let again = cache.resolve(&TestKey(1), op_for);
        assert!(!Rc::ptr_eq(&first, &again));
        // which in turn pushed out key 2, while key 3 is still live
        let three = cache.resolve(&TestKey(3), op_for);
        assert_eq!(three(), 3);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn miss_builds_hit_does_not() {
        let builds = Cell::new(0u32);
        let mut cache: SpecCache<TestKey> = SpecCache::new(4);
        for _ in 0..3 {
            cache.resolve(&TestKey(9), |k| {
                builds.set(builds.get() + 1);
                op_for(k)
            });
        }
        assert_eq!(builds.get(), 1);
    }

    #[test]
    fn evicted_op_stays_usable_while_held() {
        let mut cache: SpecCache<TestKey> = SpecCache::new(1);
        let held = cache.resolve(&TestKey(1), op_for);
        cache.resolve(&TestKey(2), op_for);
        assert_eq!(cache.len(), 1);
        assert_eq!(held(), 1);
    }

    #[test]
    fn fnv32_matches_reference_vectors() {
        let mut h = Fnv32::new();
        h.write(b"a");
        assert_eq!(h.finish(), 0xe40c_292c);
        let mut h = Fnv32::new();
        h.write(b"foobar");
        assert_eq!(h.finish(), 0xbf9c_f968);
    }
}
