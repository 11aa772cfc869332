//! Process-wide animation cache keyed by animation id
//!
//! Structure: IndexMap<String, Arc<CacheSlot>>
//! - One slot per animation id, created lazily on first claim
//! - A slot holds at most one frozen `FrameSequence`, written once
//! - No eviction: slots live as long as the registry
//!
//! Ownership rule: the first `claim(id)` returns `SlotClaim::Owner`, which
//! is the only way to publish into the slot. Every later claim for the
//! same id returns `SlotClaim::Attached` and observes the sequence once the
//! owner publishes it.
//!
//! An owner dropped before publishing releases the id: its slot leaves the
//! registry and is marked abandoned, and the next `claim(id)` owns again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use indexmap::IndexMap;
use log::{debug, warn};
use once_cell::sync::{Lazy, OnceCell};

use crate::core::assembler::FrameSequence;

static GLOBAL: Lazy<Arc<AnimationCache>> = Lazy::new(|| Arc::new(AnimationCache::new()));

type SlotMap = Mutex<IndexMap<String, Arc<CacheSlot>>>;

/// Claim statistics. Hits are attaches to an existing slot, misses are
/// claims that created a slot (and therefore load).
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.hits() + self.misses()
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

/// One animation's slot
#[derive(Debug)]
pub struct CacheSlot {
    id: String,
    sequence: OnceCell<Arc<FrameSequence>>,
    abandoned: AtomicBool,
}

impl CacheSlot {
    fn new(id: String) -> Self {
        Self {
            id,
            sequence: OnceCell::new(),
            abandoned: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Published sequence, if the owner finished loading
    pub fn sequence(&self) -> Option<Arc<FrameSequence>> {
        self.sequence.get().cloned()
    }

    pub fn is_populated(&self) -> bool {
        self.sequence.get().is_some()
    }

    /// The owner went away without publishing; this slot will stay empty.
    /// Claim the id again to get its current slot.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }
}

/// Write handle for a slot, held by the controller that loads it.
///
/// Dropping it unpublished releases the id (see module docs).
#[derive(Debug)]
pub struct SlotOwner {
    slot: Arc<CacheSlot>,
    registry: Weak<SlotMap>,
}

impl SlotOwner {
    pub fn slot(&self) -> &Arc<CacheSlot> {
        &self.slot
    }

    /// Publish the finished sequence. Consumes the handle: a slot is
    /// written exactly once.
    pub fn publish(self, sequence: Arc<FrameSequence>) {
        debug!("Publishing '{}' ({} frames)", self.slot.id, sequence.len());
        if self.slot.sequence.set(sequence).is_err() {
            warn!("Slot '{}' already populated, keeping the first sequence", self.slot.id);
        }
    }
}

impl Drop for SlotOwner {
    fn drop(&mut self) {
        if self.slot.is_populated() {
            return;
        }
        warn!("Owner of '{}' dropped before publishing, releasing the id", self.slot.id);

        // Unregister before flagging so a re-claim never finds this slot
        if let Some(registry) = self.registry.upgrade() {
            let mut slots = registry.lock().unwrap_or_else(|e| e.into_inner());
            if slots.get(&self.slot.id).is_some_and(|s| Arc::ptr_eq(s, &self.slot)) {
                slots.shift_remove(&self.slot.id);
            }
        }
        self.slot.abandoned.store(true, Ordering::Release);
    }
}

/// Result of `AnimationCache::claim`
#[derive(Debug)]
pub enum SlotClaim {
    /// First claim: load and publish
    Owner(SlotOwner),
    /// Slot already claimed: read only
    Attached(Arc<CacheSlot>),
}

impl SlotClaim {
    pub fn slot(&self) -> &Arc<CacheSlot> {
        match self {
            SlotClaim::Owner(owner) => owner.slot(),
            SlotClaim::Attached(slot) => slot,
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, SlotClaim::Owner(_))
    }
}

/// Registry of animation slots.
///
/// Share it via `Arc`; `AnimationCache::global()` is the process-wide
/// default instance.
#[derive(Debug, Default)]
pub struct AnimationCache {
    slots: Arc<SlotMap>,
    stats: Arc<CacheStats>,
}

impl AnimationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide default registry
    pub fn global() -> Arc<AnimationCache> {
        Arc::clone(&GLOBAL)
    }

    /// Claim the slot for `id`. Exactly one caller per id becomes owner.
    pub fn claim(&self, id: &str) -> SlotClaim {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get(id) {
            self.stats.record_hit();
            debug!("Attached to slot '{}' (populated: {})", id, slot.is_populated());
            return SlotClaim::Attached(Arc::clone(slot));
        }

        self.stats.record_miss();
        let slot = Arc::new(CacheSlot::new(id.to_string()));
        slots.insert(id.to_string(), Arc::clone(&slot));
        debug!("Created slot '{}' ({} total)", id, slots.len());
        SlotClaim::Owner(SlotOwner {
            slot,
            registry: Arc::downgrade(&self.slots),
        })
    }

    pub fn get(&self, id: &str) -> Option<Arc<CacheSlot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot ids in claim order
    pub fn ids(&self) -> Vec<String> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).keys().cloned().collect()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
