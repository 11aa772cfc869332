//! Core engine modules - assembly, cache, mapping, rendering, workers
//!
//! These modules drive an animation, independent of any host UI.

pub mod assembler;
pub mod controller;
pub mod global_cache;
pub mod mapper;
pub mod renderer;
pub mod scroll_feed;
pub mod workers;

// Re-exports for convenience
pub use assembler::{Assembler, CompletionRule, FrameSequence};
pub use controller::{AnimationController, LoadState, Services};
pub use global_cache::{AnimationCache, CacheSlot, CacheStats, SlotClaim, SlotOwner};
pub use mapper::{ScrollGeometry, ScrollRegion, SharedRegion, frame_index};
pub use scroll_feed::{ScrollFeed, Subscription};
pub use workers::Workers;
