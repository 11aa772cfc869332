//! scrollreel - scroll-driven frame animation library
//!
//! Re-exports all modules for use by binary targets.

// Core engine (assembler, cache, controller, workers)
pub mod core;

// App modules
pub mod cli;
pub mod entities;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types from core
pub use core::controller::{AnimationController, LoadState, Services};
pub use core::global_cache::AnimationCache;
pub use core::mapper::{ScrollGeometry, ScrollRegion, SharedRegion};
pub use core::scroll_feed::ScrollFeed;
pub use core::workers::Workers;

// Re-export entities
pub use entities::{Canvas, Frame, FrameError, FrameKey, FrameResult, Manifest, RasterCanvas, SourceDescriptor};
