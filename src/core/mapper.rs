//! Scroll-to-frame mapping
//!
//! progress = -top / (section height - canvas height - viewport height)
//! index    = round(progress * frame count)
//!
//! No clamping happens here; callers bounds-check before indexing.

use std::sync::{Arc, Mutex};

/// Scroll geometry, read fresh for every mapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollGeometry {
    /// Height of the bound page section
    pub section_height: f64,
    /// Section's bounding-box top relative to the viewport (negative once scrolled past)
    pub section_top: f64,
    /// Rendered height of the canvas
    pub canvas_height: f64,
    pub viewport_height: f64,
}

impl ScrollGeometry {
    /// Fraction of the scrollable span already passed. Not clamped; may be
    /// non-finite when the span is zero.
    pub fn progress(&self) -> f64 {
        let span = self.section_height - self.canvas_height - self.viewport_height;
        -self.section_top / span
    }
}

/// Source of the current scroll geometry
pub trait ScrollRegion {
    fn geometry(&self) -> ScrollGeometry;
}

/// Frame index for the current scroll position.
///
/// Returns `None` when the geometry is degenerate (zero span) and the
/// result would be NaN or infinite.
pub fn frame_index(geometry: &ScrollGeometry, frame_count: usize) -> Option<i64> {
    let index = (geometry.progress() * frame_count as f64).round();
    index.is_finite().then_some(index as i64)
}

/// Geometry cell shared between the host (which moves it) and a controller
#[derive(Debug, Clone)]
pub struct SharedRegion(Arc<Mutex<ScrollGeometry>>);

impl SharedRegion {
    pub fn new(geometry: ScrollGeometry) -> Self {
        Self(Arc::new(Mutex::new(geometry)))
    }

    pub fn set(&self, geometry: ScrollGeometry) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = geometry;
    }

    /// Move the section's top edge, leaving sizes alone
    pub fn scroll_to(&self, section_top: f64) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).section_top = section_top;
    }
}

impl ScrollRegion for SharedRegion {
    fn geometry(&self) -> ScrollGeometry {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}
