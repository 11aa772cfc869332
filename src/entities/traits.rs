//! Abstract traits for dependency inversion.
//!
//! These traits define the collaborators the frame pipeline consumes:
//! byte fetching, image decoding, the 2D drawing surface and the
//! background pool. `core` wires concrete implementations together;
//! `entities` only sees the interfaces.

use std::sync::Arc;

use super::frame::{Bitmap, FrameResult, PixelGrid};

/// Byte source for one URL (HTTP, filesystem, in-memory bundle).
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> FrameResult<Vec<u8>>;
}

/// Image decoding and cropping primitives.
pub trait ImageCodec: Send + Sync {
    /// Decode an encoded image (PNG, JPEG, ...) into a bitmap.
    fn decode(&self, bytes: &[u8]) -> FrameResult<Bitmap>;

    /// Copy the `w`x`h` region at (`x`, `y`) out of `source`.
    fn crop(&self, source: &Bitmap, x: u32, y: u32, w: u32, h: u32) -> FrameResult<Bitmap>;
}

/// 2D drawing surface.
///
/// Offsets may be negative or exceed the surface; implementations clip.
pub trait Canvas {
    fn size(&self) -> (u32, u32);

    /// Resize the drawing buffer. Contents are discarded.
    fn set_size(&mut self, width: u32, height: u32);

    fn clear_rect(&mut self, x: i64, y: i64, width: u32, height: u32);

    /// Copy raw pixels, replacing what is underneath (no blending).
    fn put_pixel_grid(&mut self, grid: &PixelGrid, x: i64, y: i64);

    /// Composite a bitmap over the current contents.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i64, y: i64);
}

/// Abstract worker pool interface.
///
/// Allows loaders to schedule background work without knowing
/// the concrete thread pool implementation.
pub trait WorkerPool: Send + Sync {
    /// Run closure on some worker thread, in no guaranteed order.
    fn execute(&self, f: Box<dyn FnOnce() + Send + 'static>);
}

/// Blanket impls: Arc<T> implements traits if T does
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn fetch(&self, url: &str) -> FrameResult<Vec<u8>> {
        (**self).fetch(url)
    }
}

impl<T: ImageCodec + ?Sized> ImageCodec for Arc<T> {
    fn decode(&self, bytes: &[u8]) -> FrameResult<Bitmap> {
        (**self).decode(bytes)
    }

    fn crop(&self, source: &Bitmap, x: u32, y: u32, w: u32, h: u32) -> FrameResult<Bitmap> {
        (**self).crop(source, x, y, w, h)
    }
}

impl<T: WorkerPool + ?Sized> WorkerPool for Arc<T> {
    fn execute(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        (**self).execute(f)
    }
}

impl<T: Canvas + ?Sized> Canvas for Box<T> {
    fn size(&self) -> (u32, u32) {
        (**self).size()
    }

    fn set_size(&mut self, width: u32, height: u32) {
        (**self).set_size(width, height)
    }

    fn clear_rect(&mut self, x: i64, y: i64, width: u32, height: u32) {
        (**self).clear_rect(x, y, width, height)
    }

    fn put_pixel_grid(&mut self, grid: &PixelGrid, x: i64, y: i64) {
        (**self).put_pixel_grid(grid, x, y)
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i64, y: i64) {
        (**self).draw_bitmap(bitmap, x, y)
    }
}
