//! Shared fakes for unit tests

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::core::mapper::{ScrollGeometry, SharedRegion};
use crate::entities::frame::{Bitmap, PixelGrid};
use crate::entities::traits::{Canvas, WorkerPool};

/// Runs every job immediately on the calling thread
pub struct InlinePool;

impl WorkerPool for InlinePool {
    fn execute(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        f()
    }
}

/// Queues jobs until the test runs them, in whatever order it likes
#[derive(Default, Clone)]
pub struct ManualPool {
    jobs: Arc<Mutex<Vec<Box<dyn FnOnce() + Send + 'static>>>>,
}

impl ManualPool {
    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Run the most recently queued job only
    pub fn run_newest(&self) -> bool {
        let job = self.jobs.lock().unwrap().pop();
        job.map(|job| job()).is_some()
    }

    /// Run the earliest queued job only
    pub fn run_oldest(&self) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        let job = (!jobs.is_empty()).then(|| jobs.remove(0));
        drop(jobs);
        job.map(|job| job()).is_some()
    }

    /// Run queued jobs (and the jobs they queue) newest first
    pub fn run_all_reversed(&self) {
        loop {
            let job = self.jobs.lock().unwrap().pop();
            match job {
                Some(job) => job(),
                None => break,
            }
        }
    }
}

impl WorkerPool for ManualPool {
    fn execute(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        self.jobs.lock().unwrap().push(f);
    }
}

pub fn encode_png(img: RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Solid-colour PNG
pub fn png_bytes(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    encode_png(RgbaImage::from_pixel(w, h, Rgba(rgba)))
}

/// `tiles` horizontal tiles of `w`x`h`; tile `i` is filled with red = `i`
pub fn tiled_png(w: u32, h: u32, tiles: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(w * tiles, h, |x, _| Rgba([(x / w) as u8, 0, 0, 255]));
    encode_png(img)
}

/// Canvas operation, as seen by `RecordingCanvas`
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOp {
    Resize(u32, u32),
    Clear,
    /// First pixel of the drawn grid/bitmap identifies it in tests
    PutGrid([u8; 4]),
    DrawBitmap([u8; 4]),
}

/// Records every call; clones share the log
#[derive(Debug, Default, Clone)]
pub struct RecordingCanvas {
    size: (u32, u32),
    pub ops: Arc<Mutex<Vec<CanvasOp>>>,
}

impl RecordingCanvas {
    pub fn ops(&self) -> Vec<CanvasOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Only the draw operations, clears and resizes dropped
    pub fn draws(&self) -> Vec<CanvasOp> {
        self.ops()
            .into_iter()
            .filter(|op| matches!(op, CanvasOp::PutGrid(_) | CanvasOp::DrawBitmap(_)))
            .collect()
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.ops.lock().unwrap().push(CanvasOp::Resize(width, height));
    }

    fn clear_rect(&mut self, _x: i64, _y: i64, _width: u32, _height: u32) {
        self.ops.lock().unwrap().push(CanvasOp::Clear);
    }

    fn put_pixel_grid(&mut self, grid: &PixelGrid, _x: i64, _y: i64) {
        let mut px = [0u8; 4];
        px.copy_from_slice(&grid.data()[..4]);
        self.ops.lock().unwrap().push(CanvasOp::PutGrid(px));
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, _x: i64, _y: i64) {
        let px = bitmap.image().get_pixel(0, 0).0;
        self.ops.lock().unwrap().push(CanvasOp::DrawBitmap(px));
    }
}

/// Section 1000 tall, canvas 100, viewport 100: scrollable span of 800
pub fn test_region() -> SharedRegion {
    SharedRegion::new(ScrollGeometry {
        section_height: 1000.0,
        section_top: 0.0,
        canvas_height: 100.0,
        viewport_height: 100.0,
    })
}
