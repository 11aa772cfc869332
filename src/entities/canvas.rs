//! Software RGBA canvas backed by an `image::RgbaImage`.
//!
//! Used by the CLI to render scroll positions to PNG and by tests as a
//! real drawing surface.

use std::path::Path;

use image::{Rgba, RgbaImage};
use log::trace;

use super::frame::{Bitmap, PixelGrid};
use super::traits::Canvas;

#[derive(Debug, Clone)]
pub struct RasterCanvas {
    surface: RgbaImage,
}

impl Default for RasterCanvas {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: RgbaImage::new(width, height),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.surface.get_pixel_checked(x, y).map(|p| p.0)
    }

    pub fn save_png(&self, path: &Path) -> image::ImageResult<()> {
        self.surface.save_with_format(path, image::ImageFormat::Png)
    }

    /// Intersect a rect with the surface, returning (x0, y0, x1, y1) or None.
    fn clip(&self, x: i64, y: i64, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let (sw, sh) = self.surface.dimensions();
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width as i64).min(sw as i64);
        let y1 = (y + height as i64).min(sh as i64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

impl Canvas for RasterCanvas {
    fn size(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    fn set_size(&mut self, width: u32, height: u32) {
        trace!("Canvas resized to {}x{}", width, height);
        self.surface = RgbaImage::new(width, height);
    }

    fn clear_rect(&mut self, x: i64, y: i64, width: u32, height: u32) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, width, height) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                self.surface.put_pixel(px, py, Rgba([0, 0, 0, 0]));
            }
        }
    }

    fn put_pixel_grid(&mut self, grid: &PixelGrid, x: i64, y: i64) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, grid.width(), grid.height()) else {
            return;
        };
        let surface_stride = self.surface.width() as usize * 4;
        let grid_stride = grid.width() as usize * 4;
        let row_bytes = (x1 - x0) as usize * 4;
        let src_x = (x0 as i64 - x) as usize * 4;
        let buf: &mut [u8] = &mut self.surface;

        for py in y0..y1 {
            let src_y = (py as i64 - y) as usize;
            let src = src_y * grid_stride + src_x;
            let dst = py as usize * surface_stride + x0 as usize * 4;
            buf[dst..dst + row_bytes].copy_from_slice(&grid.data()[src..src + row_bytes]);
        }
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i64, y: i64) {
        image::imageops::overlay(&mut self.surface, bitmap.image(), x, y);
    }
}
