//! Renderer - clear the canvas, then blit one frame

use crate::entities::{Canvas, Renderable};

/// Clear the full canvas and draw `frame` at the origin, if any.
pub fn draw_frame(canvas: &mut dyn Canvas, frame: Option<&Renderable>) {
    clear_frame(canvas);
    match frame {
        Some(Renderable::PixelGrid(grid)) => canvas.put_pixel_grid(grid, 0, 0),
        Some(Renderable::Bitmap(bitmap)) => canvas.draw_bitmap(bitmap, 0, 0),
        None => {}
    }
}

pub fn clear_frame(canvas: &mut dyn Canvas) {
    let (w, h) = canvas.size();
    canvas.clear_rect(0, 0, w, h);
}
