//! Frame types - renderable pixel data tagged with its sequence position
//!
//! A `Frame` is what the assembler orders and the renderer draws:
//! - `FrameKey`: (primary, sub) position, ordered primary-first
//! - `Renderable`: closed set of drawable shapes (raw pixel grid or decoded bitmap)
//! - `Delivery`: what background jobs report back to the assembler
//!
//! Pixel data lives behind `Arc`, so cloning a `Frame` (cache slot, catch-up,
//! first-frame draw) never copies pixels.

use std::sync::Arc;

use image::RgbaImage;

/// Frame loading errors
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("image size does not match imgSize option: natural width {natural} is not a multiple of {declared}")]
    SizeMismatch { natural: u32, declared: u32 },

    #[error("image decode error: {0}")]
    Decode(String),

    #[error("video decoder error: {0}")]
    Video(String),

    #[error("manifest error: {0}")]
    Manifest(String),
}

pub type FrameResult<T> = Result<T, FrameError>;

impl FrameError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn video(msg: impl Into<String>) -> Self {
        Self::Video(msg.into())
    }

    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }
}

/// Position of a frame within its sequence.
///
/// Field order matters: the derived `Ord` sorts by primary index first and
/// uses the sub-index as tiebreak, which is exactly the sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey {
    /// Source file position (image sequence) or produced-frame count (video)
    pub primary: i32,
    /// 1-based tile position within the source file, 1 if untiled
    pub sub: u32,
}

impl FrameKey {
    pub fn new(primary: i32, sub: u32) -> Self {
        Self { primary, sub }
    }
}

impl std::fmt::Display for FrameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.primary, self.sub)
    }
}

/// Raw RGBA8 pixels, copied verbatim onto the canvas (no compositing).
#[derive(Debug, Clone)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    data: Arc<Vec<u8>>,
}

impl PixelGrid {
    /// Wrap an RGBA8 buffer; the length must be exactly `width * height * 4`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> FrameResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(FrameError::decode(format!(
                "pixel grid {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data: Arc::new(data),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Decoded image, alpha-composited onto the canvas.
#[derive(Debug, Clone)]
pub struct Bitmap(Arc<RgbaImage>);

impl Bitmap {
    pub fn from_image(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.0
    }
}

/// Everything the renderer knows how to draw.
#[derive(Debug, Clone)]
pub enum Renderable {
    PixelGrid(PixelGrid),
    Bitmap(Bitmap),
}

impl Renderable {
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            Renderable::PixelGrid(g) => (g.width(), g.height()),
            Renderable::Bitmap(b) => (b.width(), b.height()),
        }
    }

    /// Approximate pixel memory in bytes
    pub fn mem(&self) -> usize {
        let (w, h) = self.resolution();
        w as usize * h as usize * 4
    }
}

/// Single decoded frame with its sequence position
#[derive(Debug, Clone)]
pub struct Frame {
    key: FrameKey,
    image: Renderable,
}

impl Frame {
    pub fn new(key: FrameKey, image: Renderable) -> Self {
        Self { key, image }
    }

    pub fn key(&self) -> FrameKey {
        self.key
    }

    pub fn primary(&self) -> i32 {
        self.key.primary
    }

    pub fn sub(&self) -> u32 {
        self.key.sub
    }

    pub fn image(&self) -> &Renderable {
        &self.image
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.image.resolution()
    }

    pub fn mem(&self) -> usize {
        self.image.mem()
    }
}

/// Completion message sent from a background job to the assembler.
#[derive(Debug)]
pub enum Delivery {
    /// One decoded tile of a source file; untiled files deliver a single tile of 1.
    Tile { frame: Frame, tiles: u32 },
    /// A tile that could not be produced. Still counts toward its source's total.
    TileFailed {
        primary: i32,
        tiles: u32,
        error: FrameError,
    },
    /// A whole source file produced nothing.
    SourceFailed { primary: i32, error: FrameError },
    /// The video stream is done; `error` is set when the decoder aborted it.
    StreamEnded { error: Option<FrameError> },
}
