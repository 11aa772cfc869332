//! Image source loading - fetch, decode, split tiles
//!
//! One job per source file runs on the worker pool:
//! fetch bytes → decode bitmap → either deliver it as a single frame or
//! fan out one crop job per horizontal tile. Every outcome (frame, failed
//! tile, failed file) is reported on the delivery channel so the assembler
//! can count the file as processed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use log::{debug, error, trace};

use super::frame::{Bitmap, Delivery, Frame, FrameError, FrameKey, FrameResult, Renderable};
use super::manifest::SourceDescriptor;
use super::traits::{Fetcher, ImageCodec, WorkerPool};

/// Extensions accepted as a one-token file list shorthand
const SHORTHAND_EXTENSIONS: [&str; 2] = [".png", ".jpg"];

/// Expand `[".png"]` / `[".jpg"]` into `0001.png .. NNNN.png`.
///
/// Any other list is returned unchanged.
pub fn expand_file_names(files: &[String], count: usize) -> Vec<String> {
    match files {
        [ext] if SHORTHAND_EXTENSIONS.contains(&ext.as_str()) => {
            (1..=count).map(|i| format!("{:04}{}", i, ext)).collect()
        }
        _ => files.to_vec(),
    }
}

/// Reads `file://` URLs and plain paths from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFetcher;

impl Fetcher for FsFetcher {
    fn fetch(&self, url: &str) -> FrameResult<Vec<u8>> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        trace!("Reading {}", path);
        std::fs::read(path).map_err(|e| FrameError::fetch(url, e))
    }
}

/// Pre-fetched payloads keyed by URL, with a log of every request.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.files.insert(url.into(), bytes);
        self
    }

    /// URLs requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> FrameResult<Vec<u8>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| FrameError::fetch(url, "not found"))
    }
}

/// `image` crate backed decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> FrameResult<Bitmap> {
        let img = image::load_from_memory(bytes).map_err(|e| FrameError::decode(e.to_string()))?;
        Ok(Bitmap::from_image(img.to_rgba8()))
    }

    fn crop(&self, source: &Bitmap, x: u32, y: u32, w: u32, h: u32) -> FrameResult<Bitmap> {
        if x >= source.width() || y >= source.height() {
            return Err(FrameError::decode(format!(
                "crop origin ({}, {}) outside {}x{} bitmap",
                x,
                y,
                source.width(),
                source.height()
            )));
        }
        let tile = image::imageops::crop_imm(source.image(), x, y, w, h).to_image();
        Ok(Bitmap::from_image(tile))
    }
}

/// Collaborators an image job needs
#[derive(Clone)]
pub struct LoadContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub codec: Arc<dyn ImageCodec>,
    pub pool: Arc<dyn WorkerPool>,
}

/// One source file to fetch and decode
#[derive(Debug, Clone)]
pub struct ImageJob {
    pub url: String,
    pub primary: i32,
    pub frame_size: (u32, u32),
}

/// Image loader for numbered (optionally tiled) image sequences
pub struct Loader;

impl Loader {
    /// Number of horizontal tiles in an image `natural_width` wide.
    ///
    /// Errors when the width is not a whole multiple of the frame width.
    pub fn tile_count(natural_width: u32, frame_width: u32) -> FrameResult<u32> {
        if natural_width == 0 || frame_width == 0 || natural_width % frame_width != 0 {
            return Err(FrameError::SizeMismatch {
                natural: natural_width,
                declared: frame_width,
            });
        }
        Ok(natural_width / frame_width)
    }

    /// Enqueue one job per source file. Returns the number of jobs.
    pub fn spawn_image_sequence(desc: &SourceDescriptor, ctx: &LoadContext, tx: &Sender<Delivery>) -> usize {
        for (pos, file) in desc.files.iter().enumerate() {
            let job = ImageJob {
                url: desc.url_of(file),
                primary: desc.start_index + pos as i32,
                frame_size: desc.frame_size,
            };
            let ctx_job = ctx.clone();
            let tx = tx.clone();
            ctx.pool
                .execute(Box::new(move || Self::load_source(job, ctx_job, tx)));
        }
        debug!("Queued {} image sources from {}", desc.files.len(), desc.base_url);
        desc.files.len()
    }

    /// Fetch, decode and deliver one source file (runs on a worker).
    pub fn load_source(job: ImageJob, ctx: LoadContext, tx: Sender<Delivery>) {
        let ImageJob {
            url,
            primary,
            frame_size: (frame_w, frame_h),
        } = job;

        let decoded = ctx
            .fetcher
            .fetch(&url)
            .and_then(|bytes| ctx.codec.decode(&bytes));
        let bitmap = match decoded {
            Ok(bitmap) => bitmap,
            Err(error) => {
                error!("Failed to load {}: {}", url, error);
                let _ = tx.send(Delivery::SourceFailed { primary, error });
                return;
            }
        };

        let tiles = match Self::tile_count(bitmap.width(), frame_w) {
            Ok(tiles) => tiles,
            Err(error) => {
                error!("{}: {}", url, error);
                let _ = tx.send(Delivery::SourceFailed { primary, error });
                return;
            }
        };

        if tiles == 1 {
            debug!("Loaded {} as frame {}", url, primary);
            let frame = Frame::new(FrameKey::new(primary, 1), Renderable::Bitmap(bitmap));
            let _ = tx.send(Delivery::Tile { frame, tiles });
            return;
        }

        debug!("Loaded {}: splitting into {} tiles", url, tiles);
        for t in 0..tiles {
            let codec = Arc::clone(&ctx.codec);
            let source = bitmap.clone();
            let tx = tx.clone();
            let url = url.clone();
            ctx.pool.execute(Box::new(move || {
                let sub = t + 1;
                let delivery = match codec.crop(&source, t * frame_w, 0, frame_w, frame_h) {
                    Ok(tile) => Delivery::Tile {
                        frame: Frame::new(FrameKey::new(primary, sub), Renderable::Bitmap(tile)),
                        tiles,
                    },
                    Err(error) => {
                        error!("{}: tile {} of {}: {}", url, sub, tiles, error);
                        Delivery::TileFailed { primary, tiles, error }
                    }
                };
                let _ = tx.send(delivery);
            }));
        }
    }
}
