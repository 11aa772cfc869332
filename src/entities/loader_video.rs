//! Video source loading - one payload, chunked, decoded incrementally
//!
//! The payload is fetched once and sliced into encoded chunks according to
//! the manifest's chunk table. Each decoder output becomes one frame whose
//! primary index is the number of frames produced before it. Chunk buffers
//! are moved into the decoder and decoded pixels are moved into the frame,
//! so nothing outlives its use.

use std::sync::Arc;

use crossbeam_channel::Sender;
use log::{debug, error, info};

use super::frame::{Delivery, Frame, FrameError, FrameKey, FrameResult, PixelGrid, Renderable};
use super::manifest::{DecoderSetup, SourceDescriptor, SourceKind, VideoSource};
use super::traits::{Fetcher, WorkerPool};

/// Codec string understood by `RawRgbaDecoder`
pub const RAW_RGBA_CODEC: &str = "raw-rgba";

/// One encoded unit handed to the decoder. Every chunk is a key chunk.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub timestamp: i64,
    pub data: Vec<u8>,
}

/// Decoder output
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    timestamp: i64,
    grid: PixelGrid,
}

impl DecodedFrame {
    pub fn new(timestamp: i64, grid: PixelGrid) -> Self {
        Self { timestamp, grid }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn into_grid(self) -> PixelGrid {
        self.grid
    }
}

/// Stateful incremental video decoder.
///
/// Frames are reported through `output` as they complete; an `Err` from any
/// call aborts the stream.
pub trait VideoDecoder: Send {
    fn configure(&mut self, setup: &DecoderSetup) -> FrameResult<()>;

    fn decode(&mut self, chunk: EncodedChunk, output: &mut dyn FnMut(DecodedFrame)) -> FrameResult<()>;

    /// Emit any buffered frames.
    fn flush(&mut self, output: &mut dyn FnMut(DecodedFrame)) -> FrameResult<()>;

    fn close(&mut self);
}

/// Creates one decoder per stream
pub type VideoDecoderFactory = Arc<dyn Fn() -> Box<dyn VideoDecoder> + Send + Sync>;

/// Decoder for uncompressed RGBA8 streams: every chunk is one full frame.
#[derive(Debug, Default)]
pub struct RawRgbaDecoder {
    size: Option<(u32, u32)>,
    closed: bool,
}

impl RawRgbaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> VideoDecoderFactory {
        Arc::new(|| Box::new(RawRgbaDecoder::new()) as Box<dyn VideoDecoder>)
    }
}

impl VideoDecoder for RawRgbaDecoder {
    fn configure(&mut self, setup: &DecoderSetup) -> FrameResult<()> {
        if setup.codec != RAW_RGBA_CODEC {
            return Err(FrameError::video(format!("unsupported codec '{}'", setup.codec)));
        }
        let (Some(w), Some(h)) = (setup.coded_width, setup.coded_height) else {
            return Err(FrameError::video("codedWidth/codedHeight required"));
        };
        self.size = Some((w, h));
        Ok(())
    }

    fn decode(&mut self, chunk: EncodedChunk, output: &mut dyn FnMut(DecodedFrame)) -> FrameResult<()> {
        if self.closed {
            return Err(FrameError::video("decode after close"));
        }
        let (w, h) = self.size.ok_or_else(|| FrameError::video("decode before configure"))?;
        let grid = PixelGrid::new(w, h, chunk.data).map_err(|e| FrameError::video(e.to_string()))?;
        output(DecodedFrame::new(chunk.timestamp, grid));
        Ok(())
    }

    fn flush(&mut self, _output: &mut dyn FnMut(DecodedFrame)) -> FrameResult<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// The single video file of a descriptor
#[derive(Debug, Clone)]
pub struct VideoJob {
    pub url: String,
    pub source: VideoSource,
}

impl VideoJob {
    pub fn from_descriptor(desc: &SourceDescriptor) -> Option<Self> {
        match (&desc.kind, desc.files.first()) {
            (SourceKind::Video(source), Some(file)) => Some(Self {
                url: desc.url_of(file),
                source: source.clone(),
            }),
            _ => None,
        }
    }
}

/// Queue the whole stream as one job; decoding must stay in chunk order.
pub fn spawn_video(
    job: VideoJob,
    fetcher: Arc<dyn Fetcher>,
    pool: &dyn WorkerPool,
    factory: VideoDecoderFactory,
    tx: Sender<Delivery>,
) {
    pool.execute(Box::new(move || {
        let mut decoder = factory();
        decode_stream(job, fetcher.as_ref(), decoder.as_mut(), &tx);
    }));
}

/// Fetch, decode and deliver a whole stream, always ending with `StreamEnded`.
pub fn decode_stream(job: VideoJob, fetcher: &dyn Fetcher, decoder: &mut dyn VideoDecoder, tx: &Sender<Delivery>) {
    let url = job.url.clone();
    let result = run_stream(job, fetcher, decoder, tx);
    decoder.close();

    let error = match result {
        Ok(produced) => {
            info!("Decoded {} frames from {}", produced, url);
            None
        }
        Err(e) => {
            error!("VideoDecoder error for {}: {}", url, e);
            Some(e)
        }
    };
    let _ = tx.send(Delivery::StreamEnded { error });
}

fn run_stream(
    job: VideoJob,
    fetcher: &dyn Fetcher,
    decoder: &mut dyn VideoDecoder,
    tx: &Sender<Delivery>,
) -> FrameResult<usize> {
    let VideoJob { url, source } = job;
    let payload = fetcher.fetch(&url)?;
    debug!("Fetched {} ({} bytes, {} chunks)", url, payload.len(), source.chunks.len());

    decoder.configure(&source.setup)?;

    let mut produced: i32 = 0;
    let mut output = |decoded: DecodedFrame| {
        let frame = Frame::new(FrameKey::new(produced, 1), Renderable::PixelGrid(decoded.into_grid()));
        produced += 1;
        let _ = tx.send(Delivery::Tile { frame, tiles: 1 });
    };

    for (i, spec) in source.chunks.iter().enumerate() {
        let end = spec
            .offset
            .checked_add(spec.size)
            .filter(|&end| end <= payload.len())
            .ok_or_else(|| {
                FrameError::video(format!(
                    "chunk {} ({}+{}) exceeds payload of {} bytes",
                    i,
                    spec.offset,
                    spec.size,
                    payload.len()
                ))
            })?;
        let chunk = EncodedChunk {
            timestamp: 0,
            data: payload[spec.offset..end].to_vec(),
        };
        decoder.decode(chunk, &mut output)?;
    }
    drop(payload);

    decoder.flush(&mut output)?;
    Ok(produced as usize)
}
