//! Entities module - frame data, sources and the collaborator interfaces
//!
//! Everything here is independent of the controller:
//! - `frame`: frame keys, renderable pixel data, job deliveries
//! - `manifest`: `animation.json` and the validated `SourceDescriptor`
//! - `loader` / `loader_video`: background fetch + decode jobs
//! - `canvas`: software drawing surface
//! - `traits`: fetcher, codec, canvas and worker pool interfaces

pub mod canvas;
pub mod frame;
pub mod loader;
pub mod loader_video;
pub mod manifest;
pub mod traits;

pub use canvas::RasterCanvas;
pub use frame::{Bitmap, Delivery, Frame, FrameError, FrameKey, FrameResult, PixelGrid, Renderable};
pub use loader::{FsFetcher, ImageCrateCodec, LoadContext, Loader, MemoryFetcher};
pub use loader_video::{RawRgbaDecoder, VideoDecoder, VideoDecoderFactory};
pub use manifest::{Manifest, ManifestEntry, SourceDescriptor, SourceKind};
pub use traits::{Canvas, Fetcher, ImageCodec, WorkerPool};
