//! Animation controller - one canvas, one frame source, scroll-driven drawing
//!
//! Lifecycle: `Loading` → `Loaded`, never back.
//!
//! - Construction sizes the canvas, claims the cache slot and (as owner)
//!   queues the loader jobs on the worker pool.
//! - The host loop calls `pump()` / `on_refresh()` / `render_on_scroll()`.
//!   Deliveries are applied here, on the controller's thread; jobs never
//!   touch controller state.
//! - While loading only settled frames are drawn. On completion the
//!   sequence is published to the cache and catch-up starts at frame 0.
//! - An attached controller whose owner is dropped unpublished claims the
//!   id again and loads it itself if it wins.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};
use log::{debug, info, trace, warn};

use super::assembler::{Assembler, FrameSequence};
use super::global_cache::{AnimationCache, CacheSlot, SlotClaim, SlotOwner};
use super::mapper::{ScrollRegion, frame_index};
use super::renderer;
use crate::entities::loader_video::{VideoJob, spawn_video};
use crate::entities::{
    Canvas, Delivery, Fetcher, Frame, FrameError, FrameKey, ImageCodec, ImageCrateCodec, LoadContext, Loader,
    RawRgbaDecoder, SourceDescriptor, VideoDecoderFactory, WorkerPool,
};

/// Collaborators shared by every controller of a host
#[derive(Clone)]
pub struct Services {
    pub fetcher: Arc<dyn Fetcher>,
    pub codec: Arc<dyn ImageCodec>,
    pub video: VideoDecoderFactory,
    pub pool: Arc<dyn WorkerPool>,
    pub cache: Arc<AnimationCache>,
}

impl Services {
    /// `image`-crate codec, raw RGBA video decoder, process-wide cache
    pub fn new(fetcher: Arc<dyn Fetcher>, pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            fetcher,
            codec: Arc::new(ImageCrateCodec),
            video: RawRgbaDecoder::factory(),
            pool,
            cache: AnimationCache::global(),
        }
    }

    pub fn with_video_decoder(mut self, factory: VideoDecoderFactory) -> Self {
        self.video = factory;
        self
    }

    pub fn with_cache(mut self, cache: Arc<AnimationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn load_context(&self) -> LoadContext {
        LoadContext {
            fetcher: Arc::clone(&self.fetcher),
            codec: Arc::clone(&self.codec),
            pool: Arc::clone(&self.pool),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
}

/// Where the frames come from until the sequence is frozen
enum SequenceSource {
    /// This controller loads; `slot` is `None` when caching is off
    Owner {
        assembler: Assembler,
        rx: Receiver<Delivery>,
        slot: Option<SlotOwner>,
    },
    /// Another controller loads the same id
    Attached(Arc<CacheSlot>),
    /// Sequence frozen and stored in the controller
    Settled,
}

pub struct AnimationController<C: Canvas, R: ScrollRegion> {
    canvas: C,
    region: R,
    descriptor: SourceDescriptor,
    services: Services,
    source: SequenceSource,
    sequence: Option<Arc<FrameSequence>>,
    shown: Option<FrameKey>,
    first_drawn: bool,
    /// Next catch-up index, `None` when idle
    catch_up: Option<usize>,
}

impl<C: Canvas, R: ScrollRegion> AnimationController<C, R> {
    pub fn new(mut canvas: C, region: R, descriptor: SourceDescriptor, services: &Services) -> Self {
        let (w, h) = descriptor.frame_size;
        canvas.set_size(w, h);

        let claim = descriptor.id.as_deref().map(|id| services.cache.claim(id));
        let source = match claim {
            Some(SlotClaim::Attached(slot)) => {
                debug!("'{}' is loaded by another controller, attaching", slot.id());
                SequenceSource::Attached(slot)
            }
            Some(SlotClaim::Owner(owner)) => Self::start_loading(&descriptor, services, Some(owner)),
            None => Self::start_loading(&descriptor, services, None),
        };

        let mut controller = Self {
            canvas,
            region,
            descriptor,
            services: services.clone(),
            source,
            sequence: None,
            shown: None,
            first_drawn: false,
            catch_up: None,
        };
        controller.pump();
        controller
    }

    fn start_loading(desc: &SourceDescriptor, services: &Services, slot: Option<SlotOwner>) -> SequenceSource {
        let (tx, rx) = crossbeam_channel::unbounded();
        let assembler = Assembler::for_descriptor(desc);

        if desc.is_video() {
            match VideoJob::from_descriptor(desc) {
                Some(job) => spawn_video(
                    job,
                    Arc::clone(&services.fetcher),
                    services.pool.as_ref(),
                    Arc::clone(&services.video),
                    tx,
                ),
                None => {
                    let error = FrameError::video("video source without a file");
                    warn!("{}: {}", desc.base_url, error);
                    let _ = tx.send(Delivery::StreamEnded { error: Some(error) });
                }
            }
        } else {
            Loader::spawn_image_sequence(desc, &services.load_context(), &tx);
        }

        SequenceSource::Owner { assembler, rx, slot }
    }

    /// Apply pending deliveries (owner) or pick up a published sequence
    /// (attached). Draws the first frame as soon as it is certain.
    pub fn pump(&mut self) {
        if let SequenceSource::Attached(slot) = &self.source
            && slot.is_abandoned()
        {
            self.reclaim();
        }

        let completed = match &mut self.source {
            SequenceSource::Owner { assembler, rx, .. } => {
                let mut completed = assembler.sequence().cloned();
                while completed.is_none() {
                    let delivery = match rx.try_recv() {
                        Ok(delivery) => delivery,
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            warn!("All loader jobs gone before the sequence completed");
                            break;
                        }
                    };
                    completed = assembler.accept(delivery);

                    if completed.is_none()
                        && !self.first_drawn
                        && let Some(frame) = assembler.first_frame()
                    {
                        trace!("First frame {} ready", frame.key());
                        Self::show(&mut self.canvas, &mut self.shown, frame);
                        self.first_drawn = true;
                    }
                }
                completed
            }
            SequenceSource::Attached(slot) => slot.sequence(),
            SequenceSource::Settled => None,
        };

        if let Some(sequence) = completed {
            self.complete(sequence);
        }
    }

    /// Claim the id again after the owner abandoned it
    fn reclaim(&mut self) {
        let Some(id) = self.descriptor.id.clone() else {
            return;
        };
        self.source = match self.services.cache.claim(&id) {
            SlotClaim::Owner(owner) => {
                info!("Owner of '{}' went away, loading it here", id);
                Self::start_loading(&self.descriptor, &self.services, Some(owner))
            }
            SlotClaim::Attached(slot) => {
                debug!("'{}' re-claimed by another controller, attaching", id);
                SequenceSource::Attached(slot)
            }
        };
    }

    fn complete(&mut self, sequence: Arc<FrameSequence>) {
        if let SequenceSource::Owner { slot: Some(owner), .. } =
            std::mem::replace(&mut self.source, SequenceSource::Settled)
        {
            owner.publish(Arc::clone(&sequence));
        }

        info!(
            "Animation {} loaded: {} frames",
            self.descriptor.id.as_deref().unwrap_or(&self.descriptor.base_url),
            sequence.len()
        );

        // Catch-up starts at frame 0
        if let Some(frame) = sequence.get(0) {
            if self.shown != Some(frame.key()) {
                Self::show(&mut self.canvas, &mut self.shown, frame);
            }
            self.first_drawn = true;
            self.catch_up = Some(1);
        }
        self.sequence = Some(sequence);
    }

    /// Display refresh tick: advance catch-up by one frame.
    ///
    /// Returns `true` when a frame was drawn.
    pub fn on_refresh(&mut self) -> bool {
        self.pump();
        let (Some(next), Some(sequence)) = (self.catch_up, self.sequence.clone()) else {
            return false;
        };

        let target = frame_index(&self.region.geometry(), sequence.frame_count()).unwrap_or(0);
        match sequence.get(next) {
            Some(frame) if (next as i64) < target => {
                Self::show(&mut self.canvas, &mut self.shown, frame);
                self.catch_up = Some(next + 1);
                true
            }
            _ => {
                trace!("Catch-up finished at {}", next);
                self.catch_up = None;
                false
            }
        }
    }

    /// Block until loaded or `timeout` passes. Returns whether loaded.
    pub fn wait_loaded(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if self.state() == LoadState::Loaded {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Scroll handler: draw the frame under the current scroll position.
    ///
    /// Out-of-range and not-yet-settled indices are ignored and the previous
    /// frame stays. Returns `true` when a frame was drawn.
    pub fn render_on_scroll(&mut self) -> bool {
        self.pump();

        let frame_count = match &self.sequence {
            Some(sequence) => sequence.frame_count(),
            None => self.descriptor.num_frames,
        };
        let Some(index) = frame_index(&self.region.geometry(), frame_count) else {
            return false;
        };
        if index < 0 || index >= frame_count as i64 {
            return false;
        }
        let index = index as usize;

        let frame = match (&self.sequence, &self.source) {
            (Some(sequence), _) => sequence.get(index),
            (None, SequenceSource::Owner { assembler, .. }) => assembler.settled(index),
            _ => None,
        };
        match frame {
            Some(frame) => {
                Self::show(&mut self.canvas, &mut self.shown, frame);
                true
            }
            None => false,
        }
    }

    pub fn clear_frame(&mut self) {
        renderer::clear_frame(&mut self.canvas);
        self.shown = None;
    }

    fn show(canvas: &mut C, shown: &mut Option<FrameKey>, frame: &Frame) {
        renderer::draw_frame(canvas, Some(frame.image()));
        *shown = Some(frame.key());
    }

    pub fn state(&self) -> LoadState {
        if self.sequence.is_some() {
            LoadState::Loaded
        } else {
            LoadState::Loading
        }
    }

    pub fn sequence(&self) -> Option<&Arc<FrameSequence>> {
        self.sequence.as_ref()
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    /// Key of the frame currently on the canvas
    pub fn shown(&self) -> Option<FrameKey> {
        self.shown
    }

    pub fn is_catching_up(&self) -> bool {
        self.catch_up.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapper::SharedRegion;
    use crate::core::workers::Workers;
    use crate::entities::loader_video::{DecodedFrame, EncodedChunk, RAW_RGBA_CODEC};
    use crate::entities::manifest::{ChunkSpec, DecoderSetup, SourceKind, VideoSource};
    use crate::entities::{FrameResult, MemoryFetcher, VideoDecoder};
    use crate::test_support::{CanvasOp, InlinePool, ManualPool, RecordingCanvas, png_bytes, test_region, tiled_png};
    use std::sync::Mutex;

    const BASE: &str = "anim/";

    fn three_files() -> Arc<MemoryFetcher> {
        Arc::new(
            MemoryFetcher::new()
                .with("anim/a.png", png_bytes(2, 2, [1, 0, 0, 255]))
                .with("anim/b.png", png_bytes(2, 2, [2, 0, 0, 255]))
                .with("anim/c.png", png_bytes(2, 2, [3, 0, 0, 255])),
        )
    }

    fn three_file_desc() -> SourceDescriptor {
        SourceDescriptor::image_sequence(BASE, vec!["a.png".into(), "b.png".into(), "c.png".into()], (2, 2))
    }

    fn services(fetcher: Arc<MemoryFetcher>, pool: Arc<dyn WorkerPool>) -> Services {
        Services::new(fetcher, pool).with_cache(Arc::new(AnimationCache::new()))
    }

    fn loaded(
        fetcher: Arc<MemoryFetcher>,
        desc: SourceDescriptor,
        region: SharedRegion,
    ) -> (AnimationController<RecordingCanvas, SharedRegion>, RecordingCanvas) {
        let canvas = RecordingCanvas::default();
        let ctl = AnimationController::new(canvas.clone(), region, desc, &services(fetcher, Arc::new(InlinePool)));
        assert_eq!(ctl.state(), LoadState::Loaded);
        (ctl, canvas)
    }

    #[test]
    fn test_canvas_sized_to_frame() {
        let (_ctl, canvas) = loaded(three_files(), three_file_desc(), test_region());
        assert_eq!(canvas.ops()[0], CanvasOp::Resize(2, 2));
    }

    #[test]
    fn test_files_resolved_in_reverse_order() {
        let pool = ManualPool::default();
        let canvas = RecordingCanvas::default();
        let mut ctl = AnimationController::new(
            canvas.clone(),
            test_region(),
            three_file_desc(),
            &services(three_files(), Arc::new(pool.clone())),
        );
        assert_eq!(pool.pending(), 3);
        assert_eq!(ctl.state(), LoadState::Loading);

        // c, b, a
        pool.run_all_reversed();
        ctl.pump();

        let seq = ctl.sequence().unwrap();
        assert_eq!(seq.keys(), vec![FrameKey::new(1, 1), FrameKey::new(2, 1), FrameKey::new(3, 1)]);
        assert_eq!(seq.frame_count(), 3);
    }

    #[test]
    fn test_single_tiled_file() {
        let fetcher = Arc::new(MemoryFetcher::new().with("anim/strip.png", tiled_png(4, 2, 3)));
        let desc = SourceDescriptor::image_sequence(BASE, vec!["strip.png".into()], (4, 2));
        let (ctl, _) = loaded(fetcher, desc, test_region());

        let seq = ctl.sequence().unwrap();
        assert_eq!(seq.keys(), vec![FrameKey::new(1, 1), FrameKey::new(1, 2), FrameKey::new(1, 3)]);
        assert!(seq.frames().iter().all(|f| f.resolution() == (4, 2)));
    }

    #[test]
    fn test_scroll_draws_mapped_frame() {
        let region = test_region();
        let (mut ctl, canvas) = loaded(three_files(), three_file_desc(), region.clone());

        region.scroll_to(-400.0); // progress 0.5 -> round(1.5) = 2
        assert!(ctl.render_on_scroll());
        assert_eq!(ctl.shown(), Some(FrameKey::new(3, 1)));
        assert_eq!(canvas.draws().last(), Some(&CanvasOp::DrawBitmap([3, 0, 0, 255])));
    }

    #[test]
    fn test_out_of_range_scroll_keeps_frame() {
        let region = test_region();
        let (mut ctl, canvas) = loaded(three_files(), three_file_desc(), region.clone());
        region.scroll_to(-267.0);
        assert!(ctl.render_on_scroll());
        let before = canvas.ops().len();

        region.scroll_to(-800.0); // index 3 == frame count
        assert!(!ctl.render_on_scroll());
        region.scroll_to(300.0); // negative index
        assert!(!ctl.render_on_scroll());

        assert_eq!(canvas.ops().len(), before);
        assert_eq!(ctl.shown(), Some(FrameKey::new(2, 1)));
    }

    #[test]
    fn test_degenerate_geometry_no_draw() {
        let region = test_region();
        let (mut ctl, _) = loaded(three_files(), three_file_desc(), region.clone());
        region.set(crate::core::mapper::ScrollGeometry {
            section_height: 200.0,
            section_top: 0.0,
            canvas_height: 100.0,
            viewport_height: 100.0,
        });
        assert!(!ctl.render_on_scroll());
    }

    #[test]
    fn test_catch_up_walks_to_target() {
        let region = test_region();
        region.scroll_to(-800.0); // target 3
        let (mut ctl, canvas) = loaded(three_files(), three_file_desc(), region);

        assert!(ctl.is_catching_up());
        assert!(ctl.on_refresh());
        assert!(ctl.on_refresh());
        // Index 3 is past the sequence
        assert!(!ctl.on_refresh());
        assert!(!ctl.is_catching_up());

        assert_eq!(
            canvas.draws(),
            vec![
                CanvasOp::DrawBitmap([1, 0, 0, 255]),
                CanvasOp::DrawBitmap([2, 0, 0, 255]),
                CanvasOp::DrawBitmap([3, 0, 0, 255]),
            ]
        );
    }

    #[test]
    fn test_catch_up_stops_at_top() {
        let (mut ctl, canvas) = loaded(three_files(), three_file_desc(), test_region());
        assert!(!ctl.on_refresh());
        assert_eq!(canvas.draws().len(), 1);
    }

    #[test]
    fn test_loading_draws_settled_only() {
        let pool = ManualPool::default();
        let region = test_region();
        let desc = three_file_desc().with_num_frames(3);
        let canvas = RecordingCanvas::default();
        let fetcher = three_files();
        let mut ctl = AnimationController::new(
            canvas.clone(),
            region.clone(),
            desc,
            &services(fetcher, Arc::new(pool.clone())),
        );

        // Only run c.png: nothing settled yet
        assert!(pool.run_newest());
        region.scroll_to(-400.0);
        assert!(!ctl.render_on_scroll());
        assert!(canvas.draws().is_empty());

        // b.png then a.png; a completes the sequence and frame 0 is drawn
        pool.run_all_reversed();
        ctl.pump();
        assert_eq!(ctl.state(), LoadState::Loaded);
        assert_eq!(canvas.draws().first(), Some(&CanvasOp::DrawBitmap([1, 0, 0, 255])));
    }

    fn manual(
        desc: SourceDescriptor,
        region: SharedRegion,
    ) -> (AnimationController<RecordingCanvas, SharedRegion>, RecordingCanvas, ManualPool) {
        let pool = ManualPool::default();
        let canvas = RecordingCanvas::default();
        let ctl = AnimationController::new(
            canvas.clone(),
            region,
            desc,
            &services(three_files(), Arc::new(pool.clone())),
        );
        (ctl, canvas, pool)
    }

    #[test]
    fn test_first_file_drawn_while_loading() {
        let (mut ctl, canvas, pool) = manual(three_file_desc(), test_region());

        assert!(pool.run_oldest());
        ctl.pump();
        assert_eq!(ctl.state(), LoadState::Loading);
        assert_eq!(canvas.draws(), vec![CanvasOp::DrawBitmap([1, 0, 0, 255])]);
        assert_eq!(ctl.shown(), Some(FrameKey::new(1, 1)));

        // Completion leaves the already shown frame 0 alone
        pool.run_all_reversed();
        ctl.pump();
        assert_eq!(ctl.state(), LoadState::Loaded);
        assert_eq!(canvas.draws().len(), 1);
    }

    #[test]
    fn test_loading_scroll_draws_settled_frame() {
        let region = test_region();
        let (mut ctl, canvas, pool) = manual(three_file_desc().with_num_frames(3), region.clone());

        // a and b finished, c pending
        assert!(pool.run_oldest());
        assert!(pool.run_oldest());
        assert_eq!(pool.pending(), 1);

        region.scroll_to(-267.0); // index 1
        assert!(ctl.render_on_scroll());
        assert_eq!(ctl.state(), LoadState::Loading);
        assert_eq!(canvas.draws().last(), Some(&CanvasOp::DrawBitmap([2, 0, 0, 255])));
        assert_eq!(ctl.shown(), Some(FrameKey::new(2, 1)));

        region.scroll_to(-533.0); // index 2, c not loaded
        assert!(!ctl.render_on_scroll());
        assert_eq!(ctl.shown(), Some(FrameKey::new(2, 1)));
    }

    #[test]
    fn test_reverse_catch_up_starts_at_last_file() {
        let region = test_region();
        region.scroll_to(-800.0); // target 3
        let desc = three_file_desc().with_num_frames(3).with_reverse(true);
        let (mut ctl, canvas, pool) = manual(desc, region.clone());

        // Lowest file is drawn on arrival, nothing is settled while reversed
        assert!(pool.run_oldest());
        assert!(pool.run_oldest());
        ctl.pump();
        assert_eq!(canvas.draws(), vec![CanvasOp::DrawBitmap([1, 0, 0, 255])]);
        region.scroll_to(-267.0);
        assert!(!ctl.render_on_scroll());
        region.scroll_to(-800.0);

        pool.run_all_reversed();
        ctl.pump();
        assert_eq!(ctl.state(), LoadState::Loaded);
        let seq = ctl.sequence().unwrap();
        assert_eq!(seq.keys(), vec![FrameKey::new(3, 1), FrameKey::new(2, 1), FrameKey::new(1, 1)]);

        while ctl.on_refresh() {}
        assert_eq!(
            canvas.draws(),
            vec![
                CanvasOp::DrawBitmap([1, 0, 0, 255]),
                CanvasOp::DrawBitmap([3, 0, 0, 255]),
                CanvasOp::DrawBitmap([2, 0, 0, 255]),
                CanvasOp::DrawBitmap([1, 0, 0, 255]),
            ]
        );
    }

    #[test]
    fn test_failed_file_still_completes() {
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with("anim/a.png", png_bytes(2, 2, [1, 0, 0, 255]))
                .with("anim/c.png", png_bytes(2, 2, [3, 0, 0, 255])),
        );
        let (ctl, _) = loaded(fetcher, three_file_desc(), test_region());
        let seq = ctl.sequence().unwrap();
        assert_eq!(seq.keys(), vec![FrameKey::new(1, 1), FrameKey::new(3, 1)]);
        assert_eq!(seq.frame_count(), 2);
    }

    #[test]
    fn test_second_controller_reuses_slot() {
        let fetcher = three_files();
        let svc = services(Arc::clone(&fetcher), Arc::new(InlinePool));
        let desc = three_file_desc().with_id("hero");

        let first = AnimationController::new(RecordingCanvas::default(), test_region(), desc.clone(), &svc);
        assert_eq!(first.state(), LoadState::Loaded);
        let fetched = fetcher.requests().len();
        assert_eq!(fetched, 3);

        let canvas = RecordingCanvas::default();
        let second = AnimationController::new(canvas.clone(), test_region(), desc, &svc);
        assert_eq!(second.state(), LoadState::Loaded);
        assert_eq!(fetcher.requests().len(), fetched);
        assert!(Arc::ptr_eq(first.sequence().unwrap(), second.sequence().unwrap()));
        // Catch-up drew frame 0
        assert_eq!(canvas.draws(), vec![CanvasOp::DrawBitmap([1, 0, 0, 255])]);
    }

    #[test]
    fn test_attached_waits_for_owner() {
        let pool = ManualPool::default();
        let svc = services(three_files(), Arc::new(pool.clone()));
        let desc = three_file_desc().with_id("hero");

        let mut owner = AnimationController::new(RecordingCanvas::default(), test_region(), desc.clone(), &svc);
        let mut attached = AnimationController::new(RecordingCanvas::default(), test_region(), desc, &svc);
        assert_eq!(pool.pending(), 3);

        pool.run_all_reversed();
        attached.pump();
        assert_eq!(attached.state(), LoadState::Loading);

        owner.pump();
        attached.pump();
        assert_eq!(attached.state(), LoadState::Loaded);
    }

    #[test]
    fn test_abandoned_owner_hands_over() {
        let pool = ManualPool::default();
        let fetcher = three_files();
        let svc = services(Arc::clone(&fetcher), Arc::new(pool.clone()));
        let desc = three_file_desc().with_id("hero");

        let owner = AnimationController::new(RecordingCanvas::default(), test_region(), desc.clone(), &svc);
        let canvas = RecordingCanvas::default();
        let mut attached = AnimationController::new(canvas.clone(), test_region(), desc.clone(), &svc);
        drop(owner);

        // Jobs of the dropped owner deliver into a closed channel
        pool.run_all_reversed();
        assert_eq!(fetcher.requests().len(), 3);

        attached.pump();
        assert_eq!(attached.state(), LoadState::Loading);
        assert_eq!(pool.pending(), 3);

        pool.run_all_reversed();
        attached.pump();
        assert_eq!(attached.state(), LoadState::Loaded);
        assert_eq!(canvas.draws(), vec![CanvasOp::DrawBitmap([1, 0, 0, 255])]);

        let mut late = AnimationController::new(RecordingCanvas::default(), test_region(), desc, &svc);
        late.pump();
        assert_eq!(late.state(), LoadState::Loaded);
        assert_eq!(fetcher.requests().len(), 6);
        assert!(Arc::ptr_eq(attached.sequence().unwrap(), late.sequence().unwrap()));
    }

    #[test]
    fn test_empty_file_list_loaded_immediately() {
        let desc = SourceDescriptor::image_sequence(BASE, Vec::new(), (2, 2));
        let (mut ctl, canvas) = loaded(Arc::new(MemoryFetcher::new()), desc, test_region());
        assert!(ctl.sequence().unwrap().is_empty());
        assert!(!ctl.render_on_scroll());
        assert!(canvas.draws().is_empty());
    }

    #[test]
    fn test_clear_frame() {
        let (mut ctl, canvas) = loaded(three_files(), three_file_desc(), test_region());
        ctl.clear_frame();
        assert_eq!(ctl.shown(), None);
        assert_eq!(canvas.ops().last(), Some(&CanvasOp::Clear));
    }

    /// Raw RGBA decoder that blocks before every output after the first
    struct GatedDecoder {
        inner: crate::entities::RawRgbaDecoder,
        gate: Receiver<()>,
        outputs: Arc<Mutex<Vec<u8>>>,
    }

    impl VideoDecoder for GatedDecoder {
        fn configure(&mut self, setup: &DecoderSetup) -> FrameResult<()> {
            self.inner.configure(setup)
        }

        fn decode(&mut self, chunk: EncodedChunk, output: &mut dyn FnMut(DecodedFrame)) -> FrameResult<()> {
            if !self.outputs.lock().unwrap().is_empty() {
                self.gate
                    .recv_timeout(Duration::from_secs(5))
                    .map_err(|e| FrameError::video(e.to_string()))?;
            }
            let marker = chunk.data[0];
            self.inner.decode(chunk, output)?;
            self.outputs.lock().unwrap().push(marker);
            Ok(())
        }

        fn flush(&mut self, output: &mut dyn FnMut(DecodedFrame)) -> FrameResult<()> {
            self.inner.flush(output)
        }

        fn close(&mut self) {
            self.inner.close()
        }
    }

    #[test]
    fn test_video_first_frame_drawn_before_second_output() {
        let payload = vec![10, 0, 0, 255, 20, 0, 0, 255];
        let fetcher = Arc::new(MemoryFetcher::new().with("anim/clip.mp4", payload));
        let desc = SourceDescriptor {
            files: vec!["clip.mp4".into()],
            num_source_files: 1,
            kind: SourceKind::Video(VideoSource {
                setup: DecoderSetup {
                    codec: RAW_RGBA_CODEC.into(),
                    coded_width: Some(1),
                    coded_height: Some(1),
                    ..Default::default()
                },
                chunks: vec![ChunkSpec { offset: 0, size: 4 }, ChunkSpec { offset: 4, size: 4 }],
            }),
            ..SourceDescriptor::image_sequence(BASE, Vec::new(), (1, 1))
        };

        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let outputs = Arc::new(Mutex::new(Vec::new()));
        let factory: VideoDecoderFactory = {
            let outputs = Arc::clone(&outputs);
            Arc::new(move || {
                Box::new(GatedDecoder {
                    inner: crate::entities::RawRgbaDecoder::new(),
                    gate: gate_rx.clone(),
                    outputs: Arc::clone(&outputs),
                }) as Box<dyn VideoDecoder>
            })
        };

        let workers: Arc<dyn WorkerPool> = Arc::new(Workers::new(2).unwrap());
        let svc = services(fetcher, workers).with_video_decoder(factory);
        let canvas = RecordingCanvas::default();
        let mut ctl = AnimationController::new(canvas.clone(), test_region(), desc, &svc);

        let deadline = Instant::now() + Duration::from_secs(5);
        while canvas.draws().is_empty() && Instant::now() < deadline {
            ctl.pump();
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(canvas.draws(), vec![CanvasOp::PutGrid([10, 0, 0, 255])]);
        assert_eq!(*outputs.lock().unwrap(), vec![10]);
        assert_eq!(ctl.state(), LoadState::Loading);

        gate_tx.send(()).unwrap();
        assert!(ctl.wait_loaded(Duration::from_secs(5)));
        assert_eq!(*outputs.lock().unwrap(), vec![10, 20]);
        let seq = ctl.sequence().unwrap();
        assert_eq!(seq.keys(), vec![FrameKey::new(0, 1), FrameKey::new(1, 1)]);
        assert_eq!(seq.frame_count(), 2);
    }
}
