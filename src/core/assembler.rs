//! Frame sequence assembler - arbitrary-order deliveries in, frozen ordered sequence out
//!
//! **Ordering**: frames are keyed by `FrameKey` in a `BTreeMap`, so the
//! collection is ordered by (primary, sub) at every point. Arrival order
//! (across files or across the tiles of one file) never matters.
//!
//! **Completion**:
//! - Image sequences: once every source file is processed. A file with N
//!   tiles is processed after N tile deliveries (failed tiles included); a
//!   failed file is processed immediately with zero frames.
//! - Video: when the stream reports its end (or its decoder aborts).
//!
//! On completion the frames are drained in order, reversed if requested,
//! and frozen into an `Arc<FrameSequence>`. This happens exactly once.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::entities::{Delivery, Frame, FrameKey, SourceDescriptor};

/// Frozen, ordered frame sequence
#[derive(Debug, Clone, Default)]
pub struct FrameSequence {
    frames: Vec<Frame>,
    frame_count: usize,
}

impl FrameSequence {
    /// Freeze `frames` (already in final order). A declared count of 0 is
    /// replaced by the number of frames.
    pub fn new(frames: Vec<Frame>, declared_frames: usize) -> Self {
        let frame_count = if declared_frames == 0 {
            frames.len()
        } else {
            declared_frames
        };
        Self { frames, frame_count }
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Frames actually decoded
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame count used for scroll mapping (declared or derived)
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn keys(&self) -> Vec<FrameKey> {
        self.frames.iter().map(Frame::key).collect()
    }
}

/// How the assembler decides it is done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionRule {
    /// All `n` source files processed
    SourceCount(usize),
    /// Explicit end-of-stream delivery
    EndOfStream,
}

#[derive(Debug, Clone, Copy, Default)]
struct TileCount {
    seen: u32,
    total: u32,
}

#[derive(Debug)]
pub struct Assembler {
    frames: BTreeMap<FrameKey, Frame>,
    tiles: HashMap<i32, TileCount>,
    finished: BTreeSet<i32>,
    first_primary: i32,
    declared_frames: usize,
    reverse: bool,
    rule: CompletionRule,
    completed: Option<Arc<FrameSequence>>,
}

impl Assembler {
    pub fn new(rule: CompletionRule, first_primary: i32, declared_frames: usize, reverse: bool) -> Self {
        let mut assembler = Self {
            frames: BTreeMap::new(),
            tiles: HashMap::new(),
            finished: BTreeSet::new(),
            first_primary,
            declared_frames,
            reverse,
            rule,
            completed: None,
        };
        // Nothing to wait for
        if rule == CompletionRule::SourceCount(0) {
            assembler.complete();
        }
        assembler
    }

    /// Assembler matching a descriptor's kind
    pub fn for_descriptor(desc: &SourceDescriptor) -> Self {
        if desc.is_video() {
            Self::new(CompletionRule::EndOfStream, 0, desc.num_frames, desc.reverse)
        } else {
            Self::new(
                CompletionRule::SourceCount(desc.num_source_files),
                desc.start_index,
                desc.num_frames,
                desc.reverse,
            )
        }
    }

    /// Apply one delivery. Returns the frozen sequence on the delivery that
    /// completes assembly, `None` otherwise (including after completion).
    pub fn accept(&mut self, delivery: Delivery) -> Option<Arc<FrameSequence>> {
        if self.completed.is_some() {
            warn!("Delivery after sequence completed, ignoring {}", delivery_label(&delivery));
            return None;
        }

        match delivery {
            Delivery::Tile { frame, tiles } => {
                let key = frame.key();
                if self.frames.contains_key(&key) {
                    warn!("Duplicate frame {}, keeping the first", key);
                } else {
                    debug!("Frame {} arrived ({} of {} tiles)", key, self.tile_seen(key.primary) + 1, tiles);
                    self.frames.insert(key, frame);
                }
                self.count_tile(key.primary, tiles);
            }
            Delivery::TileFailed { primary, tiles, .. } => {
                self.count_tile(primary, tiles);
            }
            Delivery::SourceFailed { primary, .. } => {
                self.finish_source(primary);
            }
            Delivery::StreamEnded { .. } => {
                if self.rule == CompletionRule::EndOfStream {
                    self.complete();
                    return self.completed.clone();
                }
                warn!("End of stream delivered to an image sequence, ignoring");
            }
        }

        if let CompletionRule::SourceCount(total) = self.rule
            && self.finished.len() >= total
        {
            self.complete();
            return self.completed.clone();
        }
        None
    }

    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    pub fn sequence(&self) -> Option<&Arc<FrameSequence>> {
        self.completed.as_ref()
    }

    /// Source files processed so far
    pub fn finished_sources(&self) -> usize {
        self.finished.len()
    }

    /// Frames received so far
    pub fn received(&self) -> usize {
        match &self.completed {
            Some(seq) => seq.len(),
            None => self.frames.len(),
        }
    }

    /// First frame of the lowest source once that source is fully processed.
    pub fn first_frame(&self) -> Option<&Frame> {
        if !self.finished.contains(&self.first_primary) {
            return None;
        }
        self.frames
            .range(FrameKey::new(self.first_primary, 0)..=FrameKey::new(self.first_primary, u32::MAX))
            .map(|(_, frame)| frame)
            .next()
    }

    /// Frame that will sit at `index` in the final sequence, if already certain.
    ///
    /// Before completion only the contiguous run of processed sources
    /// starting at the lowest primary index is certain, and nothing is
    /// certain when the sequence will be reversed.
    pub fn settled(&self, index: usize) -> Option<&Frame> {
        if let Some(seq) = &self.completed {
            return seq.get(index);
        }
        if self.reverse {
            return None;
        }

        let mut position = 0usize;
        let mut primary = self.first_primary;
        while self.finished.contains(&primary) {
            let run = self
                .frames
                .range(FrameKey::new(primary, 0)..=FrameKey::new(primary, u32::MAX));
            for (_, frame) in run {
                if position == index {
                    return Some(frame);
                }
                position += 1;
            }
            primary += 1;
        }
        None
    }

    fn tile_seen(&self, primary: i32) -> u32 {
        self.tiles.get(&primary).map(|t| t.seen).unwrap_or(0)
    }

    fn count_tile(&mut self, primary: i32, tiles: u32) {
        let count = self.tiles.entry(primary).or_default();
        count.seen += 1;
        count.total = tiles;
        if count.seen >= count.total {
            self.finish_source(primary);
        }
    }

    fn finish_source(&mut self, primary: i32) {
        if self.finished.insert(primary) {
            debug!("Source {} processed ({} total)", primary, self.finished.len());
        }
    }

    fn complete(&mut self) {
        let mut frames: Vec<Frame> = std::mem::take(&mut self.frames).into_values().collect();
        if self.reverse {
            frames.reverse();
        }
        let sequence = FrameSequence::new(frames, self.declared_frames);
        info!(
            "Frame sequence complete: {} frames, frame count {}",
            sequence.len(),
            sequence.frame_count()
        );
        self.completed = Some(Arc::new(sequence));
    }
}

fn delivery_label(delivery: &Delivery) -> String {
    match delivery {
        Delivery::Tile { frame, .. } => format!("tile {}", frame.key()),
        Delivery::TileFailed { primary, .. } => format!("failed tile of {}", primary),
        Delivery::SourceFailed { primary, .. } => format!("failed source {}", primary),
        Delivery::StreamEnded { .. } => "end of stream".to_string(),
    }
}
