//! Animation manifest (`animation.json`) and the validated source descriptor.
//!
//! The manifest is a JSON array; the first entry describes the animation.
//! `SourceDescriptor::from_entry` resolves file-name shorthand, picks the
//! source kind and checks everything the loaders rely on.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::frame::{FrameError, FrameResult};
use super::loader::expand_file_names;
use super::traits::Fetcher;

/// Largest decoder description accepted, in bytes
pub const MAX_DESCRIPTION_BYTES: usize = 64 * 1024;

/// One chunk of an encoded video payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpec {
    pub offset: usize,
    pub size: usize,
}

/// Codec configuration as written by the manifest producer.
///
/// `description` arrives as a sparse object keyed by byte position
/// (`{"0": 1, "1": 100, ...}`); unknown keys are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoderConfig {
    pub codec: String,
    #[serde(default)]
    pub coded_width: Option<u32>,
    #[serde(default)]
    pub coded_height: Option<u32>,
    #[serde(default)]
    pub description: BTreeMap<String, u8>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DecoderConfig {
    /// Rebuild the dense description buffer; gaps are zero-filled.
    pub fn dense_description(&self) -> FrameResult<Vec<u8>> {
        let mut positioned = Vec::with_capacity(self.description.len());
        for (key, byte) in &self.description {
            let pos: usize = key.trim().parse().map_err(|_| {
                FrameError::manifest(format!("description key '{}' is not a byte position", key))
            })?;
            if pos >= MAX_DESCRIPTION_BYTES {
                return Err(FrameError::manifest(format!(
                    "description position {} exceeds {} bytes",
                    pos, MAX_DESCRIPTION_BYTES
                )));
            }
            positioned.push((pos, *byte));
        }

        let len = positioned.iter().map(|(pos, _)| pos + 1).max().unwrap_or(0);
        let mut dense = vec![0u8; len];
        for (pos, byte) in positioned {
            dense[pos] = byte;
        }
        Ok(dense)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    pub decoder_config: DecoderConfig,
    #[serde(default)]
    pub chunks: Vec<ChunkSpec>,
}

/// One animation as described in `animation.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub img_size: [u32; 2],
    #[serde(default)]
    pub num_frames: Option<usize>,
    #[serde(default)]
    pub num_source_files: usize,
    pub files: Vec<String>,
    #[serde(default)]
    pub range: Option<[i32; 2]>,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub video_config: Option<VideoConfig>,
}

/// Parsed `animation.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn from_json(text: &str) -> FrameResult<Self> {
        serde_json::from_str(text).map_err(|e| FrameError::manifest(e.to_string()))
    }

    /// URL of the manifest for `animation_id` under `host`
    pub fn url(host: &str, animation_id: &str) -> String {
        format!("{}/{}/animation.json", host.trim_end_matches('/'), animation_id)
    }

    /// Base URL image/video file names are appended to
    pub fn base_url(host: &str, animation_id: &str) -> String {
        format!("{}/{}/", host.trim_end_matches('/'), animation_id)
    }

    /// Fetch and parse `{host}/{animation_id}/animation.json`, then build the
    /// descriptor of its first entry.
    pub fn fetch_descriptor(
        fetcher: &dyn Fetcher,
        host: &str,
        animation_id: &str,
    ) -> FrameResult<SourceDescriptor> {
        let url = Self::url(host, animation_id);
        let bytes = fetcher.fetch(&url)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| FrameError::manifest(format!("{} is not UTF-8: {}", url, e)))?;
        let manifest = Self::from_json(&text)?;
        let entry = manifest
            .entries
            .into_iter()
            .next()
            .ok_or_else(|| FrameError::manifest(format!("{} has no animation entries", url)))?;
        debug!("Manifest {}: {:?}", url, entry);
        SourceDescriptor::from_entry(entry, Self::base_url(host, animation_id))
    }
}

/// Video payload settings resolved from `VideoConfig`
#[derive(Debug, Clone)]
pub struct VideoSource {
    pub setup: DecoderSetup,
    pub chunks: Vec<ChunkSpec>,
}

/// What the incremental decoder is configured with
#[derive(Debug, Clone, Default)]
pub struct DecoderSetup {
    pub codec: String,
    pub coded_width: Option<u32>,
    pub coded_height: Option<u32>,
    pub description: Vec<u8>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DecoderSetup {
    pub fn from_config(config: &DecoderConfig) -> FrameResult<Self> {
        Ok(Self {
            codec: config.codec.clone(),
            coded_width: config.coded_width,
            coded_height: config.coded_height,
            description: config.dense_description()?,
            extra: config.extra.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum SourceKind {
    ImageSequence,
    Video(VideoSource),
}

/// Validated description of where frames come from
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// Cache identifier; `None` disables sharing
    pub id: Option<String>,
    pub base_url: String,
    pub files: Vec<String>,
    pub num_source_files: usize,
    /// Declared frame count, 0 = derive from decoded frames
    pub num_frames: usize,
    pub frame_size: (u32, u32),
    /// Primary index of the first file
    pub start_index: i32,
    pub reverse: bool,
    pub kind: SourceKind,
}

impl SourceDescriptor {
    pub fn from_entry(entry: ManifestEntry, base_url: impl Into<String>) -> FrameResult<Self> {
        let [width, height] = entry.img_size;
        if width == 0 || height == 0 {
            return Err(FrameError::manifest(format!(
                "imgSize must be non-zero, got {}x{}",
                width, height
            )));
        }

        let files = expand_file_names(&entry.files, entry.num_source_files);
        let kind = if files.len() == 1 && files[0].ends_with(".mp4") {
            let config = entry.video_config.as_ref().ok_or_else(|| {
                FrameError::manifest(format!("{} needs a videoConfig", files[0]))
            })?;
            SourceKind::Video(VideoSource {
                setup: DecoderSetup::from_config(&config.decoder_config)?,
                chunks: config.chunks.clone(),
            })
        } else {
            SourceKind::ImageSequence
        };

        Ok(Self {
            id: entry.id.filter(|id| !id.is_empty()),
            base_url: base_url.into(),
            num_source_files: files.len(),
            files,
            num_frames: entry.num_frames.unwrap_or(0),
            frame_size: (width, height),
            start_index: entry.range.map(|r| r[0]).unwrap_or(1),
            reverse: entry.reverse,
            kind,
        })
    }

    /// Image sequence descriptor without going through JSON
    pub fn image_sequence(base_url: impl Into<String>, files: Vec<String>, frame_size: (u32, u32)) -> Self {
        Self {
            id: None,
            base_url: base_url.into(),
            num_source_files: files.len(),
            files,
            num_frames: 0,
            frame_size,
            start_index: 1,
            reverse: false,
            kind: SourceKind::ImageSequence,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_num_frames(mut self, num_frames: usize) -> Self {
        self.num_frames = num_frames;
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, SourceKind::Video(_))
    }

    pub fn url_of(&self, file: &str) -> String {
        format!("{}{}", self.base_url, file)
    }
}
