//! Muxing engine contract and the built-in live WebM segment writer.
//!
//! The session never interprets container bytes itself. Everything it needs
//! from a container library is expressed by [`MuxingEngine`]; the sink is
//! lent to the engine for the duration of each call that may produce output.

use uuid::Uuid;

use crate::{
    config::{AudioConfig, VideoCodec, VideoConfig},
    ebml,
    writer::{MkvWriter, SinkError},
};

/// Nanoseconds per timecode tick: all timestamps are milliseconds.
pub const TIMECODE_SCALE: u64 = 1_000_000;

/// libwebm only hands out track numbers in [1, 126].
pub const MAX_TRACKS: usize = 126;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSettings {
    pub timecode_scale: u64,
    /// Cut a new cluster once this many milliseconds have elapsed in the
    /// current one. `None` leaves cluster cuts to keyframes.
    pub max_cluster_duration: Option<u64>,
    pub muxing_app: String,
    pub writing_app: String,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            timecode_scale: TIMECODE_SCALE,
            max_cluster_duration: None,
            muxing_app: concat!("webm-mux-", env!("CARGO_PKG_VERSION")).to_string(),
            writing_app: "webmlive".to_string(),
        }
    }
}

/// A frame as handed to the engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineFrame<'a> {
    pub track: u64,
    pub data: &'a [u8],
    // milliseconds
    pub timestamp: i64,
    pub is_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("segment not initialized")]
    NotInitialized,
    #[error("segment already initialized")]
    AlreadyInitialized,
    #[error("segment already finalized")]
    Finalized,
    #[error("unknown track {0}")]
    UnknownTrack(u64),
    #[error("negative timestamp {0}")]
    NegativeTimestamp(i64),
    #[error("timestamp {timestamp} precedes cluster timecode {cluster}")]
    TimestampBeforeCluster { timestamp: u64, cluster: u64 },
}

/// Capabilities the session needs from a container muxing library.
pub trait MuxingEngine {
    /// Prepares a fresh segment. Called once, before anything else.
    fn init(
        &mut self,
        sink: &mut dyn MkvWriter,
        settings: &SegmentSettings,
    ) -> Result<(), EngineError>;

    /// Registers a video track and returns its track number, or `None` if
    /// the engine refuses the track.
    fn add_video_track(&mut self, config: &VideoConfig) -> Option<u64>;

    /// Registers an audio track with its CodecPrivate payload.
    fn add_audio_track(&mut self, config: &AudioConfig, codec_private: &[u8]) -> Option<u64>;

    fn add_frame(
        &mut self,
        sink: &mut dyn MkvWriter,
        frame: &EngineFrame<'_>,
    ) -> Result<(), EngineError>;

    /// Flushes everything still held by the engine.
    fn finalize(&mut self, sink: &mut dyn MkvWriter) -> Result<(), EngineError>;
}

#[derive(Debug)]
enum TrackInfo {
    Video {
        codec: VideoCodec,
        width: u32,
        height: u32,
        // nanoseconds, 0 when the frame rate is unknown
        default_duration: u64,
    },
    Audio {
        codec_id: &'static str,
        sample_rate: u32,
        channels: u16,
        bit_depth: u16,
        codec_private: Vec<u8>,
    },
}

#[derive(Debug)]
struct TrackEntry {
    number: u64,
    uid: u64,
    info: TrackInfo,
}

impl TrackEntry {
    fn is_video(&self) -> bool {
        matches!(self.info, TrackInfo::Video { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct ClusterState {
    timecode: u64,
    blocks: u64,
}

/// Pure-Rust live WebM writer.
///
/// Every element whose size depends on later data (Segment, Cluster) is
/// written with the unknown size marker, so nothing is ever rewritten and
/// the sink never needs to seek.
#[derive(Debug, Default)]
pub struct LiveSegment {
    settings: Option<SegmentSettings>,
    tracks: Vec<TrackEntry>,
    header_written: bool,
    cluster: Option<ClusterState>,
    finalized: bool,
}

impl LiveSegment {
    pub fn new() -> Self {
        Self::default()
    }

    fn can_add_track(&self) -> bool {
        !self.header_written && !self.finalized && self.tracks.len() < MAX_TRACKS
    }

    fn push_track(&mut self, info: TrackInfo) -> u64 {
        let number = self.tracks.len() as u64 + 1;
        let (uid, _) = Uuid::new_v4().as_u64_pair();
        self.tracks.push(TrackEntry {
            number,
            uid: uid.max(1),
            info,
        });
        number
    }

    fn write_header(&mut self, sink: &mut dyn MkvWriter) -> Result<(), EngineError> {
        let settings = self.settings.as_ref().ok_or(EngineError::NotInitialized)?;
        let mut children = Vec::new();
        ebml::write_uint(&mut children, ebml::EBML_VERSION, 1);
        ebml::write_uint(&mut children, ebml::EBML_READ_VERSION, 1);
        ebml::write_uint(&mut children, ebml::EBML_MAX_ID_LENGTH, 4);
        ebml::write_uint(&mut children, ebml::EBML_MAX_SIZE_LENGTH, 8);
        ebml::write_string(&mut children, ebml::DOC_TYPE, "webm");
        ebml::write_uint(&mut children, ebml::DOC_TYPE_VERSION, 4);
        ebml::write_uint(&mut children, ebml::DOC_TYPE_READ_VERSION, 2);
        let mut header = Vec::new();
        ebml::write_master(&mut header, ebml::EBML, &children);
        sink.element_start_notify(ebml::EBML, sink.position());
        sink.write(&header)?;

        let mut segment = Vec::new();
        ebml::write_id(&mut segment, ebml::SEGMENT);
        ebml::write_unknown_size(&mut segment);
        sink.element_start_notify(ebml::SEGMENT, sink.position());
        sink.write(&segment)?;

        let mut children = Vec::new();
        ebml::write_uint(&mut children, ebml::TIMECODE_SCALE, settings.timecode_scale);
        ebml::write_string(&mut children, ebml::MUXING_APP, &settings.muxing_app);
        ebml::write_string(&mut children, ebml::WRITING_APP, &settings.writing_app);
        let mut info = Vec::new();
        ebml::write_master(&mut info, ebml::INFO, &children);
        sink.element_start_notify(ebml::INFO, sink.position());
        sink.write(&info)?;

        let mut entries = Vec::new();
        for track in &self.tracks {
            write_track_entry(&mut entries, track);
        }
        let mut tracks = Vec::new();
        ebml::write_master(&mut tracks, ebml::TRACKS, &entries);
        sink.element_start_notify(ebml::TRACKS, sink.position());
        sink.write(&tracks)?;

        self.header_written = true;
        log::debug!("segment header written with {} tracks", self.tracks.len());
        Ok(())
    }

    fn needs_new_cluster(
        &self,
        is_video: bool,
        timestamp: u64,
        is_key: bool,
        max: Option<u64>,
    ) -> bool {
        let Some(cluster) = self.cluster else {
            return true;
        };
        let elapsed = timestamp - cluster.timecode;
        if elapsed > i16::MAX as u64 {
            return true;
        }
        if cluster.blocks > 0 && is_key && is_video {
            return true;
        }
        matches!(max, Some(max) if max > 0 && elapsed >= max)
    }

    fn start_cluster(
        &mut self,
        sink: &mut dyn MkvWriter,
        timecode: u64,
    ) -> Result<(), EngineError> {
        sink.element_start_notify(ebml::CLUSTER, sink.position());
        let mut header = Vec::new();
        ebml::write_id(&mut header, ebml::CLUSTER);
        ebml::write_unknown_size(&mut header);
        ebml::write_uint(&mut header, ebml::TIMECODE, timecode);
        sink.write(&header)?;
        self.cluster = Some(ClusterState {
            timecode,
            blocks: 0,
        });
        log::trace!("cluster started at {}ms", timecode);
        Ok(())
    }
}

fn frame_duration_ns(frame_rate: f64) -> u64 {
    if frame_rate.is_finite() && frame_rate > 0.0 {
        (1e9 / frame_rate).round() as u64
    } else {
        0
    }
}

fn write_track_entry(buf: &mut Vec<u8>, track: &TrackEntry) {
    let mut entry = Vec::new();
    ebml::write_uint(&mut entry, ebml::TRACK_NUMBER, track.number);
    ebml::write_uint(&mut entry, ebml::TRACK_UID, track.uid);
    match &track.info {
        TrackInfo::Video {
            codec,
            width,
            height,
            default_duration,
        } => {
            ebml::write_uint(&mut entry, ebml::TRACK_TYPE, ebml::TRACK_TYPE_VIDEO);
            ebml::write_string(&mut entry, ebml::CODEC_ID, codec.codec_id());
            if *default_duration > 0 {
                ebml::write_uint(&mut entry, ebml::DEFAULT_DURATION, *default_duration);
            }
            let mut video = Vec::new();
            ebml::write_uint(&mut video, ebml::PIXEL_WIDTH, *width as u64);
            ebml::write_uint(&mut video, ebml::PIXEL_HEIGHT, *height as u64);
            ebml::write_master(&mut entry, ebml::VIDEO, &video);
        }
        TrackInfo::Audio {
            codec_id,
            sample_rate,
            channels,
            bit_depth,
            codec_private,
        } => {
            ebml::write_uint(&mut entry, ebml::TRACK_TYPE, ebml::TRACK_TYPE_AUDIO);
            ebml::write_string(&mut entry, ebml::CODEC_ID, codec_id);
            ebml::write_binary(&mut entry, ebml::CODEC_PRIVATE, codec_private);
            let mut audio = Vec::new();
            ebml::write_float(&mut audio, ebml::SAMPLING_FREQUENCY, *sample_rate as f64);
            ebml::write_uint(&mut audio, ebml::CHANNELS, *channels as u64);
            if *bit_depth > 0 {
                ebml::write_uint(&mut audio, ebml::BIT_DEPTH, *bit_depth as u64);
            }
            ebml::write_master(&mut entry, ebml::AUDIO, &audio);
        }
    }
    ebml::write_master(buf, ebml::TRACK_ENTRY, &entry);
}

impl MuxingEngine for LiveSegment {
    fn init(
        &mut self,
        _sink: &mut dyn MkvWriter,
        settings: &SegmentSettings,
    ) -> Result<(), EngineError> {
        if self.settings.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn add_video_track(&mut self, config: &VideoConfig) -> Option<u64> {
        if !self.can_add_track() || config.width == 0 || config.height == 0 {
            return None;
        }
        Some(self.push_track(TrackInfo::Video {
            codec: config.codec,
            width: config.width,
            height: config.height,
            default_duration: frame_duration_ns(config.frame_rate),
        }))
    }

    fn add_audio_track(&mut self, config: &AudioConfig, codec_private: &[u8]) -> Option<u64> {
        if !self.can_add_track()
            || config.sample_rate == 0
            || config.channels == 0
            || codec_private.is_empty()
        {
            return None;
        }
        Some(self.push_track(TrackInfo::Audio {
            codec_id: config.codec_id(),
            sample_rate: config.sample_rate,
            channels: config.channels,
            bit_depth: config.bits_per_sample,
            codec_private: codec_private.to_vec(),
        }))
    }

    fn add_frame(
        &mut self,
        sink: &mut dyn MkvWriter,
        frame: &EngineFrame<'_>,
    ) -> Result<(), EngineError> {
        if self.finalized {
            return Err(EngineError::Finalized);
        }
        let max_cluster_duration = self
            .settings
            .as_ref()
            .ok_or(EngineError::NotInitialized)?
            .max_cluster_duration;
        let (number, is_video) = self
            .tracks
            .iter()
            .find(|t| t.number == frame.track)
            .map(|t| (t.number, t.is_video()))
            .ok_or(EngineError::UnknownTrack(frame.track))?;
        if frame.timestamp < 0 {
            return Err(EngineError::NegativeTimestamp(frame.timestamp));
        }
        let timestamp = frame.timestamp as u64;
        if let Some(cluster) = self.cluster {
            if timestamp < cluster.timecode {
                return Err(EngineError::TimestampBeforeCluster {
                    timestamp,
                    cluster: cluster.timecode,
                });
            }
        }

        if !self.header_written {
            self.write_header(sink)?;
        }
        if self.needs_new_cluster(is_video, timestamp, frame.is_key, max_cluster_duration) {
            self.start_cluster(sink, timestamp)?;
        }
        let Some(cluster) = self.cluster.as_mut() else {
            return Err(EngineError::NotInitialized);
        };
        let relative = (timestamp - cluster.timecode) as i16;

        // track number vint, relative timecode, flags
        let mut block = Vec::with_capacity(16);
        ebml::write_id(&mut block, ebml::SIMPLE_BLOCK);
        ebml::write_size(&mut block, 1 + 2 + 1 + frame.data.len() as u64);
        ebml::write_size(&mut block, number);
        block.extend_from_slice(&relative.to_be_bytes());
        let keyframe = frame.is_key || !is_video;
        block.push(if keyframe { 0x80 } else { 0x00 });
        sink.write(&block)?;
        sink.write(frame.data)?;
        cluster.blocks += 1;
        Ok(())
    }

    fn finalize(&mut self, sink: &mut dyn MkvWriter) -> Result<(), EngineError> {
        if self.finalized {
            return Err(EngineError::Finalized);
        }
        if self.settings.is_none() {
            return Err(EngineError::NotInitialized);
        }
        if !self.header_written && !self.tracks.is_empty() {
            self.write_header(sink)?;
        }
        self.finalized = true;
        log::debug!("segment finalized");
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
