use crate::{
    buffer::{Chunk, ChunkKind},
    config::{AudioConfig, VideoCodec, VideoConfig, VorbisCodecPrivate},
    engine::{
        EngineError, EngineFrame, LiveSegment, MuxingEngine, SegmentSettings, TIMECODE_SCALE,
    },
    error::{MuxError, Result, TrackKind},
    frame::{AudioFrame, VideoFrame},
    tracks::TrackRegistry,
    writer::{MkvWriter, SegmentWriter, SinkError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerState {
    Uninitialized,
    Ready,
    Finalized,
}

/// Live WebM muxing session.
///
/// Produces a stream of self-contained chunks: first one metadata chunk
/// (EBML header, segment info, tracks), then one chunk per cluster.
///
/// - `init` must be called before anything else, exactly once.
/// - Tracks must be added before the first frame is written.
/// - `finalize` must be called at end of stream, or the last cluster is
///   never closed.
/// - Output accumulates until drained; poll `chunk_ready` and drain with
///   `read_chunk` or `take_chunk` to keep memory bounded.
///
/// The session is not reentrant. Share it between threads through
/// [`crate::shared::SharedMuxer`].
pub struct LiveWebmMuxer<E: MuxingEngine = LiveSegment> {
    state: MuxerState,
    engine: E,
    writer: SegmentWriter,
    tracks: TrackRegistry,
    video_codec: Option<VideoCodec>,
    muxer_id: String,
    muxer_time: i64,
    chunks_read: u64,
}

impl LiveWebmMuxer<LiveSegment> {
    pub fn new() -> Self {
        Self::with_engine(LiveSegment::new())
    }
}

impl Default for LiveWebmMuxer<LiveSegment> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: MuxingEngine> LiveWebmMuxer<E> {
    pub fn with_engine(engine: E) -> Self {
        Self {
            state: MuxerState::Uninitialized,
            engine,
            writer: SegmentWriter::new(),
            tracks: TrackRegistry::new(),
            video_codec: None,
            muxer_id: String::new(),
            muxer_time: 0,
            chunks_read: 0,
        }
    }

    /// Prepares the engine for live output.
    ///
    /// `cluster_duration_ms` below 1 keeps the engine's default cluster
    /// cutting. `muxer_id` is an arbitrary label for telling sessions apart.
    pub fn init(&mut self, cluster_duration_ms: i64, muxer_id: impl Into<String>) -> Result<()> {
        if self.state != MuxerState::Uninitialized {
            return Err(MuxError::InvalidArgument("init called twice"));
        }
        let settings = SegmentSettings {
            timecode_scale: TIMECODE_SCALE,
            max_cluster_duration: (cluster_duration_ms >= 1).then_some(cluster_duration_ms as u64),
            ..Default::default()
        };
        self.engine
            .init(&mut self.writer, &settings)
            .map_err(engine_failure)?;
        self.muxer_id = muxer_id.into();
        self.state = MuxerState::Ready;
        log::debug!(
            "muxer {} ready, cluster duration {:?}",
            self.muxer_id,
            settings.max_cluster_duration
        );
        Ok(())
    }

    fn require_ready(&self, op: &'static str) -> Result<()> {
        if self.state != MuxerState::Ready {
            return Err(MuxError::InvalidState {
                op,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Adds the Vorbis audio track and returns its track number.
    pub fn add_audio_track(
        &mut self,
        config: &AudioConfig,
        codec_private: &VorbisCodecPrivate<'_>,
    ) -> Result<u64> {
        self.require_ready("add_audio_track")?;
        self.tracks.ensure_vacant(TrackKind::Audio)?;
        let codec_private = codec_private.to_codec_private()?;
        let engine = &mut self.engine;
        self.tracks.register(TrackKind::Audio, || {
            engine.add_audio_track(config, &codec_private)
        })
    }

    /// Adds the video track and returns its track number.
    pub fn add_video_track(&mut self, config: &VideoConfig) -> Result<u64> {
        self.require_ready("add_video_track")?;
        let engine = &mut self.engine;
        let number = self
            .tracks
            .register(TrackKind::Video, || engine.add_video_track(config))?;
        self.video_codec = Some(config.codec);
        Ok(number)
    }

    pub fn write_audio_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if frame.is_empty() {
            return Err(MuxError::InvalidArgument("empty audio frame"));
        }
        let track = self.tracks.track_number(TrackKind::Audio)?;
        self.require_ready("write_audio_frame")?;
        self.write_frame(
            TrackKind::Audio,
            EngineFrame {
                track,
                data: &frame.data,
                timestamp: frame.timestamp,
                is_key: true,
            },
        )
    }

    pub fn write_video_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        if frame.is_empty() {
            return Err(MuxError::InvalidArgument("empty video frame"));
        }
        let track = self.tracks.track_number(TrackKind::Video)?;
        self.require_ready("write_video_frame")?;
        if self.video_codec != Some(frame.codec) {
            return Err(MuxError::InvalidArgument("frame codec differs from video track"));
        }
        self.write_frame(
            TrackKind::Video,
            EngineFrame {
                track,
                data: &frame.data,
                timestamp: frame.timestamp,
                is_key: frame.is_key,
            },
        )
    }

    fn write_frame(&mut self, kind: TrackKind, frame: EngineFrame<'_>) -> Result<()> {
        self.engine
            .add_frame(&mut self.writer, &frame)
            .map_err(|e| match e {
                EngineError::Sink(SinkError::OutOfMemory { .. }) => MuxError::OutOfMemory,
                other => MuxError::WriteRejected(kind, other.to_string()),
            })?;
        self.muxer_time = self.muxer_time.max(frame.timestamp);
        Ok(())
    }

    /// Flushes the engine and closes the final cluster.
    pub fn finalize(&mut self) -> Result<()> {
        self.require_ready("finalize")?;
        self.engine
            .finalize(&mut self.writer)
            .map_err(engine_failure)?;
        self.writer.close_chunk();
        self.state = MuxerState::Finalized;
        log::debug!(
            "muxer {} finalized, {} bytes still buffered",
            self.muxer_id,
            self.writer.buffer().len()
        );
        Ok(())
    }

    /// Length of the complete chunk waiting to be read, if any.
    pub fn chunk_ready(&self) -> Option<usize> {
        self.writer.buffer().ready_len()
    }

    pub fn ready_chunk_kind(&self) -> Option<ChunkKind> {
        self.writer.buffer().ready_kind()
    }

    /// Copies the ready chunk into `dest` and removes it from the buffer.
    ///
    /// Returns the chunk length. If `dest` is too small the chunk stays
    /// buffered and the call can be repeated with a larger destination.
    pub fn read_chunk(&mut self, dest: &mut [u8]) -> Result<usize> {
        let len = self.writer.buffer_mut().read_into(dest)?;
        self.chunks_read += 1;
        log::trace!(
            "muxer {} chunk {} read, {} bytes",
            self.muxer_id,
            self.chunks_read,
            len
        );
        Ok(len)
    }

    /// Hands over the ready chunk without copying it.
    pub fn take_chunk(&mut self) -> Result<Chunk> {
        let chunk = self
            .writer
            .buffer_mut()
            .take()
            .ok_or(MuxError::NoChunkReady)?;
        self.chunks_read += 1;
        log::trace!(
            "muxer {} chunk {} taken, {} bytes",
            self.muxer_id,
            self.chunks_read,
            chunk.len()
        );
        Ok(chunk)
    }

    /// Takes every chunk that is complete right now, oldest first.
    pub fn drain_chunks(&mut self) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        while let Ok(chunk) = self.take_chunk() {
            chunks.push(chunk);
        }
        chunks
    }

    pub fn state(&self) -> MuxerState {
        self.state
    }

    /// Largest timestamp written so far, in milliseconds.
    pub fn muxer_time(&self) -> i64 {
        self.muxer_time
    }

    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }

    pub fn muxer_id(&self) -> &str {
        &self.muxer_id
    }

    pub fn has_audio(&self) -> bool {
        self.tracks.has_audio()
    }

    pub fn has_video(&self) -> bool {
        self.tracks.has_video()
    }

    pub fn audio_track_number(&self) -> Option<u64> {
        self.tracks.audio_track_number()
    }

    pub fn video_track_number(&self) -> Option<u64> {
        self.tracks.video_track_number()
    }

    /// Bytes held in the buffer, ready or not.
    pub fn bytes_buffered(&self) -> usize {
        self.writer.buffer().len()
    }

    /// Bytes the engine has written through the sink since `init`.
    pub fn bytes_written(&self) -> u64 {
        self.writer.position()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

fn engine_failure(e: EngineError) -> MuxError {
    match e {
        EngineError::Sink(SinkError::OutOfMemory { .. }) => MuxError::OutOfMemory,
        other => MuxError::MuxerOperationFailed(other.to_string()),
    }
}

#[cfg(test)]
#[path = "muxer_test.rs"]
mod muxer_test;
