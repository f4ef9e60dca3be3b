use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    buffer::Chunk,
    config::{AudioConfig, VideoConfig, VorbisCodecPrivate},
    engine::{LiveSegment, MuxingEngine},
    error::Result,
    frame::{AudioFrame, VideoFrame},
    muxer::{LiveWebmMuxer, MuxerState},
};

/// A muxer session shared between threads.
///
/// Every operation takes one lock for its whole duration, so a writer thread
/// and a draining thread never observe a half-written frame or a partially
/// removed chunk.
pub struct SharedMuxer<E: MuxingEngine = LiveSegment> {
    inner: Arc<Mutex<LiveWebmMuxer<E>>>,
}

impl<E: MuxingEngine> Clone for SharedMuxer<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl SharedMuxer<LiveSegment> {
    pub fn new() -> Self {
        Self::from_muxer(LiveWebmMuxer::new())
    }
}

impl Default for SharedMuxer<LiveSegment> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: MuxingEngine> SharedMuxer<E> {
    pub fn from_muxer(muxer: LiveWebmMuxer<E>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(muxer)),
        }
    }

    /// Locks the session for a sequence of calls that must not interleave
    /// with other threads.
    pub fn lock(&self) -> MutexGuard<'_, LiveWebmMuxer<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn init(&self, cluster_duration_ms: i64, muxer_id: impl Into<String>) -> Result<()> {
        self.lock().init(cluster_duration_ms, muxer_id)
    }

    pub fn add_audio_track(
        &self,
        config: &AudioConfig,
        codec_private: &VorbisCodecPrivate<'_>,
    ) -> Result<u64> {
        self.lock().add_audio_track(config, codec_private)
    }

    pub fn add_video_track(&self, config: &VideoConfig) -> Result<u64> {
        self.lock().add_video_track(config)
    }

    pub fn write_audio_frame(&self, frame: &AudioFrame) -> Result<()> {
        self.lock().write_audio_frame(frame)
    }

    pub fn write_video_frame(&self, frame: &VideoFrame) -> Result<()> {
        self.lock().write_video_frame(frame)
    }

    pub fn finalize(&self) -> Result<()> {
        self.lock().finalize()
    }

    pub fn chunk_ready(&self) -> Option<usize> {
        self.lock().chunk_ready()
    }

    /// Reads the ready chunk. Readiness is checked under the same lock, so
    /// the chunk cannot change between the check and the copy.
    pub fn read_chunk(&self, dest: &mut [u8]) -> Result<usize> {
        self.lock().read_chunk(dest)
    }

    pub fn take_chunk(&self) -> Result<Chunk> {
        self.lock().take_chunk()
    }

    pub fn drain_chunks(&self) -> Vec<Chunk> {
        self.lock().drain_chunks()
    }

    pub fn state(&self) -> MuxerState {
        self.lock().state()
    }

    pub fn muxer_time(&self) -> i64 {
        self.lock().muxer_time()
    }

    pub fn chunks_read(&self) -> u64 {
        self.lock().chunks_read()
    }

    pub fn muxer_id(&self) -> String {
        self.lock().muxer_id().to_string()
    }
}
