use serde::Serialize;
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use webm_mux::{ChunkPublisher, LiveWebmMuxer};

use crate::{config::LiveConfig, ivf::IvfReader};

/// Progress of the running pipe, served by `/stats`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveStats {
    pub muxer_id: String,
    pub codec: String,
    pub frames_written: u64,
    pub keyframes: u64,
    pub chunks_published: u64,
    pub bytes_published: u64,
    pub muxer_time_ms: i64,
    pub finished: bool,
}

pub type SharedStats = Arc<Mutex<LiveStats>>;

pub fn update_stats(stats: &SharedStats, f: impl FnOnce(&mut LiveStats)) {
    f(&mut stats.lock().unwrap_or_else(PoisonError::into_inner));
}

pub fn read_stats(stats: &SharedStats) -> LiveStats {
    stats
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Reads the input file, muxes it and publishes every chunk as soon as it
/// is complete.
pub struct LivePipe {
    config: LiveConfig,
    publisher: ChunkPublisher,
    stats: SharedStats,
}

impl LivePipe {
    pub fn new(config: LiveConfig, publisher: ChunkPublisher) -> Self {
        let stats = LiveStats {
            muxer_id: config.muxer_id().to_string(),
            ..Default::default()
        };
        Self {
            config,
            publisher,
            stats: Arc::new(Mutex::new(stats)),
        }
    }

    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    /// Runs until the input ends or `cancel` fires. The publisher is
    /// finished in every case, so subscribers always see the end.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        match IvfReader::open(self.config.input()).await {
            Ok(reader) => self.run_reader(reader, cancel).await,
            Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    pub async fn run_reader(
        self,
        reader: IvfReader,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let result = self.mux(reader, &cancel).await;
        self.finish();
        result
    }

    fn finish(&self) {
        self.publisher.finish();
        update_stats(&self.stats, |s| s.finished = true);
    }

    async fn mux(&self, mut reader: IvfReader, cancel: &CancellationToken) -> anyhow::Result<()> {
        let header = *reader.header();
        let mut muxer = LiveWebmMuxer::new();
        muxer.init(self.config.cluster_duration_ms(), self.config.muxer_id())?;
        muxer.add_video_track(&header.video_config())?;
        update_stats(&self.stats, |s| s.codec = header.codec.to_string());
        log::info!(
            "pipe {} started: {} {}x{}",
            self.config.muxer_id(),
            header.codec,
            header.width,
            header.height
        );

        let started = Instant::now();
        let result = self.feed(&mut reader, &mut muxer, started, cancel).await;

        // close the last cluster even after a failed or cancelled feed
        muxer.finalize()?;
        self.publish(&mut muxer);
        log::info!(
            "pipe {} finished after {} frames",
            self.config.muxer_id(),
            reader.frames_read()
        );
        result
    }

    async fn feed(
        &self,
        reader: &mut IvfReader,
        muxer: &mut LiveWebmMuxer,
        started: Instant,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        while let Some(frame) = reader.next_frame()? {
            if self.config.realtime() {
                let offset = Duration::from_millis(frame.timestamp.max(0) as u64);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep_until(started + offset) => {}
                }
            } else if cancel.is_cancelled() {
                return Ok(());
            }

            muxer.write_video_frame(&frame).map_err(|e| {
                anyhow::anyhow!(
                    "frame at {}ms rejected with status {}: {}",
                    frame.timestamp,
                    e.code(),
                    e
                )
            })?;
            update_stats(&self.stats, |s| {
                s.frames_written += 1;
                s.keyframes += frame.is_key as u64;
                s.muxer_time_ms = muxer.muxer_time();
            });
            self.publish(muxer);
            if !self.config.realtime() {
                // let subscribers drain between frames
                tokio::task::yield_now().await;
            }
        }
        Ok(())
    }

    fn publish(&self, muxer: &mut LiveWebmMuxer) {
        for chunk in muxer.drain_chunks() {
            log::debug!("pipe {} publishing {}", self.config.muxer_id(), chunk);
            update_stats(&self.stats, |s| {
                s.chunks_published += 1;
                s.bytes_published += chunk.len() as u64;
            });
            self.publisher.publish_chunk(chunk);
        }
    }
}

#[cfg(test)]
#[path = "pipe_test.rs"]
mod pipe_test;
