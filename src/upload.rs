use anyhow::Context;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use webm_mux::{Chunk, ChunkStream};

pub const SESSION_HEADER: &str = "x-webm-session";
pub const CHUNK_INDEX_HEADER: &str = "x-webm-chunk-index";
pub const CHUNK_KIND_HEADER: &str = "x-webm-chunk-kind";

/// POSTs every chunk of a live stream to one endpoint, in order.
///
/// The metadata chunk goes out with index 0, clusters are numbered from 1.
pub struct Uploader {
    client: reqwest::Client,
    url: String,
    muxer_id: String,
    next_cluster: u64,
}

impl Uploader {
    pub fn new(url: &str, muxer_id: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            muxer_id: muxer_id.to_string(),
            next_cluster: 1,
        }
    }

    pub async fn upload(&mut self, chunk: &Chunk) -> anyhow::Result<u64> {
        let (index, kind) = if chunk.is_metadata() {
            (0, "metadata")
        } else {
            (self.next_cluster, "cluster")
        };
        self.client
            .post(&self.url)
            .header(CONTENT_TYPE, "video/webm")
            .header(SESSION_HEADER, &self.muxer_id)
            .header(CHUNK_INDEX_HEADER, index.to_string())
            .header(CHUNK_KIND_HEADER, kind)
            .body(chunk.data.clone())
            .send()
            .await
            .with_context(|| format!("upload chunk {} to {}", index, self.url))?
            .error_for_status()?;
        if !chunk.is_metadata() {
            self.next_cluster += 1;
        }
        log::debug!("uploaded {} as chunk {}", chunk, index);
        Ok(index)
    }

    /// Uploads chunks until the stream ends. Failed uploads are logged and
    /// skipped; returns how many failed.
    pub async fn run(mut self, mut stream: ChunkStream) -> u64 {
        let mut failures = 0;
        while let Some(chunk) = stream.next().await {
            if let Err(e) = self.upload(&chunk).await {
                failures += 1;
                log::warn!("upload error: {:#}", e);
            }
        }
        log::info!(
            "upload to {} finished, {} clusters, {} failures",
            self.url,
            self.next_cluster - 1,
            failures
        );
        failures
    }
}
