use anyhow::Context;
use futures::StreamExt;
use serde::Serialize;
use std::path::PathBuf;
use webm_mux::{Chunk, ChunkStream};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChunkFile {
    pub name: String,
    pub size: usize,
}

/// Listing written next to the chunk files once the stream ends.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    pub muxer_id: String,
    pub metadata: Option<ChunkFile>,
    pub clusters: Vec<ChunkFile>,
}

/// Writes every chunk of a live stream into its own file:
/// `<id>_metadata.webm`, then `<id>_00001.webm`, `<id>_00002.webm`, ...
pub struct DirSink {
    dir: PathBuf,
    muxer_id: String,
    manifest: Manifest,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>, muxer_id: &str) -> Self {
        Self {
            dir: dir.into(),
            muxer_id: muxer_id.to_string(),
            manifest: Manifest {
                muxer_id: muxer_id.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn chunk_name(&self, chunk: &Chunk) -> String {
        if chunk.is_metadata() {
            format!("{}_metadata.webm", self.muxer_id)
        } else {
            format!("{}_{:05}.webm", self.muxer_id, self.manifest.clusters.len() + 1)
        }
    }

    pub async fn write_chunk(&mut self, chunk: &Chunk) -> anyhow::Result<PathBuf> {
        let name = self.chunk_name(chunk);
        let path = self.dir.join(&name);
        tokio::fs::write(&path, &chunk.data)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        let file = ChunkFile {
            name,
            size: chunk.len(),
        };
        if chunk.is_metadata() {
            self.manifest.metadata = Some(file);
        } else {
            self.manifest.clusters.push(file);
        }
        log::debug!("chunk written to {}", path.display());
        Ok(path)
    }

    pub async fn write_manifest(&self) -> anyhow::Result<PathBuf> {
        let path = self.dir.join(format!("{}_manifest.json", self.muxer_id));
        let json = serde_json::to_vec_pretty(&self.manifest)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Writes chunks until the stream ends, then the manifest.
    pub async fn run(mut self, mut stream: ChunkStream) -> anyhow::Result<Manifest> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create {}", self.dir.display()))?;
        while let Some(chunk) = stream.next().await {
            self.write_chunk(&chunk).await?;
        }
        self.write_manifest().await?;
        log::info!(
            "{} chunks written to {}",
            self.manifest.clusters.len() + self.manifest.metadata.is_some() as usize,
            self.dir.display()
        );
        Ok(self.manifest)
    }
}
