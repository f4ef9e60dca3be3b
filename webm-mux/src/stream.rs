use futures::{Stream, StreamExt};
use std::{
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

use crate::{buffer::Chunk, engine::MuxingEngine, muxer::LiveWebmMuxer};

pub type ChunkSender = broadcast::Sender<ChunkCmd>;

const CHUNK_CHAN_CAP: usize = 64;

#[derive(Debug, Clone)]
pub enum ChunkCmd {
    Data(Chunk),
    Eof,
}

#[derive(Default)]
struct PublisherState {
    metadata: Option<Chunk>,
    finished: bool,
}

/// Fans drained chunks out to any number of async consumers.
///
/// The metadata chunk is kept so that a subscriber joining mid-stream still
/// receives a playable stream: metadata first, then the clusters published
/// after it subscribed.
#[derive(Clone)]
pub struct ChunkPublisher {
    sender: ChunkSender,
    state: Arc<Mutex<PublisherState>>,
}

impl ChunkPublisher {
    pub fn new() -> Self {
        Self::with_capacity(CHUNK_CHAN_CAP)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            state: Arc::new(Mutex::new(PublisherState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, PublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drains every ready chunk from `muxer` and broadcasts it.
    /// Returns the number of chunks published.
    pub fn publish<E: MuxingEngine>(&self, muxer: &mut LiveWebmMuxer<E>) -> usize {
        let chunks = muxer.drain_chunks();
        let count = chunks.len();
        for chunk in chunks {
            self.publish_chunk(chunk);
        }
        count
    }

    pub fn publish_chunk(&self, chunk: Chunk) {
        let mut state = self.state();
        if state.finished {
            log::debug!("dropping {} published after eof", chunk);
            return;
        }
        if chunk.is_metadata() {
            state.metadata = Some(chunk.clone());
        }
        // no subscribers is not an error
        let receivers = self.sender.send(ChunkCmd::Data(chunk)).unwrap_or(0);
        log::trace!("chunk published to {} subscribers", receivers);
    }

    /// Ends every subscribed stream once it has caught up.
    pub fn finish(&self) {
        let mut state = self.state();
        if state.finished {
            return;
        }
        state.finished = true;
        let _ = self.sender.send(ChunkCmd::Eof);
        log::debug!("chunk publisher finished");
    }

    pub fn subscribe(&self) -> ChunkStream {
        // subscribing under the state lock keeps the cached metadata and
        // the receiver position consistent with each other
        let state = self.state();
        let receiver = (!state.finished).then(|| self.sender.subscribe());
        ChunkStream {
            pending: state.metadata.clone(),
            metadata_sent: state.metadata.is_some(),
            inner: receiver.map(BroadcastStream::new),
            publisher: self.state.clone(),
        }
    }

    pub fn metadata(&self) -> Option<Chunk> {
        self.state().metadata.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state().finished
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChunkPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Chunks of one live stream as seen by a single subscriber.
pub struct ChunkStream {
    pending: Option<Chunk>,
    metadata_sent: bool,
    inner: Option<BroadcastStream<ChunkCmd>>,
    publisher: Arc<Mutex<PublisherState>>,
}

impl ChunkStream {
    fn cached_metadata(&self) -> Option<Chunk> {
        self.publisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .metadata
            .clone()
    }
}

impl Stream for ChunkStream {
    type Item = Chunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(chunk) = this.pending.take() {
            return Poll::Ready(Some(chunk));
        }
        loop {
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match futures::ready!(inner.poll_next_unpin(cx)) {
                Some(Ok(ChunkCmd::Data(chunk))) => {
                    if chunk.is_metadata() {
                        if this.metadata_sent {
                            continue;
                        }
                        this.metadata_sent = true;
                        return Poll::Ready(Some(chunk));
                    }
                    if !this.metadata_sent {
                        // lagged past the metadata chunk
                        let Some(metadata) = this.cached_metadata() else {
                            continue;
                        };
                        this.metadata_sent = true;
                        this.pending = Some(chunk);
                        return Poll::Ready(Some(metadata));
                    }
                    return Poll::Ready(Some(chunk));
                }
                Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                    log::debug!("chunk subscriber lagged, {} chunks skipped", n);
                }
                Some(Ok(ChunkCmd::Eof)) | None => {
                    this.inner = None;
                }
            }
        }
    }
}
