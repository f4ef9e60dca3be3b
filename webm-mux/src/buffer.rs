use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{MuxError, Result};

/// Kind of a closed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// EBML header, segment info and track declarations. Always first, exactly once.
    Metadata,
    /// One WebM cluster.
    Cluster,
}

/// A chunk handed over to the caller.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub data: Bytes,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_metadata(&self) -> bool {
        self.kind == ChunkKind::Metadata
    }
}

impl Display for Chunk {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Chunk {{ kind: {:?}, data: {} }}", self.kind, self.data.len())
    }
}

/// Growable byte sequence holding muxed output until the caller drains it.
///
/// Bytes are appended at the back and split off the front. Closed chunks
/// are tracked as absolute end offsets; only the oldest one is reported as
/// ready, so chunks are delivered one at a time and in order.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    data: BytesMut,
    /// Absolute offset of `data[0]` in the appended stream.
    head: u64,
    closed: VecDeque<(u64, ChunkKind)>,
    chunks_closed: u64,
    total_written: u64,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Appends `bytes` verbatim. Fails only if the buffer cannot grow.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.grow(bytes.len())?;
        self.data.extend_from_slice(bytes);
        self.total_written += bytes.len() as u64;
        Ok(())
    }

    /// Makes room for `additional` bytes, reusing space freed by drained
    /// chunks when nothing else still points into it.
    fn grow(&mut self, additional: usize) -> Result<()> {
        if self.data.try_reclaim(additional) {
            return Ok(());
        }
        let required = self
            .data
            .len()
            .checked_add(additional)
            .ok_or(MuxError::OutOfMemory)?;
        let mut grown = Vec::new();
        grown
            .try_reserve(required.max(self.data.capacity().saturating_mul(2)))
            .map_err(|_| MuxError::OutOfMemory)?;
        grown.extend_from_slice(&self.data);
        self.data = BytesMut::from(Bytes::from(grown));
        Ok(())
    }

    /// Closes everything appended since the last close into one chunk.
    /// Returns false when there was nothing to close.
    pub fn close_chunk(&mut self) -> bool {
        let start = self.closed.back().map_or(self.head, |(end, _)| *end);
        let end = self.total_written;
        if end == start {
            return false;
        }
        let kind = if self.chunks_closed == 0 {
            ChunkKind::Metadata
        } else {
            ChunkKind::Cluster
        };
        self.closed.push_back((end, kind));
        self.chunks_closed += 1;
        log::trace!("chunk closed: kind={:?} len={}", kind, end - start);
        true
    }

    /// Length of the oldest complete chunk, if any.
    pub fn ready_len(&self) -> Option<usize> {
        self.closed
            .front()
            .map(|(end, _)| (*end - self.head) as usize)
    }

    pub fn ready_kind(&self) -> Option<ChunkKind> {
        self.closed.front().map(|(_, kind)| *kind)
    }

    /// Copies the ready chunk into `dest` and discards it from the buffer.
    ///
    /// On `DestinationTooSmall` nothing is removed.
    pub fn read_into(&mut self, dest: &mut [u8]) -> Result<usize> {
        let len = self.ready_len().ok_or(MuxError::NoChunkReady)?;
        if dest.len() < len {
            return Err(MuxError::DestinationTooSmall {
                capacity: dest.len(),
                required: len,
            });
        }
        self.data.copy_to_slice(&mut dest[..len]);
        self.pop_front(len);
        Ok(len)
    }

    /// Splits the ready chunk off the front. The chunk shares the buffer's
    /// allocation, so no bytes are copied.
    pub fn take(&mut self) -> Option<Chunk> {
        let len = self.ready_len()?;
        let kind = self.ready_kind()?;
        let data = self.data.split_to(len).freeze();
        self.pop_front(len);
        Some(Chunk { kind, data })
    }

    fn pop_front(&mut self, len: usize) {
        self.closed.pop_front();
        self.head += len as u64;
    }

    /// Bytes currently held, complete chunks and partial tail together.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes appended since the last closed chunk.
    pub fn pending_len(&self) -> usize {
        let start = self.closed.back().map_or(self.head, |(end, _)| *end);
        (self.total_written - start) as usize
    }

    /// Total bytes ever appended.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }
}
