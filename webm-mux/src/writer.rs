use crate::{buffer::ChunkBuffer, ebml};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink could not grow by {requested} bytes")]
    OutOfMemory { requested: usize },
}

/// Byte sink a muxing engine writes its output through.
pub trait MkvWriter {
    /// Appends `buf` to the sink, preserving order and length exactly.
    fn write(&mut self, buf: &[u8]) -> Result<(), SinkError>;

    /// Total bytes written so far.
    fn position(&self) -> u64;

    /// Called by the engine right before it writes the header of a
    /// top-level element, with the position that header will start at.
    fn element_start_notify(&mut self, element_id: u64, position: u64);
}

/// [`MkvWriter`] that keeps everything in memory and splits it into chunks.
///
/// A Cluster start closes the bytes buffered so far into a chunk: the first
/// one holds the stream metadata, every later one a complete cluster.
#[derive(Debug, Default)]
pub struct SegmentWriter {
    buffer: ChunkBuffer,
}

impl SegmentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &ChunkBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut ChunkBuffer {
        &mut self.buffer
    }

    /// Closes the trailing bytes into a chunk. Used once the engine has
    /// flushed its final cluster.
    pub fn close_chunk(&mut self) -> bool {
        self.buffer.close_chunk()
    }
}

impl MkvWriter for SegmentWriter {
    fn write(&mut self, buf: &[u8]) -> Result<(), SinkError> {
        self.buffer
            .append(buf)
            .map_err(|_| SinkError::OutOfMemory {
                requested: buf.len(),
            })
    }

    fn position(&self) -> u64 {
        self.buffer.total_written()
    }

    fn element_start_notify(&mut self, element_id: u64, position: u64) {
        if element_id == ebml::CLUSTER {
            log::trace!("cluster starts at {}", position);
            self.buffer.close_chunk();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ChunkKind;

    #[test]
    fn test_cluster_start_closes_chunk() {
        let mut writer = SegmentWriter::new();
        writer.write(b"ebml+info+tracks").unwrap();
        assert_eq!(writer.buffer().ready_len(), None);

        writer.element_start_notify(ebml::CLUSTER, writer.position());
        assert_eq!(writer.buffer().ready_len(), Some(16));
        assert_eq!(writer.buffer().ready_kind(), Some(ChunkKind::Metadata));
    }

    #[test]
    fn test_other_elements_do_not_close() {
        let mut writer = SegmentWriter::new();
        writer.write(b"abc").unwrap();
        writer.element_start_notify(ebml::SEGMENT, 0);
        writer.element_start_notify(ebml::TRACKS, 3);
        assert_eq!(writer.buffer().ready_len(), None);
        assert_eq!(writer.position(), 3);
    }

    #[test]
    fn test_write_preserves_bytes() {
        let mut writer = SegmentWriter::new();
        writer.write(&[1, 2, 3]).unwrap();
        writer.write(&[]).unwrap();
        writer.write(&[4]).unwrap();
        writer.close_chunk();
        let chunk = writer.buffer_mut().take().unwrap();
        assert_eq!(&chunk.data[..], &[1, 2, 3, 4]);
    }
}
