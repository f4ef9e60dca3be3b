use std::fmt::{Display, Formatter};

use bytes::Bytes;

use crate::config::VideoCodec;

/// One encoded VP8/VP9 frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Bytes,
    pub codec: VideoCodec,
    // milliseconds
    pub timestamp: i64,
    pub is_key: bool,
}

impl VideoFrame {
    pub fn new(codec: VideoCodec, data: impl Into<Bytes>, timestamp: i64, is_key: bool) -> Self {
        Self {
            data: data.into(),
            codec,
            timestamp,
            is_key,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Display for VideoFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "VideoFrame {{ codec: {}, ts: {}, key: {}, data: {} }}",
            self.codec,
            self.timestamp,
            self.is_key,
            self.data.len()
        )
    }
}

/// One encoded Vorbis packet.
#[derive(Debug, Clone, Default)]
pub struct AudioFrame {
    pub data: Bytes,
    // milliseconds
    pub timestamp: i64,
}

impl AudioFrame {
    pub fn new(data: impl Into<Bytes>, timestamp: i64) -> Self {
        Self {
            data: data.into(),
            timestamp,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Display for AudioFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "AudioFrame {{ ts: {}, data: {} }}",
            self.timestamp,
            self.data.len()
        )
    }
}
