//! Live WebM muxing into self-contained chunks.
//!
//! A [`LiveWebmMuxer`] accepts encoded VP8/VP9 video and Vorbis audio
//! frames and hands the muxed output back as a metadata chunk followed by
//! one chunk per cluster, ready to be sent over the network as they appear.

pub mod buffer;
pub mod config;
pub mod ebml;
pub mod engine;
pub mod error;
pub mod frame;
pub mod muxer;
pub mod shared;
pub mod stream;
pub mod tracks;
pub mod writer;

pub use buffer::{Chunk, ChunkKind};
pub use config::{AudioConfig, VideoCodec, VideoConfig, VorbisCodecPrivate};
pub use engine::{LiveSegment, MuxingEngine, SegmentSettings, TIMECODE_SCALE};
pub use error::{MuxError, Result, TrackKind};
pub use frame::{AudioFrame, VideoFrame};
pub use muxer::{LiveWebmMuxer, MuxerState};
pub use shared::SharedMuxer;
pub use stream::{ChunkCmd, ChunkPublisher, ChunkStream};
