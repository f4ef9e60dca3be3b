use std::fmt::{Display, Formatter};

/// Media kind of a track slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl Display for TrackKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Failure kinds reported by [`crate::muxer::LiveWebmMuxer`].
///
/// Every variant except [`MuxError::OutOfMemory`] leaves the session usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MuxError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("{0} track already exists")]
    AlreadyExists(TrackKind),

    #[error("no {0} track")]
    NoTrack(TrackKind),

    #[error("{0} track registration failed")]
    TrackRegistrationFailed(TrackKind),

    #[error("{0} frame rejected by muxing engine: {1}")]
    WriteRejected(TrackKind, String),

    #[error("muxing engine failure: {0}")]
    MuxerOperationFailed(String),

    #[error("no chunk ready")]
    NoChunkReady,

    #[error("destination too small: capacity {capacity}, chunk length {required}")]
    DestinationTooSmall { capacity: usize, required: usize },

    #[error("out of memory")]
    OutOfMemory,

    #[error("{op} not allowed in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: crate::muxer::MuxerState,
    },
}

impl MuxError {
    /// Stable numeric status for callers that speak integer codes. Success is 0.
    pub fn code(&self) -> i32 {
        match self {
            MuxError::InvalidArgument(_) => -1,
            MuxError::OutOfMemory => -2,
            MuxError::MuxerOperationFailed(_) => -3,
            MuxError::TrackRegistrationFailed(TrackKind::Video) => -4,
            MuxError::NoTrack(TrackKind::Video) => -5,
            MuxError::WriteRejected(TrackKind::Video, _) => -6,
            MuxError::DestinationTooSmall { .. } => -7,
            MuxError::NoChunkReady => -8,
            MuxError::TrackRegistrationFailed(TrackKind::Audio) => -9,
            MuxError::AlreadyExists(TrackKind::Audio) => -10,
            MuxError::NoTrack(TrackKind::Audio) => -12,
            MuxError::WriteRejected(TrackKind::Audio, _) => -13,
            MuxError::AlreadyExists(TrackKind::Video) => -14,
            MuxError::InvalidState { .. } => -15,
        }
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
