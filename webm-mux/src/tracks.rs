use crate::error::{MuxError, Result, TrackKind};

/// Holds at most one audio and one video track number.
///
/// Slots are write-once: an occupied slot is never cleared or replaced.
#[derive(Debug, Default, Clone)]
pub struct TrackRegistry {
    audio: Option<u64>,
    video: Option<u64>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: TrackKind) -> Option<u64> {
        match kind {
            TrackKind::Audio => self.audio,
            TrackKind::Video => self.video,
        }
    }

    /// Fails with `AlreadyExists` if `kind` is occupied.
    pub fn ensure_vacant(&self, kind: TrackKind) -> Result<()> {
        match self.slot(kind) {
            Some(_) => Err(MuxError::AlreadyExists(kind)),
            None => Ok(()),
        }
    }

    /// Occupies the `kind` slot with the number returned by `register`.
    ///
    /// `register` is only invoked when the slot is vacant; a `None` from it
    /// leaves the slot vacant and fails with `TrackRegistrationFailed`.
    pub fn register<F>(&mut self, kind: TrackKind, register: F) -> Result<u64>
    where
        F: FnOnce() -> Option<u64>,
    {
        self.ensure_vacant(kind)?;
        let number = register().ok_or(MuxError::TrackRegistrationFailed(kind))?;
        match kind {
            TrackKind::Audio => self.audio = Some(number),
            TrackKind::Video => self.video = Some(number),
        }
        log::debug!("{} track registered as {}", kind, number);
        Ok(number)
    }

    /// Track number for `kind`, or `NoTrack`.
    pub fn track_number(&self, kind: TrackKind) -> Result<u64> {
        self.slot(kind).ok_or(MuxError::NoTrack(kind))
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn audio_track_number(&self) -> Option<u64> {
        self.audio
    }

    pub fn video_track_number(&self) -> Option<u64> {
        self.video
    }
}
