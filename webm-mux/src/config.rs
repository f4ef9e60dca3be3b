use std::fmt::{Display, Formatter};

use crate::error::{MuxError, Result};

/// Video codecs a WebM live stream can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Vp8,
    Vp9,
}

impl VideoCodec {
    /// Matroska CodecID string.
    pub fn codec_id(&self) -> &'static str {
        match self {
            VideoCodec::Vp8 => "V_VP8",
            VideoCodec::Vp9 => "V_VP9",
        }
    }
}

impl Display for VideoCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCodec::Vp8 => write!(f, "VP8"),
            VideoCodec::Vp9 => write!(f, "VP9"),
        }
    }
}

impl std::str::FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vp8" | "vp80" => Ok(VideoCodec::Vp8),
            "vp9" | "vp90" => Ok(VideoCodec::Vp9),
            _ => Err(format!("unknown video codec: {}", s)),
        }
    }
}

/// Video track configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoConfig {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    // frames per second, written as the track's default frame duration when set
    pub frame_rate: f64,
}

impl VideoConfig {
    pub fn new(codec: VideoCodec, width: u32, height: u32) -> Self {
        Self {
            codec,
            width,
            height,
            frame_rate: 0.0,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }
}

/// Audio track configuration. Live WebM audio is always Vorbis here.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioConfig {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 0,
        }
    }

    pub fn with_bits_per_sample(mut self, bits: u16) -> Self {
        self.bits_per_sample = bits;
        self
    }

    pub fn codec_id(&self) -> &'static str {
        "A_VORBIS"
    }
}

/// Borrowed views of the three Vorbis header packets.
///
/// All three must be non-empty for the audio track to be accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct VorbisCodecPrivate<'a> {
    pub ident: &'a [u8],
    pub comments: &'a [u8],
    pub setup: &'a [u8],
}

impl<'a> VorbisCodecPrivate<'a> {
    pub fn new(ident: &'a [u8], comments: &'a [u8], setup: &'a [u8]) -> Self {
        Self {
            ident,
            comments,
            setup,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ident.is_empty() {
            return Err(MuxError::InvalidArgument("empty vorbis identification header"));
        }
        if self.comments.is_empty() {
            return Err(MuxError::InvalidArgument("empty vorbis comment header"));
        }
        if self.setup.is_empty() {
            return Err(MuxError::InvalidArgument("empty vorbis setup header"));
        }
        Ok(())
    }

    /// Packs the headers into Matroska CodecPrivate form: a packet count byte
    /// (2, meaning three packets), the Xiph-laced sizes of the first two
    /// packets, then the three packets back to back.
    pub fn to_codec_private(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut out = Vec::new();
        out.try_reserve(
            1 + self.ident.len() / 255
                + self.comments.len() / 255
                + 2
                + self.ident.len()
                + self.comments.len()
                + self.setup.len(),
        )
        .map_err(|_| MuxError::OutOfMemory)?;
        out.push(2);
        xiph_lace(&mut out, self.ident.len());
        xiph_lace(&mut out, self.comments.len());
        out.extend_from_slice(self.ident);
        out.extend_from_slice(self.comments);
        out.extend_from_slice(self.setup);
        Ok(out)
    }
}

fn xiph_lace(out: &mut Vec<u8>, mut len: usize) {
    while len >= 255 {
        out.push(255);
        len -= 255;
    }
    out.push(len as u8);
}
