use anyhow::{Context, bail};
use bytes::{Buf, Bytes};
use std::path::Path;
use webm_mux::{VideoCodec, VideoConfig, VideoFrame};

const IVF_SIGNATURE: &[u8; 4] = b"DKIF";
const IVF_HEADER_LEN: usize = 32;
const IVF_FRAME_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfHeader {
    pub codec: VideoCodec,
    pub width: u16,
    pub height: u16,
    /// Ticks per second is `rate / scale`.
    pub rate: u32,
    pub scale: u32,
    pub frame_count: u32,
}

impl IvfHeader {
    pub fn video_config(&self) -> VideoConfig {
        VideoConfig::new(self.codec, self.width as u32, self.height as u32)
            .with_frame_rate(self.rate as f64 / self.scale as f64)
    }

    fn ticks_to_ms(&self, pts: u64) -> anyhow::Result<i64> {
        let ms = pts as u128 * 1000 * self.scale as u128 / self.rate as u128;
        i64::try_from(ms).with_context(|| format!("ivf pts {} out of range", pts))
    }
}

/// Reads VP8/VP9 frames out of an IVF file held in memory.
///
/// Frame payloads are slices of the file buffer, no copies are made.
pub struct IvfReader {
    header: IvfHeader,
    data: Bytes,
    frames_read: u32,
}

impl IvfReader {
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        Self::new(Bytes::from(data))
    }

    pub fn new(mut data: Bytes) -> anyhow::Result<Self> {
        if data.len() < IVF_HEADER_LEN {
            bail!("ivf header truncated: {} bytes", data.len());
        }
        if &data[..4] != IVF_SIGNATURE {
            bail!("not an ivf file");
        }
        let mut header = &data[4..IVF_HEADER_LEN];
        let _version = header.get_u16_le();
        let header_len = header.get_u16_le() as usize;
        let mut fourcc = [0u8; 4];
        header.copy_to_slice(&mut fourcc);
        let codec = match &fourcc {
            b"VP80" => VideoCodec::Vp8,
            b"VP90" => VideoCodec::Vp9,
            other => bail!("unsupported ivf fourcc {:?}", String::from_utf8_lossy(other)),
        };
        let width = header.get_u16_le();
        let height = header.get_u16_le();
        let rate = header.get_u32_le();
        let scale = header.get_u32_le();
        let frame_count = header.get_u32_le();
        if rate == 0 || scale == 0 {
            bail!("invalid ivf timebase {}/{}", scale, rate);
        }
        if header_len < IVF_HEADER_LEN || header_len > data.len() {
            bail!("invalid ivf header length {}", header_len);
        }
        data.advance(header_len);

        let header = IvfHeader {
            codec,
            width,
            height,
            rate,
            scale,
            frame_count,
        };
        log::debug!("ivf {:?}", header);
        Ok(Self {
            header,
            data,
            frames_read: 0,
        })
    }

    pub fn header(&self) -> &IvfHeader {
        &self.header
    }

    pub fn frames_read(&self) -> u32 {
        self.frames_read
    }

    pub fn next_frame(&mut self) -> anyhow::Result<Option<VideoFrame>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        if self.data.len() < IVF_FRAME_HEADER_LEN {
            bail!("ivf frame header truncated at frame {}", self.frames_read);
        }
        let size = self.data.get_u32_le() as usize;
        let pts = self.data.get_u64_le();
        if size > self.data.len() {
            bail!(
                "ivf frame {} truncated: {} of {} bytes",
                self.frames_read,
                self.data.len(),
                size
            );
        }
        let timestamp = self.header.ticks_to_ms(pts)?;
        let payload = self.data.split_to(size);
        let is_key = is_keyframe(self.header.codec, &payload);
        self.frames_read += 1;
        Ok(Some(VideoFrame::new(
            self.header.codec,
            payload,
            timestamp,
            is_key,
        )))
    }
}

pub fn is_keyframe(codec: VideoCodec, data: &[u8]) -> bool {
    let Some(&first) = data.first() else {
        return false;
    };
    match codec {
        // frame tag bit 0: 0 = key frame
        VideoCodec::Vp8 => first & 0x01 == 0,
        VideoCodec::Vp9 => vp9_is_keyframe(first),
    }
}

/// Reads the start of the VP9 uncompressed header:
/// frame_marker(2) profile(2) [reserved(1)] show_existing_frame(1) frame_type(1)
fn vp9_is_keyframe(first: u8) -> bool {
    if first >> 6 != 0b10 {
        return false;
    }
    let profile_low = (first >> 5) & 1;
    let profile_high = (first >> 4) & 1;
    let mut bit = 3;
    if profile_high == 1 && profile_low == 1 {
        bit -= 1;
    }
    let show_existing = (first >> bit) & 1;
    if show_existing == 1 {
        return false;
    }
    (first >> (bit - 1)) & 1 == 0
}
