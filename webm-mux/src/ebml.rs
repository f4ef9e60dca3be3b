//! EBML element ids and primitive encoders used by the live segment writer.
//!
//! Ids are stored with their length marker bits included, so they are
//! written as-is in big-endian order.

pub const EBML: u64 = 0x1A45_DFA3;
pub const EBML_VERSION: u64 = 0x4286;
pub const EBML_READ_VERSION: u64 = 0x42F7;
pub const EBML_MAX_ID_LENGTH: u64 = 0x42F2;
pub const EBML_MAX_SIZE_LENGTH: u64 = 0x42F3;
pub const DOC_TYPE: u64 = 0x4282;
pub const DOC_TYPE_VERSION: u64 = 0x4287;
pub const DOC_TYPE_READ_VERSION: u64 = 0x4285;

pub const SEGMENT: u64 = 0x1853_8067;

pub const INFO: u64 = 0x1549_A966;
pub const TIMECODE_SCALE: u64 = 0x2A_D7B1;
pub const MUXING_APP: u64 = 0x4D80;
pub const WRITING_APP: u64 = 0x5741;

pub const TRACKS: u64 = 0x1654_AE6B;
pub const TRACK_ENTRY: u64 = 0xAE;
pub const TRACK_NUMBER: u64 = 0xD7;
pub const TRACK_UID: u64 = 0x73C5;
pub const TRACK_TYPE: u64 = 0x83;
pub const CODEC_ID: u64 = 0x86;
pub const CODEC_PRIVATE: u64 = 0x63A2;
pub const DEFAULT_DURATION: u64 = 0x23_E383;
pub const VIDEO: u64 = 0xE0;
pub const PIXEL_WIDTH: u64 = 0xB0;
pub const PIXEL_HEIGHT: u64 = 0xBA;
pub const AUDIO: u64 = 0xE1;
pub const SAMPLING_FREQUENCY: u64 = 0xB5;
pub const CHANNELS: u64 = 0x9F;
pub const BIT_DEPTH: u64 = 0x6264;

pub const CLUSTER: u64 = 0x1F43_B675;
pub const TIMECODE: u64 = 0xE7;
pub const SIMPLE_BLOCK: u64 = 0xA3;

pub const TRACK_TYPE_VIDEO: u64 = 1;
pub const TRACK_TYPE_AUDIO: u64 = 2;

/// The 8-byte "size unknown" marker used for Segment and Cluster.
pub const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Largest size encodable in 8 bytes (all-ones is reserved for unknown).
const MAX_SIZE: u64 = (1 << 56) - 2;

pub fn write_id(buf: &mut Vec<u8>, id: u64) {
    let len = id_len(id);
    buf.extend_from_slice(&id.to_be_bytes()[8 - len..]);
}

fn id_len(id: u64) -> usize {
    match id {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Writes `size` as a minimal-length EBML variable-size integer.
pub fn write_size(buf: &mut Vec<u8>, size: u64) {
    debug_assert!(size <= MAX_SIZE);
    let mut len = 1;
    // all-ones at a given length means unknown, so stop one short of it
    while len < 8 && size >= (1u64 << (7 * len)) - 1 {
        len += 1;
    }
    let marked = size | (1u64 << (7 * len));
    buf.extend_from_slice(&marked.to_be_bytes()[8 - len..]);
}

pub fn write_unknown_size(buf: &mut Vec<u8>) {
    buf.extend_from_slice(&UNKNOWN_SIZE);
}

pub fn write_uint(buf: &mut Vec<u8>, id: u64, value: u64) {
    write_id(buf, id);
    let len = if value == 0 {
        1
    } else {
        (64 - value.leading_zeros() as usize).div_ceil(8)
    };
    write_size(buf, len as u64);
    buf.extend_from_slice(&value.to_be_bytes()[8 - len..]);
}

pub fn write_float(buf: &mut Vec<u8>, id: u64, value: f64) {
    write_id(buf, id);
    write_size(buf, 8);
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn write_string(buf: &mut Vec<u8>, id: u64, value: &str) {
    write_binary(buf, id, value.as_bytes());
}

pub fn write_binary(buf: &mut Vec<u8>, id: u64, data: &[u8]) {
    write_id(buf, id);
    write_size(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Writes a master element whose children are already serialized.
pub fn write_master(buf: &mut Vec<u8>, id: u64, children: &[u8]) {
    write_binary(buf, id, children);
}

/// Parsed element header: id, size (`None` when unknown), header length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    pub id: u64,
    pub size: Option<u64>,
    pub header_len: usize,
}

/// Reads one element header from the front of `buf`.
pub fn read_element_header(buf: &[u8]) -> Option<ElementHeader> {
    let (id, id_len) = read_vint(buf, true)?;
    let (raw, size_len) = read_vint(&buf[id_len..], false)?;
    let all_ones = (1u64 << (7 * size_len)) - 1;
    Some(ElementHeader {
        id,
        size: (raw != all_ones).then_some(raw),
        header_len: id_len + size_len,
    })
}

fn read_vint(buf: &[u8], keep_marker: bool) -> Option<(u64, usize)> {
    let first = *buf.first()?;
    if first == 0 {
        return None;
    }
    let len = first.leading_zeros() as usize + 1;
    if buf.len() < len {
        return None;
    }
    let mut value = if keep_marker {
        first as u64
    } else {
        (first as u64) & (0xFF >> len)
    };
    for b in &buf[1..len] {
        value = (value << 8) | *b as u64;
    }
    Some((value, len))
}
