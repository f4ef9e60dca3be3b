use super::*;
use crate::{
    buffer::ChunkKind,
    ebml::read_element_header,
    writer::SegmentWriter,
};

fn vp8() -> VideoConfig {
    VideoConfig::new(VideoCodec::Vp8, 320, 240)
}

fn started(settings: SegmentSettings) -> (LiveSegment, SegmentWriter) {
    let mut segment = LiveSegment::new();
    let mut writer = SegmentWriter::new();
    segment.init(&mut writer, &settings).unwrap();
    (segment, writer)
}

fn frame(track: u64, data: &[u8], timestamp: i64, is_key: bool) -> EngineFrame<'_> {
    EngineFrame {
        track,
        data,
        timestamp,
        is_key,
    }
}

/// Collects (id, payload) for the children of a known-size master payload.
fn children(mut buf: &[u8]) -> Vec<(u64, Vec<u8>)> {
    let mut out = Vec::new();
    while let Some(h) = read_element_header(buf) {
        let size = h.size.unwrap() as usize;
        let body = &buf[h.header_len..h.header_len + size];
        out.push((h.id, body.to_vec()));
        buf = &buf[h.header_len + size..];
    }
    out
}

#[test]
fn test_header_written_on_first_frame() {
    let (mut segment, mut writer) = started(SegmentSettings::default());
    let track = segment.add_video_track(&vp8()).unwrap();
    assert_eq!(track, 1);
    assert_eq!(writer.position(), 0);

    segment
        .add_frame(&mut writer, &frame(track, &[0xAA; 10], 0, true))
        .unwrap();

    let metadata = writer.buffer_mut().take().unwrap();
    assert_eq!(metadata.kind, ChunkKind::Metadata);

    let ebml_header = read_element_header(&metadata.data).unwrap();
    assert_eq!(ebml_header.id, ebml::EBML);
    let ebml_len = ebml_header.header_len + ebml_header.size.unwrap() as usize;
    let doc = children(&metadata.data[ebml_header.header_len..ebml_len]);
    assert!(doc.contains(&(ebml::DOC_TYPE, b"webm".to_vec())));

    let rest = &metadata.data[ebml_len..];
    let seg = read_element_header(rest).unwrap();
    assert_eq!(seg.id, ebml::SEGMENT);
    assert_eq!(seg.size, None);

    let top = children(&rest[seg.header_len..]);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].0, ebml::INFO);
    let info = children(&top[0].1);
    assert!(info.contains(&(ebml::TIMECODE_SCALE, vec![0x0F, 0x42, 0x40])));
    assert_eq!(top[1].0, ebml::TRACKS);
    let entries = children(&top[1].1);
    assert_eq!(entries.len(), 1);
    let entry = children(&entries[0].1);
    assert!(entry.contains(&(ebml::TRACK_NUMBER, vec![1])));
    assert!(entry.contains(&(ebml::CODEC_ID, b"V_VP8".to_vec())));
}

/// Payloads of every TrackEntry in a metadata chunk.
fn track_entries(metadata: &[u8]) -> Vec<Vec<(u64, Vec<u8>)>> {
    let ebml_header = read_element_header(metadata).unwrap();
    let rest = &metadata[ebml_header.header_len + ebml_header.size.unwrap() as usize..];
    let seg = read_element_header(rest).unwrap();
    let top = children(&rest[seg.header_len..]);
    let (_, tracks) = top.iter().find(|(id, _)| *id == ebml::TRACKS).unwrap();
    children(tracks)
        .into_iter()
        .map(|(_, entry)| children(&entry))
        .collect()
}

#[test]
fn test_track_entries_carry_config() {
    let (mut segment, mut writer) = started(SegmentSettings::default());
    let video = segment
        .add_video_track(&vp8().with_frame_rate(25.0))
        .unwrap();
    assert_eq!(
        segment.add_audio_track(&AudioConfig::new(48000, 2), &[2, 1, 1, 0xA, 0xB, 0xC]),
        Some(2)
    );
    segment
        .add_frame(&mut writer, &frame(video, &[1], 0, true))
        .unwrap();

    let metadata = writer.buffer_mut().take().unwrap();
    let entries = track_entries(&metadata.data);
    assert_eq!(entries.len(), 2);
    // 40ms per frame
    let default_duration = 40_000_000u64.to_be_bytes()[4..].to_vec();
    assert!(entries[0].contains(&(ebml::DEFAULT_DURATION, default_duration)));
    assert!(entries[1].contains(&(ebml::CODEC_ID, b"A_VORBIS".to_vec())));
    assert!(entries[1].contains(&(ebml::CODEC_PRIVATE, vec![2, 1, 1, 0xA, 0xB, 0xC])));
    assert!(!entries[1].iter().any(|(id, _)| *id == ebml::DEFAULT_DURATION));
}

#[test]
fn test_unknown_frame_rate_omits_default_duration() {
    let (mut segment, mut writer) = started(SegmentSettings::default());
    let video = segment.add_video_track(&vp8()).unwrap();
    segment
        .add_frame(&mut writer, &frame(video, &[1], 0, true))
        .unwrap();
    let metadata = writer.buffer_mut().take().unwrap();
    let entries = track_entries(&metadata.data);
    assert!(!entries[0].iter().any(|(id, _)| *id == ebml::DEFAULT_DURATION));
}

#[test]
fn test_simple_block_layout() {
    let (mut segment, mut writer) = started(SegmentSettings::default());
    let track = segment.add_video_track(&vp8()).unwrap();
    segment
        .add_frame(&mut writer, &frame(track, &[1, 2, 3], 1000, true))
        .unwrap();
    segment
        .add_frame(&mut writer, &frame(track, &[4, 5], 1033, false))
        .unwrap();
    segment.finalize(&mut writer).unwrap();
    writer.close_chunk();

    let _metadata = writer.buffer_mut().take().unwrap();
    let cluster = writer.buffer_mut().take().unwrap();
    assert_eq!(cluster.kind, ChunkKind::Cluster);

    let h = read_element_header(&cluster.data).unwrap();
    assert_eq!(h.id, ebml::CLUSTER);
    assert_eq!(h.size, None);
    let body = children(&cluster.data[h.header_len..]);
    assert_eq!(body[0], (ebml::TIMECODE, vec![0x03, 0xE8]));
    assert_eq!(body[1], (ebml::SIMPLE_BLOCK, vec![0x81, 0x00, 0x00, 0x80, 1, 2, 3]));
    assert_eq!(body[2], (ebml::SIMPLE_BLOCK, vec![0x81, 0x00, 0x21, 0x00, 4, 5]));
}

#[test]
fn test_video_keyframe_starts_cluster() {
    let (mut segment, mut writer) = started(SegmentSettings::default());
    let track = segment.add_video_track(&vp8()).unwrap();
    segment
        .add_frame(&mut writer, &frame(track, &[1], 0, true))
        .unwrap();
    segment
        .add_frame(&mut writer, &frame(track, &[2], 33, false))
        .unwrap();
    // metadata closed by the first cluster, cluster still open
    assert_eq!(writer.buffer_mut().take().unwrap().kind, ChunkKind::Metadata);
    assert!(writer.buffer().ready_len().is_none());

    segment
        .add_frame(&mut writer, &frame(track, &[3], 66, true))
        .unwrap();
    let cluster = writer.buffer_mut().take().unwrap();
    assert_eq!(cluster.kind, ChunkKind::Cluster);
    assert!(writer.buffer().pending_len() > 0);
}

#[test]
fn test_cluster_duration_cuts_audio_only() {
    let settings = SegmentSettings {
        max_cluster_duration: Some(100),
        ..Default::default()
    };
    let (mut segment, mut writer) = started(settings);
    let track = segment
        .add_audio_track(&AudioConfig::new(48000, 2), &[2, 1, 1, 0xA, 0xB, 0xC])
        .unwrap();
    for ts in (0..250).step_by(20) {
        segment
            .add_frame(&mut writer, &frame(track, &[0x55; 4], ts, false))
            .unwrap();
    }
    let mut kinds = Vec::new();
    while let Some(chunk) = writer.buffer_mut().take() {
        kinds.push(chunk.kind);
    }
    // clusters at 0 and 100 are closed, the one at 200 is still open
    assert_eq!(
        kinds,
        vec![ChunkKind::Metadata, ChunkKind::Cluster, ChunkKind::Cluster]
    );
}

#[test]
fn test_relative_timecode_overflow_starts_cluster() {
    let (mut segment, mut writer) = started(SegmentSettings::default());
    let track = segment
        .add_audio_track(&AudioConfig::new(44100, 1), &[2, 1, 1, 1, 2, 3])
        .unwrap();
    segment
        .add_frame(&mut writer, &frame(track, &[1], 0, false))
        .unwrap();
    segment
        .add_frame(&mut writer, &frame(track, &[1], 40_000, false))
        .unwrap();
    assert_eq!(writer.buffer_mut().take().unwrap().kind, ChunkKind::Metadata);
    assert_eq!(writer.buffer_mut().take().unwrap().kind, ChunkKind::Cluster);
}

#[test]
fn test_tracks_locked_after_header() {
    let (mut segment, mut writer) = started(SegmentSettings::default());
    let video = segment.add_video_track(&vp8()).unwrap();
    segment
        .add_frame(&mut writer, &frame(video, &[1], 0, true))
        .unwrap();
    assert!(segment
        .add_audio_track(&AudioConfig::new(48000, 2), &[2, 1, 1, 1, 2, 3])
        .is_none());
}

#[test]
fn test_invalid_track_configs_refused() {
    let mut segment = LiveSegment::new();
    assert!(segment
        .add_video_track(&VideoConfig::new(VideoCodec::Vp9, 0, 240))
        .is_none());
    assert!(segment
        .add_audio_track(&AudioConfig::new(0, 2), &[1])
        .is_none());
    assert!(segment
        .add_audio_track(&AudioConfig::new(48000, 2), &[])
        .is_none());
    assert_eq!(segment.add_video_track(&vp8()), Some(1));
    assert_eq!(
        segment.add_audio_track(&AudioConfig::new(48000, 2), &[1]),
        Some(2)
    );
}

#[test]
fn test_rejected_frames_write_nothing() {
    let (mut segment, mut writer) = started(SegmentSettings::default());
    let track = segment.add_video_track(&vp8()).unwrap();

    assert_eq!(
        segment.add_frame(&mut writer, &frame(track, &[1], -1, true)),
        Err(EngineError::NegativeTimestamp(-1))
    );
    assert_eq!(
        segment.add_frame(&mut writer, &frame(9, &[1], 0, true)),
        Err(EngineError::UnknownTrack(9))
    );
    assert_eq!(writer.position(), 0);

    segment
        .add_frame(&mut writer, &frame(track, &[1], 500, true))
        .unwrap();
    let before = writer.position();
    assert_eq!(
        segment.add_frame(&mut writer, &frame(track, &[1], 400, false)),
        Err(EngineError::TimestampBeforeCluster {
            timestamp: 400,
            cluster: 500
        })
    );
    assert_eq!(writer.position(), before);
}

#[test]
fn test_lifecycle_errors() {
    let mut segment = LiveSegment::new();
    let mut writer = SegmentWriter::new();
    assert_eq!(
        segment.add_frame(&mut writer, &frame(1, &[1], 0, true)),
        Err(EngineError::NotInitialized)
    );
    assert_eq!(
        segment.finalize(&mut writer),
        Err(EngineError::NotInitialized)
    );

    segment
        .init(&mut writer, &SegmentSettings::default())
        .unwrap();
    assert_eq!(
        segment.init(&mut writer, &SegmentSettings::default()),
        Err(EngineError::AlreadyInitialized)
    );
    segment.add_video_track(&vp8()).unwrap();

    // no frames yet: finalize still emits the header
    segment.finalize(&mut writer).unwrap();
    assert!(writer.position() > 0);
    assert_eq!(segment.finalize(&mut writer), Err(EngineError::Finalized));
    assert_eq!(
        segment.add_frame(&mut writer, &frame(1, &[1], 0, true)),
        Err(EngineError::Finalized)
    );
}
