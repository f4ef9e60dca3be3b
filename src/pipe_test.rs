use bytes::Bytes;
use futures::StreamExt;
use webm_mux::{Chunk, ChunkKind};

use super::*;

/// VP8 IVF at 25 fps from (pts, keyframe) pairs.
fn vp8_ivf_frames(frames: &[(u64, bool)]) -> Bytes {
    let mut out = Vec::new();
    out.extend_from_slice(b"DKIF");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&32u16.to_le_bytes());
    out.extend_from_slice(b"VP80");
    out.extend_from_slice(&176u16.to_le_bytes());
    out.extend_from_slice(&144u16.to_le_bytes());
    out.extend_from_slice(&25u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&(frames.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for (i, (pts, key)) in frames.iter().enumerate() {
        let tag = if *key { 0x00 } else { 0x01 };
        let payload = [tag, 0x9D, 0x01, 0x2A, i as u8];
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&pts.to_le_bytes());
        out.extend_from_slice(&payload);
    }
    Bytes::from(out)
}

/// VP8 IVF with a keyframe every `gop` frames.
fn vp8_ivf(frames: u32, gop: u32) -> Bytes {
    let frames: Vec<(u64, bool)> = (0..frames).map(|i| (i as u64, i % gop == 0)).collect();
    vp8_ivf_frames(&frames)
}

#[tokio::test]
async fn test_pipe_publishes_every_chunk() -> anyhow::Result<()> {
    let publisher = ChunkPublisher::with_capacity(256);
    let stream = publisher.subscribe();
    let pipe = LivePipe::new(LiveConfig::new("mem.ivf", "pipe-test"), publisher);
    let stats = pipe.stats();

    let reader = IvfReader::new(vp8_ivf(50, 10))?;
    pipe.run_reader(reader, CancellationToken::new()).await?;

    let chunks: Vec<Chunk> = stream.collect().await;
    assert_eq!(chunks[0].kind, ChunkKind::Metadata);
    // 5 keyframes, 5 clusters
    assert_eq!(chunks.len(), 6);

    let stats = read_stats(&stats);
    assert!(stats.finished);
    assert_eq!(stats.muxer_id, "pipe-test");
    assert_eq!(stats.codec, "VP8");
    assert_eq!(stats.frames_written, 50);
    assert_eq!(stats.keyframes, 5);
    assert_eq!(stats.chunks_published, 6);
    assert_eq!(
        stats.bytes_published,
        chunks.iter().map(|c| c.len() as u64).sum::<u64>()
    );
    assert_eq!(stats.muxer_time_ms, 49 * 40);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_pipe_still_finalizes() -> anyhow::Result<()> {
    let publisher = ChunkPublisher::new();
    let stream = publisher.subscribe();
    let config = LiveConfig::new("mem.ivf", "cancelled").with_realtime(true);
    let pipe = LivePipe::new(config, publisher.clone());

    let cancel = CancellationToken::new();
    cancel.cancel();
    pipe.run_reader(IvfReader::new(vp8_ivf(10, 5))?, cancel).await?;

    assert!(publisher.is_finished());
    let chunks: Vec<Chunk> = stream.collect().await;
    // header only: no frame got through before the cancel
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].is_metadata());
    Ok(())
}

#[tokio::test]
async fn test_missing_input_finishes_publisher() {
    let publisher = ChunkPublisher::new();
    let config = LiveConfig::new("/nonexistent/input.ivf", "missing");
    let pipe = LivePipe::new(config, publisher.clone());
    let stats = pipe.stats();

    assert!(pipe.run(CancellationToken::new()).await.is_err());
    assert!(publisher.is_finished());
    assert!(read_stats(&stats).finished);
}

#[tokio::test]
async fn test_rejected_frame_reports_status() -> anyhow::Result<()> {
    let publisher = ChunkPublisher::new();
    let stream = publisher.subscribe();
    let pipe = LivePipe::new(LiveConfig::new("mem.ivf", "backwards"), publisher.clone());
    let stats = pipe.stats();

    // second frame lands before the open cluster's timecode
    let reader = IvfReader::new(vp8_ivf_frames(&[(5, true), (0, false)]))?;
    let err = pipe
        .run_reader(reader, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("rejected with status -6"));

    // the first frame's cluster is still closed and delivered
    assert!(publisher.is_finished());
    let chunks: Vec<Chunk> = stream.collect().await;
    assert_eq!(chunks.len(), 2);
    assert_eq!(read_stats(&stats).frames_written, 1);
    Ok(())
}
