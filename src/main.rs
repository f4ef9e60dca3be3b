use clap::Parser;
use tokio_util::sync::CancellationToken;
use webm_mux::ChunkPublisher;

mod api;
mod config;
mod ivf;
mod pipe;
mod sink;
mod upload;

use config::{Args, LiveConfig};

/// Chunk backlog per subscriber before it starts skipping.
const PUBLISH_CAPACITY: usize = 1024;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("webm_mux", log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = LiveConfig::from(Args::parse());
    log::info!("muxer id {}", config.muxer_id());

    let cancel = CancellationToken::new();
    let publisher = ChunkPublisher::with_capacity(PUBLISH_CAPACITY);
    let pipe = pipe::LivePipe::new(config.clone(), publisher.clone());

    // subscribe the sinks before the first chunk is published
    let mut sinks = Vec::new();
    if let Some(dir) = config.output_dir() {
        let sink = sink::DirSink::new(dir, config.muxer_id());
        let stream = publisher.subscribe();
        sinks.push(tokio::spawn(async move {
            if let Err(e) = sink.run(stream).await {
                log::error!("directory sink error: {:#}", e);
            }
        }));
    }
    if let Some(url) = config.upload_url() {
        let uploader = upload::Uploader::new(url, config.muxer_id());
        let stream = publisher.subscribe();
        sinks.push(tokio::spawn(async move {
            uploader.run(stream).await;
        }));
    }

    let api = match config.http_bind() {
        Some(addr) => {
            let state = api::AppState {
                publisher: publisher.clone(),
                stats: pipe.stats(),
            };
            Some(api::start_api_server(addr, state, cancel.clone()).await?)
        }
        None => None,
    };

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl-C received, finishing stream");
            cancel_clone.cancel();
        }
    });

    let pipe_result = tokio::spawn(pipe.run(cancel.clone())).await?;
    if let Err(e) = &pipe_result {
        log::error!("pipe error: {:#}", e);
    }

    for sink in sinks {
        sink.await?;
    }

    if config.keep_serving() && !cancel.is_cancelled() {
        log::info!("input finished, serving until Ctrl-C");
        cancel.cancelled().await;
    }
    cancel.cancel();
    if let Some(api) = api {
        api.await?;
    }
    pipe_result
}
