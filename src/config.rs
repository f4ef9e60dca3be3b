use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};

/// Muxes a VP8/VP9 IVF file into live WebM chunks
#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
    /// IVF file with VP8 or VP9 frames
    pub input: PathBuf,

    /// Session label, also used to name output files. Random when omitted.
    #[clap(short = 'i', long)]
    pub muxer_id: Option<String>,

    /// Cut clusters after this many milliseconds; 0 cuts on keyframes only
    #[clap(short, long, default_value = "0")]
    pub cluster_duration: i64,

    /// Write every chunk to a file in this directory
    #[clap(short, long)]
    pub output_dir: Option<PathBuf>,

    /// POST every chunk to this URL
    #[clap(short, long)]
    pub upload_url: Option<String>,

    /// Serve the live stream over HTTP on this address
    #[clap(short = 'b', long)]
    pub http_bind: Option<SocketAddr>,

    /// Feed frames at their timestamps instead of as fast as possible
    #[clap(short, long)]
    pub realtime: bool,

    /// Keep serving after the input ends, until Ctrl-C
    #[clap(short, long)]
    pub keep_serving: bool,
}

#[derive(Debug, Clone)]
pub struct LiveConfig {
    input: PathBuf,
    muxer_id: String,
    cluster_duration_ms: i64,
    output_dir: Option<PathBuf>,
    upload_url: Option<String>,
    http_bind: Option<SocketAddr>,
    realtime: bool,
    keep_serving: bool,
}

impl LiveConfig {
    #[cfg(test)]
    pub fn new(input: impl Into<PathBuf>, muxer_id: &str) -> Self {
        Self {
            input: input.into(),
            muxer_id: muxer_id.to_string(),
            cluster_duration_ms: 0,
            output_dir: None,
            upload_url: None,
            http_bind: None,
            realtime: false,
            keep_serving: false,
        }
    }

    #[cfg(test)]
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn input(&self) -> &PathBuf {
        &self.input
    }

    pub fn muxer_id(&self) -> &str {
        &self.muxer_id
    }

    pub fn cluster_duration_ms(&self) -> i64 {
        self.cluster_duration_ms
    }

    pub fn output_dir(&self) -> Option<&PathBuf> {
        self.output_dir.as_ref()
    }

    pub fn upload_url(&self) -> Option<&str> {
        self.upload_url.as_deref()
    }

    pub fn http_bind(&self) -> Option<SocketAddr> {
        self.http_bind
    }

    pub fn realtime(&self) -> bool {
        self.realtime
    }

    pub fn keep_serving(&self) -> bool {
        self.keep_serving && self.http_bind.is_some()
    }
}

impl From<Args> for LiveConfig {
    fn from(args: Args) -> Self {
        let muxer_id = args
            .muxer_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        Self {
            input: args.input,
            muxer_id,
            cluster_duration_ms: args.cluster_duration,
            output_dir: args.output_dir,
            upload_url: args.upload_url,
            http_bind: args.http_bind,
            realtime: args.realtime,
            keep_serving: args.keep_serving,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_into_config() {
        let args = Args::parse_from([
            "webmlive",
            "in.ivf",
            "--muxer-id",
            "cam1",
            "--cluster-duration",
            "2000",
            "--http-bind",
            "127.0.0.1:8080",
            "--keep-serving",
        ]);
        let config = LiveConfig::from(args);
        assert_eq!(config.muxer_id(), "cam1");
        assert_eq!(config.cluster_duration_ms(), 2000);
        assert_eq!(config.http_bind(), Some("127.0.0.1:8080".parse().unwrap()));
        assert!(config.keep_serving());
        assert!(!config.realtime());
        assert!(config.output_dir().is_none());
    }

    #[test]
    fn test_generated_muxer_id() {
        let config = LiveConfig::from(Args::parse_from(["webmlive", "in.ivf", "-k"]));
        assert_eq!(config.muxer_id().len(), 32);
        // nothing to keep serving without an http listener
        assert!(!config.keep_serving());
    }
}
