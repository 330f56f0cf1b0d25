use clap::Parser;

/// Ingest a named NDI source, re-encode to H.264 with an embedded Picture
/// Timing SEI, mux with audio into MPEG-TS, and emit to stdout or SRT.
#[derive(Debug, Parser)]
#[command(name = "ndi-tc-relay", version, about)]
pub struct AppConfig {
    /// NDI source name to ingest, as reported by --discover.
    #[arg(long, env = "NDI_TC_RELAY_NDI_NAME")]
    pub ndi_name: Option<String>,

    /// List available NDI sources and exit.
    #[arg(long)]
    pub discover: bool,

    /// SRT output URI, e.g. srt://0.0.0.0:9000?mode=listener.
    #[arg(long, conflicts_with = "stdout")]
    pub srt_uri: Option<String>,

    /// Write the muxed MPEG-TS stream to stdout instead of SRT.
    #[arg(long)]
    pub stdout: bool,

    /// GStreamer video encoder element name, e.g. x264enc or nvh264enc.
    #[arg(long, default_value = "x264enc")]
    pub encoder: String,

    /// Video bitrate in kbps.
    #[arg(long, default_value_t = 6000)]
    pub bitrate: u32,

    /// GOP size in frames; 0 leaves the encoder default.
    #[arg(long, default_value_t = 0)]
    pub gop_size: u32,

    /// Audio codec: aac, mp3, ac3, or smpte302m.
    #[arg(long, default_value = "aac")]
    pub audio_codec: String,

    /// Audio bitrate in kbps; ignored for smpte302m.
    #[arg(long, default_value_t = 128)]
    pub audio_bitrate: u32,

    /// Discard the NDI audio stream instead of muxing it.
    #[arg(long)]
    pub no_audio: bool,

    /// Always passed to x264enc; kept explicit for discoverability.
    #[arg(long, default_value_t = true)]
    pub zerolatency: bool,

    /// Disable Picture Timing SEI injection and SPS VUI patching.
    #[arg(long)]
    pub no_sei: bool,

    /// ndisrc timestamp-mode: auto, timecode, timestamp, or receive.
    #[arg(long, default_value = "timecode")]
    pub timestamp_mode: String,

    /// Auto-exit after this many seconds; 0 disables the timeout and runs
    /// until EOS or a bus error.
    #[arg(long, default_value_t = 0)]
    pub timeout: u64,

    /// Also write the muxed MPEG-TS stream to this file, via a tee
    /// alongside the configured sink.
    #[arg(long)]
    pub dump_ts: Option<String>,

    /// Enable debug-level tracing output.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl AppConfig {
    pub fn timecode_injection_enabled(&self) -> bool {
        !self.no_sei
    }
}
