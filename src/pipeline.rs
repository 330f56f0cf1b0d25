use std::sync::{Arc, Mutex};

use gstreamer as gst;
use gstreamer::prelude::*;

use crate::cli::AppConfig;
use crate::rewriter::{AccessUnitRewriter, RewriterConfig};

/// Build the `gst_parse_launch` pipeline description: NDI source demuxed
/// into video and audio branches, video re-encoded to H.264 and parsed back
/// to Annex B access units, muxed into MPEG-TS, and sent to the configured
/// sink. Named elements (`src`, `enc`, `h264parse`, `mux`) are addressed
/// later by [`install_rewriter_probe`] and by tests.
pub fn build_pipeline_description(config: &AppConfig) -> anyhow::Result<String> {
    let ndi_name = config
        .ndi_name
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("--ndi-name is required unless --discover is given"))?;

    let output_section = if config.stdout {
        "fdsink fd=1 sync=false".to_string()
    } else {
        let uri = config
            .srt_uri
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--srt-uri is required unless --stdout is given"))?;
        format!("srtsink uri=\"{uri}\" wait-for-connection=false sync=false")
    };

    let gop_param = if config.gop_size > 0 {
        format!("key-int-max={} ", config.gop_size)
    } else {
        String::new()
    };

    let audio_section = if config.no_audio {
        "src.audio ! queue ! fakesink sync=false".to_string()
    } else {
        format!(
            "src.audio ! queue ! {} ! mux.",
            audio_encode_chain(&config.audio_codec, config.audio_bitrate)
        )
    };

    // With --dump-ts, the muxed stream fans out through a tee: one branch to
    // the configured sink, one branch to a filesink at the given path.
    let mux_fanout = match config.dump_ts.as_deref() {
        Some(path) => format!(
            "mux. ! tee name=tsout \
             tsout. ! queue leaky=2 max-size-time=2000000000 ! {output_section} \
             tsout. ! queue ! filesink location=\"{path}\""
        ),
        None => format!("mux. ! queue leaky=2 max-size-time=2000000000 ! {output_section}"),
    };

    Ok(format!(
        "ndisrc ndi-name=\"{ndi_name}\" timestamp-mode={timestamp_mode} ! ndisrcdemux name=src \
         src.video ! queue ! videoconvert ! video/x-raw,format=I420 ! \
         {encoder} name=enc tune=zerolatency speed-preset=ultrafast {gop_param}bitrate={bitrate} \
         aud=false byte-stream=true insert-vui=false interlaced=false nal-hrd=none ! \
         h264parse name=h264parse disable-passthrough=true config-interval=1 ! \
         video/x-h264,stream-format=byte-stream,alignment=au ! mpegtsmux name=mux \
         {audio_section} \
         {mux_fanout}",
        ndi_name = ndi_name,
        timestamp_mode = config.timestamp_mode,
        encoder = config.encoder,
        bitrate = config.bitrate,
    ))
}

/// GStreamer element chain for one audio codec choice, per spec §4.I.
/// Unknown codec names fall back to AAC rather than failing the pipeline.
fn audio_encode_chain(audio_codec: &str, bitrate_kbps: u32) -> String {
    match audio_codec {
        "aac" => aac_chain(bitrate_kbps),
        "mp3" => {
            if bitrate_kbps > 0 {
                format!("audioconvert ! lamemp3enc bitrate={bitrate_kbps}")
            } else {
                "audioconvert ! lamemp3enc".to_string()
            }
        }
        "ac3" => {
            if bitrate_kbps > 0 {
                format!("audioconvert ! avenc_ac3 bitrate={}", bitrate_kbps * 1000)
            } else {
                "audioconvert ! avenc_ac3".to_string()
            }
        }
        "smpte302m" => {
            "audioconvert ! audio/x-raw,format=S16LE,channels=2,rate=48000 ! avenc_s302m"
                .to_string()
        }
        other => {
            tracing::warn!(codec = other, "unknown audio codec, falling back to aac");
            aac_chain(bitrate_kbps)
        }
    }
}

fn aac_chain(bitrate_kbps: u32) -> String {
    if bitrate_kbps > 0 {
        format!("audioconvert ! avenc_aac bitrate={}", bitrate_kbps * 1000)
    } else {
        "audioconvert ! avenc_aac".to_string()
    }
}

/// Build, wire, and run the pipeline until EOS or a bus error.
pub fn run(config: AppConfig) -> anyhow::Result<()> {
    gst::init()?;

    let pipeline_desc = build_pipeline_description(&config)?;
    tracing::debug!(pipeline = %pipeline_desc, "launching pipeline");

    let element = gst::parse::launch(&pipeline_desc)?;
    let pipeline = element
        .downcast::<gst::Pipeline>()
        .map_err(|_| anyhow::anyhow!("gst_parse_launch did not produce a Pipeline"))?;

    if config.timecode_injection_enabled() {
        install_rewriter_probe(&pipeline, &config)?;
    }

    pipeline.set_state(gst::State::Playing)?;
    tracing::info!(ndi_name = ?config.ndi_name, "running");

    // `--timeout 0` disables auto-exit; otherwise poll the bus with a
    // bounded wait per iteration so the deadline is checked even when no
    // message arrives, per original_source's `g_timeout_add_seconds`.
    let bus = pipeline.bus().expect("a Pipeline always owns a bus");
    let deadline = (config.timeout > 0)
        .then(|| std::time::Instant::now() + std::time::Duration::from_secs(config.timeout));

    loop {
        let poll_timeout = match deadline {
            Some(d) => {
                let remaining = d.saturating_duration_since(std::time::Instant::now());
                if remaining.is_zero() {
                    tracing::info!(timeout_seconds = config.timeout, "auto-exit timeout reached");
                    break;
                }
                gst::ClockTime::from_nseconds(remaining.as_nanos().min(u64::MAX as u128) as u64)
            }
            None => gst::ClockTime::from_seconds(1),
        };

        let Some(msg) = bus.timed_pop(poll_timeout) else {
            continue;
        };
        match msg.view() {
            gst::MessageView::Eos(..) => {
                tracing::info!("end of stream");
                break;
            }
            gst::MessageView::Error(err) => {
                tracing::error!(
                    src = ?err.src().map(|s| s.path_string()),
                    error = %err.error(),
                    debug = ?err.debug(),
                    "pipeline error"
                );
                break;
            }
            _ => {}
        }
    }

    pipeline.set_state(gst::State::Null)?;
    Ok(())
}

/// Attach a buffer probe to `h264parse`'s src pad that rewrites every
/// access unit in place via [`AccessUnitRewriter`], preserving the
/// buffer's original timestamps and metadata.
fn install_rewriter_probe(pipeline: &gst::Pipeline, config: &AppConfig) -> anyhow::Result<()> {
    let h264parse = pipeline
        .by_name("h264parse")
        .ok_or_else(|| anyhow::anyhow!("pipeline has no element named h264parse"))?;
    let src_pad = h264parse
        .static_pad("src")
        .ok_or_else(|| anyhow::anyhow!("h264parse has no src pad"))?;

    let rewriter = Arc::new(Mutex::new(AccessUnitRewriter::new(RewriterConfig {
        inject_sei: true,
        prefer_pts: true,
        fps_num: 0,
        fps_den: 0,
        verbose: config.verbose,
    })));

    src_pad.add_probe(gst::PadProbeType::BUFFER, move |_pad, probe_info| {
        let Some(gst::PadProbeData::Buffer(buffer)) = probe_info.data.take() else {
            return gst::PadProbeReturn::Ok;
        };

        let pts_ns = buffer.pts().map(|p| p.nseconds() as i64);

        let rewritten = match buffer.map_readable() {
            Ok(map) => {
                let mut rw = rewriter.lock().expect("rewriter mutex poisoned");
                rw.process(map.as_slice(), pts_ns, None)
            }
            Err(_) => {
                probe_info.data = Some(gst::PadProbeData::Buffer(buffer));
                return gst::PadProbeReturn::Ok;
            }
        };

        match rewritten {
            Ok(bytes) => {
                let mut new_buffer = gst::Buffer::from_mut_slice(bytes);
                if let Some(new_buffer_ref) = new_buffer.get_mut() {
                    let _ = new_buffer_ref.copy_into(
                        &buffer,
                        gst::BufferCopyFlags::METADATA | gst::BufferCopyFlags::TIMESTAMPS,
                        0,
                        None,
                    );
                }
                probe_info.data = Some(gst::PadProbeData::Buffer(new_buffer));
            }
            Err(err) => {
                tracing::warn!(%err, "access unit rewrite failed, passing through unmodified");
                probe_info.data = Some(gst::PadProbeData::Buffer(buffer));
            }
        }

        gst::PadProbeReturn::Ok
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            ndi_name: Some("CAM1".to_string()),
            discover: false,
            srt_uri: None,
            stdout: true,
            encoder: "x264enc".to_string(),
            bitrate: 6000,
            gop_size: 0,
            audio_codec: "aac".to_string(),
            audio_bitrate: 128,
            no_audio: false,
            zerolatency: true,
            no_sei: false,
            timestamp_mode: "timecode".to_string(),
            timeout: 10,
            dump_ts: None,
            verbose: false,
        }
    }

    #[test]
    fn pipeline_description_includes_named_elements() {
        let desc = build_pipeline_description(&base_config()).unwrap();
        assert!(desc.contains("name=src"));
        assert!(desc.contains("name=enc"));
        assert!(desc.contains("name=h264parse"));
        assert!(desc.contains("name=mux"));
        assert!(desc.contains("fdsink fd=1"));
    }

    #[test]
    fn encoder_selects_the_gstreamer_element() {
        let mut cfg = base_config();
        cfg.encoder = "nvh264enc".to_string();
        let desc = build_pipeline_description(&cfg).unwrap();
        assert!(desc.contains("nvh264enc name=enc"));
        assert!(!desc.contains("x264enc name=enc"));
    }

    #[test]
    fn srt_output_requires_uri() {
        let mut cfg = base_config();
        cfg.stdout = false;
        assert!(build_pipeline_description(&cfg).is_err());

        cfg.srt_uri = Some("srt://0.0.0.0:9000?mode=listener".to_string());
        let desc = build_pipeline_description(&cfg).unwrap();
        assert!(desc.contains("srtsink uri=\"srt://0.0.0.0:9000?mode=listener\""));
    }

    #[test]
    fn unknown_audio_codec_falls_back_to_aac() {
        assert_eq!(audio_encode_chain("dts", 0), aac_chain(0));
    }

    #[test]
    fn smpte302m_ignores_bitrate() {
        let chain = audio_encode_chain("smpte302m", 192);
        assert!(chain.contains("avenc_s302m"));
        assert!(!chain.contains("bitrate"));
    }

    #[test]
    fn no_audio_routes_to_fakesink() {
        let mut cfg = base_config();
        cfg.no_audio = true;
        let desc = build_pipeline_description(&cfg).unwrap();
        assert!(desc.contains("fakesink"));
    }

    #[test]
    fn dump_ts_fans_the_mux_output_out_through_a_tee() {
        let mut cfg = base_config();
        cfg.dump_ts = Some("/tmp/debug.ts".to_string());
        let desc = build_pipeline_description(&cfg).unwrap();
        assert!(desc.contains("tee name=tsout"));
        assert!(desc.contains("filesink location=\"/tmp/debug.ts\""));
        assert!(desc.contains("fdsink fd=1"));
    }

    #[test]
    fn without_dump_ts_no_tee_is_inserted() {
        let desc = build_pipeline_description(&base_config()).unwrap();
        assert!(!desc.contains("tee name=tsout"));
    }
}
