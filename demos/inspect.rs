use std::fs::File;
use std::io::Read;

use ndi_tc_relay::nal::NalUnitType;
use ndi_tc_relay::rewriter::{AccessUnitRewriter, RewriterConfig};
use ndi_tc_relay::scan::scan_access_unit;

/// Rewrite a raw Annex B access unit file (one buffer, alignment=au) and
/// report what changed: whether a Picture Timing SEI was injected, whether
/// the SPS was patched, and the NAL composition before and after.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <access_unit.h264>", args[0]);
        return Ok(());
    }

    let mut file = File::open(&args[1])?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    let before = scan_access_unit(&buffer);
    println!("Input NALs: {:?}", before.iter().map(|s| s.nal.nal_type).collect::<Vec<_>>());

    let mut rewriter = AccessUnitRewriter::new(RewriterConfig {
        fps_num: 25,
        fps_den: 1,
        ..RewriterConfig::default()
    });
    let rewritten = rewriter.process(&buffer, Some(0), None)?;

    let after = scan_access_unit(&rewritten);
    println!("Output NALs: {:?}", after.iter().map(|s| s.nal.nal_type).collect::<Vec<_>>());

    let injected_sei = after.iter().any(|s| s.nal.nal_type == NalUnitType::Sei);
    println!("Picture Timing SEI injected: {injected_sei}");
    println!("SPS cached for reuse on future access units: {}", rewriter.has_cached_sps());

    Ok(())
}
