use afl::*;

use ndi_tc_relay::rewriter::{AccessUnitRewriter, RewriterConfig};

fn main() {
    fuzz!(|data: &[u8]| {
        let mut rewriter = AccessUnitRewriter::new(RewriterConfig {
            fps_num: 25,
            fps_den: 1,
            ..RewriterConfig::default()
        });
        let _ = rewriter.process(data, Some(0), None);
    })
}
