use proptest::prelude::*;

use ndi_tc_relay::nal::{ebsp_to_rbsp, rbsp_to_ebsp, NalUnitType};
use ndi_tc_relay::patch::patch_pic_struct_and_timing;
use ndi_tc_relay::rewriter::{AccessUnitRewriter, RewriterConfig};
use ndi_tc_relay::scan::scan_access_unit;
use ndi_tc_relay::sps::SpsVuiInfo;

const BASELINE_SPS_EBSP: [u8; 21] = [
    0x42, 0x00, 0x1f, 0xac, 0x34, 0xc8, 0x14, 0x00, 0x00, 0x03, 0x00, 0x04, 0x00, 0x00, 0x03,
    0x00, 0xf0, 0x3c, 0x60, 0xc6, 0x58,
];

fn access_unit_with_idr() -> Vec<u8> {
    let mut buf = vec![0x00, 0x00, 0x00, 0x01, 0x09, 0xf0];
    buf.extend_from_slice(&[0x00, 0x00, 0x01, 0x67]);
    buf.extend_from_slice(&BASELINE_SPS_EBSP);
    buf.extend_from_slice(&[0x00, 0x00, 0x01, 0x65, 0xaa, 0xbb, 0xcc]);
    buf
}

proptest! {
    /// `rbsp_to_ebsp` followed by `ebsp_to_rbsp` must recover the original
    /// RBSP for any byte sequence, since emulation prevention is a pure
    /// insertion/removal pair.
    #[test]
    fn rbsp_ebsp_round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let ebsp = rbsp_to_ebsp(&bytes);
        prop_assert_eq!(ebsp_to_rbsp(&ebsp), bytes);
    }

    /// Whatever frame rate the caller supplies, a successful SPS patch
    /// always declares pic_struct_present_flag and a timing_info consistent
    /// with the requested rate.
    #[test]
    fn patched_sps_always_advertises_pic_struct(
        fps_num in 1u32..240,
        fps_den in 1u32..2,
    ) {
        let patched = patch_pic_struct_and_timing(&BASELINE_SPS_EBSP, 0x67, fps_num, fps_den).unwrap();
        let rbsp = ebsp_to_rbsp(&patched[5..]);
        let vui = SpsVuiInfo::parse(&rbsp).unwrap();

        prop_assert!(vui.pic_struct_present_flag);
        prop_assert!(vui.timing_info_present_flag);
        prop_assert_eq!(vui.num_units_in_tick, fps_den);
        prop_assert_eq!(vui.time_scale, fps_num.saturating_mul(2));
    }

    /// Re-running an already-rewritten access unit through a fresh rewriter
    /// never accumulates extra Picture Timing SEI messages, for any
    /// configured frame rate.
    #[test]
    fn rewriting_is_idempotent_on_sei_count(fps_num in 1u32..120, pts_ns in 0i64..10_000_000_000) {
        let mut first = AccessUnitRewriter::new(RewriterConfig {
            fps_num,
            fps_den: 1,
            ..RewriterConfig::default()
        });
        let once = first.process(&access_unit_with_idr(), Some(0), None).unwrap();

        let mut second = AccessUnitRewriter::new(RewriterConfig {
            fps_num,
            fps_den: 1,
            ..RewriterConfig::default()
        });
        let twice = second.process(&once, Some(pts_ns), None).unwrap();

        let scanned = scan_access_unit(&twice);
        let sei_count = scanned.iter().filter(|s| s.nal.nal_type == NalUnitType::Sei).count();
        prop_assert_eq!(sei_count, 1);
    }
}
