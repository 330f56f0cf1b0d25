use crate::bitreader::BitReader;
use crate::bitwriter::BitWriter;
use crate::nal::assemble_nal;
use crate::timecode::TimecodeSample;
use crate::{Error, Result};

/// `payloadType = 1`: Picture Timing.
pub const PAYLOAD_TYPE_PIC_TIMING: u32 = 1;

/// A decoded Picture Timing SEI payload carrying a full clock timestamp.
/// Only the fields the rewriter produces or needs to verify are modeled;
/// other SEI payload types are out of scope (spec Non-goals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PicTiming {
    pub full_timestamp_flag: bool,
    pub cnt_dropped_flag: bool,
    pub n_frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub time_offset: Option<i64>,
}

/// Build a complete Annex B SEI NAL for Picture Timing with a full clock
/// timestamp, per spec §4.F's bit table.
///
/// `time_offset_length` is the HRD-derived field width in bits; it is zero
/// whenever no HRD parameters were present in the SPS, in which case
/// `time_offset` is omitted entirely.
pub fn build_pic_timing_sei(sample: &TimecodeSample, time_offset_length: u8) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.put_bits(0, 4); // pic_struct = 0 (frame)
    bw.put_bits(1, 1); // clock_timestamp_flag[0]
    bw.put_bits(0, 2); // ct_type
    bw.put_bits(0, 1); // nuit_field_based_flag
    bw.put_bits(0, 5); // counting_type
    bw.put_bits(1, 1); // full_timestamp_flag
    bw.put_bits(0, 1); // discontinuity_flag
    bw.put_bits(sample.drop_frame as u32, 1); // cnt_dropped_flag
    bw.put_bits(sample.frames as u32, 8); // n_frames
    bw.put_bits(sample.seconds as u32, 6); // seconds_value
    bw.put_bits(sample.minutes as u32, 6); // minutes_value
    bw.put_bits(sample.hours as u32, 5); // hours_value
    if time_offset_length > 0 {
        bw.put_bits(0, time_offset_length as u32); // time_offset
    }
    bw.flush_zero_align();
    let payload = bw.into_bytes();

    let mut sei_rbsp = Vec::with_capacity(payload.len() + 4);
    write_sei_header_field(&mut sei_rbsp, PAYLOAD_TYPE_PIC_TIMING);
    write_sei_header_field(&mut sei_rbsp, payload.len() as u32);
    sei_rbsp.extend_from_slice(&payload);
    sei_rbsp.push(0x80); // rbsp_trailing_bits for the NAL itself

    assemble_nal(&crate::nal::START_CODE_4, 0x06, &sei_rbsp)
}

fn write_sei_header_field(out: &mut Vec<u8>, mut value: u32) {
    while value >= 255 {
        out.push(255);
        value -= 255;
    }
    out.push(value as u8);
}

/// Parse a Picture Timing SEI message from an SEI NAL's RBSP. Expects the
/// single-message, `full_timestamp_flag = 1` shape this crate always
/// produces; used by tests to verify round-tripping (spec P8).
pub fn parse_pic_timing(rbsp: &[u8], time_offset_length: u8) -> Result<PicTiming> {
    let mut pos = 0usize;
    let mut payload_type = 0u32;
    while pos < rbsp.len() && rbsp[pos] == 0xFF {
        payload_type += 255;
        pos += 1;
    }
    if pos >= rbsp.len() {
        return Err(Error::BitstreamError("truncated SEI payload type".into()));
    }
    payload_type += rbsp[pos] as u32;
    pos += 1;

    if payload_type != PAYLOAD_TYPE_PIC_TIMING {
        return Err(Error::BitstreamError(format!(
            "expected Picture Timing SEI (payloadType=1), got {payload_type}"
        )));
    }

    let mut payload_size = 0u32;
    while pos < rbsp.len() && rbsp[pos] == 0xFF {
        payload_size += 255;
        pos += 1;
    }
    if pos >= rbsp.len() {
        return Err(Error::BitstreamError("truncated SEI payload size".into()));
    }
    payload_size += rbsp[pos] as u32;
    pos += 1;

    let payload_end = (pos + payload_size as usize).min(rbsp.len());
    let mut reader = BitReader::new(&rbsp[pos..payload_end]);

    reader.read_bits(4)?; // pic_struct
    let clock_timestamp_flag = reader.read_flag()?;
    if !clock_timestamp_flag {
        return Err(Error::BitstreamError("no clock_timestamp present".into()));
    }
    reader.read_bits(2)?; // ct_type
    reader.read_bits(1)?; // nuit_field_based_flag
    reader.read_bits(5)?; // counting_type
    let full_timestamp_flag = reader.read_flag()?;
    reader.read_bits(1)?; // discontinuity_flag
    let cnt_dropped_flag = reader.read_flag()?;
    let n_frames = reader.read_u8()?;
    let seconds = reader.read_bits(6)? as u8;
    let minutes = reader.read_bits(6)? as u8;
    let hours = reader.read_bits(5)? as u8;
    let time_offset = if time_offset_length > 0 {
        Some(reader.read_bits(time_offset_length as u32)? as i64)
    } else {
        None
    };

    Ok(PicTiming {
        full_timestamp_flag,
        cnt_dropped_flag,
        n_frames,
        seconds,
        minutes,
        hours,
        time_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_parse_round_trip() {
        let sample = TimecodeSample {
            hours: 1,
            minutes: 2,
            seconds: 3,
            frames: 4,
            drop_frame: false,
        };
        let nal = build_pic_timing_sei(&sample, 0);
        assert_eq!(&nal[..5], &[0x00, 0x00, 0x00, 0x01, 0x06]);

        let rbsp = crate::nal::ebsp_to_rbsp(&nal[5..]);
        // Strip rbsp_trailing_bits (final 0x80) before payload parsing.
        let rbsp = &rbsp[..rbsp.len() - 1];
        let timing = parse_pic_timing(rbsp, 0).unwrap();

        assert!(timing.full_timestamp_flag);
        assert!(!timing.cnt_dropped_flag);
        assert_eq!(timing.n_frames, 4);
        assert_eq!(timing.seconds, 3);
        assert_eq!(timing.minutes, 2);
        assert_eq!(timing.hours, 1);
        assert_eq!(timing.time_offset, None);
    }

    #[test]
    fn drop_frame_flag_survives_round_trip() {
        let sample = TimecodeSample {
            hours: 23,
            minutes: 59,
            seconds: 59,
            frames: 29,
            drop_frame: true,
        };
        let nal = build_pic_timing_sei(&sample, 0);
        let rbsp = crate::nal::ebsp_to_rbsp(&nal[5..]);
        let rbsp = &rbsp[..rbsp.len() - 1];
        let timing = parse_pic_timing(rbsp, 0).unwrap();
        assert!(timing.cnt_dropped_flag);
        assert_eq!(timing.hours, 23);
        assert_eq!(timing.n_frames, 29);
    }

    #[test]
    fn rejects_non_pic_timing_payload_type() {
        // payloadType = 6 (RecoveryPoint), payloadSize = 1, one byte.
        let rbsp = vec![6, 1, 0x00];
        let err = parse_pic_timing(&rbsp, 0).unwrap_err();
        assert!(matches!(err, Error::BitstreamError(_)));
    }
}
