use crate::nal::{Nal, NalUnitType};

/// One NAL located inside an access unit buffer, with its position
/// preserved so the rewriter can splice around it in the output buffer.
#[derive(Debug, Clone)]
pub struct ScannedNal {
    /// Offset of the start code in the source buffer.
    pub start_code_offset: usize,
    /// Offset just past the start code, where the NAL header byte lives.
    pub nal_offset: usize,
    /// Offset one past the end of this NAL's payload (exclusive), i.e. the
    /// start of the next start code or the end of the buffer.
    pub end_offset: usize,
    pub nal: Nal,
}

/// Scan a complete access unit buffer (alignment=au, per the input
/// contract) into its constituent NAL units, in stream order.
///
/// Unlike a streaming scanner, this assumes the whole buffer is available
/// up front and every start code it finds delimits a complete NAL; a
/// trailing partial NAL with no following start code runs to the end of
/// the buffer.
pub fn scan_access_unit(buf: &[u8]) -> Vec<ScannedNal> {
    let starts = find_start_codes(buf);

    // A buffer not beginning with a start code isn't Annex B; the caller's
    // only passthrough signal is an empty result, so don't report any NALs
    // found deeper in rather than silently dropping the leading bytes.
    if starts.first().map(|&(offset, _)| offset) != Some(0) {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(starts.len());

    for (i, &(offset, code_len)) in starts.iter().enumerate() {
        let nal_offset = offset + code_len;
        let end_offset = starts.get(i + 1).map(|&(next, _)| next).unwrap_or(buf.len());
        if nal_offset >= end_offset {
            continue;
        }
        if let Ok(nal) = Nal::parse(code_len as u8, &buf[nal_offset..end_offset]) {
            out.push(ScannedNal {
                start_code_offset: offset,
                nal_offset,
                end_offset,
                nal,
            });
        }
    }

    out
}

/// Find every Annex B start code (`00 00 01` or `00 00 00 01`) in `buf`,
/// returning `(offset, code_len)` pairs in ascending order. Prefers the
/// 4-byte form when both prefixes match at the same offset.
fn find_start_codes(buf: &[u8]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 2 < buf.len() {
        if buf[i] == 0x00 && buf[i + 1] == 0x00 {
            if buf[i + 2] == 0x01 {
                out.push((i, 3));
                i += 3;
                continue;
            }
            if i + 3 < buf.len() && buf[i + 2] == 0x00 && buf[i + 3] == 0x01 {
                out.push((i, 4));
                i += 4;
                continue;
            }
        }
        i += 1;
    }
    out
}

pub fn first_of_type(scanned: &[ScannedNal], nal_type: NalUnitType) -> Option<&ScannedNal> {
    scanned.iter().find(|s| s.nal.nal_type == nal_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_three_nal_access_unit() {
        let buf = [
            0x00, 0x00, 0x00, 0x01, 0x09, 0xf0, // AUD
            0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1f, // SPS
            0x00, 0x00, 0x01, 0x65, 0xaa, 0xbb, // IDR slice
        ];
        let scanned = scan_access_unit(&buf);
        assert_eq!(scanned.len(), 3);
        assert_eq!(scanned[0].nal.nal_type, NalUnitType::Aud);
        assert_eq!(scanned[0].start_code_offset, 0);
        assert_eq!(scanned[1].nal.nal_type, NalUnitType::Sps);
        assert_eq!(scanned[2].nal.nal_type, NalUnitType::IdrSlice);
        assert_eq!(scanned[2].end_offset, buf.len());
    }

    #[test]
    fn empty_buffer_yields_no_nals() {
        assert!(scan_access_unit(&[]).is_empty());
    }

    #[test]
    fn buffer_not_starting_with_a_start_code_yields_no_nals() {
        let buf = [
            0xde, 0xad, 0xbe, 0xef, // garbage prefix, not a start code
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1f, // SPS, later in the buffer
        ];
        assert!(scan_access_unit(&buf).is_empty());
    }

    #[test]
    fn first_of_type_finds_sps() {
        let buf = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1f, 0x00, 0x00, 0x01, 0x65, 0xaa,
        ];
        let scanned = scan_access_unit(&buf);
        let sps = first_of_type(&scanned, NalUnitType::Sps);
        assert!(sps.is_some());
    }
}
