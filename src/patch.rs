use crate::bitreader::BitReader;
use crate::bitwriter::BitWriter;
use crate::nal::{assemble_nal, ebsp_to_rbsp};
use crate::sps::vui_flag_bit_offset;
use crate::{Error, Result};

/// Set `pic_struct_present_flag = 1` in place, leaving every other VUI field
/// untouched. Used when no frame-rate override is available, or as the
/// fallback path of [`patch_pic_struct_and_timing`]. Requires a VUI to
/// already be present; an SPS without one fails with
/// [`Error::VuiAbsent`][crate::Error::VuiAbsent].
pub fn patch_pic_struct_flag_to_one(ebsp: &[u8], header_byte: u8) -> Result<Vec<u8>> {
    let rbsp = ebsp_to_rbsp(ebsp);
    let bit_offset = pic_struct_flag_bit_offset(&rbsp)?;

    let byte_idx = bit_offset / 8;
    let bit_in_byte = 7 - (bit_offset % 8);
    if byte_idx >= rbsp.len() {
        return Err(Error::PatchFailure("pic_struct_present_flag out of range".into()));
    }

    let mut patched = rbsp;
    patched[byte_idx] |= 1 << bit_in_byte;

    Ok(assemble_nal(&crate::nal::START_CODE_4, header_byte, &patched))
}

/// Rebuild the SPS RBSP with a synthesized VUI tail declaring
/// `pic_struct_present_flag = 1` and `timing_info` consistent with
/// `fps_num/fps_den`, per spec §4.E's bit table. Falls back to
/// [`patch_pic_struct_flag_to_one`] when the frame rate is unknown.
pub fn patch_pic_struct_and_timing(
    ebsp: &[u8],
    header_byte: u8,
    fps_num: u32,
    fps_den: u32,
) -> Result<Vec<u8>> {
    if fps_num == 0 || fps_den == 0 {
        return patch_pic_struct_flag_to_one(ebsp, header_byte);
    }

    let rbsp = ebsp_to_rbsp(ebsp);
    let vui_flag_bitpos = vui_flag_bit_offset(&rbsp)?;

    let mut copy_reader = BitReader::new(&rbsp);
    let mut writer = BitWriter::with_capacity(rbsp.len() + 16);
    for _ in 0..vui_flag_bitpos {
        let bit = copy_reader.read_bit()?;
        writer.put_bit(bit);
    }

    writer.put_bit(true); // vui_parameters_present_flag
    writer.put_bits(0, 1); // aspect_ratio_info_present_flag
    writer.put_bits(0, 1); // overscan_info_present_flag
    writer.put_bits(0, 1); // video_signal_type_present_flag
    writer.put_bits(0, 1); // chroma_loc_info_present_flag
    writer.put_bits(1, 1); // timing_info_present_flag
    writer.put_bits(fps_den, 32); // num_units_in_tick
    writer.put_bits(fps_num.saturating_mul(2), 32); // time_scale
    writer.put_bits(1, 1); // fixed_frame_rate_flag
    writer.put_bits(0, 1); // nal_hrd_parameters_present_flag
    writer.put_bits(0, 1); // vcl_hrd_parameters_present_flag
    writer.put_bits(1, 1); // pic_struct_present_flag
    writer.put_bits(0, 1); // bitstream_restriction_flag
    writer.put_rbsp_trailing();

    let new_rbsp = writer.into_bytes();
    Ok(assemble_nal(&crate::nal::START_CODE_4, header_byte, &new_rbsp))
}

/// Locate the bit offset of `pic_struct_present_flag` inside an SPS that is
/// already known to carry a VUI, by walking the VUI exactly as
/// [`crate::sps::SpsVuiInfo::parse`] does but discarding the parsed values.
fn pic_struct_flag_bit_offset(rbsp: &[u8]) -> Result<usize> {
    let vui_flag_bitpos = vui_flag_bit_offset(rbsp)?;
    let mut reader = BitReader::new(rbsp);
    reader.seek(vui_flag_bitpos / 8, (vui_flag_bitpos % 8) as u8)?;

    let vui_parameters_present_flag = reader.read_flag()?;
    if !vui_parameters_present_flag {
        return Err(Error::VuiAbsent);
    }

    if reader.read_flag()? {
        let aspect_ratio_idc = reader.read_bits(8)?;
        if aspect_ratio_idc == 255 {
            reader.read_bits(16)?;
            reader.read_bits(16)?;
        }
    }
    if reader.read_flag()? {
        reader.read_bits(1)?;
    }
    if reader.read_flag()? {
        reader.read_bits(3)?;
        if reader.read_flag()? {
            reader.read_bits(8)?;
            reader.read_bits(8)?;
            reader.read_bits(8)?;
        }
    }
    if reader.read_flag()? {
        crate::eg::read_ue(&mut reader)?;
        crate::eg::read_ue(&mut reader)?;
    }

    let timing_info_present_flag = reader.read_flag()?;
    if timing_info_present_flag {
        reader.read_bits(32)?;
        reader.read_bits(32)?;
        reader.read_bits(1)?;
    }

    let nal_hrd = reader.read_flag()?;
    if nal_hrd {
        skip_hrd_parameters(&mut reader)?;
    }
    let vcl_hrd = reader.read_flag()?;
    if vcl_hrd {
        skip_hrd_parameters(&mut reader)?;
    }
    if nal_hrd || vcl_hrd {
        reader.read_bits(1)?;
    }

    let (byte_pos, bit_pos) = reader.position();
    Ok(byte_pos * 8 + bit_pos as usize)
}

fn skip_hrd_parameters(reader: &mut BitReader) -> Result<()> {
    let cpb_cnt_minus1 = crate::eg::read_ue(reader)?;
    reader.read_bits(4)?;
    reader.read_bits(4)?;
    for _ in 0..=cpb_cnt_minus1 {
        crate::eg::read_ue(reader)?;
        crate::eg::read_ue(reader)?;
        reader.read_bits(1)?;
    }
    reader.read_bits(5)?;
    reader.read_bits(5)?;
    reader.read_bits(5)?;
    reader.read_bits(5)?;
    Ok(())
}
