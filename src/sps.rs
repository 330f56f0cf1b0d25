use crate::bitreader::BitReader;
use crate::eg::{read_se, read_ue};
use crate::{Error, Result};

const HIGH_PROFILE_IDCS: [u8; 13] = [
    100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134, 135,
];

#[derive(Debug, Clone)]
pub struct Sps {
    pub profile_idc: u8,
    pub constraint_set0_flag: bool,
    pub constraint_set1_flag: bool,
    pub constraint_set2_flag: bool,
    pub constraint_set3_flag: bool,
    pub constraint_set4_flag: bool,
    pub constraint_set5_flag: bool,
    pub level_idc: u8,
    pub seq_parameter_set_id: u8,

    pub chroma_format_idc: u8,
    pub separate_colour_plane_flag: bool,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub qpprime_y_zero_transform_bypass_flag: bool,
    pub seq_scaling_matrix_present_flag: bool,

    pub log2_max_frame_num_minus4: u8,
    pub pic_order_cnt_type: u8,
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    pub delta_pic_order_always_zero_flag: bool,
    pub offset_for_non_ref_pic: i32,
    pub offset_for_top_to_bottom_field: i32,
    pub num_ref_frames_in_pic_order_cnt_cycle: u8,

    pub max_num_ref_frames: u32,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub pic_width_in_mbs_minus1: u32,
    pub pic_height_in_map_units_minus1: u32,
    pub frame_mbs_only_flag: bool,
    pub mb_adaptive_frame_field_flag: bool,
    pub direct_8x8_inference_flag: bool,

    pub frame_cropping_flag: bool,
    pub frame_crop_left_offset: u32,
    pub frame_crop_right_offset: u32,
    pub frame_crop_top_offset: u32,
    pub frame_crop_bottom_offset: u32,

    pub vui_parameters_present_flag: bool,

    pub width: u32,
    pub height: u32,
}

impl Sps {
    pub fn parse(rbsp: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(rbsp);

        let profile_idc = reader.read_u8()?;
        let constraint_set0_flag = reader.read_flag()?;
        let constraint_set1_flag = reader.read_flag()?;
        let constraint_set2_flag = reader.read_flag()?;
        let constraint_set3_flag = reader.read_flag()?;
        let constraint_set4_flag = reader.read_flag()?;
        let constraint_set5_flag = reader.read_flag()?;
        let _reserved_zero_2bits = reader.read_bits(2)?;
        let level_idc = reader.read_u8()?;

        let seq_parameter_set_id = read_ue(&mut reader)?;
        if seq_parameter_set_id > 31 {
            return Err(Error::MalformedSps("Invalid SPS ID".into()));
        }

        let mut chroma_format_idc = 1;
        let mut separate_colour_plane_flag = false;
        let mut bit_depth_luma_minus8 = 0;
        let mut bit_depth_chroma_minus8 = 0;
        let mut qpprime_y_zero_transform_bypass_flag = false;
        let mut seq_scaling_matrix_present_flag = false;

        if HIGH_PROFILE_IDCS.contains(&profile_idc) {
            chroma_format_idc = read_ue(&mut reader)? as u8;
            if chroma_format_idc > 3 {
                return Err(Error::MalformedSps("Invalid chroma format".into()));
            }

            if chroma_format_idc == 3 {
                separate_colour_plane_flag = reader.read_flag()?;
            }

            bit_depth_luma_minus8 = read_ue(&mut reader)? as u8;
            bit_depth_chroma_minus8 = read_ue(&mut reader)? as u8;
            qpprime_y_zero_transform_bypass_flag = reader.read_flag()?;
            seq_scaling_matrix_present_flag = reader.read_flag()?;

            if seq_scaling_matrix_present_flag {
                let num_lists = if chroma_format_idc != 3 { 8 } else { 12 };
                for i in 0..num_lists {
                    let seq_scaling_list_present_flag = reader.read_flag()?;
                    if seq_scaling_list_present_flag {
                        let size = if i < 6 { 16 } else { 64 };
                        skip_scaling_list(&mut reader, size)?;
                    }
                }
            }
        }

        let log2_max_frame_num_minus4 = read_ue(&mut reader)? as u8;
        if log2_max_frame_num_minus4 > 12 {
            return Err(Error::MalformedSps("Invalid log2_max_frame_num".into()));
        }

        let pic_order_cnt_type = read_ue(&mut reader)? as u8;

        let mut log2_max_pic_order_cnt_lsb_minus4 = 0;
        let mut delta_pic_order_always_zero_flag = false;
        let mut offset_for_non_ref_pic = 0;
        let mut offset_for_top_to_bottom_field = 0;
        let mut num_ref_frames_in_pic_order_cnt_cycle = 0;

        match pic_order_cnt_type {
            0 => {
                log2_max_pic_order_cnt_lsb_minus4 = read_ue(&mut reader)? as u8;
                if log2_max_pic_order_cnt_lsb_minus4 > 12 {
                    return Err(Error::MalformedSps("Invalid log2_max_pic_order_cnt_lsb".into()));
                }
            }
            1 => {
                delta_pic_order_always_zero_flag = reader.read_flag()?;
                offset_for_non_ref_pic = read_se(&mut reader)?;
                offset_for_top_to_bottom_field = read_se(&mut reader)?;
                num_ref_frames_in_pic_order_cnt_cycle = read_ue(&mut reader)? as u8;

                for _ in 0..num_ref_frames_in_pic_order_cnt_cycle {
                    let _offset_for_ref_frame = read_se(&mut reader)?;
                }
            }
            2 => {}
            _ => return Err(Error::MalformedSps("Invalid pic_order_cnt_type".into())),
        }

        let max_num_ref_frames = read_ue(&mut reader)?;
        let gaps_in_frame_num_value_allowed_flag = reader.read_flag()?;

        let pic_width_in_mbs_minus1 = read_ue(&mut reader)?;
        let pic_height_in_map_units_minus1 = read_ue(&mut reader)?;

        let frame_mbs_only_flag = reader.read_flag()?;
        let mut mb_adaptive_frame_field_flag = false;
        if !frame_mbs_only_flag {
            mb_adaptive_frame_field_flag = reader.read_flag()?;
        }

        let direct_8x8_inference_flag = reader.read_flag()?;

        let frame_cropping_flag = reader.read_flag()?;
        let mut frame_crop_left_offset = 0;
        let mut frame_crop_right_offset = 0;
        let mut frame_crop_top_offset = 0;
        let mut frame_crop_bottom_offset = 0;

        if frame_cropping_flag {
            frame_crop_left_offset = read_ue(&mut reader)?;
            frame_crop_right_offset = read_ue(&mut reader)?;
            frame_crop_top_offset = read_ue(&mut reader)?;
            frame_crop_bottom_offset = read_ue(&mut reader)?;
        }

        let vui_parameters_present_flag = reader.read_flag()?;

        let width = (pic_width_in_mbs_minus1 + 1) * 16;
        let height =
            (pic_height_in_map_units_minus1 + 1) * 16 * if frame_mbs_only_flag { 1 } else { 2 };

        let (sub_width_c, sub_height_c) = match chroma_format_idc {
            0 => (0, 0),
            1 => (2, 2),
            2 => (2, 1),
            3 => (1, 1),
            _ => (0, 0),
        };

        let width = if frame_cropping_flag && sub_width_c > 0 {
            width - sub_width_c * (frame_crop_left_offset + frame_crop_right_offset)
        } else {
            width
        };

        let height = if frame_cropping_flag && sub_height_c > 0 {
            let mult = if frame_mbs_only_flag { 1 } else { 2 };
            height - sub_height_c * mult * (frame_crop_top_offset + frame_crop_bottom_offset)
        } else {
            height
        };

        Ok(Sps {
            profile_idc,
            constraint_set0_flag,
            constraint_set1_flag,
            constraint_set2_flag,
            constraint_set3_flag,
            constraint_set4_flag,
            constraint_set5_flag,
            level_idc,
            seq_parameter_set_id: seq_parameter_set_id as u8,
            chroma_format_idc,
            separate_colour_plane_flag,
            bit_depth_luma_minus8,
            bit_depth_chroma_minus8,
            qpprime_y_zero_transform_bypass_flag,
            seq_scaling_matrix_present_flag,
            log2_max_frame_num_minus4,
            pic_order_cnt_type,
            log2_max_pic_order_cnt_lsb_minus4,
            delta_pic_order_always_zero_flag,
            offset_for_non_ref_pic,
            offset_for_top_to_bottom_field,
            num_ref_frames_in_pic_order_cnt_cycle,
            max_num_ref_frames,
            gaps_in_frame_num_value_allowed_flag,
            pic_width_in_mbs_minus1,
            pic_height_in_map_units_minus1,
            frame_mbs_only_flag,
            mb_adaptive_frame_field_flag,
            direct_8x8_inference_flag,
            frame_cropping_flag,
            frame_crop_left_offset,
            frame_crop_right_offset,
            frame_crop_top_offset,
            frame_crop_bottom_offset,
            vui_parameters_present_flag,
            width,
            height,
        })
    }
}

fn skip_scaling_list(reader: &mut BitReader, size: usize) -> Result<()> {
    let mut last_scale = 8;
    let mut next_scale = 8;

    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = read_se(reader)?;
            next_scale = (last_scale + delta_scale + 256) % 256;
        }
        last_scale = if next_scale == 0 { last_scale } else { next_scale };
    }

    Ok(())
}

/// Video Usability Information relevant to Picture Timing SEI construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpsVuiInfo {
    pub vui_present: bool,
    pub pic_struct_present_flag: bool,
    pub cpb_dpb_delays_present_flag: bool,
    pub cpb_removal_delay_length: u8,
    pub dpb_output_delay_length: u8,
    pub time_offset_length: u8,
    pub timing_info_present_flag: bool,
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub fixed_frame_rate_flag: bool,
}

impl SpsVuiInfo {
    /// Conservative default used when no SPS has ever been observed: no HRD,
    /// `pic_struct_present_flag` forced true so the rewriter always emits a
    /// full clock timestamp.
    pub fn conservative_default() -> Self {
        SpsVuiInfo {
            vui_present: false,
            pic_struct_present_flag: true,
            cpb_dpb_delays_present_flag: false,
            cpb_removal_delay_length: 0,
            dpb_output_delay_length: 0,
            time_offset_length: 0,
            timing_info_present_flag: false,
            num_units_in_tick: 0,
            time_scale: 0,
            fixed_frame_rate_flag: false,
        }
    }

    /// Parse an SPS RBSP through to the end of its VUI block, per spec §4.D.
    pub fn parse(rbsp: &[u8]) -> Result<Self> {
        if rbsp.is_empty() {
            return Err(Error::MalformedSps("empty SPS RBSP".into()));
        }
        let profile_idc = rbsp[0];
        let mut reader = BitReader::new(rbsp);

        reader.read_bits(8)?; // profile_idc
        reader.read_bits(6)?; // 6 constraint_set flags
        reader.read_bits(2)?; // reserved_zero_2bits
        reader.read_bits(8)?; // level_idc
        read_ue(&mut reader)?; // seq_parameter_set_id

        if HIGH_PROFILE_IDCS.contains(&profile_idc) {
            let chroma_format_idc = read_ue(&mut reader)?;
            if chroma_format_idc == 3 {
                reader.read_bits(1)?;
            }
            read_ue(&mut reader)?; // bit_depth_luma_minus8
            read_ue(&mut reader)?; // bit_depth_chroma_minus8
            reader.read_bits(1)?; // qpprime_y_zero_transform_bypass_flag
            if reader.read_flag()? {
                let num_lists = if chroma_format_idc != 3 { 8 } else { 12 };
                for i in 0..num_lists {
                    if reader.read_flag()? {
                        let size = if i < 6 { 16 } else { 64 };
                        skip_scaling_list(&mut reader, size)?;
                    }
                }
            }
        }

        read_ue(&mut reader)?; // log2_max_frame_num_minus4
        let pic_order_cnt_type = read_ue(&mut reader)?;
        match pic_order_cnt_type {
            0 => {
                read_ue(&mut reader)?;
            }
            1 => {
                reader.read_bits(1)?;
                read_se(&mut reader)?;
                read_se(&mut reader)?;
                let num_ref = read_ue(&mut reader)?;
                for _ in 0..num_ref {
                    read_se(&mut reader)?;
                }
            }
            _ => {}
        }

        read_ue(&mut reader)?; // max_num_ref_frames
        reader.read_bits(1)?; // gaps_in_frame_num_value_allowed_flag
        read_ue(&mut reader)?; // pic_width_in_mbs_minus1
        read_ue(&mut reader)?; // pic_height_in_map_units_minus1
        let frame_mbs_only_flag = reader.read_flag()?;
        if !frame_mbs_only_flag {
            reader.read_bits(1)?;
        }
        reader.read_bits(1)?; // direct_8x8_inference_flag
        if reader.read_flag()? {
            read_ue(&mut reader)?;
            read_ue(&mut reader)?;
            read_ue(&mut reader)?;
            read_ue(&mut reader)?;
        }

        let vui_parameters_present_flag = reader.read_flag()?;
        if !vui_parameters_present_flag {
            return Ok(SpsVuiInfo {
                vui_present: false,
                ..SpsVuiInfo::conservative_default()
            });
        }

        // VUI body.
        if reader.read_flag()? {
            // aspect_ratio_info_present_flag
            let aspect_ratio_idc = reader.read_bits(8)?;
            if aspect_ratio_idc == 255 {
                reader.read_bits(16)?;
                reader.read_bits(16)?;
            }
        }
        if reader.read_flag()? {
            // overscan_info_present_flag
            reader.read_bits(1)?;
        }
        if reader.read_flag()? {
            // video_signal_type_present_flag
            reader.read_bits(3)?;
            if reader.read_flag()? {
                // colour_description_present_flag
                reader.read_bits(8)?;
                reader.read_bits(8)?;
                reader.read_bits(8)?;
            }
        }
        if reader.read_flag()? {
            // chroma_loc_info_present_flag
            read_ue(&mut reader)?;
            read_ue(&mut reader)?;
        }

        let timing_info_present_flag = reader.read_flag()?;
        let (num_units_in_tick, time_scale, fixed_frame_rate_flag) = if timing_info_present_flag {
            let num_units_in_tick = reader.read_bits(32)?;
            let time_scale = reader.read_bits(32)?;
            let fixed_frame_rate_flag = reader.read_flag()?;
            (num_units_in_tick, time_scale, fixed_frame_rate_flag)
        } else {
            (0, 0, false)
        };

        let mut cpb_removal_delay_length_minus1 = 23u32;
        let mut dpb_output_delay_length_minus1 = 23u32;
        let mut time_offset_length = 24u32;

        let nal_hrd_parameters_present_flag = reader.read_flag()?;
        if nal_hrd_parameters_present_flag {
            parse_hrd_parameters(
                &mut reader,
                &mut cpb_removal_delay_length_minus1,
                &mut dpb_output_delay_length_minus1,
                &mut time_offset_length,
            )?;
        }
        let vcl_hrd_parameters_present_flag = reader.read_flag()?;
        if vcl_hrd_parameters_present_flag {
            parse_hrd_parameters(
                &mut reader,
                &mut cpb_removal_delay_length_minus1,
                &mut dpb_output_delay_length_minus1,
                &mut time_offset_length,
            )?;
        }
        let cpb_dpb_delays_present_flag =
            nal_hrd_parameters_present_flag || vcl_hrd_parameters_present_flag;
        if cpb_dpb_delays_present_flag {
            reader.read_bits(1)?; // low_delay_hrd_flag
        }

        let pic_struct_present_flag = reader.read_flag()?;

        Ok(SpsVuiInfo {
            vui_present: true,
            pic_struct_present_flag,
            cpb_dpb_delays_present_flag,
            cpb_removal_delay_length: (cpb_removal_delay_length_minus1 + 1) as u8,
            dpb_output_delay_length: (dpb_output_delay_length_minus1 + 1) as u8,
            time_offset_length: if cpb_dpb_delays_present_flag {
                time_offset_length as u8
            } else {
                0
            },
            timing_info_present_flag,
            num_units_in_tick,
            time_scale,
            fixed_frame_rate_flag,
        })
    }
}

fn parse_hrd_parameters(
    reader: &mut BitReader,
    cpb_removal_delay_length_minus1: &mut u32,
    dpb_output_delay_length_minus1: &mut u32,
    time_offset_length: &mut u32,
) -> Result<()> {
    let cpb_cnt_minus1 = read_ue(reader)?;
    reader.read_bits(4)?; // bit_rate_scale
    reader.read_bits(4)?; // cpb_size_scale
    for _ in 0..=cpb_cnt_minus1 {
        read_ue(reader)?; // bit_rate_value_minus1
        read_ue(reader)?; // cpb_size_value_minus1
        reader.read_bits(1)?; // cbr_flag
    }
    reader.read_bits(5)?; // initial_cpb_removal_delay_length_minus1
    *cpb_removal_delay_length_minus1 = reader.read_bits(5)?;
    *dpb_output_delay_length_minus1 = reader.read_bits(5)?;
    *time_offset_length = reader.read_bits(5)?;
    Ok(())
}

/// Bit offset (from the start of the RBSP) of `vui_parameters_present_flag`,
/// needed by the SPS patcher to copy everything before it verbatim. Walks
/// the same fields as [`Sps::parse`] but stops just short of the flag.
pub fn vui_flag_bit_offset(rbsp: &[u8]) -> Result<usize> {
    if rbsp.is_empty() {
        return Err(Error::MalformedSps("empty SPS RBSP".into()));
    }
    let profile_idc = rbsp[0];
    let mut reader = BitReader::new(rbsp);

    reader.read_bits(8)?;
    reader.read_bits(6)?;
    reader.read_bits(2)?;
    reader.read_bits(8)?;
    read_ue(&mut reader)?;

    if HIGH_PROFILE_IDCS.contains(&profile_idc) {
        let chroma_format_idc = read_ue(&mut reader)?;
        if chroma_format_idc == 3 {
            reader.read_bits(1)?;
        }
        read_ue(&mut reader)?;
        read_ue(&mut reader)?;
        reader.read_bits(1)?;
        if reader.read_flag()? {
            let num_lists = if chroma_format_idc != 3 { 8 } else { 12 };
            for i in 0..num_lists {
                if reader.read_flag()? {
                    let size = if i < 6 { 16 } else { 64 };
                    skip_scaling_list(&mut reader, size)?;
                }
            }
        }
    }

    read_ue(&mut reader)?;
    let pic_order_cnt_type = read_ue(&mut reader)?;
    match pic_order_cnt_type {
        0 => {
            read_ue(&mut reader)?;
        }
        1 => {
            reader.read_bits(1)?;
            read_se(&mut reader)?;
            read_se(&mut reader)?;
            let num_ref = read_ue(&mut reader)?;
            for _ in 0..num_ref {
                read_se(&mut reader)?;
            }
        }
        _ => {}
    }

    read_ue(&mut reader)?;
    reader.read_bits(1)?;
    read_ue(&mut reader)?;
    read_ue(&mut reader)?;
    let frame_mbs_only_flag = reader.read_flag()?;
    if !frame_mbs_only_flag {
        reader.read_bits(1)?;
    }
    reader.read_bits(1)?;
    if reader.read_flag()? {
        read_ue(&mut reader)?;
        read_ue(&mut reader)?;
        read_ue(&mut reader)?;
        read_ue(&mut reader)?;
    }

    let (byte_pos, bit_pos) = reader.position();
    Ok(byte_pos * 8 + bit_pos as usize)
}
