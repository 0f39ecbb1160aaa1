//! H.265/HEVC 参数集 (VPS/SPS/PPS) 语法解析器.
//!
//! 按 H.265 7.3.2 的字段顺序完整遍历参数集, 不需要的字段读取后丢弃.
//! `profile_tier_level` 由 VPS 与 SPS 共用, 并用于生成 `hev1.*` 编码字符串.
//!
//! 输入均为 [`decode_rbsp`](crate::parsers::annexb::decode_rbsp) 的输出 (已去掉 2 字节 NAL 头).

use vmux_core::bitreader::BitReader;
use vmux_core::{VmuxError, VmuxResult};

/// 子层最大数量 (sps_max_sub_layers_minus1 取值 0..=6)
const MAX_SUB_LAYERS: u32 = 7;

/// short_term_ref_pic_set 最大数量
const MAX_SHORT_TERM_RPS: u32 = 64;

// ============================================================
// profile_tier_level
// ============================================================

/// general profile/tier/level 信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileTierLevel {
    /// general_profile_space (2 bits)
    pub profile_space: u8,
    /// general_tier_flag (false=Main, true=High)
    pub tier_flag: bool,
    /// general_profile_idc (5 bits)
    pub profile_idc: u8,
    /// general_profile_compatibility_flags (32 bits)
    pub compatibility_flags: u32,
    /// progressive/interlaced/non_packed/frame_only + 44 位约束标志 (共 48 bits)
    pub constraint_flags: u64,
    /// general_level_idc
    pub level_idc: u8,
}

impl ProfileTierLevel {
    /// 48 位约束标志按字节拆分 (高位在前)
    pub fn constraint_bytes(&self) -> [u8; 6] {
        let all = self.constraint_flags.to_be_bytes();
        [all[2], all[3], all[4], all[5], all[6], all[7]]
    }

    /// 生成 `hev1.` 编码字符串 (ISO/IEC 14496-15 附录 E)
    ///
    /// 兼容性标志按位反转后以十六进制输出, 约束字节输出到最后一个非零字节为止.
    pub fn codec_string(&self) -> String {
        let mut codec = String::from("hev1.");
        if self.profile_space > 0 {
            codec.push(char::from(0x40 + self.profile_space));
        }
        codec.push_str(&format!(
            "{}.{:X}.{}{}",
            self.profile_idc,
            self.compatibility_flags.reverse_bits(),
            if self.tier_flag { 'H' } else { 'L' },
            self.level_idc
        ));

        let constraints = self.constraint_bytes();
        let used = constraints
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |p| p + 1);
        for byte in &constraints[..used] {
            codec.push_str(&format!(".{byte:X}"));
        }
        codec
    }
}

/// 解析 profile_tier_level(1, max_sub_layers_minus1)
pub fn parse_profile_tier_level(
    br: &mut BitReader,
    max_sub_layers_minus1: u32,
) -> VmuxResult<ProfileTierLevel> {
    let profile_space = br.get(2)? as u8;
    let tier_flag = br.get_flag()?;
    let profile_idc = br.get(5)? as u8;
    let compatibility_flags = br.get(32)? as u32;
    let constraint_flags = br.get(48)?;
    let level_idc = br.get(8)? as u8;

    let mut sub_layer_profile_present = [false; MAX_SUB_LAYERS as usize];
    let mut sub_layer_level_present = [false; MAX_SUB_LAYERS as usize];
    for i in 0..max_sub_layers_minus1 as usize {
        sub_layer_profile_present[i] = br.get_flag()?;
        sub_layer_level_present[i] = br.get_flag()?;
    }
    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1..8 {
            br.skip(2)?; // reserved_zero_2bits
        }
    }
    for i in 0..max_sub_layers_minus1 as usize {
        if sub_layer_profile_present[i] {
            // profile_space(2) + tier(1) + profile_idc(5) + compat(32) + constraint(48)
            br.skip(88)?;
        }
        if sub_layer_level_present[i] {
            br.skip(8)?; // sub_layer_level_idc
        }
    }

    Ok(ProfileTierLevel {
        profile_space,
        tier_flag,
        profile_idc,
        compatibility_flags,
        constraint_flags,
        level_idc,
    })
}

// ============================================================
// VPS
// ============================================================

/// VPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcVps {
    /// VPS ID
    pub vps_id: u8,
    /// 最大层数
    pub max_layers: u8,
    /// 最大子层数
    pub max_sub_layers: u8,
    /// 时序 ID 嵌套标志
    pub temporal_id_nesting: bool,
    /// profile/tier/level
    pub ptl: ProfileTierLevel,
    /// 层集合数量
    pub num_layer_sets: u32,
    /// (num_units_in_tick, time_scale)
    pub timing: Option<(u32, u32)>,
    /// HRD 参数组数量
    pub num_hrd_parameters: u32,
}

/// 解析 HEVC VPS
pub fn parse_hevc_vps(rbsp: &[u8]) -> VmuxResult<HevcVps> {
    let mut br = BitReader::new(rbsp);

    let vps_id = br.get(4)? as u8;
    br.skip(2)?; // base_layer_internal_flag + base_layer_available_flag
    let max_layers = br.get(6)? as u8 + 1;
    let max_sub_layers_minus1 = br.get_u32(3)?;
    let temporal_id_nesting = br.get_flag()?;
    br.skip(16)?; // vps_reserved_0xffff_16bits

    let ptl = parse_profile_tier_level(&mut br, max_sub_layers_minus1)?;
    skip_sub_layer_ordering_info(&mut br, max_sub_layers_minus1)?;

    let max_layer_id = br.get_u32(6)?;
    let num_layer_sets = br.get_exp_golomb()? + 1;
    if num_layer_sets > 1024 {
        return Err(VmuxError::InvalidData(format!(
            "HEVC: vps_num_layer_sets 超出范围, value={num_layer_sets}"
        )));
    }
    for _ in 1..num_layer_sets {
        br.skip(max_layer_id as usize + 1)?; // layer_id_included_flag
    }

    let mut timing = None;
    let mut num_hrd_parameters = 0;
    if br.get_flag()? {
        // vps_timing_info_present_flag
        let num_units_in_tick = br.get_u32(32)?;
        let time_scale = br.get_u32(32)?;
        timing = Some((num_units_in_tick, time_scale));
        if br.get_flag()? {
            br.get_exp_golomb()?; // vps_num_ticks_poc_diff_one_minus1
        }
        num_hrd_parameters = br.get_exp_golomb()?;
        if num_hrd_parameters > num_layer_sets {
            return Err(VmuxError::InvalidData(format!(
                "HEVC: vps_num_hrd_parameters 超出范围, value={num_hrd_parameters}"
            )));
        }
        for i in 0..num_hrd_parameters {
            br.get_exp_golomb()?; // hrd_layer_set_idx
            let common_inf_present = i == 0 || br.get_flag()?;
            skip_hrd_parameters(&mut br, common_inf_present, max_sub_layers_minus1)?;
        }
    }

    Ok(HevcVps {
        vps_id,
        max_layers,
        max_sub_layers: max_sub_layers_minus1 as u8 + 1,
        temporal_id_nesting,
        ptl,
        num_layer_sets,
        timing,
        num_hrd_parameters,
    })
}

// ============================================================
// SPS
// ============================================================

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcSps {
    /// SPS 所引用的 VPS ID
    pub vps_id: u8,
    /// 最大子层数
    pub max_sub_layers: u8,
    /// 时序 ID 嵌套标志
    pub temporal_id_nesting: bool,
    /// profile/tier/level
    pub ptl: ProfileTierLevel,
    /// SPS ID
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
    /// 原始宽度 (像素, 未裁剪)
    pub pic_width: u32,
    /// 原始高度 (像素, 未裁剪)
    pub pic_height: u32,
    /// 图像宽度 (像素, 已应用 conformance window)
    pub width: u32,
    /// 图像高度 (像素, 已应用 conformance window)
    pub height: u32,
    /// short_term_ref_pic_set 数量
    pub num_short_term_ref_pic_sets: u32,
    /// VUI bitstream_restriction 中的 min_spatial_segmentation_idc
    pub min_spatial_segmentation_idc: u32,
    /// VUI 中的 (num_units_in_tick, time_scale)
    pub timing: Option<(u32, u32)>,
}

/// 只解析 SPS 头部与 profile_tier_level
///
/// 完整解析失败时仍可据此生成编码字符串.
pub fn parse_hevc_sps_ptl(rbsp: &[u8]) -> VmuxResult<ProfileTierLevel> {
    let mut br = BitReader::new(rbsp);
    br.skip(4)?; // sps_video_parameter_set_id
    let max_sub_layers_minus1 = br.get_u32(3)?;
    br.skip(1)?; // sps_temporal_id_nesting_flag
    parse_profile_tier_level(&mut br, max_sub_layers_minus1)
}

/// 解析 HEVC SPS
pub fn parse_hevc_sps(rbsp: &[u8]) -> VmuxResult<HevcSps> {
    let mut br = BitReader::new(rbsp);

    let vps_id = br.get(4)? as u8;
    let max_sub_layers_minus1 = br.get_u32(3)?;
    let temporal_id_nesting = br.get_flag()?;

    let ptl = parse_profile_tier_level(&mut br, max_sub_layers_minus1)?;

    let sps_id = br.get_exp_golomb()?;
    if sps_id > 15 {
        return Err(VmuxError::InvalidData(format!(
            "HEVC: sps_id 超出范围, sps_id={sps_id}"
        )));
    }
    let chroma_format_idc = br.get_exp_golomb()?;
    if chroma_format_idc > 3 {
        return Err(VmuxError::InvalidData(format!(
            "HEVC: chroma_format_idc 非法, value={chroma_format_idc}"
        )));
    }
    let mut separate_colour_plane = false;
    if chroma_format_idc == 3 {
        separate_colour_plane = br.get_flag()?;
    }

    let pic_width = br.get_exp_golomb()?;
    let pic_height = br.get_exp_golomb()?;

    let (mut conf_left, mut conf_right, mut conf_top, mut conf_bottom) = (0, 0, 0, 0);
    if br.get_flag()? {
        // conformance_window_flag
        conf_left = br.get_exp_golomb()?;
        conf_right = br.get_exp_golomb()?;
        conf_top = br.get_exp_golomb()?;
        conf_bottom = br.get_exp_golomb()?;
    }

    let bit_depth_luma = read_ue_max(&mut br, 8, "bit_depth_luma_minus8")? + 8;
    let bit_depth_chroma = read_ue_max(&mut br, 8, "bit_depth_chroma_minus8")? + 8;
    let log2_max_poc_lsb = read_ue_max(&mut br, 12, "log2_max_pic_order_cnt_lsb_minus4")? + 4;

    skip_sub_layer_ordering_info(&mut br, max_sub_layers_minus1)?;

    br.get_exp_golomb()?; // log2_min_luma_coding_block_size_minus3
    br.get_exp_golomb()?; // log2_diff_max_min_luma_coding_block_size
    br.get_exp_golomb()?; // log2_min_luma_transform_block_size_minus2
    br.get_exp_golomb()?; // log2_diff_max_min_luma_transform_block_size
    br.get_exp_golomb()?; // max_transform_hierarchy_depth_inter
    br.get_exp_golomb()?; // max_transform_hierarchy_depth_intra

    if br.get_flag()? {
        // scaling_list_enabled_flag
        if br.get_flag()? {
            // sps_scaling_list_data_present_flag
            skip_scaling_list_data(&mut br)?;
        }
    }

    br.skip(1)?; // amp_enabled_flag
    br.skip(1)?; // sample_adaptive_offset_enabled_flag

    if br.get_flag()? {
        // pcm_enabled_flag
        br.skip(4)?; // pcm_sample_bit_depth_luma_minus1
        br.skip(4)?; // pcm_sample_bit_depth_chroma_minus1
        br.get_exp_golomb()?; // log2_min_pcm_luma_coding_block_size_minus3
        br.get_exp_golomb()?; // log2_diff_max_min_pcm_luma_coding_block_size
        br.skip(1)?; // pcm_loop_filter_disabled_flag
    }

    let num_short_term_ref_pic_sets = br.get_exp_golomb()?;
    if num_short_term_ref_pic_sets > MAX_SHORT_TERM_RPS {
        return Err(VmuxError::InvalidData(format!(
            "HEVC: num_short_term_ref_pic_sets 超出范围, value={num_short_term_ref_pic_sets}"
        )));
    }
    let mut num_delta_pocs = Vec::with_capacity(num_short_term_ref_pic_sets as usize);
    for idx in 0..num_short_term_ref_pic_sets {
        skip_short_term_ref_pic_set(
            &mut br,
            idx,
            num_short_term_ref_pic_sets,
            &mut num_delta_pocs,
        )?;
    }

    if br.get_flag()? {
        // long_term_ref_pics_present_flag
        let num_long_term = br.get_exp_golomb()?;
        if num_long_term > 32 {
            return Err(VmuxError::InvalidData(format!(
                "HEVC: num_long_term_ref_pics_sps 超出范围, value={num_long_term}"
            )));
        }
        for _ in 0..num_long_term {
            br.skip(log2_max_poc_lsb as usize)?; // lt_ref_pic_poc_lsb_sps
            br.skip(1)?; // used_by_curr_pic_lt_sps_flag
        }
    }

    br.skip(1)?; // sps_temporal_mvp_enabled_flag
    br.skip(1)?; // strong_intra_smoothing_enabled_flag

    let mut vui = VuiInfo::default();
    if br.get_flag()? {
        // vui_parameters_present_flag
        vui = parse_vui(&mut br, max_sub_layers_minus1)?;
    }

    // 计算裁剪后分辨率
    let chroma_array_type = if separate_colour_plane {
        0
    } else {
        chroma_format_idc
    };
    let sub_width_c: u32 = if chroma_array_type == 1 || chroma_array_type == 2 {
        2
    } else {
        1
    };
    let sub_height_c: u32 = if chroma_array_type == 1 { 2 } else { 1 };
    let crop_x = conf_left.saturating_add(conf_right).saturating_mul(sub_width_c);
    let crop_y = conf_top.saturating_add(conf_bottom).saturating_mul(sub_height_c);
    if crop_x >= pic_width || crop_y >= pic_height {
        return Err(VmuxError::InvalidData(format!(
            "HEVC: conformance window 非法, pic={pic_width}x{pic_height}, crop_x={crop_x}, crop_y={crop_y}"
        )));
    }

    Ok(HevcSps {
        vps_id,
        max_sub_layers: max_sub_layers_minus1 as u8 + 1,
        temporal_id_nesting,
        ptl,
        sps_id,
        chroma_format_idc,
        bit_depth_luma,
        bit_depth_chroma,
        pic_width,
        pic_height,
        width: pic_width - crop_x,
        height: pic_height - crop_y,
        num_short_term_ref_pic_sets,
        min_spatial_segmentation_idc: vui.min_spatial_segmentation_idc,
        timing: vui.timing,
    })
}

// ============================================================
// PPS
// ============================================================

/// PPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcPps {
    /// PPS ID
    pub pps_id: u32,
    /// 所引用的 SPS ID
    pub sps_id: u32,
    /// dependent_slice_segments_enabled_flag
    pub dependent_slice_segments_enabled: bool,
    /// num_extra_slice_header_bits
    pub num_extra_slice_header_bits: u8,
    /// tiles_enabled_flag
    pub tiles_enabled: bool,
    /// entropy_coding_sync_enabled_flag (WPP)
    pub entropy_coding_sync_enabled: bool,
    /// 分块列数 (未启用 tiles 时为 1)
    pub num_tile_columns: u32,
    /// 分块行数 (未启用 tiles 时为 1)
    pub num_tile_rows: u32,
}

impl HevcPps {
    /// hvcC parallelismType: 0=混合, 1=slice, 2=tile, 3=wavefront
    pub fn parallelism_type(&self) -> u8 {
        match (self.entropy_coding_sync_enabled, self.tiles_enabled) {
            (true, true) => 0,
            (true, false) => 3,
            (false, true) => 2,
            (false, false) => 1,
        }
    }
}

/// 解析 HEVC PPS (到 slice_segment_header_extension_present_flag 为止)
pub fn parse_hevc_pps(rbsp: &[u8]) -> VmuxResult<HevcPps> {
    let mut br = BitReader::new(rbsp);

    let pps_id = br.get_exp_golomb()?;
    if pps_id > 63 {
        return Err(VmuxError::InvalidData(format!(
            "HEVC: pps_id 超出范围, pps_id={pps_id}"
        )));
    }
    let sps_id = br.get_exp_golomb()?;
    let dependent_slice_segments_enabled = br.get_flag()?;
    br.skip(1)?; // output_flag_present_flag
    let num_extra_slice_header_bits = br.get(3)? as u8;
    br.skip(1)?; // sign_data_hiding_enabled_flag
    br.skip(1)?; // cabac_init_present_flag
    br.get_exp_golomb()?; // num_ref_idx_l0_default_active_minus1
    br.get_exp_golomb()?; // num_ref_idx_l1_default_active_minus1
    br.get_signed_exp_golomb()?; // init_qp_minus26
    br.skip(1)?; // constrained_intra_pred_flag
    br.skip(1)?; // transform_skip_enabled_flag
    if br.get_flag()? {
        // cu_qp_delta_enabled_flag
        br.get_exp_golomb()?; // diff_cu_qp_delta_depth
    }
    br.get_signed_exp_golomb()?; // pps_cb_qp_offset
    br.get_signed_exp_golomb()?; // pps_cr_qp_offset
    br.skip(1)?; // pps_slice_chroma_qp_offsets_present_flag
    br.skip(1)?; // weighted_pred_flag
    br.skip(1)?; // weighted_bipred_flag
    br.skip(1)?; // transquant_bypass_enabled_flag
    let tiles_enabled = br.get_flag()?;
    let entropy_coding_sync_enabled = br.get_flag()?;

    let (mut num_tile_columns, mut num_tile_rows) = (1, 1);
    if tiles_enabled {
        num_tile_columns = br.get_exp_golomb()? + 1;
        num_tile_rows = br.get_exp_golomb()? + 1;
        if num_tile_columns > 20 || num_tile_rows > 22 {
            return Err(VmuxError::InvalidData(format!(
                "HEVC: tile 数量超出范围, {num_tile_columns}x{num_tile_rows}"
            )));
        }
        let uniform_spacing = br.get_flag()?;
        if !uniform_spacing {
            for _ in 1..num_tile_columns {
                br.get_exp_golomb()?; // column_width_minus1
            }
            for _ in 1..num_tile_rows {
                br.get_exp_golomb()?; // row_height_minus1
            }
        }
        br.skip(1)?; // loop_filter_across_tiles_enabled_flag
    }

    br.skip(1)?; // pps_loop_filter_across_slices_enabled_flag
    if br.get_flag()? {
        // deblocking_filter_control_present_flag
        br.skip(1)?; // deblocking_filter_override_enabled_flag
        let deblocking_disabled = br.get_flag()?;
        if !deblocking_disabled {
            br.get_signed_exp_golomb()?; // pps_beta_offset_div2
            br.get_signed_exp_golomb()?; // pps_tc_offset_div2
        }
    }
    if br.get_flag()? {
        // pps_scaling_list_data_present_flag
        skip_scaling_list_data(&mut br)?;
    }
    br.skip(1)?; // lists_modification_present_flag
    br.get_exp_golomb()?; // log2_parallel_merge_level_minus2
    br.skip(1)?; // slice_segment_header_extension_present_flag

    Ok(HevcPps {
        pps_id,
        sps_id,
        dependent_slice_segments_enabled,
        num_extra_slice_header_bits,
        tiles_enabled,
        entropy_coding_sync_enabled,
        num_tile_columns,
        num_tile_rows,
    })
}

// ============================================================
// 共用语法结构
// ============================================================

/// VUI 中需要保留的字段
#[derive(Debug, Default)]
struct VuiInfo {
    timing: Option<(u32, u32)>,
    min_spatial_segmentation_idc: u32,
}

/// 跳过 sub_layer_ordering_info
/// 读取取值不超过 `max` 的 ue(v)
fn read_ue_max(br: &mut BitReader, max: u32, name: &str) -> VmuxResult<u32> {
    let value = br.get_exp_golomb()?;
    if value > max {
        return Err(VmuxError::InvalidData(format!(
            "HEVC: {name} 超出范围, value={value}"
        )));
    }
    Ok(value)
}

fn skip_sub_layer_ordering_info(br: &mut BitReader, max_sub_layers_minus1: u32) -> VmuxResult<()> {
    let info_present = br.get_flag()?;
    let start = if info_present {
        0
    } else {
        max_sub_layers_minus1
    };
    for _ in start..=max_sub_layers_minus1 {
        br.get_exp_golomb()?; // max_dec_pic_buffering_minus1
        br.get_exp_golomb()?; // max_num_reorder_pics
        br.get_exp_golomb()?; // max_latency_increase_plus1
    }
    Ok(())
}

/// 跳过 scaling_list_data (4 种尺寸, 32x32 只有 2 个矩阵)
fn skip_scaling_list_data(br: &mut BitReader) -> VmuxResult<()> {
    for size_id in 0..4u32 {
        let step = if size_id == 3 { 3 } else { 1 };
        for _ in (0..6).step_by(step) {
            if !br.get_flag()? {
                // scaling_list_pred_mode_flag == 0
                br.get_exp_golomb()?; // scaling_list_pred_matrix_id_delta
            } else {
                let coef_num = 64.min(1u32 << (4 + (size_id << 1)));
                if size_id > 1 {
                    br.get_signed_exp_golomb()?; // scaling_list_dc_coef_minus8
                }
                for _ in 0..coef_num {
                    br.get_signed_exp_golomb()?; // scaling_list_delta_coef
                }
            }
        }
    }
    Ok(())
}

/// 跳过 st_ref_pic_set(idx), 记录每个集合的 NumDeltaPocs
///
/// inter-RPS 预测时, 参考集合的 NumDeltaPocs 决定循环次数.
fn skip_short_term_ref_pic_set(
    br: &mut BitReader,
    idx: u32,
    num_sets: u32,
    num_delta_pocs: &mut Vec<u32>,
) -> VmuxResult<()> {
    let inter_rps_pred = idx != 0 && br.get_flag()?;

    if inter_rps_pred {
        let delta_idx = if idx == num_sets {
            br.get_exp_golomb()? + 1
        } else {
            1
        };
        if delta_idx > idx {
            return Err(VmuxError::InvalidData(format!(
                "HEVC: delta_idx_minus1 超出范围, idx={idx}, delta={delta_idx}"
            )));
        }
        br.skip(1)?; // delta_rps_sign
        br.get_exp_golomb()?; // abs_delta_rps_minus1

        let ref_idx = (idx - delta_idx) as usize;
        let ref_count = num_delta_pocs.get(ref_idx).copied().unwrap_or(0);
        let mut count = 0;
        for _ in 0..=ref_count {
            let used_by_curr_pic = br.get_flag()?;
            let use_delta = used_by_curr_pic || br.get_flag()?;
            if use_delta {
                count += 1;
            }
        }
        num_delta_pocs.push(count);
    } else {
        let num_negative = br.get_exp_golomb()?;
        let num_positive = br.get_exp_golomb()?;
        if num_negative > 16 || num_positive > 16 {
            return Err(VmuxError::InvalidData(format!(
                "HEVC: short_term_ref_pic_set 图像数超出范围, neg={num_negative}, pos={num_positive}"
            )));
        }
        for _ in 0..num_negative + num_positive {
            br.get_exp_golomb()?; // delta_poc_minus1
            br.skip(1)?; // used_by_curr_pic_flag
        }
        num_delta_pocs.push(num_negative + num_positive);
    }
    Ok(())
}

/// 解析 vui_parameters
fn parse_vui(br: &mut BitReader, max_sub_layers_minus1: u32) -> VmuxResult<VuiInfo> {
    let mut info = VuiInfo::default();

    if br.get_flag()? {
        // aspect_ratio_info_present_flag
        let aspect_ratio_idc = br.get(8)?;
        if aspect_ratio_idc == 255 {
            br.skip(32)?; // sar_width + sar_height
        }
    }
    if br.get_flag()? {
        // overscan_info_present_flag
        br.skip(1)?; // overscan_appropriate_flag
    }
    if br.get_flag()? {
        // video_signal_type_present_flag
        br.skip(3)?; // video_format
        br.skip(1)?; // video_full_range_flag
        if br.get_flag()? {
            // colour_description_present_flag
            br.skip(24)?; // colour_primaries + transfer_characteristics + matrix_coeffs
        }
    }
    if br.get_flag()? {
        // chroma_loc_info_present_flag
        br.get_exp_golomb()?;
        br.get_exp_golomb()?;
    }
    br.skip(1)?; // neutral_chroma_indication_flag
    br.skip(1)?; // field_seq_flag
    br.skip(1)?; // frame_field_info_present_flag

    if br.get_flag()? {
        // default_display_window_flag
        for _ in 0..4 {
            br.get_exp_golomb()?;
        }
    }

    if br.get_flag()? {
        // vui_timing_info_present_flag
        let num_units_in_tick = br.get_u32(32)?;
        let time_scale = br.get_u32(32)?;
        info.timing = Some((num_units_in_tick, time_scale));
        if br.get_flag()? {
            // vui_poc_proportional_to_timing_flag
            br.get_exp_golomb()?; // vui_num_ticks_poc_diff_one_minus1
        }
        if br.get_flag()? {
            // vui_hrd_parameters_present_flag
            skip_hrd_parameters(br, true, max_sub_layers_minus1)?;
        }
    }

    if br.get_flag()? {
        // bitstream_restriction_flag
        br.skip(1)?; // tiles_fixed_structure_flag
        br.skip(1)?; // motion_vectors_over_pic_boundaries_flag
        br.skip(1)?; // restricted_ref_pic_lists_flag
        info.min_spatial_segmentation_idc = br.get_exp_golomb()?;
        br.get_exp_golomb()?; // max_bytes_per_pic_denom
        br.get_exp_golomb()?; // max_bits_per_min_cu_denom
        br.get_exp_golomb()?; // log2_max_mv_length_horizontal
        br.get_exp_golomb()?; // log2_max_mv_length_vertical
    }

    Ok(info)
}

/// 跳过 hrd_parameters(commonInfPresentFlag, maxNumSubLayersMinus1)
fn skip_hrd_parameters(
    br: &mut BitReader,
    common_inf_present: bool,
    max_sub_layers_minus1: u32,
) -> VmuxResult<()> {
    let mut nal_hrd_present = false;
    let mut vcl_hrd_present = false;
    let mut sub_pic_hrd_params_present = false;

    if common_inf_present {
        nal_hrd_present = br.get_flag()?;
        vcl_hrd_present = br.get_flag()?;
        if nal_hrd_present || vcl_hrd_present {
            sub_pic_hrd_params_present = br.get_flag()?;
            if sub_pic_hrd_params_present {
                br.skip(8)?; // tick_divisor_minus2
                br.skip(5)?; // du_cpb_removal_delay_increment_length_minus1
                br.skip(1)?; // sub_pic_cpb_params_in_pic_timing_sei_flag
                br.skip(5)?; // dpb_output_delay_du_length_minus1
            }
            br.skip(4)?; // bit_rate_scale
            br.skip(4)?; // cpb_size_scale
            if sub_pic_hrd_params_present {
                br.skip(4)?; // cpb_size_du_scale
            }
            br.skip(5)?; // initial_cpb_removal_delay_length_minus1
            br.skip(5)?; // au_cpb_removal_delay_length_minus1
            br.skip(5)?; // dpb_output_delay_length_minus1
        }
    }

    for _ in 0..=max_sub_layers_minus1 {
        let fixed_pic_rate_general = br.get_flag()?;
        let fixed_pic_rate_within_cvs = fixed_pic_rate_general || br.get_flag()?;
        let mut low_delay_hrd = false;
        if fixed_pic_rate_within_cvs {
            br.get_exp_golomb()?; // elemental_duration_in_tc_minus1
        } else {
            low_delay_hrd = br.get_flag()?;
        }
        let mut cpb_cnt = 1;
        if !low_delay_hrd {
            cpb_cnt = br.get_exp_golomb()? + 1;
            if cpb_cnt > 32 {
                return Err(VmuxError::InvalidData(format!(
                    "HEVC: cpb_cnt_minus1 超出范围, value={}",
                    cpb_cnt - 1
                )));
            }
        }
        if nal_hrd_present {
            skip_sub_layer_hrd_parameters(br, cpb_cnt, sub_pic_hrd_params_present)?;
        }
        if vcl_hrd_present {
            skip_sub_layer_hrd_parameters(br, cpb_cnt, sub_pic_hrd_params_present)?;
        }
    }
    Ok(())
}

/// 跳过 sub_layer_hrd_parameters
fn skip_sub_layer_hrd_parameters(
    br: &mut BitReader,
    cpb_cnt: u32,
    sub_pic_hrd_params_present: bool,
) -> VmuxResult<()> {
    for _ in 0..cpb_cnt {
        br.get_exp_golomb()?; // bit_rate_value_minus1
        br.get_exp_golomb()?; // cpb_size_value_minus1
        if sub_pic_hrd_params_present {
            br.get_exp_golomb()?; // cpb_size_du_value_minus1
            br.get_exp_golomb()?; // bit_rate_du_value_minus1
        }
        br.skip(1)?; // cbr_flag
    }
    Ok(())
}
