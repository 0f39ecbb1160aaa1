//! H.264 SPS (Sequence Parameter Set) 解析器.
//!
//! 只走到 frame cropping 为止, 用于在配置未给出宽高时推导图像尺寸.
//! 编码字符串始终取自 SPS 原始字节, 不依赖本解析结果.

use vmux_core::bitreader::BitReader;
use vmux_core::{VmuxError, VmuxResult};

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// profile_idc (编码规格, 如 66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    /// constraint_set 标志位
    pub constraint_set_flags: u8,
    /// level_idc (编码级别, 如 30=3.0, 41=4.1)
    pub level_idc: u8,
    /// SPS ID (seq_parameter_set_id)
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
    /// 最大参考帧数
    pub max_num_ref_frames: u32,
    /// 是否为帧编码 (非场编码)
    pub frame_mbs_only: bool,
    /// 图像宽度 (像素, 已应用 cropping)
    pub width: u32,
    /// 图像高度 (像素, 已应用 cropping)
    pub height: u32,
}

/// 解析 H.264 SPS
///
/// `rbsp` 为去掉 1 字节 NAL 头并移除 emulation prevention 之后的数据.
pub fn parse_sps(rbsp: &[u8]) -> VmuxResult<Sps> {
    if rbsp.len() < 3 {
        return Err(VmuxError::InvalidData("H.264: SPS RBSP 太短".into()));
    }

    let mut br = BitReader::new(rbsp);

    let profile_idc = br.get(8)? as u8;
    let constraint_set_flags = br.get(8)? as u8;
    let level_idc = br.get(8)? as u8;
    let sps_id = br.get_exp_golomb()?;
    if sps_id > 31 {
        return Err(VmuxError::InvalidData(format!(
            "H.264: sps_id 超出范围, sps_id={sps_id}"
        )));
    }

    let mut chroma_format_idc = 1; // 默认 4:2:0
    let mut separate_colour_plane = false;
    let mut bit_depth_luma = 8;
    let mut bit_depth_chroma = 8;

    // High profile 及以上有额外字段
    if is_high_profile(profile_idc) {
        chroma_format_idc = br.get_exp_golomb()?;
        if chroma_format_idc > 3 {
            return Err(VmuxError::InvalidData(format!(
                "H.264: chroma_format_idc 非法, value={chroma_format_idc}"
            )));
        }
        if chroma_format_idc == 3 {
            separate_colour_plane = br.get_flag()?;
        }
        bit_depth_luma = read_ue_max(&mut br, 6, "bit_depth_luma_minus8")? + 8;
        bit_depth_chroma = read_ue_max(&mut br, 6, "bit_depth_chroma_minus8")? + 8;
        br.skip(1)?; // qpprime_y_zero_transform_bypass_flag

        if br.get_flag()? {
            // seq_scaling_matrix_present_flag
            let list_count = if chroma_format_idc == 3 { 12 } else { 8 };
            for i in 0..list_count {
                if br.get_flag()? {
                    skip_scaling_list(&mut br, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    br.get_exp_golomb()?; // log2_max_frame_num_minus4

    let poc_type = br.get_exp_golomb()?;
    match poc_type {
        0 => {
            br.get_exp_golomb()?; // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            br.skip(1)?; // delta_pic_order_always_zero_flag
            br.get_signed_exp_golomb()?; // offset_for_non_ref_pic
            br.get_signed_exp_golomb()?; // offset_for_top_to_bottom_field
            let cycle = br.get_exp_golomb()?;
            if cycle > 255 {
                return Err(VmuxError::InvalidData(format!(
                    "H.264: num_ref_frames_in_pic_order_cnt_cycle 超出范围, value={cycle}"
                )));
            }
            for _ in 0..cycle {
                br.get_signed_exp_golomb()?; // offset_for_ref_frame
            }
        }
        2 => {}
        _ => {
            return Err(VmuxError::InvalidData(format!(
                "H.264: pic_order_cnt_type 非法, value={poc_type}"
            )));
        }
    }

    let max_num_ref_frames = br.get_exp_golomb()?;
    br.skip(1)?; // gaps_in_frame_num_value_allowed_flag

    // 图像尺寸 (宏块单位)
    let pic_width_in_mbs = br.get_exp_golomb()? + 1;
    let pic_height_in_map_units = br.get_exp_golomb()? + 1;

    let frame_mbs_only = br.get_flag()?;
    if !frame_mbs_only {
        br.skip(1)?; // mb_adaptive_frame_field_flag
    }
    br.skip(1)?; // direct_8x8_inference_flag

    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0, 0, 0, 0);
    if br.get_flag()? {
        crop_left = br.get_exp_golomb()?;
        crop_right = br.get_exp_golomb()?;
        crop_top = br.get_exp_golomb()?;
        crop_bottom = br.get_exp_golomb()?;
    }

    let chroma_array_type = if separate_colour_plane {
        0
    } else {
        chroma_format_idc
    };
    let (crop_unit_x, crop_unit_y) = cropping_unit(chroma_array_type, frame_mbs_only);
    let raw_width = pic_width_in_mbs.saturating_mul(16);
    let raw_height = pic_height_in_map_units
        .saturating_mul(if frame_mbs_only { 16 } else { 32 });
    let crop_x = crop_left.saturating_add(crop_right).saturating_mul(crop_unit_x);
    let crop_y = crop_top.saturating_add(crop_bottom).saturating_mul(crop_unit_y);
    if crop_x >= raw_width || crop_y >= raw_height {
        return Err(VmuxError::InvalidData(format!(
            "H.264: 裁剪参数非法, raw={raw_width}x{raw_height}, crop_x={crop_x}, crop_y={crop_y}"
        )));
    }

    Ok(Sps {
        profile_idc,
        constraint_set_flags,
        level_idc,
        sps_id,
        chroma_format_idc,
        bit_depth_luma,
        bit_depth_chroma,
        max_num_ref_frames,
        frame_mbs_only,
        width: raw_width - crop_x,
        height: raw_height - crop_y,
    })
}

// ============================================================
// 辅助函数
// ============================================================

/// 是否为 High Profile 或更高
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

/// 读取取值不超过 `max` 的 ue(v)
fn read_ue_max(br: &mut BitReader, max: u32, name: &str) -> VmuxResult<u32> {
    let value = br.get_exp_golomb()?;
    if value > max {
        return Err(VmuxError::InvalidData(format!(
            "H.264: {name} 超出范围, value={value}"
        )));
    }
    Ok(value)
}

/// 获取 cropping 单位
fn cropping_unit(chroma_array_type: u32, frame_mbs_only: bool) -> (u32, u32) {
    let sub_width = match chroma_array_type {
        0 | 3 => 1,
        _ => 2,
    };
    let sub_height = match chroma_array_type {
        1 => 2,
        _ => 1,
    };
    let height_mult = if frame_mbs_only { 1 } else { 2 };

    (sub_width, sub_height * height_mult)
}

/// 跳过一个 scaling_list (delta_scale 链)
fn skip_scaling_list(br: &mut BitReader, size: usize) -> VmuxResult<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = br.get_signed_exp_golomb()?;
            next_scale = (last_scale + delta + 256) % 256;
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::build_avc_sps_rbsp;
    use vmux_core::BitWriter;

    #[test]
    fn test_sps_baseline_dimensions() {
        let sps = parse_sps(&build_avc_sps_rbsp(20, 15, None)).unwrap();
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.level_idc, 30);
        assert_eq!(sps.max_num_ref_frames, 1);
        assert_eq!((sps.width, sps.height), (320, 240));
    }

    #[test]
    fn test_sps_1080p_cropping() {
        // 1920x1088 裁掉底部 4 个色度行 = 8 像素
        let sps = parse_sps(&build_avc_sps_rbsp(120, 68, Some(4))).unwrap();
        assert_eq!((sps.width, sps.height), (1920, 1080));
    }

    #[test]
    fn test_sps_high_profile_with_scaling_matrix() {
        let mut bw = BitWriter::new();
        bw.write_bits(100, 8);
        bw.write_bits(0, 8);
        bw.write_bits(40, 8);
        bw.write_ue(0); // sps_id
        bw.write_ue(1); // chroma_format_idc
        bw.write_ue(0); // bit_depth_luma_minus8
        bw.write_ue(0); // bit_depth_chroma_minus8
        bw.write_flag(false); // qpprime
        bw.write_flag(true); // seq_scaling_matrix_present
        // 第一个列表存在, delta 码号 0 → next_scale 保持 8 直到结束
        bw.write_flag(true);
        for _ in 0..16 {
            bw.write_ue(0);
        }
        for _ in 1..8 {
            bw.write_flag(false);
        }
        bw.write_ue(0); // log2_max_frame_num_minus4
        bw.write_ue(0); // poc_type 0
        bw.write_ue(2); // log2_max_poc_lsb_minus4
        bw.write_ue(4); // max_num_ref_frames
        bw.write_flag(false);
        bw.write_ue(79); // 1280
        bw.write_ue(44); // 720
        bw.write_flag(true);
        bw.write_flag(true);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_trailing_bits();

        let sps = parse_sps(&bw.finish()).unwrap();
        assert_eq!(sps.profile_idc, 100);
        assert_eq!(sps.chroma_format_idc, 1);
        assert_eq!(sps.bit_depth_luma, 8);
        assert_eq!(sps.max_num_ref_frames, 4);
        assert_eq!((sps.width, sps.height), (1280, 720));
    }

    #[test]
    fn test_sps_truncated() {
        let full = build_avc_sps_rbsp(20, 15, None);
        let err = parse_sps(&full[..4]).unwrap_err();
        assert!(err.is_exhausted());
        assert!(parse_sps(&[66, 0]).is_err());
    }

    #[test]
    fn test_sps_oversized_bit_depth_rejected() {
        // High profile, bit_depth_luma_minus8 为 31 个前导零的最大码字
        let rbsp = [
            0x64, 0x00, 0x1F, 0xA0, 0x00, 0x00, 0x00, 0x1F, 0xFF, 0xFF, 0xFF, 0xFF,
        ];
        assert!(matches!(parse_sps(&rbsp), Err(VmuxError::InvalidData(_))));

        let mut bw = BitWriter::new();
        bw.write_bits(100, 8);
        bw.write_bits(0, 8);
        bw.write_bits(40, 8);
        bw.write_ue(0); // sps_id
        bw.write_ue(1); // chroma_format_idc
        bw.write_ue(0); // bit_depth_luma_minus8
        bw.write_ue(7); // bit_depth_chroma_minus8
        bw.write_trailing_bits();
        assert!(matches!(parse_sps(&bw.finish()), Err(VmuxError::InvalidData(_))));
    }
}
