//! 单元测试用的码流合成工具.

use vmux_core::BitWriter;

use crate::parsers::annexb::escape_rbsp;
use crate::parsers::h265::ProfileTierLevel;

/// 写入 profile_tier_level, 偶数子层带 profile 字段, 所有子层带 level 字段
pub fn write_ptl(bw: &mut BitWriter, ptl: &ProfileTierLevel, max_sub_layers_minus1: u32) {
    bw.write_bits(u64::from(ptl.profile_space), 2);
    bw.write_flag(ptl.tier_flag);
    bw.write_bits(u64::from(ptl.profile_idc), 5);
    bw.write_bits(u64::from(ptl.compatibility_flags), 32);
    bw.write_bits(ptl.constraint_flags, 48);
    bw.write_bits(u64::from(ptl.level_idc), 8);
    for i in 0..max_sub_layers_minus1 {
        bw.write_flag(i % 2 == 0);
        bw.write_flag(true);
    }
    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1..8 {
            bw.write_bits(0, 2);
        }
    }
    for i in 0..max_sub_layers_minus1 {
        if i % 2 == 0 {
            bw.write_bits(0, 44);
            bw.write_bits(0, 44);
        }
        bw.write_bits(u64::from(ptl.level_idc), 8);
    }
}

/// 最小 VPS RBSP: 一个层集合, 带 timing 与一组 NAL HRD 参数
pub fn build_vps_rbsp(ptl: &ProfileTierLevel, max_sub_layers_minus1: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0, 4); // vps_id
    bw.write_bits(0b11, 2);
    bw.write_bits(0, 6); // max_layers_minus1
    bw.write_bits(u64::from(max_sub_layers_minus1), 3);
    bw.write_flag(true); // temporal_id_nesting
    bw.write_bits(0xFFFF, 16);
    write_ptl(&mut bw, ptl, max_sub_layers_minus1);
    bw.write_flag(true); // sub_layer_ordering_info_present
    for _ in 0..=max_sub_layers_minus1 {
        bw.write_ue(4);
        bw.write_ue(0);
        bw.write_ue(0);
    }
    bw.write_bits(0, 6); // max_layer_id
    bw.write_ue(0); // num_layer_sets_minus1
    bw.write_flag(true); // timing_info_present
    bw.write_bits(1, 32);
    bw.write_bits(25, 32);
    bw.write_flag(false); // poc_proportional
    bw.write_ue(1); // num_hrd_parameters
    bw.write_ue(0); // hrd_layer_set_idx
    // hrd_parameters(1, ..): 只有 NAL HRD
    bw.write_flag(true);
    bw.write_flag(false);
    bw.write_flag(false); // sub_pic_hrd_params_present
    bw.write_bits(0, 4);
    bw.write_bits(0, 4);
    bw.write_bits(23, 5);
    bw.write_bits(23, 5);
    bw.write_bits(23, 5);
    for _ in 0..=max_sub_layers_minus1 {
        bw.write_flag(true); // fixed_pic_rate_general
        bw.write_ue(0); // elemental_duration
        bw.write_ue(0); // cpb_cnt_minus1
        bw.write_ue(1000);
        bw.write_ue(2000);
        bw.write_flag(false);
    }
    bw.write_flag(false); // vps_extension_flag
    bw.write_trailing_bits();
    bw.finish()
}

/// SPS 合成参数
#[derive(Debug, Clone)]
pub struct SpsParams {
    pub ptl: ProfileTierLevel,
    pub max_sub_layers_minus1: u32,
    pub chroma_format_idc: u32,
    pub width: u32,
    pub height: u32,
    pub conf_bottom: u32,
    pub scaling_list: bool,
    pub pcm: bool,
    pub inter_rps: bool,
    pub long_term_refs: u32,
    pub vui: bool,
    pub min_spatial_segmentation_idc: u32,
}

impl Default for SpsParams {
    fn default() -> Self {
        Self {
            ptl: ProfileTierLevel::default(),
            max_sub_layers_minus1: 0,
            chroma_format_idc: 1,
            width: 64,
            height: 64,
            conf_bottom: 0,
            scaling_list: false,
            pcm: false,
            inter_rps: false,
            long_term_refs: 0,
            vui: false,
            min_spatial_segmentation_idc: 0,
        }
    }
}

/// 按 `params` 合成 SPS RBSP
pub fn build_sps_rbsp(params: &SpsParams) -> Vec<u8> {
    let msl = params.max_sub_layers_minus1;
    let mut bw = BitWriter::new();
    bw.write_bits(0, 4); // vps_id
    bw.write_bits(u64::from(msl), 3);
    bw.write_flag(true); // temporal_id_nesting
    write_ptl(&mut bw, &params.ptl, msl);
    bw.write_ue(0); // sps_id
    bw.write_ue(params.chroma_format_idc);
    if params.chroma_format_idc == 3 {
        bw.write_flag(false);
    }
    bw.write_ue(params.width);
    bw.write_ue(params.height);
    if params.conf_bottom > 0 {
        bw.write_flag(true);
        bw.write_ue(0);
        bw.write_ue(0);
        bw.write_ue(0);
        bw.write_ue(params.conf_bottom);
    } else {
        bw.write_flag(false);
    }
    bw.write_ue(0); // bit_depth_luma_minus8
    bw.write_ue(0); // bit_depth_chroma_minus8
    bw.write_ue(4); // log2_max_poc_lsb_minus4 → 8 位
    bw.write_flag(true); // sub_layer_ordering_info_present
    for _ in 0..=msl {
        bw.write_ue(4);
        bw.write_ue(2);
        bw.write_ue(0);
    }
    bw.write_ue(0);
    bw.write_ue(3);
    bw.write_ue(0);
    bw.write_ue(3);
    bw.write_ue(1);
    bw.write_ue(1);

    bw.write_flag(params.scaling_list);
    if params.scaling_list {
        bw.write_flag(true); // sps_scaling_list_data_present
        for size_id in 0..4u32 {
            let matrices = if size_id == 3 { 2 } else { 6 };
            for matrix in 0..matrices {
                if matrix == 0 {
                    bw.write_flag(true);
                    let coef_num = 64.min(1u32 << (4 + (size_id << 1)));
                    if size_id > 1 {
                        bw.write_ue(0);
                    }
                    for _ in 0..coef_num {
                        bw.write_ue(0);
                    }
                } else {
                    bw.write_flag(false);
                    bw.write_ue(1);
                }
            }
        }
    }

    bw.write_flag(true); // amp
    bw.write_flag(true); // sao
    bw.write_flag(params.pcm);
    if params.pcm {
        bw.write_bits(7, 4);
        bw.write_bits(7, 4);
        bw.write_ue(0);
        bw.write_ue(1);
        bw.write_flag(true);
    }

    bw.write_ue(if params.inter_rps { 3 } else { 1 });
    // 集合 0: 2 个前向 + 1 个后向
    bw.write_ue(2);
    bw.write_ue(1);
    for delta in [0, 1, 0] {
        bw.write_ue(delta);
        bw.write_flag(true);
    }
    if params.inter_rps {
        // 集合 1: 从集合 0 预测, 参考集合有 3 个 delta → 4 组标志
        bw.write_flag(true);
        bw.write_flag(false); // delta_rps_sign
        bw.write_ue(0); // abs_delta_rps_minus1
        bw.write_flag(true);
        bw.write_flag(false);
        bw.write_flag(true);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_flag(true);
        // 集合 2: 显式
        bw.write_flag(false);
        bw.write_ue(1);
        bw.write_ue(0);
        bw.write_ue(0);
        bw.write_flag(true);
    }

    bw.write_flag(params.long_term_refs > 0);
    if params.long_term_refs > 0 {
        bw.write_ue(params.long_term_refs);
        for i in 0..params.long_term_refs {
            bw.write_bits(u64::from(i), 8);
            bw.write_flag(true);
        }
    }
    bw.write_flag(true); // temporal_mvp
    bw.write_flag(true); // strong_intra_smoothing

    bw.write_flag(params.vui);
    if params.vui {
        bw.write_flag(true); // aspect_ratio_info_present
        bw.write_bits(255, 8);
        bw.write_bits(1, 16);
        bw.write_bits(1, 16);
        bw.write_flag(false); // overscan
        bw.write_flag(true); // video_signal_type
        bw.write_bits(5, 3);
        bw.write_flag(false);
        bw.write_flag(true);
        bw.write_bits(1, 8);
        bw.write_bits(1, 8);
        bw.write_bits(1, 8);
        bw.write_flag(false); // chroma_loc
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_flag(false); // default_display_window
        bw.write_flag(true); // timing
        bw.write_bits(1001, 32);
        bw.write_bits(60000, 32);
        bw.write_flag(false);
        bw.write_flag(true); // hrd_parameters_present
        bw.write_flag(true); // nal_hrd
        bw.write_flag(true); // vcl_hrd
        bw.write_flag(true); // sub_pic_hrd_params_present
        bw.write_bits(8, 8);
        bw.write_bits(5, 5);
        bw.write_flag(true);
        bw.write_bits(5, 5);
        bw.write_bits(0, 4);
        bw.write_bits(0, 4);
        bw.write_bits(0, 4);
        bw.write_bits(23, 5);
        bw.write_bits(23, 5);
        bw.write_bits(23, 5);
        for _ in 0..=msl {
            bw.write_flag(false); // fixed_pic_rate_general
            bw.write_flag(false); // fixed_pic_rate_within_cvs
            bw.write_flag(false); // low_delay_hrd
            bw.write_ue(1); // cpb_cnt_minus1
            for _ in 0..2 {
                // NAL 与 VCL 各一组
                for _ in 0..2 {
                    bw.write_ue(100);
                    bw.write_ue(200);
                    bw.write_ue(10);
                    bw.write_ue(20);
                    bw.write_flag(false);
                }
            }
        }
        bw.write_flag(true); // bitstream_restriction
        bw.write_flag(false);
        bw.write_flag(true);
        bw.write_flag(true);
        bw.write_ue(params.min_spatial_segmentation_idc);
        bw.write_ue(2);
        bw.write_ue(1);
        bw.write_ue(15);
        bw.write_ue(15);
    }
    bw.write_flag(false); // sps_extension_present
    bw.write_trailing_bits();
    bw.finish()
}

/// 合成 PPS RBSP
pub fn build_pps_rbsp(tiles: bool, wavefront: bool) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(0); // pps_id
    bw.write_ue(0); // sps_id
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_bits(0, 3);
    bw.write_flag(true); // sign_data_hiding
    bw.write_flag(false);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(0); // init_qp_minus26
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(true); // cu_qp_delta_enabled
    bw.write_ue(1);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(tiles);
    bw.write_flag(wavefront);
    if tiles {
        bw.write_ue(1);
        bw.write_ue(1);
        bw.write_flag(false); // uniform_spacing
        bw.write_ue(3);
        bw.write_ue(2);
        bw.write_flag(true);
    }
    bw.write_flag(true);
    bw.write_flag(true); // deblocking_filter_control_present
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_flag(false); // pps_scaling_list_data_present
    bw.write_flag(false);
    bw.write_ue(0);
    bw.write_flag(false);
    bw.write_flag(false); // pps_extension_present
    bw.write_trailing_bits();
    bw.finish()
}

/// Baseline H.264 SPS RBSP, 宽高以宏块为单位, 可选底部裁剪
pub fn build_avc_sps_rbsp(mbs_w: u32, mbs_h: u32, crop_bottom: Option<u32>) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(66, 8); // profile_idc
    bw.write_bits(0xC0, 8); // constraint flags
    bw.write_bits(30, 8); // level_idc
    bw.write_ue(0); // sps_id
    bw.write_ue(0); // log2_max_frame_num_minus4
    bw.write_ue(2); // poc_type
    bw.write_ue(1); // max_num_ref_frames
    bw.write_flag(false); // gaps
    bw.write_ue(mbs_w - 1);
    bw.write_ue(mbs_h - 1);
    bw.write_flag(true); // frame_mbs_only
    bw.write_flag(true); // direct_8x8_inference
    match crop_bottom {
        Some(bottom) => {
            bw.write_flag(true);
            bw.write_ue(0);
            bw.write_ue(0);
            bw.write_ue(0);
            bw.write_ue(bottom);
        }
        None => bw.write_flag(false),
    }
    bw.write_flag(false); // vui
    bw.write_trailing_bits();
    bw.finish()
}

/// 组装 H.264 NAL: 1 字节头 (nal_ref_idc = 3) + 转义后的 RBSP
pub fn avc_nal(kind: u8, rbsp: &[u8]) -> Vec<u8> {
    let mut nal = vec![0x60 | kind];
    nal.extend_from_slice(&escape_rbsp(rbsp));
    nal
}

/// 组装 HEVC NAL: 2 字节头 + 转义后的 RBSP
pub fn hevc_nal(kind: u8, rbsp: &[u8]) -> Vec<u8> {
    let mut nal = vec![kind << 1, 0x01];
    nal.extend_from_slice(&escape_rbsp(rbsp));
    nal
}

/// HEVC 切片 NAL, `first_slice` 控制 first_slice_segment_in_pic_flag
pub fn hevc_slice(kind: u8, first_slice: bool, body: &[u8]) -> Vec<u8> {
    let mut nal = vec![kind << 1, 0x01, if first_slice { 0xC0 } else { 0x40 }];
    nal.extend_from_slice(body);
    nal
}

/// 主 profile 的 VPS/SPS/PPS NAL 三元组
pub fn hevc_parameter_sets(ptl: &ProfileTierLevel, width: u32, height: u32) -> [Vec<u8>; 3] {
    let params = SpsParams {
        ptl: *ptl,
        width,
        height,
        ..SpsParams::default()
    };
    [
        hevc_nal(32, &build_vps_rbsp(ptl, 0)),
        hevc_nal(33, &build_sps_rbsp(&params)),
        hevc_nal(34, &build_pps_rbsp(false, false)),
    ]
}

/// 把 NAL 列表拼成 Annex B 字节流 (交替使用 4 字节与 3 字节起始码)
pub fn annex_b(nals: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, nal) in nals.iter().enumerate() {
        if i % 2 == 0 {
            out.extend_from_slice(&[0, 0, 0, 1]);
        } else {
            out.extend_from_slice(&[0, 0, 1]);
        }
        out.extend_from_slice(nal);
    }
    out
}
