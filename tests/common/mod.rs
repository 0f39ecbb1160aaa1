//! 集成测试共享的码流合成工具

#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder};
use vmux::codec::parsers::escape_rbsp;
use vmux::core::BitWriter;
use vmux::format::fmp4::boxes::{MOOF, TFDT, TRAF, TRUN};
use vmux::format::fmp4::find_box;

/// 初始化测试日志 (重复调用无副作用)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 把 NAL 列表拼成 Annex B 字节流
pub fn annex_b(nals: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(nal);
    }
    out
}

// ============================================================
// H.264
// ============================================================

/// Baseline SPS NAL (profile 66, constraint 0xC0, level 30)
pub fn avc_sps(mbs_w: u32, mbs_h: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(66, 8);
    bw.write_bits(0xC0, 8);
    bw.write_bits(30, 8);
    bw.write_ue(0); // sps_id
    bw.write_ue(0); // log2_max_frame_num_minus4
    bw.write_ue(2); // poc_type
    bw.write_ue(1); // max_num_ref_frames
    bw.write_flag(false);
    bw.write_ue(mbs_w - 1);
    bw.write_ue(mbs_h - 1);
    bw.write_flag(true); // frame_mbs_only
    bw.write_flag(true);
    bw.write_flag(false); // cropping
    bw.write_flag(false); // vui
    bw.write_trailing_bits();
    let mut nal = vec![0x67];
    nal.extend_from_slice(&escape_rbsp(&bw.finish()));
    nal
}

pub const AVC_PPS: &[u8] = &[0x68, 0xCE, 0x3C, 0x80];
pub const AVC_IDR: &[u8] = &[0x65, 0x88, 0x84, 0x21, 0x7F];
pub const AVC_NON_IDR: &[u8] = &[0x41, 0x9A, 0x02, 0x03];

// ============================================================
// HEVC
// ============================================================

/// Main profile, high tier, level 93 的 profile_tier_level (无子层)
fn write_main_ptl(bw: &mut BitWriter) {
    bw.write_bits(0, 2); // profile_space
    bw.write_flag(true); // tier_flag
    bw.write_bits(1, 5); // profile_idc
    bw.write_bits(0x6000_0000, 32);
    bw.write_bits(0, 48);
    bw.write_bits(93, 8);
}

fn hevc_nal(kind: u8, rbsp: &[u8]) -> Vec<u8> {
    let mut nal = vec![kind << 1, 0x01];
    nal.extend_from_slice(&escape_rbsp(rbsp));
    nal
}

/// 最小的 VPS/SPS/PPS NAL 三元组
pub fn hevc_parameter_sets(width: u32, height: u32) -> [Vec<u8>; 3] {
    let mut bw = BitWriter::new();
    bw.write_bits(0, 4); // vps_id
    bw.write_bits(0b11, 2);
    bw.write_bits(0, 6);
    bw.write_bits(0, 3); // max_sub_layers_minus1
    bw.write_flag(true);
    bw.write_bits(0xFFFF, 16);
    write_main_ptl(&mut bw);
    bw.write_flag(true);
    bw.write_ue(4);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_bits(0, 6); // max_layer_id
    bw.write_ue(0); // num_layer_sets_minus1
    bw.write_flag(false); // timing_info_present
    bw.write_flag(false); // vps_extension
    bw.write_trailing_bits();
    let vps = hevc_nal(32, &bw.finish());

    let mut bw = BitWriter::new();
    bw.write_bits(0, 4);
    bw.write_bits(0, 3);
    bw.write_flag(true);
    write_main_ptl(&mut bw);
    bw.write_ue(0); // sps_id
    bw.write_ue(1); // chroma_format_idc
    bw.write_ue(width);
    bw.write_ue(height);
    bw.write_flag(false); // conformance_window
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(4); // log2_max_poc_lsb_minus4
    bw.write_flag(true);
    bw.write_ue(4);
    bw.write_ue(2);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(3);
    bw.write_ue(0);
    bw.write_ue(3);
    bw.write_ue(1);
    bw.write_ue(1);
    bw.write_flag(false); // scaling_list
    bw.write_flag(true); // amp
    bw.write_flag(true); // sao
    bw.write_flag(false); // pcm
    bw.write_ue(0); // num_short_term_ref_pic_sets
    bw.write_flag(false); // long_term_refs
    bw.write_flag(true);
    bw.write_flag(true);
    bw.write_flag(false); // vui
    bw.write_flag(false); // sps_extension
    bw.write_trailing_bits();
    let sps = hevc_nal(33, &bw.finish());

    let mut bw = BitWriter::new();
    bw.write_ue(0); // pps_id
    bw.write_ue(0); // sps_id
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_bits(0, 3);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(0); // init_qp_minus26
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(false); // cu_qp_delta_enabled
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(false); // tiles
    bw.write_flag(false); // entropy_coding_sync
    bw.write_flag(false); // loop_filter_across_slices
    bw.write_flag(false); // deblocking_filter_control_present
    bw.write_flag(false); // pps_scaling_list_data_present
    bw.write_flag(false);
    bw.write_ue(0); // log2_parallel_merge_level_minus2
    bw.write_flag(false);
    bw.write_flag(false); // pps_extension
    bw.write_trailing_bits();
    let pps = hevc_nal(34, &bw.finish());

    [vps, sps, pps]
}

/// HEVC 切片 NAL (first_slice_segment_in_pic_flag = 1)
pub fn hevc_slice(kind: u8, body: &[u8]) -> Vec<u8> {
    let mut nal = vec![kind << 1, 0x01, 0xC0];
    nal.extend_from_slice(body);
    nal
}

// ============================================================
// 分片读取
// ============================================================

/// 媒体分片中的 tfdt (baseMediaDecodeTime)
pub fn tfdt(fragment: &[u8]) -> u64 {
    let payload = find_box(fragment, &[MOOF, TRAF, TFDT]).expect("缺少 tfdt");
    assert_eq!(payload[0], 1, "tfdt 应为版本 1");
    BigEndian::read_u64(&payload[4..12])
}

/// trun 中的 (样本数, data_offset)
pub fn trun_header(fragment: &[u8]) -> (u32, u32) {
    let payload = find_box(fragment, &[MOOF, TRAF, TRUN]).expect("缺少 trun");
    (
        BigEndian::read_u32(&payload[4..8]),
        BigEndian::read_u32(&payload[8..12]),
    )
}

/// 在字节流中查找四字符码
pub fn contains_fourcc(data: &[u8], fourcc: &[u8; 4]) -> bool {
    data.windows(4).any(|w| w == fourcc)
}
