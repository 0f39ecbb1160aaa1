//! HEVCDecoderConfigurationRecord (hvcC box 内容) 构建与解析.
//!
//! ```text
//! configurationVersion(8) | profile_space(2) tier(1) profile_idc(5)
//! compatibility_flags(32) | constraint_indicator_flags(48) | level_idc(8)
//! 1111 min_spatial_segmentation_idc(12) | 111111 parallelismType(2)
//! 111111 chromaFormat(2) | 11111 bitDepthLumaMinus8(3) | 11111 bitDepthChromaMinus8(3)
//! avgFrameRate(16) | constantFrameRate(2) numTemporalLayers(3) temporalIdNested(1) lengthSizeMinusOne(2)
//! numOfArrays(8) | { array_completeness(1) 0 NAL_unit_type(6) numNalus(16) { len(16) nal } }
//! ```

use vmux_core::{VmuxError, VmuxResult};

use super::ps::{ProfileTierLevel, parse_hevc_pps, parse_hevc_sps, parse_hevc_vps};
use crate::parsers::annexb::decode_rbsp;

/// hvcC 固定头部长度
const HVCC_HEADER_LEN: usize = 23;

/// HEVCDecoderConfigurationRecord
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HvccRecord {
    /// general profile/tier/level
    pub ptl: ProfileTierLevel,
    /// min_spatial_segmentation_idc (12 bits)
    pub min_spatial_segmentation_idc: u16,
    /// parallelismType (2 bits)
    pub parallelism_type: u8,
    /// chroma_format_idc
    pub chroma_format_idc: u8,
    /// bitDepthLumaMinus8
    pub bit_depth_luma_minus8: u8,
    /// bitDepthChromaMinus8
    pub bit_depth_chroma_minus8: u8,
    /// avgFrameRate (单位 1/256 fps, 0 表示未指定)
    pub avg_frame_rate: u16,
    /// constantFrameRate
    pub constant_frame_rate: u8,
    /// numTemporalLayers
    pub num_temporal_layers: u8,
    /// temporalIdNested
    pub temporal_id_nested: bool,
    /// lengthSizeMinusOne
    pub length_size_minus_one: u8,
    /// (NAL 类型, NAL 列表)
    pub arrays: Vec<(u8, Vec<Vec<u8>>)>,
}

impl HvccRecord {
    /// 由 VPS/SPS/PPS NAL (含 2 字节头) 构建配置记录
    ///
    /// 4 字节长度前缀, 各数组 array_completeness = 1.
    pub fn from_parameter_sets(vps: &[u8], sps: &[u8], pps: &[u8]) -> VmuxResult<Self> {
        let parsed_vps = parse_hevc_vps(&decode_rbsp(vps))?;
        let parsed_sps = parse_hevc_sps(&decode_rbsp(sps))?;
        let parsed_pps = parse_hevc_pps(&decode_rbsp(pps))?;

        let min_spatial_segmentation_idc = parsed_sps.min_spatial_segmentation_idc.min(0x0FFF) as u16;
        let parallelism_type = if min_spatial_segmentation_idc == 0 {
            0
        } else {
            parsed_pps.parallelism_type()
        };

        Ok(Self {
            ptl: parsed_sps.ptl,
            min_spatial_segmentation_idc,
            parallelism_type,
            chroma_format_idc: parsed_sps.chroma_format_idc as u8,
            bit_depth_luma_minus8: (parsed_sps.bit_depth_luma - 8) as u8,
            bit_depth_chroma_minus8: (parsed_sps.bit_depth_chroma - 8) as u8,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: parsed_sps.max_sub_layers.max(parsed_vps.max_sub_layers),
            temporal_id_nested: parsed_sps.temporal_id_nesting,
            length_size_minus_one: 3,
            arrays: vec![
                (32, vec![vps.to_vec()]),
                (33, vec![sps.to_vec()]),
                (34, vec![pps.to_vec()]),
            ],
        })
    }

    /// 序列化为 hvcC box 内容
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            HVCC_HEADER_LEN
                + self
                    .arrays
                    .iter()
                    .flat_map(|(_, nals)| nals.iter().map(|n| n.len() + 2))
                    .sum::<usize>()
                + self.arrays.len() * 3,
        );
        out.push(1); // configurationVersion
        out.push((self.ptl.profile_space << 6) | (u8::from(self.ptl.tier_flag) << 5) | self.ptl.profile_idc);
        out.extend_from_slice(&self.ptl.compatibility_flags.to_be_bytes());
        out.extend_from_slice(&self.ptl.constraint_bytes());
        out.push(self.ptl.level_idc);
        out.extend_from_slice(&(0xF000 | self.min_spatial_segmentation_idc).to_be_bytes());
        out.push(0xFC | self.parallelism_type);
        out.push(0xFC | self.chroma_format_idc);
        out.push(0xF8 | self.bit_depth_luma_minus8);
        out.push(0xF8 | self.bit_depth_chroma_minus8);
        out.extend_from_slice(&self.avg_frame_rate.to_be_bytes());
        out.push(
            (self.constant_frame_rate << 6)
                | ((self.num_temporal_layers & 0x07) << 3)
                | (u8::from(self.temporal_id_nested) << 2)
                | self.length_size_minus_one,
        );
        out.push(self.arrays.len() as u8);
        for (nal_type, nals) in &self.arrays {
            out.push(0x80 | (nal_type & 0x3F));
            out.extend_from_slice(&(nals.len() as u16).to_be_bytes());
            for nal in nals {
                out.extend_from_slice(&(nal.len() as u16).to_be_bytes());
                out.extend_from_slice(nal);
            }
        }
        out
    }

    /// 解析 hvcC box 内容
    pub fn parse(data: &[u8]) -> VmuxResult<Self> {
        if data.len() < HVCC_HEADER_LEN {
            return Err(VmuxError::InvalidData("HEVC: hvcC 数据太短".into()));
        }
        let mut constraint = [0u8; 8];
        constraint[2..].copy_from_slice(&data[6..12]);
        let ptl = ProfileTierLevel {
            profile_space: data[1] >> 6,
            tier_flag: data[1] & 0x20 != 0,
            profile_idc: data[1] & 0x1F,
            compatibility_flags: u32::from_be_bytes([data[2], data[3], data[4], data[5]]),
            constraint_flags: u64::from_be_bytes(constraint),
            level_idc: data[12],
        };

        let num_arrays = data[22];
        let mut arrays = Vec::with_capacity(num_arrays as usize);
        let mut pos = HVCC_HEADER_LEN;
        for _ in 0..num_arrays {
            let header = read_slice(data, pos, 3)?;
            let nal_type = header[0] & 0x3F;
            let count = u16::from_be_bytes([header[1], header[2]]);
            pos += 3;
            let mut nals = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let len = read_slice(data, pos, 2)?;
                let len = u16::from_be_bytes([len[0], len[1]]) as usize;
                nals.push(read_slice(data, pos + 2, len)?.to_vec());
                pos += 2 + len;
            }
            arrays.push((nal_type, nals));
        }

        Ok(Self {
            ptl,
            min_spatial_segmentation_idc: u16::from_be_bytes([data[13], data[14]]) & 0x0FFF,
            parallelism_type: data[15] & 0x03,
            chroma_format_idc: data[16] & 0x03,
            bit_depth_luma_minus8: data[17] & 0x07,
            bit_depth_chroma_minus8: data[18] & 0x07,
            avg_frame_rate: u16::from_be_bytes([data[19], data[20]]),
            constant_frame_rate: data[21] >> 6,
            num_temporal_layers: (data[21] >> 3) & 0x07,
            temporal_id_nested: data[21] & 0x04 != 0,
            length_size_minus_one: data[21] & 0x03,
            arrays,
        })
    }

    /// 按 NAL 类型查找第一个参数集
    pub fn first_nal(&self, nal_type: u8) -> Option<&[u8]> {
        self.arrays
            .iter()
            .find(|(t, _)| *t == nal_type)
            .and_then(|(_, nals)| nals.first())
            .map(Vec::as_slice)
    }
}

/// 带边界检查的切片读取
fn read_slice(data: &[u8], pos: usize, len: usize) -> VmuxResult<&[u8]> {
    data.get(pos..pos + len)
        .ok_or_else(|| VmuxError::InvalidData(format!("HEVC: hvcC 在偏移 {pos} 处被截断")))
}
