//! H.264 NAL (Network Abstraction Layer) 单元类型与 avcC 配置.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────┘
//! ```

use vmux_core::{VmuxError, VmuxResult};

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A (DPA)
    SliceDpa,
    /// 数据分区 B (DPB)
    SliceDpb,
    /// 数据分区 C (DPC)
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// 未知类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            _ => Self::Unknown(type_id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }

    /// 是否为关键帧 (IDR)
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::SliceIdr)
    }

    /// 出现在 VCL 之后时是否开启新的访问单元 (H.264 7.4.1.2.3)
    pub fn opens_access_unit(&self) -> bool {
        match self {
            Self::Sei | Self::Sps | Self::Pps | Self::Aud => true,
            Self::Unknown(id) => (14..=18).contains(id),
            _ => false,
        }
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 由 SPS 的 profile/兼容性/level 三个字节生成 `avc1.PPCCLL` 编码字符串
pub fn avc_codec_string(sps: &[u8]) -> VmuxResult<String> {
    let Some(bytes) = sps.get(1..4) else {
        return Err(VmuxError::InvalidData("H.264: SPS 数据太短".into()));
    };
    Ok(format!(
        "avc1.{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2]
    ))
}

/// 构建 AVCDecoderConfigurationRecord (avcC box 内容)
pub fn build_avcc_config(
    sps_list: &[&[u8]],
    pps_list: &[&[u8]],
    length_size: usize,
) -> VmuxResult<Vec<u8>> {
    let Some(sps0) = sps_list.first() else {
        return Err(VmuxError::InvalidData(
            "H.264: 构建 avcC 需要至少一个 SPS".into(),
        ));
    };
    if sps0.len() < 4 {
        return Err(VmuxError::InvalidData("H.264: SPS 数据太短".into()));
    }
    if !(1..=4).contains(&length_size) {
        return Err(VmuxError::InvalidArgument(format!(
            "H.264: 长度前缀字节数非法, value={length_size}"
        )));
    }

    let mut out = vec![
        1,                                // configurationVersion
        sps0[1],                          // profile_idc
        sps0[2],                          // profile_compatibility
        sps0[3],                          // level_idc
        0xFC | ((length_size as u8) - 1), // lengthSizeMinusOne
        0xE0 | (sps_list.len() as u8),    // numOfSPS
    ];
    for sps in sps_list {
        out.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        out.extend_from_slice(sps);
    }

    // PPS
    out.push(pps_list.len() as u8);
    for pps in pps_list {
        out.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        out.extend_from_slice(pps);
    }

    Ok(out)
}
