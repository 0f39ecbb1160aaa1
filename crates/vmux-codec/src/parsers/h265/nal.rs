//! H.265/HEVC NAL (Network Abstraction Layer) 单元类型.
//!
//! HEVC NAL 头部为 2 字节 (比 H.264 多一字节):
//! - forbidden_zero_bit (1 bit)
//! - nal_unit_type (6 bits)
//! - nuh_layer_id (6 bits)
//! - nuh_temporal_id_plus1 (3 bits)

/// HEVC NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HevcNalUnitType {
    /// TRAIL_N (非参考尾随图像)
    TrailN,
    /// TRAIL_R (参考尾随图像)
    TrailR,
    /// TSA_N
    TsaN,
    /// TSA_R
    TsaR,
    /// STSA_N
    StsaN,
    /// STSA_R
    StsaR,
    /// RADL_N
    RadlN,
    /// RADL_R
    RadlR,
    /// RASL_N
    RaslN,
    /// RASL_R
    RaslR,
    /// BLA_W_LP (Broken Link Access)
    BlaWLp,
    /// BLA_W_RADL
    BlaWRadl,
    /// BLA_N_LP
    BlaNLp,
    /// IDR_W_RADL (Instantaneous Decoding Refresh)
    IdrWRadl,
    /// IDR_N_LP
    IdrNLp,
    /// CRA_NUT (Clean Random Access)
    Cra,
    /// VPS (Video Parameter Set)
    Vps,
    /// SPS (Sequence Parameter Set)
    Sps,
    /// PPS (Picture Parameter Set)
    Pps,
    /// AUD (Access Unit Delimiter)
    Aud,
    /// EOS (End of Sequence)
    Eos,
    /// EOB (End of Bitstream)
    Eob,
    /// FD (Filler Data)
    FillerData,
    /// PREFIX_SEI
    PrefixSei,
    /// SUFFIX_SEI
    SuffixSei,
    /// 保留或未指定类型 (含保留的 VCL 类型 10-15, 22-31)
    Unknown(u8),
}

impl HevcNalUnitType {
    /// 从类型编号创建
    pub fn from_type_id(id: u8) -> Self {
        match id {
            0 => Self::TrailN,
            1 => Self::TrailR,
            2 => Self::TsaN,
            3 => Self::TsaR,
            4 => Self::StsaN,
            5 => Self::StsaR,
            6 => Self::RadlN,
            7 => Self::RadlR,
            8 => Self::RaslN,
            9 => Self::RaslR,
            16 => Self::BlaWLp,
            17 => Self::BlaWRadl,
            18 => Self::BlaNLp,
            19 => Self::IdrWRadl,
            20 => Self::IdrNLp,
            21 => Self::Cra,
            32 => Self::Vps,
            33 => Self::Sps,
            34 => Self::Pps,
            35 => Self::Aud,
            36 => Self::Eos,
            37 => Self::Eob,
            38 => Self::FillerData,
            39 => Self::PrefixSei,
            40 => Self::SuffixSei,
            _ => Self::Unknown(id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::TrailN => 0,
            Self::TrailR => 1,
            Self::TsaN => 2,
            Self::TsaR => 3,
            Self::StsaN => 4,
            Self::StsaR => 5,
            Self::RadlN => 6,
            Self::RadlR => 7,
            Self::RaslN => 8,
            Self::RaslR => 9,
            Self::BlaWLp => 16,
            Self::BlaWRadl => 17,
            Self::BlaNLp => 18,
            Self::IdrWRadl => 19,
            Self::IdrNLp => 20,
            Self::Cra => 21,
            Self::Vps => 32,
            Self::Sps => 33,
            Self::Pps => 34,
            Self::Aud => 35,
            Self::Eos => 36,
            Self::Eob => 37,
            Self::FillerData => 38,
            Self::PrefixSei => 39,
            Self::SuffixSei => 40,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL, 即切片
    pub fn is_vcl(&self) -> bool {
        self.type_id() < 32
    }

    /// 是否为 IRAP (Intra Random Access Point) NAL
    pub fn is_irap(&self) -> bool {
        matches!(self.type_id(), 16..=23)
    }

    /// 是否为 IDR NAL
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::IdrWRadl | Self::IdrNLp)
    }

    /// 是否为参数集 (VPS/SPS/PPS)
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Vps | Self::Sps | Self::Pps)
    }

    /// 出现在 VCL 之后时是否开启新的访问单元 (H.265 7.4.2.4.4)
    pub fn opens_access_unit(&self) -> bool {
        matches!(self.type_id(), 32..=35 | 39 | 41..=44 | 48..=55)
    }
}

impl std::fmt::Display for HevcNalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vps => write!(f, "VPS"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::PrefixSei => write!(f, "PREFIX_SEI"),
            Self::SuffixSei => write!(f, "SUFFIX_SEI"),
            Self::IdrWRadl => write!(f, "IDR_W_RADL"),
            Self::IdrNLp => write!(f, "IDR_N_LP"),
            Self::Cra => write!(f, "CRA"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
            other => write!(f, "VCL({})", other.type_id()),
        }
    }
}
