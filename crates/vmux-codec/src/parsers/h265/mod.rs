//! H.265/HEVC 码流解析器.
//!
//! 提供对 H.265 HEVC 码流的解析能力:
//! - NAL 单元类型识别 (2 字节 NAL 头)
//! - VPS / SPS / PPS 完整语法遍历
//! - `hev1.*` 编码字符串
//! - HEVCDecoderConfigurationRecord (hvcC) 构建与解析
//!
//! # HEVC NAL 头部 (2 字节)
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ forbidden(1) | type(6) | layer_id(6) | tid(3) │
//! └────────────────────────────────────────────┘
//! ```

pub mod hvcc;
pub mod nal;
pub mod ps;

pub use hvcc::HvccRecord;
pub use nal::HevcNalUnitType;
pub use ps::{
    HevcPps, HevcSps, HevcVps, ProfileTierLevel, parse_hevc_pps, parse_hevc_sps,
    parse_hevc_sps_ptl, parse_hevc_vps, parse_profile_tier_level,
};
