//! H.264/AVC 码流解析器.
//!
//! 提供对 H.264 码流的解析能力:
//! - NAL 单元类型识别
//! - SPS (Sequence Parameter Set) 尺寸解析
//! - AVCDecoderConfigurationRecord 构建与 `avc1.PPCCLL` 编码字符串

pub mod nal;
pub mod sps;

pub use nal::{NalUnitType, avc_codec_string, build_avcc_config};
pub use sps::{Sps, parse_sps};
