//! 码流解析器.
//!
//! - `annexb`: 起始码扫描, RBSP 反转义, 长度前缀切分
//! - `slicer`: 跨调用的访问单元切分
//! - `h264` / `h265`: NAL 类型表与参数集解析

pub mod annexb;
pub mod h264;
pub mod h265;
pub mod slicer;

pub use annexb::{
    AnnexBScanner, NalCodec, NalUnit, decode_rbsp, escape_rbsp, split_length_prefixed,
    unescape_rbsp,
};
pub use slicer::AccessUnitSlicer;
