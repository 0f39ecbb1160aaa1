//! # vmux-format
//!
//! vmux 重封装框架的容器层, 把基本流样本封装为分片 MP4 (fMP4).
//!
//! - [`fmp4`]: ISO-BMFF box 树, 初始化分段与媒体分片
//! - [`remuxer`]: 时间戳归一化与分片输出
//! - [`pipeline`]: 解封装器 + 重封装器的直播流水线
//!
//! ## 使用示例
//!
//! ```rust
//! use vmux_codec::{NalCodec, StreamConfig};
//! use vmux_format::{LivePipeline, RemuxerConfig, VecSink};
//!
//! let mut pipeline = LivePipeline::new(
//!     NalCodec::H264,
//!     StreamConfig::default(),
//!     RemuxerConfig::default(),
//!     VecSink::new(),
//! );
//! // 没有 NAL 单元的输入不产生任何输出
//! pipeline.push_data(&[0xFF, 0xFF]).unwrap();
//! assert!(pipeline.sink().fragments.is_empty());
//! ```

pub mod fmp4;
pub mod pipeline;
pub mod remuxer;

// 重导出常用类型
pub use fmp4::Mp4Box;
pub use pipeline::{LivePipeline, VecSink};
pub use remuxer::{
    FragmentRemuxer, FragmentSink, KeyFrameInfo, RemuxerConfig, normalize_timestamp,
};
