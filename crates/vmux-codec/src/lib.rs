//! # vmux-codec
//!
//! vmux 重封装框架的码流层, 把 Annex B 基本流整理为带时间戳的样本.
//!
//! ## 模块
//!
//! - [`parsers`]: 起始码扫描, RBSP 反转义, 访问单元切分, H.264/HEVC 参数集解析
//! - [`demuxer`]: H.264 / HEVC 基本流解封装器
//! - [`track`]: 视频轨道与样本模型
//! - [`config`]: 流配置
//!
//! ## 使用示例
//!
//! ```rust
//! use vmux_codec::{NalCodec, StreamConfig, create_demuxer};
//!
//! let config = StreamConfig::default().with_time_base(3000).with_frag_size(1);
//! let demuxer = create_demuxer(NalCodec::H264, config);
//! assert_eq!(demuxer.codec(), NalCodec::H264);
//! ```

pub mod config;
pub mod demuxer;
pub mod parsers;
pub mod track;

#[cfg(test)]
mod testing;

// 重导出常用类型
pub use config::StreamConfig;
pub use demuxer::{DemuxerEvents, ElementaryDemuxer, create_demuxer};
pub use parsers::{AccessUnitSlicer, NalCodec};
pub use track::{CodecFourCc, Sample, VideoTrack};
