//! # vmux
//!
//! 纯 Rust 实现的直播视频重封装框架: H.264/HEVC Annex B 基本流输入,
//! 分片 MP4 (初始化分段 + moof/mdat 媒体分片) 输出, 可直接送入 MSE 一类的播放端.
//!
//! # 快速开始
//!
//! ```rust
//! use vmux::codec::{NalCodec, StreamConfig};
//! use vmux::format::{LivePipeline, RemuxerConfig, VecSink};
//!
//! let stream_config = StreamConfig::default().with_time_base(3000);
//! let remuxer_config = RemuxerConfig::default()
//!     .with_time_base(3000)
//!     .with_timescale(90_000);
//! let mut pipeline =
//!     LivePipeline::new(NalCodec::H264, stream_config, remuxer_config, VecSink::new());
//!
//! // 没有参数集的数据不会产生任何输出
//! pipeline.push_data(&[0, 0, 0, 1, 0x09, 0xF0]).unwrap();
//! assert!(pipeline.sink().init_segments.is_empty());
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `vmux-core` | 错误类型, 比特读写 |
//! | `vmux-codec` | NAL 扫描, 参数集解析, 基本流解封装 |
//! | `vmux-format` | MP4 box 构建, 分片重封装, 直播流水线 |

/// 错误类型与比特读写
pub use vmux_core as core;

/// 码流解析与基本流解封装
pub use vmux_codec as codec;

/// 分片 MP4 封装与直播流水线
pub use vmux_format as format;

/// 获取 vmux 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }
}
