//! 基本流配置.
//!
//! 每个流代 (stream generation) 设定一次, 由解封装器持有.

/// 基本流配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamConfig {
    /// 图像宽度 (0 表示从 SPS 推导)
    pub width: u32,
    /// 图像高度 (0 表示从 SPS 推导)
    pub height: u32,
    /// 每帧时长 (以 timescale 为单位的 tick 数)
    pub time_base: u32,
    /// 每个分片包含的样本数 (0 按 1 处理)
    pub frag_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            time_base: 1,
            frag_size: 1,
        }
    }
}

impl StreamConfig {
    /// 设置图像尺寸
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// 设置每帧时长
    pub fn with_time_base(mut self, time_base: u32) -> Self {
        self.time_base = time_base;
        self
    }

    /// 设置分片样本数
    pub fn with_frag_size(mut self, frag_size: usize) -> Self {
        self.frag_size = frag_size;
        self
    }

    /// 触发 `on_track_ready` 所需的样本数
    pub fn samples_per_fragment(&self) -> usize {
        self.frag_size.max(1)
    }
}
