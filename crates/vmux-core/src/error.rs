//! 统一错误类型定义.
//!
//! 所有 vmux crate 共用的错误类型, 从比特读取一直传播到分片输出.

use thiserror::Error;

/// vmux 统一错误类型
#[derive(Debug, Error)]
pub enum VmuxError {
    /// 比特流提前耗尽 (参数集或访问单元被截断)
    #[error("比特流耗尽: 需要 {requested} 位, 剩余 {available} 位")]
    BitstreamExhausted {
        /// 本次请求的位数
        requested: usize,
        /// 缓冲区中剩余的位数
        available: usize,
    },

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 不支持的编解码器 fourcc
    #[error("不支持的编解码器: {0}")]
    UnsupportedCodec(String),

    /// 码流格式错误 (如长时间缺少参数集)
    #[error("码流格式错误: {0}")]
    StreamFormat(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl VmuxError {
    /// 是否为比特流耗尽错误
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::BitstreamExhausted { .. })
    }
}

/// vmux 统一 Result 类型
pub type VmuxResult<T> = Result<T, VmuxError>;
