//! 视频轨道与样本模型.
//!
//! 解封装器独占 [`VideoTrack`] 并只在 `push_data` 中修改它;
//! 重封装器每消费一次轨道就清空其中的样本与计数.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use vmux_core::{VmuxError, VmuxResult};

/// MP4 样本描述 (sample entry) 的 FourCC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecFourCc {
    /// H.264, 配置记录为 avcC
    Avc1,
    /// HEVC, 参数集可出现在码流中, 配置记录为 hvcC
    Hev1,
    /// HEVC, 参数集只在 hvcC 中
    Hvc1,
}

impl CodecFourCc {
    /// 4 字节标识
    pub const fn as_bytes(self) -> [u8; 4] {
        match self {
            Self::Avc1 => *b"avc1",
            Self::Hev1 => *b"hev1",
            Self::Hvc1 => *b"hvc1",
        }
    }

    /// 从 4 字节标识解析
    pub fn from_fourcc(fourcc: [u8; 4]) -> VmuxResult<Self> {
        match &fourcc {
            b"avc1" => Ok(Self::Avc1),
            b"hev1" => Ok(Self::Hev1),
            b"hvc1" => Ok(Self::Hvc1),
            _ => Err(VmuxError::UnsupportedCodec(format!(
                "MP4: 不支持的样本描述 {}",
                String::from_utf8_lossy(&fourcc)
            ))),
        }
    }

    /// 配置记录 box 的类型 (avcC / hvcC)
    pub const fn config_box(self) -> [u8; 4] {
        match self {
            Self::Avc1 => *b"avcC",
            Self::Hev1 | Self::Hvc1 => *b"hvcC",
        }
    }
}

impl fmt::Display for CodecFourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Avc1 => "avc1",
            Self::Hev1 => "hev1",
            Self::Hvc1 => "hvc1",
        };
        f.write_str(name)
    }
}

impl FromStr for CodecFourCc {
    type Err = VmuxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s.as_bytes().try_into().map_err(|_| {
            VmuxError::UnsupportedCodec(format!("MP4: 不支持的样本描述 {s}"))
        })?;
        Self::from_fourcc(bytes)
    }
}

/// 一个访问单元对应的样本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// 显示时间戳 (tick)
    pub pts: i64,
    /// 解码时间戳 (tick)
    pub dts: i64,
    /// 是否为关键帧 (含 IDR)
    pub key: bool,
    /// NAL 单元 (含 NAL 头, 不含起始码)
    pub nal_units: Vec<Bytes>,
    /// NAL 负载总字节数 (不含长度前缀)
    pub byte_size: usize,
}

impl Sample {
    /// 写入 mdat 后的大小 (每个 NAL 加 4 字节长度前缀)
    pub fn mp4_size(&self) -> usize {
        self.byte_size + 4 * self.nal_units.len()
    }
}

/// 视频轨道
#[derive(Debug, Clone)]
pub struct VideoTrack {
    /// 轨道 ID
    pub id: u32,
    /// 时间刻度 (每秒 tick 数), 由重封装器写入
    pub timescale: u32,
    /// 时长 (直播流恒为 0)
    pub duration: u64,
    /// 样本描述 FourCC
    pub codec: CodecFourCc,
    /// 图像宽度
    pub width: u32,
    /// 图像高度
    pub height: u32,
    /// avcC / hvcC 配置记录内容
    pub decoder_config: Option<Vec<u8>>,
    /// 编码字符串 (`avc1.*` / `hev1.*`)
    pub codec_string: Option<String>,
    /// 待封装的样本
    pub samples: Vec<Sample>,
    /// 样本 NAL 负载总字节数
    pub total_payload_bytes: usize,
    /// 样本 NAL 总数
    pub nal_count: usize,
    /// 最近一个关键帧的时间戳
    pub last_key_frame_timestamp: Option<i64>,
    /// 下一个 moof 的序号
    pub sequence_number: u32,
    /// 锁定的 SPS
    pub sps: Option<Bytes>,
    /// 锁定的 PPS
    pub pps: Option<Bytes>,
    /// 锁定的 VPS (仅 HEVC)
    pub vps: Option<Bytes>,
}

impl VideoTrack {
    /// 创建空轨道
    pub fn new(id: u32, codec: CodecFourCc) -> Self {
        Self {
            id,
            timescale: 0,
            duration: 0,
            codec,
            width: 0,
            height: 0,
            decoder_config: None,
            codec_string: None,
            samples: Vec::new(),
            total_payload_bytes: 0,
            nal_count: 0,
            last_key_frame_timestamp: None,
            sequence_number: 1,
            sps: None,
            pps: None,
            vps: None,
        }
    }

    /// 追加样本并累加计数
    pub fn push_sample(&mut self, sample: Sample) {
        if sample.key {
            self.last_key_frame_timestamp = Some(sample.dts);
        }
        self.total_payload_bytes += sample.byte_size;
        self.nal_count += sample.nal_units.len();
        self.samples.push(sample);
    }

    /// 取走全部样本, 计数清零
    pub fn take_samples(&mut self) -> Vec<Sample> {
        self.total_payload_bytes = 0;
        self.nal_count = 0;
        std::mem::take(&mut self.samples)
    }

    /// mdat 负载大小 (含长度前缀)
    pub fn mdat_payload_size(&self) -> usize {
        self.total_payload_bytes + 4 * self.nal_count
    }

    /// 开始新的流代: 参数集, 配置与样本全部清空
    pub fn reset(&mut self) {
        let id = self.id;
        let codec = self.codec;
        *self = Self::new(id, codec);
    }
}
