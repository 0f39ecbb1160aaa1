//! 基本流解封装器.
//!
//! 每次 `push_data` 输入一个完整访问单元 (Annex B 字节流), 解封装器按编码标准的
//! NAL 类型表分类, 锁定参数集, 把访问单元整理为带时间戳的 [`Sample`] 追加到轨道,
//! 样本数达到分片大小时通过 [`DemuxerEvents::on_track_ready`] 交出轨道.
//!
//! 跨调用的分片重组不在这里处理, 见 [`crate::parsers::AccessUnitSlicer`].

pub mod h264;
pub mod hevc;

use bytes::Bytes;
use log::debug;
use vmux_core::VmuxResult;

use crate::config::StreamConfig;
use crate::parsers::NalCodec;
use crate::track::{Sample, VideoTrack};

pub use h264::H264Demuxer;
pub use hevc::HevcDemuxer;

/// 解封装器事件接收者
///
/// 每次 `push_data` 调用时借用, 解封装器不持有它.
pub trait DemuxerEvents {
    /// 首个 SPS 被锁定, 给出编码字符串
    fn on_parameter_sets_ready(&mut self, codec_string: &str);

    /// 轨道已积累足够样本, 接收者应取走样本
    fn on_track_ready(&mut self, track: &mut VideoTrack) -> VmuxResult<()>;
}

/// 基本流解封装器 trait
pub trait ElementaryDemuxer: Send {
    /// 编码标准
    fn codec(&self) -> NalCodec;

    /// 输入一个访问单元
    ///
    /// 没有 NAL 单元时为空操作. 损坏的参数集被跳过, 不会导致错误返回;
    /// 错误只来自 `events.on_track_ready`.
    fn push_data(&mut self, data: &[u8], events: &mut dyn DemuxerEvents) -> VmuxResult<()>;

    /// 开始新的流代: 清空参数集, 配置记录, 未完成样本与时间戳
    fn reset(&mut self);

    /// 当前轨道
    fn track(&self) -> &VideoTrack;

    /// 当前轨道 (可变)
    fn track_mut(&mut self) -> &mut VideoTrack;
}

/// 按编码标准创建解封装器
pub fn create_demuxer(codec: NalCodec, config: StreamConfig) -> Box<dyn ElementaryDemuxer> {
    match codec {
        NalCodec::H264 => Box::new(H264Demuxer::new(config)),
        NalCodec::Hevc => Box::new(HevcDemuxer::new(config)),
    }
}

// ============================================================
// 样本组装
// ============================================================

/// 两种解封装器共用的样本组装状态
///
/// 未含 VCL 的单元 (例如单独到达的参数集) 保留到下一个带切片的访问单元.
#[derive(Debug)]
pub(crate) struct SampleAssembler {
    config: StreamConfig,
    /// 下一个样本的时间戳
    timestamp: i64,
    pending: Vec<Bytes>,
    pending_bytes: usize,
    pending_key: bool,
    pending_vcl: bool,
}

impl SampleAssembler {
    pub(crate) fn new(config: StreamConfig) -> Self {
        Self {
            config,
            timestamp: 0,
            pending: Vec::new(),
            pending_bytes: 0,
            pending_key: false,
            pending_vcl: false,
        }
    }

    pub(crate) fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// 把单元加入当前样本
    pub(crate) fn include(&mut self, nal: &[u8], vcl: bool, key: bool) {
        self.pending_bytes += nal.len();
        self.pending.push(Bytes::copy_from_slice(nal));
        self.pending_vcl |= vcl;
        self.pending_key |= key;
    }

    /// 当前样本含切片时关闭样本, 样本数达到分片大小时通知接收者
    pub(crate) fn finish_access_unit(
        &mut self,
        track: &mut VideoTrack,
        events: &mut dyn DemuxerEvents,
    ) -> VmuxResult<()> {
        if self.pending_vcl {
            let ts = self.timestamp;
            let sample = Sample {
                pts: ts,
                dts: ts,
                key: self.pending_key,
                nal_units: std::mem::take(&mut self.pending),
                byte_size: self.pending_bytes,
            };
            debug!(
                "{}: 样本 ts={ts}, key={}, nal={}, bytes={}",
                track.codec,
                sample.key,
                sample.nal_units.len(),
                sample.byte_size
            );
            track.push_sample(sample);
            self.pending_bytes = 0;
            self.pending_key = false;
            self.pending_vcl = false;
            self.timestamp += i64::from(self.config.time_base);
        }

        if track.samples.len() >= self.config.samples_per_fragment() {
            events.on_track_ready(track)?;
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.timestamp = 0;
        self.pending.clear();
        self.pending_bytes = 0;
        self.pending_key = false;
        self.pending_vcl = false;
    }
}
