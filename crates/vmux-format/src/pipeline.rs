//! 直播重封装流水线.
//!
//! [`LivePipeline`] 持有一个解封装器与一个重封装器, 把解封装器事件转给重封装器,
//! 输出交给调用方提供的 [`FragmentSink`]. 断线重连等外部逻辑通过
//! `insert_discontinuity` / `reset` 驱动流水线.

use bytes::Bytes;
use log::info;
use vmux_codec::demuxer::{DemuxerEvents, ElementaryDemuxer, create_demuxer};
use vmux_codec::parsers::NalCodec;
use vmux_codec::StreamConfig;
use vmux_codec::track::VideoTrack;
use vmux_core::VmuxResult;

use crate::remuxer::{FragmentRemuxer, FragmentSink, KeyFrameInfo, RemuxerConfig};

/// 解封装器事件到重封装器/接收者的转发
struct Forwarder<'a, S: FragmentSink> {
    remuxer: &'a mut FragmentRemuxer,
    sink: &'a mut S,
}

impl<S: FragmentSink> DemuxerEvents for Forwarder<'_, S> {
    fn on_parameter_sets_ready(&mut self, codec_string: &str) {
        info!("流水线: 参数集就绪, codec={codec_string}");
        self.sink.on_parameter_sets_ready(codec_string);
    }

    fn on_track_ready(&mut self, track: &mut VideoTrack) -> VmuxResult<()> {
        self.remuxer.push_video(track, &mut *self.sink)
    }
}

/// 直播重封装流水线
pub struct LivePipeline<S: FragmentSink> {
    demuxer: Box<dyn ElementaryDemuxer>,
    remuxer: FragmentRemuxer,
    sink: S,
}

impl<S: FragmentSink> LivePipeline<S> {
    /// 创建流水线
    pub fn new(
        codec: NalCodec,
        stream_config: StreamConfig,
        remuxer_config: RemuxerConfig,
        sink: S,
    ) -> Self {
        Self {
            demuxer: create_demuxer(codec, stream_config),
            remuxer: FragmentRemuxer::new(remuxer_config),
            sink,
        }
    }

    /// 编码标准
    pub fn codec(&self) -> NalCodec {
        self.demuxer.codec()
    }

    /// 输入一个访问单元
    pub fn push_data(&mut self, data: &[u8]) -> VmuxResult<()> {
        let mut forwarder = Forwarder {
            remuxer: &mut self.remuxer,
            sink: &mut self.sink,
        };
        self.demuxer.push_data(data, &mut forwarder)
    }

    /// 流结束: 把轨道中不足一个分片的剩余样本也封装输出
    pub fn flush(&mut self) -> VmuxResult<()> {
        let track = self.demuxer.track_mut();
        if track.samples.is_empty() {
            return Ok(());
        }
        self.remuxer.push_video(track, &mut self.sink)
    }

    /// 时间轴断开 (例如重连后时间戳重新开始)
    pub fn insert_discontinuity(&mut self) {
        self.remuxer.insert_discontinuity();
    }

    /// 开始新的流代: 解封装器与重封装器全部重置
    pub fn reset(&mut self) {
        self.demuxer.reset();
        self.remuxer.reset();
    }

    /// 当前轨道
    pub fn track(&self) -> &VideoTrack {
        self.demuxer.track()
    }

    /// 输出接收者
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 输出接收者 (可变)
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// 取出输出接收者
    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// 在内存中收集全部输出
#[derive(Debug, Default)]
pub struct VecSink {
    /// 编码字符串 (每个流代一个)
    pub codec_strings: Vec<String>,
    /// 初始化分段
    pub init_segments: Vec<Bytes>,
    /// 媒体分片与关键帧信息
    pub fragments: Vec<(Bytes, Option<KeyFrameInfo>)>,
}

impl VecSink {
    /// 创建空接收者
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有输出的总字节数
    pub fn total_bytes(&self) -> usize {
        self.init_segments.iter().map(Bytes::len).sum::<usize>()
            + self.fragments.iter().map(|(f, _)| f.len()).sum::<usize>()
    }

    /// 含关键帧的分片数
    pub fn key_fragment_count(&self) -> usize {
        self.fragments.iter().filter(|(_, k)| k.is_some()).count()
    }
}

impl FragmentSink for VecSink {
    fn on_parameter_sets_ready(&mut self, codec_string: &str) {
        self.codec_strings.push(codec_string.to_string());
    }

    fn on_init_segment(&mut self, data: Bytes) {
        self.init_segments.push(data);
    }

    fn on_fragment(&mut self, data: Bytes, key_frame: Option<KeyFrameInfo>) {
        self.fragments.push((data, key_frame));
    }
}
