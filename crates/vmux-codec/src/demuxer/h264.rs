//! H.264 基本流解封装器.
//!
//! 包含进样本的单元: 首个 SPS, 首个 PPS, IDR 切片, 非 IDR 切片.
//! 其余类型 (SEI, AUD, 数据分区等) 记录日志后丢弃.

use bytes::Bytes;
use log::{debug, warn};
use vmux_core::VmuxResult;

use super::{DemuxerEvents, ElementaryDemuxer, SampleAssembler};
use crate::config::StreamConfig;
use crate::parsers::annexb::{AnnexBScanner, NalCodec, unescape_rbsp};
use crate::parsers::h264::{NalUnitType, avc_codec_string, build_avcc_config, parse_sps};
use crate::track::{CodecFourCc, VideoTrack};

/// avcC 中 NAL 长度前缀的字节数
const LENGTH_SIZE: usize = 4;

/// H.264 解封装器
#[derive(Debug)]
pub struct H264Demuxer {
    track: VideoTrack,
    assembler: SampleAssembler,
}

impl H264Demuxer {
    /// 创建解封装器
    pub fn new(config: StreamConfig) -> Self {
        Self {
            track: VideoTrack::new(1, CodecFourCc::Avc1),
            assembler: SampleAssembler::new(config),
        }
    }

    /// 锁定首个 SPS, 返回编码字符串
    ///
    /// 编码字符串取自 SPS 原始字节. 只有配置未给出尺寸时才需要完整解析 SPS.
    fn lock_sps(&mut self, nal: &[u8]) -> VmuxResult<String> {
        let codec_string = avc_codec_string(nal)?;

        let config = self.assembler.config();
        let (width, height) = if config.width == 0 || config.height == 0 {
            let sps = parse_sps(&unescape_rbsp(&nal[1..]))?;
            debug!(
                "H264: SPS profile={}, level={}, {}x{}",
                sps.profile_idc, sps.level_idc, sps.width, sps.height
            );
            (sps.width, sps.height)
        } else {
            (config.width, config.height)
        };
        self.track.width = width;
        self.track.height = height;
        self.track.duration = 0;
        self.track.sps = Some(Bytes::copy_from_slice(nal));
        self.track.codec_string = Some(codec_string.clone());
        debug!("H264: 锁定 SPS, codec={codec_string}, {width}x{height}");
        Ok(codec_string)
    }

    /// SPS 与 PPS 都已锁定后构建 avcC
    fn build_decoder_config(&mut self) {
        if self.track.decoder_config.is_some() {
            return;
        }
        let (Some(sps), Some(pps)) = (&self.track.sps, &self.track.pps) else {
            return;
        };
        match build_avcc_config(&[sps.as_ref()], &[pps.as_ref()], LENGTH_SIZE) {
            Ok(config) => self.track.decoder_config = Some(config),
            Err(e) => warn!("H264: 构建 avcC 失败: {e}"),
        }
    }
}

impl ElementaryDemuxer for H264Demuxer {
    fn codec(&self) -> NalCodec {
        NalCodec::H264
    }

    fn push_data(&mut self, data: &[u8], events: &mut dyn DemuxerEvents) -> VmuxResult<()> {
        let mut skipped = Vec::new();
        for nal in AnnexBScanner::new(data, NalCodec::H264) {
            let nal_type = NalUnitType::from_type_id(nal.kind);
            match nal_type {
                NalUnitType::Slice => self.assembler.include(nal.payload, true, false),
                NalUnitType::SliceIdr => self.assembler.include(nal.payload, true, true),
                NalUnitType::Sps => {
                    if self.track.sps.is_some() {
                        continue;
                    }
                    match self.lock_sps(nal.payload) {
                        Ok(codec_string) => {
                            events.on_parameter_sets_ready(&codec_string);
                            self.assembler.include(nal.payload, false, false);
                            self.build_decoder_config();
                        }
                        Err(e) => warn!("H264: 跳过损坏的 SPS: {e}"),
                    }
                }
                NalUnitType::Pps => {
                    if self.track.pps.is_some() {
                        continue;
                    }
                    if nal.payload.len() < 2 {
                        warn!("H264: 跳过损坏的 PPS: 数据太短");
                        continue;
                    }
                    self.track.pps = Some(Bytes::copy_from_slice(nal.payload));
                    self.assembler.include(nal.payload, false, false);
                    self.build_decoder_config();
                }
                other => skipped.push(other),
            }
        }
        if !skipped.is_empty() {
            debug!("H264: 丢弃 NAL {skipped:?}");
        }

        self.assembler.finish_access_unit(&mut self.track, events)
    }

    fn reset(&mut self) {
        self.track.reset();
        self.assembler.reset();
    }

    fn track(&self) -> &VideoTrack {
        &self.track
    }

    fn track_mut(&mut self) -> &mut VideoTrack {
        &mut self.track
    }
}
