//! HEVC 基本流解封装器.
//!
//! 包含进样本的单元: 首个 VPS/SPS/PPS, 前缀 SEI, 所有 VCL 切片 (类型 < 32).
//! IDR_W_RADL / IDR_N_LP 标记为关键帧. 编码字符串由 SPS 的 profile_tier_level 推导.

use bytes::Bytes;
use log::{debug, warn};
use vmux_core::VmuxResult;

use super::{DemuxerEvents, ElementaryDemuxer, SampleAssembler};
use crate::config::StreamConfig;
use crate::parsers::annexb::{AnnexBScanner, NalCodec, decode_rbsp};
use crate::parsers::h265::{
    HevcNalUnitType, HvccRecord, parse_hevc_pps, parse_hevc_sps, parse_hevc_sps_ptl,
    parse_hevc_vps,
};
use crate::track::{CodecFourCc, VideoTrack};

/// HEVC 解封装器
#[derive(Debug)]
pub struct HevcDemuxer {
    track: VideoTrack,
    assembler: SampleAssembler,
}

impl HevcDemuxer {
    /// 创建解封装器
    pub fn new(config: StreamConfig) -> Self {
        Self {
            track: VideoTrack::new(1, CodecFourCc::Hev1),
            assembler: SampleAssembler::new(config),
        }
    }

    /// 锁定首个 SPS, 返回编码字符串
    ///
    /// 完整语法遍历失败但 profile_tier_level 可读时仍然锁定, 尺寸退回配置值.
    fn lock_sps(&mut self, nal: &[u8]) -> VmuxResult<String> {
        let rbsp = decode_rbsp(nal);
        let (ptl, parsed_size) = match parse_hevc_sps(&rbsp) {
            Ok(sps) => (sps.ptl, Some((sps.width, sps.height))),
            Err(e) => {
                let ptl = parse_hevc_sps_ptl(&rbsp)?;
                warn!("HEVC: SPS 解析不完整, 尺寸使用配置值: {e}");
                (ptl, None)
            }
        };

        let config = self.assembler.config();
        let (width, height) = match parsed_size {
            Some(size) if config.width == 0 || config.height == 0 => size,
            _ => (config.width, config.height),
        };
        let codec_string = ptl.codec_string();
        self.track.width = width;
        self.track.height = height;
        self.track.duration = 0;
        self.track.sps = Some(Bytes::copy_from_slice(nal));
        self.track.codec_string = Some(codec_string.clone());
        debug!("HEVC: 锁定 SPS, codec={codec_string}, {width}x{height}");
        Ok(codec_string)
    }

    /// VPS/SPS/PPS 都已锁定后构建 hvcC
    fn build_decoder_config(&mut self) {
        if self.track.decoder_config.is_some() {
            return;
        }
        let (Some(vps), Some(sps), Some(pps)) =
            (&self.track.vps, &self.track.sps, &self.track.pps)
        else {
            return;
        };
        match HvccRecord::from_parameter_sets(vps, sps, pps) {
            Ok(record) => self.track.decoder_config = Some(record.to_bytes()),
            Err(e) => warn!("HEVC: 构建 hvcC 失败: {e}"),
        }
    }
}

impl ElementaryDemuxer for HevcDemuxer {
    fn codec(&self) -> NalCodec {
        NalCodec::Hevc
    }

    fn push_data(&mut self, data: &[u8], events: &mut dyn DemuxerEvents) -> VmuxResult<()> {
        let mut skipped = Vec::new();
        for nal in AnnexBScanner::new(data, NalCodec::Hevc) {
            let nal_type = HevcNalUnitType::from_type_id(nal.kind);
            match nal_type {
                HevcNalUnitType::Vps => {
                    if self.track.vps.is_some() {
                        continue;
                    }
                    if let Err(e) = parse_hevc_vps(&decode_rbsp(nal.payload)) {
                        warn!("HEVC: 跳过损坏的 VPS: {e}");
                        continue;
                    }
                    self.track.vps = Some(Bytes::copy_from_slice(nal.payload));
                    self.assembler.include(nal.payload, false, false);
                    self.build_decoder_config();
                }
                HevcNalUnitType::Sps => {
                    if self.track.sps.is_some() {
                        continue;
                    }
                    match self.lock_sps(nal.payload) {
                        Ok(codec_string) => {
                            events.on_parameter_sets_ready(&codec_string);
                            self.assembler.include(nal.payload, false, false);
                            self.build_decoder_config();
                        }
                        Err(e) => warn!("HEVC: 跳过损坏的 SPS: {e}"),
                    }
                }
                HevcNalUnitType::Pps => {
                    if self.track.pps.is_some() {
                        continue;
                    }
                    if let Err(e) = parse_hevc_pps(&decode_rbsp(nal.payload)) {
                        warn!("HEVC: 跳过损坏的 PPS: {e}");
                        continue;
                    }
                    self.track.pps = Some(Bytes::copy_from_slice(nal.payload));
                    self.assembler.include(nal.payload, false, false);
                    self.build_decoder_config();
                }
                HevcNalUnitType::PrefixSei => self.assembler.include(nal.payload, false, false),
                t if t.is_vcl() => self.assembler.include(nal.payload, true, t.is_idr()),
                other => skipped.push(other),
            }
        }
        if !skipped.is_empty() {
            debug!("HEVC: 丢弃 NAL {skipped:?}");
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
