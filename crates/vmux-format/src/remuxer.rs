//! 分片重封装器.
//!
//! 把解封装器交出的轨道样本转换为 fMP4 初始化分段与媒体分片:
//! 1. 轨道首次带有配置记录与样本时输出初始化分段, 并锁定 `init_pts`/`init_dts`
//! 2. 每个样本的时间戳减去锁定值, 再按 33 位回绕归一化
//! 3. 分片首样本与上一分片末尾之间的小间隙/重叠被吸收
//! 4. 输出 moof + mdat, 清空轨道样本

use bytes::{Bytes, BytesMut};
use log::{debug, error, trace, warn};
use vmux_codec::track::VideoTrack;
use vmux_core::{VmuxError, VmuxResult};

use crate::fmp4::fragment::{FragmentSample, SampleFlags, build_fragment, put_length_prefixed};
use crate::fmp4::init::init_segment;

/// 33 位 PTS 的周期 (2^33)
const PTS_WRAP: i64 = 1 << 33;

/// 判定回绕的阈值 (半个周期, 2^32)
const PTS_HALF_WRAP: i64 = 1 << 32;

/// 小于此值 (tick) 的分片间跳变被视为抖动并吸收
const MAX_SNAP_DELTA: i64 = 600;

/// 没有配置记录时最多缓存的样本数
const MAX_SAMPLES_WITHOUT_CONFIG: usize = 3;

/// 重封装器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RemuxerConfig {
    /// 每帧时长 (tick)
    pub time_base: u32,
    /// 时间刻度 (每秒 tick 数)
    pub timescale: u32,
}

impl Default for RemuxerConfig {
    fn default() -> Self {
        Self {
            time_base: 1,
            timescale: 30,
        }
    }
}

impl RemuxerConfig {
    /// 设置每帧时长
    pub fn with_time_base(mut self, time_base: u32) -> Self {
        self.time_base = time_base;
        self
    }

    /// 设置时间刻度
    pub fn with_timescale(mut self, timescale: u32) -> Self {
        self.timescale = timescale;
        self
    }
}

/// 分片中关键帧的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyFrameInfo {
    /// 最近关键帧时间戳相对分片首样本 DTS 的偏移 (tick)
    pub offset: i64,
}

/// 输出接收者
pub trait FragmentSink {
    /// 首个 SPS 被锁定, 给出编码字符串 (用于创建播放端缓冲区)
    fn on_parameter_sets_ready(&mut self, _codec_string: &str) {}

    /// 初始化分段 (ftyp + moov)
    fn on_init_segment(&mut self, data: Bytes);

    /// 媒体分片 (moof + mdat)
    fn on_fragment(&mut self, data: Bytes, key_frame: Option<KeyFrameInfo>);
}

/// 把时间戳移到 `reference` 所在的 33 位周期
///
/// 结果落在 `[reference - 2^32, reference + 2^32)` 内.
pub fn normalize_timestamp(mut value: i64, reference: i64) -> i64 {
    while value - reference >= PTS_HALF_WRAP {
        value -= PTS_WRAP;
    }
    while value - reference < -PTS_HALF_WRAP {
        value += PTS_WRAP;
    }
    value
}

/// 分片重封装器
#[derive(Debug)]
pub struct FragmentRemuxer {
    config: RemuxerConfig,
    init_generated: bool,
    /// 下一分片首样本的期望 DTS (上一分片末样本 DTS + time_base)
    next_dts: Option<i64>,
    init_pts: Option<i64>,
    init_dts: Option<i64>,
    /// 本流代是否已报告缺少配置记录
    missing_config_reported: bool,
}

impl FragmentRemuxer {
    /// 创建重封装器
    pub fn new(config: RemuxerConfig) -> Self {
        Self {
            config,
            init_generated: false,
            next_dts: None,
            init_pts: None,
            init_dts: None,
            missing_config_reported: false,
        }
    }

    /// 当前配置
    pub fn config(&self) -> &RemuxerConfig {
        &self.config
    }

    /// 下一分片首样本的期望 DTS
    pub fn next_dts(&self) -> Option<i64> {
        self.next_dts
    }

    /// 是否已输出初始化分段
    pub fn init_generated(&self) -> bool {
        self.init_generated
    }

    /// 时间轴断开: 下一次调用重新锁定 `init_pts`/`init_dts`
    pub fn insert_discontinuity(&mut self) {
        self.init_pts = None;
        self.init_dts = None;
    }

    /// 编码配置变化: 下一次调用重新输出初始化分段
    pub fn switch_level(&mut self) {
        self.init_generated = false;
    }

    /// 开始新的流代
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    /// 消费轨道中的样本, 输出初始化分段与媒体分片
    pub fn push_video(
        &mut self,
        track: &mut VideoTrack,
        sink: &mut dyn FragmentSink,
    ) -> VmuxResult<()> {
        if !self.init_generated {
            if let Err(e) = self.generate_init_segment(track, sink) {
                // 无法输出初始化分段的样本不再保留
                track.take_samples();
                return Err(e);
            }
        }
        if !self.init_generated {
            if track.samples.len() > MAX_SAMPLES_WITHOUT_CONFIG {
                track.take_samples();
                if !self.missing_config_reported {
                    self.missing_config_reported = true;
                    error!("MP4: 未收到 SPS/PPS, 丢弃样本");
                    return Err(VmuxError::StreamFormat("未收到 SPS/PPS".into()));
                }
            }
            return Ok(());
        }
        if track.samples.is_empty() {
            return Ok(());
        }
        if self.init_pts.is_none() || self.init_dts.is_none() {
            self.latch_initial_timestamps(track);
        }
        self.remux_video(track, sink);
        Ok(())
    }

    fn generate_init_segment(
        &mut self,
        track: &mut VideoTrack,
        sink: &mut dyn FragmentSink,
    ) -> VmuxResult<()> {
        if track.decoder_config.is_none() || track.samples.is_empty() {
            return Ok(());
        }
        track.timescale = self.config.timescale;
        let data = init_segment(track)?;
        debug!(
            "MP4: 初始化分段 {} 字节, codec={}, {}x{}",
            data.len(),
            track.codec,
            track.width,
            track.height
        );
        sink.on_init_segment(data);
        self.init_generated = true;
        if self.init_pts.is_none() {
            self.latch_initial_timestamps(track);
        }
        Ok(())
    }

    fn latch_initial_timestamps(&mut self, track: &VideoTrack) {
        if let Some(first) = track.samples.first() {
            let time_base = i64::from(self.config.time_base);
            self.init_pts = Some(first.pts - time_base);
            self.init_dts = Some(first.dts - time_base);
        }
    }

    fn remux_video(&mut self, track: &mut VideoTrack, sink: &mut dyn FragmentSink) {
        let init_pts = self.init_pts.unwrap_or_default();
        let init_dts = self.init_dts.unwrap_or_default();
        let time_base = i64::from(self.config.time_base);
        let last_key_frame_timestamp = track.last_key_frame_timestamp;

        let mdat_size = track.mdat_payload_size();
        let samples = track.take_samples();
        let dts0 = samples[0].dts;

        let mut mdat = BytesMut::with_capacity(mdat_size);
        let mut entries = Vec::with_capacity(samples.len());
        let mut first_dts = None;
        let mut last_dts: Option<i64> = None;
        let mut has_key = false;

        for sample in &samples {
            let mut size = 0;
            for nal in &sample.nal_units {
                size += put_length_prefixed(&mut mdat, nal);
            }

            let pts = sample.pts - init_pts;
            let dts = (sample.dts - init_dts).min(pts);
            let (mut pts_norm, mut dts_norm);
            match (last_dts, self.next_dts) {
                (Some(last), _) => {
                    pts_norm = normalize_timestamp(pts, last);
                    dts_norm = normalize_timestamp(dts, last);
                }
                (None, Some(next)) => {
                    pts_norm = normalize_timestamp(pts, next);
                    dts_norm = normalize_timestamp(dts, next);
                    let delta = dts_norm - next;
                    if delta != 0 && delta.abs() < MAX_SNAP_DELTA {
                        if delta > 0 {
                            warn!("MP4: 分片间出现 {delta} tick 空洞, 已填补");
                        } else {
                            warn!("MP4: 分片间出现 {} tick 重叠, 已修正", -delta);
                        }
                        dts_norm = next;
                        pts_norm = (pts_norm - delta).max(dts_norm);
                    }
                }
                (None, None) => {
                    pts_norm = pts;
                    dts_norm = dts;
                }
            }
            trace!("MP4: 样本 pts={pts_norm}, dts={dts_norm}, size={size}");

            first_dts.get_or_insert(dts_norm);
            last_dts = Some(dts_norm);
            has_key |= sample.key;
            entries.push(FragmentSample {
                duration: self.config.time_base,
                size: size as u32,
                flags: SampleFlags::for_key(sample.key),
                composition_offset: 0,
            });
        }
        self.next_dts = last_dts.map(|dts| dts + time_base);

        let base_media_decode_time = first_dts.map_or(0, |dts| u64::try_from(dts).unwrap_or(0));
        let sequence_number = track.sequence_number;
        track.sequence_number = track.sequence_number.wrapping_add(1);
        let data = build_fragment(
            sequence_number,
            track.id,
            base_media_decode_time,
            &entries,
            &mdat,
        );
        let key_frame = has_key.then(|| KeyFrameInfo {
            offset: last_key_frame_timestamp.unwrap_or(dts0) - dts0,
        });
        debug!(
            "MP4: 分片 seq={sequence_number}, 样本={}, tfdt={base_media_decode_time}, {} 字节",
            entries.len(),
            data.len()
        );
        sink.on_fragment(data, key_frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fmp4::boxes::{MOOF, TFDT, TRAF, find_box};
    use byteorder::{BigEndian, ByteOrder};
    use vmux_codec::track::{CodecFourCc, Sample};

    #[derive(Default)]
    struct Collect {
        init: Vec<Bytes>,
        fragments: Vec<(Bytes, Option<KeyFrameInfo>)>,
    }

    impl FragmentSink for Collect {
        fn on_init_segment(&mut self, data: Bytes) {
            self.init.push(data);
        }

        fn on_fragment(&mut self, data: Bytes, key_frame: Option<KeyFrameInfo>) {
            self.fragments.push((data, key_frame));
        }
    }

    fn track_with_config() -> VideoTrack {
        let mut track = VideoTrack::new(1, CodecFourCc::Avc1);
        track.width = 16;
        track.height = 16;
        track.decoder_config = Some(vec![1, 0x42, 0xC0, 0x1E, 0xFF, 0xE0, 0x00]);
        track
    }

    fn push(track: &mut VideoTrack, ts: i64, key: bool) {
        track.push_sample(Sample {
            pts: ts,
            dts: ts,
            key,
            nal_units: vec![Bytes::from_static(&[0x65, 0x01])],
            byte_size: 2,
        });
    }

    fn tfdt(fragment: &[u8]) -> u64 {
        let tfdt = find_box(fragment, &[MOOF, TRAF, TFDT]).unwrap();
        BigEndian::read_u64(&tfdt[4..12])
    }

    #[test]
    fn test_normalize_timestamp_wraps() {
        assert_eq!(normalize_timestamp(100, 50), 100);
        assert_eq!(normalize_timestamp(PTS_WRAP + 10, 5), 10);
        assert_eq!(normalize_timestamp(10, PTS_WRAP - 5), PTS_WRAP + 10);
        // 多个周期
        assert_eq!(normalize_timestamp(3 * PTS_WRAP + 7, 0), 7);
        for (value, reference) in [(0, 5 * PTS_WRAP), (9 * PTS_WRAP + 1, -PTS_WRAP), (1, 1)] {
            let n = normalize_timestamp(value, reference);
            assert!(n - reference >= -PTS_HALF_WRAP, "{value} {reference}");
            assert!(n - reference < PTS_HALF_WRAP, "{value} {reference}");
            assert_eq!((n - value).rem_euclid(PTS_WRAP), 0);
        }
    }

    #[test]
    fn test_normalize_timestamp_half_open_range() {
        // 正好相差半个周期时落到下界
        assert_eq!(normalize_timestamp(PTS_HALF_WRAP, 0), -PTS_HALF_WRAP);
        assert_eq!(normalize_timestamp(-PTS_HALF_WRAP, 0), -PTS_HALF_WRAP);
        assert_eq!(normalize_timestamp(1000 + PTS_HALF_WRAP, 1000), 1000 - PTS_HALF_WRAP);
        assert_eq!(normalize_timestamp(PTS_HALF_WRAP - 1, 0), PTS_HALF_WRAP - 1);
    }

    #[test]
    fn test_init_then_fragments() {
        let mut remuxer = FragmentRemuxer::new(RemuxerConfig::default().with_time_base(10));
        let mut sink = Collect::default();
        let mut track = track_with_config();

        push(&mut track, 1000, true);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        push(&mut track, 1010, false);
        push(&mut track, 1020, false);
        remuxer.push_video(&mut track, &mut sink).unwrap();

        assert_eq!(sink.init.len(), 1);
        assert_eq!(track.timescale, 30);
        assert_eq!(sink.fragments.len(), 2);
        assert!(track.samples.is_empty());
        assert_eq!(track.sequence_number, 3);

        // init_dts = 1000 - 10, 首样本 dts' = 10
        assert_eq!(tfdt(&sink.fragments[0].0), 10);
        assert_eq!(tfdt(&sink.fragments[1].0), 20);
        assert_eq!(sink.fragments[0].1, Some(KeyFrameInfo { offset: 0 }));
        assert_eq!(sink.fragments[1].1, None);
        assert_eq!(remuxer.next_dts(), Some(40));
    }

    #[test]
    fn test_key_frame_offset_within_fragment() {
        let mut remuxer = FragmentRemuxer::new(RemuxerConfig::default());
        let mut sink = Collect::default();
        let mut track = track_with_config();
        push(&mut track, 0, true);
        push(&mut track, 1, false);
        push(&mut track, 2, true);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        assert_eq!(sink.fragments[0].1, Some(KeyFrameInfo { offset: 2 }));
    }

    #[test]
    fn test_small_gap_snapped() {
        let mut remuxer = FragmentRemuxer::new(RemuxerConfig::default().with_time_base(10));
        let mut sink = Collect::default();
        let mut track = track_with_config();

        push(&mut track, 0, true);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        // 期望 dts' = 20, 实际 20 + 100
        push(&mut track, 110, false);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        assert_eq!(tfdt(&sink.fragments[1].0), 20);

        // 超过阈值的跳变保持原样
        push(&mut track, 5000, false);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        assert_eq!(tfdt(&sink.fragments[2].0), 5010);
    }

    #[test]
    fn test_wraparound_keeps_timeline() {
        let mut remuxer = FragmentRemuxer::new(RemuxerConfig::default().with_time_base(3000));
        let mut sink = Collect::default();
        let mut track = track_with_config();

        let start = PTS_WRAP - 6000;
        push(&mut track, start, true);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        push(&mut track, start + 3000, false);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        // 33 位回绕
        push(&mut track, 0, false);
        remuxer.push_video(&mut track, &mut sink).unwrap();

        let times: Vec<u64> = sink.fragments.iter().map(|(f, _)| tfdt(f)).collect();
        assert_eq!(times, vec![3000, 6000, 9000]);
    }

    #[test]
    fn test_discontinuity_relatches() {
        let mut remuxer = FragmentRemuxer::new(RemuxerConfig::default().with_time_base(10));
        let mut sink = Collect::default();
        let mut track = track_with_config();

        push(&mut track, 500, true);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        remuxer.insert_discontinuity();
        push(&mut track, 90_000, true);
        remuxer.push_video(&mut track, &mut sink).unwrap();

        assert_eq!(sink.init.len(), 1);
        // 重新锁定后首样本 dts' = 10, 与 next_dts = 20 相差 10, 被吸收
        assert_eq!(tfdt(&sink.fragments[1].0), 20);
    }

    #[test]
    fn test_switch_level_and_reset_emit_new_init() {
        let mut remuxer = FragmentRemuxer::new(RemuxerConfig::default());
        let mut sink = Collect::default();
        let mut track = track_with_config();
        push(&mut track, 0, true);
        remuxer.push_video(&mut track, &mut sink).unwrap();

        remuxer.switch_level();
        push(&mut track, 1, true);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        assert_eq!(sink.init.len(), 2);
        assert_eq!(tfdt(&sink.fragments[1].0), 2);

        remuxer.reset();
        assert!(remuxer.next_dts().is_none());
        push(&mut track, 50, true);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        assert_eq!(sink.init.len(), 3);
        assert_eq!(tfdt(&sink.fragments[2].0), 1);
    }

    #[test]
    fn test_missing_config_reported_once() {
        let mut remuxer = FragmentRemuxer::new(RemuxerConfig::default());
        let mut sink = Collect::default();
        let mut track = VideoTrack::new(1, CodecFourCc::Avc1);

        for ts in 0..3 {
            push(&mut track, ts, false);
            remuxer.push_video(&mut track, &mut sink).unwrap();
        }
        assert_eq!(track.samples.len(), 3);

        push(&mut track, 3, false);
        let err = remuxer.push_video(&mut track, &mut sink).unwrap_err();
        assert!(matches!(err, VmuxError::StreamFormat(_)));
        assert!(track.samples.is_empty());

        for ts in 4..9 {
            push(&mut track, ts, false);
            remuxer.push_video(&mut track, &mut sink).unwrap();
        }
        assert!(track.samples.len() <= 3);
        assert!(sink.init.is_empty());
        assert!(sink.fragments.is_empty());
    }

    #[test]
    fn test_init_segment_failure_drops_samples() {
        let mut remuxer = FragmentRemuxer::new(RemuxerConfig::default());
        let mut sink = Collect::default();
        let mut track = track_with_config();
        track.width = 70_000;

        for ts in 0..5 {
            push(&mut track, ts, ts == 0);
            let err = remuxer.push_video(&mut track, &mut sink).unwrap_err();
            assert!(matches!(err, VmuxError::InvalidData(_)));
            assert!(track.samples.is_empty());
            assert_eq!(track.total_payload_bytes, 0);
        }
        assert!(!remuxer.init_generated());
        assert!(sink.init.is_empty());

        // 尺寸修正后恢复正常输出
        track.width = 1920;
        push(&mut track, 5, true);
        remuxer.push_video(&mut track, &mut sink).unwrap();
        assert_eq!(sink.init.len(), 1);
        assert_eq!(sink.fragments.len(), 1);
    }
}
