//! 媒体分片: `moof` + `mdat`.
//!
//! ```text
//! moof
//! ├── mfhd (sequence_number)
//! └── traf
//!     ├── tfhd (track_ID)
//!     ├── tfdt (版本 1, baseMediaDecodeTime)
//!     ├── trun (data_offset + 每样本 duration/size/flags/cts)
//!     └── sdtp
//! mdat (每个 NAL 前加 4 字节大端长度)
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::boxes::*;

/// trun 标志: data_offset | duration | size | flags | composition_time_offset
const TRUN_FLAGS: u32 = 0x0000_0F01;

/// 样本依赖标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFlags {
    /// sample_depends_on (1 = 依赖其他样本, 2 = 不依赖)
    pub depends_on: u8,
    /// sample_is_non_sync_sample
    pub is_non_sync: u8,
}

impl SampleFlags {
    /// 关键帧不依赖其他样本且为同步样本
    pub fn for_key(key: bool) -> Self {
        if key {
            Self {
                depends_on: 2,
                is_non_sync: 0,
            }
        } else {
            Self {
                depends_on: 1,
                is_non_sync: 1,
            }
        }
    }

    /// trun 中的 32 位 sample_flags
    pub fn to_u32(self) -> u32 {
        (u32::from(self.depends_on) << 24) | (u32::from(self.is_non_sync) << 16)
    }

    /// sdtp 中的一个字节
    pub fn sdtp_byte(self) -> u8 {
        self.depends_on << 4
    }
}

/// trun 中的一个样本条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentSample {
    /// 样本时长 (tick)
    pub duration: u32,
    /// 样本大小 (含长度前缀)
    pub size: u32,
    /// 依赖标志
    pub flags: SampleFlags,
    /// 合成时间偏移
    pub composition_offset: u32,
}

/// 构建 moof box
///
/// `data_offset` 为 moof 起点到 mdat 第一个样本字节的距离.
pub fn build_moof(
    sequence_number: u32,
    track_id: u32,
    base_media_decode_time: u64,
    samples: &[FragmentSample],
    data_offset: u32,
) -> Mp4Box {
    let mut mfhd = Vec::with_capacity(8);
    mfhd.extend_from_slice(&[0; 4]);
    mfhd.extend_from_slice(&sequence_number.to_be_bytes());

    let mut tfhd = Vec::with_capacity(8);
    tfhd.extend_from_slice(&[0; 4]);
    tfhd.extend_from_slice(&track_id.to_be_bytes());

    // tfdt 版本 1, 64 位解码时间
    let mut tfdt = Vec::with_capacity(12);
    tfdt.extend_from_slice(&[1, 0, 0, 0]);
    tfdt.extend_from_slice(&base_media_decode_time.to_be_bytes());

    let mut trun = Vec::with_capacity(12 + 16 * samples.len());
    trun.extend_from_slice(&TRUN_FLAGS.to_be_bytes());
    trun.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    trun.extend_from_slice(&data_offset.to_be_bytes());
    for sample in samples {
        trun.extend_from_slice(&sample.duration.to_be_bytes());
        trun.extend_from_slice(&sample.size.to_be_bytes());
        trun.extend_from_slice(&sample.flags.to_u32().to_be_bytes());
        trun.extend_from_slice(&sample.composition_offset.to_be_bytes());
    }

    let mut sdtp = vec![0u8; 4];
    sdtp.extend(samples.iter().map(|s| s.flags.sdtp_byte()));

    Mp4Box::container(
        MOOF,
        vec![
            Mp4Box::leaf(MFHD, mfhd),
            Mp4Box::container(
                TRAF,
                vec![
                    Mp4Box::leaf(TFHD, tfhd),
                    Mp4Box::leaf(TFDT, tfdt),
                    Mp4Box::leaf(TRUN, trun),
                    Mp4Box::leaf(SDTP, sdtp),
                ],
            ),
        ],
    )
}

/// 构建完整分片 (moof + mdat)
///
/// `mdat_payload` 为已加长度前缀的样本数据. data_offset 由 moof 的大小推出,
/// trun 的大小与 data_offset 的取值无关.
pub fn build_fragment(
    sequence_number: u32,
    track_id: u32,
    base_media_decode_time: u64,
    samples: &[FragmentSample],
    mdat_payload: &[u8],
) -> Bytes {
    let moof_size =
        build_moof(sequence_number, track_id, base_media_decode_time, samples, 0).size();
    let data_offset = (moof_size + BOX_HEADER_LEN) as u32;
    let moof = build_moof(
        sequence_number,
        track_id,
        base_media_decode_time,
        samples,
        data_offset,
    );

    let mut buf = BytesMut::with_capacity(moof_size + BOX_HEADER_LEN + mdat_payload.len());
    moof.write_to(&mut buf);
    buf.put_u32((BOX_HEADER_LEN + mdat_payload.len()) as u32);
    buf.put_slice(&MDAT);
    buf.put_slice(mdat_payload);
    buf.freeze()
}

/// 追加一个带 4 字节长度前缀的 NAL, 返回写入的字节数
pub fn put_length_prefixed(buf: &mut BytesMut, nal: &[u8]) -> usize {
    buf.put_u32(nal.len() as u32);
    buf.put_slice(nal);
    4 + nal.len()
}
