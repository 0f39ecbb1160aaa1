//! 初始化分段: `ftyp` + `moov`.
//!
//! # Box 结构
//! ```text
//! ftyp (isom, minor 1, [isom, avc1/hev1/hvc1])
//! moov
//! ├── mvhd
//! ├── trak
//! │   ├── tkhd
//! │   └── mdia
//! │       ├── mdhd
//! │       ├── hdlr (vide)
//! │       └── minf
//! │           ├── vmhd
//! │           ├── dinf → dref → url
//! │           └── stbl
//! │               ├── stsd → avc1/hev1/hvc1 → avcC/hvcC
//! │               └── stts / stsc / stsz / stco (空表)
//! └── mvex → trex
//! ```

use bytes::{Bytes, BytesMut};
use vmux_codec::track::VideoTrack;
use vmux_core::{VmuxError, VmuxResult};

use super::boxes::*;

/// 构建初始化分段
///
/// 轨道必须已有配置记录 (avcC/hvcC).
pub fn init_segment(track: &VideoTrack) -> VmuxResult<Bytes> {
    let moov = build_moov(track)?;
    let ftyp = build_ftyp(track);
    let mut buf = BytesMut::with_capacity(ftyp.size() + moov.size());
    ftyp.write_to(&mut buf);
    moov.write_to(&mut buf);
    Ok(buf.freeze())
}

/// ftyp: major_brand=isom, minor_version=1, compatible=[isom, 样本描述 fourcc]
fn build_ftyp(track: &VideoTrack) -> Mp4Box {
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(b"isom");
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(b"isom");
    payload.extend_from_slice(&track.codec.as_bytes());
    Mp4Box::leaf(FTYP, payload)
}

/// 构建 moov box
pub fn build_moov(track: &VideoTrack) -> VmuxResult<Mp4Box> {
    Ok(Mp4Box::container(
        MOOV,
        vec![
            build_mvhd(track),
            Mp4Box::container(TRAK, vec![build_tkhd(track), build_mdia(track)?]),
            Mp4Box::container(MVEX, vec![build_trex(track)]),
        ],
    ))
}

fn duration_ticks(track: &VideoTrack) -> u32 {
    (track.duration * u64::from(track.timescale)).min(u64::from(u32::MAX)) as u32
}

/// mvhd box (版本 0)
fn build_mvhd(track: &VideoTrack) -> Mp4Box {
    let mut buf = Vec::with_capacity(100);
    // version(1) + flags(3)
    buf.extend_from_slice(&[0, 0, 0, 0]);
    // creation_time(4) + modification_time(4)
    buf.extend_from_slice(&[0; 8]);
    buf.extend_from_slice(&track.timescale.to_be_bytes());
    buf.extend_from_slice(&duration_ticks(track).to_be_bytes());
    // rate (1.0 = 0x00010000)
    buf.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    // volume (1.0 = 0x0100)
    buf.extend_from_slice(&0x0100u16.to_be_bytes());
    // reserved (10 bytes)
    buf.extend_from_slice(&[0; 10]);
    buf.extend_from_slice(&UNITY_MATRIX);
    // pre_defined (24 bytes)
    buf.extend_from_slice(&[0; 24]);
    // next_track_ID
    buf.extend_from_slice(&(track.id + 1).to_be_bytes());
    Mp4Box::leaf(MVHD, buf)
}

/// tkhd box, 直播流时长未知时写全 1
fn build_tkhd(track: &VideoTrack) -> Mp4Box {
    let duration = match duration_ticks(track) {
        0 => u32::MAX,
        d => d,
    };

    let mut buf = Vec::with_capacity(84);
    // version(1) + flags(3) - track_enabled | track_in_movie | track_in_preview
    buf.extend_from_slice(&[0, 0, 0, 0x07]);
    // creation_time(4) + modification_time(4)
    buf.extend_from_slice(&[0; 8]);
    buf.extend_from_slice(&track.id.to_be_bytes());
    // reserved(4)
    buf.extend_from_slice(&[0; 4]);
    buf.extend_from_slice(&duration.to_be_bytes());
    // reserved(8)
    buf.extend_from_slice(&[0; 8]);
    // layer(2) + alternate_group(2) + volume(2) + reserved(2)
    buf.extend_from_slice(&[0; 8]);
    buf.extend_from_slice(&UNITY_MATRIX);
    // width / height (16.16 fixed point)
    buf.extend_from_slice(&(track.width << 16).to_be_bytes());
    buf.extend_from_slice(&(track.height << 16).to_be_bytes());
    Mp4Box::leaf(TKHD, buf)
}

fn build_mdia(track: &VideoTrack) -> VmuxResult<Mp4Box> {
    Ok(Mp4Box::container(
        MDIA,
        vec![build_mdhd(track), build_hdlr(), build_minf(track)?],
    ))
}

fn build_mdhd(track: &VideoTrack) -> Mp4Box {
    let mut buf = Vec::with_capacity(24);
    // version(1) + flags(3) + creation_time(4) + modification_time(4)
    buf.extend_from_slice(&[0; 12]);
    buf.extend_from_slice(&track.timescale.to_be_bytes());
    buf.extend_from_slice(&duration_ticks(track).to_be_bytes());
    // language(2) - 'und' = 0x55C4
    buf.extend_from_slice(&0x55C4u16.to_be_bytes());
    // pre_defined(2)
    buf.extend_from_slice(&[0; 2]);
    Mp4Box::leaf(MDHD, buf)
}

fn build_hdlr() -> Mp4Box {
    let name = b"VideoHandler\0";
    let mut buf = Vec::with_capacity(24 + name.len());
    // version(1) + flags(3) + pre_defined(4)
    buf.extend_from_slice(&[0; 8]);
    buf.extend_from_slice(b"vide");
    // reserved(12)
    buf.extend_from_slice(&[0; 12]);
    buf.extend_from_slice(name);
    Mp4Box::leaf(HDLR, buf)
}

fn build_minf(track: &VideoTrack) -> VmuxResult<Mp4Box> {
    // vmhd: flags=1, graphicsmode(2) + opcolor(6)
    let vmhd = Mp4Box::leaf(VMHD, vec![0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
    // dref 带一个自包含的 url 条目
    let dref = Mp4Box::container_with_header(
        DREF,
        vec![0, 0, 0, 0, 0, 0, 0, 1],
        vec![Mp4Box::leaf(URL, vec![0, 0, 0, 1])],
    );
    Ok(Mp4Box::container(
        MINF,
        vec![
            vmhd,
            Mp4Box::container(DINF, vec![dref]),
            build_stbl(track)?,
        ],
    ))
}

/// stbl: 样本表全部为空, 样本在 moof 中描述
fn build_stbl(track: &VideoTrack) -> VmuxResult<Mp4Box> {
    let empty_table = || vec![0u8; 8];
    Ok(Mp4Box::container(
        STBL,
        vec![
            build_stsd(track)?,
            Mp4Box::leaf(STTS, empty_table()),
            Mp4Box::leaf(STSC, empty_table()),
            // version/flags + sample_size + sample_count
            Mp4Box::leaf(STSZ, vec![0; 12]),
            Mp4Box::leaf(STCO, empty_table()),
        ],
    ))
}

fn build_stsd(track: &VideoTrack) -> VmuxResult<Mp4Box> {
    Ok(Mp4Box::container_with_header(
        STSD,
        // version(1) + flags(3) + entry_count(4)
        vec![0, 0, 0, 0, 0, 0, 0, 1],
        vec![build_video_sample_entry(track)?],
    ))
}

/// 视频样本描述 (avc1 / hev1 / hvc1) 及其配置记录
fn build_video_sample_entry(track: &VideoTrack) -> VmuxResult<Mp4Box> {
    let Some(config) = &track.decoder_config else {
        return Err(VmuxError::StreamFormat(format!(
            "MP4: {} 轨道缺少配置记录",
            track.codec
        )));
    };
    let width = u16::try_from(track.width)
        .map_err(|_| VmuxError::InvalidData(format!("MP4: 宽度超出范围, width={}", track.width)))?;
    let height = u16::try_from(track.height).map_err(|_| {
        VmuxError::InvalidData(format!("MP4: 高度超出范围, height={}", track.height))
    })?;

    let mut entry = Vec::with_capacity(78);
    // reserved(6) + data_reference_index(2)
    entry.extend_from_slice(&[0; 6]);
    entry.extend_from_slice(&1u16.to_be_bytes());
    // pre_defined(2) + reserved(2) + pre_defined(12)
    entry.extend_from_slice(&[0; 16]);
    entry.extend_from_slice(&width.to_be_bytes());
    entry.extend_from_slice(&height.to_be_bytes());
    // horizresolution / vertresolution (72 dpi = 0x00480000)
    entry.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    entry.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    // reserved(4)
    entry.extend_from_slice(&[0; 4]);
    // frame_count(2) = 1
    entry.extend_from_slice(&1u16.to_be_bytes());
    // compressorname (32 bytes, padded)
    entry.extend_from_slice(&[0; 32]);
    // depth(2) = 0x0018
    entry.extend_from_slice(&0x0018u16.to_be_bytes());
    // pre_defined(2) = -1
    entry.extend_from_slice(&0xFFFFu16.to_be_bytes());

    Ok(Mp4Box::container_with_header(
        track.codec.as_bytes(),
        entry,
        vec![Mp4Box::leaf(track.codec.config_box(), config.clone())],
    ))
}

/// trex: 默认样本描述 1, 默认标志为非同步样本
fn build_trex(track: &VideoTrack) -> Mp4Box {
    let mut buf = Vec::with_capacity(24);
    buf.extend_from_slice(&[0; 4]);
    buf.extend_from_slice(&track.id.to_be_bytes());
    // default_sample_description_index
    buf.extend_from_slice(&1u32.to_be_bytes());
    // default_sample_duration + default_sample_size
    buf.extend_from_slice(&[0; 8]);
    // default_sample_flags
    buf.extend_from_slice(&0x0001_0001u32.to_be_bytes());
    Mp4Box::leaf(TREX, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmux_codec::track::CodecFourCc;

    fn avc_track() -> VideoTrack {
        let mut track = VideoTrack::new(1, CodecFourCc::Avc1);
        track.timescale = 30;
        track.width = 320;
        track.height = 240;
        track.decoder_config = Some(vec![
            0x01, 0x42, 0xC0, 0x1E, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x42, 0xC0, 0x1E, 0x01, 0x00,
            0x02, 0x68, 0xCE,
        ]);
        track
    }

    #[test]
    fn test_ftyp_brands() {
        let data = init_segment(&avc_track()).unwrap();
        let ftyp = find_box(&data, &[FTYP]).unwrap();
        assert_eq!(ftyp, b"isom\x00\x00\x00\x01isomavc1");
        assert_eq!(&data[..4], &[0, 0, 0, 24]);
    }

    #[test]
    fn test_moov_layout() {
        let track = avc_track();
        let data = init_segment(&track).unwrap();
        let moov = build_moov(&track).unwrap();
        assert_eq!(data.len(), 24 + moov.size());

        let mvhd = find_box(&data, &[MOOV, MVHD]).unwrap();
        assert_eq!(mvhd.len(), 100);
        assert_eq!(&mvhd[12..16], &30u32.to_be_bytes());

        let tkhd = find_box(&data, &[MOOV, TRAK, TKHD]).unwrap();
        assert_eq!(tkhd.len(), 84);
        assert_eq!(&tkhd[20..24], &[0xFF; 4]);
        assert_eq!(&tkhd[76..80], &(320u32 << 16).to_be_bytes());

        let mdhd = find_box(&data, &[MOOV, TRAK, MDIA, MDHD]).unwrap();
        assert_eq!(mdhd.len(), 24);
        let hdlr = find_box(&data, &[MOOV, TRAK, MDIA, HDLR]).unwrap();
        assert_eq!(&hdlr[8..12], b"vide");

        let trex = find_box(&data, &[MOOV, MVEX, TREX]).unwrap();
        assert_eq!(&trex[4..8], &1u32.to_be_bytes());
        assert_eq!(&trex[20..24], &[0, 1, 0, 1]);

        let stbl = moov
            .child(TRAK)
            .and_then(|t| t.child(MDIA))
            .and_then(|m| m.child(MINF))
            .and_then(|m| m.child(STBL))
            .unwrap();
        let entry = stbl.child(STSD).and_then(|s| s.child(*b"avc1")).unwrap();
        // 78 字节视频字段 + avcC
        assert_eq!(entry.payload_size(), 78 + 8 + 17);
        assert!(entry.child(*b"avcC").is_some());
        assert!(stbl.child(STCO).is_some());
    }

    #[test]
    fn test_hev1_sample_entry() {
        let mut track = avc_track();
        track.codec = CodecFourCc::Hev1;
        let data = init_segment(&track).unwrap();
        let ftyp = find_box(&data, &[FTYP]).unwrap();
        assert_eq!(&ftyp[12..], b"hev1");
        let moov = build_moov(&track).unwrap().to_bytes();
        let hvcc_pos = moov.windows(4).position(|w| w == b"hvcC");
        assert!(hvcc_pos.is_some());
    }

    #[test]
    fn test_missing_config_and_oversized_dimensions() {
        let mut track = avc_track();
        track.decoder_config = None;
        assert!(matches!(
            init_segment(&track),
            Err(VmuxError::StreamFormat(_))
        ));

        let mut track = avc_track();
        track.width = 70_000;
        assert!(init_segment(&track).is_err());
    }
}
