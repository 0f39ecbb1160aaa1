//! 跨调用的 NAL / 访问单元切分.
//!
//! 网络分片可能在任意字节处切断 NAL 单元. [`advance`] 是纯函数: 输入上次残留的尾部与新分片,
//! 输出已完整的 NAL 单元与新的尾部. [`AccessUnitSlicer`] 在其上按 H.264 7.4.1.2.3 /
//! H.265 7.4.2.4.4 的首单元规则把 NAL 归并为访问单元, 每个访问单元以 Annex B 字节流输出,
//! 可直接交给解封装器的 `push_data`.

use bytes::Bytes;
use log::trace;

use super::annexb::{AnnexBScanner, NalCodec, find_start_code};
use super::h264::NalUnitType;
use super::h265::HevcNalUnitType;

/// 访问单元输出时使用的起始码
const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// 拼接尾部与新分片, 切出所有已完整的 NAL 单元
///
/// 最后一个起始码之后的数据尚不完整, 连同起始码一起作为新尾部返回.
/// 缓冲区中没有起始码时全部保留为尾部. 返回的 NAL 不含起始码.
pub fn advance(tail: &[u8], chunk: &[u8]) -> (Vec<Bytes>, Vec<u8>) {
    let mut buf = Vec::with_capacity(tail.len() + chunk.len());
    buf.extend_from_slice(tail);
    buf.extend_from_slice(chunk);

    let Some(last) = find_last_start_code(&buf) else {
        return (Vec::new(), buf);
    };
    // NAL 类型在这里无关紧要, 只取负载
    let complete = AnnexBScanner::new(&buf[..last], NalCodec::H264)
        .map(|nal| Bytes::copy_from_slice(nal.payload))
        .collect();
    let new_tail = buf.split_off(last);
    (complete, new_tail)
}

/// 访问单元切分器
///
/// # 示例
/// ```
/// use vmux_codec::parsers::{AccessUnitSlicer, NalCodec};
///
/// let mut slicer = AccessUnitSlicer::new(NalCodec::H264);
/// let stream = [
///     0, 0, 0, 1, 0x65, 0x88, 0x84, // IDR, first_mb_in_slice = 0
///     0, 0, 0, 1, 0x41, 0x9A, 0x02, // P 切片, 新图像
/// ];
/// assert!(slicer.push(&stream[..9]).is_empty());
/// // P 切片仍在尾部, 直到流结束才能确认其完整
/// assert!(slicer.push(&stream[9..]).is_empty());
/// assert_eq!(slicer.flush().len(), 2);
/// ```
#[derive(Debug)]
pub struct AccessUnitSlicer {
    codec: NalCodec,
    /// 未完整的尾部字节 (从最后一个起始码开始)
    tail: Vec<u8>,
    /// 当前访问单元已收集的 NAL
    pending: Vec<Bytes>,
    /// 当前访问单元是否已包含 VCL
    pending_has_vcl: bool,
}

impl AccessUnitSlicer {
    /// 创建切分器
    pub fn new(codec: NalCodec) -> Self {
        Self {
            codec,
            tail: Vec::new(),
            pending: Vec::new(),
            pending_has_vcl: false,
        }
    }

    /// 编码标准
    pub fn codec(&self) -> NalCodec {
        self.codec
    }

    /// 当前缓存的尾部字节数
    pub fn buffered_len(&self) -> usize {
        self.tail.len() + self.pending.iter().map(Bytes::len).sum::<usize>()
    }

    /// 输入一个分片, 返回已完整的访问单元 (Annex B 字节流)
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let (nals, tail) = advance(&self.tail, chunk);
        self.tail = tail;
        let mut units = Vec::new();
        for nal in nals {
            self.accept(nal, &mut units);
        }
        units
    }

    /// 流结束: 把尾部视为完整 NAL, 输出剩余的访问单元
    pub fn flush(&mut self) -> Vec<Vec<u8>> {
        let tail = std::mem::take(&mut self.tail);
        let mut units = Vec::new();
        for nal in AnnexBScanner::new(&tail, self.codec) {
            self.accept(Bytes::copy_from_slice(nal.payload), &mut units);
        }
        units.extend(self.take_access_unit());
        units
    }

    /// 清空所有缓存 (流重置)
    pub fn reset(&mut self) {
        self.tail.clear();
        self.pending.clear();
        self.pending_has_vcl = false;
    }

    fn accept(&mut self, nal: Bytes, units: &mut Vec<Vec<u8>>) {
        let Some(&header) = nal.first() else {
            return;
        };
        let kind = self.codec.nal_kind(header);
        let (is_vcl, opens) = match self.codec {
            NalCodec::H264 => {
                let t = NalUnitType::from_type_id(kind);
                (t.is_vcl(), t.opens_access_unit())
            }
            NalCodec::Hevc => {
                let t = HevcNalUnitType::from_type_id(kind);
                (t.is_vcl(), t.opens_access_unit())
            }
        };
        // 切片头第一个语法元素: H.264 first_mb_in_slice == 0 (ue 码 "1"),
        // HEVC first_slice_segment_in_pic_flag == 1
        let first_slice = is_vcl
            && nal
                .get(self.codec.header_len())
                .is_some_and(|b| b & 0x80 != 0);

        if self.pending_has_vcl && (opens || first_slice) {
            if let Some(unit) = self.take_access_unit() {
                units.push(unit);
            }
        }
        trace!("slicer: {} NAL kind={kind}, len={}", self.codec, nal.len());
        self.pending_has_vcl |= is_vcl;
        self.pending.push(nal);
    }

    fn take_access_unit(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        let mut unit = Vec::with_capacity(self.pending.iter().map(|n| n.len() + 4).sum());
        for nal in self.pending.drain(..) {
            unit.extend_from_slice(&START_CODE);
            unit.extend_from_slice(&nal);
        }
        self.pending_has_vcl = false;
        Some(unit)
    }
}

/// 查找最后一个 `00 00 01` 的位置
fn find_last_start_code(data: &[u8]) -> Option<usize> {
    let mut last = None;
    let mut from = 0;
    while let Some(pos) = find_start_code(data, from) {
        last = Some(pos);
        from = pos + 3;
    }
    last
}
