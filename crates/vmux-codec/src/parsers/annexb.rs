//! Annex B 起始码扫描与 RBSP 反转义.
//!
//! # Annex B 格式
//!
//! Annex B 使用起始码 (start code) 分隔 NAL 单元:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! 扫描器对编解码器无感知, 只在计算 NAL 类型时区分 H.264 (1 字节头) 与 HEVC (2 字节头).
//!
//! # 长度前缀格式
//! ```text
//! [length: N bytes BE] [NAL data: length bytes]
//! ```

use byteorder::{BigEndian, ByteOrder};
use vmux_core::{VmuxError, VmuxResult};

/// NAL 头部所属的编码标准
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NalCodec {
    /// H.264/AVC, `kind = byte0 & 0x1F`
    H264,
    /// H.265/HEVC, `kind = (byte0 >> 1) & 0x3F`
    Hevc,
}

impl NalCodec {
    /// NAL 头部字节数
    pub fn header_len(self) -> usize {
        match self {
            Self::H264 => 1,
            Self::Hevc => 2,
        }
    }

    /// 从 NAL 头第一个字节提取类型编号
    pub fn nal_kind(self, header: u8) -> u8 {
        match self {
            Self::H264 => header & 0x1F,
            Self::Hevc => (header >> 1) & 0x3F,
        }
    }
}

impl std::fmt::Display for NalCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::H264 => write!(f, "h264"),
            Self::Hevc => write!(f, "hevc"),
        }
    }
}

impl std::str::FromStr for NalCodec {
    type Err = VmuxError;

    fn from_str(s: &str) -> VmuxResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "h264" | "avc" | "264" => Ok(Self::H264),
            "hevc" | "h265" | "265" => Ok(Self::Hevc),
            other => Err(VmuxError::UnsupportedCodec(other.to_string())),
        }
    }
}

/// 扫描得到的 NAL 单元视图
///
/// `payload` 含 NAL 头, 不含起始码与尾随零字节. 只在扫描缓冲区存活期间有效.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// NAL 类型编号
    pub kind: u8,
    /// NAL 数据 (含头部)
    pub payload: &'a [u8],
}

/// Annex B 起始码扫描器
///
/// 按顺序产出缓冲区中的 NAL 单元. 第一个起始码之前的字节被忽略, 空单元被跳过.
///
/// # 示例
/// ```
/// use vmux_codec::parsers::annexb::{AnnexBScanner, NalCodec};
///
/// let data = [0, 0, 0, 1, 0x67, 0x42, 0, 0, 1, 0x68, 0xCE];
/// let kinds: Vec<u8> = AnnexBScanner::new(&data, NalCodec::H264).map(|n| n.kind).collect();
/// assert_eq!(kinds, vec![7, 8]);
/// ```
pub struct AnnexBScanner<'a> {
    data: &'a [u8],
    codec: NalCodec,
    /// 下一个单元的起始位置 (紧跟起始码之后)
    next_start: Option<usize>,
}

impl<'a> AnnexBScanner<'a> {
    /// 创建扫描器
    pub fn new(data: &'a [u8], codec: NalCodec) -> Self {
        let next_start = find_start_code(data, 0).map(|pos| pos + 3);
        Self {
            data,
            codec,
            next_start,
        }
    }
}

impl<'a> Iterator for AnnexBScanner<'a> {
    type Item = NalUnit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = self.next_start?;
            let (end, following) = match find_start_code(self.data, start) {
                Some(pos) => (pos, Some(pos + 3)),
                None => (self.data.len(), None),
            };
            self.next_start = following;

            let payload = trim_trailing_zeros(&self.data[start..end]);
            if let Some(&header) = payload.first() {
                return Some(NalUnit {
                    kind: self.codec.nal_kind(header),
                    payload,
                });
            }
        }
    }
}

// ============================================================
// RBSP 转义处理
// ============================================================

/// 移除 emulation prevention 字节
///
/// 当输出中已有连续两个 `0x00` 时丢弃随后的 `0x03`; 任何非零字节 (包括被丢弃的 `0x03`)
/// 都会清零零字节计数.
pub fn unescape_rbsp(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0usize;
    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        out.push(byte);
        zeros = if byte == 0 { zeros + 1 } else { 0 };
    }
    out
}

/// 跳过 2 字节 NAL 头后提取 RBSP
pub fn decode_rbsp(nal: &[u8]) -> Vec<u8> {
    unescape_rbsp(nal.get(2..).unwrap_or_default())
}

/// 插入 emulation prevention 字节, 是 [`unescape_rbsp`] 的逆操作
pub fn escape_rbsp(rbsp: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rbsp.len() + rbsp.len() / 64);
    let mut zeros = 0usize;
    for &byte in rbsp {
        if zeros >= 2 && byte <= 0x03 {
            out.push(0x03);
            zeros = 0;
        }
        out.push(byte);
        zeros = if byte == 0 { zeros + 1 } else { 0 };
    }
    out
}

// ============================================================
// 长度前缀格式
// ============================================================

/// 按 `length_size` 字节大端长度前缀切分 NAL 单元 (AVCC/HVCC 格式)
pub fn split_length_prefixed(data: &[u8], length_size: usize) -> VmuxResult<Vec<&[u8]>> {
    if !(1..=4).contains(&length_size) {
        return Err(VmuxError::InvalidArgument(format!(
            "长度前缀字节数必须为 1-4, 实际 {length_size}"
        )));
    }
    let mut units = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        if pos + length_size > data.len() {
            return Err(VmuxError::InvalidData(format!(
                "长度前缀在偏移 {pos} 处被截断"
            )));
        }
        let len = BigEndian::read_uint(&data[pos..], length_size) as usize;
        pos += length_size;
        let Some(unit) = data.get(pos..pos + len) else {
            return Err(VmuxError::InvalidData(format!(
                "NAL 长度 {len} 超出剩余数据 {}",
                data.len() - pos
            )));
        };
        units.push(unit);
        pos += len;
    }
    Ok(units)
}

// ============================================================
// 内部工具函数
// ============================================================

/// 从 `from` 开始查找下一个 `00 00 01`, 返回其位置
///
/// 4 字节起始码的前导零作为上一单元的尾随零处理.
pub(crate) fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 2 < data.len() {
        if data[i + 2] > 1 {
            i += 3;
        } else if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            return Some(i);
        } else {
            i += 1;
        }
    }
    None
}

/// 去掉尾随零字节
fn trim_trailing_zeros(data: &[u8]) -> &[u8] {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    &data[..end]
}
