//! ISO-BMFF box 树.
//!
//! 每个 box 是叶子 (原始内容) 或容器 (固定头部字段 + 子 box). 大小在序列化前即可计算,
//! 分片的 `trun.data_offset` 依赖这一点.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

/// 4 字节 box 类型
pub type FourCc = [u8; 4];

// ============================================================
// FourCC 常量
// ============================================================

/// 文件类型
pub const FTYP: FourCc = *b"ftyp";
/// 影片头容器
pub const MOOV: FourCc = *b"moov";
/// 影片头
pub const MVHD: FourCc = *b"mvhd";
/// 轨道容器
pub const TRAK: FourCc = *b"trak";
/// 轨道头
pub const TKHD: FourCc = *b"tkhd";
/// 媒体容器
pub const MDIA: FourCc = *b"mdia";
/// 媒体头
pub const MDHD: FourCc = *b"mdhd";
/// 处理器引用
pub const HDLR: FourCc = *b"hdlr";
/// 媒体信息容器
pub const MINF: FourCc = *b"minf";
/// 视频媒体头
pub const VMHD: FourCc = *b"vmhd";
/// 数据信息容器
pub const DINF: FourCc = *b"dinf";
/// 数据引用
pub const DREF: FourCc = *b"dref";
/// 数据位置 (自包含)
pub const URL: FourCc = *b"url ";
/// 样本表容器
pub const STBL: FourCc = *b"stbl";
/// 样本描述
pub const STSD: FourCc = *b"stsd";
/// 解码时间表 (分片模式下为空)
pub const STTS: FourCc = *b"stts";
/// 样本到块映射 (空)
pub const STSC: FourCc = *b"stsc";
/// 样本大小 (空)
pub const STSZ: FourCc = *b"stsz";
/// 块偏移 (空)
pub const STCO: FourCc = *b"stco";
/// 影片扩展容器
pub const MVEX: FourCc = *b"mvex";
/// 轨道扩展默认值
pub const TREX: FourCc = *b"trex";
/// 分片头容器
pub const MOOF: FourCc = *b"moof";
/// 分片头 (序号)
pub const MFHD: FourCc = *b"mfhd";
/// 轨道分片容器
pub const TRAF: FourCc = *b"traf";
/// 轨道分片头
pub const TFHD: FourCc = *b"tfhd";
/// 轨道分片解码时间
pub const TFDT: FourCc = *b"tfdt";
/// 轨道分片样本表
pub const TRUN: FourCc = *b"trun";
/// 样本依赖类型
pub const SDTP: FourCc = *b"sdtp";
/// 媒体数据
pub const MDAT: FourCc = *b"mdat";

/// box 头长度 (size + type)
pub const BOX_HEADER_LEN: usize = 8;

/// 单位矩阵 (3x3, 每个元素 4 字节, 固定点)
pub const UNITY_MATRIX: [u8; 36] = [
    0x00, 0x01, 0x00, 0x00, // a = 1.0
    0x00, 0x00, 0x00, 0x00, // b = 0
    0x00, 0x00, 0x00, 0x00, // u = 0
    0x00, 0x00, 0x00, 0x00, // c = 0
    0x00, 0x01, 0x00, 0x00, // d = 1.0
    0x00, 0x00, 0x00, 0x00, // v = 0
    0x00, 0x00, 0x00, 0x00, // x = 0
    0x00, 0x00, 0x00, 0x00, // y = 0
    0x40, 0x00, 0x00, 0x00, // w = 1.0 (fixed 2.30)
];

/// 拼接 box: 4 字节大小 + 类型 + 各段内容
pub fn make_box(fourcc: FourCc, payloads: &[&[u8]]) -> Vec<u8> {
    let size = BOX_HEADER_LEN + payloads.iter().map(|p| p.len()).sum::<usize>();
    let mut buf = Vec::with_capacity(size);
    buf.extend_from_slice(&(size as u32).to_be_bytes());
    buf.extend_from_slice(&fourcc);
    for payload in payloads {
        buf.extend_from_slice(payload);
    }
    buf
}

/// box 树节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mp4Box {
    /// 叶子 box
    Leaf {
        fourcc: FourCc,
        payload: Vec<u8>,
    },
    /// 容器 box, 子 box 之前可带固定字段 (如 stsd 的 entry_count, 样本描述的视频字段)
    Container {
        fourcc: FourCc,
        header: Vec<u8>,
        children: Vec<Mp4Box>,
    },
}

impl Mp4Box {
    /// 创建叶子 box
    pub fn leaf(fourcc: FourCc, payload: Vec<u8>) -> Self {
        Self::Leaf { fourcc, payload }
    }

    /// 创建不带头部字段的容器
    pub fn container(fourcc: FourCc, children: Vec<Mp4Box>) -> Self {
        Self::Container {
            fourcc,
            header: Vec::new(),
            children,
        }
    }

    /// 创建带头部字段的容器
    pub fn container_with_header(fourcc: FourCc, header: Vec<u8>, children: Vec<Mp4Box>) -> Self {
        Self::Container {
            fourcc,
            header,
            children,
        }
    }

    /// box 类型
    pub fn fourcc(&self) -> FourCc {
        match self {
            Self::Leaf { fourcc, .. } | Self::Container { fourcc, .. } => *fourcc,
        }
    }

    /// 内容大小 (不含 8 字节头)
    pub fn payload_size(&self) -> usize {
        match self {
            Self::Leaf { payload, .. } => payload.len(),
            Self::Container {
                header, children, ..
            } => header.len() + children.iter().map(Mp4Box::size).sum::<usize>(),
        }
    }

    /// 序列化后的总大小
    pub fn size(&self) -> usize {
        BOX_HEADER_LEN + self.payload_size()
    }

    /// 按 fourcc 查找直接子 box
    pub fn child(&self, fourcc: FourCc) -> Option<&Mp4Box> {
        match self {
            Self::Leaf { .. } => None,
            Self::Container { children, .. } => children.iter().find(|c| c.fourcc() == fourcc),
        }
    }

    /// 序列化到缓冲区
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.reserve(self.size());
        buf.put_u32(self.size() as u32);
        buf.put_slice(&self.fourcc());
        match self {
            Self::Leaf { payload, .. } => buf.put_slice(payload),
            Self::Container {
                header, children, ..
            } => {
                buf.put_slice(header);
                for child in children {
                    child.write_to(buf);
                }
            }
        }
    }

    /// 序列化为字节
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        self.write_to(&mut buf);
        buf.freeze()
    }
}

// ============================================================
// 读取
// ============================================================

/// 遍历连续排列的 box, 产出 (类型, 内容)
///
/// 遇到截断或非法大小时停止.
pub fn iter_boxes(data: &[u8]) -> impl Iterator<Item = (FourCc, &[u8])> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        let header = data.get(pos..pos + BOX_HEADER_LEN)?;
        let size = BigEndian::read_u32(&header[..4]) as usize;
        if size < BOX_HEADER_LEN {
            return None;
        }
        let payload = data.get(pos + BOX_HEADER_LEN..pos + size)?;
        let fourcc = [header[4], header[5], header[6], header[7]];
        pos += size;
        Some((fourcc, payload))
    })
}

/// 按路径查找 box 内容, 只适用于不带头部字段的容器
pub fn find_box<'a>(data: &'a [u8], path: &[FourCc]) -> Option<&'a [u8]> {
    let (first, rest) = path.split_first()?;
    let (_, payload) = iter_boxes(data).find(|(fourcc, _)| fourcc == first)?;
    if rest.is_empty() {
        Some(payload)
    } else {
        find_box(payload, rest)
    }
}
