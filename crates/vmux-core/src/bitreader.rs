//! 比特流读取器.
//!
//! 提供从字节缓冲区中按位读取数据的能力, 是 H.264/HEVC 参数集语法解析的基础设施.
//!
//! 按大端位序读取 (MSB first). 内部使用 64 位累加器, 只在请求需要时才从缓冲区拉取字节,
//! 因此单次 `peek`/`get` 最多 48 位仍不会丢失精度.

use crate::{VmuxError, VmuxResult};

/// 单次读取允许的最大位数
pub const MAX_READ_BITS: u32 = 48;

/// 比特流读取器
///
/// # 示例
/// ```
/// use vmux_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.get(4).unwrap(), 0b1011);
/// assert_eq!(br.get(4).unwrap(), 0b0001);
/// assert_eq!(br.get(8).unwrap(), 0b01010101);
/// ```
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 下一个待拉取字节的索引
    byte_pos: usize,
    /// 已缓存但未消费的位 (低 `cached` 位有效)
    cache: u64,
    /// 缓存中的有效位数
    cached: u32,
    /// 已消费的总位数
    consumed: usize,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            cache: 0,
            cached: 0,
            consumed: 0,
        }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.consumed
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        self.cached as usize + (self.data.len() - self.byte_pos) * 8
    }

    /// 当前位置是否字节对齐
    pub fn is_byte_aligned(&self) -> bool {
        self.consumed % 8 == 0
    }

    /// 预读 N 个位 (最多 48 位), 不移动读取位置
    pub fn peek(&mut self, n: u32) -> VmuxResult<u64> {
        if n > MAX_READ_BITS {
            return Err(VmuxError::InvalidArgument(format!(
                "BitReader: 单次读取 {n} 位超过上限 {MAX_READ_BITS}"
            )));
        }
        while self.cached < n {
            let Some(&byte) = self.data.get(self.byte_pos) else {
                return Err(VmuxError::BitstreamExhausted {
                    requested: n as usize,
                    available: self.cached as usize,
                });
            };
            self.cache = (self.cache << 8) | u64::from(byte);
            self.cached += 8;
            self.byte_pos += 1;
        }
        Ok((self.cache >> (self.cached - n)) & low_mask(n))
    }

    /// 读取 N 个位 (最多 48 位)
    pub fn get(&mut self, n: u32) -> VmuxResult<u64> {
        let value = self.peek(n)?;
        self.cached -= n;
        self.cache &= low_mask(self.cached);
        self.consumed += n as usize;
        Ok(value)
    }

    /// 读取 1 位标志
    pub fn get_flag(&mut self) -> VmuxResult<bool> {
        Ok(self.get(1)? != 0)
    }

    /// 读取 N 个位并转为 u32 (N <= 32)
    pub fn get_u32(&mut self, n: u32) -> VmuxResult<u32> {
        if n > 32 {
            return Err(VmuxError::InvalidArgument(format!(
                "BitReader: get_u32 不支持 {n} 位"
            )));
        }
        Ok(self.get(n)? as u32)
    }

    /// 跳过 N 个位 (任意长度)
    pub fn skip(&mut self, n: usize) -> VmuxResult<()> {
        let left = self.bits_left();
        if n > left {
            return Err(VmuxError::BitstreamExhausted {
                requested: n,
                available: left,
            });
        }
        let mut remaining = n;
        while remaining > 0 {
            let step = remaining.min(MAX_READ_BITS as usize) as u32;
            self.get(step)?;
            remaining -= step as usize;
        }
        Ok(())
    }

    /// 无符号 Exp-Golomb 解码 (ue(v))
    ///
    /// 前导零计数的预读窗口不超过剩余位数, 后缀读取 `z + 1` 位, 结果为后缀减一.
    pub fn get_exp_golomb(&mut self) -> VmuxResult<u32> {
        let window = self.bits_left().min(32) as u32;
        let lookahead = self.peek(window)?;
        if lookahead == 0 {
            if window < 32 {
                return Err(VmuxError::BitstreamExhausted {
                    requested: window as usize + 1,
                    available: window as usize,
                });
            }
            return Err(VmuxError::InvalidData(
                "Exp-Golomb: 前导零超过 31 位".into(),
            ));
        }
        let significant = 64 - lookahead.leading_zeros();
        let leading_zeros = window - significant;
        self.get(leading_zeros)?;
        let suffix = self.get(leading_zeros + 1)?;
        Ok((suffix - 1) as u32)
    }

    /// 有符号 Exp-Golomb 解码 (se(v))
    ///
    /// 映射关系: 码号为奇数时取 `x / 2`, 偶数时取 `-(x / 2)`,
    /// 即 0, 1, 2, 3, 4, 5 → 0, 0, -1, 1, -2, 2.
    pub fn get_signed_exp_golomb(&mut self) -> VmuxResult<i32> {
        let code = i64::from(self.get_exp_golomb()?);
        let half = code / 2;
        Ok(if code & 1 == 1 { half } else { -half } as i32)
    }
}

/// 低 N 位掩码 (N <= 64)
fn low_mask(n: u32) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}
