//! 比特流写入器.
//!
//! 按大端位序 (MSB first) 写入, 与 [`BitReader`](crate::bitreader::BitReader) 对应.
//! 主要用于合成参数集与切片头 (测试与码流构造工具).

/// 比特流写入器
///
/// # 示例
/// ```
/// use vmux_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_bits(0b0001, 4);
/// bw.write_ue(2);
/// assert_eq!(bw.finish(), vec![0b1011_0001, 0b0110_0000]);
/// ```
#[derive(Debug, Default)]
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 写入 1 位标志
    pub fn write_flag(&mut self, flag: bool) {
        self.current_byte = (self.current_byte << 1) | u8::from(flag);
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入 N 个位 (最多 64 位), 值的低 N 位高位在前
    pub fn write_bits(&mut self, value: u64, n: u32) {
        debug_assert!(n <= 64, "write_bits: n={n} 超过 64 位");
        for i in (0..n).rev() {
            self.write_flag((value >> i) & 1 == 1);
        }
    }

    /// 写入无符号 Exp-Golomb 码 (ue(v))
    pub fn write_ue(&mut self, value: u32) {
        let code = u64::from(value) + 1;
        let len = 64 - code.leading_zeros();
        self.write_bits(0, len - 1);
        self.write_bits(code, len);
    }

    /// 写入 rbsp_trailing_bits (停止位 + 零填充到字节边界)
    pub fn write_trailing_bits(&mut self) {
        self.write_flag(true);
        while self.bit_count != 0 {
            self.write_flag(false);
        }
    }

    /// 结束写入, 未满的最后一个字节以零填充
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.current_byte <<= 8 - self.bit_count;
            self.data.push(self.current_byte);
        }
        self.data
    }
}
