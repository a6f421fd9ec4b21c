//! # 位流特征探测（sniff）
//!
//! ## 设计思路
//!
//! 只读取 RIFF 头与首个图像块头，不做像素解码，得到宽高、alpha、动画与压缩方式。
//! 任何解码前必须先通过本模块；探测失败即拒绝，后续阶段不再尝试解码。
//!
//! ## 位流布局
//!
//! ```text
//! 0..4   "RIFF"
//! 4..8   RIFF 大小（小端，不含前 8 字节）
//! 8..12  "WEBP"
//! 12..   块序列：FourCC(4) + 大小(4, 小端) + 负载（奇数长度补 1 字节）
//!
//! 首块：
//!   "VP8 "  有损：3 字节帧标签 + 起始码 9d 01 2a + 14 位宽/高
//!   "VP8L"  无损：签名 0x2f + 14 位 (宽-1) + 14 位 (高-1) + alpha 位 + 3 位版本
//!   "VP8X"  扩展：标志字节（0x10 alpha，0x02 动画）+ 24 位 (画布宽-1)/(画布高-1)
//! ```

use super::PreviewError;

pub(crate) const RIFF_HEADER_SIZE: usize = 12;
pub(crate) const CHUNK_HEADER_SIZE: usize = 8;
/// 能够判断格式所需的最小字节数。
pub const MIN_HEADER_SIZE: usize = RIFF_HEADER_SIZE + CHUNK_HEADER_SIZE;

const VP8_FRAME_HEADER_SIZE: usize = 10;
const VP8L_HEADER_SIZE: usize = 5;
const VP8X_PAYLOAD_SIZE: usize = 10;
const VP8L_SIGNATURE: u8 = 0x2f;
const VP8_START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];

pub(crate) const VP8X_FLAG_ALPHA: u8 = 0x10;
pub(crate) const VP8X_FLAG_ANIMATION: u8 = 0x02;

pub(crate) const FOURCC_VP8: &[u8; 4] = b"VP8 ";
pub(crate) const FOURCC_VP8L: &[u8; 4] = b"VP8L";
pub(crate) const FOURCC_VP8X: &[u8; 4] = b"VP8X";
pub(crate) const FOURCC_ALPH: &[u8; 4] = b"ALPH";
pub(crate) const FOURCC_ANIM: &[u8; 4] = b"ANIM";
pub(crate) const FOURCC_ANMF: &[u8; 4] = b"ANMF";

/// 压缩方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    /// 未定义或混合（动画容器不区分）。
    Mixed,
    Lossy,
    Lossless,
}

impl CompressionMode {
    pub fn is_lossless(self) -> bool {
        self == Self::Lossless
    }
}

/// 位流固有属性快照。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitstreamFeatures {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub has_animation: bool,
    pub compression: CompressionMode,
}

/// 探测位流特征。
///
/// # 示例
/// ```rust
/// use ql_image_preview::preview::features::sniff;
///
/// assert!(sniff(b"not a webp").is_err());
/// ```
pub fn sniff(data: &[u8]) -> Result<BitstreamFeatures, PreviewError> {
    if data.is_empty() {
        return Err(PreviewError::InvalidBitstream("位流为空".to_string()));
    }
    if data.len() < MIN_HEADER_SIZE {
        return Err(PreviewError::InvalidBitstream(format!(
            "位流过短：{} 字节（至少 {} 字节）",
            data.len(),
            MIN_HEADER_SIZE
        )));
    }

    let body = riff_body(data).map_err(PreviewError::InvalidBitstream)?;
    let mut chunks = ChunkReader::new(body, RIFF_HEADER_SIZE);
    let first = chunks
        .next_chunk()
        .map_err(PreviewError::InvalidBitstream)?
        .ok_or_else(|| PreviewError::InvalidBitstream("缺少图像数据块".to_string()))?;

    let features = match &first.fourcc {
        FOURCC_VP8 => {
            let (width, height) =
                parse_vp8_header(first.payload).map_err(PreviewError::InvalidBitstream)?;
            BitstreamFeatures {
                width,
                height,
                has_alpha: false,
                has_animation: false,
                compression: CompressionMode::Lossy,
            }
        }
        FOURCC_VP8L => {
            let header = parse_vp8l_header(first.payload).map_err(PreviewError::InvalidBitstream)?;
            BitstreamFeatures {
                width: header.width,
                height: header.height,
                has_alpha: header.alpha_hint,
                has_animation: false,
                compression: CompressionMode::Lossless,
            }
        }
        FOURCC_VP8X => {
            let header = parse_vp8x_header(first.payload).map_err(PreviewError::InvalidBitstream)?;
            if header.has_animation() {
                BitstreamFeatures {
                    width: header.canvas_width,
                    height: header.canvas_height,
                    has_alpha: header.has_alpha(),
                    has_animation: true,
                    compression: CompressionMode::Mixed,
                }
            } else {
                sniff_extended_still(&header, &mut chunks)?
            }
        }
        other => {
            return Err(PreviewError::InvalidBitstream(format!(
                "未知的首个数据块：{}",
                String::from_utf8_lossy(other)
            )));
        }
    };

    log::debug!(
        "🔍 位流特征 - {}x{} alpha={} animation={} mode={:?}",
        features.width,
        features.height,
        features.has_alpha,
        features.has_animation,
        features.compression
    );

    Ok(features)
}

/// 扩展格式静态图：跳过 ICCP/ALPH/元数据块，直到首个图像块。
fn sniff_extended_still(
    header: &Vp8xHeader,
    chunks: &mut ChunkReader<'_>,
) -> Result<BitstreamFeatures, PreviewError> {
    let mut has_alpha = header.has_alpha();

    while let Some(chunk) = chunks.next_chunk().map_err(PreviewError::InvalidBitstream)? {
        let (width, height, compression) = match &chunk.fourcc {
            FOURCC_ALPH => {
                has_alpha = true;
                continue;
            }
            FOURCC_VP8 => {
                let (width, height) =
                    parse_vp8_header(chunk.payload).map_err(PreviewError::InvalidBitstream)?;
                (width, height, CompressionMode::Lossy)
            }
            FOURCC_VP8L => {
                let vp8l =
                    parse_vp8l_header(chunk.payload).map_err(PreviewError::InvalidBitstream)?;
                has_alpha |= vp8l.alpha_hint;
                (vp8l.width, vp8l.height, CompressionMode::Lossless)
            }
            _ => continue,
        };

        if width != header.canvas_width || height != header.canvas_height {
            return Err(PreviewError::InvalidBitstream(format!(
                "画布尺寸 {}x{} 与图像尺寸 {}x{} 不一致",
                header.canvas_width, header.canvas_height, width, height
            )));
        }

        return Ok(BitstreamFeatures {
            width,
            height,
            has_alpha,
            has_animation: false,
            compression,
        });
    }

    Err(PreviewError::InvalidBitstream("扩展格式缺少图像数据块".to_string()))
}

/// 校验 RIFF 头并返回 "WEBP" 之后、RIFF 声明范围内的块序列。
///
/// RIFF 大小之外的尾随字节被忽略。
pub(crate) fn riff_body(data: &[u8]) -> Result<&[u8], String> {
    if data.len() < RIFF_HEADER_SIZE {
        return Err("缺少 RIFF 头".to_string());
    }
    if &data[0..4] != b"RIFF" {
        return Err("缺少 RIFF 签名".to_string());
    }
    if &data[8..12] != b"WEBP" {
        return Err("缺少 WEBP 签名".to_string());
    }

    let riff_size = read_u32_le(&data[4..8]) as usize;
    if riff_size < 4 + CHUNK_HEADER_SIZE {
        return Err(format!("RIFF 大小过小：{}", riff_size));
    }

    let end = riff_size
        .checked_add(8)
        .ok_or_else(|| "RIFF 大小溢出".to_string())?;
    if end > data.len() {
        return Err(format!("位流被截断：声明 {} 字节，实际 {} 字节", end, data.len()));
    }

    Ok(&data[RIFF_HEADER_SIZE..end])
}

/// 一个 RIFF 块的借用视图。
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk<'a> {
    pub(crate) fourcc: [u8; 4],
    /// 块头在原始缓冲区中的绝对偏移。
    pub(crate) offset: usize,
    pub(crate) payload: &'a [u8],
}

impl Chunk<'_> {
    /// 块头 + 负载（不含补齐字节）的总长度。
    pub(crate) fn len_with_header(&self) -> usize {
        CHUNK_HEADER_SIZE + self.payload.len()
    }
}

/// 顺序读取块序列，只解析块头，不拷贝负载。
pub(crate) struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ChunkReader<'a> {
    /// `base` 为 `data` 在原始缓冲区中的起始偏移，用于计算绝对偏移。
    pub(crate) fn new(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    pub(crate) fn next_chunk(&mut self) -> Result<Option<Chunk<'a>>, String> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }

        let remaining = self.data.len() - self.pos;
        if remaining < CHUNK_HEADER_SIZE {
            return Err(format!("块头被截断（偏移 {}）", self.base + self.pos));
        }

        let header = &self.data[self.pos..self.pos + CHUNK_HEADER_SIZE];
        let fourcc = [header[0], header[1], header[2], header[3]];
        let size = read_u32_le(&header[4..8]) as usize;

        let payload_start = self.pos + CHUNK_HEADER_SIZE;
        let payload_end = payload_start
            .checked_add(size)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                format!(
                    "数据块 {} 越界（偏移 {}，大小 {}）",
                    String::from_utf8_lossy(&fourcc),
                    self.base + self.pos,
                    size
                )
            })?;

        let chunk = Chunk {
            fourcc,
            offset: self.base + self.pos,
            payload: &self.data[payload_start..payload_end],
        };

        // 奇数长度负载补 1 字节；末尾缺失的补齐字节容忍处理
        let padded_end = payload_end + (size & 1);
        self.pos = padded_end.min(self.data.len());

        Ok(Some(chunk))
    }
}

/// 解析 VP8 关键帧头，返回宽高。
pub(crate) fn parse_vp8_header(payload: &[u8]) -> Result<(u32, u32), String> {
    if payload.len() < VP8_FRAME_HEADER_SIZE {
        return Err("VP8 帧头被截断".to_string());
    }

    let bits = u32::from(payload[0]) | (u32::from(payload[1]) << 8) | (u32::from(payload[2]) << 16);
    let key_frame = bits & 1 == 0;
    let profile = (bits >> 1) & 7;
    let show_frame = (bits >> 4) & 1 == 1;
    let partition_length = (bits >> 5) as usize;

    if !key_frame {
        return Err("VP8 首帧不是关键帧".to_string());
    }
    if profile > 3 {
        return Err(format!("VP8 profile 无效：{}", profile));
    }
    if !show_frame {
        return Err("VP8 帧不可见".to_string());
    }
    if partition_length >= payload.len() {
        return Err("VP8 分区长度越界".to_string());
    }
    if payload[3..6] != VP8_START_CODE {
        return Err("VP8 起始码无效".to_string());
    }

    let width = u32::from(u16::from_le_bytes([payload[6], payload[7]]) & 0x3fff);
    let height = u32::from(u16::from_le_bytes([payload[8], payload[9]]) & 0x3fff);
    if width == 0 || height == 0 {
        return Err(format!("VP8 尺寸无效：{}x{}", width, height));
    }

    Ok((width, height))
}

/// VP8L 头信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Vp8lHeader {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) alpha_hint: bool,
}

pub(crate) fn parse_vp8l_header(payload: &[u8]) -> Result<Vp8lHeader, String> {
    if payload.len() < VP8L_HEADER_SIZE {
        return Err("VP8L 头被截断".to_string());
    }
    if payload[0] != VP8L_SIGNATURE {
        return Err(format!("VP8L 签名无效：0x{:02x}", payload[0]));
    }

    let bits = read_u32_le(&payload[1..5]);
    let version = bits >> 29;
    if version != 0 {
        return Err(format!("VP8L 版本不受支持：{}", version));
    }

    Ok(Vp8lHeader {
        width: (bits & 0x3fff) + 1,
        height: ((bits >> 14) & 0x3fff) + 1,
        alpha_hint: (bits >> 28) & 1 == 1,
    })
}

/// VP8X 扩展头。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Vp8xHeader {
    pub(crate) flags: u8,
    pub(crate) canvas_width: u32,
    pub(crate) canvas_height: u32,
}

impl Vp8xHeader {
    pub(crate) fn has_alpha(&self) -> bool {
        self.flags & VP8X_FLAG_ALPHA != 0
    }

    pub(crate) fn has_animation(&self) -> bool {
        self.flags & VP8X_FLAG_ANIMATION != 0
    }
}

pub(crate) fn parse_vp8x_header(payload: &[u8]) -> Result<Vp8xHeader, String> {
    if payload.len() < VP8X_PAYLOAD_SIZE {
        return Err("VP8X 头被截断".to_string());
    }

    let canvas_width = read_u24_le(&payload[4..7]) + 1;
    let canvas_height = read_u24_le(&payload[7..10]) + 1;
    if u64::from(canvas_width) * u64::from(canvas_height) > u64::from(u32::MAX) {
        return Err(format!("画布尺寸过大：{}x{}", canvas_width, canvas_height));
    }

    Ok(Vp8xHeader {
        flags: payload[0],
        canvas_width,
        canvas_height,
    })
}

pub(crate) fn read_u24_le(bytes: &[u8]) -> u32 {
    u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16)
}

pub(crate) fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
