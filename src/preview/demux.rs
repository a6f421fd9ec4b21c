//! # 动画容器解复用
//!
//! ## 设计思路
//!
//! 动画 WebP 的帧以 `ANMF` 块顺序存放。解复用器只借用原始缓冲区，
//! 帧句柄是缓冲区内的字节区间视图，不做拷贝。
//!
//! - `open` 校验 RIFF 与 `VP8X`，遍历所有块头并统计帧数（不解析帧内容）。
//! - `frames` 返回惰性、有限、不可重启的帧迭代器；调用方取到第一帧即可停止。
//! - 帧句柄的生命周期受解复用器借用约束：解复用器被释放前，帧视图必然已失效，
//!   由借用检查器保证，无需手动释放顺序。
//!
//! ## ANMF 负载布局
//!
//! ```text
//! 0..3   X 偏移 / 2     3..6   Y 偏移 / 2
//! 6..9   帧宽 - 1       9..12  帧高 - 1
//! 12..15 时长（毫秒）   15     标志（0x02 不混合，0x01 处置为背景）
//! 16..   帧数据：[ALPH] + VP8 / VP8L，以及可忽略的未知块
//! ```

use super::features::{
    self, Chunk, ChunkReader, CHUNK_HEADER_SIZE, FOURCC_ALPH, FOURCC_ANIM, FOURCC_ANMF, FOURCC_VP8,
    FOURCC_VP8L, FOURCC_VP8X, RIFF_HEADER_SIZE,
};
use super::{Dimensions, PreviewError};

const ANMF_HEADER_SIZE: usize = 16;
const ANIM_PAYLOAD_SIZE: usize = 6;
const ANMF_FLAG_NO_BLEND: u8 = 0x02;
const ANMF_FLAG_DISPOSE_BACKGROUND: u8 = 0x01;

/// 已打开的动画容器。
#[derive(Debug)]
pub struct WebpDemuxer<'a> {
    body: &'a [u8],
    canvas: Dimensions,
    has_alpha: bool,
    loop_count: u16,
    background_color: [u8; 4],
    frame_count: u32,
}

impl<'a> WebpDemuxer<'a> {
    /// 打开动画容器并统计帧数。
    pub fn open(data: &'a [u8]) -> Result<Self, PreviewError> {
        let body = features::riff_body(data).map_err(PreviewError::InvalidContainer)?;
        let mut chunks = ChunkReader::new(body, RIFF_HEADER_SIZE);

        let first = chunks
            .next_chunk()
            .map_err(PreviewError::InvalidContainer)?
            .ok_or_else(|| PreviewError::InvalidContainer("容器为空".to_string()))?;
        if &first.fourcc != FOURCC_VP8X {
            return Err(PreviewError::InvalidContainer(format!(
                "动画容器必须以 VP8X 开头，实际为 {}",
                String::from_utf8_lossy(&first.fourcc)
            )));
        }

        let header =
            features::parse_vp8x_header(first.payload).map_err(PreviewError::InvalidContainer)?;
        if !header.has_animation() {
            return Err(PreviewError::InvalidContainer("VP8X 未声明动画".to_string()));
        }

        let mut loop_count = 0;
        let mut background_color = [0; 4];
        let mut frame_count: u32 = 0;

        while let Some(chunk) = chunks.next_chunk().map_err(PreviewError::InvalidContainer)? {
            match &chunk.fourcc {
                FOURCC_ANIM => {
                    if chunk.payload.len() < ANIM_PAYLOAD_SIZE {
                        return Err(PreviewError::InvalidContainer("ANIM 块被截断".to_string()));
                    }
                    background_color.copy_from_slice(&chunk.payload[0..4]);
                    loop_count = u16::from_le_bytes([chunk.payload[4], chunk.payload[5]]);
                }
                FOURCC_ANMF => {
                    if chunk.payload.len() < ANMF_HEADER_SIZE {
                        return Err(PreviewError::InvalidContainer(format!(
                            "ANMF 块过短（偏移 {}）",
                            chunk.offset
                        )));
                    }
                    frame_count = frame_count
                        .checked_add(1)
                        .ok_or_else(|| PreviewError::InvalidContainer("帧数溢出".to_string()))?;
                }
                _ => {}
            }
        }

        log::debug!(
            "🎞️ 动画容器 - 画布 {}x{} 帧数 {} 循环 {}",
            header.canvas_width,
            header.canvas_height,
            frame_count,
            loop_count
        );

        Ok(Self {
            body,
            canvas: Dimensions::new(header.canvas_width, header.canvas_height),
            has_alpha: header.has_alpha(),
            loop_count,
            background_color,
            frame_count,
        })
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// 画布尺寸（可能与单帧尺寸不同）。
    pub fn canvas(&self) -> Dimensions {
        self.canvas
    }

    /// 容器级 alpha 标志。
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// 循环次数，0 表示无限循环。
    pub fn loop_count(&self) -> u16 {
        self.loop_count
    }

    pub fn background_color(&self) -> [u8; 4] {
        self.background_color
    }

    /// 惰性帧迭代器，按容器顺序产出帧。
    pub fn frames(&self) -> Frames<'_> {
        Frames {
            chunks: ChunkReader::new(self.body, RIFF_HEADER_SIZE),
            canvas: self.canvas,
            next_index: 1,
            finished: false,
        }
    }

    /// 按 1 起始的序号取帧，只解析到目标帧为止。
    pub fn frame(&self, index: u32) -> Result<FrameHandle<'_>, PreviewError> {
        if index == 0 || index > self.frame_count {
            return Err(PreviewError::FrameNotFound(format!(
                "帧序号 {} 超出范围（共 {} 帧）",
                index, self.frame_count
            )));
        }

        self.frames()
            .nth(index as usize - 1)
            .unwrap_or_else(|| Err(PreviewError::FrameNotFound(format!("帧 {} 不存在", index))))
    }
}

/// 单帧视图：原始缓冲区中的字节区间。
#[derive(Debug, Clone, Copy)]
pub struct FrameHandle<'d> {
    /// 1 起始的帧序号。
    pub index: u32,
    /// `payload` 在原始缓冲区中的绝对偏移。
    pub offset: usize,
    /// `[ALPH] + VP8/VP8L` 块序列。
    pub payload: &'d [u8],
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub duration_ms: u32,
    /// 是否与前一帧做 alpha 混合。
    pub blend: bool,
    /// 显示结束后是否将区域处置为背景色。
    pub dispose_to_background: bool,
    /// 帧内是否携带 alpha（ALPH 块或 VP8L alpha 标志）。
    pub has_alpha: bool,
}

impl FrameHandle<'_> {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// 帧迭代器；遇到结构错误产出一次 `Err` 后结束。
pub struct Frames<'d> {
    chunks: ChunkReader<'d>,
    canvas: Dimensions,
    next_index: u32,
    finished: bool,
}

impl<'d> Iterator for Frames<'d> {
    type Item = Result<FrameHandle<'d>, PreviewError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let chunk = match self.chunks.next_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(message) => {
                    self.finished = true;
                    return Some(Err(PreviewError::InvalidContainer(message)));
                }
            };

            if &chunk.fourcc != FOURCC_ANMF {
                continue;
            }

            let index = self.next_index;
            self.next_index += 1;
            let frame = parse_frame(index, chunk, self.canvas);
            if frame.is_err() {
                self.finished = true;
            }
            return Some(frame);
        }
    }
}

fn parse_frame(
    index: u32,
    chunk: Chunk<'_>,
    canvas: Dimensions,
) -> Result<FrameHandle<'_>, PreviewError> {
    let header = chunk
        .payload
        .get(..ANMF_HEADER_SIZE)
        .ok_or_else(|| PreviewError::InvalidContainer(format!("帧 {} 的 ANMF 头被截断", index)))?;

    let x_offset = features::read_u24_le(&header[0..3]) * 2;
    let y_offset = features::read_u24_le(&header[3..6]) * 2;
    let width = features::read_u24_le(&header[6..9]) + 1;
    let height = features::read_u24_le(&header[9..12]) + 1;
    let duration_ms = features::read_u24_le(&header[12..15]);
    let flags = header[15];

    if u64::from(x_offset) + u64::from(width) > u64::from(canvas.width)
        || u64::from(y_offset) + u64::from(height) > u64::from(canvas.height)
    {
        return Err(PreviewError::InvalidContainer(format!(
            "帧 {} 超出画布：{}x{}+{}+{}（画布 {}）",
            index, width, height, x_offset, y_offset, canvas
        )));
    }

    let data = &chunk.payload[ANMF_HEADER_SIZE..];
    let data_base = chunk.offset + CHUNK_HEADER_SIZE + ANMF_HEADER_SIZE;
    let mut sub_chunks = ChunkReader::new(data, data_base);
    let mut alpha_chunk: Option<Chunk<'_>> = None;

    while let Some(sub) = sub_chunks.next_chunk().map_err(PreviewError::InvalidContainer)? {
        let (image_width, image_height, vp8l_alpha) = match &sub.fourcc {
            FOURCC_ALPH => {
                if alpha_chunk.is_none() {
                    alpha_chunk = Some(sub);
                }
                continue;
            }
            FOURCC_VP8 => {
                let (w, h) = features::parse_vp8_header(sub.payload)
                    .map_err(PreviewError::InvalidContainer)?;
                (w, h, false)
            }
            FOURCC_VP8L => {
                let vp8l = features::parse_vp8l_header(sub.payload)
                    .map_err(PreviewError::InvalidContainer)?;
                // VP8L 自带 alpha，忽略前置 ALPH
                alpha_chunk = None;
                (vp8l.width, vp8l.height, vp8l.alpha_hint)
            }
            _ => continue,
        };

        if image_width != width || image_height != height {
            return Err(PreviewError::InvalidContainer(format!(
                "帧 {} 声明尺寸 {}x{} 与位流尺寸 {}x{} 不一致",
                index, width, height, image_width, image_height
            )));
        }

        let start = alpha_chunk.map_or(sub.offset, |alpha| alpha.offset) - data_base;
        let end = sub.offset - data_base + sub.len_with_header();

        return Ok(FrameHandle {
            index,
            offset: data_base + start,
            payload: &data[start..end],
            width,
            height,
            x_offset,
            y_offset,
            duration_ms,
            blend: flags & ANMF_FLAG_NO_BLEND == 0,
            dispose_to_background: flags & ANMF_FLAG_DISPOSE_BACKGROUND != 0,
            has_alpha: alpha_chunk.is_some() || vp8l_alpha,
        });
    }

    Err(PreviewError::InvalidContainer(format!("帧 {} 缺少图像数据块", index)))
}
