//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部请求”和“流水线中间结果”解耦：
//! - `PreviewRequest` 表示宿主传入的文件定位与类型标识
//! - `RawImageData` 表示已加载但未解码的字节
//! - `PreparedImage` 表示可直接交给宿主绘制的 RGB/RGBA 像素
//!
//! 所有中间结果都是独占所有权的值，任意提前返回都会自动释放。

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// 宿主发起的一次预览或缩略图请求。
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    /// 源文件路径。
    pub path: PathBuf,
    /// 宿主提供的内容类型标识（UTI 或 MIME），缺省时按文件签名推断。
    pub content_type: Option<String>,
}

impl PreviewRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// 标题中使用的文件名（路径最后一段）。
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "(NULL)".to_string())
    }
}

/// 宽高对。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 加载阶段输出：原始字节与来源信息。
pub(crate) struct RawImageData {
    /// 原始位流字节。
    pub(crate) bytes: Vec<u8>,
    /// 文件名（用于标题与日志）。
    pub(crate) file_name: String,
}

impl RawImageData {
    pub(crate) fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// 像素排列方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    Rgb,
    Rgba,
}

impl PixelLayout {
    pub fn from_alpha(has_alpha: bool) -> Self {
        if has_alpha { Self::Rgba } else { Self::Rgb }
    }

    pub fn channels(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    pub fn alpha_position(self) -> AlphaPosition {
        match self {
            Self::Rgb => AlphaPosition::None,
            Self::Rgba => AlphaPosition::Last,
        }
    }
}

/// Alpha 通道在像素中的位置（对应宿主位图描述）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphaPosition {
    None,
    Last,
}

/// 解码阶段输出：交错排列的 8 位像素数据。
pub struct PreparedImage {
    /// 图像宽度（像素）。
    pub width: u32,
    /// 图像高度（像素）。
    pub height: u32,
    /// RGB 或 RGBA。
    pub layout: PixelLayout,
    /// 像素字节（`width * height * channels`）。
    pub bytes: Vec<u8>,
}

impl PreparedImage {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// 每行字节数。
    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.channels()
    }

    pub fn alpha_position(&self) -> AlphaPosition {
        self.layout.alpha_position()
    }
}

impl fmt::Debug for PreparedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// 一次请求的最终结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewOutcome {
    /// 像素已交给宿主绘制。
    Rendered {
        width: u32,
        height: u32,
        title: Option<String>,
    },
    /// 未解码，宿主使用通用文件表示。
    FileRepresentation { title: Option<String> },
}
