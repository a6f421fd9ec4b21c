//! # 预览处理模块（preview）
//!
//! ## 设计思路
//!
//! 该模块将“内容类型判定 → 加载校验 → 位流探测 → 动画拆帧 → 解码缩放 → 标题拼装 → 交给宿主”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `service`：承载可注入状态（`PreviewServiceState`），管理请求级取消标志
//! - `handler`：编排整条处理流水线
//! - `loader`：负责文件加载、体积上限与取消检查点
//! - `features`：RIFF/VP8/VP8L/VP8X 头部探测
//! - `demux`：动画容器拆帧
//! - `decoder`：解码、像素限制、重采样
//! - `scale`：等比缩放尺寸计算
//! - `label` / `metadata` / `format`：标题、通用元数据与目标格式判定
//! - `host`：宿主接口（绘制、通用文件表示、取消信号）
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! 宿主请求
//!    ↓
//! service.rs（请求登记 + 取消标志）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ format.rs（WebP 判定，其余走 metadata.rs）
//!    ├─ loader.rs（文件加载 + 体积上限）
//!    ├─ features.rs（位流探测）
//!    ├─ demux.rs（动画取第 1 帧）
//!    ├─ scale.rs（缩略图尺寸）
//!    ├─ decoder.rs（解码 + 重采样）
//!    └─ label.rs（标题）
//!    ↓
//! host.rs（present / present_file_representation）
//! ```

mod config;
mod decoder;
pub mod demux;
mod error;
pub mod features;
mod format;
mod handler;
mod host;
mod label;
mod loader;
mod metadata;
mod scale;
mod service;
mod source;

#[cfg(test)]
mod testing;

pub use config::{PreviewConfig, ThumbnailProfile, DEFAULT_MAX_FILE_SIZE};
pub use decoder::DecodeOptions;
pub use demux::{FrameHandle, WebpDemuxer};
pub use error::PreviewError;
pub use features::{sniff, BitstreamFeatures, CompressionMode};
pub use format::{is_webp_identifier, ContentType, WEBP_TYPE_IDENTIFIERS};
pub use handler::PreviewHandler;
pub use host::PreviewHost;
pub use label::{format_file_size, generic_title, webp_title};
pub use metadata::{read_generic_metadata, GenericMetadata};
pub use scale::scale_to_fit;
pub use service::PreviewServiceState;
pub use source::{
    AlphaPosition, Dimensions, PixelLayout, PreparedImage, PreviewOutcome, PreviewRequest,
};
