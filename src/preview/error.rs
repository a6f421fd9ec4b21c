//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载预览/缩略图链路中的所有失败来源，避免整数状态码式的错误约定。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧（宿主）可按分支匹配。
//!
//! 约定统一：`Ok` 即成功，`Err` 即失败。
//! 超大文件回退到宿主通用展示属于设计内的降级路径，不在此处建模为错误。

/// 预览处理统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("源文件不可读：{0}")]
    SourceUnreadable(String),

    #[error("位流无效：{0}")]
    InvalidBitstream(String),

    #[error("容器无效：{0}")]
    InvalidContainer(String),

    #[error("找不到可用帧：{0}")]
    FrameNotFound(String),

    #[error("解码错误：{0}")]
    DecodeFailure(String),

    #[error("尺寸无效：{0}")]
    InvalidDimensions(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("请求已取消：{0}")]
    Cancelled(String),

    #[error("宿主展示失败：{0}")]
    Presentation(String),

    #[error("元数据读取失败：{0}")]
    Metadata(String),

    #[error("配置错误：{0}")]
    InvalidConfig(String),
}

impl PreviewError {
    /// 稳定错误码，供宿主日志与 JSON 输出使用。
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceUnreadable(_) => "SOURCE_UNREADABLE",
            Self::InvalidBitstream(_) => "INVALID_BITSTREAM",
            Self::InvalidContainer(_) => "INVALID_CONTAINER",
            Self::FrameNotFound(_) => "FRAME_NOT_FOUND",
            Self::DecodeFailure(_) => "DECODE_FAILURE",
            Self::InvalidDimensions(_) => "INVALID_DIMENSIONS",
            Self::ResourceLimit(_) => "RESOURCE_LIMIT",
            Self::Cancelled(_) => "CANCELLED",
            Self::Presentation(_) => "PRESENTATION",
            Self::Metadata(_) => "METADATA",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// 出错所处的流水线阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::SourceUnreadable(_) => "load",
            Self::InvalidBitstream(_) => "sniff",
            Self::InvalidContainer(_) | Self::FrameNotFound(_) => "demux",
            Self::DecodeFailure(_) | Self::ResourceLimit(_) => "decode",
            Self::InvalidDimensions(_) => "scale",
            Self::Cancelled(_) => "cancel",
            Self::Presentation(_) => "present",
            Self::Metadata(_) => "metadata",
            Self::InvalidConfig(_) => "config",
        }
    }

    /// 取消不是故障，宿主通常只需静默结束请求。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
