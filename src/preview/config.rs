//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `PreviewConfig`，保证运行时行为可观测、可调整、可测试。
//! 缩略图档位（quality / balanced / speed）作为高层语义，映射到底层重采样滤镜。
//!
//! ## 实现思路
//!
//! - `Default` 提供与宿主插件一致的默认值（20 MiB 体积上限）。
//! - `ThumbnailProfile` 负责档位字符串解析与反向输出。
//! - `from_json_file` 允许宿主以 JSON 文件覆盖部分字段，缺省字段回落到默认值。

use std::path::Path;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::PreviewError;

/// 超过该体积的源文件不解码，改由宿主展示通用文件表示。
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// 预览处理配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// 允许解码的最大源文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 缩略图重采样档位。
    pub thumbnail_profile: ThumbnailProfile,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            thumbnail_profile: ThumbnailProfile::Balanced,
        }
    }
}

/// 缩略图重采样档位（面向宿主/用户语义）。
///
/// - `Quality`：尽量保真
/// - `Balanced`：质量与性能平衡
/// - `Speed`：优先生成速度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailProfile {
    Quality,
    Balanced,
    Speed,
}

impl ThumbnailProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use ql_image_preview::preview::ThumbnailProfile;
    ///
    /// let p = ThumbnailProfile::from_str("Balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), ql_image_preview::preview::PreviewError>(())
    /// ```
    pub fn from_str(profile: &str) -> Result<Self, PreviewError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(PreviewError::InvalidConfig(format!(
                "未知缩略图档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }

    /// 档位对应的重采样滤镜。
    pub fn resize_filter(self) -> FilterType {
        match self {
            Self::Quality => FilterType::Lanczos3,
            Self::Balanced => FilterType::Triangle,
            Self::Speed => FilterType::Nearest,
        }
    }
}

impl PreviewConfig {
    /// 从 JSON 文件读取配置，未出现的字段使用默认值。
    pub fn from_json_file(path: &Path) -> Result<Self, PreviewError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PreviewError::InvalidConfig(format!("无法读取配置文件 {}：{}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| PreviewError::InvalidConfig(format!("解析配置文件失败：{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验字段取值范围。
    pub fn validate(&self) -> Result<(), PreviewError> {
        if self.max_file_size == 0 {
            return Err(PreviewError::InvalidConfig("max_file_size 不能为 0".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(PreviewError::InvalidConfig("max_decoded_pixels 不能为 0".to_string()));
        }
        if self.max_decoded_bytes < 1024 * 1024 {
            return Err(PreviewError::InvalidConfig("max_decoded_bytes 不能小于 1MB".to_string()));
        }
        Ok(())
    }
}
