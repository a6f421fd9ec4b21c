//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义应用级 `AppError`，宿主侧（CLI、JSON 桥接）统一返回 `Result<T, AppError>`，
//! 避免各入口分散的 `.map_err(|e| e.to_string())`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `PreviewError` 与 `serde_json::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于以 JSON 交换。

use serde::Serialize;

use crate::preview::PreviewError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 预览流水线错误（加载 / 探测 / 解码 / 展示）
    #[error("{0}")]
    Preview(#[from] PreviewError),

    /// 输出序列化失败
    #[error("输出序列化失败: {0}")]
    Output(#[from] serde_json::Error),
}

impl AppError {
    /// 稳定错误码，非流水线错误归入通用类别。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Preview(err) => err.code(),
            Self::Output(_) => "OUTPUT",
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_errors_keep_their_code_and_message() {
        let err = AppError::from(PreviewError::FrameNotFound("动画不含任何帧".to_string()));
        assert_eq!(err.code(), "FRAME_NOT_FOUND");
        let json = serde_json::to_string(&err).expect("serialize failed");
        assert_eq!(json, "\"找不到可用帧：动画不含任何帧\"");
    }

    #[test]
    fn output_errors_use_generic_code() {
        let err: AppError = serde_json::from_str::<u32>("not json")
            .expect_err("parse should fail")
            .into();
        assert_eq!(err.code(), "OUTPUT");
        assert!(err.to_string().starts_with("输出序列化失败"));
    }
}
