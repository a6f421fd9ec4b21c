//! # 图片预览核心 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │          宿主（文件预览服务 / CLI / 插件壳）              │
//! │                                                          │
//! │  PreviewHost：present / present_file_representation      │
//! │               is_cancelled（取消信号）                    │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<PreviewOutcome, PreviewError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            核心 (Rust)                           │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  └─ preview ──── PreviewServiceState（请求登记 + 取消）   │
//! │      ├─ handler     编排 + 阶段耗时                       │
//! │      ├─ features    RIFF/VP8/VP8L/VP8X 探测               │
//! │      ├─ demux       动画拆帧                             │
//! │      ├─ decoder     解码 + 重采样                        │
//! │      ├─ scale       等比缩放                             │
//! │      └─ label       标题拼装                             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，CLI 与 JSON 宿主的返回类型 |
//! | [`preview`] | WebP 预览/缩略图流水线与非 WebP 的元数据标题 |

pub mod error;
pub mod preview;
