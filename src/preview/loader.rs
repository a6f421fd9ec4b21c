//! # 源文件加载
//!
//! ## 设计思路
//!
//! 在“尽可能早”的阶段完成输入校验：文件可打开、非空、未超过体积上限。
//! 超过上限不是错误，而是告知编排层改用宿主的通用文件表示。
//!
//! 打开文件后、分配缓冲后、读取完成后各轮询一次取消信号；
//! 文件句柄与缓冲区均为作用域内所有权，任意提前返回都会自动释放。

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::host::{ensure_not_cancelled, PreviewHost};
use super::source::RawImageData;
use super::{PreviewConfig, PreviewError, PreviewHandler};

/// 加载结果。
pub(crate) enum LoadedSource {
    Loaded(RawImageData),
    /// 超过体积上限，未读取内容。
    Oversize { byte_len: u64 },
}

impl PreviewHandler {
    /// 从本地路径加载位流字节。
    pub(crate) fn load_from_file<H: PreviewHost + ?Sized>(
        &self,
        path: &Path,
        config: &PreviewConfig,
        host: &H,
    ) -> Result<LoadedSource, PreviewError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        let mut file = File::open(path).map_err(|e| {
            PreviewError::SourceUnreadable(format!("无法打开文件 {}：{}", path.display(), e))
        })?;
        ensure_not_cancelled(host, "open")?;

        let byte_len = file
            .metadata()
            .map_err(|e| PreviewError::SourceUnreadable(format!("无法读取文件信息：{}", e)))?
            .len();

        if byte_len == 0 {
            return Err(PreviewError::SourceUnreadable(format!("文件为空：{}", path.display())));
        }

        if byte_len > config.max_file_size {
            log::info!(
                "📦 文件超过体积上限，跳过解码：{:.2} MB（限制：{:.2} MB）",
                byte_len as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            );
            return Ok(LoadedSource::Oversize { byte_len });
        }

        let mut bytes = Vec::with_capacity(byte_len as usize);
        ensure_not_cancelled(host, "allocate")?;

        file.read_to_end(&mut bytes)
            .map_err(|e| PreviewError::SourceUnreadable(format!("无法读取图片文件：{}", e)))?;
        ensure_not_cancelled(host, "read")?;

        if bytes.is_empty() {
            return Err(PreviewError::SourceUnreadable(format!("文件为空：{}", path.display())));
        }
        // 读取期间文件可能被改写
        if bytes.len() as u64 > config.max_file_size {
            return Ok(LoadedSource::Oversize {
                byte_len: bytes.len() as u64,
            });
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "(NULL)".to_string());

        Ok(LoadedSource::Loaded(RawImageData { bytes, file_name }))
    }
}
