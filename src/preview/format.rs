//! # 目标格式判定
//!
//! 宿主以 UTI（或 MIME）告知内容类型。WebP 走自带解码链路，其余格式交给通用元数据服务。
//! 判定是纯函数，没有可变的全局注册表。

use std::path::Path;

use super::PreviewError;

/// WebP 的两个 UTI。
pub const WEBP_TYPE_IDENTIFIERS: [&str; 2] = ["public.webp", "org.webmproject.webp"];

const WEBP_MIME: &str = "image/webp";

/// 内容类型分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// 走 WebP 解码链路。
    WebP,
    /// 其他格式，仅读取元数据。
    Other,
}

impl ContentType {
    /// 按宿主提供的类型标识分类。
    pub fn from_identifier(identifier: &str) -> Self {
        if is_webp_identifier(identifier) {
            Self::WebP
        } else {
            Self::Other
        }
    }

    /// 宿主未给出类型时，按文件签名推断。
    pub fn from_signature(bytes: &[u8]) -> Self {
        match infer::get(bytes) {
            Some(kind) if kind.mime_type() == WEBP_MIME => Self::WebP,
            _ => Self::Other,
        }
    }

    /// 按文件头签名推断，只读取文件开头若干字节。
    pub fn from_path(path: &Path) -> Result<Self, PreviewError> {
        let kind = infer::get_from_path(path).map_err(|e| {
            PreviewError::SourceUnreadable(format!("无法读取文件 {}：{}", path.display(), e))
        })?;
        Ok(match kind {
            Some(kind) if kind.mime_type() == WEBP_MIME => Self::WebP,
            _ => Self::Other,
        })
    }

    pub fn is_webp(self) -> bool {
        self == Self::WebP
    }
}

/// 判断类型标识是否为 WebP。
pub fn is_webp_identifier(identifier: &str) -> bool {
    let identifier = identifier.trim();
    WEBP_TYPE_IDENTIFIERS.contains(&identifier) || identifier.eq_ignore_ascii_case(WEBP_MIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_both_type_identifiers() {
        assert!(is_webp_identifier("public.webp"));
        assert!(is_webp_identifier("org.webmproject.webp"));
        assert!(is_webp_identifier("image/WebP"));
        assert!(!is_webp_identifier("public.png"));
        assert_eq!(ContentType::from_identifier("public.jpeg"), ContentType::Other);
    }

    #[test]
    fn signature_detects_webp_riff() {
        let mut bytes = b"RIFF\x1a\x00\x00\x00WEBPVP8L".to_vec();
        bytes.extend_from_slice(&[0x0d, 0, 0, 0, 0x2f, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(ContentType::from_signature(&bytes).is_webp());
        assert_eq!(ContentType::from_signature(b"\x89PNG\r\n\x1a\n"), ContentType::Other);
    }

    #[test]
    fn path_detection_reports_missing_file() {
        let result = ContentType::from_path(Path::new("/no/such/file.webp"));
        assert!(matches!(result, Err(PreviewError::SourceUnreadable(_))));
    }
}
