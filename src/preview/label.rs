//! # 标题拼装
//!
//! 预览窗口标题格式：
//!
//! ```text
//! WebP：  <文件名> (<宽>x<高>[ - <体积>][ - Lossless][ - Animated (<N> Frames)])
//! 其他：  <文件名> (<宽>x<高>[ - <N> DPI][ - <N> BPP][ - <体积>])
//! ```
//!
//! 体积按 1000 进制格式化，最多三级（KB / MB / GB），保留一位小数；
//! 不足 100 字节时直接输出字节数。

use super::features::CompressionMode;
use super::Dimensions;

const SIZE_UNITS: [&str; 3] = ["KB", "MB", "GB"];

/// 将字节数格式化为简短的人类可读字符串。
///
/// # 示例
/// ```rust
/// use ql_image_preview::preview::format_file_size;
///
/// assert_eq!(format_file_size(50), "50 B");
/// assert_eq!(format_file_size(1_500), "1.5 KB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 100 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64 / 1000.0;
    let mut tier = 0;
    while size >= 1000.0 && tier + 1 < SIZE_UNITS.len() {
        size /= 1000.0;
        tier += 1;
    }

    format!("{:.1} {}", size, SIZE_UNITS[tier])
}

fn size_suffix(file_size: Option<u64>) -> String {
    file_size
        .map(|bytes| format!(" - {}", format_file_size(bytes)))
        .unwrap_or_default()
}

/// WebP 预览标题。
pub fn webp_title(
    file_name: &str,
    dimensions: Dimensions,
    file_size: Option<u64>,
    compression: CompressionMode,
    frame_count: Option<u32>,
) -> String {
    let lossless = if compression.is_lossless() { " - Lossless" } else { "" };
    let animation = frame_count
        .map(|frames| format!(" - Animated ({} Frames)", frames))
        .unwrap_or_default();

    format!(
        "{} ({}{}{}{})",
        file_name,
        dimensions,
        size_suffix(file_size),
        lossless,
        animation
    )
}

/// 非 WebP 格式的预览标题（由通用元数据服务提供尺寸、DPI 与色深）。
pub fn generic_title(
    file_name: &str,
    dimensions: Dimensions,
    dpi: Option<u32>,
    bits_per_pixel: Option<u32>,
    file_size: Option<u64>,
) -> String {
    let dpi = dpi.map(|dpi| format!(" - {} DPI", dpi)).unwrap_or_default();
    let depth = bits_per_pixel
        .map(|bpp| format!(" - {} BPP", bpp))
        .unwrap_or_default();

    format!(
        "{} ({}{}{}{})",
        file_name,
        dimensions,
        dpi,
        depth,
        size_suffix(file_size)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_sizes_are_exact_byte_counts() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(50), "50 B");
        assert_eq!(format_file_size(99), "99 B");
    }

    #[test]
    fn sizes_use_decimal_tiers() {
        assert_eq!(format_file_size(100), "0.1 KB");
        assert_eq!(format_file_size(1_500), "1.5 KB");
        assert_eq!(format_file_size(1_500_000), "1.5 MB");
        assert_eq!(format_file_size(1_500_000_000), "1.5 GB");
        assert_eq!(format_file_size(999_999), "1000.0 KB");
    }

    #[test]
    fn gigabytes_are_the_last_tier() {
        assert_eq!(format_file_size(2_500_000_000_000), "2500.0 GB");
    }

    #[test]
    fn lossless_still_title() {
        let title = webp_title(
            "cat.webp",
            Dimensions::new(400, 300),
            Some(2_000),
            CompressionMode::Lossless,
            None,
        );
        assert_eq!(title, "cat.webp (400x300 - 2.0 KB - Lossless)");
    }

    #[test]
    fn animated_title_without_size() {
        let size = Dimensions::new(64, 48);
        let title = webp_title("dance.webp", size, None, CompressionMode::Mixed, Some(12));
        assert_eq!(title, "dance.webp (64x48 - Animated (12 Frames))");
    }

    #[test]
    fn lossy_title_has_no_mode_marker() {
        let size = Dimensions::new(1, 1);
        let title = webp_title("a.webp", size, Some(42), CompressionMode::Lossy, None);
        assert_eq!(title, "a.webp (1x1 - 42 B)");
    }

    #[test]
    fn generic_title_orders_dpi_depth_size() {
        let size = Dimensions::new(2480, 3508);
        let title = generic_title("scan.jpg", size, Some(300), Some(24), Some(1_234_567));
        assert_eq!(title, "scan.jpg (2480x3508 - 300 DPI - 24 BPP - 1.2 MB)");

        let bare = generic_title("x.png", Dimensions::new(10, 10), None, None, None);
        assert_eq!(bare, "x.png (10x10)");
    }
}
