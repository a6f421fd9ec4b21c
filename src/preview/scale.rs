//! # 等比缩放尺寸计算
//!
//! 给定原始尺寸与包围盒，计算保持宽高比的输出尺寸：
//! - 宽 > 高（严格大于）：宽取包围盒宽，高按比例截断
//! - 否则（含正方形）：高取包围盒高，宽按比例截断
//!
//! 使用整数截断而非四舍五入，保证缩略图尺寸逐位可复现。
//! 极端宽高比下次要边可能截断为 0，原样返回，不做钳制。

use super::{Dimensions, PreviewError};

/// 计算适配包围盒的输出尺寸。
///
/// # 示例
/// ```rust
/// use ql_image_preview::preview::{scale_to_fit, Dimensions};
///
/// let out = scale_to_fit(Dimensions::new(1920, 1080), Dimensions::new(800, 800))?;
/// assert_eq!(out, Dimensions::new(800, 450));
/// # Ok::<(), ql_image_preview::preview::PreviewError>(())
/// ```
pub fn scale_to_fit(native: Dimensions, bounding: Dimensions) -> Result<Dimensions, PreviewError> {
    if native.is_empty() || bounding.is_empty() {
        return Err(PreviewError::InvalidDimensions(format!(
            "原始尺寸 {} 与包围盒 {} 必须均大于 0",
            native, bounding
        )));
    }

    let scaled = if native.width > native.height {
        let height = u64::from(bounding.width) * u64::from(native.height) / u64::from(native.width);
        Dimensions::new(bounding.width, height as u32)
    } else {
        let width = u64::from(bounding.height) * u64::from(native.width) / u64::from(native.height);
        Dimensions::new(width as u32, bounding.height)
    };

    if scaled.is_empty() {
        log::warn!("⚠️ 缩放结果存在 0 边：{} -> {}（包围盒 {}）", native, scaled, bounding);
    }

    Ok(scaled)
}
