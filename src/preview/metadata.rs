//! # 通用图片元数据
//!
//! 非 WebP 格式不解码像素，只读取标题所需的信息：
//! - 宽高与每像素位数：`image` 仅解析文件头
//! - DPI：EXIF 的 `YResolution`（缺失时退回 `XResolution`），按分辨率单位换算为每英寸
//!
//! DPI 与色深缺失都不是错误，标题省略对应片段即可。

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exif::{In, Reader, Tag, Value};
use image::{ImageDecoder, ImageReader};

use super::{Dimensions, PreviewError};

const RESOLUTION_UNIT_NONE: u32 = 1;
const RESOLUTION_UNIT_CENTIMETER: u32 = 3;

/// 通用元数据。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericMetadata {
    pub dimensions: Dimensions,
    pub dpi: Option<u32>,
    pub bits_per_pixel: Option<u32>,
}

/// 读取非 WebP 图片的元数据。
pub fn read_generic_metadata(path: &Path) -> Result<GenericMetadata, PreviewError> {
    let reader = ImageReader::open(path)
        .map_err(|e| PreviewError::SourceUnreadable(format!("无法打开文件 {}：{}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| PreviewError::Metadata(format!("无法识别图片格式：{}", e)))?;

    let decoder = reader
        .into_decoder()
        .map_err(|e| PreviewError::Metadata(format!("无法读取图片头：{}", e)))?;

    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(PreviewError::Metadata(format!("图片尺寸无效：{}x{}", width, height)));
    }

    let bits_per_pixel =
        Some(u32::from(decoder.color_type().bits_per_pixel())).filter(|bpp| *bpp > 0);
    drop(decoder);

    let metadata = GenericMetadata {
        dimensions: Dimensions::new(width, height),
        dpi: read_exif_dpi(path),
        bits_per_pixel,
    };

    log::debug!(
        "🔍 通用元数据 - {} dpi={:?} bpp={:?}",
        metadata.dimensions,
        metadata.dpi,
        metadata.bits_per_pixel
    );

    Ok(metadata)
}

fn read_exif_dpi(path: &Path) -> Option<u32> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(err) => {
            log::debug!("无 EXIF 分辨率信息 {}：{}", path.display(), err);
            return None;
        }
    };

    let field = exif
        .get_field(Tag::YResolution, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::XResolution, In::PRIMARY))?;
    let resolution = match &field.value {
        Value::Rational(values) => values.first()?.to_f64(),
        _ => return None,
    };

    let unit = exif
        .get_field(Tag::ResolutionUnit, In::PRIMARY)
        .and_then(|unit| unit.value.get_uint(0))
        .unwrap_or(2);

    dpi_from_resolution(resolution, unit)
}

fn dpi_from_resolution(resolution: f64, unit: u32) -> Option<u32> {
    let dpi = match unit {
        RESOLUTION_UNIT_NONE => return None,
        RESOLUTION_UNIT_CENTIMETER => resolution * 2.54,
        _ => resolution,
    };

    (dpi.is_finite() && dpi >= 1.0).then(|| dpi.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, Rgba};

    fn write_png(image: DynamicImage) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .expect("create temp file failed");
        image
            .save_with_format(file.path(), ImageFormat::Png)
            .expect("write png failed");
        file
    }

    #[test]
    fn reads_rgb_png_header() {
        let pixels = ImageBuffer::from_pixel(30, 20, Rgb([1, 2, 3]));
        let file = write_png(DynamicImage::ImageRgb8(pixels));
        let metadata = read_generic_metadata(file.path()).expect("metadata should be readable");
        assert_eq!(metadata.dimensions, Dimensions::new(30, 20));
        assert_eq!(metadata.bits_per_pixel, Some(24));
        assert_eq!(metadata.dpi, None);
    }

    #[test]
    fn reads_rgba_depth() {
        let pixels = ImageBuffer::from_pixel(2, 3, Rgba([1, 2, 3, 4]));
        let file = write_png(DynamicImage::ImageRgba8(pixels));
        let metadata = read_generic_metadata(file.path()).expect("metadata should be readable");
        assert_eq!(metadata.bits_per_pixel, Some(32));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let result = read_generic_metadata(Path::new("/no/such/image.png"));
        assert!(matches!(result, Err(PreviewError::SourceUnreadable(_))));
    }

    #[test]
    fn non_image_is_metadata_error() {
        let file = tempfile::NamedTempFile::new().expect("create temp file failed");
        std::fs::write(file.path(), b"plain text, not an image").expect("write failed");
        let result = read_generic_metadata(file.path());
        assert!(matches!(result, Err(PreviewError::Metadata(_))));
    }

    #[test]
    fn resolution_units_convert_to_dpi() {
        assert_eq!(dpi_from_resolution(300.0, 2), Some(300));
        assert_eq!(dpi_from_resolution(118.11, 3), Some(300));
        assert_eq!(dpi_from_resolution(72.0, 1), None);
        assert_eq!(dpi_from_resolution(0.0, 2), None);
    }
}
