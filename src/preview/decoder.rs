//! # 帧解码模块
//!
//! ## 设计思路
//!
//! 将“位流 → RGB/RGBA 像素”的过程集中管理，并在完整解码前做像素上限控制，
//! 降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 输入若为裸帧负载（`[ALPH] + VP8/VP8L`），先包装为独立的静态容器
//! 2. 读取头部尺寸并按像素/内存上限快速拒绝
//! 3. 完整解码（`image` 的 WebP 解码器）
//! 4. 按 `alpha_expected` 转换为 RGBA 或 RGB
//! 5. 指定目标尺寸时内部重采样，输出尺寸与目标严格一致
//! 6. 校验字节长度；空输出一律视为失败
//!
//! 解码可重入，不缓存，不修改输入字节。

use std::borrow::Cow;

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage, RgbaImage};

use super::features::{
    self, ChunkReader, FOURCC_ALPH, FOURCC_VP8, FOURCC_VP8L, FOURCC_VP8X, VP8X_FLAG_ALPHA,
};
use super::source::{PixelLayout, PreparedImage};
use super::{Dimensions, PreviewConfig, PreviewError, PreviewHandler};

/// 解码选项。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// 为真时输出 RGBA，否则输出 RGB。
    pub alpha_expected: bool,
    /// 指定后输出尺寸严格等于该值。
    pub scale_to: Option<Dimensions>,
}

impl PreviewHandler {
    /// 以当前配置解码位流（整文件或单帧负载）。
    ///
    /// # 示例
    /// ```rust
    /// use ql_image_preview::preview::{DecodeOptions, PreviewConfig, PreviewError, PreviewHandler};
    ///
    /// let handler = PreviewHandler::new(PreviewConfig::default())?;
    /// let options = DecodeOptions { alpha_expected: false, scale_to: None };
    /// assert!(matches!(handler.decode(b"garbage", &options), Err(PreviewError::DecodeFailure(_))));
    /// # Ok::<(), PreviewError>(())
    /// ```
    pub fn decode(
        &self,
        bytes: &[u8],
        options: &DecodeOptions,
    ) -> Result<PreparedImage, PreviewError> {
        let config = self.config_snapshot()?;
        self.decode_bitstream(bytes, options, &config)
    }

    pub(crate) fn decode_bitstream(
        &self,
        bytes: &[u8],
        options: &DecodeOptions,
        config: &PreviewConfig,
    ) -> Result<PreparedImage, PreviewError> {
        if bytes.is_empty() {
            return Err(PreviewError::DecodeFailure("位流为空".to_string()));
        }

        let container = Self::wrap_as_still_container(bytes)?;

        let header = features::sniff(&container)
            .map_err(|e| PreviewError::DecodeFailure(format!("位流头无效：{}", e)))?;
        Self::validate_pixel_limits(config, header.width, header.height)?;
        Self::validate_decoded_memory_limits(config, header.width, header.height)?;
        if let Some(target) = options.scale_to {
            if target.is_empty() {
                return Err(PreviewError::DecodeFailure(format!("目标尺寸为空：{}", target)));
            }
            Self::validate_pixel_limits(config, target.width, target.height)?;
        }

        let decoded = image::load_from_memory_with_format(&container, ImageFormat::WebP)
            .map_err(|e| PreviewError::DecodeFailure(format!("WebP 解码失败：{}", e)))?;

        let (raw_width, raw_height) = decoded.dimensions();
        if raw_width == 0 || raw_height == 0 {
            return Err(PreviewError::DecodeFailure("解码结果没有像素".to_string()));
        }

        let layout = PixelLayout::from_alpha(options.alpha_expected);
        let pixels = match layout {
            PixelLayout::Rgb => decoded.into_rgb8().into_raw(),
            PixelLayout::Rgba => decoded.into_rgba8().into_raw(),
        };

        let (width, height, bytes) = match options.scale_to {
            Some(target) if target != Dimensions::new(raw_width, raw_height) => {
                let filter = config.thumbnail_profile.resize_filter();
                let resized = Self::resample(
                    pixels,
                    Dimensions::new(raw_width, raw_height),
                    target,
                    layout,
                    filter,
                )?;
                (target.width, target.height, resized)
            }
            _ => (raw_width, raw_height, pixels),
        };

        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(layout.channels()))
            .ok_or_else(|| PreviewError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))?;

        if bytes.is_empty() || bytes.len() != expected_len {
            return Err(PreviewError::DecodeFailure(format!(
                "解码后像素数据长度异常：{}（期望 {}）",
                bytes.len(),
                expected_len
            )));
        }

        log::info!(
            "✅ WebP 解码成功 - 原始尺寸: {}x{} 输出尺寸: {}x{} 通道: {}",
            raw_width,
            raw_height,
            width,
            height,
            layout.channels()
        );

        Ok(PreparedImage {
            width,
            height,
            layout,
            bytes,
        })
    }

    /// 完整 RIFF 文件原样返回；裸帧负载包装为独立静态容器。
    ///
    /// 含 `ALPH` 的有损帧需要 `VP8X` 头声明 alpha，其余只需简单格式。
    fn wrap_as_still_container(bytes: &[u8]) -> Result<Cow<'_, [u8]>, PreviewError> {
        if bytes.starts_with(b"RIFF") {
            return Ok(Cow::Borrowed(bytes));
        }

        let mut chunks = ChunkReader::new(bytes, 0);
        let mut alpha = None;
        let mut image = None;

        while let Some(chunk) = chunks
            .next_chunk()
            .map_err(|e| PreviewError::DecodeFailure(format!("帧数据无效：{}", e)))?
        {
            match &chunk.fourcc {
                FOURCC_ALPH if alpha.is_none() => alpha = Some(chunk),
                FOURCC_VP8 | FOURCC_VP8L => {
                    image = Some(chunk);
                    break;
                }
                _ => {}
            }
        }

        let image = image.ok_or_else(|| PreviewError::DecodeFailure("帧数据缺少图像块".to_string()))?;

        let mut body = Vec::with_capacity(bytes.len() + 32);
        match alpha {
            Some(alpha) if &image.fourcc == FOURCC_VP8 => {
                let (width, height) = features::parse_vp8_header(image.payload)
                    .map_err(|e| PreviewError::DecodeFailure(format!("帧数据无效：{}", e)))?;
                push_chunk(&mut body, FOURCC_VP8X, &vp8x_payload(VP8X_FLAG_ALPHA, width, height));
                push_chunk(&mut body, FOURCC_ALPH, alpha.payload);
            }
            _ => {}
        }
        push_chunk(&mut body, &image.fourcc, image.payload);

        let riff_size = u32::try_from(body.len() + 4)
            .map_err(|_| PreviewError::DecodeFailure("帧数据过大".to_string()))?;

        let mut container = Vec::with_capacity(body.len() + 12);
        container.extend_from_slice(b"RIFF");
        container.extend_from_slice(&riff_size.to_le_bytes());
        container.extend_from_slice(b"WEBP");
        container.extend_from_slice(&body);

        Ok(Cow::Owned(container))
    }

    /// 校验像素数量是否超过配置上限。
    fn validate_pixel_limits(
        config: &PreviewConfig,
        width: u32,
        height: u32,
    ) -> Result<(), PreviewError> {
        let pixels = u64::from(width) * u64::from(height);

        if pixels > config.max_decoded_pixels {
            return Err(PreviewError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        config: &PreviewConfig,
        width: u32,
        height: u32,
    ) -> Result<(), PreviewError> {
        let estimated = (u64::from(width) * u64::from(height))
            .checked_mul(4)
            .ok_or_else(|| PreviewError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(PreviewError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    /// 重采样到目标尺寸，`fast_image_resize` 失败时回退 `image::resize_exact`。
    fn resample(
        pixels: Vec<u8>,
        source: Dimensions,
        target: Dimensions,
        layout: PixelLayout,
        filter: FilterType,
    ) -> Result<Vec<u8>, PreviewError> {
        log::debug!("🧩 缩略图重采样：{} -> {}（filter={:?}）", source, target, filter);

        match Self::resize_with_fast_image_resize(&pixels, source, target, layout, filter) {
            Ok(resized) => Ok(resized),
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 重采样失败，回退 image::resize_exact：{}", err);
                let image = match layout {
                    PixelLayout::Rgb => RgbImage::from_raw(source.width, source.height, pixels)
                        .map(DynamicImage::ImageRgb8),
                    PixelLayout::Rgba => RgbaImage::from_raw(source.width, source.height, pixels)
                        .map(DynamicImage::ImageRgba8),
                }
                .ok_or_else(|| PreviewError::DecodeFailure("源像素缓冲长度异常".to_string()))?;

                let resized = image.resize_exact(target.width, target.height, filter);
                Ok(match layout {
                    PixelLayout::Rgb => resized.into_rgb8().into_raw(),
                    PixelLayout::Rgba => resized.into_rgba8().into_raw(),
                })
            }
        }
    }

    fn resize_with_fast_image_resize(
        pixels: &[u8],
        source: Dimensions,
        target: Dimensions,
        layout: PixelLayout,
        filter: FilterType,
    ) -> Result<Vec<u8>, PreviewError> {
        let pixel_type = match layout {
            PixelLayout::Rgb => fr::PixelType::U8x3,
            PixelLayout::Rgba => fr::PixelType::U8x4,
        };

        let src_image = fr::images::Image::from_vec_u8(
            source.width,
            source.height,
            pixels.to_vec(),
            pixel_type,
        )
        .map_err(|e| PreviewError::DecodeFailure(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image = fr::images::Image::new(target.width, target.height, pixel_type);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(Self::to_fast_filter(filter)));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| PreviewError::DecodeFailure(format!("fast_image_resize 执行失败：{}", e)))?;

        Ok(dst_image.into_vec())
    }

    fn to_fast_filter(filter: FilterType) -> fr::FilterType {
        match filter {
            FilterType::Nearest => fr::FilterType::Box,
            FilterType::Triangle => fr::FilterType::Bilinear,
            FilterType::CatmullRom => fr::FilterType::CatmullRom,
            FilterType::Gaussian => fr::FilterType::Mitchell,
            FilterType::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }
}

fn push_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

fn vp8x_payload(flags: u8, width: u32, height: u32) -> [u8; 10] {
    let w = width - 1;
    let h = height - 1;
    [
        flags,
        0,
        0,
        0,
        w as u8,
        (w >> 8) as u8,
        (w >> 16) as u8,
        h as u8,
        (h >> 8) as u8,
        (h >> 16) as u8,
    ]
}
