//! 测试用 WebP 位流构造工具。

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, Rgba};
use std::io::Cursor;

use super::features::{VP8X_FLAG_ALPHA, VP8X_FLAG_ANIMATION};

/// 简单格式有损静态图（15x7，仅 `VP8 ` 块）。
pub(crate) const LOSSY_RGB: &[u8] = include_bytes!("../../tests/fixtures/lossy.webp");

/// 扩展格式有损静态图（16x16，`VP8X` + `ALPH` + `VP8 `，四角透明）。
pub(crate) const LOSSY_ALPHA: &[u8] = include_bytes!("../../tests/fixtures/lossy_alpha.webp");

/// 有损动画（画布 16x16）：第 1 帧 16x16 为 `ALPH` + `VP8 `，第 2 帧 15x7 仅 `VP8 `。
pub(crate) const LOSSY_ANIMATION: &[u8] = include_bytes!("../../tests/fixtures/lossy_anim.webp");

pub(crate) fn chunk(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len() + 1);
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

pub(crate) fn riff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + body.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(body);
    out
}

fn u24(value: u32) -> [u8; 3] {
    [value as u8, (value >> 8) as u8, (value >> 16) as u8]
}

/// 仅含关键帧头的 VP8 负载（可探测，不可解码）。
pub(crate) fn vp8_header(width: u16, height: u16) -> Vec<u8> {
    let mut out = vec![0x10, 0x00, 0x00, 0x9d, 0x01, 0x2a];
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out
}

/// 仅含头部的 VP8L 负载（可探测，不可解码）。
pub(crate) fn vp8l_header(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    let bits = (width - 1) | ((height - 1) << 14) | (u32::from(alpha) << 28);
    let mut out = vec![0x2f];
    out.extend_from_slice(&bits.to_le_bytes());
    out
}

pub(crate) fn vp8x_payload(flags: u8, width: u32, height: u32) -> Vec<u8> {
    let mut out = vec![flags, 0, 0, 0];
    out.extend_from_slice(&u24(width - 1));
    out.extend_from_slice(&u24(height - 1));
    out
}

pub(crate) fn anim_payload(loop_count: u16) -> Vec<u8> {
    let mut out = vec![0xff, 0xff, 0xff, 0xff];
    out.extend_from_slice(&loop_count.to_le_bytes());
    out
}

pub(crate) fn anmf_payload(
    x_offset: u32,
    y_offset: u32,
    width: u32,
    height: u32,
    duration: u32,
    frame_data: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + frame_data.len());
    out.extend_from_slice(&u24(x_offset / 2));
    out.extend_from_slice(&u24(y_offset / 2));
    out.extend_from_slice(&u24(width - 1));
    out.extend_from_slice(&u24(height - 1));
    out.extend_from_slice(&u24(duration));
    out.push(0);
    out.extend_from_slice(frame_data);
    out
}

/// 用 image 的无损编码器生成 RGB 静态 WebP。
pub(crate) fn encode_lossless_rgb(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8])
    });
    encode(DynamicImage::ImageRgb8(img))
}

/// 生成带半透明像素的 RGBA 静态 WebP。
pub(crate) fn encode_lossless_rgba(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x % 255) as u8, (y % 255) as u8, 90, ((x * 7 + y) % 200) as u8])
    });
    encode(DynamicImage::ImageRgba8(img))
}

fn encode(image: DynamicImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::WebP)
        .expect("failed to encode test webp");
    cursor.into_inner()
}

/// 取出静态 WebP 中 RIFF 头之后的块序列（即 `VP8L` 块）。
pub(crate) fn image_chunks(still: &[u8]) -> Vec<u8> {
    still[12..].to_vec()
}

/// 由若干静态 WebP 拼装动画容器，每帧尺寸取自其自身位流。
pub(crate) fn animated_webp(
    canvas: (u32, u32),
    alpha: bool,
    frames: &[(u32, u32, Vec<u8>)],
) -> Vec<u8> {
    let flags = VP8X_FLAG_ANIMATION | if alpha { VP8X_FLAG_ALPHA } else { 0 };
    let mut body = chunk(b"VP8X", &vp8x_payload(flags, canvas.0, canvas.1));
    body.extend(chunk(b"ANIM", &anim_payload(0)));
    for (width, height, still) in frames {
        let payload = anmf_payload(0, 0, *width, *height, 100, &image_chunks(still));
        body.extend(chunk(b"ANMF", &payload));
    }
    riff(&body)
}
