//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `PreviewHandler` 只负责流程编排与配置管理，不直接与具体宿主绑定。
//! 处理链路固定为：
//! 1. 读取配置快照
//! 2. 判定内容类型（非 WebP 走通用元数据链路）
//! 3. 加载原始字节（超过体积上限时回退通用文件表示）
//! 4. 探测位流特征，动画取第 1 帧，解码为 RGB/RGBA
//! 5. 预览：拼装标题后交给宿主；缩略图：解码前先算好缩放尺寸，不带标题
//!
//! 动画缩略图的目标尺寸由画布尺寸算出，再把第 1 帧重采样到该尺寸。
//! 第 1 帧小于画布且宽高比不同时，输出会被拉伸到画布的宽高比。
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<PreviewConfig>>` 支持运行时切换缩略图档位。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 记录 `load/decode/present/total` 阶段耗时，便于性能诊断。
//! - 中间结果均为局部所有权值，任意 `?` 提前返回都会释放。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::decoder::DecodeOptions;
use super::demux::WebpDemuxer;
use super::features::{self, CompressionMode};
use super::format::ContentType;
use super::host::{ensure_not_cancelled, PreviewHost};
use super::label::{format_file_size, generic_title, webp_title};
use super::loader::LoadedSource;
use super::metadata::read_generic_metadata;
use super::scale::scale_to_fit;
use super::source::{PreparedImage, PreviewOutcome, PreviewRequest};
use super::{Dimensions, PreviewConfig, PreviewError, ThumbnailProfile};

/// 预览处理器。
///
/// 封装配置状态，并编排各子模块实现完整流程。
pub struct PreviewHandler {
    config: Arc<RwLock<PreviewConfig>>,
}

/// 代表帧解码结果。
struct Representative {
    image: PreparedImage,
    compression: CompressionMode,
    frame_count: Option<u32>,
}

impl PreviewHandler {
    /// 根据初始配置创建处理器。
    ///
    /// # 示例
    /// ```rust
    /// use ql_image_preview::preview::{PreviewConfig, PreviewHandler};
    ///
    /// let handler = PreviewHandler::new(PreviewConfig::default())?;
    /// # Ok::<(), ql_image_preview::preview::PreviewError>(())
    /// ```
    pub fn new(config: PreviewConfig) -> Result<Self, PreviewError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 获取配置快照，保证单次请求链路使用一致参数。
    pub(crate) fn config_snapshot(&self) -> Result<PreviewConfig, PreviewError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| PreviewError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    /// 切换缩略图档位。
    ///
    /// # 示例
    /// ```rust
    /// use ql_image_preview::preview::{PreviewConfig, PreviewHandler, ThumbnailProfile};
    ///
    /// let handler = PreviewHandler::new(PreviewConfig::default())?;
    /// handler.set_thumbnail_profile(ThumbnailProfile::Speed)?;
    /// assert_eq!(handler.thumbnail_profile()?, ThumbnailProfile::Speed);
    /// # Ok::<(), ql_image_preview::preview::PreviewError>(())
    /// ```
    pub fn set_thumbnail_profile(&self, profile: ThumbnailProfile) -> Result<(), PreviewError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| PreviewError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        config.thumbnail_profile = profile;

        log::info!(
            "⚙️ 已切换缩略图档位：{}（filter={:?}）",
            profile.as_str(),
            profile.resize_filter()
        );

        Ok(())
    }

    pub fn thumbnail_profile(&self) -> Result<ThumbnailProfile, PreviewError> {
        let config = self
            .config
            .read()
            .map_err(|_| PreviewError::ResourceLimit("配置读取锁已中毒".to_string()))?;
        Ok(config.thumbnail_profile)
    }

    /// 预览主入口：原尺寸解码并附带标题。
    pub fn generate_preview<H: PreviewHost + ?Sized>(
        &self,
        request: &PreviewRequest,
        host: &mut H,
    ) -> Result<PreviewOutcome, PreviewError> {
        let config = self.config_snapshot()?;
        let total_start = Instant::now();

        if !Self::resolve_content_type(request)?.is_webp() {
            return self.generate_generic_preview(request, host);
        }

        let load_start = Instant::now();
        let raw = match self.load_from_file(&request.path, &config, &*host)? {
            LoadedSource::Loaded(raw) => raw,
            LoadedSource::Oversize { byte_len } => {
                log::info!(
                    "📦 {} 超过体积上限（{}），使用通用文件表示",
                    request.file_name(),
                    format_file_size(byte_len)
                );
                return Self::fall_back_to_file_representation(host, None);
            }
        };
        let load_elapsed = load_start.elapsed();

        let decode_start = Instant::now();
        let decoded = self.decode_representative(&raw.bytes, None, &config, &*host)?;
        let decode_elapsed = decode_start.elapsed();

        let dimensions = decoded.image.dimensions();
        let title = webp_title(
            &raw.file_name,
            dimensions,
            Some(raw.byte_len()),
            decoded.compression,
            decoded.frame_count,
        );
        drop(raw);

        ensure_not_cancelled(&*host, "present")?;
        let present_start = Instant::now();
        host.present(decoded.image, Some(&title))?;
        let present_elapsed = present_start.elapsed();

        log::info!(
            "✅ 预览生成完成 - load={}ms decode={}ms present={}ms total={}ms",
            load_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            present_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(PreviewOutcome::Rendered {
            width: dimensions.width,
            height: dimensions.height,
            title: Some(title),
        })
    }

    /// 缩略图主入口：按包围盒等比缩放，不带标题。
    pub fn generate_thumbnail<H: PreviewHost + ?Sized>(
        &self,
        request: &PreviewRequest,
        bounding: Dimensions,
        host: &mut H,
    ) -> Result<PreviewOutcome, PreviewError> {
        let config = self.config_snapshot()?;
        let total_start = Instant::now();

        if !Self::resolve_content_type(request)?.is_webp() {
            log::debug!("非 WebP 内容，缩略图交由宿主处理：{}", request.path.display());
            return Self::fall_back_to_file_representation(host, None);
        }

        let load_start = Instant::now();
        let raw = match self.load_from_file(&request.path, &config, &*host)? {
            LoadedSource::Loaded(raw) => raw,
            LoadedSource::Oversize { byte_len } => {
                log::info!(
                    "📦 {} 超过体积上限（{}），使用通用文件表示",
                    request.file_name(),
                    format_file_size(byte_len)
                );
                return Self::fall_back_to_file_representation(host, None);
            }
        };
        let load_elapsed = load_start.elapsed();

        let decode_start = Instant::now();
        let decoded = self.decode_representative(&raw.bytes, Some(bounding), &config, &*host)?;
        let decode_elapsed = decode_start.elapsed();
        drop(raw);

        let dimensions = decoded.image.dimensions();
        ensure_not_cancelled(&*host, "present")?;
        let present_start = Instant::now();
        host.present(decoded.image, None)?;
        let present_elapsed = present_start.elapsed();

        log::info!(
            "✅ 缩略图生成完成 - {} load={}ms decode={}ms present={}ms total={}ms",
            dimensions,
            load_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            present_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(PreviewOutcome::Rendered {
            width: dimensions.width,
            height: dimensions.height,
            title: None,
        })
    }

    /// 宿主给出类型标识时以其为准，否则读取文件签名。
    fn resolve_content_type(request: &PreviewRequest) -> Result<ContentType, PreviewError> {
        match request.content_type.as_deref() {
            Some(identifier) => Ok(ContentType::from_identifier(identifier)),
            None => ContentType::from_path(&request.path),
        }
    }

    /// 探测特征并解码代表帧（动画取第 1 帧，静态图取整体）。
    fn decode_representative<H: PreviewHost + ?Sized>(
        &self,
        bytes: &[u8],
        bounding: Option<Dimensions>,
        config: &PreviewConfig,
        host: &H,
    ) -> Result<Representative, PreviewError> {
        let features = features::sniff(bytes)?;
        let native = Dimensions::new(features.width, features.height);
        log::debug!(
            "🔍 位流特征 - {} alpha={} animated={} mode={:?}",
            native,
            features.has_alpha,
            features.has_animation,
            features.compression
        );

        let scale_to = bounding.map(|bounding| scale_to_fit(native, bounding)).transpose()?;
        let options = DecodeOptions {
            alpha_expected: features.has_alpha,
            scale_to,
        };

        ensure_not_cancelled(host, "decode")?;

        let (image, frame_count) = if features.has_animation {
            let demuxer = WebpDemuxer::open(bytes)?;
            if demuxer.frame_count() == 0 {
                return Err(PreviewError::FrameNotFound("动画不含任何帧".to_string()));
            }

            let frame = demuxer
                .frames()
                .next()
                .unwrap_or_else(|| Err(PreviewError::FrameNotFound("第 1 帧不存在".to_string())))?;
            log::debug!(
                "🎞️ 使用第 {} 帧（{}，{} 字节）作为代表帧，共 {} 帧",
                frame.index,
                frame.dimensions(),
                frame.len(),
                demuxer.frame_count()
            );

            let image = self.decode_bitstream(frame.payload, &options, config)?;
            (image, Some(demuxer.frame_count()))
        } else {
            (self.decode_bitstream(bytes, &options, config)?, None)
        };

        ensure_not_cancelled(host, "decode")?;

        Ok(Representative {
            image,
            compression: features.compression,
            frame_count,
        })
    }

    /// 非 WebP：只读元数据，拼装标题后交给宿主的通用文件表示。
    ///
    /// 元数据不可用时仍请求通用文件表示（无标题），然后上报错误。
    fn generate_generic_preview<H: PreviewHost + ?Sized>(
        &self,
        request: &PreviewRequest,
        host: &mut H,
    ) -> Result<PreviewOutcome, PreviewError> {
        ensure_not_cancelled(&*host, "metadata")?;

        let metadata = match read_generic_metadata(&request.path) {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("⚠️ 通用元数据不可用，回退无标题文件表示：{}", err);
                ensure_not_cancelled(&*host, "present")?;
                host.present_file_representation(None)?;
                return Err(err);
            }
        };

        let file_size = std::fs::metadata(&request.path).ok().map(|meta| meta.len());
        let title = generic_title(
            &request.file_name(),
            metadata.dimensions,
            metadata.dpi,
            metadata.bits_per_pixel,
            file_size,
        );

        Self::fall_back_to_file_representation(host, Some(title))
    }

    fn fall_back_to_file_representation<H: PreviewHost + ?Sized>(
        host: &mut H,
        title: Option<String>,
    ) -> Result<PreviewOutcome, PreviewError> {
        ensure_not_cancelled(&*host, "present")?;
        host.present_file_representation(title.as_deref())?;
        Ok(PreviewOutcome::FileRepresentation { title })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::testing::*;
    use std::io::Write;

    #[derive(Default)]
    struct RecordingHost {
        cancelled: bool,
        presented: Vec<(Dimensions, usize, Option<String>)>,
        file_representations: Vec<Option<String>>,
    }

    impl PreviewHost for RecordingHost {
        fn is_cancelled(&self) -> bool {
            self.cancelled
        }

        fn present(
            &mut self,
            image: PreparedImage,
            title: Option<&str>,
        ) -> Result<(), PreviewError> {
            self.presented
                .push((image.dimensions(), image.channels(), title.map(str::to_string)));
            Ok(())
        }

        fn present_file_representation(&mut self, title: Option<&str>) -> Result<(), PreviewError> {
            self.file_representations.push(title.map(str::to_string));
            Ok(())
        }
    }

    fn handler() -> PreviewHandler {
        PreviewHandler::new(PreviewConfig::default()).expect("handler init failed")
    }

    fn webp_file(name: &str, bytes: &[u8]) -> (tempfile::TempDir, PreviewRequest) {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create file failed");
        file.write_all(bytes).expect("write file failed");
        (dir, PreviewRequest::new(path).with_content_type("public.webp"))
    }

    #[test]
    fn still_preview_presents_pixels_with_title() {
        let data = encode_lossless_rgb(40, 30);
        let (_dir, request) = webp_file("cat.webp", &data);
        let mut host = RecordingHost::default();

        let outcome = handler()
            .generate_preview(&request, &mut host)
            .expect("preview should succeed");

        let expected = format!(
            "cat.webp (40x30 - {} - Lossless)",
            crate::preview::format_file_size(data.len() as u64)
        );
        assert_eq!(
            outcome,
            PreviewOutcome::Rendered {
                width: 40,
                height: 30,
                title: Some(expected.clone()),
            }
        );
        assert_eq!(host.presented, vec![(Dimensions::new(40, 30), 3, Some(expected))]);
        assert!(host.file_representations.is_empty());
    }

    #[test]
    fn animated_preview_uses_first_frame_and_counts_frames() {
        let data = animated_webp(
            (24, 24),
            true,
            &[
                (8, 6, encode_lossless_rgba(8, 6)),
                (24, 24, encode_lossless_rgba(24, 24)),
                (24, 24, encode_lossless_rgba(24, 24)),
            ],
        );
        let (_dir, request) = webp_file("dance.webp", &data);
        let mut host = RecordingHost::default();

        let outcome = handler()
            .generate_preview(&request, &mut host)
            .expect("preview should succeed");

        let (dimensions, channels, title) = &host.presented[0];
        assert_eq!(*dimensions, Dimensions::new(8, 6));
        assert_eq!(*channels, 4);
        let title = title.as_deref().expect("title should be present");
        assert!(title.starts_with("dance.webp (8x6 - "));
        assert!(title.ends_with(" - Animated (3 Frames))"));
        assert!(!title.contains("Lossless"));
        assert!(matches!(outcome, PreviewOutcome::Rendered { width: 8, height: 6, .. }));
    }

    #[test]
    fn zero_frame_animation_is_frame_not_found() {
        let body = [
            chunk(b"VP8X", &vp8x_payload(0x02, 10, 10)),
            chunk(b"ANIM", &anim_payload(0)),
        ]
        .concat();
        let (_dir, request) = webp_file("empty.webp", &riff(&body));
        let mut host = RecordingHost::default();

        let result = handler().generate_preview(&request, &mut host);
        assert!(matches!(result, Err(PreviewError::FrameNotFound(_))));
        assert!(host.presented.is_empty());
    }

    #[test]
    fn invalid_bitstream_presents_nothing() {
        let (_dir, request) =
            webp_file("broken.webp", b"RIFF\x04\x00\x00\x00WEBPnothing useful here");
        let mut host = RecordingHost::default();

        let result = handler().generate_preview(&request, &mut host);
        assert!(matches!(result, Err(PreviewError::InvalidBitstream(_))));
        assert!(host.presented.is_empty());
        assert!(host.file_representations.is_empty());
    }

    #[test]
    fn oversize_source_falls_back_without_decoding() {
        let mut config = PreviewConfig::default();
        config.max_file_size = 16;
        let handler = PreviewHandler::new(config).expect("handler init failed");
        let (_dir, request) = webp_file("huge.webp", &encode_lossless_rgb(20, 20));
        let mut host = RecordingHost::default();

        let outcome = handler
            .generate_preview(&request, &mut host)
            .expect("oversize is not an error");

        assert_eq!(outcome, PreviewOutcome::FileRepresentation { title: None });
        assert_eq!(host.file_representations, vec![None]);
        assert!(host.presented.is_empty());
    }

    #[test]
    fn cancelled_request_never_presents() {
        let (_dir, request) = webp_file("cat.webp", &encode_lossless_rgb(4, 4));
        let mut host = RecordingHost {
            cancelled: true,
            ..RecordingHost::default()
        };

        let result = handler().generate_preview(&request, &mut host);
        assert!(matches!(result, Err(PreviewError::Cancelled(_))));
        assert!(host.presented.is_empty());
        assert!(host.file_representations.is_empty());
    }

    #[test]
    fn missing_source_is_unreadable() {
        let request =
            PreviewRequest::new("/no/such/dir/cat.webp").with_content_type("org.webmproject.webp");
        let mut host = RecordingHost::default();
        let result = handler().generate_preview(&request, &mut host);
        assert!(matches!(result, Err(PreviewError::SourceUnreadable(_))));
    }

    #[test]
    fn thumbnail_is_scaled_and_untitled() {
        let (_dir, request) = webp_file("wide.webp", &encode_lossless_rgb(64, 36));
        let mut host = RecordingHost::default();

        let outcome = handler()
            .generate_thumbnail(&request, Dimensions::new(32, 32), &mut host)
            .expect("thumbnail should succeed");

        assert_eq!(
            outcome,
            PreviewOutcome::Rendered {
                width: 32,
                height: 18,
                title: None,
            }
        );
        assert_eq!(host.presented, vec![(Dimensions::new(32, 18), 3, None)]);
    }

    #[test]
    fn thumbnail_with_zero_box_is_invalid_dimensions() {
        let (_dir, request) = webp_file("wide.webp", &encode_lossless_rgb(8, 8));
        let mut host = RecordingHost::default();
        let result = handler().generate_thumbnail(&request, Dimensions::new(0, 10), &mut host);
        assert!(matches!(result, Err(PreviewError::InvalidDimensions(_))));
    }

    #[test]
    fn content_type_is_inferred_from_signature() {
        let data = encode_lossless_rgb(5, 5);
        let (_dir, request) = webp_file("noext", &data);
        let request = PreviewRequest::new(request.path.clone());
        let mut host = RecordingHost::default();

        let outcome = handler()
            .generate_preview(&request, &mut host)
            .expect("preview should succeed");
        assert!(matches!(outcome, PreviewOutcome::Rendered { width: 5, height: 5, .. }));
    }

    #[test]
    fn generic_format_gets_titled_file_representation() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let path = dir.path().join("photo.png");
        image::RgbImage::from_pixel(12, 7, image::Rgb([9, 9, 9]))
            .save(&path)
            .expect("write png failed");
        let request = PreviewRequest::new(&path).with_content_type("public.png");
        let mut host = RecordingHost::default();

        let outcome = handler()
            .generate_preview(&request, &mut host)
            .expect("generic preview should succeed");

        let PreviewOutcome::FileRepresentation { title: Some(title) } = outcome else {
            panic!("expected titled file representation");
        };
        assert!(title.starts_with("photo.png (12x7 - 24 BPP - "));
        assert_eq!(host.file_representations, vec![Some(title)]);
    }

    #[test]
    fn generic_metadata_failure_still_requests_file_representation() {
        let (_dir, request) = webp_file("notes.txt", b"just some words");
        let request = request.with_content_type("public.plain-text");
        let mut host = RecordingHost::default();

        let result = handler().generate_preview(&request, &mut host);
        assert!(matches!(result, Err(PreviewError::Metadata(_))));
        assert_eq!(host.file_representations, vec![None]);
    }

    #[test]
    fn cancelled_generic_request_skips_metadata() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let path = dir.path().join("photo.png");
        image::RgbImage::from_pixel(3, 3, image::Rgb([1, 2, 3]))
            .save(&path)
            .expect("write png failed");
        let request = PreviewRequest::new(&path).with_content_type("public.png");
        let mut host = RecordingHost {
            cancelled: true,
            ..RecordingHost::default()
        };

        let err = handler()
            .generate_preview(&request, &mut host)
            .expect_err("cancelled request should fail");
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("metadata"));
        assert!(host.file_representations.is_empty());
    }

    #[test]
    fn lossy_animated_thumbnail_keeps_alpha() {
        let (_dir, request) = webp_file("spin.webp", LOSSY_ANIMATION);
        let mut host = RecordingHost::default();

        let outcome = handler()
            .generate_thumbnail(&request, Dimensions::new(8, 8), &mut host)
            .expect("thumbnail should succeed");

        assert_eq!(
            outcome,
            PreviewOutcome::Rendered {
                width: 8,
                height: 8,
                title: None,
            }
        );
        assert_eq!(host.presented, vec![(Dimensions::new(8, 8), 4, None)]);
    }

    #[test]
    fn profile_switch_is_visible_to_next_snapshot() {
        let handler = handler();
        handler
            .set_thumbnail_profile(ThumbnailProfile::Quality)
            .expect("set profile failed");
        assert_eq!(
            handler.thumbnail_profile().expect("get profile failed"),
            ThumbnailProfile::Quality
        );
        assert_eq!(
            handler.config_snapshot().expect("snapshot failed").thumbnail_profile,
            ThumbnailProfile::Quality
        );
    }
}
