//! # 图片预览核心 — 命令行宿主
//!
//! 本文件仅负责日志初始化、参数解析与结果输出。
//! 解码出的像素不落盘，只以 JSON 报告尺寸、通道与标题。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use ql_image_preview::error::AppError;
use ql_image_preview::preview::{
    AlphaPosition, Dimensions, PreparedImage, PreviewConfig, PreviewError, PreviewHost,
    PreviewOutcome, PreviewRequest, PreviewServiceState,
};

#[derive(Parser, Debug)]
#[command(name = "ql-image-preview", about, long_about = None, version)]
struct Cli {
    /// 内容类型标识（UTI 或 MIME），缺省时按文件签名推断
    #[arg(long = "content-type", value_name = "TYPE", global = true)]
    content_type: Option<String>,

    /// 从 JSON 文件加载配置
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config_file: Option<PathBuf>,

    /// 缩略图档位（quality / balanced / speed）
    #[arg(long = "profile", value_name = "PROFILE", global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 原尺寸预览并输出标题
    Preview {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// 生成限定包围盒内的缩略图
    Thumbnail {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        /// 包围盒宽高
        #[arg(
            long = "max",
            num_args = 2,
            value_names = ["WIDTH", "HEIGHT"],
            default_values_t = [256u32, 256]
        )]
        max: Vec<u32>,
    },
}

/// 记录宿主收到的内容，最后统一输出。
#[derive(Debug, Default, Serialize)]
struct ConsoleHost {
    #[serde(skip_serializing_if = "Option::is_none")]
    presented: Option<PresentedImage>,
    file_representation: bool,
}

#[derive(Debug, Serialize)]
struct PresentedImage {
    width: u32,
    height: u32,
    channels: usize,
    alpha: AlphaPosition,
    stride: usize,
    bytes: usize,
}

impl PreviewHost for ConsoleHost {
    fn present(&mut self, image: PreparedImage, title: Option<&str>) -> Result<(), PreviewError> {
        log::debug!("宿主绘制 {} 标题={:?}", image.dimensions(), title);
        self.presented = Some(PresentedImage {
            width: image.width,
            height: image.height,
            channels: image.channels(),
            alpha: image.alpha_position(),
            stride: image.stride(),
            bytes: image.bytes.len(),
        });
        Ok(())
    }

    fn present_file_representation(&mut self, title: Option<&str>) -> Result<(), PreviewError> {
        log::debug!("宿主使用通用文件表示 标题={:?}", title);
        self.file_representation = true;
        Ok(())
    }
}

#[derive(Serialize)]
struct Report<'a> {
    outcome: &'a PreviewOutcome,
    host: &'a ConsoleHost,
}

#[derive(Serialize)]
struct ErrorReport<'a> {
    code: &'static str,
    error: &'a AppError,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ 处理失败 [{}]: {}", err.code(), err);
            let report = ErrorReport {
                code: err.code(),
                error: &err,
            };
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(ser_err) => log::error!("错误输出序列化失败: {}", ser_err),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = match &cli.config_file {
        Some(path) => PreviewConfig::from_json_file(path)?,
        None => PreviewConfig::default(),
    };
    let service = PreviewServiceState::with_config(config)?;
    if let Some(profile) = &cli.profile {
        service.set_thumbnail_profile(profile)?;
    }

    let mut host = ConsoleHost::default();
    let outcome = match cli.command {
        Command::Preview { path } => {
            let request = build_request(path, cli.content_type);
            service.preview("cli-preview", &request, &mut host)?
        }
        Command::Thumbnail { path, max } => {
            let request = build_request(path, cli.content_type);
            let bounding = match max.as_slice() {
                [width, height] => Dimensions::new(*width, *height),
                _ => {
                    let detail = format!("包围盒参数无效：{:?}", max);
                    return Err(PreviewError::InvalidDimensions(detail).into());
                }
            };
            service.thumbnail("cli-thumbnail", &request, bounding, &mut host)?
        }
    };

    let report = Report {
        outcome: &outcome,
        host: &host,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_request(path: PathBuf, content_type: Option<String>) -> PreviewRequest {
    let request = PreviewRequest::new(path);
    match content_type {
        Some(content_type) => request.with_content_type(content_type),
        None => request,
    }
}
