//! # 宿主接口
//!
//! 宿主负责最终的绘制与结果传递，本库只负责产出像素与标题。
//! 取消信号同样由宿主提供，流水线在每个自然停顿点轮询。

use super::source::PreparedImage;
use super::PreviewError;

/// 预览/缩略图宿主。
pub trait PreviewHost {
    /// 宿主是否已放弃本次请求。
    fn is_cancelled(&self) -> bool {
        false
    }

    /// 接收解码后的像素并绘制到宿主提供、尺寸等于像素尺寸的画布上。
    ///
    /// 像素所有权随调用转移给宿主。
    fn present(&mut self, image: PreparedImage, title: Option<&str>) -> Result<(), PreviewError>;

    /// 不解码，改用宿主自己的通用文件表示。
    fn present_file_representation(&mut self, title: Option<&str>) -> Result<(), PreviewError>;
}

impl<H: PreviewHost + ?Sized> PreviewHost for &mut H {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }

    fn present(&mut self, image: PreparedImage, title: Option<&str>) -> Result<(), PreviewError> {
        (**self).present(image, title)
    }

    fn present_file_representation(&mut self, title: Option<&str>) -> Result<(), PreviewError> {
        (**self).present_file_representation(title)
    }
}

/// 取消检查点：已取消时返回 `Cancelled`，携带所处阶段。
pub(crate) fn ensure_not_cancelled<H: PreviewHost + ?Sized>(
    host: &H,
    stage: &str,
) -> Result<(), PreviewError> {
    if host.is_cancelled() {
        log::info!("🛑 请求已取消 - 阶段: {}", stage);
        return Err(PreviewError::Cancelled(format!("在 {} 阶段取消", stage)));
    }
    Ok(())
}
