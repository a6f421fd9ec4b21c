//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `PreviewServiceState` 作为宿主持有的长生命周期状态，替代全局单例函数。
//! 每个进行中的请求登记一个取消标志，其他线程可按请求 ID 取消；
//! 请求结束时由登记守卫自动注销。
//!
//! ## 实现思路
//!
//! 对外仅暴露少量稳定 API：
//! - `preview` / `thumbnail`：执行完整处理链路
//! - `cancel`：按请求 ID 取消
//! - `set_thumbnail_profile` / `get_thumbnail_profile`：切换或读取缩略图档位

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::host::PreviewHost;
use super::source::{PreparedImage, PreviewOutcome, PreviewRequest};
use super::{Dimensions, PreviewConfig, PreviewError, PreviewHandler, ThumbnailProfile};

type CancelFlags = Mutex<HashMap<String, Arc<AtomicBool>>>;

/// 预览服务状态。
pub struct PreviewServiceState {
    handler: PreviewHandler,
    cancel_flags: CancelFlags,
}

impl PreviewServiceState {
    /// 使用默认配置创建服务状态。
    ///
    /// # 示例
    /// ```rust
    /// use ql_image_preview::preview::PreviewServiceState;
    ///
    /// let service = PreviewServiceState::new()?;
    /// assert_eq!(service.get_thumbnail_profile()?, "balanced");
    /// # Ok::<(), ql_image_preview::preview::PreviewError>(())
    /// ```
    pub fn new() -> Result<Self, PreviewError> {
        Self::with_config(PreviewConfig::default())
    }

    /// 使用自定义配置创建服务状态。
    pub fn with_config(config: PreviewConfig) -> Result<Self, PreviewError> {
        let handler = PreviewHandler::new(config)?;
        Ok(Self {
            handler,
            cancel_flags: Mutex::new(HashMap::new()),
        })
    }

    pub fn handler(&self) -> &PreviewHandler {
        &self.handler
    }

    /// 执行预览链路，期间可通过 `cancel(request_id)` 取消。
    pub fn preview<H: PreviewHost + ?Sized>(
        &self,
        request_id: &str,
        request: &PreviewRequest,
        host: &mut H,
    ) -> Result<PreviewOutcome, PreviewError> {
        let registration = self.register(request_id)?;
        let mut host = CancellableHost {
            inner: host,
            flag: Arc::clone(&registration.flag),
        };
        self.handler.generate_preview(request, &mut host)
    }

    /// 执行缩略图链路，期间可通过 `cancel(request_id)` 取消。
    pub fn thumbnail<H: PreviewHost + ?Sized>(
        &self,
        request_id: &str,
        request: &PreviewRequest,
        bounding: Dimensions,
        host: &mut H,
    ) -> Result<PreviewOutcome, PreviewError> {
        let registration = self.register(request_id)?;
        let mut host = CancellableHost {
            inner: host,
            flag: Arc::clone(&registration.flag),
        };
        self.handler.generate_thumbnail(request, bounding, &mut host)
    }

    /// 取消进行中的请求；请求不存在时返回 `Ok(false)`。
    pub fn cancel(&self, request_id: &str) -> Result<bool, PreviewError> {
        let guard = self
            .cancel_flags
            .lock()
            .map_err(|_| PreviewError::ResourceLimit("取消标志锁已中毒".to_string()))?;

        if let Some(flag) = guard.get(request_id) {
            flag.store(true, Ordering::SeqCst);
            log::info!("🛑 已请求取消 - request_id={}", request_id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// 当前进行中的请求数量。
    pub fn in_flight(&self) -> Result<usize, PreviewError> {
        self.cancel_flags
            .lock()
            .map(|guard| guard.len())
            .map_err(|_| PreviewError::ResourceLimit("取消标志锁已中毒".to_string()))
    }

    /// 设置缩略图档位。
    ///
    /// # 示例
    /// ```rust
    /// use ql_image_preview::preview::PreviewServiceState;
    ///
    /// let service = PreviewServiceState::new()?;
    /// service.set_thumbnail_profile("speed")?;
    /// # Ok::<(), ql_image_preview::preview::PreviewError>(())
    /// ```
    pub fn set_thumbnail_profile(&self, profile: &str) -> Result<(), PreviewError> {
        let profile = ThumbnailProfile::from_str(profile)?;
        self.handler.set_thumbnail_profile(profile)
    }

    /// 获取当前生效缩略图档位（字符串）。
    pub fn get_thumbnail_profile(&self) -> Result<String, PreviewError> {
        let profile = self.handler.thumbnail_profile()?;
        Ok(profile.as_str().to_string())
    }

    fn register(&self, request_id: &str) -> Result<Registration<'_>, PreviewError> {
        let flag = Arc::new(AtomicBool::new(false));
        let mut guard = self
            .cancel_flags
            .lock()
            .map_err(|_| PreviewError::ResourceLimit("取消标志锁已中毒".to_string()))?;
        guard.insert(request_id.to_string(), Arc::clone(&flag));

        Ok(Registration {
            flags: &self.cancel_flags,
            request_id: request_id.to_string(),
            flag,
        })
    }
}

/// 请求登记守卫，离开作用域时注销取消标志。
struct Registration<'s> {
    flags: &'s CancelFlags,
    request_id: String,
    flag: Arc<AtomicBool>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let Ok(mut guard) = self.flags.lock() else {
            log::warn!("⚠️ 取消标志锁已中毒，无法注销 request_id={}", self.request_id);
            return;
        };
        // 同 ID 被新请求覆盖时保留新请求的标志
        if guard
            .get(&self.request_id)
            .is_some_and(|current| Arc::ptr_eq(current, &self.flag))
        {
            guard.remove(&self.request_id);
        }
    }
}

/// 将服务层取消标志叠加到宿主自身的取消信号上。
struct CancellableHost<'h, H: PreviewHost + ?Sized> {
    inner: &'h mut H,
    flag: Arc<AtomicBool>,
}

impl<H: PreviewHost + ?Sized> PreviewHost for CancellableHost<'_, H> {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.inner.is_cancelled()
    }

    fn present(&mut self, image: PreparedImage, title: Option<&str>) -> Result<(), PreviewError> {
        self.inner.present(image, title)
    }

    fn present_file_representation(&mut self, title: Option<&str>) -> Result<(), PreviewError> {
        self.inner.present_file_representation(title)
    }
}
