//! 无头浏览器渲染截图。
//!
//! - `PageRenderer`：一次会话内的导航 / 等待元素 / 全页截图 / 关闭
//! - `RendererLauncher`：启动一个全新的渲染实例（每个任务一个，不复用）
//! - `RendererSession`：作用域守卫，任何退出路径都会关闭浏览器
//! - `chrome`：基于 chromiumoxide 的实现
//! - `crop`：按元素边框裁剪并编码落盘

pub mod chrome;
pub mod crop;

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("navigate to {url} failed: {reason}")]
    Navigate { url: String, reason: String },
    #[error("element #{element_id} not found within {timeout:?}")]
    ElementTimeout {
        element_id: String,
        timeout: Duration,
    },
    #[error("screenshot failed: {0}")]
    Capture(String),
    #[error("element box is outside the screenshot")]
    EmptyCrop,
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// 元素在整页坐标系下的边框（CSS 像素）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

pub trait PageRenderer {
    fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    fn wait_for_element(
        &mut self,
        element_id: &str,
        timeout: Duration,
    ) -> Result<ElementBox, RenderError>;

    /// 整页 PNG 截图。
    fn full_page_screenshot(&mut self) -> Result<Vec<u8>, RenderError>;

    fn close(&mut self) -> Result<(), RenderError>;
}

pub trait RendererLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn PageRenderer>, RenderError>;
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub launch_attempts: u32,
    pub launch_backoff: Duration,
    pub element_timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            launch_attempts: 5,
            launch_backoff: Duration::from_secs(2),
            element_timeout: Duration::from_secs(60),
        }
    }
}

/// 持有一个渲染实例；`release` 或 Drop 时关闭。
pub struct RendererSession {
    renderer: Option<Box<dyn PageRenderer>>,
}

impl RendererSession {
    pub fn new(renderer: Box<dyn PageRenderer>) -> Self {
        Self {
            renderer: Some(renderer),
        }
    }

    pub fn renderer(&mut self) -> Option<&mut (dyn PageRenderer + 'static)> {
        self.renderer.as_deref_mut()
    }

    pub fn release(mut self) -> Result<(), RenderError> {
        match self.renderer.take() {
            Some(mut renderer) => renderer.close(),
            None => Ok(()),
        }
    }
}

impl Drop for RendererSession {
    fn drop(&mut self) {
        if let Some(mut renderer) = self.renderer.take()
            && let Err(e) = renderer.close()
        {
            warn!("关闭浏览器失败: {}", e);
        }
    }
}

/// 启动渲染实例，失败时按固定间隔重试，最多 `attempts` 次。
pub fn acquire(
    launcher: &dyn RendererLauncher,
    attempts: u32,
    backoff: Duration,
) -> Result<RendererSession, RenderError> {
    let attempts = attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match launcher.launch() {
            Ok(renderer) => return Ok(RendererSession::new(renderer)),
            Err(e) => {
                warn!("浏览器启动失败（第 {}/{} 次）: {}", attempt, attempts, e);
                last_error = Some(e);
                if attempt < attempts {
                    std::thread::sleep(backoff);
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| RenderError::Launch("no launch attempted".to_string())))
}

/// 渲染 `url`，截取 `#element_id` 所在区域并保存到 `destination`。
pub fn capture_element(
    launcher: &dyn RendererLauncher,
    options: &CaptureOptions,
    url: &str,
    element_id: &str,
    destination: &Path,
) -> Result<(), RenderError> {
    let mut session = acquire(launcher, options.launch_attempts, options.launch_backoff)?;

    let result = match session.renderer() {
        Some(renderer) => capture_with(renderer, options, url, element_id, destination),
        None => Err(RenderError::Launch("renderer already released".to_string())),
    };

    if let Err(e) = session.release() {
        warn!("关闭浏览器失败: {}", e);
    }
    result
}

fn capture_with(
    renderer: &mut dyn PageRenderer,
    options: &CaptureOptions,
    url: &str,
    element_id: &str,
    destination: &Path,
) -> Result<(), RenderError> {
    renderer.navigate(url)?;
    let element = renderer.wait_for_element(element_id, options.element_timeout)?;
    debug!("#{} at {:?}", element_id, element);
    let png = renderer.full_page_screenshot()?;
    crop::crop_and_save(&png, element, destination)
}
