//! 基于 chromiumoxide 的无头 Chrome 渲染器。
//!
//! 每个会话自带一个单线程 tokio 运行时，对外仍是阻塞接口，
//! 消费者线程无需感知异步。

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{ElementBox, PageRenderer, RenderError, RendererLauncher};

const ELEMENT_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
}

impl ChromeLauncher {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder().no_sandbox();
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(RenderError::Launch)
    }
}

impl RendererLauncher for ChromeLauncher {
    fn launch(&self) -> Result<Box<dyn PageRenderer>, RenderError> {
        let config = self.browser_config()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let (browser, mut handler) = runtime
            .block_on(Browser::launch(config))
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // CDP 事件循环；只在 block_on 期间被驱动
        let handler = runtime.spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(ChromeRenderer {
            runtime,
            browser,
            handler: Some(handler),
            page: None,
        }))
    }
}

pub struct ChromeRenderer {
    runtime: Runtime,
    browser: Browser,
    handler: Option<JoinHandle<()>>,
    page: Option<Page>,
}

impl ChromeRenderer {
    fn page(&self) -> Result<&Page, RenderError> {
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Capture("no page opened".to_string()))
    }
}

impl PageRenderer for ChromeRenderer {
    fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let navigate_err = |e: chromiumoxide::error::CdpError| RenderError::Navigate {
            url: url.to_string(),
            reason: e.to_string(),
        };

        if let Some(page) = &self.page {
            self.runtime
                .block_on(page.goto(url))
                .map_err(navigate_err)?;
        } else {
            let page = self
                .runtime
                .block_on(self.browser.new_page(url))
                .map_err(navigate_err)?;
            self.page = Some(page);
        }
        debug!("页面已打开: {}", url);
        Ok(())
    }

    fn wait_for_element(
        &mut self,
        element_id: &str,
        timeout: Duration,
    ) -> Result<ElementBox, RenderError> {
        let page = self.page()?;
        let selector = format!(r#"[id="{}"]"#, element_id.replace('"', "\\\""));

        let found = self.runtime.block_on(tokio::time::timeout(timeout, async {
            loop {
                // bounding_box 是视口坐标，滚回顶部后才与整页截图坐标一致
                if page.evaluate("window.scrollTo(0, 0)").await.is_ok()
                    && let Ok(element) = page.find_element(selector.as_str()).await
                    && let Ok(bbox) = element.bounding_box().await
                    && bbox.width > 0.0
                    && bbox.height > 0.0
                {
                    return ElementBox {
                        x: bbox.x,
                        y: bbox.y,
                        width: bbox.width,
                        height: bbox.height,
                    };
                }
                tokio::time::sleep(ELEMENT_POLL).await;
            }
        }));

        found.map_err(|_| RenderError::ElementTimeout {
            element_id: element_id.to_string(),
            timeout,
        })
    }

    fn full_page_screenshot(&mut self) -> Result<Vec<u8>, RenderError> {
        let page = self.page()?;
        let params = ScreenshotParams::builder().full_page(true).build();
        self.runtime
            .block_on(page.screenshot(params))
            .map_err(|e| RenderError::Capture(e.to_string()))
    }

    fn close(&mut self) -> Result<(), RenderError> {
        let Some(handler) = self.handler.take() else {
            return Ok(());
        };
        self.page.take();

        let Self {
            runtime, browser, ..
        } = self;
        let closed = runtime.block_on(async {
            browser.close().await?;
            let _ = browser.wait().await;
            Ok::<_, chromiumoxide::error::CdpError>(())
        });
        handler.abort();

        closed.map_err(|e| RenderError::Capture(format!("close browser: {e}")))
    }
}
