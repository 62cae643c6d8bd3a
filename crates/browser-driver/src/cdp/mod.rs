//! CDP-backed driver adapter built on `chromiumoxide`.
//!
//! Each session gets its own browser process; inside it, an isolated browser
//! context (CDP `Target.createBrowserContext`) carries the session's
//! cookies, storage, and cache. Engine dispatch happens here and only here:
//! the CDP adapter can drive chromium, and rejects the other engines at
//! launch.

mod js;
mod page;

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{DriverError, Result};
use crate::types::{BrowserConfig, Engine};
use crate::{BrowserOps, ContextOps, Driver, DriverHandles};

pub use page::CdpPage;

/// Production driver: launches chromium over the DevTools protocol.
#[derive(Debug, Default)]
pub struct CdpDriver;

impl CdpDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for CdpDriver {
    async fn launch(&self, config: &BrowserConfig) -> Result<DriverHandles> {
        if config.engine != Engine::Chromium {
            return Err(DriverError::UnsupportedEngine(config.engine));
        }

        debug!(
            target = "driver.cdp",
            engine = %config.engine,
            headless = config.headless,
            "launching browser"
        );

        let mut builder = CdpBrowserConfig::builder()
            .window_size(config.viewport_width, config.viewport_height)
            .request_timeout(config.launch_timeout)
            .args(config.args.iter().map(String::as_str));
        if !config.headless {
            builder = builder.with_head();
        }
        let cdp_config = builder.build().map_err(DriverError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        // The handler stream must be drained for the connection to make
        // progress; it ends when the browser goes away.
        let events: JoinHandle<()> = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let context_id = match browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
        {
            Ok(id) => id,
            Err(err) => {
                // Partial launch: close the browser before surfacing.
                let _ = browser.close().await;
                let _ = browser.wait().await;
                events.abort();
                return Err(DriverError::Launch(format!(
                    "failed to create browser context: {err}"
                )));
            }
        };

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(DriverError::Launch);

        let page = match target {
            Ok(target) => browser.new_page(target).await.map_err(|e| e.into()),
            Err(err) => Err(err),
        };
        let page = match page {
            Ok(page) => page,
            Err(err) => {
                let _ = browser.dispose_browser_context(context_id.clone()).await;
                let _ = browser.close().await;
                let _ = browser.wait().await;
                events.abort();
                return Err(DriverError::Launch(format!("failed to create page: {err}")));
            }
        };

        let shared = Arc::new(CdpBrowser {
            browser: Mutex::new(Some(browser)),
            events: Mutex::new(Some(events)),
        });

        let cdp_page = CdpPage::new(page.clone());
        if let Err(err) = cdp_page.apply_context_options(&config.context).await {
            let context = CdpContext {
                browser: Arc::clone(&shared),
                id: context_id,
            };
            let _ = context.close().await;
            let _ = shared.close().await;
            return Err(err);
        }

        Ok(DriverHandles {
            browser: shared.clone(),
            context: Arc::new(CdpContext {
                browser: shared,
                id: context_id,
            }),
            page: Arc::new(cdp_page),
        })
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser processes are owned per-session; nothing process-wide to
        // tear down for the CDP backend.
        Ok(())
    }
}

/// Shared browser-process handle; `None` once closed.
struct CdpBrowser {
    browser: Mutex<Option<Browser>>,
    events: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl BrowserOps for CdpBrowser {
    async fn close(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(err) = browser.close().await {
                warn!(target = "driver.cdp", error = %err, "browser close failed");
            }
            let _ = browser.wait().await;
        }
        if let Some(events) = self.events.lock().await.take() {
            events.abort();
        }
        Ok(())
    }
}

struct CdpContext {
    browser: Arc<CdpBrowser>,
    id: BrowserContextId,
}

#[async_trait]
impl ContextOps for CdpContext {
    async fn close(&self) -> Result<()> {
        let mut guard = self.browser.browser.lock().await;
        if let Some(browser) = guard.as_mut() {
            if let Err(err) = browser.dispose_browser_context(self.id.clone()).await {
                warn!(target = "driver.cdp", error = %err, "context dispose failed");
            }
        }
        Ok(())
    }
}

