//! Page-level operations over a CDP page.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetScriptExecutionDisabledParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton as CdpMouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, SetBypassCspParams, Viewport,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use serde_json::Value;
use tracing::debug;

use super::js;
use crate::error::{DriverError, Result};
use crate::types::{
    ClickOptions, ContextOptions, ExtractorSpec, FieldKind, FormField, ImageFormat, MouseButton,
    ScreenshotOptions, ScrollRequest, Selector, WaitCondition, WaitUntil,
};
use crate::PageOps;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Applies user agent, extra headers, CSP bypass, and the JS toggle.
    pub(crate) async fn apply_context_options(&self, options: &ContextOptions) -> Result<()> {
        if let Some(agent) = &options.user_agent {
            self.page
                .execute(SetUserAgentOverrideParams::new(agent.clone()))
                .await?;
        }

        if !options.extra_headers.is_empty() {
            let map: serde_json::Map<String, Value> = options
                .extra_headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            let headers = Headers::new(Value::Object(map));
            self.page
                .execute(SetExtraHttpHeadersParams::new(headers))
                .await?;
        }

        if options.bypass_csp {
            self.page.execute(SetBypassCspParams::new(true)).await?;
        }

        if !options.java_script_enabled {
            self.page
                .execute(SetScriptExecutionDisabledParams::new(true))
                .await?;
        }

        Ok(())
    }

    /// Evaluates an expression, awaiting promises, and returns its value.
    async fn eval_expression(&self, expression: &str) -> Result<Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(DriverError::Evaluation)?;

        let result = self
            .page
            .evaluate(params)
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    /// Polls a boolean JS probe until it holds or the timeout elapses.
    async fn poll_until(&self, probe: &str, timeout: Duration, what: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let value = self.eval_expression(probe).await?;
            if value.as_bool().unwrap_or(false) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    ms: timeout.as_millis() as u64,
                    condition: what.to_string(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn element_center(&self, selector: &Selector) -> Result<(f64, f64)> {
        let value = self.eval_expression(&js::element_center(selector)).await?;
        let point = value.as_object().ok_or_else(|| DriverError::ElementNotFound {
            selector: selector.raw.clone(),
        })?;
        let x = point.get("x").and_then(Value::as_f64).unwrap_or(0.0);
        let y = point.get("y").and_then(Value::as_f64).unwrap_or(0.0);
        Ok((x, y))
    }

    async fn dispatch_click(&self, x: f64, y: f64, options: &ClickOptions) -> Result<()> {
        let button = match options.button {
            MouseButton::Left => CdpMouseButton::Left,
            MouseButton::Right => CdpMouseButton::Right,
            MouseButton::Middle => CdpMouseButton::Middle,
        };

        for count in 1..=options.click_count.max(1) {
            let pressed = DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MousePressed)
                .x(x)
                .y(y)
                .button(button.clone())
                .click_count(count as i64)
                .build()
                .map_err(DriverError::Protocol)?;
            self.page.execute(pressed).await?;

            let released = DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MouseReleased)
                .x(x)
                .y(y)
                .button(button.clone())
                .click_count(count as i64)
                .build()
                .map_err(DriverError::Protocol)?;
            self.page.execute(released).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl PageOps for CdpPage {
    async fn navigate(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()> {
        debug!(target = "driver.cdp", %url, ?wait_until, "navigate");

        let goto = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| DriverError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

            match wait_until {
                WaitUntil::Domcontentloaded => {
                    self.poll_until(
                        "document.readyState === 'interactive' || document.readyState === 'complete'",
                        timeout,
                        "domcontentloaded",
                    )
                    .await
                }
                WaitUntil::Load => {
                    self.poll_until("document.readyState === 'complete'", timeout, "load")
                        .await
                }
                WaitUntil::Networkidle => {
                    self.poll_until("document.readyState === 'complete'", timeout, "load")
                        .await?;
                    // No in-flight request tracking on a fresh load; a short
                    // settle window approximates network idle.
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                }
            }
        };

        tokio::time::timeout(timeout, goto)
            .await
            .map_err(|_| DriverError::Timeout {
                ms: timeout.as_millis() as u64,
                condition: format!("navigation to {url}"),
            })?
    }

    async fn click(&self, selector: &Selector, options: &ClickOptions) -> Result<()> {
        debug!(target = "driver.cdp", selector = %selector.raw, kind = %selector.kind, "click");

        if options.force {
            let clicked = self.eval_expression(&js::force_click(selector)).await?;
            if !clicked.as_bool().unwrap_or(false) {
                return Err(DriverError::ElementNotFound {
                    selector: selector.raw.clone(),
                });
            }
            return Ok(());
        }

        let (x, y) = self.element_center(selector).await?;
        self.dispatch_click(x, y, options).await
    }

    async fn fill_field(&self, field: &FormField) -> Result<()> {
        let filled = match field.kind {
            FieldKind::Select => {
                let values: Vec<&str> = if field.multiple {
                    field.value.split(',').map(str::trim).collect()
                } else {
                    vec![field.value.as_str()]
                };
                let values_json = serde_json::to_string(&values)
                    .map_err(|e| DriverError::Evaluation(e.to_string()))?;
                self.eval_expression(&js::select_options(&field.selector, &values_json, field.multiple))
                    .await?
            }
            FieldKind::Checkbox | FieldKind::Radio => {
                let checked = matches!(field.value.as_str(), "true" | "1" | "on" | "checked");
                self.eval_expression(&js::set_checked(&field.selector, checked))
                    .await?
            }
            FieldKind::Text | FieldKind::Textarea | FieldKind::Password | FieldKind::File => {
                self.eval_expression(&js::fill_text(&field.selector, &field.value))
                    .await?
            }
        };

        if !filled.as_bool().unwrap_or(false) {
            return Err(DriverError::ElementNotFound {
                selector: field.selector.clone(),
            });
        }
        Ok(())
    }

    async fn extract(&self, extractors: &[ExtractorSpec]) -> Result<String> {
        let specs: Vec<Value> = extractors
            .iter()
            .map(|spec| {
                serde_json::json!({
                    "name": spec.name,
                    "selector": spec.selector,
                    "attribute": spec.attribute,
                    "multiple": spec.multiple,
                })
            })
            .collect();
        let specs_json =
            serde_json::to_string(&specs).map_err(|e| DriverError::Evaluation(e.to_string()))?;

        let value = self.eval_expression(&js::extract_all(&specs_json)).await?;
        serde_json::to_string(&value).map_err(|e| DriverError::Evaluation(e.to_string()))
    }

    async fn screenshot(&self, path: &Path, options: &ScreenshotOptions) -> Result<()> {
        let format = match options.format {
            ImageFormat::Png => CaptureScreenshotFormat::Png,
            ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        };

        let mut builder = ScreenshotParams::builder()
            .format(format)
            .full_page(options.full_page);

        if options.format == ImageFormat::Jpeg {
            if let Some(quality) = options.quality {
                builder = builder.quality(quality as i64);
            }
        }

        if let Some(selector) = &options.selector {
            let value = self.eval_expression(&js::element_box(selector)).await?;
            let rect = value.as_object().ok_or_else(|| DriverError::ElementNotFound {
                selector: selector.raw.clone(),
            })?;
            let clip = Viewport::builder()
                .x(rect.get("x").and_then(Value::as_f64).unwrap_or(0.0))
                .y(rect.get("y").and_then(Value::as_f64).unwrap_or(0.0))
                .width(rect.get("width").and_then(Value::as_f64).unwrap_or(0.0))
                .height(rect.get("height").and_then(Value::as_f64).unwrap_or(0.0))
                .scale(1.0)
                .build()
                .map_err(DriverError::Screenshot)?;
            builder = builder.clip(clip);
        }

        self.page
            .save_screenshot(builder.build(), path)
            .await
            .map_err(|e| DriverError::Screenshot(e.to_string()))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str, args: &[Value], timeout: Duration) -> Result<Value> {
        let args_json =
            serde_json::to_string(args).map_err(|e| DriverError::Evaluation(e.to_string()))?;
        // The script is a function body; `arguments` carries the args.
        let expression = format!("(function() {{ {script} }}).apply(null, {args_json})");

        tokio::time::timeout(timeout, self.eval_expression(&expression))
            .await
            .map_err(|_| DriverError::Timeout {
                ms: timeout.as_millis() as u64,
                condition: "script evaluation".to_string(),
            })?
    }

    async fn wait_for(&self, condition: &WaitCondition, timeout: Duration) -> Result<()> {
        match condition {
            WaitCondition::Selector { selector, state } => {
                let probe = js::state_probe(selector, *state);
                self.poll_until(
                    &probe,
                    timeout,
                    &format!("selector {} to be {:?}", selector.raw, state),
                )
                .await
            }
            WaitCondition::Function { body } => {
                let probe = format!("Promise.resolve(({body})()).then(v => !!v)");
                self.poll_until(&probe, timeout, "custom function").await
            }
            WaitCondition::Sleep => {
                tokio::time::sleep(timeout).await;
                Ok(())
            }
        }
    }

    async fn scroll(&self, request: &ScrollRequest) -> Result<()> {
        let expression = match request {
            ScrollRequest::Element {
                selector,
                behavior,
                block,
                inline,
            } => js::scroll_element(selector, *behavior, *block, *inline),
            ScrollRequest::Coordinates { x, y, behavior } => js::scroll_to(*x, *y, *behavior),
            ScrollRequest::Page {
                direction,
                amount,
                behavior,
            } => match direction {
                Some(direction) => js::scroll_page(*direction, *amount, *behavior),
                None => js::scroll_page(crate::types::ScrollDirection::Down, *amount, *behavior),
            },
        };

        let value = self.eval_expression(&expression).await?;
        if let ScrollRequest::Element { selector, .. } = request {
            if !value.as_bool().unwrap_or(false) {
                return Err(DriverError::ElementNotFound {
                    selector: selector.raw.clone(),
                });
            }
        }
        Ok(())
    }

    async fn count_elements(&self, css: &str) -> Result<usize> {
        let expression = format!(
            "document.querySelectorAll({}).length",
            js::escape_js_string(css)
        );
        let value = self.eval_expression(&expression).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }
}
