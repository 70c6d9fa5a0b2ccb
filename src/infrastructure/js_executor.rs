//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use std::time::Duration;

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::BrowserError;

/// 轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力
/// - 不认识 Question / Paper
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, BrowserError> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value: JsonValue = result
            .into_value()
            .map_err(|e| BrowserError::ScriptExecutionFailed {
                source: Box::new(e),
            })?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, BrowserError> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(|e| BrowserError::ScriptExecutionFailed {
            source: Box::new(e),
        })
    }

    /// 轮询直到表达式为真或超时
    ///
    /// # 返回
    /// 超时返回 `Ok(false)`，由调用方决定是否继续
    pub async fn wait_until(
        &self,
        condition: &str,
        timeout: Duration,
    ) -> Result<bool, BrowserError> {
        let deadline = Instant::now() + timeout;
        let js_code = format!("Boolean({})", condition);
        loop {
            if self.eval_as::<bool>(js_code.as_str()).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!("等待条件超时: {}", condition);
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}
