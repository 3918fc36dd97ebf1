use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{info, warn};

use scheduler_core::{
    models::{Output, Task, TaskKind},
    SchedulerResult,
};

use super::TaskRunner;
use crate::worker::Worker;

/// HTTP任务执行器，非2xx响应视为失败
pub struct HttpTaskRunner {
    client: reqwest::Client,
}

impl HttpTaskRunner {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskRunner for HttpTaskRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Http { .. })
    }

    async fn run(&self, task: &Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Http {
            url,
            method,
            headers,
            body,
            timeout,
        } = &task.kind
        else {
            return Ok(Output::error(&task.name, Some("不是HTTP任务".to_string())));
        };

        let method = match Method::from_bytes(method.to_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                return Ok(Output::error(
                    &task.name,
                    Some(format!("不支持的HTTP方法: {method}")),
                ));
            }
        };

        info!("执行HTTP任务: task={}, method={}, url={}", task.name, method, url);

        let mut request = self.client.request(method, url);
        if let Some(limit) = timeout.and_then(|seconds| Duration::try_from_secs_f64(seconds).ok()) {
            request = request.timeout(limit);
        }
        for (key, value) in headers {
            request = request.header(key, value);
        }
        if let Some(body) = body {
            request = request.body(body.clone());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("HTTP任务 {} 请求失败: {}", task.name, e);
                return Ok(Output::error(&task.name, Some(format!("请求失败: {e}"))));
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(Output::success(&task.name, task.output.then_some(text)))
        } else {
            Ok(Output::error(
                &task.name,
                Some(format!("HTTP状态码 {}: {}", status.as_u16(), text)),
            ))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
