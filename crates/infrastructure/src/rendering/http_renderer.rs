use std::time::Duration;

use async_trait::async_trait;
use lesson_config::RendererConfig;
use lesson_domain::ports::{DocumentRenderer, RenderOptions, RenderedDocument};
use lesson_errors::{SchedulerError, SchedulerResult};
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    content: &'a str,
    title: &'a str,
    language: Option<&'a str>,
    level: Option<&'a str>,
    metadata: &'a serde_json::Value,
}

/// 调用外部 HTTP 渲染服务生成 PDF，结果写入临时文件
pub struct HttpDocumentRenderer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpDocumentRenderer {
    pub fn new(config: &RendererConfig) -> SchedulerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SchedulerError::config_error(format!("创建渲染客户端失败: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl DocumentRenderer for HttpDocumentRenderer {
    #[instrument(skip(self, content, options), fields(file_name = %options.file_name))]
    async fn render(
        &self,
        content: &str,
        options: &RenderOptions,
    ) -> SchedulerResult<RenderedDocument> {
        let request = RenderRequest {
            content,
            title: &options.title,
            language: options.language.as_deref(),
            level: options.level.as_deref(),
            metadata: &options.metadata,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SchedulerError::render_error(format!("请求渲染服务失败: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SchedulerError::render_error(format!(
                "渲染服务返回错误状态: {status}"
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SchedulerError::render_error(format!("读取渲染结果失败: {e}")))?;
        if bytes.is_empty() {
            return Err(SchedulerError::render_error("渲染服务返回空文档"));
        }

        let path = tempfile::Builder::new()
            .prefix("lesson-doc-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| SchedulerError::render_error(format!("创建临时文件失败: {e}")))?
            .into_temp_path();
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| SchedulerError::render_error(format!("写入临时文件失败: {e}")))?;

        debug!(size = bytes.len(), path = %path.display(), "文档渲染完成");
        Ok(RenderedDocument::new(path, options.file_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn renderer(server: &MockServer) -> HttpDocumentRenderer {
        HttpDocumentRenderer::new(&RendererConfig {
            enabled: true,
            endpoint: format!("{}/render", server.uri()),
            api_key: Some("secret".to_string()),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    fn options() -> RenderOptions {
        RenderOptions {
            title: "Past tense".to_string(),
            file_name: "past-tense.pdf".to_string(),
            language: Some("English".to_string()),
            level: Some("B1".to_string()),
            metadata: serde_json::json!({ "taskId": 7 }),
        }
    }

    #[tokio::test]
    async fn test_render_posts_content_and_writes_temporary_pdf() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({
                "content": "1. I ___ (go)",
                "title": "Past tense",
                "language": "English",
                "level": "B1",
                "metadata": { "taskId": 7 },
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"%PDF-1.4 rendered".to_vec(), "application/pdf"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let doc = renderer(&server)
            .render("1. I ___ (go)", &options())
            .await
            .unwrap();

        assert_eq!(doc.file_name(), "past-tense.pdf");
        let written = tokio::fs::read(doc.path()).await.unwrap();
        assert_eq!(written, b"%PDF-1.4 rendered");

        let path = doc.path().to_path_buf();
        doc.release().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_request_without_api_key_has_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .mount(&server)
            .await;
        let renderer = HttpDocumentRenderer::new(&RendererConfig {
            enabled: true,
            endpoint: format!("{}/render", server.uri()),
            api_key: None,
            timeout_seconds: 5,
        })
        .unwrap();

        renderer.render("content", &options()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_error_status_is_render_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = renderer(&server)
            .render("content", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DocumentRender(_)));
    }

    #[tokio::test]
    async fn test_empty_document_is_render_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = renderer(&server)
            .render("content", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DocumentRender(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_render_error() {
        let renderer = HttpDocumentRenderer::new(&RendererConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:1/render".to_string(),
            api_key: None,
            timeout_seconds: 5,
        })
        .unwrap();

        let err = renderer
            .render("content", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DocumentRender(_)));
    }
}
