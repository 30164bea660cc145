use std::path::Path;

use async_trait::async_trait;
use lesson_errors::{SchedulerError, SchedulerResult};
use tempfile::TempPath;

use super::mail::MailAttachment;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub title: String,
    pub file_name: String,
    pub language: Option<String>,
    pub level: Option<String>,
    pub metadata: serde_json::Value,
}

/// 渲染出的临时文件
///
/// 文件生命周期限定在一次投递内：显式调用 [`RenderedDocument::release`]，
/// 或在任意提前返回的路径上由 drop 删除。
#[derive(Debug)]
pub struct RenderedDocument {
    path: TempPath,
    file_name: String,
}

impl RenderedDocument {
    pub fn new(path: TempPath, file_name: impl Into<String>) -> Self {
        Self {
            path,
            file_name: file_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn as_attachment(&self) -> MailAttachment {
        MailAttachment {
            file_name: self.file_name.clone(),
            content_type: "application/pdf".to_string(),
            path: self.path.to_path_buf(),
        }
    }

    /// 删除临时文件
    pub fn release(self) -> SchedulerResult<()> {
        self.path
            .close()
            .map_err(|e| SchedulerError::Internal(format!("删除临时文档失败: {e}")))
    }
}

/// 文档渲染接口，失败不影响投递
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(
        &self,
        content: &str,
        options: &RenderOptions,
    ) -> SchedulerResult<RenderedDocument>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_document() -> RenderedDocument {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4").unwrap();
        RenderedDocument::new(file.into_temp_path(), "test.pdf")
    }

    #[test]
    fn test_release_removes_file() {
        let doc = temp_document();
        let path = doc.path().to_path_buf();
        assert!(path.exists());
        doc.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_file() {
        let doc = temp_document();
        let path = doc.path().to_path_buf();
        drop(doc);
        assert!(!path.exists());
    }

    #[test]
    fn test_attachment_points_to_document() {
        let doc = temp_document();
        let attachment = doc.as_attachment();
        assert_eq!(attachment.file_name, "test.pdf");
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.path, doc.path());
    }
}
