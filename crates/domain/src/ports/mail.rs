use std::path::PathBuf;

use async_trait::async_trait;
use lesson_errors::SchedulerResult;

/// 邮件附件，内容从本地文件读取
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    pub attachment: Option<MailAttachment>,
}

/// 邮件发送接口，任何错误都视为投递失败
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send(&self, mail: &OutboundMail) -> SchedulerResult<()>;
}
