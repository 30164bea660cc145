use std::time::Duration;

use async_trait::async_trait;
use lesson_config::MailConfig;
use lesson_domain::ports::{MailDispatcher, OutboundMail};
use lesson_errors::{SchedulerError, SchedulerResult};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

/// 基于 SMTP 的邮件发送
pub struct SmtpMailDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailDispatcher {
    pub fn new(config: &MailConfig) -> SchedulerResult<Self> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| SchedulerError::config_error(format!("SMTP配置无效: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        builder = builder
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = Self::mailbox(Some(&config.from_name), &config.from_address)
            .map_err(|e| SchedulerError::config_error(format!("mail.from_address 无效: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, lettre::address::AddressError> {
        Ok(Mailbox::new(
            name.filter(|n| !n.is_empty()).map(str::to_string),
            address.parse()?,
        ))
    }

    /// 组装 MIME 邮件；有附件时为 multipart/mixed，否则为纯文本+HTML
    pub async fn build_message(&self, mail: &OutboundMail) -> SchedulerResult<Message> {
        let to = Self::mailbox(None, &mail.to)
            .map_err(|e| SchedulerError::mail_error(format!("收件人地址无效 {}: {e}", mail.to)))?;

        let alternative =
            MultiPart::alternative_plain_html(mail.body_text.clone(), mail.body_html.clone());

        let body = match &mail.attachment {
            Some(attachment) => {
                let bytes = tokio::fs::read(&attachment.path).await.map_err(|e| {
                    SchedulerError::mail_error(format!(
                        "读取附件失败 {}: {e}",
                        attachment.path.display()
                    ))
                })?;
                let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                    SchedulerError::mail_error(format!("附件类型无效: {e}"))
                })?;
                MultiPart::mixed()
                    .multipart(alternative)
                    .singlepart(Attachment::new(attachment.file_name.clone()).body(bytes, content_type))
            }
            None => alternative,
        };

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .multipart(body)
            .map_err(|e| SchedulerError::mail_error(format!("构建邮件失败: {e}")))
    }
}

#[async_trait]
impl MailDispatcher for SmtpMailDispatcher {
    #[instrument(skip(self, mail), fields(to = %mail.to, has_attachment = mail.attachment.is_some()))]
    async fn send(&self, mail: &OutboundMail) -> SchedulerResult<()> {
        let message = self.build_message(mail).await?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| SchedulerError::mail_error(format!("SMTP发送失败: {e}")))?;
        debug!(code = %response.code(), "邮件已提交到SMTP服务器");
        Ok(())
    }
}
