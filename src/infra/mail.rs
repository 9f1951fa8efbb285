//! Mail transport that records outgoing messages in the log stream.

use async_trait::async_trait;
use tracing::info;

use crate::application::mail::{MailError, MailTransport, OutgoingMail};

/// Development transport: every message is emitted as a structured `info` event.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl MailTransport for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if mail.to.is_empty() {
            return Err(MailError::Rejected("message has no recipients".into()));
        }

        info!(
            target = "bitacora::infra::mail",
            from = %mail.from,
            to = ?mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "mail dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_mail_without_recipients() {
        let mail = OutgoingMail {
            from: "blog@localhost".into(),
            to: Vec::new(),
            subject: "hi".into(),
            body: "hello".into(),
        };
        let err = LogMailer.send(mail).await.expect_err("no recipients");
        assert!(matches!(err, MailError::Rejected(_)));
    }
}
