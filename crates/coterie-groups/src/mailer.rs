//! Invitation mail dispatch.
//!
//! Delivery is out of scope for the engine; callers plug in an
//! [`InvitationMailer`] implementation. Dispatch is best-effort and happens
//! after the database transaction commits, so a mail failure never rolls
//! back an invitation.

use async_trait::async_trait;

use coterie_core::Result;

/// The rendered content of one invitation mail.
#[derive(Debug, Clone)]
pub struct InvitationMail {
    /// Recipient, the invitation's normalized email.
    pub to: String,
    /// Name of the inviting group.
    pub group_name: String,
    /// Email of the inviting admin.
    pub invited_by: String,
    /// Personal message from the inviting admin, possibly empty.
    pub message: String,
    /// Accept URL carrying the signed token.
    pub url: String,
}

/// Sends invitation mails.
#[async_trait]
pub trait InvitationMailer: Send + Sync {
    async fn send(&self, mail: &InvitationMail) -> Result<()>;
}

/// Mailer that only records the dispatch in the log. Useful in tests and in
/// deployments that have not wired a delivery backend yet.
pub struct LoggingMailer;

#[async_trait]
impl InvitationMailer for LoggingMailer {
    async fn send(&self, mail: &InvitationMail) -> Result<()> {
        tracing::info!(
            to = %mail.to,
            group = %mail.group_name,
            "invitation mail dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_mailer_always_succeeds() {
        let mail = InvitationMail {
            to: "invitee@example.com".to_string(),
            group_name: "Design".to_string(),
            invited_by: "admin@example.com".to_string(),
            message: String::new(),
            url: "https://app.coterie.dev/invite/abc.def".to_string(),
        };
        assert!(LoggingMailer.send(&mail).await.is_ok());
    }
}
