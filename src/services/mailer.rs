use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::error::AppError;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, email: &str, link: &str) -> Result<(), AppError>;
}

/// Writes outgoing mail to the log instead of a mail server.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, email: &str, link: &str) -> Result<(), AppError> {
        info!(to = email, %link, "password reset requested");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub link: String,
}

/// Keeps sent mail in memory so it can be inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<OutgoingMail>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_link_for(&self, email: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|mail| mail.to == email)
            .map(|mail| mail.link)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_password_reset(&self, email: &str, link: &str) -> Result<(), AppError> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(OutgoingMail {
                to: email.to_string(),
                link: link.to_string(),
            });
        Ok(())
    }
}
