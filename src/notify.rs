//! Contact-form notifications: one HTML notice to the admin address and one
//! acknowledgment to the visitor, delivered through the Brevo transactional
//! API. The store never depends on delivery succeeding.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::MailConfig;
use crate::error::DeliveryError;

const ADMIN_TEMPLATE: &str = include_str!("../templates/admin-email.html");
const VISITOR_TEMPLATE: &str = include_str!("../templates/visitor-email.html");

const BREVO_API_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Transactional-email transport contract.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), DeliveryError>;
}

/// Substitute all three placeholders. Both templates get the full set; the
/// partial substitutions seen in older revisions were copy-paste bugs.
fn render(template: &str, name: &str, email: &str, message: &str) -> String {
    template
        .replace("{{name}}", name)
        .replace("{{email}}", email)
        .replace("{{message}}", message)
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    admin_email: String,
    site_name: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, admin_email: String, site_name: String) -> Self {
        Self {
            mailer,
            admin_email,
            site_name,
        }
    }

    /// Send the admin notice followed by the visitor acknowledgment. The
    /// first failure aborts - a partial send still reports `DeliveryError`.
    pub async fn notify_contact(
        &self,
        name: &str,
        email: &str,
        message: &str,
    ) -> Result<(), DeliveryError> {
        let admin_html = render(ADMIN_TEMPLATE, name, email, message);
        self.mailer
            .send(
                &self.admin_email,
                &format!("New message from {name}"),
                &admin_html,
            )
            .await?;

        let visitor_html = render(VISITOR_TEMPLATE, name, email, message);
        self.mailer
            .send(
                email,
                &format!("Your message was received by {}", self.site_name),
                &visitor_html,
            )
            .await
    }
}

// ============================================================================
// Brevo transactional API transport
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody<'a> {
    sender: EmailAddress<'a>,
    to: Vec<EmailAddress<'a>>,
    subject: &'a str,
    html_content: &'a str,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

pub struct BrevoMailer {
    http: reqwest::Client,
    api_key: String,
    sender_email: String,
    sender_name: String,
    api_url: String,
}

impl BrevoMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            sender_email: config.sender_email.clone(),
            sender_name: config.sender_name.clone(),
            api_url: BREVO_API_URL.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), DeliveryError> {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: &self.sender_email,
                name: Some(&self.sender_name),
            },
            to: vec![EmailAddress {
                email: recipient,
                name: None,
            }],
            subject,
            html_content: html_body,
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError(format!("mail provider unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(%status, detail = %detail, "mail provider rejected send");
            return Err(DeliveryError(format!("mail provider returned {status}")));
        }
        Ok(())
    }
}

/// Stand-in transport for deployments without mail credentials. Every send
/// fails with a delivery error, which the send-message route reports as the
/// saved-but-not-notified outcome.
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError("mail transport not configured".to_string()))
    }
}
