//! Outbound invoice email over SMTP.

use crate::config::SmtpConfig;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use platform_core::error::AppError;
use secrecy::ExposeSecret;
use tracing::{info, instrument, warn};

/// Everything needed to send one invoice to a client.
#[derive(Debug)]
pub struct InvoiceEmail {
    pub to: String,
    pub client_name: String,
    pub invoice_number: String,
    pub total: String,
    pub currency: String,
    pub due_date: Option<String>,
    pub payment_link_url: Option<String>,
    pub pdf: Option<Vec<u8>>,
}

#[derive(Clone)]
pub struct Mailer {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl Mailer {
    pub fn new(config: SmtpConfig) -> Result<Self, AppError> {
        if !config.enabled {
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to create SMTP relay: {}", e))
            })?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            config,
            transport: Some(transport),
        })
    }

    /// Send an issued invoice to the client, with the PDF attached and the
    /// payment link in the body. Returns whether an email actually went out;
    /// with SMTP disabled this logs and returns false.
    #[instrument(skip(self, email), fields(invoice_number = %email.invoice_number))]
    pub async fn send_invoice(&self, email: InvoiceEmail) -> Result<bool, AppError> {
        let Some(transport) = self.transport.as_ref() else {
            warn!(to = %email.to, "SMTP disabled, invoice email not sent");
            return Ok(false);
        };

        let from_mailbox: Mailbox =
            format!("{} <{}>", self.config.from_name, self.config.from_email)
                .parse()
                .map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Invalid from address: {}", e))
                })?;

        let to_mailbox: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::EmailError(format!("Invalid recipient: {}", e)))?;

        let subject = format!("Invoice {} from {}", email.invoice_number, self.config.from_name);
        let body = render_body(&email);

        let builder = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject);

        let message = match email.pdf {
            Some(pdf) => {
                let attachment = Attachment::new(format!("{}.pdf", email.invoice_number))
                    .body(pdf, ContentType::parse("application/pdf").map_err(|e| {
                        AppError::EmailError(format!("Invalid content type: {}", e))
                    })?);

                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(body),
                        )
                        .singlepart(attachment),
                )
            }
            None => builder.header(ContentType::TEXT_PLAIN).body(body),
        }
        .map_err(|e| AppError::EmailError(format!("Failed to build message: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| AppError::EmailError(format!("Failed to send email: {}", e)))?;

        info!(invoice_number = %email.invoice_number, "Invoice email sent");

        Ok(true)
    }
}

fn render_body(email: &InvoiceEmail) -> String {
    let mut body = format!(
        "Dear {},\n\nPlease find attached invoice {} for {} {}.\n",
        email.client_name, email.invoice_number, email.total, email.currency
    );

    if let Some(due) = &email.due_date {
        body.push_str(&format!("\nPayment is due by {}.\n", due));
    }

    if let Some(link) = &email.payment_link_url {
        body.push_str(&format!("\nYou can pay online here: {}\n", link));
    }

    body.push_str("\nThank you for your business.\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_includes_payment_link_when_present() {
        let email = InvoiceEmail {
            to: "client@example.com".to_string(),
            client_name: "Acme Ltd".to_string(),
            invoice_number: "INV-000007".to_string(),
            total: "360.00".to_string(),
            currency: "EUR".to_string(),
            due_date: Some("2026-03-15".to_string()),
            payment_link_url: Some("https://pay.example.com/plink_1".to_string()),
            pdf: None,
        };

        let body = render_body(&email);
        assert!(body.contains("INV-000007"));
        assert!(body.contains("360.00 EUR"));
        assert!(body.contains("2026-03-15"));
        assert!(body.contains("https://pay.example.com/plink_1"));
    }

    #[test]
    fn body_omits_link_when_absent() {
        let email = InvoiceEmail {
            to: "client@example.com".to_string(),
            client_name: "Acme Ltd".to_string(),
            invoice_number: "INV-000008".to_string(),
            total: "100.00".to_string(),
            currency: "USD".to_string(),
            due_date: None,
            payment_link_url: None,
            pdf: None,
        };

        let body = render_body(&email);
        assert!(!body.contains("pay online"));
        assert!(!body.contains("due by"));
    }

    #[tokio::test]
    async fn disabled_mailer_is_a_no_op() {
        let mailer = Mailer::new(SmtpConfig {
            enabled: false,
            host: String::new(),
            port: 587,
            user: String::new(),
            password: secrecy::Secret::new(String::new()),
            from_email: "billing@example.com".to_string(),
            from_name: "Billing".to_string(),
        })
        .unwrap();

        let email = InvoiceEmail {
            to: "client@example.com".to_string(),
            client_name: "Acme Ltd".to_string(),
            invoice_number: "INV-000009".to_string(),
            total: "1.00".to_string(),
            currency: "EUR".to_string(),
            due_date: None,
            payment_link_url: None,
            pdf: None,
        };

        assert_eq!(mailer.send_invoice(email).await.unwrap(), false);
    }
}
