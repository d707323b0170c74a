//! SMTP delivery of order confirmations via lettre.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use serde_json::Value;

use super::notifications::{Notifier, NotifyError, OrderConfirmation};
use crate::config::SmtpConfig;

const SUBJECT: &str = "Your order confirmation";

#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Builds a STARTTLS relay transport. No connection is made until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        let from = config
            .from_address
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(config.from_address.clone()))?;

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> Result<(), NotifyError> {
        let message = confirmation_message(&self.from, confirmation)?;
        self.mailer.send(message).await?;
        Ok(())
    }
}

fn confirmation_message(from: &Mailbox, confirmation: &OrderConfirmation) -> Result<Message, NotifyError> {
    let to: Mailbox = confirmation
        .recipient
        .parse()
        .map_err(|_| NotifyError::InvalidAddress(confirmation.recipient.clone()))?;

    let mut body = format!(
        "Thank you for your order!\n\nOrder number: {}\n",
        confirmation.order_id()
    );
    match confirmation.order.get("total") {
        Some(Value::Number(total)) => body.push_str(&format!("Total: {total}\n")),
        Some(Value::String(total)) => body.push_str(&format!("Total: {total}\n")),
        _ => {}
    }
    body.push_str("\nWe will let you know as soon as it ships.\n");

    Ok(Message::builder()
        .from(from.clone())
        .to(to)
        .subject(SUBJECT)
        .header(ContentType::TEXT_PLAIN)
        .body(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn confirmation(recipient: &str) -> OrderConfirmation {
        OrderConfirmation {
            recipient: recipient.to_string(),
            order: json!({ "id": 12, "status": "success", "total": 20 })
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[test]
    fn message_names_order_and_total() {
        let from: Mailbox = "shop@example.com".parse().unwrap();
        let message = confirmation_message(&from, &confirmation("a@b.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("To: a@b.com"));
        assert!(raw.contains(SUBJECT));
        assert!(raw.contains("Order number: 12"));
        assert!(raw.contains("Total: 20"));
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        let from: Mailbox = "shop@example.com".parse().unwrap();
        let err = confirmation_message(&from, &confirmation("not an address")).unwrap_err();
        assert!(matches!(err, NotifyError::InvalidAddress(_)));
    }

    #[test]
    fn transport_requires_valid_sender() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: None,
            password: None,
            from_address: "nope".to_string(),
        };
        assert!(matches!(SmtpNotifier::new(&config), Err(NotifyError::InvalidAddress(_))));
    }
}
