use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::warn;

use crate::config::SmtpConfig;
use crate::models::{AlertType, NotificationChannel, Watcher};
use crate::notify::{alert_label, NotificationSink};

/// SMTP delivery channel.
pub struct EmailSink {
    config: SmtpConfig,
    from_address: String,
    to_address: String,
}

impl EmailSink {
    /// None unless the config carries both a from- and a to-address.
    pub fn from_config(config: &SmtpConfig) -> Option<Self> {
        let from_address = config.from_address.clone()?;
        let to_address = config.to_address.clone()?;
        Some(Self {
            config: config.clone(),
            from_address,
            to_address,
        })
    }

    fn build_message(
        &self,
        watcher: &Watcher,
        alert_type: AlertType,
        message: &str,
    ) -> Option<Message> {
        let from = format!("{} <{}>", self.config.from_name, self.from_address);
        let subject = format!(
            "PriceWatch Alert: {} ({})",
            watcher.name,
            alert_label(alert_type)
        );
        let body = format!(
            "<p>{}</p><p><a href=\"{}\">Go to Product</a></p>",
            message, watcher.url
        );

        Message::builder()
            .from(from.parse().ok()?)
            .to(self.to_address.parse().ok()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)
            .ok()
    }

    fn build_transport(&self) -> Option<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host).ok()?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        }
        .port(self.config.port);

        if let (Some(username), Some(password)) =
            (self.config.username.clone(), self.config.password.clone())
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Some(builder.build())
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    async fn send(&self, watcher: &Watcher, alert_type: AlertType, message: &str) -> bool {
        let Some(email) = self.build_message(watcher, alert_type, message) else {
            warn!(watcher = %watcher.id, "Could not build alert email");
            return false;
        };
        let Some(transport) = self.build_transport() else {
            warn!("Could not build SMTP transport for {}", self.config.host);
            return false;
        };

        match transport.send(email).await {
            Ok(_) => true,
            Err(e) => {
                warn!(watcher = %watcher.id, "Failed to send alert email: {}", e);
                false
            }
        }
    }
}
