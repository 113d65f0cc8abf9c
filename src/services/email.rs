use lettre::{
    Message, SmtpTransport, Transport,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("SMTP configuration error: {0}")]
    Config(String),
    #[error("Email sending failed: {0}")]
    Send(#[from] lettre::transport::smtp::Error),
    #[error("Message building failed: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("Address parsing failed: {0}")]
    Address(#[from] lettre::address::AddressError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

impl EmailConfig {
    pub fn from_env() -> Result<Self, EmailError> {
        Ok(Self {
            smtp_server: env::var("SMTP_SERVER")
                .map_err(|_| EmailError::Config("SMTP_SERVER not set".to_string()))?,
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|_| EmailError::Config("Invalid SMTP_PORT".to_string()))?,
            username: env::var("SMTP_USERNAME")
                .map_err(|_| EmailError::Config("SMTP_USERNAME not set".to_string()))?,
            password: env::var("SMTP_PASSWORD")
                .map_err(|_| EmailError::Config("SMTP_PASSWORD not set".to_string()))?,
            from_email: env::var("FROM_EMAIL")
                .map_err(|_| EmailError::Config("FROM_EMAIL not set".to_string()))?,
            from_name: env::var("FROM_NAME").unwrap_or_else(|_| "MentorConnect".to_string()),
        })
    }
}

pub struct EmailService {
    mailer: SmtpTransport,
    config: EmailConfig,
}

impl EmailService {
    pub fn new() -> Result<Self, EmailError> {
        let config = EmailConfig::from_env()?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.smtp_server)
            .map_err(|e| EmailError::Config(format!("SMTP relay error: {}", e)))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { mailer, config })
    }

    pub fn send_email(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        template: &EmailTemplate,
    ) -> Result<(), EmailError> {
        let to_address = match to_name {
            Some(name) => format!("{} <{}>", name, to_email),
            None => to_email.to_string(),
        };

        let from_address = format!("{} <{}>", self.config.from_name, self.config.from_email);

        let message_builder = Message::builder()
            .from(from_address.parse()?)
            .to(to_address.parse()?)
            .subject(&template.subject);

        let message = if let Some(text_body) = &template.text_body {
            message_builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(template.html_body.clone()),
                    ),
            )?
        } else {
            message_builder
                .header(ContentType::TEXT_HTML)
                .body(template.html_body.clone())?
        };

        info!("Sending email to: {}", to_email);
        self.mailer.send(&message)?;
        info!("Email sent successfully to: {}", to_email);

        Ok(())
    }
}

/// Best-effort delivery wrapper. Missing SMTP configuration or a failed
/// send is logged and swallowed; a notification never fails the state
/// transition that triggered it.
pub struct Notifier {
    service: Option<EmailService>,
}

impl Notifier {
    pub fn from_env() -> Self {
        match EmailService::new() {
            Ok(service) => Self {
                service: Some(service),
            },
            Err(e) => {
                warn!("Email delivery disabled: {}", e);
                Self { service: None }
            }
        }
    }

    pub fn deliver(&self, to_email: &str, to_name: Option<&str>, template: &EmailTemplate) {
        let Some(service) = &self.service else {
            warn!(
                "Email delivery disabled, dropping \"{}\" to {}",
                template.subject, to_email
            );
            return;
        };

        if let Err(e) = service.send_email(to_email, to_name, template) {
            error!("Failed to send \"{}\" to {}: {}", template.subject, to_email, e);
        }
    }
}
