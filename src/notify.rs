//! Outbound email notifications.
//!
//! Registration sends a welcome message to the patient and, when one is
//! registered, a notice to the caretaker. Delivery is best effort: the
//! API never fails a registration because SMTP was unreachable.
//! Passwords are never echoed in mail bodies.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// SMTP mailer over STARTTLS.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();
        let from = format!("Adherex Healthcare <{}>", config.user).parse()?;
        Ok(Self { transport, from })
    }

    /// Build a mailer from the environment, or `None` when mail is not
    /// configured.
    pub fn from_env() -> Result<Option<Self>, NotifyError> {
        match crate::config::mail_config() {
            Some(config) => Ok(Some(Self::new(&config)?)),
            None => Ok(None),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .body(body.to_string())?;
        self.transport.send(message).await?;
        Ok(())
    }
}

pub const WELCOME_SUBJECT: &str = "Welcome to Adherex!";
pub const CARETAKER_SUBJECT: &str = "Caretaker Notification";

/// Welcome message for a newly registered patient.
pub fn welcome_patient_body(name: &str, email: &str, caretaker_email: &str) -> String {
    let caretaker_line = if caretaker_email.is_empty() {
        String::new()
    } else {
        format!("If you ever need help, your caretaker {caretaker_email} is here to support you.\n\n")
    };
    format!(
        "Hello {name},\n\n\
         Welcome to Adherex! We are happy to have you onboard.\n\n\
         Your account is registered under {email}.\n\n\
         {caretaker_line}\
         Stay healthy and take care!\n\n\
         The Adherex Team"
    )
}

/// Notice for a caretaker that their patient has registered.
pub fn caretaker_notice_body(patient_name: &str, patient_email: &str) -> String {
    format!(
        "Hello,\n\n\
         Your patient {patient_name} has registered with Adherex.\n\
         They sign in with {patient_email}; you can sign in with your own \
         email and their password to follow their adherence.\n\n\
         Please support them with care.\n\n\
         The Adherex Team"
    )
}
