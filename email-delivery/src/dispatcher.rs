use std::ops::{Deref, DerefMut};

use interfaces::defs::DeliveryReport;
use lettre::message::{Mailbox, MultiPart};
use lettre::Message;
use tracing::{error, info, warn};

use crate::config::SmtpConfig;
use crate::render::{render_newsletter, RenderedNewsletter};
use crate::transport::{MailSession, MailTransport, SendError, SmtpMailTransport, TransportError};

/// Failures that end a delivery batch before every recipient was tried.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("transport unavailable: {0}")]
    Transport(#[from] TransportError),

    #[error("session lost while sending to {recipient}: {reason}")]
    SessionLost {
        recipient: String,
        reason: String,
        partial: DeliveryReport,
    },
}

/// Sends one rendered newsletter to every subscriber over a single session.
pub struct Dispatcher {
    transport: Box<dyn MailTransport>,
    sender: Mailbox,
    title: String,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn MailTransport>, sender: Mailbox, title: impl Into<String>) -> Self {
        Self {
            transport,
            sender,
            title: title.into(),
        }
    }

    pub fn from_config(config: SmtpConfig, title: impl Into<String>) -> anyhow::Result<Self> {
        let sender: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid sender address '{}': {}", config.from_address, e))?;
        info!(
            "Sending as {} (from {:?})",
            config.from_address, config.sender_source
        );
        Ok(Self::new(Box::new(SmtpMailTransport::new(config)), sender, title))
    }

    /// Delivers `text` to each recipient in order.
    ///
    /// A rejected recipient is recorded and the batch continues. Failing to
    /// open the session, or losing it mid-batch, aborts the batch. The session
    /// is closed on every path out of this function.
    pub fn deliver(&self, text: &str, recipients: &[String]) -> Result<DeliveryReport, DeliveryError> {
        let mut report = DeliveryReport::new();
        if recipients.is_empty() {
            warn!("No recipients configured, nothing to deliver");
            return Ok(report);
        }

        let rendered = render_newsletter(&self.title, text);
        info!(
            "Rendered newsletter ({} chars plain, {} chars html) for {} recipients",
            rendered.plain.len(),
            rendered.html.len(),
            recipients.len()
        );

        let mut session = SessionGuard(self.transport.open_session()?);

        for recipient in recipients {
            match self.send_one(&mut *session, &rendered, recipient) {
                Ok(()) => {
                    info!("Email sent to: {}", recipient);
                    report.record(recipient, true);
                }
                Err(SendError::Rejected(reason)) => {
                    warn!("Failed to send to {}: {}", recipient, reason);
                    report.record(recipient, false);
                }
                Err(SendError::SessionLost(reason)) => {
                    error!("Connection lost while sending to {}: {}", recipient, reason);
                    report.record(recipient, false);
                    return Err(DeliveryError::SessionLost {
                        recipient: recipient.clone(),
                        reason,
                        partial: report,
                    });
                }
            }
        }

        info!(
            "Delivery finished: {}/{} recipients succeeded",
            report.succeeded().len(),
            report.attempted().len()
        );
        Ok(report)
    }

    fn send_one(
        &self,
        session: &mut dyn MailSession,
        rendered: &RenderedNewsletter,
        recipient: &str,
    ) -> Result<(), SendError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| SendError::Rejected(format!("invalid address '{}': {}", recipient, e)))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(rendered.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                rendered.plain.clone(),
                rendered.html.clone(),
            ))
            .map_err(|e| SendError::Rejected(format!("could not build message: {}", e)))?;

        session.send(&message)
    }
}

/// Closes the wrapped session when dropped.
struct SessionGuard(Box<dyn MailSession>);

impl Deref for SessionGuard {
    type Target = dyn MailSession;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}
