//! Renders a generated newsletter and delivers it to a list of subscribers
//! over one authenticated SMTP session.

pub mod config;
pub mod dispatcher;
pub mod render;
pub mod transport;

pub use config::{parse_recipients, SenderSource, SmtpConfig, TlsMode};
pub use dispatcher::{DeliveryError, Dispatcher};
pub use render::{render_newsletter, RenderedNewsletter};
pub use transport::{MailSession, MailTransport, SendError, SmtpMailTransport, TransportError};
