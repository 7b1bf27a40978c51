use lettre::address::Envelope;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Data, Mail, Rcpt, Rset};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;
use tracing::{debug, info, warn};

use crate::config::{SmtpConfig, TlsMode};

/// Session-level failures. None of these leave a usable session behind.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("TLS setup failed for {server}: {source}")]
    Tls {
        server: String,
        #[source]
        source: lettre::transport::smtp::Error,
    },

    #[error("could not connect to {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: lettre::transport::smtp::Error,
    },

    #[error("{server} does not offer STARTTLS")]
    StartTlsUnsupported { server: String },

    #[error("authentication failed for {username}: {source}")]
    Auth {
        username: String,
        #[source]
        source: lettre::transport::smtp::Error,
    },
}

/// Outcome of a single message submission.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The server or the message builder refused this recipient; the session is still usable.
    #[error("recipient rejected: {0}")]
    Rejected(String),

    /// The connection broke; later sends cannot succeed.
    #[error("session lost: {0}")]
    SessionLost(String),
}

impl From<lettre::transport::smtp::Error> for SendError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        // 4xx/5xx replies are about this message; anything else is the connection.
        // Only holds for the command-level calls in SmtpSession, which never abort.
        if e.is_permanent() || e.is_transient() {
            SendError::Rejected(e.to_string())
        } else {
            SendError::SessionLost(e.to_string())
        }
    }
}

/// An open, authenticated submission session.
pub trait MailSession: Send {
    fn send(&mut self, message: &Message) -> Result<(), SendError>;

    /// Ends the session. Must be safe to call more than once.
    fn close(&mut self);
}

/// Opens sessions against a mail submission server.
pub trait MailTransport: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn MailSession>, TransportError>;
}

pub struct SmtpMailTransport {
    config: SmtpConfig,
}

impl SmtpMailTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn tls_parameters(&self) -> Result<TlsParameters, TransportError> {
        TlsParameters::builder(self.config.server.clone())
            .dangerous_accept_invalid_certs(self.config.accept_invalid_certs)
            .build()
            .map_err(|source| TransportError::Tls {
                server: self.config.server.clone(),
                source,
            })
    }
}

impl MailTransport for SmtpMailTransport {
    fn open_session(&self) -> Result<Box<dyn MailSession>, TransportError> {
        let config = &self.config;
        let server = format!("{}:{}", config.server, config.port);
        let hello = ClientId::Domain(config.hello_name.clone());

        let implicit_tls = match config.tls {
            TlsMode::Implicit => Some(self.tls_parameters()?),
            TlsMode::StartTls | TlsMode::None => None,
        };

        let mut conn = SmtpConnection::connect(
            (config.server.as_str(), config.port),
            Some(config.connect_timeout),
            &hello,
            implicit_tls.as_ref(),
            None,
        )
        .map_err(|source| TransportError::Connect {
            server: server.clone(),
            source,
        })?;
        info!("Connected to SMTP server: {}", server);

        if config.tls == TlsMode::StartTls {
            if !conn.can_starttls() {
                conn.abort();
                return Err(TransportError::StartTlsUnsupported { server });
            }
            let tls = match self.tls_parameters() {
                Ok(tls) => tls,
                Err(e) => {
                    conn.abort();
                    return Err(e);
                }
            };
            if let Err(source) = conn.starttls(&tls, &hello) {
                conn.abort();
                return Err(TransportError::Tls { server, source });
            }
            debug!("STARTTLS established with {}", server);
        }

        if let Some((username, password)) = &config.credentials {
            let credentials = Credentials::new(username.clone(), password.clone());
            if let Err(source) = conn.auth(&[Mechanism::Plain, Mechanism::Login], &credentials) {
                conn.abort();
                return Err(TransportError::Auth {
                    username: username.clone(),
                    source,
                });
            }
            info!("Authenticated as {}", username);
        }

        Ok(Box::new(SmtpSession {
            conn,
            server,
            closed: false,
        }))
    }
}

struct SmtpSession {
    conn: SmtpConnection,
    server: String,
    closed: bool,
}

impl MailSession for SmtpSession {
    fn send(&mut self, message: &Message) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::SessionLost("session already closed".to_string()));
        }
        let result = self.transaction(message.envelope(), &message.formatted());
        if let Err(SendError::Rejected(reason)) = &result {
            // Clear the refused transaction so the next recipient starts clean.
            if let Err(e) = self.conn.command(Rset) {
                return Err(SendError::SessionLost(format!("{}; RSET failed: {}", reason, e)));
            }
        }
        result
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.conn.quit() {
            Ok(_) => info!("SMTP connection to {} closed", self.server),
            Err(e) => {
                warn!("QUIT failed on {}, dropping connection: {}", self.server, e);
                self.conn.abort();
            }
        }
    }
}

impl SmtpSession {
    /// MAIL, RCPT, DATA and the body as separate commands. Unlike
    /// `SmtpConnection::send` these leave the connection open on a negative reply.
    fn transaction(&mut self, envelope: &Envelope, body: &[u8]) -> Result<(), SendError> {
        self.conn.command(Mail::new(envelope.from().cloned(), vec![]))?;
        for recipient in envelope.to() {
            self.conn.command(Rcpt::new(recipient.clone(), vec![]))?;
        }
        self.conn.command(Data)?;
        self.conn.message(body)?;
        debug!("{} accepted message", self.server);
        Ok(())
    }
}

impl Drop for SmtpSession {
    fn drop(&mut self) {
        self.close();
    }
}
