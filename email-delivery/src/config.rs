use anyhow::Result;
use std::time::Duration;

/// How the SMTP connection is secured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain connect followed by STARTTLS (submission port 587).
    StartTls,
    /// TLS from the first byte (port 465).
    Implicit,
    /// No encryption. Only meant for local test servers.
    None,
}

impl TlsMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "starttls" | "" => Ok(TlsMode::StartTls),
            "tls" | "ssl" | "implicit" => Ok(TlsMode::Implicit),
            "none" | "plain" => Ok(TlsMode::None),
            other => Err(anyhow::anyhow!(
                "SMTP_SECURITY must be one of starttls, tls or none, got: {}",
                other
            )),
        }
    }
}

/// Which configuration value the envelope sender came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SenderSource {
    EmailFrom,
    SmtpUsername,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
    pub from_address: String,
    pub sender_source: SenderSource,
    pub tls: TlsMode,
    pub connect_timeout: Duration,
    pub accept_invalid_certs: bool,
    pub hello_name: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.credentials.as_ref().map(|(user, _)| user))
            .field("from_address", &self.from_address)
            .field("sender_source", &self.sender_source)
            .field("tls", &self.tls)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl SmtpConfig {
    /// Builds the SMTP configuration from `SMTP_*` and `EMAIL_FROM` keys.
    ///
    /// Server, username and password are required. The port defaults to 587,
    /// security to STARTTLS and the connect timeout to 30 seconds.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| anyhow::anyhow!("{} environment variable not set", key))
        };

        let server = require("SMTP_SERVER")?;
        let username = require("SMTP_USERNAME")?;
        let password = require("SMTP_PASSWORD")?;

        let port = match get("SMTP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("SMTP_PORT must be a valid port number: {}", e))?,
            None => 587,
        };

        let tls = match get("SMTP_SECURITY") {
            Some(raw) => TlsMode::parse(&raw)?,
            None => TlsMode::StartTls,
        };

        let connect_timeout = match get("SMTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .map_err(|e| anyhow::anyhow!("SMTP_TIMEOUT_SECS must be an integer: {}", e))?,
            ),
            None => Duration::from_secs(30),
        };

        let accept_invalid_certs = match get("SMTP_ACCEPT_INVALID_CERTS") {
            Some(raw) => raw.to_ascii_lowercase().parse::<bool>().map_err(|e| {
                anyhow::anyhow!("SMTP_ACCEPT_INVALID_CERTS must be true or false, got {}: {}", raw, e)
            })?,
            None => false,
        };

        let (from_address, sender_source) = resolve_sender(get("EMAIL_FROM"), &username);

        Ok(Self {
            server,
            port,
            credentials: Some((username, password)),
            from_address,
            sender_source,
            tls,
            connect_timeout,
            accept_invalid_certs,
            hello_name: get("SMTP_HELO_NAME").unwrap_or_else(|| "localhost".to_string()),
        })
    }
}

/// Picks the envelope sender: an explicit `EMAIL_FROM` wins, otherwise the
/// SMTP login name is used.
pub fn resolve_sender(email_from: Option<String>, smtp_username: &str) -> (String, SenderSource) {
    match email_from {
        Some(from) if !from.trim().is_empty() => (from.trim().to_string(), SenderSource::EmailFrom),
        _ => (smtp_username.to_string(), SenderSource::SmtpUsername),
    }
}

/// Splits a comma separated recipient list, dropping blanks and repeated
/// addresses while keeping first-seen order.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();
    for address in raw.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        if !recipients.iter().any(|seen| seen == address) {
            recipients.push(address.to_string());
        }
    }
    recipients
}
