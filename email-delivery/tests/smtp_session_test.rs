use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use email_delivery::{DeliveryError, Dispatcher, SenderSource, SmtpConfig, TlsMode};

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .try_init()
            .ok();
    });
}

/// What the scripted server does when it sees `RCPT TO` for the refused address.
#[derive(Clone, Copy)]
enum OnRefused {
    Reply550,
    HangUp,
}

/// A one-connection SMTP server that records every command it receives.
struct ScriptedServer {
    port: u16,
    log: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    fn start(refused: &'static str, on_refused: OnRefused) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let log = Arc::new(Mutex::new(Vec::new()));
        let server_log = log.clone();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            server_log.lock().unwrap().push("CONNECT".to_string());
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            writer.write_all(b"220 scripted ESMTP ready\r\n").unwrap();

            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return;
                }
                let command = line.trim_end().to_string();
                server_log.lock().unwrap().push(command.clone());
                let upper = command.to_ascii_uppercase();

                let reply: &[u8] = if upper.starts_with("EHLO") || upper.starts_with("HELO") {
                    b"250 scripted\r\n"
                } else if upper.starts_with("RCPT") && command.contains(refused) {
                    match on_refused {
                        OnRefused::Reply550 => b"550 5.1.1 mailbox unavailable\r\n",
                        OnRefused::HangUp => return,
                    }
                } else if upper == "DATA" {
                    writer.write_all(b"354 end data with <CR><LF>.<CR><LF>\r\n").unwrap();
                    loop {
                        line.clear();
                        if reader.read_line(&mut line).unwrap_or(0) == 0 {
                            return;
                        }
                        if line == ".\r\n" {
                            break;
                        }
                    }
                    server_log.lock().unwrap().push("DELIVERED".to_string());
                    b"250 2.0.0 queued\r\n"
                } else if upper == "QUIT" {
                    let _ = writer.write_all(b"221 bye\r\n");
                    return;
                } else {
                    b"250 OK\r\n"
                };
                if writer.write_all(reply).is_err() {
                    return;
                }
            }
        });

        Self { port, log, handle }
    }

    fn finish(self) -> Vec<String> {
        self.handle.join().unwrap();
        Arc::try_unwrap(self.log).unwrap().into_inner().unwrap()
    }
}

fn dispatcher(port: u16) -> Dispatcher {
    let config = SmtpConfig {
        server: "127.0.0.1".to_string(),
        port,
        credentials: None,
        from_address: "news@example.com".to_string(),
        sender_source: SenderSource::EmailFrom,
        tls: TlsMode::None,
        connect_timeout: Duration::from_secs(5),
        accept_invalid_certs: false,
        hello_name: "localhost".to_string(),
    };
    Dispatcher::from_config(config, "LocalLLaMA Community Newsletter").unwrap()
}

fn recipients() -> Vec<String> {
    ["x@example.com", "y@example.com", "z@example.com"]
        .iter()
        .map(|a| a.to_string())
        .collect()
}

fn count(log: &[String], entry: &str) -> usize {
    log.iter().filter(|line| line.as_str() == entry).count()
}

#[test]
fn refused_recipient_keeps_the_smtp_session_alive() {
    init_tracing();
    let server = ScriptedServer::start("y@example.com", OnRefused::Reply550);

    let report = dispatcher(server.port)
        .deliver("OK TEXT", &recipients())
        .expect("batch should survive a refused recipient");

    assert_eq!(report.attempted().len(), 3);
    let succeeded: Vec<&str> = report.succeeded().iter().map(String::as_str).collect();
    assert_eq!(succeeded, vec!["x@example.com", "z@example.com"]);
    assert!(!report.is_complete());

    let log = server.finish();
    assert_eq!(count(&log, "CONNECT"), 1);
    assert_eq!(count(&log, "DELIVERED"), 2);
    assert_eq!(count(&log, "RSET"), 1);
    assert_eq!(count(&log, "QUIT"), 1);
    assert!(log.iter().any(|line| line == "RCPT TO:<z@example.com>"));
}

#[test]
fn dropped_connection_aborts_the_batch() {
    init_tracing();
    let server = ScriptedServer::start("y@example.com", OnRefused::HangUp);

    let err = dispatcher(server.port)
        .deliver("OK TEXT", &recipients())
        .unwrap_err();

    match err {
        DeliveryError::SessionLost { recipient, partial, .. } => {
            assert_eq!(recipient, "y@example.com");
            assert_eq!(partial.attempted().len(), 2);
            assert_eq!(partial.succeeded().len(), 1);
            assert!(partial.succeeded().contains("x@example.com"));
        }
        other => panic!("expected SessionLost, got {:?}", other),
    }

    let log = server.finish();
    assert_eq!(count(&log, "DELIVERED"), 1);
    assert!(!log.iter().any(|line| line.contains("z@example.com")));
}
