use std::sync::{Arc, Mutex, Once};

use email_delivery::{DeliveryError, Dispatcher, MailSession, MailTransport, SendError, TransportError};
use lettre::message::Mailbox;
use lettre::Message;
use mail_parser::MessageParser;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();
    });
}

#[derive(Default)]
struct Recorder {
    opened: usize,
    closed: usize,
    delivered: Vec<(String, Vec<u8>)>,
}

/// Scripted transport: recipients listed in `reject` get a 5xx-style refusal,
/// those in `drop_connection` break the session.
struct FakeTransport {
    recorder: Arc<Mutex<Recorder>>,
    reject: Vec<String>,
    drop_connection: Vec<String>,
    refuse_connect: bool,
}

impl FakeTransport {
    fn new(recorder: Arc<Mutex<Recorder>>) -> Self {
        Self {
            recorder,
            reject: vec![],
            drop_connection: vec![],
            refuse_connect: false,
        }
    }
}

struct FakeSession {
    recorder: Arc<Mutex<Recorder>>,
    reject: Vec<String>,
    drop_connection: Vec<String>,
}

impl MailTransport for FakeTransport {
    fn open_session(&self) -> Result<Box<dyn MailSession>, TransportError> {
        if self.refuse_connect {
            return Err(TransportError::StartTlsUnsupported {
                server: "smtp.test:587".to_string(),
            });
        }
        self.recorder.lock().unwrap().opened += 1;
        Ok(Box::new(FakeSession {
            recorder: self.recorder.clone(),
            reject: self.reject.clone(),
            drop_connection: self.drop_connection.clone(),
        }))
    }
}

impl MailSession for FakeSession {
    fn send(&mut self, message: &Message) -> Result<(), SendError> {
        let to = message.envelope().to()[0].to_string();
        if self.reject.contains(&to) {
            return Err(SendError::Rejected(format!("550 mailbox unavailable: {}", to)));
        }
        if self.drop_connection.contains(&to) {
            return Err(SendError::SessionLost("connection reset by peer".to_string()));
        }
        self.recorder
            .lock()
            .unwrap()
            .delivered
            .push((to, message.formatted()));
        Ok(())
    }

    fn close(&mut self) {
        self.recorder.lock().unwrap().closed += 1;
    }
}

fn dispatcher(transport: FakeTransport) -> Dispatcher {
    init_tracing();
    let sender: Mailbox = "Newsletter <news@example.com>".parse().unwrap();
    Dispatcher::new(Box::new(transport), sender, "LocalLLaMA Community Newsletter")
}

fn addresses(list: &[&str]) -> Vec<String> {
    list.iter().map(|a| a.to_string()).collect()
}

#[test]
fn one_rejected_recipient_does_not_stop_the_batch() {
    let recorder = Arc::new(Mutex::new(Recorder::default()));
    let mut transport = FakeTransport::new(recorder.clone());
    transport.reject = addresses(&["y@example.com"]);

    let report = dispatcher(transport)
        .deliver("# Hello", &addresses(&["x@example.com", "y@example.com", "z@example.com"]))
        .expect("batch should complete");

    assert_eq!(report.attempted().len(), 3);
    assert!(report.succeeded().contains("x@example.com"));
    assert!(report.succeeded().contains("z@example.com"));
    assert!(!report.succeeded().contains("y@example.com"));
    assert!(!report.is_complete());

    let recorder = recorder.lock().unwrap();
    assert_eq!(recorder.opened, 1);
    assert_eq!(recorder.closed, 1);
    let sent_to: Vec<&str> = recorder.delivered.iter().map(|(to, _)| to.as_str()).collect();
    assert_eq!(sent_to, vec!["x@example.com", "z@example.com"]);
}

#[test]
fn malformed_address_is_a_recipient_failure() {
    let recorder = Arc::new(Mutex::new(Recorder::default()));
    let report = dispatcher(FakeTransport::new(recorder.clone()))
        .deliver("text", &addresses(&["not an address", "ok@example.com"]))
        .unwrap();

    assert_eq!(report.attempted().len(), 2);
    assert_eq!(report.succeeded().len(), 1);
    assert_eq!(report.failed().collect::<Vec<_>>(), vec!["not an address"]);
    assert_eq!(recorder.lock().unwrap().closed, 1);
}

#[test]
fn all_recipients_succeeding_is_complete() {
    let recorder = Arc::new(Mutex::new(Recorder::default()));
    let report = dispatcher(FakeTransport::new(recorder.clone()))
        .deliver("text", &addresses(&["a@example.com", "b@example.com"]))
        .unwrap();
    assert!(report.is_complete());
}

#[test]
fn delivered_message_is_multipart_with_rendered_html() {
    let recorder = Arc::new(Mutex::new(Recorder::default()));
    dispatcher(FakeTransport::new(recorder.clone()))
        .deliver("## 🤖 Models\n\n**u/dev** says OK TEXT", &addresses(&["a@example.com"]))
        .unwrap();

    let recorder = recorder.lock().unwrap();
    let (_, raw) = &recorder.delivered[0];
    let parsed = MessageParser::default().parse(raw.as_slice()).expect("valid MIME");

    assert_eq!(parsed.subject(), Some("LocalLLaMA Community Newsletter"));
    let html = parsed.body_html(0).expect("html part");
    assert!(html.contains("<strong>u/dev</strong> says OK TEXT"));
    assert!(html.contains("font-family: Arial"));
    let plain = parsed.body_text(0).expect("plain part");
    assert!(plain.contains("**u/dev** says OK TEXT"));
}

#[test]
fn connect_failure_aborts_before_any_send() {
    let recorder = Arc::new(Mutex::new(Recorder::default()));
    let mut transport = FakeTransport::new(recorder.clone());
    transport.refuse_connect = true;

    let err = dispatcher(transport)
        .deliver("text", &addresses(&["a@example.com"]))
        .unwrap_err();

    assert!(matches!(err, DeliveryError::Transport(_)));
    let recorder = recorder.lock().unwrap();
    assert_eq!(recorder.opened, 0);
    assert!(recorder.delivered.is_empty());
}

#[test]
fn lost_session_aborts_the_rest_and_still_closes() {
    let recorder = Arc::new(Mutex::new(Recorder::default()));
    let mut transport = FakeTransport::new(recorder.clone());
    transport.drop_connection = addresses(&["b@example.com"]);

    let err = dispatcher(transport)
        .deliver(
            "text",
            &addresses(&["a@example.com", "b@example.com", "c@example.com"]),
        )
        .unwrap_err();

    match err {
        DeliveryError::SessionLost { recipient, partial, .. } => {
            assert_eq!(recipient, "b@example.com");
            assert_eq!(partial.attempted().len(), 2);
            assert_eq!(partial.succeeded().len(), 1);
            assert!(!partial.attempted().contains("c@example.com"));
        }
        other => panic!("expected SessionLost, got {:?}", other),
    }

    let recorder = recorder.lock().unwrap();
    assert_eq!(recorder.closed, 1);
    assert_eq!(recorder.delivered.len(), 1);
}

#[test]
fn empty_recipient_list_opens_no_session() {
    let recorder = Arc::new(Mutex::new(Recorder::default()));
    let report = dispatcher(FakeTransport::new(recorder.clone()))
        .deliver("text", &[])
        .unwrap();

    assert!(report.attempted().is_empty());
    assert!(!report.is_complete());
    assert_eq!(recorder.lock().unwrap().opened, 0);
}
