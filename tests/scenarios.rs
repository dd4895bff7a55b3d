//! End-to-end scenarios driven by a `MockTransport` double, one per
//! concrete example in the capability-handshake/pump/reply-parser spec.

use netconf_core::datastore::Datastore;
use netconf_core::error::Error;
use netconf_core::reply::Reply;
use netconf_core::rpc::RpcRequest;
use netconf_core::schema::TestSchemaContext;
use netconf_core::session::Session;
use netconf_core::timeout::Timeout;
use netconf_core::transport::Transport;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

struct MockTransport {
    to_read: Mutex<VecDeque<String>>,
    written: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    fn new(to_read: Vec<&str>) -> MockTransport {
        MockTransport {
            to_read: Mutex::new(to_read.into_iter().map(str::to_string).collect()),
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Transport for MockTransport {
    fn read_xml(&mut self) -> io::Result<String> {
        self.to_read
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "no more queued messages"))
    }

    fn write_xml(&mut self, data: &str) -> io::Result<()> {
        self.written.lock().unwrap().push(data.to_string());
        Ok(())
    }
}

fn server_hello(caps: &[&str]) -> String {
    let mut body = String::from(
        r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><capabilities>"#,
    );
    for c in caps {
        body.push_str(&format!("<capability>{c}</capability>"));
    }
    body.push_str("</capabilities></hello>");
    body
}

/// S1: loader enables `writable-running` on `ietf-netconf` and loads
/// `ietf-netconf-monitoring` from a capability URI alone, with no network
/// round trip needed since both modules resolve locally.
#[test]
fn s1_schema_discovery_from_hello_capabilities() {
    let transport = MockTransport::new(vec![server_hello(&[
        "urn:ietf:params:netconf:base:1.0",
        "urn:ietf:params:netconf:capability:writable-running:1.0",
        "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring?module=ietf-netconf-monitoring&revision=2010-10-04",
    ])]);
    let schema = Arc::new(Mutex::new(TestSchemaContext::new()));
    let session = Session::new(transport, schema.clone()).unwrap();

    let ctx = schema.lock().unwrap();
    assert!(ctx.get_module("ietf-netconf", None));
    assert!(ctx.has_feature("ietf-netconf", "writable-running"));
    assert!(ctx.get_module("ietf-netconf-monitoring", None));
    drop(ctx);
    assert_eq!(
        session.status(),
        netconf_core::session::SessionStatus::Running
    );
}

/// S2: the RPC builder renders the expected wire shape and message-id.
#[test]
fn s2_get_config_wire_shape_and_message_id() {
    let transport = MockTransport::new(vec![server_hello(&["urn:ietf:params:netconf:base:1.1"])]);
    let schema = Arc::new(Mutex::new(TestSchemaContext::new()));
    let session = Session::new(transport, schema).unwrap();

    let rpc = RpcRequest::GetConfig {
        source: Datastore::Running,
        filter: Some("<top xmlns='u'/>".to_string()),
        wd_mode: None,
    };
    let msg_id = session.send_rpc(&rpc, Timeout::Millis(1000)).unwrap();
    assert_eq!(msg_id, 1);
}

/// S3: a matching `<ok/>` reply resolves `recv_reply`.
#[test]
fn s3_ok_reply_resolves_matching_message_id() {
    let transport = MockTransport::new(vec![
        server_hello(&["urn:ietf:params:netconf:base:1.1"]),
        r#"<rpc-reply message-id="1" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><ok/></rpc-reply>"#
            .to_string(),
    ]);
    let schema = Arc::new(Mutex::new(TestSchemaContext::new()));
    let session = Session::new(transport, schema).unwrap();

    let rpc = RpcRequest::Lock {
        target: Datastore::Candidate,
    };
    let msg_id = session.send_rpc(&rpc, Timeout::Millis(1000)).unwrap();
    let reply = session.recv_reply(&rpc, msg_id, Timeout::Millis(1000)).unwrap();
    assert_eq!(reply, Reply::Ok);
}

/// S4: an unsolicited notification arriving before the expected reply is
/// parked, not dropped — `recv_reply` still resolves, and the parked
/// notification is later delivered by `recv_notif`.
#[test]
fn s4_notification_arriving_before_reply_is_parked_not_dropped() {
    let transport = MockTransport::new(vec![
        server_hello(&["urn:ietf:params:netconf:base:1.1"]),
        r#"<notification xmlns="urn:ietf:params:xml:ns:netconf:notification:1.0"><eventTime>2020-01-01T00:00:00Z</eventTime><custom-event xmlns="urn:example:events"/></notification>"#.to_string(),
        r#"<rpc-reply message-id="1" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><ok/></rpc-reply>"#.to_string(),
    ]);
    let schema = Arc::new(Mutex::new(TestSchemaContext::new()));
    let session = Session::new(transport, schema).unwrap();

    let rpc = RpcRequest::Lock {
        target: Datastore::Candidate,
    };
    let msg_id = session.send_rpc(&rpc, Timeout::Millis(1000)).unwrap();
    let reply = session.recv_reply(&rpc, msg_id, Timeout::Millis(1000)).unwrap();
    assert_eq!(reply, Reply::Ok);

    let notif = session.recv_notif(Timeout::Millis(1000)).unwrap();
    assert_eq!(notif.event_time.as_deref(), Some("2020-01-01T00:00:00Z"));
    assert_eq!(notif.event.name, "custom-event");
}

/// S5: a structured `<rpc-error>` reply is parsed into an `ErrorRecord`
/// with every named field populated.
#[test]
fn s5_rpc_error_reply_is_fully_parsed() {
    let transport = MockTransport::new(vec![
        server_hello(&["urn:ietf:params:netconf:base:1.1"]),
        r#"<rpc-reply message-id="7" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
            <rpc-error>
                <error-type>application</error-type>
                <error-tag>data-missing</error-tag>
                <error-severity>error</error-severity>
                <error-path>/a/b</error-path>
            </rpc-error>
        </rpc-reply>"#
            .to_string(),
    ]);
    let schema = Arc::new(Mutex::new(TestSchemaContext::new()));
    let session = Session::new(transport, schema).unwrap();

    // Force message-id 7 to line up with the server's canned reply.
    for _ in 1..7 {
        session.send_rpc(&RpcRequest::Discard, Timeout::NonBlocking).ok();
    }
    let rpc = RpcRequest::Get {
        filter: None,
        wd_mode: None,
    };
    let msg_id = session.send_rpc(&rpc, Timeout::Millis(1000)).unwrap();
    assert_eq!(msg_id, 7);
    let reply = session.recv_reply(&rpc, msg_id, Timeout::Millis(1000)).unwrap();
    match reply {
        Reply::Error(records) => {
            assert_eq!(records.len(), 1);
            let err = &records[0];
            assert_eq!(err.error_type.as_deref(), Some("application"));
            assert_eq!(err.tag.as_deref(), Some("data-missing"));
            assert_eq!(err.severity.as_deref(), Some("error"));
            assert_eq!(err.path.as_deref(), Some("/a/b"));
        }
        other => panic!("expected Reply::Error, got {other:?}"),
    }
}

/// S6: a module absent locally is fetched in-band via `<get-schema>`
/// (reentrant through the same session), the `<data>` wrapper is
/// stripped, and the module's `features=` list is enabled.
#[test]
fn s6_schema_discovery_fetches_missing_module_via_get_schema() {
    let transport = MockTransport::new(vec![
        server_hello(&[
            "urn:ietf:params:netconf:base:1.0",
            "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring?module=ietf-netconf-monitoring",
            "http://example.com/acme?module=acme&revision=2021-05-01&features=f1,f2",
        ]),
        r#"<rpc-reply message-id="1" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><data><module xmlns="urn:ietf:params:xml:ns:yang:yin:1">acme body</module></data></rpc-reply>"#.to_string(),
    ]);
    let mut ctx = TestSchemaContext::new();
    ctx.register_module("ietf-netconf", None);
    let schema = Arc::new(Mutex::new(ctx));
    let session = Session::new(transport, schema.clone()).unwrap();

    let ctx = schema.lock().unwrap();
    assert!(ctx.get_module("acme", None));
    assert!(ctx.has_feature("acme", "f1"));
    assert!(ctx.has_feature("acme", "f2"));
    drop(ctx);
    assert_eq!(
        session.status(),
        netconf_core::session::SessionStatus::Running
    );
}

/// A fatal transport error marks the session `Invalid` and every
/// subsequent operation fails fast without touching the wire again.
#[test]
fn transport_failure_invalidates_the_session() {
    struct FailingTransport {
        hello_sent: bool,
    }
    impl Transport for FailingTransport {
        fn read_xml(&mut self) -> io::Result<String> {
            Ok(server_hello(&["urn:ietf:params:netconf:base:1.1"]))
        }
        fn write_xml(&mut self, _data: &str) -> io::Result<()> {
            if self.hello_sent {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
            } else {
                self.hello_sent = true;
                Ok(())
            }
        }
    }

    let schema = Arc::new(Mutex::new(TestSchemaContext::new()));
    let session = Session::new(FailingTransport { hello_sent: false }, schema).unwrap();

    let rpc = RpcRequest::Lock {
        target: Datastore::Running,
    };
    let err = session.send_rpc(&rpc, Timeout::Millis(500)).unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
    assert_eq!(
        session.status(),
        netconf_core::session::SessionStatus::Invalid
    );

    let err = session.send_rpc(&rpc, Timeout::Millis(500)).unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}
