//! Session lifecycle: hello handshake, status, and the shared state the
//! message pump (`pump.rs`) operates on.
//!
//! Grounded on the teacher's `Connection` (construction wraps a boxed
//! `Transport`, `hello()` runs during construction) generalized to the
//! full NETCONF capability exchange, and on `nc_connect_inout`'s
//! status-transition order in `session_client.c`: the session is marked
//! running *before* schema discovery, because discovery reenters the
//! session to issue `<get-schema>` RPCs.

use crate::capability::Capability;
use crate::error::Error;
use crate::schema::loader::{self, GetSchemaFetcher, LoadOutcome};
use crate::schema::SchemaContextHandle;
use crate::transport::Transport;
use crate::xml::{self, Element};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// Lifecycle state of a session (spec §2). Only `Transport` errors ever
/// move a session to `Invalid`; every other error leaves it wherever it
/// was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Starting,
    Running,
    Closing,
    Closed,
    Invalid,
}

/// Mutable state guarded by the session's single lock: the transport
/// handle itself, and the two demultiplexed queues the message pump reads
/// from and writes to (spec §4.2's "one mutex per session guarding both
/// transport I/O and two FIFOs").
pub(crate) struct SessionInner {
    pub(crate) transport: Box<dyn Transport + Send>,
    pub(crate) replies: VecDeque<Element>,
    pub(crate) notifs: VecDeque<Element>,
}

pub struct Session {
    pub(crate) id: u32,
    pub(crate) inner: Mutex<SessionInner>,
    pub(crate) status: Mutex<SessionStatus>,
    pub(crate) next_msg_id: AtomicU64,
    pub(crate) capabilities: OnceLock<Vec<Capability>>,
    pub(crate) schema: SchemaContextHandle,
    pub(crate) subscribed: std::sync::atomic::AtomicBool,
}

static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);

const OUR_BASE_CAPABILITIES: &[&str] = &[
    "urn:ietf:params:netconf:base:1.0",
    "urn:ietf:params:netconf:base:1.1",
];

impl Session {
    /// Run the hello handshake over an already-open transport and, once
    /// the peer's capabilities are known, the schema discovery pass (spec
    /// §4.1). The session is reported `Running` to `send_rpc`/`recv_reply`
    /// before schema discovery starts, since discovery calls back into
    /// this same session to fetch modules via `<get-schema>`.
    pub fn new(
        transport: impl Transport + 'static,
        schema: SchemaContextHandle,
    ) -> Result<Arc<Session>, Error> {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Session {
            id,
            inner: Mutex::new(SessionInner {
                transport: Box::new(transport),
                replies: VecDeque::new(),
                notifs: VecDeque::new(),
            }),
            status: Mutex::new(SessionStatus::Starting),
            next_msg_id: AtomicU64::new(1),
            capabilities: OnceLock::new(),
            schema,
            subscribed: std::sync::atomic::AtomicBool::new(false),
        });

        let capabilities = session.exchange_hello()?;
        session
            .capabilities
            .set(capabilities)
            .expect("capabilities set exactly once, before publication");

        session.set_status(SessionStatus::Running);

        let fetcher: Arc<dyn GetSchemaFetcher> = {
            let session = session.clone();
            Arc::new(move |name: &str, revision: Option<&str>| {
                session.fetch_schema_inband(name, revision)
            })
        };

        let outcome = {
            let mut ctx = session
                .schema
                .lock()
                .map_err(|_| Error::transport(id, "schema context lock poisoned"))?;
            loader::load_schema_context(&mut *ctx, session.capabilities(), Some(fetcher))
        };
        match outcome {
            LoadOutcome::Ok => {}
            LoadOutcome::Partial { failed } => {
                warn!(
                    "session {id}: some models failed to load, data under them will be ignored: {failed:?}"
                );
            }
            LoadOutcome::Fatal(message) => {
                session.set_status(SessionStatus::Invalid);
                return Err(Error::schema(id, message));
            }
        }

        Ok(session)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.lock().expect("session status lock poisoned")
    }

    pub fn capabilities(&self) -> &[Capability] {
        self.capabilities.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn set_status(&self, status: SessionStatus) {
        *self.status.lock().expect("session status lock poisoned") = status;
        debug!("session {}: status -> {:?}", self.id, status);
    }

    pub(crate) fn next_message_id(&self) -> u64 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn schema(&self) -> &SchemaContextHandle {
        &self.schema
    }

    pub(crate) fn mark_subscribed(&self) {
        self.subscribed.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Relaxed)
    }

    fn exchange_hello(&self) -> Result<Vec<Capability>, Error> {
        let mut hello = Element::with_ns("hello", xml::NETCONF_BASE_NS);
        let mut caps = Element::new("capabilities");
        for uri in OUR_BASE_CAPABILITIES {
            let mut cap = Element::new("capability");
            cap.set_text(*uri);
            caps.push(cap);
        }
        hello.push(caps);
        let wire = xml::to_string(&hello).map_err(|e| Error::protocol(self.id, e.to_string()))?;

        let mut inner = self
            .inner
            .lock()
            .map_err(|_| Error::transport(self.id, "session lock poisoned"))?;
        inner
            .transport
            .write_xml(&wire)
            .map_err(|e| Error::transport_io(self.id, "failed writing <hello>", e))?;
        let response = inner
            .transport
            .read_xml()
            .map_err(|e| Error::transport_io(self.id, "failed reading <hello>", e))?;
        drop(inner);

        let tree = xml::parse(&response).map_err(|e| Error::protocol(self.id, e.to_string()))?;
        if tree.name != "hello" {
            return Err(Error::protocol(
                self.id,
                format!("expected <hello>, got <{}>", tree.name),
            ));
        }
        let capabilities = tree
            .child("capabilities")
            .ok_or_else(|| Error::protocol(self.id, "<hello> has no <capabilities>"))?
            .children_named("capability")
            .map(|c| Capability::new(c.text_trimmed().to_string()))
            .collect::<Vec<_>>();

        if !capabilities.iter().any(|c| c.is_base()) {
            return Err(Error::protocol(
                self.id,
                "peer <hello> advertised no base NETCONF capability",
            ));
        }

        info!(
            "session {}: hello exchange complete, {} peer capabilities",
            self.id,
            capabilities.len()
        );
        Ok(capabilities)
    }

    /// Reentrant in-band module fetch used as the schema context's
    /// `get-schema` callback (spec §4.1 step 1): issues an ordinary
    /// `<get-schema>` RPC through `send_rpc`/`recv_reply` on this same,
    /// already-`Running` session.
    fn fetch_schema_inband(&self, identifier: &str, revision: Option<&str>) -> Option<String> {
        use crate::rpc::RpcRequest;
        use crate::timeout::Timeout;

        let rpc = RpcRequest::GetSchema {
            identifier: identifier.to_string(),
            version: revision.map(str::to_string),
            format: Some("yin".to_string()),
        };
        let msg_id = match self.send_rpc(&rpc, Timeout::Millis(250)) {
            Ok(id) => id,
            Err(e) => {
                warn!("session {}: <get-schema> send failed: {e}", self.id);
                return None;
            }
        };
        match self.recv_reply(&rpc, msg_id, Timeout::Millis(250)) {
            Ok(crate::reply::Reply::Data(data)) => data
                .child("data")
                .map(|d| xml::to_string(d).unwrap_or_default())
                .map(|wire| strip_outer_element(&wire).to_string()),
            Ok(other) => {
                warn!("session {}: unexpected <get-schema> reply {other:?}", self.id);
                None
            }
            Err(e) => {
                warn!("session {}: <get-schema> recv failed: {e}", self.id);
                None
            }
        }
    }

    /// Close gracefully with `<close-session>`, falling back to just
    /// marking the session `Closed` if the peer never answers (spec
    /// supplement, grounded on `session_client.c`'s shutdown path).
    pub fn close(self: &Arc<Session>) -> Result<(), Error> {
        use crate::rpc::RpcRequest;
        use crate::timeout::Timeout;

        if self.status() != SessionStatus::Running {
            return Ok(());
        }
        self.set_status(SessionStatus::Closing);

        let result = (|| {
            let rpc = RpcRequest::Close;
            let msg_id = self.send_rpc(&rpc, Timeout::Millis(2000))?;
            self.recv_reply(&rpc, msg_id, Timeout::Millis(2000))
        })();

        self.set_status(SessionStatus::Closed);
        result.map(|_| ())
    }
}

/// Strip the outermost element's start and end tags from its serialized
/// form by removing bytes up to and including the first `>` and from the
/// last `<` onward, mirroring `session_client.c`'s `strchr`/`strrchr`/
/// `strndup` unwrap of the `<get-schema>` anyxml payload. A byte-range
/// operation on purpose: going through `Element` would silently drop any
/// text/element content after the wrapper's first child.
fn strip_outer_element(wire: &str) -> &str {
    let Some(start) = wire.find('>') else {
        return "";
    };
    let Some(end) = wire.rfind('<') else {
        return "";
    };
    if end <= start + 1 {
        return "";
    }
    &wire[start + 1..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TestSchemaContext;
    use std::io;
    use std::sync::Mutex as StdMutex;

    struct MockTransport {
        to_read: VecDeque<String>,
        written: Arc<StdMutex<Vec<String>>>,
    }

    impl Transport for MockTransport {
        fn read_xml(&mut self) -> io::Result<String> {
            self.to_read
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more messages"))
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

    #[test]
    fn hello_exchange_records_peer_capabilities() {
        let transport = MockTransport {
            to_read: VecDeque::from([server_hello(&[
                "urn:ietf:params:netconf:base:1.1",
                "urn:ietf:params:netconf:capability:candidate:1.0",
            ])]),
            written: Arc::new(StdMutex::new(Vec::new())),
        };
        let schema: SchemaContextHandle = Arc::new(Mutex::new(TestSchemaContext::new()));
        let session = Session::new(transport, schema).unwrap();
        assert_eq!(session.status(), SessionStatus::Running);
        assert_eq!(session.capabilities().len(), 2);
    }

    #[test]
    fn hello_without_base_capability_is_protocol_error() {
        let transport = MockTransport {
            to_read: VecDeque::from([server_hello(&["urn:example:not-netconf"])]),
            written: Arc::new(StdMutex::new(Vec::new())),
        };
        let schema: SchemaContextHandle = Arc::new(Mutex::new(TestSchemaContext::new()));
        let err = Session::new(transport, schema).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn strip_outer_element_unwraps_the_data_tag() {
        let wire = r#"<data xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">module acme { }</data>"#;
        assert_eq!(strip_outer_element(wire), "module acme { }");
    }

    #[test]
    fn strip_outer_element_preserves_nested_markup() {
        let wire = r#"<data xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><module>acme</module></data>"#;
        assert_eq!(strip_outer_element(wire), "<module>acme</module>");
    }
}
