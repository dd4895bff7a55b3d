//! The message pump: `send_rpc`/`recv_reply`/`recv_notif`, the session's
//! only points of contact with the wire once the hello handshake is done.
//!
//! Ported from `get_msg`/`nc_send_rpc`/`nc_recv_reply`/`nc_recv_notif` in
//! `session_client.c`. One deviation from the original, per design
//! decision (spec §4.2 Open Question): a `<rpc-reply>` read while waiting
//! for a *different* message-id is **parked** back onto the session's
//! reply queue instead of being discarded, so a second thread waiting on
//! that message-id still gets served. Likewise an out-of-turn
//! `<notification>` read while waiting for a reply is parked onto the
//! notification queue, same as the original.

use crate::error::Error;
use crate::reply::Reply;
use crate::rpc::RpcRequest;
use crate::session::{Session, SessionInner, SessionStatus};
use crate::timeout::{Deadline, Timeout};
use crate::xml::{self, Element};
use log::{trace, warn};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Acquire `mutex` within the remaining budget of `deadline`. `NonBlocking`
/// tries exactly once; `Infinite`/`Millis` poll `try_lock` at a short
/// interval, mirroring `nc_timedlock`'s busy-wait (no portable timed mutex
/// exists in `std`).
fn timed_lock<'a, T>(
    mutex: &'a Mutex<T>,
    deadline: &Deadline,
    session_id: u32,
) -> Result<MutexGuard<'a, T>, Error> {
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(std::sync::TryLockError::Poisoned(_)) => {
                return Err(Error::transport(session_id, "session lock poisoned"));
            }
            Err(std::sync::TryLockError::WouldBlock) => {}
        }
        if deadline.expired() {
            return Err(Error::would_block(session_id, "acquiring session lock"));
        }
        thread::sleep(LOCK_POLL_INTERVAL.min(deadline.remaining().unwrap_or(LOCK_POLL_INTERVAL)));
    }
}

/// What came off the wire, before we know whether it's what the caller
/// asked for.
enum Incoming {
    Reply(Element),
    Notif(Element),
}

impl Session {
    /// Build, validate and write one RPC. Returns the message-id the
    /// caller must later pass to `recv_reply`.
    pub fn send_rpc(&self, rpc: &RpcRequest, timeout: Timeout) -> Result<u64, Error> {
        if self.status() == SessionStatus::Invalid {
            return Err(Error::transport(self.id, "session is invalid"));
        }

        let tree = rpc.build(self.schema(), self.id)?;
        let msg_id = self.next_message_id();

        let mut envelope = Element::with_ns("rpc", xml::NETCONF_BASE_NS);
        envelope.set_attr("message-id", msg_id.to_string());
        envelope.push(tree);
        let wire = xml::to_string(&envelope).map_err(|e| Error::protocol(self.id, e.to_string()))?;

        let deadline = Deadline::start(timeout);
        let mut inner = timed_lock(&self.inner, &deadline, self.id)?;
        let result = inner.transport.write_xml(&wire);
        drop(inner);

        result
            .map(|_| msg_id)
            .map_err(|e| {
                self.set_status(SessionStatus::Invalid);
                Error::transport_io(self.id, "failed writing <rpc>", e)
            })?;

        if matches!(rpc, RpcRequest::Subscribe { .. }) {
            self.mark_subscribed();
        }

        Ok(msg_id)
    }

    /// Block (per `timeout`'s semantics) for the `<rpc-reply>` matching
    /// `msg_id`. `rpc` is the request that produced `msg_id`, needed to
    /// know whether this reply is allowed to carry data (spec §4.4). Any
    /// `<rpc-reply>` seen with a different message-id, or any
    /// `<notification>` seen while waiting, is parked for whoever is
    /// actually waiting on it.
    pub fn recv_reply(&self, rpc: &RpcRequest, msg_id: u64, timeout: Timeout) -> Result<Reply, Error> {
        if self.status() == SessionStatus::Invalid {
            return Err(Error::transport(self.id, "session is invalid"));
        }

        let deadline = Deadline::start(timeout);

        loop {
            let mut inner = timed_lock(&self.inner, &deadline, self.id)?;

            if let Some(pos) = inner
                .replies
                .iter()
                .position(|r| reply_message_id(r) == Some(msg_id))
            {
                let elem = inner.replies.remove(pos).expect("position just checked");
                drop(inner);
                return crate::reply::parse(&elem, rpc, self.id);
            }

            if deadline.expired() {
                return Err(Error::would_block(self.id, "waiting for <rpc-reply>"));
            }

            let incoming = match read_one(&mut inner, &deadline, self.id) {
                Ok(incoming) => incoming,
                Err(e) => {
                    drop(inner);
                    if e.is_fatal() {
                        self.set_status(SessionStatus::Invalid);
                    }
                    return Err(e);
                }
            };
            match incoming {
                Some(Incoming::Reply(elem)) => {
                    let Some(found_id) = reply_message_id(&elem) else {
                        drop(inner);
                        return Err(Error::protocol(self.id, "<rpc-reply> with no message-id"));
                    };
                    if found_id == msg_id {
                        drop(inner);
                        return crate::reply::parse(&elem, rpc, self.id);
                    }
                    trace!(
                        "session {}: parking <rpc-reply> message-id={} while waiting for {}",
                        self.id, found_id, msg_id
                    );
                    inner.replies.push_back(elem);
                }
                Some(Incoming::Notif(elem)) => {
                    trace!("session {}: parking <notification> while waiting for a reply", self.id);
                    inner.notifs.push_back(elem);
                }
                None => {}
            }
        }
    }

    /// Block for the next `<notification>`. Any `<rpc-reply>` seen while
    /// waiting is parked onto the reply queue (park-and-skip, symmetric
    /// with `recv_reply`).
    pub fn recv_notif(&self, timeout: Timeout) -> Result<crate::notification::Notification, Error> {
        if self.status() == SessionStatus::Invalid {
            return Err(Error::transport(self.id, "session is invalid"));
        }

        let deadline = Deadline::start(timeout);

        loop {
            let mut inner = timed_lock(&self.inner, &deadline, self.id)?;

            if let Some(elem) = inner.notifs.pop_front() {
                drop(inner);
                return crate::notification::Notification::parse(&elem, self.id);
            }

            if deadline.expired() {
                return Err(Error::would_block(self.id, "waiting for <notification>"));
            }

            let incoming = match read_one(&mut inner, &deadline, self.id) {
                Ok(incoming) => incoming,
                Err(e) => {
                    drop(inner);
                    if e.is_fatal() {
                        self.set_status(SessionStatus::Invalid);
                    }
                    return Err(e);
                }
            };
            match incoming {
                Some(Incoming::Notif(elem)) => {
                    drop(inner);
                    return crate::notification::Notification::parse(&elem, self.id);
                }
                Some(Incoming::Reply(elem)) => {
                    let Some(found_id) = reply_message_id(&elem) else {
                        warn!("session {}: discarding <rpc-reply> with no message-id", self.id);
                        continue;
                    };
                    trace!(
                        "session {}: parking unsolicited <rpc-reply> message-id={} while waiting for a notification",
                        self.id, found_id
                    );
                    inner.replies.push_back(elem);
                }
                None => {}
            }
        }
    }
}

fn reply_message_id(elem: &Element) -> Option<u64> {
    elem.attr("message-id").and_then(|s| s.parse::<u64>().ok())
}

/// Read exactly one full message off the wire, if the transport becomes
/// ready before `deadline` expires, and classify it. `<hello>`/`<rpc>`
/// arriving here are protocol violations (a client never receives either
/// after the handshake).
fn read_one(
    inner: &mut SessionInner,
    deadline: &Deadline,
    session_id: u32,
) -> Result<Option<Incoming>, Error> {
    let budget = deadline.remaining().unwrap_or(Duration::from_millis(50));
    let ready = inner
        .transport
        .poll_ready(budget)
        .map_err(|e| Error::transport_io(session_id, "polling transport", e))?;
    if !ready {
        return Ok(None);
    }

    let raw = inner
        .transport
        .read_xml()
        .map_err(|e| Error::transport_io(session_id, "reading message", e))?;
    let elem = xml::parse(&raw).map_err(|e| Error::protocol(session_id, e.to_string()))?;

    match elem.name.as_str() {
        "rpc-reply" => Ok(Some(Incoming::Reply(elem))),
        "notification" => Ok(Some(Incoming::Notif(elem))),
        "hello" => Err(Error::protocol(session_id, "received another <hello>")),
        "rpc" => Err(Error::protocol(session_id, "received <rpc> from a NETCONF server")),
        other => Err(Error::protocol(session_id, format!("unexpected message <{other}>"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::Datastore;
    use crate::rpc::RpcRequest;
    use crate::schema::TestSchemaContext;
    use std::collections::VecDeque as Queue;
    use std::io;
    use std::sync::Arc as StdArc;

    struct MockTransport {
        to_read: Queue<String>,
    }

    impl crate::transport::Transport for MockTransport {
        fn read_xml(&mut self) -> io::Result<String> {
            self.to_read
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "no more messages"))
        }

        fn write_xml(&mut self, _data: &str) -> io::Result<()> {
            Ok(())
        }
    }

    fn server_hello() -> String {
        r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><capabilities><capability>urn:ietf:params:netconf:base:1.1</capability></capabilities></hello>"#.to_string()
    }

    #[test]
    fn timed_lock_times_out_on_a_held_mutex() {
        let mutex = Mutex::new(0u32);
        let _guard = mutex.lock().unwrap();
        let deadline = crate::timeout::Deadline::start(Timeout::Millis(20));
        let err = timed_lock(&mutex, &deadline, 1).unwrap_err();
        assert!(err.is_would_block());
    }

    #[test]
    fn timed_lock_nonblocking_fails_fast_on_a_held_mutex() {
        let mutex = Mutex::new(0u32);
        let _guard = mutex.lock().unwrap();
        let deadline = crate::timeout::Deadline::start(Timeout::NonBlocking);
        assert!(timed_lock(&mutex, &deadline, 1).is_err());
    }

    #[test]
    fn reply_message_id_reads_the_attribute() {
        let elem = xml::parse(r#"<rpc-reply message-id="42" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><ok/></rpc-reply>"#).unwrap();
        assert_eq!(reply_message_id(&elem), Some(42));
    }

    #[test]
    fn reply_message_id_is_none_without_the_attribute() {
        let elem = xml::parse(r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><ok/></rpc-reply>"#).unwrap();
        assert_eq!(reply_message_id(&elem), None);
    }

    #[test]
    fn recv_reply_parks_an_out_of_order_reply_and_serves_both() {
        let transport = MockTransport {
            to_read: Queue::from([
                server_hello(),
                r#"<rpc-reply message-id="2" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><ok/></rpc-reply>"#.to_string(),
                r#"<rpc-reply message-id="1" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><ok/></rpc-reply>"#.to_string(),
            ]),
        };
        let schema: crate::schema::SchemaContextHandle =
            StdArc::new(Mutex::new(TestSchemaContext::new()));
        let session = Session::new(transport, schema).unwrap();

        let rpc = RpcRequest::Lock {
            target: Datastore::Candidate,
        };
        let first = session.send_rpc(&rpc, Timeout::Millis(1000)).unwrap();
        let second = session.send_rpc(&rpc, Timeout::Millis(1000)).unwrap();
        assert_eq!((first, second), (1, 2));

        // Reading for message-id 1 first means the message-id 2 reply read
        // off the wire along the way must be parked, not dropped.
        let reply_one = session.recv_reply(&rpc, first, Timeout::Millis(1000)).unwrap();
        assert_eq!(reply_one, Reply::Ok);
        let reply_two = session.recv_reply(&rpc, second, Timeout::Millis(1000)).unwrap();
        assert_eq!(reply_two, Reply::Ok);
    }
}
