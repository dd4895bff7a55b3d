//! Notifications (RFC 5277) and the dispatcher thread.
//!
//! `Notification::parse` mirrors the original's direct field extraction
//! from a `<notification>` element (no schema binding attempted here,
//! since event content is application-defined anyxml, spec §1's
//! out-of-scope YANG validation). The dispatch thread is ported from
//! `nc_recv_notif_dispatch`/`nc_recv_notif_thread`: a detached thread
//! polls `recv_notif` in a loop, handing each one to a callback, and
//! exits either when told to stop or when it sees the
//! `nc-notifications:notificationComplete` terminator.

use crate::error::Error;
use crate::timeout::Timeout;
use crate::xml::Element;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Namespace of the `nc-notifications` YANG module that defines the
/// `notificationComplete` sentinel (distinct from `NOTIFICATIONS_NS`, which
/// is the RFC 5277 wire namespace of `<notification>`/`<create-subscription>`
/// itself).
const NC_NOTIFICATIONS_MODULE_NS: &str = "urn:ietf:params:xml:ns:yang:ietf-nc-notifications";

/// A single parsed `<notification>` (spec §1, §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub event_time: Option<String>,
    /// The notification's event content, e.g. `<link-failure>...</...>`.
    pub event: Element,
}

impl Notification {
    pub(crate) fn parse(elem: &Element, session_id: u32) -> Result<Notification, Error> {
        if elem.name != "notification" {
            return Err(Error::protocol(
                session_id,
                format!("expected <notification>, got <{}>", elem.name),
            ));
        }
        let event_time = elem.child("eventTime").map(|e| e.text_trimmed().to_string());
        let event = elem
            .children
            .iter()
            .find(|c| c.name != "eventTime")
            .cloned()
            .ok_or_else(|| Error::protocol(session_id, "<notification> has no event content"))?;
        Ok(Notification { event_time, event })
    }

    /// `true` for the `nc-notifications:notificationComplete` sentinel
    /// that ends a `<create-subscription>` stream (spec §4.2). Checks both
    /// the schema name and the `nc-notifications` module namespace, since a
    /// vendor notification could otherwise coincidentally share the local
    /// name in a different namespace.
    pub fn is_completion(&self) -> bool {
        self.event.name == "notificationComplete"
            && self.event.ns.as_deref() == Some(NC_NOTIFICATIONS_MODULE_NS)
    }
}

const THREAD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a running dispatcher thread (spec supplement, grounded on
/// `nc_recv_notif_dispatch`). Dropping this handle does not stop the
/// thread; call `stop()` explicitly, same as the original requiring an
/// explicit dispatch teardown.
pub struct NotificationDispatcher {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl NotificationDispatcher {
    /// Spawn a thread that calls `recv_notif` in a loop and hands each
    /// notification to `callback`, until `callback` is dropped, `stop()`
    /// is called, or a `notificationComplete` notification arrives.
    pub fn spawn(
        session: Arc<crate::session::Session>,
        callback: impl Fn(&Notification) + Send + 'static,
    ) -> NotificationDispatcher {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop_flag = stop_flag.clone();

        let handle = std::thread::spawn(move || loop {
            if thread_stop_flag.load(Ordering::Relaxed) {
                break;
            }
            match session.recv_notif(Timeout::NonBlocking) {
                Ok(notif) => {
                    callback(&notif);
                    if notif.is_completion() {
                        break;
                    }
                }
                Err(e) if e.is_would_block() => {}
                Err(_) => break,
            }
            std::thread::sleep(THREAD_POLL_INTERVAL);
        });

        NotificationDispatcher {
            stop_flag,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for NotificationDispatcher {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    #[test]
    fn parses_event_time_and_content() {
        let raw = r#"<notification xmlns="urn:ietf:params:xml:ns:netconf:notification:1.0">
            <eventTime>2024-01-01T00:00:00Z</eventTime>
            <link-failure xmlns="urn:example:events"><if-name>eth0</if-name></link-failure>
        </notification>"#;
        let elem = xml::parse(raw).unwrap();
        let notif = Notification::parse(&elem, 1).unwrap();
        assert_eq!(notif.event_time.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(notif.event.name, "link-failure");
        assert!(!notif.is_completion());
    }

    #[test]
    fn recognizes_completion_sentinel() {
        let raw = r#"<notification xmlns="urn:ietf:params:xml:ns:netconf:notification:1.0">
            <eventTime>2024-01-01T00:00:00Z</eventTime>
            <notificationComplete xmlns="urn:ietf:params:xml:ns:yang:ietf-nc-notifications"/>
        </notification>"#;
        let elem = xml::parse(raw).unwrap();
        let notif = Notification::parse(&elem, 1).unwrap();
        assert!(notif.is_completion());
    }

    #[test]
    fn same_local_name_in_a_different_namespace_is_not_completion() {
        let raw = r#"<notification xmlns="urn:ietf:params:xml:ns:netconf:notification:1.0">
            <eventTime>2024-01-01T00:00:00Z</eventTime>
            <notificationComplete xmlns="urn:example:vendor-events"/>
        </notification>"#;
        let elem = xml::parse(raw).unwrap();
        let notif = Notification::parse(&elem, 1).unwrap();
        assert!(!notif.is_completion());
    }
}
