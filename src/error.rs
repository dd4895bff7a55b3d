//! Crate-wide error type.
//!
//! One enum covers every failure kind named in the core's error handling
//! design: caller mistakes (`Argument`), plain timeouts (`WouldBlock`),
//! malformed or unexpected wire traffic (`Protocol`), missing or invalid
//! schema state (`Schema`), and I/O or locking failures (`Transport`). A
//! `Transport` error is the only kind that should ever cause a session to
//! move to `SessionStatus::Invalid`; the others are reported back to the
//! caller with the session left usable.

/// Every public, fallible operation in this crate returns this error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller passed invalid parameters: nil required fields, wrong session
    /// side/status, reserved parser option bits, and the like.
    #[error("session {session_id}: invalid argument: {message}")]
    Argument { session_id: u32, message: String },

    /// No fatal condition, just no data available within the timeout.
    #[error("session {session_id}: would block ({context})")]
    WouldBlock { session_id: u32, context: String },

    /// Malformed or unexpected message: a reply missing `message-id`, an
    /// `<rpc>` arriving at a client, mixed `<rpc-error>`/other siblings, an
    /// empty `<rpc-reply>`. The offending message is discarded; the session
    /// itself is not torn down.
    #[error("session {session_id}: protocol violation: {message}")]
    Protocol { session_id: u32, message: String },

    /// A required schema module is missing at RPC build time, or
    /// strict-mode validation of a built tree failed.
    #[error("session {session_id}: schema error: {message}")]
    Schema { session_id: u32, message: String },

    /// Framing/I/O failure surfaced from the transport collaborator, or a
    /// failure to acquire the session lock. Fatal: the session is marked
    /// `Invalid` and every subsequent call on it fails fast.
    #[error("session {session_id}: transport/internal error: {message}")]
    Transport {
        session_id: u32,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl Error {
    pub fn session_id(&self) -> u32 {
        match self {
            Error::Argument { session_id, .. }
            | Error::WouldBlock { session_id, .. }
            | Error::Protocol { session_id, .. }
            | Error::Schema { session_id, .. }
            | Error::Transport { session_id, .. } => *session_id,
        }
    }

    pub fn argument(session_id: u32, message: impl Into<String>) -> Error {
        Error::Argument {
            session_id,
            message: message.into(),
        }
    }

    pub fn would_block(session_id: u32, context: impl Into<String>) -> Error {
        Error::WouldBlock {
            session_id,
            context: context.into(),
        }
    }

    pub fn protocol(session_id: u32, message: impl Into<String>) -> Error {
        Error::Protocol {
            session_id,
            message: message.into(),
        }
    }

    pub fn schema(session_id: u32, message: impl Into<String>) -> Error {
        Error::Schema {
            session_id,
            message: message.into(),
        }
    }

    pub fn transport(session_id: u32, message: impl Into<String>) -> Error {
        Error::Transport {
            session_id,
            message: message.into(),
            source: None,
        }
    }

    pub fn transport_io(session_id: u32, message: impl Into<String>, source: std::io::Error) -> Error {
        Error::Transport {
            session_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// `true` for the one error kind a caller can retry without changing
    /// anything: a plain timeout.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::WouldBlock { .. })
    }

    /// `true` for the only error kind that invalidates the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}

