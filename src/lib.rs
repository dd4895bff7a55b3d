//! # netconf-core
//!
//! Client-side core of a NETCONF ([RFC 6241](https://datatracker.ietf.org/doc/html/rfc6241),
//! [RFC 5277](https://datatracker.ietf.org/doc/html/rfc5277)) protocol
//! engine: the hello/capability handshake, capability-driven schema
//! discovery, a session message pump that demultiplexes replies from
//! asynchronous notifications, an RPC builder, and a structured
//! `<rpc-error>` reply parser.
//!
//! This crate does not establish transport connections, implement the
//! NETCONF framing layer, or provide a YANG data-modeling library — those
//! are external collaborators, named by the [`transport::Transport`] and
//! [`schema::SchemaContext`] traits. It also does not do logging
//! configuration, CLI argument parsing, or server-side session handling;
//! those are the embedding application's job.
//!
//! ## Quick start
//!
//! ```ignore
//! use netconf_core::session::Session;
//! use netconf_core::schema::TestSchemaContext;
//! use netconf_core::transport::ssh::SSHTransport;
//! use netconf_core::rpc::RpcRequest;
//! use netconf_core::datastore::Datastore;
//! use netconf_core::timeout::Timeout;
//! use std::sync::{Arc, Mutex};
//!
//! # fn main() -> Result<(), netconf_core::error::Error> {
//! let transport = SSHTransport::connect("192.168.1.1:830", "admin", "password")
//!     .map_err(|e| netconf_core::error::Error::transport_io(0, "connect", e))?;
//! let schema = Arc::new(Mutex::new(TestSchemaContext::new()));
//! let session = Session::new(transport, schema)?;
//!
//! let rpc = RpcRequest::GetConfig { source: Datastore::Running, filter: None, wd_mode: None };
//! let msg_id = session.send_rpc(&rpc, Timeout::Millis(5000))?;
//! let reply = session.recv_reply(&rpc, msg_id, Timeout::Millis(5000))?;
//! println!("{:?}", reply);
//! session.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! *Note: the ssh2 transport requires the `ssh2` feature (on by default).*
//!
//! ## Cargo features
//!
//! - **`ssh2`** (default): blocking SSH transport via the `ssh2` crate.
//! - **`russh`**: async SSH transport via `russh`, bridged to the
//!   synchronous [`transport::Transport`] trait this core drives.

pub mod capability;
pub mod client_opts;
pub mod datastore;
pub mod error;
pub mod notification;
pub mod pump;
pub mod reply;
pub mod rpc;
pub mod schema;
pub mod session;
pub mod timeout;
pub mod transport;
pub mod xml;
