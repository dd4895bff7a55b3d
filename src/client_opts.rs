//! Process-scoped client configuration (spec §9 redesign note: "Global
//! mutable state").
//!
//! The original keeps one file-scope `struct nc_client_opts` (the schema
//! search path, the list of sockets bound for Call Home) mutated directly
//! by every client thread with no synchronization beyond what the caller
//! happens to provide. That shape doesn't survive translation: this core
//! makes `ClientOptions` an explicit, constructible value type first, and
//! only optionally exposes a single `OnceLock`-backed process-wide
//! instance for callers who genuinely want the original's "just one set
//! of options for this process" behavior — instantiated and torn down
//! explicitly (`init_global`/`destroy_global`), never implicitly.
//!
//! Listener establishment for Call Home is transport-layer I/O (out of
//! scope per spec §1); `CallHomeBind` here only records the shape of a
//! bound listener an external collaborator manages, so this core's
//! session-acceptance path (not implemented; server-side is also out of
//! scope) has something typed to look up.

use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHomeBind {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    schema_search_path: Option<String>,
    call_home_binds: Vec<CallHomeBind>,
}

impl ClientOptions {
    pub fn new() -> ClientOptions {
        ClientOptions::default()
    }

    pub fn schema_search_path(&self) -> Option<&str> {
        self.schema_search_path.as_deref()
    }

    pub fn set_schema_search_path(&mut self, path: Option<impl Into<String>>) {
        self.schema_search_path = path.map(Into::into);
    }

    pub fn call_home_binds(&self) -> &[CallHomeBind] {
        &self.call_home_binds
    }

    pub fn add_call_home_bind(&mut self, address: impl Into<String>, port: u16) {
        self.call_home_binds.push(CallHomeBind {
            address: address.into(),
            port,
        });
    }

    /// Remove every registered bind matching the given, optional filters
    /// (mirrors `nc_client_ch_del_bind`'s "NULL/0 means any" matching).
    pub fn remove_call_home_binds(&mut self, address: Option<&str>, port: Option<u16>) {
        self.call_home_binds.retain(|b| {
            let address_matches = address.map(|a| a == b.address).unwrap_or(true);
            let port_matches = port.map(|p| p == b.port).unwrap_or(true);
            !(address_matches && port_matches)
        });
    }
}

static GLOBAL: OnceLock<Mutex<ClientOptions>> = OnceLock::new();

/// Install the process-wide `ClientOptions`, replacing any previous one.
/// Unlike the original's implicit file-scope global, a caller who never
/// calls this gets no global state at all.
pub fn init_global(options: ClientOptions) {
    match GLOBAL.get() {
        Some(slot) => *slot.lock().expect("client options lock poisoned") = options,
        None => {
            let _ = GLOBAL.set(Mutex::new(options));
        }
    }
}

/// Reset the process-wide `ClientOptions` back to defaults. Unlike a true
/// `destroy`, the backing `OnceLock` itself cannot be un-set; this is the
/// closest equivalent `std` allows.
pub fn destroy_global() {
    if let Some(slot) = GLOBAL.get() {
        *slot.lock().expect("client options lock poisoned") = ClientOptions::default();
    }
}

pub fn with_global<R>(f: impl FnOnce(&ClientOptions) -> R) -> Option<R> {
    GLOBAL
        .get()
        .map(|slot| f(&slot.lock().expect("client options lock poisoned")))
}
