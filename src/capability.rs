//! NETCONF capability URI grammar.
//!
//! Three shapes (spec §6):
//!   - `urn:ietf:params:netconf:base:1.x`                  — base, ignored beyond hello.
//!   - `urn:ietf:params:netconf:capability:<name>[:version]` — feature-enable request.
//!   - `<module-uri>?module=<name>[&revision=...][&features=f1,f2,...]` — module load request.
//!
//! Parsing follows the C source's manual `strstr`/`strchr` walk
//! (`ctx_check_and_load_model` in `session_client.c`) translated to `&str`
//! slicing; the invariant it encodes (spec §3) is that `module=` is present
//! in any capability this module is asked to treat as a module-load request.

pub const CAPABILITY_PREFIX: &str = "urn:ietf:params:netconf:capability:";
pub const BASE_PREFIX: &str = "urn:ietf:params:netconf:base:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    uri: String,
}

impl Capability {
    pub fn new(uri: impl Into<String>) -> Capability {
        Capability { uri: uri.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn is_base(&self) -> bool {
        self.uri.starts_with(BASE_PREFIX)
    }

    /// `Some(name[:version])` if this is a `urn:ietf:params:netconf:capability:`
    /// feature-enable request.
    pub fn feature_name(&self) -> Option<&str> {
        self.uri.strip_prefix(CAPABILITY_PREFIX)
    }

    /// Value of the `module=` query parameter, if present.
    pub fn module(&self) -> Option<&str> {
        query_param(&self.uri, "module")
    }

    pub fn revision(&self) -> Option<&str> {
        query_param(&self.uri, "revision")
    }

    /// Comma-separated `features=` values, split into individual names.
    pub fn features(&self) -> Vec<&str> {
        match query_param(&self.uri, "features") {
            Some(list) => list.split(',').filter(|s| !s.is_empty()).collect(),
            None => Vec::new(),
        }
    }

    /// `true` once `module()` is present, i.e. this capability is eligible
    /// to be handled by the Schema Context Loader's per-module load step.
    pub fn is_module_request(&self) -> bool {
        !self.is_base() && self.feature_name().is_none() && self.module().is_some()
    }
}

fn query_param<'a>(uri: &'a str, key: &str) -> Option<&'a str> {
    let query = uri.split_once('?').map(|(_, q)| q).unwrap_or(uri);
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix(key).and_then(|rest| rest.strip_prefix('=')) {
            return Some(value);
        }
    }
    None
}
