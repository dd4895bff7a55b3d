//! RPC Builder (spec §4.3).
//!
//! Converts a strongly-typed `RpcRequest` descriptor into a validated
//! `Element` tree ready to be wrapped in `<rpc message-id="...">` and
//! written to the transport. Pure with respect to I/O (spec §5): no schema
//! loading, no network access, just tree construction against an
//! already-populated `SchemaContext` followed by strict-mode validation.
//! Ported from `session_client.c`'s `nc_send_rpc`, one `match` arm per
//! `NC_RPC_*` case in that function's giant `switch`.

use crate::datastore::Datastore;
use crate::error::Error;
use crate::schema::SchemaContextHandle;
use crate::xml::{self, Element};

pub const NETCONF_NS: &str = crate::xml::NETCONF_BASE_NS;
pub const MONITORING_NS: &str = "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring";
pub const NOTIFICATIONS_NS: &str = "urn:ietf:params:xml:ns:netconf:notification:1.0";
pub const WITH_DEFAULTS_NS: &str = "urn:ietf:params:xml:ns:yang:ietf-netconf-with-defaults";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithDefaultsMode {
    All,
    AllTag,
    Trim,
    Explicit,
}

impl WithDefaultsMode {
    fn token(self) -> &'static str {
        match self {
            WithDefaultsMode::All => "report-all",
            WithDefaultsMode::AllTag => "report-all-tagged",
            WithDefaultsMode::Trim => "trim",
            WithDefaultsMode::Explicit => "explicit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultOperation {
    Merge,
    Replace,
    None,
}

impl DefaultOperation {
    fn token(self) -> &'static str {
        match self {
            DefaultOperation::Merge => "merge",
            DefaultOperation::Replace => "replace",
            DefaultOperation::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOption {
    TestThenSet,
    Set,
    TestOnly,
}

impl TestOption {
    fn token(self) -> &'static str {
        match self {
            TestOption::TestThenSet => "test-then-set",
            TestOption::Set => "set",
            TestOption::TestOnly => "test-only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOption {
    StopOnError,
    ContinueOnError,
    RollbackOnError,
}

impl ErrorOption {
    fn token(self) -> &'static str {
        match self {
            ErrorOption::StopOnError => "stop-on-error",
            ErrorOption::ContinueOnError => "continue-on-error",
            ErrorOption::RollbackOnError => "rollback-on-error",
        }
    }
}

/// Source/target alternative accepted by `copy-config`/`validate`: either a
/// named datastore, a URL, or inline config content (anyxml, "first byte is
/// `<`" heuristic, spec §9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Datastore(Datastore),
    Url(String),
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyTarget {
    Datastore(Datastore),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Datastore(Datastore),
    Url(String),
}

/// One variant per RPC kind in the closed set (spec §3). Each carries only
/// the fields meaningful to that RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    /// A caller-supplied rpc body, either already XML (starts with `<`) or
    /// named by `schema_node` so the reply parser can resolve its schema.
    Generic {
        xml: String,
        schema_node: Option<String>,
    },
    GetConfig {
        source: Datastore,
        filter: Option<String>,
        wd_mode: Option<WithDefaultsMode>,
    },
    Edit {
        target: Datastore,
        default_operation: Option<DefaultOperation>,
        test_option: Option<TestOption>,
        error_option: Option<ErrorOption>,
        /// Either inline config (starts with `<`) or a URL.
        edit_content: String,
    },
    Copy {
        target: CopyTarget,
        source: ConfigSource,
        wd_mode: Option<WithDefaultsMode>,
    },
    Delete {
        target: DeleteTarget,
    },
    Lock {
        target: Datastore,
    },
    Unlock {
        target: Datastore,
    },
    Get {
        filter: Option<String>,
        wd_mode: Option<WithDefaultsMode>,
    },
    Kill {
        session_id: u32,
    },
    Commit {
        confirmed: bool,
        confirm_timeout: Option<u32>,
        persist: Option<String>,
        persist_id: Option<String>,
    },
    Discard,
    /// Graceful shutdown request (spec supplement, grounded on
    /// `session_client.c`'s close path).
    Close,
    Cancel {
        persist_id: Option<String>,
    },
    Validate {
        source: ConfigSource,
    },
    GetSchema {
        identifier: String,
        version: Option<String>,
        format: Option<String>,
    },
    Subscribe {
        stream: Option<String>,
        filter: Option<String>,
        start_time: Option<String>,
        stop_time: Option<String>,
    },
}

impl RpcRequest {
    /// Name of the root element this descriptor produces, used by the reply
    /// parser to decide whether a non-`ok`/`rpc-error` reply is expected to
    /// carry data at all (spec §4.4: "RPC kinds whose RFC says 'no output'
    /// receiving data is an error").
    pub fn expects_data_reply(&self) -> bool {
        matches!(
            self,
            RpcRequest::Generic { .. }
                | RpcRequest::GetConfig { .. }
                | RpcRequest::Get { .. }
                | RpcRequest::GetSchema { .. }
        )
    }

    fn required_schema(&self) -> &'static str {
        match self {
            RpcRequest::GetSchema { .. } => "ietf-netconf-monitoring",
            RpcRequest::Subscribe { .. } => "notifications",
            RpcRequest::Generic { .. } => "ietf-netconf",
            _ => "ietf-netconf",
        }
    }

    fn wd_mode(&self) -> Option<WithDefaultsMode> {
        match self {
            RpcRequest::GetConfig { wd_mode, .. }
            | RpcRequest::Get { wd_mode, .. }
            | RpcRequest::Copy { wd_mode, .. } => *wd_mode,
            _ => None,
        }
    }

    /// Build the wire tree for this descriptor. `session_id` is used only
    /// to attribute errors; the builder itself performs no I/O.
    pub fn build(&self, ctx: &SchemaContextHandle, session_id: u32) -> Result<Element, Error> {
        let guard = ctx
            .lock()
            .map_err(|_| Error::transport(session_id, "schema context lock poisoned"))?;

        if !matches!(self, RpcRequest::Generic { .. }) {
            let required = self.required_schema();
            if !guard.get_module(required, None) {
                return Err(Error::schema(
                    session_id,
                    format!("required schema \"{required}\" not loaded"),
                ));
            }
        }
        if self.wd_mode().is_some() && !guard.get_module("ietf-netconf-with-defaults", None) {
            return Err(Error::schema(
                session_id,
                "with-defaults requested but \"ietf-netconf-with-defaults\" not loaded",
            ));
        }

        let tree = self.build_tree(session_id)?;

        guard
            .validate(&tree, true)
            .map_err(|message| Error::schema(session_id, format!("strict validation failed: {message}")))?;

        Ok(tree)
    }

    fn build_tree(&self, session_id: u32) -> Result<Element, Error> {
        match self {
            RpcRequest::Generic { xml, .. } => build_generic(xml, session_id),
            RpcRequest::GetConfig {
                source,
                filter,
                wd_mode,
            } => build_get_config(*source, filter.as_deref(), *wd_mode, session_id),
            RpcRequest::Edit {
                target,
                default_operation,
                test_option,
                error_option,
                edit_content,
            } => build_edit(
                *target,
                *default_operation,
                *test_option,
                *error_option,
                edit_content,
                session_id,
            ),
            RpcRequest::Copy {
                target,
                source,
                wd_mode,
            } => build_copy(target, source, *wd_mode, session_id),
            RpcRequest::Delete { target } => build_delete(target, session_id),
            RpcRequest::Lock { target } => Ok(build_lock_like("lock", *target)),
            RpcRequest::Unlock { target } => Ok(build_lock_like("unlock", *target)),
            RpcRequest::Get { filter, wd_mode } => {
                build_get(filter.as_deref(), *wd_mode, session_id)
            }
            RpcRequest::Kill { session_id: target_id } => Ok(build_kill(*target_id)),
            RpcRequest::Commit {
                confirmed,
                confirm_timeout,
                persist,
                persist_id,
            } => Ok(build_commit(*confirmed, *confirm_timeout, persist.as_deref(), persist_id.as_deref())),
            RpcRequest::Discard => Ok(Element::with_ns("discard-changes", NETCONF_NS)),
            RpcRequest::Close => Ok(Element::with_ns("close-session", NETCONF_NS)),
            RpcRequest::Cancel { persist_id } => Ok(build_cancel(persist_id.as_deref())),
            RpcRequest::Validate { source } => build_validate(source, session_id),
            RpcRequest::GetSchema {
                identifier,
                version,
                format,
            } => Ok(build_get_schema(identifier, version.as_deref(), format.as_deref())),
            RpcRequest::Subscribe {
                stream,
                filter,
                start_time,
                stop_time,
            } => build_subscribe(
                stream.as_deref(),
                filter.as_deref(),
                start_time.as_deref(),
                stop_time.as_deref(),
                session_id,
            ),
        }
    }
}

fn append_filter(parent: &mut Element, filter: &str, session_id: u32) -> Result<(), Error> {
    let mut node = Element::new("filter");
    if filter.trim_start().starts_with('<') {
        node.set_attr("type", "subtree");
        for child in fragment(filter, session_id)? {
            node.push(child);
        }
    } else {
        node.set_attr("type", "xpath");
        node.set_attr("select", filter);
    }
    parent.push(node);
    Ok(())
}

fn append_with_defaults(parent: &mut Element, wd_mode: Option<WithDefaultsMode>) {
    if let Some(mode) = wd_mode {
        let mut node = Element::with_ns("with-defaults", WITH_DEFAULTS_NS);
        node.set_text(mode.token());
        parent.push(node);
    }
}

fn fragment(xml: &str, session_id: u32) -> Result<Vec<Element>, Error> {
    xml::parse_fragment(xml)
        .map_err(|e| Error::schema(session_id, format!("invalid inline XML: {e}")))
}

fn build_generic(xml: &str, session_id: u32) -> Result<Element, Error> {
    let mut children = fragment(xml, session_id)?;
    if children.len() != 1 {
        return Err(Error::argument(
            session_id,
            "generic rpc body must be exactly one top-level element",
        ));
    }
    Ok(children.remove(0))
}

fn build_get_config(
    source: Datastore,
    filter: Option<&str>,
    wd_mode: Option<WithDefaultsMode>,
    session_id: u32,
) -> Result<Element, Error> {
    let mut root = Element::with_ns("get-config", NETCONF_NS);
    let mut source_node = Element::new("source");
    source_node.push(Element::new(source.as_token()));
    root.push(source_node);
    if let Some(filter) = filter {
        append_filter(&mut root, filter, session_id)?;
    }
    append_with_defaults(&mut root, wd_mode);
    Ok(root)
}

fn build_get(
    filter: Option<&str>,
    wd_mode: Option<WithDefaultsMode>,
    session_id: u32,
) -> Result<Element, Error> {
    let mut root = Element::with_ns("get", NETCONF_NS);
    if let Some(filter) = filter {
        append_filter(&mut root, filter, session_id)?;
    }
    append_with_defaults(&mut root, wd_mode);
    Ok(root)
}

fn build_edit(
    target: Datastore,
    default_operation: Option<DefaultOperation>,
    test_option: Option<TestOption>,
    error_option: Option<ErrorOption>,
    edit_content: &str,
    session_id: u32,
) -> Result<Element, Error> {
    let mut root = Element::with_ns("edit-config", NETCONF_NS);
    let mut target_node = Element::new("target");
    target_node.push(Element::new(target.as_token()));
    root.push(target_node);

    if let Some(op) = default_operation {
        let mut node = Element::new("default-operation");
        node.set_text(op.token());
        root.push(node);
    }
    if let Some(opt) = test_option {
        let mut node = Element::new("test-option");
        node.set_text(opt.token());
        root.push(node);
    }
    if let Some(opt) = error_option {
        let mut node = Element::new("error-option");
        node.set_text(opt.token());
        root.push(node);
    }

    if edit_content.trim_start().starts_with('<') {
        let mut config = Element::new("config");
        for child in fragment(edit_content, session_id)? {
            config.push(child);
        }
        root.push(config);
    } else {
        let mut url = Element::new("url");
        url.set_text(edit_content);
        root.push(url);
    }
    Ok(root)
}

fn build_copy(
    target: &CopyTarget,
    source: &ConfigSource,
    wd_mode: Option<WithDefaultsMode>,
    session_id: u32,
) -> Result<Element, Error> {
    let mut root = Element::with_ns("copy-config", NETCONF_NS);

    let mut target_node = Element::new("target");
    match target {
        CopyTarget::Datastore(ds) => target_node.push(Element::new(ds.as_token())),
        CopyTarget::Url(url) => {
            let mut node = Element::new("url");
            node.set_text(url.clone());
            target_node.push(node)
        }
    };
    root.push(target_node);

    let mut source_node = Element::new("source");
    push_config_source(&mut source_node, source, session_id)?;
    root.push(source_node);

    append_with_defaults(&mut root, wd_mode);
    Ok(root)
}

fn push_config_source(
    parent: &mut Element,
    source: &ConfigSource,
    session_id: u32,
) -> Result<(), Error> {
    match source {
        ConfigSource::Datastore(ds) => {
            parent.push(Element::new(ds.as_token()));
        }
        ConfigSource::Url(url) => {
            let mut node = Element::new("url");
            node.set_text(url.clone());
            parent.push(node);
        }
        ConfigSource::Config(xml) => {
            let mut config = Element::new("config");
            for child in fragment(xml, session_id)? {
                config.push(child);
            }
            parent.push(config);
        }
    }
    Ok(())
}

fn build_delete(target: &DeleteTarget, session_id: u32) -> Result<Element, Error> {
    let mut root = Element::with_ns("delete-config", NETCONF_NS);
    let mut target_node = Element::new("target");
    match target {
        DeleteTarget::Datastore(ds) => target_node.push(Element::new(ds.as_token())),
        DeleteTarget::Url(url) => {
            let mut node = Element::new("url");
            node.set_text(url.clone());
            target_node.push(node)
        }
    };
    root.push(target_node);
    let _ = session_id;
    Ok(root)
}

fn build_lock_like(name: &str, target: Datastore) -> Element {
    let mut root = Element::with_ns(name, NETCONF_NS);
    let mut target_node = Element::new("target");
    target_node.push(Element::new(target.as_token()));
    root.push(target_node);
    root
}

fn build_kill(session_id: u32) -> Element {
    let mut root = Element::with_ns("kill-session", NETCONF_NS);
    let mut node = Element::new("session-id");
    node.set_text(session_id.to_string());
    root.push(node);
    root
}

fn build_commit(
    confirmed: bool,
    confirm_timeout: Option<u32>,
    persist: Option<&str>,
    persist_id: Option<&str>,
) -> Element {
    let mut root = Element::with_ns("commit", NETCONF_NS);
    if confirmed {
        root.push(Element::new("confirmed"));
    }
    if let Some(timeout) = confirm_timeout {
        let mut node = Element::new("confirm-timeout");
        node.set_text(timeout.to_string());
        root.push(node);
    }
    if let Some(persist) = persist {
        let mut node = Element::new("persist");
        node.set_text(persist);
        root.push(node);
    }
    if let Some(persist_id) = persist_id {
        let mut node = Element::new("persist-id");
        node.set_text(persist_id);
        root.push(node);
    }
    root
}

fn build_cancel(persist_id: Option<&str>) -> Element {
    let mut root = Element::with_ns("cancel-commit", NETCONF_NS);
    if let Some(persist_id) = persist_id {
        let mut node = Element::new("persist-id");
        node.set_text(persist_id);
        root.push(node);
    }
    root
}

fn build_validate(source: &ConfigSource, session_id: u32) -> Result<Element, Error> {
    let mut root = Element::with_ns("validate", NETCONF_NS);
    let mut source_node = Element::new("source");
    push_config_source(&mut source_node, source, session_id)?;
    root.push(source_node);
    Ok(root)
}

fn build_get_schema(identifier: &str, version: Option<&str>, format: Option<&str>) -> Element {
    let mut root = Element::with_ns("get-schema", MONITORING_NS);
    let mut id_node = Element::new("identifier");
    id_node.set_text(identifier);
    root.push(id_node);
    if let Some(version) = version {
        let mut node = Element::new("version");
        node.set_text(version);
        root.push(node);
    }
    if let Some(format) = format {
        let mut node = Element::new("format");
        node.set_text(format);
        root.push(node);
    }
    root
}

fn build_subscribe(
    stream: Option<&str>,
    filter: Option<&str>,
    start_time: Option<&str>,
    stop_time: Option<&str>,
    session_id: u32,
) -> Result<Element, Error> {
    let mut root = Element::with_ns("create-subscription", NOTIFICATIONS_NS);
    if let Some(stream) = stream {
        let mut node = Element::new("stream");
        node.set_text(stream);
        root.push(node);
    }
    if let Some(filter) = filter {
        append_filter(&mut root, filter, session_id)?;
    }
    if let Some(start_time) = start_time {
        let mut node = Element::new("startTime");
        node.set_text(start_time);
        root.push(node);
    }
    if let Some(stop_time) = stop_time {
        let mut node = Element::new("stopTime");
        node.set_text(stop_time);
        root.push(node);
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TestSchemaContext;
    use std::sync::{Arc, Mutex};

    fn ctx_with(modules: &[&str]) -> SchemaContextHandle {
        let mut ctx = TestSchemaContext::new();
        for m in modules {
            ctx.register_module(m, None);
        }
        Arc::new(Mutex::new(ctx))
    }

    #[test]
    fn get_config_with_subtree_filter_matches_scenario_s2() {
        let ctx = ctx_with(&["ietf-netconf"]);
        let rpc = RpcRequest::GetConfig {
            source: Datastore::Running,
            filter: Some("<top xmlns='u'/>".to_string()),
            wd_mode: None,
        };
        let tree = rpc.build(&ctx, 1).unwrap();
        assert_eq!(tree.name, "get-config");
        assert_eq!(
            tree.child("source").unwrap().children[0].name,
            "running"
        );
        let filter = tree.child("filter").unwrap();
        assert_eq!(filter.attr("type"), Some("subtree"));
        assert_eq!(filter.children[0].name, "top");
    }

    #[test]
    fn get_config_with_xpath_filter() {
        let ctx = ctx_with(&["ietf-netconf"]);
        let rpc = RpcRequest::GetConfig {
            source: Datastore::Running,
            filter: Some("/a/b".to_string()),
            wd_mode: None,
        };
        let tree = rpc.build(&ctx, 1).unwrap();
        let filter = tree.child("filter").unwrap();
        assert_eq!(filter.attr("type"), Some("xpath"));
        assert_eq!(filter.attr("select"), Some("/a/b"));
    }

    #[test]
    fn missing_schema_is_a_build_error() {
        let ctx = ctx_with(&[]);
        let rpc = RpcRequest::GetConfig {
            source: Datastore::Running,
            filter: None,
            wd_mode: None,
        };
        assert!(matches!(rpc.build(&ctx, 1), Err(Error::Schema { .. })));
    }

    #[test]
    fn commit_confirmed_with_timeout_and_persist() {
        let ctx = ctx_with(&["ietf-netconf"]);
        let rpc = RpcRequest::Commit {
            confirmed: true,
            confirm_timeout: Some(120),
            persist: Some("abc".to_string()),
            persist_id: None,
        };
        let tree = rpc.build(&ctx, 1).unwrap();
        assert!(tree.child("confirmed").is_some());
        assert_eq!(tree.child("confirm-timeout").unwrap().text_trimmed(), "120");
        assert_eq!(tree.child("persist").unwrap().text_trimmed(), "abc");
    }

    #[test]
    fn kill_session_renders_decimal() {
        let ctx = ctx_with(&["ietf-netconf"]);
        let rpc = RpcRequest::Kill { session_id: 42 };
        let tree = rpc.build(&ctx, 1).unwrap();
        assert_eq!(tree.child("session-id").unwrap().text_trimmed(), "42");
    }

    #[test]
    fn get_schema_requires_monitoring_schema() {
        let ctx = ctx_with(&["ietf-netconf"]);
        let rpc = RpcRequest::GetSchema {
            identifier: "acme".to_string(),
            version: Some("2021-05-01".to_string()),
            format: Some("yin".to_string()),
        };
        assert!(matches!(rpc.build(&ctx, 1), Err(Error::Schema { .. })));

        let ctx = ctx_with(&["ietf-netconf-monitoring"]);
        let tree = rpc.build(&ctx, 1).unwrap();
        assert_eq!(tree.name, "get-schema");
        assert_eq!(tree.child("identifier").unwrap().text_trimmed(), "acme");
    }

    #[test]
    fn with_defaults_requires_matching_schema() {
        let ctx = ctx_with(&["ietf-netconf"]);
        let rpc = RpcRequest::Get {
            filter: None,
            wd_mode: Some(WithDefaultsMode::AllTag),
        };
        assert!(matches!(rpc.build(&ctx, 1), Err(Error::Schema { .. })));

        let ctx = ctx_with(&["ietf-netconf", "ietf-netconf-with-defaults"]);
        let tree = rpc.build(&ctx, 1).unwrap();
        assert_eq!(
            tree.child("with-defaults").unwrap().text_trimmed(),
            "report-all-tagged"
        );
    }

    #[test]
    fn build_then_serialize_then_parse_round_trip() {
        let ctx = ctx_with(&["ietf-netconf"]);
        let rpc = RpcRequest::Lock {
            target: Datastore::Candidate,
        };
        let tree = rpc.build(&ctx, 1).unwrap();
        let wire = xml::to_string(&tree).unwrap();
        let reparsed = xml::parse(&wire).unwrap();
        assert_eq!(reparsed.name, "lock");
        assert_eq!(reparsed.child("target").unwrap().children[0].name, "candidate");
    }
}
