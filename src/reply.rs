//! Reply parsing (spec §4.4).
//!
//! Ported line for line from `parse_reply`/`parse_rpc_error` in
//! `session_client.c`: a `<rpc-reply>` is exactly one of `<ok/>`, one or
//! more `<rpc-error>` siblings, or a data payload; mixing kinds is a
//! protocol violation. Each `<rpc-error>`'s known children populate typed
//! fields; the first occurrence of a duplicated singleton child wins and
//! the rest are logged, never fatal; unknown children (including the
//! foreign-namespace passthrough under `<error-info>`) are warned about
//! and preserved rather than rejected.

use crate::error::Error;
use crate::rpc::RpcRequest;
use crate::xml::Element;
use log::warn;

const KNOWN_ERROR_TYPES: &[&str] = &["transport", "rpc", "protocol", "application"];
const KNOWN_ERROR_TAGS: &[&str] = &[
    "in-use",
    "invalid-value",
    "too-big",
    "missing-attribute",
    "bad-attribute",
    "unknown-attribute",
    "missing-element",
    "bad-element",
    "unknown-element",
    "unknown-namespace",
    "access-denied",
    "lock-denied",
    "resource-denied",
    "rollback-failed",
    "data-exists",
    "data-missing",
    "operation-not-supported",
    "operation-failed",
    "malformed-message",
];
const KNOWN_SEVERITIES: &[&str] = &["error", "warning"];

/// A single `<rpc-error>` entry (spec §4.4). Fields absent from the wire
/// message stay `None`/empty rather than defaulting to a guessed value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorRecord {
    pub error_type: Option<String>,
    pub tag: Option<String>,
    pub severity: Option<String>,
    pub app_tag: Option<String>,
    pub path: Option<String>,
    pub message: Option<String>,
    pub message_lang: Option<String>,
    pub session_id: Option<String>,
    pub bad_attr: Vec<String>,
    pub bad_element: Vec<String>,
    pub bad_namespace: Vec<String>,
    /// `<error-info>` children in a foreign namespace, preserved verbatim
    /// rather than discarded (spec §4.4's anyxml passthrough).
    pub other: Vec<Element>,
}

/// The three shapes a `<rpc-reply>` can take (spec §4.4). `Data` carries
/// the raw `<rpc-reply>` element itself, since what counts as "the data"
/// depends on the RPC kind that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Data(Element),
    Error(Vec<ErrorRecord>),
}

/// Parse a `<rpc-reply>` element already stripped of its message-id check
/// (the pump does that). `rpc` tells us whether "no data" is expected for
/// this reply's matching request (spec §4.4: some RPC kinds never carry
/// data; receiving any is itself a protocol violation).
pub fn parse(reply_elem: &Element, rpc: &RpcRequest, session_id: u32) -> Result<Reply, Error> {
    if reply_elem.children.is_empty() {
        return Err(Error::protocol(session_id, "empty <rpc-reply>"));
    }

    let all_errors = reply_elem
        .children
        .iter()
        .all(|c| c.name == "rpc-error" && c.is_base_ns());
    if all_errors {
        let records = reply_elem.children.iter().map(parse_rpc_error).collect();
        return Ok(Reply::Error(records));
    }

    let first = &reply_elem.children[0];
    if reply_elem.children.len() == 1 && first.name == "ok" && first.is_base_ns() {
        return Ok(Reply::Ok);
    }

    if reply_elem
        .children
        .iter()
        .any(|c| c.name == "rpc-error" && c.is_base_ns())
    {
        return Err(Error::protocol(
            session_id,
            "mixed <rpc-error> and other content in <rpc-reply>",
        ));
    }

    if !rpc.expects_data_reply() {
        return Err(Error::protocol(
            session_id,
            "unexpected data in reply to an RPC with no declared output",
        ));
    }

    Ok(Reply::Data(reply_elem.clone()))
}

fn parse_rpc_error(xml: &Element) -> ErrorRecord {
    let mut err = ErrorRecord::default();

    for child in &xml.children {
        if child.ns.is_none() {
            warn!(
                "<rpc-error> child \"{}\" without namespace",
                child.name
            );
            continue;
        }
        if !child.is_base_ns() {
            warn!(
                "<rpc-error> child \"{}\" in an unknown namespace \"{}\"",
                child.name,
                child.ns.as_deref().unwrap_or("")
            );
            continue;
        }

        match child.name.as_str() {
            "error-type" => {
                let value = child.text_trimmed();
                if !KNOWN_ERROR_TYPES.contains(&value) {
                    warn!("<rpc-error> <error-type> unknown value \"{value}\"");
                } else if err.error_type.is_some() {
                    warn!("<rpc-error> <error-type> duplicated");
                } else {
                    err.error_type = Some(value.to_string());
                }
            }
            "error-tag" => {
                let value = child.text_trimmed();
                if !KNOWN_ERROR_TAGS.contains(&value) {
                    warn!("<rpc-error> <error-tag> unknown value \"{value}\"");
                } else if err.tag.is_some() {
                    warn!("<rpc-error> <error-tag> duplicated");
                } else {
                    err.tag = Some(value.to_string());
                }
            }
            "error-severity" => {
                let value = child.text_trimmed();
                if !KNOWN_SEVERITIES.contains(&value) {
                    warn!("<rpc-error> <error-severity> unknown value \"{value}\"");
                } else if err.severity.is_some() {
                    warn!("<rpc-error> <error-severity> duplicated");
                } else {
                    err.severity = Some(value.to_string());
                }
            }
            "error-app-tag" => {
                if err.app_tag.is_some() {
                    warn!("<rpc-error> <error-app-tag> duplicated");
                } else {
                    err.app_tag = Some(child.text_trimmed().to_string());
                }
            }
            "error-path" => {
                if err.path.is_some() {
                    warn!("<rpc-error> <error-path> duplicated");
                } else {
                    err.path = Some(child.text_trimmed().to_string());
                }
            }
            "error-message" => {
                if err.message.is_some() {
                    warn!("<rpc-error> <error-message> duplicated");
                } else {
                    if child.attr("lang").is_none() {
                        warn!("<rpc-error> <error-message> without recommended xml:lang attribute");
                    }
                    err.message_lang = child.attr("lang").map(str::to_string);
                    err.message = Some(child.text_trimmed().to_string());
                }
            }
            "error-info" => parse_error_info(child, &mut err),
            other => {
                warn!("<rpc-error> unknown child \"{other}\"");
            }
        }
    }

    err
}

fn parse_error_info(info: &Element, err: &mut ErrorRecord) {
    for child in &info.children {
        if child.is_base_ns() {
            match child.name.as_str() {
                "session-id" => {
                    if err.session_id.is_some() {
                        warn!("<rpc-error> <error-info> <session-id> duplicated");
                    } else {
                        err.session_id = Some(child.text_trimmed().to_string());
                    }
                }
                "bad-attribute" | "bad-attr" => err.bad_attr.push(child.text_trimmed().to_string()),
                "bad-element" => err.bad_element.push(child.text_trimmed().to_string()),
                "bad-namespace" => err.bad_namespace.push(child.text_trimmed().to_string()),
                other => warn!("<rpc-error> <error-info> unknown child \"{other}\""),
            }
        } else {
            err.other.push(child.clone());
        }
    }
}
