//! Generic XML element tree.
//!
//! The teacher parsed NETCONF replies straight into fixed serde structs.
//! This core cannot: `<rpc-error>` carries an open-ended, repeatable child
//! set with foreign-namespace `<error-info>` passthrough, anyxml payloads
//! (`<filter>`, `<config>`, `<get-schema>` output) are opaque trees, and the
//! message pump needs to classify a message by its first child element
//! before it knows what, if anything, to deserialize. `Element` is the
//! minimal DOM replacing the C source's `struct lyxml_elem` linked list
//! (spec redesign note: no pointer arithmetic needed at this level).

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Writer};
use std::io::Cursor;

/// Base NETCONF namespace every `<rpc>`, `<rpc-reply>`, `<hello>`, and
/// `<notification>` element lives in.
pub const NETCONF_BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("xml parse error: {0}")]
    Parse(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("malformed xml: {0}")]
    Malformed(String),
}

/// A parsed (or to-be-serialized) XML element, namespace included, with its
/// attributes, inline text, and children. Ownership is straightforward tree
/// ownership (`Vec<Element>`) rather than the original's queue-of-pointers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub ns: Option<String>,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_ns(name: impl Into<String>, ns: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ns: Some(ns.into()),
            ..Default::default()
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = text.into();
        self
    }

    pub fn push(&mut self, child: Element) -> &mut Self {
        self.children.push(child);
        self
    }

    /// First direct child with this local name, regardless of namespace.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn text_trimmed(&self) -> &str {
        self.text.trim()
    }

    pub fn is_base_ns(&self) -> bool {
        self.ns.as_deref() == Some(NETCONF_BASE_NS)
    }
}

/// Parse a fragment that may contain more than one top-level element (a
/// NETCONF `<config>` body can hold several sibling data nodes) by parsing
/// it under a throwaway wrapper and handing back its children.
pub fn parse_fragment(xml: &str) -> Result<Vec<Element>, XmlError> {
    let wrapped = format!("<_fragment_>{xml}</_fragment_>");
    Ok(parse(&wrapped)?.children)
}

/// Parse one XML document into its root `Element`. Tolerates (and strips) a
/// trailing NETCONF 1.0 end-of-message marker, since callers sometimes hand
/// this function bytes straight out of a framing-unaware mock transport.
pub fn parse(xml: &str) -> Result<Element, XmlError> {
    let trimmed = xml.trim();
    let trimmed = trimmed.strip_suffix("]]>]]>").unwrap_or(trimmed).trim();

    let mut reader = NsReader::from_str(trimmed);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        match event {
            Event::Start(tag) => {
                let elem = build_element(&resolved, &tag)?;
                stack.push(elem);
            }
            Event::Empty(tag) => {
                let elem = build_element(&resolved, &tag)?;
                attach(&mut stack, &mut root, elem);
            }
            Event::End(_) => {
                let elem = stack
                    .pop()
                    .ok_or_else(|| XmlError::Malformed("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, elem);
            }
            Event::Text(text) => {
                let txt = text.unescape()?.into_owned();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&txt);
                }
            }
            Event::CData(cdata) => {
                let txt = String::from_utf8_lossy(cdata.as_ref()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&txt);
                }
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => continue,
            Event::Eof => break,
        }
        if root.is_some() && stack.is_empty() {
            break;
        }
    }

    root.ok_or_else(|| XmlError::Malformed("empty document".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, elem: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(elem);
    } else {
        *root = Some(elem);
    }
}

fn build_element(ns: &ResolveResult, tag: &BytesStart) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(tag.local_name().as_ref()).into_owned();
    let ns_uri = match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    };

    let mut attrs = Vec::new();
    for attr in tag.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr.unescape_value()?.into_owned();
        let local_key = key.rsplit(':').next().unwrap_or(&key).to_string();
        attrs.push((local_key, value));
    }

    Ok(Element {
        name,
        ns: ns_uri,
        attrs,
        text: String::new(),
        children: Vec::new(),
    })
}

/// Serialize an element tree back to an XML string, suitable for framing
/// and writing to the transport.
pub fn to_string(elem: &Element) -> Result<String, XmlError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_element(&mut writer, elem)?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| XmlError::Malformed(e.to_string()))
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, elem: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(elem.name.clone());
    if let Some(ns) = &elem.ns {
        start.push_attribute(("xmlns", ns.as_str()));
    }
    for (k, v) in &elem.attrs {
        start.push_attribute((k.as_str(), v.as_str()));
    }

    if elem.children.is_empty() && elem.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        if !elem.text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&elem.text)))?;
        }
        for child in &elem.children {
            write_element(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(elem.name.clone())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_with_namespace() {
        let xml = r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
            <capabilities>
                <capability>urn:ietf:params:netconf:base:1.0</capability>
            </capabilities>
        </hello>"#;
        let root = parse(xml).unwrap();
        assert_eq!(root.name, "hello");
        assert_eq!(root.ns.as_deref(), Some(NETCONF_BASE_NS));
        let caps = root.child("capabilities").unwrap();
        let cap = caps.child("capability").unwrap();
        assert_eq!(cap.text_trimmed(), "urn:ietf:params:netconf:base:1.0");
    }

    #[test]
    fn strips_trailing_eom_marker() {
        let xml = "<ok/>]]>]]>";
        let root = parse(xml).unwrap();
        assert_eq!(root.name, "ok");
    }

    #[test]
    fn attrs_round_trip() {
        let mut el = Element::new("filter");
        el.set_attr("type", "subtree");
        let s = to_string(&el).unwrap();
        let reparsed = parse(&s).unwrap();
        assert_eq!(reparsed.attr("type"), Some("subtree"));
    }

    #[test]
    fn parse_fragment_handles_multiple_siblings() {
        let children = parse_fragment("<a/><b>text</b>").unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "a");
        assert_eq!(children[1].text_trimmed(), "text");
    }

    #[test]
    fn build_then_serialize_then_parse_preserves_structure() {
        let mut root = Element::with_ns("get-config", "urn:ietf:params:xml:ns:netconf:base:1.0");
        let mut source = Element::new("source");
        source.push(Element::new("running"));
        root.push(source);
        let s = to_string(&root).unwrap();
        let reparsed = parse(&s).unwrap();
        assert_eq!(reparsed.name, "get-config");
        assert!(reparsed.child("source").unwrap().child("running").is_some());
    }
}
