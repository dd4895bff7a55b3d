//! The schema collaborator interface (spec §6).
//!
//! The YANG data-modeling library itself — storage, parsing, validation —
//! is explicitly out of scope for this core (spec §1). What the core owns
//! is the *algorithm* that drives such a library during the capability
//! handshake and RPC build/parse paths; `SchemaContext` is the named
//! interface that algorithm is written against, and `loader` is the
//! algorithm itself.

pub mod loader;

use crate::xml::Element;
use std::sync::{Arc, Mutex};

/// Shared handle to a schema collaborator, used wherever more than one
/// session component (hello handshake, loader, RPC builder, reply parser)
/// needs concurrent access to the same context.
pub type SchemaContextHandle = Arc<Mutex<dyn SchemaContext>>;

/// Source format a module can be parsed from. Only `Yin` is used by the
/// in-band `get-schema` fetch path (spec §4.1 requests `format="yin"`);
/// `Yang` exists because `parse_path` in a real schema library accepts
/// either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Yin,
    Yang,
}

/// Parse-time hint threaded through to `SchemaContext::parse_xml`, matching
/// the reply parser's per-RPC-kind dispatch (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseHint {
    Get,
    GetConfig,
    RpcReply,
    Rpc,
    Notif,
}

/// `set_module_callback`'s argument: given a module name and optional
/// revision, return the module's source text, or `None` if this callback
/// cannot supply it. Reentrant in-band `get-schema` fetch is exactly one
/// such callback (see `loader::install_get_schema_callback`).
pub type ModuleCallback = Arc<dyn Fn(&str, Option<&str>) -> Option<String> + Send + Sync>;

/// The schema collaborator interface consumed by the core (spec §6). A real
/// implementation wraps a YANG library (e.g. libyang); this crate ships
/// only `TestSchemaContext`, a minimal in-memory stand-in used by the test
/// suite, since a full validation engine is out of scope here.
pub trait SchemaContext: Send {
    /// `true` if the named module (optionally at a specific revision) is
    /// already loaded.
    fn get_module(&self, name: &str, revision: Option<&str>) -> bool;

    /// Attempt to load the named module from whatever sources this context
    /// knows about (search path, registered callback, ...). Returns `true`
    /// on success.
    fn load_module(&mut self, name: &str, revision: Option<&str>) -> bool;

    /// Parse and install a module directly from a file path in the given
    /// format (the bundled-YIN fallback path for `ietf-netconf` itself).
    fn parse_path(&mut self, path: &str, format: SchemaFormat) -> bool;

    /// Enable a feature on an already-loaded module. Returns `false` if the
    /// module has no such feature (a warning at the call site, not a
    /// failure, per spec §4.1 step 3).
    fn enable_feature(&mut self, module: &str, feature: &str) -> bool;

    /// Install (or clear, with `None`) the module-retrieval callback used
    /// when a module can't be found any other way.
    fn set_module_callback(&mut self, callback: Option<ModuleCallback>);

    /// The currently installed module-retrieval callback, if any.
    fn get_module_callback(&self) -> Option<ModuleCallback>;

    /// Bind a raw XML tree to a schema node, producing a validated data
    /// tree. `schema_node` names a specific node (e.g.
    /// `/ietf-netconf-monitoring:get-schema`) when the hint alone isn't
    /// enough to resolve it (spec §4.4, the `Generic`/`GetSchema` cases).
    fn parse_xml(
        &self,
        xml: &Element,
        hint: ParseHint,
        schema_node: Option<&str>,
    ) -> Result<Element, String>;

    /// Strict-mode validation of a tree built by the RPC Builder (spec
    /// §4.3: "the tree is validated in strict mode; failure is reported as
    /// a build error before any wire I/O").
    fn validate(&self, tree: &Element, strict: bool) -> Result<(), String>;
}

/// Minimal in-memory `SchemaContext` used by tests. Modules "load"
/// successfully iff they were pre-registered (`register_module`) or a
/// callback supplies their source; features are tracked per module with no
/// validity checking beyond "the module exists".
pub struct TestSchemaContext {
    modules: std::collections::HashMap<String, ModuleEntry>,
    callback: Option<ModuleCallback>,
}

struct ModuleEntry {
    #[allow(dead_code)]
    revision: Option<String>,
    features: std::collections::HashSet<String>,
}

impl Default for TestSchemaContext {
    fn default() -> Self {
        TestSchemaContext {
            modules: std::collections::HashMap::new(),
            callback: None,
        }
    }
}

impl TestSchemaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a module as if it had been found locally, for test
    /// setup (e.g. `ietf-netconf`, `ietf-netconf-monitoring`).
    pub fn register_module(&mut self, name: &str, revision: Option<&str>) {
        self.modules.entry(name.to_string()).or_insert(ModuleEntry {
            revision: revision.map(str::to_string),
            features: std::collections::HashSet::new(),
        });
    }

    pub fn has_feature(&self, module: &str, feature: &str) -> bool {
        self.modules
            .get(module)
            .map(|m| m.features.contains(feature))
            .unwrap_or(false)
    }
}

impl SchemaContext for TestSchemaContext {
    fn get_module(&self, name: &str, _revision: Option<&str>) -> bool {
        self.modules.contains_key(name)
    }

    fn load_module(&mut self, name: &str, revision: Option<&str>) -> bool {
        if self.modules.contains_key(name) {
            return true;
        }
        if let Some(callback) = self.callback.clone() {
            if let Some(_source) = callback(name, revision) {
                self.register_module(name, revision);
                return true;
            }
        }
        false
    }

    fn parse_path(&mut self, path: &str, _format: SchemaFormat) -> bool {
        // A bundled-YIN file's module name is its file stem, matching how
        // the original locates SCHEMAS_DIR/ietf-netconf.yin.
        let name = std::path::Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path);
        self.register_module(name, None);
        true
    }

    fn enable_feature(&mut self, module: &str, feature: &str) -> bool {
        match self.modules.get_mut(module) {
            Some(entry) => {
                entry.features.insert(feature.to_string());
                true
            }
            None => false,
        }
    }

    fn set_module_callback(&mut self, callback: Option<ModuleCallback>) {
        self.callback = callback;
    }

    fn get_module_callback(&self) -> Option<ModuleCallback> {
        self.callback.clone()
    }

    fn parse_xml(
        &self,
        xml: &Element,
        _hint: ParseHint,
        _schema_node: Option<&str>,
    ) -> Result<Element, String> {
        Ok(xml.clone())
    }

    fn validate(&self, _tree: &Element, _strict: bool) -> Result<(), String> {
        Ok(())
    }
}
