//! Schema Context Loader (spec §4.1).
//!
//! Ported from `nc_ctx_check_and_fill`/`ctx_check_and_load_model`/
//! `ctx_check_and_load_ietf_netconf`/`libyang_module_clb` in
//! `session_client.c`. Runs once per session, right after the hello
//! handshake, with the session already marked `Running` (spec design note:
//! the loader issues ordinary `<get-schema>` RPCs back through the same
//! session it is bootstrapping, so the message pump must already consider
//! the session open).
//!
//! Steps, in order:
//!   1. If `ietf-netconf-monitoring` is among the peer's capabilities, make
//!      sure it is loaded locally and install a reentrant `get-schema`
//!      fetch callback for anything not found any other way.
//!   2. Unconditionally load `ietf-netconf` and enable whichever of its
//!      features the peer's `capability:*` URIs ask for.
//!   3. Load every remaining non-base, non-`capability:` capability as a
//!      module, enabling the `features=` list it names.
//!   4. Aggregate: `Ok` if every module loaded, `Partial` if some failed
//!      (data from those models is simply ignored later), `Fatal` if the
//!      base `ietf-netconf` model itself could not be loaded.

use crate::capability::Capability;
use crate::schema::{ModuleCallback, SchemaContext};
use log::{trace, warn};
use std::sync::Arc;

const MONITORING_NS_PREFIX: &str = "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring";
const CAPABILITY_PREFIX: &str = "urn:ietf:params:netconf:capability:";

/// The features `ietf-netconf` itself exposes, matched against the peer's
/// `capability:<name>` URIs (`ctx_check_and_load_ietf_netconf`'s table).
const IETF_NETCONF_FEATURES: &[(&str, &str)] = &[
    ("writable-running", "writable-running"),
    ("candidate", "candidate"),
    ("confirmed-commit:1.1", "confirmed-commit"),
    ("rollback-on-error", "rollback-on-error"),
    ("validate:1.1", "validate"),
    ("startup", "startup"),
    ("url", "url"),
    ("xpath", "xpath"),
];

/// A way to fetch a module's source text in-band, over the very session
/// being bootstrapped, via `<get-schema>` (spec §4.1 step 1's callback).
/// Implemented by the session once it exists; kept as a trait here so this
/// module has no dependency on `Session` and can be unit-tested with a
/// plain closure.
pub trait GetSchemaFetcher: Send + Sync {
    fn fetch(&self, identifier: &str, revision: Option<&str>) -> Option<String>;
}

impl<F> GetSchemaFetcher for F
where
    F: Fn(&str, Option<&str>) -> Option<String> + Send + Sync,
{
    fn fetch(&self, identifier: &str, revision: Option<&str>) -> Option<String> {
        self(identifier, revision)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Every capability-named module loaded successfully.
    Ok,
    /// `ietf-netconf` loaded, but one or more other modules did not; data
    /// under those models will be treated as opaque/ignored later.
    Partial { failed: Vec<String> },
    /// The mandatory base model could not be loaded at all.
    Fatal(String),
}

/// Run the full loader algorithm against an already-constructed (but not
/// yet populated) schema context.
pub fn load_schema_context(
    ctx: &mut dyn SchemaContext,
    capabilities: &[Capability],
    fetcher: Option<Arc<dyn GetSchemaFetcher>>,
) -> LoadOutcome {
    let get_schema_supported = capabilities
        .iter()
        .any(|c| c.as_str().starts_with(MONITORING_NS_PREFIX));

    let previous_callback = ctx.get_module_callback();
    let mut get_schema_callback_installed = false;

    if get_schema_supported && !ctx.get_module("ietf-netconf-monitoring", None) {
        if ctx.parse_path(
            "ietf-netconf-monitoring.yin",
            crate::schema::SchemaFormat::Yin,
        ) {
            if let Some(fetcher) = fetcher.clone() {
                install_get_schema_callback(ctx, fetcher);
                get_schema_callback_installed = true;
            }
        } else {
            warn!("loading ietf-netconf-monitoring schema failed, <get-schema> unavailable");
        }
    }

    if !ctx.get_module("ietf-netconf", None) && !ctx.load_module("ietf-netconf", None) {
        if !ctx.parse_path("ietf-netconf.yin", crate::schema::SchemaFormat::Yin) {
            restore_callback(ctx, previous_callback);
            return LoadOutcome::Fatal("loading base ietf-netconf schema failed".to_string());
        }
    }
    enable_ietf_netconf_features(ctx, capabilities);

    let mut failed = Vec::new();
    for cap in capabilities {
        if cap.is_base() || cap.feature_name().is_some() {
            continue;
        }
        let Some(module) = cap.module() else {
            continue;
        };
        let revision = cap.revision();

        if load_one_module(ctx, module, revision, cap) {
            continue;
        }

        if get_schema_callback_installed {
            trace!("retrying \"{module}\" load via a different source");
            restore_callback(ctx, previous_callback.clone());
            let retried = load_one_module(ctx, module, revision, cap);
            if let Some(fetcher) = fetcher.clone() {
                install_get_schema_callback(ctx, fetcher);
            }
            if retried {
                continue;
            }
        }

        warn!("failed to load model \"{module}\"");
        failed.push(module.to_string());
    }

    restore_callback(ctx, previous_callback);

    if failed.is_empty() {
        LoadOutcome::Ok
    } else {
        LoadOutcome::Partial { failed }
    }
}

fn load_one_module(
    ctx: &mut dyn SchemaContext,
    module: &str,
    revision: Option<&str>,
    cap: &Capability,
) -> bool {
    if !ctx.get_module(module, revision) && !ctx.load_module(module, revision) {
        return false;
    }
    for feature in cap.features() {
        if !ctx.enable_feature(module, feature) {
            warn!("module \"{module}\" has no feature \"{feature}\"");
        }
    }
    true
}

fn enable_ietf_netconf_features(ctx: &mut dyn SchemaContext, capabilities: &[Capability]) {
    for cap in capabilities {
        let Some(name) = cap.as_str().strip_prefix(CAPABILITY_PREFIX) else {
            continue;
        };
        for (uri_prefix, feature) in IETF_NETCONF_FEATURES {
            if name.starts_with(uri_prefix) {
                if !ctx.enable_feature("ietf-netconf", feature) {
                    warn!("ietf-netconf has no feature \"{feature}\"");
                }
                break;
            }
        }
    }
}

fn install_get_schema_callback(ctx: &mut dyn SchemaContext, fetcher: Arc<dyn GetSchemaFetcher>) {
    let callback: ModuleCallback = Arc::new(move |name, revision| fetcher.fetch(name, revision));
    ctx.set_module_callback(Some(callback));
}

fn restore_callback(ctx: &mut dyn SchemaContext, previous: Option<ModuleCallback>) {
    ctx.set_module_callback(previous);
}
