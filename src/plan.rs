//! Request parsing, registry validation and port allocation.
//!
//! This is the front half of the pipeline: a raw worker-type request becomes
//! an ordered list of [`WorkerInstance`]s, each with a unique port. Everything
//! downstream (shared patch, routing table, supervision spec, descriptors)
//! consumes this list and nothing else, so the allocation here is the single
//! source of port truth.

use tracing::warn;

use crate::registry::{Registry, WorkerDefinition, WILDCARD};

/// First port handed out to workers; instances get consecutive ports from
/// here in request order.
pub const BASE_WORKER_PORT: u16 = 18009;

/// A parsed worker-type request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerRequest {
    /// No workers requested: main process only.
    None,
    /// The wildcard: every registered type, in registry order.
    All,
    /// An explicit, ordered list of type names.
    Named(Vec<String>),
}

impl WorkerRequest {
    /// Parse a raw request string.
    ///
    /// `None` or a blank string means no workers; `"*"` means all registered
    /// types; anything else is a comma-separated name list with surrounding
    /// whitespace trimmed per name.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::None,
            Some(WILDCARD) => Self::All,
            Some(list) => Self::Named(
                list.split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect(),
            ),
        }
    }
}

/// One selected worker, validated against the registry and holding its
/// allocated port. Lives only for the duration of the synthesis run.
#[derive(Debug, Clone)]
pub struct WorkerInstance<'a> {
    /// The registry definition backing this instance.
    pub def: &'a WorkerDefinition,
    /// Instance name; equal to the type name while multiple instances per
    /// type remain unsupported.
    pub name: String,
    /// Allocated listener port, unique across the run.
    pub port: u16,
}

/// Resolve a request against the registry and allocate ports.
///
/// Unknown type names are logged and skipped; they consume no port, produce
/// no downstream artifact, and never fail the run. Ports are contiguous from
/// [`BASE_WORKER_PORT`] over the valid instances, in request order.
pub fn resolve<'a>(registry: &'a Registry, request: &WorkerRequest) -> Vec<WorkerInstance<'a>> {
    let requested: Vec<String> = match request {
        WorkerRequest::None => Vec::new(),
        WorkerRequest::All => registry.names().map(String::from).collect(),
        WorkerRequest::Named(names) => names.clone(),
    };

    let mut instances = Vec::with_capacity(requested.len());
    let mut next_port = BASE_WORKER_PORT;

    for name in requested {
        let Some(def) = registry.lookup(&name) else {
            warn!(worker = %name, "unknown worker type, skipping");
            continue;
        };
        instances.push(WorkerInstance {
            def,
            name,
            port: next_port,
        });
        next_port += 1;
    }

    instances
}
