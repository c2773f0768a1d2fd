//! The shared config patch: a YAML fragment layered on top of the base
//! config by the main process and every worker.
//!
//! The patch carries three things: the listener list with the replication
//! listener prepended, the message-bus (redis) flag, and each selected
//! worker's shared-config effect. It is built as structured parts and only
//! rendered to text at the end, so the prepend invariant is a property of the
//! value, not of string layout.
//!
//! Existing listeners from the base config are kept as opaque YAML values:
//! the merger must preserve whatever fields and relative order the base
//! config declared, not re-model them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{Result, TopogenError};
use crate::plan::WorkerInstance;

/// Port of the replication listener the main process exposes to workers.
pub const REPLICATION_PORT: u16 = 9093;

/// The replication listener is internal only; never bound beyond loopback.
pub const REPLICATION_BIND_ADDRESS: &str = "127.0.0.1";

#[derive(Debug, Serialize)]
struct Listener {
    port: u16,
    bind_address: String,
    #[serde(rename = "type")]
    kind: String,
    resources: Vec<ListenerResource>,
}

#[derive(Debug, Serialize)]
struct ListenerResource {
    names: Vec<String>,
}

/// The base config fields the merger cares about; everything else is left
/// untouched on disk.
#[derive(Debug, Default, Deserialize)]
struct BaseConfig {
    #[serde(default)]
    listeners: Option<Vec<Value>>,
}

/// Read the base config's listener list. An absent `listeners` key (or an
/// entirely empty file) is treated as an empty list.
pub fn read_base_listeners(path: &Path) -> Result<Vec<Value>> {
    let text = fs::read_to_string(path)?;
    let config: Option<BaseConfig> =
        serde_yaml::from_str(&text).map_err(|source| TopogenError::BaseConfig {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(config.and_then(|c| c.listeners).unwrap_or_default())
}

/// The replication listener, serialized the same way as the listeners read
/// from the base config.
fn replication_listener() -> Result<Value> {
    let listener = Listener {
        port: REPLICATION_PORT,
        bind_address: REPLICATION_BIND_ADDRESS.to_string(),
        kind: "http".to_string(),
        resources: vec![ListenerResource {
            names: vec!["replication".to_string()],
        }],
    };
    Ok(serde_yaml::to_value(&listener)?)
}

#[derive(Debug, Serialize)]
struct Redis {
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct PatchDoc<'a> {
    listeners: &'a [Value],
    redis: Redis,
}

/// The accumulated shared config patch.
#[derive(Debug)]
pub struct SharedPatch {
    listeners: Vec<Value>,
    fragments: Vec<String>,
}

impl SharedPatch {
    /// Build the patch from the base config's listeners and the selected
    /// workers, in request order.
    ///
    /// The replication listener is always prepended: appending would reorder
    /// listener bindings the base config depends on.
    pub fn build(existing_listeners: Vec<Value>, instances: &[WorkerInstance<'_>]) -> Result<Self> {
        let mut listeners = Vec::with_capacity(existing_listeners.len() + 1);
        listeners.push(replication_listener()?);
        listeners.extend(existing_listeners);

        let fragments = instances
            .iter()
            .filter(|inst| !inst.def.shared_extra_conf.is_empty())
            .map(|inst| inst.def.shared_extra_conf.clone())
            .collect();

        Ok(Self {
            listeners,
            fragments,
        })
    }

    /// The full listener list, replication listener first.
    pub fn listeners(&self) -> &[Value] {
        &self.listeners
    }

    /// Per-worker config fragments, in request order.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Render the patch as a YAML document fragment.
    pub fn render(&self) -> Result<String> {
        let doc = PatchDoc {
            listeners: &self.listeners,
            redis: Redis { enabled: true },
        };
        let mut out = serde_yaml::to_string(&doc)?;
        for fragment in &self.fragments {
            out.push_str(fragment);
            out.push('\n');
        }
        Ok(out)
    }
}
