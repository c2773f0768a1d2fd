//! The synthesis pipeline: one linear pass from a worker-type request to the
//! full set of deployment artifacts.
//!
//! Artifact building is pure ([`build_artifacts`]) and file I/O happens only
//! in [`generate`], so every cross-artifact invariant is testable without
//! touching the filesystem.
//!
//! Write contract: the routing table, supervision spec and descriptors are
//! owned by this run and regenerated from scratch every time. The shared
//! patch is append-only because it may already carry bootstrap or
//! hand-authored content that must survive. Appending also means a re-run
//! duplicates earlier fragments; the reference deployment truncates the file
//! upstream, and this tool keeps that contract rather than deduplicating.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::descriptor::{DescriptorSink, WorkerDescriptor, YamlDirSink};
use crate::error::{Result, TopogenError};
use crate::plan::{self, WorkerRequest};
use crate::registry::Registry;
use crate::routes::RoutingTable;
use crate::shared::{self, SharedPatch};
use crate::supervise::SupervisionSpec;

/// Filename of the shared patch inside the workers directory.
pub const SHARED_PATCH_FILENAME: &str = "shared.yaml";

/// Input to a synthesis run.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Raw worker-type request: comma-separated names, `*`, or absent.
    pub workers: Option<String>,
    /// Path to the base homeserver config. Must already exist.
    pub base_config: PathBuf,
    /// Data directory; only the `logs/` subdirectory is touched here.
    pub data_dir: PathBuf,
    /// Directory for per-worker configs and the shared patch.
    pub workers_dir: PathBuf,
    /// Path of the emitted reverse-proxy config.
    pub proxy_conf: PathBuf,
    /// Path of the emitted supervisor config.
    pub supervisor_conf: PathBuf,
}

/// Resolved locations of every artifact a run reads or writes.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub base_config: PathBuf,
    pub workers_dir: PathBuf,
    pub shared_patch: PathBuf,
    pub proxy_conf: PathBuf,
    pub supervisor_conf: PathBuf,
    pub log_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(
        base_config: PathBuf,
        workers_dir: PathBuf,
        proxy_conf: PathBuf,
        supervisor_conf: PathBuf,
        data_dir: PathBuf,
    ) -> Self {
        let shared_patch = workers_dir.join(SHARED_PATCH_FILENAME);
        let log_dir = data_dir.join("logs");
        Self {
            base_config,
            workers_dir,
            shared_patch,
            proxy_conf,
            supervisor_conf,
            log_dir,
        }
    }

    /// Path of one worker's own config file.
    pub fn worker_config(&self, name: &str) -> PathBuf {
        self.workers_dir.join(format!("{name}.yaml"))
    }
}

impl From<&SynthesisOptions> for ArtifactPaths {
    fn from(opts: &SynthesisOptions) -> Self {
        Self::new(
            opts.base_config.clone(),
            opts.workers_dir.clone(),
            opts.proxy_conf.clone(),
            opts.supervisor_conf.clone(),
            opts.data_dir.clone(),
        )
    }
}

/// Everything one run produces, rendered but not yet written.
#[derive(Debug)]
pub struct Artifacts {
    pub shared_patch: String,
    pub routing_table: String,
    pub supervision: String,
    pub descriptors: Vec<WorkerDescriptor>,
    /// Selected workers and their ports, in request order.
    pub workers: Vec<(String, u16)>,
}

/// Build every artifact for a request. Pure apart from the caller-provided
/// listener list; performs no file I/O.
pub fn build_artifacts(
    registry: &Registry,
    request: &WorkerRequest,
    existing_listeners: Vec<serde_yaml::Value>,
    paths: &ArtifactPaths,
) -> Result<Artifacts> {
    let instances = plan::resolve(registry, request);

    let patch = SharedPatch::build(existing_listeners, &instances)?;
    debug!(
        listeners = patch.listeners().len(),
        fragments = patch.fragments().len(),
        "built shared config patch"
    );
    let shared_patch = patch.render()?;

    let table = RoutingTable::build(&instances);
    debug!(rules = table.worker_rules().len(), "built routing table");
    let routing_table = table.render();

    let spec = SupervisionSpec::build(paths, &instances);
    debug!(entries = spec.entries().len(), "built supervision spec");
    let supervision = spec.render();
    let descriptors = instances
        .iter()
        .map(|inst| WorkerDescriptor::for_instance(inst, &paths.base_config))
        .collect();
    let workers = instances
        .iter()
        .map(|inst| (inst.name.clone(), inst.port))
        .collect();

    Ok(Artifacts {
        shared_patch,
        routing_table,
        supervision,
        descriptors,
        workers,
    })
}

/// Run the full pipeline and write every artifact.
///
/// The only fatal precondition is a missing base config; unknown worker
/// types have already been skipped by the time artifacts are built. Any file
/// I/O error aborts the run immediately.
pub fn generate(registry: &Registry, opts: &SynthesisOptions) -> Result<Artifacts> {
    if !opts.base_config.exists() {
        return Err(TopogenError::MissingBaseConfig(opts.base_config.clone()));
    }

    let paths = ArtifactPaths::from(opts);
    let request = WorkerRequest::parse(opts.workers.as_deref());
    debug!(?request, "parsed worker request");

    let existing_listeners = shared::read_base_listeners(&paths.base_config)?;
    let artifacts = build_artifacts(registry, &request, existing_listeners, &paths)?;

    fs::create_dir_all(&paths.workers_dir)?;
    fs::create_dir_all(&paths.log_dir)?;

    // The shared patch tolerates pre-existing content; the leading newline
    // separates it from whatever a bootstrap step already wrote.
    let mut shared_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.shared_patch)?;
    shared_file.write_all(b"\n")?;
    shared_file.write_all(artifacts.shared_patch.as_bytes())?;

    fs::write(&paths.proxy_conf, &artifacts.routing_table)?;
    fs::write(&paths.supervisor_conf, &artifacts.supervision)?;

    let mut sink = YamlDirSink::new(paths.workers_dir.clone());
    for descriptor in &artifacts.descriptors {
        sink.write(descriptor)?;
        debug!(worker = %descriptor.name, port = descriptor.port, "wrote worker descriptor");
    }

    info!(
        workers = artifacts.workers.len(),
        shared_patch = %paths.shared_patch.display(),
        proxy_conf = %paths.proxy_conf.display(),
        supervisor_conf = %paths.supervisor_conf.display(),
        "topology synthesized"
    );

    Ok(artifacts)
}
