//! Per-worker descriptors handed to the external template renderer.
//!
//! The renderer itself is a collaborator, not part of this crate; the
//! [`DescriptorSink`] trait is the seam. The default sink serializes each
//! descriptor to YAML next to the other worker artifacts, which is enough for
//! any renderer that can read a flat key/value document.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::plan::WorkerInstance;

/// Everything the template renderer needs to produce one worker's own
/// config file.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerDescriptor {
    pub name: String,
    pub app: String,
    pub port: u16,
    pub config_path: PathBuf,
    pub listener_resources: Vec<String>,
    pub endpoint_patterns: Vec<String>,
}

impl WorkerDescriptor {
    /// Build the descriptor for one selected worker.
    pub fn for_instance(inst: &WorkerInstance<'_>, config_path: &std::path::Path) -> Self {
        Self {
            name: inst.name.clone(),
            app: inst.def.app.clone(),
            port: inst.port,
            config_path: config_path.to_path_buf(),
            listener_resources: inst.def.listener_resources.clone(),
            endpoint_patterns: inst.def.endpoint_patterns.clone(),
        }
    }
}

/// Where descriptors go; the seam between synthesis and the external
/// renderer.
pub trait DescriptorSink {
    fn write(&mut self, descriptor: &WorkerDescriptor) -> Result<()>;
}

/// Default sink: one YAML file per worker under the workers directory,
/// written fresh each run.
#[derive(Debug)]
pub struct YamlDirSink {
    dir: PathBuf,
}

impl YamlDirSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Path the descriptor for `name` is written to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.yaml"))
    }
}

impl DescriptorSink for YamlDirSink {
    fn write(&mut self, descriptor: &WorkerDescriptor) -> Result<()> {
        let rendered = serde_yaml::to_string(descriptor)?;
        fs::write(self.path_for(&descriptor.name), rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{resolve, WorkerRequest};
    use crate::registry::Registry;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_descriptor_carries_instance_attributes() {
        let registry = Registry::builtin();
        let instances = resolve(&registry, &WorkerRequest::parse(Some("user_dir")));
        let descriptor =
            WorkerDescriptor::for_instance(&instances[0], Path::new("/data/homeserver.yaml"));

        assert_eq!(descriptor.name, "user_dir");
        assert_eq!(descriptor.app, "synapse.app.user_dir");
        assert_eq!(descriptor.port, 18009);
        assert_eq!(descriptor.config_path, Path::new("/data/homeserver.yaml"));
        assert_eq!(
            descriptor.listener_resources,
            vec!["client".to_string(), "federation".to_string()]
        );
    }

    #[test]
    fn test_yaml_sink_writes_one_file_per_worker() {
        let dir = tempdir().unwrap();
        let mut sink = YamlDirSink::new(dir.path().to_path_buf());

        let registry = Registry::builtin();
        let instances = resolve(
            &registry,
            &WorkerRequest::parse(Some("federation_reader,user_dir")),
        );
        for inst in &instances {
            let descriptor = WorkerDescriptor::for_instance(inst, Path::new("/data/hs.yaml"));
            sink.write(&descriptor).unwrap();
        }

        let reader = fs::read_to_string(dir.path().join("federation_reader.yaml")).unwrap();
        assert!(reader.contains("name: federation_reader"));
        assert!(reader.contains("port: 18009"));
        assert!(reader.contains("app: synapse.app.generic_worker"));

        let user_dir = fs::read_to_string(dir.path().join("user_dir.yaml")).unwrap();
        assert!(user_dir.contains("port: 18010"));
    }

    #[test]
    fn test_yaml_sink_overwrites_stale_descriptor() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user_dir.yaml"), "stale: content\n").unwrap();

        let mut sink = YamlDirSink::new(dir.path().to_path_buf());
        let registry = Registry::builtin();
        let instances = resolve(&registry, &WorkerRequest::parse(Some("user_dir")));
        let descriptor = WorkerDescriptor::for_instance(&instances[0], Path::new("/data/hs.yaml"));
        sink.write(&descriptor).unwrap();

        let content = fs::read_to_string(dir.path().join("user_dir.yaml")).unwrap();
        assert!(!content.contains("stale"));
        assert!(content.contains("name: user_dir"));
    }

    #[test]
    fn test_descriptor_serializes_to_valid_yaml() {
        let registry = Registry::builtin();
        let instances = resolve(&registry, &WorkerRequest::parse(Some("media_repository")));
        let descriptor = WorkerDescriptor::for_instance(&instances[0], Path::new("/data/hs.yaml"));

        let yaml = serde_yaml::to_string(&descriptor).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed.get("port").and_then(serde_yaml::Value::as_u64),
            Some(18009)
        );
        assert!(parsed.get("endpoint_patterns").unwrap().as_sequence().is_some());
    }
}
