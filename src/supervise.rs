//! The process supervision spec: which processes to run, in what order,
//! with what restart contract.
//!
//! Entries are built as values and rendered to a supervisord config at the
//! end. The restart contract matters: the proxy always restarts, while the
//! main process and workers restart only on unexpected exit, so a deliberate
//! stop (exit code 0) stays stopped.

use crate::plan::WorkerInstance;
use crate::synth::ArtifactPaths;

/// The proxy starts first; supervisord runs lower priorities earlier.
pub const PROXY_PRIORITY: u32 = 1;
/// The main process starts right after the proxy.
pub const MAIN_PRIORITY: u32 = 2;
/// Workers start once the main process is addressable.
pub const WORKER_PRIORITY: u32 = 10;

/// Interpreter used to launch the main process and every worker.
const LAUNCHER: &str = "/usr/local/bin/python";

/// Entry-point module of the main process.
const MAIN_APP: &str = "synapse.app.homeserver";

/// Restart policy for a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoRestart {
    /// Restart on any exit.
    Always,
    /// Restart only when the exit code is not an expected one (0).
    OnUnexpected,
}

/// One supervised process.
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub name: String,
    pub command: String,
    pub priority: u32,
    pub autorestart: AutoRestart,
}

/// The full supervision spec: proxy, main process, then one entry per worker.
#[derive(Debug)]
pub struct SupervisionSpec {
    entries: Vec<ProcessEntry>,
}

impl SupervisionSpec {
    /// Build the spec for the given selection, in fixed start order.
    ///
    /// Config layering in worker commands is base, then shared patch, then
    /// the worker's own config, so later layers override earlier ones.
    pub fn build(paths: &ArtifactPaths, instances: &[WorkerInstance<'_>]) -> Self {
        let mut entries = Vec::with_capacity(instances.len() + 2);

        entries.push(ProcessEntry {
            name: "nginx".to_string(),
            command: r#"/usr/sbin/nginx -g "daemon off;""#.to_string(),
            priority: PROXY_PRIORITY,
            autorestart: AutoRestart::Always,
        });

        entries.push(ProcessEntry {
            name: "synapse_main".to_string(),
            command: format!(
                r#"{} -m {} --config-path="{}" --config-path="{}""#,
                LAUNCHER,
                MAIN_APP,
                paths.base_config.display(),
                paths.shared_patch.display(),
            ),
            priority: MAIN_PRIORITY,
            autorestart: AutoRestart::OnUnexpected,
        });

        for inst in instances {
            entries.push(ProcessEntry {
                name: format!("synapse_{}", inst.name),
                command: format!(
                    r#"{} -m {} --config-path="{}" --config-path="{}" --config-path="{}""#,
                    LAUNCHER,
                    inst.def.app,
                    paths.base_config.display(),
                    paths.shared_patch.display(),
                    paths.worker_config(&inst.name).display(),
                ),
                priority: WORKER_PRIORITY,
                autorestart: AutoRestart::OnUnexpected,
            });
        }

        Self { entries }
    }

    /// All entries, in start order.
    pub fn entries(&self) -> &[ProcessEntry] {
        &self.entries
    }

    /// Render the spec as a supervisord config.
    pub fn render(&self) -> String {
        let mut out = String::from("\n[supervisord]\nnodaemon=true\n");

        for entry in &self.entries {
            out.push_str(&format!(
                "\n[program:{}]\ncommand={}\npriority={}\n",
                entry.name, entry.command, entry.priority
            ));
            match entry.autorestart {
                AutoRestart::Always => out.push_str("autorestart=true\n"),
                AutoRestart::OnUnexpected => {
                    out.push_str("autorestart=unexpected\nexitcodes=0\n");
                }
            }
            out.push_str(
                "stdout_logfile=/dev/stdout\nstdout_logfile_maxbytes=0\nstderr_logfile=/dev/stderr\nstderr_logfile_maxbytes=0\n",
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{resolve, WorkerRequest};
    use crate::registry::Registry;
    use std::path::PathBuf;

    fn paths() -> ArtifactPaths {
        ArtifactPaths::new(
            PathBuf::from("/data/homeserver.yaml"),
            PathBuf::from("/conf/workers"),
            PathBuf::from("/etc/nginx/conf.d/matrix-synapse.conf"),
            PathBuf::from("/etc/supervisor/conf.d/supervisord.conf"),
            PathBuf::from("/data"),
        )
    }

    #[test]
    fn test_minimal_topology_has_proxy_and_main() {
        let registry = Registry::builtin();
        let instances = resolve(&registry, &WorkerRequest::None);
        let spec = SupervisionSpec::build(&paths(), &instances);

        let names: Vec<&str> = spec.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["nginx", "synapse_main"]);
    }

    #[test]
    fn test_concrete_scenario_entry_order() {
        let registry = Registry::builtin();
        let instances = resolve(
            &registry,
            &WorkerRequest::parse(Some("federation_reader,user_dir")),
        );
        let spec = SupervisionSpec::build(&paths(), &instances);

        let names: Vec<&str> = spec.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "nginx",
                "synapse_main",
                "synapse_federation_reader",
                "synapse_user_dir"
            ]
        );
    }

    #[test]
    fn test_entry_names_are_unique() {
        let registry = Registry::builtin();
        let instances = resolve(&registry, &WorkerRequest::All);
        let spec = SupervisionSpec::build(&paths(), &instances);

        let mut names: Vec<&str> = spec.entries().iter().map(|e| e.name.as_str()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_priorities_start_proxy_then_main_then_workers() {
        let registry = Registry::builtin();
        let instances = resolve(&registry, &WorkerRequest::parse(Some("pusher")));
        let spec = SupervisionSpec::build(&paths(), &instances);

        let priorities: Vec<u32> = spec.entries().iter().map(|e| e.priority).collect();
        assert_eq!(priorities, vec![PROXY_PRIORITY, MAIN_PRIORITY, WORKER_PRIORITY]);
        assert!(PROXY_PRIORITY < MAIN_PRIORITY);
        assert!(MAIN_PRIORITY < WORKER_PRIORITY);
    }

    #[test]
    fn test_restart_contract() {
        let registry = Registry::builtin();
        let instances = resolve(&registry, &WorkerRequest::parse(Some("pusher")));
        let spec = SupervisionSpec::build(&paths(), &instances);

        assert_eq!(spec.entries()[0].autorestart, AutoRestart::Always);
        assert_eq!(spec.entries()[1].autorestart, AutoRestart::OnUnexpected);
        assert_eq!(spec.entries()[2].autorestart, AutoRestart::OnUnexpected);
    }

    #[test]
    fn test_worker_command_layers_configs_in_order() {
        let registry = Registry::builtin();
        let instances = resolve(&registry, &WorkerRequest::parse(Some("user_dir")));
        let spec = SupervisionSpec::build(&paths(), &instances);

        let command = &spec.entries()[2].command;
        let base = command.find("/data/homeserver.yaml").unwrap();
        let shared = command.find("/conf/workers/shared.yaml").unwrap();
        let own = command.find("/conf/workers/user_dir.yaml").unwrap();
        assert!(base < shared);
        assert!(shared < own);
        assert!(command.contains("-m synapse.app.user_dir"));
    }

    #[test]
    fn test_render_restart_policies() {
        let registry = Registry::builtin();
        let instances = resolve(&registry, &WorkerRequest::None);
        let rendered = SupervisionSpec::build(&paths(), &instances).render();

        assert!(rendered.starts_with("\n[supervisord]\nnodaemon=true\n"));
        assert!(rendered.contains("[program:nginx]"));
        assert!(rendered.contains("autorestart=true"));
        assert!(rendered.contains("[program:synapse_main]"));
        assert!(rendered.contains("autorestart=unexpected"));
        assert!(rendered.contains("exitcodes=0"));
    }

    #[test]
    fn test_render_log_sinks() {
        let registry = Registry::builtin();
        let instances = resolve(&registry, &WorkerRequest::None);
        let rendered = SupervisionSpec::build(&paths(), &instances).render();

        assert!(rendered.contains("stdout_logfile=/dev/stdout"));
        assert!(rendered.contains("stderr_logfile=/dev/stderr"));
        assert!(rendered.contains("stdout_logfile_maxbytes=0"));
    }
}
