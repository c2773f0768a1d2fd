//! The worker registry: static definitions of every known worker type.
//!
//! The registry is an explicit value constructed once at startup (see
//! [`Registry::builtin`]) and passed into the synthesis pipeline, so tests can
//! inject a custom registry instead of reaching into a global table.
//!
//! Iteration order is the insertion order of [`Registry::builtin`] and is part
//! of the contract: wildcard expansion must be deterministic across runs.

use serde::Serialize;

/// The request token that expands to every registered worker type.
pub const WILDCARD: &str = "*";

/// Listener resources exposed by workers that serve regular HTTP traffic.
const DEFAULT_LISTENER_RESOURCES: &[&str] = &["client", "federation"];

/// Immutable definition of one worker type.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerDefinition {
    /// Registry key; also used as the instance name.
    pub name: String,
    /// Entry-point module the supervisor launches for this worker.
    pub app: String,
    /// Resource kinds the worker's HTTP listener exposes; empty if the worker
    /// has no listener at all.
    pub listener_resources: Vec<String>,
    /// Path patterns this worker claims in the reverse proxy, in match order.
    pub endpoint_patterns: Vec<String>,
    /// Config fragment merged into the shared patch when this worker is
    /// selected, usually disabling the same duty on the main process.
    pub shared_extra_conf: String,
}

/// An ordered, immutable set of worker definitions.
#[derive(Debug, Clone)]
pub struct Registry {
    defs: Vec<WorkerDefinition>,
}

impl Registry {
    /// Build a registry from an explicit definition list.
    ///
    /// The list order becomes the canonical iteration order.
    pub fn new(defs: Vec<WorkerDefinition>) -> Self {
        debug_assert!(
            {
                let mut names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
                names.sort_unstable();
                names.windows(2).all(|w| w[0] != w[1])
            },
            "registry names must be unique"
        );
        Self { defs }
    }

    /// The built-in worker definitions, in canonical order.
    pub fn builtin() -> Self {
        Self::new(vec![
            def("pusher", "synapse.app.pusher", &[], &[], "start_pushers: false"),
            def(
                "user_dir",
                "synapse.app.user_dir",
                DEFAULT_LISTENER_RESOURCES,
                &["^/_matrix/client/(api/v1|r0|unstable)/user_directory/search$"],
                "update_user_directory: false",
            ),
            def(
                "media_repository",
                "synapse.app.media_repository",
                &["media"],
                &[
                    "^/_synapse/admin/v1/purge_media_cache$",
                    "^/_synapse/admin/v1/room/.*/media.*$",
                    "^/_synapse/admin/v1/user/.*/media.*$",
                    "^/_synapse/admin/v1/media/.*$",
                    "^/_synapse/admin/v1/quarantine_media/.*$",
                ],
                "enable_media_repo: false",
            ),
            def(
                "appservice",
                "synapse.app.appservice",
                &[],
                &[],
                "notify_appservices: false",
            ),
            def(
                "federation_sender",
                "synapse.app.federation_sender",
                &[],
                &[],
                "send_federation: false",
            ),
            def(
                "synchrotron",
                "synapse.app.generic_worker",
                DEFAULT_LISTENER_RESOURCES,
                &[
                    "^/_matrix/client/(v2_alpha|r0)/sync$",
                    "^/_matrix/client/(api/v1|v2_alpha|r0)/events$",
                    "^/_matrix/client/(api/v1|r0)/initialSync$",
                    "^/_matrix/client/(api/v1|r0)/rooms/[^/]+/initialSync$",
                ],
                "",
            ),
            def(
                "federation_reader",
                "synapse.app.generic_worker",
                DEFAULT_LISTENER_RESOURCES,
                &[
                    "^/_matrix/federation/(v1|v2)/event/",
                    "^/_matrix/federation/(v1|v2)/state/",
                    "^/_matrix/federation/(v1|v2)/state_ids/",
                    "^/_matrix/federation/(v1|v2)/backfill/",
                    "^/_matrix/federation/(v1|v2)/get_missing_events/",
                    "^/_matrix/federation/(v1|v2)/publicRooms",
                    "^/_matrix/federation/(v1|v2)/query/",
                    "^/_matrix/federation/(v1|v2)/make_join/",
                    "^/_matrix/federation/(v1|v2)/make_leave/",
                    "^/_matrix/federation/(v1|v2)/send_join/",
                    "^/_matrix/federation/(v1|v2)/send_leave/",
                    "^/_matrix/federation/(v1|v2)/invite/",
                    "^/_matrix/federation/(v1|v2)/query_auth/",
                    "^/_matrix/federation/(v1|v2)/event_auth/",
                    "^/_matrix/federation/(v1|v2)/exchange_third_party_invite/",
                    "^/_matrix/federation/(v1|v2)/user/devices/",
                    "^/_matrix/federation/(v1|v2)/get_groups_publicised$",
                    "^/_matrix/key/v2/query",
                ],
                "",
            ),
            def(
                "federation_inbound",
                "synapse.app.generic_worker",
                DEFAULT_LISTENER_RESOURCES,
                &["/_matrix/federation/(v1|v2)/send/"],
                "",
            ),
        ])
    }

    /// Look up a worker definition by type name.
    pub fn lookup(&self, name: &str) -> Option<&WorkerDefinition> {
        self.defs.iter().find(|d| d.name == name)
    }

    /// All definitions, in canonical order.
    pub fn definitions(&self) -> &[WorkerDefinition] {
        &self.defs
    }

    /// All type names, in canonical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.iter().map(|d| d.name.as_str())
    }
}

/// Shorthand constructor for the builtin table.
fn def(
    name: &str,
    app: &str,
    listener_resources: &[&str],
    endpoint_patterns: &[&str],
    shared_extra_conf: &str,
) -> WorkerDefinition {
    WorkerDefinition {
        name: name.to_string(),
        app: app.to_string(),
        listener_resources: listener_resources.iter().map(|s| s.to_string()).collect(),
        endpoint_patterns: endpoint_patterns.iter().map(|s| s.to_string()).collect(),
        shared_extra_conf: shared_extra_conf.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_are_unique() {
        let registry = Registry::builtin();
        let mut names: Vec<_> = registry.names().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_lookup_known_type() {
        let registry = Registry::builtin();
        let def = registry.lookup("user_dir").unwrap();
        assert_eq!(def.app, "synapse.app.user_dir");
        assert_eq!(def.endpoint_patterns.len(), 1);
        assert_eq!(def.shared_extra_conf, "update_user_directory: false");
    }

    #[test]
    fn test_lookup_unknown_type() {
        let registry = Registry::builtin();
        assert!(registry.lookup("vector_clock").is_none());
    }

    #[test]
    fn test_iteration_order_is_stable() {
        let first: Vec<String> = Registry::builtin().names().map(String::from).collect();
        let second: Vec<String> = Registry::builtin().names().map(String::from).collect();
        assert_eq!(first, second);
        assert_eq!(first.first().map(String::as_str), Some("pusher"));
        assert_eq!(first.last().map(String::as_str), Some("federation_inbound"));
    }

    #[test]
    fn test_patterns_only_with_listener_resources() {
        // A worker claiming endpoints must expose a listener to serve them.
        for def in Registry::builtin().definitions() {
            if !def.endpoint_patterns.is_empty() {
                assert!(
                    !def.listener_resources.is_empty(),
                    "{} claims endpoints but has no listener resources",
                    def.name
                );
            }
        }
    }

    #[test]
    fn test_workers_without_listeners_claim_no_endpoints() {
        for def in Registry::builtin().definitions() {
            if def.listener_resources.is_empty() {
                assert!(
                    def.endpoint_patterns.is_empty(),
                    "{} has no listener but claims endpoints",
                    def.name
                );
            }
        }
    }
}
