//! The reverse-proxy routing table.
//!
//! Built as an ordered rule list and rendered to an nginx server block at the
//! end. Rule evaluation is first-match-wins, so the builder keeps every
//! worker rule ahead of the catch-all structurally; callers never have to
//! reason about string layout.

use crate::plan::WorkerInstance;

/// Port the reverse proxy itself listens on.
pub const PROXY_LISTEN_PORT: u16 = 8080;

/// Fixed listener port of the main process, target of the catch-all rule.
pub const MAIN_PROCESS_PORT: u16 = 8008;

/// Upload size limit; matches the homeserver's max_upload_size rather than
/// nginx's 1M default.
pub const MAX_BODY_SIZE: &str = "100M";

/// Reserved path prefixes routed to the main process when no worker rule
/// matches.
pub const CATCH_ALL_PATTERN: &str = r"^(\/_matrix|\/_synapse)";

/// One routing rule: requests matching `pattern` go to `localhost:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: String,
    pub port: u16,
}

/// The full routing table: worker rules in request order, then the catch-all.
#[derive(Debug)]
pub struct RoutingTable {
    worker_rules: Vec<Rule>,
}

impl RoutingTable {
    /// Build the table from the selected workers, in request order.
    pub fn build(instances: &[WorkerInstance<'_>]) -> Self {
        let worker_rules = instances
            .iter()
            .flat_map(|inst| {
                inst.def.endpoint_patterns.iter().map(|pattern| Rule {
                    pattern: pattern.clone(),
                    port: inst.port,
                })
            })
            .collect();
        Self { worker_rules }
    }

    /// Worker-specific rules, excluding the catch-all.
    pub fn worker_rules(&self) -> &[Rule] {
        &self.worker_rules
    }

    /// The terminal rule sending unclaimed traffic to the main process.
    pub fn catch_all(&self) -> Rule {
        Rule {
            pattern: CATCH_ALL_PATTERN.to_string(),
            port: MAIN_PROCESS_PORT,
        }
    }

    /// Every rule in evaluation order; the catch-all is always last.
    pub fn rules(&self) -> impl Iterator<Item = Rule> + '_ {
        self.worker_rules
            .iter()
            .cloned()
            .chain(std::iter::once(self.catch_all()))
    }

    /// Render the table as an nginx server block.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "\nserver {{\n    listen {port};\n    listen [::]:{port};\n\n    server_name localhost;\n\n    client_max_body_size {body};\n",
            port = PROXY_LISTEN_PORT,
            body = MAX_BODY_SIZE,
        ));

        for rule in self.rules() {
            out.push_str(&format!(
                "\n    location ~* {} {{\n        proxy_pass http://localhost:{};\n        proxy_set_header X-Forwarded-For $remote_addr;\n    }}\n",
                rule.pattern, rule.port
            ));
        }

        out.push_str("}\n");
        out
    }
}
