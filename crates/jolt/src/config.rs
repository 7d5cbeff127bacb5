//! Run configuration pulled from the environment, mirroring how the harness
//! is pointed at an externally provisioned cluster.

use {
    jolt_core::{Node, Target},
    std::{env, path::PathBuf},
    thiserror::Error,
};

pub const ENV_NODES: &str = "JOLT_NODES";
pub const ENV_DB: &str = "JOLT_DB";
pub const ENV_CONNECT_OPTS: &str = "JOLT_CONNECT_OPTS";
pub const ENV_WORK_DIR: &str = "JOLT_WORK_DIR";
pub const ENV_SERVER_BIN: &str = "JOLT_SERVER_BIN";
pub const ENV_DEBUG: &str = "JOLT_DEBUG";

const DEFAULT_DB: &str = "jolt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set or names no nodes")]
    MissingNodes(&'static str),
}

/// Where the harness connects and how. Nodes are supplied externally; the
/// harness never provisions the cluster itself.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub nodes: Vec<Node>,
    pub db: String,
    /// Extra driver options appended verbatim to every connection string.
    pub connect_opts: Option<String>,
    /// Scratch directory for artifacts such as recorded histories.
    pub work_dir: Option<PathBuf>,
    /// Server binary path, for orchestration layered on top of this crate.
    pub server_bin: Option<PathBuf>,
    pub debug_statements: bool,
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let nodes = parse_nodes(&env::var(ENV_NODES).unwrap_or_default())
            .ok_or(ConfigError::MissingNodes(ENV_NODES))?;
        Ok(HarnessConfig {
            nodes,
            db: env::var(ENV_DB).unwrap_or_else(|_| DEFAULT_DB.to_string()),
            connect_opts: env::var(ENV_CONNECT_OPTS).ok().filter(|v| !v.is_empty()),
            work_dir: env::var(ENV_WORK_DIR).ok().map(PathBuf::from),
            server_bin: env::var(ENV_SERVER_BIN).ok().map(PathBuf::from),
            debug_statements: env::var(ENV_DEBUG).is_ok_and(|v| v == "1" || v == "true"),
        })
    }

    #[must_use]
    pub fn db(mut self, db: impl Into<String>) -> Self {
        self.db = db.into();
        self
    }

    /// One connection target per node, in the order given.
    pub fn targets(&self) -> Vec<Target> {
        self.nodes
            .iter()
            .map(|node| Target::new(node.0.as_str(), self.db.as_str()))
            .collect()
    }
}

/// Whitespace-separated node list; `None` when empty.
fn parse_nodes(raw: &str) -> Option<Vec<Node>> {
    let nodes: Vec<Node> = raw.split_whitespace().map(Node::from).collect();
    if nodes.is_empty() {
        None
    } else {
        Some(nodes)
    }
}
