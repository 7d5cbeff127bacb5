use {
    core::fmt::{Debug, Display, Formatter},
    serde::{Deserialize, Serialize},
};

/// A logical client slot. Each process runs strictly sequentially against its
/// own session; distinct processes run concurrently.
#[derive(Clone, Copy, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Process(usize);

impl Debug for Process {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        Display::fmt(self, f)
    }
}

impl Display for Process {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(":")?;
        Display::fmt(&self.0, f)
    }
}

impl From<Process> for usize {
    fn from(process: Process) -> Self {
        process.0
    }
}

impl From<usize> for Process {
    fn from(n: usize) -> Self {
        Process(n)
    }
}

/// A cluster member, addressed by hostname or IP as supplied externally.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Node(pub String);

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node(s.to_string())
    }
}

/// A resolved connection target: one node plus the database name.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Target {
    pub node: Node,
    pub db: String,
}

impl Target {
    pub fn new(node: impl Into<Node>, db: impl Into<String>) -> Self {
        Target {
            node: node.into(),
            db: db.into(),
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.node, self.db)
    }
}
