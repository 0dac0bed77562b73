pub mod config;
pub mod error;
pub mod hash;
pub mod ring;

pub mod rpc;

pub mod dht;

/// Identity of a ring member. Pointer changes replace the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub id: u64,
    pub addr: String,
}

impl NodeRef {
    pub fn new(id: u64, addr: impl Into<String>) -> Self {
        NodeRef {
            id,
            addr: addr.into(),
        }
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} ({})", self.id, self.addr)
    }
}
