use crate::error::{Error, Result};
use crate::NodeRef;

pub mod dht {
    tonic::include_proto!("dht");
}

impl From<NodeRef> for dht::Node {
    fn from(node: NodeRef) -> Self {
        dht::Node {
            id: node.id,
            addr: node.addr,
        }
    }
}

impl From<dht::Node> for NodeRef {
    fn from(node: dht::Node) -> Self {
        NodeRef {
            id: node.id,
            addr: node.addr,
        }
    }
}

impl dht::Peer {
    pub fn of(node: NodeRef) -> Self {
        dht::Peer {
            node: Some(node.into()),
        }
    }
}

/// Unwraps a node field that the sender was required to fill in.
pub fn required_node(node: Option<dht::Node>, field: &str) -> Result<NodeRef> {
    let node = node.ok_or_else(|| Error::Validation(format!("{} is required", field)))?;
    if node.addr.is_empty() {
        return Err(Error::Validation(format!("{} address is required", field)));
    }
    Ok(node.into())
}

pub fn required_key(key: Option<u64>, field: &str) -> Result<u64> {
    key.ok_or_else(|| Error::Validation(format!("{} is required", field)))
}

impl dht::FindFileResult {
    /// The node holding `file_id`, or `Error::NotFound` for a negative reply.
    pub fn into_owner(self, file_id: u64) -> Result<NodeRef> {
        match self.owner {
            Some(owner) if self.found => Ok(owner.into()),
            _ => Err(Error::NotFound(format!("file {}", file_id))),
        }
    }
}
