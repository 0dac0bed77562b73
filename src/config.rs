use std::net::SocketAddr;

use clap::Parser;

use crate::error::{Error, Result};
use crate::hash;
use crate::ring::{IdSpace, DEFAULT_BITS};
use crate::NodeRef;

/// Startup configuration of a ring node.
#[derive(Debug, Clone, Parser)]
#[command(name = "dht", about = "Run a chord ring node")]
pub struct NodeConfig {
    /// Port the gRPC server listens on.
    pub port: u16,

    /// Host other nodes use to reach this one.
    #[arg(long, env = "NODE_HOSTNAME", default_value = "127.0.0.1")]
    pub hostname: String,

    /// Ring id. Derived from the public address when omitted.
    #[arg(long)]
    pub id: Option<u64>,

    /// Identifier bits (`m`). Every node of a ring must agree on it.
    #[arg(long, env = "CHORD_BITS", default_value_t = DEFAULT_BITS)]
    pub bits: u32,

    /// Address of an existing member to join through.
    #[arg(long, env = "CHORD_JOIN")]
    pub join: Option<String>,
}

impl NodeConfig {
    pub fn public_addr(&self) -> String {
        format!("http://{}:{}", self.hostname, self.port)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        Ok(format!("0.0.0.0:{}", self.port).parse()?)
    }

    pub fn space(&self) -> Result<IdSpace> {
        IdSpace::new(self.bits)
    }

    pub fn identity(&self) -> Result<NodeRef> {
        let space = self.space()?;
        let addr = self.public_addr();
        let id = match self.id {
            Some(id) if space.contains(id) => id,
            Some(id) => {
                return Err(Error::Parse(format!(
                    "id {} does not fit in {} bits",
                    id,
                    space.bits()
                )))
            }
            None => hash::generate_node_id(&addr, &space)?,
        };
        Ok(NodeRef::new(id, addr))
    }
}
