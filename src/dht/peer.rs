use std::collections::HashMap;

use log::{debug, info, warn};
use tokio::sync::RwLock;
use tonic::transport::Channel;
use tonic::Request;

use crate::error::{Error, Result};
use crate::rpc::dht::dht_node_client::DhtNodeClient;
use crate::rpc::dht::{FileQuery, KeyQuery, Peer};
use crate::rpc;
use crate::NodeRef;

use super::state::{NodeSnapshot, PointerUpdate, Referrals};

/// Accepts `host:port` as well as a full URI.
pub fn normalize_addr(addr: &str) -> String {
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_owned()
    } else {
        "http://".to_owned() + addr
    }
}

/// Connects to a node that may still be starting up. Only used while
/// bootstrapping; calls between members never retry.
pub async fn try_connect_node(addr: &str) -> Result<DhtNodeClient<Channel>> {
    let addr = normalize_addr(addr);
    info!("Connecting to {}...", addr);
    for attempt in 1..=5 {
        match DhtNodeClient::connect(addr.clone()).await {
            Ok(client) => {
                info!("Connected to {}.", addr);
                return Ok(client);
            }
            Err(_) => {
                warn!(
                    "Connection to {} attempt {} failed. Retrying in 2 seconds...",
                    addr, attempt
                );
                tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
            }
        }
    }
    Err(Error::Connectivity(format!("connection to {} failed", addr)))
}

/// gRPC clients to other members, one channel per address.
#[derive(Debug, Default)]
pub struct Peers {
    clients: RwLock<HashMap<String, DhtNodeClient<Channel>>>,
}

impl Peers {
    pub fn new() -> Self {
        Peers::default()
    }

    async fn client(&self, peer: &NodeRef) -> Result<DhtNodeClient<Channel>> {
        if let Some(client) = self.clients.read().await.get(&peer.addr) {
            return Ok(client.clone());
        }

        debug!("Opening channel to #{} at {}", peer.id, peer.addr);
        let client = DhtNodeClient::connect(peer.addr.clone())
            .await
            .map_err(|e| {
                warn!("#{} at {} is unreachable: {}", peer.id, peer.addr, e);
                Error::from(e)
            })?;
        self.clients
            .write()
            .await
            .insert(peer.addr.clone(), client.clone());
        Ok(client)
    }

    pub async fn link(&self, peer: &NodeRef, requester: &NodeRef) -> Result<Referrals> {
        let mut client = self.client(peer).await?;
        let reply = client
            .link(Request::new(Peer::of(requester.clone())))
            .await?
            .into_inner();
        Ok(Referrals {
            delegate: reply.delegate.map(Into::into),
            flood: reply.flood.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn update_pointer(&self, peer: &NodeRef, update: &PointerUpdate) -> Result<()> {
        let mut client = self.client(peer).await?;
        match update {
            PointerUpdate::Predecessor(node) => {
                client
                    .update_predecessor(Request::new(Peer::of(node.clone())))
                    .await?;
            }
            PointerUpdate::Successor(node) => {
                client
                    .update_successor(Request::new(Peer::of(node.clone())))
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn update_finger_table(&self, peer: &NodeRef, candidate: &NodeRef) -> Result<()> {
        let mut client = self.client(peer).await?;
        client
            .update_finger_table(Request::new(Peer::of(candidate.clone())))
            .await?;
        Ok(())
    }

    pub async fn get_state(&self, peer: &NodeRef) -> Result<NodeSnapshot> {
        let mut client = self.client(peer).await?;
        let status = client.get_state(Request::new(())).await?.into_inner();
        NodeSnapshot::try_from(status)
    }

    pub async fn closest_preceding(&self, peer: &NodeRef, key: u64) -> Result<NodeRef> {
        let mut client = self.client(peer).await?;
        let reply = client
            .closest_preceding(Request::new(KeyQuery { key: Some(key) }))
            .await?
            .into_inner();
        rpc::required_node(reply.node, "node")
    }

    /// Asks `peer` whether a locate for `file_id` should move on to its
    /// predecessor, which is returned when it should.
    pub async fn check_predecessor(&self, peer: &NodeRef, file_id: u64) -> Result<Option<NodeRef>> {
        let mut client = self.client(peer).await?;
        let reply = client
            .check_predecessor(Request::new(file_query(file_id, false)))
            .await?
            .into_inner();
        if !reply.continue_search {
            return Ok(None);
        }
        rpc::required_node(reply.predecessor, "predecessor").map(Some)
    }

    pub async fn check_file(&self, peer: &NodeRef, file_id: u64) -> Result<bool> {
        let mut client = self.client(peer).await?;
        let reply = client
            .check_file(Request::new(file_query(file_id, false)))
            .await?
            .into_inner();
        Ok(reply.exists)
    }

    /// Hands `file_id` to the node already resolved as its owner.
    pub async fn store_forwarded(&self, peer: &NodeRef, file_id: u64) -> Result<(NodeRef, String)> {
        let mut client = self.client(peer).await?;
        let reply = client
            .store_file(Request::new(file_query(file_id, true)))
            .await?
            .into_inner();
        Ok((rpc::required_node(reply.owner, "owner")?, reply.message))
    }
}

pub fn file_query(file_id: u64, forwarded: bool) -> FileQuery {
    FileQuery {
        file_id: Some(file_id),
        forwarded,
    }
}
