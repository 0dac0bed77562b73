use log::{debug, info};

use crate::error::Result;
use crate::ring::{in_open_closed, IdSpace};
use crate::rpc::{self, dht::NodeStatus};
use crate::NodeRef;

use super::directory::FileDirectory;
use super::finger::FingerTable;

/// Everything a node mutates. Lives behind the node's single lock.
#[derive(Debug)]
pub struct NodeState {
    local: NodeRef,
    pub predecessor: Option<NodeRef>,
    pub successor: Option<NodeRef>,
    pub fingers: FingerTable,
    pub directory: FileDirectory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerUpdate {
    Predecessor(NodeRef),
    Successor(NodeRef),
}

/// A pointer change another node has to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerNotice {
    pub target: NodeRef,
    pub update: PointerUpdate,
}

/// Where a join has to go next after one node handled it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Referrals {
    /// The node the insertion point lies behind.
    pub delegate: Option<NodeRef>,
    /// Linked neighbours the announcement floods to.
    pub flood: Vec<NodeRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    pub already_linked: bool,
    pub notices: Vec<PointerNotice>,
    pub referrals: Referrals,
}

impl LinkPlan {
    fn notify(&mut self, target: &NodeRef, update: PointerUpdate) {
        self.notices.push(PointerNotice {
            target: target.clone(),
            update,
        });
    }
}

/// Point-in-time copy of a node's pointers and files, as served by `GetState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub node: NodeRef,
    pub predecessor: Option<NodeRef>,
    pub successor: Option<NodeRef>,
    pub files: Vec<u64>,
    pub local_files: Vec<u64>,
}

impl NodeSnapshot {
    /// The node owns `key` when it has no predecessor or the key falls in
    /// `(predecessor, node]`.
    pub fn owns(&self, key: u64) -> bool {
        match &self.predecessor {
            None => true,
            Some(predecessor) => in_open_closed(key, predecessor.id, self.node.id),
        }
    }
}

impl From<NodeSnapshot> for NodeStatus {
    fn from(snapshot: NodeSnapshot) -> Self {
        NodeStatus {
            node: Some(snapshot.node.into()),
            predecessor: snapshot.predecessor.map(Into::into),
            successor: snapshot.successor.map(Into::into),
            files: snapshot.files,
            local_files: snapshot.local_files,
        }
    }
}

impl TryFrom<NodeStatus> for NodeSnapshot {
    type Error = crate::error::Error;

    fn try_from(status: NodeStatus) -> Result<Self> {
        Ok(NodeSnapshot {
            node: rpc::required_node(status.node, "node")?,
            predecessor: status.predecessor.map(Into::into),
            successor: status.successor.map(Into::into),
            files: status.files,
            local_files: status.local_files,
        })
    }
}

impl NodeState {
    pub fn new(local: NodeRef, space: IdSpace) -> Self {
        let fingers = FingerTable::new(local.id, space);
        NodeState {
            local,
            predecessor: None,
            successor: None,
            fingers,
            directory: FileDirectory::new(),
        }
    }

    pub fn local(&self) -> &NodeRef {
        &self.local
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            node: self.local.clone(),
            predecessor: self.predecessor.clone(),
            successor: self.successor.clone(),
            files: self.directory.files(),
            local_files: self.directory.local_files(),
        }
    }

    fn is_linked_to(&self, id: u64) -> bool {
        self.local.id == id
            || self.successor.as_ref().map(|n| n.id) == Some(id)
            || self.predecessor.as_ref().map(|n| n.id) == Some(id)
    }

    /// Decides how this node links `requester` into the ring and applies the
    /// local half of it. Pointer changes for other nodes come back as
    /// notices; the caller sends them once the lock is released.
    pub fn plan_link(&mut self, requester: &NodeRef) -> LinkPlan {
        let mut plan = LinkPlan::default();
        let me = self.local.clone();

        if self.is_linked_to(requester.id) {
            debug!("#{} is already linked to #{}", me.id, requester.id);
            plan.already_linked = true;
            return plan;
        }

        if self.successor.is_none() && self.predecessor.is_none() {
            info!("#{} was alone, pairing with #{}", me.id, requester.id);
            self.successor = Some(requester.clone());
            self.predecessor = Some(requester.clone());
            plan.notify(requester, PointerUpdate::Predecessor(me.clone()));
            plan.notify(requester, PointerUpdate::Successor(me));
            return plan;
        }

        if requester.id > me.id {
            let insert = match &self.successor {
                None => true,
                // Our successor wrapping past zero makes us the ring's last node.
                Some(successor) => requester.id < successor.id || successor.id <= me.id,
            };
            if insert {
                let previous = self.successor.replace(requester.clone());
                info!("#{} takes #{} as successor", me.id, requester.id);
                plan.notify(requester, PointerUpdate::Predecessor(me.clone()));
                if let Some(previous) = previous {
                    plan.notify(requester, PointerUpdate::Successor(previous.clone()));
                    plan.notify(&previous, PointerUpdate::Predecessor(requester.clone()));
                }
            } else {
                plan.referrals.delegate = self.successor.clone();
            }
        } else {
            let insert = match &self.predecessor {
                None => true,
                Some(predecessor) => requester.id > predecessor.id || predecessor.id >= me.id,
            };
            if insert {
                let previous = self.predecessor.replace(requester.clone());
                info!("#{} takes #{} as predecessor", me.id, requester.id);
                plan.notify(requester, PointerUpdate::Successor(me.clone()));
                if let Some(previous) = previous {
                    plan.notify(requester, PointerUpdate::Predecessor(previous.clone()));
                    plan.notify(&previous, PointerUpdate::Successor(requester.clone()));
                }
            } else {
                plan.referrals.delegate = self.predecessor.clone();
            }
        }

        for neighbor in [&self.successor, &self.predecessor].into_iter().flatten() {
            let fresh = !plan.referrals.flood.iter().any(|n| n.id == neighbor.id);
            if neighbor.id != requester.id && fresh {
                plan.referrals.flood.push(neighbor.clone());
            }
        }
        plan
    }

    pub fn apply(&mut self, update: PointerUpdate) {
        match update {
            PointerUpdate::Predecessor(node) => {
                info!("#{} predecessor is now #{}", self.local.id, node.id);
                self.predecessor = Some(node);
            }
            PointerUpdate::Successor(node) => {
                info!("#{} successor is now #{}", self.local.id, node.id);
                self.successor = Some(node);
            }
        }
    }

    /// Flat finger scan: the smallest id at or after `key` among this node
    /// and its finger successors, or this node when nothing qualifies.
    pub fn closest_preceding(&self, key: u64) -> NodeRef {
        let own = Some(&self.local).filter(|node| node.id >= key);
        own.into_iter()
            .chain(self.fingers.successors().filter(|node| node.id >= key))
            .min_by_key(|node| node.id)
            .unwrap_or(&self.local)
            .clone()
    }

    /// The predecessor to continue a locate through, if its id is past `key`.
    pub fn continue_through(&self, key: u64) -> Option<NodeRef> {
        self.predecessor.clone().filter(|predecessor| predecessor.id > key)
    }

    /// Drops local participation. Neighbours keep pointing here.
    pub fn leave(&mut self) {
        self.predecessor = None;
        self.successor = None;
        self.fingers.clear();
    }
}
