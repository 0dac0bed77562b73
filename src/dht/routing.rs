use std::collections::HashSet;

use log::debug;

use crate::error::Result;
use crate::ring::in_open_closed;
use crate::NodeRef;

use super::service::DhtNodeService;

impl DhtNodeService {
    pub async fn find_owner(&self, key: u64) -> Result<NodeRef> {
        self.find_owner_from(self.local.clone(), key).await
    }

    /// Walks successor pointers from `start` until the key falls between a
    /// node's predecessor and itself, or between it and its successor.
    /// Broken linkage ends the walk at the current node.
    pub async fn find_owner_from(&self, start: NodeRef, key: u64) -> Result<NodeRef> {
        let mut current = start;
        let mut visited = HashSet::new();

        loop {
            visited.insert(current.id);
            let state = self.state_of(&current).await?;
            if state.owns(key) {
                return Ok(current);
            }

            let Some(successor) = state.successor else {
                debug!("#{} has no successor, claiming key {}", current.id, key);
                return Ok(current);
            };
            if in_open_closed(key, current.id, successor.id) {
                return Ok(successor);
            }
            if visited.contains(&successor.id) {
                debug!("Ring walk for key {} looped back, claiming at #{}", key, current.id);
                return Ok(current);
            }
            current = successor;
        }
    }

    pub async fn find_closest_preceding_node(&self, key: u64) -> Result<NodeRef> {
        self.closest_preceding_from(self.local.clone(), key).await
    }

    /// Backs up through predecessors whose id is still above `key`, then
    /// scans the finger table of the node it stopped at.
    pub async fn closest_preceding_from(&self, start: NodeRef, key: u64) -> Result<NodeRef> {
        let mut origin = start;
        let mut visited = HashSet::new();

        loop {
            visited.insert(origin.id);
            let state = self.state_of(&origin).await?;
            match state.predecessor {
                Some(predecessor) if predecessor.id > key && !visited.contains(&predecessor.id) => {
                    debug!("Key {} backs up from #{} to #{}", key, origin.id, predecessor.id);
                    origin = predecessor;
                }
                _ => break,
            }
        }

        if origin.id == self.local.id {
            Ok(self.state.lock().await.closest_preceding(key))
        } else {
            self.peers.closest_preceding(&origin, key).await
        }
    }
}
