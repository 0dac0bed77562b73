use std::collections::HashSet;

use log::{info, warn};

use crate::error::Result;
use crate::NodeRef;

use super::service::DhtNodeService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    pub owner: NodeRef,
    pub message: String,
}

impl DhtNodeService {
    async fn resolve_from(&self, start: NodeRef, key: u64) -> Result<NodeRef> {
        let closest = self.closest_preceding_from(start, key).await?;
        self.find_owner_from(closest, key).await
    }

    /// Places `file_id` on the node that owns it.
    pub async fn store(&self, file_id: u64) -> Result<StoreOutcome> {
        self.space.check_key(file_id)?;
        let target = self.resolve_from(self.local.clone(), file_id).await?;

        if target.id == self.local.id {
            return Ok(self.store_local(file_id).await);
        }

        info!("Sending file {} to #{}", file_id, target.id);
        let (owner, message) = self.peers.store_forwarded(&target, file_id).await?;
        Ok(StoreOutcome { owner, message })
    }

    pub async fn store_local(&self, file_id: u64) -> StoreOutcome {
        let added = self.state.lock().await.directory.store(file_id);
        info!("File {} stored on #{}", file_id, self.local.id);
        let message = if added {
            format!("file {} stored on node {}", file_id, self.local.id)
        } else {
            format!("file {} was already stored on node {}", file_id, self.local.id)
        };
        StoreOutcome {
            owner: self.local.clone(),
            message,
        }
    }

    pub async fn has_file(&self, file_id: u64) -> bool {
        self.state.lock().await.directory.owns(file_id)
    }

    pub async fn continue_locate_through(&self, file_id: u64) -> Option<NodeRef> {
        self.state.lock().await.continue_through(file_id)
    }

    /// Finds the node holding `file_id` and caches the id locally. `None`
    /// when the owner does not have it or cannot be reached.
    pub async fn locate(&self, file_id: u64) -> Result<Option<NodeRef>> {
        self.space.check_key(file_id)?;

        let mut current = self.local.clone();
        let mut visited = HashSet::new();
        loop {
            visited.insert(current.id);
            let next = if current.id == self.local.id {
                self.continue_locate_through(file_id).await
            } else {
                match self.peers.check_predecessor(&current, file_id).await {
                    Ok(next) => next,
                    Err(err) => {
                        warn!("Predecessor check at #{} failed: {}", current.id, err);
                        None
                    }
                }
            };
            match next {
                Some(predecessor) if !visited.contains(&predecessor.id) => current = predecessor,
                _ => break,
            }
        }

        let owner = match self.resolve_from(current, file_id).await {
            Ok(owner) => owner,
            Err(err) => {
                warn!("Could not resolve the owner of file {}: {}", file_id, err);
                return Ok(None);
            }
        };

        let exists = if owner.id == self.local.id {
            self.has_file(file_id).await
        } else {
            self.peers.check_file(&owner, file_id).await.unwrap_or_else(|err| {
                warn!("File check at #{} failed: {}", owner.id, err);
                false
            })
        };

        if !exists {
            info!("File {} not found at #{}", file_id, owner.id);
            return Ok(None);
        }

        self.state.lock().await.directory.cache(file_id);
        info!("File {} found on #{}", file_id, owner.id);
        Ok(Some(owner))
    }
}
