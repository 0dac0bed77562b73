//! Ring membership.
//!
//! A join is presented to any member, which then drives the whole flow from
//! a local work queue: every node it visits runs the link step, and the
//! delegate and flood targets it hands back are queued unless already
//! visited. Once the queue drains, every reachable member is told about the
//! newcomer so it shows up in their finger tables.

use std::collections::{HashSet, VecDeque};

use log::{debug, info, warn};

use crate::error::Result;
use crate::NodeRef;

use super::service::DhtNodeService;
use super::state::Referrals;

impl DhtNodeService {
    pub async fn join_ring(&self, requester: NodeRef) -> Result<()> {
        info!(
            "#{} handling join of #{} ({})",
            self.local.id, requester.id, requester.addr
        );

        let mut queue = VecDeque::from([self.local.clone()]);
        let mut visited = HashSet::new();

        while let Some(member) = queue.pop_front() {
            if !visited.insert(member.id) {
                continue;
            }
            let referrals = if member.id == self.local.id {
                self.link_step(&requester).await?
            } else {
                debug!("Forwarding join of #{} to #{}", requester.id, member.id);
                self.peers.link(&member, &requester).await?
            };
            queue.extend(
                referrals
                    .delegate
                    .into_iter()
                    .chain(referrals.flood)
                    .filter(|next| !visited.contains(&next.id)),
            );
        }

        self.announce(&requester).await;
        Ok(())
    }

    /// Links `requester` relative to this node and sends the pointer changes
    /// the plan asks of other nodes. Failures there abort the join as is.
    pub async fn link_step(&self, requester: &NodeRef) -> Result<Referrals> {
        let plan = self.state.lock().await.plan_link(requester);

        for notice in plan.notices {
            debug!(
                "#{} asks #{} to apply {:?}",
                self.local.id, notice.target.id, notice.update
            );
            if notice.target.id == self.local.id {
                self.apply_pointer(notice.update).await;
            } else {
                self.peers.update_pointer(&notice.target, &notice.update).await?;
            }
        }
        Ok(plan.referrals)
    }

    /// Every member reachable through predecessor links, then successor
    /// links, starting with this node. An unreachable member is kept but
    /// ends the walk in that direction.
    pub async fn collect_members(&self) -> Vec<NodeRef> {
        let mut members = vec![self.local.clone()];
        let mut visited = HashSet::from([self.local.id]);

        let start = self.snapshot().await;
        for backwards in [true, false] {
            let mut cursor = start.clone();
            loop {
                let next = if backwards {
                    cursor.predecessor.take()
                } else {
                    cursor.successor.take()
                };
                let Some(next) = next else { break };
                if !visited.insert(next.id) {
                    break;
                }
                members.push(next.clone());
                cursor = match self.state_of(&next).await {
                    Ok(state) => state,
                    Err(err) => {
                        warn!("Ring walk stopped at #{}: {}", next.id, err);
                        break;
                    }
                };
            }
        }
        members
    }

    async fn announce(&self, newcomer: &NodeRef) {
        let members = self.collect_members().await;
        info!(
            "Announcing #{} to {} members",
            newcomer.id,
            members.len()
        );

        for member in &members {
            if let Err(err) = self.send_finger_update(member, newcomer).await {
                warn!("Finger update of #{} failed: {}", member.id, err);
            }
        }
        for member in members.iter().filter(|m| m.id != newcomer.id) {
            if let Err(err) = self.send_finger_update(newcomer, member).await {
                warn!("Finger update of newcomer #{} failed: {}", newcomer.id, err);
            }
        }
    }

    async fn send_finger_update(&self, target: &NodeRef, candidate: &NodeRef) -> Result<()> {
        if target.id == self.local.id {
            self.update_fingers(candidate).await;
            Ok(())
        } else {
            self.peers.update_finger_table(target, candidate).await
        }
    }

    /// Forgets neighbours and fingers. Neighbours are not told.
    pub async fn leave_ring(&self) {
        warn!(
            "#{} leaving the ring; neighbours keep their pointers",
            self.local.id
        );
        self.state.lock().await.leave();
    }
}
