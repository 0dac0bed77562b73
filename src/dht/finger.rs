use log::{debug, warn};

use crate::error::Error;
use crate::ring::{in_closed_open, IdSpace};
use crate::NodeRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerEntry {
    /// 1-based position in the table.
    pub index: usize,
    pub start: u64,
    /// Exclusive end of `[start, end)`.
    pub end: u64,
    pub successor: Option<NodeRef>,
}

/// Routing shortcuts of one node. Starts and intervals depend only on the
/// owner id; successors are filled in as members are announced.
#[derive(Debug, Clone)]
pub struct FingerTable {
    owner: u64,
    entries: Vec<FingerEntry>,
}

impl FingerTable {
    pub fn new(owner: u64, space: IdSpace) -> Self {
        let entries = (1..=space.bits() as usize)
            .map(|index| {
                let span = 1u64 << (index - 1);
                let start = space.wrap(owner.wrapping_add(span));
                FingerEntry {
                    index,
                    start,
                    end: space.wrap(start.wrapping_add(span)),
                    successor: None,
                }
            })
            .collect();

        FingerTable { owner, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FingerEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&FingerEntry> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Replaces the successor of entry `index`. Indices outside `[1, m]`
    /// are ignored.
    pub fn set(&mut self, index: usize, node: NodeRef) -> bool {
        let bits = self.entries.len();
        match index.checked_sub(1).and_then(|i| self.entries.get_mut(i)) {
            Some(entry) => {
                debug!(
                    "Finger {} of #{} now points at #{}",
                    index, self.owner, node.id
                );
                entry.successor = Some(node);
                true
            }
            None => {
                warn!("{} on #{}, ignoring", Error::OutOfRange { index, bits }, self.owner);
                false
            }
        }
    }

    /// Offers a newly announced member to every entry and keeps it where it
    /// is circularly closer to the entry start than what is recorded.
    /// Returns the indices that changed.
    pub fn consider_candidate(&mut self, candidate: &NodeRef) -> Vec<usize> {
        let accepted: Vec<usize> = self
            .entries
            .iter()
            .filter(|entry| match &entry.successor {
                None => in_closed_open(candidate.id, entry.start, self.owner),
                Some(current) => in_closed_open(candidate.id, entry.start, current.id),
            })
            .map(|entry| entry.index)
            .collect();

        for index in &accepted {
            self.set(*index, candidate.clone());
        }
        accepted
    }

    pub fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.successor = None;
        }
    }

    pub fn successors(&self) -> impl Iterator<Item = &NodeRef> {
        self.entries.iter().filter_map(|entry| entry.successor.as_ref())
    }
}
