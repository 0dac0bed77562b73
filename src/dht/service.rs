use log::info;
use tokio::sync::Mutex;
use tonic::{Request, Response, Status};

use crate::error::Result;
use crate::ring::IdSpace;
use crate::rpc::dht::dht_node_server::DhtNode;
use crate::rpc::dht::{
    CheckFileResult, CheckPredecessorResult, FileQuery, FindFileResult, KeyQuery, LinkResult,
    NodeStatus, Peer, Rendering, StoreResult,
};
use crate::rpc;
use crate::NodeRef;

use super::finger::FingerTable;
use super::peer::{normalize_addr, Peers};
use super::state::{NodeSnapshot, NodeState, PointerUpdate};

/// One ring member. Handed to the gRPC server at startup; every handler
/// goes through the same state lock.
#[derive(Debug)]
pub struct DhtNodeService {
    pub(super) local: NodeRef,
    pub(super) space: IdSpace,
    pub(super) state: Mutex<NodeState>,
    pub(super) peers: Peers,
}

impl DhtNodeService {
    pub fn new(local: NodeRef, space: IdSpace) -> Self {
        DhtNodeService {
            state: Mutex::new(NodeState::new(local.clone(), space)),
            local,
            space,
            peers: Peers::new(),
        }
    }

    pub fn local(&self) -> &NodeRef {
        &self.local
    }

    pub fn space(&self) -> IdSpace {
        self.space
    }

    pub async fn snapshot(&self) -> NodeSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn fingers(&self) -> FingerTable {
        self.state.lock().await.fingers.clone()
    }

    /// State of `node`, read locally when it is this node.
    pub(super) async fn state_of(&self, node: &NodeRef) -> Result<NodeSnapshot> {
        if node.id == self.local.id {
            Ok(self.snapshot().await)
        } else {
            self.peers.get_state(node).await
        }
    }

    pub async fn apply_pointer(&self, update: PointerUpdate) {
        self.state.lock().await.apply(update);
    }

    pub async fn update_fingers(&self, candidate: &NodeRef) -> Vec<usize> {
        let touched = self.state.lock().await.fingers.consider_candidate(candidate);
        info!(
            "#{} considered #{} for its finger table, {} entries changed",
            self.local.id,
            candidate.id,
            touched.len()
        );
        touched
    }

    fn peer(&self, peer: Option<rpc::dht::Node>) -> Result<NodeRef> {
        let mut node = rpc::required_node(peer, "node")?;
        self.space.check_key(node.id)?;
        node.addr = normalize_addr(&node.addr);
        Ok(node)
    }

    fn file_id(&self, query: &FileQuery) -> Result<u64> {
        self.space.check_key(rpc::required_key(query.file_id, "file_id")?)
    }
}

#[tonic::async_trait]
impl DhtNode for DhtNodeService {
    async fn join(&self, request: Request<Peer>) -> std::result::Result<Response<()>, Status> {
        let requester = self.peer(request.into_inner().node)?;
        info!("Received join request from #{}", requester.id);
        self.join_ring(requester).await?;
        Ok(Response::new(()))
    }

    async fn leave(&self, _request: Request<()>) -> std::result::Result<Response<()>, Status> {
        self.leave_ring().await;
        Ok(Response::new(()))
    }

    async fn update_predecessor(
        &self,
        request: Request<Peer>,
    ) -> std::result::Result<Response<()>, Status> {
        let node = self.peer(request.into_inner().node)?;
        self.apply_pointer(PointerUpdate::Predecessor(node)).await;
        Ok(Response::new(()))
    }

    async fn update_successor(
        &self,
        request: Request<Peer>,
    ) -> std::result::Result<Response<()>, Status> {
        let node = self.peer(request.into_inner().node)?;
        self.apply_pointer(PointerUpdate::Successor(node)).await;
        Ok(Response::new(()))
    }

    async fn update_finger_table(
        &self,
        request: Request<Peer>,
    ) -> std::result::Result<Response<()>, Status> {
        let candidate = self.peer(request.into_inner().node)?;
        self.update_fingers(&candidate).await;
        Ok(Response::new(()))
    }

    async fn link(
        &self,
        request: Request<Peer>,
    ) -> std::result::Result<Response<LinkResult>, Status> {
        let requester = self.peer(request.into_inner().node)?;
        let referrals = self.link_step(&requester).await?;
        Ok(Response::new(LinkResult {
            delegate: referrals.delegate.map(Into::into),
            flood: referrals.flood.into_iter().map(Into::into).collect(),
        }))
    }

    async fn store_file(
        &self,
        request: Request<FileQuery>,
    ) -> std::result::Result<Response<StoreResult>, Status> {
        let query = request.into_inner();
        let file_id = self.file_id(&query)?;

        let outcome = if query.forwarded {
            self.store_local(file_id).await
        } else {
            self.store(file_id).await?
        };

        Ok(Response::new(StoreResult {
            owner: Some(outcome.owner.into()),
            message: outcome.message,
        }))
    }

    async fn find_file(
        &self,
        request: Request<FileQuery>,
    ) -> std::result::Result<Response<FindFileResult>, Status> {
        let file_id = self.file_id(request.get_ref())?;
        let owner = self.locate(file_id).await?;
        Ok(Response::new(FindFileResult {
            found: owner.is_some(),
            owner: owner.map(Into::into),
        }))
    }

    async fn check_file(
        &self,
        request: Request<FileQuery>,
    ) -> std::result::Result<Response<CheckFileResult>, Status> {
        let file_id = self.file_id(request.get_ref())?;
        let exists = self.has_file(file_id).await;
        Ok(Response::new(CheckFileResult { exists }))
    }

    async fn check_predecessor(
        &self,
        request: Request<FileQuery>,
    ) -> std::result::Result<Response<CheckPredecessorResult>, Status> {
        let file_id = self.file_id(request.get_ref())?;
        let predecessor = self.continue_locate_through(file_id).await;
        Ok(Response::new(CheckPredecessorResult {
            continue_search: predecessor.is_some(),
            predecessor: predecessor.map(Into::into),
        }))
    }

    async fn lookup(
        &self,
        request: Request<KeyQuery>,
    ) -> std::result::Result<Response<Peer>, Status> {
        let key = rpc::required_key(request.get_ref().key, "key")?;
        let owner = self.find_owner(self.space.check_key(key)?).await?;
        Ok(Response::new(Peer::of(owner)))
    }

    async fn closest_preceding(
        &self,
        request: Request<KeyQuery>,
    ) -> std::result::Result<Response<Peer>, Status> {
        let key = rpc::required_key(request.get_ref().key, "key")?;
        let node = self.state.lock().await.closest_preceding(key);
        Ok(Response::new(Peer::of(node)))
    }

    async fn get_state(
        &self,
        _request: Request<()>,
    ) -> std::result::Result<Response<NodeStatus>, Status> {
        Ok(Response::new(self.snapshot().await.into()))
    }

    async fn show_ring(
        &self,
        _request: Request<()>,
    ) -> std::result::Result<Response<Rendering>, Status> {
        let text = self.ring_view().await?;
        Ok(Response::new(Rendering { text }))
    }

    async fn show_finger_table(
        &self,
        _request: Request<()>,
    ) -> std::result::Result<Response<Rendering>, Status> {
        let text = self.finger_table_view().await;
        Ok(Response::new(Rendering { text }))
    }
}
