//! Ring scenarios against real gRPC servers on ephemeral localhost ports.

use std::sync::Arc;

use chordring::dht::finger::FingerTable;
use chordring::dht::peer::file_query;
use chordring::dht::service::DhtNodeService;
use chordring::dht::state::PointerUpdate;
use chordring::error::Error;
use chordring::ring::{owner_of, IdSpace};
use chordring::rpc::dht::dht_node_client::DhtNodeClient;
use chordring::rpc::dht::dht_node_server::DhtNodeServer;
use chordring::rpc::dht::{FileQuery, KeyQuery, Peer};
use chordring::NodeRef;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use tonic::{Code, Request};

const BITS: u32 = 8;

async fn spawn_node(id: u64) -> Arc<DhtNodeService> {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = format!("http://{}", listener.local_addr().expect("local_addr failed"));
    let service = Arc::new(DhtNodeService::new(
        NodeRef::new(id, addr),
        IdSpace::new(BITS).unwrap(),
    ));

    tokio::spawn(
        Server::builder()
            .add_service(DhtNodeServer::from_arc(service.clone()))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    service
}

async fn client_of(node: &DhtNodeService) -> DhtNodeClient<Channel> {
    DhtNodeClient::connect(node.local().addr.clone())
        .await
        .expect("connect failed")
}

/// Starts `ids[0]` alone and joins the rest one by one through `ids[0]`.
async fn ring_of(ids: &[u64]) -> Vec<Arc<DhtNodeService>> {
    let mut nodes: Vec<Arc<DhtNodeService>> = Vec::new();
    for id in ids {
        let node = spawn_node(*id).await;
        if let Some(first) = nodes.first() {
            first.join_ring(node.local().clone()).await.expect("join failed");
        }
        nodes.push(node);
    }
    nodes
}

fn by_id(nodes: &[Arc<DhtNodeService>], id: u64) -> &Arc<DhtNodeService> {
    nodes.iter().find(|n| n.local().id == id).expect("unknown node")
}

fn points_at(table: &FingerTable, id: u64) -> bool {
    table
        .entries()
        .iter()
        .any(|entry| entry.successor.as_ref().map(|n| n.id) == Some(id))
}

async fn assert_linked(nodes: &[Arc<DhtNodeService>]) {
    let mut ids: Vec<u64> = nodes.iter().map(|n| n.local().id).collect();
    ids.sort_unstable();
    let count = ids.len();

    for (i, id) in ids.iter().enumerate() {
        let state = by_id(nodes, *id).snapshot().await;
        let successor = state.successor.map(|n| n.id);
        let predecessor = state.predecessor.map(|n| n.id);
        assert_eq!(successor, Some(ids[(i + 1) % count]), "successor of #{}", id);
        assert_eq!(predecessor, Some(ids[(i + count - 1) % count]), "predecessor of #{}", id);
    }
}

#[tokio::test]
async fn second_node_pairs_both_ways() {
    let ten = spawn_node(10).await;
    let two_hundred = spawn_node(200).await;

    client_of(&ten)
        .await
        .join(Request::new(Peer::of(two_hundred.local().clone())))
        .await
        .expect("join rpc failed");

    let ten_state = ten.snapshot().await;
    let other_state = two_hundred.snapshot().await;
    assert_eq!(ten_state.successor.map(|n| n.id), Some(200));
    assert_eq!(ten_state.predecessor.map(|n| n.id), Some(200));
    assert_eq!(other_state.successor.map(|n| n.id), Some(10));
    assert_eq!(other_state.predecessor.map(|n| n.id), Some(10));
}

#[tokio::test]
async fn two_node_ring_ownership_wraps() {
    let nodes = ring_of(&[10, 200]).await;

    for node in &nodes {
        assert_eq!(node.find_owner(50).await.unwrap().id, 200);
        assert_eq!(node.find_owner(5).await.unwrap().id, 10);
        assert_eq!(node.find_owner(250).await.unwrap().id, 10);
        assert_eq!(node.find_owner(200).await.unwrap().id, 200);
    }

    let resolved = client_of(&nodes[0])
        .await
        .lookup(Request::new(KeyQuery { key: Some(50) }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(resolved.node.map(|n| n.id), Some(200));
}

#[tokio::test]
async fn store_lands_on_owner_not_on_caller() {
    let nodes = ring_of(&[10, 200]).await;
    let (ten, two_hundred) = (&nodes[0], &nodes[1]);

    let outcome = ten.store(50).await.unwrap();
    assert_eq!(outcome.owner.id, 200);
    assert_eq!(two_hundred.snapshot().await.files, vec![50]);
    assert!(ten.snapshot().await.files.is_empty());

    let outcome = ten.store(250).await.unwrap();
    assert_eq!(outcome.owner.id, 10);
    assert_eq!(ten.snapshot().await.files, vec![250]);
}

#[tokio::test]
async fn store_then_locate_returns_same_owner() {
    let nodes = ring_of(&[10, 200, 100, 5, 250, 150]).await;
    let ids = [10, 200, 100, 5, 250, 150];

    for (i, key) in [0u64, 7, 50, 101, 150, 199, 201, 255].iter().enumerate() {
        let placer = &nodes[i % nodes.len()];
        let finder = &nodes[(i + 3) % nodes.len()];

        let stored = placer.store(*key).await.unwrap();
        assert_eq!(Some(stored.owner.id), owner_of(*key, &ids), "owner of {}", key);

        let located = finder.locate(*key).await.unwrap();
        assert_eq!(located.map(|n| n.id), Some(stored.owner.id), "locate {}", key);
        if finder.local().id != stored.owner.id {
            assert!(finder.snapshot().await.local_files.contains(key));
        }
    }
}

#[tokio::test]
async fn locating_unknown_file_is_not_found() {
    let nodes = ring_of(&[10, 200]).await;
    assert_eq!(nodes[0].locate(77).await.unwrap(), None);
    assert!(nodes[0].snapshot().await.local_files.is_empty());

    let reply = client_of(&nodes[1])
        .await
        .find_file(Request::new(file_query(77, false)))
        .await
        .unwrap()
        .into_inner();
    assert!(!reply.found);
    assert!(reply.owner.is_none());
    assert!(matches!(reply.into_owner(77), Err(Error::NotFound(_))));
}

#[tokio::test]
async fn locate_with_unreachable_owner_is_not_found() {
    let ten = spawn_node(10).await;
    let ghost = NodeRef::new(200, "http://127.0.0.1:1");
    ten.apply_pointer(PointerUpdate::Predecessor(ghost.clone())).await;
    ten.apply_pointer(PointerUpdate::Successor(ghost)).await;

    assert_eq!(ten.locate(50).await.unwrap(), None);
}

#[tokio::test]
async fn join_of_unreachable_node_fails_and_keeps_partial_link() {
    let ten = spawn_node(10).await;
    let ghost = NodeRef::new(200, "http://127.0.0.1:1");

    let err = client_of(&ten)
        .await
        .join(Request::new(Peer::of(ghost)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);

    // The local half of the pairing stays in place.
    let state = ten.snapshot().await;
    assert_eq!(state.successor.map(|n| n.id), Some(200));
    assert_eq!(state.predecessor.map(|n| n.id), Some(200));
}

#[tokio::test]
async fn store_with_unreachable_owner_is_connectivity_error() {
    let ten = spawn_node(10).await;
    let ghost = NodeRef::new(200, "http://127.0.0.1:1");
    ten.apply_pointer(PointerUpdate::Predecessor(ghost.clone())).await;
    ten.apply_pointer(PointerUpdate::Successor(ghost)).await;

    assert!(matches!(ten.store(50).await, Err(Error::Connectivity(_))));
    assert!(ten.snapshot().await.files.is_empty());

    let err = client_of(&ten)
        .await
        .store_file(Request::new(file_query(50, false)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unavailable);
}

#[tokio::test]
async fn unreachable_member_does_not_block_announcement() {
    let ten = spawn_node(10).await;
    let hundred = spawn_node(100).await;
    let two_hundred = spawn_node(200).await;
    let ghost = NodeRef::new(5, "http://127.0.0.1:1");

    // 100 already points at the newcomer, so only the ring walk reaches 5.
    ten.apply_pointer(PointerUpdate::Predecessor(hundred.local().clone())).await;
    hundred.apply_pointer(PointerUpdate::Successor(two_hundred.local().clone())).await;
    hundred.apply_pointer(PointerUpdate::Predecessor(ghost)).await;

    ten.join_ring(two_hundred.local().clone())
        .await
        .expect("join should survive a dead member");

    assert_eq!(ten.snapshot().await.successor.map(|n| n.id), Some(200));
    assert_eq!(two_hundred.snapshot().await.predecessor.map(|n| n.id), Some(10));

    assert!(points_at(&hundred.fingers().await, 200));
    assert!(points_at(&two_hundred.fingers().await, 100));
}

#[tokio::test]
async fn peer_address_without_scheme_is_normalized() {
    let ten = spawn_node(10).await;
    let two_hundred = spawn_node(200).await;
    let full = two_hundred.local().addr.clone();
    let bare = full.trim_start_matches("http://").to_owned();

    client_of(&ten)
        .await
        .join(Request::new(Peer::of(NodeRef::new(200, bare))))
        .await
        .expect("join rpc failed");

    let state = ten.snapshot().await;
    assert_eq!(state.successor.map(|n| n.addr), Some(full.clone()));
    assert_eq!(state.predecessor.map(|n| n.addr), Some(full));
    assert_eq!(two_hundred.snapshot().await.successor.map(|n| n.id), Some(10));
}

#[tokio::test]
async fn joins_keep_ring_and_ownership_consistent() {
    let ids = [10u64, 200, 100, 5, 250, 150, 60, 7, 255];
    let mut nodes: Vec<Arc<DhtNodeService>> = Vec::new();
    let mut members = Vec::new();

    for (round, id) in ids.iter().enumerate() {
        let node = spawn_node(*id).await;
        if !nodes.is_empty() {
            // Rotate the member the join is presented to.
            let entry = match round % 3 {
                0 => &nodes[nodes.len() - 1],
                1 => &nodes[0],
                _ => &nodes[nodes.len() / 2],
            };
            entry.join_ring(node.local().clone()).await.expect("join failed");
        }
        nodes.push(node);
        members.push(*id);

        if nodes.len() > 1 {
            assert_linked(&nodes).await;
        }
        for key in (0..256u64).step_by(17) {
            let expected = owner_of(key, &members);
            let first = nodes[0].find_owner(key).await.unwrap();
            let newest = nodes[nodes.len() - 1].find_owner(key).await.unwrap();
            assert_eq!(Some(first.id), expected, "key {} after #{} joined", key, id);
            assert_eq!(Some(newest.id), expected, "key {} after #{} joined", key, id);
        }
    }

    // Same answer for the same key while nothing changes.
    for key in [0u64, 6, 8, 128, 254] {
        let once = nodes[3].find_owner(key).await.unwrap();
        let again = nodes[3].find_owner(key).await.unwrap();
        assert_eq!(once, again);
    }
}

#[tokio::test]
async fn finger_tables_track_ring_successors() {
    let ids = [10u64, 200, 100, 5, 250, 150, 60];
    let nodes = ring_of(&ids).await;

    for node in &nodes {
        let own = node.local().id;
        let table = node.fingers().await;
        assert_eq!(table.len(), BITS as usize);
        for entry in table.entries() {
            let span = 1u64 << (entry.index - 1);
            assert_eq!(entry.start, (own + span) % 256);
            assert_eq!(entry.end, (own + 2 * span) % 256);

            let expected = owner_of(entry.start, &ids).filter(|id| *id != own);
            let recorded = entry.successor.as_ref().map(|n| n.id);
            assert_eq!(recorded, expected, "finger {} of #{}", entry.index, own);
        }

        let text = client_of(node)
            .await
            .show_finger_table(Request::new(()))
            .await
            .unwrap()
            .into_inner()
            .text;
        assert_eq!(text, node.finger_table_view().await);
        assert_eq!(text.lines().count(), BITS as usize + 4);
    }

    assert_eq!(by_id(&nodes, 100).find_closest_preceding_node(120).await.unwrap().id, 150);
    assert_eq!(by_id(&nodes, 10).find_closest_preceding_node(120).await.unwrap().id, 150);
    // Backs up through 150 and 100 until the predecessor is below the key.
    assert_eq!(by_id(&nodes, 200).find_closest_preceding_node(30).await.unwrap().id, 60);
}

#[tokio::test]
async fn check_predecessor_continues_only_past_key() {
    let nodes = ring_of(&[10, 200, 100]).await;

    for node in &nodes {
        let predecessor = node.snapshot().await.predecessor.unwrap();
        let mut client = client_of(node).await;
        for key in [0u64, 9, 10, 11, 99, 100, 150, 199, 200, 255] {
            let reply = client
                .check_predecessor(Request::new(file_query(key, false)))
                .await
                .unwrap()
                .into_inner();
            assert_eq!(reply.continue_search, predecessor.id > key, "key {}", key);
            assert_eq!(reply.predecessor.is_some(), reply.continue_search);
        }
    }
}

#[tokio::test]
async fn store_rpc_forwards_to_owner() {
    let nodes = ring_of(&[10, 200, 100]).await;
    let reply = client_of(&nodes[0])
        .await
        .store_file(Request::new(file_query(150, false)))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(reply.owner.map(|n| n.id), Some(200));
    assert!(reply.message.contains("150"));
    assert_eq!(by_id(&nodes, 200).snapshot().await.files, vec![150]);

    let exists = client_of(by_id(&nodes, 200))
        .await
        .check_file(Request::new(file_query(150, false)))
        .await
        .unwrap()
        .into_inner()
        .exists;
    assert!(exists);
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let node = spawn_node(10).await;
    let mut client = client_of(&node).await;

    let err = client
        .join(Request::new(Peer { node: None }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = client
        .store_file(Request::new(FileQuery {
            file_id: None,
            forwarded: false,
        }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = client
        .lookup(Request::new(KeyQuery { key: Some(256) }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = client
        .update_predecessor(Request::new(Peer::of(NodeRef::new(3, ""))))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn leave_only_forgets_local_pointers() {
    let nodes = ring_of(&[10, 200, 100]).await;
    let hundred = by_id(&nodes, 100);
    hundred.store_local(120).await;

    client_of(hundred)
        .await
        .leave(Request::new(()))
        .await
        .unwrap();

    let state = hundred.snapshot().await;
    assert_eq!(state.successor, None);
    assert_eq!(state.predecessor, None);
    assert_eq!(state.files, vec![120]);

    // Neighbours are not rewired.
    assert_eq!(by_id(&nodes, 10).snapshot().await.successor.map(|n| n.id), Some(100));
    assert_eq!(by_id(&nodes, 200).snapshot().await.predecessor.map(|n| n.id), Some(100));
}

#[tokio::test]
async fn show_ring_lists_members_with_files() {
    let nodes = ring_of(&[10, 200]).await;
    nodes[0].store(50).await.unwrap();
    nodes[0].locate(50).await.unwrap();

    let text = client_of(&nodes[1])
        .await
        .show_ring(Request::new(()))
        .await
        .unwrap()
        .into_inner()
        .text;

    let entries: Vec<&str> = text.split(" ---> ").collect();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].starts_with("10 ("));
    assert!(entries[0].ends_with("files: [] - local files: [50]"));
    assert!(entries[1].starts_with("200 ("));
    assert!(entries[1].contains("files: [50]"));
}
