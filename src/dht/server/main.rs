use std::sync::Arc;

use chordring::{
    config::NodeConfig,
    dht::{peer, service::DhtNodeService},
    error::{Error, Result},
    rpc::dht::{dht_node_server::DhtNodeServer, Peer},
};
use clap::Parser;
use log::info;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::parse();

    env_logger::init();

    let node = config.identity()?;
    let space = config.space()?;

    info!("Initializing node #{} on {}", node.id, node.addr);
    let service = Arc::new(DhtNodeService::new(node.clone(), space));
    let listener = TcpListener::bind(config.listen_addr()?).await?;

    let server = tokio::spawn(
        Server::builder()
            .add_service(DhtNodeServer::from_arc(service.clone()))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );

    if let Some(bootstrap) = &config.join {
        let mut client = peer::try_connect_node(bootstrap).await?;
        client.join(Request::new(Peer::of(node.clone()))).await?;
        info!("Joined the ring through {}", bootstrap);
    }

    server
        .await
        .map_err(|e| Error::Internal(format!("server task failed: {}", e)))??;

    Ok(())
}
