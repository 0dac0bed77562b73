use chordring::dht::peer::{file_query, normalize_addr, try_connect_node};
use chordring::error::{Error, Result};
use chordring::rpc::dht::{KeyQuery, Peer};
use chordring::NodeRef;
use clap::{Parser, Subcommand};
use tonic::Request;

#[derive(Debug, Parser)]
#[command(name = "client", about = "Talk to a chord ring node")]
struct Cli {
    /// Node to send the command to.
    #[arg(long, env = "CHORD_NODE", default_value = "127.0.0.1:5000")]
    node: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ask the node to link a new member into the ring.
    Join { id: u64, addr: String },
    /// Make the node drop its ring pointers.
    Leave,
    /// Place a file id on the ring.
    Store { file_id: u64 },
    /// Locate a file id.
    Find { file_id: u64 },
    /// Resolve the node owning a key.
    Lookup { key: u64 },
    /// Print ring membership.
    Ring,
    /// Print the node's finger table.
    Fingers,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut dht = try_connect_node(&cli.node).await?;

    match cli.command {
        Command::Join { id, addr } => {
            let addr = normalize_addr(&addr);
            dht.join(Request::new(Peer::of(NodeRef::new(id, addr))))
                .await?;
            println!("Node #{} joined", id);
        }
        Command::Leave => {
            dht.leave(Request::new(())).await?;
            println!("Node left the ring");
        }
        Command::Store { file_id } => {
            let result = dht
                .store_file(Request::new(file_query(file_id, false)))
                .await?
                .into_inner();
            println!("{}", result.message);
        }
        Command::Find { file_id } => {
            let result = dht
                .find_file(Request::new(file_query(file_id, false)))
                .await?
                .into_inner();
            match result.into_owner(file_id) {
                Ok(owner) => {
                    println!("File {} found on node {} ({})", file_id, owner.id, owner.addr)
                }
                Err(Error::NotFound(_)) => println!("File {} not found", file_id),
                Err(err) => return Err(err),
            }
        }
        Command::Lookup { key } => {
            let owner = dht
                .lookup(Request::new(KeyQuery { key: Some(key) }))
                .await?
                .into_inner()
                .node
                .ok_or_else(|| Error::Internal("lookup returned no node".into()))?;
            println!("Key {} belongs to node {} ({})", key, owner.id, owner.addr);
        }
        Command::Ring => {
            let ring = dht.show_ring(Request::new(())).await?.into_inner();
            println!("{}", ring.text);
        }
        Command::Fingers => {
            let table = dht.show_finger_table(Request::new(())).await?.into_inner();
            println!("{}", table.text);
        }
    }

    Ok(())
}
