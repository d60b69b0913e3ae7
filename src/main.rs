//! Devnet node serving the magic-spend paymaster over JSON-RPC.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use ethers::types::Address;
use jsonrpsee::server::{ServerBuilder, ServerHandle};
use tokio::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod attributes;
mod authorization;
mod devnet;
mod entry_point;
mod error;
mod fulfiller;
mod host;
mod journal;
mod ledger;
mod paymaster;
mod precheck;
mod rpc;
mod transaction;
mod types;

use crate::devnet::Devnet;
use crate::fulfiller::Fulfiller;
use crate::rpc::{PaymasterRpcImpl, PaymasterRpcServer};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(short, long, default_value = "127.0.0.1:8545")]
    rpc_server_addr: String,

    /// Key the node's fulfiller signs authorizations with
    #[clap(short, long)]
    private_key: String,

    #[clap(short, long)]
    chain_id: u64,

    #[clap(short, long)]
    entry_point: Address,

    #[clap(long)]
    paymaster: Address,

    /// Receives the gas fees collected from each bundle
    #[clap(short, long)]
    beneficiary: Address,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command line arguments
    let args = Args::parse();

    let devnet = Devnet::new(args.chain_id, args.entry_point, args.paymaster, args.beneficiary)?;
    let fulfiller = Fulfiller::new(&args.private_key, args.chain_id, args.paymaster)?;

    // Create the JSON-RPC server
    let server_addr: SocketAddr = args.rpc_server_addr.parse()?;
    let paymaster_rpc = PaymasterRpcImpl::new(Arc::new(Mutex::new(devnet)), Arc::new(fulfiller));

    info!("Starting magic spend paymaster RPC server on {}", server_addr);

    let server_handle = start_server(server_addr, paymaster_rpc).await?;

    // Keep the server running until Ctrl+C is pressed
    tokio::signal::ctrl_c().await?;
    server_handle.stop()?;
    info!("Server stopped");

    Ok(())
}

async fn start_server(
    server_addr: SocketAddr,
    paymaster_rpc: PaymasterRpcImpl,
) -> anyhow::Result<ServerHandle> {
    let server = ServerBuilder::default()
        .build(server_addr)
        .await?;

    let server_handle = server.start(paymaster_rpc.into_rpc());

    Ok(server_handle)
}
