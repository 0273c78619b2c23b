//! Tidepool demo
//!
//! Spins up several in-process nodes on the in-memory hub, posts a few
//! messages from each, refreshes every node, and prints the aggregated
//! feeds. One node can be marked unreachable to show per-peer failure
//! isolation.

use anyhow::Result;
use clap::Parser;
use tracing::{warn, Level};

use tidepool_core::{FeedConfig, FeedUpdate, MessageKind, PeerIdentity};
use tidepool_runtime::testing::{MemoryHub, PeerBehavior};
use tidepool_runtime::{FeedHandle, FeedRuntime};

#[derive(Debug, Parser)]
#[command(name = "tidepool", about = "Pull-based peer-to-peer feed exchange demo")]
struct Args {
    /// Number of in-process nodes to run
    #[arg(long, default_value_t = 3)]
    nodes: usize,

    /// Messages each node posts before the exchange
    #[arg(long, default_value_t = 2)]
    messages: usize,

    /// Mark the last node unreachable to demonstrate failure isolation
    #[arg(long)]
    drop_last: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

struct Node {
    runtime: FeedRuntime,
    handle: FeedHandle,
    identity: PeerIdentity,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    anyhow::ensure!(args.nodes >= 1, "need at least one node");

    let hub = MemoryHub::new();
    let mut nodes = Vec::with_capacity(args.nodes);
    for index in 0..args.nodes {
        let identity = PeerIdentity::generate_with_nickname(format!("node-{}", index + 1));
        let mut runtime =
            FeedRuntime::new(identity.clone(), FeedConfig::default(), hub.transport());
        let handle = runtime.start()?;
        hub.register(identity.id.clone(), handle.clone()).await;
        nodes.push(Node {
            runtime,
            handle,
            identity,
        });
    }

    // Full mesh: every node knows every other node.
    for node in &nodes {
        for other in &nodes {
            if node.identity.id != other.identity.id {
                node.handle
                    .add_peer(other.identity.id.clone(), &other.identity.nickname)
                    .await?;
            }
        }
    }

    for node in &nodes {
        for index in 0..args.messages {
            node.handle
                .post_message(
                    &format!("{} update #{}", node.identity.nickname, index + 1),
                    MessageKind::Public,
                )
                .await?;
        }
    }

    if args.drop_last {
        if let Some(last) = nodes.last() {
            println!("marking {} unreachable", last.identity.nickname);
            hub.set_behavior(last.identity.id.clone(), PeerBehavior::Unreachable)
                .await;
        }
    }

    for node in &nodes {
        let mut updates = node.handle.subscribe_updates();
        node.handle.refresh().await?;
        loop {
            match updates.recv().await? {
                FeedUpdate::RefreshComplete => break,
                FeedUpdate::PeerError { peer_id, error } => {
                    warn!(peer = %peer_id, %error, "pull failed");
                }
                FeedUpdate::RefreshStarted | FeedUpdate::PeerUpdated { .. } => {}
            }
        }
    }

    for node in &nodes {
        let feed = node.handle.watch_feed();
        let items = feed.borrow();
        println!();
        println!(
            "feed as seen by {} ({} items):",
            node.identity.nickname,
            items.len()
        );
        for item in items.iter() {
            let origin = if item.is_local { "local " } else { "pulled" };
            println!(
                "  {:>13}  {}  {:<8}  {}",
                item.message.timestamp,
                origin,
                item.from_peer.nickname,
                item.message.content
            );
        }
    }

    for node in &mut nodes {
        node.runtime.stop().await;
    }
    Ok(())
}
