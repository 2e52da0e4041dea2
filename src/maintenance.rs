//! C8: the three independent periodic background tasks of §4.8, each
//! guarded by a shared "stop" signal so a node can shut down cleanly.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config;
use crate::domain::entities::NodeId;
use crate::node::Node;
use crate::transport::Transport;

/// Spawns bucket refresh, firewall check, and RPC-state GC as independent
/// tasks sharing one `stop` receiver.
pub(crate) fn spawn_all(node: Arc<Node>, stop: watch::Receiver<bool>, transport: Arc<Transport>) {
    tokio::spawn(run_bucket_refresh(node.clone(), stop.clone()));
    tokio::spawn(run_firewall_check(node.clone(), stop.clone()));
    tokio::spawn(run_rpc_gc(node, stop.clone()));
    tokio::spawn(transport.run_cleanup_loop(stop));
}

/// One round touches every bucket's id-space slice via `FIND_NODE(2^b)`.
/// The first round runs with only a `SLEEP_WAIT*20` pause between buckets
/// (fast warm-up); subsequent rounds space out by `BUCKET_REFRESH`
/// (`* 20` while firewalled) between full rounds.
async fn run_bucket_refresh(node: Arc<Node>, mut stop: watch::Receiver<bool>) {
    let mut warming_up = true;
    loop {
        for b in 0..config::ID_BITS {
            let target = NodeId::with_bit_set(b);
            node.lookup().find_node(target, None).await;
            debug!(bucket = b, "refreshed bucket");

            if warming_up {
                if wait_or_stop(&mut stop, node.config.sleep_wait * 20).await {
                    return;
                }
            }
        }
        warming_up = false;
        info!("completed a full bucket-refresh round");

        let factor: u32 = if node.is_firewalled() { 20 } else { 1 };
        if wait_or_stop(&mut stop, config::BUCKET_REFRESH * factor).await {
            return;
        }
    }
}

/// While marked firewalled, periodically `FW_PING`s the bootstrap peer;
/// `node::firewall`'s receive loop clears the flag on a matching `FW_PONG`.
async fn run_firewall_check(node: Arc<Node>, mut stop: watch::Receiver<bool>) {
    if wait_or_stop(&mut stop, node.config.sleep_wait).await {
        return;
    }
    loop {
        if !node.is_firewalled() {
            if wait_or_stop(&mut stop, config::FIREWALL_CHECK).await {
                return;
            }
            continue;
        }
        if let Some(peer) = node.bootstrap_peer().await {
            node.send_fw_ping(&peer).await;
            debug!("executed firewall check");
        }
        if wait_or_stop(&mut stop, config::FIREWALL_CHECK).await {
            return;
        }
    }
}

/// Sweeps `RpcTable` every `RPC_TIMEOUT`, dropping entries that outlived it.
async fn run_rpc_gc(node: Arc<Node>, mut stop: watch::Receiver<bool>) {
    loop {
        if wait_or_stop(&mut stop, config::RPC_TIMEOUT).await {
            return;
        }
        let reaped = node.rpc_table().gc(config::RPC_TIMEOUT).await;
        if reaped > 0 {
            debug!(reaped, "garbage-collected stale rpc states");
        }
    }
}

/// Waits out `duration` unless `stop` flips to `true` first; returns
/// whether the caller should stop.
async fn wait_or_stop(stop: &mut watch::Receiver<bool>, duration: std::time::Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = stop.changed() => match changed {
            Ok(()) => *stop.borrow(),
            Err(_) => true,
        },
    }
}
