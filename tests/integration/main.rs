//! RingChat integration test harness.
//!
//! Every test runs real nodes on loopback TCP inside the test process:
//!
//!   cargo test --test integration
//!
//! Nodes listen on port 0, so tests never collide with each other. Timeouts
//! are shortened so failure paths finish quickly.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;

use ringchat_core::config::TimeoutConfig;
use ringchat_core::PeerAddress;
use ringchat_node::{ChatEvent, MembershipState, Neighbor, NodeRuntime, Snapshot};

mod disconnect;
mod relay;
mod ring;
mod timeout;

// ── Harness ───────────────────────────────────────────────────────────────────

/// How long a ring gets to settle before a test gives up.
pub const SETTLE: Duration = Duration::from_secs(5);

/// Quiet period after which no more events are expected.
pub const QUIET: Duration = Duration::from_millis(400);

pub fn short_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        join_ms: 3_000,
        control_ms: 1_000,
        relay_ms: 300,
    }
}

pub async fn loopback_listener() -> Result<(TcpListener, PeerAddress)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind loopback listener")?;
    let port = listener.local_addr()?.port();
    Ok((listener, PeerAddress::new("127.0.0.1", port)))
}

/// Start a node on a fresh loopback port, joining through `entry` if given.
pub async fn spawn_node(entry: Option<&PeerAddress>) -> Result<NodeRuntime> {
    let (listener, address) = loopback_listener().await?;
    ringchat_node::start(listener, address, entry.cloned(), short_timeouts())
        .await
        .context("node failed to start")
}

pub async fn snapshot(node: &NodeRuntime) -> Snapshot {
    node.handle.snapshot().await.expect("node stopped")
}

/// Poll a node until `done` holds for its snapshot.
pub async fn wait_for_snapshot<F>(node: &NodeRuntime, within: Duration, done: F) -> Result<Snapshot>
where
    F: Fn(&Snapshot) -> bool,
{
    let deadline = Instant::now() + within;
    loop {
        let snap = snapshot(node).await;
        if done(&snap) {
            return Ok(snap);
        }
        if Instant::now() >= deadline {
            bail!("condition not met within {within:?}; last snapshot: {snap:?}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn peer(neighbor: &Neighbor) -> Option<&PeerAddress> {
    match neighbor {
        Neighbor::Peer(addr) => Some(addr),
        Neighbor::Own | Neighbor::Closed => None,
    }
}

/// A settled ring: everyone joined with nothing in flight, every right
/// neighbor names us as its left, and walking right visits every node once.
fn ring_settled(snaps: &[Snapshot]) -> bool {
    let find = |addr: &PeerAddress| snaps.iter().find(|s| &s.address == addr);

    for snap in snaps {
        if snap.state != MembershipState::Joined
            || !snap.awaited.is_empty()
            || snap.pending_candidate.is_some()
        {
            return false;
        }
        let Some(right) = peer(&snap.right).and_then(|a| find(a)) else {
            return false;
        };
        if peer(&right.left) != Some(&snap.address) {
            return false;
        }
    }

    let mut seen = vec![snaps[0].address.clone()];
    let mut at = &snaps[0];
    for _ in 1..snaps.len() {
        let Some(next) = peer(&at.right).and_then(|a| find(a)) else {
            return false;
        };
        if seen.contains(&next.address) {
            return false;
        }
        seen.push(next.address.clone());
        at = next;
    }
    peer(&at.right) == Some(&snaps[0].address)
}

/// Wait until `nodes` form one consistent ring.
pub async fn wait_for_ring(nodes: &[&NodeRuntime]) -> Result<Vec<Snapshot>> {
    let deadline = Instant::now() + SETTLE;
    loop {
        let mut snaps = Vec::with_capacity(nodes.len());
        for node in nodes {
            snaps.push(snapshot(node).await);
        }
        if ring_settled(&snaps) {
            return Ok(snaps);
        }
        if Instant::now() >= deadline {
            bail!("ring did not settle within {SETTLE:?}: {snaps:#?}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Build a ring of `n` nodes, each joining through the first.
pub async fn ring_of(n: usize) -> Result<Vec<NodeRuntime>> {
    let mut nodes = vec![spawn_node(None).await?];
    let entry = nodes[0].handle.address().clone();
    for _ in 1..n {
        nodes.push(spawn_node(Some(&entry)).await?);
        let refs: Vec<&NodeRuntime> = nodes.iter().collect();
        wait_for_ring(&refs).await?;
    }
    Ok(nodes)
}

/// Collect events until none arrive for `QUIET`.
pub async fn drain(events: &mut mpsc::UnboundedReceiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut out = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(QUIET, events.recv()).await {
        out.push(event);
    }
    out
}

/// Chat lines among `events`, as (sender, text).
pub fn messages(events: &[ChatEvent]) -> Vec<(String, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::Message { sender, text } => Some((sender.clone(), text.clone())),
            _ => None,
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_new_node_is_solo() -> Result<()> {
    let node = spawn_node(None).await?;
    let snap = snapshot(&node).await;
    assert_eq!(snap.state, MembershipState::Solo);
    assert_eq!(snap.left, Neighbor::Own);
    assert_eq!(snap.right, Neighbor::Own);
    assert!(snap.id.is_some());
    Ok(())
}
