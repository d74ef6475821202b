use crate::*;

use ringchat_core::wire::{self, Command};
use ringchat_core::ControlMessage;
use ringchat_node::ConnectionError;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

async fn expect_join_error(entry: PeerAddress) -> ConnectionError {
    let (listener, address) = loopback_listener().await.unwrap();
    let timeouts = TimeoutConfig {
        join_ms: 300,
        ..short_timeouts()
    };
    match ringchat_node::start(listener, address, Some(entry), timeouts).await {
        Ok(_) => panic!("join unexpectedly succeeded"),
        Err(e) => e,
    }
}

/// A fake neighbor greets its way in, sends half a frame and goes quiet.
#[tokio::test]
async fn test_stalled_neighbor_is_closed() -> Result<()> {
    let mut node = spawn_node(None).await?;
    let target = node.handle.address().clone();
    let (_fake_listener, fake_addr) = loopback_listener().await?;

    let mut stream = TcpStream::connect((target.host.as_str(), target.port)).await?;
    let greeting = wire::encode(
        Command::NewConnection,
        "",
        &ControlMessage::NewMember(fake_addr.clone()).to_string(),
    )?;
    stream.write_all(&greeting).await?;
    wait_for_snapshot(&node, SETTLE, |s| s.right == Neighbor::Peer(fake_addr.clone())).await?;

    // Header promises a 10-byte body that never comes.
    stream.write_all(&[u8::from(Command::Print), 10, 0, 0, 0]).await?;
    wait_for_snapshot(&node, SETTLE, |s| s.right == Neighbor::Closed).await?;

    node.handle.send_chat("anyone there?").await?;

    let events = drain(&mut node.events).await;
    assert!(
        events.iter().any(|e| matches!(
            e,
            ChatEvent::LinkClosed { peer, .. } if *peer == fake_addr
        )),
        "no link-closed notice: {events:?}"
    );
    Ok(())
}

/// Greet `target` as a new member named `name` and return the open stream.
async fn greet_as_joiner(target: &PeerAddress, name: &PeerAddress) -> Result<TcpStream> {
    let mut stream = TcpStream::connect((target.host.as_str(), target.port)).await?;
    let greeting = wire::encode(
        Command::NewConnection,
        "",
        &ControlMessage::NewMember(name.clone()).to_string(),
    )?;
    stream.write_all(&greeting).await?;
    Ok(stream)
}

fn inserting(snap: &Snapshot) -> bool {
    matches!(snap.state, MembershipState::Inserting { .. })
}

#[tokio::test]
async fn test_vanished_joiner_releases_solo_node() -> Result<()> {
    let a = spawn_node(None).await?;
    let (_fake_listener, fake_addr) = loopback_listener().await?;

    let stream = greet_as_joiner(a.handle.address(), &fake_addr).await?;
    wait_for_snapshot(&a, SETTLE, inserting).await?;
    drop(stream);

    let snap = wait_for_snapshot(&a, SETTLE, |s| s.state == MembershipState::Solo).await?;
    assert!(snap.awaited.is_empty());
    assert_eq!(snap.left, Neighbor::Own);
    assert_eq!(snap.right, Neighbor::Own);

    let b = spawn_node(Some(a.handle.address())).await?;
    wait_for_ring(&[&a, &b]).await?;
    Ok(())
}

#[tokio::test]
async fn test_silent_joiner_does_not_freeze_splicing_member() -> Result<()> {
    let nodes = ring_of(2).await?;
    let (_fake_listener, fake_addr) = loopback_listener().await?;

    // Relayed through nodes[0] to its right neighbor, which prepares the
    // splice and waits for a dial that never comes.
    let _stream = greet_as_joiner(nodes[0].handle.address(), &fake_addr).await?;
    wait_for_snapshot(&nodes[1], SETTLE, inserting).await?;

    let snap = wait_for_snapshot(&nodes[1], SETTLE, |s| !inserting(s)).await?;
    assert_eq!(snap.state, MembershipState::Joined);
    assert!(!snap.awaited.contains(&fake_addr));
    let snap = snapshot(&nodes[0]).await;
    assert!(snap.pending_candidate.is_none());
    Ok(())
}

#[tokio::test]
async fn test_silent_entry_point_times_out() -> Result<()> {
    // Bound but never accepting: the connect succeeds, no reply ever comes.
    let (_silent, entry) = loopback_listener().await?;
    let err = expect_join_error(entry).await;
    assert!(
        matches!(err, ConnectionError::Timeout { .. }),
        "expected timeout, got {err}"
    );
    Ok(())
}

#[tokio::test]
async fn test_unreachable_entry_point_fails_to_dial() -> Result<()> {
    let entry = {
        let (listener, entry) = loopback_listener().await?;
        drop(listener);
        entry
    };
    let err = expect_join_error(entry).await;
    assert!(
        matches!(err, ConnectionError::Dial { .. }),
        "expected dial failure, got {err}"
    );
    Ok(())
}

#[tokio::test]
async fn test_unexpected_completion_is_rejected() -> Result<()> {
    let node = spawn_node(None).await?;
    let target = node.handle.address().clone();
    let (_fake_listener, fake_addr) = loopback_listener().await?;

    let mut stream = TcpStream::connect((target.host.as_str(), target.port)).await?;
    let greeting = wire::encode(
        Command::NewConnection,
        "1",
        &ControlMessage::SpliceComplete(fake_addr).to_string(),
    )?;
    stream.write_all(&greeting).await?;

    tokio::time::sleep(QUIET).await;
    let snap = snapshot(&node).await;
    assert_eq!(snap.state, MembershipState::Solo);
    assert_eq!(snap.left, Neighbor::Own);
    assert_eq!(snap.right, Neighbor::Own);
    Ok(())
}
