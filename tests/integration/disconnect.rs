use crate::*;

async fn stop(node: NodeRuntime) -> Result<()> {
    node.handle.disconnect().await?;
    tokio::time::timeout(SETTLE, node.task)
        .await
        .context("node did not stop")?
        .context("node task panicked")?;
    Ok(())
}

#[tokio::test]
async fn test_middle_node_leaves() -> Result<()> {
    let mut nodes = ring_of(3).await?;
    let b = nodes.remove(1);
    let b_addr = b.handle.address().clone();
    let b_id = b.handle.id().await?.to_string();
    for node in nodes.iter_mut() {
        drain(&mut node.events).await;
    }

    stop(b).await?;
    let snaps = wait_for_ring(&[&nodes[0], &nodes[1]]).await?;

    for snap in &snaps {
        assert!(!snap.awaited.contains(&b_addr));
        assert_ne!(snap.left, Neighbor::Peer(b_addr.clone()));
        assert_ne!(snap.right, Neighbor::Peer(b_addr.clone()));
    }
    for node in nodes.iter_mut() {
        let events = drain(&mut node.events).await;
        assert!(
            events.contains(&ChatEvent::Left { id: b_id.clone() }),
            "no departure notice: {events:?}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_announced_departure_is_not_a_link_failure() -> Result<()> {
    let mut nodes = ring_of(3).await?;
    let leaving = nodes.remove(1);
    for node in nodes.iter_mut() {
        drain(&mut node.events).await;
    }

    stop(leaving).await?;
    wait_for_ring(&[&nodes[0], &nodes[1]]).await?;

    for node in nodes.iter_mut() {
        let events = drain(&mut node.events).await;
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, ChatEvent::LinkClosed { .. })),
            "departure reported as a failure: {events:?}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_last_peer_leaving_makes_node_solo() -> Result<()> {
    let mut nodes = ring_of(2).await?;
    let b = nodes.pop().context("ring_of(2)")?;
    stop(b).await?;

    let snap = wait_for_snapshot(&nodes[0], SETTLE, |s| s.state == MembershipState::Solo).await?;
    assert_eq!(snap.left, Neighbor::Own);
    assert_eq!(snap.right, Neighbor::Own);
    assert!(snap.awaited.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_ring_keeps_chatting_after_departure() -> Result<()> {
    let mut nodes = ring_of(4).await?;
    let leaving = nodes.remove(2);
    stop(leaving).await?;

    let refs: Vec<&NodeRuntime> = nodes.iter().collect();
    wait_for_ring(&refs).await?;
    for node in nodes.iter_mut() {
        drain(&mut node.events).await;
    }

    nodes[0].handle.send_chat("still here").await?;
    let sender = nodes[0].handle.id().await?.to_string();
    for node in nodes.iter_mut().skip(1) {
        let got = messages(&drain(&mut node.events).await);
        assert_eq!(got, vec![(sender.clone(), "still here".to_string())]);
    }
    Ok(())
}

#[tokio::test]
async fn test_solo_node_disconnects_cleanly() -> Result<()> {
    let node = spawn_node(None).await?;
    stop(node).await
}
