use crate::*;

use ringchat_core::RingId;

#[tokio::test]
async fn test_second_node_links_both_ways() -> Result<()> {
    let nodes = ring_of(2).await?;
    let (a, b) = (&nodes[0], &nodes[1]);

    for (node, other) in [(a, b), (b, a)] {
        let snap = snapshot(node).await;
        assert_eq!(snap.left, Neighbor::Peer(other.handle.address().clone()));
        assert_eq!(snap.right, Neighbor::Peer(other.handle.address().clone()));
    }
    Ok(())
}

#[tokio::test]
async fn test_three_node_join() -> Result<()> {
    let nodes = ring_of(3).await?;
    let snaps = wait_for_ring(&[&nodes[0], &nodes[1], &nodes[2]]).await?;

    for snap in &snaps {
        let left = match &snap.left {
            Neighbor::Peer(addr) => addr,
            other => panic!("{} has left {other:?}", snap.address),
        };
        let right = match &snap.right {
            Neighbor::Peer(addr) => addr,
            other => panic!("{} has right {other:?}", snap.address),
        };
        assert_ne!(left, right, "3-ring neighbors must differ");
        assert_ne!(left, &snap.address);
        assert_ne!(right, &snap.address);
    }
    Ok(())
}

#[tokio::test]
async fn test_joiner_gets_id_of_its_address() -> Result<()> {
    let nodes = ring_of(3).await?;
    for node in &nodes {
        let id = node.handle.id().await?;
        assert_eq!(id, RingId::for_address(node.handle.address()));
    }
    Ok(())
}

#[tokio::test]
async fn test_join_through_any_member() -> Result<()> {
    let mut nodes = ring_of(3).await?;
    let via = nodes[2].handle.address().clone();
    nodes.push(spawn_node(Some(&via)).await?);

    let refs: Vec<&NodeRuntime> = nodes.iter().collect();
    wait_for_ring(&refs).await?;
    Ok(())
}

#[tokio::test]
async fn test_join_through_second_node() -> Result<()> {
    let a = spawn_node(None).await?;
    let b = spawn_node(Some(a.handle.address())).await?;
    wait_for_ring(&[&a, &b]).await?;

    // B's right is A, which answers this splice with the same frame it
    // sent when B itself joined.
    let c = spawn_node(Some(b.handle.address())).await?;
    let snaps = wait_for_ring(&[&a, &b, &c]).await?;
    assert_eq!(snaps[2].left, Neighbor::Peer(b.handle.address().clone()));
    assert_eq!(snaps[2].right, Neighbor::Peer(a.handle.address().clone()));

    let d = spawn_node(Some(b.handle.address())).await?;
    wait_for_ring(&[&a, &b, &c, &d]).await?;
    Ok(())
}

#[tokio::test]
async fn test_arrival_is_announced() -> Result<()> {
    let mut nodes = ring_of(2).await?;
    drain(&mut nodes[0].events).await;

    let entry = nodes[0].handle.address().clone();
    let c = spawn_node(Some(&entry)).await?;
    let c_id = c.handle.id().await?.to_string();

    let events = drain(&mut nodes[0].events).await;
    assert!(
        events.contains(&ChatEvent::Joined { id: c_id.clone() }),
        "no arrival notice: {events:?}"
    );
    let events = drain(&mut nodes[1].events).await;
    assert!(events.contains(&ChatEvent::Joined { id: c_id }));
    Ok(())
}
