use crate::*;

async fn quiet_ring(n: usize) -> Result<Vec<NodeRuntime>> {
    let mut nodes = ring_of(n).await?;
    for node in nodes.iter_mut() {
        drain(&mut node.events).await;
    }
    Ok(nodes)
}

#[tokio::test]
async fn test_chat_reaches_everyone_once() -> Result<()> {
    let mut nodes = quiet_ring(3).await?;
    let sender = nodes[0].handle.id().await?.to_string();

    nodes[0].handle.send_chat("hello ring").await?;

    let expected = vec![(sender, "hello ring".to_string())];
    for node in nodes.iter_mut().skip(1) {
        assert_eq!(messages(&drain(&mut node.events).await), expected);
    }
    assert!(
        messages(&drain(&mut nodes[0].events).await).is_empty(),
        "sender saw its own message"
    );
    Ok(())
}

#[tokio::test]
async fn test_two_node_ring_delivers_once() -> Result<()> {
    let mut nodes = quiet_ring(2).await?;

    nodes[1].handle.send_chat("ping").await?;

    let sender = nodes[1].handle.id().await?.to_string();
    assert_eq!(
        messages(&drain(&mut nodes[0].events).await),
        vec![(sender, "ping".to_string())]
    );
    assert!(messages(&drain(&mut nodes[1].events).await).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_messages_from_every_member_arrive_in_order() -> Result<()> {
    let mut nodes = quiet_ring(4).await?;

    for node in &nodes {
        node.handle.send_chat(format!("one from {}", node.handle.address())).await?;
        node.handle.send_chat(format!("two from {}", node.handle.address())).await?;
    }

    for (i, node) in nodes.iter_mut().enumerate() {
        let got = messages(&drain(&mut node.events).await);
        assert_eq!(got.len(), 6, "node {i} got {got:?}");

        let mut per_sender: Vec<(String, Vec<String>)> = Vec::new();
        for (sender, text) in got {
            match per_sender.iter_mut().find(|(s, _)| *s == sender) {
                Some((_, texts)) => texts.push(text),
                None => per_sender.push((sender, vec![text])),
            }
        }
        assert_eq!(per_sender.len(), 3);
        for (_, texts) in per_sender {
            assert!(texts[0].starts_with("one from"));
            assert!(texts[1].starts_with("two from"));
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_chat_text_is_trimmed() -> Result<()> {
    let mut nodes = quiet_ring(2).await?;
    nodes[0].handle.send_chat("   padded   ").await?;
    let got = messages(&drain(&mut nodes[1].events).await);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].1, "padded");
    Ok(())
}
