//! Terminal rendering of chat events.

use ringchat_node::{ChatEvent, Direction};

/// Deterministic color for a numeric sender id. Non-numeric ids get none.
pub fn id_color(id: &str) -> Option<(u8, u8, u8)> {
    let n: u64 = id.trim().parse().ok()?;
    let channel = |k: u64| (n.wrapping_mul(k) % 256) as u8;
    Some((channel(123), channel(321), channel(213)))
}

fn paint(id: &str, color: bool) -> String {
    match id_color(id).filter(|_| color) {
        Some((r, g, b)) => format!("\x1b[38;2;{r};{g};{b}m{id}\x1b[0m"),
        None => id.to_string(),
    }
}

pub fn event(event: &ChatEvent, color: bool) -> String {
    match event {
        ChatEvent::Message { sender, text } => format!("{}: {text}", paint(sender, color)),
        ChatEvent::Joined { id } => format!("[ ! ] {id} joined the chat!"),
        ChatEvent::Left { id } => format!("[ ! ] {id} left the chat!"),
        ChatEvent::IdAssigned(id) => format!("Received ID: {id}"),
        ChatEvent::LinkClosed {
            direction,
            peer,
            reason,
        } => {
            let side = match direction {
                Direction::Left => "left",
                Direction::Right => "right",
            };
            format!("[ ! ] lost {side} neighbor {peer}: {reason}")
        }
    }
}
