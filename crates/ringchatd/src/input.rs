//! Interpreting lines typed at the chat prompt.

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Disconnect,
    /// Show the address a new member should join through.
    NewConnection,
    GetId,
    Status,
    Chat(String),
    Empty,
}

/// Commands start with `!` and are case-insensitive. Everything else is chat.
pub fn parse(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    match line.to_ascii_lowercase().as_str() {
        "!disconnect" => Input::Disconnect,
        "!new_connection" => Input::NewConnection,
        "!get_id" => Input::GetId,
        "!status" => Input::Status,
        _ => Input::Chat(line.to_string()),
    }
}
