use spacetimedb::{ReducerContext, Table, Timestamp};

use crate::config;
use crate::player as PlayerTableTrait;
use crate::sync::{self, map_ping_notice as MapPingTableTrait};

#[spacetimedb::table(name = chat_message, public)]
#[derive(Clone, Debug)]
pub struct ChatMessage {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub sender_sid: u32,
    pub username: String,
    pub text: String,
    pub sent_at: Timestamp,
}

fn ms_since(earlier: Timestamp, now: Timestamp) -> i64 {
    (now.to_micros_since_unix_epoch() - earlier.to_micros_since_unix_epoch()) / 1000
}

/// Normalizes an outgoing chat line: trims, strips control characters, and
/// truncates to the wire limit. Returns None for lines with no content left.
pub fn sanitize_chat(text: &str) -> Option<String> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(config::MAX_CHAT_LENGTH)
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[spacetimedb::reducer]
pub fn send_chat_message(ctx: &ReducerContext, text: String) -> Result<(), String> {
    let mut player = ctx
        .db
        .player()
        .identity()
        .find(ctx.sender)
        .ok_or("Player not found")?;
    if !player.alive {
        return Err("Dead players cannot chat".to_string());
    }
    if ms_since(player.last_chat_at, ctx.timestamp) < config::CHAT_COOLDOWN_MS {
        return Err("Chatting too fast".to_string());
    }
    let text = sanitize_chat(&text).ok_or("Empty message")?;

    ctx.db.chat_message().insert(ChatMessage {
        id: 0, // auto_inc
        sender_sid: player.sid,
        username: player.username.clone(),
        text,
        sent_at: ctx.timestamp,
    });
    player.last_chat_at = ctx.timestamp;
    ctx.db.player().identity().update(player);
    Ok(())
}

#[spacetimedb::reducer]
pub fn send_map_ping(ctx: &ReducerContext) -> Result<(), String> {
    let mut player = ctx
        .db
        .player()
        .identity()
        .find(ctx.sender)
        .ok_or("Player not found")?;
    if !player.alive {
        return Err("Dead players cannot ping".to_string());
    }
    if ms_since(player.last_ping_at, ctx.timestamp) < config::MAP_PING_COOLDOWN_MS {
        return Err("Pinging too fast".to_string());
    }
    ctx.db.map_ping_notice().insert(sync::MapPingNotice {
        id: 0, // auto_inc
        x: player.pos_x,
        y: player.pos_y,
        created_at: ctx.timestamp,
    });
    player.last_ping_at = ctx.timestamp;
    ctx.db.player().identity().update(player);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_and_strips_controls() {
        assert_eq!(sanitize_chat("  hello\u{7}  "), Some("hello".to_string()));
        assert_eq!(sanitize_chat("\n\t "), None);
        assert_eq!(sanitize_chat(""), None);
    }

    #[test]
    fn sanitize_truncates_to_limit() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_chat(&long).unwrap().len(), config::MAX_CHAT_LENGTH);
    }
}
