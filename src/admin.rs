use spacetimedb::{Identity, ReducerContext, Table, Timestamp};

use crate::config;
use crate::models::ResourceType;
use crate::utils::clamp;
use crate::player as PlayerTableTrait;
use crate::Player;

// Moderation tooling. Admin status is a flag on the player row; bans are
// keyed by identity and checked on connect.

#[spacetimedb::table(name = ban_entry)]
#[derive(Clone, Debug)]
pub struct BanEntry {
    #[primary_key]
    pub identity: Identity,
    pub reason: String,
    pub banned_at: Timestamp,
    /// None is a permanent ban. Expired entries are pruned lazily on the
    /// next connect attempt.
    pub expires_at: Option<Timestamp>,
}

pub fn is_banned(ctx: &ReducerContext, identity: Identity) -> Option<String> {
    let entry = ctx.db.ban_entry().identity().find(identity)?;
    if let Some(expires_at) = entry.expires_at {
        if expires_at.to_micros_since_unix_epoch() <= ctx.timestamp.to_micros_since_unix_epoch() {
            ctx.db.ban_entry().identity().delete(identity);
            return None;
        }
    }
    Some(entry.reason)
}

fn require_admin(ctx: &ReducerContext) -> Result<Player, String> {
    let player = ctx
        .db
        .player()
        .identity()
        .find(ctx.sender)
        .ok_or("Player not found")?;
    if !player.is_admin {
        log::warn!("Rejected admin command from {}", player.username);
        return Err("Not an admin".to_string());
    }
    Ok(player)
}

#[spacetimedb::reducer]
pub fn admin_set_health(ctx: &ReducerContext, target_sid: u32, health: f32) -> Result<(), String> {
    require_admin(ctx)?;
    let mut target = ctx
        .db
        .player()
        .sid()
        .find(target_sid)
        .ok_or("Target not found")?;
    target.health = clamp(health, 0.0, target.max_health);
    if target.health <= 0.0 {
        crate::combat::kill_player(ctx, target, None);
    } else {
        ctx.db.player().identity().update(target);
    }
    Ok(())
}

#[spacetimedb::reducer]
pub fn admin_give_resource(
    ctx: &ReducerContext,
    target_sid: u32,
    resource: ResourceType,
    amount: i64,
) -> Result<(), String> {
    require_admin(ctx)?;
    let target = ctx
        .db
        .player()
        .sid()
        .find(target_sid)
        .ok_or("Target not found")?;
    crate::player_state::add_resource(ctx, target, resource, amount);
    Ok(())
}

#[spacetimedb::reducer]
pub fn admin_teleport(ctx: &ReducerContext, target_sid: u32, x: f32, y: f32) -> Result<(), String> {
    require_admin(ctx)?;
    let mut target = ctx
        .db
        .player()
        .sid()
        .find(target_sid)
        .ok_or("Target not found")?;
    target.pos_x = clamp(x, config::PLAYER_SCALE, config::MAP_SIZE - config::PLAYER_SCALE);
    target.pos_y = clamp(y, config::PLAYER_SCALE, config::MAP_SIZE - config::PLAYER_SCALE);
    target.vel_x = 0.0;
    target.vel_y = 0.0;
    ctx.db.player().identity().update(target);
    Ok(())
}

#[spacetimedb::reducer]
pub fn admin_set_invincible(
    ctx: &ReducerContext,
    target_sid: u32,
    invincible: bool,
) -> Result<(), String> {
    require_admin(ctx)?;
    let mut target = ctx
        .db
        .player()
        .sid()
        .find(target_sid)
        .ok_or("Target not found")?;
    target.invincible = invincible;
    ctx.db.player().identity().update(target);
    Ok(())
}

#[spacetimedb::reducer]
pub fn admin_kill(ctx: &ReducerContext, target_sid: u32) -> Result<(), String> {
    require_admin(ctx)?;
    let target = ctx
        .db
        .player()
        .sid()
        .find(target_sid)
        .ok_or("Target not found")?;
    if target.alive {
        crate::combat::kill_player(ctx, target, None);
    }
    Ok(())
}

#[spacetimedb::reducer]
pub fn admin_set_disarmed(
    ctx: &ReducerContext,
    target_sid: u32,
    disarmed: bool,
) -> Result<(), String> {
    require_admin(ctx)?;
    let mut target = ctx
        .db
        .player()
        .sid()
        .find(target_sid)
        .ok_or("Target not found")?;
    target.disarmed = disarmed;
    ctx.db.player().identity().update(target);
    Ok(())
}

#[spacetimedb::reducer]
pub fn admin_set_damage_multiplier(
    ctx: &ReducerContext,
    target_sid: u32,
    multiplier: f32,
) -> Result<(), String> {
    require_admin(ctx)?;
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err("Invalid multiplier".to_string());
    }
    let mut target = ctx
        .db
        .player()
        .sid()
        .find(target_sid)
        .ok_or("Target not found")?;
    target.damage_mult = multiplier;
    ctx.db.player().identity().update(target);
    Ok(())
}

#[spacetimedb::reducer]
pub fn admin_set_speed_multiplier(
    ctx: &ReducerContext,
    target_sid: u32,
    multiplier: f32,
) -> Result<(), String> {
    require_admin(ctx)?;
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err("Invalid multiplier".to_string());
    }
    let mut target = ctx
        .db
        .player()
        .sid()
        .find(target_sid)
        .ok_or("Target not found")?;
    target.speed_mult = multiplier;
    ctx.db.player().identity().update(target);
    Ok(())
}

#[spacetimedb::reducer]
pub fn admin_set_knockback_multiplier(
    ctx: &ReducerContext,
    target_sid: u32,
    multiplier: f32,
) -> Result<(), String> {
    require_admin(ctx)?;
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err("Invalid multiplier".to_string());
    }
    let mut target = ctx
        .db
        .player()
        .sid()
        .find(target_sid)
        .ok_or("Target not found")?;
    target.knockback_mult = multiplier;
    ctx.db.player().identity().update(target);
    Ok(())
}

#[spacetimedb::reducer]
pub fn admin_ban(
    ctx: &ReducerContext,
    target_sid: u32,
    reason: String,
    duration_secs: Option<u64>,
) -> Result<(), String> {
    let admin = require_admin(ctx)?;
    let target = ctx
        .db
        .player()
        .sid()
        .find(target_sid)
        .ok_or("Target not found")?;
    if target.is_admin {
        return Err("Cannot ban an admin".to_string());
    }
    let identity = target.identity;
    if ctx.db.ban_entry().identity().find(identity).is_some() {
        return Err("Already banned".to_string());
    }
    if target.alive {
        crate::combat::kill_player(ctx, target, None);
    }
    let expires_at = duration_secs.map(|secs| {
        Timestamp::from_micros_since_unix_epoch(
            ctx.timestamp.to_micros_since_unix_epoch() + secs as i64 * 1_000_000,
        )
    });
    ctx.db
        .ban_entry()
        .try_insert(BanEntry {
            identity,
            reason: reason.clone(),
            banned_at: ctx.timestamp,
            expires_at,
        })
        .map_err(|e| format!("Failed to record ban: {}", e))?;
    log::info!("{} banned player {}: {}", admin.username, target_sid, reason);
    Ok(())
}

#[spacetimedb::reducer]
pub fn admin_unban(ctx: &ReducerContext, identity: Identity) -> Result<(), String> {
    require_admin(ctx)?;
    if ctx.db.ban_entry().identity().find(identity).is_none() {
        return Err("No such ban".to_string());
    }
    ctx.db.ban_entry().identity().delete(identity);
    Ok(())
}
