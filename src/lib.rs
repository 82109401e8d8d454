use rand::Rng;
use spacetimedb::{Identity, ReducerContext, Table, Timestamp};

pub mod admin;
pub mod alliance;
pub mod chat;
pub mod combat;
pub mod config;
pub mod creature;
pub mod game_tick;
pub mod items;
pub mod models;
pub mod player_movement;
pub mod player_state;
pub mod projectile;
pub mod spatial_grid;
pub mod sync;
pub mod utils;
pub mod world_object;
pub mod world_state;

use items::ItemClass;
use models::EntityKind;

// Installs a schedule row, logging instead of aborting module init when the
// insert fails; the affected system stays off until the next module update.
#[macro_export]
macro_rules! try_insert_schedule {
    ($table:expr, $row:expr, $system_name:expr) => {{
        match $table.try_insert($row) {
            Ok(_) => log::info!("{} schedule installed.", $system_name),
            Err(e) => log::error!("{} schedule failed to install: {}", $system_name, e),
        }
    }};
}

/// One account and its in-world avatar. The row persists across deaths and
/// reconnects; `alive` and `is_online` gate what the simulation does with it.
#[spacetimedb::table(name = player, public)]
#[derive(Clone, Debug)]
pub struct Player {
    #[primary_key]
    pub identity: Identity,
    /// Short id used on the wire and in cross-entity references.
    #[unique]
    #[auto_inc]
    pub sid: u32,
    pub username: String,
    pub pos_x: f32,
    pub pos_y: f32,
    /// Facing angle in radians.
    pub dir: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    /// Input movement heading; None when no key is held.
    pub move_dir: Option<f32>,
    /// Autoswing toggle, resolved each tick by the movement system.
    pub attack_state: bool,
    pub selected_build: Option<u32>,
    pub weapon_id: u32,
    pub owned_weapons: Vec<u32>,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub wood: u32,
    pub food: u32,
    pub stone: u32,
    /// Leaderboard score, also spent as gold.
    pub points: u32,
    pub kills: u32,
    pub xp: f32,
    pub age: u32,
    pub alliance_id: Option<u64>,
    /// Pit trap currently holding this player, if any.
    pub trapped_by: Option<u32>,
    pub swing_cooldown_ms: i64,
    pub speed_mult: f32,
    pub damage_mult: f32,
    pub knockback_mult: f32,
    /// Scales incoming knockback.
    pub weight_mod: f32,
    pub invincible: bool,
    /// Disarmed players cannot swing or fire.
    pub disarmed: bool,
    pub is_admin: bool,
    pub is_online: bool,
    pub joined_at: Timestamp,
    pub last_chat_at: Timestamp,
    pub last_ping_at: Timestamp,
}

// --- Lifecycle reducers ---

#[spacetimedb::reducer(init)]
pub fn init_module(ctx: &ReducerContext) -> Result<(), String> {
    log::info!("Initializing module...");

    world_state::seed_world_state(ctx)?;
    world_object::seed_world_objects(ctx)?;
    creature::ensure_creatures(ctx);

    game_tick::init_game_tick_schedule(ctx)?;
    game_tick::init_notice_cleanup_schedule(ctx)?;

    log::info!("Module initialized.");
    Ok(())
}

#[spacetimedb::reducer(client_connected)]
pub fn identity_connected(ctx: &ReducerContext) -> Result<(), String> {
    if let Some(reason) = admin::is_banned(ctx, ctx.sender) {
        log::warn!("[Connect] Rejected banned identity {:?}: {}", ctx.sender, reason);
        return Err(format!("Banned: {}", reason));
    }
    if let Some(mut player) = ctx.db.player().identity().find(ctx.sender) {
        player.is_online = true;
        ctx.db.player().identity().update(player);
    }
    log::info!("[Connect] Client {:?} connected", ctx.sender);
    Ok(())
}

#[spacetimedb::reducer(client_disconnected)]
pub fn identity_disconnected(ctx: &ReducerContext) {
    let Some(mut player) = ctx.db.player().identity().find(ctx.sender) else {
        return;
    };
    log::info!("[Disconnect] {} left", player.username);

    let sid = player.sid;
    let alliance_id = player.alliance_id;
    player.is_online = false;
    player.alive = false;
    player.move_dir = None;
    player.attack_state = false;
    player.alliance_id = None;
    ctx.db.player().identity().update(player);

    sync::queue_entity_removal(ctx, EntityKind::Player, sid as u64);
    sync::cleanup_connection(ctx, ctx.sender);
    world_object::remove_all_player_objects(ctx, sid);
    alliance::handle_player_departure(ctx, sid, alliance_id);
}

// --- Spawning ---

fn random_spawn_position(ctx: &ReducerContext) -> (f32, f32) {
    let margin = config::PLAYER_SCALE * 2.0;
    for _ in 0..20 {
        let x = ctx.rng().gen_range(margin..config::MAP_SIZE - margin);
        let y = ctx.rng().gen_range(margin..config::MAP_SIZE - margin);
        if !world_object::in_river_band(y) && world_object::check_item_location(ctx, x, y, config::PLAYER_SCALE, false) {
            return (x, y);
        }
    }
    (config::MAP_SIZE / 2.0, config::MAP_SIZE * 0.75)
}

fn validated_username(raw: &str) -> Result<String, String> {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(config::MAX_NAME_LENGTH)
        .collect();
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    Ok(name)
}

#[spacetimedb::reducer]
pub fn join_game(ctx: &ReducerContext, username: String) -> Result<(), String> {
    let username = validated_username(&username)?;
    let (x, y) = random_spawn_position(ctx);

    if let Some(mut player) = ctx.db.player().identity().find(ctx.sender) {
        if player.alive {
            return Err("Already in the game".to_string());
        }
        player.username = username;
        player.is_online = true;
        player_state::reset_for_spawn(&mut player, x, y);
        ctx.db.player().identity().update(player);
        return Ok(());
    }

    // First account in the world gets the admin flag.
    let is_admin = ctx.db.player().iter().next().is_none();
    let mut player = Player {
        identity: ctx.sender,
        sid: 0, // auto_inc
        username,
        pos_x: x,
        pos_y: y,
        dir: 0.0,
        vel_x: 0.0,
        vel_y: 0.0,
        move_dir: None,
        attack_state: false,
        selected_build: None,
        weapon_id: 0,
        owned_weapons: vec![0],
        health: config::PLAYER_BASE_HEALTH,
        max_health: config::PLAYER_BASE_HEALTH,
        alive: true,
        wood: config::STARTING_RESOURCES,
        food: config::STARTING_RESOURCES,
        stone: config::STARTING_RESOURCES,
        points: 0,
        kills: 0,
        xp: 0.0,
        age: 0,
        alliance_id: None,
        trapped_by: None,
        swing_cooldown_ms: 0,
        speed_mult: 1.0,
        damage_mult: 1.0,
        knockback_mult: 1.0,
        weight_mod: 1.0,
        invincible: false,
        disarmed: false,
        is_admin,
        is_online: true,
        joined_at: ctx.timestamp,
        last_chat_at: Timestamp::from_micros_since_unix_epoch(0),
        last_ping_at: Timestamp::from_micros_since_unix_epoch(0),
    };
    player_state::reset_for_spawn(&mut player, x, y);
    let inserted = ctx
        .db
        .player()
        .try_insert(player)
        .map_err(|e| format!("Failed to create player: {}", e))?;
    log::info!("{} joined as sid {}", inserted.username, inserted.sid);
    Ok(())
}

// --- Input intent reducers ---

fn sender_player(ctx: &ReducerContext) -> Result<Player, String> {
    ctx.db
        .player()
        .identity()
        .find(ctx.sender)
        .ok_or_else(|| "Player not found".to_string())
}

#[spacetimedb::reducer]
pub fn set_move_dir(ctx: &ReducerContext, dir: Option<f32>) -> Result<(), String> {
    let mut player = sender_player(ctx)?;
    if !player.alive {
        return Err("Dead players cannot move".to_string());
    }
    player.move_dir = dir.filter(|d| d.is_finite());
    ctx.db.player().identity().update(player);
    Ok(())
}

#[spacetimedb::reducer]
pub fn set_facing(ctx: &ReducerContext, dir: f32) -> Result<(), String> {
    let mut player = sender_player(ctx)?;
    if !player.alive || !dir.is_finite() {
        return Ok(());
    }
    player.dir = dir;
    ctx.db.player().identity().update(player);
    Ok(())
}

#[spacetimedb::reducer]
pub fn set_attack_state(ctx: &ReducerContext, attacking: bool) -> Result<(), String> {
    let mut player = sender_player(ctx)?;
    if !player.alive {
        return Err("Dead players cannot attack".to_string());
    }
    player.attack_state = attacking;
    ctx.db.player().identity().update(player);
    Ok(())
}

/// Activates the selected item once: food heals, placeables go into the
/// world in front of the player.
#[spacetimedb::reducer]
pub fn use_selected_item(ctx: &ReducerContext) -> Result<(), String> {
    let player = sender_player(ctx)?;
    if !player.alive {
        return Err("Dead players cannot use items".to_string());
    }
    let item_id = player.selected_build.ok_or("No item selected")?;
    let item = items::item(item_id).ok_or("Unknown item")?;
    match item.class {
        ItemClass::Food { heal } => {
            if player.health >= player.max_health {
                return Err("Already at full health".to_string());
            }
            if player.food < item.cost[1] {
                return Err("Not enough food".to_string());
            }
            let mut player = player;
            player.food -= item.cost[1];
            ctx.db.player().identity().update(player);
            let player = sender_player(ctx)?;
            player_state::heal(ctx, player, heal);
            Ok(())
        }
        ItemClass::Placeable => world_object::try_build(ctx, player.sid, item_id),
    }
}

#[spacetimedb::reducer]
pub fn select_build_item(ctx: &ReducerContext, item_id: Option<u32>) -> Result<(), String> {
    let mut player = sender_player(ctx)?;
    if let Some(id) = item_id {
        items::item(id).ok_or("Unknown item")?;
    }
    player.selected_build = item_id;
    ctx.db.player().identity().update(player);
    Ok(())
}

#[spacetimedb::reducer]
pub fn select_weapon(ctx: &ReducerContext, weapon_id: u32) -> Result<(), String> {
    let mut player = sender_player(ctx)?;
    items::weapon(weapon_id).ok_or("Unknown weapon")?;
    if !player.owned_weapons.contains(&weapon_id) {
        return Err("Weapon not unlocked".to_string());
    }
    player.weapon_id = weapon_id;
    player.selected_build = None;
    ctx.db.player().identity().update(player);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_validation() {
        assert_eq!(validated_username("  Bob  ").unwrap(), "Bob");
        assert!(validated_username("   ").is_err());
        let long = "x".repeat(50);
        assert_eq!(validated_username(&long).unwrap().len(), config::MAX_NAME_LENGTH);
    }
}
