use spacetimedb::ReducerContext;

use crate::config;
use crate::models::ResourceType;
use crate::player as PlayerTableTrait;
use crate::Player;

// Resource pools, XP and the age/upgrade ladder. Points double as both a
// spendable resource and the leaderboard score.

pub const MAX_AGE: u32 = 9;

/// XP required to go from `age` to `age + 1`.
pub fn xp_for_next_age(age: u32) -> f32 {
    300.0 * 1.2_f32.powi(age as i32)
}

/// Weapon ids unlocked on reaching an age. Age 0 grants the starting hammer.
pub fn weapon_unlocks_at(age: u32) -> &'static [u32] {
    match age {
        0 => &[0],
        2 => &[1, 2],
        5 => &[3],
        _ => &[],
    }
}

/// Adds to one resource pool, clamping at zero on the way down. Resource and
/// point gains also feed XP.
pub fn add_resource(ctx: &ReducerContext, mut player: Player, resource: ResourceType, amount: i64) {
    let pool = match resource {
        ResourceType::Wood => &mut player.wood,
        ResourceType::Food => &mut player.food,
        ResourceType::Stone => &mut player.stone,
        ResourceType::Points => &mut player.points,
    };
    if amount >= 0 {
        *pool = pool.saturating_add(amount as u32);
        player.xp += amount as f32;
        advance_age(&mut player);
    } else {
        *pool = pool.saturating_sub((-amount) as u32);
    }
    ctx.db.player().identity().update(player);
}

fn advance_age(player: &mut Player) {
    while player.age < MAX_AGE && player.xp >= xp_for_next_age(player.age) {
        player.xp -= xp_for_next_age(player.age);
        player.age += 1;
        for &weapon_id in weapon_unlocks_at(player.age) {
            if !player.owned_weapons.contains(&weapon_id) {
                player.owned_weapons.push(weapon_id);
            }
        }
    }
}

pub fn heal(ctx: &ReducerContext, mut player: Player, amount: f32) {
    player.health = (player.health + amount).min(player.max_health);
    ctx.db.player().identity().update(player);
}

/// Resets the mutable gameplay fields for a fresh (re)spawn. Identity, name
/// and session bookkeeping are preserved.
pub fn reset_for_spawn(player: &mut Player, x: f32, y: f32) {
    player.pos_x = x;
    player.pos_y = y;
    player.dir = 0.0;
    player.vel_x = 0.0;
    player.vel_y = 0.0;
    player.move_dir = None;
    player.health = config::PLAYER_BASE_HEALTH;
    player.max_health = config::PLAYER_BASE_HEALTH;
    player.alive = true;
    player.attack_state = false;
    player.selected_build = None;
    player.trapped_by = None;
    player.swing_cooldown_ms = 0;
    player.weapon_id = 0;
    player.owned_weapons = vec![0];
    player.wood = config::STARTING_RESOURCES;
    player.food = config::STARTING_RESOURCES;
    player.stone = config::STARTING_RESOURCES;
    player.points = 0;
    player.kills = 0;
    player.xp = 0.0;
    player.age = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xp_curve_is_increasing() {
        for age in 0..MAX_AGE {
            assert!(xp_for_next_age(age + 1) > xp_for_next_age(age));
        }
    }

    #[test]
    fn unlock_table_covers_all_weapons() {
        let mut unlocked: Vec<u32> = Vec::new();
        for age in 0..=MAX_AGE {
            unlocked.extend_from_slice(weapon_unlocks_at(age));
        }
        for w in crate::items::WEAPONS.iter() {
            assert!(unlocked.contains(&w.id), "weapon {} never unlocks", w.name);
        }
    }
}
