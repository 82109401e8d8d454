use spacetimedb::{ReducerContext, Table};

use crate::combat;
use crate::config;
use crate::items;
use crate::models::{Behavior, ObjectKind, ResourceType, ResourceVariant};
use crate::spatial_grid;
use crate::utils::{clamp, get_angle_dist, get_direction, get_distance};
use crate::player as PlayerTableTrait;
use crate::creature::creature as CreatureTableTrait;
use crate::world_object::world_object as WorldObjectTableTrait;
use crate::Player;

// Player physics and melee resolution, stepped once per game tick. Movement
// is velocity-based: input accelerates, everything decays by a fixed factor,
// and world objects push the player out on contact.

fn terrain_speed_multiplier(y: f32) -> f32 {
    if crate::world_object::in_river_band(y) {
        config::RIVER_SPEED_MULTIPLIER
    } else if y <= config::SNOW_BIOME_TOP {
        config::SNOW_SPEED_MULTIPLIER
    } else {
        1.0
    }
}

struct Contact {
    sid: u32,
    x: f32,
    y: f32,
    owner_sid: Option<u32>,
    behavior: Behavior,
    touch_damage: f32,
}

/// Pushes the player circle out of any overlapping object footprint and
/// reports every object touched this step.
fn resolve_object_collisions(ctx: &ReducerContext, player: &mut Player) -> Vec<Contact> {
    let pad = config::PLAYER_SCALE + config::GRID_CELL_SIZE;
    let nearby = spatial_grid::with_world_grid(ctx, |grid| {
        grid.query_region(
            player.pos_x - pad,
            player.pos_y - pad,
            player.pos_x + pad,
            player.pos_y + pad,
        )
    });

    let mut contacts = Vec::new();
    for entry in nearby {
        let dist = get_distance(player.pos_x, player.pos_y, entry.x, entry.y);
        let min_dist = entry.scale + config::PLAYER_SCALE;
        if dist >= min_dist {
            continue;
        }
        let Some(obj) = ctx.db.world_object().sid().find(entry.sid) else {
            continue;
        };
        // Traps do not block movement, they bind.
        if obj.behavior != Behavior::Trap {
            let away = get_direction(player.pos_x, player.pos_y, entry.x, entry.y);
            let push = min_dist - dist;
            player.pos_x += away.cos() * push;
            player.pos_y += away.sin() * push;
        }
        contacts.push(Contact {
            sid: obj.sid,
            x: obj.pos_x,
            y: obj.pos_y,
            owner_sid: obj.owner_sid,
            behavior: obj.behavior,
            touch_damage: obj.touch_damage,
        });
    }
    contacts
}

fn gather_resource(ctx: &ReducerContext, player_sid: u32, variant: ResourceVariant) {
    let Some(player) = ctx.db.player().sid().find(player_sid) else {
        return;
    };
    let (resource, amount) = match variant {
        ResourceVariant::Tree => (ResourceType::Wood, config::GATHER_AMOUNT),
        ResourceVariant::Bush => (ResourceType::Food, config::GATHER_AMOUNT),
        ResourceVariant::Rock => (ResourceType::Stone, config::GATHER_AMOUNT),
        ResourceVariant::GoldOre => (ResourceType::Points, config::GOLD_POINTS),
    };
    crate::player_state::add_resource(ctx, player, resource, amount as i64);
}

/// Resolves one melee swing: every player, creature and object inside the
/// weapon arc is hit. Resources yield materials instead of taking damage.
fn resolve_melee_swing(ctx: &ReducerContext, attacker: &Player, weapon: &items::WeaponDef) {
    let reach = weapon.range + config::PLAYER_SCALE;

    for target in ctx.db.player().iter() {
        if target.sid == attacker.sid || !target.alive || !target.is_online {
            continue;
        }
        let dist = get_distance(attacker.pos_x, attacker.pos_y, target.pos_x, target.pos_y);
        if dist > reach + config::PLAYER_SCALE {
            continue;
        }
        let to_target = get_direction(target.pos_x, target.pos_y, attacker.pos_x, attacker.pos_y);
        if get_angle_dist(attacker.dir, to_target) > config::HIT_ANGLE {
            continue;
        }
        combat::apply_hit_to_player(
            ctx,
            target.sid,
            weapon.damage * attacker.damage_mult,
            to_target,
            weapon.knockback * attacker.knockback_mult,
            Some(attacker.sid),
        );
    }

    for creature in ctx.db.creature().iter() {
        let Some(species) = crate::creature::species(creature.species) else {
            continue;
        };
        let dist = get_distance(attacker.pos_x, attacker.pos_y, creature.pos_x, creature.pos_y);
        if dist > reach + species.scale {
            continue;
        }
        let to_target =
            get_direction(creature.pos_x, creature.pos_y, attacker.pos_x, attacker.pos_y);
        if get_angle_dist(attacker.dir, to_target) > config::HIT_ANGLE {
            continue;
        }
        combat::apply_hit_to_creature(
            ctx,
            creature.sid,
            weapon.damage * attacker.damage_mult,
            to_target,
            weapon.knockback * attacker.knockback_mult,
            Some(attacker.sid),
        );
    }

    let pad = reach + config::GRID_CELL_SIZE;
    let nearby = spatial_grid::with_world_grid(ctx, |grid| {
        grid.query_region(
            attacker.pos_x - pad,
            attacker.pos_y - pad,
            attacker.pos_x + pad,
            attacker.pos_y + pad,
        )
    });
    for entry in nearby {
        let dist = get_distance(attacker.pos_x, attacker.pos_y, entry.x, entry.y);
        if dist > reach + entry.scale {
            continue;
        }
        let to_target = get_direction(entry.x, entry.y, attacker.pos_x, attacker.pos_y);
        if get_angle_dist(attacker.dir, to_target) > config::HIT_ANGLE {
            continue;
        }
        let Some(obj) = ctx.db.world_object().sid().find(entry.sid) else {
            continue;
        };
        match obj.kind {
            ObjectKind::Resource(variant) => gather_resource(ctx, attacker.sid, variant),
            ObjectKind::Structure(_) => {
                // Owners may demolish their own structures too.
                crate::world_object::damage_object(
                    ctx,
                    obj.sid,
                    weapon.damage * attacker.damage_mult * config::OBJECT_DAMAGE_MULTIPLIER,
                );
            }
        }
    }
}

pub fn update_players(ctx: &ReducerContext, delta_ms: i64) {
    let players: Vec<Player> = ctx.db.player().iter().collect();
    for snapshot in players {
        if !snapshot.is_online || !snapshot.alive {
            continue;
        }
        // Re-read: an earlier player's swing may have already modified us.
        let Some(mut player) = ctx.db.player().sid().find(snapshot.sid) else {
            continue;
        };
        if !player.alive {
            continue;
        }

        player.swing_cooldown_ms = (player.swing_cooldown_ms - delta_ms).max(0);

        // Trap binding suppresses input movement but not knockback.
        let trapped = match player.trapped_by {
            Some(trap_sid) => ctx.db.world_object().sid().find(trap_sid).is_some(),
            None => false,
        };
        if !trapped {
            player.trapped_by = None;
            if let Some(move_dir) = player.move_dir {
                let accel = config::PLAYER_BASE_SPEED
                    * player.speed_mult
                    * terrain_speed_multiplier(player.pos_y)
                    * delta_ms as f32;
                player.vel_x += move_dir.cos() * accel;
                player.vel_y += move_dir.sin() * accel;
            }
        }

        player.pos_x += player.vel_x * delta_ms as f32;
        player.pos_y += player.vel_y * delta_ms as f32;

        let decay = config::PLAYER_DECEL.powi(delta_ms as i32 / 10 + 1);
        player.vel_x *= decay;
        player.vel_y *= decay;
        if player.vel_x.abs() < config::VELOCITY_STOP_THRESHOLD * 0.001 {
            player.vel_x = 0.0;
        }
        if player.vel_y.abs() < config::VELOCITY_STOP_THRESHOLD * 0.001 {
            player.vel_y = 0.0;
        }

        player.pos_x = clamp(
            player.pos_x,
            config::PLAYER_SCALE,
            config::MAP_SIZE - config::PLAYER_SCALE,
        );
        player.pos_y = clamp(
            player.pos_y,
            config::PLAYER_SCALE,
            config::MAP_SIZE - config::PLAYER_SCALE,
        );

        let contacts = resolve_object_collisions(ctx, &mut player);
        let player_sid = player.sid;
        let pos = (player.pos_x, player.pos_y);
        ctx.db.player().identity().update(player);

        for contact in contacts {
            let own = contact.owner_sid == Some(player_sid);
            if contact.behavior == Behavior::Trap && !own {
                if let Some(mut p) = ctx.db.player().sid().find(player_sid) {
                    if p.trapped_by.is_none() {
                        p.trapped_by = Some(contact.sid);
                        ctx.db.player().identity().update(p);
                    }
                }
            }
            if contact.touch_damage > 0.0 && !own {
                let away = get_direction(pos.0, pos.1, contact.x, contact.y);
                combat::apply_hit_to_player(
                    ctx,
                    player_sid,
                    contact.touch_damage,
                    away,
                    config::SPIKE_KNOCKBACK,
                    contact.owner_sid,
                );
            }
        }

        // Swing resolution happens after physics so hits use settled positions.
        let Some(player) = ctx.db.player().sid().find(player_sid) else {
            continue;
        };
        if player.alive
            && player.attack_state
            && !player.disarmed
            && player.swing_cooldown_ms <= 0
            && player.selected_build.is_none()
        {
            let Some(weapon) = items::weapon(player.weapon_id) else {
                log::error!("Player {} holds unknown weapon {}", player.sid, player.weapon_id);
                continue;
            };
            if let Some(projectile_id) = weapon.projectile {
                let muzzle = config::PLAYER_SCALE + 20.0;
                let x = player.pos_x + player.dir.cos() * muzzle;
                let y = player.pos_y + player.dir.sin() * muzzle;
                if let Err(e) = crate::projectile::spawn_projectile(
                    ctx,
                    x,
                    y,
                    player.dir,
                    projectile_id,
                    Some(player.sid),
                    None,
                ) {
                    log::error!("Player {} failed to fire: {}", player.sid, e);
                }
            } else {
                resolve_melee_swing(ctx, &player, weapon);
            }
            if let Some(mut p) = ctx.db.player().sid().find(player_sid) {
                p.swing_cooldown_ms = weapon.swing_ms;
                ctx.db.player().identity().update(p);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn river_slows_more_than_snow() {
        let center = config::MAP_SIZE / 2.0;
        assert_eq!(terrain_speed_multiplier(center), config::RIVER_SPEED_MULTIPLIER);
        assert_eq!(terrain_speed_multiplier(100.0), config::SNOW_SPEED_MULTIPLIER);
        assert_eq!(terrain_speed_multiplier(config::MAP_SIZE - 100.0), 1.0);
        assert!(config::RIVER_SPEED_MULTIPLIER < config::SNOW_SPEED_MULTIPLIER);
    }
}
