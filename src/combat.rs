use std::f32::consts::PI;

use spacetimedb::ReducerContext;

use crate::config;
use crate::items;
use crate::models::EntityKind;
use crate::sync;
use crate::utils::get_angle_dist;
use crate::player as PlayerTableTrait;
use crate::Player;

// Shared hit resolution for melee, projectiles, turrets and spikes. Knockback
// is applied before the shield check, so a blocked hit still shoves the
// defender.

/// True when a raised shield faces the incoming hit closely enough to negate
/// its damage. `incoming_dir` is the travel direction of the hit.
pub fn shield_blocks(holds_shield: bool, defender_dir: f32, incoming_dir: f32) -> bool {
    holds_shield && get_angle_dist(incoming_dir + PI, defender_dir) <= config::SHIELD_ANGLE
}

/// Knockback velocity delta for a hit along `dir`.
pub fn knockback_impulse(dir: f32, weight_mod: f32, attacker_mult: f32) -> (f32, f32) {
    let force = config::BASE_KNOCKBACK * weight_mod * attacker_mult;
    (dir.cos() * force, dir.sin() * force)
}

/// Applies one hit to a player: unconditional knockback, then shield-gated
/// damage, then death handling. `dir` is the direction the hit travels.
pub fn apply_hit_to_player(
    ctx: &ReducerContext,
    target_sid: u32,
    damage: f32,
    dir: f32,
    attacker_knockback_mult: f32,
    attacker_sid: Option<u32>,
) {
    let Some(mut target) = ctx.db.player().sid().find(target_sid) else {
        return;
    };
    if !target.alive {
        return;
    }

    let (kx, ky) = knockback_impulse(dir, target.weight_mod, attacker_knockback_mult);
    target.vel_x += kx;
    target.vel_y += ky;

    let holds_shield = items::weapon(target.weapon_id).map_or(false, |w| w.shield);
    if shield_blocks(holds_shield, target.dir, dir) {
        ctx.db.player().identity().update(target);
        return;
    }
    if target.invincible {
        ctx.db.player().identity().update(target);
        return;
    }

    target.health -= damage;
    if target.health <= 0.0 {
        kill_player(ctx, target, attacker_sid);
    } else {
        ctx.db.player().identity().update(target);
    }
}

/// Marks a player dead, tears down their trap bindings, despawns their
/// sprite on every client, and credits the killer.
pub fn kill_player(ctx: &ReducerContext, mut victim: Player, killer_sid: Option<u32>) {
    victim.alive = false;
    victim.health = 0.0;
    victim.vel_x = 0.0;
    victim.vel_y = 0.0;
    victim.trapped_by = None;
    victim.attack_state = false;
    let victim_sid = victim.sid;
    let victim_name = victim.username.clone();
    ctx.db.player().identity().update(victim);

    sync::queue_entity_removal(ctx, EntityKind::Player, victim_sid as u64);

    if let Some(killer_sid) = killer_sid {
        if let Some(mut killer) = ctx.db.player().sid().find(killer_sid) {
            if killer.sid != victim_sid {
                killer.kills += 1;
                killer.points += config::KILL_SCORE_MULTIPLIER;
                let killer_identity = killer.identity;
                let killer_name = killer.username.clone();
                ctx.db.player().identity().update(killer);
                sync::queue_kill_notice(ctx, killer_identity, victim_sid, &victim_name);
                log::info!("{} killed {}", killer_name, victim_name);
                return;
            }
        }
    }
    log::info!("{} died", victim_name);
}

/// Applies one hit to a wild creature. The creature remembers the hit so the
/// next AI step can flee or retaliate per its species. Knockback follows the
/// same impulse formula as player hits.
pub fn apply_hit_to_creature(
    ctx: &ReducerContext,
    creature_sid: u64,
    damage: f32,
    dir: f32,
    attacker_knockback_mult: f32,
    attacker_sid: Option<u32>,
) {
    crate::creature::damage_creature(
        ctx,
        creature_sid,
        damage,
        dir,
        attacker_knockback_mult,
        attacker_sid,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shield_blocks_frontal_hit() {
        // Hit travels east (0.0); defender faces west (PI), directly into it.
        assert!(shield_blocks(true, PI, 0.0));
    }

    #[test]
    fn shield_ignores_rear_hit() {
        // Defender faces the same way the hit travels: hit lands in the back.
        assert!(!shield_blocks(true, 0.0, 0.0));
    }

    #[test]
    fn shield_edge_of_arc() {
        let just_inside = PI + config::SHIELD_ANGLE - 0.01;
        let just_outside = PI + config::SHIELD_ANGLE + 0.01;
        assert!(shield_blocks(true, just_inside, 0.0));
        assert!(!shield_blocks(true, just_outside, 0.0));
    }

    #[test]
    fn no_shield_never_blocks() {
        assert!(!shield_blocks(false, PI, 0.0));
    }

    #[test]
    fn knockback_scales_with_weight_and_multiplier() {
        let (x1, _) = knockback_impulse(0.0, 1.0, 1.0);
        let (x2, _) = knockback_impulse(0.0, 2.0, 1.0);
        let (x3, _) = knockback_impulse(0.0, 1.0, 0.5);
        assert!((x1 - config::BASE_KNOCKBACK).abs() < 1e-6);
        assert!((x2 - x1 * 2.0).abs() < 1e-6);
        assert!((x3 - x1 * 0.5).abs() < 1e-6);
    }
}
