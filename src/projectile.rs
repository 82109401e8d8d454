use spacetimedb::{ReducerContext, Table, Timestamp};

use crate::combat;
use crate::config;
use crate::items;
use crate::models::EntityKind;
use crate::spatial_grid;
use crate::sync;
use crate::player as PlayerTableTrait;
use crate::creature::creature as CreatureTableTrait;
use crate::world_object::world_object as WorldObjectTableTrait;

/// An in-flight projectile. Rows exist only while the projectile is live;
/// retirement deletes the row after queueing removal notices.
#[spacetimedb::table(name = projectile, public)]
#[derive(Clone, Debug)]
pub struct Projectile {
    #[primary_key]
    #[auto_inc]
    pub sid: u64,
    pub owner_sid: Option<u32>,
    /// Turret that fired it, if any. Turrets never hit themselves.
    pub source_object: Option<u32>,
    pub pos_x: f32,
    pub pos_y: f32,
    pub dir: f32,
    /// World units per millisecond.
    pub speed: f32,
    /// Remaining travel distance. Clamped to zero at retirement.
    pub range_left: f32,
    pub damage: f32,
    pub scale: f32,
    pub layer: u8,
    pub spawned_at: Timestamp,
}

pub fn spawn_projectile(
    ctx: &ReducerContext,
    x: f32,
    y: f32,
    dir: f32,
    projectile_id: u32,
    owner_sid: Option<u32>,
    source_object: Option<u32>,
) -> Result<(), String> {
    let def = items::projectile(projectile_id).ok_or("Unknown projectile")?;
    ctx.db
        .projectile()
        .try_insert(Projectile {
            sid: 0, // auto_inc
            owner_sid,
            source_object,
            pos_x: x,
            pos_y: y,
            dir,
            speed: def.speed,
            range_left: def.range,
            damage: def.damage,
            scale: def.scale,
            layer: def.layer,
            spawned_at: ctx.timestamp,
        })
        .map_err(|e| format!("Failed to insert projectile: {}", e))?;
    Ok(())
}

/// First impact parameter t in [0, 1] of the segment (x0,y0)->(x1,y1) against
/// a circle at (cx, cy) with radius r, or None on a miss. A segment starting
/// inside the circle reports t = 0.
pub fn segment_circle_impact(
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    cx: f32,
    cy: f32,
    r: f32,
) -> Option<f32> {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let fx = x0 - cx;
    let fy = y0 - cy;

    if fx * fx + fy * fy <= r * r {
        return Some(0.0);
    }

    let a = dx * dx + dy * dy;
    if a < 1e-9 {
        return None;
    }
    let b = 2.0 * (fx * dx + fy * dy);
    let c = fx * fx + fy * fy - r * r;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t = (-b - sqrt_disc) / (2.0 * a);
    if (0.0..=1.0).contains(&t) {
        Some(t)
    } else {
        None
    }
}

enum HitTarget {
    Player(u32),
    Creature(u64),
    Object(u32, bool), // (sid, projectile_vulnerable)
}

/// Keeps whichever candidate impacts first along the travel segment.
fn offer_hit(best: &mut Option<(f32, HitTarget)>, t: f32, target: HitTarget) {
    if best.as_ref().map_or(true, |(bt, _)| t < *bt) {
        *best = Some((t, target));
    }
}

/// Nearest hit along the travel segment across players, creatures and world
/// objects. Returns (t, target).
fn find_first_hit(
    ctx: &ReducerContext,
    proj: &Projectile,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    owner_team: Option<u64>,
) -> Option<(f32, HitTarget)> {
    let mut best: Option<(f32, HitTarget)> = None;

    for player in ctx.db.player().iter() {
        if !player.alive || !player.is_online {
            continue;
        }
        if Some(player.sid) == proj.owner_sid {
            continue;
        }
        if owner_team.is_some() && player.alliance_id == owner_team {
            continue;
        }
        let r = config::PLAYER_SCALE + proj.scale;
        if let Some(t) = segment_circle_impact(x0, y0, x1, y1, player.pos_x, player.pos_y, r) {
            offer_hit(&mut best, t, HitTarget::Player(player.sid));
        }
    }

    for creature in ctx.db.creature().iter() {
        let Some(species) = crate::creature::species(creature.species) else {
            continue;
        };
        let r = species.scale + proj.scale;
        if let Some(t) = segment_circle_impact(x0, y0, x1, y1, creature.pos_x, creature.pos_y, r) {
            offer_hit(&mut best, t, HitTarget::Creature(creature.sid));
        }
    }

    let candidates =
        spatial_grid::with_world_grid(ctx, |grid| grid.query_sweep(x0, y0, x1, y1, proj.scale));
    for entry in candidates {
        if Some(entry.sid) == proj.source_object {
            continue;
        }
        let Some(obj) = ctx.db.world_object().sid().find(entry.sid) else {
            continue;
        };
        if obj.layer < proj.layer {
            continue; // flies over low structures like pit traps
        }
        let r = obj.scale + proj.scale;
        if let Some(t) = segment_circle_impact(x0, y0, x1, y1, obj.pos_x, obj.pos_y, r) {
            offer_hit(&mut best, t, HitTarget::Object(obj.sid, obj.projectile_vulnerable));
        }
    }

    best
}

fn retire(ctx: &ReducerContext, sid: u64) {
    sync::queue_entity_removal(ctx, EntityKind::Projectile, sid);
    ctx.db.projectile().sid().delete(sid);
}

/// Advances every projectile by its per-tick step, resolving at most one hit
/// per projectile at the nearest impact along the traveled segment. Range is
/// decremented by the traveled distance; overshoot past the remaining range
/// is pulled back before the projectile expires.
pub fn update_projectiles(ctx: &ReducerContext, delta_ms: i64) {
    let projectiles: Vec<Projectile> = ctx.db.projectile().iter().collect();
    for mut proj in projectiles {
        let step = proj.speed * delta_ms as f32;
        let x0 = proj.pos_x;
        let y0 = proj.pos_y;
        let mut x1 = x0 + proj.dir.cos() * step;
        let mut y1 = y0 + proj.dir.sin() * step;
        let mut range_left = proj.range_left - step;
        let mut expired = false;

        if range_left <= 0.0 {
            // Pull the endpoint back by the overshoot so the projectile never
            // travels beyond its total range.
            x1 += proj.dir.cos() * range_left;
            y1 += proj.dir.sin() * range_left;
            range_left = 0.0;
            expired = true;
        }

        let owner_team = proj
            .owner_sid
            .and_then(|sid| ctx.db.player().sid().find(sid))
            .and_then(|p| p.alliance_id);

        if let Some((t, target)) = find_first_hit(ctx, &proj, x0, y0, x1, y1, owner_team) {
            let hit_x = x0 + (x1 - x0) * t;
            let hit_y = y0 + (y1 - y0) * t;
            let dir = proj.dir;

            let knockback_mult = proj
                .owner_sid
                .and_then(|sid| ctx.db.player().sid().find(sid))
                .map_or(1.0, |p| p.knockback_mult);

            match target {
                HitTarget::Player(player_sid) => {
                    combat::apply_hit_to_player(
                        ctx,
                        player_sid,
                        proj.damage,
                        dir,
                        knockback_mult,
                        proj.owner_sid,
                    );
                }
                HitTarget::Creature(creature_sid) => {
                    combat::apply_hit_to_creature(
                        ctx,
                        creature_sid,
                        proj.damage,
                        dir,
                        knockback_mult,
                        proj.owner_sid,
                    );
                }
                HitTarget::Object(object_sid, vulnerable) => {
                    if vulnerable {
                        crate::world_object::damage_object(ctx, object_sid, proj.damage);
                    }
                }
            }
            log::debug!("Projectile {} impacted at ({:.0}, {:.0})", proj.sid, hit_x, hit_y);
            retire(ctx, proj.sid);
            continue;
        }

        if expired {
            retire(ctx, proj.sid);
            continue;
        }

        proj.pos_x = x1;
        proj.pos_y = y1;
        proj.range_left = range_left;
        ctx.db.projectile().sid().update(proj);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impact_reports_entry_point() {
        // Segment along x axis into a circle at (100, 0) r=10: entry at x=90.
        let t = segment_circle_impact(0.0, 0.0, 200.0, 0.0, 100.0, 0.0, 10.0).unwrap();
        assert!((t - 0.45).abs() < 1e-4);
    }

    #[test]
    fn impact_misses_offset_circle() {
        assert!(segment_circle_impact(0.0, 0.0, 200.0, 0.0, 100.0, 50.0, 10.0).is_none());
    }

    #[test]
    fn impact_from_inside_is_immediate() {
        let t = segment_circle_impact(100.0, 0.0, 200.0, 0.0, 100.0, 0.0, 10.0).unwrap();
        assert_eq!(t, 0.0);
    }

    #[test]
    fn impact_behind_segment_misses() {
        // Circle behind the start point.
        assert!(segment_circle_impact(0.0, 0.0, 100.0, 0.0, -50.0, 0.0, 10.0).is_none());
    }

    #[test]
    fn nearest_candidate_takes_the_hit() {
        // Two targets on the flight path, centers at x=50 and x=80; the
        // closer one wins regardless of the order candidates are offered.
        let near = segment_circle_impact(0.0, 0.0, 200.0, 0.0, 50.0, 0.0, 10.0).unwrap();
        let far = segment_circle_impact(0.0, 0.0, 200.0, 0.0, 80.0, 0.0, 10.0).unwrap();
        assert!(near < far);

        let mut best = None;
        offer_hit(&mut best, far, HitTarget::Player(2));
        offer_hit(&mut best, near, HitTarget::Player(1));
        assert!(matches!(best, Some((t, HitTarget::Player(1))) if t == near));

        let mut best = None;
        offer_hit(&mut best, near, HitTarget::Player(1));
        offer_hit(&mut best, far, HitTarget::Player(2));
        assert!(matches!(best, Some((t, HitTarget::Player(1))) if t == near));
    }

    #[test]
    fn overshoot_pullback_lands_on_range_boundary() {
        // Emulates the clamp arithmetic in update_projectiles.
        let speed = 1.5_f32;
        let delta_ms = 111_i64;
        let range_left = 100.0_f32;
        let step = speed * delta_ms as f32;
        let mut x1 = 0.0 + step;
        let leftover = range_left - step;
        assert!(leftover < 0.0);
        x1 += leftover;
        assert!((x1 - range_left).abs() < 1e-4);
    }
}
