use spacetimedb::{ReducerContext, Table};
use rand::Rng;

use crate::config;
use crate::items::{self, ItemClass};
use crate::models::{Behavior, EntityKind, ObjectKind, ResourceVariant, ResourceType};
use crate::spatial_grid::{self, GridEntry};
use crate::utils::{get_direction, get_distance};
use crate::player as PlayerTableTrait;
use crate::creature::creature as CreatureTableTrait;
use crate::sync;

/// A placed or spawned world object: map resources, player-built structures,
/// turrets, traps. An inactive object is absent from the spatial grid and is
/// never matched by any later query; its row is deleted once the removal
/// notice has been queued.
#[spacetimedb::table(name = world_object, public)]
#[derive(Clone, Debug)]
pub struct WorldObject {
    #[primary_key]
    #[auto_inc]
    pub sid: u32,
    pub kind: ObjectKind,
    pub pos_x: f32,
    pub pos_y: f32,
    pub dir: f32,
    pub scale: f32,
    /// None for map-generated terrain.
    pub owner_sid: Option<u32>,
    /// None means indestructible.
    pub health: Option<f32>,
    pub active: bool,
    pub behavior: Behavior,
    pub layer: u8,
    pub touch_damage: f32,
    pub projectile_vulnerable: bool,
}

// --- Placement validation ---

/// True when nothing in the grid blocks a new footprint at (x, y). Two
/// footprints conflict when their center distance is under the combined
/// radius scaled by the allowed overlap ratio.
pub fn placement_clear(
    nearby: &[GridEntry],
    x: f32,
    y: f32,
    scale: f32,
    overlap_ratio: f32,
) -> bool {
    for entry in nearby {
        if get_distance(x, y, entry.x, entry.y) < (scale + entry.scale) * overlap_ratio {
            return false;
        }
    }
    true
}

pub fn in_river_band(y: f32) -> bool {
    let center = config::MAP_SIZE / 2.0;
    y >= center - config::RIVER_WIDTH / 2.0 && y <= center + config::RIVER_WIDTH / 2.0
}

pub fn in_desert_band(y: f32) -> bool {
    y >= config::DESERT_BIOME_BOTTOM
}

/// Validates a candidate location against bounds, overlap with existing
/// objects, and optional biome exclusions. Mirrors the placement rules used
/// for both world seeding and player builds.
pub fn check_item_location(
    ctx: &ReducerContext,
    x: f32,
    y: f32,
    scale: f32,
    allow_river: bool,
) -> bool {
    if x < scale || y < scale || x > config::MAP_SIZE - scale || y > config::MAP_SIZE - scale {
        return false;
    }
    if !allow_river && in_river_band(y) {
        return false;
    }
    let pad = scale * 2.0 + config::GRID_CELL_SIZE;
    let nearby = spatial_grid::with_world_grid(ctx, |grid| {
        grid.query_region(x - pad, y - pad, x + pad, y + pad)
    });
    placement_clear(&nearby, x, y, scale, config::PLACEMENT_OVERLAP_RATIO)
}

// --- Lifecycle ---

pub fn add_object(
    ctx: &ReducerContext,
    kind: ObjectKind,
    x: f32,
    y: f32,
    dir: f32,
    scale: f32,
    owner_sid: Option<u32>,
    health: Option<f32>,
    behavior: Behavior,
    layer: u8,
    touch_damage: f32,
    projectile_vulnerable: bool,
) -> Result<WorldObject, String> {
    let inserted = ctx
        .db
        .world_object()
        .try_insert(WorldObject {
            sid: 0, // auto_inc
            kind,
            pos_x: x,
            pos_y: y,
            dir,
            scale,
            owner_sid,
            health,
            active: true,
            behavior,
            layer,
            touch_damage,
            projectile_vulnerable,
        })
        .map_err(|e| format!("Failed to insert world object: {}", e))?;

    spatial_grid::with_world_grid(ctx, |grid| {
        grid.insert(GridEntry {
            sid: inserted.sid,
            x,
            y,
            scale,
        })
    });
    Ok(inserted)
}

/// Removes an object from play: grid removal, removal notices to every
/// connection that had it announced, then row deletion. Players held by a
/// disabled trap are released.
pub fn disable_object(ctx: &ReducerContext, sid: u32) {
    let Some(mut obj) = ctx.db.world_object().sid().find(sid) else {
        log::warn!("disable_object: object {} not found", sid);
        return;
    };
    if !obj.active {
        return;
    }
    obj.active = false;

    spatial_grid::with_world_grid(ctx, |grid| grid.remove(sid));
    sync::queue_entity_removal(ctx, EntityKind::WorldObject, sid as u64);

    if obj.behavior == Behavior::Trap {
        let held: Vec<_> = ctx
            .db
            .player()
            .iter()
            .filter(|p| p.trapped_by == Some(sid))
            .collect();
        for mut player in held {
            player.trapped_by = None;
            ctx.db.player().identity().update(player);
        }
    }

    ctx.db.world_object().sid().delete(sid);
}

/// Applies damage to a destructible object. Returns true when the object was
/// destroyed by this hit.
pub fn damage_object(ctx: &ReducerContext, sid: u32, amount: f32) -> bool {
    let Some(mut obj) = ctx.db.world_object().sid().find(sid) else {
        return false;
    };
    let Some(health) = obj.health else {
        return false; // indestructible terrain
    };
    let remaining = health - amount;
    if remaining <= 0.0 {
        disable_object(ctx, sid);
        true
    } else {
        obj.health = Some(remaining);
        ctx.db.world_object().sid().update(obj);
        false
    }
}

/// Number of structures of one catalog item a player currently has placed.
/// Derived from live rows so it can never drift from the world.
pub fn placed_count(ctx: &ReducerContext, owner_sid: u32, item_id: u32) -> u32 {
    ctx.db
        .world_object()
        .iter()
        .filter(|obj| {
            obj.active
                && obj.owner_sid == Some(owner_sid)
                && obj.kind == ObjectKind::Structure(item_id)
        })
        .count() as u32
}

// --- World seeding ---

fn resource_params(variant: ResourceVariant) -> (&'static [f32], bool, bool) {
    // (scale choices, allowed in river, allowed in desert)
    match variant {
        ResourceVariant::Tree => (config::TREE_SCALES, false, false),
        ResourceVariant::Bush => (config::BUSH_SCALES, false, true),
        ResourceVariant::Rock => (config::ROCK_SCALES, true, true),
        ResourceVariant::GoldOre => (config::ROCK_SCALES, true, true),
    }
}

fn seed_resource_batch(
    ctx: &ReducerContext,
    variant: ResourceVariant,
    target: u32,
) -> Result<u32, String> {
    let (scales, allow_river, allow_desert) = resource_params(variant);
    let mut placed = 0;
    // Bounded budget so a crowded map terminates the batch instead of
    // spinning forever.
    let mut attempts = target * 10;
    while placed < target && attempts > 0 {
        attempts -= 1;
        let x = ctx.rng().gen_range(0.0..config::MAP_SIZE);
        let y = ctx.rng().gen_range(0.0..config::MAP_SIZE);
        let scale = scales[ctx.rng().gen_range(0..scales.len())];
        if !allow_desert && in_desert_band(y) {
            continue;
        }
        if !check_item_location(ctx, x, y, scale, allow_river) {
            continue;
        }
        add_object(
            ctx,
            ObjectKind::Resource(variant),
            x,
            y,
            0.0,
            scale,
            None,
            None,
            Behavior::Inert,
            1,
            0.0,
            false,
        )?;
        placed += 1;
    }
    Ok(placed)
}

/// Scatters the static map resources. Called once from module init.
pub fn seed_world_objects(ctx: &ReducerContext) -> Result<(), String> {
    if ctx.db.world_object().iter().next().is_some() {
        log::debug!("World objects already seeded, skipping");
        return Ok(());
    }
    let trees = seed_resource_batch(ctx, ResourceVariant::Tree, config::TREES_PER_AREA * config::AREA_COUNT)?;
    let bushes = seed_resource_batch(ctx, ResourceVariant::Bush, config::BUSHES_PER_AREA * config::AREA_COUNT)?;
    let rocks = seed_resource_batch(ctx, ResourceVariant::Rock, config::TOTAL_ROCKS)?;
    let gold = seed_resource_batch(ctx, ResourceVariant::GoldOre, config::TOTAL_GOLD_ORES)?;
    log::info!(
        "Seeded world objects: {} trees, {} bushes, {} rocks, {} gold ores",
        trees, bushes, rocks, gold
    );
    Ok(())
}

// --- Structure per-tick behavior ---

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetCandidate {
    pub kind: EntityKind,
    pub sid: u64,
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

/// Strictly nearest candidate within range (range is extended by each
/// candidate's own scale). Ties are broken by input order.
pub fn pick_nearest_target(
    candidates: &[TargetCandidate],
    x: f32,
    y: f32,
    range: f32,
) -> Option<TargetCandidate> {
    let mut best: Option<(f32, TargetCandidate)> = None;
    for &candidate in candidates {
        let dist = get_distance(x, y, candidate.x, candidate.y);
        if dist > range + candidate.scale {
            continue;
        }
        match best {
            Some((best_dist, _)) if dist >= best_dist => {}
            _ => best = Some((dist, candidate)),
        }
    }
    best.map(|(_, c)| c)
}

fn collect_turret_candidates(ctx: &ReducerContext, turret: &WorldObject) -> Vec<TargetCandidate> {
    let owner = turret
        .owner_sid
        .and_then(|sid| ctx.db.player().sid().find(sid));
    let owner_team = owner.as_ref().and_then(|p| p.alliance_id);

    let mut candidates = Vec::new();
    for player in ctx.db.player().iter() {
        if !player.alive || !player.is_online {
            continue;
        }
        if Some(player.sid) == turret.owner_sid {
            continue;
        }
        if owner_team.is_some() && player.alliance_id == owner_team {
            continue;
        }
        candidates.push(TargetCandidate {
            kind: EntityKind::Player,
            sid: player.sid as u64,
            x: player.pos_x,
            y: player.pos_y,
            scale: config::PLAYER_SCALE,
        });
    }
    for creature in ctx.db.creature().iter() {
        let Some(species) = crate::creature::species(creature.species) else {
            continue;
        };
        candidates.push(TargetCandidate {
            kind: EntityKind::Creature,
            sid: creature.sid,
            x: creature.pos_x,
            y: creature.pos_y,
            scale: species.scale,
        });
    }
    candidates
}

/// Per-tick behavior for every placed structure: turret reload/targeting and
/// mill income. Runs inside the main game tick after creatures.
pub fn update_structures(ctx: &ReducerContext, delta_ms: i64) {
    let objects = ctx.db.world_object();
    let snapshot: Vec<WorldObject> = objects.iter().collect();
    for obj in snapshot {
        if !obj.active {
            continue;
        }
        match obj.behavior {
            Behavior::Turret { reload_ms, range, projectile } => {
                let remaining = reload_ms - delta_ms;
                if remaining > 0 {
                    let mut updated = obj.clone();
                    updated.behavior = Behavior::Turret { reload_ms: remaining, range, projectile };
                    objects.sid().update(updated);
                    continue;
                }

                let candidates = collect_turret_candidates(ctx, &obj);
                let Some(target) = pick_nearest_target(&candidates, obj.pos_x, obj.pos_y, range)
                else {
                    // Loaded but idle: retry soon instead of waiting a full cycle.
                    let mut updated = obj.clone();
                    updated.behavior = Behavior::Turret {
                        reload_ms: config::TURRET_IDLE_RETRY_MS.min(config::TURRET_FIRE_RATE_MS),
                        range,
                        projectile,
                    };
                    objects.sid().update(updated);
                    continue;
                };

                let dir = get_direction(target.x, target.y, obj.pos_x, obj.pos_y);
                let muzzle = obj.scale + config::TURRET_MUZZLE_OFFSET;
                let spawn_x = obj.pos_x + dir.cos() * muzzle;
                let spawn_y = obj.pos_y + dir.sin() * muzzle;

                if let Err(e) = crate::projectile::spawn_projectile(
                    ctx,
                    spawn_x,
                    spawn_y,
                    dir,
                    projectile,
                    obj.owner_sid,
                    Some(obj.sid),
                ) {
                    log::error!("Turret {} failed to fire: {}", obj.sid, e);
                }

                let mut updated = obj.clone();
                updated.dir = dir;
                updated.behavior = Behavior::Turret {
                    reload_ms: config::TURRET_FIRE_RATE_MS,
                    range,
                    projectile,
                };
                objects.sid().update(updated);
                sync::queue_turret_shot(ctx, obj.sid, dir);
            }
            Behavior::Mill { income_ms } => {
                let remaining = income_ms - delta_ms;
                let mut updated = obj.clone();
                if remaining > 0 {
                    updated.behavior = Behavior::Mill { income_ms: remaining };
                } else {
                    updated.behavior = Behavior::Mill { income_ms: config::MILL_INCOME_INTERVAL_MS };
                    if let Some(owner_sid) = obj.owner_sid {
                        if let Some(owner) = ctx.db.player().sid().find(owner_sid) {
                            crate::player_state::add_resource(
                                ctx,
                                owner,
                                ResourceType::Points,
                                config::MILL_POINTS_PER_TICK as i64,
                            );
                        }
                    }
                }
                objects.sid().update(updated);
            }
            Behavior::Trap | Behavior::Inert => {}
        }
    }
}

// --- Build reducer support ---

/// Attempts to place a structure for a player. Validates the catalog entry,
/// resources, build limit, and location before creating the object.
pub fn try_build(ctx: &ReducerContext, player_sid: u32, item_id: u32) -> Result<(), String> {
    let item = items::item(item_id).ok_or("Unknown item")?;
    if item.class != ItemClass::Placeable {
        return Err("Item is not placeable".to_string());
    }
    let player = ctx
        .db
        .player()
        .sid()
        .find(player_sid)
        .ok_or("Player not found")?;
    if !player.alive {
        return Err("Dead players cannot build".to_string());
    }
    if placed_count(ctx, player_sid, item_id) >= item.limit {
        return Err(format!("Build limit reached for {}", item.name));
    }
    if player.wood < item.cost[0] || player.food < item.cost[1] || player.stone < item.cost[2] {
        return Err("Not enough resources".to_string());
    }

    let offset = config::PLAYER_SCALE + item.scale + item.place_offset;
    let x = player.pos_x + player.dir.cos() * offset;
    let y = player.pos_y + player.dir.sin() * offset;

    if !check_item_location(ctx, x, y, item.scale, true) {
        return Err("Cannot place here".to_string());
    }

    add_object(
        ctx,
        ObjectKind::Structure(item_id),
        x,
        y,
        player.dir,
        item.scale,
        Some(player_sid),
        item.health,
        item.behavior,
        item.layer,
        item.touch_damage,
        item.projectile_vulnerable,
    )?;

    let mut updated = player;
    updated.wood -= item.cost[0];
    updated.food -= item.cost[1];
    updated.stone -= item.cost[2];
    ctx.db.player().identity().update(updated);
    Ok(())
}

/// Tears down everything a departing or dead player had placed.
pub fn remove_all_player_objects(ctx: &ReducerContext, owner_sid: u32) {
    let sids: Vec<u32> = ctx
        .db
        .world_object()
        .iter()
        .filter(|obj| obj.owner_sid == Some(owner_sid))
        .map(|obj| obj.sid)
        .collect();
    for sid in sids {
        disable_object(ctx, sid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_blocked_by_overlapping_entry() {
        let nearby = [GridEntry { sid: 1, x: 100.0, y: 100.0, scale: 80.0 }];
        // Distance 60 < (50 + 80) * 0.6 = 78 -> blocked.
        assert!(!placement_clear(&nearby, 160.0, 100.0, 50.0, 0.6));
        // Distance 100 > 78 -> clear.
        assert!(placement_clear(&nearby, 200.0, 100.0, 50.0, 0.6));
    }

    #[test]
    fn placement_clear_on_empty_map() {
        assert!(placement_clear(&[], 500.0, 500.0, 50.0, 0.6));
    }

    #[test]
    fn river_band_detection() {
        let center = config::MAP_SIZE / 2.0;
        assert!(in_river_band(center));
        assert!(in_river_band(center - config::RIVER_WIDTH / 2.0));
        assert!(!in_river_band(center - config::RIVER_WIDTH));
    }

    #[test]
    fn desert_band_is_the_bottom_of_the_map() {
        assert!(in_desert_band(config::MAP_SIZE - 100.0));
        assert!(in_desert_band(config::DESERT_BIOME_BOTTOM));
        assert!(!in_desert_band(config::MAP_SIZE / 2.0));
        // Snow sits at the top, independent of the desert band.
        assert!(!in_desert_band(config::SNOW_BIOME_TOP));
    }

    #[test]
    fn trees_excluded_from_desert_bushes_allowed() {
        let (_, _, tree_desert) = resource_params(ResourceVariant::Tree);
        let (_, _, bush_desert) = resource_params(ResourceVariant::Bush);
        assert!(!tree_desert);
        assert!(bush_desert);
    }

    fn candidate(sid: u64, x: f32, y: f32) -> TargetCandidate {
        TargetCandidate { kind: EntityKind::Player, sid, x, y, scale: 35.0 }
    }

    #[test]
    fn turret_picks_strict_nearest() {
        let candidates = [candidate(1, 300.0, 0.0), candidate(2, 150.0, 0.0), candidate(3, 400.0, 0.0)];
        let picked = pick_nearest_target(&candidates, 0.0, 0.0, 735.0).unwrap();
        assert_eq!(picked.sid, 2);
    }

    #[test]
    fn turret_ignores_out_of_range() {
        let candidates = [candidate(1, 5000.0, 0.0)];
        assert!(pick_nearest_target(&candidates, 0.0, 0.0, 735.0).is_none());
    }

    #[test]
    fn turret_range_extends_by_target_scale() {
        // Distance 760 > 735 but <= 735 + 35.
        let candidates = [candidate(1, 760.0, 0.0)];
        assert!(pick_nearest_target(&candidates, 0.0, 0.0, 735.0).is_some());
    }
}
