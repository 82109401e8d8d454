use lazy_static::lazy_static;
use rand::Rng;
use serde::Deserialize;
use spacetimedb::{ReducerContext, Table};

use crate::combat;
use crate::config;
use crate::models::{CreatureState, EntityKind, ResourceType};
use crate::sync;
use crate::utils::{clamp, get_direction, get_distance};
use crate::player as PlayerTableTrait;

// Wild creature AI. Each creature runs a small state machine stepped once per
// game tick; the transition function is pure so behavior is testable without
// a database.

/// Species balance data. Kept as embedded JSON so the sheet can be tweaked
/// without touching logic.
#[derive(Deserialize, Clone, Debug)]
pub struct SpeciesDef {
    pub id: u32,
    pub name: String,
    pub scale: f32,
    pub health: f32,
    /// World units per millisecond.
    pub speed: f32,
    pub damage: f32,
    pub hostile: bool,
    /// Periodically charges in a straight line when true.
    pub charges: bool,
    pub view_range: f32,
    pub hit_range: f32,
    pub drop_food: u32,
    pub kill_score: u32,
}

const SPECIES_JSON: &str = r#"[
    {"id": 0, "name": "Cow",      "scale": 55.0, "health": 500.0,  "speed": 0.00095, "damage": 0.0,  "hostile": false, "charges": false, "view_range": 0.0,    "hit_range": 0.0,   "drop_food": 50,  "kill_score": 150},
    {"id": 1, "name": "Pig",      "scale": 60.0, "health": 800.0,  "speed": 0.00085, "damage": 0.0,  "hostile": false, "charges": false, "view_range": 0.0,    "hit_range": 0.0,   "drop_food": 80,  "kill_score": 200},
    {"id": 2, "name": "Bull",     "scale": 78.0, "health": 1800.0, "speed": 0.00095, "damage": 40.0, "hostile": true,  "charges": true,  "view_range": 900.0,  "hit_range": 60.0,  "drop_food": 100, "kill_score": 1000},
    {"id": 3, "name": "Bully",    "scale": 90.0, "health": 2800.0, "speed": 0.001,   "damage": 50.0, "hostile": true,  "charges": true,  "view_range": 900.0,  "hit_range": 65.0,  "drop_food": 400, "kill_score": 2000},
    {"id": 4, "name": "Wolf",     "scale": 49.0, "health": 300.0,  "speed": 0.001,   "damage": 40.0, "hostile": true,  "charges": false, "view_range": 800.0,  "hit_range": 50.0,  "drop_food": 200, "kill_score": 500},
    {"id": 5, "name": "Quack",    "scale": 45.0, "health": 700.0,  "speed": 0.00115, "damage": 0.0,  "hostile": false, "charges": false, "view_range": 0.0,    "hit_range": 0.0,   "drop_food": 100, "kill_score": 200},
    {"id": 6, "name": "Sheep",    "scale": 50.0, "health": 450.0,  "speed": 0.0009,  "damage": 0.0,  "hostile": false, "charges": false, "view_range": 0.0,    "hit_range": 0.0,   "drop_food": 60,  "kill_score": 150},
    {"id": 7, "name": "Moostafa", "scale": 80.0, "health": 18000.0,"speed": 0.00085, "damage": 50.0, "hostile": true,  "charges": false, "view_range": 1000.0, "hit_range": 80.0,  "drop_food": 1000,"kill_score": 8000}
]"#;

lazy_static! {
    pub static ref SPECIES: Vec<SpeciesDef> = serde_json::from_str(SPECIES_JSON)
        .unwrap_or_else(|e| panic!("Invalid species catalog: {}", e));
}

pub fn species(id: u32) -> Option<&'static SpeciesDef> {
    SPECIES.get(id as usize)
}

#[spacetimedb::table(name = creature, public)]
#[derive(Clone, Debug)]
pub struct Creature {
    #[primary_key]
    #[auto_inc]
    pub sid: u64,
    pub species: u32,
    pub pos_x: f32,
    pub pos_y: f32,
    pub dir: f32,
    /// Knockback velocity, decays each tick.
    pub vel_x: f32,
    pub vel_y: f32,
    pub health: f32,
    pub state: CreatureState,
    /// Countdown until the current state ends.
    pub state_ms_left: i64,
    /// Countdown of an in-progress attack windup.
    pub windup_ms_left: Option<i64>,
    /// Pause after landing a hit before the next windup may start.
    pub hit_wait_ms: i64,
    pub target_sid: Option<u32>,
    /// Set by damage_creature, consumed by the next AI step.
    pub was_hit: bool,
    pub last_hit_dir: f32,
}

// --- Pure transition planning ---

#[derive(Clone, Copy, Debug)]
pub struct TransitionInput {
    pub state: CreatureState,
    pub timer_expired: bool,
    pub hostile: bool,
    pub charges: bool,
    pub was_hit: bool,
    /// Distance to the nearest living player, if any.
    pub nearest_player_dist: Option<f32>,
    pub view_range: f32,
    /// Random roll in [0, 1) made by the caller for charge decisions.
    pub charge_roll: f32,
}

/// Decides the next state from the current situation. Being hit dominates:
/// passive species flee, hostile species engage. Hostile species otherwise
/// engage any player inside view range. The idle/wander cycle alternates on
/// timer expiry, with charging species occasionally breaking into a charge.
pub fn plan_transition(input: &TransitionInput) -> CreatureState {
    if input.was_hit {
        return if input.hostile {
            CreatureState::HostileEngage
        } else {
            CreatureState::Flee
        };
    }

    let player_in_view = input
        .nearest_player_dist
        .map_or(false, |d| d <= input.view_range);

    if input.hostile && player_in_view {
        return CreatureState::HostileEngage;
    }

    match input.state {
        CreatureState::HostileEngage => {
            // Target left view range.
            CreatureState::Idle
        }
        CreatureState::Flee | CreatureState::Charge => {
            if input.timer_expired {
                CreatureState::Idle
            } else {
                input.state
            }
        }
        CreatureState::Idle => {
            if !input.timer_expired {
                CreatureState::Idle
            } else if input.charges && input.charge_roll < 0.2 {
                CreatureState::Charge
            } else {
                CreatureState::Wander
            }
        }
        CreatureState::Wander => {
            if input.timer_expired {
                CreatureState::Idle
            } else {
                CreatureState::Wander
            }
        }
    }
}

/// Fresh state timer for a newly entered state.
fn roll_state_duration(ctx: &ReducerContext, state: CreatureState) -> i64 {
    match state {
        CreatureState::Idle => ctx
            .rng()
            .gen_range(config::CREATURE_IDLE_MIN_MS..=config::CREATURE_IDLE_MAX_MS),
        CreatureState::Wander => ctx
            .rng()
            .gen_range(config::CREATURE_WANDER_MIN_MS..=config::CREATURE_WANDER_MAX_MS),
        CreatureState::Flee => config::CREATURE_FLEE_DURATION_MS,
        CreatureState::Charge => ctx
            .rng()
            .gen_range(config::CREATURE_CHARGE_MIN_MS..=config::CREATURE_CHARGE_MAX_MS),
        CreatureState::HostileEngage => i64::MAX,
    }
}

// --- Damage intake ---

pub fn damage_creature(
    ctx: &ReducerContext,
    sid: u64,
    amount: f32,
    dir: f32,
    attacker_knockback_mult: f32,
    attacker_sid: Option<u32>,
) {
    let Some(mut creature) = ctx.db.creature().sid().find(sid) else {
        return;
    };
    let Some(def) = species(creature.species) else {
        return;
    };

    let (kx, ky) = combat::knockback_impulse(dir, 1.0, attacker_knockback_mult);
    creature.vel_x += kx;
    creature.vel_y += ky;
    creature.health -= amount;
    creature.was_hit = true;
    creature.last_hit_dir = dir;
    if attacker_sid.is_some() {
        creature.target_sid = attacker_sid;
    }

    if creature.health <= 0.0 {
        if let Some(attacker_sid) = attacker_sid {
            if let Some(attacker) = ctx.db.player().sid().find(attacker_sid) {
                crate::player_state::add_resource(
                    ctx,
                    attacker,
                    ResourceType::Food,
                    def.drop_food as i64,
                );
            }
            if let Some(attacker) = ctx.db.player().sid().find(attacker_sid) {
                crate::player_state::add_resource(
                    ctx,
                    attacker,
                    ResourceType::Points,
                    def.kill_score as i64,
                );
            }
        }
        log::info!("{} (creature {}) was slain", def.name, sid);
        sync::queue_entity_removal(ctx, EntityKind::Creature, sid);
        ctx.db.creature().sid().delete(sid);
    } else {
        ctx.db.creature().sid().update(creature);
    }
}

// --- Population maintenance ---

/// Bounds check for a creature footprint.
pub fn in_spawn_bounds(x: f32, y: f32, scale: f32) -> bool {
    x >= scale && y >= scale && x <= config::MAP_SIZE - scale && y <= config::MAP_SIZE - scale
}

/// Spacing check against existing creatures given as (x, y, scale) triples.
pub fn clear_of_creatures(x: f32, y: f32, scale: f32, others: &[(f32, f32, f32)]) -> bool {
    others
        .iter()
        .all(|&(ox, oy, os)| get_distance(x, y, ox, oy) >= scale + os)
}

/// Deficit and per-pass retry budget for one plan entry.
pub fn spawn_budget(desired: u32, alive: u32) -> (u32, u32) {
    let deficit = desired.saturating_sub(alive);
    (deficit, deficit * 3)
}

fn spawn_location_clear(ctx: &ReducerContext, x: f32, y: f32, scale: f32) -> bool {
    if !in_spawn_bounds(x, y, scale) {
        return false;
    }
    if !crate::world_object::check_item_location(ctx, x, y, scale, true) {
        return false;
    }
    let others: Vec<(f32, f32, f32)> = ctx
        .db
        .creature()
        .iter()
        .map(|c| {
            let s = species(c.species).map_or(50.0, |d| d.scale);
            (c.pos_x, c.pos_y, s)
        })
        .collect();
    clear_of_creatures(x, y, scale, &others)
}

fn spawn_creature(ctx: &ReducerContext, species_id: u32, x: f32, y: f32) -> Result<(), String> {
    let def = species(species_id).ok_or("Unknown species")?;
    ctx.db
        .creature()
        .try_insert(Creature {
            sid: 0, // auto_inc
            species: species_id,
            pos_x: x,
            pos_y: y,
            dir: 0.0,
            vel_x: 0.0,
            vel_y: 0.0,
            health: def.health,
            state: CreatureState::Idle,
            state_ms_left: config::CREATURE_IDLE_MIN_MS,
            windup_ms_left: None,
            hit_wait_ms: 0,
            target_sid: None,
            was_hit: false,
            last_hit_dir: 0.0,
        })
        .map_err(|e| format!("Failed to insert creature: {}", e))?;
    Ok(())
}

/// Tops each species up to its planned population. Fixed plan positions are
/// used first; the rest spawn at validated random positions. The retry budget
/// is three attempts per missing creature, so a crowded map under-fills
/// rather than looping.
pub fn ensure_creatures(ctx: &ReducerContext) {
    let mut counts = [0u32; 16];
    for creature in ctx.db.creature().iter() {
        if let Some(slot) = counts.get_mut(creature.species as usize) {
            *slot += 1;
        }
    }

    for entry in config::CREATURE_SPAWN_PLAN {
        let Some(def) = species(entry.species as u32) else {
            continue;
        };
        let alive = counts.get(entry.species).copied().unwrap_or(0);
        let (mut deficit, mut budget) = spawn_budget(entry.desired, alive);

        let mut fixed = entry.positions.iter();
        while deficit > 0 && budget > 0 {
            budget -= 1;
            // Fixed plan positions go first but pass the same validation as
            // random ones; a blocked spot falls back to the random path.
            let mut pos = fixed
                .next()
                .map(|&(rx, ry)| (rx * config::MAP_SIZE, ry * config::MAP_SIZE))
                .filter(|&(x, y)| spawn_location_clear(ctx, x, y, def.scale));
            if pos.is_none() {
                for _ in 0..config::CREATURE_SPAWN_ATTEMPTS {
                    let x = ctx.rng().gen_range(def.scale..config::MAP_SIZE - def.scale);
                    let y = ctx.rng().gen_range(def.scale..config::MAP_SIZE - def.scale);
                    if spawn_location_clear(ctx, x, y, def.scale) {
                        pos = Some((x, y));
                        break;
                    }
                }
            }
            let placed = match pos {
                Some((x, y)) => spawn_creature(ctx, entry.species as u32, x, y).is_ok(),
                None => false,
            };
            if placed {
                deficit -= 1;
            }
        }
    }
}

// --- Per-tick stepping ---

fn nearest_living_player(ctx: &ReducerContext, x: f32, y: f32) -> Option<(u32, f32, f32, f32)> {
    let mut best: Option<(u32, f32, f32, f32)> = None;
    let mut best_dist = f32::MAX;
    for player in ctx.db.player().iter() {
        if !player.alive || !player.is_online {
            continue;
        }
        let dist = get_distance(x, y, player.pos_x, player.pos_y);
        if dist < best_dist {
            best_dist = dist;
            best = Some((player.sid, player.pos_x, player.pos_y, dist));
        }
    }
    best
}

pub fn update_creatures(ctx: &ReducerContext, delta_ms: i64) {
    let creatures: Vec<Creature> = ctx.db.creature().iter().collect();
    for mut creature in creatures {
        let Some(def) = species(creature.species) else {
            log::error!("Creature {} has unknown species {}", creature.sid, creature.species);
            continue;
        };

        // Knockback velocity decays like player velocity does.
        creature.pos_x += creature.vel_x * delta_ms as f32;
        creature.pos_y += creature.vel_y * delta_ms as f32;
        creature.vel_x *= config::PLAYER_DECEL.powi(delta_ms as i32 / 10 + 1);
        creature.vel_y *= config::PLAYER_DECEL.powi(delta_ms as i32 / 10 + 1);

        creature.state_ms_left -= delta_ms;
        creature.hit_wait_ms = (creature.hit_wait_ms - delta_ms).max(0);

        // An in-progress windup is a committed lunge; it resolves before any
        // other transition is considered.
        if creature.windup_ms_left.is_some() {
            step_engage(ctx, &mut creature, def, def.speed * delta_ms as f32, delta_ms);
            creature.pos_x = clamp(creature.pos_x, def.scale, config::MAP_SIZE - def.scale);
            creature.pos_y = clamp(creature.pos_y, def.scale, config::MAP_SIZE - def.scale);
            ctx.db.creature().sid().update(creature);
            continue;
        }

        let nearest = nearest_living_player(ctx, creature.pos_x, creature.pos_y);
        let input = TransitionInput {
            state: creature.state,
            timer_expired: creature.state_ms_left <= 0,
            hostile: def.hostile,
            charges: def.charges,
            was_hit: creature.was_hit,
            nearest_player_dist: nearest.map(|(_, _, _, d)| d),
            view_range: def.view_range,
            charge_roll: ctx.rng().gen_range(0.0..1.0),
        };
        let next = plan_transition(&input);

        if next != creature.state {
            creature.state = next;
            creature.state_ms_left = roll_state_duration(ctx, next);
            creature.windup_ms_left = None;
            match next {
                CreatureState::Wander | CreatureState::Charge => {
                    creature.dir = ctx.rng().gen_range(0.0..std::f32::consts::PI * 2.0);
                }
                CreatureState::Flee => {
                    // Run with the hit, away from the attacker.
                    creature.dir = creature.last_hit_dir;
                }
                CreatureState::HostileEngage => {
                    if creature.target_sid.is_none() {
                        creature.target_sid = nearest.map(|(sid, _, _, _)| sid);
                    }
                }
                CreatureState::Idle => {
                    creature.target_sid = None;
                }
            }
        }
        creature.was_hit = false;

        let base_step = def.speed * delta_ms as f32;
        match creature.state {
            CreatureState::Idle => {}
            CreatureState::Wander => {
                creature.pos_x += creature.dir.cos() * base_step;
                creature.pos_y += creature.dir.sin() * base_step;
            }
            CreatureState::Flee => {
                let step = base_step * config::CREATURE_FLEE_SPEED_MULTIPLIER;
                creature.pos_x += creature.dir.cos() * step;
                creature.pos_y += creature.dir.sin() * step;
            }
            CreatureState::Charge => {
                let step = base_step * config::CREATURE_CHARGE_SPEED_MULTIPLIER;
                creature.pos_x += creature.dir.cos() * step;
                creature.pos_y += creature.dir.sin() * step;
            }
            CreatureState::HostileEngage => {
                step_engage(ctx, &mut creature, def, base_step, delta_ms);
            }
        }

        creature.pos_x = clamp(creature.pos_x, def.scale, config::MAP_SIZE - def.scale);
        creature.pos_y = clamp(creature.pos_y, def.scale, config::MAP_SIZE - def.scale);

        if ctx.db.creature().sid().find(creature.sid).is_some() {
            ctx.db.creature().sid().update(creature);
        }
    }
}

/// Pursuit and attack. Approaches the target; reaching hit range starts a
/// committed lunge (state Charge) with a windup, and the hit lands only if
/// the target is still in range when the windup ends.
fn step_engage(
    ctx: &ReducerContext,
    creature: &mut Creature,
    def: &SpeciesDef,
    base_step: f32,
    delta_ms: i64,
) {
    let target = creature
        .target_sid
        .and_then(|sid| ctx.db.player().sid().find(sid))
        .filter(|p| p.alive && p.is_online);
    let Some(target) = target else {
        creature.target_sid = None;
        creature.state = CreatureState::Idle;
        creature.state_ms_left = config::CREATURE_IDLE_MIN_MS;
        creature.windup_ms_left = None;
        return;
    };

    creature.dir = get_direction(target.pos_x, target.pos_y, creature.pos_x, creature.pos_y);
    let dist = get_distance(creature.pos_x, creature.pos_y, target.pos_x, target.pos_y);
    let reach = def.hit_range + def.scale + config::PLAYER_SCALE;

    if let Some(windup) = creature.windup_ms_left {
        // Lunge toward the target while winding up.
        if dist > def.scale + config::PLAYER_SCALE {
            let step = base_step * config::CREATURE_CHARGE_SPEED_MULTIPLIER;
            creature.pos_x += creature.dir.cos() * step;
            creature.pos_y += creature.dir.sin() * step;
        }
        let remaining = windup - delta_ms;
        if remaining > 0 {
            creature.windup_ms_left = Some(remaining);
            return;
        }
        creature.windup_ms_left = None;
        creature.hit_wait_ms = config::CREATURE_POST_HIT_WAIT_MS;
        creature.state = CreatureState::HostileEngage;
        creature.state_ms_left = i64::MAX;
        if dist <= reach {
            combat::apply_hit_to_player(ctx, target.sid, def.damage, creature.dir, 1.0, None);
        }
        return;
    }

    if dist > reach {
        creature.pos_x += creature.dir.cos() * base_step;
        creature.pos_y += creature.dir.sin() * base_step;
    } else if creature.hit_wait_ms <= 0 {
        creature.windup_ms_left = Some(config::CREATURE_HIT_WINDUP_MS);
        creature.state = CreatureState::Charge;
        creature.state_ms_left = config::CREATURE_HIT_WINDUP_MS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(state: CreatureState) -> TransitionInput {
        TransitionInput {
            state,
            timer_expired: false,
            hostile: false,
            charges: false,
            was_hit: false,
            nearest_player_dist: None,
            view_range: 800.0,
            charge_roll: 0.99,
        }
    }

    #[test]
    fn species_catalog_parses() {
        assert_eq!(SPECIES.len(), 8);
        for (i, s) in SPECIES.iter().enumerate() {
            assert_eq!(s.id as usize, i);
        }
        assert!(species(7).unwrap().hostile);
    }

    #[test]
    fn hit_passive_creature_flees() {
        let mut i = input(CreatureState::Wander);
        i.was_hit = true;
        assert_eq!(plan_transition(&i), CreatureState::Flee);
    }

    #[test]
    fn hit_hostile_creature_engages() {
        let mut i = input(CreatureState::Idle);
        i.was_hit = true;
        i.hostile = true;
        assert_eq!(plan_transition(&i), CreatureState::HostileEngage);
    }

    #[test]
    fn hostile_engages_player_in_view() {
        let mut i = input(CreatureState::Wander);
        i.hostile = true;
        i.nearest_player_dist = Some(500.0);
        assert_eq!(plan_transition(&i), CreatureState::HostileEngage);
    }

    #[test]
    fn hostile_ignores_player_out_of_view() {
        let mut i = input(CreatureState::Wander);
        i.hostile = true;
        i.nearest_player_dist = Some(2000.0);
        assert_eq!(plan_transition(&i), CreatureState::Wander);
    }

    #[test]
    fn engage_drops_to_idle_when_view_empties() {
        let mut i = input(CreatureState::HostileEngage);
        i.hostile = true;
        i.nearest_player_dist = None;
        assert_eq!(plan_transition(&i), CreatureState::Idle);
    }

    #[test]
    fn idle_wander_cycle_on_timer() {
        let mut i = input(CreatureState::Idle);
        i.timer_expired = true;
        assert_eq!(plan_transition(&i), CreatureState::Wander);

        let mut i = input(CreatureState::Wander);
        i.timer_expired = true;
        assert_eq!(plan_transition(&i), CreatureState::Idle);
    }

    #[test]
    fn timers_hold_state_until_expiry() {
        assert_eq!(plan_transition(&input(CreatureState::Wander)), CreatureState::Wander);
        assert_eq!(plan_transition(&input(CreatureState::Flee)), CreatureState::Flee);
        assert_eq!(plan_transition(&input(CreatureState::Charge)), CreatureState::Charge);
    }

    #[test]
    fn charging_species_rolls_into_charge() {
        let mut i = input(CreatureState::Idle);
        i.timer_expired = true;
        i.charges = true;
        i.charge_roll = 0.05;
        assert_eq!(plan_transition(&i), CreatureState::Charge);
        i.charge_roll = 0.95;
        assert_eq!(plan_transition(&i), CreatureState::Wander);
    }

    #[test]
    fn flee_expires_to_idle() {
        let mut i = input(CreatureState::Flee);
        i.timer_expired = true;
        assert_eq!(plan_transition(&i), CreatureState::Idle);
    }

    #[test]
    fn spawn_budget_bounds_retries() {
        assert_eq!(spawn_budget(2, 0), (2, 6));
        assert_eq!(spawn_budget(2, 1), (1, 3));
        assert_eq!(spawn_budget(2, 2), (0, 0));
        assert_eq!(spawn_budget(2, 5), (0, 0));
    }

    #[test]
    fn spawn_bounds_respect_footprint() {
        assert!(in_spawn_bounds(500.0, 500.0, 55.0));
        assert!(!in_spawn_bounds(10.0, 500.0, 55.0));
        assert!(!in_spawn_bounds(config::MAP_SIZE - 10.0, 500.0, 55.0));
    }

    #[test]
    fn occupied_fixed_position_fails_validation() {
        // The planned boss spawn point is valid on an empty map but blocked
        // when another creature already sits on it.
        let entry = config::CREATURE_SPAWN_PLAN.last().unwrap();
        let def = species(entry.species as u32).unwrap();
        let (rx, ry) = entry.positions[0];
        let (x, y) = (rx * config::MAP_SIZE, ry * config::MAP_SIZE);
        assert!(in_spawn_bounds(x, y, def.scale));
        assert!(clear_of_creatures(x, y, def.scale, &[]));
        assert!(!clear_of_creatures(x, y, def.scale, &[(x, y, def.scale)]));
    }

    #[test]
    fn population_converges_to_target() {
        // Maintenance passes over an empty map with deterministic candidate
        // positions; the second candidate overlaps the first and is skipped.
        let desired = 2;
        let scale = 55.0;
        let candidates = [(1000.0, 1000.0), (1040.0, 1000.0), (3000.0, 3000.0)];
        let mut creatures: Vec<(f32, f32, f32)> = Vec::new();

        let mut passes = 0;
        while creatures.len() < desired as usize && passes < 5 {
            passes += 1;
            let (mut deficit, mut budget) = spawn_budget(desired, creatures.len() as u32);
            let mut next = candidates.iter().cycle();
            while deficit > 0 && budget > 0 {
                budget -= 1;
                let &(x, y) = next.next().unwrap();
                if in_spawn_bounds(x, y, scale) && clear_of_creatures(x, y, scale, &creatures) {
                    creatures.push((x, y, scale));
                    deficit -= 1;
                }
            }
        }

        assert_eq!(creatures.len(), 2);
        let (x1, y1, s1) = creatures[0];
        let (x2, y2, s2) = creatures[1];
        assert!(in_spawn_bounds(x1, y1, s1));
        assert!(in_spawn_bounds(x2, y2, s2));
        assert!(get_distance(x1, y1, x2, y2) >= s1 + s2);
    }
}
