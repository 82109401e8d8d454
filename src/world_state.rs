use spacetimedb::{ReducerContext, Table, Timestamp};

use crate::config;

/// Singleton world bookkeeping row (always id 0): tick counter, tick timing,
/// and the elapsed accumulators for the slower cadences.
#[spacetimedb::table(name = world_state, public)]
#[derive(Clone, Debug)]
pub struct WorldState {
    #[primary_key]
    pub id: u8,
    pub tick_number: u64,
    pub last_tick_at: Timestamp,
    pub minimap_elapsed_ms: i64,
    pub population_elapsed_ms: i64,
}

pub fn seed_world_state(ctx: &ReducerContext) -> Result<(), String> {
    if ctx.db.world_state().id().find(0).is_some() {
        log::debug!("World state already seeded, skipping");
        return Ok(());
    }
    ctx.db
        .world_state()
        .try_insert(WorldState {
            id: 0,
            tick_number: 0,
            last_tick_at: ctx.timestamp,
            minimap_elapsed_ms: 0,
            // Start at the threshold so the first tick fills the world.
            population_elapsed_ms: config::CREATURE_SPAWN_CHECK_INTERVAL_MS,
        })
        .map_err(|e| format!("Failed to seed world state: {}", e))?;
    Ok(())
}

pub fn get_world_state(ctx: &ReducerContext) -> Result<WorldState, String> {
    ctx.db
        .world_state()
        .id()
        .find(0)
        .ok_or_else(|| "World state row missing".to_string())
}
