use std::time::Duration;

use spacetimedb::{ReducerContext, ScheduleAt, Table, TimeDuration};

use crate::config;
use crate::sync;
use crate::world_state::{self, world_state as WorldStateTableTrait};

// The main simulation loop. One scheduled reducer advances every subsystem
// in a fixed order so cross-system effects resolve deterministically within
// a tick: players move before projectiles fly, projectiles resolve before
// creatures react, structures act on the settled world, and sync runs last
// over the finished tick.

#[spacetimedb::table(name = game_tick_schedule, scheduled(process_game_tick))]
#[derive(Clone)]
pub struct GameTickSchedule {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub scheduled_at: ScheduleAt,
}

#[spacetimedb::table(name = notice_cleanup_schedule, scheduled(cleanup_notices))]
#[derive(Clone)]
pub struct NoticeCleanupSchedule {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub scheduled_at: ScheduleAt,
}

pub fn init_game_tick_schedule(ctx: &ReducerContext) -> Result<(), String> {
    let schedule_table = ctx.db.game_tick_schedule();
    if schedule_table.iter().count() == 0 {
        log::info!(
            "Starting game tick schedule ({} ticks/s).",
            config::SERVER_TICK_RATE
        );
        let interval = Duration::from_millis(config::TICK_INTERVAL_MS);
        crate::try_insert_schedule!(
            schedule_table,
            GameTickSchedule {
                id: 0,
                scheduled_at: ScheduleAt::Interval(TimeDuration::from(interval)),
            },
            "Game tick"
        );
    } else {
        log::debug!("Game tick schedule already exists.");
    }
    Ok(())
}

pub fn init_notice_cleanup_schedule(ctx: &ReducerContext) -> Result<(), String> {
    let schedule_table = ctx.db.notice_cleanup_schedule();
    if schedule_table.iter().count() == 0 {
        let interval = Duration::from_millis(config::NOTICE_CLEANUP_INTERVAL_MS);
        crate::try_insert_schedule!(
            schedule_table,
            NoticeCleanupSchedule {
                id: 0,
                scheduled_at: ScheduleAt::Interval(TimeDuration::from(interval)),
            },
            "Notice cleanup"
        );
    } else {
        log::debug!("Notice cleanup schedule already exists.");
    }
    Ok(())
}

#[spacetimedb::reducer]
pub fn process_game_tick(ctx: &ReducerContext, _args: GameTickSchedule) -> Result<(), String> {
    if ctx.sender != ctx.identity() {
        log::warn!("[GameTick] Unauthorized invocation by {:?}. Ignoring.", ctx.sender);
        return Err("Unauthorized scheduler invocation".to_string());
    }

    let mut state = world_state::get_world_state(ctx)?;
    let now = ctx.timestamp;
    let delta_ms = ((now.to_micros_since_unix_epoch()
        - state.last_tick_at.to_micros_since_unix_epoch())
        / 1000)
        .max(1);

    let overrun_ms = (config::TICK_INTERVAL_MS as f32 * config::TICK_OVERRUN_FACTOR) as i64;
    if state.tick_number > 0 && delta_ms > overrun_ms {
        log::warn!(
            "Tick {} ran late: {}ms elapsed (budget {}ms)",
            state.tick_number,
            delta_ms,
            config::TICK_INTERVAL_MS
        );
    }

    crate::player_movement::update_players(ctx, delta_ms);
    crate::projectile::update_projectiles(ctx, delta_ms);

    state.population_elapsed_ms += delta_ms;
    if state.population_elapsed_ms >= config::CREATURE_SPAWN_CHECK_INTERVAL_MS {
        state.population_elapsed_ms = 0;
        crate::creature::ensure_creatures(ctx);
    }
    crate::creature::update_creatures(ctx, delta_ms);

    crate::world_object::update_structures(ctx, delta_ms);

    sync::run_leaderboard(ctx);

    state.minimap_elapsed_ms += delta_ms;
    if state.minimap_elapsed_ms >= config::MINIMAP_RATE_MS as i64 {
        state.minimap_elapsed_ms = 0;
        sync::run_minimap(ctx);
    }
    sync::run_announcements(ctx);

    state.tick_number += 1;
    state.last_tick_at = now;
    ctx.db.world_state().id().update(state);
    Ok(())
}

#[spacetimedb::reducer]
pub fn cleanup_notices(ctx: &ReducerContext, _args: NoticeCleanupSchedule) -> Result<(), String> {
    if ctx.sender != ctx.identity() {
        log::warn!("[NoticeCleanup] Unauthorized invocation by {:?}. Ignoring.", ctx.sender);
        return Err("Unauthorized scheduler invocation".to_string());
    }
    sync::prune_notices(ctx);
    Ok(())
}
