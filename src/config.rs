// Central gameplay tuning values. Grouped the way the balance sheet groups
// them so diffs against the design doc stay readable.

// --- World ---
pub const MAP_SIZE: f32 = 14400.0;
pub const RIVER_WIDTH: f32 = 724.0;
/// Snow covers the top band of the map, desert the bottom band.
pub const SNOW_BIOME_TOP: f32 = 2400.0;
pub const DESERT_BIOME_BOTTOM: f32 = MAP_SIZE - 2400.0;
pub const AREA_COUNT: u32 = 7;
pub const TREES_PER_AREA: u32 = 30;
pub const BUSHES_PER_AREA: u32 = 12;
pub const TOTAL_ROCKS: u32 = 120;
pub const TOTAL_GOLD_ORES: u32 = 7;
pub const TREE_SCALES: &[f32] = &[150.0, 160.0, 165.0, 175.0];
pub const BUSH_SCALES: &[f32] = &[80.0, 85.0, 95.0];
pub const ROCK_SCALES: &[f32] = &[80.0, 85.0, 90.0];

// --- Server loop ---
pub const SERVER_TICK_RATE: u64 = 9;
pub const TICK_INTERVAL_MS: u64 = 1000 / SERVER_TICK_RATE;
/// A tick that takes longer than this many intervals of wall clock gets a
/// warning logged (the host scheduler will queue ticks rather than drop them).
pub const TICK_OVERRUN_FACTOR: f32 = 2.0;
pub const MINIMAP_RATE_MS: u64 = 3000;
pub const LEADERBOARD_MAX_ENTRIES: usize = 10;
pub const NOTICE_TTL_MS: i64 = 10_000;
pub const NOTICE_CLEANUP_INTERVAL_MS: u64 = 10_000;

// --- Spatial index ---
pub const GRID_CELL_SIZE: f32 = 360.0;

// --- Players ---
pub const PLAYER_SCALE: f32 = 35.0;
pub const PLAYER_BASE_HEALTH: f32 = 100.0;
pub const PLAYER_BASE_SPEED: f32 = 0.0016;
pub const PLAYER_DECEL: f32 = 0.993;
pub const VELOCITY_STOP_THRESHOLD: f32 = 0.01;
pub const SNOW_SPEED_MULTIPLIER: f32 = 0.75;
pub const RIVER_SPEED_MULTIPLIER: f32 = 0.33;
pub const MAX_NAME_LENGTH: usize = 15;
pub const STARTING_RESOURCES: u32 = 100;
pub const MAP_PING_COOLDOWN_MS: i64 = 2200;
pub const CHAT_COOLDOWN_MS: i64 = 500;
pub const MAX_CHAT_LENGTH: usize = 60;

// --- Viewport / sync ---
pub const MAX_SCREEN_WIDTH: f32 = 1920.0;
pub const MAX_SCREEN_HEIGHT: f32 = 1080.0;
/// Visibility is tested against a slightly inflated half-viewport so entities
/// do not pop in at the exact screen edge.
pub const VIEW_BUFFER_RATIO: f32 = 1.3;

// --- Combat ---
pub const BASE_KNOCKBACK: f32 = 0.3;
pub const SPIKE_KNOCKBACK: f32 = 1.5;
pub const SHIELD_ANGLE: f32 = std::f32::consts::PI / 3.0;
pub const HIT_ANGLE: f32 = std::f32::consts::PI / 2.0;
pub const KILL_SCORE_MULTIPLIER: u32 = 100;
/// Melee damage against structures is amplified so demolition stays viable
/// against high wall health.
pub const OBJECT_DAMAGE_MULTIPLIER: f32 = 5.0;
/// Resource units gained per successful gather swing.
pub const GATHER_AMOUNT: u32 = 1;
/// Points per swing on a gold ore.
pub const GOLD_POINTS: u32 = 5;

// --- Structures ---
pub const TURRET_TARGET_RANGE: f32 = 735.0;
pub const TURRET_FIRE_RATE_MS: i64 = 2500;
/// Retry delay when a turret is loaded but finds no target.
pub const TURRET_IDLE_RETRY_MS: i64 = 250;
pub const TURRET_MUZZLE_OFFSET: f32 = 45.0;
pub const MILL_INCOME_INTERVAL_MS: i64 = 2500;
pub const MILL_POINTS_PER_TICK: u32 = 1;

// --- Creatures ---
pub const CREATURE_SPAWN_CHECK_INTERVAL_MS: i64 = 1000;
pub const CREATURE_WANDER_MIN_MS: i64 = 1000;
pub const CREATURE_WANDER_MAX_MS: i64 = 2000;
pub const CREATURE_IDLE_MIN_MS: i64 = 1500;
pub const CREATURE_IDLE_MAX_MS: i64 = 6000;
pub const CREATURE_FLEE_DURATION_MS: i64 = 2000;
pub const CREATURE_FLEE_SPEED_MULTIPLIER: f32 = 1.42;
pub const CREATURE_CHARGE_SPEED_MULTIPLIER: f32 = 1.75;
pub const CREATURE_CHARGE_MIN_MS: i64 = 8000;
pub const CREATURE_CHARGE_MAX_MS: i64 = 12000;
pub const CREATURE_HIT_WINDUP_MS: i64 = 600;
pub const CREATURE_POST_HIT_WAIT_MS: i64 = 500;
/// Random-position retry budget when placing one creature.
pub const CREATURE_SPAWN_ATTEMPTS: u32 = 40;
/// Allowed overlap ratio against existing world objects for any placement.
pub const PLACEMENT_OVERLAP_RATIO: f32 = 0.6;

/// Desired creature population per species. Fixed positions are expressed as
/// map ratios so the plan survives map-size changes; `None` means spawn at
/// validated random positions.
pub struct SpawnPlanEntry {
    pub species: usize,
    pub desired: u32,
    pub positions: &'static [(f32, f32)],
}

pub const CREATURE_SPAWN_PLAN: &[SpawnPlanEntry] = &[
    SpawnPlanEntry { species: 0, desired: 2, positions: &[] }, // Cow
    SpawnPlanEntry { species: 1, desired: 2, positions: &[] }, // Pig
    SpawnPlanEntry { species: 4, desired: 3, positions: &[] }, // Wolf
    SpawnPlanEntry { species: 5, desired: 1, positions: &[] }, // Duck
    SpawnPlanEntry { species: 6, desired: 2, positions: &[] }, // Sheep
    SpawnPlanEntry { species: 2, desired: 1, positions: &[] }, // Bull
    SpawnPlanEntry { species: 3, desired: 1, positions: &[] }, // Bully
    SpawnPlanEntry { species: 7, desired: 1, positions: &[(0.42, 0.72)] }, // Moostafa
];
