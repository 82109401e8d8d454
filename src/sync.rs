use spacetimedb::{Identity, ReducerContext, Table, Timestamp};

use crate::config;
use crate::models::EntityKind;
use crate::spatial_grid;
use crate::player as PlayerTableTrait;
use crate::creature::creature as CreatureTableTrait;
use crate::projectile::projectile as ProjectileTableTrait;

// Visibility-gated entity sync. Each entity is announced to a connection at
// most once, the first tick it enters that player's viewport; the announced
// set is consulted again only to route removal notices when the entity
// leaves the world. Entities that merely leave the viewport stay announced.

/// Server-side record that an entity has been announced to a connection.
#[spacetimedb::table(
    name = entity_announcement,
    index(name = idx_announcement_recipient, btree(columns = [recipient])),
    index(name = idx_announcement_entity, btree(columns = [entity_sid]))
)]
#[derive(Clone, Debug)]
pub struct EntityAnnouncement {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub recipient: Identity,
    pub kind: EntityKind,
    pub entity_sid: u64,
}

/// Tells one client to start tracking an entity. Pruned by TTL.
#[spacetimedb::table(name = spawn_notice, public)]
#[derive(Clone, Debug)]
pub struct SpawnNotice {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub recipient: Identity,
    pub kind: EntityKind,
    pub entity_sid: u64,
    pub created_at: Timestamp,
}

/// Tells one client an entity it knew about left the world. Pruned by TTL.
#[spacetimedb::table(name = remove_notice, public)]
#[derive(Clone, Debug)]
pub struct RemoveNotice {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub recipient: Identity,
    pub kind: EntityKind,
    pub entity_sid: u64,
    pub created_at: Timestamp,
}

/// Muzzle flash event for clients that have the turret announced.
#[spacetimedb::table(name = turret_shot_notice, public)]
#[derive(Clone, Debug)]
pub struct TurretShotNotice {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub recipient: Identity,
    pub object_sid: u32,
    pub dir: f32,
    pub created_at: Timestamp,
}

#[spacetimedb::table(name = kill_notice, public)]
#[derive(Clone, Debug)]
pub struct KillNotice {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub recipient: Identity,
    pub victim_sid: u32,
    pub victim_name: String,
    pub created_at: Timestamp,
}

/// Broadcast map ping. Every connected client renders it.
#[spacetimedb::table(name = map_ping_notice, public)]
#[derive(Clone, Debug)]
pub struct MapPingNotice {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub created_at: Timestamp,
}

/// Top scores, rewritten every tick. Rank is 1-based.
#[spacetimedb::table(name = leaderboard_entry, public)]
#[derive(Clone, Debug)]
pub struct LeaderboardEntry {
    #[primary_key]
    pub rank: u32,
    pub player_sid: u32,
    pub username: String,
    pub score: u32,
}

/// Ally positions for the minimap, refreshed on its own cadence.
#[spacetimedb::table(name = minimap_blip, public)]
#[derive(Clone, Debug)]
pub struct MinimapBlip {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub recipient: Identity,
    pub player_sid: u32,
    pub x: f32,
    pub y: f32,
}

// --- Visibility ---

/// Whether an entity at (ex, ey) falls inside the padded viewport centered on
/// (px, py). The viewport is the maximum client screen inflated by the view
/// buffer, then by the entity's own footprint.
pub fn can_see(px: f32, py: f32, ex: f32, ey: f32, scale: f32) -> bool {
    let half_w = config::MAX_SCREEN_WIDTH / 2.0 * config::VIEW_BUFFER_RATIO + scale;
    let half_h = config::MAX_SCREEN_HEIGHT / 2.0 * config::VIEW_BUFFER_RATIO + scale;
    (ex - px).abs() <= half_w && (ey - py).abs() <= half_h
}

/// Whether an (entity, connection) pair gets a spawn announcement this tick.
/// An already-announced entity never re-announces, even after leaving and
/// re-entering the viewport; only removal resets the pair.
pub fn needs_announcement(already_announced: bool, visible: bool) -> bool {
    visible && !already_announced
}

fn is_announced(ctx: &ReducerContext, recipient: Identity, kind: EntityKind, sid: u64) -> bool {
    ctx.db
        .entity_announcement()
        .idx_announcement_entity()
        .filter(sid)
        .any(|a| a.kind == kind && a.recipient == recipient)
}

fn announce(ctx: &ReducerContext, recipient: Identity, kind: EntityKind, sid: u64) {
    ctx.db.entity_announcement().insert(EntityAnnouncement {
        id: 0, // auto_inc
        recipient,
        kind,
        entity_sid: sid,
    });
    ctx.db.spawn_notice().insert(SpawnNotice {
        id: 0, // auto_inc
        recipient,
        kind,
        entity_sid: sid,
        created_at: ctx.timestamp,
    });
}

/// Announces every entity newly visible to each connected player. World
/// objects come from a grid region query over the viewport; the mobile
/// populations are small enough to scan directly.
pub fn run_announcements(ctx: &ReducerContext) {
    let viewers: Vec<(Identity, f32, f32)> = ctx
        .db
        .player()
        .iter()
        .filter(|p| p.is_online && p.alive)
        .map(|p| (p.identity, p.pos_x, p.pos_y))
        .collect();

    for (recipient, px, py) in viewers {
        let half_w = config::MAX_SCREEN_WIDTH / 2.0 * config::VIEW_BUFFER_RATIO;
        let half_h = config::MAX_SCREEN_HEIGHT / 2.0 * config::VIEW_BUFFER_RATIO;
        let objects = spatial_grid::with_world_grid(ctx, |grid| {
            grid.query_region(px - half_w, py - half_h, px + half_w, py + half_h)
        });
        for entry in objects {
            let sid = entry.sid as u64;
            // The grid query already bounds visibility for objects.
            if needs_announcement(is_announced(ctx, recipient, EntityKind::WorldObject, sid), true) {
                announce(ctx, recipient, EntityKind::WorldObject, sid);
            }
        }

        for other in ctx.db.player().iter() {
            if !other.is_online || !other.alive {
                continue;
            }
            let visible = can_see(px, py, other.pos_x, other.pos_y, config::PLAYER_SCALE);
            let sid = other.sid as u64;
            if needs_announcement(is_announced(ctx, recipient, EntityKind::Player, sid), visible) {
                announce(ctx, recipient, EntityKind::Player, sid);
            }
        }

        for creature in ctx.db.creature().iter() {
            let scale = crate::creature::species(creature.species).map_or(50.0, |s| s.scale);
            let visible = can_see(px, py, creature.pos_x, creature.pos_y, scale);
            let sid = creature.sid;
            if needs_announcement(is_announced(ctx, recipient, EntityKind::Creature, sid), visible) {
                announce(ctx, recipient, EntityKind::Creature, sid);
            }
        }

        for proj in ctx.db.projectile().iter() {
            let visible = can_see(px, py, proj.pos_x, proj.pos_y, proj.scale);
            let sid = proj.sid;
            if needs_announcement(is_announced(ctx, recipient, EntityKind::Projectile, sid), visible) {
                announce(ctx, recipient, EntityKind::Projectile, sid);
            }
        }
    }
}

// --- Removal routing ---

/// Routes a removal notice to every connection that had the entity announced
/// and discards the announcements. This is the only path that shrinks the
/// announced set for a live connection.
pub fn queue_entity_removal(ctx: &ReducerContext, kind: EntityKind, entity_sid: u64) {
    let announcements: Vec<EntityAnnouncement> = ctx
        .db
        .entity_announcement()
        .idx_announcement_entity()
        .filter(entity_sid)
        .filter(|a| a.kind == kind)
        .collect();
    for a in announcements {
        ctx.db.remove_notice().insert(RemoveNotice {
            id: 0, // auto_inc
            recipient: a.recipient,
            kind,
            entity_sid,
            created_at: ctx.timestamp,
        });
        ctx.db.entity_announcement().id().delete(a.id);
    }
}

pub fn queue_turret_shot(ctx: &ReducerContext, object_sid: u32, dir: f32) {
    let recipients: Vec<Identity> = ctx
        .db
        .entity_announcement()
        .idx_announcement_entity()
        .filter(object_sid as u64)
        .filter(|a| a.kind == EntityKind::WorldObject)
        .map(|a| a.recipient)
        .collect();
    for recipient in recipients {
        ctx.db.turret_shot_notice().insert(TurretShotNotice {
            id: 0, // auto_inc
            recipient,
            object_sid,
            dir,
            created_at: ctx.timestamp,
        });
    }
}

pub fn queue_kill_notice(
    ctx: &ReducerContext,
    recipient: Identity,
    victim_sid: u32,
    victim_name: &str,
) {
    ctx.db.kill_notice().insert(KillNotice {
        id: 0, // auto_inc
        recipient,
        victim_sid,
        victim_name: victim_name.to_string(),
        created_at: ctx.timestamp,
    });
}

/// Drops all per-connection sync state when a client goes away.
pub fn cleanup_connection(ctx: &ReducerContext, identity: Identity) {
    let ids: Vec<u64> = ctx
        .db
        .entity_announcement()
        .idx_announcement_recipient()
        .filter(identity)
        .map(|a| a.id)
        .collect();
    for id in ids {
        ctx.db.entity_announcement().id().delete(id);
    }
    let blips: Vec<u64> = ctx
        .db
        .minimap_blip()
        .iter()
        .filter(|b| b.recipient == identity)
        .map(|b| b.id)
        .collect();
    for id in blips {
        ctx.db.minimap_blip().id().delete(id);
    }
}

// --- Cadenced outputs ---

/// Rewrites the per-ally minimap blips. Allies see each other; players
/// without an alliance get no blips.
pub fn run_minimap(ctx: &ReducerContext) {
    let ids: Vec<u64> = ctx.db.minimap_blip().iter().map(|b| b.id).collect();
    for id in ids {
        ctx.db.minimap_blip().id().delete(id);
    }

    let members: Vec<(Identity, u32, f32, f32, u64)> = ctx
        .db
        .player()
        .iter()
        .filter(|p| p.is_online && p.alive)
        .filter_map(|p| p.alliance_id.map(|a| (p.identity, p.sid, p.pos_x, p.pos_y, a)))
        .collect();

    for (recipient, sid, _, _, alliance) in &members {
        for (_, other_sid, ox, oy, other_alliance) in &members {
            if other_sid == sid || other_alliance != alliance {
                continue;
            }
            ctx.db.minimap_blip().insert(MinimapBlip {
                id: 0, // auto_inc
                recipient: *recipient,
                player_sid: *other_sid,
                x: *ox,
                y: *oy,
            });
        }
    }
}

/// Top scores by points, ties broken by lower sid (earlier joiner first).
pub fn run_leaderboard(ctx: &ReducerContext) {
    let mut scores: Vec<(u32, String, u32)> = ctx
        .db
        .player()
        .iter()
        .filter(|p| p.is_online && p.alive)
        .map(|p| (p.sid, p.username.clone(), p.points))
        .collect();
    scores.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
    scores.truncate(config::LEADERBOARD_MAX_ENTRIES);

    let old: Vec<u32> = ctx.db.leaderboard_entry().iter().map(|e| e.rank).collect();
    for rank in old {
        ctx.db.leaderboard_entry().rank().delete(rank);
    }
    for (i, (sid, username, score)) in scores.into_iter().enumerate() {
        ctx.db.leaderboard_entry().insert(LeaderboardEntry {
            rank: i as u32 + 1,
            player_sid: sid,
            username,
            score,
        });
    }
}

// --- Notice TTL cleanup ---

fn expired(created_at: Timestamp, now: Timestamp) -> bool {
    let age_micros = now.to_micros_since_unix_epoch() - created_at.to_micros_since_unix_epoch();
    age_micros / 1000 > config::NOTICE_TTL_MS
}

/// Deletes delivered notices past their TTL. Clients consume notices within
/// a tick or two; the TTL only bounds table growth for idle subscribers.
pub fn prune_notices(ctx: &ReducerContext) {
    let now = ctx.timestamp;
    let spawn: Vec<u64> = ctx
        .db
        .spawn_notice()
        .iter()
        .filter(|n| expired(n.created_at, now))
        .map(|n| n.id)
        .collect();
    for id in spawn {
        ctx.db.spawn_notice().id().delete(id);
    }
    let removes: Vec<u64> = ctx
        .db
        .remove_notice()
        .iter()
        .filter(|n| expired(n.created_at, now))
        .map(|n| n.id)
        .collect();
    for id in removes {
        ctx.db.remove_notice().id().delete(id);
    }
    let shots: Vec<u64> = ctx
        .db
        .turret_shot_notice()
        .iter()
        .filter(|n| expired(n.created_at, now))
        .map(|n| n.id)
        .collect();
    for id in shots {
        ctx.db.turret_shot_notice().id().delete(id);
    }
    let kills: Vec<u64> = ctx
        .db
        .kill_notice()
        .iter()
        .filter(|n| expired(n.created_at, now))
        .map(|n| n.id)
        .collect();
    for id in kills {
        ctx.db.kill_notice().id().delete(id);
    }
    let pings: Vec<u64> = ctx
        .db
        .map_ping_notice()
        .iter()
        .filter(|n| expired(n.created_at, now))
        .map(|n| n.id)
        .collect();
    for id in pings {
        ctx.db.map_ping_notice().id().delete(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_see_respects_buffered_viewport() {
        let half_w = config::MAX_SCREEN_WIDTH / 2.0 * config::VIEW_BUFFER_RATIO;
        // Just inside and just outside on the x axis, zero-scale entity.
        assert!(can_see(0.0, 0.0, half_w - 1.0, 0.0, 0.0));
        assert!(!can_see(0.0, 0.0, half_w + 1.0, 0.0, 0.0));
    }

    #[test]
    fn entity_scale_extends_visibility() {
        let half_w = config::MAX_SCREEN_WIDTH / 2.0 * config::VIEW_BUFFER_RATIO;
        assert!(!can_see(0.0, 0.0, half_w + 50.0, 0.0, 0.0));
        assert!(can_see(0.0, 0.0, half_w + 50.0, 0.0, 100.0));
    }

    #[test]
    fn can_see_checks_both_axes() {
        let half_h = config::MAX_SCREEN_HEIGHT / 2.0 * config::VIEW_BUFFER_RATIO;
        assert!(!can_see(0.0, 0.0, 0.0, half_h + 1.0, 0.0));
        assert!(can_see(0.0, 0.0, 0.0, half_h - 1.0, 0.0));
    }

    #[test]
    fn entity_announced_at_most_once_until_removed() {
        use std::collections::HashSet;

        let mut announced: HashSet<u64> = HashSet::new();
        let mut spawn_messages = 0;
        // Entity 7 stays continuously visible across several ticks.
        for _ in 0..5 {
            if needs_announcement(announced.contains(&7), true) {
                announced.insert(7);
                spawn_messages += 1;
            }
        }
        assert_eq!(spawn_messages, 1);

        // Scrolling out of view does not reset the pair.
        assert!(!needs_announcement(announced.contains(&7), false));
        assert!(!needs_announcement(announced.contains(&7), true));

        // Removal clears the pair; coming back into view re-announces.
        announced.remove(&7);
        assert!(needs_announcement(announced.contains(&7), true));
        // Never announced and out of view stays silent.
        assert!(!needs_announcement(announced.contains(&9), false));
    }
}
