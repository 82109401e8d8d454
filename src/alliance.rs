use spacetimedb::{ReducerContext, Table, Timestamp};

use crate::player as PlayerTableTrait;

// Alliances (tribes). Membership lives on the player row; these tables hold
// the alliance itself and pending join requests. Owners approve requests and
// may kick members; the alliance disbands when its owner leaves.

const MAX_ALLIANCE_NAME: usize = 20;
const MAX_MEMBERS: usize = 6;

#[spacetimedb::table(name = alliance, public)]
#[derive(Clone, Debug)]
pub struct Alliance {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[unique]
    pub name: String,
    pub owner_sid: u32,
    pub created_at: Timestamp,
}

#[spacetimedb::table(
    name = alliance_join_request,
    public,
    index(name = idx_join_request_alliance, btree(columns = [alliance_id]))
)]
#[derive(Clone, Debug)]
pub struct AllianceJoinRequest {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub alliance_id: u64,
    pub player_sid: u32,
    pub username: String,
    pub created_at: Timestamp,
}

fn member_count(ctx: &ReducerContext, alliance_id: u64) -> usize {
    ctx.db
        .player()
        .iter()
        .filter(|p| p.alliance_id == Some(alliance_id))
        .count()
}

fn clear_requests_for_player(ctx: &ReducerContext, player_sid: u32) {
    let ids: Vec<u64> = ctx
        .db
        .alliance_join_request()
        .iter()
        .filter(|r| r.player_sid == player_sid)
        .map(|r| r.id)
        .collect();
    for id in ids {
        ctx.db.alliance_join_request().id().delete(id);
    }
}

fn disband(ctx: &ReducerContext, alliance_id: u64) {
    let members: Vec<_> = ctx
        .db
        .player()
        .iter()
        .filter(|p| p.alliance_id == Some(alliance_id))
        .collect();
    for mut member in members {
        member.alliance_id = None;
        ctx.db.player().identity().update(member);
    }
    let requests: Vec<u64> = ctx
        .db
        .alliance_join_request()
        .idx_join_request_alliance()
        .filter(alliance_id)
        .map(|r| r.id)
        .collect();
    for id in requests {
        ctx.db.alliance_join_request().id().delete(id);
    }
    ctx.db.alliance().id().delete(alliance_id);
}

#[spacetimedb::reducer]
pub fn create_alliance(ctx: &ReducerContext, name: String) -> Result<(), String> {
    let player = ctx
        .db
        .player()
        .identity()
        .find(ctx.sender)
        .ok_or("Player not found")?;
    if !player.alive {
        return Err("Dead players cannot create alliances".to_string());
    }
    if player.alliance_id.is_some() {
        return Err("Already in an alliance".to_string());
    }
    let name = name.trim().to_string();
    if name.is_empty() || name.len() > MAX_ALLIANCE_NAME {
        return Err("Invalid alliance name".to_string());
    }
    if ctx.db.alliance().name().find(&name).is_some() {
        return Err("Alliance name taken".to_string());
    }

    let inserted = ctx
        .db
        .alliance()
        .try_insert(Alliance {
            id: 0, // auto_inc
            name,
            owner_sid: player.sid,
            created_at: ctx.timestamp,
        })
        .map_err(|e| format!("Failed to create alliance: {}", e))?;

    let mut player = player;
    player.alliance_id = Some(inserted.id);
    ctx.db.player().identity().update(player);
    clear_requests_for_player(ctx, inserted.owner_sid);
    log::info!("Alliance '{}' created", inserted.name);
    Ok(())
}

#[spacetimedb::reducer]
pub fn request_join_alliance(ctx: &ReducerContext, alliance_id: u64) -> Result<(), String> {
    let player = ctx
        .db
        .player()
        .identity()
        .find(ctx.sender)
        .ok_or("Player not found")?;
    if player.alliance_id.is_some() {
        return Err("Already in an alliance".to_string());
    }
    if ctx.db.alliance().id().find(alliance_id).is_none() {
        return Err("Alliance not found".to_string());
    }
    let duplicate = ctx
        .db
        .alliance_join_request()
        .idx_join_request_alliance()
        .filter(alliance_id)
        .any(|r| r.player_sid == player.sid);
    if duplicate {
        return Err("Request already pending".to_string());
    }
    ctx.db.alliance_join_request().insert(AllianceJoinRequest {
        id: 0, // auto_inc
        alliance_id,
        player_sid: player.sid,
        username: player.username.clone(),
        created_at: ctx.timestamp,
    });
    Ok(())
}

#[spacetimedb::reducer]
pub fn respond_join_request(ctx: &ReducerContext, request_id: u64, accept: bool) -> Result<(), String> {
    let responder = ctx
        .db
        .player()
        .identity()
        .find(ctx.sender)
        .ok_or("Player not found")?;
    let request = ctx
        .db
        .alliance_join_request()
        .id()
        .find(request_id)
        .ok_or("Request not found")?;
    let alliance = ctx
        .db
        .alliance()
        .id()
        .find(request.alliance_id)
        .ok_or("Alliance not found")?;
    if alliance.owner_sid != responder.sid {
        return Err("Only the owner can respond to requests".to_string());
    }

    ctx.db.alliance_join_request().id().delete(request_id);
    if !accept {
        return Ok(());
    }
    if member_count(ctx, alliance.id) >= MAX_MEMBERS {
        return Err("Alliance is full".to_string());
    }
    let mut joiner = ctx
        .db
        .player()
        .sid()
        .find(request.player_sid)
        .ok_or("Requesting player left")?;
    if joiner.alliance_id.is_some() {
        return Err("Player already joined another alliance".to_string());
    }
    joiner.alliance_id = Some(alliance.id);
    ctx.db.player().identity().update(joiner);
    clear_requests_for_player(ctx, request.player_sid);
    Ok(())
}

#[spacetimedb::reducer]
pub fn leave_alliance(ctx: &ReducerContext) -> Result<(), String> {
    let player = ctx
        .db
        .player()
        .identity()
        .find(ctx.sender)
        .ok_or("Player not found")?;
    let alliance_id = player.alliance_id.ok_or("Not in an alliance")?;
    let alliance = ctx
        .db
        .alliance()
        .id()
        .find(alliance_id)
        .ok_or("Alliance not found")?;

    if alliance.owner_sid == player.sid {
        log::info!("Alliance '{}' disbanded by its owner", alliance.name);
        disband(ctx, alliance_id);
    } else {
        let mut player = player;
        player.alliance_id = None;
        ctx.db.player().identity().update(player);
    }
    Ok(())
}

#[spacetimedb::reducer]
pub fn kick_alliance_member(ctx: &ReducerContext, member_sid: u32) -> Result<(), String> {
    let owner = ctx
        .db
        .player()
        .identity()
        .find(ctx.sender)
        .ok_or("Player not found")?;
    let alliance_id = owner.alliance_id.ok_or("Not in an alliance")?;
    let alliance = ctx
        .db
        .alliance()
        .id()
        .find(alliance_id)
        .ok_or("Alliance not found")?;
    if alliance.owner_sid != owner.sid {
        return Err("Only the owner can kick members".to_string());
    }
    if member_sid == owner.sid {
        return Err("Owners leave via leave_alliance".to_string());
    }
    let mut member = ctx
        .db
        .player()
        .sid()
        .find(member_sid)
        .ok_or("Member not found")?;
    if member.alliance_id != Some(alliance_id) {
        return Err("Player is not in this alliance".to_string());
    }
    member.alliance_id = None;
    ctx.db.player().identity().update(member);
    Ok(())
}

/// Drops a departing player's membership and pending requests; disbands
/// their alliance if they owned it.
pub fn handle_player_departure(ctx: &ReducerContext, player_sid: u32, alliance_id: Option<u64>) {
    clear_requests_for_player(ctx, player_sid);
    let Some(alliance_id) = alliance_id else {
        return;
    };
    let Some(alliance) = ctx.db.alliance().id().find(alliance_id) else {
        return;
    };
    if alliance.owner_sid == player_sid {
        log::info!("Alliance '{}' disbanded, owner left", alliance.name);
        disband(ctx, alliance_id);
    }
}
