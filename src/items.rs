use lazy_static::lazy_static;

use crate::models::Behavior;
use crate::config;

// --- Item / weapon catalogs ---
// Static data the way the balance sheet defines it. IDs are stable and used
// on the wire, so entries are never reordered, only appended.

#[derive(Clone, Debug)]
pub struct WeaponDef {
    pub id: u32,
    pub name: &'static str,
    /// Melee reach in world units (projectile weapons use the projectile range).
    pub range: f32,
    pub damage: f32,
    /// Minimum delay between swings.
    pub swing_ms: i64,
    /// A raised shield negates frontal projectile/melee damage (see combat).
    pub shield: bool,
    /// Projectile catalog index fired instead of swinging, if any.
    pub projectile: Option<u32>,
    pub knockback: f32,
}

#[derive(Clone, Debug)]
pub struct ProjectileDef {
    pub id: u32,
    pub name: &'static str,
    /// World units per millisecond.
    pub speed: f32,
    pub damage: f32,
    /// Collision query radius around the projectile path.
    pub scale: f32,
    pub range: f32,
    /// Collides with world objects whose layer is >= this value.
    pub layer: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ItemClass {
    /// Consumed on use, restores health.
    Food { heal: f32 },
    /// Placed into the world as a structure.
    Placeable,
}

#[derive(Clone, Debug)]
pub struct ItemDef {
    pub id: u32,
    pub name: &'static str,
    pub class: ItemClass,
    pub scale: f32,
    /// Extra placement distance beyond the combined player/item radii.
    pub place_offset: f32,
    pub health: Option<f32>,
    /// [wood, food, stone] cost.
    pub cost: [u32; 3],
    /// Maximum simultaneously placed per player; 0 = not placeable.
    pub limit: u32,
    /// Contact damage dealt to players touching it (spikes).
    pub touch_damage: f32,
    /// Whether projectiles can damage it.
    pub projectile_vulnerable: bool,
    pub layer: u8,
    pub behavior: Behavior,
}

lazy_static! {
    pub static ref WEAPONS: Vec<WeaponDef> = vec![
        WeaponDef { id: 0, name: "Hammer", range: 65.0, damage: 25.0, swing_ms: 400, shield: false, projectile: None, knockback: 1.0 },
        WeaponDef { id: 1, name: "Sword", range: 85.0, damage: 35.0, swing_ms: 450, shield: false, projectile: None, knockback: 1.0 },
        WeaponDef { id: 2, name: "Shield", range: 45.0, damage: 0.0, swing_ms: 600, shield: true, projectile: None, knockback: 0.4 },
        WeaponDef { id: 3, name: "Bow", range: 120.0, damage: 5.0, swing_ms: 600, shield: false, projectile: Some(0), knockback: 0.2 },
    ];

    pub static ref PROJECTILES: Vec<ProjectileDef> = vec![
        ProjectileDef { id: 0, name: "Arrow", speed: 1.5, damage: 25.0, scale: 103.0, range: 1000.0, layer: 0 },
        ProjectileDef { id: 1, name: "Turret Bolt", speed: 1.6, damage: 25.0, scale: 103.0, range: config::TURRET_TARGET_RANGE, layer: 1 },
    ];

    pub static ref ITEMS: Vec<ItemDef> = vec![
        ItemDef {
            id: 0, name: "Apple", class: ItemClass::Food { heal: 20.0 },
            scale: 0.0, place_offset: 0.0, health: None, cost: [0, 10, 0],
            limit: 0, touch_damage: 0.0, projectile_vulnerable: false, layer: 0,
            behavior: Behavior::Inert,
        },
        ItemDef {
            id: 1, name: "Wood Wall", class: ItemClass::Placeable,
            scale: 50.0, place_offset: 0.0, health: Some(380.0), cost: [10, 0, 0],
            limit: 30, touch_damage: 0.0, projectile_vulnerable: true, layer: 1,
            behavior: Behavior::Inert,
        },
        ItemDef {
            id: 2, name: "Spikes", class: ItemClass::Placeable,
            scale: 49.0, place_offset: 0.0, health: Some(400.0), cost: [20, 0, 5],
            limit: 15, touch_damage: 20.0, projectile_vulnerable: true, layer: 1,
            behavior: Behavior::Inert,
        },
        ItemDef {
            id: 3, name: "Windmill", class: ItemClass::Placeable,
            scale: 45.0, place_offset: 0.0, health: Some(420.0), cost: [50, 0, 10],
            limit: 7, touch_damage: 0.0, projectile_vulnerable: true, layer: 1,
            behavior: Behavior::Mill { income_ms: config::MILL_INCOME_INTERVAL_MS },
        },
        ItemDef {
            id: 4, name: "Turret", class: ItemClass::Placeable,
            scale: 43.0, place_offset: 0.0, health: Some(800.0), cost: [200, 0, 150],
            limit: 2, touch_damage: 0.0, projectile_vulnerable: true, layer: 1,
            behavior: Behavior::Turret {
                reload_ms: config::TURRET_FIRE_RATE_MS,
                range: config::TURRET_TARGET_RANGE,
                projectile: 1,
            },
        },
        ItemDef {
            id: 5, name: "Pit Trap", class: ItemClass::Placeable,
            scale: 50.0, place_offset: 0.0, health: Some(500.0), cost: [30, 0, 30],
            limit: 6, touch_damage: 0.0, projectile_vulnerable: true, layer: 0,
            behavior: Behavior::Trap,
        },
    ];
}

pub fn weapon(id: u32) -> Option<&'static WeaponDef> {
    WEAPONS.get(id as usize)
}

pub fn projectile(id: u32) -> Option<&'static ProjectileDef> {
    PROJECTILES.get(id as usize)
}

pub fn item(id: u32) -> Option<&'static ItemDef> {
    ITEMS.get(id as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_match_positions() {
        for (i, w) in WEAPONS.iter().enumerate() {
            assert_eq!(w.id as usize, i);
        }
        for (i, p) in PROJECTILES.iter().enumerate() {
            assert_eq!(p.id as usize, i);
        }
        for (i, it) in ITEMS.iter().enumerate() {
            assert_eq!(it.id as usize, i);
        }
    }

    #[test]
    fn placeables_have_health_and_limit() {
        for it in ITEMS.iter() {
            if it.class == ItemClass::Placeable {
                assert!(it.health.is_some(), "{} must be destructible", it.name);
                assert!(it.limit > 0, "{} must carry a build limit", it.name);
            }
        }
    }
}
