use spacetimedb::SpacetimeType;
use serde::{Serialize, Deserialize};

/// Enum to differentiate the entity families tracked by the sync layer.
/// Announcement rows and removal notices are keyed on (kind, sid).
#[derive(SpacetimeType, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Creature,
    WorldObject,
    Projectile,
}

/// What a world object fundamentally is. Map-generated resources carry a
/// resource variant; player-built structures carry the catalog item id they
/// were built from.
#[derive(SpacetimeType, Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub enum ObjectKind {
    Resource(ResourceVariant),
    Structure(u32),
}

#[derive(SpacetimeType, Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub enum ResourceVariant {
    Tree,
    Bush,
    Rock,
    GoldOre,
}

/// Per-tick behavior of a placed structure, dispatched explicitly instead of
/// presence-testing optional fields.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub enum Behavior {
    /// No autonomous behavior (walls and spikes act purely on contact).
    Inert,
    /// Autonomous targeting + firing. `reload_ms` counts down each tick.
    Turret { reload_ms: i64, range: f32, projectile: u32 },
    /// Periodic point income for the owner.
    Mill { income_ms: i64 },
    /// Holds non-owner players in place on contact.
    Trap,
}

// `derive(SpacetimeType)` rejects multi-field braced variants like `Turret`,
// so the impls it would otherwise generate are written out by hand below.
// Encoding is the canonical one: sum with variants in declaration order, the
// `Turret` payload as a named product (delegated to a derived helper struct).
const _: () = {
    use spacetimedb::spacetimedb_lib as lib;

    #[derive(SpacetimeType)]
    struct TurretPayload {
        reload_ms: i64,
        range: f32,
        projectile: u32,
    }

    impl lib::SpacetimeType for Behavior {
        fn make_type<S: lib::sats::typespace::TypespaceBuilder>(
            __typespace: &mut S,
        ) -> lib::sats::AlgebraicType {
            lib::sats::typespace::TypespaceBuilder::add(
                __typespace,
                core::any::TypeId::of::<Behavior>(),
                Some("Behavior"),
                |__typespace| {
                    lib::sats::AlgebraicType::sum::<[(&str, lib::sats::AlgebraicType); 4usize]>([
                        ("Inert", <() as lib::SpacetimeType>::make_type(__typespace)),
                        (
                            "Turret",
                            lib::sats::AlgebraicType::product::<
                                [(Option<&str>, lib::sats::AlgebraicType); 3usize],
                            >([
                                (
                                    Some("reload_ms"),
                                    <i64 as lib::SpacetimeType>::make_type(__typespace),
                                ),
                                (Some("range"), <f32 as lib::SpacetimeType>::make_type(__typespace)),
                                (
                                    Some("projectile"),
                                    <u32 as lib::SpacetimeType>::make_type(__typespace),
                                ),
                            ]),
                        ),
                        ("Mill", <i64 as lib::SpacetimeType>::make_type(__typespace)),
                        ("Trap", <() as lib::SpacetimeType>::make_type(__typespace)),
                    ])
                },
            )
        }
    }

    impl lib::ser::Serialize for Behavior {
        fn serialize<S: lib::ser::Serializer>(&self, __serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Behavior::Inert => __serializer.serialize_variant(0u8, Some("Inert"), &()),
                Behavior::Turret { reload_ms, range, projectile } => __serializer
                    .serialize_variant::<TurretPayload>(
                        1u8,
                        Some("Turret"),
                        &TurretPayload {
                            reload_ms: *reload_ms,
                            range: *range,
                            projectile: *projectile,
                        },
                    ),
                Behavior::Mill { income_ms } => {
                    __serializer.serialize_variant::<i64>(2u8, Some("Mill"), income_ms)
                }
                Behavior::Trap => __serializer.serialize_variant(3u8, Some("Trap"), &()),
            }
        }
    }

    impl<'de> lib::de::Deserialize<'de> for Behavior {
        fn deserialize<D: lib::de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_sum(__SumVisitor {
                _marker: std::marker::PhantomData::<fn() -> Behavior>,
            })
        }
    }

    struct __SumVisitor {
        _marker: std::marker::PhantomData<fn() -> Behavior>,
    }

    #[allow(non_camel_case_types)]
    enum __Variant {
        Inert,
        Turret,
        Mill,
        Trap,
    }

    impl<'de> lib::de::SumVisitor<'de> for __SumVisitor {
        type Output = Behavior;
        fn sum_name(&self) -> Option<&str> {
            Some("Behavior")
        }
        fn visit_sum<A: lib::de::SumAccess<'de>>(self, __data: A) -> Result<Self::Output, A::Error> {
            let (__variant, __access) = __data.variant(self)?;
            match __variant {
                __Variant::Inert => {
                    let () = lib::de::VariantAccess::deserialize(__access)?;
                    Ok(Behavior::Inert)
                }
                __Variant::Turret => {
                    let payload =
                        lib::de::VariantAccess::deserialize::<TurretPayload>(__access)?;
                    Ok(Behavior::Turret {
                        reload_ms: payload.reload_ms,
                        range: payload.range,
                        projectile: payload.projectile,
                    })
                }
                __Variant::Mill => Ok(Behavior::Mill {
                    income_ms: lib::de::VariantAccess::deserialize::<i64>(__access)?,
                }),
                __Variant::Trap => {
                    let () = lib::de::VariantAccess::deserialize(__access)?;
                    Ok(Behavior::Trap)
                }
            }
        }
    }

    impl<'de> lib::de::VariantVisitor<'de> for __SumVisitor {
        type Output = __Variant;
        fn variant_names(&self) -> impl '_ + Iterator<Item = &str> {
            ["Inert", "Turret", "Mill", "Trap"].into_iter()
        }
        fn visit_tag<E: lib::de::Error>(self, __tag: u8) -> Result<Self::Output, E> {
            match __tag {
                0u8 => Ok(__Variant::Inert),
                1u8 => Ok(__Variant::Turret),
                2u8 => Ok(__Variant::Mill),
                3u8 => Ok(__Variant::Trap),
                _ => Err(lib::de::Error::unknown_variant_tag(__tag, &self)),
            }
        }
        fn visit_name<E: lib::de::Error>(self, __name: &str) -> Result<Self::Output, E> {
            match __name {
                "Inert" => Ok(__Variant::Inert),
                "Turret" => Ok(__Variant::Turret),
                "Mill" => Ok(__Variant::Mill),
                "Trap" => Ok(__Variant::Trap),
                _ => Err(lib::de::Error::unknown_variant_name(__name, &self)),
            }
        }
    }
};

/// Which resource pool a gain or loss applies to.
#[derive(SpacetimeType, Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub enum ResourceType {
    Wood,
    Food,
    Stone,
    Points,
}

/// State machine states for wild creatures. Transitions live in
/// `creature::plan_transition` so the model is testable in isolation.
#[derive(SpacetimeType, Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub enum CreatureState {
    Idle,
    Wander,
    Flee,
    Charge,
    HostileEngage,
}
