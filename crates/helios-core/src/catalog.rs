//! Static game data: ship hull types, upgrade modules, tradable goods, and
//! the economy-type classification that drives market equilibria.

use contracts::{EconomyType, Good, GoodRelation, Ship, ShipStatus, UpgradeItem};

pub const FUEL_UNIT_PRICE: i64 = 3;
pub const HULL_REPAIR_UNIT_PRICE: i64 = 2;

/// Fraction (percent) of a module's cost refunded on removal.
pub const REMOVAL_REFUND_PCT: i64 = 50;

// ---------------------------------------------------------------------------
// Ship types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    Weapon,
    Defense,
    Engine,
    Cargo,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotSpec {
    pub slot_id: &'static str,
    pub slot_type: SlotType,
}

#[derive(Debug, Clone, Copy)]
pub struct ShipTypeSpec {
    pub ship_type: &'static str,
    pub display_name: &'static str,
    pub price: i64,
    pub max_fuel: i64,
    pub max_hull: i64,
    pub max_shield: i64,
    pub speed: i64,
    pub firepower: i64,
    pub evasion: i64,
    pub cargo_capacity: i64,
    pub slots: &'static [SlotSpec],
}

pub const SHIP_TYPES: &[ShipTypeSpec] = &[
    ShipTypeSpec {
        ship_type: "scout",
        display_name: "Scout",
        price: 800,
        max_fuel: 50,
        max_hull: 60,
        max_shield: 20,
        speed: 8,
        firepower: 6,
        evasion: 35,
        cargo_capacity: 20,
        slots: &[
            SlotSpec {
                slot_id: "weapon_1",
                slot_type: SlotType::Weapon,
            },
            SlotSpec {
                slot_id: "engine_1",
                slot_type: SlotType::Engine,
            },
        ],
    },
    ShipTypeSpec {
        ship_type: "freighter",
        display_name: "Freighter",
        price: 1500,
        max_fuel: 80,
        max_hull: 120,
        max_shield: 30,
        speed: 4,
        firepower: 8,
        evasion: 12,
        cargo_capacity: 120,
        slots: &[
            SlotSpec {
                slot_id: "weapon_1",
                slot_type: SlotType::Weapon,
            },
            SlotSpec {
                slot_id: "defense_1",
                slot_type: SlotType::Defense,
            },
            SlotSpec {
                slot_id: "cargo_1",
                slot_type: SlotType::Cargo,
            },
            SlotSpec {
                slot_id: "cargo_2",
                slot_type: SlotType::Cargo,
            },
        ],
    },
    ShipTypeSpec {
        ship_type: "corvette",
        display_name: "Corvette",
        price: 2600,
        max_fuel: 60,
        max_hull: 100,
        max_shield: 50,
        speed: 6,
        firepower: 22,
        evasion: 25,
        cargo_capacity: 40,
        slots: &[
            SlotSpec {
                slot_id: "weapon_1",
                slot_type: SlotType::Weapon,
            },
            SlotSpec {
                slot_id: "weapon_2",
                slot_type: SlotType::Weapon,
            },
            SlotSpec {
                slot_id: "defense_1",
                slot_type: SlotType::Defense,
            },
            SlotSpec {
                slot_id: "engine_1",
                slot_type: SlotType::Engine,
            },
        ],
    },
];

pub fn ship_type(ship_type_id: &str) -> Option<&'static ShipTypeSpec> {
    SHIP_TYPES.iter().find(|spec| spec.ship_type == ship_type_id)
}

pub fn slot(spec: &'static ShipTypeSpec, slot_id: &str) -> Option<&'static SlotSpec> {
    spec.slots.iter().find(|slot| slot.slot_id == slot_id)
}

/// A freshly purchased ship: full fuel/hull/shield, docked at the purchase
/// system, no transit state.
pub fn new_ship(
    spec: &ShipTypeSpec,
    ship_id: impl Into<String>,
    player_id: impl Into<String>,
    name: impl Into<String>,
    system_id: impl Into<String>,
) -> Ship {
    Ship {
        ship_id: ship_id.into(),
        player_id: player_id.into(),
        ship_type: spec.ship_type.to_string(),
        name: name.into(),
        fuel: spec.max_fuel,
        max_fuel: spec.max_fuel,
        hull: spec.max_hull,
        max_hull: spec.max_hull,
        shield: spec.max_shield,
        max_shield: spec.max_shield,
        speed: spec.speed,
        firepower: spec.firepower,
        evasion: spec.evasion,
        cargo_capacity: spec.cargo_capacity,
        status: ShipStatus::Docked,
        system_id: system_id.into(),
        destination_system_id: None,
        departure_tick: None,
        arrival_tick: None,
        convoy_id: None,
    }
}

// ---------------------------------------------------------------------------
// Upgrade modules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct TierSpec {
    pub tier: u8,
    pub cost: i64,
    pub firepower_bonus: i64,
    pub evasion_bonus: i64,
    pub shield_bonus: i64,
    pub speed_bonus: i64,
    pub cargo_bonus: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ModuleSpec {
    pub module_id: &'static str,
    pub display_name: &'static str,
    pub slot_type: SlotType,
    pub tiers: &'static [TierSpec],
}

macro_rules! tier {
    ($tier:expr, $cost:expr, fp $fp:expr, ev $ev:expr, sh $sh:expr, sp $sp:expr, cg $cg:expr) => {
        TierSpec {
            tier: $tier,
            cost: $cost,
            firepower_bonus: $fp,
            evasion_bonus: $ev,
            shield_bonus: $sh,
            speed_bonus: $sp,
            cargo_bonus: $cg,
        }
    };
}

pub const MODULES: &[ModuleSpec] = &[
    ModuleSpec {
        module_id: "pulse_laser",
        display_name: "Pulse Laser",
        slot_type: SlotType::Weapon,
        tiers: &[
            tier!(1, 300, fp 6, ev 0, sh 0, sp 0, cg 0),
            tier!(2, 700, fp 14, ev 0, sh 0, sp 0, cg 0),
            tier!(3, 1500, fp 25, ev 0, sh 0, sp 0, cg 0),
        ],
    },
    ModuleSpec {
        module_id: "deflector_array",
        display_name: "Deflector Array",
        slot_type: SlotType::Defense,
        tiers: &[
            tier!(1, 250, fp 0, ev 5, sh 15, sp 0, cg 0),
            tier!(2, 600, fp 0, ev 9, sh 35, sp 0, cg 0),
            tier!(3, 1300, fp 0, ev 14, sh 60, sp 0, cg 0),
        ],
    },
    ModuleSpec {
        module_id: "drive_tuning",
        display_name: "Drive Tuning",
        slot_type: SlotType::Engine,
        tiers: &[
            tier!(1, 350, fp 0, ev 2, sh 0, sp 1, cg 0),
            tier!(2, 800, fp 0, ev 4, sh 0, sp 2, cg 0),
            tier!(3, 1700, fp 0, ev 6, sh 0, sp 4, cg 0),
        ],
    },
    ModuleSpec {
        module_id: "cargo_pods",
        display_name: "Cargo Pods",
        slot_type: SlotType::Cargo,
        tiers: &[
            tier!(1, 200, fp 0, ev 0, sh 0, sp 0, cg 20),
            tier!(2, 450, fp 0, ev 0, sh 0, sp 0, cg 45),
            tier!(3, 1000, fp 0, ev 0, sh 0, sp 0, cg 80),
        ],
    },
];

pub fn module(module_id: &str) -> Option<&'static ModuleSpec> {
    MODULES.iter().find(|spec| spec.module_id == module_id)
}

pub fn module_tier(spec: &'static ModuleSpec, tier: u8) -> Option<&'static TierSpec> {
    spec.tiers.iter().find(|t| t.tier == tier)
}

/// Ship stats with installed module bonuses applied. Unknown modules in the
/// upgrade list contribute nothing rather than failing the read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveStats {
    pub firepower: i64,
    pub evasion: i64,
    pub speed: i64,
    pub max_shield: i64,
    pub cargo_capacity: i64,
}

pub fn effective_stats(ship: &Ship, upgrades: &[UpgradeItem]) -> EffectiveStats {
    let mut stats = EffectiveStats {
        firepower: ship.firepower,
        evasion: ship.evasion,
        speed: ship.speed,
        max_shield: ship.max_shield,
        cargo_capacity: ship.cargo_capacity,
    };
    for item in upgrades {
        let Some(spec) = module(&item.module_id) else {
            continue;
        };
        let Some(tier) = module_tier(spec, item.tier) else {
            continue;
        };
        stats.firepower += tier.firepower_bonus;
        stats.evasion += tier.evasion_bonus;
        stats.speed += tier.speed_bonus;
        stats.max_shield += tier.shield_bonus;
        stats.cargo_capacity += tier.cargo_bonus;
    }
    stats
}

// ---------------------------------------------------------------------------
// Goods and economy classification
// ---------------------------------------------------------------------------

pub fn default_goods() -> Vec<Good> {
    fn good(good_id: &str, name: &str, base_price: i64, floor: i64, ceiling: i64) -> Good {
        Good {
            good_id: good_id.to_string(),
            name: name.to_string(),
            base_price,
            price_floor_pct: floor,
            price_ceiling_pct: ceiling,
        }
    }

    vec![
        good("grain", "Grain", 12, 40, 300),
        good("water", "Water", 8, 50, 250),
        good("ore", "Raw Ore", 18, 40, 300),
        good("alloys", "Refined Alloys", 35, 50, 280),
        good("fuel_cells", "Fuel Cells", 28, 60, 250),
        good("machinery", "Machinery", 55, 50, 300),
        good("medicine", "Medicine", 70, 60, 350),
        good("electronics", "Electronics", 90, 50, 320),
    ]
}

/// The station economy-type relationship to a good; this is what determines
/// the equilibrium target a market entry drifts toward.
pub fn good_relation(economy_type: EconomyType, good_id: &str) -> GoodRelation {
    use EconomyType::*;
    use GoodRelation::*;
    match (economy_type, good_id) {
        (Agricultural, "grain" | "water") => Produces,
        (Agricultural, "machinery" | "medicine") => Consumes,
        (Mining, "ore") => Produces,
        (Mining, "grain" | "machinery" | "fuel_cells") => Consumes,
        (Refinery, "alloys" | "fuel_cells") => Produces,
        (Refinery, "ore" | "water") => Consumes,
        (Industrial, "machinery") => Produces,
        (Industrial, "alloys" | "electronics" | "grain") => Consumes,
        (TechHub, "electronics" | "medicine") => Produces,
        (TechHub, "alloys" | "machinery" | "grain") => Consumes,
        _ => Neutral,
    }
}
