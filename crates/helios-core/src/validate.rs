//! Pure action validators.
//!
//! Each validator checks a proposed player action against a snapshot of
//! current state and computes the resulting deltas without touching storage.
//! The API layer runs them twice per action: once before opening a
//! transaction (cheap rejection) and once against fresh in-transaction reads
//! (a precondition that passed the pre-check but fails the re-check is a
//! concurrency conflict, not a silent success).

use std::fmt;

use contracts::{
    CargoItem, ConvoyMemberService, ErrorCode, Good, MarketEntry, Player, Ship, ShipStatus,
    Station, TradeSide, UpgradeItem,
};

use crate::catalog::{
    self, EffectiveStats, FUEL_UNIT_PRICE, HULL_REPAIR_UNIT_PRICE, REMOVAL_REFUND_PCT,
};
use crate::economy::{self, DriftParams, MarketLevels};
use crate::pathfind::{self, Galaxy};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    InvalidQuantity(i64),
    InvalidFraction(i64),
    EmptyRoute,
    UnknownShipType(String),
    UnknownModule(String),
    UnknownTier(u8),
    UnknownSlot(String),
    RouteMustStartAtCurrentSystem { expected: String, got: String },
    RouteBroken { from: String, to: String },
    NotDocked(String),
    ShipNotAtStation { ship_id: String, station_id: String },
    NoShipyard(String),
    SlotTypeMismatch { slot_id: String, module_id: String },
    SlotOccupied(String),
    SlotEmpty(String),
    InsufficientCredits { required: i64, available: i64 },
    InsufficientFuel { required: i64, available: i64 },
    InsufficientCargoSpace { required: i64, available: i64 },
    InsufficientCargo { required: i64, available: i64 },
    InsufficientSupply { requested: i64, available: i64 },
    ConvoyTooSmall(String),
    ShipInConvoy { ship_id: String, convoy_id: String },
    FuelAlreadyFull(String),
}

impl ActionError {
    /// Malformed requests are validation failures; state-dependent
    /// rejections are precondition failures.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ActionError::InvalidQuantity(_)
            | ActionError::InvalidFraction(_)
            | ActionError::EmptyRoute
            | ActionError::UnknownShipType(_)
            | ActionError::UnknownModule(_)
            | ActionError::UnknownTier(_)
            | ActionError::UnknownSlot(_)
            | ActionError::RouteMustStartAtCurrentSystem { .. }
            | ActionError::RouteBroken { .. } => ErrorCode::InvalidRequest,
            _ => ErrorCode::PreconditionFailed,
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuantity(quantity) => {
                write!(f, "quantity must be positive, got {quantity}")
            }
            Self::InvalidFraction(fraction) => {
                write!(f, "fraction_pct must be in 1..=100, got {fraction}")
            }
            Self::EmptyRoute => write!(f, "route must contain at least one hop"),
            Self::UnknownShipType(ship_type) => write!(f, "unknown ship type {ship_type}"),
            Self::UnknownModule(module_id) => write!(f, "unknown module {module_id}"),
            Self::UnknownTier(tier) => write!(f, "unknown module tier {tier}"),
            Self::UnknownSlot(slot_id) => write!(f, "unknown slot {slot_id}"),
            Self::RouteMustStartAtCurrentSystem { expected, got } => {
                write!(f, "route starts at {got} but mover is at {expected}")
            }
            Self::RouteBroken { from, to } => write!(f, "no lane connects {from} to {to}"),
            Self::NotDocked(ship_id) => write!(f, "ship {ship_id} is not docked"),
            Self::ShipNotAtStation {
                ship_id,
                station_id,
            } => write!(f, "ship {ship_id} is not at station {station_id}"),
            Self::NoShipyard(system_id) => {
                write!(f, "system {system_id} has no station to buy ships at")
            }
            Self::SlotTypeMismatch { slot_id, module_id } => {
                write!(f, "module {module_id} does not fit slot {slot_id}")
            }
            Self::SlotOccupied(slot_id) => write!(f, "slot {slot_id} is already occupied"),
            Self::SlotEmpty(slot_id) => write!(f, "slot {slot_id} has nothing installed"),
            Self::InsufficientCredits {
                required,
                available,
            } => write!(f, "need {required} credits but only {available} available"),
            Self::InsufficientFuel {
                required,
                available,
            } => write!(f, "route needs {required} fuel but only {available} aboard"),
            Self::InsufficientCargoSpace {
                required,
                available,
            } => write!(f, "need {required} cargo space but only {available} free"),
            Self::InsufficientCargo {
                required,
                available,
            } => write!(f, "need {required} units in cargo but only {available} held"),
            Self::InsufficientSupply {
                requested,
                available,
            } => write!(f, "station holds {available} units, {requested} requested"),
            Self::ConvoyTooSmall(convoy_id) => {
                write!(f, "convoy {convoy_id} needs at least two ships")
            }
            Self::ShipInConvoy { ship_id, convoy_id } => {
                write!(f, "ship {ship_id} moves with convoy {convoy_id}")
            }
            Self::FuelAlreadyFull(ship_id) => write!(f, "ship {ship_id} is already fully fueled"),
        }
    }
}

impl std::error::Error for ActionError {}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// One mover in a navigation order: the ship row plus its effective stats
/// (installed upgrades change speed).
#[derive(Debug, Clone, Copy)]
pub struct Mover<'a> {
    pub ship: &'a Ship,
    pub stats: EffectiveStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationPlan {
    pub fuel_cost_per_ship: i64,
    pub duration: u64,
    pub departure_tick: u64,
    pub arrival_tick: u64,
}

/// Validate a multi-hop route for one ship or a convoy. A convoy travels at
/// its slowest member's speed and every member pays the full route fuel cost
/// up front.
pub fn plan_navigation(
    galaxy: &Galaxy,
    movers: &[Mover<'_>],
    route: &[String],
    current_tick: u64,
) -> Result<NavigationPlan, ActionError> {
    if route.len() < 2 {
        return Err(ActionError::EmptyRoute);
    }

    for mover in movers {
        if mover.ship.status != ShipStatus::Docked {
            return Err(ActionError::NotDocked(mover.ship.ship_id.clone()));
        }
        if mover.ship.system_id != route[0] {
            return Err(ActionError::RouteMustStartAtCurrentSystem {
                expected: mover.ship.system_id.clone(),
                got: route[0].clone(),
            });
        }
    }

    let speed = movers
        .iter()
        .map(|mover| mover.stats.speed)
        .min()
        .unwrap_or(pathfind::REFERENCE_SPEED);

    let cost = pathfind::route_cost(galaxy, route, speed).ok_or_else(|| {
        // Report the first disconnected pair for the error message.
        let broken = route
            .windows(2)
            .find(|pair| galaxy.lane_cost(&pair[0], &pair[1]).is_none());
        match broken {
            Some(pair) => ActionError::RouteBroken {
                from: pair[0].clone(),
                to: pair[1].clone(),
            },
            None => ActionError::EmptyRoute,
        }
    })?;

    for mover in movers {
        if mover.ship.fuel < cost.total_fuel_cost {
            return Err(ActionError::InsufficientFuel {
                required: cost.total_fuel_cost,
                available: mover.ship.fuel,
            });
        }
    }

    Ok(NavigationPlan {
        fuel_cost_per_ship: cost.total_fuel_cost,
        duration: cost.total_duration,
        departure_tick: current_tick,
        arrival_tick: current_tick + cost.total_duration,
    })
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradePlan {
    pub unit_price: i64,
    pub total_price: i64,
    pub credits_after: i64,
    pub cargo_quantity_after: i64,
    pub levels_after: MarketLevels,
}

#[allow(clippy::too_many_arguments)]
pub fn plan_trade(
    player: &Player,
    ship: &Ship,
    stats: EffectiveStats,
    cargo: &[CargoItem],
    station: &Station,
    good: &Good,
    entry: &MarketEntry,
    quantity: i64,
    side: TradeSide,
    params: &DriftParams,
) -> Result<TradePlan, ActionError> {
    if quantity <= 0 {
        return Err(ActionError::InvalidQuantity(quantity));
    }
    if ship.status != ShipStatus::Docked {
        return Err(ActionError::NotDocked(ship.ship_id.clone()));
    }
    if ship.system_id != station.system_id {
        return Err(ActionError::ShipNotAtStation {
            ship_id: ship.ship_id.clone(),
            station_id: station.station_id.clone(),
        });
    }

    let unit_price = economy::current_price(good, entry.supply, entry.demand);
    let total_price = unit_price * quantity;
    let held = cargo
        .iter()
        .find(|item| item.good_id == good.good_id)
        .map(|item| item.quantity)
        .unwrap_or(0);
    let carried: i64 = cargo.iter().map(|item| item.quantity).sum();

    let (credits_after, cargo_quantity_after) = match side {
        TradeSide::Buy => {
            if entry.supply < quantity {
                return Err(ActionError::InsufficientSupply {
                    requested: quantity,
                    available: entry.supply,
                });
            }
            if player.credits < total_price {
                return Err(ActionError::InsufficientCredits {
                    required: total_price,
                    available: player.credits,
                });
            }
            let free = stats.cargo_capacity - carried;
            if free < quantity {
                return Err(ActionError::InsufficientCargoSpace {
                    required: quantity,
                    available: free.max(0),
                });
            }
            (player.credits - total_price, held + quantity)
        }
        TradeSide::Sell => {
            if held < quantity {
                return Err(ActionError::InsufficientCargo {
                    required: quantity,
                    available: held,
                });
            }
            (player.credits + total_price, held - quantity)
        }
    };

    let levels_after = economy::trade_level_shift(
        MarketLevels {
            supply: entry.supply,
            demand: entry.demand,
        },
        side,
        quantity,
        params,
    );

    Ok(TradePlan {
        unit_price,
        total_price,
        credits_after,
        cargo_quantity_after,
        levels_after,
    })
}

// ---------------------------------------------------------------------------
// Ship purchase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasePlan {
    pub ship: Ship,
    pub price: i64,
    pub credits_after: i64,
}

pub fn plan_ship_purchase(
    player: &Player,
    system_id: &str,
    station_count: usize,
    ship_type_id: &str,
    ship_id: &str,
    name: Option<&str>,
) -> Result<PurchasePlan, ActionError> {
    let spec = catalog::ship_type(ship_type_id)
        .ok_or_else(|| ActionError::UnknownShipType(ship_type_id.to_string()))?;
    if station_count == 0 {
        return Err(ActionError::NoShipyard(system_id.to_string()));
    }
    if player.credits < spec.price {
        return Err(ActionError::InsufficientCredits {
            required: spec.price,
            available: player.credits,
        });
    }

    let ship = catalog::new_ship(
        spec,
        ship_id,
        player.player_id.clone(),
        name.unwrap_or(spec.display_name),
        system_id,
    );

    Ok(PurchasePlan {
        price: spec.price,
        credits_after: player.credits - spec.price,
        ship,
    })
}

// ---------------------------------------------------------------------------
// Upgrades
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePlan {
    pub item: UpgradeItem,
    pub cost: i64,
    pub credits_after: i64,
}

pub fn plan_install_upgrade(
    player: &Player,
    ship: &Ship,
    installed: &[UpgradeItem],
    slot_id: &str,
    module_id: &str,
    tier: u8,
) -> Result<UpgradePlan, ActionError> {
    if ship.status != ShipStatus::Docked {
        return Err(ActionError::NotDocked(ship.ship_id.clone()));
    }
    let spec = catalog::ship_type(&ship.ship_type)
        .ok_or_else(|| ActionError::UnknownShipType(ship.ship_type.clone()))?;
    let slot =
        catalog::slot(spec, slot_id).ok_or_else(|| ActionError::UnknownSlot(slot_id.to_string()))?;
    let module = catalog::module(module_id)
        .ok_or_else(|| ActionError::UnknownModule(module_id.to_string()))?;
    let tier_spec = catalog::module_tier(module, tier).ok_or(ActionError::UnknownTier(tier))?;

    if module.slot_type != slot.slot_type {
        return Err(ActionError::SlotTypeMismatch {
            slot_id: slot_id.to_string(),
            module_id: module_id.to_string(),
        });
    }
    if installed.iter().any(|item| item.slot_id == slot_id) {
        return Err(ActionError::SlotOccupied(slot_id.to_string()));
    }
    if player.credits < tier_spec.cost {
        return Err(ActionError::InsufficientCredits {
            required: tier_spec.cost,
            available: player.credits,
        });
    }

    Ok(UpgradePlan {
        item: UpgradeItem {
            slot_id: slot_id.to_string(),
            module_id: module_id.to_string(),
            tier,
        },
        cost: tier_spec.cost,
        credits_after: player.credits - tier_spec.cost,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalPlan {
    pub removed: UpgradeItem,
    pub refund: i64,
    pub credits_after: i64,
}

pub fn plan_remove_upgrade(
    player: &Player,
    ship: &Ship,
    installed: &[UpgradeItem],
    slot_id: &str,
) -> Result<RemovalPlan, ActionError> {
    if ship.status != ShipStatus::Docked {
        return Err(ActionError::NotDocked(ship.ship_id.clone()));
    }
    let spec = catalog::ship_type(&ship.ship_type)
        .ok_or_else(|| ActionError::UnknownShipType(ship.ship_type.clone()))?;
    if catalog::slot(spec, slot_id).is_none() {
        return Err(ActionError::UnknownSlot(slot_id.to_string()));
    }
    let removed = installed
        .iter()
        .find(|item| item.slot_id == slot_id)
        .cloned()
        .ok_or_else(|| ActionError::SlotEmpty(slot_id.to_string()))?;

    let refund = catalog::module(&removed.module_id)
        .and_then(|module| catalog::module_tier(module, removed.tier))
        .map(|tier| tier.cost * REMOVAL_REFUND_PCT / 100)
        .unwrap_or(0);

    Ok(RemovalPlan {
        refund,
        credits_after: player.credits + refund,
        removed,
    })
}

// ---------------------------------------------------------------------------
// Refuel and convoy service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefuelPlan {
    pub amount_added: i64,
    pub cost: i64,
    pub fuel_after: i64,
    pub credits_after: i64,
}

/// Requests above the tank headroom are clamped, not rejected.
pub fn plan_refuel(player: &Player, ship: &Ship, amount: i64) -> Result<RefuelPlan, ActionError> {
    if amount <= 0 {
        return Err(ActionError::InvalidQuantity(amount));
    }
    if ship.status != ShipStatus::Docked {
        return Err(ActionError::NotDocked(ship.ship_id.clone()));
    }
    let headroom = ship.max_fuel - ship.fuel;
    if headroom <= 0 {
        return Err(ActionError::FuelAlreadyFull(ship.ship_id.clone()));
    }
    let amount_added = amount.min(headroom);
    let cost = amount_added * FUEL_UNIT_PRICE;
    if player.credits < cost {
        return Err(ActionError::InsufficientCredits {
            required: cost,
            available: player.credits,
        });
    }
    Ok(RefuelPlan {
        amount_added,
        cost,
        fuel_after: ship.fuel + amount_added,
        credits_after: player.credits - cost,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvoyServiceKind {
    Refuel,
    Repair,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvoyServicePlan {
    pub members: Vec<ConvoyMemberService>,
    pub total_cost: i64,
    pub credits_after: i64,
}

/// Top every convoy member up to at least `fraction_pct` of its maximum fuel
/// (or hull), charging per unit restored. Members already above the target
/// cost nothing.
pub fn plan_convoy_service(
    player: &Player,
    convoy_id: &str,
    members: &[Ship],
    kind: ConvoyServiceKind,
    fraction_pct: i64,
) -> Result<ConvoyServicePlan, ActionError> {
    if !(1..=100).contains(&fraction_pct) {
        return Err(ActionError::InvalidFraction(fraction_pct));
    }
    if members.len() < 2 {
        return Err(ActionError::ConvoyTooSmall(convoy_id.to_string()));
    }

    let unit_price = match kind {
        ConvoyServiceKind::Refuel => FUEL_UNIT_PRICE,
        ConvoyServiceKind::Repair => HULL_REPAIR_UNIT_PRICE,
    };

    let mut serviced = Vec::with_capacity(members.len());
    let mut total_cost = 0;
    for ship in members {
        if ship.status != ShipStatus::Docked {
            return Err(ActionError::NotDocked(ship.ship_id.clone()));
        }
        let (current, maximum) = match kind {
            ConvoyServiceKind::Refuel => (ship.fuel, ship.max_fuel),
            ConvoyServiceKind::Repair => (ship.hull, ship.max_hull),
        };
        let target = maximum * fraction_pct / 100;
        let amount_restored = (target - current).max(0);
        let cost = amount_restored * unit_price;
        total_cost += cost;
        serviced.push(ConvoyMemberService {
            ship_id: ship.ship_id.clone(),
            amount_restored,
            cost,
        });
    }

    if player.credits < total_cost {
        return Err(ActionError::InsufficientCredits {
            required: total_cost,
            available: player.credits,
        });
    }

    Ok(ConvoyServicePlan {
        members: serviced,
        total_cost,
        credits_after: player.credits - total_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Connection;

    fn test_player(credits: i64) -> Player {
        Player {
            player_id: "player_01".into(),
            name: "Tester".into(),
            credits,
        }
    }

    fn test_ship() -> Ship {
        let spec = catalog::ship_type("freighter").expect("freighter exists");
        catalog::new_ship(spec, "ship_01", "player_01", "Hauler", "sol")
    }

    fn test_stats(ship: &Ship) -> EffectiveStats {
        catalog::effective_stats(ship, &[])
    }

    fn test_galaxy() -> Galaxy {
        Galaxy::from_connections(&[
            Connection {
                connection_id: "c1".into(),
                from_system_id: "sol".into(),
                to_system_id: "vega".into(),
                fuel_cost: 10,
            },
            Connection {
                connection_id: "c2".into(),
                from_system_id: "vega".into(),
                to_system_id: "rigel".into(),
                fuel_cost: 10,
            },
        ])
    }

    fn test_station() -> Station {
        Station {
            station_id: "st_sol".into(),
            system_id: "sol".into(),
            name: "Sol Station".into(),
            economy_type: contracts::EconomyType::Agricultural,
        }
    }

    fn test_good() -> Good {
        Good {
            good_id: "grain".into(),
            name: "Grain".into(),
            base_price: 10,
            price_floor_pct: 40,
            price_ceiling_pct: 300,
        }
    }

    fn test_entry(supply: i64, demand: i64) -> MarketEntry {
        MarketEntry {
            station_id: "st_sol".into(),
            good_id: "grain".into(),
            supply,
            demand,
        }
    }

    #[test]
    fn navigation_requires_route_starting_at_current_system() {
        let galaxy = test_galaxy();
        let ship = test_ship();
        let movers = [Mover {
            ship: &ship,
            stats: test_stats(&ship),
        }];
        let route: Vec<String> = vec!["vega".into(), "rigel".into()];
        let err = plan_navigation(&galaxy, &movers, &route, 5).expect_err("wrong origin");
        assert!(matches!(
            err,
            ActionError::RouteMustStartAtCurrentSystem { .. }
        ));
        assert_eq!(err.error_code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn navigation_rejects_broken_route() {
        let galaxy = test_galaxy();
        let ship = test_ship();
        let movers = [Mover {
            ship: &ship,
            stats: test_stats(&ship),
        }];
        let route: Vec<String> = vec!["sol".into(), "rigel".into()];
        let err = plan_navigation(&galaxy, &movers, &route, 5).expect_err("no direct lane");
        assert!(matches!(err, ActionError::RouteBroken { .. }));
    }

    #[test]
    fn navigation_deducts_full_route_fuel_and_sets_arrival() {
        let galaxy = test_galaxy();
        let ship = test_ship();
        let movers = [Mover {
            ship: &ship,
            stats: test_stats(&ship),
        }];
        let route: Vec<String> = vec!["sol".into(), "vega".into(), "rigel".into()];
        let plan = plan_navigation(&galaxy, &movers, &route, 100).expect("valid route");
        assert_eq!(plan.fuel_cost_per_ship, 20);
        assert_eq!(plan.departure_tick, 100);
        assert_eq!(plan.arrival_tick, 100 + plan.duration);
        assert!(plan.duration >= 1);
    }

    #[test]
    fn navigation_rejects_insufficient_fuel() {
        let galaxy = test_galaxy();
        let mut ship = test_ship();
        ship.fuel = 5;
        let stats = test_stats(&ship);
        let movers = [Mover { ship: &ship, stats }];
        let route: Vec<String> = vec!["sol".into(), "vega".into()];
        let err = plan_navigation(&galaxy, &movers, &route, 5).expect_err("fuel too low");
        assert!(matches!(err, ActionError::InsufficientFuel { .. }));
        assert_eq!(err.error_code(), ErrorCode::PreconditionFailed);
    }

    #[test]
    fn navigation_rejects_in_transit_mover() {
        let galaxy = test_galaxy();
        let mut ship = test_ship();
        ship.status = ShipStatus::InTransit;
        ship.destination_system_id = Some("vega".into());
        ship.departure_tick = Some(1);
        ship.arrival_tick = Some(4);
        let stats = test_stats(&ship);
        let movers = [Mover { ship: &ship, stats }];
        let route: Vec<String> = vec!["sol".into(), "vega".into()];
        let err = plan_navigation(&galaxy, &movers, &route, 5).expect_err("in transit");
        assert!(matches!(err, ActionError::NotDocked(_)));
    }

    #[test]
    fn convoy_travels_at_slowest_member_speed() {
        let galaxy = test_galaxy();
        let fast = {
            let spec = catalog::ship_type("scout").expect("scout");
            catalog::new_ship(spec, "ship_fast", "player_01", "Dart", "sol")
        };
        let slow = test_ship();
        let movers = [
            Mover {
                ship: &fast,
                stats: test_stats(&fast),
            },
            Mover {
                ship: &slow,
                stats: test_stats(&slow),
            },
        ];
        let route: Vec<String> = vec!["sol".into(), "vega".into()];
        let plan = plan_navigation(&galaxy, &movers, &route, 0).expect("valid");

        let solo = [Mover {
            ship: &fast,
            stats: test_stats(&fast),
        }];
        let solo_plan = plan_navigation(&galaxy, &solo, &route, 0).expect("valid");
        assert!(plan.duration > solo_plan.duration);
    }

    #[test]
    fn buy_rejected_when_credits_short() {
        let player = test_player(5);
        let ship = test_ship();
        let stats = test_stats(&ship);
        let err = plan_trade(
            &player,
            &ship,
            stats,
            &[],
            &test_station(),
            &test_good(),
            &test_entry(100, 100),
            10,
            TradeSide::Buy,
            &DriftParams::default(),
        )
        .expect_err("cannot afford");
        assert!(matches!(err, ActionError::InsufficientCredits { .. }));
        assert_eq!(err.error_code(), ErrorCode::PreconditionFailed);
    }

    #[test]
    fn buy_rejected_when_supply_short() {
        let player = test_player(100_000);
        let ship = test_ship();
        let stats = test_stats(&ship);
        let err = plan_trade(
            &player,
            &ship,
            stats,
            &[],
            &test_station(),
            &test_good(),
            &test_entry(3, 100),
            10,
            TradeSide::Buy,
            &DriftParams::default(),
        )
        .expect_err("supply too low");
        assert!(matches!(err, ActionError::InsufficientSupply { .. }));
    }

    #[test]
    fn sell_rejected_without_cargo() {
        let player = test_player(0);
        let ship = test_ship();
        let stats = test_stats(&ship);
        let err = plan_trade(
            &player,
            &ship,
            stats,
            &[],
            &test_station(),
            &test_good(),
            &test_entry(100, 100),
            5,
            TradeSide::Sell,
            &DriftParams::default(),
        )
        .expect_err("nothing to sell");
        assert!(matches!(err, ActionError::InsufficientCargo { .. }));
    }

    #[test]
    fn zero_quantity_is_a_validation_failure() {
        let player = test_player(1000);
        let ship = test_ship();
        let stats = test_stats(&ship);
        let err = plan_trade(
            &player,
            &ship,
            stats,
            &[],
            &test_station(),
            &test_good(),
            &test_entry(100, 100),
            0,
            TradeSide::Buy,
            &DriftParams::default(),
        )
        .expect_err("zero quantity");
        assert_eq!(err.error_code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn buy_plan_moves_credits_cargo_and_levels() {
        let player = test_player(1000);
        let ship = test_ship();
        let stats = test_stats(&ship);
        let plan = plan_trade(
            &player,
            &ship,
            stats,
            &[],
            &test_station(),
            &test_good(),
            &test_entry(100, 100),
            10,
            TradeSide::Buy,
            &DriftParams::default(),
        )
        .expect("valid buy");
        assert_eq!(plan.unit_price, 10);
        assert_eq!(plan.total_price, 100);
        assert_eq!(plan.credits_after, 900);
        assert_eq!(plan.cargo_quantity_after, 10);
        assert_eq!(plan.levels_after.supply, 90);
        assert_eq!(plan.levels_after.demand, 105);
    }

    #[test]
    fn purchase_rejects_unknown_type_and_short_credits() {
        let player = test_player(100);
        let err = plan_ship_purchase(&player, "sol", 1, "battlecruiser", "ship_02", None)
            .expect_err("unknown type");
        assert_eq!(err.error_code(), ErrorCode::InvalidRequest);

        let err = plan_ship_purchase(&player, "sol", 1, "scout", "ship_02", None)
            .expect_err("cannot afford");
        assert!(matches!(err, ActionError::InsufficientCredits { .. }));
    }

    #[test]
    fn purchase_creates_docked_ship_at_system() {
        let player = test_player(10_000);
        let plan = plan_ship_purchase(&player, "vega", 2, "scout", "ship_02", Some("Pathfinder"))
            .expect("valid purchase");
        assert_eq!(plan.ship.system_id, "vega");
        assert_eq!(plan.ship.name, "Pathfinder");
        assert!(plan.ship.transit_invariant_holds());
        assert_eq!(plan.credits_after, player.credits - plan.price);
    }

    #[test]
    fn install_rejects_wrong_slot_type() {
        let player = test_player(10_000);
        let ship = test_ship();
        let err = plan_install_upgrade(&player, &ship, &[], "cargo_1", "pulse_laser", 1)
            .expect_err("weapon in cargo slot");
        assert!(matches!(err, ActionError::SlotTypeMismatch { .. }));
        assert_eq!(err.error_code(), ErrorCode::PreconditionFailed);
    }

    #[test]
    fn install_rejects_occupied_slot() {
        let player = test_player(10_000);
        let ship = test_ship();
        let installed = vec![UpgradeItem {
            slot_id: "weapon_1".into(),
            module_id: "pulse_laser".into(),
            tier: 1,
        }];
        let err = plan_install_upgrade(&player, &ship, &installed, "weapon_1", "pulse_laser", 2)
            .expect_err("occupied");
        assert!(matches!(err, ActionError::SlotOccupied(_)));
    }

    #[test]
    fn remove_refunds_half_the_module_cost() {
        let player = test_player(0);
        let ship = test_ship();
        let installed = vec![UpgradeItem {
            slot_id: "weapon_1".into(),
            module_id: "pulse_laser".into(),
            tier: 2,
        }];
        let plan =
            plan_remove_upgrade(&player, &ship, &installed, "weapon_1").expect("valid removal");
        assert_eq!(plan.refund, 350);
        assert_eq!(plan.credits_after, 350);
    }

    #[test]
    fn remove_from_empty_slot_fails() {
        let player = test_player(0);
        let ship = test_ship();
        let err = plan_remove_upgrade(&player, &ship, &[], "weapon_1").expect_err("empty slot");
        assert!(matches!(err, ActionError::SlotEmpty(_)));
    }

    #[test]
    fn refuel_clamps_to_tank_headroom() {
        let player = test_player(10_000);
        let mut ship = test_ship();
        ship.fuel = ship.max_fuel - 7;
        let plan = plan_refuel(&player, &ship, 50).expect("valid refuel");
        assert_eq!(plan.amount_added, 7);
        assert_eq!(plan.cost, 7 * FUEL_UNIT_PRICE);
        assert_eq!(plan.fuel_after, ship.max_fuel);
    }

    #[test]
    fn refuel_of_full_tank_fails() {
        let player = test_player(10_000);
        let ship = test_ship();
        let err = plan_refuel(&player, &ship, 10).expect_err("already full");
        assert!(matches!(err, ActionError::FuelAlreadyFull(_)));
    }

    #[test]
    fn convoy_service_tops_members_up_to_fraction() {
        let player = test_player(10_000);
        let mut a = test_ship();
        a.ship_id = "ship_a".into();
        a.fuel = 10;
        let mut b = test_ship();
        b.ship_id = "ship_b".into();
        b.fuel = 70;

        let plan = plan_convoy_service(
            &player,
            "convoy_01",
            &[a.clone(), b.clone()],
            ConvoyServiceKind::Refuel,
            50,
        )
        .expect("valid service");

        // freighter max_fuel = 80, 50% target = 40.
        assert_eq!(plan.members[0].amount_restored, 30);
        assert_eq!(plan.members[1].amount_restored, 0);
        assert_eq!(plan.total_cost, 30 * FUEL_UNIT_PRICE);
    }

    #[test]
    fn convoy_service_rejects_bad_fraction_and_small_convoys() {
        let player = test_player(10_000);
        let a = test_ship();
        let err = plan_convoy_service(
            &player,
            "convoy_01",
            &[a.clone()],
            ConvoyServiceKind::Repair,
            120,
        )
        .expect_err("fraction out of range");
        assert_eq!(err.error_code(), ErrorCode::InvalidRequest);

        let err =
            plan_convoy_service(&player, "convoy_01", &[a], ConvoyServiceKind::Repair, 50)
                .expect_err("one ship is not a convoy");
        assert!(matches!(err, ActionError::ConvoyTooSmall(_)));
    }
}
