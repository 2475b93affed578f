//! Mean-reverting supply/demand evolution and the derived price curve.
//!
//! `drift_levels` advances one market entry by one tick: pull toward the
//! equilibrium target for the station's relationship to the good, add uniform
//! noise, apply production/consumption flow, clamp. The current price is
//! derived on read and never stored.

use contracts::{Good, GoodRelation, MarketEntry, MarketQuote, TradeSide};

use crate::rng::SplitMix64;

/// Smoothing constant for the price curve; keeps near-empty markets off the
/// ratio asymptote.
pub const PRICE_SMOOTHING: i64 = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct DriftParams {
    /// Fraction of the distance to equilibrium closed per tick.
    pub reversion_rate: f64,
    /// Uniform noise bound applied independently to supply and demand.
    pub noise_amplitude: i64,
    pub min_level: i64,
    pub max_level: i64,
    /// Flat supply added per tick at producing stations.
    pub production_rate: i64,
    /// Flat supply removed per tick at consuming stations.
    pub consumption_rate: i64,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            reversion_rate: 0.1,
            noise_amplitude: 6,
            min_level: 0,
            max_level: 200,
            production_rate: 4,
            consumption_rate: 4,
        }
    }
}

/// Supply/demand pair a market drifts toward, fixed per classification.
pub fn equilibrium_target(relation: GoodRelation) -> (i64, i64) {
    match relation {
        GoodRelation::Produces => (160, 40),
        GoodRelation::Consumes => (40, 160),
        GoodRelation::Neutral => (100, 100),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketLevels {
    pub supply: i64,
    pub demand: i64,
}

fn revert(current: i64, target: i64, rate: f64) -> f64 {
    current as f64 + (target - current) as f64 * rate
}

/// One drift step for one entry. Pure; all randomness comes from `rng`.
pub fn drift_levels(
    levels: MarketLevels,
    relation: GoodRelation,
    params: &DriftParams,
    rng: &mut SplitMix64,
) -> MarketLevels {
    let (target_supply, target_demand) = equilibrium_target(relation);

    let mut supply = revert(levels.supply, target_supply, params.reversion_rate).round() as i64;
    let mut demand = revert(levels.demand, target_demand, params.reversion_rate).round() as i64;

    supply += rng.range_i64(-params.noise_amplitude, params.noise_amplitude);
    demand += rng.range_i64(-params.noise_amplitude, params.noise_amplitude);

    supply = supply.clamp(params.min_level, params.max_level);
    demand = demand.clamp(params.min_level, params.max_level);

    match relation {
        GoodRelation::Produces => {
            supply += params.production_rate;
            demand -= (0.3 * params.production_rate as f64).round() as i64;
        }
        GoodRelation::Consumes => {
            supply -= params.consumption_rate;
            demand += (0.5 * params.consumption_rate as f64).round() as i64;
        }
        GoodRelation::Neutral => {}
    }

    MarketLevels {
        supply: supply.clamp(params.min_level, params.max_level),
        demand: demand.clamp(params.min_level, params.max_level),
    }
}

/// Drift every entry in order. Entry order is the caller's load order, which
/// must be stable for the tick stream to be replayable.
pub fn drift_all(
    entries: &[(MarketEntry, GoodRelation)],
    params: &DriftParams,
    rng: &mut SplitMix64,
) -> Vec<MarketEntry> {
    entries
        .iter()
        .map(|(entry, relation)| {
            let levels = drift_levels(
                MarketLevels {
                    supply: entry.supply,
                    demand: entry.demand,
                },
                *relation,
                params,
                rng,
            );
            MarketEntry {
                station_id: entry.station_id.clone(),
                good_id: entry.good_id.clone(),
                supply: levels.supply,
                demand: levels.demand,
            }
        })
        .collect()
}

/// Derived current price: `base × (demand + S)/(supply + S)`, rounded to
/// integer currency and clamped to the good's floor/ceiling multipliers.
/// Monotone decreasing in supply, increasing in demand.
pub fn current_price(good: &Good, supply: i64, demand: i64) -> i64 {
    let supply = supply.max(0);
    let demand = demand.max(0);
    let raw = good.base_price as f64 * (demand + PRICE_SMOOTHING) as f64
        / (supply + PRICE_SMOOTHING) as f64;
    let floor = good.base_price * good.price_floor_pct / 100;
    let ceiling = good.base_price * good.price_ceiling_pct / 100;
    (raw.round() as i64).clamp(floor, ceiling)
}

pub fn quote(entry: &MarketEntry, good: &Good, relation: GoodRelation) -> MarketQuote {
    MarketQuote {
        station_id: entry.station_id.clone(),
        good_id: entry.good_id.clone(),
        supply: entry.supply,
        demand: entry.demand,
        relation,
        current_price: current_price(good, entry.supply, entry.demand),
    }
}

/// Market impact of a player trade: buying drains supply and nudges demand
/// up; selling does the reverse. Applied after the price is quoted.
pub fn trade_level_shift(
    levels: MarketLevels,
    side: TradeSide,
    quantity: i64,
    params: &DriftParams,
) -> MarketLevels {
    let (supply, demand) = match side {
        TradeSide::Buy => (levels.supply - quantity, levels.demand + quantity / 2),
        TradeSide::Sell => (levels.supply + quantity, levels.demand - quantity / 2),
    };
    MarketLevels {
        supply: supply.clamp(params.min_level, params.max_level),
        demand: demand.clamp(params.min_level, params.max_level),
    }
}
