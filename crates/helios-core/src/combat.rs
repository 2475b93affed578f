//! Multi-round battle resolution and escort protection.
//!
//! A battle is a state machine advanced once every `ROUND_INTERVAL_TICKS`
//! while active. Each round both sides exchange variance-scaled damage
//! reduced by the opponent's evasion, morale shifts toward the side dealing
//! more damage, and the terminal conditions are checked in a fixed order:
//! strength exhaustion before morale break, player side before enemy side.

use contracts::{Battle, BattleRound, BattleStatus};

use crate::rng::SplitMix64;

/// Ticks between battle rounds.
pub const ROUND_INTERVAL_TICKS: u64 = 3;

/// Damage per point of firepower before variance and evasion.
pub const FIREPOWER_TO_DAMAGE: f64 = 2.0;

/// Uniform damage variance: each roll lands in `[1 − v, 1 + v]` × base.
pub const DAMAGE_VARIANCE: f64 = 0.25;

/// Half-saturation constant of the evasion curve.
pub const EVASION_K: f64 = 50.0;

/// Evasion can never absorb more than this fraction of incoming damage.
pub const MAX_EVASION_REDUCTION: f64 = 0.6;

pub const BASE_MORALE_GAIN: i64 = 4;
pub const BASE_MORALE_LOSS: i64 = 6;

/// Extra morale loss for the losing side when the round's damage ratio
/// exceeds `LOPSIDED_RATIO`.
pub const LOPSIDED_MORALE_SWING: i64 = 10;
pub const LOPSIDED_RATIO: f64 = 2.0;

/// A side whose morale falls below this retreats instead of fighting on.
pub const MORALE_BREAK_THRESHOLD: i64 = 25;

/// Half-saturation constant of the escort protection curve.
pub const ESCORT_K: f64 = 40.0;

/// Escort protection saturates at this chance reduction.
pub const MAX_ESCORT_REDUCTION: f64 = 0.75;

pub const MORALE_MAX: i64 = 100;

/// Offensive/defensive stats of one battle side for a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideStats {
    pub firepower: i64,
    pub evasion: i64,
}

/// Fraction of incoming damage absorbed by evasion, diminishing returns,
/// capped at `MAX_EVASION_REDUCTION`.
pub fn evasion_reduction(evasion: i64) -> f64 {
    let evasion = evasion.max(0) as f64;
    (evasion / (evasion + EVASION_K)).min(MAX_EVASION_REDUCTION)
}

fn roll_damage(firepower: i64, opponent_evasion: i64, rng: &mut SplitMix64) -> i64 {
    let base = firepower.max(0) as f64 * FIREPOWER_TO_DAMAGE;
    let variance = 1.0 + rng.signed_unit() * DAMAGE_VARIANCE;
    let dealt = base * variance * (1.0 - evasion_reduction(opponent_evasion));
    dealt.round().max(0.0) as i64
}

/// Enemy round stats derived from the battle row, so a round is a pure
/// function of the persisted state.
pub fn enemy_stats(battle: &Battle) -> SideStats {
    SideStats {
        firepower: battle.enemy_max_strength / 4 + 4,
        evasion: 12,
    }
}

/// Advance one round. Returns the updated battle; `status` is terminal when
/// a side ran out of strength or broke. When both sides hit zero strength in
/// the same round, the player's defeat is reported.
pub fn resolve_round(
    mut battle: Battle,
    player: SideStats,
    enemy: SideStats,
    rng: &mut SplitMix64,
) -> Battle {
    if battle.status.is_terminal() {
        return battle;
    }

    let player_damage_dealt = roll_damage(player.firepower, enemy.evasion, rng);
    let enemy_damage_dealt = roll_damage(enemy.firepower, player.evasion, rng);

    battle.enemy_strength = (battle.enemy_strength - player_damage_dealt).max(0);
    battle.player_strength = (battle.player_strength - enemy_damage_dealt).max(0);

    if player_damage_dealt > enemy_damage_dealt {
        battle.player_morale = (battle.player_morale + BASE_MORALE_GAIN).min(MORALE_MAX);
        battle.enemy_morale -= BASE_MORALE_LOSS;
        if player_damage_dealt as f64 > enemy_damage_dealt as f64 * LOPSIDED_RATIO {
            battle.enemy_morale -= LOPSIDED_MORALE_SWING;
        }
    } else if enemy_damage_dealt > player_damage_dealt {
        battle.enemy_morale = (battle.enemy_morale + BASE_MORALE_GAIN).min(MORALE_MAX);
        battle.player_morale -= BASE_MORALE_LOSS;
        if enemy_damage_dealt as f64 > player_damage_dealt as f64 * LOPSIDED_RATIO {
            battle.player_morale -= LOPSIDED_MORALE_SWING;
        }
    }

    battle.rounds_completed += 1;
    battle.round_history.push(BattleRound {
        round: battle.rounds_completed,
        player_damage_dealt,
        enemy_damage_dealt,
    });

    battle.status = terminal_status(&battle);
    battle
}

fn terminal_status(battle: &Battle) -> BattleStatus {
    if battle.player_strength <= 0 {
        return BattleStatus::PlayerDefeat;
    }
    if battle.enemy_strength <= 0 {
        return BattleStatus::PlayerVictory;
    }
    if battle.player_morale < MORALE_BREAK_THRESHOLD {
        return BattleStatus::PlayerRetreat;
    }
    if battle.enemy_morale < MORALE_BREAK_THRESHOLD {
        return BattleStatus::EnemyRetreat;
    }
    BattleStatus::Active
}

// ---------------------------------------------------------------------------
// Escort protection and the engagement trigger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscortProtection {
    /// Multiplier applied to the engagement chance: `chance × (1 − this)`.
    pub chance_reduction: f64,
    /// Multiplier applied to the damage-roll severity; half the chance
    /// reduction.
    pub severity_reduction: f64,
}

/// Protection granted by accompanying firepower. Zero escorts give zero
/// reduction; the curve grows from the first point of firepower and
/// saturates at `MAX_ESCORT_REDUCTION`.
pub fn compute_escort_protection(total_escort_firepower: i64) -> EscortProtection {
    let firepower = total_escort_firepower.max(0) as f64;
    let chance_reduction = if firepower > 0.0 {
        (firepower / (firepower + ESCORT_K)).min(MAX_ESCORT_REDUCTION)
    } else {
        0.0
    };
    EscortProtection {
        chance_reduction,
        severity_reduction: chance_reduction / 2.0,
    }
}

/// The stochastic check run on each arrival, before any battle exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engagement {
    pub enemy_name: String,
    pub enemy_strength: i64,
    /// Initial damage applied to the arriving ship, already scaled by the
    /// escort severity reduction.
    pub arrival_damage: i64,
}

/// Pluggable policy deciding whether an arrival triggers a battle. The tick
/// pipeline calls this once per arriving ship; the exact probability curve
/// is an implementation detail of the policy.
pub trait EngagementPolicy {
    fn roll_engagement(
        &self,
        system_danger: i64,
        escort_firepower: i64,
        rng: &mut SplitMix64,
    ) -> Option<Engagement>;
}

/// Default policy: engagement chance scales linearly with system danger up
/// to 50%, reduced by escort protection; severity scales with danger and is
/// reduced by half the escort protection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DangerRollPolicy;

impl EngagementPolicy for DangerRollPolicy {
    fn roll_engagement(
        &self,
        system_danger: i64,
        escort_firepower: i64,
        rng: &mut SplitMix64,
    ) -> Option<Engagement> {
        let danger = system_danger.clamp(0, 100);
        let protection = compute_escort_protection(escort_firepower);
        let chance = (danger as f64 / 200.0) * (1.0 - protection.chance_reduction);
        if rng.next_f64() >= chance {
            return None;
        }

        let severity_scale = 1.0 - protection.severity_reduction;
        let enemy_strength =
            ((40 + danger + rng.range_i64(0, 30)) as f64 * severity_scale).round() as i64;
        let arrival_damage =
            ((danger / 4 + rng.range_i64(0, 10)) as f64 * severity_scale).round() as i64;

        Some(Engagement {
            enemy_name: "raider".to_string(),
            enemy_strength: enemy_strength.max(10),
            arrival_damage: arrival_damage.max(0),
        })
    }
}
