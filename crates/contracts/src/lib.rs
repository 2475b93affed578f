//! v1 cross-boundary contracts for the world core, API, persistence, and observers.

pub mod serde_u64_string;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SCHEMA_VERSION_V1: &str = "1.0";

// ---------------------------------------------------------------------------
// World clock
// ---------------------------------------------------------------------------

/// The singleton world clock row. Mutated only by the tick scheduler, under
/// the conditional-update gate; everything else reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldClock {
    pub schema_version: String,
    pub current_tick: u64,
    pub tick_interval_ms: u64,
    pub last_tick_at_ms: u64,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
}

impl fmt::Display for WorldClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={} interval_ms={} last_tick_at_ms={}",
            self.current_tick, self.tick_interval_ms, self.last_tick_at_ms
        )
    }
}

// ---------------------------------------------------------------------------
// Galaxy graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StarSystem {
    pub system_id: String,
    pub name: String,
    pub pos_x: i64,
    pub pos_y: i64,
    /// Engagement pressure 0–100; feeds the arrival danger roll.
    pub danger_level: i64,
}

/// A weighted, bidirectional jump lane between two systems.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    pub connection_id: String,
    pub from_system_id: String,
    pub to_system_id: String,
    pub fuel_cost: i64,
}

// ---------------------------------------------------------------------------
// Stations, goods, markets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EconomyType {
    Agricultural,
    Industrial,
    Mining,
    Refinery,
    TechHub,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Station {
    pub station_id: String,
    pub system_id: String,
    pub name: String,
    pub economy_type: EconomyType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Good {
    pub good_id: String,
    pub name: String,
    pub base_price: i64,
    /// Lower price clamp as a percentage of base price (100 = base).
    pub price_floor_pct: i64,
    /// Upper price clamp as a percentage of base price.
    pub price_ceiling_pct: i64,
}

/// A station's economy-type relationship to a good. Determines the
/// equilibrium target the market entry drifts toward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoodRelation {
    Produces,
    Consumes,
    Neutral,
}

/// One persisted market row per (station, good). Price is derived on read,
/// never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketEntry {
    pub station_id: String,
    pub good_id: String,
    pub supply: i64,
    pub demand: i64,
}

/// Read-model for market queries and trade responses: the entry plus its
/// resolved classification and the derived current price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketQuote {
    pub station_id: String,
    pub good_id: String,
    pub supply: i64,
    pub demand: i64,
    pub relation: GoodRelation,
    pub current_price: i64,
}

// ---------------------------------------------------------------------------
// Players, ships, convoys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub player_id: String,
    pub name: String,
    pub credits: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CargoItem {
    pub good_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShipStatus {
    Docked,
    InTransit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ship {
    pub ship_id: String,
    pub player_id: String,
    pub ship_type: String,
    pub name: String,
    pub fuel: i64,
    pub max_fuel: i64,
    pub hull: i64,
    pub max_hull: i64,
    pub shield: i64,
    pub max_shield: i64,
    pub speed: i64,
    pub firepower: i64,
    pub evasion: i64,
    pub cargo_capacity: i64,
    pub status: ShipStatus,
    pub system_id: String,
    pub destination_system_id: Option<String>,
    pub departure_tick: Option<u64>,
    pub arrival_tick: Option<u64>,
    pub convoy_id: Option<String>,
}

impl Ship {
    /// Transit fields are populated iff the ship is in transit, and the
    /// arrival tick never precedes the departure tick.
    pub fn transit_invariant_holds(&self) -> bool {
        match self.status {
            ShipStatus::Docked => {
                self.destination_system_id.is_none()
                    && self.departure_tick.is_none()
                    && self.arrival_tick.is_none()
            }
            ShipStatus::InTransit => match (
                &self.destination_system_id,
                self.departure_tick,
                self.arrival_tick,
            ) {
                (Some(_), Some(departure), Some(arrival)) => arrival >= departure,
                _ => false,
            },
        }
    }
}

/// A named group of two or more ships of one player that navigate together
/// with a combined fuel view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Convoy {
    pub convoy_id: String,
    pub player_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpgradeItem {
    pub slot_id: String,
    pub module_id: String,
    pub tier: u8,
}

// ---------------------------------------------------------------------------
// Battles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    Active,
    PlayerVictory,
    PlayerDefeat,
    PlayerRetreat,
    EnemyRetreat,
}

impl BattleStatus {
    pub fn is_terminal(self) -> bool {
        self != BattleStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleRound {
    pub round: u32,
    pub player_damage_dealt: i64,
    pub enemy_damage_dealt: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Battle {
    pub battle_id: String,
    pub player_id: String,
    pub ship_id: String,
    pub system_id: String,
    pub enemy_name: String,
    pub player_strength: i64,
    pub player_max_strength: i64,
    pub enemy_strength: i64,
    pub enemy_max_strength: i64,
    pub player_morale: i64,
    pub enemy_morale: i64,
    pub rounds_completed: u32,
    pub round_history: Vec<BattleRound>,
    pub status: BattleStatus,
    pub started_tick: u64,
    pub next_round_tick: u64,
}

// ---------------------------------------------------------------------------
// World events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorldEventType {
    Conflict,
    Shortage,
    TradeBoom,
    PirateActivity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorldEventPhase {
    Brewing,
    Active,
    Waning,
    Resolved,
}

impl WorldEventPhase {
    pub fn next(self) -> WorldEventPhase {
        match self {
            WorldEventPhase::Brewing => WorldEventPhase::Active,
            WorldEventPhase::Active => WorldEventPhase::Waning,
            WorldEventPhase::Waning | WorldEventPhase::Resolved => WorldEventPhase::Resolved,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == WorldEventPhase::Resolved
    }
}

/// A system-scoped phased occurrence. Advances phase when the current tick
/// passes `phase_start_tick + phase_duration`; deleted once resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldEvent {
    pub event_id: String,
    pub event_type: WorldEventType,
    pub system_id: String,
    pub phase: WorldEventPhase,
    pub severity: i64,
    pub phase_start_tick: u64,
    pub phase_duration: u64,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    pub entity_kind: String,
    pub entity_id: String,
}

/// Durable per-player record written by the same tick processors that emit
/// stream events; the fallback for observers who were not connected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub notification_id: i64,
    pub player_id: String,
    pub kind: EventType,
    pub message: String,
    pub entity_refs: Vec<EntityRef>,
    pub tick: u64,
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPage {
    pub schema_version: String,
    pub items: Vec<Notification>,
    pub next_cursor: Option<i64>,
    pub total: i64,
}

// ---------------------------------------------------------------------------
// Domain events and the tick stream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ShipDeparted,
    ShipArrived,
    MarketsDrifted,
    WorldEventPhaseChanged,
    WorldEventResolved,
    BattleStarted,
    BattleRoundResolved,
    BattleEnded,
    TradeExecuted,
    ShipPurchased,
    UpgradeInstalled,
    UpgradeRemoved,
    ShipRefueled,
    ConvoyServiced,
}

impl EventType {
    /// Stable wire key used in the tick message event maps.
    pub fn name(self) -> &'static str {
        match self {
            EventType::ShipDeparted => "ship_departed",
            EventType::ShipArrived => "ship_arrived",
            EventType::MarketsDrifted => "markets_drifted",
            EventType::WorldEventPhaseChanged => "world_event_phase_changed",
            EventType::WorldEventResolved => "world_event_resolved",
            EventType::BattleStarted => "battle_started",
            EventType::BattleRoundResolved => "battle_round_resolved",
            EventType::BattleEnded => "battle_ended",
            EventType::TradeExecuted => "trade_executed",
            EventType::ShipPurchased => "ship_purchased",
            EventType::UpgradeInstalled => "upgrade_installed",
            EventType::UpgradeRemoved => "upgrade_removed",
            EventType::ShipRefueled => "ship_refueled",
            EventType::ConvoyServiced => "convoy_serviced",
        }
    }

    pub fn from_name(name: &str) -> Option<EventType> {
        match name {
            "ship_departed" => Some(EventType::ShipDeparted),
            "ship_arrived" => Some(EventType::ShipArrived),
            "markets_drifted" => Some(EventType::MarketsDrifted),
            "world_event_phase_changed" => Some(EventType::WorldEventPhaseChanged),
            "world_event_resolved" => Some(EventType::WorldEventResolved),
            "battle_started" => Some(EventType::BattleStarted),
            "battle_round_resolved" => Some(EventType::BattleRoundResolved),
            "battle_ended" => Some(EventType::BattleEnded),
            "trade_executed" => Some(EventType::TradeExecuted),
            "ship_purchased" => Some(EventType::ShipPurchased),
            "upgrade_installed" => Some(EventType::UpgradeInstalled),
            "upgrade_removed" => Some(EventType::UpgradeRemoved),
            "ship_refueled" => Some(EventType::ShipRefueled),
            "convoy_serviced" => Some(EventType::ConvoyServiced),
            _ => None,
        }
    }
}

/// One event emitted by a tick processor or a request-scoped mutation.
/// `player_id = Some(..)` scopes delivery to that player's observers;
/// `None` means globally visible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainEvent {
    pub event_type: EventType,
    pub player_id: Option<String>,
    pub payload: Value,
}

impl DomainEvent {
    pub fn global(event_type: EventType, payload: Value) -> Self {
        Self {
            event_type,
            player_id: None,
            payload,
        }
    }

    pub fn for_player(event_type: EventType, player_id: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type,
            player_id: Some(player_id.into()),
            payload,
        }
    }
}

/// The full batch of events one advanced tick produced, published to the
/// fan-out hub only after the tick transaction committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickBatch {
    pub tick: u64,
    pub tick_interval_ms: u64,
    pub events: Vec<DomainEvent>,
}

/// The wire message one observer receives: the batch partitioned into
/// globally-visible payloads and payloads scoped to that observer's player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickMessage {
    pub schema_version: String,
    pub current_tick: u64,
    pub tick_rate_ms: u64,
    pub events: BTreeMap<String, Vec<Value>>,
    pub player_events: BTreeMap<String, Vec<Value>>,
}

impl TickMessage {
    /// The empty snapshot sent immediately on stream connect.
    pub fn snapshot(clock: &WorldClock) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            current_tick: clock.current_tick,
            tick_rate_ms: clock.tick_interval_ms,
            events: BTreeMap::new(),
            player_events: BTreeMap::new(),
        }
    }

    /// Partition a tick batch for one observer. Events scoped to other
    /// players are dropped entirely.
    pub fn from_batch(batch: &TickBatch, observer_player_id: Option<&str>) -> Self {
        let mut events: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        let mut player_events: BTreeMap<String, Vec<Value>> = BTreeMap::new();

        for event in &batch.events {
            let key = event.event_type.name().to_string();
            match &event.player_id {
                None => events.entry(key).or_default().push(event.payload.clone()),
                Some(owner) => {
                    if observer_player_id == Some(owner.as_str()) {
                        player_events
                            .entry(key)
                            .or_default()
                            .push(event.payload.clone());
                    }
                }
            }
        }

        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            current_tick: batch.tick,
            tick_rate_ms: batch.tick_interval_ms,
            events,
            player_events,
        }
    }
}

// ---------------------------------------------------------------------------
// API errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    PreconditionFailed,
    StateChanged,
    NotFound,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

// ---------------------------------------------------------------------------
// Action requests and responses
// ---------------------------------------------------------------------------

/// Navigation target: a single ship or a whole convoy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum MoverId {
    Ship(String),
    Convoy(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigateRequest {
    pub mover: MoverId,
    pub route: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigateResponse {
    pub schema_version: String,
    pub mover: MoverId,
    pub route: Vec<String>,
    pub fuel_spent_per_ship: i64,
    pub departure_tick: u64,
    pub arrival_tick: u64,
    pub ships: Vec<Ship>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeRequest {
    pub ship_id: String,
    pub station_id: String,
    pub good_id: String,
    pub quantity: i64,
    pub side: TradeSide,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeResponse {
    pub schema_version: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub unit_price: i64,
    pub total_price: i64,
    pub credits: i64,
    pub cargo: Vec<CargoItem>,
    pub market: MarketQuote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PurchaseShipRequest {
    pub player_id: String,
    pub system_id: String,
    pub ship_type: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PurchaseShipResponse {
    pub schema_version: String,
    pub ship: Ship,
    pub price: i64,
    pub credits: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallUpgradeRequest {
    pub ship_id: String,
    pub slot_id: String,
    pub module_id: String,
    pub tier: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoveUpgradeRequest {
    pub ship_id: String,
    pub slot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpgradeResponse {
    pub schema_version: String,
    pub ship_id: String,
    pub slot_id: String,
    /// The module now occupying the slot; `None` after a removal.
    pub installed: Option<UpgradeItem>,
    /// Credits charged; negative for a refund.
    pub amount_charged: i64,
    pub credits: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefuelRequest {
    pub ship_id: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefuelResponse {
    pub schema_version: String,
    pub ship_id: String,
    pub amount_added: i64,
    pub fuel: i64,
    pub cost: i64,
    pub credits: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConvoyServiceRequest {
    pub convoy_id: String,
    /// Target percentage of the relevant maximum each member is topped up to.
    pub fraction_pct: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConvoyMemberService {
    pub ship_id: String,
    pub amount_restored: i64,
    pub cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConvoyServiceResponse {
    pub schema_version: String,
    pub convoy_id: String,
    pub serviced: Vec<ConvoyMemberService>,
    pub total_cost: i64,
    pub credits: i64,
}

// ---------------------------------------------------------------------------
// Query envelope
// ---------------------------------------------------------------------------

/// Generic read-query envelope: every point-in-time query reports the tick it
/// was generated at alongside its payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub schema_version: String,
    pub query_type: String,
    pub generated_at_tick: u64,
    pub data: Value,
}
