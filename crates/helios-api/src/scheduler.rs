//! The tick scheduler: the only writer of the world clock.
//!
//! A background task polls on a short period and attempts to advance the
//! world once per `tick_interval_ms` of wall clock. One attempt is one
//! transaction: the conditional update on `world.current_tick` gates the
//! boundary (losers no-op), then the ordered processor pipeline runs against
//! the same transaction, and the collected events are published to the hub
//! only after a successful commit. A processor error rolls the whole tick
//! back; the next poll retries the same boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use contracts::{Battle, BattleStatus, DomainEvent, EntityRef, EventType, TickBatch};
use helios_core::catalog;
use helios_core::combat::{
    self, DangerRollPolicy, EngagementPolicy, SideStats, ROUND_INTERVAL_TICKS,
};
use helios_core::economy::{self, DriftParams};
use helios_core::rng::SplitMix64;
use rusqlite::Connection;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::hub::EventHub;
use crate::store::{self, SqliteWorldStore, StoreError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Starting morale for both sides of a fresh engagement.
const INITIAL_MORALE: i64 = 70;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// One stage of the tick pipeline. Stages read current rows through the tick
/// transaction, write next rows, and return the domain events to publish.
/// New stages can be appended without touching the scheduler.
pub trait TickProcessor: Send + Sync {
    fn name(&self) -> &'static str;
    fn process(
        &self,
        conn: &Connection,
        tick: u64,
        rng: &mut SplitMix64,
    ) -> Result<Vec<DomainEvent>, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The wall-clock interval has not elapsed yet.
    NotDue,
    /// Another driver advanced this boundary first; nothing was done.
    LostRace,
    /// The tick committed; the batch carries every event it produced.
    Advanced(TickBatch),
}

pub struct TickScheduler {
    store: Arc<Mutex<SqliteWorldStore>>,
    hub: EventHub,
    processors: Vec<Box<dyn TickProcessor>>,
    poll_interval: Duration,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl TickScheduler {
    /// Scheduler with the standard pipeline: arrivals (with engagement
    /// rolls), economic drift, world-event progression, battle rounds.
    pub fn new(store: Arc<Mutex<SqliteWorldStore>>, hub: EventHub) -> Self {
        Self::with_processors(store, hub, default_processors(Box::new(DangerRollPolicy)))
    }

    pub fn with_processors(
        store: Arc<Mutex<SqliteWorldStore>>,
        hub: EventHub,
        processors: Vec<Box<dyn TickProcessor>>,
    ) -> Self {
        Self {
            store,
            hub,
            processors,
            poll_interval: DEFAULT_POLL_INTERVAL,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Idempotent: the first call spawns the polling task, later calls are
    /// no-ops.
    pub fn ensure_started(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if scheduler.stopped.load(Ordering::SeqCst) {
                    break;
                }
                scheduler.poll_once().await;
            }
            debug!("tick scheduler stopped");
        });
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// One poll: attempt an advance and publish the batch on success.
    /// Failures are logged and retried on the next poll, never propagated.
    pub async fn poll_once(&self) {
        match self.try_advance(now_ms()).await {
            Ok(TickOutcome::Advanced(batch)) => {
                info!(tick = batch.tick, events = batch.events.len(), "tick advanced");
                self.hub.publish(batch);
            }
            Ok(TickOutcome::NotDue) | Ok(TickOutcome::LostRace) => {}
            Err(err) => {
                error!(error = %err, "tick attempt rolled back; boundary will be retried");
            }
        }
    }

    /// One advance attempt at the given wall-clock time. The returned batch
    /// has NOT been published; `poll_once` publishes only after the commit
    /// this method performs.
    pub async fn try_advance(&self, now_ms: u64) -> Result<TickOutcome, StoreError> {
        let mut store = self.store.lock().await;
        let clock = store.clock()?;
        if now_ms.saturating_sub(clock.last_tick_at_ms) < clock.tick_interval_ms {
            return Ok(TickOutcome::NotDue);
        }

        let observed_tick = clock.current_tick;
        let seed = clock.seed;
        let tick_interval_ms = clock.tick_interval_ms;

        let tx = store.connection_mut().transaction()?;
        if !store::cas_advance_tick(&tx, observed_tick, now_ms)? {
            // Lost the boundary race; dropping the transaction is the no-op.
            return Ok(TickOutcome::LostRace);
        }

        let new_tick = observed_tick + 1;
        let mut rng = SplitMix64::for_tick(seed, new_tick);
        let mut events = Vec::new();
        for processor in &self.processors {
            let mut stage_events = processor.process(&tx, new_tick, &mut rng)?;
            events.append(&mut stage_events);
        }
        tx.commit()?;

        Ok(TickOutcome::Advanced(TickBatch {
            tick: new_tick,
            tick_interval_ms,
            events,
        }))
    }
}

pub fn default_processors(
    policy: Box<dyn EngagementPolicy + Send + Sync>,
) -> Vec<Box<dyn TickProcessor>> {
    vec![
        Box::new(ArrivalsProcessor { policy }),
        Box::new(EconomyDriftProcessor {
            params: DriftParams::default(),
        }),
        Box::new(WorldEventProcessor),
        Box::new(BattleProcessor),
    ]
}

// ---------------------------------------------------------------------------
// Arrivals
// ---------------------------------------------------------------------------

/// Docks every ship whose arrival tick has passed, then runs the engagement
/// roll for each arrival: system danger scaled down by escort protection
/// from the player's other docked ships at the destination.
pub struct ArrivalsProcessor {
    pub policy: Box<dyn EngagementPolicy + Send + Sync>,
}

impl TickProcessor for ArrivalsProcessor {
    fn name(&self) -> &'static str {
        "arrivals"
    }

    fn process(
        &self,
        conn: &Connection,
        tick: u64,
        rng: &mut SplitMix64,
    ) -> Result<Vec<DomainEvent>, StoreError> {
        let mut events = Vec::new();
        for ship in store::ships_in_transit_due(conn, tick)? {
            let Some(destination) = ship.destination_system_id.clone() else {
                continue;
            };
            store::finish_arrival(conn, &ship.ship_id, &destination)?;

            events.push(DomainEvent::for_player(
                EventType::ShipArrived,
                ship.player_id.clone(),
                json!({
                    "ship_id": ship.ship_id,
                    "system_id": destination,
                    "tick": tick,
                }),
            ));
            store::insert_notification(
                conn,
                &ship.player_id,
                EventType::ShipArrived,
                &format!("{} arrived at {destination}", ship.name),
                &[EntityRef {
                    entity_kind: "ship".to_string(),
                    entity_id: ship.ship_id.clone(),
                }],
                tick,
            )?;

            let danger = store::system_danger(conn, &destination)?;
            let escort =
                store::escort_firepower(conn, &ship.player_id, &destination, &ship.ship_id)?;
            if let Some(engagement) = self.policy.roll_engagement(danger, escort, rng) {
                // Arrival damage lands on shields first; the hull never
                // drops below one from the trigger roll alone.
                let absorbed = engagement.arrival_damage.min(ship.shield);
                let shield = ship.shield - absorbed;
                let hull = (ship.hull - (engagement.arrival_damage - absorbed)).max(1);
                store::apply_ship_damage(conn, &ship.ship_id, shield, hull)?;

                let battle = Battle {
                    battle_id: store::next_id(conn, "battle")?,
                    player_id: ship.player_id.clone(),
                    ship_id: ship.ship_id.clone(),
                    system_id: destination.clone(),
                    enemy_name: engagement.enemy_name.clone(),
                    player_strength: hull + shield,
                    player_max_strength: ship.max_hull + ship.max_shield,
                    enemy_strength: engagement.enemy_strength,
                    enemy_max_strength: engagement.enemy_strength,
                    player_morale: INITIAL_MORALE,
                    enemy_morale: INITIAL_MORALE,
                    rounds_completed: 0,
                    round_history: Vec::new(),
                    status: BattleStatus::Active,
                    started_tick: tick,
                    next_round_tick: tick + ROUND_INTERVAL_TICKS,
                };
                store::insert_battle(conn, &battle)?;

                events.push(DomainEvent::for_player(
                    EventType::BattleStarted,
                    ship.player_id.clone(),
                    json!({
                        "battle_id": battle.battle_id,
                        "ship_id": ship.ship_id,
                        "system_id": destination,
                        "enemy_name": battle.enemy_name,
                        "arrival_damage": engagement.arrival_damage,
                    }),
                ));
                store::insert_notification(
                    conn,
                    &ship.player_id,
                    EventType::BattleStarted,
                    &format!("{} was engaged by a {} at {destination}", ship.name, battle.enemy_name),
                    &[EntityRef {
                        entity_kind: "battle".to_string(),
                        entity_id: battle.battle_id.clone(),
                    }],
                    tick,
                )?;
            }
        }
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// Economic drift
// ---------------------------------------------------------------------------

pub struct EconomyDriftProcessor {
    pub params: DriftParams,
}

impl TickProcessor for EconomyDriftProcessor {
    fn name(&self) -> &'static str {
        "economy_drift"
    }

    fn process(
        &self,
        conn: &Connection,
        _tick: u64,
        rng: &mut SplitMix64,
    ) -> Result<Vec<DomainEvent>, StoreError> {
        let classified = store::load_market_entries_classified(conn)?;
        if classified.is_empty() {
            return Ok(Vec::new());
        }
        let drifted = economy::drift_all(&classified, &self.params, rng);
        for entry in &drifted {
            store::write_market_levels(conn, entry)?;
        }
        Ok(vec![DomainEvent::global(
            EventType::MarketsDrifted,
            json!({ "entries": drifted.len() }),
        )])
    }
}

// ---------------------------------------------------------------------------
// World events
// ---------------------------------------------------------------------------

/// Advances each due world event to its next phase; resolved events are
/// deleted.
pub struct WorldEventProcessor;

impl TickProcessor for WorldEventProcessor {
    fn name(&self) -> &'static str {
        "world_events"
    }

    fn process(
        &self,
        conn: &Connection,
        tick: u64,
        _rng: &mut SplitMix64,
    ) -> Result<Vec<DomainEvent>, StoreError> {
        let mut events = Vec::new();
        for world_event in store::due_world_events(conn, tick)? {
            let next_phase = world_event.phase.next();
            if next_phase.is_terminal() {
                store::delete_world_event(conn, &world_event.event_id)?;
                events.push(DomainEvent::global(
                    EventType::WorldEventResolved,
                    json!({
                        "event_id": world_event.event_id,
                        "event_type": world_event.event_type,
                        "system_id": world_event.system_id,
                    }),
                ));
            } else {
                store::advance_world_event(conn, &world_event.event_id, next_phase, tick)?;
                events.push(DomainEvent::global(
                    EventType::WorldEventPhaseChanged,
                    json!({
                        "event_id": world_event.event_id,
                        "event_type": world_event.event_type,
                        "system_id": world_event.system_id,
                        "phase": next_phase,
                        "severity": world_event.severity,
                    }),
                ));
            }
        }
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// Battle rounds
// ---------------------------------------------------------------------------

/// Advances one round for every active battle whose round interval elapsed;
/// terminal battles are archived and the owner notified.
pub struct BattleProcessor;

impl TickProcessor for BattleProcessor {
    fn name(&self) -> &'static str {
        "battles"
    }

    fn process(
        &self,
        conn: &Connection,
        tick: u64,
        rng: &mut SplitMix64,
    ) -> Result<Vec<DomainEvent>, StoreError> {
        let mut events = Vec::new();
        for battle in store::battles_due(conn, tick)? {
            let player_stats = match store::load_ship(conn, &battle.ship_id)? {
                Some(ship) => {
                    let upgrades = store::load_upgrades(conn, &ship.ship_id)?;
                    let stats = catalog::effective_stats(&ship, &upgrades);
                    SideStats {
                        firepower: stats.firepower,
                        evasion: stats.evasion,
                    }
                }
                None => SideStats {
                    firepower: 1,
                    evasion: 0,
                },
            };
            let enemy_stats = combat::enemy_stats(&battle);

            let mut resolved = combat::resolve_round(battle, player_stats, enemy_stats, rng);
            if resolved.status.is_terminal() {
                store::archive_battle(conn, &resolved, tick)?;
                events.push(DomainEvent::for_player(
                    EventType::BattleEnded,
                    resolved.player_id.clone(),
                    json!({
                        "battle_id": resolved.battle_id,
                        "ship_id": resolved.ship_id,
                        "status": resolved.status,
                        "rounds": resolved.rounds_completed,
                    }),
                ));
                store::insert_notification(
                    conn,
                    &resolved.player_id,
                    EventType::BattleEnded,
                    &format!(
                        "battle against {} ended after {} rounds",
                        resolved.enemy_name, resolved.rounds_completed
                    ),
                    &[EntityRef {
                        entity_kind: "battle".to_string(),
                        entity_id: resolved.battle_id.clone(),
                    }],
                    tick,
                )?;
            } else {
                resolved.next_round_tick = tick + ROUND_INTERVAL_TICKS;
                store::update_battle(conn, &resolved)?;
                let last_round = resolved.round_history.last();
                events.push(DomainEvent::for_player(
                    EventType::BattleRoundResolved,
                    resolved.player_id.clone(),
                    json!({
                        "battle_id": resolved.battle_id,
                        "round": resolved.rounds_completed,
                        "player_damage_dealt": last_round.map(|round| round.player_damage_dealt),
                        "enemy_damage_dealt": last_round.map(|round| round.enemy_damage_dealt),
                        "player_strength": resolved.player_strength,
                        "enemy_strength": resolved.enemy_strength,
                    }),
                ));
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ShipStatus, WorldEventPhase};
    use helios_core::combat::Engagement;

    /// Policy that never triggers a battle; keeps arrival tests
    /// deterministic.
    struct NeverEngage;

    impl EngagementPolicy for NeverEngage {
        fn roll_engagement(
            &self,
            _system_danger: i64,
            _escort_firepower: i64,
            _rng: &mut SplitMix64,
        ) -> Option<Engagement> {
            None
        }
    }

    /// Policy that always triggers with a fixed engagement.
    struct AlwaysEngage;

    impl EngagementPolicy for AlwaysEngage {
        fn roll_engagement(
            &self,
            _system_danger: i64,
            _escort_firepower: i64,
            _rng: &mut SplitMix64,
        ) -> Option<Engagement> {
            Some(Engagement {
                enemy_name: "raider".to_string(),
                enemy_strength: 60,
                arrival_damage: 25,
            })
        }
    }

    struct FailingProcessor;

    impl TickProcessor for FailingProcessor {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn process(
            &self,
            _conn: &Connection,
            _tick: u64,
            _rng: &mut SplitMix64,
        ) -> Result<Vec<DomainEvent>, StoreError> {
            Err(StoreError::Corrupt("injected failure".to_string()))
        }
    }

    fn seeded_store() -> Arc<Mutex<SqliteWorldStore>> {
        let mut store = SqliteWorldStore::open_in_memory().expect("open store");
        store.seed_demo_world(1337, 5_000, 0).expect("seed");
        Arc::new(Mutex::new(store))
    }

    fn scheduler_with_policy(
        store: Arc<Mutex<SqliteWorldStore>>,
        policy: Box<dyn EngagementPolicy + Send + Sync>,
    ) -> TickScheduler {
        TickScheduler::with_processors(store, EventHub::new(), default_processors(policy))
    }

    async fn put_ship_in_transit(store: &Arc<Mutex<SqliteWorldStore>>, arrival_tick: i64) {
        let guard = store.lock().await;
        guard
            .connection()
            .execute(
                "UPDATE ships SET status = 'in_transit', destination_system_id = 'sys_rigel',
                     departure_tick = 0, arrival_tick = ?1
                 WHERE ship_id = 'ship_000003'",
                rusqlite::params![arrival_tick],
            )
            .expect("stage transit ship");
    }

    #[tokio::test]
    async fn tick_advances_only_when_interval_elapsed() {
        let store = seeded_store();
        let scheduler = scheduler_with_policy(Arc::clone(&store), Box::new(NeverEngage));

        let outcome = scheduler.try_advance(1_000).await.expect("attempt");
        assert_eq!(outcome, TickOutcome::NotDue);

        let outcome = scheduler.try_advance(6_000).await.expect("attempt");
        let TickOutcome::Advanced(batch) = outcome else {
            panic!("expected an advanced tick");
        };
        assert_eq!(batch.tick, 1);

        // Immediately after, the next boundary is not due yet.
        let outcome = scheduler.try_advance(6_500).await.expect("attempt");
        assert_eq!(outcome, TickOutcome::NotDue);
    }

    #[tokio::test]
    async fn every_tick_drifts_markets_within_bounds() {
        let store = seeded_store();
        let scheduler = scheduler_with_policy(Arc::clone(&store), Box::new(NeverEngage));

        let mut now = 0;
        for _ in 0..5 {
            now += 5_000;
            let outcome = scheduler.try_advance(now).await.expect("attempt");
            let TickOutcome::Advanced(batch) = outcome else {
                panic!("tick should advance");
            };
            assert!(batch
                .events
                .iter()
                .any(|event| event.event_type == EventType::MarketsDrifted));
        }

        let guard = store.lock().await;
        let entries = store::load_market_entries_classified(guard.connection()).expect("entries");
        let params = DriftParams::default();
        for (entry, _) in entries {
            assert!(entry.supply >= params.min_level && entry.supply <= params.max_level);
            assert!(entry.demand >= params.min_level && entry.demand <= params.max_level);
        }
    }

    #[tokio::test]
    async fn arrival_docks_ship_and_emits_scoped_event() {
        let store = seeded_store();
        put_ship_in_transit(&store, 1).await;
        let scheduler = scheduler_with_policy(Arc::clone(&store), Box::new(NeverEngage));

        let outcome = scheduler.try_advance(5_000).await.expect("attempt");
        let TickOutcome::Advanced(batch) = outcome else {
            panic!("tick should advance");
        };
        let arrival = batch
            .events
            .iter()
            .find(|event| event.event_type == EventType::ShipArrived)
            .expect("arrival event");
        assert_eq!(arrival.player_id.as_deref(), Some("player_002"));

        let guard = store.lock().await;
        let ship = store::load_ship(guard.connection(), "ship_000003")
            .expect("load")
            .expect("exists");
        assert_eq!(ship.status, ShipStatus::Docked);
        assert_eq!(ship.system_id, "sys_rigel");
        assert!(ship.transit_invariant_holds());

        let page = guard
            .notifications_page("player_002", None, 10, None, false)
            .expect("notifications");
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].kind, EventType::ShipArrived);
    }

    #[tokio::test]
    async fn engagement_on_arrival_creates_battle_and_damages_ship() {
        let store = seeded_store();
        put_ship_in_transit(&store, 1).await;
        let scheduler = scheduler_with_policy(Arc::clone(&store), Box::new(AlwaysEngage));

        let outcome = scheduler.try_advance(5_000).await.expect("attempt");
        let TickOutcome::Advanced(batch) = outcome else {
            panic!("tick should advance");
        };
        assert!(batch
            .events
            .iter()
            .any(|event| event.event_type == EventType::BattleStarted));

        let guard = store.lock().await;
        let battles = guard.active_battles("player_002").expect("battles");
        assert_eq!(battles.len(), 1);
        assert_eq!(battles[0].status, BattleStatus::Active);
        assert_eq!(battles[0].next_round_tick, 1 + ROUND_INTERVAL_TICKS);

        // Corvette shield 50 absorbs the 25 arrival damage entirely.
        let ship = store::load_ship(guard.connection(), "ship_000003")
            .expect("load")
            .expect("exists");
        assert_eq!(ship.shield, 25);
        assert_eq!(ship.hull, ship.max_hull);
        assert_eq!(battles[0].player_strength, ship.hull + ship.shield);
    }

    #[tokio::test]
    async fn battles_advance_rounds_until_terminal_then_archive() {
        let store = seeded_store();
        put_ship_in_transit(&store, 1).await;
        let scheduler = scheduler_with_policy(Arc::clone(&store), Box::new(AlwaysEngage));

        let mut now = 0;
        for _ in 0..60 {
            now += 5_000;
            scheduler.try_advance(now).await.expect("attempt");
            let guard = store.lock().await;
            if guard.active_battles("player_002").expect("battles").is_empty() {
                break;
            }
        }

        let guard = store.lock().await;
        assert!(guard.active_battles("player_002").expect("battles").is_empty());
        let archived: i64 = guard
            .connection()
            .query_row("SELECT COUNT(*) FROM battle_archive", [], |row| row.get(0))
            .expect("archive count");
        assert_eq!(archived, 1);
        let ended = guard
            .notifications_page("player_002", None, 50, Some(EventType::BattleEnded), false)
            .expect("notifications");
        assert_eq!(ended.total, 1);
    }

    #[tokio::test]
    async fn world_events_progress_through_phases_and_resolve() {
        let store = seeded_store();
        let scheduler = scheduler_with_policy(Arc::clone(&store), Box::new(NeverEngage));

        // The seeded shortage brews for 20 ticks per phase; walk it to
        // resolution.
        let mut now = 0;
        let mut saw_phase_change = false;
        let mut saw_resolution = false;
        for _ in 0..70 {
            now += 5_000;
            let outcome = scheduler.try_advance(now).await.expect("attempt");
            let TickOutcome::Advanced(batch) = outcome else {
                continue;
            };
            for event in &batch.events {
                match event.event_type {
                    EventType::WorldEventPhaseChanged => saw_phase_change = true,
                    EventType::WorldEventResolved => saw_resolution = true,
                    _ => {}
                }
            }
        }
        assert!(saw_phase_change, "shortage should change phase");
        assert!(saw_resolution, "shortage should eventually resolve");

        let guard = store.lock().await;
        assert!(guard.active_world_events().expect("events").is_empty());
    }

    #[tokio::test]
    async fn failed_processor_rolls_back_the_whole_tick() {
        let store = seeded_store();
        put_ship_in_transit(&store, 1).await;

        let mut processors = default_processors(Box::new(NeverEngage));
        processors.push(Box::new(FailingProcessor));
        let scheduler =
            TickScheduler::with_processors(Arc::clone(&store), EventHub::new(), processors);

        let error = scheduler.try_advance(5_000).await.expect_err("must fail");
        assert!(matches!(error, StoreError::Corrupt(_)));

        // Nothing from the aborted tick is visible: the clock did not move
        // and the arrival was not processed.
        let guard = store.lock().await;
        let clock = guard.clock().expect("clock");
        assert_eq!(clock.current_tick, 0);
        assert_eq!(clock.last_tick_at_ms, 0);
        let ship = store::load_ship(guard.connection(), "ship_000003")
            .expect("load")
            .expect("exists");
        assert_eq!(ship.status, ShipStatus::InTransit);
        drop(guard);

        // Removing the failing stage lets the same boundary advance.
        let scheduler = scheduler_with_policy(Arc::clone(&store), Box::new(NeverEngage));
        let outcome = scheduler.try_advance(5_000).await.expect("retry");
        assert!(matches!(outcome, TickOutcome::Advanced(_)));
    }

    #[tokio::test]
    async fn ensure_started_is_idempotent_and_stoppable() {
        let store = seeded_store();
        let scheduler = Arc::new(
            scheduler_with_policy(store, Box::new(NeverEngage))
                .with_poll_interval(Duration::from_millis(10)),
        );
        scheduler.ensure_started();
        scheduler.ensure_started();
        tokio::time::sleep(Duration::from_millis(30)).await;
        scheduler.stop();
    }

    #[test]
    fn world_event_phase_progression_is_linear() {
        assert_eq!(WorldEventPhase::Brewing.next(), WorldEventPhase::Active);
        assert_eq!(WorldEventPhase::Active.next(), WorldEventPhase::Waning);
        assert!(WorldEventPhase::Waning.next().is_terminal());
    }
}
