//! SQLite world store.
//!
//! One `world` singleton row, static graph rows, and one row per ship,
//! market entry, battle, world event, and notification. The tick scheduler
//! gates advancement with a conditional update on `world.current_tick`
//! (compare-and-swap: zero affected rows means another driver won the
//! boundary). Player actions run in their own short transactions with fresh
//! in-transaction re-reads and guarded row updates, so a stale pre-check
//! fails cleanly instead of applying against outdated state.

use std::fmt;
use std::path::Path;

use contracts::{
    Battle, BattleStatus, CargoItem, Connection as Lane, ConvoyServiceRequest,
    ConvoyServiceResponse, DomainEvent, EconomyType, EntityRef, ErrorCode, EventType, Good,
    GoodRelation, InstallUpgradeRequest, MarketEntry, MarketQuote, MoverId, NavigateRequest,
    NavigateResponse, Notification, NotificationPage, Player, PurchaseShipRequest,
    PurchaseShipResponse, RefuelRequest, RefuelResponse, RemoveUpgradeRequest, Ship, ShipStatus,
    StarSystem, Station, TradeRequest, TradeResponse, UpgradeItem, UpgradeResponse, WorldClock,
    WorldEvent, WorldEventPhase, WorldEventType, SCHEMA_VERSION_V1,
};
use helios_core::catalog;
use helios_core::economy::{self, DriftParams};
use helios_core::pathfind::Galaxy;
use helios_core::validate::{self, ActionError, ConvoyServiceKind, Mover};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    /// The `world` singleton row is missing; the database was never seeded.
    MissingWorld,
    /// A persisted column held a value no variant maps to.
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::MissingWorld => write!(f, "world row is missing; run seed first"),
            Self::Corrupt(detail) => write!(f, "corrupt row: {detail}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// Outcome of a failed player action. `Rejected` carries validation and
/// precondition failures detected against a consistent snapshot;
/// `StateChanged` means the fresh in-transaction reads disagreed with the
/// pre-check and the caller should retry.
#[derive(Debug)]
pub enum ActionFailure {
    Rejected(ActionError),
    StateChanged(String),
    NotFound { entity: &'static str, id: String },
    Store(StoreError),
}

impl ActionFailure {
    fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Rejected(err) => err.error_code(),
            Self::StateChanged(_) => ErrorCode::StateChanged,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Store(_) => ErrorCode::InternalError,
        }
    }
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "{err}"),
            Self::StateChanged(detail) => write!(f, "state changed, retry: {detail}"),
            Self::NotFound { entity, id } => write!(f, "{entity} {id} not found"),
            Self::Store(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl std::error::Error for ActionFailure {}

impl From<StoreError> for ActionFailure {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for ActionFailure {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(value))
    }
}

/// A precondition that held in the pre-check but fails against fresh reads
/// is a concurrency conflict; anything else stays a plain rejection.
fn recheck_failure(err: ActionError) -> ActionFailure {
    match err.error_code() {
        ErrorCode::PreconditionFailed => ActionFailure::StateChanged(err.to_string()),
        _ => ActionFailure::Rejected(err),
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SqliteWorldStore {
    conn: Connection,
}

impl SqliteWorldStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    fn configure(&mut self) -> Result<(), StoreError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS world (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                current_tick INTEGER NOT NULL,
                tick_interval_ms INTEGER NOT NULL,
                last_tick_at_ms INTEGER NOT NULL,
                seed TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS star_systems (
                system_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                pos_x INTEGER NOT NULL,
                pos_y INTEGER NOT NULL,
                danger_level INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS connections (
                connection_id TEXT PRIMARY KEY,
                from_system_id TEXT NOT NULL,
                to_system_id TEXT NOT NULL,
                fuel_cost INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stations (
                station_id TEXT PRIMARY KEY,
                system_id TEXT NOT NULL,
                name TEXT NOT NULL,
                economy_type TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS goods (
                good_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                base_price INTEGER NOT NULL,
                price_floor_pct INTEGER NOT NULL,
                price_ceiling_pct INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS market_entries (
                station_id TEXT NOT NULL,
                good_id TEXT NOT NULL,
                supply INTEGER NOT NULL,
                demand INTEGER NOT NULL,
                PRIMARY KEY (station_id, good_id)
            );

            CREATE TABLE IF NOT EXISTS players (
                player_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                credits INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ships (
                ship_id TEXT PRIMARY KEY,
                player_id TEXT NOT NULL,
                ship_type TEXT NOT NULL,
                name TEXT NOT NULL,
                fuel INTEGER NOT NULL,
                max_fuel INTEGER NOT NULL,
                hull INTEGER NOT NULL,
                max_hull INTEGER NOT NULL,
                shield INTEGER NOT NULL,
                max_shield INTEGER NOT NULL,
                speed INTEGER NOT NULL,
                firepower INTEGER NOT NULL,
                evasion INTEGER NOT NULL,
                cargo_capacity INTEGER NOT NULL,
                status TEXT NOT NULL,
                system_id TEXT NOT NULL,
                destination_system_id TEXT,
                departure_tick INTEGER,
                arrival_tick INTEGER,
                convoy_id TEXT
            );

            CREATE TABLE IF NOT EXISTS cargo (
                ship_id TEXT NOT NULL,
                good_id TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                PRIMARY KEY (ship_id, good_id)
            );

            CREATE TABLE IF NOT EXISTS upgrades (
                ship_id TEXT NOT NULL,
                slot_id TEXT NOT NULL,
                module_id TEXT NOT NULL,
                tier INTEGER NOT NULL,
                PRIMARY KEY (ship_id, slot_id)
            );

            CREATE TABLE IF NOT EXISTS convoys (
                convoy_id TEXT PRIMARY KEY,
                player_id TEXT NOT NULL,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS battles (
                battle_id TEXT PRIMARY KEY,
                player_id TEXT NOT NULL,
                ship_id TEXT NOT NULL,
                system_id TEXT NOT NULL,
                enemy_name TEXT NOT NULL,
                player_strength INTEGER NOT NULL,
                player_max_strength INTEGER NOT NULL,
                enemy_strength INTEGER NOT NULL,
                enemy_max_strength INTEGER NOT NULL,
                player_morale INTEGER NOT NULL,
                enemy_morale INTEGER NOT NULL,
                rounds_completed INTEGER NOT NULL,
                round_history_json TEXT NOT NULL,
                status TEXT NOT NULL,
                started_tick INTEGER NOT NULL,
                next_round_tick INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS battle_archive (
                battle_id TEXT PRIMARY KEY,
                payload_json TEXT NOT NULL,
                ended_tick INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS world_events (
                event_id TEXT PRIMARY KEY,
                event_type TEXT NOT NULL,
                system_id TEXT NOT NULL,
                phase TEXT NOT NULL,
                severity INTEGER NOT NULL,
                phase_start_tick INTEGER NOT NULL,
                phase_duration INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notifications (
                notification_id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                entity_refs_json TEXT NOT NULL,
                tick INTEGER NOT NULL,
                read INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ships_transit ON ships(status, arrival_tick);
            CREATE INDEX IF NOT EXISTS idx_ships_player ON ships(player_id);
            CREATE INDEX IF NOT EXISTS idx_ships_convoy ON ships(convoy_id);
            CREATE INDEX IF NOT EXISTS idx_battles_due ON battles(status, next_round_tick);
            CREATE INDEX IF NOT EXISTS idx_notifications_player
                ON notifications(player_id, notification_id);
            ",
        )?;
        Ok(())
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    // -- World reads --------------------------------------------------------

    pub fn is_seeded(&self) -> Result<bool, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM world", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    pub fn clock(&self) -> Result<WorldClock, StoreError> {
        load_clock(&self.conn)
    }

    pub fn galaxy(&self) -> Result<Galaxy, StoreError> {
        load_galaxy(&self.conn)
    }

    pub fn systems(&self) -> Result<Vec<StarSystem>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT system_id, name, pos_x, pos_y, danger_level
             FROM star_systems ORDER BY system_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StarSystem {
                system_id: row.get(0)?,
                name: row.get(1)?,
                pos_x: row.get(2)?,
                pos_y: row.get(3)?,
                danger_level: row.get(4)?,
            })
        })?;
        collect_rows(rows)
    }

    pub fn lanes(&self) -> Result<Vec<Lane>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT connection_id, from_system_id, to_system_id, fuel_cost
             FROM connections ORDER BY connection_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Lane {
                connection_id: row.get(0)?,
                from_system_id: row.get(1)?,
                to_system_id: row.get(2)?,
                fuel_cost: row.get(3)?,
            })
        })?;
        collect_rows(rows)
    }

    pub fn station(&self, station_id: &str) -> Result<Option<Station>, StoreError> {
        load_station(&self.conn, station_id)
    }

    /// Market entries for one station with their derived current price.
    pub fn market_for_station(&self, station_id: &str) -> Result<Vec<MarketQuote>, StoreError> {
        let Some(station) = load_station(&self.conn, station_id)? else {
            return Ok(Vec::new());
        };
        let mut stmt = self.conn.prepare(
            "SELECT m.station_id, m.good_id, m.supply, m.demand,
                    g.name, g.base_price, g.price_floor_pct, g.price_ceiling_pct
             FROM market_entries m JOIN goods g ON g.good_id = m.good_id
             WHERE m.station_id = ?1 ORDER BY m.good_id",
        )?;
        let rows = stmt.query_map(params![station_id], |row| {
            let entry = MarketEntry {
                station_id: row.get(0)?,
                good_id: row.get(1)?,
                supply: row.get(2)?,
                demand: row.get(3)?,
            };
            let good = Good {
                good_id: entry.good_id.clone(),
                name: row.get(4)?,
                base_price: row.get(5)?,
                price_floor_pct: row.get(6)?,
                price_ceiling_pct: row.get(7)?,
            };
            Ok((entry, good))
        })?;
        let mut quotes = Vec::new();
        for row in rows {
            let (entry, good) = row?;
            let relation = catalog::good_relation(station.economy_type, &good.good_id);
            quotes.push(economy::quote(&entry, &good, relation));
        }
        Ok(quotes)
    }

    pub fn player(&self, player_id: &str) -> Result<Option<Player>, StoreError> {
        load_player(&self.conn, player_id)
    }

    pub fn fleet(&self, player_id: &str) -> Result<(Vec<Ship>, Vec<contracts::Convoy>), StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SHIP_COLUMNS} FROM ships WHERE player_id = ?1 ORDER BY ship_id"
            ))?;
        let ships = collect_rows(stmt.query_map(params![player_id], ship_from_row)?)?;

        let mut stmt = self.conn.prepare(
            "SELECT convoy_id, player_id, name FROM convoys WHERE player_id = ?1 ORDER BY convoy_id",
        )?;
        let convoys = collect_rows(stmt.query_map(params![player_id], |row| {
            Ok(contracts::Convoy {
                convoy_id: row.get(0)?,
                player_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?)?;

        Ok((ships, convoys))
    }

    pub fn ship_cargo(&self, ship_id: &str) -> Result<Vec<CargoItem>, StoreError> {
        load_cargo(&self.conn, ship_id)
    }

    pub fn ship_upgrades(&self, ship_id: &str) -> Result<Vec<UpgradeItem>, StoreError> {
        load_upgrades(&self.conn, ship_id)
    }

    pub fn active_battles(&self, player_id: &str) -> Result<Vec<Battle>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BATTLE_COLUMNS} FROM battles WHERE player_id = ?1 ORDER BY battle_id"
        ))?;
        let out = collect_rows(stmt.query_map(params![player_id], battle_from_row)?);
        out
    }

    pub fn active_world_events(&self) -> Result<Vec<WorldEvent>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {WORLD_EVENT_COLUMNS} FROM world_events ORDER BY event_id"
        ))?;
        let out = collect_rows(stmt.query_map([], world_event_from_row)?);
        out
    }

    /// Cursor pagination over a player's notifications, newest first. The
    /// cursor is the last `notification_id` of the previous page.
    pub fn notifications_page(
        &self,
        player_id: &str,
        cursor: Option<i64>,
        limit: usize,
        kind: Option<EventType>,
        unread_only: bool,
    ) -> Result<NotificationPage, StoreError> {
        // An empty ?2 disables the kind filter so one statement shape covers
        // every filter combination.
        let kind_param = kind.map(|kind| kind.name().to_string()).unwrap_or_default();
        let cursor_param = cursor.unwrap_or(i64::MAX);
        let unread_clause = if unread_only { " AND read = 0" } else { "" };

        let total: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM notifications
                 WHERE player_id = ?1 AND (?2 = '' OR kind = ?2){unread_clause}"
            ),
            params![player_id, kind_param],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT notification_id, player_id, kind, message, entity_refs_json, tick, read
             FROM notifications
             WHERE player_id = ?1 AND (?2 = '' OR kind = ?2) AND notification_id < ?3{unread_clause}
             ORDER BY notification_id DESC LIMIT ?4"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let fetch = (limit + 1) as i64;
        let rows = stmt.query_map(
            params![player_id, kind_param, cursor_param, fetch],
            notification_from_row,
        )?;
        let mut items: Vec<Notification> = collect_rows(rows)?;

        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|item| item.notification_id)
        } else {
            None
        };

        Ok(NotificationPage {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            items,
            next_cursor,
            total,
        })
    }

    /// Mark the given notifications read, or every unread one when `ids` is
    /// `None`. Returns the number of rows changed.
    pub fn mark_notifications_read(
        &mut self,
        player_id: &str,
        ids: Option<&[i64]>,
    ) -> Result<usize, StoreError> {
        match ids {
            None => Ok(self.conn.execute(
                "UPDATE notifications SET read = 1 WHERE player_id = ?1 AND read = 0",
                params![player_id],
            )?),
            Some(ids) => {
                let tx = self.conn.transaction()?;
                let mut changed = 0;
                for id in ids {
                    changed += tx.execute(
                        "UPDATE notifications SET read = 1
                         WHERE player_id = ?1 AND notification_id = ?2",
                        params![player_id, id],
                    )?;
                }
                tx.commit()?;
                Ok(changed)
            }
        }
    }

    // -- Actions ------------------------------------------------------------

    pub fn navigate(
        &mut self,
        request: &NavigateRequest,
    ) -> Result<(NavigateResponse, Vec<DomainEvent>), ActionFailure> {
        let galaxy = load_galaxy(&self.conn)?;

        // Pre-transaction check against a plain snapshot.
        {
            let ships = resolve_mover_ships(&self.conn, &request.mover)?;
            let movers = movers_with_stats(&self.conn, &ships)?;
            let clock = load_clock(&self.conn)?;
            validate::plan_navigation(&galaxy, &movers, &request.route, clock.current_tick)
                .map_err(ActionFailure::Rejected)?;
        }

        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let ships = resolve_mover_ships(&tx, &request.mover)?;
        let movers = movers_with_stats(&tx, &ships)?;
        let clock = load_clock(&tx)?;
        let plan = validate::plan_navigation(&galaxy, &movers, &request.route, clock.current_tick)
            .map_err(recheck_failure)?;

        let destination = request
            .route
            .last()
            .cloned()
            .ok_or(ActionFailure::Rejected(ActionError::EmptyRoute))?;

        for ship in &ships {
            let updated = tx.execute(
                "UPDATE ships SET fuel = fuel - ?1, status = 'in_transit',
                     destination_system_id = ?2, departure_tick = ?3, arrival_tick = ?4
                 WHERE ship_id = ?5 AND status = 'docked' AND fuel >= ?1",
                params![
                    plan.fuel_cost_per_ship,
                    destination,
                    to_sql_tick(plan.departure_tick),
                    to_sql_tick(plan.arrival_tick),
                    ship.ship_id,
                ],
            )?;
            if updated == 0 {
                return Err(ActionFailure::StateChanged(format!(
                    "ship {} was modified while the order was validated",
                    ship.ship_id
                )));
            }
        }

        let mut updated_ships = Vec::with_capacity(ships.len());
        let mut events = Vec::with_capacity(ships.len());
        for ship in &ships {
            let fresh = load_ship(&tx, &ship.ship_id)?
                .ok_or_else(|| ActionFailure::not_found("ship", &ship.ship_id))?;
            events.push(DomainEvent::for_player(
                EventType::ShipDeparted,
                fresh.player_id.clone(),
                json!({
                    "ship_id": fresh.ship_id,
                    "from_system_id": request.route[0],
                    "destination_system_id": destination,
                    "departure_tick": plan.departure_tick,
                    "arrival_tick": plan.arrival_tick,
                }),
            ));
            updated_ships.push(fresh);
        }
        tx.commit().map_err(StoreError::from)?;

        Ok((
            NavigateResponse {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                mover: request.mover.clone(),
                route: request.route.clone(),
                fuel_spent_per_ship: plan.fuel_cost_per_ship,
                departure_tick: plan.departure_tick,
                arrival_tick: plan.arrival_tick,
                ships: updated_ships,
            },
            events,
        ))
    }

    pub fn trade(
        &mut self,
        request: &TradeRequest,
    ) -> Result<(TradeResponse, Vec<DomainEvent>), ActionFailure> {
        let params = DriftParams::default();

        {
            let view = trade_view(&self.conn, request)?;
            view.plan(request, &params).map_err(ActionFailure::Rejected)?;
        }

        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let view = trade_view(&tx, request)?;
        let plan = view.plan(request, &params).map_err(recheck_failure)?;

        let updated = tx.execute(
            "UPDATE players SET credits = ?1 WHERE player_id = ?2 AND credits = ?3",
            params![plan.credits_after, view.player.player_id, view.player.credits],
        )?;
        if updated == 0 {
            return Err(ActionFailure::StateChanged(
                "player credits changed during the trade".to_string(),
            ));
        }

        if plan.cargo_quantity_after > 0 {
            tx.execute(
                "INSERT INTO cargo (ship_id, good_id, quantity) VALUES (?1, ?2, ?3)
                 ON CONFLICT(ship_id, good_id) DO UPDATE SET quantity = excluded.quantity",
                params![request.ship_id, request.good_id, plan.cargo_quantity_after],
            )?;
        } else {
            tx.execute(
                "DELETE FROM cargo WHERE ship_id = ?1 AND good_id = ?2",
                params![request.ship_id, request.good_id],
            )?;
        }

        let updated = tx.execute(
            "UPDATE market_entries SET supply = ?1, demand = ?2
             WHERE station_id = ?3 AND good_id = ?4 AND supply = ?5 AND demand = ?6",
            params![
                plan.levels_after.supply,
                plan.levels_after.demand,
                request.station_id,
                request.good_id,
                view.entry.supply,
                view.entry.demand,
            ],
        )?;
        if updated == 0 {
            return Err(ActionFailure::StateChanged(
                "market levels changed during the trade".to_string(),
            ));
        }

        let cargo = load_cargo(&tx, &request.ship_id)?;
        let entry = MarketEntry {
            station_id: request.station_id.clone(),
            good_id: request.good_id.clone(),
            supply: plan.levels_after.supply,
            demand: plan.levels_after.demand,
        };
        let relation = catalog::good_relation(view.station.economy_type, &view.good.good_id);
        let market = economy::quote(&entry, &view.good, relation);
        tx.commit().map_err(StoreError::from)?;

        let events = vec![DomainEvent::for_player(
            EventType::TradeExecuted,
            view.player.player_id.clone(),
            json!({
                "ship_id": request.ship_id,
                "station_id": request.station_id,
                "good_id": request.good_id,
                "side": request.side,
                "quantity": request.quantity,
                "unit_price": plan.unit_price,
                "total_price": plan.total_price,
            }),
        )];

        Ok((
            TradeResponse {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                side: request.side,
                quantity: request.quantity,
                unit_price: plan.unit_price,
                total_price: plan.total_price,
                credits: plan.credits_after,
                cargo,
                market,
            },
            events,
        ))
    }

    pub fn purchase_ship(
        &mut self,
        request: &PurchaseShipRequest,
    ) -> Result<(PurchaseShipResponse, Vec<DomainEvent>), ActionFailure> {
        {
            let (player, station_count) = purchase_view(&self.conn, request)?;
            validate::plan_ship_purchase(
                &player,
                &request.system_id,
                station_count,
                &request.ship_type,
                "ship_pending",
                request.name.as_deref(),
            )
            .map_err(ActionFailure::Rejected)?;
        }

        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let (player, station_count) = purchase_view(&tx, request)?;
        let ship_id = next_id(&tx, "ship")?;
        let plan = validate::plan_ship_purchase(
            &player,
            &request.system_id,
            station_count,
            &request.ship_type,
            &ship_id,
            request.name.as_deref(),
        )
        .map_err(recheck_failure)?;

        let updated = tx.execute(
            "UPDATE players SET credits = ?1 WHERE player_id = ?2 AND credits = ?3",
            params![plan.credits_after, player.player_id, player.credits],
        )?;
        if updated == 0 {
            return Err(ActionFailure::StateChanged(
                "player credits changed during the purchase".to_string(),
            ));
        }
        insert_ship(&tx, &plan.ship)?;
        tx.commit().map_err(StoreError::from)?;

        let events = vec![DomainEvent::for_player(
            EventType::ShipPurchased,
            player.player_id.clone(),
            json!({
                "ship_id": plan.ship.ship_id,
                "ship_type": plan.ship.ship_type,
                "system_id": plan.ship.system_id,
                "price": plan.price,
            }),
        )];

        Ok((
            PurchaseShipResponse {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                price: plan.price,
                credits: plan.credits_after,
                ship: plan.ship,
            },
            events,
        ))
    }

    pub fn install_upgrade(
        &mut self,
        request: &InstallUpgradeRequest,
    ) -> Result<(UpgradeResponse, Vec<DomainEvent>), ActionFailure> {
        {
            let (player, ship, installed) = upgrade_view(&self.conn, &request.ship_id)?;
            validate::plan_install_upgrade(
                &player,
                &ship,
                &installed,
                &request.slot_id,
                &request.module_id,
                request.tier,
            )
            .map_err(ActionFailure::Rejected)?;
        }

        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let (player, ship, installed) = upgrade_view(&tx, &request.ship_id)?;
        let plan = validate::plan_install_upgrade(
            &player,
            &ship,
            &installed,
            &request.slot_id,
            &request.module_id,
            request.tier,
        )
        .map_err(recheck_failure)?;

        let updated = tx.execute(
            "UPDATE players SET credits = ?1 WHERE player_id = ?2 AND credits = ?3",
            params![plan.credits_after, player.player_id, player.credits],
        )?;
        if updated == 0 {
            return Err(ActionFailure::StateChanged(
                "player credits changed during the install".to_string(),
            ));
        }
        tx.execute(
            "INSERT INTO upgrades (ship_id, slot_id, module_id, tier) VALUES (?1, ?2, ?3, ?4)",
            params![
                request.ship_id,
                plan.item.slot_id,
                plan.item.module_id,
                plan.item.tier,
            ],
        )?;
        tx.commit().map_err(StoreError::from)?;

        let events = vec![DomainEvent::for_player(
            EventType::UpgradeInstalled,
            player.player_id.clone(),
            json!({
                "ship_id": request.ship_id,
                "slot_id": plan.item.slot_id,
                "module_id": plan.item.module_id,
                "tier": plan.item.tier,
                "cost": plan.cost,
            }),
        )];

        Ok((
            UpgradeResponse {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                ship_id: request.ship_id.clone(),
                slot_id: request.slot_id.clone(),
                installed: Some(plan.item),
                amount_charged: plan.cost,
                credits: plan.credits_after,
            },
            events,
        ))
    }

    pub fn remove_upgrade(
        &mut self,
        request: &RemoveUpgradeRequest,
    ) -> Result<(UpgradeResponse, Vec<DomainEvent>), ActionFailure> {
        {
            let (player, ship, installed) = upgrade_view(&self.conn, &request.ship_id)?;
            validate::plan_remove_upgrade(&player, &ship, &installed, &request.slot_id)
                .map_err(ActionFailure::Rejected)?;
        }

        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let (player, ship, installed) = upgrade_view(&tx, &request.ship_id)?;
        let plan = validate::plan_remove_upgrade(&player, &ship, &installed, &request.slot_id)
            .map_err(recheck_failure)?;

        let removed = tx.execute(
            "DELETE FROM upgrades WHERE ship_id = ?1 AND slot_id = ?2",
            params![request.ship_id, request.slot_id],
        )?;
        if removed == 0 {
            return Err(ActionFailure::StateChanged(
                "slot was emptied during the removal".to_string(),
            ));
        }
        let updated = tx.execute(
            "UPDATE players SET credits = ?1 WHERE player_id = ?2 AND credits = ?3",
            params![plan.credits_after, player.player_id, player.credits],
        )?;
        if updated == 0 {
            return Err(ActionFailure::StateChanged(
                "player credits changed during the removal".to_string(),
            ));
        }
        tx.commit().map_err(StoreError::from)?;

        let events = vec![DomainEvent::for_player(
            EventType::UpgradeRemoved,
            player.player_id.clone(),
            json!({
                "ship_id": request.ship_id,
                "slot_id": request.slot_id,
                "module_id": plan.removed.module_id,
                "refund": plan.refund,
            }),
        )];

        Ok((
            UpgradeResponse {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                ship_id: request.ship_id.clone(),
                slot_id: request.slot_id.clone(),
                installed: None,
                amount_charged: -plan.refund,
                credits: plan.credits_after,
            },
            events,
        ))
    }

    pub fn refuel(
        &mut self,
        request: &RefuelRequest,
    ) -> Result<(RefuelResponse, Vec<DomainEvent>), ActionFailure> {
        {
            let (player, ship) = ship_and_owner(&self.conn, &request.ship_id)?;
            validate::plan_refuel(&player, &ship, request.amount)
                .map_err(ActionFailure::Rejected)?;
        }

        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let (player, ship) = ship_and_owner(&tx, &request.ship_id)?;
        let plan =
            validate::plan_refuel(&player, &ship, request.amount).map_err(recheck_failure)?;

        let updated = tx.execute(
            "UPDATE ships SET fuel = ?1 WHERE ship_id = ?2 AND fuel = ?3 AND status = 'docked'",
            params![plan.fuel_after, ship.ship_id, ship.fuel],
        )?;
        if updated == 0 {
            return Err(ActionFailure::StateChanged(
                "ship fuel changed during the refuel".to_string(),
            ));
        }
        let updated = tx.execute(
            "UPDATE players SET credits = ?1 WHERE player_id = ?2 AND credits = ?3",
            params![plan.credits_after, player.player_id, player.credits],
        )?;
        if updated == 0 {
            return Err(ActionFailure::StateChanged(
                "player credits changed during the refuel".to_string(),
            ));
        }
        tx.commit().map_err(StoreError::from)?;

        let events = vec![DomainEvent::for_player(
            EventType::ShipRefueled,
            player.player_id.clone(),
            json!({
                "ship_id": request.ship_id,
                "amount_added": plan.amount_added,
                "cost": plan.cost,
            }),
        )];

        Ok((
            RefuelResponse {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                ship_id: request.ship_id.clone(),
                amount_added: plan.amount_added,
                fuel: plan.fuel_after,
                cost: plan.cost,
                credits: plan.credits_after,
            },
            events,
        ))
    }

    pub fn convoy_service(
        &mut self,
        request: &ConvoyServiceRequest,
        kind: ConvoyServiceKind,
    ) -> Result<(ConvoyServiceResponse, Vec<DomainEvent>), ActionFailure> {
        {
            let (player, members) = convoy_view(&self.conn, &request.convoy_id)?;
            validate::plan_convoy_service(
                &player,
                &request.convoy_id,
                &members,
                kind,
                request.fraction_pct,
            )
            .map_err(ActionFailure::Rejected)?;
        }

        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let (player, members) = convoy_view(&tx, &request.convoy_id)?;
        let plan = validate::plan_convoy_service(
            &player,
            &request.convoy_id,
            &members,
            kind,
            request.fraction_pct,
        )
        .map_err(recheck_failure)?;

        for (ship, service) in members.iter().zip(&plan.members) {
            if service.amount_restored == 0 {
                continue;
            }
            let (column, old_value) = match kind {
                ConvoyServiceKind::Refuel => ("fuel", ship.fuel),
                ConvoyServiceKind::Repair => ("hull", ship.hull),
            };
            let sql = format!(
                "UPDATE ships SET {column} = {column} + ?1
                 WHERE ship_id = ?2 AND {column} = ?3 AND status = 'docked'"
            );
            let updated = tx.execute(
                &sql,
                params![service.amount_restored, ship.ship_id, old_value],
            )?;
            if updated == 0 {
                return Err(ActionFailure::StateChanged(format!(
                    "ship {} changed during convoy service",
                    ship.ship_id
                )));
            }
        }
        let updated = tx.execute(
            "UPDATE players SET credits = ?1 WHERE player_id = ?2 AND credits = ?3",
            params![plan.credits_after, player.player_id, player.credits],
        )?;
        if updated == 0 {
            return Err(ActionFailure::StateChanged(
                "player credits changed during convoy service".to_string(),
            ));
        }
        tx.commit().map_err(StoreError::from)?;

        let events = vec![DomainEvent::for_player(
            EventType::ConvoyServiced,
            player.player_id.clone(),
            json!({
                "convoy_id": request.convoy_id,
                "kind": match kind {
                    ConvoyServiceKind::Refuel => "refuel",
                    ConvoyServiceKind::Repair => "repair",
                },
                "total_cost": plan.total_cost,
            }),
        )];

        Ok((
            ConvoyServiceResponse {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                convoy_id: request.convoy_id.clone(),
                serviced: plan.members,
                total_cost: plan.total_cost,
                credits: plan.credits_after,
            },
            events,
        ))
    }

    // -- Seeding ------------------------------------------------------------

    /// Populate a fresh database with the demo galaxy: six systems, five
    /// stations, the default goods with markets at their equilibrium levels,
    /// two players, a starter fleet with one convoy, and one brewing world
    /// event. Idempotent only in the sense that it refuses to run twice.
    pub fn seed_demo_world(
        &mut self,
        seed: u64,
        tick_interval_ms: u64,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        if self.is_seeded()? {
            return Ok(());
        }
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO world (id, current_tick, tick_interval_ms, last_tick_at_ms, seed)
             VALUES (1, 0, ?1, ?2, ?3)",
            params![to_sql_tick(tick_interval_ms), to_sql_tick(now_ms), seed.to_string()],
        )?;

        let systems = [
            ("sys_sol", "Sol", 0, 0, 5),
            ("sys_vega", "Vega", 4, 1, 25),
            ("sys_rigel", "Rigel", 8, -2, 60),
            ("sys_altair", "Altair", 6, 4, 40),
            ("sys_castor", "Castor", 11, 2, 75),
            ("sys_helion", "Helion", 2, -3, 15),
        ];
        for (system_id, name, pos_x, pos_y, danger_level) in systems {
            tx.execute(
                "INSERT INTO star_systems (system_id, name, pos_x, pos_y, danger_level)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![system_id, name, pos_x, pos_y, danger_level],
            )?;
        }

        let lanes = [
            ("lane_001", "sys_sol", "sys_vega", 8),
            ("lane_002", "sys_vega", "sys_rigel", 12),
            ("lane_003", "sys_sol", "sys_helion", 6),
            ("lane_004", "sys_helion", "sys_altair", 10),
            ("lane_005", "sys_altair", "sys_rigel", 9),
            ("lane_006", "sys_rigel", "sys_castor", 14),
            ("lane_007", "sys_vega", "sys_altair", 11),
        ];
        for (connection_id, from, to, fuel_cost) in lanes {
            tx.execute(
                "INSERT INTO connections (connection_id, from_system_id, to_system_id, fuel_cost)
                 VALUES (?1, ?2, ?3, ?4)",
                params![connection_id, from, to, fuel_cost],
            )?;
        }

        let stations = [
            ("st_sol_terraces", "sys_sol", "Sol Terraces", EconomyType::Agricultural),
            ("st_vega_forge", "sys_vega", "Vega Forgeworks", EconomyType::Industrial),
            ("st_rigel_delvings", "sys_rigel", "Rigel Delvings", EconomyType::Mining),
            ("st_altair_stack", "sys_altair", "Altair Stack", EconomyType::Refinery),
            ("st_castor_annex", "sys_castor", "Castor Annex", EconomyType::TechHub),
        ];
        for (station_id, system_id, name, economy_type) in stations {
            tx.execute(
                "INSERT INTO stations (station_id, system_id, name, economy_type)
                 VALUES (?1, ?2, ?3, ?4)",
                params![station_id, system_id, name, economy_type_sql(economy_type)],
            )?;
        }

        for good in catalog::default_goods() {
            tx.execute(
                "INSERT INTO goods (good_id, name, base_price, price_floor_pct, price_ceiling_pct)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    good.good_id,
                    good.name,
                    good.base_price,
                    good.price_floor_pct,
                    good.price_ceiling_pct,
                ],
            )?;
            for (station_id, _, _, economy_type) in stations {
                let relation = catalog::good_relation(economy_type, &good.good_id);
                let (supply, demand) = economy::equilibrium_target(relation);
                tx.execute(
                    "INSERT INTO market_entries (station_id, good_id, supply, demand)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![station_id, good.good_id, supply, demand],
                )?;
            }
        }

        for (player_id, name, credits) in [
            ("player_001", "Corvan Hale", 5_000),
            ("player_002", "Mirelle Osei", 5_000),
        ] {
            tx.execute(
                "INSERT INTO players (player_id, name, credits) VALUES (?1, ?2, ?3)",
                params![player_id, name, credits],
            )?;
        }

        tx.execute(
            "INSERT INTO convoys (convoy_id, player_id, name) VALUES (?1, ?2, ?3)",
            params!["convoy_000001", "player_001", "Sol Caravan"],
        )?;

        let freighter = catalog::ship_type("freighter").ok_or_else(|| {
            StoreError::Corrupt("freighter missing from catalog".to_string())
        })?;
        let scout = catalog::ship_type("scout")
            .ok_or_else(|| StoreError::Corrupt("scout missing from catalog".to_string()))?;
        let corvette = catalog::ship_type("corvette")
            .ok_or_else(|| StoreError::Corrupt("corvette missing from catalog".to_string()))?;

        let mut long_haul = catalog::new_ship(
            freighter,
            next_id(&tx, "ship")?,
            "player_001",
            "Long Haul",
            "sys_sol",
        );
        long_haul.convoy_id = Some("convoy_000001".to_string());
        insert_ship(&tx, &long_haul)?;

        let mut dart = catalog::new_ship(
            scout,
            next_id(&tx, "ship")?,
            "player_001",
            "Dart",
            "sys_sol",
        );
        dart.convoy_id = Some("convoy_000001".to_string());
        insert_ship(&tx, &dart)?;

        let vigil = catalog::new_ship(
            corvette,
            next_id(&tx, "ship")?,
            "player_002",
            "Vigil",
            "sys_vega",
        );
        insert_ship(&tx, &vigil)?;

        insert_world_event(
            &tx,
            &WorldEvent {
                event_id: next_id(&tx, "worldevent")?,
                event_type: WorldEventType::Shortage,
                system_id: "sys_rigel".to_string(),
                phase: WorldEventPhase::Brewing,
                severity: 40,
                phase_start_tick: 0,
                phase_duration: 20,
            },
        )?;

        tx.commit()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

pub(crate) const SHIP_COLUMNS: &str = "ship_id, player_id, ship_type, name, fuel, max_fuel, \
     hull, max_hull, shield, max_shield, speed, firepower, evasion, cargo_capacity, status, \
     system_id, destination_system_id, departure_tick, arrival_tick, convoy_id";

pub(crate) const BATTLE_COLUMNS: &str = "battle_id, player_id, ship_id, system_id, enemy_name, \
     player_strength, player_max_strength, enemy_strength, enemy_max_strength, player_morale, \
     enemy_morale, rounds_completed, round_history_json, status, started_tick, next_round_tick";

pub(crate) const WORLD_EVENT_COLUMNS: &str =
    "event_id, event_type, system_id, phase, severity, phase_start_tick, phase_duration";

fn column_error(index: usize, detail: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            detail.into(),
        )),
    )
}

pub(crate) fn to_sql_tick(tick: u64) -> i64 {
    i64::try_from(tick).unwrap_or(i64::MAX)
}

pub(crate) fn from_sql_tick(tick: i64) -> u64 {
    u64::try_from(tick).unwrap_or(0)
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, StoreError> {
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub(crate) fn ship_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Ship> {
    let status_raw: String = row.get(14)?;
    let status = match status_raw.as_str() {
        "docked" => ShipStatus::Docked,
        "in_transit" => ShipStatus::InTransit,
        other => return Err(column_error(14, format!("unknown ship status {other}"))),
    };
    let departure: Option<i64> = row.get(17)?;
    let arrival: Option<i64> = row.get(18)?;
    Ok(Ship {
        ship_id: row.get(0)?,
        player_id: row.get(1)?,
        ship_type: row.get(2)?,
        name: row.get(3)?,
        fuel: row.get(4)?,
        max_fuel: row.get(5)?,
        hull: row.get(6)?,
        max_hull: row.get(7)?,
        shield: row.get(8)?,
        max_shield: row.get(9)?,
        speed: row.get(10)?,
        firepower: row.get(11)?,
        evasion: row.get(12)?,
        cargo_capacity: row.get(13)?,
        status,
        system_id: row.get(15)?,
        destination_system_id: row.get(16)?,
        departure_tick: departure.map(from_sql_tick),
        arrival_tick: arrival.map(from_sql_tick),
        convoy_id: row.get(19)?,
    })
}

fn ship_status_sql(status: ShipStatus) -> &'static str {
    match status {
        ShipStatus::Docked => "docked",
        ShipStatus::InTransit => "in_transit",
    }
}

pub(crate) fn battle_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Battle> {
    let history_json: String = row.get(12)?;
    let round_history = serde_json::from_str(&history_json)
        .map_err(|err| column_error(12, format!("round history: {err}")))?;
    let status_raw: String = row.get(13)?;
    let status = match status_raw.as_str() {
        "active" => BattleStatus::Active,
        "player_victory" => BattleStatus::PlayerVictory,
        "player_defeat" => BattleStatus::PlayerDefeat,
        "player_retreat" => BattleStatus::PlayerRetreat,
        "enemy_retreat" => BattleStatus::EnemyRetreat,
        other => return Err(column_error(13, format!("unknown battle status {other}"))),
    };
    Ok(Battle {
        battle_id: row.get(0)?,
        player_id: row.get(1)?,
        ship_id: row.get(2)?,
        system_id: row.get(3)?,
        enemy_name: row.get(4)?,
        player_strength: row.get(5)?,
        player_max_strength: row.get(6)?,
        enemy_strength: row.get(7)?,
        enemy_max_strength: row.get(8)?,
        player_morale: row.get(9)?,
        enemy_morale: row.get(10)?,
        rounds_completed: row.get(11)?,
        round_history,
        status,
        started_tick: from_sql_tick(row.get(14)?),
        next_round_tick: from_sql_tick(row.get(15)?),
    })
}

pub(crate) fn battle_status_sql(status: BattleStatus) -> &'static str {
    match status {
        BattleStatus::Active => "active",
        BattleStatus::PlayerVictory => "player_victory",
        BattleStatus::PlayerDefeat => "player_defeat",
        BattleStatus::PlayerRetreat => "player_retreat",
        BattleStatus::EnemyRetreat => "enemy_retreat",
    }
}

pub(crate) fn world_event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorldEvent> {
    let type_raw: String = row.get(1)?;
    let event_type = match type_raw.as_str() {
        "conflict" => WorldEventType::Conflict,
        "shortage" => WorldEventType::Shortage,
        "trade_boom" => WorldEventType::TradeBoom,
        "pirate_activity" => WorldEventType::PirateActivity,
        other => return Err(column_error(1, format!("unknown world event type {other}"))),
    };
    let phase_raw: String = row.get(3)?;
    let phase = match phase_raw.as_str() {
        "brewing" => WorldEventPhase::Brewing,
        "active" => WorldEventPhase::Active,
        "waning" => WorldEventPhase::Waning,
        "resolved" => WorldEventPhase::Resolved,
        other => return Err(column_error(3, format!("unknown world event phase {other}"))),
    };
    Ok(WorldEvent {
        event_id: row.get(0)?,
        event_type,
        system_id: row.get(2)?,
        phase,
        severity: row.get(4)?,
        phase_start_tick: from_sql_tick(row.get(5)?),
        phase_duration: from_sql_tick(row.get(6)?),
    })
}

pub(crate) fn world_event_type_sql(event_type: WorldEventType) -> &'static str {
    match event_type {
        WorldEventType::Conflict => "conflict",
        WorldEventType::Shortage => "shortage",
        WorldEventType::TradeBoom => "trade_boom",
        WorldEventType::PirateActivity => "pirate_activity",
    }
}

pub(crate) fn world_event_phase_sql(phase: WorldEventPhase) -> &'static str {
    match phase {
        WorldEventPhase::Brewing => "brewing",
        WorldEventPhase::Active => "active",
        WorldEventPhase::Waning => "waning",
        WorldEventPhase::Resolved => "resolved",
    }
}

fn notification_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let kind_raw: String = row.get(2)?;
    let kind = EventType::from_name(&kind_raw)
        .ok_or_else(|| column_error(2, format!("unknown notification kind {kind_raw}")))?;
    let refs_json: String = row.get(4)?;
    let entity_refs = serde_json::from_str(&refs_json)
        .map_err(|err| column_error(4, format!("entity refs: {err}")))?;
    let read: i64 = row.get(6)?;
    Ok(Notification {
        notification_id: row.get(0)?,
        player_id: row.get(1)?,
        kind,
        message: row.get(3)?,
        entity_refs,
        tick: from_sql_tick(row.get(5)?),
        read: read != 0,
    })
}

// ---------------------------------------------------------------------------
// Shared loads (work on a plain connection or inside a transaction)
// ---------------------------------------------------------------------------

pub(crate) fn load_clock(conn: &Connection) -> Result<WorldClock, StoreError> {
    let row = conn
        .query_row(
            "SELECT current_tick, tick_interval_ms, last_tick_at_ms, seed FROM world WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    let (current_tick, interval, last_tick, seed) = row.ok_or(StoreError::MissingWorld)?;
    Ok(WorldClock {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        current_tick: from_sql_tick(current_tick),
        tick_interval_ms: from_sql_tick(interval),
        last_tick_at_ms: from_sql_tick(last_tick),
        seed: seed.parse().unwrap_or(0),
    })
}

/// The optimistic tick gate: succeed only if nobody advanced the boundary
/// since `observed_tick` was read.
pub(crate) fn cas_advance_tick(
    conn: &Connection,
    observed_tick: u64,
    now_ms: u64,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE world SET current_tick = ?1, last_tick_at_ms = ?2
         WHERE id = 1 AND current_tick = ?3",
        params![
            to_sql_tick(observed_tick + 1),
            to_sql_tick(now_ms),
            to_sql_tick(observed_tick),
        ],
    )?;
    Ok(changed == 1)
}

pub(crate) fn load_galaxy(conn: &Connection) -> Result<Galaxy, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT connection_id, from_system_id, to_system_id, fuel_cost FROM connections",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Lane {
            connection_id: row.get(0)?,
            from_system_id: row.get(1)?,
            to_system_id: row.get(2)?,
            fuel_cost: row.get(3)?,
        })
    })?;
    let lanes = collect_rows(rows)?;
    Ok(Galaxy::from_connections(&lanes))
}

pub(crate) fn load_ship(conn: &Connection, ship_id: &str) -> Result<Option<Ship>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SHIP_COLUMNS} FROM ships WHERE ship_id = ?1"
    ))?;
    Ok(stmt.query_row(params![ship_id], ship_from_row).optional()?)
}

pub(crate) fn load_player(conn: &Connection, player_id: &str) -> Result<Option<Player>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT player_id, name, credits FROM players WHERE player_id = ?1",
            params![player_id],
            |row| {
                Ok(Player {
                    player_id: row.get(0)?,
                    name: row.get(1)?,
                    credits: row.get(2)?,
                })
            },
        )
        .optional()?)
}

pub(crate) fn load_cargo(conn: &Connection, ship_id: &str) -> Result<Vec<CargoItem>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT good_id, quantity FROM cargo WHERE ship_id = ?1 ORDER BY good_id",
    )?;
    let out = collect_rows(stmt.query_map(params![ship_id], |row| {
        Ok(CargoItem {
            good_id: row.get(0)?,
            quantity: row.get(1)?,
        })
    })?);
    out
}

pub(crate) fn load_upgrades(
    conn: &Connection,
    ship_id: &str,
) -> Result<Vec<UpgradeItem>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT slot_id, module_id, tier FROM upgrades WHERE ship_id = ?1 ORDER BY slot_id",
    )?;
    let out = collect_rows(stmt.query_map(params![ship_id], |row| {
        Ok(UpgradeItem {
            slot_id: row.get(0)?,
            module_id: row.get(1)?,
            tier: row.get(2)?,
        })
    })?);
    out
}

pub(crate) fn load_station(
    conn: &Connection,
    station_id: &str,
) -> Result<Option<Station>, StoreError> {
    let row = conn
        .query_row(
            "SELECT station_id, system_id, name, economy_type FROM stations WHERE station_id = ?1",
            params![station_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    match row {
        None => Ok(None),
        Some((station_id, system_id, name, economy_raw)) => {
            let economy_type = parse_economy_type(&economy_raw)?;
            Ok(Some(Station {
                station_id,
                system_id,
                name,
                economy_type,
            }))
        }
    }
}

fn parse_economy_type(raw: &str) -> Result<EconomyType, StoreError> {
    match raw {
        "agricultural" => Ok(EconomyType::Agricultural),
        "industrial" => Ok(EconomyType::Industrial),
        "mining" => Ok(EconomyType::Mining),
        "refinery" => Ok(EconomyType::Refinery),
        "tech_hub" => Ok(EconomyType::TechHub),
        other => Err(StoreError::Corrupt(format!("economy type {other}"))),
    }
}

pub(crate) fn economy_type_sql(economy_type: EconomyType) -> &'static str {
    match economy_type {
        EconomyType::Agricultural => "agricultural",
        EconomyType::Industrial => "industrial",
        EconomyType::Mining => "mining",
        EconomyType::Refinery => "refinery",
        EconomyType::TechHub => "tech_hub",
    }
}

pub(crate) fn load_good(conn: &Connection, good_id: &str) -> Result<Option<Good>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT good_id, name, base_price, price_floor_pct, price_ceiling_pct
             FROM goods WHERE good_id = ?1",
            params![good_id],
            |row| {
                Ok(Good {
                    good_id: row.get(0)?,
                    name: row.get(1)?,
                    base_price: row.get(2)?,
                    price_floor_pct: row.get(3)?,
                    price_ceiling_pct: row.get(4)?,
                })
            },
        )
        .optional()?)
}

pub(crate) fn load_market_entry(
    conn: &Connection,
    station_id: &str,
    good_id: &str,
) -> Result<Option<MarketEntry>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT station_id, good_id, supply, demand FROM market_entries
             WHERE station_id = ?1 AND good_id = ?2",
            params![station_id, good_id],
            |row| {
                Ok(MarketEntry {
                    station_id: row.get(0)?,
                    good_id: row.get(1)?,
                    supply: row.get(2)?,
                    demand: row.get(3)?,
                })
            },
        )
        .optional()?)
}

/// All market entries joined to their station's classification, in stable
/// (station, good) order so the drift RNG stream is replayable.
pub(crate) fn load_market_entries_classified(
    conn: &Connection,
) -> Result<Vec<(MarketEntry, GoodRelation)>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT m.station_id, m.good_id, m.supply, m.demand, s.economy_type
         FROM market_entries m JOIN stations s ON s.station_id = m.station_id
         ORDER BY m.station_id, m.good_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            MarketEntry {
                station_id: row.get(0)?,
                good_id: row.get(1)?,
                supply: row.get(2)?,
                demand: row.get(3)?,
            },
            row.get::<_, String>(4)?,
        ))
    })?;
    let mut entries = Vec::new();
    for row in rows {
        let (entry, economy_raw) = row?;
        let economy_type = parse_economy_type(&economy_raw)?;
        let relation = catalog::good_relation(economy_type, &entry.good_id);
        entries.push((entry, relation));
    }
    Ok(entries)
}

pub(crate) fn write_market_levels(
    conn: &Connection,
    entry: &MarketEntry,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE market_entries SET supply = ?1, demand = ?2
         WHERE station_id = ?3 AND good_id = ?4",
        params![entry.supply, entry.demand, entry.station_id, entry.good_id],
    )?;
    Ok(())
}

pub(crate) fn ships_in_transit_due(
    conn: &Connection,
    tick: u64,
) -> Result<Vec<Ship>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SHIP_COLUMNS} FROM ships
         WHERE status = 'in_transit' AND arrival_tick <= ?1 ORDER BY ship_id"
    ))?;
    let out = collect_rows(stmt.query_map(params![to_sql_tick(tick)], ship_from_row)?);
    out
}

/// Flip an arrived ship back to docked at its destination and clear the
/// transit fields, restoring the transit invariant.
pub(crate) fn finish_arrival(
    conn: &Connection,
    ship_id: &str,
    destination: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE ships SET status = 'docked', system_id = ?1,
             destination_system_id = NULL, departure_tick = NULL, arrival_tick = NULL
         WHERE ship_id = ?2 AND status = 'in_transit'",
        params![destination, ship_id],
    )?;
    Ok(())
}

pub(crate) fn apply_ship_damage(
    conn: &Connection,
    ship_id: &str,
    shield: i64,
    hull: i64,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE ships SET shield = ?1, hull = ?2 WHERE ship_id = ?3",
        params![shield, hull, ship_id],
    )?;
    Ok(())
}

/// Total effective firepower of the player's other docked ships at a system;
/// feeds the escort protection curve.
pub(crate) fn escort_firepower(
    conn: &Connection,
    player_id: &str,
    system_id: &str,
    exclude_ship_id: &str,
) -> Result<i64, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SHIP_COLUMNS} FROM ships
         WHERE player_id = ?1 AND system_id = ?2 AND status = 'docked' AND ship_id != ?3"
    ))?;
    let escorts = collect_rows(stmt.query_map(
        params![player_id, system_id, exclude_ship_id],
        ship_from_row,
    )?)?;
    let mut total = 0;
    for escort in &escorts {
        let upgrades = load_upgrades(conn, &escort.ship_id)?;
        total += catalog::effective_stats(escort, &upgrades).firepower;
    }
    Ok(total)
}

pub(crate) fn system_danger(conn: &Connection, system_id: &str) -> Result<i64, StoreError> {
    Ok(conn
        .query_row(
            "SELECT danger_level FROM star_systems WHERE system_id = ?1",
            params![system_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0))
}

pub(crate) fn due_world_events(conn: &Connection, tick: u64) -> Result<Vec<WorldEvent>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {WORLD_EVENT_COLUMNS} FROM world_events
         WHERE phase_start_tick + phase_duration <= ?1 ORDER BY event_id"
    ))?;
    let out = collect_rows(stmt.query_map(params![to_sql_tick(tick)], world_event_from_row)?);
    out
}

pub(crate) fn advance_world_event(
    conn: &Connection,
    event_id: &str,
    phase: WorldEventPhase,
    phase_start_tick: u64,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE world_events SET phase = ?1, phase_start_tick = ?2 WHERE event_id = ?3",
        params![
            world_event_phase_sql(phase),
            to_sql_tick(phase_start_tick),
            event_id,
        ],
    )?;
    Ok(())
}

pub(crate) fn delete_world_event(conn: &Connection, event_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM world_events WHERE event_id = ?1",
        params![event_id],
    )?;
    Ok(())
}

pub(crate) fn insert_world_event(conn: &Connection, event: &WorldEvent) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO world_events (event_id, event_type, system_id, phase, severity,
             phase_start_tick, phase_duration)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            world_event_type_sql(event.event_type),
            event.system_id,
            world_event_phase_sql(event.phase),
            event.severity,
            to_sql_tick(event.phase_start_tick),
            to_sql_tick(event.phase_duration),
        ],
    )?;
    Ok(())
}

pub(crate) fn battles_due(conn: &Connection, tick: u64) -> Result<Vec<Battle>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BATTLE_COLUMNS} FROM battles
         WHERE status = 'active' AND next_round_tick <= ?1 ORDER BY battle_id"
    ))?;
    let out = collect_rows(stmt.query_map(params![to_sql_tick(tick)], battle_from_row)?);
    out
}

pub(crate) fn insert_battle(conn: &Connection, battle: &Battle) -> Result<(), StoreError> {
    let history_json = serde_json::to_string(&battle.round_history)?;
    conn.execute(
        &format!(
            "INSERT INTO battles ({BATTLE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            battle.battle_id,
            battle.player_id,
            battle.ship_id,
            battle.system_id,
            battle.enemy_name,
            battle.player_strength,
            battle.player_max_strength,
            battle.enemy_strength,
            battle.enemy_max_strength,
            battle.player_morale,
            battle.enemy_morale,
            battle.rounds_completed,
            history_json,
            battle_status_sql(battle.status),
            to_sql_tick(battle.started_tick),
            to_sql_tick(battle.next_round_tick),
        ],
    )?;
    Ok(())
}

pub(crate) fn update_battle(conn: &Connection, battle: &Battle) -> Result<(), StoreError> {
    let history_json = serde_json::to_string(&battle.round_history)?;
    conn.execute(
        "UPDATE battles SET player_strength = ?1, enemy_strength = ?2, player_morale = ?3,
             enemy_morale = ?4, rounds_completed = ?5, round_history_json = ?6, status = ?7,
             next_round_tick = ?8
         WHERE battle_id = ?9",
        params![
            battle.player_strength,
            battle.enemy_strength,
            battle.player_morale,
            battle.enemy_morale,
            battle.rounds_completed,
            history_json,
            battle_status_sql(battle.status),
            to_sql_tick(battle.next_round_tick),
            battle.battle_id,
        ],
    )?;
    Ok(())
}

/// Terminal battles leave the active table and keep their full payload in
/// the archive.
pub(crate) fn archive_battle(
    conn: &Connection,
    battle: &Battle,
    ended_tick: u64,
) -> Result<(), StoreError> {
    let payload_json = serde_json::to_string(battle)?;
    conn.execute(
        "INSERT OR REPLACE INTO battle_archive (battle_id, payload_json, ended_tick)
         VALUES (?1, ?2, ?3)",
        params![battle.battle_id, payload_json, to_sql_tick(ended_tick)],
    )?;
    conn.execute(
        "DELETE FROM battles WHERE battle_id = ?1",
        params![battle.battle_id],
    )?;
    Ok(())
}

pub(crate) fn insert_notification(
    conn: &Connection,
    player_id: &str,
    kind: EventType,
    message: &str,
    entity_refs: &[EntityRef],
    tick: u64,
) -> Result<(), StoreError> {
    let refs_json = serde_json::to_string(entity_refs)?;
    conn.execute(
        "INSERT INTO notifications (player_id, kind, message, entity_refs_json, tick, read)
         VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        params![player_id, kind.name(), message, refs_json, to_sql_tick(tick)],
    )?;
    Ok(())
}

pub(crate) fn insert_ship(conn: &Connection, ship: &Ship) -> Result<(), StoreError> {
    conn.execute(
        &format!(
            "INSERT INTO ships ({SHIP_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20)"
        ),
        params![
            ship.ship_id,
            ship.player_id,
            ship.ship_type,
            ship.name,
            ship.fuel,
            ship.max_fuel,
            ship.hull,
            ship.max_hull,
            ship.shield,
            ship.max_shield,
            ship.speed,
            ship.firepower,
            ship.evasion,
            ship.cargo_capacity,
            ship_status_sql(ship.status),
            ship.system_id,
            ship.destination_system_id,
            ship.departure_tick.map(to_sql_tick),
            ship.arrival_tick.map(to_sql_tick),
            ship.convoy_id,
        ],
    )?;
    Ok(())
}

/// Monotonic id allocator backed by the counters table.
pub(crate) fn next_id(conn: &Connection, name: &str) -> Result<String, StoreError> {
    conn.execute(
        "INSERT INTO counters (name, value) VALUES (?1, 1)
         ON CONFLICT(name) DO UPDATE SET value = value + 1",
        params![name],
    )?;
    let value: i64 = conn.query_row(
        "SELECT value FROM counters WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(format!("{name}_{value:06}"))
}

// ---------------------------------------------------------------------------
// Action views
// ---------------------------------------------------------------------------

fn resolve_mover_ships(conn: &Connection, mover: &MoverId) -> Result<Vec<Ship>, ActionFailure> {
    match mover {
        MoverId::Ship(ship_id) => {
            let ship = load_ship(conn, ship_id)?
                .ok_or_else(|| ActionFailure::not_found("ship", ship_id.clone()))?;
            if let Some(convoy_id) = &ship.convoy_id {
                return Err(ActionFailure::Rejected(ActionError::ShipInConvoy {
                    ship_id: ship_id.clone(),
                    convoy_id: convoy_id.clone(),
                }));
            }
            Ok(vec![ship])
        }
        MoverId::Convoy(convoy_id) => {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM convoys WHERE convoy_id = ?1",
                params![convoy_id],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(ActionFailure::not_found("convoy", convoy_id.clone()));
            }
            let mut stmt = conn.prepare(&format!(
                "SELECT {SHIP_COLUMNS} FROM ships WHERE convoy_id = ?1 ORDER BY ship_id"
            ))?;
            let members =
                collect_rows(stmt.query_map(params![convoy_id], ship_from_row)?)
                    .map_err(ActionFailure::from)?;
            if members.len() < 2 {
                return Err(ActionFailure::Rejected(ActionError::ConvoyTooSmall(
                    convoy_id.clone(),
                )));
            }
            Ok(members)
        }
    }
}

fn movers_with_stats<'a>(
    conn: &Connection,
    ships: &'a [Ship],
) -> Result<Vec<Mover<'a>>, ActionFailure> {
    let mut movers = Vec::with_capacity(ships.len());
    for ship in ships {
        let upgrades = load_upgrades(conn, &ship.ship_id)?;
        movers.push(Mover {
            ship,
            stats: catalog::effective_stats(ship, &upgrades),
        });
    }
    Ok(movers)
}

struct TradeView {
    player: Player,
    ship: Ship,
    stats: catalog::EffectiveStats,
    cargo: Vec<CargoItem>,
    station: Station,
    good: Good,
    entry: MarketEntry,
}

impl TradeView {
    fn plan(
        &self,
        request: &TradeRequest,
        params: &DriftParams,
    ) -> Result<validate::TradePlan, ActionError> {
        validate::plan_trade(
            &self.player,
            &self.ship,
            self.stats,
            &self.cargo,
            &self.station,
            &self.good,
            &self.entry,
            request.quantity,
            request.side,
            params,
        )
    }
}

fn trade_view(conn: &Connection, request: &TradeRequest) -> Result<TradeView, ActionFailure> {
    let ship = load_ship(conn, &request.ship_id)?
        .ok_or_else(|| ActionFailure::not_found("ship", request.ship_id.clone()))?;
    let player = load_player(conn, &ship.player_id)?
        .ok_or_else(|| ActionFailure::not_found("player", ship.player_id.clone()))?;
    let upgrades = load_upgrades(conn, &ship.ship_id)?;
    let stats = catalog::effective_stats(&ship, &upgrades);
    let cargo = load_cargo(conn, &ship.ship_id)?;
    let station = load_station(conn, &request.station_id)?
        .ok_or_else(|| ActionFailure::not_found("station", request.station_id.clone()))?;
    let good = load_good(conn, &request.good_id)?
        .ok_or_else(|| ActionFailure::not_found("good", request.good_id.clone()))?;
    let entry = load_market_entry(conn, &request.station_id, &request.good_id)?
        .ok_or_else(|| ActionFailure::not_found("market_entry", request.good_id.clone()))?;
    Ok(TradeView {
        player,
        ship,
        stats,
        cargo,
        station,
        good,
        entry,
    })
}

fn purchase_view(
    conn: &Connection,
    request: &PurchaseShipRequest,
) -> Result<(Player, usize), ActionFailure> {
    let player = load_player(conn, &request.player_id)?
        .ok_or_else(|| ActionFailure::not_found("player", request.player_id.clone()))?;
    let system_exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM star_systems WHERE system_id = ?1",
        params![request.system_id],
        |row| row.get(0),
    )?;
    if system_exists == 0 {
        return Err(ActionFailure::not_found("system", request.system_id.clone()));
    }
    let station_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM stations WHERE system_id = ?1",
        params![request.system_id],
        |row| row.get(0),
    )?;
    Ok((player, station_count as usize))
}

fn upgrade_view(
    conn: &Connection,
    ship_id: &str,
) -> Result<(Player, Ship, Vec<UpgradeItem>), ActionFailure> {
    let ship = load_ship(conn, ship_id)?
        .ok_or_else(|| ActionFailure::not_found("ship", ship_id.to_string()))?;
    let player = load_player(conn, &ship.player_id)?
        .ok_or_else(|| ActionFailure::not_found("player", ship.player_id.clone()))?;
    let installed = load_upgrades(conn, ship_id)?;
    Ok((player, ship, installed))
}

fn ship_and_owner(conn: &Connection, ship_id: &str) -> Result<(Player, Ship), ActionFailure> {
    let ship = load_ship(conn, ship_id)?
        .ok_or_else(|| ActionFailure::not_found("ship", ship_id.to_string()))?;
    let player = load_player(conn, &ship.player_id)?
        .ok_or_else(|| ActionFailure::not_found("player", ship.player_id.clone()))?;
    Ok((player, ship))
}

fn convoy_view(conn: &Connection, convoy_id: &str) -> Result<(Player, Vec<Ship>), ActionFailure> {
    let convoy = conn
        .query_row(
            "SELECT convoy_id, player_id, name FROM convoys WHERE convoy_id = ?1",
            params![convoy_id],
            |row| {
                Ok(contracts::Convoy {
                    convoy_id: row.get(0)?,
                    player_id: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(StoreError::from)?
        .ok_or_else(|| ActionFailure::not_found("convoy", convoy_id.to_string()))?;
    let player = load_player(conn, &convoy.player_id)?
        .ok_or_else(|| ActionFailure::not_found("player", convoy.player_id.clone()))?;
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SHIP_COLUMNS} FROM ships WHERE convoy_id = ?1 ORDER BY ship_id"
        ))
        .map_err(StoreError::from)?;
    let members = collect_rows(stmt.query_map(params![convoy_id], ship_from_row)?)?;
    Ok((player, members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TradeSide;

    fn seeded() -> SqliteWorldStore {
        let mut store = SqliteWorldStore::open_in_memory().expect("open in-memory store");
        store
            .seed_demo_world(1337, 5_000, 0)
            .expect("seed demo world");
        store
    }

    #[test]
    fn seed_creates_world_clock_and_galaxy() {
        let store = seeded();
        let clock = store.clock().expect("clock");
        assert_eq!(clock.current_tick, 0);
        assert_eq!(clock.tick_interval_ms, 5_000);
        assert_eq!(clock.seed, 1337);

        let systems = store.systems().expect("systems");
        assert_eq!(systems.len(), 6);
        let galaxy = store.galaxy().expect("galaxy");
        assert!(galaxy.contains("sys_sol"));
        assert!(galaxy.lane_cost("sys_sol", "sys_vega").is_some());
    }

    #[test]
    fn seed_refuses_to_run_twice() {
        let mut store = seeded();
        store
            .seed_demo_world(99, 1_000, 0)
            .expect("second seed is a no-op");
        let clock = store.clock().expect("clock");
        assert_eq!(clock.seed, 1337);
    }

    #[test]
    fn exactly_one_winner_per_tick_boundary() {
        let mut store = seeded();
        let observed = store.clock().expect("clock").current_tick;

        let tx = store.conn.transaction().expect("tx");
        assert!(cas_advance_tick(&tx, observed, 111).expect("first attempt"));
        tx.commit().expect("commit");

        // A racing driver that read the same boundary loses with no effect.
        let tx = store.conn.transaction().expect("tx");
        assert!(!cas_advance_tick(&tx, observed, 222).expect("second attempt"));
        tx.commit().expect("commit");

        let clock = store.clock().expect("clock");
        assert_eq!(clock.current_tick, observed + 1);
        assert_eq!(clock.last_tick_at_ms, 111);
    }

    #[test]
    fn buy_moves_credits_cargo_and_market_levels() {
        let mut store = seeded();
        let before = store.player("player_002").expect("player").expect("exists");
        let entry_before = load_market_entry(&store.conn, "st_vega_forge", "machinery")
            .expect("entry")
            .expect("exists");

        let request = TradeRequest {
            ship_id: "ship_000003".into(),
            station_id: "st_vega_forge".into(),
            good_id: "machinery".into(),
            quantity: 5,
            side: TradeSide::Buy,
        };
        let (response, events) = store.trade(&request).expect("trade succeeds");

        assert_eq!(response.total_price, response.unit_price * 5);
        assert_eq!(response.credits, before.credits - response.total_price);
        assert_eq!(response.cargo[0].good_id, "machinery");
        assert_eq!(response.cargo[0].quantity, 5);
        assert_eq!(response.market.supply, entry_before.supply - 5);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::TradeExecuted);

        let after = store.player("player_002").expect("player").expect("exists");
        assert_eq!(after.credits, response.credits);
    }

    #[test]
    fn rejected_trade_leaves_credits_market_and_cargo_unchanged() {
        let mut store = seeded();
        store
            .conn
            .execute(
                "UPDATE players SET credits = 10 WHERE player_id = 'player_002'",
                [],
            )
            .expect("shrink credits");

        let entry_before = load_market_entry(&store.conn, "st_vega_forge", "machinery")
            .expect("entry")
            .expect("exists");

        let request = TradeRequest {
            ship_id: "ship_000003".into(),
            station_id: "st_vega_forge".into(),
            good_id: "machinery".into(),
            quantity: 5,
            side: TradeSide::Buy,
        };
        let failure = store.trade(&request).expect_err("cannot afford");
        assert!(matches!(failure, ActionFailure::Rejected(_)));
        assert_eq!(failure.error_code(), ErrorCode::PreconditionFailed);

        let player = store.player("player_002").expect("player").expect("exists");
        assert_eq!(player.credits, 10);
        let entry_after = load_market_entry(&store.conn, "st_vega_forge", "machinery")
            .expect("entry")
            .expect("exists");
        assert_eq!(entry_after, entry_before);
        let cargo = store.ship_cargo("ship_000003").expect("cargo");
        assert!(cargo.is_empty());
    }

    #[test]
    fn navigate_places_ship_in_transit_and_deducts_fuel() {
        let mut store = seeded();
        let request = NavigateRequest {
            mover: MoverId::Ship("ship_000003".into()),
            route: vec!["sys_vega".into(), "sys_rigel".into()],
        };
        let (response, events) = store.navigate(&request).expect("navigate succeeds");

        assert_eq!(response.fuel_spent_per_ship, 12);
        let ship = &response.ships[0];
        assert_eq!(ship.status, ShipStatus::InTransit);
        assert_eq!(ship.destination_system_id.as_deref(), Some("sys_rigel"));
        assert!(ship.transit_invariant_holds());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::ShipDeparted);

        // A second identical order must fail: the ship is no longer docked.
        let failure = store.navigate(&request).expect_err("already in transit");
        assert!(matches!(failure, ActionFailure::Rejected(_)));
    }

    #[test]
    fn convoy_member_cannot_navigate_solo() {
        let mut store = seeded();
        let request = NavigateRequest {
            mover: MoverId::Ship("ship_000001".into()),
            route: vec!["sys_sol".into(), "sys_vega".into()],
        };
        let failure = store.navigate(&request).expect_err("in a convoy");
        assert!(matches!(
            failure,
            ActionFailure::Rejected(ActionError::ShipInConvoy { .. })
        ));
    }

    #[test]
    fn convoy_navigates_as_a_unit() {
        let mut store = seeded();
        let request = NavigateRequest {
            mover: MoverId::Convoy("convoy_000001".into()),
            route: vec!["sys_sol".into(), "sys_vega".into()],
        };
        let (response, events) = store.navigate(&request).expect("convoy navigates");
        assert_eq!(response.ships.len(), 2);
        assert_eq!(events.len(), 2);
        for ship in &response.ships {
            assert_eq!(ship.status, ShipStatus::InTransit);
            assert_eq!(ship.arrival_tick, Some(response.arrival_tick));
        }
    }

    #[test]
    fn arrivals_due_selects_exactly_ships_at_or_before_tick() {
        let store = seeded();
        for (suffix, arrival) in [("a", 5_i64), ("b", 10), ("c", 15)] {
            store
                .conn
                .execute(
                    &format!(
                        "INSERT INTO ships ({SHIP_COLUMNS})
                         VALUES (?1, 'player_001', 'scout', 'Test', 10, 50, 60, 60, 20, 20,
                                 8, 6, 35, 20, 'in_transit', 'sys_sol', 'sys_vega', 1, ?2, NULL)"
                    ),
                    params![format!("ship_due_{suffix}"), arrival],
                )
                .expect("insert transit ship");
        }

        let due = ships_in_transit_due(&store.conn, 10).expect("due ships");
        let ids: Vec<&str> = due.iter().map(|ship| ship.ship_id.as_str()).collect();
        assert!(ids.contains(&"ship_due_a"));
        assert!(ids.contains(&"ship_due_b"));
        assert!(!ids.contains(&"ship_due_c"));
    }

    #[test]
    fn finish_arrival_restores_the_docked_invariant() {
        let mut store = seeded();
        let request = NavigateRequest {
            mover: MoverId::Ship("ship_000003".into()),
            route: vec!["sys_vega".into(), "sys_rigel".into()],
        };
        store.navigate(&request).expect("navigate");

        finish_arrival(&store.conn, "ship_000003", "sys_rigel").expect("arrival");
        let ship = load_ship(&store.conn, "ship_000003")
            .expect("load")
            .expect("exists");
        assert_eq!(ship.status, ShipStatus::Docked);
        assert_eq!(ship.system_id, "sys_rigel");
        assert!(ship.transit_invariant_holds());
    }

    #[test]
    fn notifications_paginate_with_cursor_and_filters() {
        let mut store = seeded();
        for index in 0..5u64 {
            let kind = if index % 2 == 0 {
                EventType::ShipArrived
            } else {
                EventType::BattleStarted
            };
            insert_notification(
                &store.conn,
                "player_001",
                kind,
                &format!("notification {index}"),
                &[],
                index,
            )
            .expect("insert notification");
        }

        let page = store
            .notifications_page("player_001", None, 2, None, false)
            .expect("first page");
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        let cursor = page.next_cursor.expect("more pages");

        let page2 = store
            .notifications_page("player_001", Some(cursor), 2, None, false)
            .expect("second page");
        assert_eq!(page2.items.len(), 2);
        assert!(page2.items[0].notification_id < cursor);

        let arrivals = store
            .notifications_page("player_001", None, 10, Some(EventType::ShipArrived), false)
            .expect("filtered page");
        assert_eq!(arrivals.total, 3);
        assert!(arrivals
            .items
            .iter()
            .all(|item| item.kind == EventType::ShipArrived));

        let marked = store
            .mark_notifications_read("player_001", None)
            .expect("mark read");
        assert_eq!(marked, 5);
        let unread = store
            .notifications_page("player_001", None, 10, None, true)
            .expect("unread page");
        assert_eq!(unread.total, 0);
    }

    #[test]
    fn purchase_ship_charges_and_creates_docked_ship() {
        let mut store = seeded();
        let request = PurchaseShipRequest {
            player_id: "player_002".into(),
            system_id: "sys_vega".into(),
            ship_type: "scout".into(),
            name: Some("Outrider".into()),
        };
        let (response, events) = store.purchase_ship(&request).expect("purchase");
        assert_eq!(response.credits, 5_000 - response.price);
        assert_eq!(response.ship.system_id, "sys_vega");
        assert!(response.ship.transit_invariant_holds());
        assert_eq!(events[0].event_type, EventType::ShipPurchased);

        let (ships, _) = store.fleet("player_002").expect("fleet");
        assert_eq!(ships.len(), 2);
    }

    #[test]
    fn install_and_remove_upgrade_round_trip_credits() {
        let mut store = seeded();
        let install = InstallUpgradeRequest {
            ship_id: "ship_000003".into(),
            slot_id: "weapon_1".into(),
            module_id: "pulse_laser".into(),
            tier: 1,
        };
        let (installed, _) = store.install_upgrade(&install).expect("install");
        assert_eq!(installed.amount_charged, 300);

        let upgrades = store.ship_upgrades("ship_000003").expect("upgrades");
        assert_eq!(upgrades.len(), 1);

        let remove = RemoveUpgradeRequest {
            ship_id: "ship_000003".into(),
            slot_id: "weapon_1".into(),
        };
        let (removed, _) = store.remove_upgrade(&remove).expect("remove");
        assert_eq!(removed.amount_charged, -150);
        assert!(removed.installed.is_none());
        assert_eq!(removed.credits, 5_000 - 300 + 150);
    }

    #[test]
    fn refuel_tops_up_after_travel() {
        let mut store = seeded();
        store
            .conn
            .execute(
                "UPDATE ships SET fuel = 20 WHERE ship_id = 'ship_000003'",
                [],
            )
            .expect("drain fuel");

        let request = RefuelRequest {
            ship_id: "ship_000003".into(),
            amount: 100,
        };
        let (response, _) = store.refuel(&request).expect("refuel");
        assert_eq!(response.amount_added, 40);
        assert_eq!(response.fuel, 60);
        assert_eq!(response.cost, 40 * catalog::FUEL_UNIT_PRICE);
    }

    #[test]
    fn convoy_refuel_services_every_member() {
        let mut store = seeded();
        store
            .conn
            .execute(
                "UPDATE ships SET fuel = 0 WHERE convoy_id = 'convoy_000001'",
                [],
            )
            .expect("drain convoy");

        let request = ConvoyServiceRequest {
            convoy_id: "convoy_000001".into(),
            fraction_pct: 100,
        };
        let (response, events) = store
            .convoy_service(&request, ConvoyServiceKind::Refuel)
            .expect("service");
        assert_eq!(response.serviced.len(), 2);
        assert!(response.total_cost > 0);
        assert_eq!(events[0].event_type, EventType::ConvoyServiced);

        let (ships, _) = store.fleet("player_001").expect("fleet");
        for ship in ships {
            assert_eq!(ship.fuel, ship.max_fuel);
        }
    }
}
