//! Stateful shell around the pure simulation core: SQLite world store with
//! optimistic tick gating, the injected tick scheduler, the in-process event
//! fan-out hub, and the axum HTTP/WebSocket server.

mod hub;
mod scheduler;
mod server;
mod store;

pub use hub::EventHub;
pub use scheduler::{
    default_processors, now_ms, ArrivalsProcessor, BattleProcessor, EconomyDriftProcessor,
    TickOutcome, TickProcessor, TickScheduler, WorldEventProcessor, DEFAULT_POLL_INTERVAL,
};
pub use server::{serve, ServerError};
pub use store::{ActionFailure, SqliteWorldStore, StoreError};
