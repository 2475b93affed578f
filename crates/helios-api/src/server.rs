use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    ApiError, ConvoyServiceRequest, ConvoyServiceResponse, DomainEvent, ErrorCode, EventType,
    InstallUpgradeRequest, NavigateRequest, NavigateResponse, PurchaseShipRequest,
    PurchaseShipResponse, QueryResponse, RefuelRequest, RefuelResponse, RemoveUpgradeRequest,
    TickBatch, TickMessage, TradeRequest, TradeResponse, UpgradeResponse, SCHEMA_VERSION_V1,
};
use helios_core::validate::ConvoyServiceKind;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::hub::EventHub;
use crate::scheduler::{now_ms, TickScheduler};
use crate::store::{ActionFailure, SqliteWorldStore, StoreError};

const DEFAULT_NOTIFICATION_PAGE: usize = 50;
const MAX_NOTIFICATION_PAGE: usize = 100;
const DEFAULT_SEED: u64 = 1337;
const DEFAULT_TICK_INTERVAL_MS: u64 = 5_000;

include!("server/error.rs");
include!("server/state.rs");
include!("server/routes/actions.rs");
include!("server/routes/query.rs");
include!("server/routes/stream.rs");
include!("server/util.rs");

/// Composition root: opens (and seeds, if fresh) the store, wires the hub
/// and scheduler, starts the tick driver, and serves the API.
pub async fn serve(addr: SocketAddr, sqlite_path: &str) -> Result<(), ServerError> {
    let mut store = SqliteWorldStore::open(sqlite_path)?;
    if !store.is_seeded()? {
        store.seed_demo_world(DEFAULT_SEED, DEFAULT_TICK_INTERVAL_MS, now_ms())?;
        info!("seeded demo world into {sqlite_path}");
    }

    let state = AppState::new(store);
    state.scheduler.ensure_started();
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("serving world api on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/world", get(get_world))
        .route("/api/v1/systems", get(get_systems))
        .route("/api/v1/stations/{station_id}/market", get(get_market))
        .route("/api/v1/players/{player_id}/fleet", get(get_fleet))
        .route("/api/v1/players/{player_id}/battles", get(get_battles))
        .route(
            "/api/v1/players/{player_id}/notifications",
            get(get_notifications),
        )
        .route(
            "/api/v1/players/{player_id}/notifications/read",
            post(mark_notifications_read),
        )
        .route("/api/v1/world_events", get(get_world_events))
        .route("/api/v1/actions/navigate", post(post_navigate))
        .route("/api/v1/actions/trade", post(post_trade))
        .route("/api/v1/actions/purchase_ship", post(post_purchase_ship))
        .route("/api/v1/actions/install_upgrade", post(post_install_upgrade))
        .route("/api/v1/actions/remove_upgrade", post(post_remove_upgrade))
        .route("/api/v1/actions/refuel", post(post_refuel))
        .route("/api/v1/actions/convoy_refuel", post(post_convoy_refuel))
        .route("/api/v1/actions/convoy_repair", post(post_convoy_repair))
        .route("/api/v1/stream", get(stream_world))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}
