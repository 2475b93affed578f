async fn get_world(State(state): State<AppState>) -> Result<Json<QueryResponse>, HttpApiError> {
    let store = state.store.lock().await;
    let clock = store.clock().map_err(HttpApiError::from_store)?;

    Ok(Json(QueryResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        query_type: "world.clock".to_string(),
        generated_at_tick: clock.current_tick,
        data: json!({ "world": clock }),
    }))
}

async fn get_systems(State(state): State<AppState>) -> Result<Json<QueryResponse>, HttpApiError> {
    let store = state.store.lock().await;
    let clock = store.clock().map_err(HttpApiError::from_store)?;
    let systems = store.systems().map_err(HttpApiError::from_store)?;
    let connections = store.lanes().map_err(HttpApiError::from_store)?;

    Ok(Json(QueryResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        query_type: "galaxy.graph".to_string(),
        generated_at_tick: clock.current_tick,
        data: json!({
            "systems": systems,
            "connections": connections,
        }),
    }))
}

async fn get_market(
    Path(station_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QueryResponse>, HttpApiError> {
    let store = state.store.lock().await;
    let clock = store.clock().map_err(HttpApiError::from_store)?;
    let station = store
        .station(&station_id)
        .map_err(HttpApiError::from_store)?
        .ok_or_else(|| {
            HttpApiError::from_action_failure(ActionFailure::NotFound {
                entity: "station",
                id: station_id.clone(),
            })
        })?;
    let quotes = store
        .market_for_station(&station_id)
        .map_err(HttpApiError::from_store)?;

    Ok(Json(QueryResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        query_type: "market.station".to_string(),
        generated_at_tick: clock.current_tick,
        data: json!({
            "station": station,
            "entries": quotes,
        }),
    }))
}

async fn get_fleet(
    Path(player_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QueryResponse>, HttpApiError> {
    let store = state.store.lock().await;
    let clock = store.clock().map_err(HttpApiError::from_store)?;
    let player = store
        .player(&player_id)
        .map_err(HttpApiError::from_store)?
        .ok_or_else(|| {
            HttpApiError::from_action_failure(ActionFailure::NotFound {
                entity: "player",
                id: player_id.clone(),
            })
        })?;
    let (ships, convoys) = store.fleet(&player_id).map_err(HttpApiError::from_store)?;

    let mut cargo = serde_json::Map::new();
    let mut upgrades = serde_json::Map::new();
    for ship in &ships {
        let hold = store
            .ship_cargo(&ship.ship_id)
            .map_err(HttpApiError::from_store)?;
        let installed = store
            .ship_upgrades(&ship.ship_id)
            .map_err(HttpApiError::from_store)?;
        cargo.insert(ship.ship_id.clone(), json!(hold));
        upgrades.insert(ship.ship_id.clone(), json!(installed));
    }

    Ok(Json(QueryResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        query_type: "player.fleet".to_string(),
        generated_at_tick: clock.current_tick,
        data: json!({
            "player": player,
            "ships": ships,
            "convoys": convoys,
            "cargo": cargo,
            "upgrades": upgrades,
        }),
    }))
}

async fn get_battles(
    Path(player_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QueryResponse>, HttpApiError> {
    let store = state.store.lock().await;
    let clock = store.clock().map_err(HttpApiError::from_store)?;
    let battles = store
        .active_battles(&player_id)
        .map_err(HttpApiError::from_store)?;

    Ok(Json(QueryResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        query_type: "player.battles".to_string(),
        generated_at_tick: clock.current_tick,
        data: json!({ "battles": battles }),
    }))
}

async fn get_world_events(
    State(state): State<AppState>,
) -> Result<Json<QueryResponse>, HttpApiError> {
    let store = state.store.lock().await;
    let clock = store.clock().map_err(HttpApiError::from_store)?;
    let events = store
        .active_world_events()
        .map_err(HttpApiError::from_store)?;

    Ok(Json(QueryResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        query_type: "world.events".to_string(),
        generated_at_tick: clock.current_tick,
        data: json!({ "events": events }),
    }))
}

#[derive(Debug, Deserialize, Default)]
struct NotificationsQuery {
    cursor: Option<i64>,
    limit: Option<usize>,
    kind: Option<String>,
    unread_only: Option<bool>,
}

async fn get_notifications(
    Path(player_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<contracts::NotificationPage>, HttpApiError> {
    let limit = clamp_page_size(query.limit);
    let kind = parse_kind_filter(query.kind.as_deref())?;

    let store = state.store.lock().await;
    let page = store
        .notifications_page(
            &player_id,
            query.cursor,
            limit,
            kind,
            query.unread_only.unwrap_or(false),
        )
        .map_err(HttpApiError::from_store)?;

    Ok(Json(page))
}

#[derive(Debug, Deserialize, Default)]
struct MarkReadRequest {
    /// Specific notifications to mark; omitted means every unread one.
    notification_ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
struct MarkReadResponse {
    schema_version: String,
    marked: usize,
}

async fn mark_notifications_read(
    Path(player_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, HttpApiError> {
    let mut store = state.store.lock().await;
    let marked = store
        .mark_notifications_read(&player_id, request.notification_ids.as_deref())
        .map_err(HttpApiError::from_store)?;

    Ok(Json(MarkReadResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        marked,
    }))
}
