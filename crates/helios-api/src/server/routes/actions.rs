async fn post_navigate(
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<NavigateResponse>, HttpApiError> {
    let (response, events) = {
        let mut store = state.store.lock().await;
        store
            .navigate(&request)
            .map_err(HttpApiError::from_action_failure)?
    };
    broadcast_action_events(&state, events).await;
    Ok(Json(response))
}

async fn post_trade(
    State(state): State<AppState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<TradeResponse>, HttpApiError> {
    let (response, events) = {
        let mut store = state.store.lock().await;
        store
            .trade(&request)
            .map_err(HttpApiError::from_action_failure)?
    };
    broadcast_action_events(&state, events).await;
    Ok(Json(response))
}

async fn post_purchase_ship(
    State(state): State<AppState>,
    Json(request): Json<PurchaseShipRequest>,
) -> Result<Json<PurchaseShipResponse>, HttpApiError> {
    let (response, events) = {
        let mut store = state.store.lock().await;
        store
            .purchase_ship(&request)
            .map_err(HttpApiError::from_action_failure)?
    };
    broadcast_action_events(&state, events).await;
    Ok(Json(response))
}

async fn post_install_upgrade(
    State(state): State<AppState>,
    Json(request): Json<InstallUpgradeRequest>,
) -> Result<Json<UpgradeResponse>, HttpApiError> {
    let (response, events) = {
        let mut store = state.store.lock().await;
        store
            .install_upgrade(&request)
            .map_err(HttpApiError::from_action_failure)?
    };
    broadcast_action_events(&state, events).await;
    Ok(Json(response))
}

async fn post_remove_upgrade(
    State(state): State<AppState>,
    Json(request): Json<RemoveUpgradeRequest>,
) -> Result<Json<UpgradeResponse>, HttpApiError> {
    let (response, events) = {
        let mut store = state.store.lock().await;
        store
            .remove_upgrade(&request)
            .map_err(HttpApiError::from_action_failure)?
    };
    broadcast_action_events(&state, events).await;
    Ok(Json(response))
}

async fn post_refuel(
    State(state): State<AppState>,
    Json(request): Json<RefuelRequest>,
) -> Result<Json<RefuelResponse>, HttpApiError> {
    let (response, events) = {
        let mut store = state.store.lock().await;
        store
            .refuel(&request)
            .map_err(HttpApiError::from_action_failure)?
    };
    broadcast_action_events(&state, events).await;
    Ok(Json(response))
}

async fn post_convoy_refuel(
    State(state): State<AppState>,
    Json(request): Json<ConvoyServiceRequest>,
) -> Result<Json<ConvoyServiceResponse>, HttpApiError> {
    let (response, events) = {
        let mut store = state.store.lock().await;
        store
            .convoy_service(&request, ConvoyServiceKind::Refuel)
            .map_err(HttpApiError::from_action_failure)?
    };
    broadcast_action_events(&state, events).await;
    Ok(Json(response))
}

async fn post_convoy_repair(
    State(state): State<AppState>,
    Json(request): Json<ConvoyServiceRequest>,
) -> Result<Json<ConvoyServiceResponse>, HttpApiError> {
    let (response, events) = {
        let mut store = state.store.lock().await;
        store
            .convoy_service(&request, ConvoyServiceKind::Repair)
            .map_err(HttpApiError::from_action_failure)?
    };
    broadcast_action_events(&state, events).await;
    Ok(Json(response))
}
