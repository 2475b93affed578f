#[derive(Debug, Deserialize, Default)]
struct StreamQuery {
    /// Player whose scoped events this observer should receive; omitted
    /// means a spectator that only sees globally-visible events.
    player_id: Option<String>,
}

async fn stream_world(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, HttpApiError> {
    let snapshot = {
        let store = state.store.lock().await;
        let clock = store.clock().map_err(HttpApiError::from_store)?;
        TickMessage::snapshot(&clock)
    };

    Ok(ws.on_upgrade(move |socket| stream_socket(socket, state, query.player_id, snapshot)))
}

async fn stream_socket(
    mut socket: WebSocket,
    state: AppState,
    player_id: Option<String>,
    snapshot: TickMessage,
) {
    if send_tick_message(&mut socket, &snapshot).await.is_err() {
        return;
    }

    let mut rx = state.hub.subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        break;
                    }
                    _ => {}
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Ok(batch) => {
                        let message = TickMessage::from_batch(&batch, player_id.as_deref());
                        if send_tick_message(&mut socket, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        // Delivery is at-most-once; a lagged observer
                        // catches up from the notifications table.
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }
    // Dropping rx deregisters this observer from the hub.
}

async fn send_tick_message(
    socket: &mut WebSocket,
    message: &TickMessage,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload.into())).await
}
