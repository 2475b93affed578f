#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteWorldStore>>,
    hub: EventHub,
    scheduler: Arc<TickScheduler>,
}

impl AppState {
    fn new(store: SqliteWorldStore) -> Self {
        let store = Arc::new(Mutex::new(store));
        let hub = EventHub::new();
        let scheduler = Arc::new(TickScheduler::new(Arc::clone(&store), hub.clone()));
        Self {
            store,
            hub,
            scheduler,
        }
    }
}

/// Request-scoped mutations share the tick stream: their events ride a
/// batch stamped with the current tick, published outside any transaction.
async fn broadcast_action_events(state: &AppState, events: Vec<DomainEvent>) {
    if events.is_empty() {
        return;
    }
    let clock = {
        let store = state.store.lock().await;
        store.clock()
    };
    if let Ok(clock) = clock {
        state.hub.publish(TickBatch {
            tick: clock.current_tick,
            tick_interval_ms: clock.tick_interval_ms,
            events,
        });
    }
}
