use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use helios_api::{now_ms, serve, EventHub, SqliteWorldStore, TickOutcome, TickScheduler};
use tokio::sync::Mutex;

fn print_usage() {
    println!("helios <command>");
    println!("commands:");
    println!("  status [sqlite_path]");
    println!("  seed [seed] [tick_interval_ms] [sqlite_path]");
    println!("  tick [n] [sqlite_path]");
    println!("    forces n tick advances regardless of wall clock");
    println!("  serve [addr] [sqlite_path]");
    println!("    default addr: 127.0.0.1:8080");
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn default_sqlite_path() -> String {
    std::env::var("HELIOS_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "helios_world.sqlite".to_string())
}

fn parse_sqlite_path(value: Option<&String>) -> String {
    value
        .map(String::to_string)
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path)
}

fn open_store(path: &str) -> Result<SqliteWorldStore, String> {
    SqliteWorldStore::open(path).map_err(|err| format!("failed to open {path}: {err}"))
}

fn run_seed(args: &[String]) -> Result<(), String> {
    let seed = args
        .get(2)
        .map(|value| value.parse::<u64>().map_err(|_| format!("invalid seed: {value}")))
        .transpose()?
        .unwrap_or(1337);
    let tick_interval_ms = args
        .get(3)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid tick_interval_ms: {value}"))
        })
        .transpose()?
        .unwrap_or(5_000);
    let sqlite_path = parse_sqlite_path(args.get(4));

    let mut store = open_store(&sqlite_path)?;
    store
        .seed_demo_world(seed, tick_interval_ms, now_ms())
        .map_err(|err| format!("seed failed: {err}"))?;
    let clock = store.clock().map_err(|err| format!("clock: {err}"))?;
    println!("seeded sqlite={sqlite_path} {clock}");
    Ok(())
}

/// Drives the scheduler synchronously, presenting each attempt with a wall
/// clock exactly one interval past the last tick so the boundary is always
/// due.
async fn run_ticks(args: &[String]) -> Result<(), String> {
    let count = args
        .get(2)
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(1);
    let sqlite_path = parse_sqlite_path(args.get(3));

    let store = Arc::new(Mutex::new(open_store(&sqlite_path)?));
    let scheduler = TickScheduler::new(Arc::clone(&store), EventHub::new());

    let mut advanced = 0;
    for _ in 0..count {
        let due_at = {
            let guard = store.lock().await;
            let clock = guard.clock().map_err(|err| format!("clock: {err}"))?;
            clock.last_tick_at_ms + clock.tick_interval_ms
        };
        match scheduler
            .try_advance(due_at)
            .await
            .map_err(|err| format!("tick failed: {err}"))?
        {
            TickOutcome::Advanced(batch) => {
                advanced += 1;
                println!("tick={} events={}", batch.tick, batch.events.len());
            }
            TickOutcome::NotDue | TickOutcome::LostRace => {}
        }
    }

    let guard = store.lock().await;
    let clock = guard.clock().map_err(|err| format!("clock: {err}"))?;
    println!("advanced={advanced} {clock}");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("status") => {
            let sqlite_path = parse_sqlite_path(args.get(2));
            match open_store(&sqlite_path).and_then(|store| {
                store
                    .clock()
                    .map_err(|err| format!("clock: {err}"))
            }) {
                Ok(clock) => println!("{clock}"),
                Err(err) => {
                    eprintln!("error: {err}");
                    std::process::exit(2);
                }
            }
        }
        Some("seed") => {
            if let Err(err) = run_seed(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        Some("tick") => {
            if let Err(err) = run_ticks(&args).await {
                eprintln!("error: {err}");
                std::process::exit(2);
            }
        }
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                let sqlite_path = parse_sqlite_path(args.get(3));
                if let Err(err) = serve(addr, &sqlite_path).await {
                    eprintln!("server error: {err}");
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        },
        _ => {
            print_usage();
        }
    }
}
