//! Live Feed - prints every update pushed for a set of locations
//!
//! Shows the sync-first client end to end:
//! - Connect and subscribe without async/await
//! - Cache invalidation signals through a hook
//! - Events consumed from the blocking iterator
//!
//! Run with: cargo run -p phasewatch-realtime --example live_feed -- ws://localhost:3001/realtime tokyo oslo

use std::time::Duration;

use phasewatch_realtime::prelude::*;
use phasewatch_realtime::RecordPayload;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phasewatch_stream=debug".parse()?)
                .add_directive("phasewatch_realtime=debug".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| SessionConfig::default().url);
    let locations: Vec<String> = args.collect();

    println!("=== phasewatch live feed ===");
    println!("Endpoint: {url}");

    let hooks = SessionHooks::new()
        .on_status(|status| println!("[status] {status}"))
        .on_error(|error| eprintln!("[error] {} ({})", error, error.code()))
        .invalidate_with(|category: CacheCategory| println!("[stale] {category}"));

    let client = RealtimeClient::with_hooks(ClientConfig::new(url), hooks)?;
    client.connect()?;

    for location in &locations {
        client.subscribe(location.as_str());
    }
    client.flush()?;
    println!("Subscribed to {:?}", client.active_topics());

    // Print whatever arrives; show a summary whenever the feed goes quiet.
    loop {
        let iter = client.iter();
        for event in iter.timeout_iter(Duration::from_secs(5)) {
            for record in event.records() {
                println!(
                    "[{}] {} @ {}",
                    record.location(),
                    match &record {
                        RecordPayload::Phase(p) => p.phase.clone(),
                        RecordPayload::Incident(i) => format!("incident {}", i.category),
                    },
                    record.timestamp()
                );
            }
        }

        let snapshot = client.snapshot();
        println!(
            "-- {} | {} topics | {} recent records",
            snapshot.status,
            snapshot.active_topics.len(),
            snapshot.recent_events.len()
        );
        if let Some(error) = snapshot.last_error {
            if error.is_terminal() {
                println!("Reconnection gave up; exiting");
                break;
            }
        }
    }

    client.shutdown()?;
    Ok(())
}
