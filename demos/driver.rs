use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tempo::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🚀 Driving the scheduler from a tokio interval\n");

    // Reads [scheduler] from the file when present; TEMPO_SCHEDULER__* overrides apply.
    let builder = match SchedulerBuilder::with_toml("config/application.toml") {
        Ok(builder) => builder,
        Err(e) => {
            println!("⚠️  {e}; using defaults");
            SchedulerBuilder::new()
        }
    };
    let shared = Driver::share(builder.build()?);

    let beats = Arc::new(AtomicU32::new(0));
    {
        let mut scheduler = shared.lock();
        let owner = scheduler.bind_detached();
        let counter = beats.clone();
        scheduler.invoke_repeating(owner, "heartbeat", 0.5, 0.5, move |ctx| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            println!("[BEAT]   #{n} at {:.3}s (frame {})", ctx.now(), ctx.frame());
        })?;
    }

    let driver = Driver::spawn(shared.clone());
    tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;
    driver.shutdown().await;

    println!("\n📊 RESULTS after 3 seconds:");
    println!("   Heartbeats: {}", beats.load(Ordering::SeqCst));
    println!("   Frames: {}", shared.lock().frame());
    Ok(())
}
