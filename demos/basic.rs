use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tempo::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🚀 Delayed and repeating invokes on a fixed 100ms step\n");

    let mut scheduler = SchedulerBuilder::new().build()?;
    let turret = scheduler.bind_detached();
    let shots = Arc::new(AtomicU32::new(0));

    scheduler.invoke(turret, "arm", 0.5, |ctx| {
        println!("[ARM]    turret armed at {:.1}s", ctx.local_time());
    })?;

    let counter = shots.clone();
    let fire = scheduler.invoke_repeating(turret, "fire", 1.0, 0.3, move |ctx| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[FIRE]   shot #{n} at {:.1}s", ctx.local_time());
    })?;

    scheduler.invoke(turret, "cease", 2.5, move |ctx| {
        println!("[CEASE]  cease fire at {:.1}s", ctx.local_time());
        ctx.cancel_invocation(fire);
    })?;

    let mut clock = FixedStep::new(0.1);
    for _ in 0..40 {
        scheduler.tick(&mut clock)?;
    }

    println!("\n📊 RESULTS after {:.1}s:", clock.now());
    println!("   Shots fired: {}", shots.load(Ordering::SeqCst));
    println!("   Pending invokes: {}", scheduler.pending_invocations());
    Ok(())
}
