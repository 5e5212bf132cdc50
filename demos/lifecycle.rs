use std::sync::Arc;

use tempo::prelude::*;
use tempo::Diagnostic;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    println!("🚀 Owner lifecycle: pause, resume, destroy\n");

    let mut scheduler = Scheduler::new();
    let player = Arc::new(BehaviourFlags::new());
    let owner = scheduler.bind(&player);

    scheduler.invoke_repeating(owner, "regen", 1.0, 1.0, |ctx| {
        println!(
            "[REGEN]  global {:.1}s, player clock {:.1}s",
            ctx.now(),
            ctx.local_time()
        );
    })?;

    let mut clock = FixedStep::new(0.5);
    for frame in 1..=16 {
        match frame {
            4 => {
                println!("⏸️  player paused");
                player.set_active(false);
            }
            8 => {
                println!("▶️  player resumed");
                player.set_active(true);
            }
            14 => {
                println!("💀 player destroyed");
                player.mark_destroyed();
            }
            _ => {}
        }
        scheduler.tick(&mut clock)?;
    }

    for diagnostic in scheduler.take_diagnostics() {
        if let Diagnostic::OwnerPurged { owner, summary } = diagnostic {
            println!(
                "\n📊 {owner} purged: {} invokes, {} coroutines",
                summary.invokes, summary.coroutines
            );
        }
    }

    match scheduler.invoke(owner, "revive", 0.0, |_| {}) {
        Ok(_) => println!("unexpected: destroyed owner accepted work"),
        Err(e) => println!("   late registration rejected: {e}"),
    }
    Ok(())
}
