use tempo::prelude::*;
use tempo::TickTime;
use tracing_subscriber::EnvFilter;

/// Fades a light over a number of ticks, one step per tick.
struct Fade {
    level: f64,
    step: f64,
}

impl Routine for Fade {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Result<Step, RoutineError> {
        self.level = (self.level - self.step).max(0.0);
        println!("[FADE]   frame {:>2}: light at {:.0}%", ctx.frame(), self.level * 100.0);
        if self.level > 0.0 {
            Ok(Step::Yield(Wait::NextTick))
        } else {
            Ok(Step::Done)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🚀 Coroutines: waits, predicates and joins\n");

    let mut scheduler = Scheduler::new();
    let door = scheduler.bind_detached();

    let fade = scheduler.start_named_coroutine(door, "fade", Fade { level: 1.0, step: 0.25 })?;

    scheduler.start_coroutine(
        door,
        Steps::new()
            .then(|ctx| {
                println!("[DOOR]   waiting for the light at {:.2}s", ctx.now());
                Ok(())
            })
            .wait(Wait::for_coroutine(fade))
            .then(|ctx| {
                println!("[DOOR]   dark, opening at {:.2}s", ctx.now());
                Ok(())
            })
            .wait(Wait::seconds(0.5))
            .then(|ctx| {
                println!("[DOOR]   open at {:.2}s", ctx.now());
                Ok(())
            })
            .wait(Wait::until(|time: &TickTime| time.local >= 2.0))
            .wait(Wait::child(Steps::new().then(|ctx| {
                println!("[CHILD]  closing latch on frame {}", ctx.frame());
                Ok(())
            })))
            .then(|ctx| {
                println!("[DOOR]   closed at {:.2}s", ctx.now());
                Ok(())
            }),
    )?;

    let mut clock = FixedStep::new(0.125);
    while scheduler.running_coroutines() > 0 {
        scheduler.tick(&mut clock)?;
    }

    println!("\n✅ All coroutines finished after {} frames", scheduler.frame());
    Ok(())
}
