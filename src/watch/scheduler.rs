use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub const MIN_INTERVAL_SECS: u64 = 500;
pub const MAX_INTERVAL_SECS: u64 = 86_400;
pub const DEFAULT_INTERVAL_SECS: u64 = 86_400;

/// Clamp a configured interval into the supported range, with a warning when
/// the configured value falls outside it.
pub fn clamp_interval(secs: u64) -> u64 {
    let clamped = secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
    if clamped != secs {
        tracing::warn!(
            configured = secs,
            effective = clamped,
            "Poll interval outside supported range, clamping"
        );
    }
    clamped
}

/// Clears the in-flight flag when the cycle task finishes, including by
/// panic, so a crashed cycle can never wedge the guard shut.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drive `launch` on a fixed cadence, forever.
///
/// The first tick fires immediately, then every `interval_secs` seconds. Each
/// tick spawns the launched future as an independent task: the timer re-arms
/// at launch, not at completion, so one slow cycle never delays the schedule.
///
/// When `allow_overlap` is false (the default configuration), a tick that
/// arrives while the previous cycle is still running is skipped; this closes
/// the duplicate-notification race where two concurrent cycles read the same
/// stale watermark. With `allow_overlap` true, every tick launches
/// unconditionally and cycles may run concurrently.
///
/// There is no terminal state; the loop runs until the process exits.
pub async fn run_scheduler<F, Fut>(interval_secs: u64, allow_overlap: bool, mut launch: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let interval_secs = clamp_interval(interval_secs);
    let mut timer = tokio::time::interval(Duration::from_secs(interval_secs));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let in_flight = Arc::new(AtomicBool::new(false));

    loop {
        timer.tick().await;
        tracing::info!("Starting poll tick");

        if !allow_overlap && in_flight.swap(true, Ordering::AcqRel) {
            tracing::warn!("Previous cycle still running, skipping this tick");
            continue;
        }

        let guard = InFlight(Arc::clone(&in_flight));
        let cycle = launch();
        tokio::spawn(async move {
            let _guard = guard;
            cycle.await;
        });
    }
}
