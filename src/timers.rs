//! Active timer set for the recording session
//!
//! The level monitor and the duration governor are two independent recurring
//! tasks. They are always started and cancelled together, through one
//! cancellation token, so leaving `Recording` for any reason stops both.
//!
//! The part of a duration period already recorded when the set is cancelled
//! is carried over to the next start for the same session, so pausing never
//! throws captured time away.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::state_machine::Event;

struct Running {
    session_id: Uuid,
    cancel: CancellationToken,
    started: Instant,
    /// Delay before the first duration tick of this run.
    first_tick: Duration,
}

/// Partial duration period left over from a cancelled run.
#[derive(Debug, Clone, Copy)]
struct Carry {
    session_id: Uuid,
    partial: Duration,
}

/// Owns the session's recurring timers.
pub struct ActiveTimers {
    level_interval: Duration,
    duration_tick: Duration,
    running: Option<Running>,
    carry: Option<Carry>,
}

impl ActiveTimers {
    pub fn new(level_interval: Duration, duration_tick: Duration) -> Self {
        Self {
            level_interval,
            duration_tick,
            running: None,
            carry: None,
        }
    }

    /// Start both timers for `session_id`, replacing any running set.
    ///
    /// The first level tick fires one full period after start. The first
    /// duration tick fires once the period carried over from the previous
    /// run of the same session is complete.
    pub fn start(&mut self, session_id: Uuid, tx: mpsc::UnboundedSender<Event>) {
        self.cancel();

        let carried = match self.carry.take() {
            Some(carry) if carry.session_id == session_id => carry.partial,
            _ => Duration::ZERO,
        };
        let first_tick = self.duration_tick.saturating_sub(carried);

        let cancel = CancellationToken::new();
        spawn_ticker(
            self.level_interval,
            self.level_interval,
            cancel.clone(),
            tx.clone(),
            move || Event::LevelTick { id: session_id },
        );
        spawn_ticker(
            first_tick,
            self.duration_tick,
            cancel.clone(),
            tx,
            move || Event::DurationTick { id: session_id },
        );

        log::debug!(
            "Timers started for {} (level every {:?}, duration every {:?}, first in {:?})",
            session_id,
            self.level_interval,
            self.duration_tick,
            first_tick
        );
        self.running = Some(Running {
            session_id,
            cancel,
            started: Instant::now(),
            first_tick,
        });
    }

    /// Cancel every running timer. Safe to call when nothing runs.
    pub fn cancel(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            let partial = self.partial_period(&running);
            log::debug!(
                "Timers cancelled for {} ({:?} into the current second)",
                running.session_id,
                partial
            );
            self.carry = Some(Carry {
                session_id: running.session_id,
                partial,
            });
        }
    }

    /// Time recorded since the last duration tick of `running`.
    fn partial_period(&self, running: &Running) -> Duration {
        let since = running.started.elapsed();
        let already = self.duration_tick.saturating_sub(running.first_tick);
        if since < running.first_tick {
            return already + since;
        }
        let period = self.duration_tick.as_nanos().max(1);
        let into = (since - running.first_tick).as_nanos() % period;
        Duration::from_nanos(into as u64)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for ActiveTimers {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn spawn_ticker<F>(
    first: Duration,
    period: Duration,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Event>,
    make_event: F,
) where
    F: Fn() -> Event + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + first, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticks.tick() => {
                    if tx.send(make_event()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}
