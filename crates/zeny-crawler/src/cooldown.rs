//! Cooldown gate: rate-limits crawl runs and drives a live countdown.
//!
//! The gate is READY when no run was recorded or the cooldown has elapsed since
//! the last one, COOLING otherwise. While cooling, a countdown task publishes
//! the remaining time once per second on a `watch` channel and publishes
//! `Ready` the moment it reaches zero.
//!
//! At most one countdown task is alive per gate. Starting a countdown aborts
//! the previous one, and a finished countdown clears its own slot.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_secs(1);

/// Gate state as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CooldownStatus {
    Ready,
    Cooling { remaining_ms: i64 },
}

impl CooldownStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn status_message(&self) -> String {
        match self {
            Self::Ready => "Ready to run".to_string(),
            Self::Cooling { remaining_ms } => {
                format!("Next run allowed in {}", format_remaining(*remaining_ms))
            }
        }
    }
}

/// `"{m}m {s}s"`, rounding the seconds down.
pub fn format_remaining(remaining_ms: i64) -> String {
    let remaining_ms = remaining_ms.max(0);
    let minutes = remaining_ms / 60_000;
    let seconds = (remaining_ms % 60_000) / 1_000;
    format!("{minutes}m {seconds}s")
}

#[derive(Default)]
struct TimerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// Rate limiter over the last-run timestamp.
pub struct CooldownGate {
    cooldown_ms: i64,
    last_run_ms: Option<i64>,
    status_tx: watch::Sender<CooldownStatus>,
    timer: Arc<Mutex<TimerSlot>>,
}

impl CooldownGate {
    pub fn new(cooldown_ms: i64) -> Self {
        let (status_tx, _) = watch::channel(CooldownStatus::Ready);
        Self {
            cooldown_ms,
            last_run_ms: None,
            status_tx,
            timer: Arc::new(Mutex::new(TimerSlot::default())),
        }
    }

    /// Restore a previously persisted timestamp without starting a countdown.
    pub fn with_last_run(mut self, last_run_ms: Option<i64>) -> Self {
        self.last_run_ms = last_run_ms;
        self
    }

    pub fn cooldown_ms(&self) -> i64 {
        self.cooldown_ms
    }

    pub fn last_run_ms(&self) -> Option<i64> {
        self.last_run_ms
    }

    pub fn is_ready(&self, now_ms: i64) -> bool {
        match self.last_run_ms {
            None => true,
            Some(last) => now_ms - last >= self.cooldown_ms,
        }
    }

    /// Milliseconds until ready; 0 when ready.
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        match self.last_run_ms {
            None => 0,
            Some(last) => (self.cooldown_ms - (now_ms - last)).clamp(0, self.cooldown_ms),
        }
    }

    pub fn status(&self, now_ms: i64) -> CooldownStatus {
        if self.is_ready(now_ms) {
            CooldownStatus::Ready
        } else {
            CooldownStatus::Cooling {
                remaining_ms: self.remaining_ms(now_ms),
            }
        }
    }

    /// Record a run at `now_ms` and restart the countdown.
    pub fn record_run(&mut self, now_ms: i64) {
        self.last_run_ms = Some(now_ms);
        tracing::info!("cooldown started: {} ms", self.cooldown_ms);
        self.start_countdown(now_ms);
    }

    /// Subscribe to status updates from the countdown.
    pub fn subscribe(&self) -> watch::Receiver<CooldownStatus> {
        self.status_tx.subscribe()
    }

    /// (Re)start the countdown from the state at `now_ms`.
    ///
    /// Any running countdown is aborted first. When already ready, publishes
    /// `Ready` and leaves no timer behind. Must be called within a tokio runtime.
    pub fn start_countdown(&self, now_ms: i64) {
        let mut slot = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = slot.handle.take() {
            prev.abort();
        }
        slot.generation += 1;

        let status = self.status(now_ms);
        self.status_tx.send_replace(status);
        let CooldownStatus::Cooling { remaining_ms } = status else {
            return;
        };

        let generation = slot.generation;
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(remaining_ms.max(0) as u64);
        let status_tx = self.status_tx.clone();
        let timer = Arc::clone(&self.timer);

        slot.handle = Some(tokio::spawn(async move {
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    status_tx.send_replace(CooldownStatus::Ready);
                    tracing::info!("cooldown finished");
                    break;
                }
                status_tx.send_replace(CooldownStatus::Cooling {
                    remaining_ms: remaining.as_millis() as i64,
                });
                tokio::time::sleep(remaining.min(TICK)).await;
            }

            let mut slot = timer.lock().unwrap_or_else(|e| e.into_inner());
            if slot.generation == generation {
                slot.handle = None;
            }
        }));
    }

    /// Abort the countdown, if any.
    pub fn stop(&self) {
        let mut slot = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        slot.generation += 1;
    }

    /// Whether a countdown task is currently registered.
    pub fn has_live_timer(&self) -> bool {
        let slot = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        slot.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CooldownGate {
    fn drop(&mut self) {
        self.stop();
    }
}
