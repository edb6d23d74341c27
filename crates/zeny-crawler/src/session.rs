//! Crawl session: owns the cooldown gate, display preference and last result.
//!
//! `start` restores persisted state and resumes a pending countdown; `stop`
//! tears the countdown down. `crawl` enforces the preconditions of a run
//! (no run in flight, gate ready, character page open), runs the
//! orchestrator and on completion writes the result and the run timestamp.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use regex::Regex;
use tokio::sync::watch;

use crate::automation::BrowserAutomation;
use crate::config::CrawlConfig;
use crate::cooldown::{CooldownGate, CooldownStatus};
use crate::format::{render, Rendering};
use crate::orchestrator::{CrawlOrchestrator, CrawlOutcome};
use crate::progress::{self, ProgressReceiver, ProgressSender};
use crate::store::ResultStore;
use crate::types::{CrawlError, CrawlResult, DisplayPreference, ZenyResult};

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The system clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

struct SessionState {
    gate: CooldownGate,
    preference: DisplayPreference,
    last_result: CrawlResult,
}

/// Clears the in-flight flag when a crawl ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// All mutable crawl state behind one handle.
pub struct CrawlSession {
    config: CrawlConfig,
    page_pattern: Regex,
    store: ResultStore,
    clock: Arc<dyn Clock>,
    progress: ProgressSender,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
}

impl CrawlSession {
    pub fn new(config: CrawlConfig, store: ResultStore) -> ZenyResult<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: CrawlConfig,
        store: ResultStore,
        clock: Arc<dyn Clock>,
    ) -> ZenyResult<Self> {
        let page_pattern = config.page_pattern()?;
        let (progress, _) = progress::channel();
        let gate = CooldownGate::new(config.cooldown_ms);
        Ok(Self {
            config,
            page_pattern,
            store,
            clock,
            progress,
            state: Mutex::new(SessionState {
                gate,
                preference: DisplayPreference::default(),
                last_result: CrawlResult::default(),
            }),
            in_flight: AtomicBool::new(false),
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Restore persisted state and resume the countdown if still cooling.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self) -> ZenyResult<()> {
        let preference = self.store.display_preference()?;
        let last_result = self.store.load()?;
        let last_run = self.store.last_run_ms()?;
        let now = self.clock.now_ms();

        let mut state = self.state();
        state.preference = preference;
        state.last_result = last_result;
        state.gate = CooldownGate::new(self.config.cooldown_ms).with_last_run(last_run);
        state.gate.start_countdown(now);

        tracing::info!(
            "session started: {} stored entries, display {}, {}",
            state.last_result.len(),
            state.preference,
            state.gate.status(now).status_message()
        );
        Ok(())
    }

    /// Stop the countdown.
    pub fn stop(&self) {
        self.state().gate.stop();
        tracing::debug!("session stopped");
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn subscribe_progress(&self) -> ProgressReceiver {
        self.progress.subscribe()
    }

    /// Live cooldown status, updated once per second while cooling.
    pub fn subscribe_cooldown(&self) -> watch::Receiver<CooldownStatus> {
        self.state().gate.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.state().gate.is_ready(self.clock.now_ms())
    }

    pub fn cooldown_status(&self) -> CooldownStatus {
        self.state().gate.status(self.clock.now_ms())
    }

    pub fn last_run_ms(&self) -> Option<i64> {
        self.state().gate.last_run_ms()
    }

    pub fn has_live_timer(&self) -> bool {
        self.state().gate.has_live_timer()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn display_preference(&self) -> DisplayPreference {
        self.state().preference
    }

    /// Change and persist the display preference.
    pub fn set_display_preference(&self, preference: DisplayPreference) -> ZenyResult<()> {
        self.store.set_display_preference(preference)?;
        self.state().preference = preference;
        Ok(())
    }

    pub fn last_result(&self) -> CrawlResult {
        self.state().last_result.clone()
    }

    /// The last result rendered with the current display preference.
    pub fn render(&self) -> Rendering {
        let state = self.state();
        render(&state.last_result, state.preference)
    }

    /// Whether `url` is a page crawls may start from.
    pub fn is_character_page(&self, url: &str) -> bool {
        self.page_pattern.is_match(url)
    }

    /// Run one crawl through `automation`.
    ///
    /// Fails without touching the remote service when another crawl is in
    /// flight, the gate is cooling, or the open page is not a character page.
    /// Errors from the run itself leave the cooldown untouched.
    pub async fn crawl(&self, automation: &dyn BrowserAutomation) -> ZenyResult<CrawlOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CrawlError::AlreadyRunning);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let now = self.clock.now_ms();
        {
            let state = self.state();
            if !state.gate.is_ready(now) {
                return Err(CrawlError::CoolingDown {
                    remaining_ms: state.gate.remaining_ms(now),
                });
            }
        }

        let url = automation.active_url().await?;
        if !self.is_character_page(&url) {
            return Err(CrawlError::NotCharacterPage(url));
        }

        let mut orchestrator =
            CrawlOrchestrator::new(automation).with_progress(Some(self.progress.clone()));
        let outcome = orchestrator.run().await?;

        if let Err(e) = self.finish(&outcome) {
            orchestrator.report_failure(&e);
            return Err(e);
        }
        Ok(outcome)
    }

    /// Persist a completed run and start the cooldown as the outcome requires.
    fn finish(&self, outcome: &CrawlOutcome) -> ZenyResult<()> {
        let finished = self.clock.now_ms();
        match outcome {
            CrawlOutcome::Completed(result) => {
                self.store.persist(result)?;
                self.record_run(finished)?;
                self.state().last_result = result.clone();
            }
            CrawlOutcome::NoWorlds if self.config.cooldown_on_missing_worlds => {
                self.record_run(finished)?;
            }
            CrawlOutcome::NoWorlds => {
                tracing::info!("no worlds found; cooldown not started");
            }
        }
        Ok(())
    }

    fn record_run(&self, now_ms: i64) -> ZenyResult<()> {
        self.store.set_last_run_ms(now_ms)?;
        self.state().gate.record_run(now_ms);
        Ok(())
    }
}

impl Drop for CrawlSession {
    fn drop(&mut self) {
        self.stop();
    }
}
