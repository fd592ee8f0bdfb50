//! Session timer implementation.
//!
//! The timer is a wall-clock-based state machine. It does not use internal
//! threads: elapsed time is derived from timestamps whenever a command or a
//! display read happens, so a suspended or restarted process loses nothing.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |           |
//!           +-> Finished <+
//! any -> Idle (reset / discard)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = SessionTimer::restore(store);
//! timer.start("goal-1")?;
//! // Every refresh while running:
//! let secs = timer.display_seconds();
//! timer.stop();
//! ```

use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::session::{SessionData, TimerSession, TimerState};
use super::store::SessionStore;
use crate::error::TimerError;
use crate::events::Event;
use crate::util::time::{format_hms, ms_to_datetime};

/// Single-session timer for one goal at a time.
///
/// Owns its store and clock; every transition goes through `&mut self`, so a
/// single owner serializes all mutations.
#[derive(Debug)]
pub struct SessionTimer<S, C = SystemClock> {
    store: S,
    clock: C,
    session: Option<TimerSession>,
}

impl<S: SessionStore> SessionTimer<S, SystemClock> {
    /// Load any persisted session using the system clock.
    pub fn restore(store: S) -> Self {
        Self::restore_with_clock(store, SystemClock)
    }
}

impl<S: SessionStore, C: Clock> SessionTimer<S, C> {
    /// Load any persisted session, crediting a running session with the
    /// time that passed while nobody was watching.
    ///
    /// Unreadable or inconsistent stored data is treated as no session.
    pub fn restore_with_clock(store: S, clock: C) -> Self {
        let now = clock.now_ms();
        let (session, recovered) = recover(&store, now);
        let timer = Self {
            store,
            clock,
            session,
        };
        if recovered {
            timer.persist();
        }
        timer
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(TimerState::Idle)
    }

    pub fn goal_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.goal_id.as_str())
    }

    pub fn session(&self) -> Option<&TimerSession> {
        self.session.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// True while there is time that has not been committed or discarded.
    pub fn has_active_session(&self) -> bool {
        self.state() != TimerState::Idle
    }

    /// Elapsed seconds as of now. Read-only.
    pub fn display_seconds(&self) -> u64 {
        let now = self.clock.now_ms();
        self.session
            .as_ref()
            .map(|s| s.display_seconds(now))
            .unwrap_or(0)
    }

    /// `HH:MM:SS` rendering of [`display_seconds`](Self::display_seconds).
    pub fn display(&self) -> String {
        format_hms(self.display_seconds())
    }

    pub fn session_data(&self) -> Option<SessionData> {
        let now = self.clock.now_ms();
        self.session.as_ref().map(|s| SessionData {
            goal_id: s.goal_id.clone(),
            started_at: s.started_at(),
            duration_seconds: s.display_seconds(now),
        })
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let now = self.clock.now_ms();
        let display_seconds = self
            .session
            .as_ref()
            .map(|s| s.display_seconds(now))
            .unwrap_or(0);
        Event::StateSnapshot {
            state: self.state(),
            goal_id: self.goal_id().map(str::to_string),
            display_seconds,
            display: format_hms(display_seconds),
            at: ms_to_datetime(now),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a new session for `goal_id`.
    ///
    /// Fails without touching state if the goal id is blank or if any
    /// session (even a finished, uncommitted one) is still held; the caller
    /// must [`discard`](Self::discard) it explicitly first.
    pub fn start(&mut self, goal_id: &str) -> Result<Event, TimerError> {
        let goal_id = goal_id.trim();
        if goal_id.is_empty() {
            return Err(TimerError::MissingGoal);
        }
        if let Some(existing) = &self.session {
            return Err(TimerError::SessionActive {
                goal_id: existing.goal_id.clone(),
                state: existing.state,
            });
        }

        let now = self.clock.now_ms();
        self.session = Some(TimerSession::started(goal_id, now));
        self.persist();
        info!(goal_id, "timer started");
        Ok(Event::TimerStarted {
            goal_id: goal_id.to_string(),
            at: ms_to_datetime(now),
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        let session = self.session.as_mut()?;
        if session.state != TimerState::Running {
            debug!(state = ?session.state, "pause ignored");
            return None;
        }
        session.bank_running_interval(now);
        session.state = TimerState::Paused;
        let accumulated_seconds = session.accumulated_seconds;
        self.persist();
        info!(accumulated_seconds, "timer paused");
        Some(Event::TimerPaused {
            accumulated_seconds,
            at: ms_to_datetime(now),
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        let session = self.session.as_mut()?;
        if session.state != TimerState::Paused {
            debug!(state = ?session.state, "resume ignored");
            return None;
        }
        session.last_resume_at_ms = Some(now);
        session.state = TimerState::Running;
        let accumulated_seconds = session.accumulated_seconds;
        self.persist();
        info!(accumulated_seconds, "timer resumed");
        Some(Event::TimerResumed {
            accumulated_seconds,
            at: ms_to_datetime(now),
        })
    }

    pub fn stop(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        let session = self.session.as_mut()?;
        match session.state {
            TimerState::Running | TimerState::Paused => {
                session.bank_running_interval(now);
                session.state = TimerState::Finished;
            }
            TimerState::Idle | TimerState::Finished => {
                debug!(state = ?session.state, "stop ignored");
                return None;
            }
        }
        let goal_id = session.goal_id.clone();
        let duration_seconds = session.accumulated_seconds;
        self.persist();
        info!(%goal_id, duration_seconds, "timer stopped");
        Some(Event::TimerStopped {
            goal_id,
            duration_seconds,
            at: ms_to_datetime(now),
        })
    }

    /// Drop the session and its stored record. Always succeeds; calling it
    /// twice is harmless.
    pub fn reset(&mut self) -> Event {
        self.session = None;
        self.persist();
        debug!("timer reset");
        Event::TimerReset {
            at: ms_to_datetime(self.clock.now_ms()),
        }
    }

    /// Abandon whatever session is held, e.g. when the user confirmed
    /// switching to another goal. Returns `None` when nothing was held.
    pub fn discard(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        let abandoned = self.session.take();
        self.persist();
        let session = abandoned?;
        let abandoned_seconds = session.display_seconds(now);
        warn!(
            goal_id = %session.goal_id,
            abandoned_seconds,
            "timer session discarded"
        );
        Some(Event::SessionDiscarded {
            goal_id: session.goal_id,
            state: session.state,
            abandoned_seconds,
            at: ms_to_datetime(now),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Write the current session (or its absence) through to the store.
    /// Storage failures are logged, never surfaced: the in-memory session
    /// stays authoritative for this process.
    fn persist(&self) {
        let result = match &self.session {
            Some(session) => serde_json::to_string(session)
                .map_err(Into::into)
                .and_then(|raw| self.store.save(&raw)),
            None => self.store.clear(),
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to persist timer session");
        }
    }
}

/// Returns the restored session and whether it was adjusted for a gap.
fn recover<S: SessionStore>(store: &S, now_ms: u64) -> (Option<TimerSession>, bool) {
    let raw = match store.load() {
        Ok(Some(raw)) => raw,
        Ok(None) => return (None, false),
        Err(e) => {
            warn!(error = %e, "could not read stored timer session; starting idle");
            return (None, false);
        }
    };

    let mut session = match serde_json::from_str::<TimerSession>(&raw) {
        Ok(session) if session.is_consistent() => session,
        Ok(session) => {
            warn!(state = ?session.state, "stored timer session is inconsistent; discarding");
            discard_stored(store);
            return (None, false);
        }
        Err(e) => {
            warn!(error = %e, "stored timer session is unreadable; discarding");
            discard_stored(store);
            return (None, false);
        }
    };

    if session.state != TimerState::Running {
        info!(goal_id = %session.goal_id, state = ?session.state, "timer session restored");
        return (Some(session), false);
    }

    let gap_seconds = session.running_seconds(now_ms);
    if gap_seconds == 0 {
        return (Some(session), false);
    }
    // Only whole seconds are banked; the sub-second remainder stays running.
    session.accumulated_seconds += gap_seconds;
    session.last_resume_at_ms = session
        .last_resume_at_ms
        .map(|last| last + gap_seconds * 1000);
    info!(
        goal_id = %session.goal_id,
        gap_seconds,
        accumulated_seconds = session.accumulated_seconds,
        "running timer session recovered"
    );
    (Some(session), true)
}

fn discard_stored<S: SessionStore>(store: &S) {
    if let Err(e) = store.clear() {
        warn!(error = %e, "failed to clear stored timer session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, Result};
    use crate::timer::clock::ManualClock;
    use crate::timer::store::MemorySessionStore;

    const T0: u64 = 1_700_000_000_000;

    fn timer() -> (SessionTimer<MemorySessionStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new(T0);
        let timer = SessionTimer::restore_with_clock(MemorySessionStore::new(), clock.clone());
        (timer, clock)
    }

    fn stored(timer: &SessionTimer<MemorySessionStore, ManualClock>) -> Option<TimerSession> {
        timer
            .store()
            .raw()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[test]
    fn start_pause_resume_stop() {
        let (mut timer, clock) = timer();
        assert_eq!(timer.state(), TimerState::Idle);

        assert!(timer.start("math").is_ok());
        assert_eq!(timer.state(), TimerState::Running);

        clock.advance_secs(10);
        assert!(timer.pause().is_some());
        assert_eq!(timer.state(), TimerState::Paused);

        clock.advance_secs(100);
        assert!(timer.resume().is_some());
        assert_eq!(timer.state(), TimerState::Running);

        clock.advance_secs(5);
        match timer.stop() {
            Some(Event::TimerStopped {
                duration_seconds, ..
            }) => assert_eq!(duration_seconds, 15),
            other => panic!("Expected TimerStopped, got {other:?}"),
        }
        assert_eq!(timer.state(), TimerState::Finished);
        assert_eq!(timer.session().unwrap().last_resume_at_ms, None);
    }

    #[test]
    fn start_sets_both_timestamps_to_now() {
        let (mut timer, _clock) = timer();
        timer.start("math").unwrap();
        let session = timer.session().unwrap();
        assert_eq!(session.started_at_ms, T0);
        assert_eq!(session.last_resume_at_ms, Some(T0));
        assert_eq!(session.accumulated_seconds, 0);
    }

    #[test]
    fn pause_floors_partial_seconds() {
        let (mut timer, clock) = timer();
        timer.start("math").unwrap();
        clock.advance_ms(2_999);
        timer.pause();
        assert_eq!(timer.session().unwrap().accumulated_seconds, 2);
    }

    #[test]
    fn stop_from_paused_keeps_banked_time() {
        let (mut timer, clock) = timer();
        timer.start("math").unwrap();
        clock.advance_secs(30);
        timer.pause();
        clock.advance_secs(600);
        timer.stop();
        assert_eq!(timer.state(), TimerState::Finished);
        assert_eq!(timer.display_seconds(), 30);
    }

    #[test]
    fn invalid_transitions_are_noops() {
        let (mut timer, clock) = timer();
        assert!(timer.pause().is_none());
        assert!(timer.resume().is_none());
        assert!(timer.stop().is_none());
        assert_eq!(timer.state(), TimerState::Idle);
        assert!(timer.store().raw().is_none());

        timer.start("math").unwrap();
        clock.advance_secs(3);
        assert!(timer.resume().is_none());
        assert_eq!(timer.state(), TimerState::Running);

        timer.pause();
        let before = timer.session().cloned();
        assert!(timer.pause().is_none());
        assert_eq!(timer.session().cloned(), before);

        timer.stop();
        let before = timer.session().cloned();
        assert!(timer.stop().is_none());
        assert!(timer.pause().is_none());
        assert!(timer.resume().is_none());
        assert_eq!(timer.session().cloned(), before);
    }

    #[test]
    fn start_rejects_blank_goal() {
        let (mut timer, _clock) = timer();
        assert_eq!(timer.start("  "), Err(TimerError::MissingGoal));
        assert_eq!(timer.state(), TimerState::Idle);
        assert!(timer.store().raw().is_none());
    }

    #[test]
    fn start_refuses_to_replace_active_session() {
        let (mut timer, clock) = timer();
        timer.start("math").unwrap();
        clock.advance_secs(20);

        let err = timer.start("physics").unwrap_err();
        assert_eq!(
            err,
            TimerError::SessionActive {
                goal_id: "math".into(),
                state: TimerState::Running,
            }
        );
        assert_eq!(timer.goal_id(), Some("math"));
        assert_eq!(timer.display_seconds(), 20);
    }

    #[test]
    fn discard_then_start_switches_goal() {
        let (mut timer, clock) = timer();
        timer.start("math").unwrap();
        clock.advance_secs(42);

        match timer.discard() {
            Some(Event::SessionDiscarded {
                goal_id,
                abandoned_seconds,
                ..
            }) => {
                assert_eq!(goal_id, "math");
                assert_eq!(abandoned_seconds, 42);
            }
            other => panic!("Expected SessionDiscarded, got {other:?}"),
        }
        assert!(timer.store().raw().is_none());

        timer.start("physics").unwrap();
        assert_eq!(timer.goal_id(), Some("physics"));
        assert_eq!(timer.display_seconds(), 0);
    }

    #[test]
    fn discard_without_session_reports_nothing() {
        let (mut timer, _clock) = timer();
        assert!(timer.discard().is_none());
    }

    #[test]
    fn reset_from_every_state_clears_store() {
        let (mut timer, clock) = timer();
        timer.reset();
        assert_eq!(timer.state(), TimerState::Idle);

        for setup in 0..3 {
            timer.start("math").unwrap();
            clock.advance_secs(1);
            if setup >= 1 {
                timer.pause();
            }
            if setup >= 2 {
                timer.stop();
            }
            assert!(timer.store().raw().is_some());
            timer.reset();
            timer.reset();
            assert_eq!(timer.state(), TimerState::Idle);
            assert!(timer.store().raw().is_none());
            assert_eq!(timer.display_seconds(), 0);
        }
    }

    #[test]
    fn every_transition_is_persisted() {
        let (mut timer, clock) = timer();
        timer.start("math").unwrap();
        assert_eq!(stored(&timer).unwrap().state, TimerState::Running);

        clock.advance_secs(7);
        timer.pause();
        let persisted = stored(&timer).unwrap();
        assert_eq!(persisted.state, TimerState::Paused);
        assert_eq!(persisted.accumulated_seconds, 7);

        timer.resume();
        assert_eq!(stored(&timer).unwrap().last_resume_at_ms, Some(T0 + 7_000));

        timer.stop();
        assert_eq!(stored(&timer).unwrap().state, TimerState::Finished);
    }

    #[test]
    fn display_reads_do_not_touch_accumulated() {
        let (mut timer, clock) = timer();
        timer.start("math").unwrap();
        for _ in 0..90 {
            clock.advance_ms(1_000);
            let _ = timer.display_seconds();
            let _ = timer.snapshot();
        }
        assert_eq!(timer.session().unwrap().accumulated_seconds, 0);
        assert_eq!(timer.display_seconds(), 90);
        assert_eq!(timer.display(), "00:01:30");
    }

    #[test]
    fn restore_credits_gap_to_running_session() {
        let store = MemorySessionStore::new();
        let clock = ManualClock::new(T0);
        {
            let mut first = SessionTimer::restore_with_clock(store.clone(), clock.clone());
            first.start("math").unwrap();
            clock.advance_secs(40);
            first.pause();
            first.resume();
        }

        clock.advance_secs(3_600);
        let second = SessionTimer::restore_with_clock(store.clone(), clock.clone());
        let session = second.session().unwrap();
        assert_eq!(session.state, TimerState::Running);
        assert_eq!(session.accumulated_seconds, 3_640);
        assert_eq!(session.last_resume_at_ms, Some(clock.now_ms()));

        let persisted: TimerSession = serde_json::from_str(&store.raw().unwrap()).unwrap();
        assert_eq!(persisted.accumulated_seconds, 3_640);
    }

    #[test]
    fn frequent_restores_keep_sub_second_remainder() {
        let store = MemorySessionStore::new();
        let clock = ManualClock::new(T0);
        SessionTimer::restore_with_clock(store.clone(), clock.clone())
            .start("math")
            .unwrap();

        for _ in 0..20 {
            clock.advance_ms(500);
            let timer = SessionTimer::restore_with_clock(store.clone(), clock.clone());
            assert_eq!(timer.state(), TimerState::Running);
        }

        let timer = SessionTimer::restore_with_clock(store.clone(), clock.clone());
        assert_eq!(timer.display_seconds(), 10);
        let persisted: TimerSession = serde_json::from_str(&store.raw().unwrap()).unwrap();
        assert_eq!(persisted.accumulated_seconds, 10);
        assert_eq!(persisted.last_resume_at_ms, Some(T0 + 10_000));
    }

    #[test]
    fn restore_within_a_second_does_not_rewrite() {
        let store = MemorySessionStore::new();
        let clock = ManualClock::new(T0);
        SessionTimer::restore_with_clock(store.clone(), clock.clone())
            .start("math")
            .unwrap();
        let before = store.raw();

        clock.advance_ms(999);
        let timer = SessionTimer::restore_with_clock(store.clone(), clock.clone());
        assert_eq!(timer.display_seconds(), 0);
        assert_eq!(store.raw(), before);

        clock.advance_ms(1);
        assert_eq!(timer.display_seconds(), 1);
    }

    #[test]
    fn restore_leaves_paused_session_untouched() {
        let store = MemorySessionStore::new();
        let clock = ManualClock::new(T0);
        let mut first = SessionTimer::restore_with_clock(store.clone(), clock.clone());
        first.start("math").unwrap();
        clock.advance_secs(12);
        first.pause();
        let before = first.session().cloned();

        clock.advance_secs(86_400);
        let second = SessionTimer::restore_with_clock(store, clock);
        assert_eq!(second.session().cloned(), before);
        assert_eq!(second.display_seconds(), 12);
    }

    #[test]
    fn restore_treats_garbage_as_idle() {
        for raw in ["not json", "{\"goalId\":\"x\"}", ""] {
            let store = MemorySessionStore::with_raw(raw);
            let timer = SessionTimer::restore_with_clock(store.clone(), ManualClock::new(T0));
            assert_eq!(timer.state(), TimerState::Idle);
            assert!(store.raw().is_none());
        }
    }

    #[test]
    fn restore_rejects_running_without_resume_stamp() {
        let raw = r#"{"goalId":"math","startedAtMs":1,"accumulatedSeconds":5,"lastResumeAtMs":null,"state":"running"}"#;
        let store = MemorySessionStore::with_raw(raw);
        let timer = SessionTimer::restore_with_clock(store.clone(), ManualClock::new(T0));
        assert_eq!(timer.state(), TimerState::Idle);
        assert!(store.raw().is_none());
    }

    struct BrokenStore;

    impl SessionStore for BrokenStore {
        fn load(&self) -> Result<Option<String>> {
            Err(CoreError::Custom("disk on fire".into()))
        }
        fn save(&self, _raw: &str) -> Result<()> {
            Err(CoreError::Custom("disk on fire".into()))
        }
        fn clear(&self) -> Result<()> {
            Err(CoreError::Custom("disk on fire".into()))
        }
    }

    #[test]
    fn storage_failures_do_not_break_transitions() {
        let clock = ManualClock::new(T0);
        let mut timer = SessionTimer::restore_with_clock(BrokenStore, clock.clone());
        assert_eq!(timer.state(), TimerState::Idle);

        timer.start("math").unwrap();
        clock.advance_secs(9);
        timer.stop();
        assert_eq!(timer.display_seconds(), 9);
        timer.reset();
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let (mut timer, clock) = timer();
        timer.start("math").unwrap();
        clock.advance_secs(3_725);
        match timer.snapshot() {
            Event::StateSnapshot {
                state,
                goal_id,
                display_seconds,
                display,
                ..
            } => {
                assert_eq!(state, TimerState::Running);
                assert_eq!(goal_id.as_deref(), Some("math"));
                assert_eq!(display_seconds, 3_725);
                assert_eq!(display, "01:02:05");
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }

    #[test]
    fn session_data_reports_live_duration() {
        let (mut timer, clock) = timer();
        assert!(timer.session_data().is_none());
        timer.start("math").unwrap();
        clock.advance_secs(61);
        let data = timer.session_data().unwrap();
        assert_eq!(data.goal_id, "math");
        assert_eq!(data.duration_seconds, 61);
        assert_eq!(data.minutes(), 2);
        assert_eq!(data.started_at.timestamp_millis() as u64, T0);
    }
}
