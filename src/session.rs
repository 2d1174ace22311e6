use crate::geo::GeoPoint;
use crate::runtime::{Control, WalkEvent};
use crate::walk_type::WalkType;
use serde::Serialize;
use tracing::{debug, trace};

/// Read-only view of the session metrics handed to the presentation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WalkSnapshot {
    pub elapsed_seconds: u64,
    pub step_count: u64,
    pub distance_km: f64,
    pub running: bool,
}

/// Returned by [`WalkSession::end`]: the totals as they were right before the reset
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionEnded {
    pub walk_type: Option<WalkType>,
    pub totals: WalkSnapshot,
}

/// One walk from start to `end()`.
///
/// Mutated only by its owner, one event at a time. Tick, step and position
/// events may arrive in any interleaving.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkSession {
    elapsed_seconds: u64,
    step_count: u64,
    distance_km: f64,
    last_position: Option<GeoPoint>,
    running: bool,
    walk_type: Option<WalkType>,
}

impl Default for WalkSession {
    fn default() -> Self {
        Self {
            elapsed_seconds: 0,
            step_count: 0,
            distance_km: 0.0,
            last_position: None,
            running: true,
            walk_type: None,
        }
    }
}

impl WalkSession {
    /// Starts a session in the running state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_walk_type(walk_type: WalkType) -> Self {
        Self {
            walk_type: Some(walk_type),
            ..Self::default()
        }
    }

    pub fn on_tick(&mut self) {
        if self.running {
            self.elapsed_seconds += 1;
        }
    }

    /// The pedometer stays active while paused, so steps are taken as-is.
    pub fn on_step_update(&mut self, cumulative_steps: u64) {
        self.step_count = cumulative_steps;
    }

    pub fn on_position_fix(&mut self, point: GeoPoint) {
        if !self.running {
            trace!(?point, "fix dropped while paused");
            return;
        }

        if let Some(prev) = self.last_position {
            let d = prev.distance_km(&point);
            self.distance_km += d;
            trace!(?point, added_km = d, total_km = self.distance_km, "fix");
        } else {
            trace!(?point, "baseline fix");
        }
        self.last_position = Some(point);
    }

    pub fn pause(&mut self) {
        if self.running {
            debug!(elapsed = self.elapsed_seconds, "session paused");
        }
        self.running = false;
    }

    /// Keeps the last fix as baseline so distance continues without a jump.
    pub fn resume(&mut self) {
        if !self.running {
            debug!(elapsed = self.elapsed_seconds, "session resumed");
        }
        self.running = true;
    }

    /// Resets every metric and stops the session.
    pub fn end(&mut self) -> SessionEnded {
        let ended = SessionEnded {
            walk_type: self.walk_type,
            totals: self.snapshot(),
        };
        debug!(
            elapsed = ended.totals.elapsed_seconds,
            steps = ended.totals.step_count,
            km = ended.totals.distance_km,
            "session ended"
        );

        self.elapsed_seconds = 0;
        self.step_count = 0;
        self.distance_km = 0.0;
        self.last_position = None;
        self.running = false;

        ended
    }

    pub fn snapshot(&self) -> WalkSnapshot {
        WalkSnapshot {
            elapsed_seconds: self.elapsed_seconds,
            step_count: self.step_count,
            distance_km: self.distance_km,
            running: self.running,
        }
    }

    /// Dispatches a runtime event. Yields the end signal for `Control::End`.
    pub fn apply(&mut self, event: WalkEvent) -> Option<SessionEnded> {
        match event {
            WalkEvent::Tick => self.on_tick(),
            WalkEvent::Steps(steps) => self.on_step_update(steps),
            WalkEvent::Fix(point) => self.on_position_fix(point),
            WalkEvent::Control(Control::Pause) => self.pause(),
            WalkEvent::Control(Control::Resume) => self.resume(),
            WalkEvent::Control(Control::End) => return Some(self.end()),
        }
        None
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_position(&self) -> Option<GeoPoint> {
        self.last_position
    }

    pub fn walk_type(&self) -> Option<WalkType> {
        self.walk_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::haversine_km;

    fn a() -> GeoPoint {
        GeoPoint::new(60.1699, 24.9384)
    }

    fn b() -> GeoPoint {
        GeoPoint::new(60.1710, 24.9410)
    }

    fn ended_state() -> WalkSnapshot {
        WalkSnapshot {
            elapsed_seconds: 0,
            step_count: 0,
            distance_km: 0.0,
            running: false,
        }
    }

    #[test]
    fn test_new_session_is_running_and_empty() {
        let s = WalkSession::new();
        assert_eq!(
            s.snapshot(),
            WalkSnapshot {
                elapsed_seconds: 0,
                step_count: 0,
                distance_km: 0.0,
                running: true,
            }
        );
        assert!(s.last_position().is_none());
        assert!(s.walk_type().is_none());
    }

    #[test]
    fn test_tick_counts_only_while_running() {
        let mut s = WalkSession::new();
        for _ in 0..5 {
            s.on_tick();
        }
        assert_eq!(s.snapshot().elapsed_seconds, 5);

        s.pause();
        for _ in 0..5 {
            s.on_tick();
        }
        assert_eq!(s.snapshot().elapsed_seconds, 5);

        s.resume();
        s.on_tick();
        assert_eq!(s.snapshot().elapsed_seconds, 6);
    }

    #[test]
    fn test_steps_update_while_paused() {
        let mut s = WalkSession::new();
        s.on_step_update(10);
        s.pause();
        s.on_step_update(25);
        assert_eq!(s.snapshot().step_count, 25);
    }

    #[test]
    fn test_steps_are_not_forced_monotonic() {
        let mut s = WalkSession::new();
        s.on_step_update(40);
        s.on_step_update(12);
        assert_eq!(s.snapshot().step_count, 12);
    }

    #[test]
    fn test_first_fix_sets_baseline_only() {
        let mut s = WalkSession::new();
        s.on_position_fix(a());
        assert_eq!(s.snapshot().distance_km, 0.0);
        assert_eq!(s.last_position(), Some(a()));
    }

    #[test]
    fn test_second_fix_adds_haversine() {
        let mut s = WalkSession::new();
        s.on_position_fix(a());
        s.on_position_fix(b());
        assert_eq!(s.snapshot().distance_km, haversine_km(&a(), &b()));
        assert_eq!(s.last_position(), Some(b()));

        // same point again adds nothing
        s.on_position_fix(b());
        assert_eq!(s.snapshot().distance_km, haversine_km(&a(), &b()));
    }

    #[test]
    fn test_fix_while_paused_is_dropped() {
        let mut s = WalkSession::new();
        s.on_position_fix(a());
        s.pause();
        s.on_position_fix(b());
        assert_eq!(s.snapshot().distance_km, 0.0);
        assert_eq!(s.last_position(), Some(a()));
    }

    #[test]
    fn test_fix_while_paused_without_baseline_is_dropped() {
        let mut s = WalkSession::new();
        s.pause();
        s.on_position_fix(a());
        assert!(s.last_position().is_none());
    }

    #[test]
    fn test_resume_keeps_baseline() {
        let mut s = WalkSession::new();
        s.on_position_fix(a());
        s.pause();
        s.resume();
        assert_eq!(s.last_position(), Some(a()));
        s.on_position_fix(b());
        assert_eq!(s.snapshot().distance_km, haversine_km(&a(), &b()));
    }

    #[test]
    fn test_pause_and_resume_are_idempotent() {
        let mut s = WalkSession::new();
        s.pause();
        s.pause();
        assert!(!s.is_running());
        s.resume();
        s.resume();
        assert!(s.is_running());
    }

    #[test]
    fn test_end_resets_everything() {
        let mut s = WalkSession::with_walk_type(WalkType::City);
        s.on_tick();
        s.on_tick();
        s.on_step_update(120);
        s.on_position_fix(a());
        s.on_position_fix(b());

        let ended = s.end();
        assert_eq!(ended.walk_type, Some(WalkType::City));
        assert_eq!(ended.totals.elapsed_seconds, 2);
        assert_eq!(ended.totals.step_count, 120);
        assert!(ended.totals.distance_km > 0.0);
        assert!(ended.totals.running);

        assert_eq!(s.snapshot(), ended_state());
        assert!(s.last_position().is_none());
        assert_eq!(s.walk_type(), Some(WalkType::City));
    }

    #[test]
    fn test_end_from_paused_and_fresh_states() {
        let mut fresh = WalkSession::new();
        fresh.end();
        assert_eq!(fresh.snapshot(), ended_state());

        let mut paused = WalkSession::new();
        paused.on_position_fix(a());
        paused.pause();
        paused.end();
        assert_eq!(paused.snapshot(), ended_state());
        assert!(paused.last_position().is_none());
    }

    #[test]
    fn test_first_fix_after_end_and_resume_is_baseline() {
        let mut s = WalkSession::new();
        s.on_position_fix(a());
        s.end();
        s.resume();
        s.on_position_fix(b());
        assert_eq!(s.snapshot().distance_km, 0.0);
        assert_eq!(s.last_position(), Some(b()));
    }

    #[test]
    fn test_apply_dispatches_events() {
        let mut s = WalkSession::new();
        assert!(s.apply(WalkEvent::Tick).is_none());
        assert!(s.apply(WalkEvent::Steps(7)).is_none());
        assert!(s.apply(WalkEvent::Fix(a())).is_none());
        assert!(s.apply(WalkEvent::Control(Control::Pause)).is_none());
        assert!(!s.is_running());
        assert!(s.apply(WalkEvent::Control(Control::Resume)).is_none());
        assert!(s.is_running());

        let ended = s.apply(WalkEvent::Control(Control::End)).unwrap();
        assert_eq!(ended.totals.elapsed_seconds, 1);
        assert_eq!(ended.totals.step_count, 7);
        assert_eq!(s.snapshot(), ended_state());
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut s = WalkSession::new();
        s.on_tick();
        let before = s.clone();
        let _ = s.snapshot();
        let _ = s.snapshot();
        assert_eq!(s, before);
    }
}
