//! crates/book_reels_core/src/navigation.rs
//!
//! Turns wheel, touch and arrow input into single-step moves through the feed.
//!
//! Every gesture advances at most one passage. Wheel input is debounced with a
//! cooldown, and touch input needs a minimum vertical displacement. Time is passed
//! in by the caller so the engine stays deterministic.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// How the view should move to the target passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollBehavior {
    Smooth,
}

/// An instruction for the view to bring one passage into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScrollCommand {
    pub index: usize,
    pub behavior: ScrollBehavior,
}

/// Tuning for the gesture engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSettings {
    pub wheel_cooldown: Duration,
    pub swipe_threshold: f64,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            wheel_cooldown: Duration::from_millis(600),
            swipe_threshold: 50.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Navigator {
    settings: GestureSettings,
    current_index: usize,
    wheel_locked_until: Option<Instant>,
    touch_start_y: Option<f64>,
}

impl Navigator {
    pub fn new(settings: GestureSettings) -> Self {
        Self {
            settings,
            current_index: 0,
            wheel_locked_until: None,
            touch_start_y: None,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Back to the first passage with no gesture in progress.
    pub fn reset(&mut self) {
        self.current_index = 0;
        self.wheel_locked_until = None;
        self.touch_start_y = None;
    }

    /// Pulls the index back onto the last passage if the feed shrank under it.
    pub fn clamp(&mut self, len: usize) {
        if self.current_index >= len {
            self.current_index = len.saturating_sub(1);
        }
    }

    /// Moves to `index` if it names a passage; anything out of range is ignored.
    pub fn jump_to(&mut self, index: i64, len: usize) -> Option<ScrollCommand> {
        if index < 0 || index as u64 >= len as u64 {
            return None;
        }
        self.current_index = index as usize;
        Some(ScrollCommand {
            index: self.current_index,
            behavior: ScrollBehavior::Smooth,
        })
    }

    pub fn next(&mut self, len: usize) -> Option<ScrollCommand> {
        self.jump_to(self.current_index as i64 + 1, len)
    }

    pub fn previous(&mut self, len: usize) -> Option<ScrollCommand> {
        self.jump_to(self.current_index as i64 - 1, len)
    }

    /// One wheel event. Positive `delta_y` scrolls forward.
    ///
    /// Any event that arrives outside the cooldown re-arms it, even if it could not
    /// move (for example scrolling down on the last passage).
    pub fn on_wheel(&mut self, delta_y: f64, len: usize, now: Instant) -> Option<ScrollCommand> {
        if let Some(until) = self.wheel_locked_until {
            if now < until {
                return None;
            }
        }
        self.wheel_locked_until = Some(now + self.settings.wheel_cooldown);
        self.step(delta_y, len)
    }

    pub fn touch_start(&mut self, y: f64) {
        self.touch_start_y = Some(y);
    }

    /// Ends a touch. Positive displacement (finger moved up) goes forward.
    pub fn touch_end(&mut self, y: f64, len: usize) -> Option<ScrollCommand> {
        let start = self.touch_start_y.take()?;
        let displacement = start - y;
        if displacement.abs() <= self.settings.swipe_threshold {
            return None;
        }
        self.step(displacement, len)
    }

    fn step(&mut self, direction: f64, len: usize) -> Option<ScrollCommand> {
        if direction > 0.0 && self.current_index + 1 < len {
            self.next(len)
        } else if direction < 0.0 && self.current_index > 0 {
            self.previous(len)
        } else {
            None
        }
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(GestureSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_outside_range_is_a_no_op() {
        for len in 1..6usize {
            let mut nav = Navigator::default();
            nav.jump_to(len as i64 - 1, len);
            let before = nav.current_index();
            assert_eq!(nav.jump_to(-1, len), None);
            assert_eq!(nav.jump_to(len as i64, len), None);
            assert_eq!(nav.jump_to(len as i64 + 10, len), None);
            assert_eq!(nav.current_index(), before);
        }
    }

    #[test]
    fn jump_within_range_emits_smooth_scroll() {
        let mut nav = Navigator::default();
        let cmd = nav.jump_to(4, 8).unwrap();
        assert_eq!(cmd, ScrollCommand { index: 4, behavior: ScrollBehavior::Smooth });
        assert_eq!(nav.current_index(), 4);
    }

    #[test]
    fn wheel_events_inside_cooldown_move_once() {
        let mut nav = Navigator::default();
        let t0 = Instant::now();
        assert!(nav.on_wheel(120.0, 8, t0).is_some());
        assert!(nav.on_wheel(120.0, 8, t0 + Duration::from_millis(100)).is_none());
        assert_eq!(nav.current_index(), 1);

        assert!(nav.on_wheel(120.0, 8, t0 + Duration::from_millis(600)).is_some());
        assert_eq!(nav.current_index(), 2);
    }

    #[test]
    fn wheel_stops_at_both_ends() {
        let mut nav = Navigator::default();
        let t0 = Instant::now();
        assert!(nav.on_wheel(-50.0, 3, t0).is_none());
        assert_eq!(nav.current_index(), 0);

        nav.jump_to(2, 3);
        assert!(nav.on_wheel(50.0, 3, t0 + Duration::from_secs(1)).is_none());
        assert_eq!(nav.current_index(), 2);
        assert!(nav.on_wheel(-50.0, 3, t0 + Duration::from_secs(2)).is_some());
        assert_eq!(nav.current_index(), 1);
    }

    #[test]
    fn short_swipe_does_not_move() {
        let mut nav = Navigator::default();
        nav.touch_start(300.0);
        assert!(nav.touch_end(270.0, 8).is_none());
        assert_eq!(nav.current_index(), 0);
    }

    #[test]
    fn long_swipes_step_in_their_direction() {
        let mut nav = Navigator::default();
        nav.touch_start(400.0);
        assert!(nav.touch_end(300.0, 8).is_some());
        assert_eq!(nav.current_index(), 1);

        nav.touch_start(300.0);
        assert!(nav.touch_end(420.0, 8).is_some());
        assert_eq!(nav.current_index(), 0);
    }

    #[test]
    fn clamp_follows_a_shrinking_feed() {
        let mut nav = Navigator::default();
        nav.jump_to(9, 10);
        nav.clamp(8);
        assert_eq!(nav.current_index(), 7);
        nav.clamp(8);
        assert_eq!(nav.current_index(), 7);
    }

    #[test]
    fn touch_end_without_start_is_ignored() {
        let mut nav = Navigator::default();
        assert!(nav.touch_end(0.0, 8).is_none());
    }

    #[test]
    fn arrows_clamp_at_edges() {
        let mut nav = Navigator::default();
        assert!(nav.previous(2).is_none());
        assert!(nav.next(2).is_some());
        assert!(nav.next(2).is_none());
        assert_eq!(nav.current_index(), 1);
    }
}
