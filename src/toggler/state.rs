//! On/off state and knob animation of a single toggle.
//!
//! The logical state changes immediately; the knob offset then catches up one
//! fixed step per timer tick. Nothing here talks to the platform: callers act
//! on the returned [`Transition`] and [`Step`] values (start/stop the timer,
//! request a redraw).

#[allow(unused_imports)]
use log::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToggleState {
    #[default]
    Off,
    On,
}

impl ToggleState {
    pub fn is_on(self) -> bool {
        self == ToggleState::On
    }

    pub fn toggled(self) -> Self {
        match self {
            ToggleState::Off => ToggleState::On,
            ToggleState::On => ToggleState::Off,
        }
    }
}

impl From<bool> for ToggleState {
    fn from(checked: bool) -> Self {
        if checked {
            ToggleState::On
        } else {
            ToggleState::Off
        }
    }
}

/// Outcome of [`ToggleControl::set_checked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The logical state differs from before the call.
    pub changed: bool,
    /// The animation timer must be started.
    pub start_timer: bool,
}

/// Outcome of one animation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The knob moved and has not reached its target yet.
    Moved,
    /// The knob moved onto its target; the timer should stop.
    Arrived,
    /// Nothing to animate; the timer should stop.
    Idle,
}

impl Step {
    pub fn needs_redraw(self) -> bool {
        matches!(self, Step::Moved | Step::Arrived)
    }

    pub fn stops_timer(self) -> bool {
        matches!(self, Step::Arrived | Step::Idle)
    }
}

#[derive(Debug, Clone)]
pub struct ToggleControl {
    state: ToggleState,
    knob_offset: i32,
    target_offset: i32,
    switch_style: usize,
    body_style: usize,
    timer_running: bool,
    step_px: i32,
}

impl ToggleControl {
    pub fn new(step_px: i32) -> Self {
        Self {
            state: ToggleState::Off,
            knob_offset: 0,
            target_offset: 0,
            switch_style: 0,
            body_style: 0,
            timer_running: false,
            step_px: step_px.max(1),
        }
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    /// Logical state, independent of animation progress.
    pub fn is_checked(&self) -> bool {
        self.state.is_on()
    }

    pub fn knob_offset(&self) -> i32 {
        self.knob_offset
    }

    pub fn target_offset(&self) -> i32 {
        self.target_offset
    }

    pub fn switch_style(&self) -> usize {
        self.switch_style
    }

    pub fn body_style(&self) -> usize {
        self.body_style
    }

    pub fn set_switch_style(&mut self, index: usize) {
        self.switch_style = index;
    }

    pub fn set_body_style(&mut self, index: usize) {
        self.body_style = index;
    }

    pub fn is_animating(&self) -> bool {
        self.timer_running
    }

    /// Set the logical state and aim the knob at `travel` (On) or 0 (Off).
    pub fn set_checked(&mut self, checked: bool, travel: i32) -> Transition {
        let state = ToggleState::from(checked);
        let changed = state != self.state;

        self.state = state;
        self.target_offset = if checked { travel } else { 0 };

        let start_timer = !self.timer_running && self.knob_offset != self.target_offset;
        if start_timer {
            self.timer_running = true;
        }

        if changed {
            debug!("Toggle {:?}, knob {} -> {}", state, self.knob_offset, self.target_offset);
        }

        Transition { changed, start_timer }
    }

    /// Advance the knob one step toward its target.
    pub fn step(&mut self) -> Step {
        if self.knob_offset < self.target_offset {
            self.knob_offset = (self.knob_offset + self.step_px).min(self.target_offset);
        } else if self.knob_offset > self.target_offset {
            self.knob_offset = (self.knob_offset - self.step_px).max(self.target_offset);
        } else {
            self.timer_running = false;
            return Step::Idle;
        }

        trace!("Knob offset {}", self.knob_offset);
        if self.knob_offset == self.target_offset {
            self.timer_running = false;
            Step::Arrived
        } else {
            Step::Moved
        }
    }

    /// Mark the timer as stopped. Returns whether it was running.
    pub fn stop_animation(&mut self) -> bool {
        std::mem::replace(&mut self.timer_running, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_state_is_immediate() {
        let mut control = ToggleControl::new(4);
        let transition = control.set_checked(true, 32);

        assert!(control.is_checked());
        assert_eq!(control.knob_offset(), 0);
        assert_eq!(control.target_offset(), 32);
        assert_eq!(transition, Transition { changed: true, start_timer: true });
    }

    #[test]
    fn test_repeated_set_is_idempotent() {
        let mut control = ToggleControl::new(4);
        control.set_checked(true, 32);

        let again = control.set_checked(true, 32);
        assert!(!again.changed);
        assert!(!again.start_timer);
        assert_eq!(control.target_offset(), 32);
        assert!(control.is_checked());
    }

    #[test]
    fn test_animation_reaches_target_in_eight_ticks() {
        let mut control = ToggleControl::new(4);
        control.set_checked(true, 32);

        for tick in 1..8 {
            assert_eq!(control.step(), Step::Moved);
            assert_eq!(control.knob_offset(), tick * 4);
        }
        assert_eq!(control.step(), Step::Arrived);
        assert_eq!(control.knob_offset(), 32);
        assert!(!control.is_animating());

        assert_eq!(control.step(), Step::Idle);
        assert_eq!(control.knob_offset(), 32);
    }

    #[test]
    fn test_step_clamps_at_target() {
        let mut control = ToggleControl::new(4);
        control.set_checked(true, 10);

        control.step();
        control.step();
        assert_eq!(control.step(), Step::Arrived);
        assert_eq!(control.knob_offset(), 10);
    }

    #[test]
    fn test_reverse_mid_animation() {
        let mut control = ToggleControl::new(4);
        control.set_checked(true, 32);
        control.step();
        control.step();

        // Timer already running, so no second start
        let back = control.set_checked(false, 32);
        assert!(back.changed);
        assert!(!back.start_timer);
        assert!(!control.is_checked());

        assert_eq!(control.step(), Step::Moved);
        assert_eq!(control.knob_offset(), 4);
        assert_eq!(control.step(), Step::Arrived);
        assert_eq!(control.knob_offset(), 0);
    }

    #[test]
    fn test_zero_travel_needs_no_timer() {
        let mut control = ToggleControl::new(4);
        let transition = control.set_checked(true, 0);
        assert!(transition.changed);
        assert!(!transition.start_timer);
        assert!(control.is_checked());
    }

    #[test]
    fn test_stop_animation() {
        let mut control = ToggleControl::new(4);
        control.set_checked(true, 32);
        assert!(control.stop_animation());
        assert!(!control.stop_animation());
    }

    #[test]
    fn test_toggled() {
        assert_eq!(ToggleState::Off.toggled(), ToggleState::On);
        assert_eq!(ToggleState::On.toggled(), ToggleState::Off);
        assert_eq!(ToggleState::from(true), ToggleState::On);
    }
}
