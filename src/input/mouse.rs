//! Mouse Report Handling
//!
//! Converts raw mouse reports into the emulated mouse's button mask, wheel
//! notches and motion deltas. Button bits change only on explicit down/up
//! transitions; absolute sources are damped into relative deltas against the
//! previous absolute position.

use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::input::report::{ButtonTransition, MouseReport};

/// Raw wheel units per detent
pub const WHEEL_DETENT: i32 = 120;

/// Damping divisor applied to absolute coordinate deltas
pub const ABSOLUTE_DIVISOR: i32 = 25;

/// Emulated mouse buttons, valued as their mask bit
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left = 0b0_0001,
    /// Right mouse button
    Right = 0b0_0010,
    /// Middle mouse button
    Middle = 0b0_0100,
    /// Extra button 1 (side button)
    Extra1 = 0b0_1000,
    /// Extra button 2 (side button)
    Extra2 = 0b1_0000,
}

/// Current emulated button state
pub type ButtonMask = BitFlags<MouseButton>;

impl MouseButton {
    /// All buttons in mask order
    pub const ALL: [MouseButton; 5] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::Extra1,
        MouseButton::Extra2,
    ];

    /// Raw `(down, up)` transition flags for this button
    pub fn transitions(self) -> (ButtonTransition, ButtonTransition) {
        match self {
            MouseButton::Left => (ButtonTransition::LeftDown, ButtonTransition::LeftUp),
            MouseButton::Right => (ButtonTransition::RightDown, ButtonTransition::RightUp),
            MouseButton::Middle => (ButtonTransition::MiddleDown, ButtonTransition::MiddleUp),
            MouseButton::Extra1 => (ButtonTransition::Button4Down, ButtonTransition::Button4Up),
            MouseButton::Extra2 => (ButtonTransition::Button5Down, ButtonTransition::Button5Up),
        }
    }
}

/// When to move the host cursor back to the window centre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecenterPolicy {
    /// Only after absolute-mode reports
    #[default]
    AbsoluteOnly,
    /// After every captured report
    Always,
}

/// Result of one mouse report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerDelta {
    /// Authoritative button mask, present when any transition occurred
    pub buttons: Option<ButtonMask>,
    /// Wheel notches, present when the wheel moved
    pub wheel_notches: Option<i32>,
    /// Horizontal motion
    pub dx: i32,
    /// Vertical motion
    pub dy: i32,
    /// Host cursor should be recentred
    pub recenter: bool,
}

/// Per-filter pointer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerState {
    /// Emulated button mask
    pub buttons: ButtonMask,
    /// Last absolute X, absolute mode only
    pub last_x: i32,
    /// Last absolute Y, absolute mode only
    pub last_y: i32,
    /// Notches from the most recent report
    pub wheel_notches: i32,
}

/// Mouse report tracker
#[derive(Debug, Clone)]
pub struct PointerStateTracker {
    state: PointerState,

    /// Absolute-mode damping divisor
    divisor: i32,

    recenter: RecenterPolicy,
}

impl PointerStateTracker {
    /// Create a tracker with default damping and recentring
    pub fn new() -> Self {
        Self {
            state: PointerState::default(),
            divisor: ABSOLUTE_DIVISOR,
            recenter: RecenterPolicy::default(),
        }
    }

    /// Override the absolute-mode divisor; non-positive values keep the default
    pub fn with_divisor(mut self, divisor: i32) -> Self {
        if divisor > 0 {
            self.divisor = divisor;
        }
        self
    }

    /// Set the recentring policy
    pub fn with_recenter_policy(mut self, policy: RecenterPolicy) -> Self {
        self.recenter = policy;
        self
    }

    /// Process one mouse report
    pub fn update(&mut self, report: &MouseReport) -> PointerDelta {
        let buttons = self.apply_transitions(report);

        let wheel_notches = report.wheel().map(|raw| raw as i32 / WHEEL_DETENT);
        self.state.wheel_notches = wheel_notches.unwrap_or(0);

        let (dx, dy) = if report.absolute {
            let dx = damp(report.x, self.state.last_x, self.divisor);
            let dy = damp(report.y, self.state.last_y, self.divisor);
            self.state.last_x = report.x;
            self.state.last_y = report.y;
            (dx, dy)
        } else {
            (report.x, report.y)
        };

        let recenter = match self.recenter {
            RecenterPolicy::Always => true,
            RecenterPolicy::AbsoluteOnly => report.absolute,
        };

        trace!(
            "Mouse {}: ({}, {}) -> delta ({}, {})",
            if report.absolute { "absolute" } else { "relative" },
            report.x,
            report.y,
            dx,
            dy
        );

        PointerDelta {
            buttons,
            wheel_notches,
            dx,
            dy,
            recenter,
        }
    }

    fn apply_transitions(&mut self, report: &MouseReport) -> Option<ButtonMask> {
        let mut changed = false;

        for button in MouseButton::ALL {
            let (down, up) = button.transitions();
            if report.transitions.contains(down) {
                self.state.buttons.insert(button);
                changed = true;
            } else if report.transitions.contains(up) {
                self.state.buttons.remove(button);
                changed = true;
            }
        }

        if changed {
            debug!("Mouse buttons: {:?}", self.state.buttons);
            Some(self.state.buttons)
        } else {
            None
        }
    }

    /// Current button mask
    pub fn buttons(&self) -> ButtonMask {
        self.state.buttons
    }

    /// Check if button is currently pressed
    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.state.buttons.contains(button)
    }

    /// Snapshot of the tracked state
    pub fn state(&self) -> PointerState {
        self.state
    }

    /// Recentring policy in use
    pub fn recenter_policy(&self) -> RecenterPolicy {
        self.recenter
    }

    /// Reset mouse state
    pub fn reset(&mut self) {
        self.state = PointerState::default();
    }
}

/// Damped difference of two absolute coordinates, saturated to `i32`
fn damp(current: i32, previous: i32, divisor: i32) -> i32 {
    let delta = (i64::from(current) - i64::from(previous)) / i64::from(divisor);
    delta.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl Default for PointerStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_creation() {
        let tracker = PointerStateTracker::new();
        assert!(tracker.buttons().is_empty());
        assert_eq!(tracker.state(), PointerState::default());
        assert_eq!(tracker.recenter_policy(), RecenterPolicy::AbsoluteOnly);
    }

    #[test]
    fn test_button_press_release() {
        let mut tracker = PointerStateTracker::new();

        let report = MouseReport::relative(0, 0).with_transitions(ButtonTransition::LeftDown);
        let delta = tracker.update(&report);
        assert_eq!(delta.buttons, Some(BitFlags::from(MouseButton::Left)));
        assert!(tracker.is_button_pressed(MouseButton::Left));

        let report = MouseReport::relative(0, 0).with_transitions(ButtonTransition::LeftUp);
        let delta = tracker.update(&report);
        assert_eq!(delta.buttons, Some(ButtonMask::empty()));
        assert!(!tracker.is_button_pressed(MouseButton::Left));
    }

    #[test]
    fn test_absent_flags_leave_mask_unchanged() {
        let mut tracker = PointerStateTracker::new();
        tracker.update(&MouseReport::relative(0, 0).with_transitions(
            ButtonTransition::RightDown | ButtonTransition::Button5Down,
        ));

        let delta = tracker.update(&MouseReport::relative(3, 4));
        assert_eq!(delta.buttons, None);
        assert_eq!(tracker.buttons(), MouseButton::Right | MouseButton::Extra2);
    }

    #[test]
    fn test_multiple_button_states() {
        let mut tracker = PointerStateTracker::new();

        let pressed = ButtonTransition::LeftDown
            | ButtonTransition::MiddleDown
            | ButtonTransition::Button4Down;
        tracker.update(&MouseReport::relative(0, 0).with_transitions(pressed));
        assert_eq!(tracker.buttons().bits(), 0b0_1101);

        let report = MouseReport::relative(0, 0).with_transitions(ButtonTransition::MiddleUp);
        let delta = tracker.update(&report);
        assert_eq!(delta.buttons.map(|b| b.bits()), Some(0b0_1001));
    }

    #[test]
    fn test_wheel_notches() {
        let mut tracker = PointerStateTracker::new();

        let delta = tracker.update(&MouseReport::relative(0, 0).with_wheel(240));
        assert_eq!(delta.wheel_notches, Some(2));

        let delta = tracker.update(&MouseReport::relative(0, 0).with_wheel(-120));
        assert_eq!(delta.wheel_notches, Some(-1));

        // Partial detents truncate toward zero
        let delta = tracker.update(&MouseReport::relative(0, 0).with_wheel(-60));
        assert_eq!(delta.wheel_notches, Some(0));

        let delta = tracker.update(&MouseReport::relative(0, 0));
        assert_eq!(delta.wheel_notches, None);
        assert_eq!(tracker.state().wheel_notches, 0);
    }

    #[test]
    fn test_wheel_is_not_a_button_transition() {
        let mut tracker = PointerStateTracker::new();
        let delta = tracker.update(&MouseReport::relative(0, 0).with_wheel(120));
        assert_eq!(delta.buttons, None);
    }

    #[test]
    fn test_absolute_motion_damped() {
        let mut tracker = PointerStateTracker::new();
        tracker.update(&MouseReport::absolute(100, 100));

        let delta = tracker.update(&MouseReport::absolute(125, 150));
        assert_eq!((delta.dx, delta.dy), (1, 2));
        assert_eq!(tracker.state().last_x, 125);
        assert_eq!(tracker.state().last_y, 150);
        assert!(delta.recenter);
    }

    #[test]
    fn test_absolute_motion_truncates_toward_zero() {
        let mut tracker = PointerStateTracker::new();
        tracker.update(&MouseReport::absolute(100, 100));

        let delta = tracker.update(&MouseReport::absolute(76, 124));
        assert_eq!((delta.dx, delta.dy), (0, 0));
        assert_eq!(tracker.state().last_x, 76);
    }

    #[test]
    fn test_absolute_motion_extreme_coordinates() {
        let mut tracker = PointerStateTracker::new();
        tracker.update(&MouseReport::absolute(i32::MIN, 0));

        let delta = tracker.update(&MouseReport::absolute(i32::MAX, 0));
        assert_eq!((delta.dx, delta.dy), (171_798_691, 0));
        assert_eq!(tracker.state().last_x, i32::MAX);

        let delta = tracker.update(&MouseReport::absolute(i32::MIN, i32::MIN));
        assert_eq!((delta.dx, delta.dy), (-171_798_691, -85_899_345));
    }

    #[test]
    fn test_absolute_motion_saturates_without_damping() {
        let mut tracker = PointerStateTracker::new().with_divisor(1);
        tracker.update(&MouseReport::absolute(i32::MIN, i32::MAX));

        let delta = tracker.update(&MouseReport::absolute(i32::MAX, i32::MIN));
        assert_eq!((delta.dx, delta.dy), (i32::MAX, i32::MIN));
    }

    #[test]
    fn test_relative_motion_passthrough() {
        let mut tracker = PointerStateTracker::new();
        tracker.update(&MouseReport::absolute(500, 500));

        let delta = tracker.update(&MouseReport::relative(5, -3));
        assert_eq!((delta.dx, delta.dy), (5, -3));
        assert!(!delta.recenter);
        // Absolute history untouched by relative reports
        assert_eq!(tracker.state().last_x, 500);
    }

    #[test]
    fn test_recenter_always() {
        let mut tracker = PointerStateTracker::new().with_recenter_policy(RecenterPolicy::Always);
        assert!(tracker.update(&MouseReport::relative(1, 1)).recenter);
        assert!(tracker.update(&MouseReport::absolute(1, 1)).recenter);
    }

    #[test]
    fn test_custom_divisor() {
        let mut tracker = PointerStateTracker::new().with_divisor(10);
        let delta = tracker.update(&MouseReport::absolute(100, -50));
        assert_eq!((delta.dx, delta.dy), (10, -5));

        let tracker = PointerStateTracker::new().with_divisor(0);
        assert_eq!(tracker.divisor, ABSOLUTE_DIVISOR);
    }

    #[test]
    fn test_mouse_reset() {
        let mut tracker = PointerStateTracker::new();
        let report = MouseReport::absolute(40, 40).with_transitions(ButtonTransition::LeftDown);
        tracker.update(&report);

        tracker.reset();

        assert!(tracker.buttons().is_empty());
        assert_eq!(tracker.state().last_x, 0);
    }
}
