// The toggle control itself: on/off state, knob animation and style selection.

pub mod state;
pub mod style;

pub use state::{Step, ToggleControl, ToggleState};
pub use style::{clamp_style, StyleKind};
