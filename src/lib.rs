//! Animated on/off toggle switch drawn from sprite-sheet atlases.
//!
//! [`host::ToggleHost`] owns the controls and talks to the window system
//! through the [`host::Platform`] trait; [`ffi`] exposes the same operations
//! as a C ABI for hosts that load the library dynamically.

pub mod atlas;
pub mod build_info;
pub mod config;
pub mod error;
pub mod ffi;
pub mod host;
pub mod logging;
pub mod render;
pub mod settings;
pub mod toggler;

pub use error::{AtlasError, ToggleError};
pub use host::{ControlEvent, CreateParams, Platform, ToggleHandle, ToggleHost};
