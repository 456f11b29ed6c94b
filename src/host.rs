// Control host: binds toggle controls to platform surfaces.
//
// The embedding application implements `Platform` (window creation, timers,
// invalidation, parent notification) and forwards surface events to
// `ToggleHost::dispatch` and `ToggleHost::paint`. Controls live in a registry
// keyed by surface id; callers only ever hold opaque `ToggleHandle` tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::atlas::{AtlasSet, AtlasStore};
use crate::config::AnimationConfig;
use crate::error::ToggleError;
use crate::render::{draw_tile, Rect, Surface};
use crate::toggler::{clamp_style, StyleKind, ToggleControl};

pub const CLASS_NAME: &str = "UI_TOGGLE_CONTROL";
pub const ANIMATION_TIMER: TimerId = TimerId(1);

// "TGLE"
const HANDLE_MAGIC: u32 = 0x5447_4C45;

/// Platform identifier of a control's own surface (a child window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

/// Platform identifier of the surface a control is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub usize);

/// Opaque token for a live control.
///
/// The high half carries an identity marker, the low half a serial number.
/// Serials count up and skip any that are still live after wrapping, so a
/// handle to a destroyed control stays invalid until 2^32 more creations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToggleHandle(u64);

impl ToggleHandle {
    pub const NULL: ToggleHandle = ToggleHandle(0);

    fn new(serial: u32) -> Self {
        Self(((HANDLE_MAGIC as u64) << 32) | serial as u64)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Serial number, if the handle is non-null and carries the marker.
    fn serial(self) -> Option<u32> {
        if self.is_null() || (self.0 >> 32) as u32 != HANDLE_MAGIC {
            return None;
        }
        match self.0 as u32 {
            0 => None,
            serial => Some(serial),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateParams {
    pub parent: Option<ParentId>,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub control_id: i32,
    /// Controls sharing a group are mutually exclusive.
    pub radio_group: Option<i32>,
}

impl CreateParams {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Sent to the parent when a checked-state change asks for notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub control_id: i32,
    pub surface: SurfaceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    PointerDown,
    Timer(TimerId),
    /// The platform tore the surface down.
    Destroyed,
}

/// Services the embedding window system provides to the host.
pub trait Platform {
    /// Register the control's window class. Returns true if it is (now) registered.
    fn register_class(&mut self, class_name: &str) -> bool;

    fn create_surface(&mut self, parent: ParentId, bounds: Rect, control_id: i32) -> Option<SurfaceId>;

    fn destroy_surface(&mut self, surface: SurfaceId);

    /// Start or restart a periodic timer delivered as `ControlEvent::Timer`.
    fn set_timer(&mut self, surface: SurfaceId, timer: TimerId, interval: Duration);

    fn kill_timer(&mut self, surface: SurfaceId, timer: TimerId);

    /// Request a repaint of the surface.
    fn invalidate(&mut self, surface: SurfaceId);

    fn notify_parent(&mut self, parent: ParentId, notification: Notification);
}

struct ControlEntry {
    serial: u32,
    parent: ParentId,
    control_id: i32,
    radio_group: Option<i32>,
    control: ToggleControl,
}

pub struct ToggleHost<P: Platform> {
    platform: P,
    atlases: Arc<AtlasStore>,
    animation: AnimationConfig,
    registered: bool,
    next_serial: u32,
    controls: HashMap<SurfaceId, ControlEntry>,
    handles: HashMap<u32, SurfaceId>,
}

impl<P: Platform> ToggleHost<P> {
    pub fn new(platform: P, atlases: Arc<AtlasStore>, animation: AnimationConfig) -> Self {
        Self {
            platform,
            atlases,
            animation,
            registered: false,
            next_serial: 1,
            controls: HashMap::new(),
            handles: HashMap::new(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn control_count(&self) -> usize {
        self.controls.len()
    }

    /// Register the control class once. Repeated calls report success.
    pub fn register_class(&mut self) -> bool {
        if self.registered {
            return true;
        }
        self.registered = self.platform.register_class(CLASS_NAME);
        if self.registered {
            info!("Registered control class {}", CLASS_NAME);
        } else {
            error!("Failed to register control class {}", CLASS_NAME);
        }
        self.registered
    }

    pub fn create(&mut self, params: &CreateParams) -> Result<ToggleHandle, ToggleError> {
        let parent = params.parent.ok_or(ToggleError::InvalidParent)?;
        if !self.registered {
            return Err(ToggleError::NotRegistered);
        }
        self.load_atlases()?;

        let surface = self
            .platform
            .create_surface(parent, params.bounds(), params.control_id)
            .ok_or(ToggleError::SurfaceCreation)?;

        if let Some(stale) = self.controls.get(&surface) {
            // The platform reused a surface id we still track; drop the old entry.
            warn!("Surface {:?} reused, dropping control #{}", surface, stale.serial);
            self.teardown(surface);
        }

        let serial = self.allocate_serial();

        self.controls.insert(
            surface,
            ControlEntry {
                serial,
                parent,
                control_id: params.control_id,
                radio_group: params.radio_group.filter(|group| *group >= 0),
                control: ToggleControl::new(self.animation.step_px),
            },
        );
        self.handles.insert(serial, surface);

        debug!(
            "Created toggle #{} (id {}) on {:?} at {:?}",
            serial,
            params.control_id,
            surface,
            params.bounds()
        );
        Ok(ToggleHandle::new(serial))
    }

    /// Destroy a control and its surface. Invalid handles are ignored.
    pub fn destroy(&mut self, handle: ToggleHandle) {
        let surface = match self.resolve(handle) {
            Ok(surface) => surface,
            Err(_) => {
                debug!("Ignoring destroy of invalid handle {:#x}", handle.into_raw());
                return;
            }
        };

        self.teardown(surface);
        self.platform.destroy_surface(surface);
    }

    pub fn set_checked(&mut self, handle: ToggleHandle, checked: bool, notify: bool) -> Result<(), ToggleError> {
        let surface = self.resolve(handle)?;
        let atlases = self.load_atlases()?;
        self.apply_checked(surface, checked, notify, atlases.travel_distance());
        Ok(())
    }

    pub fn is_checked(&self, handle: ToggleHandle) -> Result<bool, ToggleError> {
        Ok(self.control(handle)?.is_checked())
    }

    /// Select the knob tile. Returns the index actually stored.
    pub fn set_switch_style(&mut self, handle: ToggleHandle, index: i32) -> Result<usize, ToggleError> {
        self.set_style(handle, StyleKind::Switch, index)
    }

    /// Select the body tile. Returns the index actually stored.
    pub fn set_body_style(&mut self, handle: ToggleHandle, index: i32) -> Result<usize, ToggleError> {
        self.set_style(handle, StyleKind::Body, index)
    }

    /// The surface the control is bound to.
    pub fn window(&self, handle: ToggleHandle) -> Result<SurfaceId, ToggleError> {
        self.resolve(handle)
    }

    pub fn control(&self, handle: ToggleHandle) -> Result<&ToggleControl, ToggleError> {
        let surface = self.resolve(handle)?;
        self.controls
            .get(&surface)
            .map(|entry| &entry.control)
            .ok_or(ToggleError::InvalidHandle)
    }

    /// Route a platform event for `surface`. Returns false if nothing handled it.
    pub fn dispatch(&mut self, surface: SurfaceId, event: ControlEvent) -> bool {
        if !self.controls.contains_key(&surface) {
            return false;
        }

        match event {
            ControlEvent::PointerDown => {
                let atlases = match self.load_atlases() {
                    Ok(atlases) => atlases,
                    Err(_) => return false,
                };
                let checked = self.controls[&surface].control.state().toggled().is_on();
                self.apply_checked(surface, checked, true, atlases.travel_distance());
                true
            }
            ControlEvent::Timer(timer) if timer == ANIMATION_TIMER => {
                self.animate_step(surface);
                true
            }
            ControlEvent::Timer(_) => false,
            ControlEvent::Destroyed => self.teardown(surface),
        }
    }

    /// Draw the control bound to `surface` into `target`, which spans its client area.
    pub fn paint(&self, surface: SurfaceId, target: &mut Surface) -> bool {
        let entry = match self.controls.get(&surface) {
            Some(entry) => entry,
            None => return false,
        };
        let atlases = match self.atlases.get() {
            Some(atlases) => atlases,
            None => return false,
        };

        let bounds = target.bounds();
        draw_tile(target, bounds, &atlases.body, entry.control.body_style());

        let knob = bounds.offset(entry.control.knob_offset(), 0);
        draw_tile(target, knob, &atlases.switch, entry.control.switch_style());
        true
    }

    fn resolve(&self, handle: ToggleHandle) -> Result<SurfaceId, ToggleError> {
        let serial = handle.serial().ok_or(ToggleError::InvalidHandle)?;
        let surface = *self.handles.get(&serial).ok_or(ToggleError::InvalidHandle)?;
        match self.controls.get(&surface) {
            Some(entry) if entry.serial == serial => Ok(surface),
            _ => Err(ToggleError::InvalidHandle),
        }
    }

    fn allocate_serial(&mut self) -> u32 {
        // Zero is reserved for the null handle
        while self.handles.contains_key(&self.next_serial) {
            self.next_serial = self.next_serial.wrapping_add(1).max(1);
        }
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1).max(1);
        serial
    }

    fn load_atlases(&self) -> Result<Arc<AtlasSet>, ToggleError> {
        self.atlases
            .ensure_loaded()
            .map_err(|e| ToggleError::AtlasUnavailable(e.to_string()))
    }

    fn set_style(&mut self, handle: ToggleHandle, kind: StyleKind, index: i32) -> Result<usize, ToggleError> {
        let surface = self.resolve(handle)?;
        let atlases = self.load_atlases()?;
        let clamped = clamp_style(index, kind.tile_count(&atlases));

        if let Some(entry) = self.controls.get_mut(&surface) {
            match kind {
                StyleKind::Body => entry.control.set_body_style(clamped),
                StyleKind::Switch => entry.control.set_switch_style(clamped),
            }
        }
        if clamped as i64 != index as i64 {
            debug!("{:?} style {} clamped to {}", kind, index, clamped);
        }
        self.platform.invalidate(surface);
        Ok(clamped)
    }

    fn apply_checked(&mut self, surface: SurfaceId, checked: bool, notify: bool, travel: i32) {
        let (transition, parent, control_id, group) = match self.controls.get_mut(&surface) {
            Some(entry) => (
                entry.control.set_checked(checked, travel),
                entry.parent,
                entry.control_id,
                entry.radio_group,
            ),
            None => return,
        };

        if transition.start_timer {
            self.platform.set_timer(surface, ANIMATION_TIMER, self.animation.interval);
        }
        if !transition.changed {
            return;
        }
        self.platform.invalidate(surface);

        if checked {
            if let Some(group) = group {
                let siblings: Vec<SurfaceId> = self
                    .controls
                    .iter()
                    .filter(|(other, entry)| {
                        **other != surface
                            && entry.parent == parent
                            && entry.radio_group == Some(group)
                            && entry.control.is_checked()
                    })
                    .map(|(other, _)| *other)
                    .collect();
                for sibling in siblings {
                    self.apply_checked(sibling, false, false, travel);
                }
            }
        }

        if notify {
            self.platform.notify_parent(parent, Notification { control_id, surface });
        }
    }

    fn animate_step(&mut self, surface: SurfaceId) {
        let step = match self.controls.get_mut(&surface) {
            Some(entry) => entry.control.step(),
            None => return,
        };

        if step.needs_redraw() {
            self.platform.invalidate(surface);
        }
        if step.stops_timer() {
            self.platform.kill_timer(surface, ANIMATION_TIMER);
        }
    }

    /// Stop the timer, then forget the control. Returns whether one was bound.
    fn teardown(&mut self, surface: SurfaceId) -> bool {
        let entry = match self.controls.get_mut(&surface) {
            Some(entry) => entry,
            None => return false,
        };
        entry.control.stop_animation();
        self.platform.kill_timer(surface, ANIMATION_TIMER);

        if let Some(entry) = self.controls.remove(&surface) {
            self.handles.remove(&entry.serial);
            debug!("Released toggle #{} on {:?}", entry.serial, surface);
        }
        true
    }
}
