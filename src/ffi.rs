// C ABI for loading the toggle from a shared library.
//
// The embedding application supplies its window-system services as a table
// of callbacks and forwards its window events (pointer down, timer, paint,
// teardown) to the `troggle_*` entry points. The host lives in a thread-local
// on the UI thread. No entry point panics across the boundary: failures come
// back as `false` or a zero handle.

use std::cell::RefCell;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::atlas::AtlasStore;
use crate::config::{AnimationConfig, Config};
use crate::host::{
    ControlEvent, CreateParams, Notification, ParentId, Platform, SurfaceId, TimerId,
    ToggleHandle, ToggleHost,
};
use crate::logging::{self, LogBuffer};
use crate::render::{Rect, Surface};

pub type TroggleHandle = u64;

/// Window-system services supplied by the embedding application.
///
/// Every function except `notify_parent` is required. `user_data` is passed
/// back untouched.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TroggleCallbacks {
    pub user_data: *mut c_void,
    /// Returns the new surface id, or 0 on failure.
    pub create_surface: Option<
        unsafe extern "C" fn(user_data: *mut c_void, parent: u64, x: i32, y: i32, width: i32, height: i32, control_id: i32) -> u32,
    >,
    pub destroy_surface: Option<unsafe extern "C" fn(user_data: *mut c_void, surface: u32)>,
    pub set_timer: Option<unsafe extern "C" fn(user_data: *mut c_void, surface: u32, timer_id: usize, interval_ms: u32)>,
    pub kill_timer: Option<unsafe extern "C" fn(user_data: *mut c_void, surface: u32, timer_id: usize)>,
    pub invalidate: Option<unsafe extern "C" fn(user_data: *mut c_void, surface: u32)>,
    pub notify_parent: Option<unsafe extern "C" fn(user_data: *mut c_void, parent: u64, control_id: i32, surface: u32)>,
}

impl TroggleCallbacks {
    fn is_complete(&self) -> bool {
        self.create_surface.is_some()
            && self.destroy_surface.is_some()
            && self.set_timer.is_some()
            && self.kill_timer.is_some()
            && self.invalidate.is_some()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TroggleCreateParams {
    /// Parent surface; 0 is treated as null.
    pub parent: u64,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub control_id: i32,
    /// Exclusive group; negative for none.
    pub radio_group: i32,
}

impl From<&TroggleCreateParams> for CreateParams {
    fn from(params: &TroggleCreateParams) -> Self {
        CreateParams {
            parent: (params.parent != 0).then_some(ParentId(params.parent)),
            x: params.x,
            y: params.y,
            width: params.width,
            height: params.height,
            control_id: params.control_id,
            radio_group: (params.radio_group >= 0).then_some(params.radio_group),
        }
    }
}

/// `Platform` over the C callback table. Notifications are queued and sent
/// once the host borrow is released, so the parent may call back in.
struct CallbackPlatform {
    callbacks: TroggleCallbacks,
    outbox: Vec<(ParentId, Notification)>,
}

impl Platform for CallbackPlatform {
    fn register_class(&mut self, _class_name: &str) -> bool {
        self.callbacks.is_complete()
    }

    fn create_surface(&mut self, parent: ParentId, bounds: Rect, control_id: i32) -> Option<SurfaceId> {
        let create = self.callbacks.create_surface?;
        // SAFETY: the embedder guarantees the callback table stays valid
        // while the host is registered.
        let id = unsafe {
            create(
                self.callbacks.user_data,
                parent.0,
                bounds.left,
                bounds.top,
                bounds.width(),
                bounds.height(),
                control_id,
            )
        };
        (id != 0).then_some(SurfaceId(id))
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        if let Some(destroy) = self.callbacks.destroy_surface {
            // SAFETY: see create_surface
            unsafe { destroy(self.callbacks.user_data, surface.0) }
        }
    }

    fn set_timer(&mut self, surface: SurfaceId, timer: TimerId, interval: Duration) {
        if let Some(set_timer) = self.callbacks.set_timer {
            let interval_ms = u32::try_from(interval.as_millis()).unwrap_or(u32::MAX);
            // SAFETY: see create_surface
            unsafe { set_timer(self.callbacks.user_data, surface.0, timer.0, interval_ms) }
        }
    }

    fn kill_timer(&mut self, surface: SurfaceId, timer: TimerId) {
        if let Some(kill_timer) = self.callbacks.kill_timer {
            // SAFETY: see create_surface
            unsafe { kill_timer(self.callbacks.user_data, surface.0, timer.0) }
        }
    }

    fn invalidate(&mut self, surface: SurfaceId) {
        if let Some(invalidate) = self.callbacks.invalidate {
            // SAFETY: see create_surface
            unsafe { invalidate(self.callbacks.user_data, surface.0) }
        }
    }

    fn notify_parent(&mut self, parent: ParentId, notification: Notification) {
        self.outbox.push((parent, notification));
    }
}

thread_local! {
    static HOST: RefCell<Option<ToggleHost<CallbackPlatform>>> = const { RefCell::new(None) };
}

static LOG_BUFFER: OnceCell<LogBuffer> = OnceCell::new();
const LOG_APP_NAME: &str = "troggle";

/// Run `f` against the thread's host, then deliver queued notifications.
///
/// Returns `fallback` when no host is registered, when called re-entrantly
/// from inside a platform callback, or when `f` panics.
fn with_host<R: Copy>(fallback: R, f: impl FnOnce(&mut ToggleHost<CallbackPlatform>) -> R) -> R {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        HOST.with(|cell| {
            let mut guard = match cell.try_borrow_mut() {
                Ok(guard) => guard,
                Err(_) => {
                    debug!("Re-entrant toggle call from a platform callback ignored");
                    return (fallback, None, Vec::new());
                }
            };
            match guard.as_mut() {
                Some(host) => {
                    let result = f(host);
                    let platform = host.platform_mut();
                    let outbox = std::mem::take(&mut platform.outbox);
                    (result, Some(platform.callbacks), outbox)
                }
                None => (fallback, None, Vec::new()),
            }
        })
    }));

    let (result, callbacks, outbox) = match outcome {
        Ok(outcome) => outcome,
        Err(_) => {
            error!("Toggle call panicked; returning failure");
            return fallback;
        }
    };

    if let Some(callbacks) = callbacks {
        deliver(&callbacks, outbox);
    }
    result
}

fn deliver(callbacks: &TroggleCallbacks, outbox: Vec<(ParentId, Notification)>) {
    let notify = match callbacks.notify_parent {
        Some(notify) => notify,
        None => return,
    };

    for (parent, notification) in outbox {
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
            // SAFETY: see CallbackPlatform::create_surface
            unsafe {
                notify(
                    callbacks.user_data,
                    parent.0,
                    notification.control_id,
                    notification.surface.0,
                )
            }
        }));
        if delivered.is_err() {
            error!("Notification for control {} panicked", notification.control_id);
        }
    }
}

fn register_with(
    callbacks: TroggleCallbacks,
    make_store: impl FnOnce() -> (Arc<AtlasStore>, AnimationConfig),
) -> bool {
    let installed = panic::catch_unwind(AssertUnwindSafe(|| {
        HOST.with(|cell| {
            let mut guard = match cell.try_borrow_mut() {
                Ok(guard) => guard,
                Err(_) => return false,
            };
            match guard.as_mut() {
                // Already registered; refresh the callback table
                Some(host) => host.platform_mut().callbacks = callbacks,
                None => {
                    let (store, animation) = make_store();
                    let platform = CallbackPlatform {
                        callbacks,
                        outbox: Vec::new(),
                    };
                    *guard = Some(ToggleHost::new(platform, store, animation));
                }
            }
            true
        })
    }));

    if !matches!(installed, Ok(true)) {
        return false;
    }
    with_host(false, |host| host.register_class())
}

/// Register the control class for this thread. Safe to call more than once.
///
/// # Safety
/// `callbacks` must be null or point to a valid `TroggleCallbacks`. The
/// functions and `user_data` it holds must stay valid while controls exist.
#[no_mangle]
pub unsafe extern "C" fn troggle_register_class(callbacks: *const TroggleCallbacks) -> bool {
    // SAFETY: null-checked; validity is the caller's contract
    let callbacks = match unsafe { callbacks.as_ref() } {
        Some(callbacks) => *callbacks,
        None => return false,
    };

    LOG_BUFFER.get_or_init(logging::setup_logger);

    register_with(callbacks, || {
        let config = Config::load();
        info!("Toggle assets in {:?}", config.asset_dir);
        (Arc::new(config.atlas_store()), config.animation)
    })
}

/// Create a control. Returns 0 on failure.
///
/// # Safety
/// `params` must be null or point to a valid `TroggleCreateParams`.
#[no_mangle]
pub unsafe extern "C" fn troggle_create(params: *const TroggleCreateParams) -> TroggleHandle {
    // SAFETY: null-checked; validity is the caller's contract
    let params = match unsafe { params.as_ref() } {
        Some(params) => CreateParams::from(params),
        None => return 0,
    };

    with_host(0, |host| match host.create(&params) {
        Ok(handle) => handle.into_raw(),
        Err(e) => {
            warn!("Toggle creation failed: {}", e);
            0
        }
    })
}

#[no_mangle]
pub extern "C" fn troggle_destroy(handle: TroggleHandle) {
    with_host((), |host| host.destroy(ToggleHandle::from_raw(handle)))
}

#[no_mangle]
pub extern "C" fn troggle_set_checked(handle: TroggleHandle, checked: bool, notify_parent: bool) -> bool {
    with_host(false, |host| {
        host.set_checked(ToggleHandle::from_raw(handle), checked, notify_parent)
            .is_ok()
    })
}

/// # Safety
/// `checked` must be null or valid for a `bool` write.
#[no_mangle]
pub unsafe extern "C" fn troggle_get_checked(handle: TroggleHandle, checked: *mut bool) -> bool {
    if checked.is_null() {
        return false;
    }
    match with_host(None, |host| host.is_checked(ToggleHandle::from_raw(handle)).ok()) {
        Some(value) => {
            // SAFETY: non-null, writable per the caller's contract
            unsafe { checked.write(value) };
            true
        }
        None => false,
    }
}

#[no_mangle]
pub extern "C" fn troggle_set_switch_style(handle: TroggleHandle, style_index: i32) -> bool {
    with_host(false, |host| {
        host.set_switch_style(ToggleHandle::from_raw(handle), style_index)
            .is_ok()
    })
}

#[no_mangle]
pub extern "C" fn troggle_set_body_style(handle: TroggleHandle, style_index: i32) -> bool {
    with_host(false, |host| {
        host.set_body_style(ToggleHandle::from_raw(handle), style_index)
            .is_ok()
    })
}

/// # Safety
/// `out_window` must be null or valid for a `u32` write.
#[no_mangle]
pub unsafe extern "C" fn troggle_get_window(handle: TroggleHandle, out_window: *mut u32) -> bool {
    if out_window.is_null() {
        return false;
    }
    match with_host(None, |host| host.window(ToggleHandle::from_raw(handle)).ok()) {
        Some(surface) => {
            // SAFETY: non-null, writable per the caller's contract
            unsafe { out_window.write(surface.0) };
            true
        }
        None => false,
    }
}

#[no_mangle]
pub extern "C" fn troggle_pointer_down(surface: u32) -> bool {
    with_host(false, |host| host.dispatch(SurfaceId(surface), ControlEvent::PointerDown))
}

#[no_mangle]
pub extern "C" fn troggle_timer(surface: u32, timer_id: usize) -> bool {
    with_host(false, |host| {
        host.dispatch(SurfaceId(surface), ControlEvent::Timer(TimerId(timer_id)))
    })
}

#[no_mangle]
pub extern "C" fn troggle_surface_destroyed(surface: u32) -> bool {
    with_host(false, |host| host.dispatch(SurfaceId(surface), ControlEvent::Destroyed))
}

/// Paint a control over a caller-owned premultiplied RGBA buffer covering its client area.
///
/// # Safety
/// `pixels` must be null or valid for reads and writes of `stride * height` bytes.
#[no_mangle]
pub unsafe extern "C" fn troggle_paint(surface: u32, pixels: *mut u8, width: u32, height: u32, stride: u32) -> bool {
    let row_bytes = width as usize * 4;
    if pixels.is_null() || width == 0 || height == 0 || (stride as usize) < row_bytes {
        return false;
    }
    // SAFETY: non-null and sized per the caller's contract
    let buffer = unsafe { std::slice::from_raw_parts_mut(pixels, stride as usize * height as usize) };

    let mut packed = Vec::with_capacity(row_bytes * height as usize);
    for row in buffer.chunks_exact(stride as usize) {
        packed.extend_from_slice(&row[..row_bytes]);
    }
    let mut target = match Surface::from_pixels(width, height, packed) {
        Some(target) => target,
        None => return false,
    };

    if !with_host(false, |host| host.paint(SurfaceId(surface), &mut target)) {
        return false;
    }

    let packed = target.into_pixels();
    for (row, src) in buffer.chunks_exact_mut(stride as usize).zip(packed.chunks_exact(row_bytes)) {
        row[..row_bytes].copy_from_slice(src);
    }
    true
}

/// Write the library's buffered log lines to `debug.log` in the log directory.
///
/// Returns false if logging was never initialised by `troggle_register_class`
/// or the file could not be written.
#[no_mangle]
pub extern "C" fn troggle_export_logs() -> bool {
    let buffer = match LOG_BUFFER.get() {
        Some(buffer) => buffer,
        None => return false,
    };
    let exported = panic::catch_unwind(AssertUnwindSafe(|| logging::export_debug_logs(LOG_APP_NAME, buffer)));
    match exported {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            error!("Failed to export debug logs: {}", e);
            false
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{AtlasSet, ImageAtlas};
    use crate::host::ANIMATION_TIMER;
    use std::cell::Cell;

    thread_local! {
        static CALLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
        static NEXT_SURFACE: Cell<u32> = const { Cell::new(0) };
        static SEEN_CHECKED: Cell<Option<bool>> = const { Cell::new(None) };
    }

    fn record(call: String) {
        CALLS.with(|calls| calls.borrow_mut().push(call));
    }

    fn calls() -> Vec<String> {
        CALLS.with(|calls| calls.borrow().clone())
    }

    unsafe extern "C" fn create_surface(_: *mut c_void, parent: u64, _: i32, _: i32, _: i32, _: i32, id: i32) -> u32 {
        let surface = NEXT_SURFACE.with(|next| {
            next.set(next.get() + 1);
            next.get()
        });
        record(format!("create {parent} {id} -> {surface}"));
        surface
    }

    unsafe extern "C" fn destroy_surface(_: *mut c_void, surface: u32) {
        record(format!("destroy {surface}"));
        // A window system tears down synchronously and reports it back
        assert!(!troggle_surface_destroyed(surface));
    }

    unsafe extern "C" fn set_timer(_: *mut c_void, surface: u32, timer: usize, interval: u32) {
        record(format!("set_timer {surface} {timer} {interval}"));
    }

    unsafe extern "C" fn kill_timer(_: *mut c_void, surface: u32, timer: usize) {
        record(format!("kill_timer {surface} {timer}"));
    }

    unsafe extern "C" fn invalidate(_: *mut c_void, surface: u32) {
        record(format!("invalidate {surface}"));
    }

    unsafe extern "C" fn notify_parent(_: *mut c_void, parent: u64, control_id: i32, surface: u32) {
        record(format!("notify {parent} {control_id} {surface}"));
        // The parent asks for the state from inside the notification
        let handle = HANDLE.with(Cell::get);
        let mut checked = false;
        if unsafe { troggle_get_checked(handle, &mut checked) } {
            SEEN_CHECKED.with(|seen| seen.set(Some(checked)));
        }
    }

    thread_local! {
        static HANDLE: Cell<TroggleHandle> = const { Cell::new(0) };
    }

    fn callbacks() -> TroggleCallbacks {
        TroggleCallbacks {
            user_data: std::ptr::null_mut(),
            create_surface: Some(create_surface),
            destroy_surface: Some(destroy_surface),
            set_timer: Some(set_timer),
            kill_timer: Some(kill_timer),
            invalidate: Some(invalidate),
            notify_parent: Some(notify_parent),
        }
    }

    fn register_in_memory() -> bool {
        register_with(callbacks(), || {
            let solid = |w: u32, h: u32| vec![255u8; (w * h * 4) as usize];
            let set = AtlasSet {
                body: ImageAtlas::from_rgba(50, 20, solid(50, 20), 5, 2).unwrap(),
                switch: ImageAtlas::from_rgba(96, 40, solid(96, 40), 3, 2).unwrap(),
            };
            (Arc::new(AtlasStore::preloaded(set)), AnimationConfig::default())
        })
    }

    fn create_params(parent: u64) -> TroggleCreateParams {
        TroggleCreateParams {
            parent,
            x: 50,
            y: 50,
            width: 120,
            height: 50,
            control_id: 1001,
            radio_group: -1,
        }
    }

    #[test]
    fn test_calls_before_registration_fail() {
        assert_eq!(unsafe { troggle_create(&create_params(9)) }, 0);
        assert!(!troggle_set_checked(0x5447_4C45_0000_0001, true, true));
        assert!(!troggle_pointer_down(1));
    }

    #[test]
    fn test_incomplete_callbacks_are_rejected() {
        let partial = TroggleCallbacks {
            set_timer: None,
            ..callbacks()
        };
        assert!(!register_with(partial, || {
            (Arc::new(AtlasStore::preloaded(AtlasSet {
                body: ImageAtlas::default(),
                switch: ImageAtlas::default(),
            })), AnimationConfig::default())
        }));
        assert!(unsafe { !troggle_register_class(std::ptr::null()) });
    }

    #[test]
    fn test_export_logs_requires_registration() {
        // Only troggle_register_class installs the logger; tests register through register_with
        assert!(!troggle_export_logs());
    }

    #[test]
    fn test_paint_respects_row_padding() {
        assert!(register_in_memory());
        let handle = unsafe { troggle_create(&create_params(9)) };
        let mut surface = 0u32;
        assert!(unsafe { troggle_get_window(handle, &mut surface) });

        let (width, height, stride) = (120usize, 50usize, 120 * 4 + 16);
        let mut pixels = vec![0xABu8; stride * height];
        assert!(unsafe {
            troggle_paint(surface, pixels.as_mut_ptr(), width as u32, height as u32, stride as u32)
        });

        for row in pixels.chunks_exact(stride) {
            assert!(row[..width * 4].iter().all(|b| *b == 255));
            assert!(row[width * 4..].iter().all(|b| *b == 0xAB));
        }

        // Stride shorter than a row is rejected
        assert!(unsafe { !troggle_paint(surface, pixels.as_mut_ptr(), 120, 50, 100) });
    }

    #[test]
    fn test_lifecycle_through_c_abi() {
        assert!(register_in_memory());
        assert!(register_in_memory());

        assert_eq!(unsafe { troggle_create(std::ptr::null()) }, 0);
        assert_eq!(unsafe { troggle_create(&create_params(0)) }, 0);

        let handle = unsafe { troggle_create(&create_params(9)) };
        assert_ne!(handle, 0);
        HANDLE.with(|h| h.set(handle));

        let mut surface = 0u32;
        assert!(unsafe { troggle_get_window(handle, &mut surface) });
        assert_eq!(surface, 1);

        assert!(troggle_set_switch_style(handle, 999));
        assert!(troggle_set_body_style(handle, -5));

        // Click: the parent sees the new state from inside its notification
        assert!(troggle_pointer_down(surface));
        assert_eq!(SEEN_CHECKED.with(Cell::get), Some(true));
        assert!(calls().contains(&"notify 9 1001 1".to_string()));
        assert!(calls().contains(&"set_timer 1 1 10".to_string()));

        let mut checked = false;
        assert!(unsafe { troggle_get_checked(handle, &mut checked) });
        assert!(checked);
        assert!(unsafe { !troggle_get_checked(handle, std::ptr::null_mut()) });

        assert!(troggle_timer(surface, ANIMATION_TIMER.0));
        assert!(!troggle_timer(surface, 77));

        let mut pixels = vec![0u8; 120 * 4 * 50];
        assert!(unsafe { troggle_paint(surface, pixels.as_mut_ptr(), 120, 50, 120 * 4) });
        assert_eq!(&pixels[..4], &[255, 255, 255, 255]);

        troggle_destroy(handle);
        let log = calls();
        let kill = log.iter().rposition(|c| c == "kill_timer 1 1").unwrap();
        let destroy = log.iter().position(|c| c == "destroy 1").unwrap();
        assert!(kill < destroy);

        assert!(!troggle_set_checked(handle, false, true));
        assert!(!troggle_timer(surface, ANIMATION_TIMER.0));
        assert!(unsafe { !troggle_get_window(handle, &mut surface) });
        troggle_destroy(handle);
    }
}
