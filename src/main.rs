#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// Demo host: a native window with a column of toggles.
//
// The window plays the parent; each toggle gets a child "surface" that is a
// rectangle inside the window's framebuffer. Timers are scheduled through the
// event loop's wait deadline.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
#[allow(unused_imports)]
use log::{debug, info, warn, error};
use pixels::{Pixels, SurfaceTexture};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use troggle::build_info::BuildInfo;
use troggle::config::Config;
use troggle::host::{
    ControlEvent, CreateParams, Notification, ParentId, Platform, SurfaceId, TimerId,
    ToggleHandle, ToggleHost,
};
use troggle::logging::{self, LogBuffer};
use troggle::render::{Rect, Surface};
use troggle::settings::UserSettings;

const APP_NAME: &str = "troggle";
const WINDOW_WIDTH: u32 = 500;
const WINDOW_HEIGHT: u32 = 300;
const BACKGROUND: [u8; 4] = [236, 236, 236, 255];
const PARENT: ParentId = ParentId(1);
const FIRST_CONTROL_ID: i32 = 1001;

#[derive(Parser, Debug)]
#[command(name = "troggle", version, about = "Sprite-atlas toggle switch demo")]
struct Args {
    /// Settings file (defaults to the per-user config location)
    #[arg(long)]
    settings: Option<String>,

    /// Directory containing switch-body.png and Switch.png
    #[arg(long)]
    asset_dir: Option<PathBuf>,

    /// Number of toggles to place
    #[arg(long, default_value_t = 3)]
    count: u32,

    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    switch_style: i32,

    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    body_style: i32,

    /// Make the toggles mutually exclusive
    #[arg(long)]
    exclusive: bool,

    /// Write a commented settings file with default values and exit
    #[arg(long)]
    write_default_settings: bool,
}

struct ChildSurface {
    bounds: Rect,
    control_id: i32,
}

struct Timer {
    surface: SurfaceId,
    id: TimerId,
    interval: Duration,
    due: Instant,
}

/// Child surfaces, timers and notifications for the demo window.
#[derive(Default)]
struct DemoPlatform {
    next_surface: u32,
    children: BTreeMap<SurfaceId, ChildSurface>,
    timers: Vec<Timer>,
    dirty: bool,
    notifications: Vec<Notification>,
}

impl DemoPlatform {
    fn hit_test(&self, x: i32, y: i32) -> Option<SurfaceId> {
        self.children
            .iter()
            .find(|(_, child)| child.bounds.contains(x, y))
            .map(|(surface, _)| *surface)
    }

    /// Timers due at `now`, rescheduled for their next period.
    fn take_due_timers(&mut self, now: Instant) -> Vec<(SurfaceId, TimerId)> {
        let mut due = Vec::new();
        for timer in self.timers.iter_mut().filter(|timer| timer.due <= now) {
            due.push((timer.surface, timer.id));
            timer.due = now + timer.interval;
        }
        due
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|timer| timer.due).min()
    }
}

impl Platform for DemoPlatform {
    fn register_class(&mut self, class_name: &str) -> bool {
        debug!("Window class {} registered with demo platform", class_name);
        true
    }

    fn create_surface(&mut self, _parent: ParentId, bounds: Rect, control_id: i32) -> Option<SurfaceId> {
        if bounds.is_empty() {
            return None;
        }
        self.next_surface += 1;
        let surface = SurfaceId(self.next_surface);
        self.children.insert(surface, ChildSurface { bounds, control_id });
        self.dirty = true;
        Some(surface)
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        self.children.remove(&surface);
        self.timers.retain(|timer| timer.surface != surface);
        self.dirty = true;
    }

    fn set_timer(&mut self, surface: SurfaceId, timer: TimerId, interval: Duration) {
        let due = Instant::now() + interval;
        match self.timers.iter_mut().find(|t| t.surface == surface && t.id == timer) {
            Some(existing) => {
                existing.interval = interval;
                existing.due = due;
            }
            None => self.timers.push(Timer {
                surface,
                id: timer,
                interval,
                due,
            }),
        }
    }

    fn kill_timer(&mut self, surface: SurfaceId, timer: TimerId) {
        self.timers.retain(|t| !(t.surface == surface && t.id == timer));
    }

    fn invalidate(&mut self, _surface: SurfaceId) {
        self.dirty = true;
    }

    fn notify_parent(&mut self, _parent: ParentId, notification: Notification) {
        self.notifications.push(notification);
    }
}

struct App {
    args: Args,
    host: ToggleHost<DemoPlatform>,
    handles: Vec<ToggleHandle>,
    log_buffer: LogBuffer,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    frame: Surface,
    cursor: Option<(f32, f32)>,
    switch_style: i32,
    body_style: i32,
}

impl App {
    fn new(args: Args, host: ToggleHost<DemoPlatform>, log_buffer: LogBuffer) -> Self {
        Self {
            switch_style: args.switch_style,
            body_style: args.body_style,
            args,
            host,
            handles: Vec::new(),
            log_buffer,
            window: None,
            pixels: None,
            frame: Surface::new(WINDOW_WIDTH, WINDOW_HEIGHT),
            cursor: None,
        }
    }

    fn create_toggles(&mut self) -> bool {
        if !self.host.register_class() {
            return false;
        }

        for i in 0..self.args.count {
            let params = CreateParams {
                parent: Some(PARENT),
                x: 50,
                y: 30 + i as i32 * 70,
                width: 120,
                height: 50,
                control_id: FIRST_CONTROL_ID + i as i32,
                radio_group: self.args.exclusive.then_some(0),
            };

            match self.host.create(&params) {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    error!("Failed to create toggle {}: {}", params.control_id, e);
                    return false;
                }
            }
        }

        self.apply_styles();
        info!("Created {} toggles", self.handles.len());
        true
    }

    fn apply_styles(&mut self) {
        for handle in &self.handles {
            let switch = self.host.set_switch_style(*handle, self.switch_style);
            let body = self.host.set_body_style(*handle, self.body_style);
            if let (Ok(switch), Ok(body)) = (switch, body) {
                // Keep the cycling counters in range
                self.switch_style = switch as i32;
                self.body_style = body as i32;
            }
        }
    }

    fn handle_notifications(&mut self) {
        let notifications = std::mem::take(&mut self.host.platform_mut().notifications);
        if notifications.is_empty() {
            return;
        }

        for notification in &notifications {
            let checked = self
                .handles
                .iter()
                .find(|handle| self.host.window(**handle).ok() == Some(notification.surface))
                .and_then(|handle| self.host.is_checked(*handle).ok());
            match checked {
                Some(checked) => info!(
                    "Toggle {} {}",
                    notification.control_id,
                    if checked { "ON" } else { "OFF" }
                ),
                None => warn!("Notification from unknown toggle {}", notification.control_id),
            }
        }
        self.update_title();
    }

    fn update_title(&self) {
        let window = match &self.window {
            Some(window) => window,
            None => return,
        };

        let states: Vec<String> = self
            .handles
            .iter()
            .filter_map(|handle| {
                let surface = self.host.window(*handle).ok()?;
                let child = self.host.platform().children.get(&surface)?;
                let checked = self.host.is_checked(*handle).ok()?;
                Some(format!("{}:{}", child.control_id, if checked { "on" } else { "off" }))
            })
            .collect();

        window.set_title(&format!("Troggle - {}", states.join(" ")));
    }

    fn render(&mut self) {
        self.frame.clear(BACKGROUND);

        for (surface, child) in &self.host.platform().children {
            let mut target = Surface::new(child.bounds.width() as u32, child.bounds.height() as u32);
            if self.host.paint(*surface, &mut target) {
                self.frame.draw_surface(&target, child.bounds.left, child.bounds.top);
            }
        }

        if let Some(pixels) = self.pixels.as_mut() {
            self.frame.copy_to_frame(pixels.frame_mut());
            if let Err(e) = pixels.render() {
                error!("Failed to present frame: {}", e);
            }
        }
    }

    fn cursor_pixel(&self) -> Option<(i32, i32)> {
        let pixels = self.pixels.as_ref()?;
        let cursor = self.cursor?;
        pixels
            .window_pos_to_pixel(cursor)
            .ok()
            .map(|(x, y)| (x as i32, y as i32))
    }

    fn on_key(&mut self, key: &Key) {
        match key {
            Key::Character(c) if c.as_str().eq_ignore_ascii_case("s") => {
                self.switch_style = (self.switch_style + 1) % 6;
                self.apply_styles();
                debug!("Switch style {}", self.switch_style);
            }
            Key::Character(c) if c.as_str().eq_ignore_ascii_case("b") => {
                self.body_style = (self.body_style + 1) % 10;
                self.apply_styles();
                debug!("Body style {}", self.body_style);
            }
            Key::Character(c) if c.as_str().eq_ignore_ascii_case("l") => {
                if let Err(e) = logging::export_debug_logs(APP_NAME, &self.log_buffer) {
                    error!("Failed to export debug logs: {}", e);
                }
            }
            Key::Named(NamedKey::Space) => {
                if let Some(handle) = self.handles.first().copied() {
                    let checked = self.host.is_checked(handle).unwrap_or(false);
                    if let Err(e) = self.host.set_checked(handle, !checked, true) {
                        warn!("Programmatic toggle failed: {}", e);
                    }
                    self.handle_notifications();
                }
            }
            _ => {}
        }
    }

    fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            self.host.destroy(handle);
        }
        info!("All toggles destroyed");
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("Troggle")
            .with_inner_size(LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let surface_texture = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
        match Pixels::new(WINDOW_WIDTH, WINDOW_HEIGHT, surface_texture) {
            Ok(pixels) => self.pixels = Some(pixels),
            Err(e) => {
                error!("Failed to create framebuffer: {}", e);
                event_loop.exit();
                return;
            }
        }
        self.window = Some(window);

        if !self.create_toggles() {
            error!("Toggle assets unavailable, exiting");
            event_loop.exit();
            return;
        }
        self.update_title();
        self.host.platform_mut().dirty = true;
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(pixels) = self.pixels.as_mut() {
                    if let Err(e) = pixels.resize_surface(size.width.max(1), size.height.max(1)) {
                        error!("Failed to resize surface: {}", e);
                    }
                }
                self.host.platform_mut().dirty = true;
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some((position.x as f32, position.y as f32));
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                let hit = self
                    .cursor_pixel()
                    .and_then(|(x, y)| self.host.platform().hit_test(x, y));
                if let Some(surface) = hit {
                    self.host.dispatch(surface, ControlEvent::PointerDown);
                    self.handle_notifications();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    self.on_key(&event.logical_key);
                }
            }
            WindowEvent::RedrawRequested => self.render(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        for (surface, timer) in self.host.platform_mut().take_due_timers(Instant::now()) {
            self.host.dispatch(surface, ControlEvent::Timer(timer));
        }

        let platform = self.host.platform_mut();
        if platform.dirty {
            platform.dirty = false;
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }

        match self.host.platform().next_deadline() {
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }
}

fn main() {
    let args = Args::parse();

    let log_buffer = logging::setup_logger();
    logging::setup_panic_hook(APP_NAME, log_buffer.clone());
    info!("{}", BuildInfo::summary());

    if args.write_default_settings {
        match UserSettings::default().save(args.settings.as_deref()) {
            Ok(path) => println!("Wrote default settings to {}", path.display()),
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let mut settings = UserSettings::load(args.settings.as_deref());
    if let Some(dir) = &args.asset_dir {
        settings.asset_dir = Some(dir.to_string_lossy().into_owned());
    }
    let config = Config::from_settings(&settings);
    info!("Toggle assets in {:?}", config.asset_dir);

    let host = ToggleHost::new(
        DemoPlatform::default(),
        Arc::new(config.atlas_store()),
        config.animation,
    );

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };

    let mut app = App::new(args, host, log_buffer);
    if let Err(e) = event_loop.run_app(&mut app) {
        error!("Event loop error: {}", e);
        std::process::exit(1);
    }
}
