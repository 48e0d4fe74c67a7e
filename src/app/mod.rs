mod egui_host;
mod timing;

use crate::assets;
use crate::controls::{ControlsPanel, PanelAction};
use crate::export;
use crate::model::ModelCatalog;
use crate::render::{
    Background, EnvironmentCache, FrameSchedule, ModelHost, RenderBackend, RenderState,
};
use crate::scene::parts;
use crate::settings::{Settings, SettingsPatch};
use egui_host::EguiHost;
use timing::FrameTiming;

use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "Look Dev - GLB Lighting Tester";

pub struct App {
    window: Option<Arc<Window>>,
    egui: Option<EguiHost>,
    backend: Option<Box<dyn RenderBackend>>,
    settings: Settings,
    catalog: ModelCatalog,
    controls: ControlsPanel,
    render_state: RenderState,
    model: ModelHost,
    environment: EnvironmentCache,
    part_schedule: FrameSchedule,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    close_requested: bool,
}

impl App {
    fn new() -> Self {
        let settings = Settings::defaults();
        let catalog = ModelCatalog::builtin();
        Self {
            window: None,
            egui: None,
            backend: None,
            controls: ControlsPanel::new(&settings),
            render_state: RenderState::from_settings(&settings),
            model: ModelHost::new(&settings),
            environment: EnvironmentCache::default(),
            part_schedule: FrameSchedule::default(),
            settings,
            catalog,
            timing: FrameTiming::new(WINDOW_TITLE.to_string()),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
            close_requested: false,
        }
    }

    /// Installs the backend that turns frame submissions into pixels.
    pub fn set_backend(&mut self, backend: Box<dyn RenderBackend>) {
        self.backend = Some(backend);
    }

    fn start_model_load(&mut self) {
        let variant = self.catalog.get_or_fallback(&self.settings.selected_model);
        self.model.begin_load(assets::model_path(&variant.asset_file));
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    /// Merge a settled patch into the applied settings and propagate it to
    /// the render state, the placeholder, and (when needed) a model reload or
    /// a part-color pass.
    fn apply_patch(&mut self, patch: SettingsPatch) {
        let model_changed = patch
            .selected_model
            .as_deref()
            .is_some_and(|id| id != self.settings.selected_model);
        let needs_part_pass = patch.touches_part_resolution();

        self.settings = self.settings.merged(&patch);
        self.render_state.apply(&self.settings);
        self.model.refresh_placeholder(&self.settings);

        if model_changed {
            // Part colors for the new model are applied once its load lands.
            self.part_schedule.cancel();
            self.start_model_load();
        } else if needs_part_pass {
            self.part_schedule.schedule();
        }
    }

    fn resolve_parts_if_due(&mut self) {
        if !self.part_schedule.take_due() {
            return;
        }
        let variant = self
            .catalog
            .get_or_fallback(&self.settings.selected_model)
            .clone();
        if let Some(scene) = self.model.loaded_scene_mut() {
            let stats = parts::resolve_part_colors(scene, &variant, &self.settings);
            log::debug!(
                "Part colors applied: {} nodes, {} materials, {} part slots, {} skipped",
                stats.nodes_visited,
                stats.materials_updated,
                stats.parts_colored,
                stats.skipped
            );
        }
    }

    fn handle_export(&mut self) {
        let now = chrono::Utc::now();
        let record = export::build_export(&self.settings, &self.catalog, now);
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name(export::export_file_name(&self.settings, now))
            .save_file()
        else {
            self.controls.set_status("Export cancelled");
            return;
        };
        match export::write_export(&record, &path) {
            Ok(()) => {
                log::info!("Exported settings to {}", path.display());
                self.controls
                    .set_status(format!("Exported to {}", path.display()));
            }
            Err(err) => {
                log::warn!("Settings export failed: {err}");
                self.controls.set_status(format!("Export failed: {err}"));
            }
        }
    }

    /// Discard the session wholesale: pending edits, scheduled passes, and
    /// in-flight loads all go, then the defaults are re-applied end to end.
    fn reset_session(&mut self) {
        log::info!("Resetting session to defaults");
        self.controls.cancel_pending();
        self.part_schedule.cancel();
        self.model.cancel_pending();

        self.settings = Settings::defaults();
        self.controls.sync(&self.settings);
        self.controls.set_status("");
        self.render_state = RenderState::from_settings(&self.settings);
        self.model.refresh_placeholder(&self.settings);
        self.start_model_load();
    }

    fn teardown(&mut self) {
        self.close_requested = true;
        self.controls.cancel_pending();
        self.part_schedule.cancel();
        self.model.cancel_pending();
    }

    fn frame(&mut self) {
        let frame_start = Instant::now();

        if self.model.poll() {
            self.part_schedule.schedule();
        }
        self.resolve_parts_if_due();

        let mut action = PanelAction::default();
        let mut repaint_now = false;
        if let (Some(window), Some(egui)) = (self.window.clone(), self.egui.as_mut()) {
            let controls = &mut self.controls;
            let catalog = &self.catalog;
            let model_error = self.model.error().map(str::to_string);
            let ui_frame = egui.run_ui(&window, |ctx| {
                action = controls.ui(ctx, catalog, model_error.as_deref(), frame_start);
            });
            repaint_now = ui_frame.repaint_delay == Duration::ZERO;
        }

        if action.retry {
            self.model.retry();
        }
        if action.reset {
            self.reset_session();
        }
        if action.export {
            self.handle_export();
        }

        if let Some(patch) = self.controls.poll(frame_start) {
            self.apply_patch(patch);
        }

        if let Background::Environment { file, .. } = &self.render_state.background {
            self.environment.ensure_loaded(file);
        }

        if let Some(backend) = &mut self.backend {
            backend.submit(&self.render_state, self.model.scene());
        }

        self.timing
            .update(self.window.as_ref().map(|w| w.as_ref()), frame_start);
        if repaint_now {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(1280u32, 720u32))
            .with_resizable(true);

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .expect("Failed to create window"),
        );

        self.egui = Some(EguiHost::new(&window));
        self.update_target_frame_duration(&window);
        self.window = Some(window);
        self.start_model_load();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(window), Some(egui)) = (self.window.clone(), self.egui.as_mut()) {
            if egui.on_window_event(&window, &event) {
                window.request_redraw();
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.teardown();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    self.teardown();
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(_) | WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::RedrawRequested => {
                self.frame();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.close_requested {
            return;
        }
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("Look Dev - GLB lighting tester");
    log::info!("   Press ESC or close window to exit");

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new();
    event_loop.run_app(&mut app).expect("Event loop error");

    log::info!("Session ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{rig_position, Background, ModelState};
    use crate::scene::SceneGraph;
    use crate::settings::BackgroundType;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Submission {
        frames: usize,
        last_source: String,
        last_shadows: bool,
    }

    struct RecordingBackend(Rc<RefCell<Submission>>);

    impl RenderBackend for RecordingBackend {
        fn submit(&mut self, state: &RenderState, scene: &SceneGraph) {
            let mut log = self.0.borrow_mut();
            log.frames += 1;
            log.last_source = scene.source.clone();
            log.last_shadows = state.contact_shadows.is_some();
        }
    }

    #[test]
    fn frames_submit_current_state_and_scene() {
        let log = Rc::new(RefCell::new(Submission::default()));
        let mut app = App::new();
        app.set_backend(Box::new(RecordingBackend(Rc::clone(&log))));

        app.frame();
        app.apply_patch(SettingsPatch {
            enable_shadows: Some(false),
            ..Default::default()
        });
        app.frame();

        let log = log.borrow();
        assert_eq!(log.frames, 2);
        // Nothing loaded yet, so the placeholder is what gets drawn.
        assert_eq!(log.last_source, "placeholder");
        assert!(!log.last_shadows);
    }

    #[test]
    fn patch_application_updates_render_state() {
        let mut app = App::new();
        app.apply_patch(SettingsPatch {
            directional_light_angle: Some(90.0),
            background_type: Some(BackgroundType::Studio),
            ..Default::default()
        });

        assert_eq!(app.settings.directional_light_angle, 90.0);
        assert_eq!(app.render_state.directional.position, rig_position(90.0));
        assert!(matches!(
            app.render_state.background,
            Background::Studio { .. }
        ));
    }

    #[test]
    fn part_color_patch_schedules_a_resolution_pass() {
        let mut app = App::new();
        assert!(!app.part_schedule.take_due());
        app.apply_patch(SettingsPatch {
            part2_color: Some("#123456".to_string()),
            ..Default::default()
        });
        assert!(app.part_schedule.take_due());
    }

    #[test]
    fn model_switch_restarts_loading_and_defers_part_pass() {
        let mut app = App::new();
        app.apply_patch(SettingsPatch {
            selected_model: Some("2-part.glb".to_string()),
            part1_color: Some("#ff0000".to_string()),
            ..Default::default()
        });

        assert_eq!(app.settings.selected_model, "2-part.glb");
        assert!(matches!(app.model.state(), ModelState::Loading));
        // The pass waits for the new load; nothing is due yet.
        assert!(!app.part_schedule.take_due());
    }

    #[test]
    fn reset_restores_defaults_everywhere() {
        let mut app = App::new();
        app.apply_patch(SettingsPatch {
            roughness: Some(0.9),
            background_type: Some(BackgroundType::Color),
            ..Default::default()
        });
        app.reset_session();

        assert_eq!(app.settings, Settings::defaults());
        assert!(matches!(
            app.render_state.background,
            Background::Environment { .. }
        ));
        assert!(matches!(app.model.state(), ModelState::Loading));
    }

    #[test]
    fn hdri_frames_touch_the_environment_cache() {
        let mut app = App::new();
        assert!(matches!(
            app.render_state.background,
            Background::Environment { .. }
        ));
        app.frame();
        // The packaged panorama is absent in test runs; the frame carries on
        // with the decode outcome latched instead of retrying or bailing.
        assert!(app.environment.error().is_some());
        app.frame();
        assert!(app.environment.error().is_some());
    }

    #[test]
    fn placeholder_tracks_configured_colors() {
        let mut app = App::new();
        app.apply_patch(SettingsPatch {
            part1_color: Some("#ff0000".to_string()),
            ..Default::default()
        });
        let scene = app.model.scene();
        assert!(crate::scene::is_placeholder(scene));

        let part1 = scene
            .nodes()
            .iter()
            .find(|node| node.name == "Part1002")
            .expect("placeholder keeps its part nodes");
        let crate::scene::NodeKind::Mesh { binding, .. } = &part1.kind else {
            panic!("placeholder part should be a mesh");
        };
        let handle = binding.handles().next().expect("one material");
        let color = handle.borrow().base_color;
        assert!(color[0] > 0.99 && color[1] < 0.01 && color[2] < 0.01);
    }
}
