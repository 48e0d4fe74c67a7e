//! Render application: translates the settings record into the complete
//! render description the engine collaborator consumes, and keeps a visible
//! scene on screen at all times through the model-loading state machine.
//!
//! Numeric guards here are deliberately redundant with patch sanitization:
//! whatever reaches this layer, the composed state never carries NaN and an
//! invalid input retains the previously applied value.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use glam::Vec3;

use crate::assets::{self, AssetError, ModelImport};
use crate::scene::{placeholder_scene, SceneGraph};
use crate::settings::{color, BackgroundType, Settings};

/// Directional light rig: a horizontal circle of fixed radius at fixed height.
pub const LIGHT_RIG_RADIUS: f32 = 10.0;
pub const LIGHT_RIG_HEIGHT: f32 = 5.0;

const SHADOW_MAP_SIZE: u32 = 2048;
const SHADOW_FRUSTUM_EXTENT: f32 = 10.0;
const SHADOW_FAR: f32 = 50.0;

const HDRI_FILL_FACTOR: f32 = 0.5;
const STUDIO_BACKGROUND: [f32; 3] = [0.941, 0.941, 0.941]; // #f0f0f0

const AMBIENT_INTENSITY_MAX: f32 = 5.0;
const DIRECTIONAL_INTENSITY_MAX: f32 = 10.0;

const CAMERA_POSITION: Vec3 = Vec3::new(15.0, 10.0, 15.0);
const CAMERA_FOV_DEG: f32 = 50.0;
const ORBIT_MIN_DISTANCE: f32 = 5.0;
const ORBIT_MAX_DISTANCE: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowConfig {
    pub map_size: u32,
    pub frustum_extent: f32,
    pub far: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub intensity: f32,
    pub position: Vec3,
    pub cast_shadows: bool,
    pub shadow: ShadowConfig,
}

/// Mutually exclusive background modes.
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// Environment panorama drives both backdrop and ambient fill.
    Environment { file: PathBuf, fill_intensity: f32 },
    /// Built-in neutral preset over a flat light gray backdrop.
    Studio { color: [f32; 3], fill_intensity: f32 },
    /// Flat color, no environment image.
    Flat { color: [f32; 3] },
}

/// Fixed viewing rig: the camera start pose and the orbit distance bounds.
/// Not settings-driven; part of the complete description the engine receives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    pub position: Vec3,
    pub fov_deg: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            position: CAMERA_POSITION,
            fov_deg: CAMERA_FOV_DEG,
            min_distance: ORBIT_MIN_DISTANCE,
            max_distance: ORBIT_MAX_DISTANCE,
        }
    }
}

/// Soft contact-shadow layer under the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactShadows {
    pub opacity: f32,
    pub scale: f32,
    pub blur: f32,
    pub far: f32,
    pub resolution: u32,
}

/// The full, never-null render description. Rebuilt in place on every
/// render-affecting settings delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub camera: CameraRig,
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
    pub background: Background,
    pub contact_shadows: Option<ContactShadows>,
}

impl RenderState {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut state = Self {
            camera: CameraRig::default(),
            ambient: AmbientLight {
                color: [1.0, 1.0, 1.0],
                intensity: 0.5,
            },
            directional: DirectionalLight {
                intensity: 1.0,
                position: rig_position(45.0),
                cast_shadows: true,
                shadow: ShadowConfig {
                    map_size: SHADOW_MAP_SIZE,
                    frustum_extent: SHADOW_FRUSTUM_EXTENT,
                    far: SHADOW_FAR,
                },
            },
            background: Background::Flat { color: [0.0; 3] },
            contact_shadows: None,
        };
        state.apply(settings);
        state
    }

    /// Apply every non-part-color parameter. Invalid numerics are ignored
    /// (previous applied value retained); invalid colors fall back the same way.
    pub fn apply(&mut self, settings: &Settings) {
        if let Some(rgb) = color::parse_hex(&settings.ambient_light_color) {
            self.ambient.color = rgb;
        } else {
            log::warn!(
                "Keeping previous ambient color: unparsable {:?}",
                settings.ambient_light_color
            );
        }
        apply_clamped(
            &mut self.ambient.intensity,
            settings.ambient_light_intensity,
            AMBIENT_INTENSITY_MAX,
            "ambient intensity",
        );
        apply_clamped(
            &mut self.directional.intensity,
            settings.directional_light_intensity,
            DIRECTIONAL_INTENSITY_MAX,
            "directional intensity",
        );
        if settings.directional_light_angle.is_finite() {
            self.directional.position = rig_position(settings.directional_light_angle);
        } else {
            log::warn!("Keeping previous light position: non-finite angle");
        }
        self.directional.cast_shadows = settings.enable_shadows;

        self.apply_background(settings);

        self.contact_shadows = if settings.enable_shadows {
            let mut opacity = settings.shadow_opacity;
            if !opacity.is_finite() {
                opacity = self
                    .contact_shadows
                    .as_ref()
                    .map(|cs| cs.opacity)
                    .unwrap_or(0.3);
            }
            Some(ContactShadows {
                opacity: opacity.clamp(0.0, 1.0),
                scale: 20.0,
                blur: 1.0,
                far: 20.0,
                resolution: 256,
            })
        } else {
            None
        };
    }

    fn apply_background(&mut self, settings: &Settings) {
        let mut fill = settings.hdri_intensity;
        if !fill.is_finite() {
            fill = match &self.background {
                Background::Environment { fill_intensity, .. }
                | Background::Studio { fill_intensity, .. } => *fill_intensity / HDRI_FILL_FACTOR,
                Background::Flat { .. } => 1.0,
            };
            log::warn!("Keeping previous environment fill: non-finite intensity");
        }
        self.background = match settings.background_type {
            BackgroundType::Hdri => Background::Environment {
                file: assets::hdri_path(),
                fill_intensity: fill * HDRI_FILL_FACTOR,
            },
            BackgroundType::Studio => Background::Studio {
                color: STUDIO_BACKGROUND,
                fill_intensity: fill * HDRI_FILL_FACTOR,
            },
            BackgroundType::Color => Background::Flat {
                color: color::parse_hex(&settings.background_color).unwrap_or_else(|| {
                    match &self.background {
                        Background::Flat { color } => *color,
                        _ => [0.164, 0.164, 0.164], // #2a2a2a
                    }
                }),
            },
        };
    }
}

fn apply_clamped(target: &mut f32, value: f32, max: f32, label: &str) {
    if value.is_finite() {
        *target = value.clamp(0.0, max);
    } else {
        log::warn!("Keeping previous {label}: non-finite input");
    }
}

/// `(sin(angle) * R, H, cos(angle) * R)` on the light rig circle.
pub fn rig_position(angle_deg: f32) -> Vec3 {
    let angle = angle_deg.to_radians();
    Vec3::new(
        angle.sin() * LIGHT_RIG_RADIUS,
        LIGHT_RIG_HEIGHT,
        angle.cos() * LIGHT_RIG_RADIUS,
    )
}

/// Decoded environment panorama, cached across Hdri activations. A decode
/// failure is latched so the frame loop does not retry every frame.
#[derive(Default)]
pub struct EnvironmentCache {
    decoded: Option<Result<assets::HdriImage, String>>,
}

impl EnvironmentCache {
    /// Decode the panorama on first use; later calls serve the cached result.
    pub fn ensure_loaded(&mut self, path: &Path) -> Option<&assets::HdriImage> {
        if self.decoded.is_none() {
            self.decoded = Some(match assets::load_hdri(path) {
                Ok(image) => {
                    log::info!(
                        "Environment panorama ready: {}x{}, mean luminance {:.3}",
                        image.width,
                        image.height,
                        image.mean_luminance()
                    );
                    Ok(image)
                }
                Err(err) => {
                    log::warn!("Environment panorama unavailable: {err}");
                    Err(err.to_string())
                }
            });
        }
        match self.decoded.as_ref() {
            Some(Ok(image)) => Some(image),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.decoded {
            Some(Err(message)) => Some(message),
            _ => None,
        }
    }
}

/// Engine seam: the collaborator that turns the composed description into
/// pixels. The harness itself ships no binding; tests use a recording impl.
pub trait RenderBackend {
    fn submit(&mut self, state: &RenderState, scene: &SceneGraph);
}

/// Model-loading lifecycle.
#[derive(Debug)]
pub enum ModelState {
    Loading,
    Loaded(SceneGraph),
    Failed(String),
}

struct PendingLoad {
    generation: u64,
    rx: mpsc::Receiver<Result<ModelImport, AssetError>>,
}

/// Owns the active model's load state and the always-available fallback.
/// Loads run on a worker thread; results are polled from the frame loop, so
/// the interaction loop never blocks. A superseded load's result is discarded
/// by generation check.
pub struct ModelHost {
    state: ModelState,
    placeholder: SceneGraph,
    pending: Option<PendingLoad>,
    generation: u64,
    current_path: Option<PathBuf>,
}

impl ModelHost {
    pub fn new(settings: &Settings) -> Self {
        Self {
            state: ModelState::Loading,
            placeholder: placeholder_scene(settings),
            pending: None,
            generation: 0,
            current_path: None,
        }
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    /// Load failure cause, if the machine is in the Failed state.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ModelState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// The scene to draw right now: the real asset when loaded, otherwise
    /// the placeholder (also while Failed, alongside the error notice).
    pub fn scene(&self) -> &SceneGraph {
        match &self.state {
            ModelState::Loaded(graph) => graph,
            _ => &self.placeholder,
        }
    }

    /// Mutable access to the loaded graph for part-color resolution. The
    /// placeholder is not resolved in place; it is rebuilt from settings.
    pub fn loaded_scene_mut(&mut self) -> Option<&mut SceneGraph> {
        match &mut self.state {
            ModelState::Loaded(graph) => Some(graph),
            _ => None,
        }
    }

    /// Start (or restart) loading the given asset; enters Loading and shows
    /// the placeholder until the worker reports back.
    pub fn begin_load(&mut self, path: PathBuf) {
        self.generation += 1;
        let generation = self.generation;
        log::info!("Loading model {} (generation {generation})", path.display());

        let (tx, rx) = mpsc::channel();
        let worker_path = path.clone();
        thread::spawn(move || {
            let result = assets::load_model(&worker_path);
            // Receiver may be gone if the load was superseded; that is fine.
            let _ = tx.send(result);
        });

        self.current_path = Some(path);
        self.state = ModelState::Loading;
        self.pending = Some(PendingLoad { generation, rx });
    }

    /// Re-attempt the current model after a failure.
    pub fn retry(&mut self) {
        if let Some(path) = self.current_path.clone() {
            self.begin_load(path);
        }
    }

    /// Drive the state machine from the frame loop. Returns true when a load
    /// just completed successfully (the caller schedules part resolution).
    pub fn poll(&mut self) -> bool {
        let (generation, received) = match &self.pending {
            Some(pending) => (pending.generation, pending.rx.try_recv()),
            None => return false,
        };
        let outcome = match received {
            Ok(outcome) => outcome,
            Err(mpsc::TryRecvError::Empty) => return false,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.pending = None;
                if generation == self.generation {
                    log::warn!("Model loader worker disappeared before reporting a result");
                    self.state = ModelState::Failed("model loader worker disappeared".to_string());
                }
                return false;
            }
        };
        self.pending = None;
        if generation != self.generation {
            log::debug!("Discarding stale model load (generation {generation})");
            return false;
        }
        match outcome {
            Ok(import) => {
                let graph = import.into_scene();
                log::info!(
                    "Model ready: {} ({} drawable nodes)",
                    graph.source,
                    graph.mesh_count()
                );
                self.state = ModelState::Loaded(graph);
                true
            }
            Err(err) => {
                log::warn!("Model load failed: {err}");
                self.state = ModelState::Failed(err.to_string());
                false
            }
        }
    }

    /// Rebuild the fallback geometry with the currently configured colors so
    /// the panel stays meaningful before the real asset arrives.
    pub fn refresh_placeholder(&mut self, settings: &Settings) {
        self.placeholder = placeholder_scene(settings);
    }

    /// Teardown/reset: drop any in-flight result on arrival.
    pub fn cancel_pending(&mut self) {
        self.generation += 1;
        self.pending = None;
    }
}

/// Single-slot animation-frame scheduling primitive: at most one part-color
/// application is pending, and scheduling again replaces it.
#[derive(Debug, Default)]
pub struct FrameSchedule {
    pending: bool,
}

impl FrameSchedule {
    pub fn schedule(&mut self) {
        self.pending = true;
    }

    /// Consume the pending slot at the frame boundary.
    pub fn take_due(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn cancel(&mut self) {
        self.pending = false;
    }
}
