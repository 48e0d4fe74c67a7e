//! Control panel and change debouncing. The panel edits a draft copy of the
//! settings; edits are diffed into patches and held in a debouncer so a slider
//! drag produces one coalesced update instead of a flood.

use std::time::{Duration, Instant};

use crate::model::{ModelCatalog, PartId};
use crate::settings::color;
use crate::settings::{BackgroundType, Settings, SettingsPatch};

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Holds the pending patch until the input stream has been quiet for the
/// debounce window. Time is injected so callers (and tests) own the clock.
pub struct Debouncer {
    pending: Option<SettingsPatch>,
    deadline: Option<Instant>,
    window: Duration,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: None,
            deadline: None,
            window,
        }
    }

    /// Fold a new patch into the pending one and re-arm the timer. The latest
    /// value of each touched field wins.
    pub fn push(&mut self, patch: SettingsPatch, now: Instant) {
        if patch.is_empty() {
            return;
        }
        match &mut self.pending {
            Some(pending) => pending.merge_from(patch),
            None => self.pending = Some(patch),
        }
        self.deadline = Some(now + self.window);
    }

    /// Returns the coalesced patch once the window has elapsed with no
    /// further pushes.
    pub fn poll(&mut self, now: Instant) -> Option<SettingsPatch> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        self.pending.take()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.deadline = None;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Button presses that bypass the debouncer and take effect immediately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelAction {
    pub export: bool,
    pub reset: bool,
    pub retry: bool,
}

pub struct ControlsPanel {
    draft: Settings,
    status: String,
    debounce: Debouncer,
}

impl ControlsPanel {
    pub fn new(settings: &Settings) -> Self {
        Self {
            draft: settings.clone(),
            status: String::new(),
            debounce: Debouncer::new(DEBOUNCE_WINDOW),
        }
    }

    /// Replace the draft wholesale (reset, or an imported settings file) and
    /// drop any half-typed edits.
    pub fn sync(&mut self, settings: &Settings) {
        self.draft = settings.clone();
        self.debounce.cancel();
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Drains a settled patch, already sanitized.
    pub fn poll(&mut self, now: Instant) -> Option<SettingsPatch> {
        let patch = self.debounce.poll(now)?.sanitized();
        if patch.is_empty() {
            return None;
        }
        Some(patch)
    }

    pub fn cancel_pending(&mut self) {
        self.debounce.cancel();
    }

    /// Builds the side panel for one frame. Edits land in the draft; the
    /// frame-over-frame draft diff is pushed into the debouncer.
    pub fn ui(
        &mut self,
        ctx: &egui::Context,
        catalog: &ModelCatalog,
        model_error: Option<&str>,
        now: Instant,
    ) -> PanelAction {
        let before = self.draft.clone();
        let mut action = PanelAction::default();

        egui::SidePanel::right("lookdev_controls")
            .default_width(300.0)
            .show(ctx, |ui| {
                ui.heading("Look Dev Controls");
                ui.separator();

                if let Some(error) = model_error {
                    ui.colored_label(egui::Color32::LIGHT_RED, format!("Model load failed: {error}"));
                    ui.label("Showing placeholder scene.");
                    if ui.button("Retry load").clicked() {
                        action.retry = true;
                    }
                    ui.separator();
                }

                egui::CollapsingHeader::new("Model Selection")
                    .default_open(true)
                    .show(ui, |ui| {
                        let current_label = catalog
                            .get(&self.draft.selected_model)
                            .map(|v| v.label.clone())
                            .unwrap_or_else(|| self.draft.selected_model.clone());
                        egui::ComboBox::from_id_salt("model_selector")
                            .selected_text(current_label)
                            .show_ui(ui, |ui| {
                                for variant in catalog.variants() {
                                    ui.selectable_value(
                                        &mut self.draft.selected_model,
                                        variant.id.clone(),
                                        &variant.label,
                                    );
                                }
                            });
                    });

                egui::CollapsingHeader::new("Part Colors")
                    .default_open(true)
                    .show(ui, |ui| {
                        let variant = catalog.get_or_fallback(&self.draft.selected_model);
                        for slot in &variant.part_slots {
                            hex_color_row(ui, slot.slot.label(), part_color_mut(&mut self.draft, slot.slot));
                        }
                    });

                egui::CollapsingHeader::new("Environment & Lighting")
                    .default_open(true)
                    .show(ui, |ui| {
                        ui.add(
                            egui::Slider::new(&mut self.draft.hdri_intensity, 0.0..=3.0)
                                .step_by(0.1)
                                .text("HDRI intensity"),
                        );
                        ui.add(
                            egui::Slider::new(&mut self.draft.environment_rotation, 0.0..=360.0)
                                .step_by(1.0)
                                .text("Environment rotation"),
                        );
                        ui.add(
                            egui::Slider::new(&mut self.draft.directional_light_intensity, 0.0..=5.0)
                                .step_by(0.1)
                                .text("Directional intensity"),
                        );
                        ui.add(
                            egui::Slider::new(&mut self.draft.directional_light_angle, 0.0..=360.0)
                                .step_by(5.0)
                                .text("Directional angle"),
                        );
                        hex_color_row(ui, "Ambient color", &mut self.draft.ambient_light_color);
                        ui.add(
                            egui::Slider::new(&mut self.draft.ambient_light_intensity, 0.0..=2.0)
                                .step_by(0.1)
                                .text("Ambient intensity"),
                        );
                    });

                egui::CollapsingHeader::new("Material")
                    .default_open(true)
                    .show(ui, |ui| {
                        ui.add(
                            egui::Slider::new(&mut self.draft.roughness, 0.0..=1.0)
                                .step_by(0.01)
                                .text("Roughness"),
                        );
                        ui.add(
                            egui::Slider::new(&mut self.draft.metalness, 0.0..=1.0)
                                .step_by(0.01)
                                .text("Metalness"),
                        );
                    });

                egui::CollapsingHeader::new("Background & Shadows")
                    .default_open(true)
                    .show(ui, |ui| {
                        egui::ComboBox::from_id_salt("background_type")
                            .selected_text(self.draft.background_type.label())
                            .show_ui(ui, |ui| {
                                for mode in BackgroundType::ALL {
                                    ui.selectable_value(
                                        &mut self.draft.background_type,
                                        mode,
                                        mode.label(),
                                    );
                                }
                            });
                        if self.draft.background_type == BackgroundType::Color {
                            hex_color_row(ui, "Background color", &mut self.draft.background_color);
                        }
                        ui.checkbox(&mut self.draft.enable_shadows, "Contact shadows");
                        if self.draft.enable_shadows {
                            ui.add(
                                egui::Slider::new(&mut self.draft.shadow_opacity, 0.0..=1.0)
                                    .step_by(0.1)
                                    .text("Shadow opacity"),
                            );
                        }
                    });

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Export settings").clicked() {
                        action.export = true;
                    }
                    if ui.button("Reset").clicked() {
                        action.reset = true;
                    }
                });
                if !self.status.is_empty() {
                    ui.label(&self.status);
                }
            });

        let patch = SettingsPatch::diff(&before, &self.draft);
        if !patch.is_empty() {
            self.debounce.push(patch, now);
        }
        action
    }
}

fn part_color_mut(settings: &mut Settings, part: PartId) -> &mut String {
    match part {
        PartId::Part1 => &mut settings.part1_color,
        PartId::Part2 => &mut settings.part2_color,
        PartId::Part3 => &mut settings.part3_color,
        PartId::Part4 => &mut settings.part4_color,
    }
}

/// A labelled color swatch backed by a hex string. Unparsable strings show as
/// a neutral swatch and are left untouched until the picker changes them.
fn hex_color_row(ui: &mut egui::Ui, label: &str, hex: &mut String) {
    let parsed = color::parse_hex_bytes(hex);
    let mut rgb = parsed.map_or(egui::Color32::GRAY, |[r, g, b]| {
        egui::Color32::from_rgb(r, g, b)
    });
    ui.horizontal(|ui| {
        if ui.color_edit_button_srgba(&mut rgb).changed() {
            *hex = color::format_hex_bytes([rgb.r(), rgb.g(), rgb.b()]);
        }
        ui.label(label);
    });
}
