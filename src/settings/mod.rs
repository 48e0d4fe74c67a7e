//! The settings record is the single source of truth for every tunable
//! lighting/material/model parameter. It is created once from defaults,
//! mutated only through patch merges, and read by the render application and
//! the export serializer.

pub mod color;

use crate::model::PartId;

/// Background rendering mode. Mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundType {
    Hdri,
    Color,
    Studio,
}

impl BackgroundType {
    pub const ALL: [BackgroundType; 3] = [
        BackgroundType::Hdri,
        BackgroundType::Color,
        BackgroundType::Studio,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BackgroundType::Hdri => "HDRI Environment",
            BackgroundType::Color => "Solid Color",
            BackgroundType::Studio => "Studio White",
        }
    }
}

/// Complete, always-populated parameter record. Field names serialize in
/// camelCase so exports stay portable to the production configurator.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub hdri_intensity: f32,
    pub directional_light_intensity: f32,
    pub directional_light_angle: f32,
    pub ambient_light_color: String,
    pub ambient_light_intensity: f32,
    pub environment_rotation: f32,
    pub roughness: f32,
    pub metalness: f32,
    pub background_type: BackgroundType,
    pub background_color: String,
    pub enable_shadows: bool,
    pub shadow_opacity: f32,
    pub selected_model: String,
    pub part1_color: String,
    pub part2_color: String,
    pub part3_color: String,
    pub part4_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Settings {
    /// The fixed session-start record. Covers every field regardless of the
    /// selected model so a variant switch never observes a hole.
    pub fn defaults() -> Self {
        Self {
            hdri_intensity: 1.0,
            directional_light_intensity: 1.0,
            directional_light_angle: 45.0,
            ambient_light_color: "#ffffff".to_string(),
            ambient_light_intensity: 0.5,
            environment_rotation: 0.0,
            roughness: 0.5,
            metalness: 0.0,
            background_type: BackgroundType::Hdri,
            background_color: "#2a2a2a".to_string(),
            enable_shadows: true,
            shadow_opacity: 0.3,
            selected_model: "4-part.glb".to_string(),
            part1_color: "#666666".to_string(),
            part2_color: "#aaaaaa".to_string(),
            part3_color: "#888888".to_string(),
            part4_color: "#999999".to_string(),
        }
    }

    /// Structural merge: every field present in the patch wins, everything
    /// else is retained. Pure; never drops fields.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        let mut out = self.clone();
        macro_rules! take {
            ($field:ident) => {
                if let Some(value) = &patch.$field {
                    out.$field = value.clone();
                }
            };
        }
        take!(hdri_intensity);
        take!(directional_light_intensity);
        take!(directional_light_angle);
        take!(ambient_light_color);
        take!(ambient_light_intensity);
        take!(environment_rotation);
        take!(roughness);
        take!(metalness);
        take!(background_type);
        take!(background_color);
        take!(enable_shadows);
        take!(shadow_opacity);
        take!(selected_model);
        take!(part1_color);
        take!(part2_color);
        take!(part3_color);
        take!(part4_color);
        out
    }

    /// Tolerant merge from untyped data (e.g. the `settings` field of a
    /// previously exported file). A malformed shape is logged and treated as
    /// a no-op; the current record stays valid.
    pub fn merged_value(&self, value: serde_json::Value) -> Self {
        match serde_json::from_value::<SettingsPatch>(value) {
            Ok(patch) => self.merged(&patch.sanitized()),
            Err(err) => {
                log::warn!("Discarding malformed settings update: {err}");
                self.clone()
            }
        }
    }

    /// Configured color for a part slot.
    pub fn part_color(&self, part: PartId) -> &str {
        match part {
            PartId::Part1 => &self.part1_color,
            PartId::Part2 => &self.part2_color,
            PartId::Part3 => &self.part3_color,
            PartId::Part4 => &self.part4_color,
        }
    }
}

/// Partial update produced by the control panel (or an imported file). Every
/// field is optional; absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub hdri_intensity: Option<f32>,
    pub directional_light_intensity: Option<f32>,
    pub directional_light_angle: Option<f32>,
    pub ambient_light_color: Option<String>,
    pub ambient_light_intensity: Option<f32>,
    pub environment_rotation: Option<f32>,
    pub roughness: Option<f32>,
    pub metalness: Option<f32>,
    pub background_type: Option<BackgroundType>,
    pub background_color: Option<String>,
    pub enable_shadows: Option<bool>,
    pub shadow_opacity: Option<f32>,
    pub selected_model: Option<String>,
    pub part1_color: Option<String>,
    pub part2_color: Option<String>,
    pub part3_color: Option<String>,
    pub part4_color: Option<String>,
}

impl SettingsPatch {
    /// Field-by-field difference: the patch that turns `old` into `new`.
    pub fn diff(old: &Settings, new: &Settings) -> Self {
        let mut patch = Self::default();
        macro_rules! diff {
            ($field:ident) => {
                if old.$field != new.$field {
                    patch.$field = Some(new.$field.clone());
                }
            };
        }
        diff!(hdri_intensity);
        diff!(directional_light_intensity);
        diff!(directional_light_angle);
        diff!(ambient_light_color);
        diff!(ambient_light_intensity);
        diff!(environment_rotation);
        diff!(roughness);
        diff!(metalness);
        diff!(background_type);
        diff!(background_color);
        diff!(enable_shadows);
        diff!(shadow_opacity);
        diff!(selected_model);
        diff!(part1_color);
        diff!(part2_color);
        diff!(part3_color);
        diff!(part4_color);
        patch
    }

    /// Fold a newer patch over this one; for coalescing, the latest value of
    /// each field wins.
    pub fn merge_from(&mut self, newer: Self) {
        macro_rules! fold {
            ($field:ident) => {
                if newer.$field.is_some() {
                    self.$field = newer.$field;
                }
            };
        }
        fold!(hdri_intensity);
        fold!(directional_light_intensity);
        fold!(directional_light_angle);
        fold!(ambient_light_color);
        fold!(ambient_light_intensity);
        fold!(environment_rotation);
        fold!(roughness);
        fold!(metalness);
        fold!(background_type);
        fold!(background_color);
        fold!(enable_shadows);
        fold!(shadow_opacity);
        fold!(selected_model);
        fold!(part1_color);
        fold!(part2_color);
        fold!(part3_color);
        fold!(part4_color);
    }

    /// Drop non-finite numbers and syntactically invalid colors so bad input
    /// never reaches the renderer. Dropped fields keep their previous applied
    /// value by virtue of being absent from the merge.
    pub fn sanitized(mut self) -> Self {
        macro_rules! finite {
            ($field:ident) => {
                if let Some(value) = self.$field {
                    if !value.is_finite() {
                        log::warn!(
                            "Ignoring non-finite value {value:?} for {}",
                            stringify!($field)
                        );
                        self.$field = None;
                    }
                }
            };
        }
        finite!(hdri_intensity);
        finite!(directional_light_intensity);
        finite!(directional_light_angle);
        finite!(ambient_light_intensity);
        finite!(environment_rotation);
        finite!(roughness);
        finite!(metalness);
        finite!(shadow_opacity);

        macro_rules! valid_color {
            ($field:ident) => {
                if let Some(value) = &self.$field {
                    // Empty part colors are legal ("leave this slot alone").
                    if !value.is_empty() && !color::is_valid_hex(value) {
                        log::warn!("Ignoring unparsable color {value:?} for {}", stringify!($field));
                        self.$field = None;
                    }
                }
            };
        }
        valid_color!(ambient_light_color);
        valid_color!(background_color);
        valid_color!(part1_color);
        valid_color!(part2_color);
        valid_color!(part3_color);
        valid_color!(part4_color);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when the patch touches a field consumed by the part-color
    /// resolution pass (so a re-traversal needs scheduling).
    pub fn touches_part_resolution(&self) -> bool {
        self.roughness.is_some()
            || self.metalness.is_some()
            || self.selected_model.is_some()
            || self.part1_color.is_some()
            || self.part2_color.is_some()
            || self.part3_color.is_some()
            || self.part4_color.is_some()
    }
}
