//! Serializes the current session settings to a JSON document that a
//! downstream configurator can import.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ModelCatalog;
use crate::settings::Settings;

pub const EXPORT_VERSION: &str = "1.0.0";
pub const EXPORT_USAGE: &str = "Import these settings into your production configurator";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// The complete export payload. Field names are camelCase on the wire so the
/// file drops straight into web tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub timestamp: String,
    pub settings: Settings,
    pub metadata: ExportMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub version: String,
    pub description: String,
    pub usage: String,
    pub model_used: String,
    pub available_models: Vec<String>,
}

/// Builds the export record for the given settings snapshot. The timestamp is
/// injected so callers (and tests) control the clock.
pub fn build_export(
    settings: &Settings,
    catalog: &ModelCatalog,
    now: DateTime<Utc>,
) -> ExportRecord {
    let model_label = catalog
        .get(&settings.selected_model)
        .map(|variant| variant.label.clone())
        .unwrap_or_else(|| settings.selected_model.clone());
    ExportRecord {
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        settings: settings.clone(),
        metadata: ExportMetadata {
            version: EXPORT_VERSION.to_string(),
            description: format!("Lighting settings exported from look-dev session ({model_label})"),
            usage: EXPORT_USAGE.to_string(),
            model_used: settings.selected_model.clone(),
            available_models: catalog.ids(),
        },
    }
}

/// Suggested file name for the export, e.g.
/// `lighting-settings-4-part-1756500000000.json`.
pub fn export_file_name(settings: &Settings, now: DateTime<Utc>) -> String {
    let stem = settings
        .selected_model
        .strip_suffix(".glb")
        .unwrap_or(&settings.selected_model);
    format!("lighting-settings-{stem}-{}.json", now.timestamp_millis())
}

/// Writes the record as pretty-printed JSON.
pub fn write_export(record: &ExportRecord, path: &Path) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(record)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsPatch;
    use chrono::TimeZone;
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};

    static NONCE: AtomicU32 = AtomicU32::new(0);

    fn temp_path(name: &str) -> std::path::PathBuf {
        let nonce = NONCE.fetch_add(1, Ordering::Relaxed);
        env::temp_dir().join(format!(
            "lookdev-export-{}-{}-{}",
            std::process::id(),
            nonce,
            name
        ))
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 45).unwrap()
    }

    #[test]
    fn export_carries_settings_and_metadata() {
        let settings = Settings::defaults();
        let catalog = ModelCatalog::builtin();
        let record = build_export(&settings, &catalog, fixed_now());

        assert_eq!(record.metadata.version, EXPORT_VERSION);
        assert_eq!(record.metadata.model_used, "4-part.glb");
        assert!(record
            .metadata
            .available_models
            .contains(&"2-part.glb".to_string()));
        assert_eq!(record.timestamp, "2024-03-15T12:30:45.000Z");
    }

    #[test]
    fn exported_settings_reimport_unchanged() {
        let settings = Settings::defaults().merged(&SettingsPatch {
            hdri_intensity: Some(2.25),
            part1_color: Some("#ff8800".to_string()),
            selected_model: Some("2-part.glb".to_string()),
            ..SettingsPatch::default()
        });
        let catalog = ModelCatalog::builtin();
        let record = build_export(&settings, &catalog, fixed_now());

        let json = serde_json::to_value(&record).unwrap();
        let reimported = Settings::defaults().merged_value(json["settings"].clone());
        assert_eq!(reimported, settings);
    }

    #[test]
    fn hidden_part_slots_still_export_their_values() {
        // The 2-part variant only exposes part1/part2 controls, but the
        // stored part3/part4 colors still travel with the export.
        let settings = Settings::defaults().merged(&SettingsPatch {
            selected_model: Some("2-part.glb".to_string()),
            part3_color: Some("#010203".to_string()),
            ..SettingsPatch::default()
        });
        let record = build_export(&settings, &ModelCatalog::builtin(), fixed_now());
        assert_eq!(record.settings.part3_color, "#010203");
        assert_eq!(record.settings.part4_color, Settings::defaults().part4_color);
    }

    #[test]
    fn file_name_uses_model_stem_and_millis() {
        let mut settings = Settings::defaults();
        settings.selected_model = "2-part.glb".to_string();
        let now = fixed_now();
        let name = export_file_name(&settings, now);
        assert_eq!(
            name,
            format!("lighting-settings-2-part-{}.json", now.timestamp_millis())
        );
    }

    #[test]
    fn write_export_round_trips_through_disk() {
        let record = build_export(&Settings::defaults(), &ModelCatalog::builtin(), fixed_now());
        let path = temp_path("roundtrip.json");
        write_export(&record, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let back: ExportRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back.settings, record.settings);
        assert_eq!(back.metadata.usage, EXPORT_USAGE);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unknown_model_falls_back_to_raw_id_in_description() {
        let mut settings = Settings::defaults();
        settings.selected_model = "mystery.glb".to_string();
        let record = build_export(&settings, &ModelCatalog::builtin(), fixed_now());
        assert!(record.metadata.description.contains("mystery.glb"));
        assert_eq!(record.metadata.model_used, "mystery.glb");
    }
}
