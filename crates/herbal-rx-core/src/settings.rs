//! Persisted application settings.
//!
//! Settings live in a small JSON document next to the database. Loading is
//! lenient: a missing file, an unreadable file or a malformed key falls back
//! to the defaults for whatever could not be read. Saving always writes the
//! complete document.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::layout::{LayoutParameters, WrapWidths, DEFAULT_MAX_PRESCRIPTION_LINES};

/// Default settings file name.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Folder receipts are written to unless configured otherwise.
pub const DEFAULT_OUTPUT_DIR: &str = "处方记录";

/// Settings errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Clinic-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Doctor stamped on new records
    pub default_doctor: String,
    /// Doctor phone stamped on new records
    pub default_phone: String,
    pub smart_completion_enabled: bool,

    /// Base font size in points
    pub font_size: f64,
    /// Line spacing coefficient (recommended 0.6-1.2)
    pub line_spacing: f64,
    /// Safety multiplier (recommended 1.3-2.5)
    pub safety_margin: f64,
    /// Page margin in cm (recommended 0.15-0.25)
    pub margin_size: f64,
    /// Empty-space multiplier; switches sizing to the empty-ratio strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_ratio: Option<f64>,
    pub wrap_widths: WrapWidths,
    pub max_prescription_lines: usize,

    /// Receipt heading
    pub clinic_name: String,
    /// Receipt subtitle
    pub receipt_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_license: Option<String>,

    /// Where rendered receipts are written
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let layout = LayoutParameters::default();
        Self {
            default_doctor: String::new(),
            default_phone: String::new(),
            smart_completion_enabled: true,
            font_size: layout.font_size,
            line_spacing: layout.line_spacing,
            safety_margin: layout.safety_margin,
            margin_size: layout.margin_size,
            empty_ratio: None,
            wrap_widths: WrapWidths::default(),
            max_prescription_lines: DEFAULT_MAX_PRESCRIPTION_LINES,
            clinic_name: "中医诊所".into(),
            receipt_title: "中医干预中药处方".into(),
            clinic_address: None,
            clinic_phone: None,
            clinic_license: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Settings {
    /// Load settings from `path`, substituting defaults for anything missing
    /// or malformed. Never fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Self::default();
        }

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read settings: {e}");
                return Self::default();
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Self::from_map(&map),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "Settings document is not an object");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to parse settings: {e}");
                Self::default()
            }
        }
    }

    /// Build settings key by key from a parsed document.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut s = Self::default();

        if let Some(v) = read_key(map, "default_doctor") {
            s.default_doctor = v;
        }
        if let Some(v) = read_key(map, "default_phone") {
            s.default_phone = v;
        }
        if let Some(v) = read_key(map, "smart_completion_enabled") {
            s.smart_completion_enabled = v;
        }
        if let Some(v) = read_key(map, "font_size") {
            s.font_size = v;
        }
        if let Some(v) = read_key(map, "line_spacing") {
            s.line_spacing = v;
        }
        if let Some(v) = read_key(map, "safety_margin") {
            s.safety_margin = v;
        }
        if let Some(v) = read_key(map, "margin_size") {
            s.margin_size = v;
        }
        s.empty_ratio = read_key(map, "empty_ratio");
        if let Some(v) = read_key(map, "wrap_widths") {
            s.wrap_widths = v;
        }
        if let Some(v) = read_key(map, "max_prescription_lines") {
            s.max_prescription_lines = v;
        }
        if let Some(v) = read_key(map, "clinic_name") {
            s.clinic_name = v;
        }
        if let Some(v) = read_key(map, "receipt_title") {
            s.receipt_title = v;
        }
        s.clinic_address = read_key(map, "clinic_address");
        s.clinic_phone = read_key(map, "clinic_phone");
        s.clinic_license = read_key(map, "clinic_license");
        if let Some(v) = read_key(map, "output_dir") {
            s.output_dir = v;
        }

        s
    }

    /// Write the full settings document to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SettingsResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Immutable layout parameters for one estimate.
    pub fn layout_parameters(&self) -> LayoutParameters {
        LayoutParameters {
            font_size: self.font_size,
            line_spacing: self.line_spacing,
            safety_margin: self.safety_margin,
            margin_size: self.margin_size,
            empty_ratio: self.empty_ratio,
            wrap: self.wrap_widths,
            max_prescription_lines: self.max_prescription_lines,
        }
    }

    /// Overwrite the compression parameters with a preset.
    pub fn apply_preset(&mut self, preset: LayoutPreset) {
        let (font_size, line_spacing, safety_margin, margin_size) = preset.values();
        self.font_size = font_size;
        self.line_spacing = line_spacing;
        self.safety_margin = safety_margin;
        self.margin_size = margin_size;
    }

    /// Configured doctor, if any.
    pub fn doctor(&self) -> Option<&str> {
        non_empty(&self.default_doctor)
    }

    /// Configured doctor phone, if any.
    pub fn doctor_phone(&self) -> Option<&str> {
        non_empty(&self.default_phone)
    }
}

/// Named compression presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPreset {
    /// Most compact page
    Minimal,
    Standard,
    /// Most generous page
    Loose,
}

impl LayoutPreset {
    /// (font size, line spacing, safety margin, margin size)
    pub fn values(self) -> (f64, f64, f64, f64) {
        match self {
            LayoutPreset::Minimal => (7.0, 0.7, 1.8, 0.15),
            LayoutPreset::Standard => (9.0, 0.85, 1.5, 0.2),
            LayoutPreset::Loose => (10.0, 1.0, 1.3, 0.25),
        }
    }
}

impl FromStr for LayoutPreset {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" => Ok(LayoutPreset::Minimal),
            "standard" => Ok(LayoutPreset::Standard),
            "loose" => Ok(LayoutPreset::Loose),
            _ => Err(SettingsError::UnknownPreset(s.to_string())),
        }
    }
}

fn read_key<T: DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Option<T> {
    let value = map.get(key).filter(|v| !v.is_null())?;
    match T::deserialize(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, "Ignoring malformed setting: {e}");
            None
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutStrategy;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("absent.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_malformed_keys_fall_back_individually() {
        let settings = Settings::from_map(&as_map(json!({
            "default_doctor": "李医生",
            "font_size": "large",
            "line_spacing": 1.1,
            "safety_margin": null,
            "empty_ratio": "x"
        })));

        assert_eq!(settings.default_doctor, "李医生");
        assert_eq!(settings.font_size, 9.0);
        assert!((settings.line_spacing - 1.1).abs() < 1e-9);
        assert_eq!(settings.safety_margin, 1.5);
        assert_eq!(settings.empty_ratio, None);
    }

    #[test]
    fn test_integer_font_size_is_accepted() {
        let settings = Settings::from_map(&as_map(json!({ "font_size": 8 })));
        assert_eq!(settings.font_size, 8.0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.default_doctor = "李医生".into();
        settings.empty_ratio = Some(3.5);
        settings.clinic_address = Some("龙华路1号".into());
        settings.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("李医生"), "non-ASCII text is written as-is");

        let loaded = Settings::load(&path);
        assert_eq!(loaded.default_doctor, "李医生");
        assert_eq!(loaded.clinic_address.as_deref(), Some("龙华路1号"));
        assert_eq!(loaded.clinic_phone, None);
        assert_eq!(loaded.output_dir, settings.output_dir);
        assert!((loaded.line_spacing - settings.line_spacing).abs() < 1e-9);
        assert!(matches!(
            loaded.layout_parameters().strategy(),
            LayoutStrategy::EmptyRatio(r) if (r - 3.5).abs() < 1e-9
        ));
    }

    #[test]
    fn test_presets() {
        let mut settings = Settings::default();
        settings.apply_preset("loose".parse().unwrap());
        assert_eq!(settings.font_size, 10.0);
        assert_eq!(settings.line_spacing, 1.0);
        assert_eq!(settings.safety_margin, 1.3);
        assert_eq!(settings.margin_size, 0.25);

        settings.apply_preset(LayoutPreset::Minimal);
        assert_eq!(settings.font_size, 7.0);
        assert_eq!(settings.margin_size, 0.15);

        assert!("huge".parse::<LayoutPreset>().is_err());
    }

    #[test]
    fn test_doctor_presence() {
        let mut settings = Settings::default();
        assert_eq!(settings.doctor(), None);
        settings.default_doctor = " 李医生 ".into();
        assert_eq!(settings.doctor(), Some("李医生"));
    }
}
