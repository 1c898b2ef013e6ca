//! User settings
//!
//! The engine never reads settings itself; the orchestrator checks these flags
//! before asking for a sound. Updates arrive as JSON deltas and are validated
//! here, at the boundary, into typed [`SettingsChange`]s.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SettingsError;
use crate::sound::{Action, KeyCategory};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch for all key sounds
    pub enabled: bool,

    /// Volume (0.0-1.0)
    pub volume: f32,

    /// Play a sound on key release as well as press
    pub release_sounds: bool,

    pub space_enabled: bool,
    pub enter_enabled: bool,
    pub backspace_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.5,
            release_sounds: true,
            space_enabled: true,
            enter_enabled: true,
            backspace_enabled: true,
        }
    }
}

impl Settings {
    /// Whether keys of `category` make a sound. Generic keys always do.
    pub fn category_enabled(&self, category: KeyCategory) -> bool {
        match category {
            KeyCategory::Generic => true,
            KeyCategory::Backspace => self.backspace_enabled,
            KeyCategory::Enter => self.enter_enabled,
            KeyCategory::Space => self.space_enabled,
        }
    }

    /// Whether a key event with `category` and `action` should be played
    pub fn should_play(&self, category: KeyCategory, action: Action) -> bool {
        if !self.enabled {
            return false;
        }
        if action == Action::Release && !self.release_sounds {
            return false;
        }
        self.category_enabled(category)
    }

    /// Apply one change; returns whether anything changed
    pub fn apply(&mut self, change: &SettingsChange) -> bool {
        let before = self.clone();
        match *change {
            SettingsChange::Enabled(v) => self.enabled = v,
            SettingsChange::Volume(v) => self.volume = v.clamp(0.0, 1.0),
            SettingsChange::ReleaseSounds(v) => self.release_sounds = v,
            SettingsChange::SpaceEnabled(v) => self.space_enabled = v,
            SettingsChange::EnterEnabled(v) => self.enter_enabled = v,
            SettingsChange::BackspaceEnabled(v) => self.backspace_enabled = v,
        }
        *self != before
    }

    /// Clamp values that may come from a hand-edited file
    fn sanitized(mut self) -> Self {
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            Settings::default().volume
        };
        self
    }
}

/// One validated settings update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum SettingsChange {
    Enabled(bool),
    Volume(f32),
    ReleaseSounds(bool),
    SpaceEnabled(bool),
    EnterEnabled(bool),
    BackspaceEnabled(bool),
}

impl SettingsChange {
    /// Name of the field as stored on disk
    pub fn field(&self) -> &'static str {
        match self {
            SettingsChange::Enabled(_) => "enabled",
            SettingsChange::Volume(_) => "volume",
            SettingsChange::ReleaseSounds(_) => "release_sounds",
            SettingsChange::SpaceEnabled(_) => "space_enabled",
            SettingsChange::EnterEnabled(_) => "enter_enabled",
            SettingsChange::BackspaceEnabled(_) => "backspace_enabled",
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if let SettingsChange::Volume(v) = self {
            if !v.is_finite() || !(0.0..=1.0).contains(v) {
                return Err(SettingsError::InvalidValue {
                    field: self.field().to_string(),
                    reason: format!("{} is outside 0.0-1.0", v),
                });
            }
        }
        Ok(())
    }

    /// Turn a JSON object of changed fields into validated changes
    ///
    /// Fails on the first unknown field or ill-typed value; nothing is
    /// returned in that case.
    pub fn parse_delta(delta: &Value) -> Result<Vec<SettingsChange>, SettingsError> {
        let object = delta.as_object().ok_or(SettingsError::NotAnObject)?;
        let mut changes = Vec::with_capacity(object.len());

        for (field, value) in object {
            let change = match field.as_str() {
                "enabled" => SettingsChange::Enabled(expect_bool(field, value)?),
                "volume" => SettingsChange::Volume(expect_number(field, value)?),
                "release_sounds" => SettingsChange::ReleaseSounds(expect_bool(field, value)?),
                "space_enabled" => SettingsChange::SpaceEnabled(expect_bool(field, value)?),
                "enter_enabled" => SettingsChange::EnterEnabled(expect_bool(field, value)?),
                "backspace_enabled" => {
                    SettingsChange::BackspaceEnabled(expect_bool(field, value)?)
                }
                _ => return Err(SettingsError::UnknownField(field.clone())),
            };
            change.validate()?;
            changes.push(change);
        }

        Ok(changes)
    }

    fn json_value(&self) -> Value {
        match *self {
            SettingsChange::Volume(v) => Value::from(v as f64),
            SettingsChange::Enabled(v)
            | SettingsChange::ReleaseSounds(v)
            | SettingsChange::SpaceEnabled(v)
            | SettingsChange::EnterEnabled(v)
            | SettingsChange::BackspaceEnabled(v) => Value::Bool(v),
        }
    }
}

fn expect_bool(field: &str, value: &Value) -> Result<bool, SettingsError> {
    value.as_bool().ok_or_else(|| SettingsError::InvalidValue {
        field: field.to_string(),
        reason: format!("expected a boolean, got {}", value),
    })
}

fn expect_number(field: &str, value: &Value) -> Result<f32, SettingsError> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| SettingsError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a number, got {}", value),
        })
}

/// Persistent settings storage
pub trait SettingsStore: Send {
    /// Current settings; fields missing from storage read as defaults
    fn get(&self) -> Result<Settings, SettingsError>;

    /// Persist one change and return the resulting settings
    fn set(&mut self, change: &SettingsChange) -> Result<Settings, SettingsError>;

    /// Write defaults for every field storage does not have yet
    fn merge_defaults(&mut self) -> Result<Settings, SettingsError>;
}

fn settings_from_map(map: &Map<String, Value>) -> Result<Settings, SettingsError> {
    let settings: Settings = serde_json::from_value(Value::Object(map.clone())).map_err(|e| {
        SettingsError::InvalidValue {
            field: "settings".to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(settings.sanitized())
}

fn defaults_map() -> Map<String, Value> {
    match serde_json::to_value(Settings::default()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// In-memory storage, for tests and headless runs
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    stored: Map<String, Value>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage holding exactly the fields of `settings`
    pub fn with_settings(settings: &Settings) -> Self {
        let stored = match serde_json::to_value(settings) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self { stored }
    }

    /// Raw stored fields
    pub fn stored(&self) -> &Map<String, Value> {
        &self.stored
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self) -> Result<Settings, SettingsError> {
        settings_from_map(&self.stored)
    }

    fn set(&mut self, change: &SettingsChange) -> Result<Settings, SettingsError> {
        change.validate()?;
        self.stored
            .insert(change.field().to_string(), change.json_value());
        self.get()
    }

    fn merge_defaults(&mut self) -> Result<Settings, SettingsError> {
        for (field, value) in defaults_map() {
            self.stored.entry(field).or_insert(value);
        }
        self.get()
    }
}

/// Settings kept as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, SettingsError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let load_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            SettingsError::LoadFailed {
                path: self.path.display().to_string(),
                source,
            }
        };

        let content = fs::read_to_string(&self.path).map_err(|e| load_failed(Box::new(e)))?;
        match serde_json::from_str::<Value>(&content).map_err(|e| load_failed(Box::new(e)))? {
            Value::Object(map) => Ok(map),
            _ => Err(SettingsError::NotAnObject),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), SettingsError> {
        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            SettingsError::SaveFailed {
                path: self.path.display().to_string(),
                source,
            }
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| save_failed(Box::new(e)))?;
        }
        let json = serde_json::to_string_pretty(map).map_err(|e| save_failed(Box::new(e)))?;
        fs::write(&self.path, json).map_err(|e| save_failed(Box::new(e)))?;

        tracing::debug!("Saved settings to: {}", self.path.display());
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self) -> Result<Settings, SettingsError> {
        settings_from_map(&self.read_map()?)
    }

    fn set(&mut self, change: &SettingsChange) -> Result<Settings, SettingsError> {
        change.validate()?;
        let mut map = self.read_map()?;
        map.insert(change.field().to_string(), change.json_value());
        self.write_map(&map)?;
        settings_from_map(&map)
    }

    fn merge_defaults(&mut self) -> Result<Settings, SettingsError> {
        let mut map = self.read_map()?;
        let before = map.len();
        for (field, value) in defaults_map() {
            map.entry(field).or_insert(value);
        }
        if map.len() != before || !self.path.exists() {
            self.write_map(&map)?;
            tracing::info!(
                "Merged {} default settings into {}",
                map.len() - before,
                self.path.display()
            );
        }
        settings_from_map(&map)
    }
}
