//! Runtime configuration.
//!
//! Every setting has a built-in default, can be overridden by a
//! `RAIDWATCH_*` environment variable, and finally by a command-line flag.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use thiserror::Error;

use raidwatch_core::constants::{DEFAULT_CENTER, DEFAULT_EXPIRY_SECS, DEFAULT_ZOOM};
use raidwatch_core::enums::Category;
use raidwatch_core::types::GeoPoint;
use raidwatch_geo::ViewConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a MapTiler API key is required (--maptiler-key or RAIDWATCH_MAPTILER_KEY)")]
    MissingMapTilerKey,

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Parser, Debug, Clone)]
#[command(name = "raidwatch")]
#[command(about = "Tracks airborne threat reports and frames them on a map")]
#[command(version)]
pub struct Args {
    /// JSON file holding the active groups
    #[arg(long, env = "RAIDWATCH_STATE_FILE", default_value = "history/state.json")]
    pub state_file: PathBuf,

    /// JSON-lines log of geocoding attempts
    #[arg(long, env = "RAIDWATCH_AUDIT_FILE", default_value = "history/geocode_audit.jsonl")]
    pub audit_file: PathBuf,

    /// Directory for rendered map payloads and the map generation log
    #[arg(long, env = "RAIDWATCH_ARTIFACTS_DIR", default_value = "history/maps")]
    pub artifacts_dir: PathBuf,

    /// MapTiler geocoding API key
    #[arg(long, env = "RAIDWATCH_MAPTILER_KEY", hide_env_values = true)]
    pub maptiler_key: Option<String>,

    /// Idle period after which all groups are cleared (seconds)
    #[arg(long, env = "RAIDWATCH_EXPIRY_SECS", default_value_t = DEFAULT_EXPIRY_SECS)]
    pub expiry_secs: u64,

    /// Map pitch (degrees)
    #[arg(long, env = "RAIDWATCH_MAP_PITCH", default_value_t = 30.0)]
    pub pitch: f64,

    /// Map bearing (degrees)
    #[arg(long, env = "RAIDWATCH_MAP_BEARING", default_value_t = 0.0)]
    pub bearing: f64,

    #[arg(long, env = "RAIDWATCH_MODEL_SCALE", default_value_t = 8000.0)]
    pub model_scale: f64,

    /// Model altitude (meters)
    #[arg(long, env = "RAIDWATCH_MODEL_ALTITUDE", default_value_t = 7500.0)]
    pub model_altitude: f64,

    /// Show place labels on the base map
    #[arg(long, env = "RAIDWATCH_MAP_LABELS")]
    pub labels: bool,

    /// Default view center longitude
    #[arg(long, env = "RAIDWATCH_CENTER_LON", default_value_t = DEFAULT_CENTER.0)]
    pub center_lon: f64,

    /// Default view center latitude
    #[arg(long, env = "RAIDWATCH_CENTER_LAT", default_value_t = DEFAULT_CENTER.1)]
    pub center_lat: f64,

    #[arg(long, env = "RAIDWATCH_ZOOM", default_value_t = DEFAULT_ZOOM)]
    pub zoom: f64,
}

/// Camera and model styling handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStyling {
    pub pitch: f64,
    pub bearing: f64,
    pub model_scale: f64,
    pub model_altitude: f64,
    pub show_labels: bool,
}

impl Default for MapStyling {
    fn default() -> Self {
        Self {
            pitch: 30.0,
            bearing: 0.0,
            model_scale: 8000.0,
            model_altitude: 7500.0,
            show_labels: false,
        }
    }
}

/// 3D model used for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub path: String,
    pub rotation: f64,
}

impl ModelInfo {
    fn new(path: &str, rotation: f64) -> Self {
        Self {
            path: path.to_string(),
            rotation,
        }
    }
}

/// Per-category models plus a fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCatalog {
    pub shahed: ModelInfo,
    pub rocket: ModelInfo,
    pub default: ModelInfo,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            shahed: ModelInfo::new("/assets/shahed.gltf", 90.0),
            rocket: ModelInfo::new("/assets/rocket.gltf", 90.0),
            default: ModelInfo::new("/assets/shahed.gltf", 90.0),
        }
    }
}

impl ModelCatalog {
    pub fn for_category(&self, category: Category) -> &ModelInfo {
        match category {
            Category::Shahed => &self.shahed,
            Category::Rocket => &self.rocket,
        }
    }
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub state_file: PathBuf,
    pub audit_file: PathBuf,
    pub artifacts_dir: PathBuf,
    pub maptiler_key: String,
    pub expiry: Duration,
    pub styling: MapStyling,
    pub view: ViewConfig,
    pub models: ModelCatalog,
}

impl AppConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let maptiler_key = args
            .maptiler_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingMapTilerKey)?;

        if args.expiry_secs == 0 {
            return Err(invalid("expiry_secs", "must be at least 1 second"));
        }
        if !(0.0..=85.0).contains(&args.pitch) {
            return Err(invalid("pitch", format!("{} is outside 0..=85", args.pitch)));
        }
        if args.model_scale.is_nan() || args.model_scale <= 0.0 {
            return Err(invalid("model_scale", "must be positive"));
        }
        if !(-180.0..=180.0).contains(&args.center_lon) || !(-90.0..=90.0).contains(&args.center_lat) {
            return Err(invalid(
                "center",
                format!("({}, {}) is not a valid lon/lat", args.center_lon, args.center_lat),
            ));
        }
        if !(0.0..=22.0).contains(&args.zoom) {
            return Err(invalid("zoom", format!("{} is outside 0..=22", args.zoom)));
        }

        Ok(Self {
            state_file: args.state_file,
            audit_file: args.audit_file,
            artifacts_dir: args.artifacts_dir,
            maptiler_key,
            expiry: Duration::from_secs(args.expiry_secs),
            styling: MapStyling {
                pitch: args.pitch,
                bearing: args.bearing,
                model_scale: args.model_scale,
                model_altitude: args.model_altitude,
                show_labels: args.labels,
            },
            view: ViewConfig {
                default_center: GeoPoint::new(args.center_lon, args.center_lat),
                default_zoom: args.zoom,
                ..ViewConfig::default()
            },
            models: ModelCatalog::default(),
        })
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
