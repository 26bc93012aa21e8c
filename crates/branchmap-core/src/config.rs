#![forbid(unsafe_code)]

//! Tracker configuration as data.
//!
//! Every tunable of the stack (layout spacing, navigation polling, debounce
//! and poll intervals, overlay bounds) is grouped in [`TrackerConfig`], which
//! can be loaded from TOML or JSON. Every field defaults to the value the
//! tracker uses out of the box, so `TrackerConfig::default()` is always a
//! working configuration.
//!
//! ```toml
//! [layout]
//! horizontal_spacing = 96.0
//!
//! [navigator]
//! max_ticks = 90
//!
//! [schedule]
//! debounce_ms = 750
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level tracker configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub layout: LayoutConfig,
    pub navigator: NavigatorConfig,
    pub schedule: ScheduleConfig,
    pub overlay: OverlayConfig,
}

impl TrackerConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::TomlSer)
    }

    /// Validate all parameters.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let layout = &self.layout;
        for (name, value) in [
            ("layout.node_radius", layout.node_radius),
            ("layout.vertical_spacing", layout.vertical_spacing),
            ("layout.horizontal_spacing", layout.horizontal_spacing),
        ] {
            if !(value.is_finite() && value > 0.0) {
                errors.push(format!("{name} must be > 0, got {value}"));
            }
        }
        for (name, value) in [
            ("layout.top_padding", layout.top_padding),
            ("layout.side_padding", layout.side_padding),
            ("layout.bottom_padding", layout.bottom_padding),
            ("layout.min_width", layout.min_width),
            ("layout.min_height", layout.min_height),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(format!("{name} must be >= 0, got {value}"));
            }
        }
        if layout.horizontal_spacing < layout.node_radius * 2.0 {
            errors.push(format!(
                "layout.horizontal_spacing ({}) must be at least twice layout.node_radius ({})",
                layout.horizontal_spacing, layout.node_radius
            ));
        }

        if self.navigator.poll_interval_ms == 0 {
            errors.push("navigator.poll_interval_ms must be > 0".into());
        }
        if self.navigator.max_ticks == 0 {
            errors.push("navigator.max_ticks must be > 0".into());
        }

        let schedule = &self.schedule;
        for (name, value) in [
            ("schedule.poll_interval_ms", schedule.poll_interval_ms),
            ("schedule.streaming_recheck_ms", schedule.streaming_recheck_ms),
            ("schedule.reconcile_interval_ms", schedule.reconcile_interval_ms),
        ] {
            if value == 0 {
                errors.push(format!("{name} must be > 0"));
            }
        }

        let overlay = &self.overlay;
        if overlay.min_width <= 0.0 || overlay.min_height <= 0.0 {
            errors.push(format!(
                "overlay minimum size must be positive, got {}x{}",
                overlay.min_width, overlay.min_height
            ));
        }
        if !(overlay.default_fraction > 0.0 && overlay.default_fraction <= 1.0) {
            errors.push(format!(
                "overlay.default_fraction must be in (0, 1], got {}",
                overlay.default_fraction
            ));
        }

        errors
    }

    /// Validate, turning a non-empty error list into [`ConfigError::Validation`].
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            tracing::warn!(target: "branchmap.config", errors = errors.len(), "invalid tracker config");
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Layout spacing constants, in canvas pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_radius: f64,
    /// Distance between consecutive depths.
    pub vertical_spacing: f64,
    /// Distance between adjacent siblings.
    pub horizontal_spacing: f64,
    pub top_padding: f64,
    /// Total horizontal padding added around the widest sibling group.
    pub side_padding: f64,
    pub bottom_padding: f64,
    pub min_width: f64,
    pub min_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_radius: 22.0,
            vertical_spacing: 90.0,
            horizontal_spacing: 80.0,
            top_padding: 40.0,
            side_padding: 200.0,
            bottom_padding: 80.0,
            min_width: 300.0,
            min_height: 300.0,
        }
    }
}

/// Branch navigation polling parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub poll_interval_ms: u64,
    /// Tick budget before a request is aborted.
    pub max_ticks: u32,
    /// Delay between reaching the target and re-extracting.
    pub settle_delay_ms: u64,
}

impl NavigatorConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            max_ticks: 60,
            settle_delay_ms: 300,
        }
    }
}

/// Extraction trigger timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Quiet period that coalesces mutation bursts into one pass.
    pub debounce_ms: u64,
    /// Turn-count polling fallback.
    pub poll_interval_ms: u64,
    /// Delay before the first extraction after start.
    pub startup_delay_ms: u64,
    /// First streaming check after a suppressed pass.
    pub streaming_first_check_ms: u64,
    /// Re-check interval while the host keeps streaming.
    pub streaming_recheck_ms: u64,
    /// Delay before re-extracting after the overlay is shown.
    pub show_refresh_ms: u64,
    /// Interval of the overlay existence reconciliation.
    pub reconcile_interval_ms: u64,
    /// Hover time before a tooltip appears.
    pub tooltip_delay_ms: u64,
}

impl ScheduleConfig {
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    #[must_use]
    pub const fn streaming_first_check(&self) -> Duration {
        Duration::from_millis(self.streaming_first_check_ms)
    }

    #[must_use]
    pub const fn streaming_recheck(&self) -> Duration {
        Duration::from_millis(self.streaming_recheck_ms)
    }

    #[must_use]
    pub const fn show_refresh(&self) -> Duration {
        Duration::from_millis(self.show_refresh_ms)
    }

    #[must_use]
    pub const fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    #[must_use]
    pub const fn tooltip_delay(&self) -> Duration {
        Duration::from_millis(self.tooltip_delay_ms)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            poll_interval_ms: 3_000,
            startup_delay_ms: 2_000,
            streaming_first_check_ms: 1_000,
            streaming_recheck_ms: 500,
            show_refresh_ms: 100,
            reconcile_interval_ms: 3_000,
            tooltip_delay_ms: 100,
        }
    }
}

/// Overlay window bounds, in viewport pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub min_width: f64,
    pub min_height: f64,
    /// Minimum distance kept between the overlay and the viewport edges.
    pub edge_padding: f64,
    /// Distance from the right viewport edge for the default position.
    pub default_right_margin: f64,
    pub default_top: f64,
    /// Default overlay size as a fraction of the viewport.
    pub default_fraction: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            min_width: 250.0,
            min_height: 200.0,
            edge_padding: 20.0,
            default_right_margin: 50.0,
            default_top: 50.0,
            default_fraction: 0.25,
        }
    }
}

/// Errors from loading a [`TrackerConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    Toml(toml::de::Error),
    /// TOML serialization error.
    TomlSer(toml::ser::Error),
    /// JSON parse error.
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::TomlSer(e) => write!(f, "TOML serialization error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => write!(f, "validation errors: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::TomlSer(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(TrackerConfig::default().validate().is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = TrackerConfig::from_toml_str(
            r#"
            [layout]
            horizontal_spacing = 96.0

            [navigator]
            max_ticks = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.layout.horizontal_spacing, 96.0);
        assert_eq!(config.layout.vertical_spacing, 90.0);
        assert_eq!(config.navigator.max_ticks, 90);
        assert_eq!(config.navigator.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.schedule, ScheduleConfig::default());
    }

    #[test]
    fn json_round_trip() {
        let mut config = TrackerConfig::default();
        config.schedule.debounce_ms = 750;
        let json = serde_json::to_string(&config).unwrap();
        let back = TrackerConfig::from_json_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn toml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("branchmap.toml");
        let mut config = TrackerConfig::default();
        config.overlay.min_width = 320.0;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        let back = TrackerConfig::from_toml_file(&path).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = TrackerConfig::from_json_file("/nonexistent/branchmap.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = TrackerConfig::default();
        config.layout.horizontal_spacing = 10.0;
        config.navigator.max_ticks = 0;
        config.schedule.poll_interval_ms = 0;
        config.overlay.default_fraction = 1.5;
        let errors = config.clone().validate();
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(matches!(
            config.validated(),
            Err(ConfigError::Validation(list)) if list.len() == 4
        ));
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let err = TrackerConfig::from_toml_str("[layout\nnode_radius = ").unwrap_err();
        assert!(err.to_string().starts_with("TOML parse error"));
    }
}
