// src/config.rs
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const HOST_ENV_VAR: &str = "BIOSCOPE_HOST";

/// Vertical rescale applied to activity values before plotting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActivityScale {
    /// Expands low-magnitude variation and compresses high magnitudes:
    /// `1 - ln(v * 0.99 + 0.01) / ln(0.01)`.
    Logarithmic,
    /// Flat division, `v / divisor`.
    Linear { divisor: f64 },
}
impl Default for ActivityScale {
    fn default() -> Self {
        ActivityScale::Logarithmic
    }
}
impl ActivityScale {
    /// Maps a raw activity value to a vertical fraction of the activity region.
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            ActivityScale::Logarithmic => 1.0 - (value * 0.99 + 0.01).ln() / 0.01f64.ln(),
            ActivityScale::Linear { divisor } => value / divisor,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// `host[:port]` serving the `/session` endpoint.
    pub host: String,
    pub surface_width: u32,
    pub surface_height: u32,
    /// Duration visible across one region, in the producer's time units.
    pub window_seconds: f64,
    pub activity_scale: ActivityScale,
}
impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            host: "localhost:8080".to_owned(),
            surface_width: 1600,
            surface_height: 600,
            window_seconds: 0.8,
            activity_scale: ActivityScale::default(),
        }
    }
}
impl ViewerConfig {
    /// Reads the JSON config at `path` (defaults when `None`), then applies
    /// the host override from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => ViewerConfig::default(),
        };
        if let Ok(host) = std::env::var(HOST_ENV_VAR) {
            if !host.trim().is_empty() {
                config.host = host.trim().to_owned();
            }
        }
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            bail!("host must not be empty");
        }
        if self.surface_width == 0 || self.surface_height < 2 {
            bail!(
                "surface must be at least 1x2 pixels, got {}x{}",
                self.surface_width,
                self.surface_height
            );
        }
        if !(self.window_seconds > 0.0) {
            bail!("window_seconds must be positive, got {}", self.window_seconds);
        }
        if let ActivityScale::Linear { divisor } = self.activity_scale {
            if !(divisor > 0.0) {
                bail!("linear activity divisor must be positive, got {divisor}");
            }
        }
        Ok(())
    }
    pub fn endpoint(&self) -> String {
        format!("ws://{}/session", self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    #[test]
    fn logarithmic_scale_spans_unit_range() {
        let scale = ActivityScale::Logarithmic;
        assert!(scale.apply(0.0).abs() < 1e-12);
        assert!((scale.apply(1.0) - 1.0).abs() < 1e-12);
        // low values take up more of the range than a linear map would
        assert!(scale.apply(0.1) > 0.5);
        let linear = ActivityScale::Linear { divisor: 10.0 };
        assert_eq!(linear.apply(5.0), 0.5);
    }
    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"surface_width": 800, "activity_scale": {{"Linear": {{"divisor": 10.0}}}}}}"#
        )
        .unwrap();
        let config = ViewerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.surface_width, 800);
        assert_eq!(config.surface_height, 600);
        assert_eq!(config.window_seconds, 0.8);
        assert_eq!(
            config.activity_scale,
            ActivityScale::Linear { divisor: 10.0 }
        );
    }
    #[test]
    fn invalid_values_are_rejected() {
        let mut config = ViewerConfig::default();
        config.window_seconds = 0.0;
        assert!(config.validate().is_err());
        let mut config = ViewerConfig::default();
        config.activity_scale = ActivityScale::Linear { divisor: -1.0 };
        assert!(config.validate().is_err());
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(ViewerConfig::load(Some(file.path())).is_err());
    }
    #[test]
    fn endpoint_targets_session_path() {
        let config = ViewerConfig {
            host: "10.0.0.7:9000".into(),
            ..ViewerConfig::default()
        };
        assert_eq!(config.endpoint(), "ws://10.0.0.7:9000/session");
    }
}
