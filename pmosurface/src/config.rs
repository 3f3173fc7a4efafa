//! Surface configuration.
//!
//! Configuration par défaut intégrée au binaire, avec surcharge optionnelle
//! par fichier YAML (variable d'environnement `PMOSURFACE_CONFIG`).

use std::time::Duration;
use std::{env, fs};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmosurface.yaml");

const ENV_CONFIG_FILE: &str = "PMOSURFACE_CONFIG";

static CONFIG: Lazy<SurfaceConfig> = Lazy::new(|| {
    SurfaceConfig::load().expect("Failed to load PMOSurface configuration")
});

/// Process-wide configuration, loaded once.
pub fn get_config() -> &'static SurfaceConfig {
    &CONFIG
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    pub frame_rate_hz: f64,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self { frame_rate_hz: 30.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub low_max: f64,
    pub medium_max: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            low_max: 0.5,
            medium_max: 0.75,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub animator: AnimatorConfig,
    pub volume: VolumeConfig,
}

impl SurfaceConfig {
    /// Loads the embedded defaults, then the optional override file named
    /// by `PMOSURFACE_CONFIG`.
    pub fn load() -> Result<SurfaceConfig> {
        let mut config: SurfaceConfig =
            serde_yaml::from_str(DEFAULT_CONFIG).context("embedded default configuration")?;

        if let Ok(path) = env::var(ENV_CONFIG_FILE) {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading configuration file {}", path))?;
            config = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing configuration file {}", path))?;
        }

        Ok(config)
    }

    /// Period of the thread-backed frame clock.
    pub fn frame_period(&self) -> Duration {
        let hz = if self.animator.frame_rate_hz > 0.0 {
            self.animator.frame_rate_hz
        } else {
            AnimatorConfig::default().frame_rate_hz
        };
        Duration::from_secs_f64(1.0 / hz)
    }

    /// Derives the `volumeLevel` bucket from volume and mute state.
    pub fn volume_level(&self, volume: f64, muted: bool) -> &'static str {
        if muted || volume <= 0.0 {
            "off"
        } else if volume <= self.volume.low_max {
            "low"
        } else if volume <= self.volume.medium_max {
            "medium"
        } else {
            "high"
        }
    }
}
