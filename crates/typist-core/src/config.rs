use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TypistError};

/// Reference passage typed during calibration.
pub const DEFAULT_REFERENCE_PASSAGE: &str = "The quick brown fox jumps over the lazy dog while \
the patient typist keeps a steady rhythm. Practice builds speed, but accuracy builds trust, \
so every careful keystroke counts toward the final score.";

/// Top-level configuration for the Typist application.
///
/// Loaded from `~/.typist/config.toml` by default. Each section corresponds
/// to one component or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypistConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl TypistConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// timing range is inverted.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TypistConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject inverted `*_min` / `*_max` pairs.
    pub fn validate(&self) -> Result<()> {
        let c = &self.cadence;
        let ranges = [
            ("natural_pause_ms", c.natural_pause_ms_min, c.natural_pause_ms_max),
            ("zone_out_ms", c.zone_out_ms_min, c.zone_out_ms_max),
            (
                "micro_hesitation_ms",
                c.micro_hesitation_ms_min,
                c.micro_hesitation_ms_max,
            ),
            ("typo_reaction_ms", c.typo_reaction_ms_min, c.typo_reaction_ms_max),
            ("filler_pause_ms", c.filler_pause_ms_min, c.filler_pause_ms_max),
            (
                "correction_lookahead",
                c.correction_lookahead_min as u64,
                c.correction_lookahead_max as u64,
            ),
        ];
        for (name, min, max) in ranges {
            if min > max {
                return Err(TypistError::Config(format!(
                    "cadence.{}_min ({}) must not exceed cadence.{}_max ({})",
                    name, min, name, max
                )));
            }
        }
        if self.calibration.reference_passage.trim().is_empty() {
            return Err(TypistError::Config(
                "calibration.reference_passage must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the settings database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.typist/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Port bound on 127.0.0.1.
    pub port: u16,
    /// SSE keep-alive interval in seconds.
    pub keep_alive_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 3040,
            keep_alive_secs: 15,
        }
    }
}

/// Session engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Countdown before typing starts, in seconds. Zero skips it.
    pub countdown_secs: u32,
    /// Window of active typing time used for the live WPM figure.
    pub wpm_window_secs: u64,
    /// Fixed RNG seed for reproducible cadence. Random when unset.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            wpm_window_secs: 10,
            rng_seed: None,
        }
    }
}

/// Timing ranges used by the cadence generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub natural_pause_ms_min: u64,
    pub natural_pause_ms_max: u64,
    pub zone_out_ms_min: u64,
    pub zone_out_ms_max: u64,
    pub micro_hesitation_ms_min: u64,
    pub micro_hesitation_ms_max: u64,
    /// Delay between a wrong keystroke and its backspace.
    pub typo_reaction_ms_min: u64,
    pub typo_reaction_ms_max: u64,
    /// Characters typed past a delayed typo before it is fixed.
    pub correction_lookahead_min: usize,
    pub correction_lookahead_max: usize,
    /// Pause between typing a filler draft and deleting it.
    pub filler_pause_ms_min: u64,
    pub filler_pause_ms_max: u64,
    /// Draft openers typed and deleted by the AI filler behaviour.
    pub filler_phrases: Vec<String>,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            natural_pause_ms_min: 300,
            natural_pause_ms_max: 1500,
            zone_out_ms_min: 2000,
            zone_out_ms_max: 5000,
            micro_hesitation_ms_min: 50,
            micro_hesitation_ms_max: 200,
            typo_reaction_ms_min: 80,
            typo_reaction_ms_max: 250,
            correction_lookahead_min: 20,
            correction_lookahead_max: 40,
            filler_pause_ms_min: 600,
            filler_pause_ms_max: 1500,
            filler_phrases: vec![
                "Okay so basically".to_string(),
                "Let me think about this".to_string(),
                "To start with,".to_string(),
                "In this response I will".to_string(),
            ],
        }
    }
}

/// Calibration test settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub reference_passage: String,
    /// Upper bound for the typo chance derived from a measurement.
    pub max_typo_chance: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            reference_passage: DEFAULT_REFERENCE_PASSAGE.to_string(),
            max_typo_chance: 0.15,
        }
    }
}

/// Text provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Seconds to wait for generated text before giving up.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}
