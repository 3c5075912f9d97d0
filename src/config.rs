//! Processor configuration
//!
//! All thresholds live in one aggregate injected at construction; there is no
//! global calibration store. Configs can be loaded from a TOML file and are
//! validated before use.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::dsp::{
    BaselineConfig, PeakDetectorConfig, QualityConfig, SmoothingConfig, SpectralConfig,
};
use crate::finger::FingerGateConfig;
use crate::physio::{ArrhythmiaConfig, HeartRateConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Aggregate configuration for one measurement session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Expected camera frame rate (Hz)
    pub sample_rate: f32,
    /// Analysis window retained by the pipeline (samples)
    pub buffer_len: usize,
    /// Agreement margin between time-domain and spectral BPM that earns a
    /// confidence boost
    pub spectral_agreement_bpm: f32,

    pub smoothing: SmoothingConfig,
    pub baseline: BaselineConfig,
    pub peaks: PeakDetectorConfig,
    pub quality: QualityConfig,
    pub spectral: SpectralConfig,
    pub finger: FingerGateConfig,
    pub heart_rate: HeartRateConfig,
    pub arrhythmia: ArrhythmiaConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 30.0,
            buffer_len: 300, // 10 sec at 30 fps
            spectral_agreement_bpm: 10.0,
            smoothing: SmoothingConfig::default(),
            baseline: BaselineConfig::default(),
            peaks: PeakDetectorConfig::default(),
            quality: QualityConfig::default(),
            spectral: SpectralConfig::default(),
            finger: FingerGateConfig::default(),
            heart_rate: HeartRateConfig::default(),
            arrhythmia: ArrhythmiaConfig::default(),
        }
    }
}

impl ProcessorConfig {
    /// Load from a TOML file; missing sections fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency of the thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate <= 0.0 {
            return Err(ConfigError::Validation("sample_rate must be positive".into()));
        }
        if self.buffer_len < self.quality.window {
            return Err(ConfigError::Validation(
                "buffer_len must cover the quality window".into(),
            ));
        }
        if self.smoothing.window == 0 {
            return Err(ConfigError::Validation("smoothing window must be >= 1".into()));
        }
        if self.baseline.min_alpha <= 0.0 || self.baseline.min_alpha > self.baseline.max_alpha {
            return Err(ConfigError::Validation(
                "baseline alphas must satisfy 0 < min <= max".into(),
            ));
        }
        if self.peaks.min_rr_ms >= self.peaks.max_rr_ms {
            return Err(ConfigError::Validation(
                "peak RR band must satisfy min < max".into(),
            ));
        }
        if self.heart_rate.min_rr_ms >= self.heart_rate.max_rr_ms {
            return Err(ConfigError::Validation(
                "heart-rate RR band must satisfy min < max".into(),
            ));
        }
        if self.finger.quality_off >= self.finger.quality_on {
            return Err(ConfigError::Validation(
                "finger gate needs quality_off < quality_on".into(),
            ));
        }
        if self.finger.required_on_frames == 0 || self.finger.required_off_frames == 0 {
            return Err(ConfigError::Validation(
                "finger gate frame requirements must be >= 1".into(),
            ));
        }
        let weight_sum = self.quality.amplitude_weight
            + self.quality.stability_weight
            + self.quality.periodicity_weight
            + self.quality.pulsatility_weight;
        if (weight_sum - 1.0).abs() > 0.01 {
            return Err(ConfigError::Validation(format!(
                "quality weights must sum to 1, got {weight_sum}"
            )));
        }
        if self.arrhythmia.premature_ratio >= 1.0 || self.arrhythmia.delayed_ratio <= 1.0 {
            return Err(ConfigError::Validation(
                "arrhythmia ratios must bracket 1.0".into(),
            ));
        }
        if self.arrhythmia.confirmation_threshold == 0 {
            return Err(ConfigError::Validation(
                "arrhythmia confirmation threshold must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ProcessorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_gate_thresholds_rejected() {
        let mut config = ProcessorConfig::default();
        config.finger.quality_on = 30.0;
        config.finger.quality_off = 60.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_weight_sum_checked() {
        let mut config = ProcessorConfig::default();
        config.quality.amplitude_weight = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ProcessorConfig = toml::from_str(
            r#"
            sample_rate = 25.0

            [finger]
            quality_on = 60.0
            quality_off = 35.0
            hard_floor = 10.0
            min_red_green_ratio = 1.25
            required_on_frames = 2
            required_off_frames = 6
            display_window = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.sample_rate, 25.0);
        assert_eq!(config.finger.required_on_frames, 2);
        assert_eq!(config.buffer_len, ProcessorConfig::default().buffer_len);
        assert!(config.validate().is_ok());
    }
}
