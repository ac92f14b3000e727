//! Engine configuration.
//!
//! Defaults mirror a classic chip-tracker setup: 44.1 kHz mono, 512-frame blocks
//! and a ring of eight blocks (~93 ms of look-ahead).

use std::time::Duration;

use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_FRAME_SIZE: usize = 512;
pub const DEFAULT_BUFFER_BLOCKS: usize = 8;
pub const DEFAULT_VOLUME: f32 = 0.5;
pub const DEFAULT_IDLE_SLEEP_US: u64 = 250;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Output sample rate in Hz, fixed for the session.
    pub sample_rate: u32,
    /// Preferred callback block size and producer batch size.
    pub frame_size: usize,
    /// Ring capacity in blocks.
    pub buffer_blocks: usize,
    /// Initial volume in [0, 1].
    pub volume: f32,
    /// Output device name; `None` picks the host default.
    pub device: Option<String>,
    /// Producer sleep while the ring has no room for a block.
    pub idle_sleep_us: u64,
    /// Fill the ring before the stream starts.
    pub prime_buffer: bool,
    /// Seed for the script random family; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            buffer_blocks: DEFAULT_BUFFER_BLOCKS,
            volume: DEFAULT_VOLUME,
            device: None,
            idle_sleep_us: DEFAULT_IDLE_SLEEP_US,
            prime_buffer: true,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Total ring capacity in samples.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.frame_size.saturating_mul(self.buffer_blocks)
    }

    #[inline]
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_micros(self.idle_sleep_us)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidConfig("sample_rate must be > 0".into()));
        }
        if self.frame_size == 0 {
            return Err(EngineError::InvalidConfig("frame_size must be > 0".into()));
        }
        if self.buffer_blocks == 0 {
            return Err(EngineError::InvalidConfig("buffer_blocks must be > 0".into()));
        }
        if self.frame_size.checked_mul(self.buffer_blocks).is_none() {
            return Err(EngineError::InvalidConfig("ring capacity overflows".into()));
        }
        if !self.volume.is_finite() {
            return Err(EngineError::InvalidConfig(format!("volume must be finite, got {}", self.volume)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.sample_rate, 44_100);
        assert_eq!(cfg.frame_size, 512);
        assert_eq!(cfg.capacity(), 4096);
        assert_eq!(cfg.volume, 0.5);
        assert!(cfg.prime_buffer);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_values() {
        let zero_rate = EngineConfig { sample_rate: 0, ..EngineConfig::default() };
        assert!(matches!(zero_rate.validate(), Err(EngineError::InvalidConfig(_))));

        let zero_block = EngineConfig { frame_size: 0, ..EngineConfig::default() };
        assert!(zero_block.validate().is_err());

        let zero_ring = EngineConfig { buffer_blocks: 0, ..EngineConfig::default() };
        assert!(zero_ring.validate().is_err());

        let nan_volume = EngineConfig { volume: f32::NAN, ..EngineConfig::default() };
        assert!(nan_volume.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: EngineConfig = toml::from_str("sample_rate = 48000\ndevice = \"pulse\"\n").unwrap();
        assert_eq!(cfg.sample_rate, 48_000);
        assert_eq!(cfg.device.as_deref(), Some("pulse"));
        assert_eq!(cfg.frame_size, DEFAULT_FRAME_SIZE);
        assert!(toml::from_str::<EngineConfig>("bogus = 1").is_err());
    }
}
