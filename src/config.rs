//! Frame-count knobs consumed by the simulation clock.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be at least one frame")]
    ZeroInterval { name: &'static str },

    #[error("difficulty {0} is outside 0.0..=1.0")]
    DifficultyOutOfRange(f32),
}

/// All intervals are in frames (ticks).
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub fall_interval: u32,
    /// Used instead of `fall_interval` while soft drop is held.
    pub fast_fall_interval: u32,
    pub gravity_interval: u32,
    /// Delay between finding erasable groups and removing them.
    pub elimination_interval: u32,
    pub chain_display_duration: u32,
    pub difficulty: f32,
    /// Fixed seed for the pair generator; `None` draws from entropy.
    pub seed: Option<u64>,
    /// Accept `DebugCommand`s in `FrameInput`.
    pub debug: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fall_interval: 40,
            fast_fall_interval: 1,
            gravity_interval: 5,
            elimination_interval: 30,
            chain_display_duration: 60,
            difficulty: 0.5,
            seed: None,
            debug: false,
        }
    }
}

impl SimConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        let intervals = [
            ("fall_interval", self.fall_interval),
            ("fast_fall_interval", self.fast_fall_interval),
            ("gravity_interval", self.gravity_interval),
            ("elimination_interval", self.elimination_interval),
            ("chain_display_duration", self.chain_display_duration),
        ];
        if let Some(&(name, _)) = intervals.iter().find(|(_, frames)| *frames == 0) {
            return Err(ConfigError::ZeroInterval { name });
        }
        if !(0.0..=1.0).contains(&self.difficulty) {
            return Err(ConfigError::DifficultyOutOfRange(self.difficulty));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_interval_is_named() {
        let config = SimConfig {
            gravity_interval: 0,
            ..SimConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroInterval {
                name: "gravity_interval"
            })
        );
    }

    #[test]
    fn difficulty_must_be_unit_range() {
        for difficulty in [-0.1, 1.5, f32::NAN] {
            let config = SimConfig {
                difficulty,
                ..SimConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::DifficultyOutOfRange(_))
            ));
        }
    }
}
