//! File configuration for the plugin.

use std::{fs, io, path::Path, path::PathBuf, time::Duration};

use flag_war_core::{AttackRules, BeaconRules, FlagMaterials, Material};
use flag_war_system_admission::{Config as AdmissionConfig, FeeSchedule};
use serde::Deserialize;
use thiserror::Error;

/// Oldest configuration layout this build understands.
pub const MIN_CONFIG_VERSION: f64 = 1.2;

/// Failure to load or validate the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read flag war config from {path:?}: {source}")]
    ReadFailed {
        /// Location of the file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML for this layout.
    #[error("failed to parse flag war config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The file predates the oldest supported layout.
    #[error("config version {found} is older than 1.2; regenerate the file")]
    Outdated {
        /// Version declared by the file.
        found: f64,
    },
    /// A value is out of range.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Root of the configuration file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlagWarConfig {
    /// Layout version of the file.
    pub config_version: f64,
    /// Logs the startup marquee.
    pub show_startup_marquee: bool,
    /// Registration limits and countdown pacing.
    pub attack: AttackSection,
    /// Flag marker materials.
    pub flag: FlagSection,
    /// Beacon drawing.
    pub beacon: BeaconSection,
    /// Prices and rewards.
    pub economy: EconomySection,
    /// Participation limits.
    pub limits: LimitsSection,
}

impl Default for FlagWarConfig {
    fn default() -> Self {
        Self {
            config_version: MIN_CONFIG_VERSION,
            show_startup_marquee: true,
            attack: AttackSection::default(),
            flag: FlagSection::default(),
            beacon: BeaconSection::default(),
            economy: EconomySection::default(),
            limits: LimitsSection::default(),
        }
    }
}

/// `[attack]` table.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AttackSection {
    /// Edge length of a cell in blocks.
    pub cell_size: u32,
    /// Live attacks allowed per player.
    pub max_active_flags_per_player: usize,
    /// Seconds an attacker must hold the flag.
    pub duration_secs: u64,
    /// Seconds between countdown refreshes.
    pub refresh_interval_secs: u64,
}

impl Default for AttackSection {
    fn default() -> Self {
        let rules = AttackRules::default();
        Self {
            cell_size: rules.cell_size,
            max_active_flags_per_player: rules.max_active_flags_per_player,
            duration_secs: rules.attack_duration.as_secs(),
            refresh_interval_secs: rules.refresh_interval.as_secs(),
        }
    }
}

/// `[flag]` table.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FlagSection {
    /// Material the attacker places to start an attack.
    pub base_block: Material,
    /// Material crowning the flag.
    pub light_block: Material,
    /// Colour ladder of the timer marker.
    pub timer_blocks: Vec<Material>,
}

impl Default for FlagSection {
    fn default() -> Self {
        let flag = FlagMaterials::default();
        Self {
            base_block: flag.base,
            light_block: flag.light,
            timer_blocks: flag.timer,
        }
    }
}

/// `[beacon]` table.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BeaconSection {
    /// Draws a beacon above every attacked cell.
    pub enabled: bool,
    /// Half-width of the beacon cube.
    pub radius: u32,
    /// Minimum gap between the flag light and the beacon.
    pub min_height_above_flag: i32,
    /// Highest buildable layer.
    pub sky_height: i32,
    /// Material of the wireframe edges.
    pub wireframe_block: Material,
}

impl Default for BeaconSection {
    fn default() -> Self {
        let beacon = BeaconRules::default();
        Self {
            enabled: true,
            radius: beacon.radius,
            min_height_above_flag: beacon.min_height_above_flag,
            sky_height: beacon.sky_height,
            wireframe_block: beacon.wireframe,
        }
    }
}

/// `[economy]` table.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EconomySection {
    /// Flat cost of placing a flag.
    pub cost_to_place_war_flag: f64,
    /// Paid to the defenders per defended flag.
    pub defended_attack_reward: f64,
    /// Reward for capturing a home block; negative values are fines.
    pub won_home_block_reward: f64,
    /// Reward for capturing an ordinary claim; negative values are fines.
    pub won_town_block_reward: f64,
}

impl Default for EconomySection {
    fn default() -> Self {
        let fees = FeeSchedule::default();
        Self {
            cost_to_place_war_flag: fees.cost_to_place_war_flag,
            defended_attack_reward: fees.defended_attack_reward,
            won_home_block_reward: fees.won_home_block_reward,
            won_town_block_reward: fees.won_town_block_reward,
        }
    }
}

/// `[limits]` table.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsSection {
    /// Online residents each participating town needs.
    pub min_online_in_town: usize,
    /// Online residents each participating nation needs.
    pub min_online_in_nation: usize,
    /// Only the edge of a town may be attacked.
    pub attacking_borders_only: bool,
}

impl Default for LimitsSection {
    fn default() -> Self {
        let limits = AdmissionConfig::default();
        Self {
            min_online_in_town: limits.min_online_in_town,
            min_online_in_nation: limits.min_online_in_nation,
            attacking_borders_only: limits.attacking_borders_only,
        }
    }
}

impl FlagWarConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks version and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.config_version < MIN_CONFIG_VERSION {
            return Err(ConfigError::Outdated {
                found: self.config_version,
            });
        }
        if self.attack.cell_size == 0 {
            return Err(ConfigError::Invalid {
                field: "attack.cell_size",
                reason: "must be greater than zero",
            });
        }
        if self.attack.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "attack.refresh_interval_secs",
                reason: "must be greater than zero",
            });
        }
        if self.flag.timer_blocks.is_empty() {
            return Err(ConfigError::Invalid {
                field: "flag.timer_blocks",
                reason: "needs at least one material",
            });
        }
        Ok(())
    }

    /// Attack rules described by the file.
    #[must_use]
    pub fn attack_rules(&self) -> AttackRules {
        AttackRules {
            cell_size: self.attack.cell_size,
            max_active_flags_per_player: self.attack.max_active_flags_per_player,
            attack_duration: Duration::from_secs(self.attack.duration_secs),
            refresh_interval: Duration::from_secs(self.attack.refresh_interval_secs),
            flag: FlagMaterials {
                base: self.flag.base_block.clone(),
                light: self.flag.light_block.clone(),
                timer: self.flag.timer_blocks.clone(),
            },
            beacon: self.beacon.enabled.then(|| BeaconRules {
                radius: self.beacon.radius,
                min_height_above_flag: self.beacon.min_height_above_flag,
                sky_height: self.beacon.sky_height,
                wireframe: self.beacon.wireframe_block.clone(),
            }),
        }
    }

    /// Admission configuration described by the file.
    #[must_use]
    pub fn admission(&self) -> AdmissionConfig {
        AdmissionConfig {
            min_online_in_town: self.limits.min_online_in_town,
            min_online_in_nation: self.limits.min_online_in_nation,
            attacking_borders_only: self.limits.attacking_borders_only,
            fees: FeeSchedule {
                cost_to_place_war_flag: self.economy.cost_to_place_war_flag,
                defended_attack_reward: self.economy.defended_attack_reward,
                won_home_block_reward: self.economy.won_home_block_reward,
                won_town_block_reward: self.economy.won_town_block_reward,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = FlagWarConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config, FlagWarConfig::default());
        assert_eq!(config.attack_rules(), AttackRules::default());
        assert_eq!(config.admission(), AdmissionConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = FlagWarConfig::from_toml_str(
            r#"
            config_version = 1.3

            [attack]
            cell_size = 8
            duration_secs = 120

            [flag]
            timer_blocks = ["RED_WOOL", "BLACK_WOOL"]

            [beacon]
            enabled = false

            [economy]
            won_home_block_reward = -250.0

            [limits]
            attacking_borders_only = true
            "#,
        )
        .expect("config should parse");

        let rules = config.attack_rules();
        assert_eq!(rules.cell_size, 8);
        assert_eq!(rules.attack_duration, Duration::from_secs(120));
        assert_eq!(rules.refresh_interval, Duration::from_secs(60));
        assert_eq!(rules.flag.timer.len(), 2);
        assert_eq!(rules.beacon, None);

        let admission = config.admission();
        assert!(admission.attacking_borders_only);
        assert_eq!(admission.fees.won_home_block_reward, -250.0);
    }

    #[test]
    fn old_layout_is_rejected() {
        let error = FlagWarConfig::from_toml_str("config_version = 1.1")
            .expect_err("old layouts must be regenerated");
        assert!(matches!(error, ConfigError::Outdated { .. }));
    }

    #[test]
    fn zero_cell_size_is_invalid() {
        let error = FlagWarConfig::from_toml_str("[attack]\ncell_size = 0")
            .expect_err("cells need an extent");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                field: "attack.cell_size",
                ..
            }
        ));
    }

    #[test]
    fn empty_timer_ladder_is_invalid() {
        let error = FlagWarConfig::from_toml_str("[flag]\ntimer_blocks = []")
            .expect_err("the timer needs a colour");
        assert!(matches!(error, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_document_reports_parse_error() {
        let error = FlagWarConfig::from_toml_str("[attack\ncell_size = 3")
            .expect_err("broken toml should not parse");
        assert!(matches!(error, ConfigError::Parse(_)));
    }
}
