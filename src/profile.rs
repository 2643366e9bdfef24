// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sensor profiles describe everything the radar API core treats as
//! hardware policy: parameter ranges, slot capacities, antenna layout and
//! sample format. Profiles are JSON documents so that a vendor can ship
//! them alongside the driver instead of compiling them in.

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, fs, path::Path};

use crate::{
    burst::{RadarType, SampleDType},
    error::{Error, Result},
    param::{Axis, ParamId, ParamRange},
};

/// A semantic version holder.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    #[serde(default)]
    pub build: u8,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

/// Raw sample encoding produced by the sensor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFormat {
    pub dtype: SampleDType,
    /// Bits per sample including real and imaginary parts.
    pub bits_per_sample: u8,
    #[serde(default)]
    pub big_endian: bool,
    #[serde(default)]
    pub interleaved: bool,
}

/// One row of the parameter range table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEntry {
    pub axis: Axis,
    pub param: ParamId,
    pub min: u32,
    pub max: u32,
}

/// Value used when a slot never configured the parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDefault {
    pub axis: Axis,
    pub param: ParamId,
    pub value: u32,
}

fn default_fifo_capacity() -> usize {
    4
}

/// Hardware description and configuration policy of one sensor model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorProfile {
    pub name: String,
    pub vendor: String,
    pub device_id: u32,
    pub radar_type: RadarType,
    pub driver_version: Version,
    /// Total configuration slots the hardware provides.
    pub num_config_slots: u8,
    /// How many slots may be active simultaneously.
    pub max_active_slots: u8,
    pub num_tx_antennas: u8,
    pub num_rx_antennas: u8,
    pub sample_format: SampleFormat,
    /// Bursts buffered between acquisition and the reader.
    #[serde(default = "default_fifo_capacity")]
    pub fifo_capacity: usize,
    /// Main parameters a slot must set explicitly before activation.
    #[serde(default)]
    pub required_main_params: Vec<ParamId>,
    #[serde(default)]
    pub defaults: Vec<ParamDefault>,
    pub ranges: Vec<RangeEntry>,
    /// ISO 3166-1 alpha-2 codes the sensor may operate in, empty for all.
    #[serde(default)]
    pub countries: Vec<String>,
    /// TX antenna offsets in micrometers, indexed by antenna.
    #[serde(default)]
    pub tx_positions: Vec<[i32; 3]>,
    /// RX antenna offsets in micrometers, indexed by antenna.
    #[serde(default)]
    pub rx_positions: Vec<[i32; 3]>,
}

impl SensorProfile {
    /// Parses and validates a profile document.
    pub fn from_json(json: &str) -> Result<SensorProfile> {
        let profile: SensorProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<SensorProfile> {
        let json = fs::read_to_string(path)?;
        SensorProfile::from_json(&json)
    }

    pub fn range(&self, axis: Axis, param: ParamId) -> Option<ParamRange> {
        self.ranges
            .iter()
            .find(|entry| entry.axis == axis && entry.param == param)
            .map(|entry| ParamRange::new(entry.min, entry.max))
    }

    pub fn default_value(&self, axis: Axis, param: ParamId) -> Option<u32> {
        self.defaults
            .iter()
            .find(|entry| entry.axis == axis && entry.param == param)
            .map(|entry| entry.value)
    }

    pub fn antennas(&self, axis: Axis) -> u8 {
        match axis {
            Axis::Main => 0,
            Axis::Tx => self.num_tx_antennas,
            Axis::Rx => self.num_rx_antennas,
        }
    }

    /// Bit mask with one bit per antenna present on the axis.
    pub fn antenna_mask(&self, axis: Axis) -> u32 {
        match self.antennas(axis) {
            0 => 0,
            32.. => u32::MAX,
            n => (1u32 << n) - 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidProfile(msg));

        if self.num_config_slots == 0 {
            return invalid("at least one config slot is required".to_string());
        }
        if self.max_active_slots == 0 || self.max_active_slots > self.num_config_slots {
            return invalid(format!(
                "max_active_slots {} must be within 1..={}",
                self.max_active_slots, self.num_config_slots
            ));
        }
        for (axis, count) in [(Axis::Tx, self.num_tx_antennas), (Axis::Rx, self.num_rx_antennas)] {
            if count == 0 || count > 32 {
                return invalid(format!("{} antenna count {} must be within 1..=32", axis, count));
            }
        }
        if self.fifo_capacity == 0 {
            return invalid("fifo_capacity must be at least 1".to_string());
        }
        if self.sample_format.bits_per_sample == 0 || self.sample_format.bits_per_sample > 64 {
            return invalid(format!(
                "bits_per_sample {} must be within 1..=64",
                self.sample_format.bits_per_sample
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.ranges {
            if entry.min > entry.max {
                return invalid(format!(
                    "{} {} range [{}, {}] is empty",
                    entry.axis, entry.param, entry.min, entry.max
                ));
            }
            if !seen.insert((entry.axis, entry.param)) {
                return invalid(format!("duplicate range for {} {}", entry.axis, entry.param));
            }
        }

        if let Some(range) = self.range(Axis::Main, ParamId::UWB_BITS_PER_SAMPLE) {
            if range.min == 0 || range.max > 64 {
                return invalid(format!(
                    "{} range [{}, {}] must be within 1..=64",
                    ParamId::UWB_BITS_PER_SAMPLE,
                    range.min,
                    range.max
                ));
            }
        }

        for param in &self.required_main_params {
            if self.range(Axis::Main, *param).is_none() {
                return invalid(format!("required parameter {} has no range", param));
            }
        }

        for default in &self.defaults {
            match self.range(default.axis, default.param) {
                Some(range) if range.contains(default.value) => (),
                Some(range) => {
                    return invalid(format!(
                        "default {} for {} {} outside of [{}, {}]",
                        default.value, default.axis, default.param, range.min, range.max
                    ))
                }
                None => {
                    return invalid(format!(
                        "default for {} {} has no range",
                        default.axis, default.param
                    ))
                }
            }
        }

        for code in &self.countries {
            if !is_country_code(code) {
                return invalid(format!("invalid country code {:?}", code));
            }
        }

        if !self.tx_positions.is_empty() && self.tx_positions.len() != self.num_tx_antennas as usize
        {
            return invalid("tx_positions must list every tx antenna".to_string());
        }
        if !self.rx_positions.is_empty() && self.rx_positions.len() != self.num_rx_antennas as usize
        {
            return invalid("rx_positions must list every rx antenna".to_string());
        }

        Ok(())
    }
}

/// True for two ASCII letters.
pub(crate) fn is_country_code(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// A main parameter assignment within a [`SlotConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainSetting {
    pub param: String,
    pub value: u32,
}

/// A TX or RX parameter assignment applied to every antenna in `mask`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntennaSetting {
    pub param: String,
    pub mask: u32,
    pub value: u32,
}

/// A complete configuration slot setup, parameters referenced by name.
/// Vendor parameters use the `vendor:<id>` form on any axis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    #[serde(default)]
    pub main: Vec<MainSetting>,
    #[serde(default)]
    pub tx: Vec<AntennaSetting>,
    #[serde(default)]
    pub rx: Vec<AntennaSetting>,
}

impl SlotConfig {
    pub fn from_json(json: &str) -> Result<SlotConfig> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<SlotConfig> {
        let json = fs::read_to_string(path)?;
        SlotConfig::from_json(&json)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const FMCW_60GHZ: &str = include_str!("../profiles/fmcw-60ghz.json");
    pub(crate) const FMCW_SLOT: &str = include_str!("../profiles/fmcw-60ghz-slot.json");

    pub(crate) fn fmcw_profile() -> SensorProfile {
        SensorProfile::from_json(FMCW_60GHZ).unwrap()
    }

    /// The FMCW reference board reporting UWB bursts.
    pub(crate) fn uwb_profile() -> SensorProfile {
        let mut profile = fmcw_profile();
        profile.radar_type = RadarType::Uwb;
        for (param, min, max, default) in [
            (ParamId::UWB_SWEEPS_PER_BURST, 1, 64, Some(4)),
            (ParamId::UWB_SAMPLES_PER_SWEEP, 1, 64, Some(4)),
            (ParamId::UWB_BITS_PER_SAMPLE, 8, 64, None),
            (ParamId::UWB_NUMBER_OF_BURSTS, 0, 1000, None),
        ] {
            profile.ranges.push(RangeEntry {
                axis: Axis::Main,
                param,
                min,
                max,
            });
            if let Some(value) = default {
                profile.defaults.push(ParamDefault {
                    axis: Axis::Main,
                    param,
                    value,
                });
            }
        }
        profile
    }

    #[test]
    fn test_shipped_profile() {
        let profile = fmcw_profile();
        assert_eq!(profile.radar_type, RadarType::Fmcw);
        assert_eq!(profile.num_config_slots, 4);
        assert_eq!(profile.max_active_slots, 2);
        assert_eq!(profile.antenna_mask(Axis::Tx), 0b11);
        assert_eq!(profile.antenna_mask(Axis::Rx), 0b111);
        assert_eq!(
            profile.range(Axis::Main, ParamId::BURST_PERIOD_US),
            Some(ParamRange::new(1000, 1_000_000))
        );
        assert_eq!(profile.range(Axis::Rx, ParamId::BURST_PERIOD_US), None);
        assert_eq!(
            profile.default_value(Axis::Main, ParamId::FMCW_SAMPLES_PER_CHIRP),
            Some(64)
        );
        assert!(profile.range(Axis::Main, ParamId::vendor(1)).is_some());
    }

    #[test]
    fn test_shipped_slot_config() {
        let config = SlotConfig::from_json(FMCW_SLOT).unwrap();
        assert!(config
            .main
            .iter()
            .any(|s| s.param == "burst_period_us" && s.value == 40000));
        assert_eq!(config.tx.len(), 1);
        assert_eq!(config.rx.len(), 3);
    }

    #[test]
    fn test_validation() {
        let mut profile = fmcw_profile();
        profile.max_active_slots = profile.num_config_slots + 1;
        assert!(matches!(profile.validate(), Err(Error::InvalidProfile(_))));

        let mut profile = fmcw_profile();
        profile.ranges.push(profile.ranges[0]);
        assert!(matches!(profile.validate(), Err(Error::InvalidProfile(_))));

        let mut profile = fmcw_profile();
        profile.defaults.push(ParamDefault {
            axis: Axis::Main,
            param: ParamId::BURST_PERIOD_US,
            value: 1,
        });
        assert!(matches!(profile.validate(), Err(Error::InvalidProfile(_))));

        let mut profile = fmcw_profile();
        profile.countries.push("USA".to_string());
        assert!(matches!(profile.validate(), Err(Error::InvalidProfile(_))));

        let mut profile = fmcw_profile();
        profile.rx_positions.pop();
        assert!(matches!(profile.validate(), Err(Error::InvalidProfile(_))));

        assert!(uwb_profile().validate().is_ok());
        let mut profile = fmcw_profile();
        profile.ranges.push(RangeEntry {
            axis: Axis::Main,
            param: ParamId::UWB_BITS_PER_SAMPLE,
            min: 1,
            max: 128,
        });
        assert!(matches!(profile.validate(), Err(Error::InvalidProfile(_))));
    }

    #[test]
    fn test_malformed_json() {
        let err = SensorProfile::from_json("{ \"name\": 1 }").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert_eq!(err.status(), crate::error::Status::BadInput);
    }
}
