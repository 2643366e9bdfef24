// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Parameter groups. Each group owns its own numeric id space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGroup {
    /// Parameters shared by every radar type
    Common = 1,
    /// Frequency Modulated Continuous Wave radars
    Fmcw = 2,
    /// Impulse radars
    Pulsed = 3,
    /// Ultra Wide Band radars
    Uwb = 4,
    /// Vendor specific parameters, ranges supplied by the vendor profile
    Vendor = 5,
}

impl ParamGroup {
    fn prefix(&self) -> &'static str {
        match self {
            ParamGroup::Common => "common",
            ParamGroup::Fmcw => "fmcw",
            ParamGroup::Pulsed => "pulsed",
            ParamGroup::Uwb => "uwb",
            ParamGroup::Vendor => "vendor",
        }
    }

    fn from_prefix(prefix: &str) -> Option<ParamGroup> {
        match prefix {
            "common" => Some(ParamGroup::Common),
            "fmcw" => Some(ParamGroup::Fmcw),
            "pulsed" => Some(ParamGroup::Pulsed),
            "uwb" => Some(ParamGroup::Uwb),
            "vendor" => Some(ParamGroup::Vendor),
            _ => None,
        }
    }
}

impl fmt::Display for ParamGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// The configuration axis a parameter lives on. Main parameters hold one
/// value per slot, TX and RX parameters one value per antenna.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Main,
    Tx,
    Rx,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Axis::Main => write!(f, "main"),
            Axis::Tx => write!(f, "tx"),
            Axis::Rx => write!(f, "rx"),
        }
    }
}

/// Identifies one configurable quantity within its group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamId {
    pub group: ParamGroup,
    pub id: u32,
}

impl ParamId {
    pub const fn new(group: ParamGroup, id: u32) -> ParamId {
        ParamId { group, id }
    }

    /// Vendor specific parameter id.
    pub const fn vendor(id: u32) -> ParamId {
        ParamId::new(ParamGroup::Vendor, id)
    }

    // Common main params.

    /// Power mode for after the burst period.
    pub const AFTERBURST_POWER_MODE: ParamId = ParamId::new(ParamGroup::Common, 1);
    /// Duration between the start times of two consecutive bursts.
    pub const BURST_PERIOD_US: ParamId = ParamId::new(ParamGroup::Common, 2);
    /// Bit mask for enabled TX antennas.
    pub const TX_ANTENNA_MASK: ParamId = ParamId::new(ParamGroup::Common, 3);
    /// Bit mask for enabled RX antennas.
    pub const RX_ANTENNA_MASK: ParamId = ParamId::new(ParamGroup::Common, 4);

    // FMCW main params.

    pub const FMCW_INTERCHIRP_POWER_MODE: ParamId = ParamId::new(ParamGroup::Fmcw, 1);
    pub const FMCW_CHIRP_PERIOD_US: ParamId = ParamId::new(ParamGroup::Fmcw, 2);
    pub const FMCW_CHIRPS_PER_BURST: ParamId = ParamId::new(ParamGroup::Fmcw, 3);
    pub const FMCW_SAMPLES_PER_CHIRP: ParamId = ParamId::new(ParamGroup::Fmcw, 4);
    pub const FMCW_LOWER_FREQ_MHZ: ParamId = ParamId::new(ParamGroup::Fmcw, 5);
    pub const FMCW_UPPER_FREQ_MHZ: ParamId = ParamId::new(ParamGroup::Fmcw, 6);
    pub const FMCW_ADC_SAMPLING_HZ: ParamId = ParamId::new(ParamGroup::Fmcw, 7);

    // Pulsed main params.

    pub const PULSED_INTERSWEEP_POWER_MODE: ParamId = ParamId::new(ParamGroup::Pulsed, 1);
    pub const PULSED_SWEEP_PERIOD_US: ParamId = ParamId::new(ParamGroup::Pulsed, 2);
    pub const PULSED_SWEEPS_PER_BURST: ParamId = ParamId::new(ParamGroup::Pulsed, 3);
    pub const PULSED_SAMPLES_PER_SWEEP: ParamId = ParamId::new(ParamGroup::Pulsed, 4);
    pub const PULSED_START_OFFSET: ParamId = ParamId::new(ParamGroup::Pulsed, 5);
    pub const PULSED_PRF_IDX: ParamId = ParamId::new(ParamGroup::Pulsed, 6);

    // UWB main params.

    pub const UWB_INTERSWEEP_POWER_MODE: ParamId = ParamId::new(ParamGroup::Uwb, 1);
    pub const UWB_SWEEP_PERIOD_US: ParamId = ParamId::new(ParamGroup::Uwb, 2);
    pub const UWB_SWEEPS_PER_BURST: ParamId = ParamId::new(ParamGroup::Uwb, 3);
    pub const UWB_SAMPLES_PER_SWEEP: ParamId = ParamId::new(ParamGroup::Uwb, 4);
    pub const UWB_START_OFFSET: ParamId = ParamId::new(ParamGroup::Uwb, 5);
    pub const UWB_PRF_IDX: ParamId = ParamId::new(ParamGroup::Uwb, 6);
    pub const UWB_CHANNEL_NUMBER: ParamId = ParamId::new(ParamGroup::Uwb, 7);
    pub const UWB_STS_PACKET_CONFIG: ParamId = ParamId::new(ParamGroup::Uwb, 8);
    pub const UWB_PREAMBLE_LENGTH: ParamId = ParamId::new(ParamGroup::Uwb, 9);
    pub const UWB_PREAMBLE_IDX: ParamId = ParamId::new(ParamGroup::Uwb, 10);
    pub const UWB_SESSION_PRIORITY: ParamId = ParamId::new(ParamGroup::Uwb, 11);
    pub const UWB_BITS_PER_SAMPLE: ParamId = ParamId::new(ParamGroup::Uwb, 12);
    pub const UWB_NUMBER_OF_BURSTS: ParamId = ParamId::new(ParamGroup::Uwb, 13);

    // TX params.

    pub const FMCW_TX_POWER_IDX: ParamId = ParamId::new(ParamGroup::Fmcw, 1);
    pub const PULSED_TX_POWER_IDX: ParamId = ParamId::new(ParamGroup::Pulsed, 1);
    pub const UWB_TX_POWER_IDX: ParamId = ParamId::new(ParamGroup::Uwb, 1);

    // RX params.

    pub const FMCW_RX_VGA_IDX: ParamId = ParamId::new(ParamGroup::Fmcw, 1);
    pub const FMCW_RX_HP_GAIN_IDX: ParamId = ParamId::new(ParamGroup::Fmcw, 2);
    pub const FMCW_RX_HP_CUTOFF_KHZ: ParamId = ParamId::new(ParamGroup::Fmcw, 3);
    pub const PULSED_RX_VGA_IDX: ParamId = ParamId::new(ParamGroup::Pulsed, 1);

    /// Returns the well-known name of the parameter on the given axis.
    pub fn name(&self, axis: Axis) -> Option<&'static str> {
        NAMES
            .iter()
            .find(|(a, p, _)| *a == axis && p == self)
            .map(|(_, _, name)| *name)
    }

    /// Parses a parameter name on the given axis. Accepts the well-known
    /// names, such as `fmcw.samples_per_chirp`, and the generic numeric
    /// form `group:id`, such as `vendor:17`.
    pub fn parse(axis: Axis, name: &str) -> Result<ParamId> {
        let name = name.trim();
        if let Some((_, param, _)) = NAMES.iter().find(|(a, _, n)| *a == axis && *n == name) {
            return Ok(*param);
        }

        name.split_once(':')
            .and_then(|(group, id)| {
                let group = ParamGroup::from_prefix(group)?;
                let id = id.parse::<u32>().ok()?;
                Some(ParamId::new(group, id))
            })
            .ok_or_else(|| Error::UnknownParamName(name.to_string()))
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.id)
    }
}

const NAMES: &[(Axis, ParamId, &str)] = &[
    (Axis::Main, ParamId::AFTERBURST_POWER_MODE, "afterburst_power_mode"),
    (Axis::Main, ParamId::BURST_PERIOD_US, "burst_period_us"),
    (Axis::Main, ParamId::TX_ANTENNA_MASK, "tx_antenna_mask"),
    (Axis::Main, ParamId::RX_ANTENNA_MASK, "rx_antenna_mask"),
    (Axis::Main, ParamId::FMCW_INTERCHIRP_POWER_MODE, "fmcw.interchirp_power_mode"),
    (Axis::Main, ParamId::FMCW_CHIRP_PERIOD_US, "fmcw.chirp_period_us"),
    (Axis::Main, ParamId::FMCW_CHIRPS_PER_BURST, "fmcw.chirps_per_burst"),
    (Axis::Main, ParamId::FMCW_SAMPLES_PER_CHIRP, "fmcw.samples_per_chirp"),
    (Axis::Main, ParamId::FMCW_LOWER_FREQ_MHZ, "fmcw.lower_freq_mhz"),
    (Axis::Main, ParamId::FMCW_UPPER_FREQ_MHZ, "fmcw.upper_freq_mhz"),
    (Axis::Main, ParamId::FMCW_ADC_SAMPLING_HZ, "fmcw.adc_sampling_hz"),
    (Axis::Main, ParamId::PULSED_INTERSWEEP_POWER_MODE, "pulsed.intersweep_power_mode"),
    (Axis::Main, ParamId::PULSED_SWEEP_PERIOD_US, "pulsed.sweep_period_us"),
    (Axis::Main, ParamId::PULSED_SWEEPS_PER_BURST, "pulsed.sweeps_per_burst"),
    (Axis::Main, ParamId::PULSED_SAMPLES_PER_SWEEP, "pulsed.samples_per_sweep"),
    (Axis::Main, ParamId::PULSED_START_OFFSET, "pulsed.start_offset"),
    (Axis::Main, ParamId::PULSED_PRF_IDX, "pulsed.prf_idx"),
    (Axis::Main, ParamId::UWB_INTERSWEEP_POWER_MODE, "uwb.intersweep_power_mode"),
    (Axis::Main, ParamId::UWB_SWEEP_PERIOD_US, "uwb.sweep_period_us"),
    (Axis::Main, ParamId::UWB_SWEEPS_PER_BURST, "uwb.sweeps_per_burst"),
    (Axis::Main, ParamId::UWB_SAMPLES_PER_SWEEP, "uwb.samples_per_sweep"),
    (Axis::Main, ParamId::UWB_START_OFFSET, "uwb.start_offset"),
    (Axis::Main, ParamId::UWB_PRF_IDX, "uwb.prf_idx"),
    (Axis::Main, ParamId::UWB_CHANNEL_NUMBER, "uwb.channel_number"),
    (Axis::Main, ParamId::UWB_STS_PACKET_CONFIG, "uwb.sts_packet_config"),
    (Axis::Main, ParamId::UWB_PREAMBLE_LENGTH, "uwb.preamble_length"),
    (Axis::Main, ParamId::UWB_PREAMBLE_IDX, "uwb.preamble_idx"),
    (Axis::Main, ParamId::UWB_SESSION_PRIORITY, "uwb.session_priority"),
    (Axis::Main, ParamId::UWB_BITS_PER_SAMPLE, "uwb.bits_per_sample"),
    (Axis::Main, ParamId::UWB_NUMBER_OF_BURSTS, "uwb.number_of_bursts"),
    (Axis::Tx, ParamId::FMCW_TX_POWER_IDX, "fmcw.power_idx"),
    (Axis::Tx, ParamId::PULSED_TX_POWER_IDX, "pulsed.power_idx"),
    (Axis::Tx, ParamId::UWB_TX_POWER_IDX, "uwb.power_idx"),
    (Axis::Rx, ParamId::FMCW_RX_VGA_IDX, "fmcw.vga_idx"),
    (Axis::Rx, ParamId::FMCW_RX_HP_GAIN_IDX, "fmcw.hp_gain_idx"),
    (Axis::Rx, ParamId::FMCW_RX_HP_CUTOFF_KHZ, "fmcw.hp_cutoff_khz"),
    (Axis::Rx, ParamId::PULSED_RX_VGA_IDX, "pulsed.vga_idx"),
];

/// Inclusive range of acceptable values for a parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: u32,
    pub max: u32,
}

impl ParamRange {
    pub fn new(min: u32, max: u32) -> ParamRange {
        ParamRange { min, max }
    }

    #[inline]
    pub fn contains(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Iterates the antenna indices selected by a bit mask, lowest first.
pub fn antennas(mask: u32) -> impl Iterator<Item = u8> {
    (0..32u8).filter(move |bit| mask & (1 << bit) != 0)
}
