// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::sync::Arc;

use crate::{
    burst::{BurstFormat, BurstPayload, RadarType},
    error::{Error, Result},
    param::{antennas, Axis, ParamId, ParamRange},
    profile::SensorProfile,
    slot::ConfigSlot,
    state::RadarState,
};

/// Where a parameter value is stored within a slot. TX and RX targets
/// carry an antenna bit mask.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Main,
    Tx(u32),
    Rx(u32),
}

impl Target {
    pub fn axis(&self) -> Axis {
        match self {
            Target::Main => Axis::Main,
            Target::Tx(_) => Axis::Tx,
            Target::Rx(_) => Axis::Rx,
        }
    }
}

/// Validates and stores parameter values against the profile range tables.
#[derive(Debug, Clone)]
pub struct ParamRegistry {
    profile: Arc<SensorProfile>,
}

impl ParamRegistry {
    pub fn new(profile: Arc<SensorProfile>) -> ParamRegistry {
        ParamRegistry { profile }
    }

    pub fn profile(&self) -> &SensorProfile {
        &self.profile
    }

    /// Returns the acceptable range of a parameter.
    pub fn range(&self, axis: Axis, id: ParamId) -> Result<ParamRange> {
        self.profile
            .range(axis, id)
            .ok_or(Error::UnknownParam(axis, id))
    }

    pub fn validate(&self, axis: Axis, id: ParamId, value: u32) -> Result<()> {
        let range = self.range(axis, id)?;
        match range.contains(value) {
            true => Ok(()),
            false => Err(Error::OutOfRange {
                param: id,
                value,
                min: range.min,
                max: range.max,
            }),
        }
    }

    /// Mask selecting at least one antenna, all of them present.
    fn check_mask(&self, axis: Axis, mask: u32) -> Result<()> {
        if mask == 0 || mask & !self.profile.antenna_mask(axis) != 0 {
            return Err(Error::InvalidAntennaMask(mask));
        }
        Ok(())
    }

    /// Mask selecting exactly one present antenna, returns its index.
    pub fn single_antenna(&self, axis: Axis, mask: u32) -> Result<u8> {
        self.check_mask(axis, mask)?;
        match mask.count_ones() {
            1 => Ok(mask.trailing_zeros() as u8),
            _ => Err(Error::AmbiguousAntennaMask(mask)),
        }
    }

    /// Reads a parameter: the stored value, else the profile default.
    pub fn get(&self, slot: &ConfigSlot, target: Target, id: ParamId) -> Result<u32> {
        let axis = target.axis();
        self.range(axis, id)?;

        let stored = match target {
            Target::Main => slot.main(id),
            Target::Tx(mask) | Target::Rx(mask) => {
                slot.antenna(axis, id, self.single_antenna(axis, mask)?)
            }
        };

        stored
            .or_else(|| self.profile.default_value(axis, id))
            .ok_or(Error::ParamNotSet(id))
    }

    /// Stores a parameter. A multi-antenna mask writes every selected
    /// antenna or none of them.
    pub fn set(
        &self,
        state: RadarState,
        slot: &mut ConfigSlot,
        target: Target,
        id: ParamId,
        value: u32,
    ) -> Result<()> {
        let axis = target.axis();
        self.validate(axis, id, value)?;
        if let Target::Tx(mask) | Target::Rx(mask) = target {
            self.check_mask(axis, mask)?;
        }

        if !state.is_configurable() {
            return Err(Error::WrongState("set parameters", state));
        }
        if slot.is_active() {
            return Err(Error::SlotActive(slot.id()));
        }

        match target {
            Target::Main => slot.store_main(id, value),
            Target::Tx(mask) | Target::Rx(mask) => {
                for antenna in antennas(mask) {
                    slot.store_antenna(axis, id, antenna, value);
                }
            }
        }

        Ok(())
    }

    /// Main parameter value a slot resolves to, stored or default.
    pub fn resolve_main(&self, slot: &ConfigSlot, id: ParamId) -> Option<u32> {
        slot.main(id)
            .or_else(|| self.profile.default_value(Axis::Main, id))
    }

    /// Antenna mask a slot resolves to, all antennas when unspecified.
    pub fn resolve_mask(&self, slot: &ConfigSlot, axis: Axis) -> u32 {
        let id = match axis {
            Axis::Tx => ParamId::TX_ANTENNA_MASK,
            _ => ParamId::RX_ANTENNA_MASK,
        };
        self.resolve_main(slot, id)
            .unwrap_or_else(|| self.profile.antenna_mask(axis))
    }

    fn dimension(&self, slot: &ConfigSlot, id: ParamId) -> Result<u16> {
        let value = self
            .resolve_main(slot, id)
            .ok_or_else(|| Error::Incompatible(slot.id(), format!("{} is not configured", id)))?;
        u16::try_from(value).map_err(|_| {
            Error::Incompatible(slot.id(), format!("{} of {} is too large", id, value))
        })
    }

    /// Number of bursts a UWB slot executes before the radar leaves the
    /// active state. Zero or unset means unlimited.
    pub fn burst_limit(&self, slot: &ConfigSlot) -> Option<u32> {
        match self.profile.radar_type {
            RadarType::Uwb => self
                .resolve_main(slot, ParamId::UWB_NUMBER_OF_BURSTS)
                .filter(|n| *n > 0),
            _ => None,
        }
    }

    /// Format of the bursts the slot produces, sequence number zero.
    pub fn burst_format(&self, slot: &ConfigSlot) -> Result<BurstFormat> {
        let sample_format = self.profile.sample_format;
        let mut bits_per_sample = sample_format.bits_per_sample;

        let payload = match self.profile.radar_type {
            RadarType::Fmcw => BurstPayload::Fmcw {
                samples_per_chirp: self.dimension(slot, ParamId::FMCW_SAMPLES_PER_CHIRP)?,
                chirps_per_burst: self.dimension(slot, ParamId::FMCW_CHIRPS_PER_BURST)?,
            },
            RadarType::Pulsed => BurstPayload::Pulsed {
                samples_per_sweep: self.dimension(slot, ParamId::PULSED_SAMPLES_PER_SWEEP)?,
                sweeps_per_burst: self.dimension(slot, ParamId::PULSED_SWEEPS_PER_BURST)?,
            },
            RadarType::Uwb => {
                if let Some(bits) = self.resolve_main(slot, ParamId::UWB_BITS_PER_SAMPLE) {
                    bits_per_sample = match u8::try_from(bits) {
                        Ok(bits @ 1..=64) => bits,
                        _ => {
                            return Err(Error::Incompatible(
                                slot.id(),
                                format!("{} bits per sample not within 1..=64", bits),
                            ))
                        }
                    };
                }
                BurstPayload::Uwb {
                    session_handle: (self.profile.device_id << 8) | slot.id() as u32,
                    samples_per_sweep: self.dimension(slot, ParamId::UWB_SAMPLES_PER_SWEEP)?,
                    sweeps_per_burst: self.dimension(slot, ParamId::UWB_SWEEPS_PER_BURST)?,
                }
            }
        };

        Ok(BurstFormat {
            sequence_number: 0,
            config_id: slot.id(),
            sample_data_type: sample_format.dtype,
            bits_per_sample,
            num_channels: self.resolve_mask(slot, Axis::Rx).count_ones() as u8,
            is_channels_interleaved: sample_format.interleaved,
            is_big_endian: sample_format.big_endian,
            payload,
        })
    }
}
