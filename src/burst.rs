// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Largest burst, in bytes, any configuration may produce. Slots whose
/// burst would exceed it fail activation.
pub const MAX_BUF_BYTES: usize = 32 * 1024;

/// Radar technologies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RadarType {
    /// Frequency Modulated Continuous Wave
    Fmcw = 1,
    /// Impulse
    Pulsed = 2,
    /// Ultra Wide Band
    Uwb = 3,
}

impl TryFrom<u8> for RadarType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RadarType::Fmcw),
            2 => Ok(RadarType::Pulsed),
            3 => Ok(RadarType::Uwb),
            _ => Err(Error::InvalidRadarType(value)),
        }
    }
}

impl fmt::Display for RadarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RadarType::Fmcw => write!(f, "fmcw"),
            RadarType::Pulsed => write!(f, "pulsed"),
            RadarType::Uwb => write!(f, "uwb"),
        }
    }
}

/// Sample data types of raw burst data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum SampleDType {
    Int = 1,
    Uint = 2,
    Cint = 3,
    Cuint = 4,
    Float = 5,
    Cfloat = 6,
}

impl TryFrom<u32> for SampleDType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SampleDType::Int),
            2 => Ok(SampleDType::Uint),
            3 => Ok(SampleDType::Cint),
            4 => Ok(SampleDType::Cuint),
            5 => Ok(SampleDType::Float),
            6 => Ok(SampleDType::Cfloat),
            _ => Err(Error::InvalidSampleType(value)),
        }
    }
}

/// Radar type specific description of the burst payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BurstPayload {
    Fmcw {
        samples_per_chirp: u16,
        chirps_per_burst: u16,
    },
    Pulsed {
        samples_per_sweep: u16,
        sweeps_per_burst: u16,
    },
    Uwb {
        session_handle: u32,
        samples_per_sweep: u16,
        sweeps_per_burst: u16,
    },
}

impl BurstPayload {
    pub fn radar_type(&self) -> RadarType {
        match self {
            BurstPayload::Fmcw { .. } => RadarType::Fmcw,
            BurstPayload::Pulsed { .. } => RadarType::Pulsed,
            BurstPayload::Uwb { .. } => RadarType::Uwb,
        }
    }

    /// Samples per channel within one burst.
    pub fn samples(&self) -> usize {
        match *self {
            BurstPayload::Fmcw {
                samples_per_chirp,
                chirps_per_burst,
            } => samples_per_chirp as usize * chirps_per_burst as usize,
            BurstPayload::Pulsed {
                samples_per_sweep,
                sweeps_per_burst,
            }
            | BurstPayload::Uwb {
                samples_per_sweep,
                sweeps_per_burst,
                ..
            } => samples_per_sweep as usize * sweeps_per_burst as usize,
        }
    }
}

/// Self-describing format of one burst of raw samples.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BurstFormat {
    /// Starts at 1 on every stream start.
    pub sequence_number: u32,
    /// Config slot that produced the burst.
    pub config_id: u8,
    pub sample_data_type: SampleDType,
    /// Bits per sample including real and imaginary parts.
    pub bits_per_sample: u8,
    pub num_channels: u8,
    pub is_channels_interleaved: bool,
    pub is_big_endian: bool,
    pub payload: BurstPayload,
}

impl BurstFormat {
    /// Length of the wire header in bytes/octets.
    pub const LEN: usize = 28;

    const PAYLOAD_OFFSET: usize = 20;

    pub fn radar_type(&self) -> RadarType {
        self.payload.radar_type()
    }

    /// Bytes occupied by a single sample.
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8)
    }

    /// Length of the raw sample data following the header.
    pub fn burst_len(&self) -> usize {
        self.payload.samples() * self.num_channels as usize * self.bytes_per_sample()
    }

    /// Encodes the fixed-layout little-endian header. The layout mirrors
    /// the naturally aligned C structure, padding bytes are zero.
    pub fn to_bytes(&self) -> [u8; BurstFormat::LEN] {
        let mut buf = [0u8; BurstFormat::LEN];
        buf[0..4].copy_from_slice(&self.sequence_number.to_le_bytes());
        buf[4] = self.radar_type() as u8;
        buf[5] = self.config_id;
        buf[8..12].copy_from_slice(&(self.sample_data_type as u32).to_le_bytes());
        buf[12] = self.bits_per_sample;
        buf[13] = self.num_channels;
        buf[14] = self.is_channels_interleaved as u8;
        buf[15] = self.is_big_endian as u8;

        let payload = &mut buf[Self::PAYLOAD_OFFSET..];
        match self.payload {
            BurstPayload::Fmcw {
                samples_per_chirp: samples,
                chirps_per_burst: repeats,
            }
            | BurstPayload::Pulsed {
                samples_per_sweep: samples,
                sweeps_per_burst: repeats,
            } => {
                payload[0..2].copy_from_slice(&samples.to_le_bytes());
                payload[2..4].copy_from_slice(&repeats.to_le_bytes());
            }
            BurstPayload::Uwb {
                session_handle,
                samples_per_sweep,
                sweeps_per_burst,
            } => {
                payload[0..4].copy_from_slice(&session_handle.to_le_bytes());
                payload[4..6].copy_from_slice(&samples_per_sweep.to_le_bytes());
                payload[6..8].copy_from_slice(&sweeps_per_burst.to_le_bytes());
            }
        }

        buf
    }

    /// Decodes a header from the start of `slice`.
    pub fn from_slice(slice: &[u8]) -> Result<BurstFormat> {
        if slice.len() < BurstFormat::LEN {
            return Err(Error::UnexpectedEndOfSlice(slice.len()));
        }

        let u16_at = |offset: usize| u16::from_le_bytes([slice[offset], slice[offset + 1]]);
        let u32_at = |offset: usize| {
            u32::from_le_bytes([
                slice[offset],
                slice[offset + 1],
                slice[offset + 2],
                slice[offset + 3],
            ])
        };

        let offset = Self::PAYLOAD_OFFSET;
        let payload = match RadarType::try_from(slice[4])? {
            RadarType::Fmcw => BurstPayload::Fmcw {
                samples_per_chirp: u16_at(offset),
                chirps_per_burst: u16_at(offset + 2),
            },
            RadarType::Pulsed => BurstPayload::Pulsed {
                samples_per_sweep: u16_at(offset),
                sweeps_per_burst: u16_at(offset + 2),
            },
            RadarType::Uwb => BurstPayload::Uwb {
                session_handle: u32_at(offset),
                samples_per_sweep: u16_at(offset + 4),
                sweeps_per_burst: u16_at(offset + 6),
            },
        };

        Ok(BurstFormat {
            sequence_number: u32_at(0),
            config_id: slice[5],
            sample_data_type: SampleDType::try_from(u32_at(8))?,
            bits_per_sample: slice[12],
            num_channels: slice[13],
            is_channels_interleaved: slice[14] != 0,
            is_big_endian: slice[15] != 0,
            payload,
        })
    }
}

impl fmt::Display for BurstFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Burst {{ seq: {}, type: {}, config: {}, channels: {}, samples: {}, bytes: {} }}",
            self.sequence_number,
            self.radar_type(),
            self.config_id,
            self.num_channels,
            self.payload.samples(),
            self.burst_len()
        )
    }
}

/// One burst delivered to a reader.
#[derive(Clone, Debug, PartialEq)]
pub struct Burst {
    pub format: BurstFormat,
    /// Monotonic capture time in microseconds.
    pub timestamp_us: u64,
    pub data: Vec<u8>,
}

impl Burst {
    /// Serializes the burst as header immediately followed by the samples.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(BurstFormat::LEN + self.data.len());
        buf.extend_from_slice(&self.format.to_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }
}
