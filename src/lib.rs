// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Ripple Radar Library
//!
//! A vendor neutral core for controlling FMCW, pulsed and UWB radar sensors:
//! parameter configuration, power state transitions, burst data streaming
//! and diagnostic callbacks.
//!
//! # Features
//!
//! - **Parameter Registry** - Range checked main, TX, RX and vendor
//!   parameters, with all-or-nothing antenna mask writes
//! - **Config Slots** - Fixed slot table with activation limits and a
//!   compatibility check
//! - **Power States** - Off, Idle, Active and Sleep with guarded transitions
//! - **Burst Streaming** - Acquisition thread, bounded FIFO, blocking reads
//!   with timeout and a fixed little-endian burst header
//! - **Observers** - Burst-ready, driver log and register-write callbacks
//!
//! All hardware policy (ranges, slot capacity, antennas, sample format) is
//! supplied by a JSON [`profile::SensorProfile`].
//!
//! # Example
//!
//! ```no_run
//! use ripple::{param::ParamId, profile::SensorProfile, sensor::RadarModule};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), ripple::error::Error> {
//! let profile = SensorProfile::from_path("profiles/fmcw-60ghz.json")?;
//! let module = RadarModule::init();
//! let sensor = module.create(0, profile)?;
//!
//! sensor.set_main_param(0, ParamId::BURST_PERIOD_US, 40000)?;
//! sensor.activate_config(0)?;
//! sensor.turn_on()?;
//! sensor.start_streaming()?;
//!
//! let burst = sensor.read_burst(Duration::from_secs(1))?;
//! println!("{}", burst.format);
//!
//! sensor.stop_streaming()?;
//! sensor.turn_off()?;
//! module.destroy(sensor)?;
//! module.deinit()
//! # }
//! ```

/// Burst format descriptor and wire header codec
pub mod burst;

/// Thread priority and clock helpers
pub mod common;

/// Burst streaming engine and burst sources
pub mod engine;

/// Error and status code types
pub mod error;

/// Observer dispatch and driver logging
pub mod observer;

/// Parameter identifiers and ranges
pub mod param;

/// Sensor profiles and slot configurations
pub mod profile;

/// Parameter registry
pub mod registry;

/// Radar module and sensor sessions
pub mod sensor;

/// Config slot manager
pub mod slot;

/// Power state machine
pub mod state;

pub use sensor::api_version;
